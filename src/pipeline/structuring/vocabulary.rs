//! Static keyword lists used by the entity extractors.
//!
//! Held in an immutable `Vocabulary` value that callers inject, so the
//! extractors stay pure and tests can swap in small custom lists.

/// Conditions recognised by substring match, in reporting order.
const KNOWN_CONDITIONS: &[&str] = &[
    "fever",
    "cold",
    "cough",
    "infection",
    "throat infection",
    "flu",
    "diabetes",
    "hypertension",
    "bp",
    "blood pressure",
    "asthma",
    "allergy",
    "headache",
    "migraine",
    "pain",
    "acidity",
    "ulcer",
    "anxiety",
    "depression",
];

/// Word-based dosing instructions, in reporting order.
const FREQUENCY_PHRASES: &[&str] = &[
    "once daily",
    "twice daily",
    "thrice daily",
    "three times a day",
    "two times a day",
    "every 8 hours",
    "every 6 hours",
    "every 12 hours",
    "at night",
    "in the morning",
    "after food",
    "before food",
];

/// Keyword vocabularies for diagnosis and frequency extraction.
///
/// Terms are stored lowercase; matching runs against lowercased text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    conditions: Vec<String>,
    frequency_phrases: Vec<String>,
}

impl Vocabulary {
    pub fn new<C, F>(conditions: C, frequency_phrases: F) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        Self {
            conditions: conditions
                .into_iter()
                .map(|c| c.as_ref().to_lowercase())
                .collect(),
            frequency_phrases: frequency_phrases
                .into_iter()
                .map(|f| f.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn frequency_phrases(&self) -> &[String] {
        &self.frequency_phrases
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(KNOWN_CONDITIONS, FREQUENCY_PHRASES)
    }
}
