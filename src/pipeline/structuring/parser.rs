//! Heuristic entity extraction over raw OCR text.
//!
//! Five independent extractors read the same text: doctor, diagnosis,
//! medicines, duration and frequency. They are deliberately approximate
//! keyword/regex heuristics; accepted outputs depend on their exact
//! matching behaviour.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{Medicine, OrderedSet, ParsedPrescription};
use super::vocabulary::Vocabulary;

/// "Dr", optionally followed by a period, at the start of a trimmed line.
static DOCTOR_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^dr\.?").unwrap());

/// Unit/form tokens that mark a line as a medicine line.
static MEDICINE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(mg|mcg|ml|tab|tablet|cap|capsule|syp|syrup)").unwrap()
});

static DIAGNOSIS_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)diagnosis").unwrap());

static RX_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)rx").unwrap());

/// Strength units inside a token, e.g. `650mg`, `5ml`.
static DOSAGE_UNIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(mg|mcg|ml)").unwrap());

/// Bare numbers and hyphenated schedules, e.g. `5`, `1-0-1`.
static NUMERIC_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(-[0-9]+)*$").unwrap());

/// Duration unit words that trail a count on a medicine line.
static DURATION_UNIT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(days?|weeks?|months?)$").unwrap());

/// `<count> <unit>` anywhere in lowercased text.
static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\s*(days?|weeks?|months?)").unwrap());

/// Morning-afternoon-night dose triple, each count 0-3.
static DOSE_SCHEDULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)[0-3]-[0-3]-[0-3](?-u:\b)").unwrap());

/// Parse one slot's OCR text into structured entities.
///
/// Absent or empty text yields no doctor and empty collections.
pub fn parse_prescription_text(text: Option<&str>, vocabulary: &Vocabulary) -> ParsedPrescription {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return ParsedPrescription::default();
    };

    ParsedPrescription {
        doctor: extract_doctor(text),
        diagnosis: extract_diagnosis(text, vocabulary),
        medicines: extract_medicines(text),
        duration: extract_duration(text),
        frequency: extract_frequency(text, vocabulary),
    }
}

/// First trimmed line starting with "Dr" (any case, optional period).
///
/// Later doctor lines are ignored.
pub fn extract_doctor(text: &str) -> Option<String> {
    text.split('\n')
        .map(str::trim)
        .find(|line| DOCTOR_PREFIX.is_match(line))
        .map(str::to_string)
}

/// Vocabulary conditions contained anywhere in the text, in vocabulary order.
pub fn extract_diagnosis(text: &str, vocabulary: &Vocabulary) -> Vec<String> {
    let lower = text.to_lowercase();
    vocabulary
        .conditions()
        .iter()
        .filter(|condition| lower.contains(condition.as_str()))
        .cloned()
        .collect::<OrderedSet<_>>()
        .into_vec()
}

/// Medicine entries, one per qualifying line, deduplicated by
/// `(lowercased name, dosage)` with the first occurrence kept.
pub fn extract_medicines(text: &str) -> Vec<Medicine> {
    let mut seen = OrderedSet::new();
    let mut medicines = Vec::new();

    for line in text.split('\n').map(str::trim) {
        if line.is_empty() || is_header_line(line) || !MEDICINE_LINE.is_match(line) {
            continue;
        }

        let Some(medicine) = split_medicine_line(line) else {
            continue;
        };
        if seen.insert(medicine.dedup_key()) {
            medicines.push(medicine);
        }
    }

    medicines
}

fn is_header_line(line: &str) -> bool {
    DOCTOR_PREFIX.is_match(line) || DIAGNOSIS_HEADER.is_match(line) || RX_HEADER.is_match(line)
}

/// Split "Paracetamol 650mg 1-1-1 5 days" into name and dosage tokens.
fn split_medicine_line(line: &str) -> Option<Medicine> {
    let (dosage_parts, name_parts): (Vec<&str>, Vec<&str>) =
        line.split_whitespace().partition(|token| is_dosage_token(token));

    let name = name_parts.join(" ").trim().to_string();
    if name.is_empty() {
        return None;
    }
    let dosage = dosage_parts.join(" ").trim().to_string();

    Some(Medicine {
        name,
        dosage: (!dosage.is_empty()).then_some(dosage),
        raw: line.to_string(),
    })
}

fn is_dosage_token(token: &str) -> bool {
    DOSAGE_UNIT.is_match(token)
        || NUMERIC_SEQUENCE.is_match(token)
        || DURATION_UNIT_TOKEN.is_match(token)
}

/// Every `<count> <day|week|month>(s)` match, left to right, deduplicated.
pub fn extract_duration(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    DURATION
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect::<OrderedSet<_>>()
        .into_vec()
}

/// Dose-schedule triples (left to right) followed by vocabulary phrases
/// (in vocabulary order), deduplicated.
pub fn extract_frequency(text: &str, vocabulary: &Vocabulary) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut found: OrderedSet<String> = DOSE_SCHEDULE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect();

    found.extend(
        vocabulary
            .frequency_phrases()
            .iter()
            .filter(|phrase| lower.contains(phrase.as_str()))
            .cloned(),
    );

    found.into_vec()
}
