use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// A medicine line recognised in prescription text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    pub dosage: Option<String>,
    /// Source line the entry was parsed from, kept for audit.
    pub raw: String,
}

impl Medicine {
    /// Identity used for deduplication: lowercased name plus dosage (or empty).
    pub fn dedup_key(&self) -> (String, String) {
        (
            self.name.to_lowercase(),
            self.dosage.clone().unwrap_or_default(),
        )
    }
}

/// Entities extracted from one slot's OCR text.
///
/// Collections are never absent; an empty input yields empty collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPrescription {
    pub doctor: Option<String>,
    pub diagnosis: Vec<String>,
    pub medicines: Vec<Medicine>,
    pub duration: Vec<String>,
    pub frequency: Vec<String>,
}

/// Insertion-ordered set: the first occurrence of a value wins.
#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
    items: Vec<T>,
    seen: HashSet<T>,
}

impl<T: Eq + Hash + Clone> OrderedSet<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Returns `false` if the value was already present.
    pub fn insert(&mut self, value: T) -> bool {
        if self.seen.contains(&value) {
            return false;
        }
        self.seen.insert(value.clone());
        self.items.push(value);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Eq + Hash + Clone> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T: Eq + Hash + Clone> Extend<T> for OrderedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}
