//! In-memory lookup from canonical key to ingredient id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::normalize::{normalize_with, KeyStyle};

/// A vocabulary ingredient as stored by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i32,
    pub name: String,
    pub image_url: Option<String>,
    /// Provenance tag (e.g. "marmiton").
    pub source: String,
}

/// Canonical key -> ingredient id, built once per run.
///
/// Immutable after [`VocabularyIndex::build`]; share it by reference across
/// workers. Fuzzy candidates are kept sorted by ascending id so that scans
/// and tie-breaks do not depend on hash ordering.
#[derive(Debug, Clone, Default)]
pub struct VocabularyIndex {
    style: KeyStyle,
    by_key: HashMap<String, i32>,
    candidates: Vec<Candidate>,
}

/// One entry of the fuzzy scan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: i32,
    pub key: String,
}

impl VocabularyIndex {
    /// Build an index from `(id, name)` pairs.
    ///
    /// Names normalizing to an empty key are skipped. When two names share a
    /// key, the later entry wins.
    pub fn build<'a, I>(entries: I, style: KeyStyle) -> Self
    where
        I: IntoIterator<Item = (i32, &'a str)>,
    {
        let mut by_key = HashMap::new();
        let mut skipped = 0usize;

        for (id, name) in entries {
            let key = normalize_with(name, style);
            if key.is_empty() {
                skipped += 1;
                continue;
            }
            by_key.insert(key, id);
        }

        let mut candidates: Vec<Candidate> = by_key
            .iter()
            .map(|(key, &id)| Candidate {
                id,
                key: key.clone(),
            })
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.key.cmp(&b.key)));

        tracing::debug!(
            keys = by_key.len(),
            skipped,
            style = ?style,
            "built vocabulary index"
        );

        Self {
            style,
            by_key,
            candidates,
        }
    }

    /// Build an index from stored ingredient rows.
    pub fn from_ingredients(ingredients: &[Ingredient], style: KeyStyle) -> Self {
        Self::build(ingredients.iter().map(|i| (i.id, i.name.as_str())), style)
    }

    /// The key style used for both vocabulary names and mentions.
    pub fn style(&self) -> KeyStyle {
        self.style
    }

    /// Exact lookup of an already-normalized key.
    pub fn get(&self, key: &str) -> Option<i32> {
        self.by_key.get(key).copied()
    }

    /// Normalize `text` in this index's style, then look it up.
    pub fn lookup(&self, text: &str) -> Option<i32> {
        self.get(&normalize_with(text, self.style))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// All entries in ascending id order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
