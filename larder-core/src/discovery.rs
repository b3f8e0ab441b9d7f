//! Growing the vocabulary from recipe ingredient names.
//!
//! Growth is two-phase: collect the names the current index does not know,
//! insert them in one batch, then rebuild the index from storage. An index is
//! never mutated after it is built.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::normalize::{normalize_for_linking, normalize_with};
use crate::store::IngredientStore;
use crate::vocabulary::VocabularyIndex;

/// Names kept by a frequency ranking.
pub const DEFAULT_TOP_NAMES: usize = 300;

/// Ranked names must be longer than this many characters.
pub const DEFAULT_MIN_NAME_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFrequency {
    /// Canonical (linking-style) name.
    pub name: String,
    pub count: usize,
}

/// Count canonical names and keep the `limit` most frequent ones.
///
/// Ties are broken alphabetically so the ranking is stable.
pub fn rank_by_frequency<'a, I>(names: I, limit: usize, min_len: usize) -> Vec<NameFrequency>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for name in names {
        let key = normalize_for_linking(name);
        if key.chars().count() > min_len {
            *counts.entry(key).or_default() += 1;
        }
    }

    let mut ranked: Vec<NameFrequency> = counts
        .into_iter()
        .map(|(name, count)| NameFrequency { name, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}

/// Phase one: names whose key is missing from `index`.
///
/// Deduplicated by key in first-seen order; the returned display names are
/// trimmed but otherwise as given.
pub fn collect_new_names<'a, I>(names: I, index: &VocabularyIndex) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut new_names = Vec::new();

    for name in names {
        let key = normalize_with(name, index.style());
        if key.is_empty() || index.contains_key(&key) || !seen.insert(key) {
            continue;
        }
        new_names.push(name.trim().to_string());
    }
    new_names
}

/// Phase two: insert `new_names` in one batch and rebuild the index.
///
/// Returns the rebuilt index (same key style, same provenance filter) and the
/// number of names inserted.
pub fn grow_vocabulary<S>(
    store: &S,
    index: &VocabularyIndex,
    new_names: &[String],
    source: &str,
    filter: Option<&str>,
) -> Result<(VocabularyIndex, usize), StoreError>
where
    S: IngredientStore + ?Sized,
{
    let inserted = store.insert_ingredients(new_names, source)?;
    let rows = store.load_vocabulary(filter)?;
    let rebuilt = VocabularyIndex::from_ingredients(&rows, index.style());

    tracing::info!(
        candidates = new_names.len(),
        inserted,
        keys = rebuilt.len(),
        source,
        "grew vocabulary"
    );
    Ok((rebuilt, inserted))
}
