//! Match persistence.
//!
//! Storage sits behind [`MatchStore`] and [`IngredientStore`] so the matching
//! pipeline runs the same way against SQLite or the in-memory [`MemoryStore`].
//! Uniqueness of `(kind, source_id, ingredient_id)` is the store's job:
//! conflicting inserts are absorbed, never reported as errors.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{MatchMethod, MatchRecord, MatchSummary, Scope, SourceKind};
use crate::vocabulary::Ingredient;

/// Sink for match records.
///
/// Implementations must make each call atomic: either every row of the call
/// is committed or none is.
pub trait MatchStore: Send + Sync + fmt::Debug {
    /// Delete every record in `scope`, then insert `records`, in one transaction.
    ///
    /// Records are deduplicated keep-first and must all belong to `scope`.
    /// Returns the number of rows inserted.
    fn replace_matches(&self, scope: &Scope, records: &[MatchRecord])
        -> Result<usize, StoreError>;

    /// Insert records in one transaction, ignoring keys that already exist.
    /// Returns the number of rows actually inserted.
    fn insert_batch(&self, records: &[MatchRecord]) -> Result<usize, StoreError>;

    /// Insert a record, or overwrite score, method and mention of the stored one.
    fn upsert_match(&self, record: &MatchRecord) -> Result<(), StoreError>;

    /// Delete every record in `scope`. Returns the number of rows deleted.
    fn clear(&self, scope: &Scope) -> Result<usize, StoreError>;

    fn summary(&self, kind: SourceKind) -> Result<MatchSummary, StoreError>;

    /// Backend name for logs ("sqlite", "memory").
    fn store_name(&self) -> &'static str;
}

/// Source of vocabulary rows.
pub trait IngredientStore: Send + Sync + fmt::Debug {
    /// Vocabulary rows in ascending id order, optionally restricted to one
    /// provenance source.
    fn load_vocabulary(&self, source: Option<&str>) -> Result<Vec<Ingredient>, StoreError>;

    /// Insert new names in one batch. Blank names and names already present
    /// (compared case-insensitively) are skipped. Returns the number inserted.
    fn insert_ingredients(&self, names: &[String], source: &str) -> Result<usize, StoreError>;

    /// Set the image of an existing ingredient that has none yet.
    fn backfill_image_url(&self, name: &str, image_url: &str) -> Result<bool, StoreError>;
}

/// Collapse records sharing a `(kind, source_id, ingredient_id)` key, keeping
/// the first occurrence.
pub fn dedupe_records(records: &[MatchRecord]) -> Vec<MatchRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| seen.insert(record.key()))
        .cloned()
        .collect()
}

/// Fail if any record lies outside `scope`.
pub fn check_scope(scope: &Scope, records: &[MatchRecord]) -> Result<(), StoreError> {
    match records.iter().find(|record| !scope.contains(record)) {
        Some(record) => Err(StoreError::OutOfScope {
            kind: record.kind,
            source_id: record.source_id.clone(),
        }),
        None => Ok(()),
    }
}

/// Aggregate a set of records of one kind.
pub fn summarize<'a, I>(records: I) -> MatchSummary
where
    I: IntoIterator<Item = &'a MatchRecord>,
{
    let mut sources = BTreeSet::new();
    let mut ingredients = BTreeSet::new();
    let mut summary = MatchSummary::default();
    let mut total_score = 0.0;

    for record in records {
        sources.insert(record.source_id.as_str());
        ingredients.insert(record.ingredient_id);
        summary.matches += 1;
        match record.method {
            MatchMethod::Exact => summary.exact += 1,
            MatchMethod::Partial => summary.partial += 1,
        }
        total_score += record.score;
    }

    summary.sources = sources.len();
    summary.ingredients = ingredients.len();
    if summary.matches > 0 {
        summary.average_score = Some(total_score / summary.matches as f64);
    }
    summary
}

/// Outcome of a [`MatchWriter`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
    /// Rows the store reported as newly inserted.
    pub committed: usize,
    /// Records dropped because the same key was already pending.
    pub duplicates: usize,
    /// Records whose key already existed in the store.
    pub ignored: usize,
    /// Transactions committed.
    pub batches: usize,
}

/// Incremental batched writer.
///
/// Records are committed through [`MatchStore::insert_batch`] every
/// `batch_size` records. Duplicates are dropped within the pending batch only;
/// a repeat of an already committed key reaches the store and is counted as
/// ignored, so memory stays bounded by `batch_size`. If a commit fails, every
/// earlier batch stays committed and the failing batch is left pending.
pub struct MatchWriter<'a, S: MatchStore + ?Sized> {
    store: &'a S,
    batch_size: usize,
    pending: Vec<MatchRecord>,
    seen: HashSet<(SourceKind, String, i32)>,
    summary: WriteSummary,
}

impl<'a, S: MatchStore + ?Sized> MatchWriter<'a, S> {
    pub fn new(store: &'a S, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            seen: HashSet::new(),
            summary: WriteSummary::default(),
        }
    }

    pub fn push(&mut self, record: MatchRecord) -> Result<(), StoreError> {
        let key = (record.kind, record.source_id.clone(), record.ingredient_id);
        if !self.seen.insert(key) {
            self.summary.duplicates += 1;
            return Ok(());
        }

        self.pending.push(record);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn extend<I>(&mut self, records: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = MatchRecord>,
    {
        for record in records {
            self.push(record)?;
        }
        Ok(())
    }

    /// Commit pending records as one batch.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let inserted = self.store.insert_batch(&self.pending)?;
        self.summary.batches += 1;
        self.summary.committed += inserted;
        self.summary.ignored += self.pending.len().saturating_sub(inserted);

        tracing::debug!(
            store = self.store.store_name(),
            batch = self.summary.batches,
            size = self.pending.len(),
            inserted,
            "committed match batch"
        );

        self.pending.clear();
        self.seen.clear();
        Ok(())
    }

    /// Records waiting for the next commit.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Commit the tail and return the run totals.
    pub fn finish(mut self) -> Result<WriteSummary, StoreError> {
        self.flush()?;
        tracing::info!(
            store = self.store.store_name(),
            committed = self.summary.committed,
            duplicates = self.summary.duplicates,
            ignored = self.summary.ignored,
            batches = self.summary.batches,
            "match write finished"
        );
        Ok(self.summary)
    }
}

type MatchKey = (SourceKind, String, i32);

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    /// Make `insert_batch` fail once this many batches have been committed.
    fail_after_batches: Option<usize>,
}

#[derive(Debug, Default)]
struct MemoryState {
    ingredients: Vec<Ingredient>,
    matches: BTreeMap<MatchKey, MatchRecord>,
    batches: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with vocabulary rows, e.g. copied from a real store
    /// for a dry run.
    pub fn with_ingredients(ingredients: Vec<Ingredient>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                ingredients,
                ..MemoryState::default()
            }),
            fail_after_batches: None,
        }
    }

    /// A store whose `insert_batch` fails after `batches` successful commits.
    pub fn failing_after(batches: usize) -> Self {
        Self {
            fail_after_batches: Some(batches),
            ..Self::default()
        }
    }

    /// Snapshot of every stored record in key order.
    pub fn matches(&self) -> Result<Vec<MatchRecord>, StoreError> {
        Ok(self.lock()?.matches.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn key_of(record: &MatchRecord) -> MatchKey {
    (record.kind, record.source_id.clone(), record.ingredient_id)
}

fn insert_ignoring(matches: &mut BTreeMap<MatchKey, MatchRecord>, record: &MatchRecord) -> bool {
    match matches.entry(key_of(record)) {
        Entry::Vacant(entry) => {
            entry.insert(record.clone());
            true
        }
        Entry::Occupied(_) => false,
    }
}

impl MatchStore for MemoryStore {
    fn replace_matches(
        &self,
        scope: &Scope,
        records: &[MatchRecord],
    ) -> Result<usize, StoreError> {
        check_scope(scope, records)?;
        let records = dedupe_records(records);

        let mut state = self.lock()?;
        state.matches.retain(|_, record| !scope.contains(record));
        let inserted = records
            .iter()
            .filter(|record| insert_ignoring(&mut state.matches, record))
            .count();
        Ok(inserted)
    }

    fn insert_batch(&self, records: &[MatchRecord]) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        if let Some(limit) = self.fail_after_batches {
            if state.batches >= limit {
                return Err(StoreError::Unavailable(format!(
                    "memory store refuses batches after {}",
                    limit
                )));
            }
        }

        let inserted = records
            .iter()
            .filter(|record| insert_ignoring(&mut state.matches, record))
            .count();
        state.batches += 1;
        Ok(inserted)
    }

    fn upsert_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .matches
            .entry(key_of(record))
            .and_modify(|stored| {
                stored.score = record.score;
                stored.method = record.method;
                stored.mention = record.mention.clone();
            })
            .or_insert_with(|| record.clone());
        Ok(())
    }

    fn clear(&self, scope: &Scope) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        let before = state.matches.len();
        state.matches.retain(|_, record| !scope.contains(record));
        Ok(before - state.matches.len())
    }

    fn summary(&self, kind: SourceKind) -> Result<MatchSummary, StoreError> {
        let state = self.lock()?;
        Ok(summarize(
            state.matches.values().filter(|record| record.kind == kind),
        ))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

impl IngredientStore for MemoryStore {
    fn load_vocabulary(&self, source: Option<&str>) -> Result<Vec<Ingredient>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .ingredients
            .iter()
            .filter(|ingredient| source.map_or(true, |s| ingredient.source == s))
            .cloned()
            .collect())
    }

    fn insert_ingredients(&self, names: &[String], source: &str) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        let mut existing: HashSet<String> = state
            .ingredients
            .iter()
            .map(|ingredient| ingredient.name.to_lowercase())
            .collect();
        let mut next_id = state.ingredients.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        let mut inserted = 0;

        for name in names {
            let name = name.trim();
            if name.is_empty() || !existing.insert(name.to_lowercase()) {
                continue;
            }
            state.ingredients.push(Ingredient {
                id: next_id,
                name: name.to_string(),
                image_url: None,
                source: source.to_string(),
            });
            next_id += 1;
            inserted += 1;
        }
        Ok(inserted)
    }

    fn backfill_image_url(&self, name: &str, image_url: &str) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let needle = name.trim().to_lowercase();
        match state
            .ingredients
            .iter_mut()
            .find(|ingredient| ingredient.name.to_lowercase() == needle)
        {
            Some(ingredient) if ingredient.image_url.is_none() => {
                ingredient.image_url = Some(image_url.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
