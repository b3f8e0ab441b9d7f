//! The match commands: products, recipes and product tags against the vocabulary.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use larder_core::mentions::{decode_ingredients_json, decode_ingredients_raw, to_mentions};
use larder_core::{
    product_mentions, split_tags, IngredientStore, KeyStyle, MatchRecord, MatchStore,
    MatchWriter, Matcher, Mention, ScoringPolicy, Scope, SourceKind, StoreError, VocabularyIndex,
    WriteSummary,
};
use serde::Serialize;

use crate::config::{CommandDefaults, RunConfig, WriteMode};
use crate::input::{ProductInput, RecipeInput};

pub const PRODUCT_DEFAULTS: CommandDefaults = CommandDefaults {
    policy: ScoringPolicy::Containment,
    style: KeyStyle::Tag,
};

pub const RECIPE_DEFAULTS: CommandDefaults = CommandDefaults {
    policy: ScoringPolicy::Containment,
    style: KeyStyle::Recipe,
};

pub const TAG_DEFAULTS: CommandDefaults = CommandDefaults {
    policy: ScoringPolicy::SimpleIngredient,
    style: KeyStyle::Linking,
};

/// Product tags this short are never linked.
const MIN_TAG_LEN: usize = 3;

/// Totals of one match run.
#[derive(Debug, Default, Serialize)]
pub struct MatchReport {
    pub kind: Option<SourceKind>,
    pub vocabulary: usize,
    pub sources: usize,
    pub matched_sources: usize,
    pub mentions: usize,
    pub records: usize,
    pub written: WriteSummary,
}

/// Where records go, per [`WriteMode`].
enum Sink<'a, S: MatchStore + ?Sized> {
    Batched(MatchWriter<'a, S>),
    Replace {
        store: &'a S,
        kind: SourceKind,
        summary: WriteSummary,
    },
    Upsert {
        store: &'a S,
        summary: WriteSummary,
    },
}

impl<'a, S: MatchStore + ?Sized> Sink<'a, S> {
    fn open(store: &'a S, kind: SourceKind, config: &RunConfig) -> Result<Self, StoreError> {
        Ok(match config.mode {
            WriteMode::Append => Sink::Batched(MatchWriter::new(store, config.batch_size)),
            WriteMode::Rebuild => {
                let cleared = store.clear(&Scope::run(kind))?;
                tracing::info!(%kind, cleared, "cleared previous matches");
                Sink::Batched(MatchWriter::new(store, config.batch_size))
            }
            WriteMode::Replace => Sink::Replace {
                store,
                kind,
                summary: WriteSummary::default(),
            },
            WriteMode::Upsert => Sink::Upsert {
                store,
                summary: WriteSummary::default(),
            },
        })
    }

    fn write(&mut self, source_id: &str, records: Vec<MatchRecord>) -> Result<(), StoreError> {
        match self {
            Sink::Batched(writer) => writer.extend(records),
            Sink::Replace {
                store,
                kind,
                summary,
            } => {
                let inserted = store.replace_matches(&Scope::entity(*kind, source_id), &records)?;
                summary.committed += inserted;
                summary.duplicates += records.len() - inserted;
                summary.batches += 1;
                Ok(())
            }
            Sink::Upsert { store, summary } => {
                for record in &records {
                    store.upsert_match(record)?;
                    summary.committed += 1;
                    summary.batches += 1;
                }
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<WriteSummary, StoreError> {
        match self {
            Sink::Batched(writer) => writer.finish(),
            Sink::Replace { summary, .. } | Sink::Upsert { summary, .. } => Ok(summary),
        }
    }
}

fn load_index<S>(store: &S, config: &RunConfig) -> Result<VocabularyIndex>
where
    S: IngredientStore + ?Sized,
{
    let rows = store.load_vocabulary(config.vocabulary_source.as_deref())?;
    if rows.is_empty() {
        tracing::warn!(
            source = config.vocabulary_source.as_deref(),
            "vocabulary is empty, nothing can match"
        );
    }
    Ok(VocabularyIndex::from_ingredients(&rows, config.style))
}

/// Link each product to the vocabulary through its ingredient tags.
pub fn match_products<S>(
    store: &S,
    products: &[ProductInput],
    config: &RunConfig,
) -> Result<MatchReport>
where
    S: MatchStore + IngredientStore + ?Sized,
{
    let index = load_index(store, config)?;
    let matcher = Matcher::new(config.matcher.clone());
    let mut sink = Sink::open(store, SourceKind::Product, config)?;
    let mut report = MatchReport {
        kind: Some(SourceKind::Product),
        vocabulary: index.len(),
        ..MatchReport::default()
    };

    for product in products {
        let mentions = product_mentions(&product.code, &product.ingredients_tags.joined());
        let records = matcher.match_mentions(&mentions, &index);
        tally(&mut report, mentions.len(), records.len());
        sink.write(&product.code, records)?;
    }

    report.written = sink.finish()?;
    Ok(report)
}

/// Link each recipe to the vocabulary.
///
/// The structured ingredient list is tried first; the raw list is used only
/// when the structured one yields no match.
pub fn match_recipes<S>(
    store: &S,
    recipes: &[RecipeInput],
    config: &RunConfig,
) -> Result<MatchReport>
where
    S: MatchStore + IngredientStore + ?Sized,
{
    let index = load_index(store, config)?;
    let matcher = Matcher::new(config.matcher.clone());
    let mut sink = Sink::open(store, SourceKind::Recipe, config)?;
    let mut report = MatchReport {
        kind: Some(SourceKind::Recipe),
        vocabulary: index.len(),
        ..MatchReport::default()
    };

    for recipe in recipes {
        let recipe_id = recipe.id.to_string();
        let (mentions, records) = match_recipe(&matcher, &index, &recipe_id, recipe);
        tally(&mut report, mentions, records.len());
        sink.write(&recipe_id, records)?;
    }

    report.written = sink.finish()?;
    Ok(report)
}

fn match_recipe(
    matcher: &Matcher,
    index: &VocabularyIndex,
    recipe_id: &str,
    recipe: &RecipeInput,
) -> (usize, Vec<MatchRecord>) {
    let structured = recipe
        .ingredients_json()
        .and_then(|json| decode_ingredients_json(&json))
        .unwrap_or_default();
    let mentions = to_mentions(recipe_id, &structured);
    let records = matcher.match_mentions(&mentions, index);
    if !records.is_empty() {
        return (mentions.len(), records);
    }

    let raw = recipe
        .ingredients_raw
        .as_deref()
        .map(decode_ingredients_raw)
        .unwrap_or_default();
    let raw_mentions = to_mentions(recipe_id, &raw);
    let records = matcher.match_mentions(&raw_mentions, index);
    (mentions.len() + raw_mentions.len(), records)
}

/// Map distinct product ingredient tags onto the vocabulary.
pub fn link_tags<S>(store: &S, products: &[ProductInput], config: &RunConfig) -> Result<MatchReport>
where
    S: MatchStore + IngredientStore + ?Sized,
{
    let index = load_index(store, config)?;
    let matcher = Matcher::new(config.matcher.clone());

    let tags: BTreeSet<String> = products
        .iter()
        .flat_map(|product| {
            split_tags(&product.ingredients_tags.joined())
                .into_iter()
                .filter(|tag| tag.chars().count() >= MIN_TAG_LEN)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    let mentions: Vec<Mention> = tags
        .iter()
        .map(|tag| Mention::new(SourceKind::Tag, tag.as_str(), tag.as_str()))
        .collect();

    let records = matcher.match_mentions(&mentions, &index);
    let record_count = records.len();

    // Every distinct tag is written, including tags with no match.
    let mut by_tag: BTreeMap<&str, Vec<MatchRecord>> =
        tags.iter().map(|tag| (tag.as_str(), Vec::new())).collect();
    for record in records {
        if let Some(linked) = by_tag.get_mut(record.source_id.as_str()) {
            linked.push(record);
        }
    }

    let mut report = MatchReport {
        kind: Some(SourceKind::Tag),
        vocabulary: index.len(),
        sources: tags.len(),
        mentions: mentions.len(),
        records: record_count,
        ..MatchReport::default()
    };
    report.matched_sources = by_tag.values().filter(|linked| !linked.is_empty()).count();

    let mut sink = Sink::open(store, SourceKind::Tag, config)?;
    for (tag, linked) in by_tag {
        sink.write(tag, linked)?;
    }
    report.written = sink.finish()?;
    Ok(report)
}

fn tally(report: &mut MatchReport, mentions: usize, records: usize) {
    report.sources += 1;
    report.mentions += mentions;
    report.records += records;
    if records > 0 {
        report.matched_sources += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::{MatchMethod, MatcherConfig, MemoryStore};

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        let names: Vec<String> = ["Sucre", "Lait entier", "Huile de palme", "Ail", "Tomate"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        store.insert_ingredients(&names, "marmiton").unwrap();
        store
    }

    fn config(defaults: CommandDefaults, mode: WriteMode) -> RunConfig {
        RunConfig {
            matcher: MatcherConfig::for_policy(defaults.policy),
            style: defaults.style,
            mode,
            batch_size: 2,
            vocabulary_source: None,
        }
    }

    fn products() -> Vec<ProductInput> {
        serde_json::from_str(
            r#"[
                {"code": "p1", "ingredients_tags": "en:sucre,fr:huile-de-palme,lait"},
                {"code": "p2", "ingredients_tags": ["en:sucre", "en:sucre", "noisettes"]},
                {"code": "p3", "ingredients_tags": ""}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_match_products() {
        let store = store();
        let report =
            match_products(&store, &products(), &config(PRODUCT_DEFAULTS, WriteMode::Append))
                .unwrap();

        assert_eq!(report.sources, 3);
        assert_eq!(report.matched_sources, 2);
        assert_eq!(report.mentions, 6);
        assert_eq!(report.records, 5);
        // p2 lists en:sucre twice; the repeat falls into the next batch and
        // the store ignores it.
        assert_eq!(report.written.committed, 4);
        assert_eq!(report.written.ignored, 1);
        assert_eq!(report.written.duplicates, 0);

        let stored = store.matches().unwrap();
        let lait = stored.iter().find(|r| r.mention == "lait").unwrap();
        assert_eq!(lait.ingredient_id, 2);
        assert_eq!(lait.method, MatchMethod::Partial);
    }

    #[test]
    fn test_rerun_modes_do_not_duplicate() {
        let store = store();
        for mode in [
            WriteMode::Append,
            WriteMode::Rebuild,
            WriteMode::Replace,
            WriteMode::Upsert,
        ] {
            match_products(&store, &products(), &config(PRODUCT_DEFAULTS, mode)).unwrap();
            assert_eq!(store.matches().unwrap().len(), 4, "{:?}", mode);
        }
    }

    #[test]
    fn test_default_mode_drops_stale_links_on_rerun() {
        let store = store();
        let cfg = config(PRODUCT_DEFAULTS, WriteMode::default());
        assert_eq!(cfg.mode, WriteMode::Rebuild);

        let first: Vec<ProductInput> =
            serde_json::from_str(r#"[{"code": "p1", "ingredients_tags": "en:sucre"}]"#).unwrap();
        match_products(&store, &first, &cfg).unwrap();

        let changed: Vec<ProductInput> =
            serde_json::from_str(r#"[{"code": "p1", "ingredients_tags": "en:eau"}]"#).unwrap();
        let report = match_products(&store, &changed, &cfg).unwrap();
        assert_eq!(report.records, 0);
        assert!(store.matches().unwrap().is_empty());
    }

    #[test]
    fn test_replace_clears_stale_entity() {
        let store = store();
        let cfg = config(PRODUCT_DEFAULTS, WriteMode::Replace);
        match_products(&store, &products(), &cfg).unwrap();

        let changed: Vec<ProductInput> =
            serde_json::from_str(r#"[{"code": "p1", "ingredients_tags": "en:tomate"}]"#).unwrap();
        match_products(&store, &changed, &cfg).unwrap();

        let p1: Vec<i32> = store
            .matches()
            .unwrap()
            .into_iter()
            .filter(|r| r.source_id == "p1")
            .map(|r| r.ingredient_id)
            .collect();
        assert_eq!(p1, vec![5]);
    }

    #[test]
    fn test_recipe_raw_fallback() {
        let store = store();
        let recipes: Vec<RecipeInput> = serde_json::from_str(
            r#"[
                {"id": 1, "ingredients_json": "[{\"name\": \"du sucre\"}]", "ingredients_raw": "3 gousses d'ail"},
                {"id": 2, "ingredients_json": "[{\"name\": \"farine\"}]", "ingredients_raw": "3 gousses d'ail"},
                {"id": 3, "ingredients_raw": "1 boîte de tomate | sel"}
            ]"#,
        )
        .unwrap();

        let report =
            match_recipes(&store, &recipes, &config(RECIPE_DEFAULTS, WriteMode::Append)).unwrap();
        assert_eq!(report.matched_sources, 3);

        let stored = store.matches().unwrap();
        let by_recipe: Vec<(&str, i32)> = stored
            .iter()
            .map(|r| (r.source_id.as_str(), r.ingredient_id))
            .collect();
        // Recipe 1 matched from JSON, so its raw list is never read.
        assert_eq!(by_recipe, vec![("1", 1), ("2", 4), ("3", 5)]);
    }

    #[test]
    fn test_link_tags() {
        let store = store();
        let report = link_tags(&store, &products(), &config(TAG_DEFAULTS, WriteMode::Upsert))
            .unwrap();

        // Distinct tags: en:sucre, fr:huile-de-palme, lait, noisettes.
        assert_eq!(report.mentions, 4);
        let stored = store.matches().unwrap();
        assert!(stored.iter().all(|r| r.kind == SourceKind::Tag));
        let sucre = stored.iter().find(|r| r.source_id == "en:sucre").unwrap();
        assert_eq!(sucre.ingredient_id, 1);
        assert_eq!(sucre.score, 1.0);
    }

    #[test]
    fn test_link_tags_replace_clears_tags_that_stop_matching() {
        let store = store();
        let products: Vec<ProductInput> = serde_json::from_str(
            r#"[{"code": "p1", "ingredients_tags": "en:sucre,en:sucre-roux"}]"#,
        )
        .unwrap();

        let mut cfg = config(TAG_DEFAULTS, WriteMode::Replace);
        let first = link_tags(&store, &products, &cfg).unwrap();
        assert_eq!(first.matched_sources, 2);
        let roux = store
            .matches()
            .unwrap()
            .into_iter()
            .find(|r| r.source_id == "en:sucre-roux")
            .unwrap();
        assert_eq!(roux.ingredient_id, 1);
        assert_eq!(roux.method, MatchMethod::Partial);

        cfg.matcher.exact_only = true;
        let rerun = link_tags(&store, &products, &cfg).unwrap();
        assert_eq!(rerun.records, 1);
        assert_eq!(rerun.sources, 2);

        let tags: Vec<String> = store
            .matches()
            .unwrap()
            .into_iter()
            .map(|r| r.source_id)
            .collect();
        assert_eq!(tags, vec!["en:sucre".to_string()]);
    }
}
