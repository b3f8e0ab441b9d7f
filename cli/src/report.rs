//! Read-only commands: product usability, match statistics and phrase parsing.

use anyhow::Result;
use larder_core::{
    parse_ingredient, IngredientStore, KeywordSet, MatchStore, MatchSummary,
    ParsedIngredientMention, SourceKind, Usability,
};
use serde::Serialize;

use crate::input::ProductInput;

#[derive(Debug, Serialize)]
pub struct UsableProduct {
    pub code: String,
    #[serde(flatten)]
    pub usability: Usability,
}

/// Products whose ingredient text mentions at least one vocabulary keyword.
pub fn usable_products<S>(
    store: &S,
    products: &[ProductInput],
    source: Option<&str>,
) -> Result<Vec<UsableProduct>>
where
    S: IngredientStore + ?Sized,
{
    let rows = store.load_vocabulary(source)?;
    let keywords = KeywordSet::from_names(rows.iter().map(|row| row.name.as_str()));
    if keywords.is_empty() {
        tracing::warn!(source, "no vocabulary keywords found");
        return Ok(Vec::new());
    }

    let usable: Vec<UsableProduct> = products
        .iter()
        .filter_map(|product| {
            keywords
                .score(&product.all_ingredients())
                .map(|usability| UsableProduct {
                    code: product.code.clone(),
                    usability,
                })
        })
        .collect();

    tracing::info!(
        products = products.len(),
        usable = usable.len(),
        keywords = keywords.len(),
        "scored products"
    );
    Ok(usable)
}

#[derive(Debug, Serialize)]
pub struct KindStats {
    pub kind: SourceKind,
    #[serde(flatten)]
    pub summary: MatchSummary,
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub vocabulary: usize,
    pub kinds: Vec<KindStats>,
}

pub fn stats<S>(store: &S) -> Result<Stats>
where
    S: MatchStore + IngredientStore + ?Sized,
{
    let vocabulary = store.load_vocabulary(None)?.len();
    let kinds = SourceKind::ALL
        .iter()
        .map(|&kind| {
            Ok(KindStats {
                kind,
                summary: store.summary(kind)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Stats { vocabulary, kinds })
}

/// Human-readable table of [`Stats`].
pub fn format_stats(stats: &Stats) -> String {
    let mut out = format!("Vocabulary: {} ingredients\n", stats.vocabulary);
    out.push_str(&format!(
        "{:<8} {:>8} {:>12} {:>8} {:>8} {:>8} {:>6}\n",
        "kind", "sources", "ingredients", "matches", "exact", "partial", "avg"
    ));
    for kind in &stats.kinds {
        let summary = &kind.summary;
        let average = summary
            .average_score
            .map(|score| format!("{:.2}", score))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<8} {:>8} {:>12} {:>8} {:>8} {:>8} {:>6}\n",
            kind.kind.as_str(),
            summary.sources,
            summary.ingredients,
            summary.matches,
            summary.exact,
            summary.partial,
            average
        ));
    }
    out
}

pub fn parse_phrases(phrases: &[String]) -> Vec<ParsedIngredientMention> {
    phrases.iter().map(|phrase| parse_ingredient(phrase)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::{MatchMethod, MatchRecord, MemoryStore};

    #[test]
    fn test_usable_products() {
        let store = MemoryStore::new();
        store
            .insert_ingredients(
                &["Sucre roux".to_string(), "Lait".to_string(), "Oeuf".to_string()],
                "marmiton",
            )
            .unwrap();
        let products: Vec<ProductInput> = serde_json::from_str(
            r#"[
                {"code": "1", "ingredients_text": "Sucre, lait écrémé"},
                {"code": "2", "ingredients_tags": "en:water"}
            ]"#,
        )
        .unwrap();

        let usable = usable_products(&store, &products, None).unwrap();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].code, "1");
        // "sucre" and "lait" out of "sucre", "roux", "lait", "oeuf"
        assert_eq!(usable[0].usability.matching, 2);
        assert_eq!(usable[0].usability.total, 4);
    }

    #[test]
    fn test_usable_without_vocabulary() {
        let store = MemoryStore::new();
        let products: Vec<ProductInput> =
            serde_json::from_str(r#"[{"code": "1", "ingredients_text": "sucre"}]"#).unwrap();
        assert!(usable_products(&store, &products, None).unwrap().is_empty());
    }

    #[test]
    fn test_stats_covers_every_kind() {
        let store = MemoryStore::new();
        store
            .insert_ingredients(&["Sucre".to_string()], "marmiton")
            .unwrap();
        store
            .insert_batch(&[MatchRecord {
                kind: SourceKind::Product,
                source_id: "p1".to_string(),
                ingredient_id: 1,
                score: 1.0,
                method: MatchMethod::Exact,
                mention: "en:sucre".to_string(),
            }])
            .unwrap();

        let stats = stats(&store).unwrap();
        assert_eq!(stats.vocabulary, 1);
        assert_eq!(stats.kinds.len(), 3);
        assert_eq!(stats.kinds[0].summary.matches, 1);

        let table = format_stats(&stats);
        assert!(table.contains("product"));
        assert!(table.contains("1.00"));
    }

    #[test]
    fn test_parse_phrases() {
        let parsed = parse_phrases(&["350 g de thon".to_string()]);
        assert_eq!(parsed[0].unit, "g");
        assert_eq!(parsed[0].name, "thon");
    }
}
