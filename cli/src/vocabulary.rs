//! Vocabulary commands: loading a scraped ingredient list and discovering
//! new names from recipes.

use anyhow::Result;
use larder_core::discovery::DEFAULT_MIN_NAME_LEN;
use larder_core::{
    collect_new_names, grow_vocabulary, rank_by_frequency, recipe_ingredients, IngredientStore,
    KeyStyle, NameFrequency, VocabularyIndex,
};
use serde::Serialize;

use crate::input::{IngredientInput, RecipeInput};

#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    pub entries: usize,
    pub inserted: usize,
    pub images: usize,
}

/// Insert vocabulary entries in one batch, then backfill missing images.
pub fn load_vocabulary<S>(
    store: &S,
    entries: &[IngredientInput],
    source: &str,
) -> Result<LoadReport>
where
    S: IngredientStore + ?Sized,
{
    let names: Vec<String> = entries.iter().map(|entry| entry.name.clone()).collect();
    let inserted = store.insert_ingredients(&names, source)?;

    let mut images = 0;
    for entry in entries {
        if let Some(url) = entry.image_url.as_deref().filter(|url| !url.is_empty()) {
            if store.backfill_image_url(&entry.name, url)? {
                images += 1;
            }
        }
    }

    tracing::info!(entries = entries.len(), inserted, images, source, "loaded vocabulary");
    Ok(LoadReport {
        entries: entries.len(),
        inserted,
        images,
    })
}

#[derive(Debug, Default, Serialize)]
pub struct DiscoverReport {
    pub recipes: usize,
    pub names: usize,
    pub ranked: Vec<NameFrequency>,
    pub new_names: Vec<String>,
    pub inserted: usize,
    pub vocabulary: usize,
}

/// Add the most frequent recipe ingredient names missing from the vocabulary.
pub fn discover<S>(
    store: &S,
    recipes: &[RecipeInput],
    source: &str,
    top: usize,
) -> Result<DiscoverReport>
where
    S: IngredientStore + ?Sized,
{
    let names: Vec<String> = recipes
        .iter()
        .flat_map(|recipe| {
            recipe_ingredients(
                recipe.ingredients_json().as_deref(),
                recipe.ingredients_raw.as_deref(),
            )
        })
        .map(|parsed| parsed.name)
        .collect();

    let ranked = rank_by_frequency(names.iter().map(String::as_str), top, DEFAULT_MIN_NAME_LEN);

    let rows = store.load_vocabulary(None)?;
    let index = VocabularyIndex::from_ingredients(&rows, KeyStyle::Linking);
    let new_names = collect_new_names(ranked.iter().map(|n| n.name.as_str()), &index);
    let (rebuilt, inserted) = grow_vocabulary(store, &index, &new_names, source, None)?;

    Ok(DiscoverReport {
        recipes: recipes.len(),
        names: names.len(),
        ranked,
        new_names,
        inserted,
        vocabulary: rebuilt.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::MemoryStore;

    #[test]
    fn test_load_vocabulary_with_images() {
        let store = MemoryStore::new();
        let entries: Vec<IngredientInput> = serde_json::from_str(
            r#"[
                {"name": "Tomate", "image_url": "https://img/tomate.jpg"},
                {"name": "tomate"},
                {"name": "Basilic", "image_url": ""}
            ]"#,
        )
        .unwrap();

        let report = load_vocabulary(&store, &entries, "marmiton").unwrap();
        assert_eq!(report.entries, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.images, 1);

        // Loading again inserts nothing and keeps the first image.
        let again = load_vocabulary(&store, &entries, "marmiton").unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.images, 0);
    }

    #[test]
    fn test_discover_adds_frequent_names() {
        let store = MemoryStore::new();
        store
            .insert_ingredients(&["Tomate".to_string()], "marmiton")
            .unwrap();

        let recipes: Vec<RecipeInput> = serde_json::from_str(
            r#"[
                {"id": 1, "ingredients_raw": "1 tomate | 2 oignons | sel"},
                {"id": 2, "ingredients_json": "[{\"name\": \"Tomate\"}, {\"name\": \"oignons\"}]"},
                {"id": 3, "ingredients_raw": "1 pincée de sel | 1 kg de tomate"}
            ]"#,
        )
        .unwrap();

        let report = discover(&store, &recipes, "marmiton_recipe", 2).unwrap();
        assert_eq!(report.names, 7);
        // oignons and sel tie at 2; the tie goes to the name that sorts first.
        let ranked: Vec<&str> = report.ranked.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(ranked, vec!["tomate", "oignons"]);
        assert_eq!(report.new_names, vec!["oignons"]);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.vocabulary, 2);
    }
}
