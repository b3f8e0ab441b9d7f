//! JSON input files.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Vocabulary entry: `{"name": "Tomate", "image_url": "..."}`.
#[derive(Debug, Deserialize)]
pub struct IngredientInput {
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Packaged-food product: `{"code": "...", "ingredients_tags": "en:sugar,en:salt"}`.
#[derive(Debug, Deserialize)]
pub struct ProductInput {
    pub code: String,
    #[serde(default)]
    pub ingredients_tags: TagList,
    #[serde(default)]
    pub ingredients_text: Option<String>,
}

/// Tags as one delimited string or as a JSON array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    List(Vec<String>),
    Joined(String),
}

impl Default for TagList {
    fn default() -> Self {
        TagList::Joined(String::new())
    }
}

impl TagList {
    /// Comma-joined form accepted by `split_tags`.
    pub fn joined(&self) -> String {
        match self {
            TagList::List(tags) => tags.join(","),
            TagList::Joined(tags) => tags.clone(),
        }
    }
}

impl ProductInput {
    /// Free text and tags together, for keyword scoring.
    pub fn all_ingredients(&self) -> String {
        format!(
            "{} {}",
            self.ingredients_text.as_deref().unwrap_or_default(),
            self.ingredients_tags.joined()
        )
    }
}

/// Recipe ids appear as numbers or strings depending on the export.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecipeId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipeId::Number(n) => write!(f, "{}", n),
            RecipeId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecipeInput {
    pub id: RecipeId,
    /// Encoded JSON string, or the array itself.
    #[serde(default)]
    pub ingredients_json: Option<Value>,
    #[serde(default)]
    pub ingredients_raw: Option<String>,
}

impl RecipeInput {
    /// The structured list as JSON text.
    pub fn ingredients_json(&self) -> Option<String> {
        match self.ingredients_json.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_tag_forms() {
        let products: Vec<ProductInput> = serde_json::from_str(
            r#"[
                {"code": "1", "ingredients_tags": "en:sugar,en:salt"},
                {"code": "2", "ingredients_tags": ["en:milk", "en:cocoa"], "ingredients_text": "Lait, cacao"},
                {"code": "3"}
            ]"#,
        )
        .unwrap();

        assert_eq!(products[0].ingredients_tags.joined(), "en:sugar,en:salt");
        assert_eq!(products[1].ingredients_tags.joined(), "en:milk,en:cocoa");
        assert_eq!(products[1].all_ingredients(), "Lait, cacao en:milk,en:cocoa");
        assert_eq!(products[2].ingredients_tags.joined(), "");
    }

    #[test]
    fn test_recipe_inputs() {
        let recipes: Vec<RecipeInput> = serde_json::from_str(
            r#"[
                {"id": 12, "ingredients_json": "[{\"name\": \"sel\"}]"},
                {"id": "abc", "ingredients_json": [{"name": "sucre"}], "ingredients_raw": "sucre"},
                {"id": 13, "ingredients_json": null}
            ]"#,
        )
        .unwrap();

        assert_eq!(recipes[0].id.to_string(), "12");
        assert_eq!(
            recipes[0].ingredients_json().as_deref(),
            Some(r#"[{"name": "sel"}]"#)
        );
        assert_eq!(recipes[1].id.to_string(), "abc");
        assert_eq!(
            recipes[1].ingredients_json().as_deref(),
            Some(r#"[{"name":"sucre"}]"#)
        );
        assert_eq!(recipes[2].ingredients_json(), None);
    }

    #[test]
    fn test_read_json_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{").unwrap();

        let err = read_json::<IngredientInput>(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
