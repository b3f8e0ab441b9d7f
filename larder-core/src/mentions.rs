//! Turning raw product and recipe fields into mentions.

use serde_json::Value;

use crate::ingredient_parser::{parse_ingredient, ParsedIngredientMention};
use crate::types::{Mention, SourceKind};

/// Split a product ingredient-tag list ("en:sugar, en:cocoa-butter;fr:lait").
pub fn split_tags(tags: &str) -> Vec<&str> {
    tags.split([',', ';', '|'])
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// One mention per tag of a product.
pub fn product_mentions(code: &str, tags: &str) -> Vec<Mention> {
    split_tags(tags)
        .into_iter()
        .map(|tag| Mention::new(SourceKind::Product, code, tag))
        .collect()
}

/// Decode a structured ingredient list.
///
/// Accepts a JSON array of objects (`name`, `ingredient` or `nom` for the
/// name; `quantity`/`quantite`; `unit`/`unite`; `raw`) or of plain strings.
/// Returns `None` when the text is not a JSON array.
pub fn decode_ingredients_json(json: &str) -> Option<Vec<ParsedIngredientMention>> {
    let value: Value = serde_json::from_str(json).ok()?;
    let items = value.as_array()?;

    Some(items.iter().filter_map(decode_item).collect())
}

fn decode_item(item: &Value) -> Option<ParsedIngredientMention> {
    let parsed = match item {
        Value::Object(_) => {
            let name = first_field(item, &["name", "ingredient", "nom"]);
            let raw = first_field(item, &["raw"]);
            if name.is_empty() && !raw.is_empty() {
                parse_ingredient(&raw)
            } else {
                ParsedIngredientMention {
                    quantity: first_field(item, &["quantity", "quantite"]),
                    unit: first_field(item, &["unit", "unite"]),
                    raw: if raw.is_empty() { name.clone() } else { raw },
                    name,
                }
            }
        }
        Value::String(s) => parse_ingredient(s),
        _ => return None,
    };

    (!parsed.name.is_empty()).then_some(parsed)
}

/// First non-empty field among `names`, numbers rendered as text.
fn first_field(item: &Value, names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| match item.get(*name)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Parse a pipe-separated raw ingredient list.
pub fn decode_ingredients_raw(raw: &str) -> Vec<ParsedIngredientMention> {
    raw.split('|')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_ingredient)
        .filter(|parsed| !parsed.name.is_empty())
        .collect()
}

/// A recipe's ingredients: the structured list when it decodes to anything,
/// otherwise the raw list.
pub fn recipe_ingredients(
    ingredients_json: Option<&str>,
    ingredients_raw: Option<&str>,
) -> Vec<ParsedIngredientMention> {
    let structured = ingredients_json
        .filter(|json| !json.trim().is_empty())
        .and_then(decode_ingredients_json)
        .unwrap_or_default();
    if !structured.is_empty() {
        return structured;
    }
    ingredients_raw
        .map(decode_ingredients_raw)
        .unwrap_or_default()
}

/// Recipe mentions, one per ingredient name.
pub fn recipe_mentions(
    recipe_id: &str,
    ingredients_json: Option<&str>,
    ingredients_raw: Option<&str>,
) -> Vec<Mention> {
    to_mentions(
        recipe_id,
        &recipe_ingredients(ingredients_json, ingredients_raw),
    )
}

pub fn to_mentions(recipe_id: &str, ingredients: &[ParsedIngredientMention]) -> Vec<Mention> {
    ingredients
        .iter()
        .map(|parsed| Mention::new(SourceKind::Recipe, recipe_id, parsed.name.as_str()))
        .collect()
}
