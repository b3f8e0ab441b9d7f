//! Ingredient parsing module.
//!
//! Parses raw recipe ingredient phrases (e.g., "2 cuillères à soupe de sauce")
//! into quantity, unit and name.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Parsed ingredient phrase.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedIngredientMention {
    /// Decimal with a `.` separator, or a literal fraction like "1/2". Empty if absent.
    pub quantity: String,
    /// Unit as written in the phrase. Empty if absent.
    pub unit: String,
    pub name: String,
    /// The untouched input.
    pub raw: String,
}

const NUMBER: &str = r"(\d+(?:[.,]\d+)?)";
const FRACTION: &str = r"(\d+/\d+)";
const BARE_UNIT: &str = r"([a-zéèêëàâçùûüôîïœæ]+)";

/// Closed set of French kitchen measures.
const COOKING_UNIT: &str = r"(cuill[eè]res?(?:\s+à\s+(?:soupe|café|thé))?|verres?|sachets?|bo[iî]tes?|boca(?:l|ux)|tranches?|gousses?|branches?|feuilles?|pincées?|poignées?|cubes?|noix)";

/// One pattern rule. Capture 1 is the quantity, capture 2 the unit when
/// `has_unit`, and the last capture the name.
struct Rule {
    regex: Regex,
    has_unit: bool,
}

impl Rule {
    fn new(pattern: &str, has_unit: bool) -> Self {
        let regex = Regex::new(&format!("(?i)^{}$", pattern)).expect("Invalid ingredient rule");
        Self { regex, has_unit }
    }
}

/// Rules in priority order; the first that matches wins.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        // "350 g de thon"
        Rule::new(&format!(r"{NUMBER}\s*{BARE_UNIT}\s+(?:de|d['’])\s+(.+)"), true),
        // "2 cuillères à soupe de sauce", "3 gousses d'ail"
        Rule::new(
            &format!(r"{NUMBER}\s+{COOKING_UNIT}\s+(?:de\s+|d['’]\s*)(.+)"),
            true,
        ),
        // "1/2 verre de lait"
        Rule::new(
            &format!(r"{FRACTION}\s+{COOKING_UNIT}\s+(?:de\s+|d['’]\s*)(.+)"),
            true,
        ),
        // "50 cl d'eau"
        Rule::new(&format!(r"{NUMBER}\s*{BARE_UNIT}\s+d['’]\s*(.+)"), true),
        // "2 oeufs"
        Rule::new(&format!(r"{NUMBER}\s+(.+)"), false),
        // "1/2 chou-fleur"
        Rule::new(&format!(r"{FRACTION}\s+(.+)"), false),
    ]
});

/// Parse a single ingredient phrase into structured data.
///
/// This does best-effort parsing - if no rule applies, the whole trimmed
/// text becomes the name with empty quantity and unit.
pub fn parse_ingredient(raw: &str) -> ParsedIngredientMention {
    let text = raw.trim();

    for rule in RULES.iter() {
        let Some(caps) = rule.regex.captures(text) else {
            continue;
        };
        let quantity = caps
            .get(1)
            .map(|m| m.as_str().replace(',', "."))
            .unwrap_or_default();
        let unit = if rule.has_unit {
            caps.get(2).map(|m| m.as_str().trim().to_string())
        } else {
            None
        };
        let name = caps
            .get(caps.len() - 1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        return ParsedIngredientMention {
            quantity,
            unit: unit.unwrap_or_default(),
            name,
            raw: raw.to_string(),
        };
    }

    ParsedIngredientMention {
        quantity: String::new(),
        unit: String::new(),
        name: text.to_string(),
        raw: raw.to_string(),
    }
}

/// Parse an ingredient list separated by newlines or `|`.
pub fn parse_ingredients(blob: &str) -> Vec<ParsedIngredientMention> {
    blob.split(['\n', '|'])
        .filter(|line| !line.trim().is_empty())
        .map(parse_ingredient)
        .collect()
}
