//! Canonical keys for ingredient-bearing text.
//!
//! Every vocabulary name and every mention is reduced to a key before lookup.
//! Keys are lowercase, single-spaced and trimmed; an empty key means the text
//! cannot match anything.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Trailing "(...)" suffix, e.g. "tomates (bio)".
static TRAILING_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(.*?\)\s*$").expect("Invalid parenthetical regex"));

/// Trailing " - ..." suffix. Requires whitespace before the hyphen so that
/// compound names like "chou-fleur" are kept whole.
static TRAILING_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+-.*$").expect("Invalid dash suffix regex"));

/// Leading French articles dropped from recipe-side names.
const LEADING_ARTICLES: &[&str] = &[
    "d'", "d’", "l'", "l’", "de ", "du ", "des ", "la ", "le ", "les ", "un ", "une ",
];

/// Accented letters kept by linking keys, besides ASCII letters and digits.
const LINKING_ACCENTS: &str = "àâäéèêëïîôöùûüÿçæœ";

/// Which flavour of canonical key to compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStyle {
    /// Language prefix, case, separators and whitespace only.
    #[default]
    Tag,
    /// Tag style plus suffix stripping and punctuation removal. Used when
    /// linking vocabularies that come from different datasets.
    Linking,
    /// Tag style plus leading article removal ("de la crème" -> "crème").
    Recipe,
}

fn is_linking_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || c.is_whitespace()
        || LINKING_ACCENTS.contains(c)
}

/// Normalize text with the default [`KeyStyle::Tag`] rules.
pub fn normalize(text: &str) -> String {
    normalize_with(text, KeyStyle::Tag)
}

/// Normalize text for cross-dataset linking.
pub fn normalize_for_linking(text: &str) -> String {
    normalize_with(text, KeyStyle::Linking)
}

/// Compute the canonical key of `text` in the given style.
///
/// The result is idempotent: normalizing a key again returns it unchanged.
pub fn normalize_with(text: &str, style: KeyStyle) -> String {
    let mut s = text.to_lowercase();

    if style == KeyStyle::Linking {
        s = TRAILING_PAREN.replace(&s, "").into_owned();
        s = TRAILING_DASH.replace(&s, "").into_owned();
    }

    s = collapse_whitespace(&s.replace(['-', '_'], " "));
    s = strip_language_prefix(&s).trim().to_string();

    match style {
        KeyStyle::Tag => s,
        KeyStyle::Linking => {
            let kept: String = s.chars().filter(|&c| is_linking_char(c)).collect();
            collapse_whitespace(&kept)
        }
        KeyStyle::Recipe => {
            // Articles and a language prefix can uncover each other ("de en:x").
            loop {
                let next = strip_language_prefix(&strip_leading_articles(&s))
                    .trim()
                    .to_string();
                if next == s {
                    return s;
                }
                s = next;
            }
        }
    }
}

/// Strip a `lang:value` prefix such as `en:` or `fra:`.
///
/// Only applies when the text holds exactly one colon and the part before it
/// is two or three ASCII letters.
pub fn strip_language_prefix(text: &str) -> &str {
    let mut parts = text.splitn(2, ':');
    let (Some(prefix), Some(rest)) = (parts.next(), parts.next()) else {
        return text;
    };
    let is_lang =
        (2..=3).contains(&prefix.len()) && prefix.chars().all(|c| c.is_ascii_alphabetic());
    if is_lang && !rest.contains(':') {
        rest
    } else {
        text
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_leading_articles(s: &str) -> String {
    let mut current = s;
    loop {
        let stripped = LEADING_ARTICLES
            .iter()
            .find_map(|article| current.strip_prefix(article));
        match stripped {
            Some(rest) => current = rest.trim_start(),
            None => return current.to_string(),
        }
    }
}
