//! Flags products whose ingredient text mentions vocabulary keywords.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Keywords must be longer than this many characters.
const MIN_KEYWORD_LEN: usize = 2;

/// How much of the vocabulary a product's ingredient text covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usability {
    pub matching: usize,
    pub total: usize,
    /// `matching / total`.
    pub ratio: f64,
}

/// Lowercased words drawn from vocabulary names.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    keywords: BTreeSet<String>,
}

impl KeywordSet {
    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keywords = names
            .into_iter()
            .flat_map(|name| {
                name.to_lowercase()
                    .split_whitespace()
                    .filter(|word| word.chars().count() > MIN_KEYWORD_LEN)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        Self { keywords }
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Score the concatenated ingredient text and tags of one product.
    ///
    /// Keywords are matched as substrings of the lowercased text. Returns
    /// `None` when no keyword occurs.
    pub fn score(&self, text: &str) -> Option<Usability> {
        let text = text.to_lowercase();
        let matching = self
            .keywords
            .iter()
            .filter(|keyword| text.contains(keyword.as_str()))
            .count();
        if matching == 0 {
            return None;
        }

        let total = self.keywords.len();
        Some(Usability {
            matching,
            total,
            ratio: matching as f64 / total as f64,
        })
    }
}
