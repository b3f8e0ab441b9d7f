use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of entity a mention (and its matches) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A packaged-food product, keyed by its barcode.
    Product,
    /// A scraped recipe, keyed by its id.
    Recipe,
    /// A product ingredient tag mapped onto the recipe vocabulary.
    Tag,
}

impl SourceKind {
    pub const ALL: &'static [SourceKind] =
        &[SourceKind::Product, SourceKind::Recipe, SourceKind::Tag];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Product => "product",
            SourceKind::Recipe => "recipe",
            SourceKind::Tag => "tag",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "product" => Some(SourceKind::Product),
            "recipe" => Some(SourceKind::Recipe),
            "tag" => Some(SourceKind::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a match was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Partial,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Exact => "exact",
            MatchMethod::Partial => "partial",
        }
    }

    /// Parse a stored method name. "fuzzy" is accepted as an alias of partial.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(MatchMethod::Exact),
            "partial" | "fuzzy" => Some(MatchMethod::Partial),
            _ => None,
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of ingredient-bearing text attached to a source entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub kind: SourceKind,
    pub source_id: String,
    pub text: String,
}

impl Mention {
    pub fn new(kind: SourceKind, source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// Link between a source entity and a vocabulary ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub kind: SourceKind,
    pub source_id: String,
    pub ingredient_id: i32,
    /// In `[0, 1]`; exact matches always score 1.0.
    pub score: f64,
    pub method: MatchMethod,
    /// The mention text that produced this record.
    pub mention: String,
}

impl MatchRecord {
    /// Uniqueness key: one record per (kind, source, ingredient).
    pub fn key(&self) -> (SourceKind, &str, i32) {
        (self.kind, self.source_id.as_str(), self.ingredient_id)
    }
}

/// The unit of clear-and-replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    /// Every record of one source entity.
    Entity { kind: SourceKind, source_id: String },
    /// Every record of one kind (a full rebuild).
    Run { kind: SourceKind },
}

impl Scope {
    pub fn entity(kind: SourceKind, source_id: impl Into<String>) -> Self {
        Scope::Entity {
            kind,
            source_id: source_id.into(),
        }
    }

    pub fn run(kind: SourceKind) -> Self {
        Scope::Run { kind }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Scope::Entity { kind, .. } | Scope::Run { kind } => *kind,
        }
    }

    /// Whether `record` belongs to this scope.
    pub fn contains(&self, record: &MatchRecord) -> bool {
        match self {
            Scope::Entity { kind, source_id } => {
                record.kind == *kind && record.source_id == *source_id
            }
            Scope::Run { kind } => record.kind == *kind,
        }
    }
}

/// Aggregate figures over the stored matches of one kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub sources: usize,
    pub ingredients: usize,
    pub matches: usize,
    pub exact: usize,
    pub partial: usize,
    pub average_score: Option<f64>,
}
