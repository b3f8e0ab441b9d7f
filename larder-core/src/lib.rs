pub mod config;
pub mod discovery;
pub mod error;
pub mod ingredient_parser;
pub mod matcher;
pub mod mentions;
pub mod normalize;
pub mod store;
pub mod types;
pub mod usability;
pub mod vocabulary;

pub use config::{batch_size_from_env, ConfigError, MatcherConfig, ScoringPolicy};
pub use discovery::{collect_new_names, grow_vocabulary, rank_by_frequency, NameFrequency};
pub use error::StoreError;
pub use ingredient_parser::{parse_ingredient, parse_ingredients, ParsedIngredientMention};
pub use matcher::{is_simple_ingredient, similarity, Matcher};
pub use mentions::{product_mentions, recipe_ingredients, recipe_mentions, split_tags};
pub use normalize::{normalize, normalize_for_linking, normalize_with, KeyStyle};
pub use store::{
    dedupe_records, IngredientStore, MatchStore, MatchWriter, MemoryStore, WriteSummary,
};
pub use types::{MatchMethod, MatchRecord, MatchSummary, Mention, Scope, SourceKind};
pub use usability::{KeywordSet, Usability};
pub use vocabulary::{Ingredient, VocabularyIndex};
