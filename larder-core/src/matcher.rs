//! Links mentions to vocabulary ingredients.
//!
//! Each mention is normalized in the index's key style and looked up exactly.
//! When that fails, a fuzzy pass scores every candidate key and keeps the
//! best one above the configured threshold.

use std::collections::BTreeSet;

use crate::config::{MatcherConfig, ScoringPolicy};
use crate::normalize::normalize_with;
use crate::types::{MatchMethod, MatchRecord, Mention};
use crate::vocabulary::{Candidate, VocabularyIndex};

/// Score given to a substring containment match.
pub const CONTAINMENT_SCORE: f64 = 0.8;

/// Names longer than this many words are descriptions, not ingredients.
const MAX_SIMPLE_WORDS: usize = 3;

/// Fragments that mark a multi-word name as a description
/// ("filet de poulet", "tomates pelées en boîte").
const DESCRIPTOR_FRAGMENTS: &[&str] = &[
    "de ", "du ", "des ", "la ", "le ", "les ", "ou ", "et ", "au ", "aux ", "pour ", "avec ",
    "frais", "séché", "congelé", "surgelé", "pelé", "haché", "coupé", "râpé", "moulu", "entier",
    "boîte", "bocal", "sachet", "paquet", "taille", "moyenne", "moyen", "grosse", "gros",
    "facultatif", "optionnel", "choix", "préférence",
];

/// Similarity of two canonical keys in `[0, 1]`.
///
/// 1.0 for equal keys. When one key contains the other and the shorter one
/// has at least `min_substring_len` characters, at least
/// [`CONTAINMENT_SCORE`]. Otherwise the word-set Jaccard ratio.
pub fn similarity(a: &str, b: &str, min_substring_len: usize) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let overlap = word_overlap(a, b);
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if shorter.chars().count() >= min_substring_len && longer.contains(shorter) {
        return overlap.max(CONTAINMENT_SCORE);
    }
    overlap
}

/// Jaccard ratio of the whitespace-separated word sets.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let words_a: BTreeSet<&str> = a.split_whitespace().collect();
    let words_b: BTreeSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

/// Whether a vocabulary name is short and plain enough to fuzzy-match safely.
///
/// Rejects names under 3 characters, longer than 3 words, multi-word names
/// containing a French stopword or descriptor, and names without letters.
pub fn is_simple_ingredient(name: &str) -> bool {
    if name.chars().count() < 3 {
        return false;
    }
    let words = name.split_whitespace().count();
    if words > MAX_SIMPLE_WORDS {
        return false;
    }
    let lower = name.to_lowercase();
    if words > 1 && DESCRIPTOR_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        return false;
    }
    name.chars().any(char::is_alphabetic)
}

/// Stateless matcher over a [`VocabularyIndex`].
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Match every mention, in input order.
    ///
    /// Mentions without a usable key, or without an acceptable candidate,
    /// produce no record. Output is identical across runs for identical input.
    pub fn match_mentions(
        &self,
        mentions: &[Mention],
        index: &VocabularyIndex,
    ) -> Vec<MatchRecord> {
        let candidates = self.fuzzy_candidates(index);
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for mention in mentions {
            match self.match_with(mention, index, &candidates) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        tracing::debug!(
            mentions = mentions.len(),
            matched = records.len(),
            skipped,
            policy = self.config.policy.as_str(),
            "matched mentions"
        );
        records
    }

    /// Match a single mention.
    pub fn match_one(&self, mention: &Mention, index: &VocabularyIndex) -> Option<MatchRecord> {
        let candidates = self.fuzzy_candidates(index);
        self.match_with(mention, index, &candidates)
    }

    fn match_with(
        &self,
        mention: &Mention,
        index: &VocabularyIndex,
        candidates: &[&Candidate],
    ) -> Option<MatchRecord> {
        let key = normalize_with(&mention.text, index.style());
        if key.is_empty() {
            return None;
        }

        let record = |ingredient_id: i32, score: f64, method: MatchMethod| MatchRecord {
            kind: mention.kind,
            source_id: mention.source_id.clone(),
            ingredient_id,
            score,
            method,
            mention: mention.text.clone(),
        };

        if let Some(id) = index.get(&key) {
            return Some(record(id, 1.0, MatchMethod::Exact));
        }
        if self.config.exact_only {
            return None;
        }

        let (id, score) = self.best_candidate(&key, candidates)?;
        Some(record(id, score, MatchMethod::Partial))
    }

    /// Highest-scoring candidate strictly above the threshold. Ties keep the
    /// earliest candidate in scan order.
    fn best_candidate(&self, key: &str, candidates: &[&Candidate]) -> Option<(i32, f64)> {
        let mut best: Option<(i32, f64)> = None;
        for candidate in candidates {
            let score = similarity(key, &candidate.key, self.config.min_substring_len);
            if score <= 0.0 || score <= self.config.threshold {
                continue;
            }
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((candidate.id, score));
            }
        }
        best
    }

    /// The fuzzy scan set for this policy, in ascending id order.
    fn fuzzy_candidates<'a>(&self, index: &'a VocabularyIndex) -> Vec<&'a Candidate> {
        let filtered = index.candidates().iter().filter(|c| match self.config.policy {
            ScoringPolicy::Containment => true,
            ScoringPolicy::SimpleIngredient => is_simple_ingredient(&c.key),
        });
        match self.config.candidate_limit {
            Some(limit) => filtered.take(limit).collect(),
            None => filtered.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, KeyStyle};
    use crate::types::SourceKind;

    fn index() -> VocabularyIndex {
        VocabularyIndex::build(
            [
                (1, "tomate"),
                (2, "huile d'olive"),
                (3, "sel"),
                (4, "crème fraîche"),
                (5, "filet de poulet"),
                (6, "sucre"),
            ],
            KeyStyle::Tag,
        )
    }

    fn product(text: &str) -> Mention {
        Mention::new(SourceKind::Product, "3017620422003", text)
    }

    #[test]
    fn test_similarity_rules() {
        assert_eq!(similarity("sucre", "sucre", 4), 1.0);
        assert_eq!(similarity("sucre", "sucre de canne", 4), 0.8);
        assert_eq!(similarity("sel", "sel marin", 4), 0.5);
        assert_eq!(similarity("huile olive", "olive huile vierge", 4), 2.0 / 3.0);
        assert_eq!(similarity("beurre", "lait", 4), 0.0);
        assert_eq!(similarity("", "lait", 4), 0.0);
    }

    #[test]
    fn test_containment_never_below_overlap() {
        let pairs = [
            ("tomate", "tomate tomate"),
            ("sucre", "sucre de canne"),
            ("lait entier", "lait entier bio"),
            ("sel", "sel marin"),
            ("huile", "huile d'olive"),
        ];
        for (a, b) in pairs {
            assert!(
                similarity(a, b, 4) >= word_overlap(a, b),
                "{a:?} vs {b:?}"
            );
        }
    }

    #[test]
    fn test_exact_match() {
        let matcher = Matcher::default();
        let record = matcher.match_one(&product("en:tomate"), &index()).unwrap();
        assert_eq!(record.ingredient_id, 1);
        assert_eq!(record.score, 1.0);
        assert_eq!(record.method, MatchMethod::Exact);
        assert_eq!(record.mention, "en:tomate");
    }

    #[test]
    fn test_exact_whenever_keys_equal() {
        let matcher = Matcher::default();
        let idx = index();
        for name in ["Tomate", "HUILE D'OLIVE", "crème-fraîche", "fr:sel"] {
            assert!(
                idx.get(&normalize(name)).is_some(),
                "{name:?} should be in the index"
            );
            let record = matcher.match_one(&product(name), &idx).unwrap();
            assert_eq!(record.method, MatchMethod::Exact);
            assert_eq!(record.score, 1.0);
        }
    }

    #[test]
    fn test_partial_containment() {
        let matcher = Matcher::default();
        let record = matcher
            .match_one(&product("en:sucre-de-canne"), &index())
            .unwrap();
        assert_eq!(record.ingredient_id, 6);
        assert_eq!(record.score, 0.8);
        assert_eq!(record.method, MatchMethod::Partial);
    }

    #[test]
    fn test_short_substring_rejected() {
        let matcher = Matcher::default();
        // "sel" is shorter than the minimum, and overlap 0.5 is under 0.75.
        assert!(matcher.match_one(&product("sel marin"), &index()).is_none());
    }

    #[test]
    fn test_empty_mention_skipped() {
        let matcher = Matcher::default();
        assert!(matcher.match_one(&product("en:"), &index()).is_none());
        assert!(matcher.match_one(&product(" -- "), &index()).is_none());
    }

    #[test]
    fn test_empty_vocabulary() {
        let matcher = Matcher::default();
        let empty = VocabularyIndex::build(Vec::<(i32, &str)>::new(), KeyStyle::Tag);
        let records = matcher.match_mentions(&[product("tomate")], &empty);
        assert!(records.is_empty());
    }

    #[test]
    fn test_exact_only() {
        let config = MatcherConfig {
            exact_only: true,
            ..MatcherConfig::default()
        };
        let matcher = Matcher::new(config);
        assert!(matcher.match_one(&product("sucre de canne"), &index()).is_none());
        assert!(matcher.match_one(&product("sucre"), &index()).is_some());
    }

    #[test]
    fn test_tie_keeps_lowest_id() {
        let idx = VocabularyIndex::build([(9, "lait entier"), (2, "lait demi")], KeyStyle::Tag);
        let matcher = Matcher::new(MatcherConfig {
            threshold: 0.0,
            ..MatcherConfig::default()
        });
        let record = matcher.match_one(&product("lait"), &idx).unwrap();
        assert_eq!(record.ingredient_id, 2);
        assert_eq!(record.score, 0.8);
    }

    #[test]
    fn test_simple_ingredient_filter() {
        assert!(is_simple_ingredient("tomate"));
        assert!(is_simple_ingredient("sucre roux"));
        assert!(is_simple_ingredient("chocolat noir"));
        assert!(is_simple_ingredient("frais"));
        assert!(!is_simple_ingredient("persil frais"));
        // "huile " contains the "le " fragment.
        assert!(!is_simple_ingredient("huile d'olive"));
        assert!(!is_simple_ingredient("filet de poulet"));
        assert!(!is_simple_ingredient("tomates pelées en boîte"));
        assert!(!is_simple_ingredient("sel fin de table iodé"));
        assert!(!is_simple_ingredient("42"));
        assert!(!is_simple_ingredient("ab"));
        assert!(!is_simple_ingredient("123 456"));
    }

    #[test]
    fn test_simple_policy_skips_descriptive_names() {
        let matcher = Matcher::new(MatcherConfig::for_policy(ScoringPolicy::SimpleIngredient));
        // "filet de poulet" is excluded from the fuzzy scan.
        assert!(matcher.match_one(&product("poulet rôti"), &index()).is_none());
        // Overlap of 1/3 is accepted under the "any nonzero" threshold.
        let record = matcher.match_one(&product("crème épaisse"), &index()).unwrap();
        assert_eq!(record.ingredient_id, 4);
        assert_eq!(record.method, MatchMethod::Partial);
        assert!((record.score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_simple_policy_still_matches_exactly() {
        let matcher = Matcher::new(MatcherConfig::for_policy(ScoringPolicy::SimpleIngredient));
        let record = matcher.match_one(&product("filet de poulet"), &index()).unwrap();
        assert_eq!(record.ingredient_id, 5);
        assert_eq!(record.method, MatchMethod::Exact);
    }

    #[test]
    fn test_candidate_limit() {
        let matcher = Matcher::new(MatcherConfig {
            candidate_limit: Some(2),
            ..MatcherConfig::default()
        });
        // "sucre" has id 6 and falls outside the first two candidates.
        assert!(matcher.match_one(&product("sucre de canne"), &index()).is_none());
        let record = matcher.match_one(&product("tomate cerise"), &index()).unwrap();
        assert_eq!(record.ingredient_id, 1);
    }

    #[test]
    fn test_deterministic_output() {
        let matcher = Matcher::new(MatcherConfig::for_policy(ScoringPolicy::SimpleIngredient));
        let mentions: Vec<Mention> = [
            "en:tomate",
            "sucre de canne",
            "crème",
            "eau",
            "huile",
            "fr:sel",
        ]
        .iter()
        .map(|t| product(t))
        .collect();

        let first = matcher.match_mentions(&mentions, &index());
        for _ in 0..5 {
            assert_eq!(matcher.match_mentions(&mentions, &index()), first);
        }
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&matcher.match_mentions(&mentions, &index())).unwrap()
        );
    }
}
