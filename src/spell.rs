//! Spell correction fallback for zero-hit queries.
//!
//! Strictly opt-in. For each query token missing from the vocabulary, a
//! Levenshtein automaton (edit distance up to 2, with transpositions)
//! scans the vocabulary for the best replacement: smallest edit distance,
//! then highest document frequency, then lexicographic order for
//! determinism.

use crate::vectors::DfTable;
use levenshtein_automata::{Distance, LevenshteinAutomatonBuilder};
use std::collections::BTreeSet;

/// Maximum edit distance considered for corrections.
const MAX_EDIT_DISTANCE: u8 = 2;

/// Generates edit-distance candidates over the index vocabulary.
pub struct SpellChecker {
    builder: LevenshteinAutomatonBuilder,
}

impl SpellChecker {
    pub fn new() -> Self {
        Self {
            builder: LevenshteinAutomatonBuilder::new(MAX_EDIT_DISTANCE, true),
        }
    }

    /// Best in-vocabulary replacement for `token`, if any lies within the
    /// edit-distance bound.
    pub fn correct(&self, token: &str, vocabulary: &DfTable) -> Option<String> {
        let dfa = self.builder.build_dfa(token);

        let mut best: Option<(u8, u32, &str)> = None;
        for (word, df) in &vocabulary.entries {
            let Distance::Exact(distance) = dfa.eval(word) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((best_distance, best_df, best_word)) => {
                    distance < *best_distance
                        || (distance == *best_distance && *df > *best_df)
                        || (distance == *best_distance
                            && *df == *best_df
                            && word.as_str() < *best_word)
                }
            };
            if better {
                best = Some((distance, *df, word));
            }
        }
        best.map(|(_, _, word)| word.to_string())
    }

    /// Correct every out-of-vocabulary token in a query.
    ///
    /// Returns `None` when nothing changed (no correction exists, or every
    /// token was already known), so the caller can skip the retry.
    pub fn correct_query(
        &self,
        query_tokens: &BTreeSet<String>,
        vocabulary: &DfTable,
    ) -> Option<BTreeSet<String>> {
        let mut corrected = BTreeSet::new();
        let mut changed = false;

        for token in query_tokens {
            if vocabulary.ord_of(token).is_some() {
                corrected.insert(token.clone());
                continue;
            }
            match self.correct(token, vocabulary) {
                Some(replacement) => {
                    changed = true;
                    corrected.insert(replacement);
                }
                None => {
                    corrected.insert(token.clone());
                }
            }
        }

        changed.then_some(corrected)
    }
}

impl Default for SpellChecker {
    fn default() -> Self {
        Self::new()
    }
}
