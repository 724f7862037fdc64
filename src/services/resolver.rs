// src/services/resolver.rs

//! Fuzzy team name resolution.
//!
//! Users type team names from memory, so lookups go through a best-effort
//! correction step first. The resolver always returns a usable name and says
//! whether it substituted one.

use serde::Serialize;

/// Default minimum similarity for a substitution.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Outcome of resolving one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// The matched candidate, or the query itself when nothing was close enough
    pub name: String,
    /// True when `name` differs from the query
    pub was_fuzzy: bool,
}

impl Resolution {
    fn unchanged(query: &str) -> Self {
        Self {
            name: query.to_string(),
            was_fuzzy: false,
        }
    }
}

/// Similarity-ratio matcher over a candidate set.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyResolver {
    threshold: f64,
}

impl FuzzyResolver {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Similarity in `0.0..=1.0` (Sørensen-Dice over character bigrams,
    /// case-insensitive).
    pub fn similarity(a: &str, b: &str) -> f64 {
        strsim::sorensen_dice(&a.to_lowercase(), &b.to_lowercase())
    }

    fn score_lowered(query_lower: &str, candidate: &str) -> f64 {
        strsim::sorensen_dice(query_lower, &candidate.to_lowercase())
    }

    /// Map `query` to the closest candidate.
    ///
    /// Equal top scores go to the lexicographically smallest candidate.
    pub fn resolve<'a, I>(&self, query: &str, candidates: I) -> Resolution
    where
        I: IntoIterator<Item = &'a String>,
    {
        let query_lower = query.to_lowercase();
        let mut best: Option<(&String, f64)> = None;

        for candidate in candidates {
            if candidate == query {
                return Resolution::unchanged(query);
            }

            let score = Self::score_lowered(&query_lower, candidate);
            if score < self.threshold {
                continue;
            }

            best = match best {
                Some((current, current_score))
                    if current_score > score
                        || (current_score == score && current <= candidate) =>
                {
                    Some((current, current_score))
                }
                _ => Some((candidate, score)),
            };
        }

        match best {
            Some((name, score)) => {
                log::debug!("Resolved '{}' to '{}' (score {:.2})", query, name, score);
                Resolution {
                    name: name.clone(),
                    was_fuzzy: name != query,
                }
            }
            None => Resolution::unchanged(query),
        }
    }
}

impl Default for FuzzyResolver {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
