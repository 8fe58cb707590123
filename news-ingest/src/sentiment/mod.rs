//! Lexicon and rule based sentiment scoring.
//!
//! Each token's valence comes from a fixed lexicon and is adjusted by nearby
//! boosters and negations, capitalization and contrastive "but". The summed
//! valence is squashed into a compound score in [-1, 1].

use crate::types::Sentiment;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Word valences on a -4..=4 scale, booster increments and negation words,
/// all lowercase with straight apostrophes.
#[derive(Debug, Deserialize)]
struct Lexicon {
    valences: HashMap<String, f64>,
    boosters: HashMap<String, f64>,
    negations: HashSet<String>,
}

static LEXICON: Lazy<Lexicon> = Lazy::new(|| {
    let raw = include_str!("../../data/sentiment_lexicon.json");
    serde_json::from_str(raw).expect("valid sentiment lexicon")
});

const CAPS_INCREMENT: f64 = 0.733;
const NEGATION_SCALAR: f64 = -0.74;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
const QUESTION_INCREMENT: f64 = 0.18;
const QUESTION_CAP: f64 = 0.96;
const NORMALIZATION_ALPHA: f64 = 15.0;
const LOOKBACK: usize = 3;

/// Explicitly constructed and read-only once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SentimentAnalyzer {
    lexicon: &'static Lexicon,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self { lexicon: &LEXICON }
    }

    pub fn classify(&self, text: &str) -> Sentiment {
        Sentiment::from_compound(self.compound(text))
    }

    /// Compound polarity in [-1, 1], rounded to four decimals. Empty text scores 0.
    pub fn compound(&self, text: &str) -> f64 {
        let tokens: Vec<&str> = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return 0.0;
        }

        let lower: Vec<String> = tokens
            .iter()
            .map(|t| t.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'"))
            .collect();
        let shouting = tokens.iter().any(|t| is_all_caps(t)) && !tokens.iter().all(|t| is_all_caps(t));

        let mut valences: Vec<f64> = Vec::with_capacity(tokens.len());
        for (i, word) in lower.iter().enumerate() {
            if self.lexicon.boosters.contains_key(word.as_str()) {
                valences.push(0.0);
                continue;
            }
            let Some(&base) = self.lexicon.valences.get(word.as_str()) else {
                valences.push(0.0);
                continue;
            };

            let mut valence = base;
            if shouting && is_all_caps(tokens[i]) {
                valence += CAPS_INCREMENT * base.signum();
            }

            for distance in 1..=LOOKBACK.min(i) {
                let previous = lower[i - distance].as_str();
                if let Some(&boost) = self.lexicon.boosters.get(previous) {
                    let damping = match distance {
                        1 => 1.0,
                        2 => 0.95,
                        _ => 0.9,
                    };
                    valence += boost * base.signum() * damping;
                }
                if self.lexicon.negations.contains(previous) {
                    valence *= NEGATION_SCALAR;
                }
            }
            valences.push(valence);
        }

        if let Some(pivot) = lower.iter().position(|w| w == "but") {
            for (i, valence) in valences.iter_mut().enumerate() {
                if i < pivot {
                    *valence *= 0.5;
                } else if i > pivot {
                    *valence *= 1.5;
                }
            }
        }

        let mut sum: f64 = valences.iter().sum();
        if sum == 0.0 {
            return 0.0;
        }

        let emphasis = punctuation_emphasis(text);
        if sum > 0.0 {
            sum += emphasis;
        } else {
            sum -= emphasis;
        }

        let compound = (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0);
        (compound * 10_000.0).round() / 10_000.0
    }
}

fn is_all_caps(token: &str) -> bool {
    let letters: Vec<char> = token.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() > 1 && letters.iter().all(|c| c.is_uppercase())
}

fn punctuation_emphasis(text: &str) -> f64 {
    let exclamations = text.matches('!').count().min(MAX_EXCLAMATIONS) as f64 * EXCLAMATION_INCREMENT;
    let questions = text.matches('?').count();
    let question_emphasis = match questions {
        0 | 1 => 0.0,
        2..=3 => questions as f64 * QUESTION_INCREMENT,
        _ => QUESTION_CAP,
    };
    exclamations + question_emphasis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_detection() {
        assert!(is_all_caps("GREAT"));
        assert!(!is_all_caps("Great"));
        assert!(!is_all_caps("A"));
        assert!(!is_all_caps("2025"));
    }

    #[test]
    fn negation_flips_polarity() {
        let analyzer = SentimentAnalyzer::new();
        assert!(analyzer.compound("The results were good") > 0.0);
        assert!(analyzer.compound("The results were not good") < 0.0);
    }

    #[test]
    fn curly_apostrophe_negations_count() {
        let analyzer = SentimentAnalyzer::new();
        assert!(analyzer.compound("The talks didn\u{2019}t succeed") < 0.0);
        assert_eq!(
            analyzer.compound("The talks didn\u{2019}t succeed"),
            analyzer.compound("The talks didn't succeed")
        );
    }

    #[test]
    fn lexicon_loads() {
        assert!(LEXICON.valences.len() > 900);
        assert!(LEXICON.negations.contains("don't"));
        assert_eq!(LEXICON.boosters.get("very"), Some(&0.293));
    }

    #[test]
    fn boosters_and_exclamations_intensify() {
        let analyzer = SentimentAnalyzer::new();
        let plain = analyzer.compound("The launch was good");
        let boosted = analyzer.compound("The launch was very good");
        let shouted = analyzer.compound("The launch was very good!!");
        assert!(boosted > plain);
        assert!(shouted > boosted);
    }

    #[test]
    fn but_shifts_weight_to_second_clause() {
        let analyzer = SentimentAnalyzer::new();
        assert!(analyzer.compound("The food was good but the service was terrible") < 0.0);
    }
}
