//! Extractive summarization.
//!
//! The primary strategy is latent semantic analysis: sentences are scored by
//! their weight across the latent topics of a term-sentence matrix and the
//! best ones are returned in document order. When it fails or produces
//! nothing, a naive "first N period-separated fragments" summary is used.

use crate::utils::{is_stop_word, text::words};
use std::collections::HashMap;
use tracing::debug;

/// Sentences requested when the caller does not say otherwise.
pub const DEFAULT_SENTENCES: usize = 3;

/// Only the leading sentences of a document are ranked. The eigen solve is
/// cubic in the sentence count.
pub const MAX_LSA_SENTENCES: usize = 60;

const MIN_DIMENSIONS: usize = 3;
const TF_SMOOTHING: f64 = 0.4;
const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SummarizeError {
    #[error("document has no sentences")]
    EmptyDocument,
    #[error("document has no significant terms")]
    NoTerms,
    #[error("eigen decomposition did not converge")]
    NoConvergence,
}

#[derive(Debug, Clone)]
pub struct Summarizer {
    /// Share of latent dimensions kept when ranking sentences.
    reduction_ratio: f64,
    max_sentences: usize,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self {
            reduction_ratio: 1.0,
            max_sentences: MAX_LSA_SENTENCES,
        }
    }
}

impl Summarizer {
    pub fn new(reduction_ratio: f64) -> Self {
        Self {
            reduction_ratio: reduction_ratio.clamp(f64::EPSILON, 1.0),
            ..Self::default()
        }
    }

    /// Limit how many leading sentences are ranked (at least one).
    pub fn with_max_sentences(mut self, max_sentences: usize) -> Self {
        self.max_sentences = max_sentences.max(1);
        self
    }

    /// Sentences handed to the ranking step: the first `max_sentences` of the text.
    pub fn candidate_sentences(&self, text: &str) -> Vec<String> {
        split_sentences_limited(text, self.max_sentences)
    }

    /// Summary of at most `sentences` sentences. Never fails.
    pub fn summarize(&self, text: &str, sentences: usize) -> String {
        match self.lsa_summarize(text, sentences) {
            Ok(summary) if !summary.trim().is_empty() => summary,
            Ok(_) => {
                debug!("LSA summary was blank, using fallback");
                fallback_summary(text, sentences)
            }
            Err(e) => {
                debug!("LSA summarization failed ({}), using fallback", e);
                fallback_summary(text, sentences)
            }
        }
    }

    pub fn lsa_summarize(&self, text: &str, count: usize) -> Result<String, SummarizeError> {
        let sentences = self.candidate_sentences(text);
        if sentences.is_empty() {
            return Err(SummarizeError::EmptyDocument);
        }
        if sentences.len() <= count {
            return Ok(sentences.join(" "));
        }

        let matrix = term_sentence_matrix(&sentences)?;
        let ranks = self.rank_sentences(&matrix, sentences.len())?;

        let mut order: Vec<usize> = (0..sentences.len()).collect();
        order.sort_by(|&a, &b| {
            ranks[b]
                .partial_cmp(&ranks[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        let mut chosen: Vec<usize> = order.into_iter().take(count).collect();
        chosen.sort_unstable();

        Ok(chosen
            .into_iter()
            .map(|i| sentences[i].as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Salience of each sentence: sqrt(sum over kept dimensions of sigma^2 * v^2).
    fn rank_sentences(&self, matrix: &[Vec<f64>], n_sentences: usize) -> Result<Vec<f64>, SummarizeError> {
        // A^T A is sentences x sentences; its eigenpairs give sigma^2 and V.
        let mut gram = vec![vec![0.0; n_sentences]; n_sentences];
        for i in 0..n_sentences {
            for j in i..n_sentences {
                let dot: f64 = matrix.iter().map(|row| row[i] * row[j]).sum();
                gram[i][j] = dot;
                gram[j][i] = dot;
            }
        }

        let (eigenvalues, eigenvectors) = jacobi_eigen(gram)?;

        let mut dims: Vec<usize> = (0..n_sentences).collect();
        dims.sort_by(|&a, &b| {
            eigenvalues[b]
                .partial_cmp(&eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let keep = ((n_sentences as f64 * self.reduction_ratio).ceil() as usize)
            .max(MIN_DIMENSIONS)
            .min(n_sentences);

        let ranks = (0..n_sentences)
            .map(|s| {
                dims.iter()
                    .take(keep)
                    .map(|&d| eigenvalues[d].max(0.0) * eigenvectors[s][d].powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();
        Ok(ranks)
    }
}

/// Naive summary: the first `sentences` period-separated fragments.
pub fn fallback_summary(text: &str, sentences: usize) -> String {
    let flattened = text.replace('\n', " ");
    let chunks: Vec<&str> = flattened
        .split('.')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .take(sentences)
        .collect();

    if chunks.is_empty() {
        String::new()
    } else {
        format!("{}.", chunks.join(". "))
    }
}

/// Split on terminal punctuation followed by whitespace, and on line breaks.
pub fn split_sentences(text: &str) -> Vec<String> {
    split_sentences_limited(text, usize::MAX)
}

/// Like [`split_sentences`] but stops scanning once `limit` sentences are found.
fn split_sentences_limited(text: &str, limit: usize) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if sentences.len() >= limit {
            return sentences;
        }
        if c == '\n' || c == '\r' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            // keep closing quotes and brackets with the sentence they end
            while let Some(&next) = chars.peek() {
                if matches!(next, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if chars.peek().map_or(true, |n| n.is_whitespace()) {
                push_sentence(&mut sentences, &mut current);
            }
        }
    }
    if sentences.len() < limit {
        push_sentence(&mut sentences, &mut current);
    }
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if trimmed.chars().any(char::is_alphanumeric) {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

/// Terms x sentences matrix of smoothed term frequencies.
fn term_sentence_matrix(sentences: &[String]) -> Result<Vec<Vec<f64>>, SummarizeError> {
    let mut vocabulary: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<HashMap<usize, f64>> = Vec::with_capacity(sentences.len());

    for sentence in sentences {
        let mut sentence_counts = HashMap::new();
        for word in words(sentence).filter(|w| !is_stop_word(w)) {
            let next_index = vocabulary.len();
            let index = *vocabulary.entry(word).or_insert(next_index);
            *sentence_counts.entry(index).or_insert(0.0) += 1.0;
        }
        counts.push(sentence_counts);
    }

    if vocabulary.is_empty() {
        return Err(SummarizeError::NoTerms);
    }

    let mut matrix = vec![vec![0.0; sentences.len()]; vocabulary.len()];
    for (col, sentence_counts) in counts.iter().enumerate() {
        let max_frequency = sentence_counts.values().cloned().fold(0.0, f64::max);
        if max_frequency == 0.0 {
            continue;
        }
        for row in matrix.iter_mut() {
            row[col] = TF_SMOOTHING;
        }
        for (&term, &count) in sentence_counts {
            matrix[term][col] = TF_SMOOTHING + (1.0 - TF_SMOOTHING) * count / max_frequency;
        }
    }
    Ok(matrix)
}

/// Cyclic Jacobi eigen decomposition of a symmetric matrix.
/// Returns eigenvalues and a matrix whose columns are the eigenvectors.
fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> Result<(Vec<f64>, Vec<Vec<f64>>), SummarizeError> {
    let n = a.len();
    let mut v = vec![vec![0.0; n]; n];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    let scale: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().max(1.0);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off_diagonal: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off_diagonal <= JACOBI_EPSILON * scale {
            let eigenvalues = (0..n).map(|i| a[i][i]).collect();
            return Ok((eigenvalues, v));
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q].abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[k][p];
                    let akq = a[k][q];
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p][k];
                    let aqk = a[q][k];
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let vkp = row[p];
                    let vkq = row[q];
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(SummarizeError::NoConvergence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jacobi_recovers_known_eigenvalues() {
        let (mut values, _) = jacobi_eigen(vec![vec![2.0, 1.0], vec![1.0, 2.0]]).unwrap();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((values[0] - 1.0).abs() < 1e-6);
        assert!((values[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn splits_on_terminal_punctuation_and_newlines() {
        let sentences = split_sentences("Markets rallied. Was it real? She said \"yes.\" Then\nNew paragraph 3.5 percent");
        assert_eq!(
            sentences,
            vec![
                "Markets rallied.",
                "Was it real?",
                "She said \"yes.\"",
                "Then",
                "New paragraph 3.5 percent",
            ]
        );
    }

    #[test]
    fn sentence_scan_stops_at_limit() {
        let text = "One. Two. Three. Four.";
        assert_eq!(split_sentences_limited(text, 2), vec!["One.", "Two."]);
        assert_eq!(split_sentences_limited(text, 10).len(), 4);
    }

    #[test]
    fn stop_words_only_is_no_terms() {
        let matrix = term_sentence_matrix(&["The and the.".to_string()]);
        assert_eq!(matrix.unwrap_err(), SummarizeError::NoTerms);
    }
}
