//! Term weighting formulas.

use crate::config::ranking::{BM25_B, BM25_K1, RRF_K};

/// Smoothed TF-IDF inverse document frequency.
#[must_use]
pub fn tfidf_idf(n_docs: usize, df: usize) -> f32 {
    ((1.0 + n_docs as f32) / (1.0 + df as f32)).ln() + 1.0
}

/// Sublinear document-side term weight.
#[must_use]
pub fn tfidf_weight(tf: f32, idf: f32) -> f32 {
    if tf <= 0.0 { 0.0 } else { (1.0 + tf.ln()) * idf }
}

/// BM25 inverse document frequency (always positive).
#[must_use]
pub fn bm25_idf(n_docs: usize, df: usize) -> f32 {
    let n = n_docs as f32;
    let df = df as f32;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// BM25 contribution of one term in one document.
#[must_use]
pub fn bm25_term(tf: f32, idf: f32, doc_len: f32, avg_doc_len: f32) -> f32 {
    if tf <= 0.0 {
        return 0.0;
    }
    let norm = if avg_doc_len > 0.0 { doc_len / avg_doc_len } else { 1.0 };
    idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm))
}

/// Reciprocal rank fusion over 1-based ranks.
#[must_use]
pub fn rrf(ranks: &[usize]) -> f32 {
    ranks.iter().map(|&r| 1.0 / (RRF_K + r as f32)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tfidf_idf_rare_terms_weigh_more() {
        assert!(tfidf_idf(100, 1) > tfidf_idf(100, 50));
        assert!((tfidf_idf(10, 10) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bm25_idf_positive_even_for_common_terms() {
        assert!(bm25_idf(10, 10) > 0.0);
        assert!(bm25_idf(10, 1) > bm25_idf(10, 9));
    }

    #[test]
    fn test_bm25_saturates() {
        let idf = 1.0;
        let one = bm25_term(1.0, idf, 100.0, 100.0);
        let ten = bm25_term(10.0, idf, 100.0, 100.0);
        let hundred = bm25_term(100.0, idf, 100.0, 100.0);
        assert!(ten > one);
        assert!(hundred - ten < ten - one);
        assert!(hundred < idf * (BM25_K1 + 1.0));
    }

    #[test]
    fn test_bm25_penalises_long_documents() {
        assert!(bm25_term(3.0, 1.0, 50.0, 100.0) > bm25_term(3.0, 1.0, 200.0, 100.0));
    }

    #[test]
    fn test_zero_tf_scores_zero() {
        assert_eq!(tfidf_weight(0.0, 2.0), 0.0);
        assert_eq!(bm25_term(0.0, 2.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn test_rrf() {
        let top = rrf(&[1, 1]);
        assert!((top - 2.0 / 61.0).abs() < 1e-6);
        assert!(rrf(&[1, 5]) > rrf(&[3, 4]));
    }
}
