use std::collections::BTreeSet;

use ragconf_core::tokenize;

use crate::store::IndexedChunk;

#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a IndexedChunk,
    pub score: f64,
}

impl ScoredChunk<'_> {
    pub fn chunk_id(&self) -> &str {
        &self.chunk.chunk.chunk_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// `ln((N - df + 0.5) / (df + 0.5))`. Negative for terms in more than half the population.
pub fn idf(population: usize, document_frequency: usize) -> f64 {
    let n = population as f64;
    let df = document_frequency as f64;
    ((n - df + 0.5) / (df + 0.5)).ln()
}

pub fn term_score(idf: f64, tf: f64, chunk_len: f64, avg_len: f64, params: Bm25Params) -> f64 {
    let norm = params.k1 * (1.0 - params.b + params.b * chunk_len / avg_len);
    idf * tf * (params.k1 + 1.0) / (tf + norm)
}

pub struct Bm25Scorer {
    params: Bm25Params,
}

impl Bm25Scorer {
    pub fn new(params: Bm25Params) -> Self {
        Self { params }
    }

    /// Scores `population` against `query`; chunks scoring `<= 0` are dropped.
    /// Output keeps population order.
    pub fn score<'a>(&self, query: &str, population: &[&'a IndexedChunk]) -> Vec<ScoredChunk<'a>> {
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() || population.is_empty() {
            return Vec::new();
        }
        let n = population.len();
        let total_len: usize = population.iter().map(|c| c.term_count).sum();
        let avg_len = (total_len as f64 / n as f64).max(1.0);
        let idfs: Vec<(&str, f64)> = terms
            .iter()
            .map(|term| {
                let df = population
                    .iter()
                    .filter(|c| c.term_frequency(term) > 0)
                    .count();
                (term.as_str(), idf(n, df))
            })
            .collect();

        population
            .iter()
            .filter_map(|chunk| {
                let chunk_len = chunk.term_count as f64;
                let score: f64 = idfs
                    .iter()
                    .map(|(term, idf)| {
                        let tf = chunk.term_frequency(term) as f64;
                        if tf == 0.0 {
                            0.0
                        } else {
                            term_score(*idf, tf, chunk_len, avg_len, self.params)
                        }
                    })
                    .sum();
                (score > 0.0).then_some(ScoredChunk { chunk, score })
            })
            .collect()
    }
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Self::new(Bm25Params::default())
    }
}
