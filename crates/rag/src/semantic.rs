use ragconf_core::cosine_similarity;

use crate::bm25::ScoredChunk;
use crate::store::IndexedChunk;

pub struct SemanticScorer {
    min_similarity: f64,
}

impl SemanticScorer {
    pub fn new(min_similarity: f64) -> Self {
        Self { min_similarity }
    }

    pub fn score<'a>(
        &self,
        query_vector: &[f32],
        population: &[&'a IndexedChunk],
    ) -> Vec<ScoredChunk<'a>> {
        population
            .iter()
            .filter_map(|chunk| {
                let score = cosine_similarity(query_vector, &chunk.chunk.vector);
                (score > self.min_similarity).then_some(ScoredChunk { chunk, score })
            })
            .collect()
    }
}

impl Default for SemanticScorer {
    fn default() -> Self {
        Self::new(0.1)
    }
}
