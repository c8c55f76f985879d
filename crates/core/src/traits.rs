use crate::{BackendError, PageChunk, ScoredPassage};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex {
    async fn upsert_chunks(
        &self,
        chunks: &[PageChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize, BackendError>;

    async fn query(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPassage>, BackendError>;
}
