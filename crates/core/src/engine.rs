use crate::embeddings::Embedder;
use crate::llm::ChatModel;
use crate::traits::VectorIndex;
use crate::{Answer, BackendError, ScoredPassage};

pub const DEFAULT_TOP_K: usize = 5;

pub const NO_MATCH_ANSWER: &str =
    "No relevant passages were found in the knowledge base for this question.";

pub struct QueryEngine<E, V, L>
where
    E: Embedder,
    V: VectorIndex,
    L: ChatModel,
{
    embedder: E,
    index: V,
    llm: L,
    top_k: usize,
}

impl<E, V, L> QueryEngine<E, V, L>
where
    E: Embedder + Send + Sync,
    V: VectorIndex + Send + Sync,
    L: ChatModel + Send + Sync,
{
    pub fn new(embedder: E, index: V, llm: L, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            llm,
            top_k: top_k.max(1),
        }
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, BackendError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(BackendError::Request("question is empty".to_string()));
        }

        let query_vector = self.embedder.embed_query(question).await?;
        let passages = self.index.query(&query_vector, self.top_k).await?;

        if passages.is_empty() {
            return Ok(Answer {
                question: question.to_string(),
                text: NO_MATCH_ANSWER.to_string(),
                passages,
            });
        }

        let prompt = build_context_prompt(question, &passages);
        let text = self.llm.complete(&prompt).await?;

        Ok(Answer {
            question: question.to_string(),
            text,
            passages,
        })
    }
}

pub fn build_context_prompt(question: &str, passages: &[ScoredPassage]) -> String {
    let mut prompt = String::from(
        "You are a careful medical reference assistant. \
         Use only the context below to answer.\n\n\
         Context:\n---------------------\n",
    );

    for (position, passage) in passages.iter().enumerate() {
        let page = passage.page_label.as_deref().unwrap_or("N/A");
        prompt.push_str(&format!(
            "[source {}] {} (Page {})\n{}\n\n",
            position + 1,
            passage.file_name,
            page,
            passage.text.trim()
        ));
    }

    prompt.push_str(
        "---------------------\n\
         Given the context information and not prior knowledge, answer the question.\n\
         If the context does not contain the answer, say so plainly.\n\n\
         Question: ",
    );
    prompt.push_str(question);
    prompt.push_str("\nAnswer:");
    prompt
}
