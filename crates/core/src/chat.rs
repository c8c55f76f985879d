use crate::embeddings::Embedder;
use crate::engine::QueryEngine;
use crate::llm::ChatModel;
use crate::models::Answer;
use crate::traits::VectorIndex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const EXIT_KEYWORDS: [&str; 3] = ["exit", "quit", "q"];

const SOURCES_RULE: &str = "------------------------------\n";

pub fn is_exit_command(line: &str) -> bool {
    let trimmed = line.trim();
    EXIT_KEYWORDS
        .iter()
        .any(|keyword| trimmed.eq_ignore_ascii_case(keyword))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatStats {
    pub answered: usize,
    pub failed: usize,
}

pub fn render_answer(answer: &Answer) -> String {
    let mut block = format!("AI: {}\n", answer.text.trim());

    let citations = answer.citations();
    if !citations.is_empty() {
        block.push_str(SOURCES_RULE);
        block.push_str("Sources Used:\n");
        for citation in citations {
            block.push_str(&format!("  - {citation}\n"));
        }
        block.push_str(SOURCES_RULE);
    }

    block
}

pub async fn run_chat_loop<E, V, L, R, W>(
    engine: &QueryEngine<E, V, L>,
    mut input: R,
    mut output: W,
) -> std::io::Result<ChatStats>
where
    E: Embedder + Send + Sync,
    V: VectorIndex + Send + Sync,
    L: ChatModel + Send + Sync,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    let mut stats = ChatStats::default();

    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        line.clear();
        let read = input.read_line(&mut line).await?;
        if read == 0 {
            break;
        }

        let user_input = line.trim();
        if user_input.is_empty() {
            continue;
        }
        if is_exit_command(user_input) {
            output.write_all(b"Goodbye.\n").await?;
            break;
        }

        output.write_all(b"Thinking...\n").await?;
        output.flush().await?;

        // a failed turn is reported and the loop keeps going
        match engine.answer(user_input).await {
            Ok(answer) => {
                stats.answered += 1;
                output.write_all(render_answer(&answer).as_bytes()).await?;
            }
            Err(error) => {
                stats.failed += 1;
                output
                    .write_all(format!("error: {error}\n").as_bytes())
                    .await?;
            }
        }
    }

    output.flush().await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendError, PageChunk, ScoredPassage};
    use async_trait::async_trait;

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendError> {
            Ok(texts.iter().map(|_| vec![0.0, 1.0]).collect())
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, BackendError> {
            Ok(vec![0.0, 1.0])
        }
    }

    struct FakeIndex {
        hits: Vec<ScoredPassage>,
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn upsert_chunks(
            &self,
            chunks: &[PageChunk],
            _embeddings: &[Vec<f32>],
        ) -> Result<usize, BackendError> {
            Ok(chunks.len())
        }

        async fn query(
            &self,
            _query_vector: &[f32],
            _top_k: usize,
        ) -> Result<Vec<ScoredPassage>, BackendError> {
            Ok(self.hits.clone())
        }
    }

    struct FakeChatModel;

    #[async_trait]
    impl ChatModel for FakeChatModel {
        async fn complete(&self, _prompt: &str) -> Result<String, BackendError> {
            Ok("Take with food.".to_string())
        }
    }

    struct OfflineChatModel;

    #[async_trait]
    impl ChatModel for OfflineChatModel {
        async fn complete(&self, _prompt: &str) -> Result<String, BackendError> {
            Err(BackendError::Request("model offline".to_string()))
        }
    }

    fn one_hit() -> Vec<ScoredPassage> {
        vec![ScoredPassage {
            chunk_id: "chunk".to_string(),
            score: 0.9,
            file_name: "dosage-handbook.pdf".to_string(),
            page_label: Some("4".to_string()),
            text: "take with food".to_string(),
        }]
    }

    #[test]
    fn exit_keywords_match_case_insensitively_and_trimmed() {
        assert!(is_exit_command("q"));
        assert!(is_exit_command("Q"));
        assert!(is_exit_command(" EXIT "));
        assert!(is_exit_command("quit"));
        assert!(!is_exit_command("quit now"));
        assert!(!is_exit_command("hello"));
        assert!(!is_exit_command(""));
    }

    #[tokio::test]
    async fn loop_answers_then_stops_on_exit_keyword() {
        let engine = QueryEngine::new(
            FakeEmbedder,
            FakeIndex { hits: one_hit() },
            FakeChatModel,
            5,
        );
        let input: &[u8] = b"What should I take it with?\nexit\n";
        let mut output = Vec::new();

        let stats = run_chat_loop(&engine, input, &mut output).await.unwrap();

        assert_eq!(stats, ChatStats { answered: 1, failed: 0 });
        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("Thinking..."));
        assert!(transcript.contains("AI: Take with food."));
        assert!(transcript.contains("Sources Used:"));
        assert!(transcript.contains("  - dosage-handbook.pdf (Page 4)"));
        assert!(transcript.ends_with("Goodbye.\n"));
    }

    #[tokio::test]
    async fn failed_turns_are_reported_and_the_loop_survives() {
        let engine = QueryEngine::new(
            FakeEmbedder,
            FakeIndex { hits: one_hit() },
            OfflineChatModel,
            5,
        );
        let input: &[u8] = b"first question\nsecond question\nq\n";
        let mut output = Vec::new();

        let stats = run_chat_loop(&engine, input, &mut output).await.unwrap();

        assert_eq!(stats, ChatStats { answered: 0, failed: 2 });
        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches("error: request failed: model offline").count(), 2);
        assert!(transcript.ends_with("Goodbye.\n"));
    }

    #[tokio::test]
    async fn blank_lines_reprompt_and_eof_ends_the_loop() {
        let engine = QueryEngine::new(
            FakeEmbedder,
            FakeIndex { hits: one_hit() },
            FakeChatModel,
            5,
        );
        let input: &[u8] = b"\n   \n";
        let mut output = Vec::new();

        let stats = run_chat_loop(&engine, input, &mut output).await.unwrap();

        assert_eq!(stats, ChatStats::default());
        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches("You: ").count(), 3);
        assert!(!transcript.contains("Goodbye."));
    }

    #[test]
    fn rendering_omits_the_sources_block_without_citations() {
        let answer = Answer {
            question: "q".to_string(),
            text: "No relevant passages.".to_string(),
            passages: Vec::new(),
        };
        let block = render_answer(&answer);
        assert_eq!(block, "AI: No relevant passages.\n");
    }
}
