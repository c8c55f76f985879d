pub mod chat;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod stores;
pub mod traits;

pub use chat::{is_exit_command, render_answer, run_chat_loop, ChatStats, EXIT_KEYWORDS};
pub use chunking::{build_page_chunks, chunk_page_text, normalize_whitespace, ChunkingConfig};
pub use config::{Config, EmbeddingSettings};
pub use embeddings::{Embedder, EmbeddingClient, OllamaEmbedder, OpenAiEmbedder};
pub use engine::{build_context_prompt, QueryEngine, DEFAULT_TOP_K, NO_MATCH_ANSWER};
pub use error::{BackendError, ConfigError, IngestError};
pub use extractor::{extract_page_texts, PageText, PdfExtractor};
pub use ingest::{
    discover_pdf_files, ingest_folder_best_effort, prepare_documents_folder, IngestionReport,
    SkippedPdf,
};
pub use llm::{ChatModel, GeminiClient};
pub use models::{
    dedupe_citations, Answer, ChunkingOptions, Citation, DocumentFingerprint, IndexDescription,
    IndexSpec, Metric, MismatchPolicy, PageChunk, ScoredPassage,
};
pub use stores::{PineconeClient, PineconeIndex};
pub use traits::VectorIndex;
