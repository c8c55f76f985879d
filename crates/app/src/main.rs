use chrono::Utc;
use clap::{Parser, Subcommand};
use medkb_core::{
    ingest_folder_best_effort, prepare_documents_folder, run_chat_loop, BackendError,
    ChunkingOptions, Config, Embedder, EmbeddingClient, GeminiClient, IndexSpec, Metric,
    MismatchPolicy, PineconeClient, PineconeIndex, QueryEngine,
};
use std::path::Path;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "medkb", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vector index name
    #[arg(long, env = "MEDKB_INDEX", default_value = "medical-knowledge-base")]
    index: String,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PDF folder and upsert page chunks into the vector index.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long, default_value = "./medical_pdfs")]
        folder: String,
        /// Drop and rebuild the index when its dimensionality does not match
        /// the embedding model. Destroys every stored vector.
        #[arg(long, default_value_t = false)]
        recreate_index: bool,
    },
    /// Ask a single question and print the answer with evidence excerpts.
    Ask {
        /// Question text
        #[arg(long)]
        question: String,
        /// Number of passages to retrieve.
        #[arg(long, default_value = "3")]
        top_k: usize,
    },
    /// Chat with the knowledge base until an exit keyword is typed.
    Chat {
        /// Number of passages to retrieve per turn.
        #[arg(long, default_value_t = medkb_core::DEFAULT_TOP_K)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let embedder = EmbeddingClient::from_settings(&config.embedding)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let pinecone = PineconeClient::new(&config.pinecone_api_url, &config.pinecone_api_key)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    info!(
        version = app_version,
        index = %cli.index,
        started_at = %Utc::now().to_rfc3339(),
        "medkb boot"
    );

    match cli.command {
        Command::Ingest {
            folder,
            recreate_index,
        } => {
            let folder_path = Path::new(&folder);
            if prepare_documents_folder(folder_path)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?
            {
                println!("Created {folder}. Add PDF documents and run ingest again.");
                return Ok(());
            }

            let report = ingest_folder_best_effort(folder_path, ChunkingOptions::default())
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if !report.skipped_files.is_empty() {
                warn!(
                    "skipped_files={} for folder={}",
                    report.skipped_files.len(),
                    folder
                );
                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
            }

            if report.chunks.is_empty() {
                anyhow::bail!("no readable pdf documents in {folder} (all files were skipped)");
            }

            info!(
                folder = %folder,
                documents = report.documents.len(),
                pages = report.pages,
                chunk_count = report.chunks.len(),
                "extracted page chunks"
            );

            let spec = IndexSpec {
                name: cli.index.clone(),
                dimension: embedder.dimensions(),
                metric: Metric::Cosine,
            };
            let policy = if recreate_index {
                MismatchPolicy::Recreate
            } else {
                MismatchPolicy::Fail
            };
            let index = match pinecone.ensure_index(&spec, policy).await {
                Ok(index) => index,
                Err(error @ BackendError::DimensionMismatch { .. }) => {
                    anyhow::bail!("{error}; rerun with --recreate-index to drop and rebuild it")
                }
                Err(error) => return Err(anyhow::anyhow!(error.to_string())),
            };

            let texts: Vec<String> = report
                .chunks
                .iter()
                .map(|chunk| chunk.text.clone())
                .collect();
            info!(chunk_count = texts.len(), "embedding chunks");
            let embeddings = embedder
                .embed_documents(&texts)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let upserted = index
                .upsert_chunks(&report.chunks, &embeddings)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "{} chunks from {} documents upserted into {} at {}",
                upserted,
                report.documents.len(),
                cli.index,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { question, top_k } => {
            let index = open_index_or_hint(&pinecone, &cli.index, embedder.dimensions()).await?;
            let gemini =
                GeminiClient::new(&config.gemini_api_url, &config.google_api_key, &config.gemini_model)
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let engine = QueryEngine::new(embedder, index, gemini, top_k);

            let answer = engine
                .answer(&question)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("Answer: {}", answer.text.trim());
            if !answer.passages.is_empty() {
                println!();
                println!("--- Citations (Evidence) ---");
                for passage in &answer.passages {
                    let page = passage.page_label.as_deref().unwrap_or("N/A");
                    println!("Found in: {} | Page: {}", passage.file_name, page);
                    println!("Excerpt: {}", passage.excerpt(150));
                    println!();
                }
            }
        }
        Command::Chat { top_k } => {
            let index = open_index_or_hint(&pinecone, &cli.index, embedder.dimensions()).await?;
            let gemini =
                GeminiClient::new(&config.gemini_api_url, &config.google_api_key, &config.gemini_model)
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let model = gemini.model().to_string();
            let engine = QueryEngine::new(embedder, index, gemini, top_k);

            println!("==================================================");
            println!("AI medical assistant ready (index: {}, model: {model})", cli.index);
            println!("Type 'exit' or 'q' to quit.");
            println!("==================================================");

            let stdin = BufReader::new(tokio::io::stdin());
            let stdout = tokio::io::stdout();
            let stats = run_chat_loop(&engine, stdin, stdout).await?;

            info!(
                answered = stats.answered,
                failed = stats.failed,
                "chat session ended"
            );
        }
    }

    Ok(())
}

async fn open_index_or_hint(
    pinecone: &PineconeClient,
    name: &str,
    dimension: usize,
) -> anyhow::Result<PineconeIndex> {
    match pinecone.open_index(name, dimension).await {
        Ok(index) => Ok(index),
        Err(BackendError::IndexNotFound(_)) => {
            anyhow::bail!("index {name} does not exist yet; run `medkb ingest` first")
        }
        Err(error @ BackendError::DimensionMismatch { .. }) => {
            anyhow::bail!("{error}; select the embedding profile the index was built with")
        }
        Err(error) => Err(anyhow::anyhow!(error.to_string())),
    }
}
