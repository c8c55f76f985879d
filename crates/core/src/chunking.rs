use crate::error::IngestError;
use crate::models::{ChunkingOptions, DocumentFingerprint, PageChunk};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl From<ChunkingOptions> for ChunkingConfig {
    fn from(value: ChunkingOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
            min_chars: value.min_chunk_chars,
        }
    }
}

fn validate_config(config: ChunkingConfig) -> Result<(), IngestError> {
    if config.max_chars == 0 {
        return Err(IngestError::InvalidChunkConfig(
            "max_chars must be positive".to_string(),
        ));
    }
    if config.overlap_chars >= config.max_chars {
        return Err(IngestError::InvalidChunkConfig(format!(
            "overlap_chars ({}) must be smaller than max_chars ({})",
            config.overlap_chars, config.max_chars
        )));
    }
    if config.min_chars > config.max_chars {
        return Err(IngestError::InvalidChunkConfig(format!(
            "min_chunk_chars ({}) cannot exceed max_chars ({})",
            config.min_chars, config.max_chars
        )));
    }
    Ok(())
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn chunk_page_text(normalized: &str, config: ChunkingConfig) -> Vec<String> {
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= config.max_chars {
        return vec![trimmed.to_string()];
    }

    let step = config.max_chars - config.overlap_chars;
    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.max_chars).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        windows.push(piece);
        if end == chars.len() {
            break;
        }
        start += step;
    }

    let kept: Vec<String> = windows
        .into_iter()
        .filter(|window| window.chars().count() >= config.min_chars)
        .collect();

    if kept.is_empty() {
        vec![trimmed.to_string()]
    } else {
        kept
    }
}

pub fn build_page_chunks(
    document: &DocumentFingerprint,
    page: u32,
    page_text: &str,
    options: &ChunkingOptions,
    global_index: u64,
) -> Result<(Vec<PageChunk>, u64), IngestError> {
    let config = ChunkingConfig::from(options.clone());
    validate_config(config)?;

    let normalized = normalize_whitespace(page_text);
    let mut chunks = Vec::new();
    let mut cursor = global_index;

    for text in chunk_page_text(&normalized, config) {
        let chunk_id = make_chunk_id(&document.document_id, page, cursor, &text);
        chunks.push(PageChunk {
            chunk_id,
            document_id: document.document_id.clone(),
            file_name: document.file_name.clone(),
            source_path: document.source_path.clone(),
            page_label: page.to_string(),
            chunk_index: cursor,
            text,
        });
        cursor = cursor.saturating_add(1);
    }

    Ok((chunks, cursor))
}

fn make_chunk_id(document_id: &str, page: u32, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint() -> DocumentFingerprint {
        DocumentFingerprint {
            document_id: "doc-1".to_string(),
            file_name: "dosage-handbook.pdf".to_string(),
            source_path: "/tmp/dosage-handbook.pdf".to_string(),
            checksum: "checksum".to_string(),
            ingested_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "Adults:  \t 500mg\nevery   8h";
        assert_eq!(normalize_whitespace(input), "Adults: 500mg every 8h");
    }

    #[test]
    fn long_pages_split_into_overlapping_windows() {
        let config = ChunkingConfig {
            max_chars: 20,
            overlap_chars: 4,
            min_chars: 5,
        };
        let text: String = (0..50)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();

        let windows = chunk_page_text(&text, config);

        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.chars().count() <= 20));
        assert_eq!(&windows[1][..4], &windows[0][16..]);
        assert_eq!(&windows[2][..4], &windows[1][16..]);
    }

    #[test]
    fn short_page_is_kept_whole() {
        let config = ChunkingConfig {
            max_chars: 1_200,
            overlap_chars: 120,
            min_chars: 64,
        };
        let windows = chunk_page_text("Dosage: 5 mg daily", config);
        assert_eq!(windows, vec!["Dosage: 5 mg daily".to_string()]);
    }

    #[test]
    fn chunks_carry_page_label_and_running_index() {
        let options = ChunkingOptions {
            chunk_max_chars: 20,
            chunk_overlap_chars: 4,
            min_chunk_chars: 5,
        };
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";

        let (chunks, next_index) =
            build_page_chunks(&fingerprint(), 7, text, &options, 3).unwrap();

        assert!(chunks.len() > 1);
        assert_eq!(next_index, 3 + chunks.len() as u64);
        for (offset, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.page_label, "7");
            assert_eq!(chunk.chunk_index, 3 + offset as u64);
            assert_eq!(chunk.file_name, "dosage-handbook.pdf");
            assert_eq!(chunk.chunk_id.len(), 64);
        }
    }

    #[test]
    fn overlap_wider_than_window_is_rejected() {
        let options = ChunkingOptions {
            chunk_max_chars: 100,
            chunk_overlap_chars: 100,
            min_chunk_chars: 10,
        };
        match build_page_chunks(&fingerprint(), 1, "text", &options, 0) {
            Err(IngestError::InvalidChunkConfig(_)) => {}
            other => panic!("expected InvalidChunkConfig, got {other:?}"),
        }
    }
}
