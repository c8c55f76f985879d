use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub document_id: String,
    pub file_name: String,
    pub source_path: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub file_name: String,
    pub source_path: String,
    pub page_label: String,
    pub chunk_index: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub chunk_id: String,
    pub score: f64,
    pub file_name: String,
    pub page_label: Option<String>,
    pub text: String,
}

impl ScoredPassage {
    pub fn excerpt(&self, max_chars: usize) -> String {
        let flat = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= max_chars {
            return flat;
        }
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub file_name: String,
    pub page_label: Option<String>,
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let page = self.page_label.as_deref().unwrap_or("N/A");
        write!(f, "{} (Page {})", self.file_name, page)
    }
}

pub fn dedupe_citations(passages: &[ScoredPassage]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for passage in passages {
        let citation = Citation {
            file_name: passage.file_name.clone(),
            page_label: passage.page_label.clone(),
        };
        if seen.insert(citation.to_string()) {
            ordered.push(citation);
        }
    }
    ordered
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub question: String,
    pub text: String,
    pub passages: Vec<ScoredPassage>,
}

impl Answer {
    pub fn citations(&self) -> Vec<Citation> {
        dedupe_citations(&self.passages)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Metric {
    Cosine,
    Euclidean,
    DotProduct,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::DotProduct => "dotproduct",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

#[derive(Debug, Clone)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub host: String,
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MismatchPolicy {
    #[default]
    Fail,
    Recreate,
}

#[derive(Debug, Clone)]
pub struct ChunkingOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub min_chunk_chars: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_200,
            chunk_overlap_chars: 120,
            min_chunk_chars: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(file_name: &str, page_label: Option<&str>) -> ScoredPassage {
        ScoredPassage {
            chunk_id: "c".into(),
            score: 0.5,
            file_name: file_name.into(),
            page_label: page_label.map(str::to_string),
            text: "passage text".into(),
        }
    }

    #[test]
    fn citation_renders_file_and_page() {
        let citation = Citation {
            file_name: "tb-guidelines.pdf".into(),
            page_label: Some("12".into()),
        };
        assert_eq!(citation.to_string(), "tb-guidelines.pdf (Page 12)");
    }

    #[test]
    fn citation_without_page_label_renders_placeholder() {
        let citation = Citation {
            file_name: "tb-guidelines.pdf".into(),
            page_label: None,
        };
        assert_eq!(citation.to_string(), "tb-guidelines.pdf (Page N/A)");
    }

    #[test]
    fn citations_dedupe_in_first_seen_order() {
        let passages = vec![
            passage("a.pdf", Some("1")),
            passage("a.pdf", Some("1")),
            passage("a.pdf", Some("2")),
            passage("b.pdf", None),
            passage("a.pdf", Some("1")),
        ];
        let citations = dedupe_citations(&passages);
        let rendered: Vec<String> = citations.iter().map(Citation::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "a.pdf (Page 1)",
                "a.pdf (Page 2)",
                "b.pdf (Page N/A)"
            ]
        );
    }

    #[test]
    fn excerpt_flattens_newlines_and_truncates() {
        let mut long = passage("a.pdf", Some("1"));
        long.text = format!("first line\nsecond   line {}", "x".repeat(200));
        let excerpt = long.excerpt(24);
        assert!(excerpt.starts_with("first line second line"));
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), 27);
    }

    #[test]
    fn excerpt_keeps_short_text_whole() {
        let short = passage("a.pdf", Some("1"));
        assert_eq!(short.excerpt(150), "passage text");
    }
}
