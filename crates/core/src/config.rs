use crate::error::ConfigError;

pub const DEFAULT_PINECONE_API_URL: &str = "https://api.pinecone.io";
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_EMBED_MODEL: &str = "all-minilm";
pub const DEFAULT_OLLAMA_DIMENSION: usize = 384;
pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_EMBED_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_OPENAI_DIMENSION: usize = 1536;

#[derive(Debug, Clone)]
pub struct Config {
    pub pinecone_api_key: String,
    pub pinecone_api_url: String,
    pub google_api_key: String,
    pub gemini_api_url: String,
    pub gemini_model: String,
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone)]
pub enum EmbeddingSettings {
    Ollama {
        url: String,
        model: String,
        dimension: usize,
    },
    OpenAi {
        api_key: String,
        api_url: String,
        model: String,
        dimension: usize,
    },
}

impl EmbeddingSettings {
    pub fn dimension(&self) -> usize {
        match self {
            EmbeddingSettings::Ollama { dimension, .. } => *dimension,
            EmbeddingSettings::OpenAi { dimension, .. } => *dimension,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());
        let required =
            |var: &'static str| set(var).ok_or(ConfigError::MissingVar(var));
        let or_default = |var: &str, default: &str| {
            set(var).unwrap_or_else(|| default.to_string())
        };

        let pinecone_api_key = required("PINECONE_API_KEY")?;
        let google_api_key = required("GOOGLE_API_KEY")?;

        let provider = or_default("EMBEDDING_PROVIDER", "ollama");
        let default_dimension = match provider.to_ascii_lowercase().as_str() {
            "ollama" => DEFAULT_OLLAMA_DIMENSION,
            "openai" => DEFAULT_OPENAI_DIMENSION,
            other => {
                return Err(ConfigError::InvalidVar {
                    var: "EMBEDDING_PROVIDER",
                    details: format!("unknown provider {other:?}, expected \"ollama\" or \"openai\""),
                })
            }
        };
        let dimension = match set("EMBEDDING_DIMENSION") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|err| ConfigError::InvalidVar {
                var: "EMBEDDING_DIMENSION",
                details: err.to_string(),
            })?,
            None => default_dimension,
        };
        if dimension == 0 {
            return Err(ConfigError::InvalidVar {
                var: "EMBEDDING_DIMENSION",
                details: "dimension must be positive".to_string(),
            });
        }

        let embedding = match provider.to_ascii_lowercase().as_str() {
            "ollama" => EmbeddingSettings::Ollama {
                url: or_default("OLLAMA_URL", DEFAULT_OLLAMA_URL),
                model: or_default("OLLAMA_EMBED_MODEL", DEFAULT_OLLAMA_EMBED_MODEL),
                dimension,
            },
            _ => EmbeddingSettings::OpenAi {
                api_key: required("OPENAI_API_KEY")?,
                api_url: or_default("OPENAI_API_URL", DEFAULT_OPENAI_API_URL),
                model: or_default("OPENAI_EMBED_MODEL", DEFAULT_OPENAI_EMBED_MODEL),
                dimension,
            },
        };

        Ok(Self {
            pinecone_api_key,
            pinecone_api_url: or_default("PINECONE_API_URL", DEFAULT_PINECONE_API_URL),
            google_api_key,
            gemini_api_url: or_default("GEMINI_API_URL", DEFAULT_GEMINI_API_URL),
            gemini_model: or_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            embedding,
        })
    }
}
