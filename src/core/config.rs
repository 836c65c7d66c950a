//! Paths and typed application configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Filesystem locations used by the backend.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let log_dir = project_root.join("logs");
        let _ = fs::create_dir_all(&log_dir);

        AppPaths {
            project_root,
            log_dir,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("DOCSCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        self.project_root.join("config.yml")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("DOCSCHAT_ROOT") {
        return PathBuf::from(root);
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Application configuration, loaded from `config.yml`.
///
/// Every section has sensible defaults; a missing or partial file is not an
/// error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub corpus: CorpusConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub support: SupportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind. 0 picks an ephemeral port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Corpus file, resolved against the project root when relative.
    pub path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("docs_index.json"),
        }
    }
}

/// Nearest-neighbor query parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Result-count cap per query.
    pub max_results: usize,
    /// Minimum similarity score for a passage to count as relevant.
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            min_score: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Bearer token, if the API requires one.
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            chat_model: "gpt-4".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// Where users are redirected when the docs have no answer.
    pub contact: String,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            contact: "our support team".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(paths: &AppPaths) -> Self {
        Self::load_from(&paths.config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => match serde_yaml::from_str(&raw) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("Invalid config at {}: {}", path.display(), err);
                    AppConfig::default()
                }
            },
            Err(_) => AppConfig::default(),
        }
    }

    pub fn corpus_path(&self, paths: &AppPaths) -> PathBuf {
        if self.corpus.path.is_absolute() {
            self.corpus.path.clone()
        } else {
            paths.project_root.join(&self.corpus.path)
        }
    }
}
