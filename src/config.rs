//! Environment-based configuration, read once at startup.
//!
//! All settings are immutable after load and travel through
//! [`crate::state::AppState`] rather than globals.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
pub const DEFAULT_EMBEDDING_MODEL: &str = "bge-small-en-v1.5";

/// Fatal startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,
    #[error("data directory does not exist: {0}")]
    MissingDataDir(PathBuf),
    #[error("invalid PORT value: {0}")]
    InvalidPort(String),
}

/// Immutable application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Anthropic API credential.
    pub api_key: String,
    /// Directory holding the source corpus (txt/md/pdf).
    pub data_dir: PathBuf,
    /// Directory for the SQLite index and history databases.
    pub state_dir: PathBuf,
    /// Directory for rolling log files.
    pub log_dir: PathBuf,
    /// Optional directory of static front-end assets.
    pub static_dir: PathBuf,
    pub port: u16,
    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
    /// Anthropic model id used for generation.
    pub model: String,
    /// fastembed model name used for retrieval.
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Upper bound on the formatted context block, in characters.
    pub max_context_chars: usize,
    /// Similarity floor below which retrieved chunks are dropped.
    pub similarity_threshold: f32,
    /// Number of prior turns forwarded to the model.
    pub max_history_turns: usize,
    /// Bound on a single generation request.
    pub llm_timeout_secs: u64,
}

impl Settings {
    /// Load settings from the environment. Missing credential or corpus
    /// directory aborts startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let data_dir = PathBuf::from(env_or("BOOKCHAT_DATA_DIR", "./data"));
        if !data_dir.is_dir() {
            return Err(ConfigError::MissingDataDir(data_dir));
        }

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => 8080,
        };

        let allowed_origins = env::var("BOOKCHAT_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|list| !list.is_empty())
            .unwrap_or_else(default_local_origins);

        Ok(Self {
            api_key,
            data_dir,
            state_dir: PathBuf::from(env_or("BOOKCHAT_STATE_DIR", "./state")),
            log_dir: PathBuf::from(env_or("BOOKCHAT_LOG_DIR", "./logs")),
            static_dir: PathBuf::from(env_or("BOOKCHAT_STATIC_DIR", "./static")),
            port,
            allowed_origins,
            model: env_or("BOOKCHAT_MODEL", DEFAULT_MODEL),
            embedding_model: env_or("BOOKCHAT_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            chunk_size: 512,
            chunk_overlap: 50,
            top_k: 5,
            max_context_chars: 4000,
            similarity_threshold: 0.3,
            max_history_turns: 6,
            llm_timeout_secs: 60,
        })
    }

    pub fn index_db_path(&self) -> PathBuf {
        self.state_dir.join("index.db")
    }

    pub fn history_db_path(&self) -> PathBuf {
        self.state_dir.join("history.db")
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

#[cfg(test)]
pub(crate) fn test_settings(data_dir: PathBuf, state_dir: PathBuf) -> Settings {
    Settings {
        api_key: "test-key".to_string(),
        data_dir,
        state_dir,
        log_dir: PathBuf::from("./logs"),
        static_dir: PathBuf::from("./static"),
        port: 0,
        allowed_origins: default_local_origins(),
        model: DEFAULT_MODEL.to_string(),
        embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        chunk_size: 512,
        chunk_overlap: 50,
        top_k: 5,
        max_context_chars: 4000,
        similarity_threshold: 0.3,
        max_history_turns: 6,
        llm_timeout_secs: 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment mutation is process-wide, so every env-dependent assertion
    // lives in this single test.
    #[test]
    fn test_from_env() {
        let data_dir = tempfile::tempdir().expect("tempdir");

        env::remove_var("ANTHROPIC_API_KEY");
        assert!(matches!(
            Settings::from_env(),
            Err(ConfigError::MissingApiKey)
        ));

        env::set_var("ANTHROPIC_API_KEY", "sk-test");
        env::set_var("BOOKCHAT_DATA_DIR", "/definitely/not/a/real/path");
        assert!(matches!(
            Settings::from_env(),
            Err(ConfigError::MissingDataDir(_))
        ));

        env::set_var("BOOKCHAT_DATA_DIR", data_dir.path());
        env::set_var("PORT", "not-a-port");
        assert!(matches!(
            Settings::from_env(),
            Err(ConfigError::InvalidPort(_))
        ));

        env::set_var("PORT", "9911");
        env::set_var("BOOKCHAT_ALLOWED_ORIGINS", "https://qa.example.com, ");
        let settings = Settings::from_env().expect("settings");
        assert_eq!(settings.port, 9911);
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.allowed_origins, vec!["https://qa.example.com"]);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.chunk_size, 512);

        env::remove_var("PORT");
        env::remove_var("BOOKCHAT_ALLOWED_ORIGINS");
        env::remove_var("BOOKCHAT_DATA_DIR");
        env::remove_var("ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_db_paths_under_state_dir() {
        let settings = test_settings(PathBuf::from("./data"), PathBuf::from("./state"));
        assert_eq!(settings.index_db_path(), PathBuf::from("./state/index.db"));
        assert_eq!(
            settings.history_db_path(),
            PathBuf::from("./state/history.db")
        );
    }
}
