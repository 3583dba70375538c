use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::history::{HistoryStore, SqliteHistoryStore};
use crate::preload::{build_engine, Preloader};

/// Shared application state passed to all route handlers.
///
/// The settings are immutable, the history store is append/read, and the
/// query engine lives behind the preloader's readiness gate.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub history: Arc<dyn HistoryStore>,
    pub preloader: Arc<Preloader>,
}

impl AppState {
    /// Open the history database and assemble the state. Does not start
    /// the preload; callers do that once the state is in place.
    pub async fn initialize(settings: Settings) -> Result<Arc<Self>> {
        let settings = Arc::new(settings);

        let history = SqliteHistoryStore::open(&settings.history_db_path())
            .await
            .context("failed to open history database")?;

        Ok(Arc::new(Self {
            settings,
            history: Arc::new(history),
            preloader: Arc::new(Preloader::new()),
        }))
    }

    /// Kick off the one-time background preload (index build + LLM client
    /// construction). Safe to call more than once; only the first call
    /// spawns the worker.
    pub fn start_preload(&self) -> bool {
        let settings = self.settings.clone();
        self.preloader.start(move || build_engine(settings))
    }
}
