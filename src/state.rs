use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::ai::{GenAi, GeminiClient};
use crate::config::Config;
use crate::exam::ExamRegistry;
use crate::store::DocStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub store: DocStore,
    pub ai: Arc<dyn GenAi>,
    pub exams: ExamRegistry,
}

impl AppState {
    /// Wires the default Gemini-backed state. Tests swap `ai` for a stub.
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let store = DocStore::new(pool.clone());
        let ai: Arc<dyn GenAi> = Arc::new(GeminiClient::from_config(&config));
        Self {
            pool,
            config,
            store,
            ai,
            exams: ExamRegistry::new(),
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for DocStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for ExamRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.exams.clone()
    }
}
