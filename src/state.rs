//! Global application state.

use std::sync::Arc;

use crate::action::{spawn_applier, ActionLog, SearchAction, UpdateBus};
use crate::answer::AnswerService;
use crate::core::config::{AppConfig, AppPaths};
use crate::corpus::CorpusLoader;
use crate::llm::OpenAiCompatClient;
use crate::rag::prompt::PromptBuilder;

/// State shared across all routes and background workers.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub actions: Arc<ActionLog>,
    pub answers: Arc<AnswerService>,
}

impl AppState {
    /// Wire up the services, start the update applier, seed the history
    /// with the startup markers and spawn the one-time index build worker.
    pub async fn initialize(paths: Arc<AppPaths>) -> Arc<Self> {
        let config = AppConfig::load(&paths);

        let actions = Arc::new(ActionLog::new());
        let (updates, update_rx) = UpdateBus::channel();
        spawn_applier(actions.clone(), update_rx);

        let client = Arc::new(OpenAiCompatClient::new(&config.llm));
        let answers = Arc::new(AnswerService::new(
            CorpusLoader::new(config.corpus_path(&paths)),
            client.clone(),
            client,
            PromptBuilder::new(&config.support.contact),
            config.retrieval.clone(),
            updates,
        ));

        let state = Arc::new(AppState {
            paths,
            config,
            actions,
            answers,
        });

        state
            .actions
            .insert(SearchAction::marker("Application started"))
            .await;
        let init_action = state
            .actions
            .insert(SearchAction::new(
                "Initializing search engine, please stand by...",
            ))
            .await;

        let answers = state.answers.clone();
        tokio::spawn(async move {
            answers.init(init_action.id).await;
        });

        state
    }
}
