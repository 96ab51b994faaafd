use std::sync::Arc;

use crate::core::config::settings::IndexBackend;
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::core::security::{init_session_token, SessionToken};
use crate::history::ConversationStore;
use crate::llm::OpenAiProvider;
use crate::rag::{LocalIndexStore, RagService, RemoteIndexStore, VectorStore};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Settings,
    pub session_token: SessionToken,
    pub conversations: ConversationStore,
    pub rag: Arc<RagService>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Setting up paths and loading the merged configuration
    /// 2. Opening the conversation database
    /// 3. Connecting the configured vector store backend
    /// 4. Wiring the LLM provider into the RAG service
    ///
    /// Any failure here aborts startup; a misconfigured deployment never
    /// serves requests.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());
        let session_token = init_session_token();

        let merged = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;
        let settings =
            Settings::from_config(&merged).map_err(|e| InitializationError::Config(e.into()))?;

        let conversations = ConversationStore::new(&paths.db_path)
            .await
            .map_err(|e| InitializationError::Conversations(e.into()))?;

        let store: Arc<dyn VectorStore> = match settings.index.backend {
            IndexBackend::Local => Arc::new(LocalIndexStore::new(paths.index_dir.clone())),
            IndexBackend::Remote => {
                let remote =
                    RemoteIndexStore::new(&settings.index, settings.rag.upsert_batch_size)
                        .map_err(|e| InitializationError::VectorStore(e.into()))?;
                remote
                    .ensure_ready()
                    .await
                    .map_err(|e| InitializationError::VectorStore(e.into()))?;
                Arc::new(remote)
            }
        };

        let provider = OpenAiProvider::new(
            settings.llm.base_url.clone(),
            settings.llm.request_timeout_secs,
            settings.llm.max_retries,
        )
        .map_err(|e| InitializationError::Provider(e.into()))?;

        let rag = Arc::new(RagService::new(store, Arc::new(provider), &settings));

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            session_token,
            conversations,
            rag,
        }))
    }
}
