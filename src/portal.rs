//! Shared application state.
//!
//! A [`Portal`] bundles the configuration, the store, the chat model,
//! the terminology cache and the in-memory chat sessions. CLI commands
//! build one per invocation; the HTTP server builds one at startup and
//! shares it behind an `Arc`.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use portal_core::store::Store;

use crate::chat::ChatSessions;
use crate::config::Config;
use crate::db;
use crate::llm::{self, ChatModel};
use crate::sqlite_store::SqliteStore;
use crate::terminology::TerminologyCache;

pub struct Portal {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub llm: Arc<dyn ChatModel>,
    pub terminology: TerminologyCache,
    pub sessions: ChatSessions,
}

impl Portal {
    /// Connect to the configured database and LLM provider.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
        let llm = llm::create_model(&config.llm)?;
        info!(provider = %config.llm.provider, model = llm.model_name(), "portal opened");
        Self::from_parts(config.clone(), store, llm).await
    }

    /// Assemble from explicit parts and load the terminology cache.
    pub async fn from_parts(config: Config, store: Arc<dyn Store>, llm: Arc<dyn ChatModel>) -> Result<Self> {
        let terminology = TerminologyCache::new();
        terminology.reload(store.as_ref()).await?;
        Ok(Self {
            config: Arc::new(config),
            store,
            llm,
            terminology,
            sessions: ChatSessions::new(),
        })
    }

    /// Model name for logs, `None` when the provider is disabled.
    pub fn model_used(&self) -> Option<String> {
        self.llm
            .is_enabled()
            .then(|| self.llm.model_name().to_string())
    }
}
