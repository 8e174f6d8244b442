use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::info;

use crate::auth::{CredentialStore, MemoryCredentialStore};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::http::connection::{Connection, ConnectionConfig};
use crate::http::handler::RequestHandler;
use crate::metrics::ServerMetrics;
use crate::storage::fs;
use crate::storage::index::StorageIndex;
use crate::storage::tiers::TierStore;

/// Connection type driven by the live server.
pub type ServerConnection = Connection<Arc<TcpStream>>;

/// Everything the accept loop shares between connections. Built once by
/// the binary and passed around explicitly.
pub struct AppState {
    pub config: Config,
    pub metrics: Arc<ServerMetrics>,
    pub index: Arc<StorageIndex>,
    pub store: Arc<TierStore>,
    pub handler: Arc<RequestHandler>,
    pub dispatcher: Dispatcher<ServerConnection>,
    pub connection: ConnectionConfig,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self> {
        fs::ensure_dir(&config.storage.low_storage_dir)?;
        fs::ensure_dir(&config.storage.deep_storage_dir)?;

        let metrics = Arc::new(ServerMetrics::new());
        let index = Arc::new(StorageIndex::open(&config.storage.storage_info));
        let store = Arc::new(TierStore::new(Arc::clone(&index), &config.storage));

        let credentials: Arc<dyn CredentialStore> = match &config.auth.users_file {
            Some(path) => Arc::new(MemoryCredentialStore::load(path)?),
            None => Arc::new(MemoryCredentialStore::new()),
        };

        let handler = Arc::new(RequestHandler::new(
            Arc::clone(&store),
            Arc::clone(&metrics),
            credentials,
            &config.static_files,
        ));

        let dispatcher = Dispatcher::new(
            config.dispatch.workers,
            config.dispatch.max_requests,
            config.dispatch.mode,
        )?;

        info!(
            doc_root = %config.static_files.doc_root.display(),
            low = %config.storage.low_storage_dir.display(),
            deep = %config.storage.deep_storage_dir.display(),
            objects = index.len(),
            "Application state ready"
        );

        let connection = ConnectionConfig::from_config(&config);
        Ok(Self {
            config,
            metrics,
            index,
            store,
            handler,
            dispatcher,
            connection,
        })
    }
}
