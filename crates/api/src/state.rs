use std::sync::Arc;

use revwiki_core::revision_store::RevisionStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Revision store over whichever repository the server was started with.
    pub store: Arc<RevisionStore>,
    pub config: Arc<ServerConfig>,
}
