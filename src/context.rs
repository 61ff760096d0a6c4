//! Shared application state handed to every transport.
//!
//! [`AppState`] is built once at startup and passed explicitly to each
//! transport; nothing in the crate reaches for a process-wide session map.

use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::debugger::{BackendLauncher, SessionOptions};
use crate::gateway::ToolGateway;
use crate::session::SessionRegistry;

/// Configuration, session registry, and gateway shared by all transports.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Live debugger sessions.
    pub registry: Arc<SessionRegistry>,
    /// Tool dispatch over `registry`.
    pub gateway: Arc<ToolGateway>,
}

impl AppState {
    /// Wire a registry and gateway around `launcher`.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>, launcher: Arc<dyn BackendLauncher>) -> Self {
        let registry = Arc::new(SessionRegistry::new(launcher));
        let gateway = Arc::new(ToolGateway::new(
            Arc::clone(&registry),
            session_options(&config),
            config.dumps_dir.clone(),
        ));
        Self {
            config,
            registry,
            gateway,
        }
    }

    /// Close every debugger session.
    pub async fn shutdown(&self) {
        self.registry.close_all().await;
    }
}

/// Session launch options derived from configuration.
#[must_use]
pub fn session_options(config: &GlobalConfig) -> SessionOptions {
    SessionOptions {
        cdb_path: config.resolved_cdb_path(),
        symbols_path: config.symbols_path.clone(),
        command_timeout: config.command_timeout(),
        load_timeout: config.load_timeout(),
        verbose: config.session.verbose,
    }
}
