//! Minecraft Server Finder
//!
//! Checks a Java-edition Minecraft server through the server-list-ping
//! status protocol and, when it is unreachable, suggests alternatives from a
//! web search or a chat-completion endpoint. The whole flow is exposed as a
//! JSON-RPC tool behind bearer authentication.
//!
//! # Architecture
//!
//! ```text
//!                 +----------------+
//!                 |   hub/ (RPC)   |
//!                 +-------+--------+
//!                         |
//!                 +-------v--------+
//!                 |    finder/     |
//!                 +--+----+-----+--+
//!                    |    |     |
//!        +-----------+    |     +-------------+
//!        |                |                   |
//! +------v------+  +------v------+    +-------v-------+
//! |  protocol/  |  |    dns/     |    |  discovery/   |
//! | (ping/pong) |  |   (SRV)     |    | (search/chat) |
//! +-------------+  +-------------+    +---------------+
//! ```

pub mod common;
pub mod config;
pub mod discovery;
pub mod dns;
pub mod finder;
pub mod hub;
pub mod protocol;

pub use common::error::{Error, Result};
pub use config::Config;
pub use finder::{FallbackReport, Finder};

use hub::AppState;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Crate version, reported by `initialize` and `/version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service instance wiring configuration to the tool endpoint
pub struct Service {
    finder: Finder,
    listen: SocketAddr,
    secret: String,
    validate_id: String,
}

impl Service {
    /// Create a new service from validated configuration
    pub fn new(config: &Config) -> Result<Self> {
        info!("Initializing Minecraft Server Finder v{}", VERSION);

        let listen = config.listen_addr()?;
        let secret = config
            .auth_token
            .clone()
            .ok_or_else(|| Error::config("auth-token is not set"))?;
        let validate_id = config
            .validate_id
            .clone()
            .ok_or_else(|| Error::config("validate-id is not set"))?;

        let finder = Finder::new(config)?;

        Ok(Service {
            finder,
            listen,
            secret,
            validate_id,
        })
    }

    /// Serve the tool endpoint until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        let state = self.create_app_state();
        let addr = self.listen;
        let handle = tokio::spawn(async move {
            if let Err(e) = hub::start_server(state, addr).await {
                warn!("Tool endpoint error: {}", e);
            }
        });
        info!("Tool endpoint started on {}", addr);

        tokio::signal::ctrl_c().await?;
        info!("Received shutdown signal");

        handle.abort();
        info!("Service stopped");
        Ok(())
    }

    fn create_app_state(&self) -> AppState {
        AppState::new(&self.secret, &self.validate_id, self.finder.clone())
    }

    /// Listen address of the tool endpoint
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen
    }
}
