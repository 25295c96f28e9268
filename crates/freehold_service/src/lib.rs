//! # Freehold Service
//!
//! Embedding surface for the Freehold land-claim system: configuration
//! loading, logging setup, and the [`FreeholdService`] facade that wires a
//! storage backend to the region/group/member/player caches.
//!
//! ```no_run
//! use freehold_service::{setup_logging, FreeholdConfig, FreeholdService};
//!
//! # async fn boot() -> anyhow::Result<()> {
//! let config = FreeholdConfig::default();
//! if let Some(logging) = &config.logging {
//!     setup_logging(logging)?;
//! }
//! let service = FreeholdService::open(config).await?;
//! // hand `&service` to command handlers and the movement-event pipeline
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod service;

pub use config::{
    load_config, CacheSettings, FreeholdConfig, LoggingSettings, ShardSettings, StorageBackend,
    StorageSettings,
};
pub use error::{ServiceError, ServiceResult};
pub use logging::setup_logging;
pub use service::{FreeholdService, StoreHandle};
