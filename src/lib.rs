//! Form Cascade Engine
//!
//! Runtime for dynamic infrastructure forms:
//! - Declarative cascade rules (visibility, enablement, requiredness, values)
//! - Field-level shorthands expanded into rules
//! - External option sources with templated URLs, caching and dependency
//!   invalidation
//! - Request coalescing with timeout and cancellation

pub mod cascade;
pub mod config;
pub mod datasource;
pub mod error;
pub mod telemetry;
pub mod value;

// Re-exports for convenience
pub use cascade::{evaluate_rules, Action, CascadeEngine, CascadeState, Operator, Rule, Trigger};
pub use config::{EngineConfig, FormConfig};
pub use datasource::{
    DataSource, DataSourceRegistry, DataSourceState, FormContext, HttpTransport, SelectOption,
    Transport,
};
pub use error::{ConfigError, LoadError, TransportError};
