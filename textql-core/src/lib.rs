pub mod backend;
pub mod error;
pub mod executor;
pub mod pagination;
pub mod pipeline;
pub mod sanitizer;
pub mod types;
pub mod validator;

pub use backend::{connect_pool, PgBackend, PoolSettings, QueryBackend};
pub use error::QueryError;
pub use executor::{BatchStream, ExecutorSettings, QueryExecutor};
pub use pipeline::{PreparedQuery, QueryPipeline};
pub use types::*;
pub use validator::{IntentSignal, SecurityValidator, ValidationVerdict};
