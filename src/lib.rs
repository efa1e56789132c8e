pub mod adapter;
pub mod config;
pub mod context;
pub mod data_filter;
pub mod directory;
pub mod error;
pub mod guard;
pub mod http_server;
pub mod metrics;
pub mod model;
pub mod query;
pub mod recordsets;
pub mod status;
pub mod validation;

pub use directory::{DirectoryService, InMemoryDirectory};
pub use error::ApiError;
pub use recordsets::RecordSetsController;
