pub mod adapters;
pub mod backend;
pub mod config;
pub mod conversion;
pub mod error;
pub mod extract;
pub mod logging;
pub mod model;
pub mod models;
pub mod schema;
pub mod tools;
pub mod utils;

pub use backend::{Backend, ClaudeCodeCli};
pub use config::{AdapterConfig, CliConfig};
pub use error::{AdapterError, BackendError};
pub use model::CodeAgentModel;
