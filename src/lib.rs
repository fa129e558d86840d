// repopulse: GitHub activity across tracked repositories, behind a cache-aside pipeline.

pub mod aggregate;
pub mod cache;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod github;
pub mod model;
pub mod notify;
pub mod repos;
pub mod scheduler;
pub mod server;

pub use context::Context;
pub use error::{PulseError, Result};
