pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod relay;
pub mod server;
pub mod translate;

pub use config::{ProxyConfig, Upstream};
pub use error::{ProxyError, Result};
pub use logging::SharedLogger;
pub use server::{build_router, AppState};
