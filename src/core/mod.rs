mod config;
pub use config::{AppConfig, GoogleCredentials, SearchSettings};

mod logging;
pub use logging::init_tracing;
