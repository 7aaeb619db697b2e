//! CLI command implementations

pub mod cache;
pub mod compile;
pub mod config;
pub mod migrate;
pub mod pool;
pub mod status;
pub mod template;

pub use cache::execute as cache;
pub use compile::execute as compile;
pub use config::execute as config;
pub use migrate::execute as migrate;
pub use pool::execute as pool;
pub use status::execute as status;
pub use template::execute as template;

use crate::build::BuildEngine;
use crate::config::Config;
use crate::toolchain::ProcessRunner;
use std::sync::Arc;

/// Engine backed by real subprocesses
pub(crate) fn engine(config: &Config) -> BuildEngine {
    BuildEngine::new(config, Arc::new(ProcessRunner::new()))
}
