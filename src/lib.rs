pub mod aggregate;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod feature;
pub mod format;
pub mod gallery;
pub mod jobs;
mod metrics;
pub mod protocol;
pub mod rank;
mod searcher;
pub mod server;
pub mod utils;

pub use config::Opts;
pub use error::{ReidError, Result};
pub use searcher::ReidSearcher;
