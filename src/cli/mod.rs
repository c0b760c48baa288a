mod build;
mod export;
mod query;
mod search;
pub mod server;
mod show;
mod submit;

pub use build::*;
pub use export::*;
pub use query::*;
pub use search::*;
pub use server::*;
pub use show::*;
pub use submit::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
