pub mod config;
pub mod error;
pub mod query;
pub mod scoring;
pub mod text;
pub mod types;

pub use config::Config;
pub use error::ArgusError;
pub use query::*;
pub use scoring::*;
pub use text::{content_hash, normalize_content, source_dedup_hash, strip_html};
pub use types::*;
