//! Terminal output and prompts.

mod output;
pub mod prompts;

pub use output::{banner, error, header, info, kv, success, warning};
