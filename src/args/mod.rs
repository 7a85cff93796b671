//! CLI argument types and parsing helpers.
mod cli;
mod parsers;


pub use cli::{CliArgs, FetchMethod};
pub use parsers::{parse_duration_arg, parse_header, parse_positive_usize};
