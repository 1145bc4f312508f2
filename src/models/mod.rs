pub mod query_config;

pub use query_config::*;
