pub mod adapter;
pub mod graph;
pub mod mysql;
pub mod postgres;

pub use adapter::*;
pub use graph::*;
