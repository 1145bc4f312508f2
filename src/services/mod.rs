pub mod cache_store;
pub mod executor;
pub mod local_cache;
pub mod pool_registry;
pub mod result_cache;
pub mod database; // Multi-backend connection providers

pub use cache_store::*;
pub use executor::*;
pub use local_cache::*;
pub use pool_registry::*;
pub use result_cache::*;
