//! Authorization infrastructure

mod cache;

pub use cache::{AuthorizationCache, AuthorizationCacheConfig};
