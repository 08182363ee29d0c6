use crate::error::Result;
use crate::profile::ProfileSummary;
use async_trait::async_trait;

pub mod http;

pub use http::HttpNeighborSource;

/// One-hop similarity lookup: the neighbors of an identifier.
///
/// Implementations must preserve the order the backing service returns;
/// an empty list is a valid success result, distinct from an error.
#[async_trait]
pub trait NeighborSource: Send + Sync {
    async fn fetch_neighbors(&self, identifier: &str) -> Result<Vec<ProfileSummary>>;
}
