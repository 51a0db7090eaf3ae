//! Document-store access for skipgate.
//!
//! The protocol only needs a handful of operations against a live node:
//! - Create a collection and insert a document into it
//! - Create a single-field index
//! - Count documents and list indexes for verification
//!
//! [`DataAccessClient`] is the seam; [`ShellClient`] implements it by
//! driving the store's own shell binary.

pub mod error;
pub mod index;
pub mod shell;

pub use error::{Error, Result};
pub use index::{IndexKey, IndexSpec, KeyDirection, KeyPattern, find_by_key_pattern};
pub use shell::{ShellClient, ShellOptions};

use serde::{Deserialize, Serialize};
use skipgate_types::Endpoint;
use std::fmt;

/// A document as a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Database name used for test collections.
pub const TEST_DATABASE: &str = "test";

/// A `database.collection` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// A collection in the [`TEST_DATABASE`].
    pub fn test(collection: impl Into<String>) -> Self {
        Self::new(TEST_DATABASE, collection)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Collection, document and index operations against a live node.
///
/// Every operation fails with a descriptive [`Error`] when the store rejects it.
#[allow(async_fn_in_trait)]
pub trait DataAccessClient {
    async fn create_collection(&self, endpoint: Endpoint, ns: &Namespace) -> Result<()>;

    async fn insert_one(&self, endpoint: Endpoint, ns: &Namespace, document: Document)
    -> Result<()>;

    async fn create_index(&self, endpoint: Endpoint, ns: &Namespace, key: &KeyPattern)
    -> Result<()>;

    async fn count(&self, endpoint: Endpoint, ns: &Namespace) -> Result<u64>;

    async fn list_indexes(&self, endpoint: Endpoint, ns: &Namespace) -> Result<Vec<IndexSpec>>;
}
