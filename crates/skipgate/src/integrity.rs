//! What populate writes, and the check that it survived.

use crate::{Corruption, Error, Result};
use serde_json::json;
use skipgate_client::{
    DataAccessClient, Document, KeyPattern, Namespace, TEST_DATABASE, find_by_key_pattern,
};
use skipgate_types::{Endpoint, Step, VersionSpec};

/// The data written into each spec's collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    pub database: String,
    pub document: Document,
    pub index: KeyPattern,
}

impl Default for Workload {
    /// One document `{a: 1}` and an ascending index on `a`, in the test database.
    fn default() -> Self {
        let mut document = Document::new();
        document.insert("a".to_string(), json!(1));

        Self {
            database: TEST_DATABASE.to_string(),
            document,
            index: KeyPattern::ascending("a"),
        }
    }
}

impl Workload {
    pub fn namespace(&self, spec: &VersionSpec) -> Namespace {
        Namespace::new(self.database.clone(), spec.test_collection.clone())
    }

    /// Creates the collection, inserts the document and builds the index.
    pub async fn apply<C: DataAccessClient>(
        &self,
        client: &C,
        endpoint: Endpoint,
        spec: &VersionSpec,
    ) -> skipgate_client::Result<()> {
        let ns = self.namespace(spec);
        client.create_collection(endpoint, &ns).await?;
        client
            .insert_one(endpoint, &ns, self.document.clone())
            .await?;
        client.create_index(endpoint, &ns, &self.index).await
    }
}

/// What [`DataIntegrityChecker::check`] found.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub document_count: u64,
    pub index_name: String,
}

/// Confirms a [`Workload`] is still readable after the rejected attempts.
#[derive(Debug, Clone)]
pub struct DataIntegrityChecker {
    workload: Workload,
}

impl DataIntegrityChecker {
    pub fn new(workload: Workload) -> Self {
        Self { workload }
    }

    /// Exactly one document, and an index whose key pattern equals the
    /// populated one. Index names are not compared.
    pub async fn check<C: DataAccessClient>(
        &self,
        client: &C,
        endpoint: Endpoint,
        spec: &VersionSpec,
    ) -> Result<IntegrityReport> {
        let ns = self.workload.namespace(spec);
        let query_failed = |e: skipgate_client::Error| {
            Error::corruption(spec, Step::Verify, Corruption::QueryFailed(e.to_string()))
        };

        let document_count = client.count(endpoint, &ns).await.map_err(query_failed)?;
        if document_count != 1 {
            return Err(Error::corruption(
                spec,
                Step::Verify,
                Corruption::DocumentCount {
                    expected: 1,
                    found: document_count,
                },
            ));
        }

        let indexes = client
            .list_indexes(endpoint, &ns)
            .await
            .map_err(query_failed)?;
        match find_by_key_pattern(&indexes, &self.workload.index) {
            Some(index) => Ok(IntegrityReport {
                document_count,
                index_name: index.name.clone(),
            }),
            None => Err(Error::corruption(
                spec,
                Step::Verify,
                Corruption::IndexMissing {
                    pattern: self.workload.index.clone(),
                    present: indexes.into_iter().map(|index| index.key).collect(),
                },
            )),
        }
    }
}
