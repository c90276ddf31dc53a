use std::borrow::Cow;

use human_errors as errors;

mod partition;
mod query;
mod sqlite;

pub use partition::Partition;
pub use query::{Order, Query};
pub use sqlite::SqliteDatabase;

/// A schemaless store of JSON documents, grouped into named collections and
/// keyed by document id.
#[async_trait::async_trait]
pub trait DocumentStore {
    async fn find_one<
        C: Into<Cow<'static, str>> + Send,
        K: Into<Cow<'static, str>> + Send,
        T: serde::de::DeserializeOwned + Send + 'static,
    >(
        &self,
        collection: C,
        id: K,
    ) -> Result<Option<T>, errors::Error>;

    async fn find<
        C: Into<Cow<'static, str>> + Send,
        T: serde::de::DeserializeOwned + Send + 'static,
    >(
        &self,
        collection: C,
        query: Query,
    ) -> Result<Vec<T>, errors::Error>;

    async fn count<C: Into<Cow<'static, str>> + Send>(
        &self,
        collection: C,
        query: Query,
    ) -> Result<usize, errors::Error>;

    /// Inserts a document unless one with the same id already exists,
    /// returning whether it was inserted.
    async fn insert_one<
        C: Into<Cow<'static, str>> + Send,
        K: Into<Cow<'static, str>> + Send,
        T: serde::Serialize + Send + 'static,
    >(
        &self,
        collection: C,
        id: K,
        document: T,
    ) -> Result<bool, errors::Error>;

    /// Inserts every document whose id is not yet present, returning the ids
    /// which were inserted.
    async fn insert_many<
        C: Into<Cow<'static, str>> + Send,
        T: serde::Serialize + Send + 'static,
    >(
        &self,
        collection: C,
        documents: Vec<(String, T)>,
    ) -> Result<Vec<String>, errors::Error>;

    /// Sets the given top-level fields on an existing document, returning
    /// whether the document was found.
    async fn update_one<C: Into<Cow<'static, str>> + Send, K: Into<Cow<'static, str>> + Send>(
        &self,
        collection: C,
        id: K,
        set: serde_json::Map<String, serde_json::Value>,
    ) -> Result<bool, errors::Error>;

    fn partition<T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static>(
        &self,
        name: impl ToString,
    ) -> Partition<Self, T>
    where
        Self: Sized + Clone,
    {
        Partition::new(self.clone(), name.to_string())
    }
}
