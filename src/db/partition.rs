use super::*;

/// A typed view over a single collection of a [`DocumentStore`].
pub struct Partition<D, T> {
    pub db: D,
    pub name: String,
    _marker: std::marker::PhantomData<T>,
}

impl<D, T> Partition<D, T> {
    pub fn new(db: D, name: impl ToString) -> Self {
        Self {
            db,
            name: name.to_string(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<D: Clone, T> Clone for Partition<D, T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            name: self.name.clone(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<D, T> Partition<D, T>
where
    D: DocumentStore + Sync,
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
{
    pub async fn get(&self, id: impl ToString) -> Result<Option<T>, errors::Error> {
        self.db.find_one(self.name.clone(), id.to_string()).await
    }

    pub async fn find(&self, query: Query) -> Result<Vec<T>, errors::Error> {
        self.db.find(self.name.clone(), query).await
    }

    pub async fn first(&self, query: Query) -> Result<Option<T>, errors::Error> {
        Ok(self.db.find(self.name.clone(), query.limit(1)).await?.into_iter().next())
    }

    pub async fn count(&self, query: Query) -> Result<usize, errors::Error> {
        self.db.count(self.name.clone(), query).await
    }

    pub async fn insert(&self, id: impl ToString, document: T) -> Result<bool, errors::Error> {
        self.db.insert_one(self.name.clone(), id.to_string(), document).await
    }

    pub async fn insert_many(&self, documents: Vec<(String, T)>) -> Result<Vec<String>, errors::Error> {
        self.db.insert_many(self.name.clone(), documents).await
    }
}
