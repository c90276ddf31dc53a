use std::sync::Arc;

use crate::config::Config;
use crate::db::DocumentStore;

pub trait Services {
    type Store: DocumentStore + Clone + Send + Sync + 'static;

    fn store(&self) -> Arc<Self::Store>;

    fn config(&self) -> Arc<Config>;
}

pub struct ServicesContainer<D: DocumentStore> {
    pub database: Arc<D>,
    pub config: Arc<Config>,
}

impl<D: DocumentStore> Clone for ServicesContainer<D> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            config: self.config.clone(),
        }
    }
}

impl<D> ServicesContainer<D>
where
    D: DocumentStore,
{
    pub fn new(database: D, config: Config) -> Self {
        Self {
            database: Arc::new(database),
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
impl ServicesContainer<crate::db::SqliteDatabase> {
    pub async fn new_mock(config: Config) -> Result<Self, human_errors::Error> {
        let database = crate::db::SqliteDatabase::open_in_memory().await?;
        Ok(Self::new(database, config))
    }
}

impl<D> Services for ServicesContainer<D>
where
    D: DocumentStore + Clone + Send + Sync + 'static,
{
    type Store = D;

    fn store(&self) -> Arc<D> {
        self.database.clone()
    }

    fn config(&self) -> Arc<Config> {
        self.config.clone()
    }
}
