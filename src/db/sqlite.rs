use std::{borrow::Cow, sync::Arc};

use human_errors::{self as errors, ResultExt};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing_batteries::prelude::*;

use crate::db::{DocumentStore, Query};

#[derive(Clone)]
pub struct SqliteDatabase {
    connection: Arc<Connection>,
}

const ADVICE_DB_ERROR: &[&str] = &[
    "Make sure that the database file is accessible and not corrupted.",
    "If the problem persists, please report the issue to the development team via GitHub.",
];

const ADVICE_REPORT_DEV: &[&str] =
    &["Please report this issue to the development team via GitHub."];

impl SqliteDatabase {
    pub async fn open(path: &str) -> Result<Self, errors::Error> {
        let connection = Connection::open(path).await.wrap_err_as_user(
            format!("Unable to open SQLite database file '{path}'."),
            &["Make sure the file path is correct and accessible."],
        )?;

        let mut db = Self {
            connection: Arc::new(connection),
        };
        db.initialize().await?;

        Ok(db)
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, errors::Error> {
        let connection = Connection::open_in_memory().await.map_err_as_system(&[
            "Make sure that there is enough memory available to create an in-memory database.",
        ])?;

        let mut db = Self {
            connection: Arc::new(connection),
        };
        db.initialize().await?;

        Ok(db)
    }

    /// Runs raw SQL against the store, for shaping test fixtures.
    #[cfg(test)]
    pub async fn execute_batch(&self, sql: &'static str) -> Result<(), errors::Error> {
        self.connection
            .call(move |c| c.execute_batch(sql))
            .await
            .wrap_err_as_system("Failed to run a test statement.", ADVICE_REPORT_DEV)
    }

    async fn initialize(&mut self) -> Result<(), errors::Error> {
        self.connection
            .call(|c| {
                c.execute(
                    "CREATE TABLE IF NOT EXISTS migrations (
                    id INTEGER PRIMARY KEY
                )",
                    [],
                )
            })
            .await
            .wrap_err_as_system(
                "Failed to initialize the migrations table.",
                ADVICE_DB_ERROR,
            )?;

        let latest_migration: usize = self
            .connection
            .call(|c| {
                c.query_one("SELECT COALESCE(MAX(id), 0) FROM migrations", [], |r| {
                    r.get(0)
                })
            })
            .await
            .wrap_err_as_system(
                "Failed to determine the latest database migration version.",
                ADVICE_DB_ERROR,
            )?;

        for (i, migration) in MIGRATIONS.iter().enumerate().skip(latest_migration) {
            self.connection
                .call(move |c| {
                    let transaction = c.transaction()?;
                    transaction.execute(migration, [])?;
                    transaction.execute("INSERT INTO migrations (id) VALUES (?1)", [i + 1])?;

                    transaction.commit()
                })
                .await
                .wrap_err_as_system(
                    format!("Failed to apply database migration v{}.", i + 1),
                    ADVICE_REPORT_DEV,
                )?;
        }

        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(column: usize, body: &str) -> rusqlite::Result<T> {
    serde_json::from_str(body).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[async_trait::async_trait]
impl DocumentStore for SqliteDatabase {
    #[instrument("db.sqlite.find_one", skip(self, collection, id), err(Display))]
    async fn find_one<
        C: Into<Cow<'static, str>> + Send,
        K: Into<Cow<'static, str>> + Send,
        T: serde::de::DeserializeOwned + Send + 'static,
    >(
        &self,
        collection: C,
        id: K,
    ) -> Result<Option<T>, errors::Error> {
        let collection = collection.into();
        let id = id.into();

        self.connection
            .call(move |c| {
                c.query_one(
                    "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                    [collection, id],
                    |r| {
                        let body: String = r.get(0)?;
                        decode(0, &body)
                    },
                )
                .optional()
            })
            .await
            .map_err_as_system(ADVICE_REPORT_DEV)
    }

    #[instrument("db.sqlite.find", skip(self, collection), err(Display))]
    async fn find<
        C: Into<Cow<'static, str>> + Send,
        T: serde::de::DeserializeOwned + Send + 'static,
    >(
        &self,
        collection: C,
        query: Query,
    ) -> Result<Vec<T>, errors::Error> {
        let collection: Cow<'static, str> = collection.into();
        let (sql, params) = query.to_sql("body", &collection);

        self.connection
            .call(move |c| {
                let mut stmt = c.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |r| {
                    let body: String = r.get(0)?;
                    decode(0, &body)
                })?;

                rows.collect::<Result<Vec<T>, _>>()
            })
            .await
            .map_err_as_system(ADVICE_DB_ERROR)
    }

    #[instrument("db.sqlite.count", skip(self, collection), err(Display))]
    async fn count<C: Into<Cow<'static, str>> + Send>(
        &self,
        collection: C,
        query: Query,
    ) -> Result<usize, errors::Error> {
        let collection: Cow<'static, str> = collection.into();
        let (sql, params) = query.to_sql("COUNT(*)", &collection);

        self.connection
            .call(move |c| c.query_one(&sql, rusqlite::params_from_iter(params.iter()), |r| r.get(0)))
            .await
            .map_err_as_system(ADVICE_DB_ERROR)
    }

    #[instrument("db.sqlite.insert_one", skip(self, collection, id, document), err(Display))]
    async fn insert_one<
        C: Into<Cow<'static, str>> + Send,
        K: Into<Cow<'static, str>> + Send,
        T: serde::Serialize + Send + 'static,
    >(
        &self,
        collection: C,
        id: K,
        document: T,
    ) -> Result<bool, errors::Error> {
        let serialized = serde_json::to_string(&document).wrap_err_as_system(
            "Failed to serialize a document for storage.",
            ADVICE_REPORT_DEV,
        )?;

        let collection = collection.into();
        let id = id.into();

        let inserted = self
            .connection
            .call(move |c| {
                c.execute(
                    "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)
                    ON CONFLICT (collection, id) DO NOTHING",
                    (collection, id, serialized),
                )
            })
            .await
            .map_err_as_system(ADVICE_DB_ERROR)?;

        Ok(inserted > 0)
    }

    #[instrument("db.sqlite.insert_many", skip(self, collection, documents), err(Display))]
    async fn insert_many<
        C: Into<Cow<'static, str>> + Send,
        T: serde::Serialize + Send + 'static,
    >(
        &self,
        collection: C,
        documents: Vec<(String, T)>,
    ) -> Result<Vec<String>, errors::Error> {
        let serialized = documents
            .into_iter()
            .map(|(id, document)| serde_json::to_string(&document).map(|body| (id, body)))
            .collect::<Result<Vec<_>, _>>()
            .wrap_err_as_system(
                "Failed to serialize a document for storage.",
                ADVICE_REPORT_DEV,
            )?;

        let collection = collection.into();

        self.connection
            .call(move |c| -> rusqlite::Result<Vec<String>> {
                let tx = c.transaction()?;
                let mut inserted = Vec::with_capacity(serialized.len());

                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)
                        ON CONFLICT (collection, id) DO NOTHING",
                    )?;

                    for (id, body) in serialized {
                        if stmt.execute((&collection, &id, &body))? > 0 {
                            inserted.push(id);
                        }
                    }
                }

                tx.commit()?;
                Ok(inserted)
            })
            .await
            .map_err_as_system(ADVICE_DB_ERROR)
    }

    #[instrument("db.sqlite.update_one", skip(self, collection, id, set), err(Display))]
    async fn update_one<C: Into<Cow<'static, str>> + Send, K: Into<Cow<'static, str>> + Send>(
        &self,
        collection: C,
        id: K,
        set: serde_json::Map<String, serde_json::Value>,
    ) -> Result<bool, errors::Error> {
        let collection = collection.into();
        let id = id.into();

        self.connection
            .call(move |c| -> rusqlite::Result<bool> {
                let tx = c.transaction()?;

                let existing: Option<serde_json::Value> = tx
                    .query_one(
                        "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                        (&collection, &id),
                        |r| {
                            let body: String = r.get(0)?;
                            decode(0, &body)
                        },
                    )
                    .optional()?;

                let Some(mut document) = existing else {
                    return Ok(false);
                };

                if let Some(fields) = document.as_object_mut() {
                    fields.extend(set);
                }

                let body = serde_json::to_string(&document).map_err(|e| {
                    rusqlite::Error::ToSqlConversionFailure(Box::new(e))
                })?;

                tx.execute(
                    "UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2",
                    (&collection, &id, &body),
                )?;

                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err_as_system(ADVICE_DB_ERROR)
    }
}

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    )",
];

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::Order;

    fn doc(id: &str, created_time: &str) -> (String, serde_json::Value) {
        (id.to_string(), json!({ "id": id, "created_time": created_time }))
    }

    #[tokio::test]
    async fn test_insert_and_find_one() {
        let db = SqliteDatabase::open_in_memory().await.unwrap();

        assert_eq!(
            Option::<serde_json::Value>::None,
            db.find_one("pages", "missing").await.unwrap()
        );

        assert!(db.insert_one("pages", "123", json!({ "id": "123", "name": "Test" })).await.unwrap());
        assert!(!db.insert_one("pages", "123", json!({ "id": "123", "name": "Other" })).await.unwrap());

        let page: serde_json::Value = db.find_one("pages", "123").await.unwrap().unwrap();
        assert_eq!(page["name"], "Test");

        // Collections are independent namespaces
        let post: Option<serde_json::Value> = db.find_one("posts", "123").await.unwrap();
        assert_eq!(post, None);
    }

    #[tokio::test]
    async fn test_insert_many_skips_existing() {
        let db = SqliteDatabase::open_in_memory().await.unwrap();

        let inserted = db
            .insert_many("posts", vec![doc("1_a", "2017-01-01T00:00:00+0000"), doc("1_b", "2017-01-02T00:00:00+0000")])
            .await
            .unwrap();
        assert_eq!(inserted, vec!["1_a".to_string(), "1_b".to_string()]);

        let inserted = db
            .insert_many("posts", vec![doc("1_b", "2017-01-02T00:00:00+0000"), doc("1_c", "2017-01-03T00:00:00+0000")])
            .await
            .unwrap();
        assert_eq!(inserted, vec!["1_c".to_string()]);

        assert_eq!(db.count("posts", Query::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_find_prefix_sorted() {
        let db = SqliteDatabase::open_in_memory().await.unwrap();

        db.insert_many(
            "posts",
            vec![
                doc("1_a", "2017-01-03T00:00:00+0000"),
                doc("1_b", "2017-01-01T00:00:00+0000"),
                doc("1_c", "2017-01-02T00:00:00+0000"),
                doc("12_a", "2016-01-01T00:00:00+0000"),
            ],
        )
        .await
        .unwrap();

        let posts: Vec<serde_json::Value> = db
            .find("posts", Query::prefix("1_").sort_by("created_time", Order::Ascending))
            .await
            .unwrap();
        let ids: Vec<&str> = posts.iter().map(|p| p["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["1_b", "1_c", "1_a"]);

        let newest: Vec<serde_json::Value> = db
            .find("posts", Query::prefix("1_").sort_by("created_time", Order::Descending).limit(1))
            .await
            .unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0]["id"], "1_a");

        assert_eq!(db.count("posts", Query::prefix("12_")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_missing_field() {
        let db = SqliteDatabase::open_in_memory().await.unwrap();

        db.insert_many(
            "posts",
            vec![
                ("1_a".to_string(), json!({ "id": "1_a", "comments": { "data": [] } })),
                ("1_b".to_string(), json!({ "id": "1_b" })),
                ("1_c".to_string(), json!({ "id": "1_c", "comments": null })),
            ],
        )
        .await
        .unwrap();

        let posts: Vec<serde_json::Value> = db
            .find("posts", Query::prefix("1_").missing("comments").sort_by("id", Order::Ascending))
            .await
            .unwrap();
        let ids: Vec<&str> = posts.iter().map(|p| p["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["1_b", "1_c"]);
    }

    #[tokio::test]
    async fn test_update_one_sets_fields() {
        let db = SqliteDatabase::open_in_memory().await.unwrap();

        db.insert_one("pages", "123", json!({ "id": "123", "name": "Test", "nposts": 1 }))
            .await
            .unwrap();

        let mut set = serde_json::Map::new();
        set.insert("nposts".into(), json!(5));
        set.insert("error_date".into(), json!("2017-01-01T00:00:00+0000"));
        assert!(db.update_one("pages", "123", set.clone()).await.unwrap());
        assert!(!db.update_one("pages", "456", set).await.unwrap());

        let page: serde_json::Value = db.find_one("pages", "123").await.unwrap().unwrap();
        assert_eq!(page["name"], "Test");
        assert_eq!(page["nposts"], 5);
        assert_eq!(page["error_date"], "2017-01-01T00:00:00+0000");
    }
}
