use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing_batteries::prelude::*;

use super::GraphScraper;
use crate::db::{DocumentStore, Order, Query};
use crate::errors::ScrapeError;
use crate::graph::{ConnectionRequest, GraphClient, Window, time};
use crate::models::{Collection, CollectionKind, PAGES, POSTS, Post};
use crate::services::Services;

/// The post fields requested from the Graph API, with one aliased summary
/// per reaction type so that counts arrive without paging the reactions.
pub const POST_FIELDS: &str = concat!(
    "id,message,created_time,description,link,name,permalink_url,type,",
    "shares,",
    "reactions.type(LIKE).limit(0).summary(true).as(reactions_like),",
    "reactions.type(LOVE).limit(0).summary(true).as(reactions_love),",
    "reactions.type(WOW).limit(0).summary(true).as(reactions_wow),",
    "reactions.type(HAHA).limit(0).summary(true).as(reactions_haha),",
    "reactions.type(SAD).limit(0).summary(true).as(reactions_sad),",
    "reactions.type(ANGRY).limit(0).summary(true).as(reactions_angry),",
    "reactions.type(THANKFUL).limit(0).summary(true).as(reactions_thankful)"
);

/// The outcome of a completed posts scrape.
#[derive(Debug, Clone)]
pub struct PostsReport {
    pub collection: Collection,
    pub pages: usize,
    /// Posts which were not in the store before this scrape.
    pub posts: Vec<Post>,
}

impl PostsReport {
    pub fn added(&self) -> usize {
        self.posts.len()
    }
}

#[derive(Debug, Deserialize)]
struct MetadataProbe {
    #[serde(default)]
    metadata: Option<ObjectMetadata>,
}

#[derive(Debug, Deserialize)]
struct ObjectMetadata {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassKind {
    /// Walks back from the oldest stored post, or from `until` on a first scrape.
    Backfill,
    /// Picks up posts published since the newest stored post.
    Refresh,
}

#[derive(Debug, Clone, Copy)]
struct Pass {
    kind: PassKind,
    window: Window,
}

#[derive(Default)]
struct Progress {
    stored: Vec<Post>,
    pages: usize,
    last_processed: Option<DateTime<Utc>>,
}

impl<S: Services> GraphScraper<S> {
    /// Stores every post of a page or group within `window`, resuming from
    /// whatever an earlier scrape of the same collection left behind.
    #[instrument("listeners.graph.scrape_posts", skip(self, window), fields(collection.id = %collection_id), err(Display))]
    pub async fn scrape_posts(&self, collection_id: &str, window: Window) -> Result<PostsReport, ScrapeError> {
        let client = self.session.client()?;
        let id = self.resolve(client, collection_id).await?;
        let (mut collection, created) = self.load_or_create(client, &id).await?;
        let passes = self.plan(&collection, created, window).await?;

        let mut progress = Progress::default();
        for pass in &passes {
            if let Err(err) = self.walk(client, &mut collection, pass, &mut progress).await {
                self.checkpoint(&mut collection, &progress, &err).await;
                return Err(err);
            }
        }

        collection.nposts += progress.stored.len() as u64;
        collection.error_date = None;
        self.save_cursors(&collection).await?;

        info!(
            collection.id = %collection.id,
            "{} posts saved to the database from {} pages.",
            progress.stored.len(),
            progress.pages
        );

        Ok(PostsReport {
            collection,
            pages: progress.pages,
            posts: progress.stored,
        })
    }

    async fn load_or_create(&self, client: &GraphClient, id: &str) -> Result<(Collection, bool), ScrapeError> {
        let pages = self.services.store().partition::<Collection>(PAGES);
        if let Some(collection) = pages.get(id).await.map_err(ScrapeError::Store)? {
            return Ok((collection, false));
        }

        let probe: MetadataProbe = client
            .get_object(id, &[("metadata", "1")])
            .await
            .map_err(ScrapeError::RemoteApi)?;

        let object_type = probe.metadata.map(|m| m.kind).unwrap_or_default();
        let kind = CollectionKind::from_metadata_type(&object_type).ok_or_else(|| {
            ScrapeError::RemoteApi(human_errors::user(
                format!("The Graph API object '{id}' is a '{object_type}', but only pages and groups can be scraped."),
                &["Make sure that you are using the id of a page or a group."],
            ))
        })?;

        let metadata: Map<String, Value> = client
            .get_object(id, &[("fields", kind.metadata_fields())])
            .await
            .map_err(ScrapeError::RemoteApi)?;

        let collection = Collection::new(id, kind, metadata);
        pages
            .insert(id, collection.clone())
            .await
            .map_err(ScrapeError::Store)?;

        info!(collection.id = %id, "Added the {kind} '{}' to the database.", collection.name);
        Ok((collection, true))
    }

    async fn plan(&self, collection: &Collection, created: bool, window: Window) -> Result<Vec<Pass>, ScrapeError> {
        let mut passes = if created {
            vec![Pass {
                kind: PassKind::Backfill,
                window,
            }]
        } else {
            let oldest = self
                .services
                .store()
                .partition::<Post>(POSTS)
                .first(Query::prefix(collection.post_prefix()).sort_by("created_time", Order::Ascending))
                .await
                .map_err(ScrapeError::Store)?
                .map(|post| post.created_time);

            let mut passes = vec![Pass {
                kind: PassKind::Backfill,
                window: window.clamp_until(oldest),
            }];

            if let Some(latest) = collection.latest_date {
                passes.push(Pass {
                    kind: PassKind::Refresh,
                    window: window.clamp_since(Some(latest)),
                });
            }

            passes
        };

        passes.retain(|pass| {
            if pass.window.is_empty() {
                debug!(collection.id = %collection.id, "Skipping the {:?} pass, its window is empty.", pass.kind);
                false
            } else {
                true
            }
        });

        Ok(passes)
    }

    async fn walk(
        &self,
        client: &GraphClient,
        collection: &mut Collection,
        pass: &Pass,
        progress: &mut Progress,
    ) -> Result<(), ScrapeError> {
        let posts = self.services.store().partition::<Post>(POSTS);
        let request = ConnectionRequest::new(&collection.id, collection.kind.posts_connection())
            .param("fields", POST_FIELDS)
            .param("limit", self.services.config().graph.page_limit())
            .window(&pass.window);

        let mut pages = client.pages::<Post>(request);
        let mut newest: Option<DateTime<Utc>> = None;

        loop {
            let page = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => return Err(ScrapeError::Interrupted),
                page = pages.next_page() => page.map_err(ScrapeError::RemoteApi)?,
            };

            let Some(page) = page else {
                break;
            };
            progress.pages += 1;

            if page.data.is_empty() {
                debug!(collection.id = %collection.id, "Page {} had no posts.", pages.fetched());
                continue;
            }

            if newest.is_none() {
                newest = page.data.first().map(|post| post.created_time);

                // A backfill starts at the newest post it will ever see.
                if pass.kind == PassKind::Backfill {
                    collection.latest_date = collection.latest_date.max(newest);
                }
            }

            let last = page.data.last().map(|post| post.created_time);
            let documents = page
                .data
                .iter()
                .map(|post| (post.id.clone(), post.clone()))
                .collect();

            let mut inserted: HashSet<String> = posts
                .insert_many(documents)
                .await
                .map_err(ScrapeError::Store)?
                .into_iter()
                .collect();

            let received = page.data.len();
            progress
                .stored
                .extend(page.data.into_iter().filter(|post| inserted.remove(&post.id)));
            progress.last_processed = last;

            debug!(
                collection.id = %collection.id,
                "Processed {received} posts from page {}, {} new so far.",
                pages.fetched(),
                progress.stored.len()
            );
        }

        if pass.kind == PassKind::Refresh {
            collection.latest_date = collection.latest_date.max(newest);
        }

        Ok(())
    }

    /// Persists the posts an unfinished scrape already stored. Only a
    /// resumable failure records `error_date`.
    async fn checkpoint(&self, collection: &mut Collection, progress: &Progress, err: &ScrapeError) {
        if err.is_resumable() {
            if let Some(last) = progress.last_processed {
                collection.error_date = Some(last);
            }
        }
        collection.nposts += progress.stored.len() as u64;

        match self.save_cursors(collection).await {
            Ok(()) => warn!(
                collection.id = %collection.id,
                "The scrape stopped early, {} posts were saved before it did.",
                progress.stored.len()
            ),
            Err(err) => error!(
                collection.id = %collection.id,
                "Failed to save a checkpoint for the interrupted scrape: {err}"
            ),
        }
    }

    async fn save_cursors(&self, collection: &Collection) -> Result<(), ScrapeError> {
        let mut set = Map::new();
        set.insert("nposts".into(), Value::from(collection.nposts));
        set.insert(
            "latest_date".into(),
            collection.latest_date.as_ref().map(time::format).into(),
        );
        set.insert(
            "error_date".into(),
            collection.error_date.as_ref().map(time::format).into(),
        );

        self.services
            .store()
            .update_one(PAGES, collection.id.clone(), set)
            .await
            .map_err(ScrapeError::Store)?;

        Ok(())
    }
}
