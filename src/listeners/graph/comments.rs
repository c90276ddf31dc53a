use serde_json::Map;
use tracing_batteries::prelude::*;

use super::GraphScraper;
use crate::db::{DocumentStore, Order, Query};
use crate::errors::ScrapeError;
use crate::graph::{ConnectionRequest, GraphClient};
use crate::models::{Comment, CommentBundle, CommentSummary, POSTS, Post, post_prefix};
use crate::services::Services;

const COMMENT_FIELDS: &str = "id,message,created_time,from,like_count,comment_count";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentsReport {
    /// Posts which had their comments stored.
    pub posts: usize,
    pub comments: usize,
}

impl<S: Services> GraphScraper<S> {
    /// Fetches and stores the comments of every stored post in a collection
    /// which does not have them yet.
    #[instrument("listeners.graph.fetch_collection_comments", skip(self), err(Display))]
    pub async fn fetch_collection_comments(&self, collection_id: &str) -> Result<CommentsReport, ScrapeError> {
        let client = self.session.client()?;
        let id = self.resolve(client, collection_id).await?;

        let posts = self.services.store().partition::<Post>(POSTS);
        let stored = posts
            .count(Query::prefix(post_prefix(&id)))
            .await
            .map_err(ScrapeError::Store)?;
        let pending = posts
            .find(
                Query::prefix(post_prefix(&id))
                    .missing("comments")
                    .sort_by("created_time", Order::Descending),
            )
            .await
            .map_err(ScrapeError::Store)?;

        info!(
            collection.id = %id,
            "Fetching comments for {} of {stored} stored posts.",
            pending.len()
        );

        let mut report = CommentsReport::default();
        for post in pending {
            let bundle = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    warn!(
                        collection.id = %id,
                        "Interrupted after storing the comments of {} posts.",
                        report.posts
                    );
                    return Err(ScrapeError::Interrupted);
                },
                bundle = self.collect_comments(client, &post.id) => bundle?,
            };
            self.store_comments(&post.id, &bundle).await?;

            report.posts += 1;
            report.comments += bundle.data.len();
            debug!(post.id = %post.id, "Stored {} comments.", bundle.data.len());
        }

        info!(
            collection.id = %id,
            "{} comments saved to the database for {} posts.",
            report.comments,
            report.posts
        );

        Ok(report)
    }

    pub(super) async fn collect_comments(&self, client: &GraphClient, post_id: &str) -> Result<CommentBundle, ScrapeError> {
        let request = ConnectionRequest::new(post_id, "comments")
            .param("fields", COMMENT_FIELDS)
            .param("summary", "true")
            .param("limit", self.services.config().graph.page_limit());

        let (data, summary) = client
            .get_all_connections::<Comment>(request)
            .await
            .map_err(ScrapeError::RemoteApi)?;

        let summary = summary
            .and_then(|summary| serde_json::from_value::<CommentSummary>(summary).ok())
            .unwrap_or(CommentSummary {
                total_count: data.len() as u64,
            });

        Ok(CommentBundle { data, summary })
    }

    /// Embeds the bundle on the stored post, returning whether the post exists.
    pub(super) async fn store_comments(&self, post_id: &str, bundle: &CommentBundle) -> Result<bool, ScrapeError> {
        let comments = serde_json::to_value(bundle)
            .map_err(|err| {
                ScrapeError::Store(human_errors::system(
                    format!("The comments for '{post_id}' could not be serialized. {err}"),
                    &["Please report this issue to the development team via GitHub."],
                ))
            })?;

        let mut set = Map::new();
        set.insert("comments".into(), comments);

        self.services
            .store()
            .update_one(POSTS, post_id.to_string(), set)
            .await
            .map_err(ScrapeError::Store)
    }
}
