mod comments;
mod posts;

pub use comments::CommentsReport;
pub use posts::PostsReport;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing_batteries::prelude::*;

use crate::errors::ScrapeError;
use crate::graph::{GraphClient, Window, app_access_token};
use crate::listeners::{Listener, ListenerKind};
use crate::models::{Comment, Post};
use crate::services::Services;

/// Whether the scraper currently holds a Graph API access token.
#[derive(Clone, Default)]
pub enum Session {
    #[default]
    Unauthenticated,
    Authenticated(GraphClient),
}

impl Session {
    /// The authenticated client, required by every data operation.
    pub fn client(&self) -> Result<&GraphClient, ScrapeError> {
        match self {
            Session::Authenticated(client) => Ok(client),
            Session::Unauthenticated => Err(ScrapeError::NotAuthenticated),
        }
    }

    #[cfg(test)]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }
}

/// Scrapes pages, groups, posts and comments from the Graph API into the
/// document store.
pub struct GraphScraper<S: Services> {
    services: S,
    session: Session,
    cancellation: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct GraphObject {
    id: String,
}

impl<S: Services> GraphScraper<S> {
    pub fn new(services: S) -> Self {
        Self {
            services,
            session: Session::Unauthenticated,
            cancellation: CancellationToken::new(),
        }
    }

    /// Uses a pre-issued access token instead of exchanging app credentials.
    pub fn with_token(mut self, access_token: impl ToString) -> Result<Self, ScrapeError> {
        let client = GraphClient::new(self.services.config().graph.api_url(), access_token)
            .map_err(ScrapeError::AuthenticationFailed)?;
        self.session = Session::Authenticated(client);
        Ok(self)
    }

    /// Stops a posts scrape (with a checkpoint) or a collection comments pass
    /// once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Authenticates with whichever credentials the configuration provides,
    /// preferring a pre-issued access token over app credentials.
    pub async fn authenticate_from_config(&mut self) -> Result<(), ScrapeError>
    where
        S: Send + Sync,
    {
        let config = self.services.config();

        if let Some(token) = config.graph.access_token.as_deref() {
            let client = GraphClient::new(config.graph.api_url(), token)
                .map_err(ScrapeError::AuthenticationFailed)?;
            self.session = Session::Authenticated(client);
            return Ok(());
        }

        match (config.graph.app_id.as_deref(), config.graph.app_secret.as_deref()) {
            (Some(app_id), Some(app_secret)) => {
                self.authenticate(app_id, app_secret).await?;
                Ok(())
            }
            _ => Err(ScrapeError::NotAuthenticated),
        }
    }

    async fn resolve(&self, client: &GraphClient, collection_id: &str) -> Result<String, ScrapeError> {
        let object: GraphObject = client
            .get_object(collection_id, &[])
            .await
            .map_err(ScrapeError::RemoteApi)?;

        if object.id != collection_id {
            debug!(collection.id = %object.id, "Resolved '{collection_id}' to '{}'.", object.id);
        }

        Ok(object.id)
    }
}

#[async_trait::async_trait]
impl<S: Services + Send + Sync> Listener for GraphScraper<S> {
    fn source(&self) -> &str {
        "https://www.facebook.com"
    }

    fn kind(&self) -> ListenerKind {
        ListenerKind::Api
    }

    #[instrument("listeners.graph.authenticate", skip(self, access_secret), err(Display))]
    async fn authenticate(&mut self, access_id: &str, access_secret: &str) -> Result<String, ScrapeError> {
        let api_url = self.services.config().graph.api_url().to_string();

        let result = match app_access_token(&api_url, access_id, access_secret).await {
            Ok(token) => GraphClient::new(&api_url, &token).map(|client| (token, client)),
            Err(err) => Err(err),
        };

        match result {
            Ok((token, client)) => {
                self.session = Session::Authenticated(client);
                info!("Authenticated with the Graph API as app '{access_id}'.");
                Ok(token)
            }
            Err(err) => {
                self.session = Session::Unauthenticated;
                Err(ScrapeError::AuthenticationFailed(err))
            }
        }
    }

    async fn fetch_posts(&self, collection_id: &str, window: Window) -> Result<Vec<Post>, ScrapeError> {
        Ok(self.scrape_posts(collection_id, window).await?.posts)
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>, ScrapeError> {
        let client = self.session.client()?;
        let bundle = self.collect_comments(client, post_id).await?;

        if !self.store_comments(post_id, &bundle).await? {
            warn!("Post '{post_id}' is not in the database, its comments were not saved.");
        }

        Ok(bundle.data)
    }
}
