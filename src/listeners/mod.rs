mod graph;

pub use graph::GraphScraper;

use crate::errors::ScrapeError;
use crate::graph::Window;
use crate::models::{Comment, Post};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    /// Reads structured data from a source's API.
    Api,
    /// Extracts data from a source's rendered web pages.
    Scraper,
}

/// The operations a source-specific listener can offer.
///
/// A listener implements whichever operations its source supports; the rest
/// report [`ScrapeError::NotImplemented`].
#[async_trait::async_trait]
pub trait Listener: Send + Sync {
    /// The website the listener collects data from.
    fn source(&self) -> &str;

    fn kind(&self) -> ListenerKind;

    /// Exchanges the provider's credentials for an access token.
    async fn authenticate(&mut self, _access_id: &str, _access_secret: &str) -> Result<String, ScrapeError> {
        Err(ScrapeError::NotImplemented("authenticate"))
    }

    /// Fetches the posts of a collection (a page, group, channel, ...) and
    /// returns those which were not already stored.
    async fn fetch_posts(&self, _collection_id: &str, _window: Window) -> Result<Vec<Post>, ScrapeError> {
        Err(ScrapeError::NotImplemented("fetch_posts"))
    }

    /// Fetches every comment on a post.
    async fn fetch_comments(&self, _post_id: &str) -> Result<Vec<Comment>, ScrapeError> {
        Err(ScrapeError::NotImplemented("fetch_comments"))
    }
}
