use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::time;

/// Store collection holding [`Collection`] documents.
pub const PAGES: &str = "pages";
/// Store collection holding [`Post`] documents, with any comments embedded.
pub const POSTS: &str = "posts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Page,
    Group,
}

impl CollectionKind {
    pub fn from_metadata_type(kind: &str) -> Option<Self> {
        match kind {
            "page" => Some(CollectionKind::Page),
            "group" => Some(CollectionKind::Group),
            _ => None,
        }
    }

    /// The Graph API connection which lists the posts of this kind of collection.
    pub fn posts_connection(&self) -> &'static str {
        match self {
            CollectionKind::Page => "posts",
            CollectionKind::Group => "feed",
        }
    }

    pub fn metadata_fields(&self) -> &'static str {
        match self {
            CollectionKind::Page => {
                "id,name,about,category,description,fan_count,link,website,username"
            }
            CollectionKind::Group => "id,name,description,privacy,updated_time,link",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionKind::Page => write!(f, "page"),
            CollectionKind::Group => write!(f, "group"),
        }
    }
}

/// A page or group whose posts are being scraped, along with its sync cursors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: CollectionKind,

    #[serde(default)]
    pub nposts: u64,

    /// The `created_time` of the newest post which has been stored.
    #[serde(default, with = "time::option")]
    pub latest_date: Option<DateTime<Utc>>,

    /// The `created_time` of the last post stored before a scrape was cut short.
    #[serde(default, with = "time::option")]
    pub error_date: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Collection {
    pub fn new(id: impl ToString, kind: CollectionKind, mut metadata: Map<String, Value>) -> Self {
        metadata.remove("id");
        let name = match metadata.remove("name") {
            Some(Value::String(name)) => name,
            _ => String::new(),
        };

        Self {
            id: id.to_string(),
            name,
            kind,
            nposts: 0,
            latest_date: None,
            error_date: None,
            metadata,
        }
    }

    /// Post ids are scoped by the id of the collection they belong to.
    pub fn post_prefix(&self) -> String {
        post_prefix(&self.id)
    }
}

pub fn post_prefix(collection_id: &str) -> String {
    format!("{collection_id}_")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,

    #[serde(with = "time")]
    pub created_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<CommentBundle>,

    /// Reactions, shares, links and anything else the field selection returned.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,

    #[serde(with = "time")]
    pub created_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// All of the comments on a post, embedded on the post as its `comments` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentBundle {
    pub data: Vec<Comment>,
    #[serde(default)]
    pub summary: CommentSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentSummary {
    #[serde(default)]
    pub total_count: u64,
}
