pub use crate::config::{Config, Mergeable};
pub use crate::db::{DocumentStore, Order, Partition, Query};
pub use crate::errors::ScrapeError;
pub use crate::listeners::{Listener, ListenerKind};
pub use crate::services::Services;

pub use human_errors::ResultExt;
pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
pub use tracing_batteries::prelude::*;
