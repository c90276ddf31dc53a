use std::path::PathBuf;

use serde::Deserialize;

use crate::prelude::*;

pub const DEFAULT_API_URL: &str = "https://graph.facebook.com/v2.10";
pub const DEFAULT_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_DATABASE_PATH: &str = "graph-scraper.sqlite";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

pub trait Mergeable {
    fn merge(&self, other: &Self) -> Self;
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, human_errors::Error> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).wrap_err_as_user(
            format!("We could not read your config file '{}'.", path.display()),
            &[
                "Ensure the file exists and is readable.",
                "Check that you have the necessary permissions to read the file.",
            ],
        )?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, human_errors::Error> {
        toml::from_str(contents).wrap_err_as_user(
            "Your configuration file could not be loaded.",
            &[
                "Ensure that the file is valid TOML.",
                "Make sure that you are using the correct configuration file format.",
            ],
        )
    }

    pub fn from_env() -> Result<Self, human_errors::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the environment override layer from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, human_errors::Error> {
        let page_limit = lookup("GRAPH_PAGE_LIMIT")
            .map(|limit| {
                limit.parse::<u32>().wrap_err_as_user(
                    format!("The GRAPH_PAGE_LIMIT value '{limit}' is not a valid number."),
                    &["Set GRAPH_PAGE_LIMIT to a whole number between 1 and 100."],
                )
            })
            .transpose()?;

        Ok(Self {
            graph: GraphConfig {
                api_url: lookup("GRAPH_API_URL"),
                app_id: lookup("GRAPH_APP_ID"),
                app_secret: lookup("GRAPH_APP_SECRET"),
                access_token: lookup("GRAPH_ACCESS_TOKEN"),
                page_limit,
            },
            database: DatabaseConfig {
                path: lookup("GRAPH_SCRAPER_DATABASE"),
            },
        })
    }
}

impl Mergeable for Config {
    fn merge(&self, other: &Self) -> Self {
        Config {
            graph: self.graph.merge(&other.graph),
            database: self.database.merge(&other.database),
        }
    }
}

#[derive(Clone, Deserialize, Default)]
pub struct GraphConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_secret: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub page_limit: Option<u32>,
}

impl GraphConfig {
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
    }

    pub fn page_limit(&self) -> u32 {
        self.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1)
    }
}

// Credentials are kept out of debug output.
impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("api_url", &self.api_url)
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

impl Mergeable for GraphConfig {
    fn merge(&self, other: &Self) -> Self {
        GraphConfig {
            api_url: other.api_url.clone().or_else(|| self.api_url.clone()),
            app_id: other.app_id.clone().or_else(|| self.app_id.clone()),
            app_secret: other.app_secret.clone().or_else(|| self.app_secret.clone()),
            access_token: other.access_token.clone().or_else(|| self.access_token.clone()),
            page_limit: other.page_limit.or(self.page_limit),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_DATABASE_PATH)
    }
}

impl Mergeable for DatabaseConfig {
    fn merge(&self, other: &Self) -> Self {
        DatabaseConfig {
            path: other.path.clone().or_else(|| self.path.clone()),
        }
    }
}
