use human_errors::ResultExt;
use serde::Deserialize;

use super::time::Window;

/// A request for one page of a Graph API connection (e.g. `<page id>/posts`).
///
/// `base` holds the parameters the caller asked for, `cursor` holds those
/// taken from the previous page's `next` link. When both name the same
/// parameter the cursor wins, since the API uses it to move the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub id: String,
    pub connection: String,
    base: Vec<(String, String)>,
    cursor: Vec<(String, String)>,
}

impl ConnectionRequest {
    pub fn new(id: impl ToString, connection: impl ToString) -> Self {
        Self {
            id: id.to_string(),
            connection: connection.to_string(),
            base: Vec::new(),
            cursor: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl ToString, value: impl ToString) -> Self {
        let key = key.to_string();
        self.base.retain(|(k, _)| k != &key);
        self.base.push((key, value.to_string()));
        self
    }

    pub fn window(self, window: &Window) -> Self {
        let request = match window.since {
            Some(since) => self.param("since", since.timestamp()),
            None => self,
        };

        match window.until {
            Some(until) => request.param("until", until.timestamp()),
            None => request,
        }
    }

    pub fn path(&self) -> String {
        format!(
            "{}/{}",
            urlencoding::encode(&self.id),
            urlencoding::encode(&self.connection)
        )
    }

    /// The query parameters to send, excluding the access token.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = self.cursor.clone();
        for (key, value) in &self.base {
            if !params.iter().any(|(k, _)| k == key) {
                params.push((key.clone(), value.clone()));
            }
        }

        params
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.cursor
            .iter()
            .chain(self.base.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Builds the request for the page a `next` link points at.
    ///
    /// The link's own query parameters (minus the access token) become the
    /// cursor, and every parameter of the original request is carried forward
    /// because some endpoints drop the field selection and window bounds from
    /// their `next` links.
    pub fn follow(&self, next: &str) -> Result<Self, human_errors::Error> {
        let url = reqwest::Url::parse(next).wrap_err_as_system(
            format!("The Graph API returned a pagination link which is not a valid URL: '{next}'."),
            &["Please report this issue to the development team via GitHub."],
        )?;

        let cursor = url
            .query_pairs()
            .filter(|(key, _)| key != "access_token")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        Ok(Self {
            id: self.id.clone(),
            connection: self.connection.clone(),
            base: self.base.clone(),
            cursor,
        })
    }
}

/// A single page of results from a Graph API connection.
#[derive(Debug, Deserialize)]
pub struct ConnectionPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
    #[serde(default)]
    pub summary: Option<serde_json::Value>,
}

impl<T> ConnectionPage<T> {
    pub fn next(&self) -> Option<&str> {
        self.paging.as_ref()?.next.as_deref()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::time;

    fn request() -> ConnectionRequest {
        ConnectionRequest::new("216311481960", "posts")
            .param("fields", "message,created_time")
            .param("limit", 100)
            .window(&Window::new(
                None,
                Some(time::parse("2017-10-01T00:00:00+0000").unwrap()),
            ))
    }

    #[test]
    fn test_params() {
        let request = request();
        assert_eq!(
            request.params(),
            vec![
                ("fields".to_string(), "message,created_time".to_string()),
                ("limit".to_string(), "100".to_string()),
                ("until".to_string(), "1506816000".to_string()),
            ]
        );
        assert_eq!(request.path(), "216311481960/posts");
    }

    #[test]
    fn test_param_replaces_existing() {
        let request = ConnectionRequest::new("1", "posts").param("limit", 10).param("limit", 25);
        assert_eq!(request.params(), vec![("limit".to_string(), "25".to_string())]);
    }

    #[test]
    fn test_follow_drops_access_token_and_keeps_fields() {
        let next = request()
            .follow("https://graph.facebook.com/v2.10/216311481960/posts?access_token=secret&limit=100&until=1506000000&__paging_token=abc")
            .unwrap();

        let params = next.params();
        assert!(params.iter().all(|(k, _)| k != "access_token"));
        assert_eq!(next.get("fields"), Some("message,created_time"));
        assert_eq!(next.get("until"), Some("1506000000"));
        assert_eq!(next.get("__paging_token"), Some("abc"));
        assert_eq!(params.iter().filter(|(k, _)| k == "until").count(), 1);
    }

    #[test]
    fn test_follow_replaces_previous_cursor() {
        let second = request()
            .follow("https://graph.facebook.com/v2.10/216311481960/posts?after=first")
            .unwrap();
        let third = second
            .follow("https://graph.facebook.com/v2.10/216311481960/posts?until=1505000000")
            .unwrap();

        assert_eq!(third.get("after"), None);
        assert_eq!(third.get("until"), Some("1505000000"));
        assert_eq!(third.get("limit"), Some("100"));
    }

    #[test]
    fn test_follow_rejects_invalid_links() {
        assert!(request().follow("not a url").is_err());
    }

    #[test]
    fn test_page_next() {
        let page: ConnectionPage<serde_json::Value> = serde_json::from_str(
            r#"{ "data": [{ "id": "1" }], "paging": { "next": "https://example.com/next" } }"#,
        )
        .unwrap();
        assert_eq!(page.next(), Some("https://example.com/next"));

        let page: ConnectionPage<serde_json::Value> = serde_json::from_str(r#"{ "data": [] }"#).unwrap();
        assert_eq!(page.next(), None);
    }
}
