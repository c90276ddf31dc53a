use human_errors::ResultExt;
use serde::{Deserialize, de::DeserializeOwned};
use tracing_batteries::prelude::*;

use super::request::{ConnectionPage, ConnectionRequest};

/// An authenticated handle to the Graph API.
///
/// A client can only be built from an access token, so holding one is proof
/// that the session has been authenticated.
#[derive(Clone)]
pub struct GraphClient {
    api_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl GraphClient {
    pub fn new(api_url: impl ToString, access_token: impl ToString) -> Result<Self, human_errors::Error> {
        let client = reqwest::Client::builder()
            .user_agent("graph-scraper")
            .build()
            .map_err_as_system(&["Report the issue to the development team on GitHub."])?;

        Ok(Self {
            api_url: api_url.to_string().trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            client,
        })
    }

    #[cfg(test)]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[instrument("graph.get_object", skip(self, params), err(Display))]
    pub async fn get_object<T: DeserializeOwned>(
        &self,
        id: &str,
        params: &[(&str, &str)],
    ) -> Result<T, human_errors::Error> {
        let url = format!("{}/{}", self.api_url, urlencoding::encode(id));
        self.call(&url, params).await
    }

    #[instrument("graph.get_connection", skip(self, request), fields(graph.id = %request.id, graph.connection = %request.connection), err(Display))]
    pub async fn get_connection<T: DeserializeOwned>(
        &self,
        request: &ConnectionRequest,
    ) -> Result<ConnectionPage<T>, human_errors::Error> {
        let url = format!("{}/{}", self.api_url, request.path());
        let params = request.params();
        let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        self.call(&url, &params).await
    }

    /// Pages through a connection, returning every item it lists.
    pub async fn get_all_connections<T: DeserializeOwned>(
        &self,
        request: ConnectionRequest,
    ) -> Result<(Vec<T>, Option<serde_json::Value>), human_errors::Error> {
        let mut pages = self.pages::<T>(request);
        let mut items = Vec::new();
        let mut summary = None;

        while let Some(page) = pages.next_page().await? {
            if summary.is_none() {
                summary = page.summary;
            }

            items.extend(page.data);
        }

        Ok((items, summary))
    }

    pub fn pages<T: DeserializeOwned>(&self, request: ConnectionRequest) -> Pages<'_, T> {
        Pages {
            client: self,
            request: Some(request),
            fetched: 0,
            _marker: std::marker::PhantomData,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, human_errors::Error> {
        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("access_token", self.access_token.as_str())])
            .send()
            .await
            .wrap_err_as_user(
                "We were unable to reach the Graph API.",
                &[
                    "Make sure that your network connection is working properly.",
                    "Check https://metastatus.com/ for any ongoing issues with the Graph API.",
                ],
            )?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<GraphErrorResponse>()
                .await
                .map(|body| body.error.to_string())
                .unwrap_or_else(|_| format!("HTTP {status}"));

            return Err(match status {
                reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => human_errors::user(
                    format!("Authorization failed when calling the Graph API: {message}"),
                    &[
                        "Ensure that your access token is valid and has not expired.",
                        "If you authenticate with an app id and secret, make sure they are correct.",
                    ],
                ),
                reqwest::StatusCode::NOT_FOUND => human_errors::user(
                    format!("The requested Graph API object was not found: {message}"),
                    &["Ensure that the page or group id is correct and publicly visible."],
                ),
                reqwest::StatusCode::TOO_MANY_REQUESTS => human_errors::user(
                    format!("Rate limit exceeded when calling the Graph API: {message}"),
                    &["Wait for a while before making more requests to the Graph API."],
                ),
                _ => human_errors::user(
                    format!("The Graph API returned an error ({status}): {message}"),
                    &[
                        "Check that the page or group id is correct.",
                        "Check that your access token is still valid.",
                    ],
                ),
            });
        }

        response.json().await.wrap_err_as_user(
            format!("Failed to read the response from the Graph API at '{url}'."),
            &[
                "Make sure that your network connection is working properly.",
                "Try again later, as the Graph API may be temporarily unavailable.",
            ],
        )
    }
}

/// Steps through the pages of a connection, following `next` links.
pub struct Pages<'a, T> {
    client: &'a GraphClient,
    request: Option<ConnectionRequest>,
    fetched: usize,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Pages<'_, T> {
    pub async fn next_page(&mut self) -> Result<Option<ConnectionPage<T>>, human_errors::Error> {
        let Some(request) = self.request.take() else {
            return Ok(None);
        };

        let page: ConnectionPage<T> = self.client.get_connection(&request).await?;
        self.fetched += 1;

        self.request = match page.next() {
            Some(next) => Some(request.follow(next)?),
            None => None,
        };

        Ok(Some(page))
    }

    /// The number of pages retrieved so far.
    pub fn fetched(&self) -> usize {
        self.fetched
    }
}

#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

impl std::fmt::Display for GraphErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, self.code) {
            (Some(kind), Some(code)) => write!(f, "{} ({kind}, code {code})", self.message),
            (Some(kind), None) => write!(f, "{} ({kind})", self.message),
            (None, Some(code)) => write!(f, "{} (code {code})", self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_object_sends_access_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/BillGates"))
            .and(query_param("access_token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "216311481960",
                "name": "Bill Gates"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GraphClient::new(mock_server.uri(), "test-token").unwrap();
        let object: serde_json::Value = client.get_object("BillGates", &[]).await.unwrap();
        assert_eq!(object["id"], "216311481960");
    }

    #[tokio::test]
    async fn test_graph_error_message_is_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/nonexistent"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "message": "Unsupported get request.",
                    "type": "GraphMethodException",
                    "code": 100
                }
            })))
            .mount(&mock_server)
            .await;

        let client = GraphClient::new(mock_server.uri(), "test-token").unwrap();
        let err = client
            .get_object::<serde_json::Value>("nonexistent", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported get request."));
        assert!(err.to_string().contains("GraphMethodException"));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = GraphClient::new(mock_server.uri(), "expired").unwrap();
        let err = client
            .get_object::<serde_json::Value>("BillGates", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Authorization failed"));
    }

    #[tokio::test]
    async fn test_get_all_connections_follows_next_links() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1_2/comments"))
            .and(query_param_is_missing("after"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "c1" }, { "id": "c2" }],
                "summary": { "total_count": 3 },
                "paging": { "next": format!("{}/1_2/comments?access_token=test-token&after=cursor1", mock_server.uri()) }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/1_2/comments"))
            .and(query_param("after", "cursor1"))
            .and(query_param("summary", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "c3" }],
                "paging": {}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GraphClient::new(mock_server.uri(), "test-token").unwrap();
        let (items, summary) = client
            .get_all_connections::<serde_json::Value>(
                ConnectionRequest::new("1_2", "comments").param("summary", "true"),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = items.iter().map(|c| c["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(summary.unwrap()["total_count"], 3);
    }
}
