/// Failures surfaced by listener operations.
///
/// Infrastructure failures carry the underlying [`human_errors::Error`] so the
/// advice attached at the point of failure survives until it is reported.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("You must authenticate before fetching data from the Graph API.")]
    NotAuthenticated,

    #[error("Authentication Error: {0}")]
    AuthenticationFailed(human_errors::Error),

    #[error("The Graph API rejected the request: {0}")]
    RemoteApi(human_errors::Error),

    #[error("The scrape was interrupted before it could complete.")]
    Interrupted,

    #[error("The '{0}' operation is not supported by this listener.")]
    NotImplemented(&'static str),

    #[error("The document store could not complete the request: {0}")]
    Store(human_errors::Error),
}

impl ScrapeError {
    /// Errors after which the posts walk writes a resume checkpoint.
    pub fn is_resumable(&self) -> bool {
        matches!(self, ScrapeError::RemoteApi(_) | ScrapeError::Interrupted)
    }
}

impl From<ScrapeError> for human_errors::Error {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::NotAuthenticated => human_errors::user(
                "You have not provided any credentials for the Graph API.",
                &[
                    "Set 'graph.access_token' in your configuration, or the GRAPH_ACCESS_TOKEN environment variable.",
                    "Alternatively provide both 'graph.app_id' and 'graph.app_secret' so that an app token can be requested.",
                ],
            ),
            ScrapeError::AuthenticationFailed(cause) => human_errors::user(
                format!("We could not obtain an access token from the Graph API. {cause}"),
                &[
                    "Check that your app id and app secret match the values shown on your app dashboard.",
                    "Make sure that your network connection is working properly.",
                ],
            ),
            ScrapeError::RemoteApi(cause) => human_errors::user(
                format!("The Graph API rejected one of our requests. {cause}"),
                &[
                    "Run the same command again to resume from the saved checkpoint.",
                    "Check that your access token has not expired.",
                ],
            ),
            ScrapeError::Interrupted => human_errors::user(
                "The scrape was interrupted before it could complete.",
                &["Run the same command again to resume from the saved checkpoint."],
            ),
            ScrapeError::NotImplemented(operation) => human_errors::system(
                format!("The '{operation}' operation is not supported by this listener."),
                &["Please report this issue to the development team via GitHub."],
            ),
            ScrapeError::Store(cause) => cause,
        }
    }
}
