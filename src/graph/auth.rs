use human_errors::ResultExt;
use oauth2::TokenResponse;
use tracing_batteries::prelude::*;

/// Exchanges an app id and secret for an app access token using the OAuth2
/// client credentials grant.
#[instrument("graph.auth.app_access_token", skip(api_url, app_secret), err(Display))]
pub async fn app_access_token(
    api_url: &str,
    app_id: &str,
    app_secret: &str,
) -> Result<String, human_errors::Error> {
    let client = oauth2::basic::BasicClient::new(oauth2::ClientId::new(app_id.to_string()))
        .set_client_secret(oauth2::ClientSecret::new(app_secret.to_string()))
        .set_auth_type(oauth2::AuthType::RequestBody)
        .set_token_uri(
            oauth2::TokenUrl::new(format!("{}/oauth/access_token", api_url.trim_end_matches('/')))
                .wrap_err_as_user(
                    format!("The Graph API URL '{api_url}' is not a valid URL."),
                    &["Check the 'graph.api_url' value in your configuration."],
                )?,
        );

    let http_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err_as_system(&["Report the issue to the development team on GitHub."])?;

    let token_result = client
        .exchange_client_credentials()
        .request_async(&http_client)
        .await
        .wrap_err_as_user(
            format!("Failed to obtain an app access token for app '{app_id}'."),
            &[
                "Ensure that your app id and app secret are correct.",
                "Check your network connection.",
            ],
        )?;

    Ok(token_result.access_token().secret().to_string())
}
