//! HTTP probe for search clusters, REST/GraphQL APIs and the HTTPS
//! endpoints of Cosmos DB and Snowflake.

use super::{ConnectionProbe, ProbeOutcome, ProbeSettings, bounded, wrong_descriptor};
use crate::connection::{ConnectionDescriptor, HttpAuth};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Issues one authenticated GET and judges the status code.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    settings: ProbeSettings,
    cancel: CancellationToken,
}

/// What to request and how strictly to judge the answer.
struct Target<'a> {
    url: String,
    auth: Option<&'a HttpAuth>,
    accept_invalid_certs: bool,
    /// Any HTTP answer proves reachability when the request cannot be
    /// authenticated natively (unsigned AWS, account endpoints).
    any_status: bool,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl HttpProbe {
    /// Creates a probe bounded by `settings` and observing `cancel`.
    pub fn new(settings: ProbeSettings, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }

    fn target<'a>(&self, descriptor: &'a ConnectionDescriptor) -> Option<Target<'a>> {
        match descriptor {
            ConnectionDescriptor::Search(d) => Some(Target {
                url: join(&d.base_url, &self.settings.search_health_path),
                any_status: matches!(d.auth, HttpAuth::AwsSigV4 { .. }),
                auth: Some(&d.auth),
                accept_invalid_certs: d.accept_invalid_certs,
            }),
            ConnectionDescriptor::Http(d) => Some(Target {
                url: d
                    .health_path
                    .as_deref()
                    .map_or_else(|| d.base_url.clone(), |path| join(&d.base_url, path)),
                any_status: matches!(d.auth, HttpAuth::AwsSigV4 { .. }),
                auth: Some(&d.auth),
                accept_invalid_certs: d.accept_invalid_certs,
            }),
            ConnectionDescriptor::ConnectionString(_) => {
                let endpoint = descriptor.endpoint()?;
                Some(Target {
                    url: format!("https://{endpoint}/"),
                    auth: None,
                    accept_invalid_certs: false,
                    any_status: true,
                })
            }
            _ => None,
        }
    }

    async fn request(&self, target: Target<'_>) -> Result<String, String> {
        let client = Client::builder()
            .timeout(self.settings.connect_timeout())
            .connect_timeout(self.settings.connect_timeout())
            .user_agent(self.settings.user_agent.as_str())
            .danger_accept_invalid_certs(target.accept_invalid_certs)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        let request = client.get(&target.url);
        let request = match target.auth {
            Some(auth) => authenticate(&client, request, auth).await?,
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| format!("Request to {} failed: {e}", target.url))?;

        let status = response.status();
        if target.any_status || status.is_success() || status.is_redirection() {
            Ok(format!("Endpoint responded with HTTP {status}"))
        } else {
            Err(format!("Endpoint responded with HTTP {status}"))
        }
    }
}

#[async_trait]
impl ConnectionProbe for HttpProbe {
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ProbeOutcome {
        let Some(target) = self.target(descriptor) else {
            return wrong_descriptor("HTTP", descriptor);
        };
        bounded(descriptor, &self.settings, &self.cancel, self.request(target)).await
    }
}

async fn authenticate(
    client: &Client,
    request: RequestBuilder,
    auth: &HttpAuth,
) -> Result<RequestBuilder, String> {
    Ok(match auth {
        HttpAuth::None | HttpAuth::AwsSigV4 { .. } => request,
        HttpAuth::Basic { username, password } => {
            request.basic_auth(username, Some(password.expose()))
        }
        HttpAuth::ApiKey { header, value } => request.header(header.as_str(), value.expose()),
        HttpAuth::Bearer { token } => request.bearer_auth(token.expose()),
        HttpAuth::OAuth2ClientCredentials {
            token_url,
            client_id,
            client_secret,
            scope,
        } => {
            let mut form = vec![
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.expose()),
            ];
            if let Some(scope) = scope {
                form.push(("scope", scope.as_str()));
            }
            let response = client
                .post(token_url)
                .form(&form)
                .send()
                .await
                .map_err(|e| format!("Token request failed: {e}"))?;
            if !response.status().is_success() {
                return Err(format!(
                    "Token endpoint responded with HTTP {}",
                    response.status()
                ));
            }
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| format!("Token response was not understood: {e}"))?;
            request.bearer_auth(token.access_token)
        }
    })
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
