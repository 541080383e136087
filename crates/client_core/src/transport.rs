use reqwest::{multipart::Form, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::error::ErrorEnvelope;
use tracing::{debug, warn};

use crate::{
    config::ClientSettings,
    error::{ClientError, ClientResult},
};

/// Thin wrapper over `reqwest` that applies the configured timeout and turns
/// every failure into a [`ClientError`] carrying an [`ErrorEnvelope`].
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(settings: &ClientSettings) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClientError::Network {
                message: format!("failed to build http client: {err}"),
                timed_out: false,
            })?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let url = self.url(path);
        let request = self.http.get(&url).query(query);
        let response = self.execute(Method::GET, &url, request).await?;
        decode_json(&url, response).await
    }

    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let url = self.url(path);
        let request = self.http.request(method.clone(), &url).json(body);
        let response = self.execute(method, &url, request).await?;
        decode_json(&url, response).await
    }

    /// Returns the parsed JSON body, or `Null` when the server replies with no body.
    pub async fn post_multipart(&self, path: &str, form: Form) -> ClientResult<serde_json::Value> {
        let url = self.url(path);
        let request = self.http.post(&url).multipart(form);
        let response = self.execute(Method::POST, &url, request).await?;
        let bytes = response.bytes().await.map_err(|err| network_error(&url, err))?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())))
    }

    pub async fn download(&self, path: &str) -> ClientResult<Vec<u8>> {
        let url = self.url(path);
        let request = self.http.get(&url);
        let response = self.execute(Method::GET, &url, request).await?;
        let bytes = response.bytes().await.map_err(|err| network_error(&url, err))?;
        Ok(bytes.to_vec())
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        request: RequestBuilder,
    ) -> ClientResult<Response> {
        debug!(%method, url, "http: request issued");
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(%method, url, error = %err, "http: request failed");
                return Err(network_error(url, err));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let data = serde_json::from_slice::<serde_json::Value>(&body).ok().or_else(|| {
            (!body.is_empty())
                .then(|| serde_json::Value::String(String::from_utf8_lossy(&body).into_owned()))
        });
        let message = data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!(
                    "Request failed with status code {}",
                    status.as_u16()
                )
            });
        let mut envelope = ErrorEnvelope::new(method.as_str(), url, message).with_status(status.as_u16());
        if let Some(data) = data {
            envelope = envelope.with_data(data);
        }
        warn!(%method, url, status = status.as_u16(), "http: server returned error status");
        Err(classify_status(status, envelope))
    }
}

fn classify_status(status: StatusCode, envelope: ErrorEnvelope) -> ClientError {
    if status == StatusCode::NOT_FOUND {
        return ClientError::NotFound(envelope);
    }
    if status.is_client_error() {
        if let Some(errors) = envelope.field_errors() {
            return ClientError::ServerValidation(errors);
        }
    }
    ClientError::Http(envelope)
}

fn network_error(url: &str, err: reqwest::Error) -> ClientError {
    ClientError::Network {
        message: format!("{url}: {err}"),
        timed_out: err.is_timeout(),
    }
}

async fn decode_json<T: DeserializeOwned>(url: &str, response: Response) -> ClientResult<T> {
    let bytes = response.bytes().await.map_err(|err| network_error(url, err))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| ClientError::MalformedResponse(format!("{url}: {err}")))
}
