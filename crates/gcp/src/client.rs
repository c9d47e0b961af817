//! Authenticated JSON client shared by the API adapters.

use std::sync::Arc;

use provcheck_core::{Error, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::{Endpoints, GcpConfig};

/// Resolved base URLs, one per API.
#[derive(Debug, Clone)]
pub(crate) struct Bases {
    pub bigquery: Url,
    pub service_usage: Url,
    pub resource_manager: Url,
    pub workflow_executions: Url,
    pub dataform: Url,
}

impl Bases {
    fn resolve(endpoints: &Endpoints) -> Result<Self> {
        Ok(Self {
            bigquery: Endpoints::parse(&endpoints.bigquery)?,
            service_usage: Endpoints::parse(&endpoints.service_usage)?,
            resource_manager: Endpoints::parse(&endpoints.resource_manager)?,
            workflow_executions: Endpoints::parse(&endpoints.workflow_executions)?,
            dataform: Endpoints::parse(&endpoints.dataform)?,
        })
    }
}

/// Client for the Google Cloud REST APIs.
///
/// Cheap to clone; every adapter holds its own copy.
#[derive(Debug, Clone)]
pub struct GcpClient {
    config: Arc<GcpConfig>,
    bases: Arc<Bases>,
    http_client: reqwest::Client,
}

impl GcpClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an unparsable endpoint or when the HTTP client
    /// cannot be built.
    pub fn new(config: GcpConfig) -> Result<Self> {
        let bases = Bases::resolve(&config.endpoints)?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::invalid_config(format!("HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            bases: Arc::new(bases),
            http_client,
        })
    }

    /// The client configuration.
    pub fn config(&self) -> &GcpConfig {
        &self.config
    }

    pub(crate) fn bases(&self) -> &Bases {
        &self.bases
    }

    /// `base` joined with a relative API path.
    pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url> {
        base.join(path.trim_start_matches('/'))
            .map_err(|e| Error::invalid_config(format!("invalid API path '{path}': {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http_client.request(method, url);
        match self.config.access_token.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET `url` and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        resource: &str,
        url: Url,
    ) -> Result<T> {
        self.send(operation, resource, self.request(Method::GET, url))
            .await
    }

    /// GET with repeated query parameters.
    pub(crate) async fn get_json_query<T: DeserializeOwned>(
        &self,
        operation: &str,
        resource: &str,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.send(operation, resource, self.request(Method::GET, url).query(query))
            .await
    }

    /// Send `body` with `method` and decode the JSON response.
    ///
    /// `if_match` becomes an `If-Match` header, so a changed remote version
    /// is rejected with `412` and surfaces as `Conflict`.
    pub(crate) async fn send_json<B, T>(
        &self,
        operation: &str,
        resource: &str,
        method: Method,
        url: Url,
        body: &B,
        if_match: Option<&str>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.request(method, url).json(body);
        if let Some(etag) = if_match {
            builder = builder.header(reqwest::header::IF_MATCH, etag);
        }
        self.send(operation, resource, builder).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        resource: &str,
        builder: RequestBuilder,
    ) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::transport(operation, e.to_string()))?;

        let status = response.status();
        debug!(operation, resource, status = status.as_u16(), "API response");

        if !status.is_success() {
            return Err(classify_failure(operation, resource, response).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::json_parse_failed(format!("{operation}: {e}")))
    }
}

async fn classify_failure(operation: &str, resource: &str, response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_status(operation, resource, status, &body)
}

/// Map a non-success HTTP status onto the core error taxonomy.
pub(crate) fn classify_status(
    operation: &str,
    resource: &str,
    status: StatusCode,
    body: &str,
) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::resource_not_found(resource),
        StatusCode::PRECONDITION_FAILED => Error::conflict(resource, remote_message(body)),
        StatusCode::TOO_MANY_REQUESTS => {
            Error::transport(operation, format!("{status}: {}", remote_message(body)))
        }
        s if s.is_server_error() => {
            Error::transport(operation, format!("{status}: {}", remote_message(body)))
        }
        s => Error::remote(operation, s.as_u16(), remote_message(body)),
    }
}

/// The `error.message` of a Google API error body, or the raw body.
fn remote_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let error = classify_status("get", "p.d", StatusCode::NOT_FOUND, "");
        assert!(matches!(error, Error::ResourceNotFound { resource } if resource == "p.d"));
    }

    #[test]
    fn test_classify_precondition_failed_is_conflict() {
        let error = classify_status("patch", "p.d", StatusCode::PRECONDITION_FAILED, "");
        assert!(matches!(error, Error::Conflict { .. }));
    }

    #[test]
    fn test_classify_server_errors_are_transient() {
        assert!(classify_status("get", "r", StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_status("get", "r", StatusCode::TOO_MANY_REQUESTS, "").is_transient());
    }

    #[test]
    fn test_classify_client_error_is_remote() {
        let body = r#"{"error":{"code":403,"message":"Permission denied"}}"#;
        let error = classify_status("get", "r", StatusCode::FORBIDDEN, body);
        assert!(
            matches!(&error, Error::Remote { status: 403, reason, .. } if reason == "Permission denied")
        );
        assert!(!error.is_transient());
    }

    #[test]
    fn test_endpoint_join_keeps_base_path() -> Result<()> {
        let base = Endpoints::parse("http://localhost:1234/proxy")?;
        let url = GcpClient::endpoint(&base, "/v1/projects/p/services:batchGet")?;
        assert_eq!(
            url.as_str(),
            "http://localhost:1234/proxy/v1/projects/p/services:batchGet"
        );
        Ok(())
    }
}
