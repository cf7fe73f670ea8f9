//! JSON-over-HTTP plumbing shared by the live gateway clients.

use ppo_core::GatewayError;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Build the transport shared by the live gateways.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

#[derive(Debug, Clone)]
pub(crate) struct JsonHttp {
    client: Client,
    base_url: String,
    service: &'static str,
}

impl JsonHttp {
    pub(crate) fn new(service: &'static str, base_url: &str, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service,
        }
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment so an id
    /// containing `/`, `?` or `#` cannot change the request target.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let invalid = |reason: String| GatewayError::Transport {
            service: self.service,
            source: reason.into(),
        };

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| invalid(format!("invalid base url {:?}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("base url {:?} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, GatewayError> {
        Ok(self.client.request(method, self.url(segments)?))
    }

    /// Send and require one of the `accepted` statuses.
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        accepted: &[StatusCode],
    ) -> Result<Response, GatewayError> {
        let response = request.send().await.map_err(|e| GatewayError::Transport {
            service: self.service,
            source: Box::new(e),
        })?;

        let status = response.status();
        if !accepted.contains(&status) {
            tracing::warn!(service = self.service, status = status.as_u16(), "Unexpected upstream status");
            return Err(GatewayError::Status {
                service: self.service,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    pub(crate) async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, GatewayError> {
        let body = response.bytes().await.map_err(|e| GatewayError::Transport {
            service: self.service,
            source: Box::new(e),
        })?;

        serde_json::from_slice(&body).map_err(|e| GatewayError::Decode {
            service: self.service,
            source: Box::new(e),
        })
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let mut request = self.request(Method::GET, segments)?;
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.send(request, &[StatusCode::OK]).await?;
        self.decode(response).await
    }

    pub(crate) async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
        accepted: &[StatusCode],
    ) -> Result<T, GatewayError> {
        let request = self.request(method, segments)?.json(body);
        let response = self.send(request, accepted).await?;
        self.decode(response).await
    }

    /// Like `send_json` but ignores the response body.
    pub(crate) async fn send_json_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
        accepted: &[StatusCode],
    ) -> Result<(), GatewayError> {
        let request = self.request(method, segments)?.json(body);
        self.send(request, accepted).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(base_url: &str) -> JsonHttp {
        JsonHttp::new("loan ledger", base_url, Client::new())
    }

    #[test]
    fn segments_are_escaped() {
        let url = http("http://lms.local/").url(&["loans", "a/b?c#d", "status"]).unwrap();
        assert_eq!(url.as_str(), "http://lms.local/loans/a%2Fb%3Fc%23d/status");
    }

    #[test]
    fn base_path_is_kept() {
        let url = http("http://lms.local/api/v2").url(&["loans", "loan-001"]).unwrap();
        assert_eq!(url.path(), "/api/v2/loans/loan-001");
    }

    #[test]
    fn unusable_base_url_is_a_transport_error() {
        let err = http("not a url").url(&["loans"]).unwrap_err();
        assert!(matches!(err, GatewayError::Transport { service: "loan ledger", .. }));
    }
}
