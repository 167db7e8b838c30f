//! Blocking HTTP transport backed by `ureq`.
//!
//! Status codes are never turned into errors here: a 412 or a 500 comes back
//! as a [`Response`] so the caller can attach the raw body to its own error.

use crate::error::{Error, Result};
use crate::transport::{Method, Request, Response, Transport};
use base64::Engine as _;
use std::time::Duration;

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Manager base URL, e.g. `https://nsxmanager.example.com`.
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Timeout applied to each request as a whole.
    pub timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            insecure: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Authenticated HTTP transport.
///
/// # Example
///
/// ```no_run
/// use nsxkit::{HttpOptions, HttpTransport, Transport};
/// use nsxkit::api::ipset;
///
/// let transport = HttpTransport::new(HttpOptions {
///     endpoint: "https://nsxmanager.example.com".into(),
///     username: "admin".into(),
///     password: "secret".into(),
///     ..HttpOptions::default()
/// })
/// .unwrap();
///
/// let response = transport.send(&ipset::get_all("globalroot-0")).unwrap();
/// println!("{}", response.status());
/// ```
pub struct HttpTransport {
    agent: ureq::Agent,
    endpoint: String,
    authorization: String,
}

impl HttpTransport {
    /// Create a transport from connection options.
    pub fn new(options: HttpOptions) -> Result<Self> {
        let endpoint = options.endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(Error::Config("endpoint is not set".to_string()));
        }
        if options.username.is_empty() {
            return Err(Error::Config("username is not set".to_string()));
        }

        let tls = ureq::tls::TlsConfig::builder()
            .disable_verification(options.insecure)
            .build();
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(options.timeout))
            .tls_config(tls)
            .build();

        let credentials = format!("{}:{}", options.username, options.password);
        let authorization = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );

        Ok(Self {
            agent: ureq::Agent::new_with_config(config),
            endpoint,
            authorization,
        })
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn decorate<B>(
        &self,
        builder: ureq::RequestBuilder<B>,
        request: &Request,
    ) -> ureq::RequestBuilder<B> {
        let builder = builder
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .header("User-Agent", "nsxkit-rs");
        match request.etag() {
            Some(etag) => builder.header("If-Match", etag),
            None => builder,
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let url = self.url(request.path());
        log::debug!("{} {}", request.method(), url);

        let network = |e: ureq::Error| Error::network(request.method(), request.path(), e.to_string());

        let result = match request.method() {
            Method::Get => self.decorate(self.agent.get(&url), request).call(),
            Method::Delete => self.decorate(self.agent.delete(&url), request).call(),
            Method::Post | Method::Put => {
                let builder = if request.method() == Method::Post {
                    self.agent.post(&url)
                } else {
                    self.agent.put(&url)
                };
                let builder = self.decorate(builder, request);
                match request.body() {
                    Some(body) => builder.header("Content-Type", "application/json").send(body),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(network)?;
        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        log::debug!("{} {} -> {}", request.method(), request.path(), status);

        let response = Response::new(status, body);
        Ok(match etag {
            Some(etag) => response.with_etag(etag),
            None => response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    fn options(endpoint: String) -> HttpOptions {
        HttpOptions {
            endpoint,
            username: "admin".to_string(),
            password: "secret".to_string(),
            ..HttpOptions::default()
        }
    }

    #[test]
    fn test_requires_endpoint() {
        let result = HttpTransport::new(options(String::new()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_requires_username() {
        let mut opts = options("https://manager".to_string());
        opts.username.clear();
        assert!(matches!(HttpTransport::new(opts), Err(Error::Config(_))));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let transport = HttpTransport::new(options("https://manager/".to_string())).unwrap();
        assert_eq!(transport.endpoint(), "https://manager");
        assert_eq!(transport.url("/api/x"), "https://manager/api/x");
    }

    #[test]
    fn test_get_sends_basic_auth_and_reads_etag() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/api/4.0/firewall/globalroot-0/config")
                .header("Authorization", "Basic YWRtaW46c2VjcmV0");
            then.status(200)
                .header("ETag", "\"1700\"")
                .body("{\"layer3Sections\":[]}");
        });

        let transport = HttpTransport::new(options(server.base_url())).unwrap();
        let response = transport
            .send(&Request::get("/api/4.0/firewall/globalroot-0/config"))
            .unwrap();

        mock.assert();
        assert_eq!(response.status(), 200);
        assert_eq!(response.etag(), Some("\"1700\""));
        assert!(response.raw().contains("layer3Sections"));
    }

    #[test]
    fn test_put_sends_if_match_and_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::PUT)
                .path("/api/2.0/services/ipset/ipset-1")
                .header("If-Match", "\"42\"")
                .header("Content-Type", "application/json")
                .body_contains("\"name\":\"web\"");
            then.status(200).body("");
        });

        let transport = HttpTransport::new(options(server.base_url())).unwrap();
        let request = Request::put("/api/2.0/services/ipset/ipset-1")
            .json(&serde_json::json!({"name": "web"}))
            .unwrap()
            .if_match("\"42\"");
        let response = transport.send(&request).unwrap();

        mock.assert();
        assert!(response.is_success());
    }

    #[test]
    fn test_error_status_is_a_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::DELETE).path("/api/2.0/services/application/app-9");
            then.status(412).body("<error>precondition failed</error>");
        });

        let transport = HttpTransport::new(options(server.base_url())).unwrap();
        let response = transport
            .send(&Request::delete("/api/2.0/services/application/app-9"))
            .unwrap();

        assert_eq!(response.status(), 412);
        assert!(response.raw().contains("precondition failed"));
    }

    #[test]
    fn test_connection_refused_is_network_error() {
        let mut opts = options("http://127.0.0.1:1".to_string());
        opts.timeout = Duration::from_secs(2);
        let transport = HttpTransport::new(opts).unwrap();

        let err = transport.send(&Request::get("/api")).unwrap_err();
        assert!(matches!(err, Error::Network { .. }));
    }
}
