//! reqwest-backed transport with a fixed per-request timeout.

use crate::{Result, Transport, TransportError, WireBody, WireRequest, WireResponse};
use keycase::{Form, FormPart};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Sends requests to `base_url` + request path.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Join the base URL and a request path without doubling the slash.
    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Transport for HttpTransport {
    fn id(&self) -> &str {
        "http"
    }

    fn send<'a>(
        &'a self,
        request: WireRequest,
    ) -> Pin<Box<dyn Future<Output = Result<WireResponse>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.url_for(&request.path);
            let mut builder = self
                .client
                .request(request.method.clone(), &url)
                .headers(request.headers)
                .timeout(self.timeout);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            builder = match request.body {
                WireBody::Empty => builder,
                WireBody::Json(value) => builder.json(&value),
                WireBody::Multipart(form) => builder.multipart(multipart_form(form)?),
            };

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(format!(
                        "{} {url} after {}ms",
                        request.method,
                        self.timeout.as_millis()
                    ))
                } else {
                    TransportError::Request(format!("{} {url}: {e}", request.method))
                }
            })?;

            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;
            debug!(method = %request.method, url, status, bytes = body.len(), "response received");

            Ok(WireResponse {
                status,
                headers,
                body,
            })
        })
    }
}

/// Build a reqwest multipart form. File parts keep their name and content type.
fn multipart_form(form: Form) -> Result<reqwest::multipart::Form> {
    let mut multipart = reqwest::multipart::Form::new();
    for (name, part) in form.fields {
        multipart = match part {
            FormPart::Text(text) => multipart.text(name, text),
            FormPart::File(file) => {
                let mut part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
                    .file_name(file.file_name);
                if let Some(content_type) = file.content_type {
                    part = part.mime_str(&content_type).map_err(|e| {
                        TransportError::InvalidRequest(format!(
                            "invalid content type {content_type:?} for field {name}: {e}"
                        ))
                    })?;
                }
                multipart.part(name, part)
            }
        };
    }
    Ok(multipart)
}
