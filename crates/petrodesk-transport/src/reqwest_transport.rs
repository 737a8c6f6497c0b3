//! HTTP transport implementation using `reqwest` with a shared cookie jar.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use url::Url;

use crate::{
    ApiRequest, ApiResponse, FormPart, HttpTransport, Method, MultipartForm, RequestBody,
    RequestId, TransportError, cookie_value,
};

/// A `reqwest`-backed [`HttpTransport`].
///
/// `origin` is the URL the CSRF cookie is read for; it is normally the API
/// base. Cookies set by any response are stored in the jar and attached to
/// every later request, which is what `credentials: include` means outside
/// a browser.
pub struct ReqwestTransport {
    client: reqwest::Client,
    jar: Arc<Jar>,
    origin: Url,
}

impl ReqwestTransport {
    /// Creates a transport with a fresh, empty cookie jar.
    pub fn new(origin: Url) -> Result<Self, TransportError> {
        Self::with_jar(origin, Arc::new(Jar::default()))
    }

    /// Creates a transport over an existing cookie jar.
    ///
    /// Two transports sharing one jar see each other's cookie rotations,
    /// the same way two browser tabs share one cookie store.
    pub fn with_jar(origin: Url, jar: Arc<Jar>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            client,
            jar,
            origin,
        })
    }

    /// The cookie jar backing this transport.
    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    fn build(&self, request: ApiRequest) -> Result<reqwest::RequestBuilder, TransportError> {
        let mut builder = self.client.request(to_reqwest_method(request.method), request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Multipart(form) => builder.multipart(to_reqwest_form(form)?),
        };
        Ok(builder)
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let id = RequestId::next();
        let method = request.method;
        let path = request.url.path().to_string();
        tracing::trace!(%id, %method, %path, "sending request");

        let response = self
            .build(request)?
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(Box::new(e)))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::ReceiveFailed(Box::new(e)))?
            .to_vec();

        tracing::debug!(%id, %method, %path, status, "response received");
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        cookie_value(header.to_str().ok()?, name)
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn to_reqwest_form(form: MultipartForm) -> Result<reqwest::multipart::Form, TransportError> {
    let mut out = reqwest::multipart::Form::new();
    for part in form.parts {
        out = match part {
            FormPart::Text { name, value } => out.text(name, value),
            FormPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let mut file = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
                if let Some(mime) = mime {
                    file = file
                        .mime_str(&mime)
                        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                }
                out.part(name, file)
            }
        };
    }
    Ok(out)
}
