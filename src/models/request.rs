// Replayable request descriptors and buffered responses

use anyhow::Context;
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::SessionToken;
use crate::error::ApiError;

/// One part of a multipart body
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        bytes: Bytes,
    },
}

/// Request body, owned so it can be sent again
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormPart>),
}

/// A pending API call
///
/// Built once, then handed to the client by reference. Every call to
/// [`RequestDescriptor::to_request`] yields an identical request, which is
/// what makes the single replay after a token refresh possible.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    id: Uuid,
    method: Method,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    body: RequestBody,
}

impl RequestDescriptor {
    /// `path` is relative to the API base URL, e.g. `/songs`
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append one path segment; it is percent-encoded as a whole
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).context("Failed to serialize request body")?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Relative path, for log lines
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Resolve against the API base URL
    pub fn url(&self, base_url: &Url) -> Result<Url, ApiError> {
        let mut url = base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ApiError::Internal(anyhow::anyhow!("Base URL cannot be a base: {}", base_url))
            })?;
            segments.pop_if_empty().extend(&self.segments);
        }

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        Ok(url)
    }

    /// Build a fresh `reqwest` request, attaching `token` as bearer credential
    pub fn to_request(
        &self,
        client: &Client,
        base_url: &Url,
        token: Option<&SessionToken>,
    ) -> Result<RequestBuilder, ApiError> {
        let mut builder = client
            .request(self.method.clone(), self.url(base_url)?)
            .header("X-Request-Id", self.id.to_string());

        if let Some(t) = token {
            builder = builder.bearer_auth(t.as_str());
        }

        builder = match &self.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        Ok(builder)
    }
}

fn build_form(parts: &[FormPart]) -> Result<reqwest::multipart::Form, ApiError> {
    use reqwest::multipart::{Form, Part};

    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let file = Part::bytes(bytes.to_vec())
                    .file_name(file_name.clone())
                    .mime_str(mime)
                    .map_err(|e| ApiError::Validation(format!("Invalid MIME type {}: {}", mime, e)))?;
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}

/// Fully buffered HTTP response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Bytes) -> Self {
        Self { status, body }
    }

    /// Drain a `reqwest` response into memory
    pub async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let body = response.bytes().await?;
        Ok(Self { status, body })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let value = serde_json::from_slice(&self.body).with_context(|| {
            format!("Failed to decode response body (status {})", self.status)
        })?;
        Ok(value)
    }

    /// Error value for a non-success response
    pub fn into_error(self) -> ApiError {
        let message = self.text();
        ApiError::from_status(self.status.as_u16(), message)
    }
}
