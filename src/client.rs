use std::fmt;

use serde_json::Value;
use tracing::{debug, info};

use crate::domain::DocError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            url: url.into(),
            body,
        }
    }

    /// Equivalent curl invocation, for pasting into a shell or Postman.
    pub fn to_curl(&self) -> String {
        let mut cmd = format!("curl -X {} \"{}\"", self.method, self.url);
        if let Some(body) = &self.body {
            cmd.push_str(&format!(
                " -H \"Content-Type: application/json\" -d '{}'",
                body
            ));
        }
        cmd
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub text: String,
}

impl ApiResponse {
    pub fn json(&self) -> Result<Value, DocError> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// Pretty printed body when it is JSON, raw text otherwise.
    pub fn pretty(&self) -> String {
        self.json()
            .ok()
            .and_then(|v| serde_json::to_string_pretty(&v).ok())
            .unwrap_or_else(|| self.text.clone())
    }
}

pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, DocError>;
}

/// Blocking HTTP transport. No timeout and no retry.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, DocError> {
        let client = reqwest::blocking::Client::builder().timeout(None).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, DocError> {
        info!("{} {}", request.method, request.url);
        let mut builder = self
            .client
            .request(request.method.into(), request.url.as_str());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        debug!("Response {status}, {} bytes", text.len());
        Ok(ApiResponse { status, text })
    }
}
