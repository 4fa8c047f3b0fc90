use std::time::Duration;

use futures::future::BoxFuture;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::CompileError;
use crate::import_map::ImportMap;

static ESMIRROR_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Js,
    Jsx,
    Ts,
    Tsx,
}

impl Lang {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "js" => Some(Lang::Js),
            "jsx" => Some(Lang::Jsx),
            "ts" => Some(Lang::Ts),
            "tsx" => Some(Lang::Tsx),
            _ => None,
        }
    }

    pub fn is_jsx(self) -> bool {
        matches!(self, Lang::Jsx | Lang::Tsx)
    }
}

/// Body of `POST <api>/transform`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    pub code: String,
    pub filename: String,
    pub lang: Lang,
    pub target: String,
    pub import_map: ImportMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx_import_source: Option<String>,
    pub minify: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransformOutput {
    pub code: String,
    #[serde(default)]
    pub map: Option<String>,
}

pub type TransformFuture = BoxFuture<'static, Result<TransformOutput, CompileError>>;

/// Turns one TypeScript/JSX source into browser-ready JavaScript.
pub trait Transform: Send + Sync {
    fn transform(&self, request: TransformRequest) -> TransformFuture;
}

#[derive(Debug, Clone)]
pub struct HttpTransformService {
    client: Client,
    endpoint: String,
}

impl HttpTransformService {
    pub fn new(api_url: &Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(ESMIRROR_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/transform", api_url.as_str().trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transform for HttpTransformService {
    fn transform(&self, request: TransformRequest) -> TransformFuture {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        Box::pin(async move { post_transform(&client, &endpoint, request).await })
    }
}

async fn post_transform(
    client: &Client,
    endpoint: &str,
    request: TransformRequest,
) -> Result<TransformOutput, CompileError> {
    let filename = request.filename.clone();
    let body = serde_json::to_vec(&request).map_err(|source| CompileError::Encode {
        filename: filename.clone(),
        source,
    })?;

    debug!("POST {endpoint} ({filename}, {:?})", request.lang);
    let response = client
        .post(endpoint)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|source| CompileError::Request {
            filename: filename.clone(),
            source,
        })?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|source| CompileError::Request {
        filename: filename.clone(),
        source,
    })?;

    if status != StatusCode::OK {
        return Err(CompileError::Service {
            filename,
            status: status.as_u16(),
            body: String::from_utf8_lossy(bytes.as_ref()).to_string(),
        });
    }

    serde_json::from_slice(bytes.as_ref())
        .map_err(|source| CompileError::MalformedResponse { filename, source })
}
