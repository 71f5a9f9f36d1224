use std::{error::Error as StdError, fmt};

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use taskpilot_core::api::{
    ImmediateAction, SettingsPatch, SettingsProvider, StatusReport, Task, TaskQueue,
};

const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueHttpErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    Decode,
    Status,
    Unknown,
}

impl QueueHttpErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Decode => "decode",
            Self::Status => "status",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QueueHttpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct QueueHttpError {
    kind: QueueHttpErrorKind,
    status: Option<u16>,
    url: Option<String>,
    message: String,
    source: Option<anyhow::Error>,
}

impl QueueHttpError {
    pub fn kind(&self) -> QueueHttpErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn from_reqwest(err: reqwest::Error, url: &Url) -> Self {
        let kind = if err.is_timeout() {
            QueueHttpErrorKind::Timeout
        } else if err.is_connect() {
            QueueHttpErrorKind::Connect
        } else if err.is_request() {
            QueueHttpErrorKind::Request
        } else if err.is_body() {
            QueueHttpErrorKind::Body
        } else if err.is_decode() {
            QueueHttpErrorKind::Decode
        } else {
            QueueHttpErrorKind::Unknown
        };
        Self {
            kind,
            status: err.status().map(|s| s.as_u16()),
            url: Some(url.to_string()),
            message: err.to_string(),
            source: Some(anyhow::Error::new(err)),
        }
    }

    fn status_error(status: u16, url: &Url, preview: String) -> Self {
        Self {
            kind: QueueHttpErrorKind::Status,
            status: Some(status),
            url: Some(url.to_string()),
            message: preview,
            source: None,
        }
    }

    fn decode_error(status: u16, url: &Url, err: serde_json::Error, preview: String) -> Self {
        Self {
            kind: QueueHttpErrorKind::Decode,
            status: Some(status),
            url: Some(url.to_string()),
            message: format!("failed to decode response body: {err} | body={preview}"),
            source: Some(anyhow::Error::new(err)),
        }
    }
}

impl fmt::Display for QueueHttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue http error kind={}", self.kind)?;
        if let Some(status) = self.status {
            write!(f, " status={status}")?;
        }
        if let Some(url) = &self.url {
            write!(f, " url={url}")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl StdError for QueueHttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
    if trimmed.chars().nth(BODY_PREVIEW_LIMIT).is_some() {
        out.push_str("...");
    }
    out
}

/// Decodes a 2xx body into `T`; an empty body yields `T::default()`.
async fn parse_json_response<T>(resp: reqwest::Response) -> anyhow::Result<T>
where
    T: DeserializeOwned + Default,
{
    let status = resp.status();
    let url = resp.url().clone();
    let body = resp
        .text()
        .await
        .map_err(|err| QueueHttpError::from_reqwest(err, &url))?;

    if !status.is_success() {
        return Err(QueueHttpError::status_error(status.as_u16(), &url, preview_body(&body)).into());
    }
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str::<T>(&body).map_err(|err| {
        QueueHttpError::decode_error(status.as_u16(), &url, err, preview_body(&body)).into()
    })
}

async fn ensure_success(resp: reqwest::Response) -> anyhow::Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let url = resp.url().clone();
    let body = resp
        .text()
        .await
        .map_err(|err| QueueHttpError::from_reqwest(err, &url))?;
    Err(QueueHttpError::status_error(status.as_u16(), &url, preview_body(&body)).into())
}

/// List endpoints answer either with a bare array or with the array wrapped
/// in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "tasks", alias = "actions", alias = "items")]
        data: Vec<T>,
    },
}

impl<T> Default for ListBody<T> {
    fn default() -> Self {
        Self::Bare(Vec::new())
    }
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(v) | Self::Wrapped { data: v } => v,
        }
    }
}

/// REST client for the task queue and settings collaborator.
#[derive(Clone)]
pub struct HttpTaskQueue {
    api_key: String,
    http: reqwest::Client,
    base: Url,
}

impl HttpTaskQueue {
    pub fn new(base_url: &str, api_key: String, timeout_ms: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()?;
        let base = Url::parse(base_url.trim())
            .map_err(|e| anyhow::anyhow!("invalid queue base_url {base_url:?}: {e}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("invalid queue base_url {base_url:?}: not a base URL");
        }
        Ok(Self {
            api_key,
            http,
            base,
        })
    }

    /// `segments` are percent-encoded individually, so ids may contain `/`.
    fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("queue base_url cannot carry a path"))?
            .pop_if_empty()
            .extend(["api", "daemon"])
            .extend(segments);
        Ok(url)
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.trim().is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }

    async fn send(&self, url: &Url, req: reqwest::RequestBuilder) -> anyhow::Result<reqwest::Response> {
        let resp = self
            .auth(req)
            .send()
            .await
            .map_err(|err| QueueHttpError::from_reqwest(err, url))?;
        tracing::debug!(
            target: "taskpilot.queue",
            url = %url,
            status = %resp.status(),
            "queue response"
        );
        Ok(resp)
    }
}

#[async_trait]
impl TaskQueue for HttpTaskQueue {
    async fn fetch_next_tasks(&self, limit: usize) -> anyhow::Result<Vec<Task>> {
        let url = self.endpoint(&["tasks", "claim"])?;
        let req = self
            .http
            .post(url.clone())
            .json(&serde_json::json!({ "limit": limit }));
        let resp = self.send(&url, req).await?;
        let tasks = parse_json_response::<ListBody<Task>>(resp).await?.into_vec();
        tracing::debug!(target: "taskpilot.queue", limit, claimed = tasks.len(), "claimed tasks");
        Ok(tasks)
    }

    async fn mark_tasks_in_progress(&self, ids: &[String]) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&["tasks", "in-progress"])?;
        let req = self
            .http
            .post(url.clone())
            .json(&serde_json::json!({ "ids": ids }));
        ensure_success(self.send(&url, req).await?).await
    }

    async fn fetch_immediate_actions(&self) -> anyhow::Result<Vec<ImmediateAction>> {
        let url = self.endpoint(&["immediate-actions"])?;
        let resp = self.send(&url, self.http.get(url.clone())).await?;
        Ok(parse_json_response::<ListBody<ImmediateAction>>(resp)
            .await?
            .into_vec())
    }

    async fn acknowledge_immediate_action(&self, id: &str) -> anyhow::Result<()> {
        let url = self.endpoint(&["immediate-actions", id, "ack"])?;
        ensure_success(self.send(&url, self.http.post(url.clone())).await?).await
    }

    async fn complete_immediate_action(&self, id: &str) -> anyhow::Result<()> {
        let url = self.endpoint(&["immediate-actions", id, "complete"])?;
        ensure_success(self.send(&url, self.http.post(url.clone())).await?).await
    }

    async fn report_task_status(&self, report: &StatusReport) -> anyhow::Result<()> {
        let url = self.endpoint(&["tasks", report.task_id.as_str(), "status"])?;
        let req = self
            .http
            .post(url.clone())
            .header("Idempotency-Key", &report.idempotency_key)
            .json(report);
        ensure_success(self.send(&url, req).await?).await
    }
}

#[async_trait]
impl SettingsProvider for HttpTaskQueue {
    async fn fetch_settings(&self) -> anyhow::Result<SettingsPatch> {
        let url = self.endpoint(&["settings"])?;
        let resp = self.send(&url, self.http.get(url.clone())).await?;
        parse_json_response::<SettingsPatch>(resp).await
    }
}
