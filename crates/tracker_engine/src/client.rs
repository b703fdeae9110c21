use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use serde::de::DeserializeOwned;
use tracker_core::{
    ActiveFullTask, BatchStatus, RequestFailure, RequestResult, SiteId, SiteUpdates, TaskId,
};
use url::Url;

use crate::types::{BatchRequest, StartResponse, StopResponse};

const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: Url,
    pub csrf_token: Option<String>,
    pub session_cookie: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientSettings {
    /// The base URL is treated as a directory so endpoint paths join below it.
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            csrf_token: None,
            session_cookie: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Requests against the remote job service.
#[async_trait::async_trait]
pub trait JobService: Send + Sync {
    async fn active_full(&self) -> RequestResult<ActiveFullTask>;
    async fn start_full(&self) -> RequestResult<TaskId>;
    async fn start_single(&self, site_id: SiteId) -> RequestResult<TaskId>;
    /// `true` when the service confirmed the stop.
    async fn stop_all(&self) -> RequestResult<bool>;
    async fn batch_status(&self, task_ids: &[TaskId]) -> RequestResult<BatchStatus>;
    async fn updated_sites(&self, since: Option<&str>) -> RequestResult<SiteUpdates>;
}

#[derive(Debug, Clone)]
pub struct ReqwestJobService {
    settings: ClientSettings,
    client: reqwest::Client,
}

impl ReqwestJobService {
    pub fn new(settings: ClientSettings) -> RequestResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = settings.session_cookie.as_deref() {
            let value = HeaderValue::from_str(cookie)
                .map_err(|err| RequestFailure::Malformed(format!("session cookie: {err}")))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| RequestFailure::Network(err.to_string()))?;

        Ok(Self { settings, client })
    }

    fn endpoint(&self, path: &str) -> RequestResult<Url> {
        self.settings
            .base_url
            .join(path)
            .map_err(|err| RequestFailure::Malformed(format!("endpoint {path}: {err}")))
    }

    fn post(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.post(url);
        match self.settings.csrf_token.as_deref() {
            Some(token) => request.header(CSRF_HEADER, token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> RequestResult<T> {
        let request = request.build().map_err(map_reqwest_error)?;
        let requested = request.url().clone();
        engine_debug!("{} {}", request.method(), requested);

        let response = self
            .client
            .execute(request)
            .await
            .map_err(map_reqwest_error)?;

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        classify(&requested, &final_url, content_type.as_deref(), response.status())?;

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&body).map_err(|err| RequestFailure::Malformed(err.to_string()))
    }
}

/// Sorts a response into expired session, server error, or usable.
pub fn classify(
    requested: &Url,
    final_url: &Url,
    content_type: Option<&str>,
    status: reqwest::StatusCode,
) -> RequestResult<()> {
    if final_url != requested && final_url.as_str().contains("login") {
        engine_warn!("Session expired (redirected to {}); reloading", final_url);
        return Err(RequestFailure::AuthExpired);
    }
    let is_json = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
        .is_some_and(|ct| ct.eq_ignore_ascii_case("application/json"));
    if !is_json {
        engine_warn!(
            "Authentication required (content type {:?}); reloading",
            content_type
        );
        return Err(RequestFailure::AuthExpired);
    }
    if !status.is_success() {
        return Err(RequestFailure::Server {
            status: status.as_u16(),
        });
    }
    Ok(())
}

#[async_trait::async_trait]
impl JobService for ReqwestJobService {
    async fn active_full(&self) -> RequestResult<ActiveFullTask> {
        let url = self.endpoint("crawl/active-full/")?;
        self.send(self.client.get(url)).await
    }

    async fn start_full(&self) -> RequestResult<TaskId> {
        let url = self.endpoint("crawl/start-full/")?;
        let request = self.post(url).header(CONTENT_TYPE, "application/json");
        let response: StartResponse = self.send(request).await?;
        Ok(response.task_id)
    }

    async fn start_single(&self, site_id: SiteId) -> RequestResult<TaskId> {
        let url = self.endpoint(&format!("crawl/start-single/{site_id}/"))?;
        let response: StartResponse = self.send(self.post(url)).await?;
        Ok(response.task_id)
    }

    async fn stop_all(&self) -> RequestResult<bool> {
        let url = self.endpoint("crawl/stop-all/")?;
        let response: StopResponse = self.send(self.post(url)).await?;
        Ok(response.is_stopped())
    }

    async fn batch_status(&self, task_ids: &[TaskId]) -> RequestResult<BatchStatus> {
        let url = self.endpoint("crawl/status/batch/")?;
        let body = serde_json::to_vec(&BatchRequest { task_ids })
            .map_err(|err| RequestFailure::Malformed(err.to_string()))?;
        let request = self
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request).await
    }

    async fn updated_sites(&self, since: Option<&str>) -> RequestResult<SiteUpdates> {
        let mut url = self.endpoint("sites/api/updated/")?;
        if let Some(since) = since {
            url.query_pairs_mut().append_pair("since", since);
        }
        self.send(self.client.get(url)).await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RequestFailure {
    if err.is_timeout() {
        return RequestFailure::Network(format!("timeout: {err}"));
    }
    RequestFailure::Network(err.to_string())
}
