use std::time::Instant;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use super::{
    endpoint, MessageBody, PlannerApi, QueryRequest, ReplaceRulesRequest, StatusEnvelope,
    STATUS_FAILURE,
};
use crate::error::{ClientError, Result};
use crate::model::{DatasetUpload, QueryResult, RuleSets};

/// [`PlannerApi`] over HTTP/JSON.
#[derive(Clone, Debug)]
pub struct HttpPlanner {
    base: Url,
    client: Client,
}

impl HttpPlanner {
    /// Creates a client rooted at `base_url`. Endpoint paths are resolved
    /// relative to it, so `http://host/app` and `http://host/app/` behave the
    /// same.
    pub fn new(mut base_url: Url) -> Result<Self> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(concat!("plansync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ClientError::fetch("client setup", err))?;
        Ok(Self {
            base: base_url,
            client,
        })
    }

    /// Base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, endpoint: &'static str, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|err| ClientError::fetch(endpoint, err))
    }

    async fn send(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Response> {
        let started = Instant::now();
        tracing::debug!(endpoint, "request issued");
        let response = request.send().await.map_err(|err| {
            tracing::debug!(endpoint, error = %err, "request failed");
            ClientError::fetch(endpoint, err)
        })?;
        tracing::debug!(
            endpoint,
            status = %response.status(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "response received"
        );
        Ok(response)
    }
}

/// Reads the body, turning non-2xx answers into rejections carrying the
/// server's `msg` when one is present.
async fn read_body(endpoint: &'static str, response: Response) -> Result<Vec<u8>> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|err| ClientError::fetch(endpoint, err))?;
    if status.is_success() {
        return Ok(body.to_vec());
    }
    let message = serde_json::from_slice::<MessageBody>(&body)
        .map(|body| body.msg)
        .unwrap_or_else(|_| format!("server answered {status}"));
    Err(ClientError::rejected(endpoint, message))
}

async fn decode_json<T: DeserializeOwned>(endpoint: &'static str, response: Response) -> Result<T> {
    let body = read_body(endpoint, response).await?;
    serde_json::from_slice(&body).map_err(|err| ClientError::decode(endpoint, err))
}

impl PlannerApi for HttpPlanner {
    async fn fetch_rules(&self) -> Result<RuleSets> {
        let url = self.url(endpoint::RULES_GET, "rules")?;
        let response = self.send(endpoint::RULES_GET, self.client.get(url)).await?;
        decode_json(endpoint::RULES_GET, response).await
    }

    async fn replace_rules(&self, applied: &[String]) -> Result<()> {
        let url = self.url(endpoint::RULES_POST, "rules")?;
        let request = self
            .client
            .post(url)
            .json(&ReplaceRulesRequest {
                applied_rules: applied,
            });
        let response = self.send(endpoint::RULES_POST, request).await?;
        let body = read_body(endpoint::RULES_POST, response).await?;
        // The acknowledgement body carries no information the client acts on.
        if let Ok(ack) = serde_json::from_slice::<StatusEnvelope>(&body) {
            if ack.status == Some(STATUS_FAILURE) {
                tracing::debug!(
                    msg = ack.msg.as_deref().unwrap_or_default(),
                    "planner acknowledged rule update with failure status"
                );
            }
        }
        Ok(())
    }

    async fn run_query(&self, query: &str) -> Result<QueryResult> {
        let url = self.url(endpoint::QUERY, "query")?;
        let request = self.client.post(url).json(&QueryRequest { query });
        let response = self.send(endpoint::QUERY, request).await?;
        let body = read_body(endpoint::QUERY, response).await?;
        match serde_json::from_slice::<QueryResult>(&body) {
            Ok(result) => Ok(result),
            Err(err) => match serde_json::from_slice::<MessageBody>(&body) {
                Ok(failure) => Err(ClientError::rejected(endpoint::QUERY, failure.msg)),
                Err(_) => Err(ClientError::decode(endpoint::QUERY, err)),
            },
        }
    }

    async fn list_datasets(&self) -> Result<Vec<String>> {
        let url = self.url(endpoint::DS_LIST, "ds")?;
        let response = self.send(endpoint::DS_LIST, self.client.get(url)).await?;
        let envelope: StatusEnvelope = decode_json(endpoint::DS_LIST, response).await?;
        let envelope = envelope.into_result(endpoint::DS_LIST)?;
        Ok(envelope.datasets.unwrap_or_default())
    }

    async fn upload_dataset(&self, upload: DatasetUpload) -> Result<()> {
        let url = self.url(endpoint::DS_UPLOAD, "ds")?;
        let part = Part::bytes(upload.contents)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|err| ClientError::Validation(format!("invalid content type: {err}")))?;
        let form = Form::new().part("file", part);
        let request = self.client.post(url).multipart(form);
        let response = self.send(endpoint::DS_UPLOAD, request).await?;
        let envelope: StatusEnvelope = decode_json(endpoint::DS_UPLOAD, response).await?;
        envelope.into_result(endpoint::DS_UPLOAD).map(|_| ())
    }

    async fn delete_dataset(&self, name: &str) -> Result<()> {
        let url = self.url(endpoint::DS_DELETE, "ds")?;
        let request = self.client.delete(url).query(&[("name", name)]);
        let response = self.send(endpoint::DS_DELETE, request).await?;
        let envelope: StatusEnvelope = decode_json(endpoint::DS_DELETE, response).await?;
        envelope.into_result(endpoint::DS_DELETE).map(|_| ())
    }
}
