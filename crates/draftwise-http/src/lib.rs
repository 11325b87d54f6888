#![doc = include_str!("../README.md")]

pub mod config;
pub mod wire;

pub use config::ClientConfig;

use async_trait::async_trait;
use draftwise::{
    ApiError, ApiResult, AssistantReply, Checkpoint, CheckpointId, Document, DocumentMetadata,
    MessageRequest, SessionBackend, SessionSnapshot, SessionSummary, TurnId,
};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use wire::{
    BlogRecord, BlogSummaryRecord, CheckpointRecord, CreateBlogRequest, CreateBlogResponse,
    CreateMessageRequest, MessageResponse, UpdateBlogRequest,
};

/// Errors building the HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid base URL: {0}")]
    BaseUrl(String),
}

/// [`SessionBackend`] over the blog REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self, HttpError> {
        if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
            return Err(HttpError::BaseUrl(config.base_url));
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn from_env() -> Result<Self, HttpError> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.config.url(path));
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let request = builder
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let method = request.method().clone();
        let url = request.url().path().to_string();

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        debug!(%method, path = %url, status = status.as_u16(), "response");

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(wire::api_error(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SessionBackend for HttpBackend {
    async fn create_session(&self, metadata: &DocumentMetadata) -> ApiResult<SessionSnapshot> {
        let created: CreateBlogResponse = self
            .call(
                self.request(Method::POST, "/blogs/")
                    .json(&CreateBlogRequest::from(metadata)),
            )
            .await?;
        self.fetch_session(created.blog_id).await
    }

    async fn list_sessions(&self) -> ApiResult<Vec<SessionSummary>> {
        let records: Vec<BlogSummaryRecord> =
            self.call(self.request(Method::GET, "/blogs/")).await?;
        Ok(records.into_iter().map(SessionSummary::from).collect())
    }

    async fn fetch_session(&self, id: u64) -> ApiResult<SessionSnapshot> {
        let record: BlogRecord = self
            .call(self.request(Method::GET, &format!("/blogs/{}", id)))
            .await?;
        record.into_snapshot()
    }

    async fn update_content(&self, id: u64, content: &str) -> ApiResult<Document> {
        let record: BlogRecord = self
            .call(
                self.request(Method::PUT, &format!("/blogs/{}", id))
                    .json(&UpdateBlogRequest { content }),
            )
            .await?;
        Ok(record.into_document())
    }

    async fn send_message(&self, request: &MessageRequest) -> ApiResult<AssistantReply> {
        let response: MessageResponse = self
            .call(
                self.request(Method::POST, "/blogs/message")
                    .json(&CreateMessageRequest::from(request)),
            )
            .await?;
        Ok(response.into())
    }

    async fn create_checkpoint(&self, turn: TurnId) -> ApiResult<Checkpoint> {
        let record: CheckpointRecord = self
            .call(self.request(Method::POST, &format!("/blogs/checkpoint/{}", turn)))
            .await?;
        Ok(record.into())
    }

    async fn fetch_checkpoint(&self, id: CheckpointId) -> ApiResult<Checkpoint> {
        let record: CheckpointRecord = self
            .call(self.request(Method::GET, &format!("/blogs/checkpoint/{}", id)))
            .await?;
        Ok(record.into())
    }

    async fn restore_checkpoint(&self, id: CheckpointId) -> ApiResult<SessionSnapshot> {
        let record: BlogRecord = self
            .call(self.request(
                Method::POST,
                &format!("/blogs/checkpoint/{}/restore", id),
            ))
            .await?;
        record.into_snapshot()
    }

    async fn delete_checkpoint(&self, id: CheckpointId) -> ApiResult<()> {
        let _: serde_json::Value = self
            .call(self.request(Method::DELETE, &format!("/blogs/checkpoint/{}", id)))
            .await?;
        Ok(())
    }
}
