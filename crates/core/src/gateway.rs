//! Session Resource Client: the authenticated calls to the API gateway.

use crate::auth::AuthContext;
use crate::capture::MediaBlob;
use async_trait::async_trait;
use interview_types::{Analysis, Difficulty, Question, Session};
#[cfg(test)]
use mockall::automock;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://apigateway-25az.onrender.com/api/v1";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("gateway returned {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode gateway response: {0}")]
    Decode(String),
    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),
}

/// Parameters for generating the next question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRequest {
    pub category: String,
    pub difficulty: Difficulty,
    pub session_id: String,
    pub description: String,
    pub focus_areas: Vec<String>,
}

/// One recorded answer on its way to the processing service.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSubmission {
    pub media: MediaBlob,
    pub question: Question,
    pub transcript: String,
    pub session_id: String,
}

/// The remote operations an interview needs.
///
/// Every call is a single request carrying the bearer credential. Failures are
/// returned as-is; nothing here retries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn start_session(&self, title: &str) -> Result<Session, ApiError>;

    async fn request_question(&self, request: &QuestionRequest) -> Result<Question, ApiError>;

    async fn submit_answer(&self, submission: AnswerSubmission) -> Result<Analysis, ApiError>;

    async fn end_session(&self, session_id: &str) -> Result<(), ApiError>;

    async fn cancel_session(&self, session_id: &str) -> Result<(), ApiError>;

    async fn questions_for_session(&self, session_id: &str) -> Result<Vec<Question>, ApiError>;

    async fn analyses_for_session(&self, session_id: &str) -> Result<Vec<Analysis>, ApiError>;
}

pub struct GatewayClient {
    client: Client,
    base_url: Url,
    auth: Arc<AuthContext>,
}

impl GatewayClient {
    pub fn new(base_url: &str, auth: Arc<AuthContext>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base url.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn bearer(&self) -> Result<String, ApiError> {
        self.auth
            .token()
            .map(|token| token.expose_secret().to_string())
            .ok_or(ApiError::Unauthenticated)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, ApiError> {
        let token = self.bearer()?;
        tracing::debug!("GET {}", url.path());
        let response = self.client.get(url).bearer_auth(token).send().await?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self.get(url).await?;
        decode(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthenticated);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Http { status, body })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl SessionApi for GatewayClient {
    async fn start_session(&self, title: &str) -> Result<Session, ApiError> {
        let url = self.endpoint(&["session", "start-ai-session", title])?;
        let session: Session = self.get_json(url).await?;
        tracing::info!("Started session {}", session.id);
        Ok(session)
    }

    async fn request_question(&self, request: &QuestionRequest) -> Result<Question, ApiError> {
        let mut url = self.endpoint(&[
            "question",
            "generate-question",
            &request.category,
            request.difficulty.as_str(),
            &request.session_id,
        ])?;
        url.query_pairs_mut()
            .append_pair("focusArea", &request.focus_areas.join(","))
            .append_pair("description", &request.description);
        self.get_json(url).await
    }

    async fn submit_answer(&self, submission: AnswerSubmission) -> Result<Analysis, ApiError> {
        let token = self.bearer()?;
        let url = self.endpoint(&["processing", "analyze-video"])?;

        let question_json = serde_json::to_string(&submission.question)
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let file_name = format!("answer.{}", submission.media.extension());
        let video = Part::bytes(submission.media.data.to_vec())
            .file_name(file_name)
            .mime_str(&submission.media.mime_type)?;
        let form = Form::new()
            .part("videoChunk", video)
            .text("question", question_json)
            .text("answer", submission.transcript)
            .text("sessionId", submission.session_id);

        tracing::debug!("POST {}", url.path());
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        decode(check_status(response).await?).await
    }

    async fn end_session(&self, session_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["session", "end-session", session_id])?;
        self.get(url).await?;
        tracing::info!("Ended session {session_id}");
        Ok(())
    }

    async fn cancel_session(&self, session_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["session", "cancel-session", session_id])?;
        self.get(url).await?;
        tracing::info!("Canceled session {session_id}");
        Ok(())
    }

    async fn questions_for_session(&self, session_id: &str) -> Result<Vec<Question>, ApiError> {
        let url = self.endpoint(&["question", "get-questions-by-session", session_id])?;
        self.get_json(url).await
    }

    async fn analyses_for_session(&self, session_id: &str) -> Result<Vec<Analysis>, ApiError> {
        let url = self.endpoint(&["processing", "get-analysis-by-session", session_id])?;
        self.get_json(url).await
    }
}
