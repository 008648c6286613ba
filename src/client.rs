//! HTTP binding of the backend contract.

use std::time::Duration;

use derive_getters::Getters;
use derive_new::new;
use escape_room_session::{
    AnswerSubmission, ApiClient, ApiError, Credentials, GameId, GameRequest, Puzzle, User, UserId,
    Verdict,
};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::ClientConfig;

/// REST client for the escape room backend.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    base_url: String,
    client: reqwest::Client,
}

/// Partial user update. Unset fields are left unchanged by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, new)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

impl UserUpdate {
    /// Returns true if no field would change.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password.is_none()
    }
}

/// User as returned by `POST /users/`; some backends echo only the id.
#[derive(Debug, Deserialize)]
struct CreatedUser {
    id: UserId,
    username: Option<String>,
    email: Option<String>,
}

/// `POST /games` answers either `{id}` or `{game_id, puzzles}`.
#[derive(Debug, Deserialize)]
struct CreatedGame {
    #[serde(alias = "game_id")]
    id: GameId,
}

/// `POST /puzzles/check-answer` answers either `{correct}` or `{is_correct, feedback}`.
#[derive(Debug, Deserialize)]
struct AnswerResult {
    #[serde(alias = "is_correct")]
    correct: bool,
    #[serde(default, alias = "feedback")]
    message: Option<String>,
}

impl HttpApiClient {
    /// Creates a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Local`] if the HTTP client cannot be built.
    #[instrument(skip(config), fields(api_url = %config.api_url()))]
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(*config.timeout_secs()))
            .build()
            .map_err(|e| ApiError::local(format!("Failed to build HTTP client: {}", e)))?;

        info!("Created HTTP API client");
        Ok(Self {
            base_url: config.api_url().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Returns the backend base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists all users.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.send(Method::GET, "/users/", |r| r).await
    }

    /// Fetches one user.
    #[instrument(skip(self))]
    pub async fn get_user(&self, id: UserId) -> Result<User, ApiError> {
        self.send(Method::GET, &format!("/users/{}", id), |r| r).await
    }

    /// Updates a user's details.
    #[instrument(skip(self, update))]
    pub async fn update_user(&self, id: UserId, update: &UserUpdate) -> Result<User, ApiError> {
        self.send(Method::PUT, &format!("/users/{}", id), |r| r.json(update))
            .await
    }

    /// Deletes a user.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: UserId) -> Result<(), ApiError> {
        let path = format!("/users/{}", id);
        let request = self.client.request(Method::DELETE, self.url(&path));
        self.execute(request, Method::DELETE, &path).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and decodes a JSON success body.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<T, ApiError> {
        let request = build(self.client.request(method.clone(), self.url(path)));
        let response = self.execute(request, method, path).await?;

        response.json::<T>().await.map_err(|e| {
            warn!(path, error = %e, "Failed to decode response body");
            ApiError::local(format!("Invalid response body: {}", e))
        })
    }

    /// Sends a request and maps every failure onto [`ApiError`].
    async fn execute(
        &self,
        request: RequestBuilder,
        method: Method,
        path: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let request = request.build().map_err(|e| {
            warn!(%method, path, error = %e, "Failed to build request");
            ApiError::local(format!("Failed to build request: {}", e))
        })?;

        debug!("Sending request: {} {}", method, path);
        let response = self.client.execute(request).await.map_err(|e| {
            warn!(%method, path, error = %e, "API error: no response");
            if e.is_builder() {
                ApiError::local(e.to_string())
            } else {
                ApiError::no_response(e.to_string())
            }
        })?;

        let status = response.status();
        info!(status = status.as_u16(), %method, path, "Received response");

        if status.is_success() {
            return Ok(response);
        }

        let detail = match response.text().await {
            Ok(body) => extract_detail(&body),
            Err(e) => {
                warn!(status = status.as_u16(), path, error = %e, "Failed to read error body");
                None
            }
        };
        warn!(status = status.as_u16(), path, detail = ?detail, "API error: error status");
        Err(ApiError::status(status.as_u16(), detail))
    }
}

/// Pulls a human-readable detail out of an error body.
///
/// Understands `{"detail": "..."}` and validation lists of the form
/// `{"detail": [{"msg": "..."}]}`; otherwise returns the trimmed body.
fn extract_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match json.get("detail") {
            Some(serde_json::Value::String(detail)) => return Some(detail.clone()),
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            _ => {}
        }
    }

    Some(trimmed.to_string())
}

#[async_trait::async_trait]
impl ApiClient for HttpApiClient {
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    async fn create_user(&self, credentials: &Credentials) -> Result<User, ApiError> {
        let created: CreatedUser = self
            .send(Method::POST, "/users/", |r| r.json(credentials))
            .await?;

        Ok(User::new(
            created.id,
            created
                .username
                .unwrap_or_else(|| credentials.username().clone()),
            created.email.unwrap_or_else(|| credentials.email().clone()),
        ))
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id()))]
    async fn create_game(&self, request: &GameRequest) -> Result<GameId, ApiError> {
        let created: CreatedGame = self
            .send(Method::POST, "/games", |r| r.json(request))
            .await?;
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn generate_puzzle(&self, game_id: GameId) -> Result<Puzzle, ApiError> {
        self.send(Method::POST, &format!("/games/{}/puzzles", game_id), |r| r)
            .await
    }

    #[instrument(skip(self, submission), fields(puzzle_id = %submission.puzzle_id()))]
    async fn check_answer(&self, submission: &AnswerSubmission) -> Result<Verdict, ApiError> {
        let result: AnswerResult = self
            .send(Method::POST, "/puzzles/check-answer", |r| r.json(submission))
            .await?;
        Ok(Verdict::new(result.correct, result.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_from_string_field() {
        assert_eq!(
            extract_detail(r#"{"detail": "game not found"}"#),
            Some("game not found".to_string())
        );
    }

    #[test]
    fn detail_from_validation_list() {
        let body = r#"{"detail": [{"loc": ["body", "difficulty"], "msg": "field required"}]}"#;
        assert_eq!(extract_detail(body), Some("field required".to_string()));
    }

    #[test]
    fn detail_falls_back_to_raw_body() {
        assert_eq!(
            extract_detail("Internal Server Error\n"),
            Some("Internal Server Error".to_string())
        );
        assert_eq!(extract_detail("   "), None);
    }
}
