use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::{dto::room::RoomStatusResponse, error::ErrorBody};

/// Failures observed by a client of the room API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    #[error("request to `{url}` failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server rejected the call with {status} ({code}): {message}")]
    Rejected {
        status: StatusCode,
        code: String,
        message: String,
    },
    #[error("failed to decode server response")]
    Decode {
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    /// Machine-readable error code returned by the server, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Calls a participant makes against a room.
pub trait RoomApi: Send + Sync {
    fn fetch_status(
        &self,
        room_key: String,
    ) -> BoxFuture<'static, Result<RoomStatusResponse, ClientError>>;
    fn submit(
        &self,
        room_key: String,
        player: String,
        argument: String,
    ) -> BoxFuture<'static, Result<RoomStatusResponse, ClientError>>;
    fn abort(
        &self,
        room_key: String,
        player: String,
    ) -> BoxFuture<'static, Result<RoomStatusResponse, ClientError>>;
}

/// [`RoomApi`] over HTTP.
#[derive(Clone)]
pub struct HttpRoomApi {
    client: Client,
    base_url: Arc<str>,
}

impl HttpRoomApi {
    /// Client for the server at `base_url`, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ClientError::ClientBuilder { source })?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn send(url: String, request: RequestBuilder) -> Result<RoomStatusResponse, ClientError> {
    let response = request
        .send()
        .await
        .map_err(|source| ClientError::Request { url, source })?;

    let status = response.status();
    if !status.is_success() {
        let (code, message) = match response.json::<ErrorBody>().await {
            Ok(body) => (body.code, body.message),
            Err(_) => ("unknown".to_string(), status.to_string()),
        };
        return Err(ClientError::Rejected {
            status,
            code,
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|source| ClientError::Decode { source })
}

impl RoomApi for HttpRoomApi {
    fn fetch_status(
        &self,
        room_key: String,
    ) -> BoxFuture<'static, Result<RoomStatusResponse, ClientError>> {
        let url = self.url(&format!("/room-status/{room_key}"));
        let request = self.client.get(&url);
        Box::pin(send(url, request))
    }

    fn submit(
        &self,
        room_key: String,
        player: String,
        argument: String,
    ) -> BoxFuture<'static, Result<RoomStatusResponse, ClientError>> {
        let url = self.url(&format!("/submit-argument/{room_key}/{player}"));
        let request = self.client.post(&url).json(&json!({ "argument": argument }));
        Box::pin(send(url, request))
    }

    fn abort(
        &self,
        room_key: String,
        player: String,
    ) -> BoxFuture<'static, Result<RoomStatusResponse, ClientError>> {
        let url = self.url(&format!("/abort-debate/{room_key}/{player}"));
        let request = self.client.post(&url);
        Box::pin(send(url, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let api = HttpRoomApi::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            api.url("/room-status/ABCD2345"),
            "http://localhost:8080/room-status/ABCD2345"
        );
    }

    #[test]
    fn rejected_calls_expose_the_server_code() {
        let err = ClientError::Rejected {
            status: StatusCode::CONFLICT,
            code: "not_your_turn".into(),
            message: "not your turn".into(),
        };
        assert_eq!(err.code(), Some("not_your_turn"));
    }
}
