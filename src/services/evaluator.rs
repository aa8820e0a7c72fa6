use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    error::ServiceError,
    services::room_service,
    state::{SharedState, state_machine::EvaluationRequest},
};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Failures of the external argument scorer.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("failed to build evaluator client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to reach evaluator at `{url}`")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("evaluator answered with status {status}")]
    Status { status: reqwest::StatusCode },
    #[error("failed to decode evaluator response")]
    Decode {
        #[source]
        source: reqwest::Error,
    },
    #[error("evaluator returned a non-finite score")]
    InvalidScore,
}

/// Scores a single argument. The algorithm lives outside this service.
pub trait Evaluator: Send + Sync {
    fn score(&self, request: EvaluationRequest) -> BoxFuture<'static, Result<f64, EvaluatorError>>;
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    topic: &'a str,
    description: &'a str,
    round: u8,
    argument: &'a str,
}

#[derive(Deserialize)]
struct ScoreResponse {
    score: f64,
}

/// Pull-mode evaluator posting each argument to an HTTP endpoint.
#[derive(Clone)]
pub struct HttpEvaluator {
    client: Client,
    url: Arc<str>,
}

impl HttpEvaluator {
    /// Build a client with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EvaluatorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| EvaluatorError::ClientBuilder { source })?;
        Ok(Self {
            client,
            url: Arc::from(url.into()),
        })
    }
}

impl Evaluator for HttpEvaluator {
    fn score(&self, request: EvaluationRequest) -> BoxFuture<'static, Result<f64, EvaluatorError>> {
        let evaluator = self.clone();
        Box::pin(async move {
            let body = ScoreRequest {
                topic: &request.topic.title,
                description: &request.topic.description,
                round: request.round,
                argument: &request.content,
            };

            let response = evaluator
                .client
                .post(evaluator.url.as_ref())
                .json(&body)
                .send()
                .await
                .map_err(|source| EvaluatorError::Request {
                    url: evaluator.url.to_string(),
                    source,
                })?;

            if !response.status().is_success() {
                return Err(EvaluatorError::Status {
                    status: response.status(),
                });
            }

            let ScoreResponse { score } = response
                .json()
                .await
                .map_err(|source| EvaluatorError::Decode { source })?;
            if !score.is_finite() {
                return Err(EvaluatorError::InvalidScore);
            }
            Ok(score)
        })
    }
}

/// Score `request` in the background and record the outcome on the room.
///
/// Without a configured evaluator the argument stays pending until a score is
/// pushed through the evaluations endpoint.
pub fn dispatch(state: &SharedState, request: EvaluationRequest) {
    let Some(evaluator) = state.evaluator() else {
        return;
    };
    let state = state.clone();

    tokio::spawn(async move {
        let score = score_with_retries(evaluator.as_ref(), &request, state.evaluator_attempts()).await;
        if let Err(err) =
            room_service::record_evaluation(&state, &request.room_key, request.index, score).await
        {
            warn!(
                room_key = %request.room_key,
                index = request.index,
                error = %err,
                "failed to record evaluation"
            );
        }
    });
}

/// Mark the arguments at `indices` as failed if still unscored once the result
/// deadline passes, so a completed room settles even when no score arrives.
pub fn expire_after_deadline(state: &SharedState, room_key: String, indices: Vec<usize>) {
    let Some(deadline) = state.result_deadline() else {
        return;
    };
    if indices.is_empty() {
        return;
    }
    let state = state.clone();

    tokio::spawn(async move {
        sleep(deadline).await;
        for index in indices {
            match room_service::record_evaluation(&state, &room_key, index, None).await {
                Ok(_) => info!(room_key = %room_key, index, "evaluation deadline passed, argument failed"),
                // Scored in time.
                Err(ServiceError::Conflict(_)) => {
                    debug!(room_key = %room_key, index, "argument already evaluated")
                }
                Err(err) => warn!(
                    room_key = %room_key,
                    index,
                    error = %err,
                    "failed to expire evaluation"
                ),
            }
        }
    });
}

/// Try the evaluator up to `attempts` times with exponential backoff; `None` once exhausted.
pub async fn score_with_retries(
    evaluator: &dyn Evaluator,
    request: &EvaluationRequest,
    attempts: u32,
) -> Option<f64> {
    let mut delay = INITIAL_RETRY_DELAY;

    for attempt in 1..=attempts {
        match evaluator.score(request.clone()).await {
            Ok(score) => {
                info!(
                    room_key = %request.room_key,
                    index = request.index,
                    score,
                    "argument scored"
                );
                return Some(score);
            }
            Err(err) => {
                warn!(
                    room_key = %request.room_key,
                    index = request.index,
                    attempt,
                    error = %err,
                    "evaluator attempt failed"
                );
                if attempt < attempts {
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::state::room::Topic;

    struct Flaky {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    impl Evaluator for Flaky {
        fn score(
            &self,
            _request: EvaluationRequest,
        ) -> BoxFuture<'static, Result<f64, EvaluatorError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let failures = self.failures;
            Box::pin(async move {
                if call < failures {
                    Err(EvaluatorError::InvalidScore)
                } else {
                    Ok(6.5)
                }
            })
        }
    }

    fn request() -> EvaluationRequest {
        EvaluationRequest {
            room_key: "ROOM0001".into(),
            index: 0,
            topic: Topic {
                id: "T1".into(),
                title: "Cats over dogs".into(),
                description: String::new(),
            },
            round: 1,
            content: "Cats are quieter".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_the_evaluator_answers() {
        let calls = Arc::new(AtomicU32::new(0));
        let evaluator = Flaky {
            failures: 2,
            calls: calls.clone(),
        };

        assert_eq!(score_with_retries(&evaluator, &request(), 3).await, Some(6.5));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_last_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let evaluator = Flaky {
            failures: u32::MAX,
            calls: calls.clone(),
        };

        assert_eq!(score_with_retries(&evaluator, &request(), 2).await, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
