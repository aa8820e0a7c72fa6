//! Application-level configuration loading: debate rules, evaluator settings and the topic catalog.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::state::{
    catalog::{Catalog, Genre},
    room::{DebateRules, Topic},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DEBATE_ROOM_BACK_CONFIG_PATH";
/// Environment variable that overrides the evaluator URL from the file.
const EVALUATOR_URL_ENV: &str = "EVALUATOR_URL";
/// Environment variable that overrides the push token from the file.
const EVALUATOR_TOKEN_ENV: &str = "EVALUATOR_TOKEN";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Rules applied to every room.
    pub rules: DebateRules,
    /// Upper bound on the persistence step of a transition; `None` disables it.
    pub transition_timeout: Option<Duration>,
    /// Evaluator connection settings.
    pub evaluator: EvaluatorConfig,
    /// Genres and topics offered at room creation.
    pub catalog: Catalog,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// How arguments get scored.
pub struct EvaluatorConfig {
    /// Endpoint of the pull-mode evaluator; push mode only when absent.
    pub url: Option<String>,
    /// Per-request timeout.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timeout_ms")]
    pub timeout: Duration,
    /// Attempts per argument before it is marked as failed.
    pub max_attempts: u32,
    /// How long a completed room waits for its last scores before the
    /// missing ones are marked as failed; `None` waits forever.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "result_deadline_ms")]
    pub result_deadline: Option<Duration>,
    /// Token expected in `X-Evaluator-Token` on pushed results. A random one
    /// is generated at startup when absent.
    pub push_token: Option<String>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            result_deadline: Some(Duration::from_secs(120)),
            push_token: None,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        genres = app_config.catalog.genres().len(),
                        total_rounds = app_config.rules.total_rounds,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Some(url) = env::var(EVALUATOR_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
        {
            config.evaluator.url = Some(url);
        }
        if let Some(token) = env::var(EVALUATOR_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
        {
            config.evaluator.push_token = Some(token);
        }

        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: DebateRules::default(),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
            evaluator: EvaluatorConfig::default(),
            catalog: default_catalog(),
        }
    }
}

const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

#[serde_as]
#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    rules: RawRules,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default = "default_timeout", rename = "transition_timeout_ms")]
    transition_timeout: Option<Duration>,
    #[serde(default)]
    evaluator: EvaluatorConfig,
    #[serde(default)]
    genres: Vec<RawGenre>,
}

fn default_timeout() -> Option<Duration> {
    Some(DEFAULT_TRANSITION_TIMEOUT)
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawRules {
    total_rounds: u8,
    max_argument_chars: usize,
    abort_penalty: f64,
}

impl Default for RawRules {
    fn default() -> Self {
        let rules = DebateRules::default();
        Self {
            total_rounds: rules.total_rounds,
            max_argument_chars: rules.max_argument_chars,
            abort_penalty: rules.abort_penalty,
        }
    }
}

#[derive(Debug, Deserialize)]
/// A genre and the topics filed under it.
struct RawGenre {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    topics: Vec<Topic>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let rules = DebateRules {
            total_rounds: value.rules.total_rounds.max(1),
            max_argument_chars: value.rules.max_argument_chars.max(1),
            abort_penalty: value.rules.abort_penalty,
        };

        let catalog = if value.genres.is_empty() {
            default_catalog()
        } else {
            Catalog::new(
                value
                    .genres
                    .into_iter()
                    .map(|genre| {
                        (
                            Genre {
                                id: genre.id,
                                name: genre.name,
                                description: genre.description,
                            },
                            genre.topics,
                        )
                    })
                    .collect(),
            )
        };

        Self {
            rules,
            transition_timeout: value.transition_timeout,
            evaluator: value.evaluator,
            catalog,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn topic(id: &str, title: &str, description: &str) -> Topic {
    Topic {
        id: id.into(),
        title: title.into(),
        description: description.into(),
    }
}

/// Built-in catalog shipped with the binary.
fn default_catalog() -> Catalog {
    Catalog::new(vec![
        (
            Genre {
                id: "technology".into(),
                name: "Technology".into(),
                description: "Software, automation and the digital society".into(),
            },
            vec![
                topic(
                    "tech-ai-jobs",
                    "Automation will create more jobs than it destroys",
                    "Weigh the long-term labour effects of AI and robotics.",
                ),
                topic(
                    "tech-social-media",
                    "Social media does more harm than good",
                    "Consider mental health, democracy and connection.",
                ),
            ],
        ),
        (
            Genre {
                id: "society".into(),
                name: "Society".into(),
                description: "Education, work and public life".into(),
            },
            vec![
                topic(
                    "soc-remote-work",
                    "Remote work should be the default",
                    "Productivity, cities and the meaning of an office.",
                ),
                topic(
                    "soc-homework",
                    "Homework should be banned in primary school",
                    "Learning outcomes against family time.",
                ),
            ],
        ),
        (
            Genre {
                id: "science".into(),
                name: "Science".into(),
                description: "Research priorities and their funding".into(),
            },
            vec![topic(
                "sci-space",
                "Public money for space exploration is well spent",
                "Compare the returns of space programs with earthbound needs.",
            )],
        ),
    ])
}
