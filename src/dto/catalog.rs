use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::{catalog::Genre, room::Topic};

/// Genre entry listed by `GET /genres`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenreSummary {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Topic entry, as listed and as embedded in rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TopicSummary {
    pub id: String,
    pub title: String,
    pub description: String,
}

impl From<&Genre> for GenreSummary {
    fn from(genre: &Genre) -> Self {
        Self {
            id: genre.id.clone(),
            name: genre.name.clone(),
            description: genre.description.clone(),
        }
    }
}

impl From<Topic> for TopicSummary {
    fn from(topic: Topic) -> Self {
        Self {
            id: topic.id,
            title: topic.title,
            description: topic.description,
        }
    }
}
