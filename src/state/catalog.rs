//! Read-only topic catalog consulted when rooms are created.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::state::room::Topic;

/// Group of topics shown together when picking a debate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    /// Stable identifier used in URLs.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short blurb.
    pub description: String,
}

/// Genres in configuration order, each with its topics.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    genres: IndexMap<String, (Genre, Vec<Topic>)>,
}

impl Catalog {
    /// Build a catalog; a genre listed twice keeps its last definition.
    pub fn new(entries: Vec<(Genre, Vec<Topic>)>) -> Self {
        let genres = entries
            .into_iter()
            .map(|(genre, topics)| (genre.id.clone(), (genre, topics)))
            .collect();
        Self { genres }
    }

    pub fn genres(&self) -> Vec<&Genre> {
        self.genres.values().map(|(genre, _)| genre).collect()
    }

    /// Topics filed under `genre_id`, or `None` for an unknown genre.
    pub fn topics(&self, genre_id: &str) -> Option<&[Topic]> {
        self.genres
            .get(genre_id)
            .map(|(_, topics)| topics.as_slice())
    }

    /// Look a topic up across all genres.
    pub fn topic(&self, topic_id: &str) -> Option<&Topic> {
        self.genres
            .values()
            .flat_map(|(_, topics)| topics.iter())
            .find(|topic| topic.id == topic_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_by_genre_and_topic() {
        let catalog = Catalog::new(vec![(
            Genre {
                id: "food".into(),
                name: "Food".into(),
                description: String::new(),
            },
            vec![Topic {
                id: "pineapple".into(),
                title: "Pineapple belongs on pizza".into(),
                description: String::new(),
            }],
        )]);

        assert_eq!(catalog.genres().len(), 1);
        assert_eq!(catalog.topics("food").map(<[Topic]>::len), Some(1));
        assert!(catalog.topics("sports").is_none());
        assert_eq!(
            catalog.topic("pineapple").map(|t| t.title.as_str()),
            Some("Pineapple belongs on pizza")
        );
        assert!(catalog.topic("unknown").is_none());
    }
}
