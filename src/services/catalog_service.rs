use crate::{
    dto::catalog::{GenreSummary, TopicSummary},
    error::ServiceError,
    state::SharedState,
};

/// Every genre of the catalog, in configuration order.
pub fn list_genres(state: &SharedState) -> Vec<GenreSummary> {
    state
        .catalog()
        .genres()
        .into_iter()
        .map(GenreSummary::from)
        .collect()
}

/// Topics of `genre_id`.
pub fn list_topics(state: &SharedState, genre_id: &str) -> Result<Vec<TopicSummary>, ServiceError> {
    let topics = state
        .catalog()
        .topics(genre_id)
        .ok_or_else(|| ServiceError::NotFound(format!("genre `{genre_id}` not found")))?;
    Ok(topics.iter().cloned().map(TopicSummary::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[test]
    fn browses_the_built_in_catalog() {
        let state = AppState::new(AppConfig::default(), None);

        let genres = list_genres(&state);
        assert!(genres.iter().any(|genre| genre.id == "science"));
        let topics = list_topics(&state, "science").unwrap();
        assert!(topics.iter().any(|topic| topic.id == "sci-space"));
        assert!(matches!(
            list_topics(&state, "astrology"),
            Err(ServiceError::NotFound(_))
        ));
    }
}
