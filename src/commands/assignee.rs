//! Assignee Feed
//!
//! Fetches assignee candidates from a randomuser.me style service.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::AssigneeFeed;
use crate::error::SchemaError;
use crate::models::AssigneeCandidate;

#[derive(Debug, Deserialize)]
struct RandomUsersResponse {
    results: Vec<RandomUser>,
}

#[derive(Debug, Deserialize)]
struct RandomUser {
    name: RandomUserName,
    picture: RandomUserPicture,
}

#[derive(Debug, Deserialize)]
struct RandomUserName {
    first: String,
    last: String,
}

#[derive(Debug, Deserialize)]
struct RandomUserPicture {
    thumbnail: String,
}

/// Validate a feed body and project it to candidates
pub fn parse_candidates(body: &str) -> Result<Vec<AssigneeCandidate>, SchemaError> {
    let response: RandomUsersResponse =
        serde_json::from_str(body).map_err(|e| SchemaError::Shape(e.to_string()))?;

    Ok(response
        .results
        .into_iter()
        .map(|user| AssigneeCandidate::new(&user.name.first, &user.name.last, user.picture.thumbnail))
        .collect())
}

/// HTTP implementation of the feed
#[derive(Clone)]
pub struct RandomUserFeed {
    url: String,
    http: reqwest::Client,
}

impl RandomUserFeed {
    pub fn new(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }
}

#[async_trait]
impl AssigneeFeed for RandomUserFeed {
    async fn fetch_candidates(&self, count: usize) -> Result<Vec<AssigneeCandidate>, SchemaError> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("results", count.to_string()), ("inc", "name,picture".to_string())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SchemaError::Fetch(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| SchemaError::Fetch(e.to_string()))?;

        let candidates = parse_candidates(&body)?;
        debug!(count = candidates.len(), "Fetched assignee candidates");
        Ok(candidates)
    }
}
