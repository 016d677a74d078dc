//! Unsupervised Moltbook browsing
//!
//! Picks a random post from the personalized feed and leaves a generated
//! comment on it.

use std::sync::Arc;

use rand::Rng;
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::orchestration::{OrchestrationLoop, ResponseCleaner, RunOptions};
use crate::tools::moltbook::MoltbookClient;

const COMMENT_MAX_TOKENS: u32 = 200;
const COMMENT_TEMPERATURE: f32 = 0.7;

/// What a browse pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseOutcome {
    EmptyFeed,
    Commented { post_id: String, comment: String },
}

pub struct MoltbookBrowser {
    client: Arc<MoltbookClient>,
    orchestration: Arc<OrchestrationLoop>,
    cleaner: ResponseCleaner,
}

impl MoltbookBrowser {
    pub fn new(client: Arc<MoltbookClient>, orchestration: Arc<OrchestrationLoop>) -> Self {
        Self {
            client,
            orchestration,
            // Comments carry no email envelope
            cleaner: ResponseCleaner::default(),
        }
    }

    pub async fn browse(&self) -> Result<BrowseOutcome> {
        info!("Browsing Moltbook");

        let feed = self.client.get_personalized_feed().await?;
        let Some(post_id) = pick_post(&feed, &mut rand::rng()) else {
            info!("No posts in feed");
            return Ok(BrowseOutcome::EmptyFeed);
        };

        let post = self.client.get_single_post(&post_id).await?;
        if let Some(title) = post.pointer("/post/title").and_then(Value::as_str) {
            info!(post_id = %post_id, title = %title, "Picked post");
        }

        let options = RunOptions {
            max_tokens: Some(COMMENT_MAX_TOKENS),
            temperature: Some(COMMENT_TEMPERATURE),
            tools_enabled: Some(false),
        };
        let raw = self
            .orchestration
            .generate_once(&comment_prompt(&post), options)
            .await?;
        let comment = self.cleaner.clean(&raw);
        if comment.is_empty() {
            return Err(Error::Provider("model produced an empty comment".to_string()));
        }

        self.client.add_comment(&post_id, &comment).await?;
        info!(post_id = %post_id, "Comment posted");

        Ok(BrowseOutcome::Commented { post_id, comment })
    }
}

/// Id of a random post in a feed response
pub fn pick_post<R: Rng + ?Sized>(feed: &Value, rng: &mut R) -> Option<String> {
    let ids: Vec<String> = feed
        .get("posts")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|post| match post.get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
        .collect();

    if ids.is_empty() {
        return None;
    }
    Some(ids[rng.random_range(0..ids.len())].clone())
}

/// Prompt asking for a comment on a single-post response
pub fn comment_prompt(post: &Value) -> String {
    let content = post
        .pointer("/post/content")
        .and_then(Value::as_str)
        .or_else(|| post.pointer("/post/title").and_then(Value::as_str))
        .unwrap_or_default();
    format!(
        "Write an interesting and relevant comment to this post: ```{}```",
        content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    #[test]
    fn test_pick_post() {
        let feed = json!({"posts": [{"id": "a"}, {"id": 7}, {"title": "no id"}]});
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let id = pick_post(&feed, &mut rng).unwrap();
            assert!(id == "a" || id == "7");
        }
    }

    #[test]
    fn test_pick_post_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_post(&json!({"posts": []}), &mut rng), None);
        assert_eq!(pick_post(&json!({"error": "nope"}), &mut rng), None);
    }

    #[test]
    fn test_comment_prompt() {
        let post = json!({"post": {"title": "T", "content": "Pis are great"}});
        assert_eq!(
            comment_prompt(&post),
            "Write an interesting and relevant comment to this post: ```Pis are great```"
        );
    }
}
