//! Moltbook social platform client and tools
//!
//! One [`MoltbookClient`] is shared by all Moltbook tool kinds. Responses are
//! handed back to the model as compact JSON text.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Url};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result, ToolError};
use crate::tools::{id_param, str_param, BoxFuture, Tool, ToolKind, ToolOutput};

/// Longest response text handed back to the model
const MAX_RESPONSE_CHARS: usize = 4_000;

/// REST client for the Moltbook API
pub struct MoltbookClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl MoltbookClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid Moltbook base URL {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("Moltbook base URL {} cannot take a path", base_url)));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// Base URL extended by `segments`, each percent-encoded as a single path segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        if let Some(bad) = segments.iter().find(|s| matches!(s.trim(), "" | "." | "..")) {
            return Err(Error::Tool(ToolError::InvalidParams(format!(
                "invalid path segment {:?}",
                bad
            ))));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Moltbook base URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self
            .http
            .request(method, self.endpoint(segments)?)
            .bearer_auth(&self.api_key))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::Tool(ToolError::ExecutionFailed(format!(
                "Moltbook API returned {}: {}",
                status, snippet
            ))));
        }

        if body.trim().is_empty() {
            return Ok(json!({ "success": true }));
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn create_post(&self, submolt: &str, title: &str, content: &str) -> Result<Value> {
        self.send(self.request(Method::POST, &["posts"])?.json(&json!({
            "submolt": submolt,
            "title": title,
            "content": content,
        })))
        .await
    }

    pub async fn create_link_post(&self, submolt: &str, title: &str, url: &str) -> Result<Value> {
        self.send(self.request(Method::POST, &["posts"])?.json(&json!({
            "submolt": submolt,
            "title": title,
            "url": url,
        })))
        .await
    }

    pub async fn get_feed(&self) -> Result<Value> {
        self.send(self.request(Method::GET, &["posts"])?.query(&[("sort", "hot"), ("limit", "25")]))
            .await
    }

    pub async fn get_personalized_feed(&self) -> Result<Value> {
        self.send(self.request(Method::GET, &["feed"])?.query(&[("sort", "hot"), ("limit", "25")]))
            .await
    }

    pub async fn get_posts_from_submolt(&self, submolt: &str) -> Result<Value> {
        self.send(
            self.request(Method::GET, &["posts"])?
                .query(&[("submolt", submolt), ("sort", "new")]),
        )
        .await
    }

    pub async fn get_single_post(&self, post_id: &str) -> Result<Value> {
        self.send(self.request(Method::GET, &["posts", post_id])?).await
    }

    pub async fn add_comment(&self, post_id: &str, content: &str) -> Result<Value> {
        self.send(
            self.request(Method::POST, &["posts", post_id, "comments"])?
                .json(&json!({ "content": content })),
        )
        .await
    }

    pub async fn reply_to_comment(
        &self,
        post_id: &str,
        parent_comment_id: &str,
        content: &str,
    ) -> Result<Value> {
        self.send(
            self.request(Method::POST, &["posts", post_id, "comments"])?
                .json(&json!({ "content": content, "parent_id": parent_comment_id })),
        )
        .await
    }

    pub async fn get_comments(&self, post_id: &str) -> Result<Value> {
        self.send(
            self.request(Method::GET, &["posts", post_id, "comments"])?
                .query(&[("sort", "top")]),
        )
        .await
    }

    pub async fn upvote_post(&self, post_id: &str) -> Result<Value> {
        self.send(self.request(Method::POST, &["posts", post_id, "upvote"])?).await
    }

    pub async fn downvote_post(&self, post_id: &str) -> Result<Value> {
        self.send(self.request(Method::POST, &["posts", post_id, "downvote"])?).await
    }

    pub async fn upvote_comment(&self, comment_id: &str) -> Result<Value> {
        self.send(self.request(Method::POST, &["comments", comment_id, "upvote"])?).await
    }

    pub async fn list_submolts(&self) -> Result<Value> {
        self.send(self.request(Method::GET, &["submolts"])?).await
    }

    pub async fn subscribe_to_submolt(&self, submolt: &str) -> Result<Value> {
        self.send(self.request(Method::POST, &["submolts", submolt, "subscribe"])?).await
    }

    pub async fn unsubscribe_from_submolt(&self, submolt: &str) -> Result<Value> {
        self.send(self.request(Method::DELETE, &["submolts", submolt, "subscribe"])?).await
    }

    pub async fn follow_user(&self, username: &str) -> Result<Value> {
        self.send(self.request(Method::POST, &["agents", username, "follow"])?).await
    }

    pub async fn unfollow_user(&self, username: &str) -> Result<Value> {
        self.send(self.request(Method::DELETE, &["agents", username, "follow"])?).await
    }

    pub async fn search_posts_and_comments(&self, query: &str) -> Result<Value> {
        self.send(
            self.request(Method::GET, &["search"])?
                .query(&[("q", query), ("limit", "20")]),
        )
        .await
    }
}

/// One Moltbook tool kind bound to the shared client
pub struct MoltbookTool {
    kind: ToolKind,
    client: Arc<MoltbookClient>,
}

impl MoltbookTool {
    pub fn new(kind: ToolKind, client: Arc<MoltbookClient>) -> Self {
        Self { kind, client }
    }

    async fn run(&self, params: &Value) -> Result<Value> {
        let c = &self.client;
        match self.kind {
            ToolKind::CreatePost => {
                c.create_post(
                    str_param(params, "submolt")?,
                    str_param(params, "title")?,
                    str_param(params, "content")?,
                )
                .await
            }
            ToolKind::CreateLinkPost => {
                c.create_link_post(
                    str_param(params, "submolt")?,
                    str_param(params, "title")?,
                    str_param(params, "url")?,
                )
                .await
            }
            ToolKind::GetFeed => c.get_feed().await,
            ToolKind::GetPersonalizedFeed => c.get_personalized_feed().await,
            ToolKind::GetPostsFromSubmolt => {
                c.get_posts_from_submolt(str_param(params, "submolt")?).await
            }
            ToolKind::GetSinglePost => c.get_single_post(&id_param(params, "post_id")?).await,
            ToolKind::AddComment => {
                c.add_comment(&id_param(params, "post_id")?, str_param(params, "content")?)
                    .await
            }
            ToolKind::ReplyToComment => {
                c.reply_to_comment(
                    &id_param(params, "post_id")?,
                    &id_param(params, "parent_comment_id")?,
                    str_param(params, "content")?,
                )
                .await
            }
            ToolKind::GetComments => c.get_comments(&id_param(params, "post_id")?).await,
            ToolKind::UpvotePost => c.upvote_post(&id_param(params, "post_id")?).await,
            ToolKind::DownvotePost => c.downvote_post(&id_param(params, "post_id")?).await,
            ToolKind::UpvoteComment => c.upvote_comment(&id_param(params, "comment_id")?).await,
            ToolKind::ListSubmolts => c.list_submolts().await,
            ToolKind::SubscribeToSubmolt => {
                c.subscribe_to_submolt(str_param(params, "submolt")?).await
            }
            ToolKind::UnsubscribeFromSubmolt => {
                c.unsubscribe_from_submolt(str_param(params, "submolt")?).await
            }
            ToolKind::FollowUser => c.follow_user(str_param(params, "username")?).await,
            ToolKind::UnfollowUser => c.unfollow_user(str_param(params, "username")?).await,
            ToolKind::SearchPostsAndComments => {
                c.search_posts_and_comments(str_param(params, "query")?).await
            }
            other => Err(Error::Tool(ToolError::NotFound(format!(
                "{} is not a Moltbook tool",
                other
            )))),
        }
    }
}

impl Tool for MoltbookTool {
    fn execute(&self, params: Value) -> BoxFuture<'_, std::result::Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            debug!(tool = %self.kind, "Calling Moltbook");
            let value = self.run(&params).await?;
            Ok(ToolOutput::text(compact_response(&value)))
        })
    }
}

/// Compact JSON text, cut to a size the model can take in
fn compact_response(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() <= MAX_RESPONSE_CHARS {
        return text;
    }
    let cut: String = text.chars().take(MAX_RESPONSE_CHARS).collect();
    format!("{}... [response cut]", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MoltbookClient {
        MoltbookClient::new("https://www.moltbook.com/api/v1/", "key").unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let url = client().endpoint(&["posts", "42", "comments"]).unwrap();
        assert_eq!(url.as_str(), "https://www.moltbook.com/api/v1/posts/42/comments");

        let bare = MoltbookClient::new("https://www.moltbook.com/api/v1", "key").unwrap();
        assert_eq!(bare.endpoint(&["feed"]).unwrap().as_str(), "https://www.moltbook.com/api/v1/feed");
    }

    #[test]
    fn test_endpoint_escapes_model_supplied_ids() {
        let url = client().endpoint(&["posts", "../agents/x/follow", "comments"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.moltbook.com/api/v1/posts/..%2Fagents%2Fx%2Ffollow/comments"
        );

        let url = client().endpoint(&["agents", "a b?c#d", "follow"]).unwrap();
        assert_eq!(url.path_segments().unwrap().count(), 5);
        assert!(!url.as_str().contains('?'));
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_endpoint_rejects_dot_segments() {
        for bad in ["..", ".", ""] {
            let err = client().endpoint(&["posts", bad, "upvote"]).unwrap_err();
            assert!(matches!(err, Error::Tool(ToolError::InvalidParams(_))), "{:?}", bad);
        }
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        assert!(matches!(MoltbookClient::new("not a url", "key"), Err(Error::Config(_))));
        assert!(matches!(MoltbookClient::new("mailto:bob@example.com", "key"), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_traversal_id_rejected_before_request() {
        let client = Arc::new(MoltbookClient::new("http://127.0.0.1:1", "key").unwrap());
        let tool = MoltbookTool::new(ToolKind::UpvotePost, client);
        let err = tool.execute(json!({"post_id": ".."})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[test]
    fn test_compact_response_short() {
        let value = json!({"posts": [{"id": "1", "title": "hi"}]});
        assert_eq!(compact_response(&value), value.to_string());
    }

    #[test]
    fn test_compact_response_long() {
        let value = json!({"content": "x".repeat(MAX_RESPONSE_CHARS * 2)});
        let text = compact_response(&value);
        assert!(text.ends_with("[response cut]"));
        assert!(text.chars().count() < MAX_RESPONSE_CHARS + 20);
    }

    #[tokio::test]
    async fn test_missing_param_is_invalid_params() {
        let client = Arc::new(MoltbookClient::new("http://127.0.0.1:1", "key").unwrap());
        let tool = MoltbookTool::new(ToolKind::AddComment, client);
        let err = tool.execute(json!({"post_id": "1"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_non_moltbook_kind_rejected() {
        let client = Arc::new(MoltbookClient::new("http://127.0.0.1:1", "key").unwrap());
        let tool = MoltbookTool::new(ToolKind::WebSearch, client);
        let err = tool.execute(json!({"query": "x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
