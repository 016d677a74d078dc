//! The fixed catalog of tools the model may call

use std::fmt;

use super::{ParamSpec, ToolSpec};

/// Every tool known to Bob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    WebSearch,
    CreatePost,
    CreateLinkPost,
    GetFeed,
    GetPersonalizedFeed,
    GetPostsFromSubmolt,
    GetSinglePost,
    AddComment,
    ReplyToComment,
    GetComments,
    UpvotePost,
    DownvotePost,
    UpvoteComment,
    ListSubmolts,
    SubscribeToSubmolt,
    UnsubscribeFromSubmolt,
    FollowUser,
    UnfollowUser,
    SearchPostsAndComments,
    SendEmail,
    ScheduleEmail,
    GetSystemInfo,
    GenerateImage,
}

impl ToolKind {
    pub const ALL: [ToolKind; 23] = [
        ToolKind::WebSearch,
        ToolKind::CreatePost,
        ToolKind::CreateLinkPost,
        ToolKind::GetFeed,
        ToolKind::GetPersonalizedFeed,
        ToolKind::GetPostsFromSubmolt,
        ToolKind::GetSinglePost,
        ToolKind::AddComment,
        ToolKind::ReplyToComment,
        ToolKind::GetComments,
        ToolKind::UpvotePost,
        ToolKind::DownvotePost,
        ToolKind::UpvoteComment,
        ToolKind::ListSubmolts,
        ToolKind::SubscribeToSubmolt,
        ToolKind::UnsubscribeFromSubmolt,
        ToolKind::FollowUser,
        ToolKind::UnfollowUser,
        ToolKind::SearchPostsAndComments,
        ToolKind::SendEmail,
        ToolKind::ScheduleEmail,
        ToolKind::GetSystemInfo,
        ToolKind::GenerateImage,
    ];

    /// Kinds served by the Moltbook client
    pub const MOLTBOOK: [ToolKind; 18] = [
        ToolKind::CreatePost,
        ToolKind::CreateLinkPost,
        ToolKind::GetFeed,
        ToolKind::GetPersonalizedFeed,
        ToolKind::GetPostsFromSubmolt,
        ToolKind::GetSinglePost,
        ToolKind::AddComment,
        ToolKind::ReplyToComment,
        ToolKind::GetComments,
        ToolKind::UpvotePost,
        ToolKind::DownvotePost,
        ToolKind::UpvoteComment,
        ToolKind::ListSubmolts,
        ToolKind::SubscribeToSubmolt,
        ToolKind::UnsubscribeFromSubmolt,
        ToolKind::FollowUser,
        ToolKind::UnfollowUser,
        ToolKind::SearchPostsAndComments,
    ];

    /// Name the model uses to invoke the tool
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "web_search",
            ToolKind::CreatePost => "create_post",
            ToolKind::CreateLinkPost => "create_link_post",
            ToolKind::GetFeed => "get_feed",
            ToolKind::GetPersonalizedFeed => "get_personalized_feed",
            ToolKind::GetPostsFromSubmolt => "get_posts_from_submolt",
            ToolKind::GetSinglePost => "get_single_post",
            ToolKind::AddComment => "add_comment",
            ToolKind::ReplyToComment => "reply_to_comment",
            ToolKind::GetComments => "get_comments",
            ToolKind::UpvotePost => "upvote_post",
            ToolKind::DownvotePost => "downvote_post",
            ToolKind::UpvoteComment => "upvote_comment",
            ToolKind::ListSubmolts => "list_submolts",
            ToolKind::SubscribeToSubmolt => "subscribe_to_submolt",
            ToolKind::UnsubscribeFromSubmolt => "unsubscribe_from_submolt",
            ToolKind::FollowUser => "follow_user",
            ToolKind::UnfollowUser => "unfollow_user",
            ToolKind::SearchPostsAndComments => "search_posts_and_comments",
            ToolKind::SendEmail => "send_email",
            ToolKind::ScheduleEmail => "schedule_email",
            ToolKind::GetSystemInfo => "get_system_info",
            ToolKind::GenerateImage => "generate_image",
        }
    }

    /// Look a tool up by the name the model used. Surrounding whitespace is ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn spec(&self) -> ToolSpec {
        let (description, parameters) = match self {
            ToolKind::WebSearch => (
                "Search the web for current information",
                vec![ParamSpec::required("query", "What to search for")],
            ),
            ToolKind::CreatePost => (
                "Create a text post on Moltbook",
                vec![
                    ParamSpec::required("submolt", "Community to post in, e.g. general"),
                    ParamSpec::required("title", "Post title"),
                    ParamSpec::required("content", "Post body"),
                ],
            ),
            ToolKind::CreateLinkPost => (
                "Share a link on Moltbook",
                vec![
                    ParamSpec::required("submolt", "Community to post in"),
                    ParamSpec::required("title", "Post title"),
                    ParamSpec::required("url", "Link to share"),
                ],
            ),
            ToolKind::GetFeed => ("Get the hottest posts on Moltbook", Vec::new()),
            ToolKind::GetPersonalizedFeed => (
                "Get posts from communities and users you follow",
                Vec::new(),
            ),
            ToolKind::GetPostsFromSubmolt => (
                "Get the newest posts from one community",
                vec![ParamSpec::required("submolt", "Community name")],
            ),
            ToolKind::GetSinglePost => (
                "Get one post by id",
                vec![ParamSpec::required("post_id", "Post id")],
            ),
            ToolKind::AddComment => (
                "Comment on a post",
                vec![
                    ParamSpec::required("post_id", "Post id"),
                    ParamSpec::required("content", "Comment text"),
                ],
            ),
            ToolKind::ReplyToComment => (
                "Reply to a comment on a post",
                vec![
                    ParamSpec::required("post_id", "Post id"),
                    ParamSpec::required("parent_comment_id", "Comment being replied to"),
                    ParamSpec::required("content", "Reply text"),
                ],
            ),
            ToolKind::GetComments => (
                "Get the top comments of a post",
                vec![ParamSpec::required("post_id", "Post id")],
            ),
            ToolKind::UpvotePost => (
                "Upvote a post",
                vec![ParamSpec::required("post_id", "Post id")],
            ),
            ToolKind::DownvotePost => (
                "Downvote a post",
                vec![ParamSpec::required("post_id", "Post id")],
            ),
            ToolKind::UpvoteComment => (
                "Upvote a comment",
                vec![ParamSpec::required("comment_id", "Comment id")],
            ),
            ToolKind::ListSubmolts => ("List Moltbook communities", Vec::new()),
            ToolKind::SubscribeToSubmolt => (
                "Subscribe to a community",
                vec![ParamSpec::required("submolt", "Community name")],
            ),
            ToolKind::UnsubscribeFromSubmolt => (
                "Unsubscribe from a community",
                vec![ParamSpec::required("submolt", "Community name")],
            ),
            ToolKind::FollowUser => (
                "Follow a Moltbook user",
                vec![ParamSpec::required("username", "User to follow")],
            ),
            ToolKind::UnfollowUser => (
                "Stop following a Moltbook user",
                vec![ParamSpec::required("username", "User to unfollow")],
            ),
            ToolKind::SearchPostsAndComments => (
                "Search Moltbook posts and comments",
                vec![ParamSpec::required("query", "What to search for")],
            ),
            ToolKind::SendEmail => (
                "Send an email now",
                vec![
                    ParamSpec::required("recipient", "Email address"),
                    ParamSpec::required("subject", "Subject line"),
                    ParamSpec::required("body", "Message text"),
                ],
            ),
            ToolKind::ScheduleEmail => (
                "Send an email at a later time",
                vec![
                    ParamSpec::required("recipient", "Email address"),
                    ParamSpec::required("subject", "Subject line"),
                    ParamSpec::required("body", "Message text"),
                    ParamSpec::required("send_time", "Local time as YYYY-MM-DD HH:MM"),
                ],
            ),
            ToolKind::GetSystemInfo => (
                "Get the current time and this computer's CPU, memory and disk usage",
                Vec::new(),
            ),
            ToolKind::GenerateImage => (
                "Generate an image from a description; it is attached to your reply",
                vec![ParamSpec::required("prompt", "Description of the image")],
            ),
        };

        ToolSpec {
            name: self.name(),
            description,
            parameters,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique_and_round_trip() {
        let names: HashSet<&str> = ToolKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), ToolKind::ALL.len());

        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_from_name_unknown() {
        assert_eq!(ToolKind::from_name("rm_rf"), None);
        assert_eq!(ToolKind::from_name(" web_search "), Some(ToolKind::WebSearch));
    }

    #[test]
    fn test_required_params_match_catalog() {
        let required = |kind: ToolKind| -> Vec<&'static str> {
            kind.spec().parameters.iter().filter(|p| p.required).map(|p| p.name).collect()
        };

        assert_eq!(required(ToolKind::WebSearch), vec!["query"]);
        assert_eq!(required(ToolKind::CreatePost), vec!["submolt", "title", "content"]);
        assert_eq!(required(ToolKind::CreateLinkPost), vec!["submolt", "title", "url"]);
        assert_eq!(
            required(ToolKind::ReplyToComment),
            vec!["post_id", "parent_comment_id", "content"]
        );
        assert_eq!(required(ToolKind::UpvoteComment), vec!["comment_id"]);
        assert_eq!(
            required(ToolKind::ScheduleEmail),
            vec!["recipient", "subject", "body", "send_time"]
        );
        assert!(required(ToolKind::GetFeed).is_empty());
        assert!(required(ToolKind::GetSystemInfo).is_empty());
        assert_eq!(required(ToolKind::GenerateImage), vec!["prompt"]);
    }

    #[test]
    fn test_moltbook_kinds_are_in_catalog() {
        for kind in ToolKind::MOLTBOOK {
            assert!(ToolKind::ALL.contains(&kind));
        }
    }
}
