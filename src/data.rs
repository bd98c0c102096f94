use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::forum::{self, Comment, Page, Thread};
use crate::loader::pagination;

pub trait CommentService: Send + Sync {
    fn fetch_comments(&self, thread_id: &str, page: u64) -> Result<Page<Comment>>;
}

pub trait ThreadService: Send + Sync {
    fn load_thread(&self, thread_id: &str) -> Result<Thread>;
}

pub struct ForumCommentService {
    client: Arc<forum::Client>,
    page_size: Option<u32>,
    requested_fields: Option<String>,
}

impl ForumCommentService {
    pub fn new(
        client: Arc<forum::Client>,
        page_size: Option<u32>,
        requested_fields: Option<String>,
    ) -> Self {
        Self {
            client,
            page_size,
            requested_fields,
        }
    }
}

impl CommentService for ForumCommentService {
    fn fetch_comments(&self, thread_id: &str, page: u64) -> Result<Page<Comment>> {
        let query = forum::CommentQuery {
            page_size: self.page_size,
            requested_fields: self.requested_fields.clone(),
        };
        self.client
            .comments(thread_id, page, query)
            .context("fetch comment page")
    }
}

pub struct ForumThreadService {
    client: Arc<forum::Client>,
}

impl ForumThreadService {
    pub fn new(client: Arc<forum::Client>) -> Self {
        Self { client }
    }
}

impl ThreadService for ForumThreadService {
    fn load_thread(&self, thread_id: &str) -> Result<Thread> {
        self.client.thread(thread_id).context("fetch thread")
    }
}

/// Serves canned comment pages from memory, with the same pagination shape
/// the real API returns. Used for offline browsing and in loader tests.
pub struct MockCommentService {
    pages: Vec<Vec<Comment>>,
}

impl MockCommentService {
    pub fn new(pages: Vec<Vec<Comment>>) -> Self {
        Self { pages }
    }

    pub fn sample(thread_id: &str) -> Self {
        Self::new(vec![
            vec![
                mock_comment(thread_id, "c1", "Welcome to threadview offline mode."),
                mock_comment(thread_id, "c2", "These comments are canned sample data."),
            ],
            vec![mock_comment(
                thread_id,
                "c3",
                "Pass a real access token in config to browse live threads.",
            )],
        ])
    }
}

impl CommentService for MockCommentService {
    fn fetch_comments(&self, thread_id: &str, page: u64) -> Result<Page<Comment>> {
        let num_pages = self.pages.len() as u64;
        if page == 0 || page > num_pages {
            bail!("mock: no page {} for thread {}", page, thread_id);
        }
        let results = self.pages[(page - 1) as usize]
            .iter()
            .cloned()
            .map(|mut comment| {
                comment.thread_id = thread_id.to_string();
                comment
            })
            .collect();
        Ok(Page {
            results,
            pagination: pagination(page, num_pages),
        })
    }
}

#[derive(Default)]
pub struct MockThreadService;

impl ThreadService for MockThreadService {
    fn load_thread(&self, thread_id: &str) -> Result<Thread> {
        let payload = serde_json::json!({
            "id": thread_id,
            "author": "threadview",
            "title": "Sample thread",
            "type": "discussion",
            "vote_count": 3,
            "comment_count": 3,
            "raw_body": "Sample content provided for offline browsing.",
            "can_delete": true,
            "editable_fields": ["raw_body", "following", "voted"],
        });
        serde_json::from_value(payload).context("build mock thread")
    }
}

pub fn mock_comment(thread_id: &str, id: &str, body: &str) -> Comment {
    Comment {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
        rendered_body: body.to_string(),
        author: "threadview".to_string(),
        vote_count: 0,
        endorsed: false,
        abuse_flagged: false,
        can_delete: false,
        editable_fields: Vec::new(),
    }
}
