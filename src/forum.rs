use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:18000/";
pub const COMMENTS_PATH: &str = "/api/discussion/v1/comments/";
pub const THREADS_PATH: &str = "/api/discussion/v1/threads/";
pub const BLOCKS_PATH: &str = "/api/courses/v1/blocks/";

pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Result<AccessToken>;
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: Option<SystemTime>,
}

/// Token provider backed by a fixed bearer token, e.g. one read from config.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Result<AccessToken> {
        if self.token.trim().is_empty() {
            bail!("forum: access token is empty");
        }
        Ok(AccessToken {
            access_token: self.token.clone(),
            token_type: "Bearer".to_string(),
            expires_at: None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub http_client: Option<HttpClient>,
}

/// Optional parameters for the comment-listing endpoint. `thread_id` and
/// `page` are always required and passed separately.
#[derive(Debug, Clone, Default)]
pub struct CommentQuery {
    pub page_size: Option<u32>,
    pub requested_fields: Option<String>,
}

impl CommentQuery {
    fn into_params(self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(page_size) = self.page_size {
            params.push(("page_size".into(), page_size.to_string()));
        }
        let fields = self
            .requested_fields
            .unwrap_or_else(|| "profile_image".to_string());
        params.push(("requested_fields".into(), fields));
        params
    }
}

/// Discussion actions a user may take on a thread or comment. The wire form
/// matches the field names the API reports in `editable_fields`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum ContentAction {
    #[serde(rename = "raw_body")]
    Edit,
    #[serde(rename = "pinned")]
    Pin,
    #[serde(rename = "endorsed")]
    Endorse,
    #[serde(rename = "closed")]
    Close,
    #[serde(rename = "abuse_flagged")]
    Report,
    #[serde(rename = "delete")]
    Delete,
    #[serde(rename = "following")]
    Follow,
    #[serde(rename = "voted")]
    Vote,
    // The API reports more editable fields than we act on (title, topic_id, ...).
    #[serde(other)]
    Other,
}

impl ContentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentAction::Edit => "raw_body",
            ContentAction::Pin => "pinned",
            ContentAction::Endorse => "endorsed",
            ContentAction::Close => "closed",
            ContentAction::Report => "abuse_flagged",
            ContentAction::Delete => "delete",
            ContentAction::Follow => "following",
            ContentAction::Vote => "voted",
            ContentAction::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThreadType {
    #[default]
    Discussion,
    Question,
}

impl ThreadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadType::Discussion => "discussion",
            ThreadType::Question => "question",
        }
    }
}

/// Pagination metadata returned with every listing response. All fields are
/// required on the wire: a response without them fails to decode rather than
/// being mistaken for an exhausted listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub num_pages: u64,
    pub next: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub thread_id: String,
    #[serde(default)]
    pub rendered_body: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub endorsed: bool,
    #[serde(default)]
    pub abuse_flagged: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub editable_fields: Vec<ContentAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub thread_type: ThreadType,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub endorsed: bool,
    #[serde(default)]
    pub abuse_flagged: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub following: bool,
    #[serde(default)]
    pub raw_body: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub topic_id: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub editable_fields: Vec<ContentAction>,
}

pub struct Client {
    token_provider: Arc<dyn TokenProvider>,
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(token_provider: Arc<dyn TokenProvider>, config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("forum client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        Ok(Client {
            token_provider,
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    /// Fetch one page of comments belonging to a thread. `page` is 1-based.
    pub fn comments(&self, thread_id: &str, page: u64, opts: CommentQuery) -> Result<Page<Comment>> {
        if thread_id.trim().is_empty() {
            bail!("forum: thread id is required");
        }
        if page == 0 {
            bail!("forum: page numbers start at 1");
        }
        let mut params = vec![
            ("thread_id".to_string(), thread_id.to_string()),
            ("page".to_string(), page.to_string()),
        ];
        params.extend(opts.into_params());
        self.fetch_json(COMMENTS_PATH, &params)
    }

    pub fn thread(&self, thread_id: &str) -> Result<Thread> {
        if thread_id.trim().is_empty() {
            bail!("forum: thread id is required");
        }
        let path = format!("{}{}/", THREADS_PATH, thread_id);
        self.fetch_json(&path, &[])
    }

    /// Fetch the course outline blocks tree. The payload is passed through
    /// undecoded; callers pick out what they need.
    pub fn course_blocks(&self, course_id: &str, username: &str) -> Result<Value> {
        let params = vec![
            ("course_id".to_string(), course_id.to_string()),
            ("username".to_string(), username.to_string()),
            ("depth".to_string(), "all".to_string()),
            ("requested_fields".to_string(), "children".to_string()),
            (
                "block_types_filter".to_string(),
                "course,chapter,sequential,vertical,discussion".to_string(),
            ),
            ("student_view_data".to_string(), "discussion".to_string()),
        ];
        self.fetch_json(BLOCKS_PATH, &params)
    }

    fn fetch_json<T>(&self, path: &str, params: &[(String, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let resp = self.request(Method::GET, path, params)?;
        Ok(resp.json()?)
    }

    fn request(&self, method: Method, path: &str, params: &[(String, String)]) -> Result<Response> {
        let token = self.token_provider.token()?;
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }

        debug!("forum: {} {}", method, url.path());
        let resp = self
            .http
            .request(method, url)
            .header(USER_AGENT, self.user_agent.clone())
            .header(
                AUTHORIZATION,
                format!("{} {}", token.token_type, token.access_token),
            )
            .send()?;

        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            match status.as_u16() {
                401 => Err(anyhow!("forum: unauthorized")),
                403 => Err(anyhow!("forum: forbidden")),
                404 => Err(anyhow!("forum: not found")),
                429 => Err(anyhow!("forum: rate limited: {}", body)),
                _ => Err(anyhow!("forum: api error {}: {}", status, body)),
            }
        }
    }
}
