use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::actions;
use crate::config;
use crate::data::{
    self, CommentService, ForumCommentService, ForumThreadService, MockThreadService, ThreadService,
};
use crate::forum;
use crate::loader::{CommentLoader, LoadError};

pub struct Options {
    pub thread_id: String,
    pub offline: bool,
}

impl Options {
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut thread_id = None;
        let mut offline = false;
        for arg in args {
            match arg.as_str() {
                "--offline" => offline = true,
                other if other.starts_with('-') => {
                    bail!("unknown flag: {} (see --help)", other);
                }
                other => {
                    if thread_id.replace(other.to_string()).is_some() {
                        bail!("expected a single thread id");
                    }
                }
            }
        }
        let thread_id = match thread_id {
            Some(id) => id,
            None => bail!("usage: threadview [--offline] <thread-id>"),
        };
        Ok(Options { thread_id, offline })
    }
}

pub fn run(options: Options) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;

    let (comment_service, thread_service): (Arc<dyn CommentService>, Arc<dyn ThreadService>) =
        if options.offline {
            (
                Arc::new(data::MockCommentService::sample(&options.thread_id)),
                Arc::new(MockThreadService),
            )
        } else {
            let user_agent = if cfg.forum.user_agent.trim().is_empty() {
                format!("threadview/{}", crate::VERSION)
            } else {
                cfg.forum.user_agent.clone()
            };
            let http = reqwest::blocking::Client::builder()
                .timeout(cfg.fetch.timeout)
                .build()
                .context("build http client")?;
            let token = Arc::new(forum::StaticToken::new(cfg.forum.access_token.clone()));
            let client = Arc::new(
                forum::Client::new(
                    token,
                    forum::ClientConfig {
                        user_agent,
                        base_url: Some(cfg.forum.base_url.clone()),
                        http_client: Some(http),
                    },
                )
                .context("build forum client")?,
            );
            (
                Arc::new(ForumCommentService::new(
                    client.clone(),
                    Some(cfg.fetch.page_size),
                    Some(cfg.fetch.requested_fields.clone()),
                )),
                Arc::new(ForumThreadService::new(client)),
            )
        };

    let loader = CommentLoader::new(comment_service);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    let thread = thread_service
        .load_thread(&options.thread_id)
        .context("load thread")?;
    print_thread(&thread);

    let first = loader
        .load_first_page(&options.thread_id)
        .context("load first comment page")?;
    for comment in &first {
        print_comment(comment);
    }
    let mut shown = first.len();

    while loader.has_more(&options.thread_id) {
        write!(stdout, "load more comments? [y/N] ")?;
        stdout.flush()?;
        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            break;
        }
        match loader.load_next_page(&options.thread_id) {
            Ok(all) => {
                for comment in &all[shown..] {
                    print_comment(comment);
                }
                shown = all.len();
            }
            Err(LoadError::NoMorePages) => break,
            Err(err) => {
                // Loaded comments stay intact and the prompt comes back,
                // so a transient fetch failure can simply be retried.
                eprintln!("error loading more comments: {err:#}");
            }
        }
    }

    if let Some(cursor) = loader.cursor(&options.thread_id) {
        println!(
            "-- {} comments shown ({} of {} pages)",
            shown, cursor.page, cursor.num_pages
        );
    }

    Ok(())
}

fn print_thread(thread: &forum::Thread) {
    println!(
        "{} ({}) by {} [{} votes, {} comments]",
        thread.title,
        thread.thread_type.as_str(),
        thread.author,
        thread.vote_count,
        thread.comment_count
    );
    let eligible = actions::eligible_actions(thread);
    if !eligible.is_empty() {
        let labels: Vec<_> = eligible.iter().map(|a| a.label).collect();
        println!("actions: {}", labels.join(", "));
    }
    println!();
}

fn print_comment(comment: &forum::Comment) {
    println!("{} [{} votes]", comment.author, comment.vote_count);
    println!("  {}", comment.rendered_body);
    let eligible = actions::eligible_actions(comment);
    if !eligible.is_empty() {
        let labels: Vec<_> = eligible.iter().map(|a| a.label).collect();
        println!("  actions: {}", labels.join(", "));
    }
}
