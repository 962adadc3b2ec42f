use chrono::DateTime;
use scraper::Html;

use crate::{Comment, ContentId, Gender, RawComment};

/// Label the upstream puts in front of the region ("来自北京").
pub const SOURCE_PREFIX: &str = "来自";

const UPSTREAM_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";
const OUTPUT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub trait CommentFilter: Send + Sync {
    fn filter(&self, items: Vec<RawComment>, content_id: &ContentId) -> Vec<Comment>;
}

/// Keeps top-level comments that still have text once markup is removed:
/// - nested replies are dropped
/// - items without an identifier are dropped
/// - items whose cleaned text is empty are dropped
///
/// Order of the surviving items is preserved.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopLevelFilter;

impl CommentFilter for TopLevelFilter {
    fn filter(&self, items: Vec<RawComment>, content_id: &ContentId) -> Vec<Comment> {
        items
            .into_iter()
            .filter(|item| !item.is_reply())
            .filter_map(|item| normalize(item, content_id))
            .collect()
    }
}

fn normalize(item: RawComment, content_id: &ContentId) -> Option<Comment> {
    let content = clean_html(item.text.as_deref().unwrap_or_default());
    if content.is_empty() {
        return None;
    }
    let comment_id = item.comment_id()?;
    let like_count = item.like_count();
    let user = item.user.unwrap_or_default();

    Some(Comment {
        content_id: content_id.clone(),
        comment_id,
        created_at: normalize_timestamp(item.created_at.as_deref().unwrap_or_default()),
        like_count,
        region: strip_source_prefix(item.source.as_deref().unwrap_or_default()),
        content,
        author_name: user.screen_name.unwrap_or_default(),
        author_gender: Gender::from_code(user.gender.as_deref().unwrap_or_default()),
        author_location: user.location.unwrap_or_default(),
        author_avatar_url: user.profile_image_url.unwrap_or_default(),
    })
}

/// Plain text of an HTML fragment, whitespace collapsed to single spaces.
pub fn clean_html(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(raw);
    let mut out = String::with_capacity(raw.len());
    for chunk in fragment.root_element().text() {
        for word in chunk.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
    }
    out
}

/// `Tue Oct 07 21:15:03 +0800 2025` becomes `2025-10-07 21:15:03`; anything
/// else is passed through untouched.
pub fn normalize_timestamp(raw: &str) -> String {
    DateTime::parse_from_str(raw.trim(), UPSTREAM_TIME_FORMAT)
        .map(|ts| ts.format(OUTPUT_TIME_FORMAT).to_string())
        .unwrap_or_else(|_| raw.to_string())
}

pub fn strip_source_prefix(source: &str) -> String {
    let trimmed = source.trim();
    trimmed
        .strip_prefix(SOURCE_PREFIX)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
