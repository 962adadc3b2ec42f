use serde::Deserialize;
use serde_json::Value;

/// One page of the upstream comment listing.
///
/// `next_cursor == 0` means the upstream has nothing further for this content id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    pub items: Vec<RawComment>,
    pub next_cursor: u64,
}

impl RawPage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_cursor == 0
    }
}

/// Comment as delivered by the upstream, before filtering.
///
/// Every field is optional; items that do not even fit this shape are skipped
/// during page parsing rather than failing the whole page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawComment {
    pub idstr: Option<String>,
    pub id: Option<Value>,
    pub created_at: Option<String>,
    pub like_counts: Option<Value>,
    pub source: Option<String>,
    pub text: Option<String>,
    pub reply_comment: Option<Value>,
    pub user: Option<RawUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawUser {
    pub screen_name: Option<String>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub profile_image_url: Option<String>,
}

impl RawComment {
    /// Prefers the string id; falls back to the numeric one.
    pub fn comment_id(&self) -> Option<String> {
        if let Some(id) = self.idstr.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(id.to_string());
        }
        match self.id.as_ref()? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// A nested reply carries a non-empty `reply_comment` payload.
    pub fn is_reply(&self) -> bool {
        match &self.reply_comment {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::Bool(true)) => true,
        }
    }

    pub fn like_count(&self) -> u64 {
        self.like_counts.as_ref().map(non_negative).unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    max_id: Value,
}

/// Parses a response body into a page.
///
/// Fails only when the body is not a JSON object with an array `data` field
/// (or no `data` at all). Individual items that do not match the comment shape
/// are dropped.
pub fn parse_page(body: &[u8]) -> Result<RawPage, serde_json::Error> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    let items = envelope
        .data
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawComment>(item).ok())
        .collect();
    Ok(RawPage {
        items,
        next_cursor: non_negative(&envelope.max_id),
    })
}

fn non_negative(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v > 0.0).map(|v| v as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}
