//! Gate between the generation collaborator's untrusted output and everything else.
//!
//! A node survives iff it is an object with a string `title` and a string `summary`.
//! Invalid inner nodes are dropped together with their subtrees; an invalid root
//! rejects the whole payload.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{MapNode, MAX_TITLE_CHARS, SOURCE_TEXT_MISSING};

/// Deepest nesting accepted below the root (root depth = 0).
///
/// Every tree level costs two JSON nesting levels (the node object and its
/// `children` array) and serde_json stops reading at 128. The deepest place a
/// tree is embedded is an `Archive` frame, five levels down, so an accepted
/// tree must stay at or below 61 levels to read back from the wire and the
/// archive blob.
pub const MAX_DEPTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("node is not an object")]
    NotARecord,
    #[error("node has no string `title`")]
    MissingTitle,
    #[error("node has no string `summary`")]
    MissingSummary,
    #[error("node nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
}

/// The generation workflow's hard failure: nothing usable came back.
#[derive(Debug, Error)]
pub enum MalformedPayload {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload root rejected: {0}")]
    Rejected(#[from] Rejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sanitized {
    Valid(MapNode),
    Invalid(Rejection),
}

impl Sanitized {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn into_result(self) -> Result<MapNode, Rejection> {
        match self {
            Self::Valid(node) => Ok(node),
            Self::Invalid(reason) => Err(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    /// Nodes that made it into the clean tree.
    pub kept: usize,
    /// Subtree roots that were thrown away (their descendants are not counted).
    pub discarded: usize,
}

pub fn sanitize(raw: &Value) -> Sanitized {
    sanitize_with_report(raw).0
}

pub fn sanitize_with_report(raw: &Value) -> (Sanitized, SanitizeReport) {
    let mut report = SanitizeReport::default();
    let out = match sanitize_node(raw, 0, "", &mut report) {
        Ok(node) => Sanitized::Valid(node),
        Err(reason) => Sanitized::Invalid(reason),
    };
    (out, report)
}

/// Sanitizes a payload and turns a root rejection into [`MalformedPayload`].
pub fn sanitize_payload(raw: &Value) -> Result<MapNode, MalformedPayload> {
    let (out, report) = sanitize_with_report(raw);
    match out {
        Sanitized::Valid(node) => {
            tracing::debug!(
                kept = report.kept,
                discarded = report.discarded,
                "payload sanitized"
            );
            Ok(node)
        }
        Sanitized::Invalid(reason) => {
            tracing::warn!(%reason, "rejecting malformed payload");
            Err(reason.into())
        }
    }
}

pub fn sanitize_str(text: &str) -> Result<MapNode, MalformedPayload> {
    let value: Value = serde_json::from_str(text)?;
    sanitize_payload(&value)
}

fn sanitize_node(
    value: &Value,
    depth: usize,
    path: &str,
    report: &mut SanitizeReport,
) -> Result<MapNode, Rejection> {
    if depth > MAX_DEPTH {
        return Err(Rejection::TooDeep { limit: MAX_DEPTH });
    }
    let Value::Object(obj) = value else {
        return Err(Rejection::NotARecord);
    };
    let Some(title) = obj.get("title").and_then(Value::as_str) else {
        return Err(Rejection::MissingTitle);
    };
    let Some(summary) = obj.get("summary").and_then(Value::as_str) else {
        return Err(Rejection::MissingSummary);
    };

    let source_text = obj
        .get("sourceText")
        .and_then(Value::as_str)
        .unwrap_or(SOURCE_TEXT_MISSING)
        .to_string();

    let children = sanitize_children(obj, depth, path, report);
    report.kept += 1;

    Ok(MapNode {
        title: clamp_title(title),
        summary: summary.to_string(),
        source_text,
        children,
    })
}

fn sanitize_children(
    obj: &Map<String, Value>,
    depth: usize,
    path: &str,
    report: &mut SanitizeReport,
) -> Vec<MapNode> {
    let items = match obj.get("children") {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            tracing::warn!(
                path = display_path(path),
                kind = value_kind(other),
                "ignoring non-array children"
            );
            return Vec::new();
        }
    };

    let mut kept = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let child_path = format!("{path}/children/{i}");
        match sanitize_node(item, depth + 1, &child_path, report) {
            Ok(child) => kept.push(child),
            Err(reason) => {
                report.discarded += 1;
                tracing::warn!(path = %child_path, %reason, "discarding malformed subtree");
            }
        }
    }
    kept
}

fn clamp_title(title: &str) -> String {
    match title.char_indices().nth(MAX_TITLE_CHARS) {
        Some((cut, _)) => title[..cut].to_string(),
        None => title.to_string(),
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
