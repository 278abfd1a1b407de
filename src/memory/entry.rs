//! Memory entry schema and normalization.

use serde::{Deserialize, Serialize};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 2000;
pub const MAX_CONTEXT_CHARS: usize = 500;
pub const MAX_KEYWORDS: usize = 10;
pub const MAX_TAGS: usize = 10;
pub const MIN_IMPORTANCE: u8 = 1;
pub const MAX_IMPORTANCE: u8 = 10;

const TRUNCATION_MARKER: &str = "[... truncated]";

/// Lines carrying these are kept first when content is truncated.
const PRIORITY_KEYWORDS: &[&str] = &[
    "decision", "decided", "error", "risk", "warning", "fail", "blocker", "critical", "must",
];

/// A note saved to or returned from the memory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub importance: u8,
    #[serde(default)]
    pub project_ids: Vec<String>,
}

impl MemoryEntry {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            context: String::new(),
            keywords: Vec::new(),
            tags: Vec::new(),
            importance: 5,
            project_ids: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set importance, clamped to 1-10.
    pub fn with_importance(mut self, importance: i64) -> Self {
        self.importance =
            importance.clamp(i64::from(MIN_IMPORTANCE), i64::from(MAX_IMPORTANCE)) as u8;
        self
    }

    pub fn with_project_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.project_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Enforce every schema limit.
    pub fn normalized(mut self) -> Self {
        self.title = truncate_chars(self.title.trim(), MAX_TITLE_CHARS);
        self.content = truncate_content(self.content.trim(), MAX_CONTENT_CHARS);
        self.context = truncate_chars(self.context.trim(), MAX_CONTEXT_CHARS);
        self.keywords = dedup_limited(self.keywords, MAX_KEYWORDS);
        self.tags = dedup_limited(self.tags, MAX_TAGS);
        self.importance = self.importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE);
        self.project_ids = dedup_limited(self.project_ids, usize::MAX);
        self
    }

    /// Key used for duplicate detection: content, trimmed and lowercased.
    pub fn fingerprint(&self) -> String {
        self.content.trim().to_lowercase()
    }
}

/// Cut to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Shorten content to `max` characters, keeping important lines.
///
/// Headings and lines with decision, error or risk vocabulary are kept
/// first; remaining lines fill what space is left, in order. Kept lines
/// appear in their original order, followed by a truncation marker.
pub fn truncate_content(content: &str, max: usize) -> String {
    if content.chars().count() <= max {
        return content.to_string();
    }

    // Room for the marker and its separating newline
    let budget = max.saturating_sub(TRUNCATION_MARKER.chars().count() + 1);
    let lines: Vec<&str> = content.lines().collect();
    let mut keep = vec![false; lines.len()];
    let mut used = 0;

    let mut take = |i: usize, keep: &mut Vec<bool>| {
        let cost = lines[i].chars().count() + 1;
        if used + cost <= budget {
            used += cost;
            keep[i] = true;
        }
    };

    for i in (0..lines.len()).filter(|&i| is_priority_line(lines[i])) {
        take(i, &mut keep);
    }
    for i in (0..lines.len()).filter(|&i| !is_priority_line(lines[i])) {
        take(i, &mut keep);
    }

    let mut out: Vec<String> = lines
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(l, _)| (*l).to_string())
        .collect();

    // A single oversized line would otherwise leave nothing
    if out.is_empty() {
        let first = lines
            .iter()
            .copied()
            .find(|l| is_priority_line(l))
            .or_else(|| lines.first().copied())
            .unwrap_or("");
        out.push(truncate_chars(first, budget));
    }

    out.push(TRUNCATION_MARKER.to_string());
    out.join("\n")
}

fn is_priority_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return true;
    }
    let lower = trimmed.to_lowercase();
    PRIORITY_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn dedup_limited(values: Vec<String>, max: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        if value.is_empty() || out.iter().any(|v| v.eq_ignore_ascii_case(value)) {
            continue;
        }
        if out.len() == max {
            break;
        }
        out.push(value.to_string());
    }
    out
}
