// ABOUTME: Server item paths ($/Project/...) with segment-wise ordering and recursion scopes
// Server items compare case-insensitively, segment by segment, the way the server sorts them

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

const ROOT: &str = "$/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerPathError {
    #[error("Not a server path: {0}")]
    NotServerPath(String),

    #[error("Invalid segment '{segment}' in server path: {path}")]
    InvalidSegment { path: String, segment: String },
}

/// Returns true when `raw` names a server item rather than a local path.
pub fn is_server_item(raw: &str) -> bool {
    raw == "$" || raw.starts_with("$/") || raw.starts_with("$\\")
}

/// A normalized, `$/`-rooted server item path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerPath(String);

impl ServerPath {
    pub fn root() -> Self {
        Self(ROOT.to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, ServerPathError> {
        let raw = raw.trim();
        if !is_server_item(raw) {
            return Err(ServerPathError::NotServerPath(raw.to_string()));
        }

        let mut normalized = String::from(ROOT);
        for segment in raw[1..].split(['/', '\\']).filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(ServerPathError::InvalidSegment {
                    path: raw.to_string(),
                    segment: segment.to_string(),
                });
            }
            if normalized.len() > ROOT.len() {
                normalized.push('/');
            }
            normalized.push_str(segment);
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[ROOT.len()..].split('/').filter(|s| !s.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    pub fn name(&self) -> Option<&str> {
        self.segments().last()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some(("$", _)) | None => Some(Self::root()),
            Some((parent, _)) => Some(Self(parent.to_string())),
        }
    }

    /// Appends relative `/`-separated segments.
    pub fn join(&self, relative: &str) -> Result<Self, ServerPathError> {
        Self::parse(&format!("{}/{}", self.0, relative))
    }

    /// Case-insensitive identity, the way the server matches items.
    pub fn same_item(&self, other: &Self) -> bool {
        self.depth() == other.depth()
            && self
                .segments()
                .zip(other.segments())
                .all(|(a, b)| segment_cmp(a, b) == Ordering::Equal)
    }

    /// True when `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        self.depth() > ancestor.depth()
            && ancestor
                .segments()
                .zip(self.segments())
                .all(|(a, b)| segment_cmp(a, b) == Ordering::Equal)
    }

    /// Segments of `self` below `ancestor`, joined with `/`.
    pub fn relative_to(&self, ancestor: &Self) -> Option<String> {
        if self.same_item(ancestor) {
            return Some(String::new());
        }
        if !self.is_descendant_of(ancestor) {
            return None;
        }
        Some(
            self.segments()
                .skip(ancestor.depth())
                .collect::<Vec<_>>()
                .join("/"),
        )
    }
}

fn segment_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

impl Ord for ServerPath {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.segments();
        let mut right = other.segments();
        loop {
            match (left.next(), right.next()) {
                (Some(a), Some(b)) => match segment_cmp(a, b) {
                    Ordering::Equal => continue,
                    unequal => return unequal,
                },
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                // Same item ignoring case; fall back to exact text so the order stays total
                (None, None) => return self.0.cmp(&other.0),
            }
        }
    }
}

impl PartialOrd for ServerPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ServerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ServerPath {
    type Error = ServerPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServerPath> for String {
    fn from(path: ServerPath) -> Self {
        path.0
    }
}

impl std::str::FromStr for ServerPath {
    type Err = ServerPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Scope of a path-based query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecursionType {
    /// The item itself only.
    #[default]
    None,
    /// The item and its immediate children.
    OneLevel,
    /// The item and its entire subtree.
    Full,
}

impl RecursionType {
    pub fn includes(self, root: &ServerPath, candidate: &ServerPath) -> bool {
        if candidate.same_item(root) {
            return true;
        }
        match self {
            Self::None => false,
            Self::OneLevel => candidate
                .parent()
                .is_some_and(|parent| parent.same_item(root)),
            Self::Full => candidate.is_descendant_of(root),
        }
    }
}
