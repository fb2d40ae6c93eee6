use http::Method;
use std::fmt;
use std::sync::Arc;

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The exact (method, pattern) pair is already bound.
    DuplicateRoute { method: Method, pattern: String },
    /// The pattern could not be parsed.
    InvalidPattern { pattern: String, reason: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::DuplicateRoute { method, pattern } => {
                write!(f, "duplicate route: {method} {pattern}")
            }
            RouteError::InvalidPattern { pattern, reason } => {
                write!(f, "invalid pattern {pattern:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for RouteError {}

/// One segment of a parsed [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Must equal the path segment exactly.
    Literal(String),
    /// `{name}`: binds exactly one path segment.
    Capture(Arc<str>),
    /// `{name...}`: binds every remaining segment joined by `/`. Final segment only.
    CatchAll(Arc<str>),
}

impl Segment {
    fn is_same_shape(&self, other: &Segment) -> bool {
        match (self, other) {
            (Segment::Literal(a), Segment::Literal(b)) => a == b,
            (Segment::Capture(_), Segment::Capture(_)) => true,
            (Segment::CatchAll(_), Segment::CatchAll(_)) => true,
            _ => false,
        }
    }
}

/// A parsed path template such as `/users/{id}/files/{path...}`.
///
/// Paths are split on `/` after the leading slash, so `/` is a single empty
/// segment and a trailing slash adds an empty literal: `/users/` and `/users`
/// are different patterns.
///
/// Two patterns are equal when their segment sequences have the same shape;
/// capture names do not take part, since `/u/{id}` and `/u/{uid}` match the
/// same requests.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| invalid("pattern must begin with '/'"))?;

        let parts: Vec<&str> = rest.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<&str> = Vec::new();

        for (i, part) in parts.iter().enumerate() {
            let is_last = i + 1 == parts.len();
            if !part.contains(['{', '}']) {
                segments.push(Segment::Literal((*part).to_string()));
                continue;
            }
            let inner = part
                .strip_prefix('{')
                .and_then(|p| p.strip_suffix('}'))
                .ok_or_else(|| invalid("wildcard must span a whole segment"))?;
            if inner.contains(['{', '}']) {
                return Err(invalid("unbalanced braces"));
            }
            let (name, catch_all) = match inner.strip_suffix("...") {
                Some(name) => (name, true),
                None => (inner, false),
            };
            if name.is_empty() {
                return Err(invalid("empty wildcard name"));
            }
            if names.contains(&name) {
                return Err(invalid(&format!("duplicate wildcard name {name:?}")));
            }
            names.push(name);
            if catch_all {
                if !is_last {
                    return Err(invalid("catch-all wildcard must be the final segment"));
                }
                segments.push(Segment::CatchAll(Arc::from(name)));
            } else {
                segments.push(Segment::Capture(Arc::from(name)));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Capture names in path order.
    pub fn param_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture(n) | Segment::CatchAll(n) => Some(n),
            Segment::Literal(_) => None,
        })
    }

    /// Number of leading literal segments.
    #[must_use]
    pub fn literal_prefix_len(&self) -> usize {
        self.segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.is_same_shape(b))
    }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split a request path the same way patterns are split.
pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(raw: &str) -> String {
        match Pattern::parse(raw) {
            Err(RouteError::InvalidPattern { reason, .. }) => reason,
            other => panic!("expected invalid pattern, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_segments() {
        let p = Pattern::parse("/users/{id}/files/{path...}").unwrap();
        assert_eq!(
            p.segments(),
            &[
                Segment::Literal("users".into()),
                Segment::Capture(Arc::from("id")),
                Segment::Literal("files".into()),
                Segment::CatchAll(Arc::from("path")),
            ]
        );
        let names: Vec<&str> = p.param_names().map(|n| n.as_ref()).collect();
        assert_eq!(names, ["id", "path"]);
        assert_eq!(p.literal_prefix_len(), 1);
    }

    #[test]
    fn test_root_and_trailing_slash() {
        let root = Pattern::parse("/").unwrap();
        assert_eq!(root.segments(), &[Segment::Literal(String::new())]);
        let a = Pattern::parse("/path").unwrap();
        let b = Pattern::parse("/path/").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_equality_ignores_capture_names() {
        assert_eq!(
            Pattern::parse("/u/{id}").unwrap(),
            Pattern::parse("/u/{uid}").unwrap()
        );
        assert_ne!(
            Pattern::parse("/u/{id}").unwrap(),
            Pattern::parse("/u/{id...}").unwrap()
        );
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(reason("users").contains("begin with '/'"));
        assert!(reason("/a/{}").contains("empty"));
        assert!(reason("/a/{...}").contains("empty"));
        assert!(reason("/a/{id}/{id}").contains("duplicate"));
        assert!(reason("/a/{rest...}/b").contains("final segment"));
        assert!(reason("/a/{id").contains("whole segment"));
        assert!(reason("/a/x{id}").contains("whole segment"));
        assert!(reason("/a/{{id}}").contains("unbalanced"));
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/").collect::<Vec<_>>(), [""]);
        assert_eq!(split_path("/a/b/").collect::<Vec<_>>(), ["a", "b", ""]);
    }
}
