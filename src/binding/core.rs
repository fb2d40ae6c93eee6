use serde::de::DeserializeOwned;
use serde_json::error::Category;
use std::fmt;
use std::io::{BufReader, Read};
use tracing::debug;

use super::limit::LimitedReader;

/// Default request body cap: 1 MiB.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 1_048_576;

/// Why a JSON body could not be decoded.
///
/// Exactly one cause per failure. The [`Display`](fmt::Display) output is a
/// stable, user-facing message that callers may match on by prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Body was empty or whitespace only.
    EmptyBody,
    /// The parser hit a syntax error.
    MalformedSyntax,
    /// The body ended in the middle of a value.
    UnexpectedTruncation,
    /// The body is larger than `limit` bytes.
    BodyTooLarge { limit: u64 },
    /// The body names a field the target type does not have.
    UnknownField { name: String },
    /// A required field is absent.
    MissingField { name: String },
    /// A value has the wrong JSON type. `field` is the dotted path when known,
    /// otherwise `offset` locates the offending value.
    TypeMismatch { field: Option<String>, offset: usize },
    /// More than one top-level JSON value.
    MultipleValues,
    /// Reading the body failed for a reason other than the size limit.
    Io { message: String },
    /// The decoder was used incorrectly by application code, not by the client.
    ProgrammerMisuse { reason: &'static str },
}

impl DecodeError {
    /// `true` for causes attributable to the remote caller.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(self, DecodeError::ProgrammerMisuse { .. })
    }

    /// HTTP status a handler would typically answer with.
    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        if self.is_client_error() {
            http::StatusCode::BAD_REQUEST
        } else {
            http::StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::EmptyBody => f.write_str("body must be valid JSON"),
            DecodeError::MalformedSyntax | DecodeError::UnexpectedTruncation => {
                f.write_str("body contains badly-formed JSON")
            }
            DecodeError::BodyTooLarge { limit } => {
                write!(f, "body must not exceed {limit} bytes")
            }
            DecodeError::UnknownField { name } => {
                write!(f, "body contains unknown field {name:?}")
            }
            DecodeError::MissingField { name } => write!(f, "body is missing field {name:?}"),
            DecodeError::TypeMismatch {
                field: Some(field), ..
            } => write!(f, "body contains incorrect type for field {field:?}"),
            DecodeError::TypeMismatch {
                field: None,
                offset,
            } => write!(f, "body contains incorrect type at position {offset}"),
            DecodeError::MultipleValues => f.write_str("body must only contain a single JSON value"),
            DecodeError::Io { message } => write!(f, "body could not be read: {message}"),
            DecodeError::ProgrammerMisuse { reason } => write!(f, "invalid decode: {reason}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode exactly one JSON document of type `T` from `body`, reading at most `limit` bytes.
///
/// Any object key the target would ignore is rejected as
/// [`DecodeError::UnknownField`], whether or not `T` declares
/// `#[serde(deny_unknown_fields)]`. Targets that accept arbitrary keys
/// (`serde_json::Value`, maps) never ignore anything.
pub fn decode_json<T, R>(body: R, limit: u64) -> Result<T, DecodeError>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut limited = LimitedReader::new(body, limit);
    let mut unknown: Option<String> = None;
    let mut record_unknown = |path: serde_ignored::Path<'_>| {
        if unknown.is_none() {
            unknown = Some(path.to_string());
        }
    };

    let outcome = {
        let mut de = serde_json::Deserializer::from_reader(BufReader::new(&mut limited));
        let strict = serde_ignored::Deserializer::new(&mut de, &mut record_unknown);
        match serde_path_to_error::deserialize::<_, T>(strict) {
            Ok(value) => Ok((value, de.end())),
            Err(err) => Err(err),
        }
    };

    match outcome {
        Ok((value, trailing)) => {
            if let Some(name) = unknown {
                debug!(field = %name, "json body names an unknown field");
                return Err(DecodeError::UnknownField { name });
            }
            match trailing {
                Ok(()) => Ok(value),
                Err(_) if limited.exceeded() => Err(DecodeError::BodyTooLarge { limit }),
                Err(_) => Err(DecodeError::MultipleValues),
            }
        }
        Err(err) => {
            let cause = match unknown {
                // A key skipped earlier in the stream outranks a later data error.
                Some(name) if !limited.exceeded() && err.inner().classify() == Category::Data => {
                    DecodeError::UnknownField { name }
                }
                _ => classify(&err, &limited),
            };
            debug!(error = %err, cause = %cause, "json body rejected");
            Err(cause)
        }
    }
}

fn classify<R: Read>(
    err: &serde_path_to_error::Error<serde_json::Error>,
    limited: &LimitedReader<R>,
) -> DecodeError {
    let inner = err.inner();
    match inner.classify() {
        _ if limited.exceeded() => DecodeError::BodyTooLarge {
            limit: limited.limit(),
        },
        Category::Eof if !limited.saw_content() => DecodeError::EmptyBody,
        Category::Eof => DecodeError::UnexpectedTruncation,
        Category::Io => DecodeError::Io {
            message: inner.to_string(),
        },
        Category::Syntax => DecodeError::MalformedSyntax,
        Category::Data => {
            let message = inner.to_string();
            if let Some(name) = backticked(&message, "unknown field `") {
                return DecodeError::UnknownField { name };
            }
            if let Some(name) = backticked(&message, "missing field `") {
                return DecodeError::MissingField { name };
            }
            let field = field_path(err.path());
            DecodeError::TypeMismatch {
                offset: usize::try_from(limited.offset_at(inner.line(), inner.column()))
                    .unwrap_or(usize::MAX),
                field,
            }
        }
    }
}

/// Extract the name quoted in backticks right after `prefix`.
fn backticked(message: &str, prefix: &str) -> Option<String> {
    let rest = message.strip_prefix(prefix)?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

/// Dotted object-key path to the failing value, `None` when no object key is involved.
fn field_path(path: &serde_path_to_error::Path) -> Option<String> {
    use serde_path_to_error::Segment;

    let keys: Vec<&str> = path
        .iter()
        .filter_map(|segment| match segment {
            Segment::Map { key } => Some(key.as_str()),
            _ => None,
        })
        .collect();
    if keys.is_empty() {
        None
    } else {
        Some(keys.join("."))
    }
}
