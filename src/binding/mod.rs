//! # Binding Module
//!
//! Strict JSON request body decoding.
//!
//! [`decode_json`] reads a size-bounded body and deserializes exactly one JSON
//! document into the caller's type. Every failure is classified into a
//! [`DecodeError`] whose message is stable enough for clients to rely on:
//!
//! | Cause | Message |
//! |---|---|
//! | empty body | `body must be valid JSON` |
//! | syntax error / truncated | `body contains badly-formed JSON` |
//! | too large | `body must not exceed <N> bytes` |
//! | unknown field | `body contains unknown field "<name>"` |
//! | wrong type | `body contains incorrect type for field "<name>"` or `... at position <offset>` |
//! | trailing value | `body must only contain a single JSON value` |
//!
//! Handlers normally reach this through [`crate::Context::decode_json`] or
//! [`crate::Context::bind`], which apply the dispatcher's configured limit.

mod core;
mod limit;

pub use core::{decode_json, DecodeError, DEFAULT_MAX_BODY_BYTES};
pub use limit::{BodyLimitExceeded, LimitedReader};
