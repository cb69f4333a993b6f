//! Pluggable value ↔ string codec.
//!
//! The engine stores exactly one string per key, so serialization is a
//! two-operation seam: parse a stored string, render a value. The default is
//! JSON via `serde_json`; callers swap in versioned or binary-safe codecs
//! without touching the rest of the engine.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// Converts between the logical value and its stored string form.
pub trait Serializer<T> {
    /// Parse a raw stored string into a value.
    ///
    /// The string may come from a previous run, a foreign tab, or a foreign
    /// writer entirely; implementations must treat it as untrusted input and
    /// fail with an error rather than panic.
    fn parse(&self, raw: &str) -> Result<T, CodecError>;

    /// Render a value into its stored string form.
    ///
    /// Expected to succeed for any value the caller actually stores. A
    /// failure is reported through the write-error hook and the optimistic
    /// in-memory update stands; it is never propagated to the caller.
    fn stringify(&self, value: &T) -> Result<String, CodecError>;
}

/// Default serializer: JSON text via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Serializer<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn parse(&self, raw: &str) -> Result<T, CodecError> {
        serde_json::from_str(raw).map_err(CodecError::from)
    }

    fn stringify(&self, value: &T) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(CodecError::from)
    }
}
