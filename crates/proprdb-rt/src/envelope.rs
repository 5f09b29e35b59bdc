//! Typed-Any JSON envelope codec.
//!
//! Interchange payloads travel as a JSON object carrying an `@type` URL
//! whose final path segment is the fully-qualified message name, followed by
//! the payload fields. The binary column (`data`) stores the canonical
//! protobuf encoding; the envelope is only used on the JSONL wire.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ProprError, Result};

pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// A message payload the runtime can persist and ship.
///
/// Generated code implements this for every materialized message. The serde
/// bounds come from running the protobuf code generator with serde derives
/// enabled on the payload types.
pub trait Payload: prost::Message + Serialize + DeserializeOwned + Default {
    /// Fully-qualified protobuf type name, e.g. `generatedtest.example.Person`.
    const TYPE_NAME: &'static str;
}

/// User-supplied write validation hook.
///
/// Messages generated with `validate_write` call this before every local
/// insert or update. Imported interchange records bypass it: the wire is
/// authoritative even when the payload is locally invalid.
pub trait ValidateWrite {
    fn valid(&self) -> std::result::Result<(), String>;
}

pub fn type_url(type_name: &str) -> String {
    format!("{TYPE_URL_PREFIX}{type_name}")
}

/// The final path segment of a type URL. URLs without a slash are returned
/// unchanged; a trailing slash yields the whole input back.
pub fn type_name_from_url(type_url: &str) -> &str {
    match type_url.rfind('/') {
        Some(last_slash) if last_slash + 1 < type_url.len() => &type_url[last_slash + 1..],
        _ => type_url,
    }
}

/// Wrap a payload into its typed JSON envelope.
pub fn marshal_any_json<T: Payload>(payload: &T) -> Result<Value> {
    let mut value = serde_json::to_value(payload)
        .map_err(|e| ProprError::decode(T::TYPE_NAME, &e))?;
    let object = value.as_object_mut().ok_or_else(|| {
        ProprError::decode(T::TYPE_NAME, "payload does not serialize to a JSON object")
    })?;
    object.insert("@type".to_string(), Value::String(type_url(T::TYPE_NAME)));
    Ok(value)
}

/// A type-only envelope, as used by deletion records.
pub fn type_only_any_json(type_name: &str) -> Value {
    serde_json::json!({ "@type": type_url(type_name) })
}

/// Extract the fully-qualified type name from an envelope.
pub fn type_name_from_any_json(data: &Value) -> Result<String> {
    let type_url = data
        .get("@type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let type_name = type_name_from_url(type_url);
    if type_name.is_empty() {
        return Err(ProprError::MissingType);
    }
    Ok(type_name.to_string())
}

/// Decode a payload out of its envelope. Unknown fields in the envelope are
/// tolerated; only `@type` is stripped before decoding.
pub fn unmarshal_any_json<T: Payload>(data: &Value) -> Result<T> {
    let mut value = data.clone();
    if let Some(object) = value.as_object_mut() {
        object.remove("@type");
    }
    serde_json::from_value(value).map_err(|e| ProprError::decode(T::TYPE_NAME, &e))
}
