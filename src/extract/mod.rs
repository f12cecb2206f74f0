pub mod locate;
pub mod normalize;

use serde_json::Value;
use tracing::debug;

use crate::{
    error::AdapterError,
    schema::{DynamicTypeDescriptor, Kind, validate},
};

pub use locate::{Opening, locate_json};
pub use normalize::normalize;

/// A parsed, normalized and validated structured reply.
pub type ExtractedPayload = Value;

/// Pulls the JSON payload out of a backend reply and checks it against `descriptor`.
///
/// # Errors
/// [`AdapterError::NoJsonFound`] when the text holds no balanced JSON value,
/// [`AdapterError::JsonDecode`] when the located span does not parse, and
/// [`AdapterError::SchemaValidation`] with every violation when the normalized
/// payload does not match.
pub fn extract(
    raw_text: &str,
    descriptor: &DynamicTypeDescriptor,
) -> Result<ExtractedPayload, AdapterError> {
    let opening = match descriptor.root.kind {
        Kind::Object(_) => Opening::Object,
        Kind::Array(_) => Opening::Array,
        _ => Opening::Either,
    };

    let span = locate_json(raw_text, opening).ok_or_else(|| AdapterError::NoJsonFound {
        raw_text: raw_text.to_string(),
    })?;

    let mut payload: Value =
        serde_json::from_str(span).map_err(|source| AdapterError::JsonDecode {
            span: span.to_string(),
            raw_text: raw_text.to_string(),
            source,
        })?;

    normalize(&mut payload, &descriptor.root);

    let violations = validate(&payload, &descriptor.root);
    if violations.is_empty() {
        debug!("Extracted payload for {}: {payload}", descriptor.name);
        Ok(payload)
    } else {
        Err(AdapterError::SchemaValidation {
            violations,
            payload,
        })
    }
}
