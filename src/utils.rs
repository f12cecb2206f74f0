#[macro_export]
macro_rules! lazy_regex {
    ($s:expr) => {
        std::sync::LazyLock::new(|| {
            regex::Regex::new($s).expect("Static regex pattern must be valid")
        })
    };
}

#[must_use]
pub fn generate_call_id() -> String {
    format!("call_{}", rand::random::<u32>())
}

/// Per-request token used to keep attachment file names apart.
#[must_use]
pub fn unique_token() -> String {
    format!("{:016x}", rand::random::<u64>())
}

pub mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    /// # Errors
    /// Propagates the serializer's error.
    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    /// # Errors
    /// Fails when the input is not a base64 string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(D::Error::custom)
    }
}
