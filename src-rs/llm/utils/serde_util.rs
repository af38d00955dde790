use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Tool-call arguments arrive as a JSON-encoded string from OpenAI, but some
/// OpenAI-compatible servers send the object itself. Both end up as a string.
pub fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wrapper {
        Str(String),
        Json(Value),
    }

    match Option::<Wrapper>::deserialize(deserializer)? {
        Some(Wrapper::Str(s)) => Ok(s),
        Some(Wrapper::Json(Value::Null)) | None => Ok(String::new()),
        Some(Wrapper::Json(v)) => Ok(v.to_string()),
    }
}

/// `null` becomes the empty string.
pub fn deserialize_null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
