//! Choice lists are stored in a text column holding a JSON array.
//!
//! Deserialization also accepts a native array or null, so rows written by
//! other tools still load.

use serde::{de, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(values: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let text = serde_json::to_string(values).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&text)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Text(String),
        List(Vec<String>),
    }

    match Option::<Stored>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(Stored::List(values)) => Ok(values),
        Some(Stored::Text(text)) if text.trim().is_empty() => Ok(Vec::new()),
        Some(Stored::Text(text)) => serde_json::from_str::<Option<Vec<String>>>(&text)
            .map(Option::unwrap_or_default)
            .map_err(de::Error::custom),
    }
}
