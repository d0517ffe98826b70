use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

const FILENAME_PROMPT_CHARS: usize = 30;

/// Unique token identifying a [`GeneratedImageRecord`].
///
/// New ids are UUIDs. Records persisted by older builds used numeric ids;
/// those load as their decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Number(number) => Self(number.to_string()),
        })
    }
}

/// Metadata and payload of one generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImageRecord {
    pub id: RecordId,
    /// Base64 data URI of the image. Remote results are downloaded and
    /// inlined before a record is created.
    pub url: String,
    pub prompt: String,
    pub timestamp: DateTime<Utc>,
    /// PNG data URI of the canvas sent with the request.
    pub original_canvas_state: String,
}

impl GeneratedImageRecord {
    pub fn new(url: String, prompt: &str, original_canvas_state: String) -> Self {
        Self {
            id: RecordId::new(),
            url,
            prompt: prompt.trim().to_string(),
            timestamp: Utc::now(),
            original_canvas_state,
        }
    }

    /// File name offered when the image is saved locally.
    pub fn download_filename(&self, now: DateTime<Utc>) -> String {
        download_filename(&self.prompt, now)
    }
}

/// `ai-generated-<first 30 prompt chars, non-alphanumerics as '-'>-<unix ms>.png`
pub fn download_filename(prompt: &str, now: DateTime<Utc>) -> String {
    let slug: String = prompt
        .chars()
        .take(FILENAME_PROMPT_CHARS)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("ai-generated-{slug}-{}.png", now.timestamp_millis())
}
