//! Image-reference extraction from streamed chat-completion chunks.
//!
//! The provider does not commit to one shape for streamed images, so each
//! chunk is scanned by a fixed list of strategies ([`ImageSource::PRIORITY`]).
//! Every hit replaces the previous capture, within a chunk and across chunks:
//! the last image seen in the body wins.

use crate::common::ImageRef;
use regex_lite::Regex;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use std::sync::LazyLock;

static DATA_URI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"data:image/[^;]+;base64,[A-Za-z0-9+/=]+"));
static IMAGE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r#"(?i)https?://[^\s<>"{}|\\^`\[\]]+\.(png|jpg|jpeg|gif|webp)"#)
});
static MARKDOWN_IMAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"!\[.*?\]\((https?://[^\s)]+)\)"));

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        // Panic is ok thanks to the `patterns_compile` test.
        Err(err) => panic!("invalid regex pattern `{pattern}`: {err}"),
    }
}

/// Finds an image reference in free text. Tried in order: an inline base64
/// data URI, a bare http(s) URL ending in a known image extension, then the
/// target of Markdown image syntax.
pub fn extract_image_from_content(content: &str) -> Option<ImageRef> {
    if content.is_empty() {
        return None;
    }
    if let Some(found) = DATA_URI_REGEX.find(content) {
        return Some(ImageRef::new(found.as_str()));
    }
    if let Some(found) = IMAGE_URL_REGEX.find(content) {
        return Some(ImageRef::new(found.as_str()));
    }
    MARKDOWN_IMAGE_REGEX
        .captures(content)
        .and_then(|captures| captures.get(1))
        .map(|url| ImageRef::new(url.as_str()))
}

/// One `data:` payload of the streaming body.
#[derive(Debug, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    message: Option<ChunkMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default, deserialize_with = "string_only")]
    content: Option<String>,
    #[serde(default)]
    images: Option<Vec<ChunkImage>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkMessage {
    #[serde(default, deserialize_with = "string_only")]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkImage {
    #[serde(default)]
    image_url: Option<ChunkImageUrl>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkImageUrl {
    #[serde(default)]
    url: Option<String>,
}

/// Some providers send `content` as an array of parts. Only plain strings
/// are scanned; anything else reads as absent so the rest of the chunk still
/// parses.
fn string_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(content) => Some(content),
        _ => None,
    })
}

impl ChatChunk {
    fn first_choice(&self) -> Option<&ChunkChoice> {
        self.choices.first()
    }

    /// `choices[0].delta.content`, when non-empty.
    pub fn delta_content(&self) -> Option<&str> {
        self.first_choice()?
            .delta
            .as_ref()?
            .content
            .as_deref()
            .filter(|content| !content.is_empty())
    }

    fn message_content(&self) -> Option<&str> {
        self.first_choice()?
            .message
            .as_ref()?
            .content
            .as_deref()
            .filter(|content| !content.is_empty())
    }

    fn first_delta_image_url(&self) -> Option<&str> {
        self.first_choice()?
            .delta
            .as_ref()?
            .images
            .as_ref()?
            .first()?
            .image_url
            .as_ref()?
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
    }
}

/// Where in a chunk an image reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// Text scan of `choices[0].message.content`.
    MessageContent,
    /// `choices[0].delta.images[0].image_url.url`, used verbatim.
    DeltaImages,
    /// Text scan of `choices[0].delta.content`.
    DeltaContent,
}

impl ImageSource {
    /// Evaluation order within one chunk. Later entries overwrite earlier hits.
    pub const PRIORITY: [ImageSource; 3] = [
        ImageSource::MessageContent,
        ImageSource::DeltaImages,
        ImageSource::DeltaContent,
    ];

    pub fn extract(self, chunk: &ChatChunk) -> Option<ImageRef> {
        match self {
            ImageSource::MessageContent => {
                chunk.message_content().and_then(extract_image_from_content)
            }
            ImageSource::DeltaImages => chunk.first_delta_image_url().map(ImageRef::new),
            ImageSource::DeltaContent => chunk.delta_content().and_then(extract_image_from_content),
        }
    }
}

/// Runs every strategy over `chunk` in priority order and returns each hit.
/// The last element is the capture that wins for this chunk.
pub fn scan_chunk(chunk: &ChatChunk) -> Vec<(ImageSource, ImageRef)> {
    ImageSource::PRIORITY
        .iter()
        .filter_map(|source| source.extract(chunk).map(|image| (*source, image)))
        .collect()
}
