use crate::error::ApiError;
use serde::Serialize;

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-image-preview";

pub const DEFAULT_INSTRUCTIONS: &str = "You are an AI assistant specialized in generating high-quality images based on user prompts and canvas context.

Guidelines for image generation:
- Analyze the provided canvas image to understand the current composition, style, and context
- Generate images that complement or enhance the existing canvas content when relevant
- Maintain artistic coherence with the canvas style (realistic, cartoon, abstract, etc.)
- Create high-quality, detailed images that would fit well in a digital art/painting application
- If the canvas is mostly empty, focus entirely on the user's prompt
- If the canvas has existing content, consider how your generated image could integrate or build upon it
- Aim for images that are suitable for creative and artistic purposes
- Generate images that are appropriate for all audiences
- Focus on creativity, artistic value, and visual appeal

Always respond with a single, high-quality image that best fulfills the user's creative vision.";

/// Body of a streaming chat-completions call that asks for image output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub modalities: Vec<Modality>,
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Image,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Assembles an [`ImageGenerationRequest`]: the system instructions, then one
/// user turn carrying the prompt text and the canvas snapshot.
pub struct ImageRequestBuilder<'a> {
    model: &'a str,
    instructions: &'a str,
    prompt: &'a str,
    canvas_data_uri: &'a str,
}

impl<'a> ImageRequestBuilder<'a> {
    pub fn new(
        model: &'a str,
        instructions: &'a str,
        prompt: &'a str,
        canvas_data_uri: &'a str,
    ) -> Self {
        Self {
            model,
            instructions,
            prompt,
            canvas_data_uri,
        }
    }

    pub fn build(self) -> Result<ImageGenerationRequest, ApiError> {
        if self.prompt.trim().is_empty() {
            return Err(ApiError::InvalidRequest("Prompt is required".to_string()));
        }
        if self.canvas_data_uri.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Canvas image is required".to_string(),
            ));
        }

        let mut messages = Vec::with_capacity(2);
        if !self.instructions.is_empty() {
            messages.push(ChatMessage {
                role: Role::System,
                content: MessageContent::Text(self.instructions.to_string()),
            });
        }
        messages.push(ChatMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: self.prompt.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: self.canvas_data_uri.to_string(),
                    },
                },
            ]),
        });

        Ok(ImageGenerationRequest {
            model: self.model.to_string(),
            messages,
            modalities: vec![Modality::Image, Modality::Text],
            stream: true,
        })
    }
}
