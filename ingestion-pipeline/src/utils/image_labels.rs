use std::{path::Path, sync::Arc};

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrlArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
    Client,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{error::AppError, utils::config::AppConfig};
use serde_json::{json, Value};

const STAGE: &str = "detect labels";
const MAX_LABELS: usize = 10;

const LABEL_SYSTEM_MESSAGE: &str = "You label photographs and pictures for a file search index. \
Return at most 10 short, lowercase labels for the most prominent objects, scenes and concepts, \
each with a confidence score between 0 and 1, most confident first.";

fn label_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "labels": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "description": { "type": "string" },
                        "score": { "type": "number" }
                    },
                    "required": ["description", "score"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["labels"],
        "additionalProperties": false
    })
}

/// Labels images through an OpenAI compatible vision model.
#[derive(Clone)]
pub struct ImageLabeler {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
}

impl ImageLabeler {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Builds a labeler when labels are switched on and a key is present.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.labels_configured() {
            return None;
        }
        let api_key = config.openai_api_key.as_deref()?;
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(&config.openai_base_url),
        );
        Some(Self::new(Arc::new(client), &config.label_model))
    }

    pub async fn detect(&self, source: &Path) -> Result<Value, AppError> {
        let image_bytes = tokio::fs::read(source).await?;
        let mime = mime_guess::from_path(source).first_or_octet_stream();
        let image_url = format!("data:{mime};base64,{}", STANDARD.encode(&image_bytes));

        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: Some("Labels describing an image".into()),
                name: "image_labels".into(),
                schema: Some(label_schema()),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(LABEL_SYSTEM_MESSAGE).into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(vec![
                        ChatCompletionRequestMessageContentPartTextArgs::default()
                            .text("Label this image.")
                            .build()?
                            .into(),
                        ChatCompletionRequestMessageContentPartImageArgs::default()
                            .image_url(
                                ImageUrlArgs::default()
                                    .url(image_url)
                                    .detail(ImageDetail::Low)
                                    .build()?,
                            )
                            .build()?
                            .into(),
                    ])
                    .build()?
                    .into(),
            ])
            .response_format(response_format)
            .build()?;

        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or_else(|| {
                AppError::derivation(STAGE, source.display().to_string(), "empty model response")
            })?;

        parse_labels(content)
            .map_err(|err| AppError::derivation(STAGE, source.display().to_string(), err))
    }
}

/// Parses the model answer and caps the label list.
fn parse_labels(content: &str) -> Result<Value, String> {
    let mut value: Value =
        serde_json::from_str(content).map_err(|err| format!("invalid label JSON: {err}"))?;

    let labels = value
        .get_mut("labels")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| "label JSON has no `labels` array".to_string())?;
    labels.truncate(MAX_LABELS);

    Ok(value)
}
