//! `llm_analyze_image`: image understanding on the Gemini vision model.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::llm::{
    GEMINI_VISION_MODEL, GenerationRequest, ImageRequest, TextGenerator, VisionModel,
};
use crate::tool::{
    ArgValue, ParamType, Tool, ToolArgs, ToolCategory, ToolError, ToolOutput, ToolParameter,
    ToolResult, ToolSpec,
};

pub const LLM_ANALYZE_IMAGE: &str = "llm_analyze_image";

const DEFAULT_MIME: &str = "image/jpeg";
const ALLOWED_MIME: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];
const TEMPERATURE: f64 = 0.4;

/// Image analysis. Without image data the prompt is answered as plain text
/// by the same model.
pub struct ImageAnalysisTool {
    spec: ToolSpec,
    vision: Option<Arc<dyn VisionModel>>,
    text: Option<Arc<dyn TextGenerator>>,
}

impl ImageAnalysisTool {
    pub fn new(
        vision: Option<Arc<dyn VisionModel>>,
        text: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        let spec = ToolSpec::new(
            LLM_ANALYZE_IMAGE,
            "Analyze or understand an image. Use ONLY when the user explicitly provides an \
             image to analyze. Supports image description, OCR, visual question answering, \
             and diagram understanding.",
            ToolCategory::Vision,
        )
        .param(ToolParameter::required(
            "prompt",
            ParamType::String,
            "What to analyze about the image (e.g., 'Describe this image', 'What text is in this image?')",
        ))
        .param(ToolParameter::optional(
            "image_data",
            ParamType::String,
            "Base64-encoded image data",
        ))
        .param(
            ToolParameter::optional("mime_type", ParamType::String, "Image MIME type")
                .with_default(DEFAULT_MIME)
                .with_enum(ALLOWED_MIME),
        );

        Self { spec, vision, text }
    }
}

/// Image bytes from the `image_data` argument: raw bytes, or base64 text
/// with an optional `data:...;base64,` prefix. Empty input counts as absent.
fn decode_image(value: Option<&ArgValue>) -> Result<Option<Vec<u8>>, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArgument {
        name: "image_data".into(),
        reason,
    };

    match value {
        None => Ok(None),
        Some(ArgValue::Bytes(b)) if b.is_empty() => Ok(None),
        Some(ArgValue::Bytes(b)) => Ok(Some(b.clone())),
        Some(ArgValue::Text(t)) => {
            let t = t.trim();
            let payload = match t.split_once(";base64,") {
                Some((head, data)) if head.starts_with("data:") => data,
                _ => t,
            };
            if payload.is_empty() {
                return Ok(None);
            }
            BASE64
                .decode(payload)
                .map(Some)
                .map_err(|e| invalid(format!("not valid base64: {e}")))
        }
        Some(_) => Err(invalid("expected base64 text".into())),
    }
}

#[async_trait]
impl Tool for ImageAnalysisTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let prompt = args.require_text("prompt")?;
        let mime_type = args.text("mime_type").unwrap_or(DEFAULT_MIME).trim();
        if !ALLOWED_MIME.contains(&mime_type) {
            return Err(ToolError::InvalidArgument {
                name: "mime_type".into(),
                reason: format!("unsupported image type `{mime_type}`"),
            });
        }
        let image = decode_image(args.get("image_data"))?;
        let had_image = image.is_some();

        let outcome = match image {
            Some(image) => {
                let vision = self.vision.as_ref().ok_or_else(|| ToolError::NotConfigured {
                    what: "gemini vision".into(),
                })?;
                vision
                    .understand_image(&ImageRequest {
                        prompt: prompt.to_owned(),
                        image,
                        mime_type: mime_type.to_owned(),
                        model: GEMINI_VISION_MODEL.into(),
                        temperature: TEMPERATURE,
                    })
                    .await
            }
            None => {
                let text = self.text.as_ref().ok_or_else(|| ToolError::NotConfigured {
                    what: "gemini".into(),
                })?;
                text.generate(&GenerationRequest::new(prompt, GEMINI_VISION_MODEL, TEMPERATURE))
                    .await
            }
        };

        let result = match outcome {
            Ok(generation) => ToolResult::ok(generation.text)
                .with_tokens(generation.tokens_used)
                .with_meta("model", generation.model)
                .with_meta("provider", "gemini")
                .with_meta("had_image", had_image),
            Err(e) => ToolResult::failure(format!("Image analysis failed: {e}")),
        };
        Ok(result.into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::Result;
    use crate::llm::{Generation, Provider};

    #[derive(Default)]
    struct FakeGemini {
        vision_calls: AtomicU32,
        text_calls: AtomicU32,
    }

    #[async_trait]
    impl VisionModel for FakeGemini {
        async fn understand_image(&self, request: &ImageRequest) -> Result<Generation> {
            self.vision_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Generation {
                text: format!("{} bytes of {}", request.image.len(), request.mime_type),
                tokens_used: 50,
                latency_ms: 1,
                model: request.model.clone(),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGemini {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Generation {
                text: "no image given".into(),
                tokens_used: 5,
                latency_ms: 1,
                model: request.model.clone(),
            })
        }
    }

    fn tool(fake: &Arc<FakeGemini>) -> ImageAnalysisTool {
        ImageAnalysisTool::new(
            Some(fake.clone() as Arc<dyn VisionModel>),
            Some(fake.clone() as Arc<dyn TextGenerator>),
        )
    }

    #[tokio::test]
    async fn decodes_base64_and_calls_vision() {
        let fake = Arc::new(FakeGemini::default());
        let args = ToolArgs::new()
            .with("prompt", "Describe this image")
            .with("image_data", BASE64.encode([1u8, 2, 3, 4]))
            .with("mime_type", "image/png");
        let result = tool(&fake).execute(&args).await.unwrap().into_result();

        assert!(result.success);
        assert_eq!(result.output_text(), "4 bytes of image/png");
        assert_eq!(result.model(), Some("gemini-3-flash-preview"));
        assert_eq!(result.metadata["had_image"], true);
        assert_eq!(fake.vision_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn data_url_prefix_is_accepted() {
        let fake = Arc::new(FakeGemini::default());
        let data = format!("data:image/jpeg;base64,{}", BASE64.encode([9u8; 10]));
        let args = ToolArgs::new().with("prompt", "What is this?").with("image_data", data);
        let result = tool(&fake).execute(&args).await.unwrap().into_result();
        assert_eq!(result.output_text(), "10 bytes of image/jpeg");
    }

    #[tokio::test]
    async fn without_image_falls_back_to_text() {
        let fake = Arc::new(FakeGemini::default());
        let args = ToolArgs::new().with("prompt", "What is in a typical photo?");
        let result = tool(&fake).execute(&args).await.unwrap().into_result();

        assert_eq!(result.output_text(), "no image given");
        assert_eq!(result.metadata["had_image"], false);
        assert_eq!(fake.vision_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fake.text_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bad_input_is_rejected_before_any_call() {
        let fake = Arc::new(FakeGemini::default());
        let tool = tool(&fake);

        let bad_b64 = ToolArgs::new().with("prompt", "x").with("image_data", "%%%not base64");
        assert_eq!(tool.execute(&bad_b64).await.unwrap_err().kind(), "InvalidArgument");

        let bad_mime = ToolArgs::new()
            .with("prompt", "x")
            .with("image_data", BASE64.encode([1u8]))
            .with("mime_type", "image/tiff");
        assert_eq!(tool.execute(&bad_mime).await.unwrap_err().kind(), "InvalidArgument");

        assert_eq!(fake.vision_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fake.text_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn raw_bytes_pass_through() {
        let value = ArgValue::Bytes(vec![7, 7]);
        assert_eq!(decode_image(Some(&value)).unwrap(), Some(vec![7, 7]));
        assert_eq!(decode_image(Some(&ArgValue::Text("  ".into()))).unwrap(), None);
        assert!(decode_image(Some(&ArgValue::Bool(true))).is_err());
    }
}
