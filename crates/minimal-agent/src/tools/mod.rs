//! Built-in tools.
//!
//! | Name                | Category      | Backed by                      |
//! |---------------------|---------------|--------------------------------|
//! | `llm_generate`      | llm           | [`TextGenerator`] (Groq/Gemini) |
//! | `llm_analyze_image` | vision        | [`VisionModel`] (Gemini)        |
//! | `send_email`        | communication | [`EmailSender`] (Resend)        |
//!
//! [`TextGenerator`]: crate::llm::TextGenerator
//! [`VisionModel`]: crate::llm::VisionModel

pub mod email;
pub mod generate;
pub mod vision;

pub use email::{EmailMessage, EmailSender, EmailTool, ResendMailer, SEND_EMAIL};
pub use generate::{GenerateTool, LLM_GENERATE};
pub use vision::{ImageAnalysisTool, LLM_ANALYZE_IMAGE};
