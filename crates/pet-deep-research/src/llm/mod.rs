//! Language-model clients
//!
//! - `provider` - the [`LanguageModel`] trait and [`GenerateRequest`]
//! - `gemini` - direct REST client with native JSON mode and key rotation
//! - `rig_adapter` - any rig-core agent (Ollama, OpenAI, ...) as a model
//! - `json` - lenient JSON extraction from model text

pub mod gemini;
pub mod json;
pub mod provider;
pub mod rig_adapter;

pub use gemini::{GeminiModel, DEFAULT_GEMINI_MODEL};
pub use json::{extract_json, scalar_text, strip_code_fences};
pub use provider::{GenerateRequest, LanguageModel};
pub use rig_adapter::RigModel;
