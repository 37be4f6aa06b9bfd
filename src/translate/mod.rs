//! Translation from the OpenAI chat dialect into the DeepSeek dialect.
//!
//! Only requests are translated. All functions here are pure (no I/O).

pub mod request;
pub mod types;

pub use request::{convert_messages, convert_tool_choice, to_upstream};
pub use types::{ChatRequest, ToolChoiceMode, UpstreamRequest};
