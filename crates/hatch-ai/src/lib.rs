//! Text-generation capability for hatch.
//!
//! Providers expand a parsed template into a batch of issue drafts. The
//! engine consumes the `IssueGenerator` trait; concrete clients cover
//! Gemini and OpenAI-compatible chat-completions endpoints, with a
//! deterministic template fan-out as the offline fallback and an optional
//! TTL cache decorator.

mod cache;
mod fanout;
mod gemini;
mod openai;
mod prompt;
mod provider;
mod types;

pub use cache::CachedGenerator;
pub use fanout::TemplateFanoutGenerator;
pub use gemini::{GeminiGenerator, GeminiGeneratorConfig};
pub use openai::{OpenAiGenerator, OpenAiGeneratorConfig};
pub use provider::{select_generator, GeneratorProviders};
pub use types::{GeneratorError, IssueDraft, IssueGenerator};
