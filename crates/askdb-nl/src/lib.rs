//! Natural-language-to-SQL engine.
//!
//! Three pieces: a pure prompt builder, a thin chat-completions client,
//! and the extractor/guard that turns untrusted model output into a
//! single validated read-only statement. The guard is the only safety
//! boundary between model output and the executor.

pub mod client;
pub mod guard;
pub mod prompt;

pub use client::{CompletionClient, CompletionConfig};
pub use guard::{extract_and_guard, extract_statement, guard_read_only};
pub use prompt::{chart_prompt, explain_prompt, render_schema, sql_prompt, Prompt};
