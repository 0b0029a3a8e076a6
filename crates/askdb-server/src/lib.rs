//! Tool and chat front-ends over the NL-to-SQL pipeline.
//!
//! A [`Session`] owns the connected database and the optional
//! completion client; the five tool operations live on it. Two
//! front-ends share one session: a newline-delimited JSON-RPC loop
//! over stdio for tool hosts, and an axum web chat.

pub mod rpc;
pub mod session;
pub mod tools;
pub mod web;

pub use session::{ConnectSummary, Session, SessionSettings};
pub use tools::{AskOutcome, ChartOutcome, ExplainOutcome, SaveOutcome};
