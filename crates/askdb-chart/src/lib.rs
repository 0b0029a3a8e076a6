//! Chart inference and dashboard serialization.
//!
//! Chart specs are derived purely from a query result plus an optional
//! requested kind; dashboards are append-only sequences serialized to a
//! single self-contained HTML artifact.

pub mod config;
pub mod dashboard;
pub mod spec;

pub use config::chartjs_config;
pub use dashboard::{Dashboard, DashboardEntry};
pub use spec::{infer_chart, ChartKind, ChartSpec};
