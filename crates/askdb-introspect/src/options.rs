/// Options that control how introspection behaves.
#[derive(Debug, Clone)]
pub struct IntrospectOptions {
    /// Maximum sample rows fetched per table (no ordering guarantee).
    pub sample_rows: usize,
    /// Whether to run the per-table `COUNT(*)` estimate.
    pub count_rows: bool,
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        Self {
            sample_rows: 5,
            count_rows: true,
        }
    }
}
