/// Default pending-queue depth at which a link logs a warning.
pub const DEFAULT_QUEUE_WARN_DEPTH: usize = 256;

/// Per-link behavior settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Queue depth at which a gated link warns that its peer has not
    /// announced itself. Never a cap: submissions are always accepted.
    pub queue_warn_depth: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            queue_warn_depth: DEFAULT_QUEUE_WARN_DEPTH,
        }
    }
}
