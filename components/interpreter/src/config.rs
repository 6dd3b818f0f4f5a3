//! Runtime configuration

/// Default limit on nested calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Tunables for one runtime instance.
///
/// Forked executions inherit the configuration of the runtime that forked
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum number of simultaneously active calls, `Main` included
    pub max_call_depth: usize,
    /// Whether `Fork` may start new executions
    pub fork_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            fork_enabled: true,
        }
    }
}

impl RuntimeConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum call depth
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Enable or disable `Fork`
    pub fn with_fork(mut self, enabled: bool) -> Self {
        self.fork_enabled = enabled;
        self
    }
}
