//! Constants shared across the rendering pipeline

/// Engine limits
pub mod limits {
    /// Maximum nesting of blocks and parenthesized pipelines in template source
    pub const MAX_NESTING_DEPTH: usize = 100;

    /// Maximum combined nesting of blocks, parenthesized pipelines and
    /// `{{template}}` calls while escaping or executing. Sized to fit a
    /// 2 MiB thread stack in unoptimized builds.
    pub const MAX_CALL_DEPTH: usize = 200;
}

/// Logging configuration
pub mod logging {
    /// Environment variable holding the log filter directive
    pub const LOG_ENV_VAR: &str = "TMPLBRIDGE_LOG";

    /// Filter used when the variable is unset or unparsable
    pub const DEFAULT_LOG_FILTER: &str = "warn";
}
