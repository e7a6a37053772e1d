use std::path::PathBuf;

/// Server-level configuration: where resources and schemas are loaded from
/// and how startup treats resources that fail to initialize.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Directory scanned for `*.resource.json` files.
    pub resources_dir: Option<PathBuf>,
    /// Directory scanned for `*.json` schema definitions.
    pub schemas_dir: Option<PathBuf>,
    /// Fail startup when any resource cannot initialize, instead of
    /// serving the rest and reporting it through readiness.
    pub strict_startup: bool,
}
