//! Error types for standup-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from local state operations.
#[derive(Debug, Error)]
pub enum LocalStateError {
    /// Underlying I/O failure (permission denied, disk full, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`, so `~/.standup/` cannot be located.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No config file has been written yet.
    #[error("config not found at {path}; run `standup init` first")]
    ConfigNotFound { path: PathBuf },
}
