use thiserror::Error;

/// Error surface for the polling runtime and the debounced writer.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error in {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{task} task failed: {message}")]
    Join { task: &'static str, message: String },
}

pub(crate) fn io_err(context: &'static str, source: std::io::Error) -> DaemonError {
    DaemonError::Io { context, source }
}
