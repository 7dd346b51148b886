use thiserror::Error;

/// Structured error hierarchy for `infinite-context`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("transcript: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("hook: {0}")]
    Hook(#[from] HookError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("failed to save config: {0}")]
    Save(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database at {path}: {message}")]
    Open { path: String, message: String },

    #[error("schema bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("failed to read transcript {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("unrecognized hook event: {0}")]
    UnknownEvent(String),

    #[error("output write failed: {0}")]
    Emit(String),
}

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ContextError>;
