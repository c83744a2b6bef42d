use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid selector clause `{clause}`: {reason}")]
    SelectorSyntax { clause: String, reason: String },

    #[error(
        "{level} clause `{clause}` is out of range for length {len}{}",
        in_test(.test)
    )]
    SelectorIndexOutOfRange {
        level: &'static str,
        test: Option<usize>,
        clause: String,
        index: i64,
        len: usize,
    },

    #[error("snapshot {} contains no tests", .path.display())]
    EmptyResult { path: PathBuf },

    #[error("tweet {tweet} in test {test} references unknown token `{token}`")]
    UnresolvedTokenReference {
        test: usize,
        tweet: usize,
        token: String,
    },

    #[error("neither {} nor {} exist", .path.display(), .alternate.display())]
    SnapshotMissing { path: PathBuf, alternate: PathBuf },

    #[error("test {test} lists token `{token}` more than once")]
    DuplicateToken { test: usize, token: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn in_test(test: &Option<usize>) -> String {
    test.map(|test| format!(" in test {test}")).unwrap_or_default()
}

impl ReportError {
    pub fn syntax(clause: &str, reason: impl Into<String>) -> Self {
        Self::SelectorSyntax {
            clause: clause.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::SelectorSyntax { .. } => "selector_syntax",
            Self::SelectorIndexOutOfRange { .. } => "selector_out_of_range",
            Self::EmptyResult { .. } => "empty_result",
            Self::UnresolvedTokenReference { .. } => "unresolved_token_reference",
            Self::SnapshotMissing { .. } => "snapshot_missing",
            Self::DuplicateToken { .. } => "duplicate_token",
            Self::Io { .. } => "io_error",
            Self::Json(_) => "json_error",
            Self::Config(_) => "config_error",
        }
    }
}
