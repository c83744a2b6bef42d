use std::fmt;
use std::path::{Path, PathBuf};

pub const STDOUT_MARKER: &str = "-";
pub const IMPLICIT_TOKEN_SUFFIX: &str = ".tokens.tsv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    pub fn parse(raw: &str) -> Self {
        if raw == STDOUT_MARKER {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(raw))
        }
    }

    pub fn is_stdout(&self) -> bool {
        matches!(self, Self::Stdout)
    }

    // A stdout tweet table never shares the stream with its token table.
    pub fn derived_token_destination(&self, fallback_dir: &Path) -> Self {
        let tweets = match self {
            Self::Stdout => fallback_dir.join("tweets"),
            Self::File(path) => path.with_extension(""),
        };
        let mut raw = tweets.into_os_string();
        raw.push(IMPLICIT_TOKEN_SUFFIX);
        Self::File(PathBuf::from(raw))
    }

    pub fn artifact_stem(&self, level: &str, fallback_dir: &Path) -> PathBuf {
        match self {
            Self::Stdout => fallback_dir.join(level),
            Self::File(path) => path.with_extension(""),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str(STDOUT_MARKER),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

pub fn artifact_path(stem: &Path, seq: usize, extension: &str) -> PathBuf {
    let mut raw = stem.as_os_str().to_os_string();
    raw.push(format!(".{seq}.{extension}"));
    PathBuf::from(raw)
}
