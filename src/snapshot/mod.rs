pub mod compress;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ReportError, Result};
use crate::graph::ResultGraph;
use crate::store::atomic_write;
use crate::units::{fmt_bytes, fmt_seconds};

pub use compress::{COMPRESSED_SUFFIX, compress_snapshot, decompress_snapshot};

#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    pub graph: ResultGraph,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub size: String,
    pub sha256: String,
    pub tests: usize,
    pub tweets: usize,
    pub tokens: usize,
    pub first_test_start: Option<DateTime<Utc>>,
    pub last_test_end: Option<DateTime<Utc>>,
    pub run_start: Option<DateTime<Utc>>,
    pub run_end: Option<DateTime<Utc>>,
    pub elapsed: Option<String>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub raw_bytes: u64,
    pub packed_bytes: u64,
}

pub fn resolve_snapshot_path(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    let alternate = with_suffix(path, COMPRESSED_SUFFIX);
    if alternate.is_file() {
        return Ok(alternate);
    }
    Err(ReportError::SnapshotMissing {
        path: path.to_path_buf(),
        alternate,
    })
}

pub fn load_snapshot(path: &Path) -> Result<LoadedSnapshot> {
    let path = resolve_snapshot_path(path)?;
    let on_disk = fs::read(&path)
        .map_err(|err| ReportError::io(format!("reading {}", path.display()), err))?;
    let bytes = on_disk.len() as u64;
    let sha256 = sha256_hex(&on_disk);
    let json = if is_compressed(&path) {
        decompress_snapshot(&on_disk)
            .map_err(|err| ReportError::io(format!("decompressing {}", path.display()), err))?
    } else {
        on_disk
    };

    let mut graph = decode_graph(&path, &json)?;
    let relocated = snapshot_dir(&path)?;
    debug!(
        from = ?graph.output_dir,
        to = %relocated.display(),
        "relocating run output directory"
    );
    graph.output_dir = Some(relocated);

    let snapshot = LoadedSnapshot {
        path,
        bytes,
        sha256,
        graph,
    };
    info!(
        path = %snapshot.path.display(),
        size = %fmt_bytes(snapshot.bytes),
        tests = snapshot.graph.tests.len(),
        "loaded snapshot"
    );
    Ok(snapshot)
}

pub fn decode_graph(path: &Path, json: &[u8]) -> Result<ResultGraph> {
    let mut graph: ResultGraph = serde_json::from_slice(json)?;
    if graph.tests.is_empty() {
        return Err(ReportError::EmptyResult {
            path: path.to_path_buf(),
        });
    }
    graph.index_tokens()?;
    Ok(graph)
}

pub fn pack_snapshot(input: &Path, output: Option<&Path>) -> Result<PackOutcome> {
    let raw = fs::read(input)
        .map_err(|err| ReportError::io(format!("reading {}", input.display()), err))?;
    decode_graph(input, &raw)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| with_suffix(input, COMPRESSED_SUFFIX));
    let packed = compress_snapshot(&raw)
        .map_err(|err| ReportError::io(format!("compressing {}", input.display()), err))?;
    atomic_write(&output, &packed)
        .map_err(|err| ReportError::io(format!("writing {}", output.display()), err))?;
    info!(output = %output.display(), size = %fmt_bytes(packed.len() as u64), "packed snapshot");
    Ok(PackOutcome {
        input: input.to_path_buf(),
        output,
        raw_bytes: raw.len() as u64,
        packed_bytes: packed.len() as u64,
    })
}

pub fn summarize(snapshot: &LoadedSnapshot) -> SnapshotSummary {
    let graph = &snapshot.graph;
    let elapsed = match (graph.start, graph.end) {
        (Some(start), Some(end)) => {
            Some(fmt_seconds((end - start).num_milliseconds() as f64 / 1000.0))
        }
        _ => None,
    };
    SnapshotSummary {
        path: snapshot.path.clone(),
        bytes: snapshot.bytes,
        size: fmt_bytes(snapshot.bytes),
        sha256: snapshot.sha256.clone(),
        tests: graph.tests.len(),
        tweets: graph.tweet_count(),
        tokens: graph.token_count(),
        first_test_start: graph.tests.iter().map(|test| test.start).min(),
        last_test_end: graph.tests.iter().map(|test| test.end).max(),
        run_start: graph.start,
        run_end: graph.end,
        elapsed,
        output_dir: graph.output_dir.clone(),
    }
}

fn is_compressed(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(compress::is_compressed_name)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

fn snapshot_dir(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::canonicalize(parent)
        .map_err(|err| ReportError::io(format!("resolving {}", parent.display()), err))
}

fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}
