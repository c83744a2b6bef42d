pub mod artifact;
pub mod destination;
pub mod tsv;

use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::GEOFILE_WIDTH_DEFAULT;
use crate::error::{ReportError, Result};
use crate::graph::ResultGraph;
use crate::select::{
    ResolveOptions, Selection, Selectors, UnresolvedReference, apply_cascade, cascade_required,
    resolve_hierarchy,
};
use crate::store::AtomicFile;

pub use artifact::{ArtifactOutcome, ArtifactRenderer, ArtifactRequest, GeoJsonRenderer};
pub use destination::{Destination, IMPLICIT_TOKEN_SUFFIX};
use tsv::{TsvWriter, fmt_opt_float, fmt_time};

pub const TEST_COLUMNS: &[&str] = &[
    "test",
    "start",
    "end",
    "tweets",
    "located",
    "mean_error",
    "median_error",
];
pub const TWEET_COLUMNS: &[&str] = &["test", "tweet", "id", "located", "error", "tokens"];
pub const TOKEN_COLUMNS: &[&str] = &["test", "token", "points", "cascaded"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Tests,
    Tweets,
    Tokens,
}

impl Level {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tests => "tests",
            Self::Tweets => "tweets",
            Self::Tokens => "tokens",
        }
    }

    pub const fn entity_name(self) -> &'static str {
        match self {
            Self::Tests => "test",
            Self::Tweets => "tweet",
            Self::Tokens => "token",
        }
    }

    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Tests => TEST_COLUMNS,
            Self::Tweets => TWEET_COLUMNS,
            Self::Tokens => TOKEN_COLUMNS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub selectors: Selectors,
    pub options: ResolveOptions,
    pub test_out: Option<Destination>,
    pub tweet_out: Option<Destination>,
    pub token_out: Option<Destination>,
    pub tweet_tokens: bool,
    pub geofiles: bool,
    pub geofile_width: u32,
    pub artifact_dir: PathBuf,
}

impl Default for ReportRequest {
    fn default() -> Self {
        Self {
            selectors: Selectors::default(),
            options: ResolveOptions::default(),
            test_out: None,
            tweet_out: None,
            token_out: None,
            tweet_tokens: false,
            geofiles: false,
            geofile_width: GEOFILE_WIDTH_DEFAULT,
            artifact_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub level: Level,
    pub destination: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReportOutcome {
    pub tables: Vec<TableOutcome>,
    pub cascaded_tokens: usize,
    pub artifacts_written: usize,
    pub artifacts_skipped: usize,
    pub unresolved: Vec<UnresolvedReference>,
}

struct Row<'a> {
    fields: Vec<String>,
    artifact: ArtifactRequest<'a>,
}

pub fn run_report(
    graph: &ResultGraph,
    request: &ReportRequest,
    renderer: &dyn ArtifactRenderer,
    stdout: &mut dyn Write,
) -> Result<ReportOutcome> {
    let mut selection = resolve_hierarchy(graph, &request.selectors, request.options)?;
    let mut outcome = ReportOutcome::default();
    if cascade_required(
        request.geofiles,
        request.tweet_tokens,
        request.token_out.is_some(),
    ) {
        outcome.cascaded_tokens = apply_cascade(graph, &mut selection);
    }
    let token_out = token_destination(request, &selection);
    info!(
        tests = selection.tests.len(),
        tweets = selection.tweet_count(),
        tokens = selection.token_count(),
        unresolved = selection.unresolved.len(),
        policy = request.options.unresolved.as_str(),
        "resolved selection"
    );

    let width = request.geofile_width;
    let tables = [
        (Level::Tests, request.test_out.as_ref()),
        (Level::Tweets, request.tweet_out.as_ref()),
        (Level::Tokens, token_out.as_ref()),
    ];
    for (level, dest) in tables {
        let Some(dest) = dest else {
            continue;
        };
        let rows = match level {
            Level::Tests => test_rows(graph, &selection, width),
            Level::Tweets => tweet_rows(graph, &selection, width),
            Level::Tokens => token_rows(graph, &selection, width, false),
        };
        write_table(level, dest, &rows, stdout)?;
        if request.geofiles {
            let stem = dest.artifact_stem(level.as_str(), &request.artifact_dir);
            render_artifacts(level, &stem, &rows, renderer, &mut outcome)?;
        }
        outcome.tables.push(TableOutcome {
            level,
            destination: dest.to_string(),
            rows: rows.len(),
        });
    }

    // Without a token table, tokens pulled in by reported tweets still get
    // geofiles, named after the tweet table.
    if request.geofiles && token_out.is_none() {
        if let Some(tweet_dest) = &request.tweet_out {
            let rows = token_rows(graph, &selection, width, true);
            let mut stem = tweet_dest
                .artifact_stem(Level::Tweets.as_str(), &request.artifact_dir)
                .into_os_string();
            stem.push(".tokens");
            render_artifacts(
                Level::Tokens,
                Path::new(&stem),
                &rows,
                renderer,
                &mut outcome,
            )?;
        }
    }

    outcome.unresolved = selection.unresolved;
    Ok(outcome)
}

fn token_destination(request: &ReportRequest, selection: &Selection) -> Option<Destination> {
    if let Some(dest) = &request.token_out {
        return Some(dest.clone());
    }
    if !request.tweet_tokens || selection.tweet_count() == 0 {
        return None;
    }
    let derived = request
        .tweet_out
        .as_ref()
        .map(|dest| dest.derived_token_destination(&request.artifact_dir));
    if let Some(dest) = &derived {
        debug!(destination = %dest, "deriving token output from tweet output");
    }
    derived
}

fn test_rows<'a>(graph: &'a ResultGraph, selection: &Selection, width: u32) -> Vec<Row<'a>> {
    let mut ordinals: Vec<usize> = selection.tests.iter().map(|sel| sel.test).collect();
    ordinals.sort_by_key(|&ordinal| (graph.tests[ordinal].start, ordinal));
    ordinals
        .into_iter()
        .map(|ordinal| {
            let test = &graph.tests[ordinal];
            Row {
                fields: vec![
                    ordinal.to_string(),
                    fmt_time(test.start),
                    fmt_time(test.end),
                    test.summary.tweets.to_string(),
                    test.summary.located.to_string(),
                    fmt_opt_float(test.summary.mean_error),
                    fmt_opt_float(test.summary.median_error),
                ],
                artifact: ArtifactRequest {
                    level: Level::Tests,
                    test: ordinal,
                    label: ordinal.to_string(),
                    payload: None,
                    width_px: width,
                },
            }
        })
        .collect()
}

fn tweet_rows<'a>(graph: &'a ResultGraph, selection: &Selection, width: u32) -> Vec<Row<'a>> {
    let mut keys: Vec<(usize, usize)> = selection
        .tests
        .iter()
        .flat_map(|sel| sel.tweets.iter().map(move |&tweet| (sel.test, tweet)))
        .collect();
    keys.sort_by(|a, b| {
        let error_a = graph.tests[a.0].tweets[a.1].error;
        let error_b = graph.tests[b.0].tweets[b.1].error;
        compare_errors(error_a, error_b).then_with(|| a.cmp(b))
    });
    keys.into_iter()
        .map(|(test, ordinal)| {
            let tweet = &graph.tests[test].tweets[ordinal];
            Row {
                fields: vec![
                    test.to_string(),
                    ordinal.to_string(),
                    tweet.id.map(|id| id.to_string()).unwrap_or_default(),
                    tweet.located.to_string(),
                    fmt_opt_float(tweet.error),
                    tweet.tokens.len().to_string(),
                ],
                artifact: ArtifactRequest {
                    level: Level::Tweets,
                    test,
                    label: tweet
                        .id
                        .map_or_else(|| ordinal.to_string(), |id| id.to_string()),
                    payload: tweet.estimate.as_ref(),
                    width_px: width,
                },
            }
        })
        .collect()
}

fn compare_errors(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn token_rows<'a>(
    graph: &'a ResultGraph,
    selection: &Selection,
    width: u32,
    cascaded_only: bool,
) -> Vec<Row<'a>> {
    let mut keys: Vec<(usize, usize, bool)> = selection
        .tests
        .iter()
        .flat_map(|sel| {
            sel.tokens
                .iter()
                .map(move |&pos| (sel.test, pos, sel.cascaded.contains(&pos)))
        })
        .filter(|&(_, _, cascaded)| cascaded || !cascaded_only)
        .collect();
    keys.sort_by(|a, b| {
        let token_a = &graph.tests[a.0].tokens[a.1];
        let token_b = &graph.tests[b.0].tokens[b.1];
        token_b
            .points
            .cmp(&token_a.points)
            .then(a.0.cmp(&b.0))
            .then_with(|| token_a.id.cmp(&token_b.id))
    });
    keys.into_iter()
        .map(|(test, pos, cascaded)| {
            let token = &graph.tests[test].tokens[pos];
            Row {
                fields: vec![
                    test.to_string(),
                    token.id.clone(),
                    token.points.to_string(),
                    cascaded.to_string(),
                ],
                artifact: ArtifactRequest {
                    level: Level::Tokens,
                    test,
                    label: token.id.clone(),
                    payload: token.model.as_ref(),
                    width_px: width,
                },
            }
        })
        .collect()
}

fn write_table(
    level: Level,
    dest: &Destination,
    rows: &[Row<'_>],
    stdout: &mut dyn Write,
) -> Result<()> {
    let wrap = |err: std::io::Error| {
        ReportError::io(format!("writing {} table to {dest}", level.as_str()), err)
    };
    match dest {
        Destination::Stdout => write_rows(level, &mut *stdout, rows).map_err(wrap)?,
        Destination::File(path) => {
            let mut file = AtomicFile::create(path).map_err(wrap)?;
            write_rows(level, &mut file, rows).map_err(wrap)?;
            file.commit().map_err(wrap)?;
        }
    }
    info!(
        level = level.as_str(),
        destination = %dest,
        rows = rows.len(),
        "wrote table"
    );
    Ok(())
}

fn write_rows<W: Write>(level: Level, out: W, rows: &[Row<'_>]) -> std::io::Result<()> {
    let mut writer = TsvWriter::new(out, level.columns())?;
    for row in rows {
        writer.write_row(&row.fields)?;
    }
    writer.into_inner().map(drop)
}

fn render_artifacts(
    level: Level,
    stem: &Path,
    rows: &[Row<'_>],
    renderer: &dyn ArtifactRenderer,
    outcome: &mut ReportOutcome,
) -> Result<()> {
    for (seq, row) in rows.iter().enumerate() {
        let path = destination::artifact_path(stem, seq, renderer.extension());
        match renderer.render(&row.artifact, &path)? {
            ArtifactOutcome::Rendered(_) => outcome.artifacts_written += 1,
            ArtifactOutcome::Unsupported => {
                debug!(
                    level = level.as_str(),
                    label = %row.artifact.label,
                    "entity has no geofile support"
                );
                outcome.artifacts_skipped += 1;
            }
        }
    }
    Ok(())
}
