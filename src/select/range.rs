use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{ReportError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Empty,
    Index(i64),
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    text: String,
    clauses: Vec<(String, Clause)>,
}

impl Selector {
    pub fn parse(text: &str) -> Result<Self> {
        let mut clauses = Vec::new();
        for raw in text.split(',') {
            let clause = parse_clause(raw)?;
            if clause != Clause::Empty {
                clauses.push((raw.trim().to_string(), clause));
            }
        }
        Ok(Self {
            text: text.to_string(),
            clauses,
        })
    }

    pub fn all() -> Self {
        Self {
            text: ":".to_string(),
            clauses: vec![(
                ":".to_string(),
                Clause::Slice {
                    start: None,
                    stop: None,
                    step: 1,
                },
            )],
        }
    }

    pub fn none() -> Self {
        Self {
            text: String::new(),
            clauses: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn resolve(&self, len: usize) -> Result<Vec<usize>> {
        self.resolve_scoped(len, "selector", None)
    }

    /// Like [`Selector::resolve`], but an out-of-range index error names the
    /// level and the test the selector was applied within.
    pub fn resolve_scoped(
        &self,
        len: usize,
        level: &'static str,
        test: Option<usize>,
    ) -> Result<Vec<usize>> {
        let mut indexes = BTreeSet::new();
        for (text, clause) in &self.clauses {
            match *clause {
                Clause::Empty => {}
                Clause::Index(index) => {
                    let resolved = resolve_index(index, len).ok_or_else(|| {
                        ReportError::SelectorIndexOutOfRange {
                            level,
                            test,
                            clause: text.clone(),
                            index,
                            len,
                        }
                    })?;
                    indexes.insert(resolved);
                }
                Clause::Slice { start, stop, step } => {
                    indexes.extend(slice_indices(len, start, stop, step));
                }
            }
        }
        Ok(indexes.into_iter().collect())
    }
}

impl FromStr for Selector {
    type Err = ReportError;

    fn from_str(text: &str) -> Result<Self> {
        Self::parse(text)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_clause(raw: &str) -> Result<Clause> {
    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        [single] => Ok(parse_bound(raw, single)?.map_or(Clause::Empty, Clause::Index)),
        [start, stop] => Ok(Clause::Slice {
            start: parse_bound(raw, start)?,
            stop: parse_bound(raw, stop)?,
            step: 1,
        }),
        [start, stop, step] => {
            let step = match parse_bound(raw, step)? {
                Some(0) => return Err(ReportError::syntax(raw.trim(), "slice step cannot be zero")),
                Some(step) => step,
                None => 1,
            };
            Ok(Clause::Slice {
                start: parse_bound(raw, start)?,
                stop: parse_bound(raw, stop)?,
                step,
            })
        }
        _ => Err(ReportError::syntax(raw.trim(), "too many `:` separators")),
    }
}

fn parse_bound(clause: &str, part: &str) -> Result<Option<i64>> {
    let part = part.trim();
    if part.is_empty() {
        return Ok(None);
    }
    part.parse::<i64>()
        .map(Some)
        .map_err(|_| ReportError::syntax(clause.trim(), format!("`{part}` is not an integer")))
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let n = len as i64;
    let resolved = if index < 0 { index.saturating_add(n) } else { index };
    (0..n).contains(&resolved).then_some(resolved as usize)
}

/// Indexes selected by the slice `start:stop:step` over a sequence of
/// length `len`, in slice order.
///
/// Missing bounds default to the whole sequence in the direction of `step`.
/// Negative bounds have `len` added; bounds still outside the sequence are
/// clamped to `[0, len]` for a positive step and `[-1, len - 1]` for a
/// negative one. A zero step selects nothing.
pub(crate) fn slice_indices(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: i64,
) -> Vec<usize> {
    if step == 0 {
        return Vec::new();
    }
    let n = len as i64;
    let (lower, upper) = if step < 0 { (-1, n - 1) } else { (0, n) };
    let clamp = |bound: Option<i64>, default: i64| match bound {
        None => default,
        Some(value) if value < 0 => value.saturating_add(n).max(lower),
        Some(value) => value.min(upper),
    };
    let (first, last) = if step < 0 { (upper, lower) } else { (lower, upper) };
    let start = clamp(start, first);
    let stop = clamp(stop, last);

    let mut out = Vec::new();
    let mut index = start;
    while (step > 0 && index < stop) || (step < 0 && index > stop) {
        out.push(index as usize);
        match index.checked_add(step) {
            Some(next) => index = next,
            None => break,
        }
    }
    out
}
