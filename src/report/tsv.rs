use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};

pub struct TsvWriter<W: Write> {
    inner: W,
    columns: usize,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(mut inner: W, header: &[&str]) -> io::Result<Self> {
        write_line(&mut inner, header.iter().copied())?;
        Ok(Self {
            inner,
            columns: header.len(),
        })
    }

    pub fn write_row(&mut self, fields: &[String]) -> io::Result<()> {
        if fields.len() != self.columns {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("row has {} fields, header has {}", fields.len(), self.columns),
            ));
        }
        write_line(&mut self.inner, fields.iter().map(String::as_str))
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn write_line<'a, W: Write>(out: &mut W, fields: impl Iterator<Item = &'a str>) -> io::Result<()> {
    let line = fields.map(clean_field).collect::<Vec<_>>().join("\t");
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")
}

fn clean_field(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

pub fn fmt_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn fmt_float(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{value:.6}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn fmt_opt_float(value: Option<f64>) -> String {
    value.map(fmt_float).unwrap_or_default()
}
