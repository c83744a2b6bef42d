use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::error::{ReportError, Result};
use crate::store::atomic_write;

use super::Level;

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRequest<'a> {
    pub level: Level,
    pub test: usize,
    pub label: String,
    pub payload: Option<&'a Value>,
    pub width_px: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    Rendered(PathBuf),
    Unsupported,
}

pub trait ArtifactRenderer {
    fn extension(&self) -> &str;

    fn render(&self, request: &ArtifactRequest<'_>, path: &Path) -> Result<ArtifactOutcome>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonRenderer;

impl ArtifactRenderer for GeoJsonRenderer {
    fn extension(&self) -> &str {
        "geo.json"
    }

    fn render(&self, request: &ArtifactRequest<'_>, path: &Path) -> Result<ArtifactOutcome> {
        let Some(payload) = request.payload else {
            return Ok(ArtifactOutcome::Unsupported);
        };
        let document = json!({
            "level": request.level.entity_name(),
            "test": request.test,
            "label": request.label,
            "width_px": request.width_px,
            "model": payload,
        });
        let bytes = serde_json::to_vec_pretty(&document)?;
        atomic_write(path, &bytes)
            .map_err(|err| ReportError::io(format!("writing {}", path.display()), err))?;
        Ok(ArtifactOutcome::Rendered(path.to_path_buf()))
    }
}
