//! STL and schematic export
//!
//! STL output is ASCII. Facet normals are recomputed from each triangle's
//! winding (right-hand rule), not taken from vertex normals.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::mesh::{MeshConfig, MeshData};
use crate::session::{Design, Message};
use crate::spec::ModelSpec;
use crate::synth::merge_for_export;

/// Messages carried in a schematic
pub const RECENT_MESSAGES: usize = 5;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize schematic: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Write `mesh` as an ASCII STL solid called `name`.
pub fn write_ascii_stl<W: Write>(mesh: &MeshData, name: &str, out: &mut W) -> io::Result<()> {
    let name = solid_name(name);
    writeln!(out, "solid {}", name)?;
    for [v0, v1, v2] in mesh.triangles() {
        let edge1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
        let edge2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
        let n = normalize(cross(edge1, edge2));

        writeln!(out, "\tfacet normal {} {} {}", n[0], n[1], n[2])?;
        writeln!(out, "\t\touter loop")?;
        for v in [v0, v1, v2] {
            writeln!(out, "\t\t\tvertex {} {} {}", v[0], v[1], v[2])?;
        }
        writeln!(out, "\t\tendloop")?;
        writeln!(out, "\tendfacet")?;
    }
    writeln!(out, "endsolid {}", name)?;
    Ok(())
}

/// ASCII STL of a model's merged geometry; `None` when there is nothing
/// to export.
pub fn model_to_stl(model: &ModelSpec, name: &str, config: &MeshConfig) -> Option<String> {
    let merged = merge_for_export(model, config)?;
    if merged.mesh.is_empty() {
        return None;
    }
    let mut buf = Vec::new();
    // Writing into a Vec<u8> cannot fail
    write_ascii_stl(&merged.mesh, name, &mut buf).ok()?;
    String::from_utf8(buf).ok()
}

/// STL text for a design's current model; `None` without geometry.
pub fn export_stl(design: &Design, config: &MeshConfig) -> Option<String> {
    model_to_stl(design.model.as_ref()?, &design.name, config)
}

/// Write a design's STL to `path`. Returns `Ok(false)` and writes nothing
/// when the design has no geometry.
pub fn write_stl_file(design: &Design, config: &MeshConfig, path: &Path) -> Result<bool, ExportError> {
    let Some(stl) = export_stl(design, config) else {
        info!("Design {} has no geometry, skipping STL export", design.id);
        return Ok(false);
    };
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(stl.as_bytes())?;
    writer.flush()?;
    info!("Exported STL for {} to {:?}", design.name, path);
    Ok(true)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schematic<'a> {
    pub name: &'a str,
    pub created_at: DateTime<Utc>,
    pub refined_prompt: &'a str,
    pub model: Option<&'a ModelSpec>,
    pub recent_messages: &'a [Message],
}

impl<'a> Schematic<'a> {
    pub fn from_design(design: &'a Design) -> Self {
        let start = design.messages.len().saturating_sub(RECENT_MESSAGES);
        Self {
            name: &design.name,
            created_at: design.created_at,
            refined_prompt: &design.refined_prompt,
            model: design.model.as_ref(),
            recent_messages: &design.messages[start..],
        }
    }
}

/// Indented JSON schematic
pub fn export_schematic(design: &Design) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&Schematic::from_design(design))?)
}

pub fn write_schematic_file(design: &Design, path: &Path) -> Result<(), ExportError> {
    let text = export_schematic(design)?;
    std::fs::write(path, text)?;
    info!("Exported schematic for {} to {:?}", design.name, path);
    Ok(())
}

/// Download file name for a design, e.g. `Design 1.stl`
pub fn file_name(design: &Design, extension: &str) -> String {
    let stem: String = design
        .name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = stem.trim();
    let stem = if stem.is_empty() { "design" } else { stem };
    format!("{}.{}", stem, extension)
}

fn solid_name(name: &str) -> String {
    let joined = name.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        "exported".to_string()
    } else {
        joined
    }
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > 0.0 {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}
