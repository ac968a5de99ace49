//! Specification to geometry
//!
//! `synthesize` keeps one node per solid with its transform separate, for
//! renderers. `merge_for_export` bakes every transform into one mesh.

use nalgebra::{Matrix4, Rotation3, Vector3};
use tracing::debug;

use crate::mesh::{base_solid, MeshConfig, MeshData};
use crate::spec::{HexColor, ModelSpec, PrimitiveKind};

/// Idle spin of the display group, radians per second about +Y
pub const SPIN_RATE: f32 = 0.3;

/// One transformed solid; `mesh` stays in local coordinates.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: PrimitiveKind,
    pub color: HexColor,
    pub transform: Matrix4<f32>,
    pub mesh: MeshData,
}

impl SceneNode {
    pub fn world_mesh(&self) -> MeshData {
        let mut mesh = self.mesh.clone();
        mesh.transform(&self.transform);
        mesh
    }
}

/// Every node of a model under a single animatable group
#[derive(Debug, Clone)]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
    /// Current group rotation about +Y
    pub spin: f32,
}

impl Scene {
    /// Advance the idle animation by `delta` seconds.
    pub fn advance(&mut self, delta: f32) {
        self.spin = (self.spin + delta * SPIN_RATE) % std::f32::consts::TAU;
    }

    pub fn group_transform(&self) -> Matrix4<f32> {
        Rotation3::from_axis_angle(&Vector3::y_axis(), self.spin).to_homogeneous()
    }
}

/// Single-material mesh ready for export
#[derive(Debug, Clone)]
pub struct ExportMesh {
    pub mesh: MeshData,
    pub color: HexColor,
}

/// Scale, then rotate X, Y, Z about local axes, then translate.
pub fn component_transform(scale: f64, offset: [f64; 3], rotation: [f64; 3]) -> Matrix4<f32> {
    let [rx, ry, rz] = rotation.map(|r| r as f32);
    let [ox, oy, oz] = offset.map(|o| o as f32);

    let rotation = Rotation3::from_axis_angle(&Vector3::x_axis(), rx)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), ry)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), rz);

    Matrix4::new_translation(&Vector3::new(ox, oy, oz))
        * rotation.to_homogeneous()
        * Matrix4::new_scaling(scale as f32)
}

pub fn synthesize(spec: &ModelSpec, config: &MeshConfig) -> Scene {
    let nodes = match spec {
        ModelSpec::Primitive(p) => vec![SceneNode {
            name: p.primitive.to_string(),
            kind: p.primitive,
            color: p.color.clone(),
            transform: component_transform(p.scale, [0.0; 3], [0.0; 3]),
            mesh: base_solid(p.primitive, config),
        }],
        ModelSpec::Composite(c) => c
            .components
            .iter()
            .map(|part| SceneNode {
                name: part.name.clone(),
                kind: part.primitive,
                color: part.color.clone(),
                transform: component_transform(part.scale, part.offset, part.rotation),
                mesh: base_solid(part.primitive, config),
            })
            .collect(),
    };

    debug!("Synthesized scene with {} node(s)", nodes.len());
    Scene { nodes, spin: 0.0 }
}

/// Merge all solids into one mesh with recomputed normals. The last node's
/// color becomes the material for the whole mesh. `None` when the model has
/// no geometry.
pub fn merge_for_export(spec: &ModelSpec, config: &MeshConfig) -> Option<ExportMesh> {
    let scene = synthesize(spec, config);
    let color = scene.nodes.last()?.color.clone();

    let mut merged = MeshData::new();
    for node in &scene.nodes {
        merged.merge(&node.world_mesh());
    }
    merged.recompute_normals();

    debug!(
        "Merged {} node(s): {} vertices, {} triangles",
        scene.nodes.len(),
        merged.vertex_count(),
        merged.triangle_count()
    );
    Some(ExportMesh {
        mesh: merged,
        color,
    })
}
