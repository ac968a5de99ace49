//! Indexed triangle meshes and procedural base solids
//!
//! Every primitive kind maps to one canonical solid of fixed base size,
//! centered on the origin with +Y up. Specs only ever scale it uniformly.

use std::f32::consts::PI;

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use crate::spec::PrimitiveKind;

pub const SPHERE_RADIUS: f32 = 1.0;
pub const BOX_SIZE: f32 = 1.5;
pub const CYLINDER_RADIUS: f32 = 0.75;
pub const CYLINDER_HEIGHT: f32 = 1.5;
pub const CONE_RADIUS: f32 = 0.75;
pub const CONE_HEIGHT: f32 = 1.5;
pub const TORUS_MAJOR_RADIUS: f32 = 0.75;
pub const TORUS_MINOR_RADIUS: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshConfig {
    /// Segment count around curved primitives
    pub circular_segments: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            circular_segments: 32,
        }
    }
}

/// Mesh data for rendering, streaming and export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_vertex(&mut self, pos: [f32; 3], normal: [f32; 3]) -> u32 {
        let idx = (self.positions.len() / 3) as u32;
        self.positions.extend_from_slice(&pos);
        self.normals.extend_from_slice(&normal);
        idx
    }

    fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex(&self, index: usize) -> [f32; 3] {
        [
            self.positions[index * 3],
            self.positions[index * 3 + 1],
            self.positions[index * 3 + 2],
        ]
    }

    pub fn triangles(&self) -> impl Iterator<Item = [[f32; 3]; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                self.vertex(tri[0] as usize),
                self.vertex(tri[1] as usize),
                self.vertex(tri[2] as usize),
            ]
        })
    }

    /// Append another mesh, re-basing its indices.
    pub fn merge(&mut self, other: &MeshData) {
        let offset = self.vertex_count() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|idx| idx + offset));
    }

    /// Bake an affine transform into the vertex data.
    pub fn transform(&mut self, matrix: &Matrix4<f32>) {
        let linear: Matrix3<f32> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .map(|inv| inv.transpose())
            .unwrap_or(linear);

        for i in 0..self.vertex_count() {
            let p = matrix.transform_point(&Point3::new(
                self.positions[i * 3],
                self.positions[i * 3 + 1],
                self.positions[i * 3 + 2],
            ));
            self.positions[i * 3..i * 3 + 3].copy_from_slice(&[p.x, p.y, p.z]);

            let n = normal_matrix
                * Vector3::new(
                    self.normals[i * 3],
                    self.normals[i * 3 + 1],
                    self.normals[i * 3 + 2],
                );
            let n = n.try_normalize(1e-12).unwrap_or(n);
            self.normals[i * 3..i * 3 + 3].copy_from_slice(&[n.x, n.y, n.z]);
        }
    }

    /// Area-weighted vertex normals from the current triangles.
    pub fn recompute_normals(&mut self) {
        let mut accum = vec![Vector3::<f32>::zeros(); self.vertex_count()];

        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let pa = Vector3::from(self.vertex(a));
            let pb = Vector3::from(self.vertex(b));
            let pc = Vector3::from(self.vertex(c));
            let face = (pb - pa).cross(&(pc - pa));
            accum[a] += face;
            accum[b] += face;
            accum[c] += face;
        }

        self.normals.clear();
        for n in accum {
            let n = n.try_normalize(1e-12).unwrap_or_else(Vector3::y);
            self.normals.extend_from_slice(&[n.x, n.y, n.z]);
        }
    }

    /// Compact binary frame: vertex count, index count, positions, normals,
    /// indices, all little endian.
    pub fn to_binary(&self) -> Vec<u8> {
        let num_vertices = self.vertex_count() as u32;
        let num_indices = self.indices.len() as u32;

        let mut data = Vec::with_capacity(8 + self.positions.len() * 8 + self.indices.len() * 4);
        data.extend_from_slice(&num_vertices.to_le_bytes());
        data.extend_from_slice(&num_indices.to_le_bytes());

        for &p in &self.positions {
            data.extend_from_slice(&p.to_le_bytes());
        }
        for &n in &self.normals {
            data.extend_from_slice(&n.to_le_bytes());
        }
        for &i in &self.indices {
            data.extend_from_slice(&i.to_le_bytes());
        }

        data
    }
}

/// Canonical untransformed solid for a primitive kind.
pub fn base_solid(kind: PrimitiveKind, config: &MeshConfig) -> MeshData {
    let segments = config.circular_segments.max(3);
    match kind {
        PrimitiveKind::Sphere => procedural_sphere(SPHERE_RADIUS, segments),
        PrimitiveKind::Box => procedural_box(BOX_SIZE, BOX_SIZE, BOX_SIZE),
        PrimitiveKind::Cylinder => procedural_cylinder(CYLINDER_RADIUS, CYLINDER_HEIGHT, segments),
        PrimitiveKind::Cone => procedural_cone(CONE_RADIUS, CONE_HEIGHT, segments),
        PrimitiveKind::Torus => {
            procedural_torus(TORUS_MAJOR_RADIUS, TORUS_MINOR_RADIUS, segments, segments / 2)
        }
    }
}

// ============================================================================
// Procedural generators
// ============================================================================

fn procedural_box(w: f32, h: f32, d: f32) -> MeshData {
    let mut mesh = MeshData::new();
    let hw = w / 2.0;
    let hh = h / 2.0;
    let hd = d / 2.0;

    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([1.0, 0.0, 0.0], [[hw, -hh, hd], [hw, -hh, -hd], [hw, hh, -hd], [hw, hh, hd]]),
        ([-1.0, 0.0, 0.0], [[-hw, -hh, -hd], [-hw, -hh, hd], [-hw, hh, hd], [-hw, hh, -hd]]),
        ([0.0, 1.0, 0.0], [[-hw, hh, hd], [hw, hh, hd], [hw, hh, -hd], [-hw, hh, -hd]]),
        ([0.0, -1.0, 0.0], [[-hw, -hh, -hd], [hw, -hh, -hd], [hw, -hh, hd], [-hw, -hh, hd]]),
        ([0.0, 0.0, 1.0], [[-hw, -hh, hd], [hw, -hh, hd], [hw, hh, hd], [-hw, hh, hd]]),
        ([0.0, 0.0, -1.0], [[hw, -hh, -hd], [-hw, -hh, -hd], [-hw, hh, -hd], [hw, hh, -hd]]),
    ];

    for (normal, verts) in faces {
        let v0 = mesh.add_vertex(verts[0], normal);
        let v1 = mesh.add_vertex(verts[1], normal);
        let v2 = mesh.add_vertex(verts[2], normal);
        let v3 = mesh.add_vertex(verts[3], normal);
        mesh.add_triangle(v0, v1, v2);
        mesh.add_triangle(v0, v2, v3);
    }

    mesh
}

fn procedural_sphere(radius: f32, segments: usize) -> MeshData {
    let mut mesh = MeshData::new();
    let stacks = (segments / 2).max(2);
    let slices = segments;

    let mut rings: Vec<Vec<u32>> = Vec::with_capacity(stacks + 1);
    for i in 0..=stacks {
        let phi = PI * (i as f32 / stacks as f32);
        let (sin_phi, cos_phi) = phi.sin_cos();

        let mut ring = Vec::with_capacity(slices + 1);
        for j in 0..=slices {
            let theta = 2.0 * PI * (j as f32 / slices as f32);
            let (sin_theta, cos_theta) = theta.sin_cos();
            let normal = [sin_phi * cos_theta, cos_phi, -sin_phi * sin_theta];
            ring.push(mesh.add_vertex(
                [radius * normal[0], radius * normal[1], radius * normal[2]],
                normal,
            ));
        }
        rings.push(ring);
    }

    for i in 0..stacks {
        for j in 0..slices {
            let (v0, v1, v2, v3) = (rings[i][j], rings[i][j + 1], rings[i + 1][j + 1], rings[i + 1][j]);
            if i != 0 {
                mesh.add_triangle(v0, v2, v1);
            }
            if i != stacks - 1 {
                mesh.add_triangle(v0, v3, v2);
            }
        }
    }

    mesh
}

/// Side wall plus two caps; `top_radius == 0` gives a cone.
fn procedural_frustum(bottom_r: f32, top_r: f32, height: f32, segments: usize) -> MeshData {
    let mut mesh = MeshData::new();
    let half = height / 2.0;
    // Side normals tilt toward +Y as the wall narrows
    let slope = (bottom_r - top_r) / height;

    let mut bottom_ring = Vec::with_capacity(segments);
    let mut top_ring = Vec::with_capacity(segments);
    for i in 0..segments {
        let angle = (i as f32 / segments as f32) * 2.0 * PI;
        let (s, c) = angle.sin_cos();
        let n = Vector3::new(c, slope, -s).normalize();
        let normal = [n.x, n.y, n.z];
        bottom_ring.push(mesh.add_vertex([bottom_r * c, -half, -bottom_r * s], normal));
        top_ring.push(mesh.add_vertex([top_r * c, half, -top_r * s], normal));
    }
    for i in 0..segments {
        let next = (i + 1) % segments;
        mesh.add_triangle(bottom_ring[i], bottom_ring[next], top_ring[next]);
        if top_r > 0.0 {
            mesh.add_triangle(bottom_ring[i], top_ring[next], top_ring[i]);
        }
    }

    let mut caps = vec![(bottom_r, -half, -1.0f32)];
    if top_r > 0.0 {
        caps.push((top_r, half, 1.0));
    }
    for (r, y, ny) in caps {
        let center = mesh.add_vertex([0.0, y, 0.0], [0.0, ny, 0.0]);
        let mut rim = Vec::with_capacity(segments);
        for i in 0..segments {
            let angle = (i as f32 / segments as f32) * 2.0 * PI;
            rim.push(mesh.add_vertex([r * angle.cos(), y, -r * angle.sin()], [0.0, ny, 0.0]));
        }
        for i in 0..segments {
            let next = (i + 1) % segments;
            if ny > 0.0 {
                mesh.add_triangle(center, rim[i], rim[next]);
            } else {
                mesh.add_triangle(center, rim[next], rim[i]);
            }
        }
    }

    mesh
}

fn procedural_cylinder(radius: f32, height: f32, segments: usize) -> MeshData {
    procedural_frustum(radius, radius, height, segments)
}

fn procedural_cone(radius: f32, height: f32, segments: usize) -> MeshData {
    procedural_frustum(radius, 0.0, height, segments)
}

/// Ring lying in the XZ plane.
fn procedural_torus(major: f32, minor: f32, radial: usize, tubular_sides: usize) -> MeshData {
    let mut mesh = MeshData::new();
    let sides = tubular_sides.max(3);

    let mut grid: Vec<Vec<u32>> = Vec::with_capacity(radial + 1);
    for i in 0..=radial {
        let u = 2.0 * PI * (i as f32 / radial as f32);
        let (su, cu) = u.sin_cos();
        let mut row = Vec::with_capacity(sides + 1);
        for j in 0..=sides {
            let v = 2.0 * PI * (j as f32 / sides as f32);
            let (sv, cv) = v.sin_cos();
            let normal = [cv * cu, sv, -cv * su];
            let ring_r = major + minor * cv;
            row.push(mesh.add_vertex([ring_r * cu, minor * sv, -ring_r * su], normal));
        }
        grid.push(row);
    }

    for i in 0..radial {
        for j in 0..sides {
            let (a, b, c, d) = (grid[i][j], grid[i + 1][j], grid[i + 1][j + 1], grid[i][j + 1]);
            mesh.add_triangle(a, b, c);
            mesh.add_triangle(a, c, d);
        }
    }

    mesh
}
