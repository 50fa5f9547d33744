//! Procedural geometry for the scene pass.
//!
//! The scene is static, so every object's transform is baked into the
//! vertices and the whole scene is one indexed draw.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::lighting::LightMarker;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub colour: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Per-instance data for a light marker cube.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MarkerInstance {
    pub position: [f32; 3],
    pub scale: f32,
    pub colour: [f32; 3],
    pub _padding: f32,
}

impl MarkerInstance {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![3 => Float32x3, 4 => Float32, 5 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MarkerInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

impl From<&LightMarker> for MarkerInstance {
    fn from(marker: &LightMarker) -> Self {
        Self {
            position: marker.position.to_array(),
            scale: marker.scale,
            colour: marker.colour.to_array(),
            _padding: 0.0,
        }
    }
}

/// Indexed triangle list.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Axis-aligned box from its centre and half extents.
    pub fn push_box(&mut self, centre: Vec3, half: Vec3, colour: [f32; 3]) {
        // (normal, tangent u, tangent v) per face
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ];

        for (normal, u, v) in FACES {
            let (n, u, v) = (Vec3::from(normal), Vec3::from(u), Vec3::from(v));
            let base = self.vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = centre + (n + u * su + v * sv) * half;
                self.vertices.push(Vertex {
                    position: p.to_array(),
                    normal,
                    colour,
                });
            }
            self.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
    }
}

/// Ground, walls behind the fixed windows and a few crates.
pub fn create_scene_geometry() -> MeshData {
    let mut mesh = MeshData::default();

    // Ground
    mesh.push_box(Vec3::new(0.0, -1.0, 0.0), Vec3::new(150.0, 1.0, 150.0), [0.45, 0.5, 0.4]);

    // Back wall behind the square window, side wall behind the other four
    mesh.push_box(Vec3::new(0.0, 15.0, -56.0), Vec3::new(25.0, 15.0, 1.0), [0.7, 0.65, 0.6]);
    mesh.push_box(Vec3::new(-66.0, 15.0, 0.0), Vec3::new(1.0, 15.0, 32.0), [0.7, 0.65, 0.6]);

    // Crates
    let crate_colour = [0.6, 0.42, 0.25];
    for (x, z, size) in [(10.0, 10.0, 6.0), (-20.0, 25.0, 8.0), (25.0, -20.0, 5.0), (-35.0, -30.0, 7.0)] {
        mesh.push_box(Vec3::new(x, size, z), Vec3::splat(size), crate_colour);
    }
    // Stacked crate
    mesh.push_box(Vec3::new(-20.0, 20.0, 25.0), Vec3::splat(4.0), crate_colour);

    mesh
}

/// Unit cube (half extent 0.5) drawn once per light marker.
pub fn create_marker_geometry() -> MeshData {
    let mut mesh = MeshData::default();
    mesh.push_box(Vec3::ZERO, Vec3::splat(0.5), [1.0, 1.0, 1.0]);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_counts() {
        let mesh = create_marker_geometry();
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
    }

    #[test]
    fn test_box_extents() {
        let mut mesh = MeshData::default();
        mesh.push_box(Vec3::new(10.0, 0.0, 0.0), Vec3::new(1.0, 2.0, 3.0), [1.0; 3]);
        for v in &mesh.vertices {
            let p = Vec3::from(v.position) - Vec3::new(10.0, 0.0, 0.0);
            assert!((p.x.abs() - 1.0).abs() < 1e-6);
            assert!((p.y.abs() - 2.0).abs() < 1e-6);
            assert!((p.z.abs() - 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normals_point_outwards() {
        let mesh = create_marker_geometry();
        for v in &mesh.vertices {
            let n = Vec3::from(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-6);
            assert!(Vec3::from(v.position).dot(n) > 0.0);
        }
    }

    #[test]
    fn test_scene_indices_in_range() {
        let mesh = create_scene_geometry();
        let count = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
        assert_eq!(mesh.indices.len() % 3, 0);
    }

    #[test]
    fn test_vertex_layout_sizes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
        assert_eq!(std::mem::size_of::<MarkerInstance>(), 32);
    }
}
