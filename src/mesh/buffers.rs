//! Packed runtime buffers.
//!
//! Flattens a decoded [`Mesh`](super::Mesh) into the byte buffers a
//! renderer uploads directly: one interleaved vertex buffer, one
//! little-endian `u32` index buffer, and per-surface draw ranges into it.

use glam::{Vec2, Vec3};

use super::skin::SkinBanks;
use super::{Mesh, Surface, SurfaceVert};

/// The interleaved vertex layout shared by every vertex in a packed mesh.
///
/// Attributes appear in declaration order with no padding: position,
/// normal, `color_layers` colors, `uv_layers` uvs, `weight_count` skin
/// weights. The weight slots cover the largest bank, so every surface's
/// vertices share one stride; verts in smaller banks pad with zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexFormat {
    /// Active color layers (3 floats each).
    pub color_layers: u32,
    /// Active uv layers (2 floats each).
    pub uv_layers: u32,
    /// Skin-weight slots (1 float each); 0 for unskinned meshes.
    pub weight_count: u32,
}

impl VertexFormat {
    /// Derive the format a mesh packs with.
    pub fn for_mesh(mesh: &Mesh) -> Self {
        let weight_count = mesh
            .skin_banks
            .banks
            .iter()
            .map(|b| b.bones.len())
            .max()
            .unwrap_or(0) as u32;
        Self {
            color_layers: mesh.color_layer_count,
            uv_layers: mesh.uv_layer_count,
            weight_count,
        }
    }

    /// Bytes per packed vertex.
    pub fn stride(&self) -> u32 {
        12 + 12 + self.color_layers * 12 + self.uv_layers * 8 + self.weight_count * 4
    }
}

/// One surface's slice of the packed index buffer.
///
/// Carries the index of the source surface rather than a reference into
/// the mesh, so ranges stay valid wherever the buffers travel; resolve it
/// through the mesh the buffers were packed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    /// Index into [`Mesh::surfaces`].
    pub surface: usize,
    /// First index-buffer entry.
    pub start: u32,
    /// Number of index-buffer entries.
    pub count: u32,
}

/// Upload-ready buffers packed from a mesh.
#[derive(Debug, Clone)]
pub struct MeshBuffers {
    /// Layout of `vertex_data`.
    pub format: VertexFormat,
    /// Interleaved vertex bytes, [`VertexFormat::stride`] apart.
    pub vertex_data: Vec<u8>,
    /// Little-endian `u32` indices into the packed vertex buffer.
    pub index_data: Vec<u8>,
    /// One range per surface, in surface order.
    pub ranges: Vec<DrawRange>,
    /// Bank partition the weight slots were packed against.
    pub skin_banks: SkinBanks,
}

impl MeshBuffers {
    /// Pack a mesh.
    ///
    /// Vertices are deduplicated per surface, not across surfaces: each
    /// surface's vert table appends to the vertex buffer at a running base
    /// offset, and its corners are rebased onto that offset.
    pub fn pack(mesh: &Mesh) -> Self {
        let format = VertexFormat::for_mesh(mesh);
        let floats_per_vert = (format.stride() / 4) as usize;

        let vert_total: usize = mesh.surfaces.iter().map(|s| s.verts.len()).sum();
        let mut vertex_floats: Vec<f32> = Vec::with_capacity(vert_total * floats_per_vert);
        let index_total: usize = mesh.surfaces.iter().map(|s| s.corners.len()).sum();
        let mut index_data: Vec<u8> = Vec::with_capacity(index_total * 4);
        let mut ranges = Vec::with_capacity(mesh.surfaces.len());

        let mut base = 0u32;
        for (i, surf) in mesh.surfaces.iter().enumerate() {
            for vert in &surf.verts {
                pack_vert(mesh, surf, vert, &format, &mut vertex_floats);
            }
            let start = (index_data.len() / 4) as u32;
            for &corner in &surf.corners {
                index_data.extend_from_slice(&(base + corner).to_le_bytes());
            }
            ranges.push(DrawRange {
                surface: i,
                start,
                count: surf.corners.len() as u32,
            });
            base += surf.verts.len() as u32;
        }

        Self {
            format,
            vertex_data: bytemuck::cast_slice(&vertex_floats).to_vec(),
            index_data,
            ranges,
            skin_banks: mesh.skin_banks.clone(),
        }
    }

    /// Number of packed vertices.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_data.len() as u32 / self.format.stride()
    }

    /// Number of packed indices.
    pub fn index_count(&self) -> u32 {
        (self.index_data.len() / 4) as u32
    }
}

fn pack_vert(
    mesh: &Mesh,
    surf: &Surface,
    vert: &SurfaceVert,
    format: &VertexFormat,
    out: &mut Vec<f32>,
) {
    push_vec3(out, mesh.positions[vert.pos as usize]);
    push_vec3(out, mesh.normals[vert.norm as usize]);
    for layer in 0..format.color_layers as usize {
        push_vec3(out, mesh.colors[vert.color[layer] as usize]);
    }
    for layer in 0..format.uv_layers as usize {
        push_vec2(out, mesh.uvs[vert.uv[layer] as usize]);
    }
    if format.weight_count > 0 {
        let bank = &mesh.skin_banks.banks[surf.skin_bank as usize];
        let binds = &mesh.skins[vert.skin as usize];
        for slot in 0..format.weight_count as usize {
            let weight = bank
                .bones
                .get(slot)
                .and_then(|&bone| binds.iter().find(|b| b.bone == bone))
                .map_or(0.0, |b| b.weight);
            out.push(weight);
        }
    }
}

fn push_vec3(out: &mut Vec<f32>, v: Vec3) {
    out.extend_from_slice(&[v.x, v.y, v.z]);
}

fn push_vec2(out: &mut Vec<f32>, v: Vec2) {
    out.extend_from_slice(&[v.x, v.y]);
}
