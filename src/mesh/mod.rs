//! Intermediate mesh representation compiled from the authoring tool.
//!
//! This module provides:
//! - [`Topology`] - the requested primitive assembly mode
//! - [`Mesh`] - attribute arrays, materials, skinning and surfaces
//! - [`Surface`] / [`SurfaceVert`] - per-island deduplicated index records
//! - [`SkinBanks`] - the bounded bone-bank partition (see [`skin`])
//! - [`MeshBuffers`] / [`VertexFormat`] - the packed runtime buffers
//!
//! # Wire schema
//!
//! After a compile request is acknowledged with `OK`, the peer streams the
//! mesh as fixed little-endian records in this order:
//!
//! 1. positions: count-prefixed 3-float vectors
//! 2. normals: count-prefixed 3-float vectors
//! 3. color layer count (max 4), then one count-prefixed color array
//!    shared by all layers (present only when the layer count is nonzero)
//! 4. uv layer count (max 8), then one count-prefixed uv array (ditto)
//! 5. bone names: count-prefixed name lines
//! 6. if bones are present: skin sets (count-prefixed groups of 8-byte
//!    bone/weight binds) and count-prefixed contiguous-set vert counts
//! 7. material sets: count-prefixed groups of count-prefixed materials
//! 8. cumulative AABB min and max
//! 9. surfaces: count-prefixed; each surface is a header (centroid,
//!    material index, AABB, reflection normal) followed by per-corner
//!    attribute index tuples in degenerate tri-strip order, terminated by
//!    a `0xFFFFFFFF` position index
//!
//! Every index is validated against its target array while decoding; a
//! violation poisons the whole mesh (the stream has no resync point).

pub mod buffers;
pub mod material;
pub mod skin;

pub use buffers::{DrawRange, MeshBuffers, VertexFormat};
pub use material::Material;
pub use skin::{Bank, SkinBanks, SkinBind, LOCAL_INDEX_NONE};

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use glam::{Vec2, Vec3};

use crate::decode::{self, ReadRecord};
use crate::error::{BridgeError, BridgeResult};
use crate::transport::Transport;

/// Maximum vertex color layers a mesh can carry.
pub const MAX_COLOR_LAYERS: usize = 4;
/// Maximum uv layers a mesh can carry.
pub const MAX_UV_LAYERS: usize = 8;

/// Position-index sentinel ending a surface's corner stream.
const CORNER_SENTINEL: u32 = u32::MAX;

/// Primitive assembly mode requested from the peer.
///
/// The mode is part of the compile request and selects how the peer joins
/// primitives; either way each surface arrives as one corner stream with
/// degenerate corners joining the strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// Independent triangles.
    #[default]
    Triangles,
    /// Triangle strips (degenerate-joined).
    TriStrips,
}

impl Topology {
    /// Request token for this mode.
    pub fn token(self) -> &'static str {
        match self {
            Self::Triangles => "TRIANGLES",
            Self::TriStrips => "TRISTRIPS",
        }
    }
}

/// One corner record after deduplication: a tuple of indices into the
/// parent mesh's attribute arrays.
///
/// Equality and hashing cover every attribute index *except* `bank_skin`,
/// which is assigned only after the surface's bank is resolved: corners
/// identical up to the bank-local index merge, and the merged vert gets
/// its bank-local index once.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceVert {
    /// Index into [`Mesh::positions`].
    pub pos: u32,
    /// Index into [`Mesh::normals`].
    pub norm: u32,
    /// Per-layer indices into [`Mesh::colors`]; unused layers hold `u32::MAX`.
    pub color: [u32; MAX_COLOR_LAYERS],
    /// Per-layer indices into [`Mesh::uvs`]; unused layers hold `u32::MAX`.
    pub uv: [u32; MAX_UV_LAYERS],
    /// Index into [`Mesh::skins`], or `u32::MAX` for unskinned meshes.
    pub skin: u32,
    /// Bank-local skin-set index, assigned after bank resolution.
    pub bank_skin: u32,
}

impl PartialEq for SurfaceVert {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos
            && self.norm == other.norm
            && self.color == other.color
            && self.uv == other.uv
            && self.skin == other.skin
    }
}

impl Eq for SurfaceVert {}

impl Hash for SurfaceVert {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pos.hash(state);
        self.norm.hash(state);
        self.color.hash(state);
        self.uv.hash(state);
        self.skin.hash(state);
    }
}

/// One island of geometry sharing a material and a skin bank.
#[derive(Debug, Clone)]
pub struct Surface {
    /// Island centroid.
    pub centroid: Vec3,
    /// Slot into every material set.
    pub material: u32,
    /// Island-local AABB minimum.
    pub aabb_min: Vec3,
    /// Island-local AABB maximum.
    pub aabb_max: Vec3,
    /// Dominant normal used for reflection mapping.
    pub reflection_normal: Vec3,
    /// Index into [`Mesh::skin_banks`]; 0 for unskinned meshes.
    pub skin_bank: u32,
    /// Deduplicated vert table.
    pub verts: Vec<SurfaceVert>,
    /// Corner stream as indices into `verts`, in strip order.
    pub corners: Vec<u32>,
}

/// Intermediate mesh representation prepared by the authoring tool from a
/// single mesh object (or a merged group of them).
///
/// Constructed once per compile request and immutable afterwards; the
/// derived contiguous-skinning layout produces a new mesh rather than
/// mutating this one.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Primitive mode the compile was requested with.
    pub topology: Topology,
    /// Cumulative AABB minimum.
    pub aabb_min: Vec3,
    /// Cumulative AABB maximum.
    pub aabb_max: Vec3,
    /// Alternate material assignments sharing the surface topology.
    pub material_sets: Vec<Vec<Material>>,
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Vertex normals.
    pub normals: Vec<Vec3>,
    /// Number of active color layers (≤ [`MAX_COLOR_LAYERS`]).
    pub color_layer_count: u32,
    /// Color values shared by all color layers.
    pub colors: Vec<Vec3>,
    /// Number of active uv layers (≤ [`MAX_UV_LAYERS`]).
    pub uv_layer_count: u32,
    /// Texture coordinates shared by all uv layers.
    pub uvs: Vec<Vec2>,
    /// Bone names indexed by [`SkinBind::bone`].
    pub bone_names: Vec<String>,
    /// Flat table of skin sets indexed by [`SurfaceVert::skin`].
    pub skins: Vec<Vec<SkinBind>>,
    /// Vert counts per contiguous skin set, as reported by the peer.
    pub contiguous_skin_vert_counts: Vec<u32>,
    /// Geometry islands in decode order.
    pub surfaces: Vec<Surface>,
    /// Skin-bank partition built while decoding surfaces.
    pub skin_banks: SkinBanks,
}

impl Mesh {
    /// Whether this mesh carries skinning data.
    pub fn is_skinned(&self) -> bool {
        !self.bone_names.is_empty()
    }

    /// Decode a mesh record stream.
    ///
    /// `progress` runs synchronously after each completed surface with the
    /// number of surfaces decoded so far.
    pub(crate) fn read(
        t: &mut dyn Transport,
        topology: Topology,
        skin_slot_budget: usize,
        progress: &mut dyn FnMut(usize),
    ) -> BridgeResult<Self> {
        let positions: Vec<Vec3> = decode::read_seq(t, "position")?;
        let normals: Vec<Vec3> = decode::read_seq(t, "normal")?;

        let color_layer_count = read_layer_count(t, "color", MAX_COLOR_LAYERS)?;
        let colors: Vec<Vec3> = if color_layer_count > 0 {
            decode::read_seq(t, "color")?
        } else {
            Vec::new()
        };

        let uv_layer_count = read_layer_count(t, "uv", MAX_UV_LAYERS)?;
        let uvs: Vec<Vec2> = if uv_layer_count > 0 {
            decode::read_seq(t, "uv")?
        } else {
            Vec::new()
        };

        let bone_count = decode::read_count(t, "bone name")?;
        let mut bone_names = Vec::with_capacity(bone_count as usize);
        for _ in 0..bone_count {
            bone_names.push(decode::read_name(t)?);
        }

        let (skins, contiguous_skin_vert_counts) = if bone_count > 0 {
            let set_count = decode::read_count(t, "skin set")?;
            let mut skins: Vec<Vec<SkinBind>> = Vec::with_capacity(set_count as usize);
            for _ in 0..set_count {
                let set: Vec<SkinBind> = decode::read_seq(t, "skin bind")?;
                for bind in &set {
                    check_index("skin bind bone", bind.bone, bone_names.len())?;
                }
                skins.push(set);
            }
            let counts: Vec<u32> = decode::read_seq(t, "contiguous vert count")?;
            (skins, counts)
        } else {
            (Vec::new(), Vec::new())
        };

        let set_count = decode::read_count(t, "material set")?;
        let mut material_sets = Vec::with_capacity(set_count as usize);
        for _ in 0..set_count {
            let mats: Vec<Material> = decode::read_seq(t, "material")?;
            material_sets.push(mats);
        }

        let aabb_min = Vec3::read(t)?;
        let aabb_max = Vec3::read(t)?;

        let surface_count = decode::read_count(t, "surface")?;
        let ctx = SurfaceContext {
            color_layer_count,
            uv_layer_count,
            pos_len: positions.len(),
            norm_len: normals.len(),
            color_len: colors.len(),
            uv_len: uvs.len(),
            skins: &skins,
            skin_slot_budget,
        };
        let mut skin_banks = SkinBanks::default();
        let mut surfaces = Vec::with_capacity(surface_count as usize);
        for i in 0..surface_count as usize {
            surfaces.push(read_surface(t, i, &ctx, &mut skin_banks)?);
            progress(i + 1);
        }

        log::debug!(
            "decoded mesh: {} positions, {} surfaces, {} skin banks",
            positions.len(),
            surfaces.len(),
            skin_banks.banks.len()
        );

        Ok(Self {
            topology,
            aabb_min,
            aabb_max,
            material_sets,
            positions,
            normals,
            color_layer_count,
            colors,
            uv_layer_count,
            uvs,
            bone_names,
            skins,
            contiguous_skin_vert_counts,
            surfaces,
            skin_banks,
        })
    }

    /// Derive the contiguous-skinning layout: the same geometry with skin
    /// sets renumbered into one flat, bank-free table.
    ///
    /// Used when a consumer needs a single skin layout instead of per-draw
    /// banks (CPU skinning, formats without a hardware slot limit). Every
    /// `(bone, weight)` pair is preserved and bone indices are untouched;
    /// only the skin-set indices referenced by verts are renumbered, in
    /// first-use order across surfaces.
    pub fn contiguous_skinning_version(&self) -> Mesh {
        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut new_skins: Vec<Vec<SkinBind>> = Vec::new();
        let mut vert_counts: Vec<u32> = Vec::new();

        let mut surfaces = self.surfaces.clone();
        for surf in &mut surfaces {
            for vert in &mut surf.verts {
                if vert.skin == u32::MAX {
                    continue;
                }
                let next = new_skins.len() as u32;
                let new = *remap.entry(vert.skin).or_insert_with(|| {
                    new_skins.push(self.skins[vert.skin as usize].clone());
                    vert_counts.push(0);
                    next
                });
                vert_counts[new as usize] += 1;
                vert.skin = new;
                // Flat layout: the bank-local index is the global one.
                vert.bank_skin = new;
            }
            surf.skin_bank = 0;
        }

        let skin_banks = if new_skins.is_empty() {
            SkinBanks::default()
        } else {
            SkinBanks::single_bank(&new_skins)
        };

        Mesh {
            topology: self.topology,
            aabb_min: self.aabb_min,
            aabb_max: self.aabb_max,
            material_sets: self.material_sets.clone(),
            positions: self.positions.clone(),
            normals: self.normals.clone(),
            color_layer_count: self.color_layer_count,
            colors: self.colors.clone(),
            uv_layer_count: self.uv_layer_count,
            uvs: self.uvs.clone(),
            bone_names: self.bone_names.clone(),
            skins: new_skins,
            contiguous_skin_vert_counts: vert_counts,
            surfaces,
            skin_banks,
        }
    }
}

struct SurfaceContext<'a> {
    color_layer_count: u32,
    uv_layer_count: u32,
    pos_len: usize,
    norm_len: usize,
    color_len: usize,
    uv_len: usize,
    skins: &'a [Vec<SkinBind>],
    skin_slot_budget: usize,
}

fn read_layer_count(t: &mut dyn Transport, what: &str, max: usize) -> BridgeResult<u32> {
    let count = decode::read_u32(t)?;
    if count as usize > max {
        return Err(BridgeError::MalformedRecord(format!(
            "{what} layer count {count} exceeds maximum {max}"
        )));
    }
    Ok(count)
}

fn check_index(what: &str, index: u32, len: usize) -> BridgeResult<()> {
    if (index as usize) < len {
        Ok(())
    } else {
        Err(BridgeError::MalformedRecord(format!(
            "{what} index {index} out of range ({len} entries)"
        )))
    }
}

fn read_surface(
    t: &mut dyn Transport,
    index: usize,
    ctx: &SurfaceContext<'_>,
    banks: &mut SkinBanks,
) -> BridgeResult<Surface> {
    let centroid = Vec3::read(t)?;
    let material = decode::read_u32(t)?;
    let aabb_min = Vec3::read(t)?;
    let aabb_max = Vec3::read(t)?;
    let reflection_normal = Vec3::read(t)?;

    let skinned = !ctx.skins.is_empty();
    let mut verts: Vec<SurfaceVert> = Vec::new();
    let mut corners: Vec<u32> = Vec::new();
    let mut dedup: HashMap<SurfaceVert, u32> = HashMap::new();
    let mut skin_sets: Vec<u32> = Vec::new();

    loop {
        let pos = decode::read_u32(t)?;
        if pos == CORNER_SENTINEL {
            break;
        }
        check_index("position", pos, ctx.pos_len)?;

        let norm = decode::read_u32(t)?;
        check_index("normal", norm, ctx.norm_len)?;

        let mut color = [u32::MAX; MAX_COLOR_LAYERS];
        for slot in color.iter_mut().take(ctx.color_layer_count as usize) {
            let c = decode::read_u32(t)?;
            check_index("color", c, ctx.color_len)?;
            *slot = c;
        }

        let mut uv = [u32::MAX; MAX_UV_LAYERS];
        for slot in uv.iter_mut().take(ctx.uv_layer_count as usize) {
            let u = decode::read_u32(t)?;
            check_index("uv", u, ctx.uv_len)?;
            *slot = u;
        }

        let skin = if skinned {
            let s = decode::read_u32(t)?;
            check_index("skin set", s, ctx.skins.len())?;
            if !skin_sets.contains(&s) {
                skin_sets.push(s);
            }
            s
        } else {
            u32::MAX
        };

        let vert = SurfaceVert {
            pos,
            norm,
            color,
            uv,
            skin,
            bank_skin: u32::MAX,
        };
        let next = verts.len() as u32;
        let slot = *dedup.entry(vert).or_insert_with(|| {
            verts.push(vert);
            next
        });
        corners.push(slot);
    }

    let skin_bank = if skinned {
        let bank_index = banks.add_surface(ctx.skins, &skin_sets, ctx.skin_slot_budget, index)?;
        let bank = &banks.banks[bank_index];
        for vert in &mut verts {
            vert.bank_skin = bank.lookup_local_skin_set(vert.skin);
        }
        bank_index as u32
    } else {
        0
    };

    Ok(Surface {
        centroid,
        material,
        aabb_min,
        aabb_max,
        reflection_normal,
        skin_bank,
        verts,
        corners,
    })
}
