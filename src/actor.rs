//! Actor records: armatures, mesh subtypes and authored actions.
//!
//! An actor bundles everything a character needs beyond its meshes: bone
//! hierarchies, the subtype table binding mesh assets to armatures, and
//! the keyframed actions authored against those armatures. The whole
//! bundle arrives as one record stream in response to `ACTORCOMPILE`.

use glam::{Vec3, Vec4};

use crate::decode::{self, ReadRecord};
use crate::error::{BridgeError, BridgeResult};
use crate::transport::Transport;

/// One bone in an armature hierarchy.
#[derive(Debug, Clone)]
pub struct Bone {
    /// Bone name as authored.
    pub name: String,
    /// Head position in armature space.
    pub origin: Vec3,
    /// Index of the parent bone, or `-1` for a root.
    pub parent: i32,
    /// Indices of child bones.
    pub children: Vec<i32>,
}

impl ReadRecord for Bone {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        Ok(Self {
            name: decode::read_name(t)?,
            origin: Vec3::read(t)?,
            parent: decode::read_i32(t)?,
            children: decode::read_seq(t, "bone child")?,
        })
    }
}

/// A named bone hierarchy.
#[derive(Debug, Clone)]
pub struct Armature {
    /// Armature name as authored.
    pub name: String,
    /// Bones in table order; parent/child links index this list.
    pub bones: Vec<Bone>,
}

impl Armature {
    /// Find a bone by name.
    pub fn lookup_bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }
}

impl ReadRecord for Armature {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        let name = decode::read_name(t)?;
        let bones: Vec<Bone> = decode::read_seq(t, "bone")?;
        for bone in &bones {
            check_bone_link(&name, bone.parent, bones.len())?;
            for &child in &bone.children {
                check_bone_link(&name, child, bones.len())?;
            }
        }
        Ok(Self { name, bones })
    }
}

fn check_bone_link(armature: &str, index: i32, len: usize) -> BridgeResult<()> {
    if index == -1 || (0..len as i32).contains(&index) {
        Ok(())
    } else {
        Err(BridgeError::MalformedRecord(format!(
            "bone link {index} out of range in armature '{armature}' ({len} bones)"
        )))
    }
}

/// One mesh variant of an actor, bound to an armature.
#[derive(Debug, Clone)]
pub struct Subtype {
    /// Subtype name as authored.
    pub name: String,
    /// Asset path of the subtype's base mesh.
    pub mesh_path: String,
    /// Index into [`Actor::armatures`], or `-1` when unbound.
    pub armature: i32,
    /// Overlay meshes as `(overlay name, asset path)` pairs.
    pub overlay_meshes: Vec<(String, String)>,
}

impl ReadRecord for Subtype {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        let name = decode::read_name(t)?;
        let mesh_path = decode::read_name(t)?;
        let armature = decode::read_i32(t)?;
        let overlay_count = decode::read_count(t, "overlay mesh")?;
        let mut overlay_meshes = Vec::with_capacity(overlay_count as usize);
        for _ in 0..overlay_count {
            let overlay_name = decode::read_name(t)?;
            let overlay_path = decode::read_name(t)?;
            overlay_meshes.push((overlay_name, overlay_path));
        }
        Ok(Self {
            name,
            mesh_path,
            armature,
            overlay_meshes,
        })
    }
}

/// Attribute-mask bit for rotation keys.
const ATTR_ROTATE: u32 = 1;
/// Attribute-mask bit for translation keys.
const ATTR_TRANSLATE: u32 = 2;
/// Attribute-mask bit for scale keys.
const ATTR_SCALE: u32 = 4;

/// One keyframe on an action channel.
///
/// Only the attributes named by the channel's mask are present.
#[derive(Debug, Clone, Copy)]
pub struct ActionKey {
    /// Rotation quaternion (w, x, y, z), if the channel rotates.
    pub rotation: Option<Vec4>,
    /// Translation, if the channel translates.
    pub position: Option<Vec3>,
    /// Scale, if the channel scales.
    pub scale: Option<Vec3>,
}

impl ActionKey {
    fn read(t: &mut dyn Transport, attr_mask: u32) -> BridgeResult<Self> {
        let rotation = if attr_mask & ATTR_ROTATE != 0 {
            Some(Vec4::read(t)?)
        } else {
            None
        };
        let position = if attr_mask & ATTR_TRANSLATE != 0 {
            Some(Vec3::read(t)?)
        } else {
            None
        };
        let scale = if attr_mask & ATTR_SCALE != 0 {
            Some(Vec3::read(t)?)
        } else {
            None
        };
        Ok(Self {
            rotation,
            position,
            scale,
        })
    }
}

/// All keys an action holds for one bone.
#[derive(Debug, Clone)]
pub struct ActionChannel {
    /// Target bone name, resolved against the subtype's armature.
    pub bone_name: String,
    /// Bitmask of animated attributes.
    pub attr_mask: u32,
    /// One key per frame in [`Action::frames`] order.
    pub keys: Vec<ActionKey>,
}

impl ReadRecord for ActionChannel {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        let bone_name = decode::read_name(t)?;
        let attr_mask = decode::read_u32(t)?;
        let key_count = decode::read_count(t, "action key")?;
        let mut keys = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            keys.push(ActionKey::read(t, attr_mask)?);
        }
        Ok(Self {
            bone_name,
            attr_mask,
            keys,
        })
    }
}

/// One authored action.
#[derive(Debug, Clone)]
pub struct Action {
    /// Action name as authored.
    pub name: String,
    /// Seconds per frame.
    pub interval: f32,
    /// Whether the action layers additively over the rest pose.
    pub additive: bool,
    /// Frame numbers holding keys, ascending.
    pub frames: Vec<i32>,
    /// Per-bone key channels.
    pub channels: Vec<ActionChannel>,
    /// Motion AABB per subtype, as `(min, max)`.
    pub subtype_aabbs: Vec<(Vec3, Vec3)>,
}

impl ReadRecord for Action {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        let name = decode::read_name(t)?;
        let interval = decode::read_f32(t)?;
        let additive = decode::read_u32(t)? != 0;
        let frames: Vec<i32> = decode::read_seq(t, "action frame")?;
        let channels: Vec<ActionChannel> = decode::read_seq(t, "action channel")?;
        for channel in &channels {
            if channel.keys.len() != frames.len() {
                return Err(BridgeError::MalformedRecord(format!(
                    "channel '{}' of action '{name}' has {} keys for {} frames",
                    channel.bone_name,
                    channel.keys.len(),
                    frames.len()
                )));
            }
        }
        let aabb_count = decode::read_count(t, "subtype aabb")?;
        let mut subtype_aabbs = Vec::with_capacity(aabb_count as usize);
        for _ in 0..aabb_count {
            let min = Vec3::read(t)?;
            let max = Vec3::read(t)?;
            subtype_aabbs.push((min, max));
        }
        Ok(Self {
            name,
            interval,
            additive,
            frames,
            channels,
            subtype_aabbs,
        })
    }
}

/// A compiled actor bundle.
#[derive(Debug, Clone)]
pub struct Actor {
    /// Bone hierarchies, indexed by [`Subtype::armature`].
    pub armatures: Vec<Armature>,
    /// Mesh variants.
    pub subtypes: Vec<Subtype>,
    /// Authored actions.
    pub actions: Vec<Action>,
}

impl Actor {
    /// Decode an actor record stream.
    pub(crate) fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        let armatures: Vec<Armature> = decode::read_seq(t, "armature")?;
        let subtypes: Vec<Subtype> = decode::read_seq(t, "subtype")?;
        for subtype in &subtypes {
            let a = subtype.armature;
            if a != -1 && !(0..armatures.len() as i32).contains(&a) {
                return Err(BridgeError::MalformedRecord(format!(
                    "subtype '{}' references armature {a} ({} armatures)",
                    subtype.name,
                    armatures.len()
                )));
            }
        }
        let actions: Vec<Action> = decode::read_seq(t, "action")?;
        log::debug!(
            "decoded actor: {} armatures, {} subtypes, {} actions",
            armatures.len(),
            subtypes.len(),
            actions.len()
        );
        Ok(Self {
            armatures,
            subtypes,
            actions,
        })
    }

    /// Find an armature by name.
    pub fn lookup_armature(&self, name: &str) -> Option<&Armature> {
        self.armatures.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;

    fn script_bone(t: &mut ScriptedTransport, name: &str, parent: i32, children: &[i32]) {
        t.reply_line(name).reply_vec3(0.0, 0.0, 1.0).reply_i32(parent);
        t.reply_u32(children.len() as u32);
        for &c in children {
            t.reply_i32(c);
        }
    }

    #[test]
    fn test_actor_decode() {
        let mut t = ScriptedTransport::new();
        // One armature with a two-bone chain.
        t.reply_u32(1).reply_line("skeleton");
        t.reply_u32(2);
        script_bone(&mut t, "hips", -1, &[1]);
        script_bone(&mut t, "spine", 0, &[]);
        // One subtype with an overlay.
        t.reply_u32(1);
        t.reply_line("hero").reply_line("models/hero.blend").reply_i32(0);
        t.reply_u32(1).reply_line("armor").reply_line("models/armor.blend");
        // One action: rotation-only channel, two frames.
        t.reply_u32(1);
        t.reply_line("walk").reply_f32(1.0 / 30.0).reply_u32(0);
        t.reply_u32(2).reply_i32(0).reply_i32(15);
        t.reply_u32(1);
        t.reply_line("spine").reply_u32(ATTR_ROTATE).reply_u32(2);
        t.reply_f32(1.0).reply_f32(0.0).reply_f32(0.0).reply_f32(0.0);
        t.reply_f32(0.7).reply_f32(0.7).reply_f32(0.0).reply_f32(0.0);
        t.reply_u32(1).reply_vec3(-1.0, -1.0, 0.0).reply_vec3(1.0, 1.0, 2.0);

        let actor = Actor::read(&mut t).unwrap();
        assert_eq!(t.unread(), 0);

        let arm = actor.lookup_armature("skeleton").unwrap();
        assert_eq!(arm.bones.len(), 2);
        assert_eq!(arm.lookup_bone("spine").unwrap().parent, 0);
        assert_eq!(arm.bones[0].children, [1]);

        assert_eq!(actor.subtypes[0].armature, 0);
        assert_eq!(
            actor.subtypes[0].overlay_meshes,
            [("armor".to_string(), "models/armor.blend".to_string())]
        );

        let action = &actor.actions[0];
        assert_eq!(action.frames, [0, 15]);
        assert!(!action.additive);
        let channel = &action.channels[0];
        assert_eq!(channel.bone_name, "spine");
        assert!(channel.keys[0].rotation.is_some());
        assert!(channel.keys[0].position.is_none());
        assert_eq!(channel.keys[1].rotation.unwrap().x, 0.7);
    }

    #[test]
    fn test_bad_armature_reference_is_malformed() {
        let mut t = ScriptedTransport::new();
        t.reply_u32(0); // no armatures
        t.reply_u32(1);
        t.reply_line("hero").reply_line("models/hero.blend").reply_i32(3);
        t.reply_u32(0); // no overlays

        let err = Actor::read(&mut t).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedRecord(_)), "got {err:?}");
    }

    #[test]
    fn test_channel_key_count_must_match_frames() {
        let mut t = ScriptedTransport::new();
        t.reply_u32(0); // no armatures
        t.reply_u32(0); // no subtypes
        t.reply_u32(1);
        t.reply_line("broken").reply_f32(1.0 / 30.0).reply_u32(0);
        t.reply_u32(2).reply_i32(0).reply_i32(1); // two frames
        t.reply_u32(1);
        t.reply_line("hips").reply_u32(ATTR_TRANSLATE).reply_u32(1); // one key
        t.reply_vec3(0.0, 0.0, 0.0);

        let err = Actor::read(&mut t).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedRecord(_)), "got {err:?}");
    }

    #[test]
    fn test_bone_link_out_of_range_is_malformed() {
        let mut t = ScriptedTransport::new();
        t.reply_u32(1).reply_line("skeleton");
        t.reply_u32(1);
        script_bone(&mut t, "hips", 5, &[]);

        let err = Actor::read(&mut t).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedRecord(_)), "got {err:?}");
    }
}
