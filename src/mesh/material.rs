//! Material records.

use std::collections::HashMap;

use crate::decode::{self, ReadRecord};
use crate::error::BridgeResult;
use crate::transport::Transport;

/// Shader source and metadata for one material.
///
/// A mesh carries an ordered sequence of material *sets*: alternate
/// material assignments for the same surface topology (e.g. damage
/// states). A surface's material index selects the same slot in every set.
#[derive(Debug, Clone)]
pub struct Material {
    /// Material name as authored.
    pub name: String,
    /// Shader source text for this material.
    pub source: String,
    /// Texture paths referenced by the shader, in binding order.
    pub textures: Vec<String>,
    /// Named integer shader properties.
    pub int_props: HashMap<String, i32>,
}

impl ReadRecord for Material {
    /// Wire layout: name line, length-prefixed source blob, count-prefixed
    /// texture path lines, count-prefixed `{name line, i32}` properties.
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        let name = decode::read_name(t)?;
        let source = decode::read_source(t)?;

        let tex_count = decode::read_count(t, "texture path")?;
        let mut textures = Vec::with_capacity(tex_count as usize);
        for _ in 0..tex_count {
            textures.push(decode::read_name(t)?);
        }

        let prop_count = decode::read_count(t, "material property")?;
        let mut int_props = HashMap::with_capacity(prop_count as usize);
        for _ in 0..prop_count {
            let key = decode::read_name(t)?;
            let value = decode::read_i32(t)?;
            int_props.insert(key, value);
        }

        Ok(Self {
            name,
            source,
            textures,
            int_props,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;

    #[test]
    fn test_material_decode() {
        let mut t = ScriptedTransport::new();
        t.reply_line("skin_mat");
        let source = "HECLOpaque(Texture(0, UV(0)))";
        t.reply_u32(source.len() as u32).reply_bytes(source.as_bytes());
        t.reply_u32(1).reply_line("textures/skin.png");
        t.reply_u32(2);
        t.reply_line("retro_depth_sort").reply_i32(1);
        t.reply_line("retro_alpha_test").reply_i32(0);

        let mat = Material::read(&mut t).unwrap();
        assert_eq!(mat.name, "skin_mat");
        assert_eq!(mat.source, source);
        assert_eq!(mat.textures, ["textures/skin.png"]);
        assert_eq!(mat.int_props.get("retro_depth_sort"), Some(&1));
        assert_eq!(mat.int_props.get("retro_alpha_test"), Some(&0));
        assert_eq!(t.unread(), 0);
    }
}
