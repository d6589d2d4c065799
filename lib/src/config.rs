use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::Result;

// DirectX-style "cornflower blue", used when the display can't show the real world behind it.
const OPAQUE_CLEAR_COLOR: [f32; 4] = [0.392_156_9, 0.584_313_75, 0.929_411_8, 1.0];
const TRANSPARENT_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub opaque_clear_color: [f32; 4],
    pub transparent_clear_color: [f32; 4],
    pub depth_clear_value: f32,
    pub stencil_clear_value: u8,
    pub view_projection_slot: u32, // Vertex stage constant buffer slot, see shader->@binding().
    pub commit_depth_buffer: bool, // Only honoured if the platform can take the depth buffer.
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            opaque_clear_color: OPAQUE_CLEAR_COLOR,
            transparent_clear_color: TRANSPARENT_CLEAR_COLOR,
            depth_clear_value: 1.0,
            stencil_clear_value: 0,
            view_projection_slot: 1,
            commit_depth_buffer: true,
        }
    }
}

impl GraphicsConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::from_json(&buf)
    }

    pub fn get_clear_color(&self, opaque: bool) -> [f32; 4] {
        if opaque {
            self.opaque_clear_color
        } else {
            self.transparent_clear_color
        }
    }
}
