use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which reference space the play space is anchored to.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlaySpace {
    /// Seated play. The origin is wherever the runtime placed the seated
    /// origin (LOCAL reference space).
    Seated,
    /// Room-scale play. The origin is on the floor at the center of the
    /// tracked area (STAGE reference space).
    RoomScale,
}

impl Default for PlaySpace {
    fn default() -> Self {
        Self::Seated
    }
}

pub const fn default_z_near() -> f32 {
    1.0
}

pub const fn default_z_far() -> f32 {
    20000.0
}

fn default_app_name() -> String {
    "openxr-bridge".to_owned()
}

/// Mode bit selecting [`PlaySpace::RoomScale`], for hosts that configure
/// the bridge through a flag word.
pub const MODE_ROOM_SCALE: u32 = 1 << 0;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Application name reported to the OpenXR runtime
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Application version reported to the OpenXR runtime
    #[serde(default)]
    pub app_version: u32,
    /// Seated or room-scale play
    #[serde(default)]
    pub play_space: PlaySpace,
    /// Near clipping plane distance, in engine units
    #[serde(default = "default_z_near")]
    pub z_near: f32,
    /// Far clipping plane distance, in engine units
    #[serde(default = "default_z_far")]
    pub z_far: f32,
    /// Submit depth composition layers along with the color layers.
    /// Known to break SteamVR, so off unless explicitly requested.
    #[serde(default)]
    pub depth_layer: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            app_version: 0,
            play_space: PlaySpace::default(),
            z_near: default_z_near(),
            z_far: default_z_far(),
            depth_layer: false,
        }
    }
}

impl Config {
    /// Build a config from a host-engine mode flag word.
    pub fn from_mode_flags(flags: u32) -> Self {
        Self {
            play_space: if flags & MODE_ROOM_SCALE != 0 {
                PlaySpace::RoomScale
            } else {
                PlaySpace::Seated
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.play_space, PlaySpace::Seated);
        assert_eq!(cfg.z_near, 1.0);
        assert_eq!(cfg.z_far, 20000.0);
        assert!(!cfg.depth_layer);
    }

    #[test]
    fn room_scale_mode_bit() {
        assert_eq!(
            Config::from_mode_flags(MODE_ROOM_SCALE).play_space,
            PlaySpace::RoomScale
        );
        assert_eq!(Config::from_mode_flags(0).play_space, PlaySpace::Seated);
    }
}
