//! The supported video projections and the layers they map to.

use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::XrError;

/// How the two eyes' images are packed into one video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    #[default]
    Mono,
    StereoLeftRight,
    StereoTopBottom,
}

/// Geometry of a projected media layer.
///
/// Angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LayerSpec {
    /// The video wrapped on the inside of a cylinder around the viewer.
    #[serde(rename_all = "camelCase")]
    Cylinder {
        central_angle: f32,
        aspect_ratio: f32,
        layout: Layout,
    },
    /// The video mapped onto a sphere (equirectangular projection).
    #[serde(rename_all = "camelCase")]
    Equirect {
        central_horizontal_angle: f32,
        radius: f32,
        layout: Layout,
    },
}

impl LayerSpec {
    pub fn layout(&self) -> Layout {
        match self {
            Self::Cylinder { layout, .. } | Self::Equirect { layout, .. } => *layout,
        }
    }
}

/// A video projection the player can present.
///
/// Selected by a stable identifier (`equirect360-mono`, ...), which is also
/// its serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoProjection {
    /// Full 360° sphere, single image.
    Equirect360Mono,
    /// Full 360° cylinder, 2:1 frames.
    Cylinder360Mono,
    /// Full 360° cylinder, 16:9 frames.
    Cylinder360Wide,
}

impl VideoProjection {
    pub const ALL: [Self; 3] = [
        Self::Equirect360Mono,
        Self::Cylinder360Mono,
        Self::Cylinder360Wide,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Equirect360Mono => "equirect360-mono",
            Self::Cylinder360Mono => "cylinder360-mono",
            Self::Cylinder360Wide => "cylinder360-wide",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    /// Human-readable name for menus.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Equirect360Mono => "VR 360 (2D mono) equirectangular",
            Self::Cylinder360Mono => "VR 360 (2D) cylinder",
            Self::Cylinder360Wide => "VR 360 (2D cylinder layer) 16:9",
        }
    }

    pub fn layer_spec(self) -> LayerSpec {
        match self {
            Self::Equirect360Mono => LayerSpec::Equirect {
                central_horizontal_angle: 2.0 * PI,
                radius: 1.0,
                layout: Layout::Mono,
            },
            Self::Cylinder360Mono => LayerSpec::Cylinder {
                central_angle: 2.0 * PI,
                aspect_ratio: 2.0,
                layout: Layout::Mono,
            },
            Self::Cylinder360Wide => LayerSpec::Cylinder {
                central_angle: 2.0 * PI,
                aspect_ratio: 16.0 / 9.0,
                layout: Layout::Mono,
            },
        }
    }
}

impl fmt::Display for VideoProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for VideoProjection {
    type Err = XrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| XrError::UnknownProjection(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_id_round_trips_every_projection() {
        for projection in VideoProjection::ALL {
            assert_eq!(VideoProjection::from_id(projection.id()), Some(projection));
        }
        assert_eq!(VideoProjection::from_id("cube-map"), None);
    }

    #[test]
    fn test_serde_form_matches_id() {
        for projection in VideoProjection::ALL {
            let json = serde_json::to_string(&projection).unwrap();
            assert_eq!(json, format!("\"{}\"", projection.id()));
        }
    }

    #[test]
    fn test_from_str_unknown_returns_error() {
        let result: Result<VideoProjection, _> = "fisheye".parse();
        assert!(matches!(result, Err(XrError::UnknownProjection(id)) if id == "fisheye"));
    }

    #[test]
    fn test_layer_spec_values() {
        assert_eq!(
            VideoProjection::Equirect360Mono.layer_spec(),
            LayerSpec::Equirect {
                central_horizontal_angle: 2.0 * PI,
                radius: 1.0,
                layout: Layout::Mono,
            }
        );
        assert_eq!(
            VideoProjection::Cylinder360Mono.layer_spec(),
            LayerSpec::Cylinder {
                central_angle: 2.0 * PI,
                aspect_ratio: 2.0,
                layout: Layout::Mono,
            }
        );
        let LayerSpec::Cylinder { aspect_ratio, .. } = VideoProjection::Cylinder360Wide.layer_spec()
        else {
            panic!("wide projection must be a cylinder");
        };
        assert!((aspect_ratio - 16.0 / 9.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_every_projection_is_mono() {
        for projection in VideoProjection::ALL {
            assert_eq!(projection.layer_spec().layout(), Layout::Mono);
        }
    }

    #[test]
    fn test_layer_spec_serializes_with_kind_tag() {
        let json = serde_json::to_value(VideoProjection::Cylinder360Mono.layer_spec()).unwrap();
        assert_eq!(json["kind"], "cylinder");
        assert_eq!(json["aspectRatio"], 2.0);
        assert_eq!(json["layout"], "mono");
    }
}
