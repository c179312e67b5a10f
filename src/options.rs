//! Layout configuration. An options value is built once per layout pass and
//! never mutated afterwards.

use serde::{Deserialize, Serialize};

pub const DEFAULT_NODE_WIDTH: f32 = 24.0;
pub const DEFAULT_NODE_GAP: f32 = 16.0;
pub const DEFAULT_STICK_PADDING: f32 = 80.0;
pub const LEGEND_HEIGHT: f32 = 30.0;

/// Horizontal alignment of a text label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelAlign {
    Left,
    Right,
    Middle,
}

/// Side a level column is pinned to, relative to its neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StickSide {
    Left,
    Right,
}

/// Plot area margins in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 0.0,
            bottom: 0.0,
            left: 0.0,
            right: 0.0,
        }
    }
}

/// Per-level presentation parameters, indexed by level number. Levels beyond
/// the configured range fall back to the documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelParams {
    /// Label text rendered above the level column.
    pub title: Option<String>,
    /// Alignment of the level label; `middle` when unset.
    pub label_align: Option<LabelAlign>,
    /// Which side of a node its title is rendered on; `left` when unset.
    pub node_label_align: Option<LabelAlign>,
    /// Pin this level flush against its horizontal neighbor.
    pub stick_to: Option<StickSide>,
    /// Distance kept from the neighbor when sticking; 80 when unset.
    pub stick_padding: Option<f32>,
}

impl LevelParams {
    pub fn node_label_align(&self) -> LabelAlign {
        self.node_label_align.unwrap_or(LabelAlign::Left)
    }

    pub fn label_align(&self) -> LabelAlign {
        self.label_align.unwrap_or(LabelAlign::Middle)
    }

    pub fn stick_padding(&self) -> f32 {
        self.stick_padding.unwrap_or(DEFAULT_STICK_PADDING)
    }
}

/// One legend entry, rendered in the strip below the plot area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendItem {
    pub label: String,
    /// Mark color; the series palette is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Options bundle accepted by [`crate::SankeyLayout`]. All fields have
/// working defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SankeyOptions {
    /// Per-level parameters, indexed by level number.
    pub levels: Vec<LevelParams>,
    /// Plot area margins; when unset the defaults are top 30, left 60,
    /// right 60, and bottom equal to the legend height if a legend is
    /// configured.
    pub margins: Option<Margins>,
    /// Column thickness in pixels.
    pub node_width: f32,
    /// Preferred vertical gap between same-level nodes, subject to the
    /// adaptive shrink when a level is crowded.
    pub node_gap: f32,
    /// When set, enables ratio-mode scaling: every edge is guaranteed a
    /// minimum rendered breadth of `ratio * total root value`, trading exact
    /// proportionality for the visibility of small flows.
    pub min_edge_size_ratio: Option<f32>,
    /// Legend entries; their presence reserves the legend strip.
    pub legend: Option<Vec<LegendItem>>,
}

impl Default for SankeyOptions {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            margins: None,
            node_width: DEFAULT_NODE_WIDTH,
            node_gap: DEFAULT_NODE_GAP,
            min_edge_size_ratio: None,
            legend: None,
        }
    }
}

impl SankeyOptions {
    /// Parameters for `level`, falling back to defaults past the configured
    /// range.
    pub fn level_params(&self, level: usize) -> LevelParams {
        self.levels.get(level).cloned().unwrap_or_default()
    }

    /// Margins resolved against the legend configuration.
    pub fn resolved_margins(&self) -> Margins {
        self.margins.unwrap_or(Margins {
            top: 30.0,
            left: 60.0,
            right: 60.0,
            bottom: if self.legend.is_some() {
                LEGEND_HEIGHT
            } else {
                0.0
            },
        })
    }
}
