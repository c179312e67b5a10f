//! Sankey flow diagram layout engine.
//!
//! A flow definition (nodes plus weighted directed edges) is arranged into
//! vertical columns by longest-path depth, nodes are sized proportionally to
//! the flow passing through them, and vertical positions are settled with an
//! iterative weighted-barycenter relaxation. The resulting geometry can be
//! consumed directly or rendered to SVG (and PNG with the `png` feature).
//!
//! ```no_run
//! use sankey::{SankeyDef, SankeyLayout, Viewport};
//!
//! let def: SankeyDef = serde_json::from_str(r#"{
//!     "nodes": [{"id": "a"}, {"id": "b"}],
//!     "edges": [{"source": "a", "target": "b", "value": 10}]
//! }"#)?;
//! let layout = SankeyLayout::compute(&def, Viewport::new(960.0, 540.0))?;
//! let svg = sankey::render_svg(&layout, "white")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod defs;
pub mod graph;
pub mod layout;
pub mod options;
pub mod render;

pub use defs::{DefId, EdgeDef, NodeDef, SankeyDef};
pub use graph::{DirectedGraph, EdgeId, GraphError, NodeId};
pub use layout::{
    LayoutError, LayoutStrategy, LevelLabel, RelaxationLayout, SankeyEdge, SankeyGraph,
    SankeyLayout, SankeyNode,
};
pub use options::{LabelAlign, LegendItem, LevelParams, Margins, SankeyOptions, StickSide};
pub use render::{RenderError, render_svg, series_color};

#[cfg(feature = "png")]
pub use render::render_png;

/// Axis-aligned rectangle in chart coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x2(&self) -> f32 {
        self.x + self.width
    }

    pub fn y2(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// Drawing surface dimensions handed to the layout pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}
