//! Sankey layout engine.
//!
//! Consumes a flow definition plus viewport dimensions and produces concrete
//! geometry: per-node position and breadth, per-edge stacking offsets, level
//! offsets, level labels and the plot/legend rectangles. The whole pass is
//! synchronous and deterministic; a fresh layout is computed from scratch on
//! every data change.

use std::collections::HashMap;

use thiserror::Error;

use crate::defs::{DefId, SankeyDef};
use crate::graph::{DirectedGraph, EdgeId, GraphError, NodeId};
use crate::options::{LEGEND_HEIGHT, LabelAlign, SankeyOptions, StickSide};
use crate::{Rect, Viewport};

const CURVATURE: f32 = 0.5;
const LABEL_PADDING: f32 = 12.0;

/// Fraction of the viewport height the inter-node gaps of one level are
/// allowed to consume before the gap is shrunk.
const MAX_GAP_RATIO: f32 = 0.5;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(DefId),
    #[error("edge references unknown node id '{0}'")]
    UnknownNodeId(DefId),
    #[error("edge from '{source_id}' to '{target}' has negative value {value}")]
    NegativeEdgeValue {
        source_id: DefId,
        target: DefId,
        value: f32,
    },
}

/// Positioned node. `x`/`width` come from the level geometry; `y` is settled
/// by the vertical layout strategy and `breadth` is the pixel thickness
/// proportional to the flow through the node.
#[derive(Debug, Clone, PartialEq)]
pub struct SankeyNode {
    pub id: DefId,
    pub title: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub depth: usize,
    /// max(incoming sum, outgoing sum) of raw edge values.
    pub value: f32,
    /// Like `value`, but over edge display values (see `SankeyEdge`).
    pub display_value: f32,
    pub breadth: f32,
}

impl SankeyNode {
    pub fn center_y(&self) -> f32 {
        self.y + self.breadth / 2.0
    }

    pub fn y2(&self) -> f32 {
        self.y + self.breadth
    }
}

/// Positioned edge. The stacking offsets locate the edge along the vertical
/// extent of its endpoint nodes; they are written once per pass by
/// [`SankeyLayout::stack_edges`].
#[derive(Debug, Clone, PartialEq)]
pub struct SankeyEdge {
    pub value: f32,
    /// `value` clamped upward to the minimum-visible-size floor when ratio
    /// mode is active, otherwise equal to `value`.
    pub display_value: f32,
    pub breadth: f32,
    /// Offset of the edge from the top of its source node.
    pub source_y_offset: f32,
    /// Offset of the edge from the top of its target node.
    pub target_y_offset: f32,
}

pub type SankeyGraph = DirectedGraph<SankeyNode, SankeyEdge>;

/// Level label position: x is already adjusted for the alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelLabel {
    pub index: usize,
    pub x: f32,
    pub align: LabelAlign,
    pub title: Option<String>,
}

/// Maps a label alignment to the SVG `text-anchor` value.
pub fn text_anchor(align: LabelAlign) -> &'static str {
    match align {
        LabelAlign::Right => "end",
        LabelAlign::Middle => "middle",
        LabelAlign::Left => "start",
    }
}

/// Vertical placement algorithm, selected at layout time. The default is
/// [`RelaxationLayout`]; a custom strategy takes full responsibility for
/// populating every node's geometry before the layout is published.
pub trait LayoutStrategy {
    fn arrange(&self, layout: &mut SankeyLayout) -> Result<(), LayoutError>;
}

/// Weighted-barycenter relaxation with collision resolution, the built-in
/// vertical placement algorithm.
#[derive(Debug, Clone, Copy)]
pub struct RelaxationLayout {
    pub iterations: usize,
}

impl Default for RelaxationLayout {
    fn default() -> Self {
        Self { iterations: 20 }
    }
}

impl LayoutStrategy for RelaxationLayout {
    fn arrange(&self, layout: &mut SankeyLayout) -> Result<(), LayoutError> {
        layout.shrink_node_gap()?;
        layout.derive_scale()?;
        layout.relax(self.iterations)?;
        layout.stack_edges()?;
        Ok(())
    }
}

/// Fully computed layout for one render pass.
///
/// Edge handles are parallel to the definition's edge list: the edge added
/// for `def.edges[i]` has handle index `i`. Node definitions map to handles
/// through [`SankeyLayout::node_handle`]. Together these let an embedding UI
/// translate pointer events on definitions back into geometry.
#[derive(Debug)]
pub struct SankeyLayout {
    pub viewport: Viewport,
    pub options: SankeyOptions,
    pub graph: SankeyGraph,
    pub plot_area: Rect,
    pub legend_area: Rect,
    pub level_offsets: Vec<f32>,
    pub level_labels: Vec<LevelLabel>,
    /// Factor converting a display value to a pixel breadth.
    pub scale: f32,
    /// Floor applied to every edge's display value in ratio mode.
    pub min_display_value: f32,
    /// Distance between a node and its title.
    pub label_padding: f32,
    diameter: usize,
    node_gap: f32,
    lookup: HashMap<DefId, NodeId>,
}

impl SankeyLayout {
    /// Computes a layout with the default relaxation strategy.
    pub fn compute(def: &SankeyDef, viewport: Viewport) -> Result<Self, LayoutError> {
        Self::compute_with(def, viewport, &RelaxationLayout::default())
    }

    /// Computes a layout, delegating vertical placement to `strategy`.
    pub fn compute_with(
        def: &SankeyDef,
        viewport: Viewport,
        strategy: &dyn LayoutStrategy,
    ) -> Result<Self, LayoutError> {
        let mut layout = Self::prepare(def, viewport)?;
        strategy.arrange(&mut layout)?;
        Ok(layout)
    }

    /// Builds the graph, derives areas and level geometry, and initializes
    /// node positions. Vertical placement is left to the strategy.
    fn prepare(def: &SankeyDef, viewport: Viewport) -> Result<Self, LayoutError> {
        let options = def.options.clone();
        let mut graph: SankeyGraph = DirectedGraph::new();
        let mut lookup: HashMap<DefId, NodeId> = HashMap::with_capacity(def.nodes.len());

        for node_def in &def.nodes {
            if lookup.contains_key(&node_def.id) {
                return Err(LayoutError::DuplicateNodeId(node_def.id.clone()));
            }
            let handle = graph.add_node(SankeyNode {
                id: node_def.id.clone(),
                title: node_def.title.clone().unwrap_or_default(),
                x: 0.0,
                y: 0.0,
                width: 0.0,
                depth: 0,
                value: 0.0,
                display_value: 0.0,
                breadth: 0.0,
            });
            lookup.insert(node_def.id.clone(), handle);
        }

        for edge_def in &def.edges {
            if edge_def.value < 0.0 {
                return Err(LayoutError::NegativeEdgeValue {
                    source_id: edge_def.source.clone(),
                    target: edge_def.target.clone(),
                    value: edge_def.value,
                });
            }
            let source = *lookup
                .get(&edge_def.source)
                .ok_or_else(|| LayoutError::UnknownNodeId(edge_def.source.clone()))?;
            let target = *lookup
                .get(&edge_def.target)
                .ok_or_else(|| LayoutError::UnknownNodeId(edge_def.target.clone()))?;
            graph.add_edge(
                source,
                target,
                SankeyEdge {
                    value: edge_def.value,
                    display_value: edge_def.value,
                    breadth: 0.0,
                    source_y_offset: 0.0,
                    target_y_offset: 0.0,
                },
            )?;
        }

        // Raw node values are fixed once the topology is complete.
        let node_ids: Vec<NodeId> = graph.node_ids().collect();
        for &id in &node_ids {
            let mut incoming = 0.0f32;
            for edge in graph.incoming_edges(id)? {
                incoming += graph.edge(edge)?.value;
            }
            let mut outgoing = 0.0f32;
            for edge in graph.outgoing_edges(id)? {
                outgoing += graph.edge(edge)?.value;
            }
            let node = graph.node_mut(id)?;
            node.value = incoming.max(outgoing);
        }

        // First depth query; a cyclic flow is rejected here.
        let diameter = graph.diameter()?;

        let margins = options.resolved_margins();
        let plot_area = Rect::new(
            margins.left,
            margins.top,
            viewport.width - margins.left - margins.right,
            viewport.height - margins.top - margins.bottom,
        );
        let legend_area = Rect::new(0.0, plot_area.height, plot_area.width, LEGEND_HEIGHT);

        let mut layout = Self {
            viewport,
            node_gap: options.node_gap,
            options,
            graph,
            plot_area,
            legend_area,
            level_offsets: Vec::new(),
            level_labels: Vec::new(),
            scale: 1.0,
            min_display_value: 0.0,
            label_padding: LABEL_PADDING,
            diameter,
            lookup,
        };

        layout.level_offsets = layout.compute_level_offsets();
        layout.level_labels = layout.compute_level_labels();

        for &id in &node_ids {
            let depth = layout.graph.max_node_depth(id)?;
            let x = layout.level_offsets[depth];
            let width = layout.options.node_width;
            let node = layout.graph.node_mut(id)?;
            node.depth = depth;
            node.x = x;
            node.width = width;
        }

        // Entities are fully formed even before a strategy runs: with the
        // identity scale a display value equals the raw value.
        layout.apply_display_values()?;
        layout.apply_breadths()?;

        Ok(layout)
    }

    /// Number of levels; 0 for an empty graph.
    pub fn levels_count(&self) -> usize {
        if self.graph.node_count() == 0 {
            0
        } else {
            self.diameter + 1
        }
    }

    pub fn diameter(&self) -> usize {
        self.diameter
    }

    /// Effective vertical gap between same-level nodes, after the adaptive
    /// shrink.
    pub fn node_gap(&self) -> f32 {
        self.node_gap
    }

    /// Handle of the node created for the definition with `id`.
    pub fn node_handle(&self, id: &DefId) -> Option<NodeId> {
        self.lookup.get(id).copied()
    }

    /// Horizontal column positions, one per level. Levels start at
    /// `level * level_gap` and are then pinned by the stick passes: a
    /// left-to-right pass pushes a `stick_to: left` level flush against its
    /// left neighbor plus padding, and a right-to-left pass mirrors that for
    /// `stick_to: right`.
    fn compute_level_offsets(&self) -> Vec<f32> {
        let levels_count = self.levels_count();
        let node_width = self.options.node_width;

        // A single level has no gap to distribute; it sits at its base
        // offset instead of dividing by zero.
        let level_gap = if self.diameter == 0 {
            0.0
        } else {
            (self.plot_area.width - node_width) / self.diameter as f32
        };

        let mut offsets: Vec<f32> = (0..levels_count)
            .map(|level| level as f32 * level_gap)
            .collect();

        for i in 1..levels_count {
            let params = self.options.level_params(i);
            if params.stick_to == Some(StickSide::Left) {
                offsets[i] = offsets[i - 1] + node_width + params.stick_padding();
            }
        }

        for i in (0..levels_count.saturating_sub(1)).rev() {
            let params = self.options.level_params(i);
            if params.stick_to == Some(StickSide::Right) {
                offsets[i] = offsets[i + 1] - node_width - params.stick_padding();
            }
        }

        offsets
    }

    fn compute_level_labels(&self) -> Vec<LevelLabel> {
        let node_width = self.options.node_width;

        self.level_offsets
            .iter()
            .enumerate()
            .map(|(index, &offset)| {
                let params = self.options.level_params(index);
                let align = params.label_align();
                let x = match align {
                    LabelAlign::Right => offset + node_width,
                    LabelAlign::Middle => offset + node_width / 2.0,
                    LabelAlign::Left => offset,
                };
                LevelLabel {
                    index,
                    x,
                    align,
                    title: params.title.clone(),
                }
            })
            .collect()
    }

    /// Shrinks the configured node gap when the gaps of a crowded level
    /// would consume more than half the viewport height. Walks from the
    /// deepest level to the shallowest, keeping the smallest result as the
    /// effective gap for the whole layout.
    pub fn shrink_node_gap(&mut self) -> Result<(), LayoutError> {
        let max_gap_total = MAX_GAP_RATIO * self.viewport.height;
        let mut gap = self.options.node_gap;

        for level in (0..self.levels_count()).rev() {
            let count = self.graph.nodes_at_depth(level)?.len();
            let gaps_count = count.saturating_sub(1) as f32;
            if gaps_count * gap > max_gap_total {
                gap = max_gap_total / gaps_count;
            }
        }

        self.node_gap = gap;
        Ok(())
    }

    /// Derives the value-to-pixel scale and refreshes display values and
    /// breadths.
    ///
    /// With `min_edge_size_ratio` configured, the minimal usable vertical
    /// space across levels is divided by the clamped total over root nodes,
    /// guaranteeing every edge at least the ratio-derived breadth. Otherwise
    /// the tightest level determines the global scale so no level overflows
    /// the plot height.
    pub fn derive_scale(&mut self) -> Result<(), LayoutError> {
        let plot_height = self.plot_area.height;
        let gap = self.node_gap;

        if let Some(ratio) = self.options.min_edge_size_ratio {
            let mut min_node_space = f32::INFINITY;
            for level in 0..self.levels_count() {
                let count = self.graph.nodes_at_depth(level)?.len();
                let gap_size = count.saturating_sub(1) as f32 * gap;
                min_node_space = min_node_space.min(plot_height - gap_size);
            }
            if !min_node_space.is_finite() {
                min_node_space = 0.0;
            }

            let roots = self.graph.nodes_at_depth(0)?;
            let mut total = 0.0f32;
            for &root in &roots {
                total += self.graph.node(root)?.value;
            }

            self.min_display_value = total * ratio;
            self.apply_display_values()?;

            let mut display_total = 0.0f32;
            for &root in &roots {
                display_total += self.graph.node(root)?.display_value;
            }

            self.scale = if display_total > 0.0 {
                min_node_space / display_total
            } else {
                1.0
            };
        } else {
            self.min_display_value = 0.0;
            self.apply_display_values()?;

            let mut scale = f32::INFINITY;
            for level in 0..self.levels_count() {
                let nodes = self.graph.nodes_at_depth(level)?;
                let mut level_value = 0.0f32;
                for &node in &nodes {
                    level_value += self.graph.node(node)?.value;
                }
                if level_value > 0.0 {
                    let usable = plot_height - nodes.len().saturating_sub(1) as f32 * gap;
                    scale = scale.min(usable / level_value);
                }
            }

            self.scale = if scale.is_finite() { scale } else { 1.0 };
        }

        self.apply_breadths()?;
        Ok(())
    }

    /// Clamps every edge's display value to the current floor and rolls the
    /// results up into node display values.
    pub fn apply_display_values(&mut self) -> Result<(), LayoutError> {
        let edge_ids: Vec<EdgeId> = self.graph.edge_ids().collect();
        for id in edge_ids {
            let edge = self.graph.edge_mut(id)?;
            edge.display_value = edge.value.max(self.min_display_value);
        }

        let node_ids: Vec<NodeId> = self.graph.node_ids().collect();
        for id in node_ids {
            let mut incoming = 0.0f32;
            for edge in self.graph.incoming_edges(id)? {
                incoming += self.graph.edge(edge)?.display_value;
            }
            let mut outgoing = 0.0f32;
            for edge in self.graph.outgoing_edges(id)? {
                outgoing += self.graph.edge(edge)?.display_value;
            }
            self.graph.node_mut(id)?.display_value = incoming.max(outgoing);
        }

        Ok(())
    }

    /// Refreshes pixel breadths from display values and the current scale.
    pub fn apply_breadths(&mut self) -> Result<(), LayoutError> {
        let node_ids: Vec<NodeId> = self.graph.node_ids().collect();
        for id in node_ids {
            let node = self.graph.node_mut(id)?;
            node.breadth = node.display_value * self.scale;
        }

        let edge_ids: Vec<EdgeId> = self.graph.edge_ids().collect();
        for id in edge_ids {
            let edge = self.graph.edge_mut(id)?;
            edge.breadth = edge.display_value * self.scale;
        }

        Ok(())
    }

    /// Iterative barycenter relaxation: a right-to-left pass pulls each node
    /// toward the value-weighted center of its edge targets, a left-to-right
    /// pass mirrors that with edge sources, and collision resolution keeps
    /// same-level nodes apart after every pass.
    pub fn relax(&mut self, iterations: usize) -> Result<(), LayoutError> {
        let levels = self.nodes_by_level()?;

        self.resolve_collisions(&levels)?;

        let mut alpha = 1.0f32;
        for _ in 0..iterations {
            alpha *= 0.9;
            self.relax_right_to_left(alpha, &levels)?;
            self.resolve_collisions(&levels)?;
            self.relax_left_to_right(alpha, &levels)?;
            self.resolve_collisions(&levels)?;
        }

        Ok(())
    }

    fn nodes_by_level(&self) -> Result<Vec<Vec<NodeId>>, LayoutError> {
        let mut levels = Vec::with_capacity(self.levels_count());
        for level in 0..self.levels_count() {
            levels.push(self.graph.nodes_at_depth(level)?);
        }
        Ok(levels)
    }

    /// Pushes overlapping nodes of each level down just enough to clear the
    /// previous node plus gap; when the bottommost node overflows the plot,
    /// the tail is pushed back up scanning backward.
    fn resolve_collisions(&mut self, levels: &[Vec<NodeId>]) -> Result<(), LayoutError> {
        let gap = self.node_gap;
        let plot_height = self.plot_area.height;

        for level_nodes in levels {
            let mut sorted: Vec<(NodeId, f32)> = Vec::with_capacity(level_nodes.len());
            for &id in level_nodes {
                sorted.push((id, self.graph.node(id)?.y));
            }
            // Stable sort: equal positions keep insertion order, which keeps
            // the whole pass deterministic.
            sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

            let mut y0 = 0.0f32;
            for &(id, _) in &sorted {
                let node = self.graph.node_mut(id)?;
                let dy = y0 - node.y;
                if dy > 0.0 {
                    node.y += dy;
                }
                y0 = node.y + node.breadth + gap;
            }

            let overflow = y0 - gap - plot_height;
            if overflow > 0.0 {
                let Some(&(last, _)) = sorted.last() else {
                    continue;
                };

                let node = self.graph.node_mut(last)?;
                node.y -= overflow;
                let mut y0 = node.y;

                for &(id, _) in sorted.iter().rev().skip(1) {
                    let node = self.graph.node_mut(id)?;
                    let dy = node.y + node.breadth + gap - y0;
                    if dy > 0.0 {
                        node.y -= dy;
                    }
                    y0 = node.y;
                }
            }
        }

        Ok(())
    }

    fn relax_right_to_left(
        &mut self,
        alpha: f32,
        levels: &[Vec<NodeId>],
    ) -> Result<(), LayoutError> {
        for level_nodes in levels.iter().rev() {
            for &id in level_nodes {
                let edges = self.graph.outgoing_edges(id)?;
                if edges.is_empty() {
                    continue;
                }
                if let Some(center) = self.weighted_center(&edges, true)? {
                    let node = self.graph.node_mut(id)?;
                    node.y += (center - node.center_y()) * alpha;
                }
            }
        }
        Ok(())
    }

    fn relax_left_to_right(
        &mut self,
        alpha: f32,
        levels: &[Vec<NodeId>],
    ) -> Result<(), LayoutError> {
        for level_nodes in levels {
            for &id in level_nodes {
                let edges = self.graph.incoming_edges(id)?;
                if edges.is_empty() {
                    continue;
                }
                if let Some(center) = self.weighted_center(&edges, false)? {
                    let node = self.graph.node_mut(id)?;
                    node.y += (center - node.center_y()) * alpha;
                }
            }
        }
        Ok(())
    }

    /// Value-weighted average center of the nodes on the far side of
    /// `edges`. `None` when the edges carry no weight at all.
    fn weighted_center(
        &self,
        edges: &[EdgeId],
        use_targets: bool,
    ) -> Result<Option<f32>, LayoutError> {
        let mut weighted_sum = 0.0f32;
        let mut value_sum = 0.0f32;

        for &edge in edges {
            let value = self.graph.edge(edge)?.value;
            let far_node = if use_targets {
                self.graph.edge_target(edge)?
            } else {
                self.graph.edge_source(edge)?
            };
            weighted_sum += self.graph.node(far_node)?.center_y() * value;
            value_sum += value;
        }

        if value_sum > 0.0 {
            Ok(Some(weighted_sum / value_sum))
        } else {
            Ok(None)
        }
    }

    /// Assigns the per-edge stacking offsets: incoming edges sorted by the
    /// y-position of their source stack top-to-bottom on the target node,
    /// outgoing edges sorted by target position stack on the source node.
    /// This ordering minimizes edge crossing near each node.
    pub fn stack_edges(&mut self) -> Result<(), LayoutError> {
        let node_ids: Vec<NodeId> = self.graph.node_ids().collect();

        for id in node_ids {
            let mut incoming: Vec<(EdgeId, f32)> = Vec::new();
            for edge in self.graph.incoming_edges(id)? {
                let source = self.graph.edge_source(edge)?;
                incoming.push((edge, self.graph.node(source)?.y));
            }
            incoming.sort_by(|a, b| a.1.total_cmp(&b.1));

            let mut y = 0.0f32;
            for (edge, _) in incoming {
                let edge = self.graph.edge_mut(edge)?;
                edge.target_y_offset = y;
                y += edge.breadth;
            }

            let mut outgoing: Vec<(EdgeId, f32)> = Vec::new();
            for edge in self.graph.outgoing_edges(id)? {
                let target = self.graph.edge_target(edge)?;
                outgoing.push((edge, self.graph.node(target)?.y));
            }
            outgoing.sort_by(|a, b| a.1.total_cmp(&b.1));

            let mut y = 0.0f32;
            for (edge, _) in outgoing {
                let edge = self.graph.edge_mut(edge)?;
                edge.source_y_offset = y;
                y += edge.breadth;
            }
        }

        Ok(())
    }

    /// Cubic Bezier path for `edge`, in plot-area coordinates. Control
    /// points are interpolated horizontally at the fixed curvature between
    /// the two endpoints.
    pub fn edge_path(&self, edge: EdgeId) -> Result<String, GraphError> {
        let source = self.graph.node(self.graph.edge_source(edge)?)?;
        let target = self.graph.node(self.graph.edge_target(edge)?)?;
        let e = self.graph.edge(edge)?;

        let x0 = source.x + source.width;
        let x1 = target.x;
        let x2 = x0 + (x1 - x0) * CURVATURE;
        let x3 = x0 + (x1 - x0) * (1.0 - CURVATURE);
        let y0 = source.y + e.source_y_offset + e.breadth / 2.0;
        let y1 = target.y + e.target_y_offset + e.breadth / 2.0;

        Ok(format!(
            "M{x0:.1},{y0:.1} C{x2:.1},{y0:.1} {x3:.1},{y1:.1} {x1:.1},{y1:.1}"
        ))
    }
}
