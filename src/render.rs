//! Static SVG rendering of a computed layout, plus PNG rasterization behind
//! the `png` feature.

use std::fmt::Write as FmtWrite;

use thiserror::Error;

use crate::graph::GraphError;
use crate::layout::{SankeyLayout, text_anchor};
use crate::options::LabelAlign;

/// Default color cycle for nodes and legend marks.
const SERIES_PALETTE: [&str; 16] = [
    "#2196F3", "#43A047", "#795548", "#AD1457", "#F44336", "#FFC107", "#00796B", "#8E24AA",
    "#9CCC65", "#9E9E9E", "#3F51B5", "#4DD0E1", "#FF9800", "#b575AD", "#607D8B", "#FFEB3B",
];

const LEGEND_MARK_RADIUS: f32 = 8.0;
const LEGEND_ITEM_MARGIN: f32 = 24.0;
/// Rough glyph advance at font-size 14; there are no text metrics in a
/// static writer, so legend centering works from this estimate.
const APPROX_CHAR_WIDTH: f32 = 7.2;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Layout(#[from] crate::layout::LayoutError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
    #[error("failed to parse generated SVG for PNG export: {0}")]
    SvgParse(String),
    #[error("PNG export failed: {0}")]
    Png(String),
}

/// Color assigned to series `index`, cycling through the palette.
pub fn series_color(index: usize) -> &'static str {
    SERIES_PALETTE[index % SERIES_PALETTE.len()]
}

pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::new();
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Renders the layout as a standalone SVG document: one path per edge with
/// stroke width equal to the edge breadth, one rect per node, node titles,
/// level labels above the plot and an optional centered legend strip below
/// it.
pub fn render_svg(layout: &SankeyLayout, background: &str) -> Result<String, RenderError> {
    let mut svg = String::new();

    write!(
        svg,
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{:.0}\" height=\"{:.0}\" ",
            "viewBox=\"0 0 {:.0} {:.0}\" font-family=\"Inter, system-ui, sans-serif\">\n"
        ),
        layout.viewport.width,
        layout.viewport.height,
        layout.viewport.width,
        layout.viewport.height,
    )?;
    writeln!(
        svg,
        "  <rect width=\"100%\" height=\"100%\" fill=\"{}\" />",
        escape_xml(background)
    )?;

    // Everything inside the plot group uses plot-area coordinates, like the
    // layout itself.
    writeln!(
        svg,
        "  <g transform=\"translate({:.1},{:.1})\">",
        layout.plot_area.x, layout.plot_area.y
    )?;

    for edge_id in layout.graph.edge_ids() {
        let edge = layout.graph.edge(edge_id)?;
        let source = layout.graph.edge_source(edge_id)?;
        let path = layout.edge_path(edge_id)?;

        writeln!(
            svg,
            "    <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-opacity=\"0.35\" stroke-width=\"{:.1}\" stroke-linecap=\"butt\" />",
            path,
            series_color(source.index()),
            edge.breadth.max(0.0),
        )?;
    }

    for (index, node_id) in layout.graph.node_ids().enumerate() {
        let node = layout.graph.node(node_id)?;

        writeln!(
            svg,
            "    <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\" />",
            node.x,
            node.y,
            node.width,
            node.breadth.max(0.0),
            series_color(index),
        )?;

        if node.title.is_empty() {
            continue;
        }

        let params = layout.options.level_params(node.depth);
        let (label_x, anchor) = if params.node_label_align() == LabelAlign::Left {
            (node.x - layout.label_padding, "end")
        } else {
            (node.x + node.width + layout.label_padding, "start")
        };

        writeln!(
            svg,
            "    <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"14\" text-anchor=\"{}\" dominant-baseline=\"middle\">{}</text>",
            label_x,
            node.center_y(),
            anchor,
            escape_xml(&node.title)
        )?;
    }

    for label in &layout.level_labels {
        let Some(title) = label.title.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        writeln!(
            svg,
            "    <text x=\"{:.1}\" y=\"-8\" font-size=\"13\" text-anchor=\"{}\">{}</text>",
            label.x,
            text_anchor(label.align),
            escape_xml(title)
        )?;
    }

    if let Some(legend) = layout.options.legend.as_ref().filter(|l| !l.is_empty()) {
        render_legend(&mut svg, layout, legend)?;
    }

    svg.push_str("  </g>\n</svg>\n");
    Ok(svg)
}

fn render_legend(
    svg: &mut String,
    layout: &SankeyLayout,
    legend: &[crate::options::LegendItem],
) -> Result<(), RenderError> {
    let item_widths: Vec<f32> = legend
        .iter()
        .map(|item| {
            LEGEND_MARK_RADIUS * 3.0 + item.label.chars().count() as f32 * APPROX_CHAR_WIDTH
        })
        .collect();
    let total_width: f32 =
        item_widths.iter().sum::<f32>() + LEGEND_ITEM_MARGIN * (legend.len() - 1) as f32;

    let mut x = layout.legend_area.center_x() - total_width / 2.0;
    let y = layout.plot_area.height + layout.legend_area.height / 1.5;

    for (index, item) in legend.iter().enumerate() {
        let color = item
            .color
            .as_deref()
            .unwrap_or_else(|| series_color(index));

        writeln!(
            svg,
            "    <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{:.0}\" fill=\"{}\" />",
            x + LEGEND_MARK_RADIUS,
            y,
            LEGEND_MARK_RADIUS,
            color
        )?;
        writeln!(
            svg,
            "    <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"14\" dominant-baseline=\"middle\">{}</text>",
            x + LEGEND_MARK_RADIUS * 3.0,
            y,
            escape_xml(&item.label)
        )?;

        x += item_widths[index] + LEGEND_ITEM_MARGIN;
    }

    Ok(())
}

/// Rasterizes the SVG rendering into PNG bytes. `scale` multiplies the
/// viewport dimensions.
#[cfg(feature = "png")]
pub fn render_png(
    layout: &SankeyLayout,
    background: &str,
    scale: f32,
) -> Result<Vec<u8>, RenderError> {
    use tiny_skia::{Pixmap, Transform};

    if scale <= 0.0 {
        return Err(RenderError::Png(
            "scale must be greater than zero".to_string(),
        ));
    }

    let svg = render_svg(layout, background)?;

    let mut options = resvg::usvg::Options::default();
    options.font_family = "Inter".to_string();
    options.fontdb_mut().load_system_fonts();

    let tree = resvg::usvg::Tree::from_str(&svg, &options)
        .map_err(|err| RenderError::SvgParse(err.to_string()))?;

    let size = tree.size().to_int_size();
    let scaled_width = ((size.width() as f32) * scale).ceil();
    let scaled_height = ((size.height() as f32) * scale).ceil();

    if !scaled_width.is_finite() || !scaled_height.is_finite() {
        return Err(RenderError::Png(
            "scaled dimensions are not finite; try a smaller scale factor".to_string(),
        ));
    }
    if scaled_width < 1.0 || scaled_height < 1.0 {
        return Err(RenderError::Png(
            "scaled dimensions collapsed below 1px; try a larger scale factor".to_string(),
        ));
    }
    if scaled_width > u32::MAX as f32 || scaled_height > u32::MAX as f32 {
        return Err(RenderError::Png(
            "scaled dimensions exceed supported limits; try a smaller scale factor".to_string(),
        ));
    }

    let mut pixmap = Pixmap::new(scaled_width as u32, scaled_height as u32).ok_or_else(|| {
        RenderError::Png(format!(
            "failed to allocate {scaled_width}x{scaled_height} surface"
        ))
    })?;

    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|err| RenderError::Png(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::{EdgeDef, NodeDef, SankeyDef};
    use crate::options::LegendItem;
    use crate::{SankeyLayout, Viewport};

    fn sample_layout() -> SankeyLayout {
        let def = SankeyDef {
            nodes: vec![
                NodeDef::with_title("a", "Source <A>"),
                NodeDef::with_title("b", "Sink"),
            ],
            edges: vec![EdgeDef::new("a", "b", 42.0)],
            options: Default::default(),
        };
        SankeyLayout::compute(&def, Viewport::new(960.0, 540.0)).unwrap()
    }

    #[test]
    fn svg_contains_nodes_edges_and_labels() {
        let svg = render_svg(&sample_layout(), "white").unwrap();

        assert!(svg.contains("<svg"));
        assert_eq!(svg.matches("<rect x=").count(), 2);
        assert_eq!(svg.matches("<path d=\"M").count(), 1);
        assert!(svg.contains("Sink"));
        assert!(svg.contains("Source &lt;A&gt;"), "titles must be escaped");
    }

    #[test]
    fn background_color_is_applied() {
        let svg = render_svg(&sample_layout(), "#101010").unwrap();
        assert!(svg.contains("fill=\"#101010\""));
    }

    #[test]
    fn legend_items_are_rendered_when_configured() {
        let mut def = SankeyDef {
            nodes: vec![NodeDef::new("a"), NodeDef::new("b")],
            edges: vec![EdgeDef::new("a", "b", 1.0)],
            options: Default::default(),
        };
        def.options.legend = Some(vec![
            LegendItem {
                label: "Approved".to_string(),
                color: None,
            },
            LegendItem {
                label: "Pending".to_string(),
                color: Some("#123456".to_string()),
            },
        ]);
        let layout = SankeyLayout::compute(&def, Viewport::new(960.0, 540.0)).unwrap();
        let svg = render_svg(&layout, "white").unwrap();

        assert_eq!(svg.matches("<circle").count(), 2);
        assert!(svg.contains("Approved"));
        assert!(svg.contains("fill=\"#123456\""));
    }

    #[test]
    fn empty_layout_renders_a_bare_document() {
        let def = SankeyDef::default();
        let layout = SankeyLayout::compute(&def, Viewport::new(300.0, 200.0)).unwrap();
        let svg = render_svg(&layout, "white").unwrap();

        assert!(svg.contains("<svg"));
        assert!(!svg.contains("<path"));
        assert!(svg.ends_with("</svg>\n"));
    }

    #[test]
    fn palette_cycles() {
        assert_eq!(series_color(0), series_color(16));
        assert_ne!(series_color(0), series_color(1));
    }

    #[test]
    fn escape_handles_all_reserved_characters() {
        assert_eq!(
            escape_xml(r#"<a & "b">'c'"#),
            "&lt;a &amp; &quot;b&quot;&gt;&apos;c&apos;"
        );
    }
}
