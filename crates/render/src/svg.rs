use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::layout::{Layout, LayoutConfig, NodeRole, PlacedEdge, PlacedNode, error_layout};
use crate::model::RenderGraph;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStyle {
    pub fill: String,
    pub stroke: String,
    pub text: String,
    pub stroke_width: f64,
}

impl NodeStyle {
    fn new(fill: &str, stroke: &str, text: &str, stroke_width: f64) -> Self {
        Self {
            fill: fill.to_string(),
            stroke: stroke.to_string(),
            text: text.to_string(),
            stroke_width,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub background: String,
    pub font_family: String,
    pub font_size: f64,
    pub edge_font_size: f64,
    pub line_height: f64,
    pub line_color: String,
    pub edge_text: String,
    pub edge_label_background: String,
    pub central: NodeStyle,
    pub primary: NodeStyle,
    pub secondary: NodeStyle,
    pub error: NodeStyle,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_string(),
            font_family: "Helvetica, Arial, sans-serif".to_string(),
            font_size: 14.0,
            edge_font_size: 12.0,
            line_height: 18.0,
            line_color: "#555555".to_string(),
            edge_text: "#333333".to_string(),
            edge_label_background: "#ffffff".to_string(),
            central: NodeStyle::new("#1f4e79", "#163a5a", "#ffffff", 2.5),
            primary: NodeStyle::new("#add8e6", "#4682b4", "#000000", 1.5),
            secondary: NodeStyle::new("#f0f8ff", "#87ceeb", "#000000", 1.0),
            error: NodeStyle::new("#ff6b6b", "#b22222", "#ffffff", 2.0),
        }
    }
}

impl Theme {
    pub fn style_for(&self, role: NodeRole) -> &NodeStyle {
        match role {
            NodeRole::Central => &self.central,
            NodeRole::Primary => &self.primary,
            NodeRole::Secondary => &self.secondary,
            NodeRole::Error => &self.error,
        }
    }
}

/// Serialize a placed graph as a standalone SVG document.
pub fn render_svg(layout: &Layout, graph: &RenderGraph, theme: &Theme) -> String {
    let width = layout.width.max(1.0);
    let height = layout.height.max(1.0);
    let mut svg = String::new();

    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\" viewBox=\"0 0 {width:.2} {height:.2}\" data-layout=\"{}\">",
        layout.style
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    );
    let _ = write!(
        svg,
        "<defs><marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"7\" markerHeight=\"7\" orient=\"auto\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker></defs>",
        theme.line_color
    );

    for edge in &layout.edges {
        let label = graph
            .edges
            .get(edge.index)
            .map(|e| e.label.as_str())
            .unwrap_or_default();
        svg.push_str(&edge_svg(edge, label, theme));
    }

    for node in &layout.nodes {
        svg.push_str(&node_svg(node, graph, theme));
    }

    svg.push_str("</svg>");
    svg
}

/// Single red node with `message`. Never fails.
pub fn render_error_svg(message: &str, theme: &Theme, config: &LayoutConfig) -> String {
    let layout = error_layout(message, config);
    render_svg(&layout, &RenderGraph::placeholder(message), theme)
}

fn edge_svg(edge: &PlacedEdge, label: &str, theme: &Theme) -> String {
    let (sx, sy) = edge.start;
    let (ex, ey) = edge.end;

    let d = if edge.self_loop {
        format!(
            "M {sx:.2} {sy:.2} C {:.2} {:.2}, {:.2} {:.2}, {ex:.2} {ey:.2}",
            sx + 50.0,
            sy,
            ex + 10.0,
            ey - 50.0
        )
    } else {
        format!("M {sx:.2} {sy:.2} L {ex:.2} {ey:.2}")
    };

    let mut out = format!(
        "<path class=\"edge\" d=\"{d}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.4\" marker-end=\"url(#arrow)\"/>",
        theme.line_color
    );

    if !label.is_empty() {
        let (lx, ly) = edge.label_pos;
        let w = label.chars().count() as f64 * theme.edge_font_size * 0.55 + 8.0;
        let h = theme.edge_font_size + 6.0;
        let _ = write!(
            out,
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" rx=\"3\" fill=\"{}\" fill-opacity=\"0.85\"/>",
            lx - w / 2.0,
            ly - h / 2.0,
            theme.edge_label_background
        );
        let _ = write!(
            out,
            "<text class=\"edge-label\" x=\"{lx:.2}\" y=\"{ly:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            escape_xml(&theme.font_family),
            theme.edge_font_size,
            theme.edge_text,
            escape_xml(label)
        );
    }

    out
}

fn node_svg(node: &PlacedNode, graph: &RenderGraph, theme: &Theme) -> String {
    let style = theme.style_for(node.role);
    let x = node.x - node.width / 2.0;
    let y = node.y - node.height / 2.0;
    let source = graph.nodes.get(node.index);

    let mut out = format!(
        "<g class=\"node {}\" data-id=\"{}\">",
        node.role.as_str(),
        escape_xml(source.map(|n| n.id.as_str()).unwrap_or_default())
    );

    if let Some(description) = source.and_then(|n| n.description.as_deref()) {
        let _ = write!(out, "<title>{}</title>", escape_xml(description));
    }

    let _ = write!(
        out,
        "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>",
        node.width, node.height, style.fill, style.stroke, style.stroke_width
    );

    let weight = if node.role == NodeRole::Central { " font-weight=\"bold\"" } else { "" };
    let first_y = node.y - (node.lines.len().saturating_sub(1)) as f64 * theme.line_height / 2.0;
    let _ = write!(
        out,
        "<text x=\"{:.2}\" y=\"{first_y:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\"{weight}>",
        node.x,
        escape_xml(&theme.font_family),
        theme.font_size,
        style.text
    );
    for (i, line) in node.lines.iter().enumerate() {
        let dy = if i == 0 { 0.0 } else { theme.line_height };
        let _ = write!(
            out,
            "<tspan x=\"{:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            node.x,
            escape_xml(line)
        );
    }
    out.push_str("</text></g>");

    out
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::compute_layout;
    use crate::model::{LayoutStyle, RenderEdge, RenderNode};

    fn sample() -> RenderGraph {
        RenderGraph {
            nodes: vec![
                RenderNode {
                    id: "n0".to_string(),
                    label: "Water & Ice".to_string(),
                    description: Some("Frozen <solid> state".to_string()),
                },
                RenderNode {
                    id: "n1".to_string(),
                    label: "Steam".to_string(),
                    description: None,
                },
            ],
            edges: vec![RenderEdge {
                source: "n0".to_string(),
                target: "n1".to_string(),
                label: "becomes".to_string(),
            }],
            root: Some("n0".to_string()),
        }
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn renders_nodes_edges_and_labels() {
        let graph = sample();
        let layout = compute_layout(&graph, LayoutStyle::Hierarchical, &LayoutConfig::default()).unwrap();
        let svg = render_svg(&layout, &graph, &Theme::default());

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Water &amp; Ice"));
        assert!(svg.contains(">becomes</text>"));
        assert!(svg.contains("<title>Frozen &lt;solid&gt; state</title>"));
        assert!(svg.contains("class=\"node central\""));
        assert!(svg.contains("class=\"node primary\""));
        assert!(svg.contains("fill=\"#1f4e79\""));
        assert_eq!(svg.matches("class=\"edge\"").count(), 1);
    }

    #[test]
    fn error_svg_is_red_single_node() {
        let svg = render_error_svg("Could not build map", &Theme::default(), &LayoutConfig::default());

        assert!(svg.contains("Could not build map"));
        assert!(svg.contains("class=\"node error\""));
        assert!(svg.contains("fill=\"#ff6b6b\""));
        assert_eq!(svg.matches("<rect x=").count(), 1);
    }
}
