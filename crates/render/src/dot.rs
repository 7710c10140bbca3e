//! Optional Graphviz backend: emit DOT and let an installed layout engine draw it.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::RenderError;
use crate::layout::{NodeRole, assign_roles, sibling_groups};
use crate::model::{LayoutStyle, RenderGraph};
use crate::svg::Theme;

/// Graphviz program best suited to a layout style.
pub fn engine_for(style: LayoutStyle) -> &'static str {
    match style {
        LayoutStyle::Hierarchical => "dot",
        LayoutStyle::Radial => "twopi",
        LayoutStyle::Network => "neato",
    }
}

pub fn to_dot(graph: &RenderGraph, style: LayoutStyle, theme: &Theme) -> String {
    let mut out = String::from("digraph ConceptMap {\n");

    match style {
        LayoutStyle::Hierarchical => {
            out.push_str("  rankdir=TB;\n  splines=polyline;\n  nodesep=1;\n  ranksep=2;\n");
        }
        LayoutStyle::Radial => {
            out.push_str("  overlap=false;\n  ranksep=2;\n");
            if let Some(root) = &graph.root {
                out.push_str(&format!("  root=\"{}\";\n", escape_dot(root)));
            }
        }
        LayoutStyle::Network => {
            out.push_str("  overlap=false;\n  splines=true;\n  sep=\"+20\";\n");
        }
    }
    out.push_str(&format!(
        "  bgcolor=\"{}\";\n  node [shape=box, style=\"rounded,filled\", fontname=\"Helvetica\", fontsize={}];\n  edge [fontname=\"Helvetica\", fontsize={}, color=\"{}\"];\n",
        theme.background, theme.font_size, theme.edge_font_size, theme.line_color
    ));

    let roles = assign_roles(graph);
    for (node, role) in graph.nodes.iter().zip(&roles) {
        let style_for = theme.style_for(*role);
        let mut attrs = format!(
            "label=\"{}\", fillcolor=\"{}\", color=\"{}\", fontcolor=\"{}\", penwidth={}",
            escape_dot(&node.label),
            style_for.fill,
            style_for.stroke,
            style_for.text,
            style_for.stroke_width
        );
        if *role == NodeRole::Central {
            attrs.push_str(", fontsize=16");
        }
        if let Some(description) = &node.description {
            attrs.push_str(&format!(", tooltip=\"{}\"", escape_dot(description)));
        }
        out.push_str(&format!("  \"{}\" [{}];\n", escape_dot(&node.id), attrs));
    }

    for edge in &graph.edges {
        out.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
            escape_dot(&edge.source),
            escape_dot(&edge.target),
            escape_dot(&edge.label)
        ));
    }

    if style == LayoutStyle::Hierarchical {
        for group in sibling_groups(graph) {
            let members: Vec<String> = group
                .iter()
                .filter_map(|&i| graph.nodes.get(i))
                .map(|n| format!("\"{}\"", escape_dot(&n.id)))
                .collect();
            out.push_str(&format!("  {{ rank=same; {}; }}\n", members.join("; ")));
        }
    }

    out.push_str("}\n");
    out
}

fn escape_dot(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[derive(Debug, Clone)]
pub struct GraphvizEngine {
    /// Directory holding the Graphviz binaries, or empty to use `PATH`.
    pub bin_dir: String,
}

impl GraphvizEngine {
    pub fn new(bin_dir: impl Into<String>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
        }
    }

    fn program(&self, style: LayoutStyle) -> String {
        let name = engine_for(style);
        if self.bin_dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.bin_dir.trim_end_matches('/'), name)
        }
    }

    /// Run the layout engine and return the SVG it writes.
    pub fn render_svg(&self, graph: &RenderGraph, style: LayoutStyle, theme: &Theme) -> Result<Vec<u8>, RenderError> {
        graph.validate()?;

        let program = self.program(style);
        let dot = to_dot(graph, style, theme);

        let mut child = Command::new(&program)
            .arg("-Tsvg")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RenderError::Graphviz(format!("failed to start {}: {}", program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(dot.as_bytes()) {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(RenderError::Graphviz(format!("failed to write DOT input: {}", e)));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| RenderError::Graphviz(e.to_string()))?;

        if !output.status.success() {
            return Err(RenderError::Graphviz(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::debug!(engine = %program, bytes = output.stdout.len(), "Graphviz rendered SVG");
        Ok(output.stdout)
    }
}

impl Default for GraphvizEngine {
    fn default() -> Self {
        Self::new("")
    }
}
