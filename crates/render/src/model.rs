use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use unify::ConceptGraph;

use crate::error::RenderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderNode {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderEdge {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Nodes/edges view of a concept map, as consumed by the layout step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderGraph {
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
    /// Id of the node drawn as the central concept, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl RenderGraph {
    /// One node per unique concept (ids `n0`, `n1`, ...), one edge per relation instance.
    pub fn from_concept_graph(graph: &ConceptGraph) -> Self {
        let names = graph.concept_names();
        let ids: HashMap<&str, String> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, format!("n{}", i)))
            .collect();

        let nodes = names
            .iter()
            .map(|name| RenderNode {
                id: ids[name].clone(),
                label: name.to_string(),
                description: None,
            })
            .collect();

        let edges = graph
            .edges()
            .map(|(subject, relation, object)| RenderEdge {
                source: ids[subject].clone(),
                target: ids[object].clone(),
                label: relation.to_string(),
            })
            .collect();

        Self {
            nodes,
            edges,
            root: graph.root().map(|name| ids[name].clone()),
        }
    }

    /// Single red node carrying `message`.
    pub fn placeholder(message: &str) -> Self {
        Self {
            nodes: vec![RenderNode {
                id: "error".to_string(),
                label: message.to_string(),
                description: None,
            }],
            edges: Vec::new(),
            root: Some("error".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.nodes.is_empty() {
            return Err(RenderError::EmptyGraph);
        }

        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(RenderError::DuplicateNode(node.id.clone()));
            }
        }

        for edge in &self.edges {
            if !ids.contains(edge.source.as_str()) || !ids.contains(edge.target.as_str()) {
                return Err(RenderError::DanglingEdge {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                });
            }
        }

        Ok(())
    }

    /// Node id -> position in `nodes`.
    pub fn node_index(&self) -> HashMap<&str, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.as_str(), i))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStyle {
    #[default]
    Hierarchical,
    Radial,
    Network,
}

impl LayoutStyle {
    /// Unknown or missing styles fall back to hierarchical.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            None => Self::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(layout_style = raw, "Unknown layout style, using hierarchical");
                Self::default()
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutStyle::Hierarchical => "hierarchical",
            LayoutStyle::Radial => "radial",
            LayoutStyle::Network => "network",
        }
    }
}

impl FromStr for LayoutStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hierarchical" => Ok(LayoutStyle::Hierarchical),
            "radial" => Ok(LayoutStyle::Radial),
            "network" => Ok(LayoutStyle::Network),
            other => Err(format!("unknown layout style: {}", other)),
        }
    }
}

impl fmt::Display for LayoutStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Svg,
    Png,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Svg => "svg",
            ImageFormat::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::Png => "image/png",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(ImageFormat::Svg),
            "png" => Ok(ImageFormat::Png),
            other => Err(format!("unknown image format: {}", other)),
        }
    }
}

/// Base64-encoded diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedImage {
    pub image: String,
    pub format: ImageFormat,
}

impl RenderedImage {
    pub fn from_bytes(bytes: &[u8], format: ImageFormat) -> Self {
        Self {
            image: STANDARD.encode(bytes),
            format,
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.image)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime_type(), self.image)
    }
}
