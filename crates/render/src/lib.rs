pub mod chart;
pub mod dot;
pub mod error;
pub mod layout;
pub mod model;
pub mod raster;
pub mod svg;

pub use chart::{
    BubbleChart, BubblePlacement, ChartConfig, ChartKind, WordCloud, WordPlacement, bubble_chart_svg, layout_word_cloud,
    pack_bubbles, word_cloud_svg,
};
pub use dot::{GraphvizEngine, to_dot};
pub use error::RenderError;
pub use layout::{Layout, LayoutConfig, NodeRole, compute_layout, sibling_groups};
pub use model::{ImageFormat, LayoutStyle, RenderEdge, RenderGraph, RenderNode, RenderedImage};
pub use raster::svg_to_png;
pub use svg::{Theme, escape_xml, render_error_svg, render_svg};

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use extract::ConceptFrequency;
use tracing::{error, info, warn};
use unify::ConceptGraph;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderBackend {
    #[default]
    Native,
    Graphviz,
}

impl FromStr for RenderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(RenderBackend::Native),
            "graphviz" | "dot" => Ok(RenderBackend::Graphviz),
            other => Err(format!("unknown render backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub backend: RenderBackend,
    /// Directory of the Graphviz binaries; empty means `PATH`.
    pub graphviz_bin_dir: String,
    /// Longest side of PNG output, if bounded.
    pub png_max_side: Option<u32>,
    #[serde(skip)]
    pub layout: LayoutConfig,
    #[serde(skip)]
    pub theme: Theme,
    #[serde(skip)]
    pub chart: ChartConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: RenderBackend::Native,
            graphviz_bin_dir: String::new(),
            png_max_side: Some(4096),
            layout: LayoutConfig::default(),
            theme: Theme::default(),
            chart: ChartConfig::default(),
        }
    }
}

/// Turns graphs into base64 images. Rendering never fails: any error is
/// drawn as a single red node.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn render_concept_graph(
        &self,
        graph: &ConceptGraph,
        style: LayoutStyle,
        format: ImageFormat,
    ) -> RenderedImage {
        self.render(&RenderGraph::from_concept_graph(graph), style, format)
    }

    pub fn render(&self, graph: &RenderGraph, style: LayoutStyle, format: ImageFormat) -> RenderedImage {
        match self.try_render(graph, style, format) {
            Ok(image) => image,
            Err(e) => {
                error!(error = %e, layout_style = %style, "Error creating visualization");
                self.render_error(&format!("Error: {}", e), format)
            }
        }
    }

    pub fn try_render(
        &self,
        graph: &RenderGraph,
        style: LayoutStyle,
        format: ImageFormat,
    ) -> Result<RenderedImage, RenderError> {
        graph.validate()?;

        let svg = self.svg_bytes(graph, style)?;
        let image = self.encode(&svg, format)?;

        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            layout_style = %style,
            format = image.format.as_str(),
            "Rendered concept map"
        );
        Ok(image)
    }

    /// Frequency chart of key concepts. Like `render`, draws the error
    /// diagram instead of failing.
    pub fn render_chart(&self, frequencies: &[ConceptFrequency], kind: ChartKind, format: ImageFormat) -> RenderedImage {
        match self.try_render_chart(frequencies, kind, format) {
            Ok(image) => image,
            Err(e) => {
                error!(error = %e, chart = kind.as_str(), "Error creating chart");
                self.render_error(&format!("Error: {}", e), format)
            }
        }
    }

    pub fn try_render_chart(
        &self,
        frequencies: &[ConceptFrequency],
        kind: ChartKind,
        format: ImageFormat,
    ) -> Result<RenderedImage, RenderError> {
        let chart = &self.config.chart;
        let (svg, items) = match kind {
            ChartKind::WordCloud => {
                let cloud = layout_word_cloud(frequencies, chart)?;
                (word_cloud_svg(&cloud, chart), cloud.words.len())
            }
            ChartKind::BubbleChart => {
                let bubbles = pack_bubbles(frequencies, chart)?;
                (bubble_chart_svg(&bubbles, chart), bubbles.bubbles.len())
            }
        };
        let image = self.encode(svg.as_bytes(), format)?;

        info!(chart = kind.as_str(), items, format = image.format.as_str(), "Rendered concept chart");
        Ok(image)
    }

    fn encode(&self, svg: &[u8], format: ImageFormat) -> Result<RenderedImage, RenderError> {
        Ok(match format {
            ImageFormat::Svg => RenderedImage::from_bytes(svg, ImageFormat::Svg),
            ImageFormat::Png => {
                let png = svg_to_png(svg, self.config.png_max_side)?;
                RenderedImage::from_bytes(&png, ImageFormat::Png)
            }
        })
    }

    /// Red placeholder diagram. Falls back to SVG when PNG encoding fails.
    pub fn render_error(&self, message: &str, format: ImageFormat) -> RenderedImage {
        let svg = render_error_svg(message, &self.config.theme, &self.config.layout);

        if format == ImageFormat::Png {
            match svg_to_png(svg.as_bytes(), self.config.png_max_side) {
                Ok(png) => return RenderedImage::from_bytes(&png, ImageFormat::Png),
                Err(e) => warn!(error = %e, "Could not rasterize error diagram, returning SVG"),
            }
        }

        RenderedImage::from_bytes(svg.as_bytes(), ImageFormat::Svg)
    }

    fn svg_bytes(&self, graph: &RenderGraph, style: LayoutStyle) -> Result<Vec<u8>, RenderError> {
        if self.config.backend == RenderBackend::Graphviz {
            let engine = GraphvizEngine::new(self.config.graphviz_bin_dir.clone());
            match engine.render_svg(graph, style, &self.config.theme) {
                Ok(svg) => return Ok(svg),
                Err(e) => warn!(error = %e, "Graphviz rendering failed, using native layout"),
            }
        }

        let layout = compute_layout(graph, style, &self.config.layout)?;
        Ok(render_svg(&layout, graph, &self.config.theme).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::Triple;

    fn decode_svg(image: &RenderedImage) -> String {
        String::from_utf8(image.decode().unwrap()).unwrap()
    }

    #[test]
    fn renders_concept_graph_as_svg() {
        let graph = ConceptGraph::from_triples(&[
            Triple::new("Photosynthesis", "converts", "Sunlight"),
            Triple::new("Photosynthesis", "produces", "Oxygen"),
        ]);

        for style in [LayoutStyle::Hierarchical, LayoutStyle::Radial, LayoutStyle::Network] {
            let image = Renderer::default().render_concept_graph(&graph, style, ImageFormat::Svg);
            assert_eq!(image.format, ImageFormat::Svg);
            let svg = decode_svg(&image);
            assert!(svg.contains("Photosynthesis"));
            assert!(svg.contains(&format!("data-layout=\"{}\"", style)));
        }
    }

    #[test]
    fn invalid_graph_becomes_error_diagram() {
        let image = Renderer::default().render(&RenderGraph::default(), LayoutStyle::Radial, ImageFormat::Svg);

        assert!(!image.image.is_empty());
        let svg = decode_svg(&image);
        assert!(svg.contains("Error: Graph has no nodes"));
        assert!(svg.contains("class=\"node error\""));
    }

    #[test]
    fn renders_png_when_asked() {
        let graph = ConceptGraph::from_triples(&[Triple::new("A", "is", "B")]);
        let image = Renderer::default().render_concept_graph(&graph, LayoutStyle::Hierarchical, ImageFormat::Png);

        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(&image.decode().unwrap()[1..4], b"PNG");
    }

    #[test]
    fn graphviz_failure_falls_back_to_native() {
        let renderer = Renderer::new(RenderConfig {
            backend: RenderBackend::Graphviz,
            graphviz_bin_dir: "/nonexistent/graphviz".to_string(),
            ..RenderConfig::default()
        });
        let graph = ConceptGraph::from_triples(&[Triple::new("A", "is", "B")]);

        let image = renderer.render_concept_graph(&graph, LayoutStyle::Hierarchical, ImageFormat::Svg);
        let svg = decode_svg(&image);
        assert!(svg.contains("class=\"node central\""));
    }

    #[test]
    fn renders_frequency_charts() {
        let terms = vec![ConceptFrequency::new("cell", 4), ConceptFrequency::new("membrane", 2)];
        let renderer = Renderer::default();

        let cloud = renderer.render_chart(&terms, ChartKind::WordCloud, ImageFormat::Svg);
        assert!(decode_svg(&cloud).contains("data-chart=\"wordcloud\""));

        let bubbles = renderer.render_chart(&terms, ChartKind::BubbleChart, ImageFormat::Png);
        assert_eq!(bubbles.format, ImageFormat::Png);
        assert_eq!(&bubbles.decode().unwrap()[1..4], b"PNG");
    }

    #[test]
    fn empty_chart_becomes_error_diagram() {
        let image = Renderer::default().render_chart(&[], ChartKind::BubbleChart, ImageFormat::Svg);
        let svg = decode_svg(&image);
        assert!(svg.contains("Error: No concept frequencies to chart"));
    }

    #[test]
    fn backend_parsing() {
        assert_eq!("Graphviz".parse::<RenderBackend>(), Ok(RenderBackend::Graphviz));
        assert_eq!("native".parse::<RenderBackend>(), Ok(RenderBackend::Native));
        assert!("cairo".parse::<RenderBackend>().is_err());
    }
}
