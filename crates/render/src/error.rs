use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Graph has no nodes")]
    EmptyGraph,

    #[error("No concept frequencies to chart")]
    EmptyChart,

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Edge {from} -> {to} references an unknown node")]
    DanglingEdge { from: String, to: String },

    #[error("Rasterization failed: {0}")]
    Raster(String),

    #[error("Graphviz failed: {0}")]
    Graphviz(String),
}
