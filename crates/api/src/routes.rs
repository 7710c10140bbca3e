use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use ocr::{DrawingConcept, DrawingRelationship, DrawingResult, DrawingStructure};
use pipeline::{ConceptMapPipeline, KeyConceptsOutput, MapOutput, MapType, MetricsSnapshot};
use render::{ImageFormat, LayoutStyle, RenderedImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info_span, warn};
use uuid::Uuid;

pub struct AppState {
    pub pipeline: ConceptMapPipeline,
    pub text_model: String,
    pub vision_model: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    text_model: String,
    vision_model: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(default)]
    text: String,
    layout_style: Option<String>,
    format: Option<String>,
    map_type: Option<String>,
}

#[derive(Serialize)]
struct GenerateResponse {
    request_id: String,
    #[serde(flatten)]
    output: MapOutput,
}

#[derive(Deserialize)]
struct KeyConceptsRequest {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct KeyConceptsResponse {
    request_id: String,
    #[serde(flatten)]
    output: KeyConceptsOutput,
}

#[derive(Deserialize)]
struct DrawingRequest {
    #[serde(default)]
    drawing: String,
}

#[derive(Serialize)]
struct DrawingResponse {
    request_id: String,
    #[serde(flatten)]
    result: DrawingResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisualizeRequest {
    #[serde(default)]
    concepts: Vec<DrawingConcept>,
    #[serde(default)]
    relationships: Vec<DrawingRelationship>,
    structure: Option<DrawingStructure>,
    layout_style: Option<String>,
    format: Option<String>,
}

#[derive(Serialize)]
struct VisualizeResponse {
    request_id: String,
    #[serde(flatten)]
    image: RenderedImage,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check).post(health_check))
        .route("/api/concept-map/generate", post(generate_concept_map))
        .route("/api/concept-map/extract-concepts", post(extract_key_concepts))
        .route("/api/concept-map/ocr", post(process_drawing))
        .route("/api/concept-map/visualize", post(visualize))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_format(value: Option<&str>) -> ImageFormat {
    match value {
        None => ImageFormat::default(),
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(format = raw, "Unknown image format, using svg");
            ImageFormat::default()
        }),
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        text_model: state.text_model.clone(),
        vision_model: state.vision_model.clone(),
    })
}

async fn generate_concept_map(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    let request_id = Uuid::new_v4().to_string();
    let map_type = MapType::parse_or_default(req.map_type.as_deref());
    let style = LayoutStyle::parse_or_default(req.layout_style.as_deref());
    // Charts default to PNG.
    let format = match req.format.as_deref() {
        None if map_type.chart_kind().is_some() => ImageFormat::Png,
        other => parse_format(other),
    };

    let span = info_span!(
        "generate",
        request_id = %request_id,
        map_type = %map_type,
        chars = req.text.chars().count()
    );
    let output = state
        .pipeline
        .generate_map(&req.text, map_type, style, format)
        .instrument(span)
        .await;

    Json(GenerateResponse { request_id, output })
}

async fn extract_key_concepts(
    State(state): State<Arc<AppState>>,
    Json(req): Json<KeyConceptsRequest>,
) -> Json<KeyConceptsResponse> {
    let request_id = Uuid::new_v4().to_string();

    let span = info_span!("extract_concepts", request_id = %request_id, chars = req.text.chars().count());
    let output = state
        .pipeline
        .extract_key_concepts(&req.text)
        .instrument(span)
        .await;

    Json(KeyConceptsResponse { request_id, output })
}

async fn process_drawing(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DrawingRequest>,
) -> Json<DrawingResponse> {
    let request_id = Uuid::new_v4().to_string();

    let span = info_span!("drawing", request_id = %request_id, bytes = req.drawing.len());
    let result = state
        .pipeline
        .process_drawing_for_concept_map(&req.drawing)
        .instrument(span)
        .await;

    Json(DrawingResponse { request_id, result })
}

async fn visualize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VisualizeRequest>,
) -> Json<VisualizeResponse> {
    let request_id = Uuid::new_v4().to_string();
    let style = LayoutStyle::parse_or_default(req.layout_style.as_deref());
    let format = parse_format(req.format.as_deref());

    let span = info_span!("visualize", request_id = %request_id, concepts = req.concepts.len());
    let image = state
        .pipeline
        .visualize_concepts(&req.concepts, &req.relationships, req.structure.as_ref(), style, format)
        .instrument(span)
        .await;

    Json(VisualizeResponse { request_id, image })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.pipeline.metrics().snapshot())
}
