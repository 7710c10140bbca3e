use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-wide counters. The only state shared between requests.
#[derive(Default)]
pub struct Metrics {
    text_requests: AtomicUsize,
    drawing_requests: AtomicUsize,
    visualize_requests: AtomicUsize,
    key_concept_requests: AtomicUsize,

    chunks_processed: AtomicUsize,
    triples_extracted: AtomicUsize,
    extraction_fallbacks: AtomicUsize,
    unify_fallbacks: AtomicUsize,
    drawing_fallbacks: AtomicUsize,
    key_concept_failures: AtomicUsize,

    // Microseconds
    total_extract_time_us: AtomicU64,
    total_unify_time_us: AtomicU64,
    unify_calls: AtomicUsize,
    total_render_time_us: AtomicU64,
    renders: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_text_request(&self) {
        self.text_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drawing(&self, fallback: bool) {
        self.drawing_requests.fetch_add(1, Ordering::Relaxed);
        if fallback {
            self.drawing_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_visualize(&self) {
        self.visualize_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_key_concepts(&self, failed: bool) {
        self.key_concept_requests.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.key_concept_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_extract(&self, duration: Duration, chunks: usize, triples: usize, fallbacks: usize) {
        self.total_extract_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.chunks_processed.fetch_add(chunks, Ordering::Relaxed);
        self.triples_extracted.fetch_add(triples, Ordering::Relaxed);
        self.extraction_fallbacks.fetch_add(fallbacks, Ordering::Relaxed);
    }

    pub fn record_unify(&self, duration: Duration, fallback: bool) {
        self.total_unify_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.unify_calls.fetch_add(1, Ordering::Relaxed);
        if fallback {
            self.unify_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_render(&self, duration: Duration) {
        self.total_render_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.renders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let text_requests = self.text_requests.load(Ordering::Relaxed);
        MetricsSnapshot {
            text_requests,
            drawing_requests: self.drawing_requests.load(Ordering::Relaxed),
            visualize_requests: self.visualize_requests.load(Ordering::Relaxed),
            key_concept_requests: self.key_concept_requests.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            triples_extracted: self.triples_extracted.load(Ordering::Relaxed),
            extraction_fallbacks: self.extraction_fallbacks.load(Ordering::Relaxed),
            unify_fallbacks: self.unify_fallbacks.load(Ordering::Relaxed),
            drawing_fallbacks: self.drawing_fallbacks.load(Ordering::Relaxed),
            key_concept_failures: self.key_concept_failures.load(Ordering::Relaxed),
            avg_extract_time_ms: avg_time_ms(&self.total_extract_time_us, text_requests),
            avg_unify_time_ms: avg_time_ms(&self.total_unify_time_us, self.unify_calls.load(Ordering::Relaxed)),
            avg_render_time_ms: avg_time_ms(&self.total_render_time_us, self.renders.load(Ordering::Relaxed)),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    if count > 0 {
        total / count as f64 / 1000.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub text_requests: usize,
    pub drawing_requests: usize,
    pub visualize_requests: usize,
    pub key_concept_requests: usize,
    pub chunks_processed: usize,
    pub triples_extracted: usize,
    pub extraction_fallbacks: usize,
    pub unify_fallbacks: usize,
    pub drawing_fallbacks: usize,
    pub key_concept_failures: usize,
    pub avg_extract_time_ms: f64,
    pub avg_unify_time_ms: f64,
    pub avg_render_time_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
