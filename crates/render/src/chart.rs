//! Frequency charts: word clouds and packed bubble charts.

use extract::ConceptFrequency;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::str::FromStr;
use tracing::debug;

use crate::error::RenderError;
use crate::layout::wrap_label;
use crate::svg::escape_xml;

const WORD_COLORS: [&str; 6] = ["#440154", "#414487", "#2a788e", "#22a884", "#5ec962", "#3b528b"];

const BUBBLE_COLORS: [&str; 10] = [
    "#8B9EB7", "#B79F8B", "#8BB795", "#B78B8B", "#9B8BB7", "#B7B78B", "#8BB7B7", "#B78BB7", "#B7958B",
    "#8B95B7",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    WordCloud,
    BubbleChart,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::WordCloud => "wordcloud",
            ChartKind::BubbleChart => "bubblechart",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::WordCloud => "Word Cloud of Key Concepts",
            ChartKind::BubbleChart => "Concept Frequency",
        }
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "wordcloud" => Ok(ChartKind::WordCloud),
            "bubblechart" | "bubble" => Ok(ChartKind::BubbleChart),
            other => Err(format!("unknown chart kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Word cloud canvas, title band included.
    pub width: f64,
    pub height: f64,
    pub title_height: f64,
    pub margin: f64,
    pub font_family: String,
    pub min_font_size: f64,
    pub max_font_size: f64,
    /// Glyph advance as a fraction of the font size.
    pub char_width_ratio: f64,
    pub min_radius: f64,
    pub max_radius: f64,
    /// Extra room around each bubble, as a fraction of its radius.
    pub bubble_padding: f64,
    pub max_terms: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 440.0,
            title_height: 40.0,
            margin: 20.0,
            font_family: "Helvetica, Arial, sans-serif".to_string(),
            min_font_size: 14.0,
            max_font_size: 64.0,
            char_width_ratio: 0.6,
            min_radius: 28.0,
            max_radius: 90.0,
            bubble_padding: 0.1,
            max_terms: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordPlacement {
    pub concept: String,
    pub frequency: usize,
    /// Center of the word's box.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
}

impl WordPlacement {
    fn overlaps(&self, x: f64, y: f64, width: f64, height: f64, gap: f64) -> bool {
        (self.x - x).abs() * 2.0 < self.width + width + gap * 2.0
            && (self.y - y).abs() * 2.0 < self.height + height + gap * 2.0
    }
}

#[derive(Debug, Clone)]
pub struct WordCloud {
    pub words: Vec<WordPlacement>,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubblePlacement {
    pub concept: String,
    pub frequency: usize,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

#[derive(Debug, Clone)]
pub struct BubbleChart {
    pub bubbles: Vec<BubblePlacement>,
    pub width: f64,
    pub height: f64,
}

/// Most frequent first, ties in listing order, capped at `max_terms`.
fn ranked(frequencies: &[ConceptFrequency], max_terms: usize) -> Result<Vec<&ConceptFrequency>, RenderError> {
    let mut terms: Vec<&ConceptFrequency> = frequencies.iter().filter(|t| t.frequency > 0).collect();
    if terms.is_empty() {
        return Err(RenderError::EmptyChart);
    }
    terms.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    terms.truncate(max_terms.max(1));
    Ok(terms)
}

/// Place words along an Archimedean spiral, largest first.
///
/// Font size scales with frequency relative to the most frequent concept.
/// A word that finds no room shrinks until it fits or drops below the
/// minimum size, in which case it is left out.
pub fn layout_word_cloud(frequencies: &[ConceptFrequency], config: &ChartConfig) -> Result<WordCloud, RenderError> {
    let terms = ranked(frequencies, config.max_terms)?;
    let top_count = terms[0].frequency as f64;

    let top = config.title_height;
    let (width, height) = (config.width, config.height);
    let (cx, cy) = (width / 2.0, top + (height - top) / 2.0);
    let stretch = (width / (height - top).max(1.0)).max(1.0);

    let mut words: Vec<WordPlacement> = Vec::with_capacity(terms.len());

    for term in terms {
        let share = term.frequency as f64 / top_count;
        let mut size = config.min_font_size + (config.max_font_size - config.min_font_size) * share;
        let chars = term.concept.chars().count().max(1) as f64;

        let placed = loop {
            let w = chars * size * config.char_width_ratio + 4.0;
            let h = size * 1.15;

            let spot = (0..4000).find_map(|step| {
                let theta = step as f64 * 0.1;
                let r = 1.2 * theta;
                let x = cx + r * theta.cos() * stretch;
                let y = cy + r * theta.sin();
                let inside = x - w / 2.0 >= 0.0
                    && x + w / 2.0 <= width
                    && y - h / 2.0 >= top
                    && y + h / 2.0 <= height;
                (inside && !words.iter().any(|p| p.overlaps(x, y, w, h, 2.0))).then_some((x, y, w, h))
            });

            if let Some(spot) = spot {
                break Some((spot, size));
            }
            if size <= config.min_font_size {
                break None;
            }
            size = (size * 0.85).max(config.min_font_size);
        };

        match placed {
            Some(((x, y, w, h), font_size)) => words.push(WordPlacement {
                concept: term.concept.clone(),
                frequency: term.frequency,
                x,
                y,
                width: w,
                height: h,
                font_size,
            }),
            None => debug!(concept = %term.concept, "No room left in word cloud"),
        }
    }

    Ok(WordCloud { words, width, height })
}

/// Pack one circle per concept without overlaps, radius by square-root scaled frequency.
///
/// Circles go largest first; each next one touches an already placed circle
/// at the free spot closest to the center.
pub fn pack_bubbles(frequencies: &[ConceptFrequency], config: &ChartConfig) -> Result<BubbleChart, RenderError> {
    let terms = ranked(frequencies, config.max_terms)?;

    let min = terms.iter().map(|t| t.frequency).min().unwrap_or(0) as f64;
    let max = terms.iter().map(|t| t.frequency).max().unwrap_or(0) as f64;
    let range = if max > min { max - min } else { 1.0 };
    let radius_of = |f: usize| {
        config.min_radius + ((f as f64 - min) / range).sqrt() * (config.max_radius - config.min_radius)
    };

    let pad = 1.0 + config.bubble_padding;
    let mut circles: Vec<(f64, f64, f64)> = Vec::with_capacity(terms.len());

    for term in &terms {
        let r = radius_of(term.frequency) * pad;
        if circles.is_empty() {
            circles.push((0.0, 0.0, r));
            continue;
        }

        let mut best: Option<(f64, f64)> = None;
        for &(px, py, pr) in &circles {
            for k in 0..72 {
                let angle = k as f64 * PI / 36.0;
                let x = px + (pr + r) * angle.cos();
                let y = py + (pr + r) * angle.sin();
                let free = circles
                    .iter()
                    .all(|&(ox, oy, or)| ((ox - x).powi(2) + (oy - y).powi(2)).sqrt() >= or + r - 1e-6);
                if free && best.is_none_or(|(bx, by)| x.hypot(y) < bx.hypot(by) - 1e-9) {
                    best = Some((x, y));
                }
            }
        }

        let (x, y) = best.unwrap_or_else(|| {
            let reach = circles
                .iter()
                .map(|&(cx, cy, cr)| cx.hypot(cy) + cr)
                .fold(0.0, f64::max);
            (reach + r, 0.0)
        });
        circles.push((x, y, r));
    }

    let min_x = circles.iter().map(|&(x, _, r)| x - r).fold(f64::INFINITY, f64::min);
    let max_x = circles.iter().map(|&(x, _, r)| x + r).fold(f64::NEG_INFINITY, f64::max);
    let min_y = circles.iter().map(|&(_, y, r)| y - r).fold(f64::INFINITY, f64::min);
    let max_y = circles.iter().map(|&(_, y, r)| y + r).fold(f64::NEG_INFINITY, f64::max);

    let shift_x = config.margin - min_x;
    let shift_y = config.title_height + config.margin - min_y;
    let width = (max_x - min_x + 2.0 * config.margin).max(config.min_radius * 4.0);
    let height = max_y - min_y + 2.0 * config.margin + config.title_height;

    let bubbles = terms
        .iter()
        .zip(&circles)
        .map(|(term, &(x, y, r))| BubblePlacement {
            concept: term.concept.clone(),
            frequency: term.frequency,
            x: x + shift_x,
            y: y + shift_y,
            radius: r / pad,
        })
        .collect();

    Ok(BubbleChart { bubbles, width, height })
}

fn svg_open(svg: &mut String, width: f64, height: f64, kind: ChartKind, config: &ChartConfig) {
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\" viewBox=\"0 0 {width:.2} {height:.2}\" data-chart=\"{}\">",
        kind.as_str()
    );
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"#ffffff\"/>");
    let _ = write!(
        svg,
        "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"18\" fill=\"#333333\">{}</text>",
        width / 2.0,
        config.title_height * 0.65,
        escape_xml(&config.font_family),
        kind.title()
    );
}

pub fn word_cloud_svg(cloud: &WordCloud, config: &ChartConfig) -> String {
    let mut svg = String::new();
    svg_open(&mut svg, cloud.width, cloud.height, ChartKind::WordCloud, config);

    for (i, word) in cloud.words.iter().enumerate() {
        let _ = write!(
            svg,
            "<text class=\"word\" x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{:.1}\" font-weight=\"bold\" fill=\"{}\" data-frequency=\"{}\">{}</text>",
            word.x,
            word.y,
            escape_xml(&config.font_family),
            word.font_size,
            WORD_COLORS[i % WORD_COLORS.len()],
            word.frequency,
            escape_xml(&word.concept)
        );
    }

    svg.push_str("</svg>");
    svg
}

pub fn bubble_chart_svg(chart: &BubbleChart, config: &ChartConfig) -> String {
    let mut svg = String::new();
    svg_open(&mut svg, chart.width, chart.height, ChartKind::BubbleChart, config);

    for (i, bubble) in chart.bubbles.iter().enumerate() {
        let _ = write!(
            svg,
            "<g class=\"bubble\" data-frequency=\"{}\"><circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"{}\" fill-opacity=\"0.85\" stroke=\"#ffffff\" stroke-width=\"2\"/>",
            bubble.frequency,
            bubble.x,
            bubble.y,
            bubble.radius,
            BUBBLE_COLORS[i % BUBBLE_COLORS.len()]
        );

        let font_size = (bubble.radius * 0.3).clamp(9.0, 16.0);
        let line_height = font_size * 1.2;
        let wrap = ((bubble.radius * 1.6) / (font_size * config.char_width_ratio)).max(4.0) as usize;
        let mut lines = wrap_label(&bubble.concept, wrap);
        lines.push(format!("({})", bubble.frequency));

        let first_y = bubble.y - (lines.len() - 1) as f64 * line_height / 2.0;
        let _ = write!(
            svg,
            "<text text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{:.1}\" font-weight=\"bold\" fill=\"#333333\">",
            escape_xml(&config.font_family),
            font_size
        );
        for (n, line) in lines.iter().enumerate() {
            let _ = write!(
                svg,
                "<tspan x=\"{:.2}\" y=\"{:.2}\">{}</tspan>",
                bubble.x,
                first_y + n as f64 * line_height,
                escape_xml(line)
            );
        }
        svg.push_str("</text></g>");
    }

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freqs(items: &[(&str, usize)]) -> Vec<ConceptFrequency> {
        items.iter().map(|(c, f)| ConceptFrequency::new(*c, *f)).collect()
    }

    #[test]
    fn chart_kind_parsing() {
        assert_eq!("wordcloud".parse::<ChartKind>().unwrap(), ChartKind::WordCloud);
        assert_eq!("Bubble-Chart".parse::<ChartKind>().unwrap(), ChartKind::BubbleChart);
        assert!("pie".parse::<ChartKind>().is_err());
    }

    #[test]
    fn empty_frequencies_are_an_error() {
        let config = ChartConfig::default();
        assert!(matches!(layout_word_cloud(&[], &config), Err(RenderError::EmptyChart)));
        assert!(matches!(
            pack_bubbles(&freqs(&[("zero", 0)]), &config),
            Err(RenderError::EmptyChart)
        ));
    }

    #[test]
    fn word_cloud_sizes_by_frequency_without_overlap() {
        let config = ChartConfig::default();
        let terms = freqs(&[
            ("energy", 2),
            ("photosynthesis", 9),
            ("chlorophyll", 4),
            ("glucose", 4),
            ("oxygen", 1),
            ("carbon dioxide", 3),
        ]);

        let cloud = layout_word_cloud(&terms, &config).unwrap();
        assert_eq!(cloud.words.len(), 6);
        assert_eq!(cloud.words[0].concept, "photosynthesis");
        assert!(cloud.words[0].font_size > cloud.words[1].font_size);
        assert!(cloud.words.iter().all(|w| w.font_size >= config.min_font_size));

        for (i, a) in cloud.words.iter().enumerate() {
            assert!(a.x - a.width / 2.0 >= 0.0 && a.x + a.width / 2.0 <= config.width);
            assert!(a.y - a.height / 2.0 >= config.title_height && a.y + a.height / 2.0 <= config.height);
            for b in &cloud.words[i + 1..] {
                assert!(!a.overlaps(b.x, b.y, b.width, b.height, 0.0), "{} overlaps {}", a.concept, b.concept);
            }
        }

        let again = layout_word_cloud(&terms, &config).unwrap();
        assert_eq!(cloud.words, again.words);
    }

    #[test]
    fn bubbles_scale_with_frequency_and_do_not_overlap() {
        let config = ChartConfig::default();
        let chart = pack_bubbles(&freqs(&[("a", 1), ("b", 10), ("c", 5), ("d", 1), ("e", 3)]), &config).unwrap();

        assert_eq!(chart.bubbles.len(), 5);
        assert_eq!(chart.bubbles[0].concept, "b");
        assert!((chart.bubbles[0].radius - config.max_radius).abs() < 1e-9);
        let smallest = chart.bubbles.iter().find(|b| b.concept == "a").unwrap();
        assert!((smallest.radius - config.min_radius).abs() < 1e-9);

        for (i, a) in chart.bubbles.iter().enumerate() {
            assert!(a.x - a.radius >= 0.0 && a.x + a.radius <= chart.width + 1e-6);
            assert!(a.y - a.radius >= config.title_height - 1e-6 && a.y + a.radius <= chart.height + 1e-6);
            for b in &chart.bubbles[i + 1..] {
                let distance = (a.x - b.x).hypot(a.y - b.y);
                assert!(distance >= a.radius + b.radius - 1e-6);
            }
        }
    }

    #[test]
    fn equal_frequencies_share_the_minimum_radius() {
        let config = ChartConfig::default();
        let chart = pack_bubbles(&freqs(&[("x", 2), ("y", 2), ("z", 2)]), &config).unwrap();
        assert!(chart.bubbles.iter().all(|b| (b.radius - config.min_radius).abs() < 1e-9));
    }

    #[test]
    fn svg_documents_carry_labels_and_counts() {
        let config = ChartConfig::default();
        let terms = freqs(&[("Cell & Membrane", 3), ("ATP", 1)]);

        let cloud = word_cloud_svg(&layout_word_cloud(&terms, &config).unwrap(), &config);
        assert!(cloud.starts_with("<svg"));
        assert!(cloud.contains("data-chart=\"wordcloud\""));
        assert!(cloud.contains("Cell &amp; Membrane"));
        assert!(cloud.contains("Word Cloud of Key Concepts"));

        let bubbles = bubble_chart_svg(&pack_bubbles(&terms, &config).unwrap(), &config);
        assert!(bubbles.contains("data-chart=\"bubblechart\""));
        assert!(bubbles.contains("(3)"));
        assert_eq!(bubbles.matches("<circle").count(), 2);
    }
}
