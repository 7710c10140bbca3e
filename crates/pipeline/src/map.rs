use extract::ConceptFrequency;
use render::{ChartKind, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConceptMapOutput;

/// What to draw from a text: a linked concept map or a frequency chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    #[default]
    Mindmap,
    WordCloud,
    BubbleChart,
}

impl MapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapType::Mindmap => "mindmap",
            MapType::WordCloud => "wordcloud",
            MapType::BubbleChart => "bubblechart",
        }
    }

    /// Chart drawn for this map type; `None` for the concept map.
    pub fn chart_kind(&self) -> Option<ChartKind> {
        match self {
            MapType::Mindmap => None,
            MapType::WordCloud => Some(ChartKind::WordCloud),
            MapType::BubbleChart => Some(ChartKind::BubbleChart),
        }
    }

    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            None => Self::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(map_type = raw, "Unknown map type, using mindmap");
                Self::default()
            }),
        }
    }
}

impl From<ChartKind> for MapType {
    fn from(kind: ChartKind) -> Self {
        match kind {
            ChartKind::WordCloud => MapType::WordCloud,
            ChartKind::BubbleChart => MapType::BubbleChart,
        }
    }
}

impl FromStr for MapType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mindmap" | "conceptmap" => Ok(MapType::Mindmap),
            other => other
                .parse::<ChartKind>()
                .map(MapType::from)
                .map_err(|_| format!("unknown map type: {}", other)),
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key concepts of a text with their counts. `error` is set when the model
/// could not provide a usable list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeyConceptsOutput {
    pub concepts: Vec<String>,
    pub frequencies: Vec<ConceptFrequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A word cloud or bubble chart. The image is the error diagram when `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct FrequencyMapOutput {
    pub image: String,
    pub format: ImageFormat,
    pub map_type: MapType,
    pub concepts: Vec<String>,
    pub frequencies: Vec<ConceptFrequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MapOutput {
    ConceptMap(Box<ConceptMapOutput>),
    Frequency(FrequencyMapOutput),
}

impl MapOutput {
    pub fn image(&self) -> &str {
        match self {
            MapOutput::ConceptMap(output) => &output.image,
            MapOutput::Frequency(output) => &output.image,
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            MapOutput::ConceptMap(output) => output.format,
            MapOutput::Frequency(output) => output.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_type_parsing() {
        assert_eq!("mindmap".parse::<MapType>(), Ok(MapType::Mindmap));
        assert_eq!("WordCloud".parse::<MapType>(), Ok(MapType::WordCloud));
        assert_eq!("bubble_chart".parse::<MapType>(), Ok(MapType::BubbleChart));
        assert_eq!(MapType::parse_or_default(Some("treemap")), MapType::Mindmap);
        assert_eq!(MapType::parse_or_default(None), MapType::Mindmap);
    }

    #[test]
    fn only_frequency_maps_have_a_chart() {
        assert_eq!(MapType::Mindmap.chart_kind(), None);
        assert_eq!(MapType::BubbleChart.chart_kind(), Some(ChartKind::BubbleChart));
        assert_eq!(serde_json::to_value(MapType::WordCloud).unwrap(), "wordcloud");
    }
}
