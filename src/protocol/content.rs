//! Domain-specific payload pieces shared by requests and results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::Stroke;

/// Recognition domain selecting the payload variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Math,
    #[default]
    Text,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Math => f.write_str("math"),
            Domain::Text => f.write_str("text"),
        }
    }
}

/// Half-open range of stroke positions `[start, end)` covered by a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StrokeRange {
    pub start: usize,
    pub end: usize,
}

impl StrokeRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Ink unit submitted for recognition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InkComponent {
    Stroke { x: Vec<f64>, y: Vec<f64>, t: Vec<i64> },
}

impl From<&Stroke> for InkComponent {
    fn from(stroke: &Stroke) -> Self {
        InkComponent::Stroke {
            x: stroke.xs(),
            y: stroke.ys(),
            t: stroke.timestamps(),
        }
    }
}

/// A candidate math rendering, e.g. `latex` / `x^2`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MathExpression {
    pub format: String,
    pub value: String,
}

/// An alternative text interpretation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextCandidate {
    pub label: String,
    #[serde(default)]
    pub score: f64,
}

/// Recognized content, one variant per domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum RecognizedContent {
    Math {
        expressions: Vec<MathExpression>,
    },
    Text {
        label: String,
        #[serde(default)]
        candidates: Vec<TextCandidate>,
    },
}

impl RecognizedContent {
    pub fn text(label: impl Into<String>) -> Self {
        RecognizedContent::Text {
            label: label.into(),
            candidates: Vec::new(),
        }
    }

    pub fn latex(value: impl Into<String>) -> Self {
        RecognizedContent::Math {
            expressions: vec![MathExpression {
                format: "latex".to_string(),
                value: value.into(),
            }],
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            RecognizedContent::Math { .. } => Domain::Math,
            RecognizedContent::Text { .. } => Domain::Text,
        }
    }

    /// Best single-line rendering of the content
    pub fn summary(&self) -> String {
        match self {
            RecognizedContent::Math { expressions } => expressions
                .first()
                .map(|e| e.value.clone())
                .unwrap_or_default(),
            RecognizedContent::Text { label, .. } => label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PenStyle, Point};

    #[test]
    fn test_component_from_stroke() {
        let mut stroke = Stroke::new(Point::new(0.0, 1.0, 10), PenStyle::default());
        stroke.push_filtered(Point::new(2.0, 3.0, 20), 0.0);

        let InkComponent::Stroke { x, y, t } = InkComponent::from(&stroke);
        assert_eq!(x, vec![0.0, 2.0]);
        assert_eq!(y, vec![1.0, 3.0]);
        assert_eq!(t, vec![10, 20]);
    }

    #[test]
    fn test_content_tagged_by_domain() {
        let json = serde_json::to_value(RecognizedContent::latex("x^2")).unwrap();
        assert_eq!(json["domain"], "math");
        assert_eq!(json["expressions"][0]["format"], "latex");

        let parsed: RecognizedContent =
            serde_json::from_str(r#"{"domain":"text","label":"hello"}"#).unwrap();
        assert_eq!(parsed, RecognizedContent::text("hello"));
        assert_eq!(parsed.domain(), Domain::Text);
    }

    #[test]
    fn test_stroke_range() {
        let range = StrokeRange::new(2, 5);
        assert_eq!(range.len(), 3);
        assert!(!range.is_empty());
        assert!(StrokeRange::new(4, 1).is_empty());
    }
}
