use std::fmt;

use bevy::prelude::*;
use constants::coordinate_system::GeoFrame;
use constants::render_settings::{HIGHLIGHT_ALPHA, LINE_ALPHA};
use serde::{Deserialize, Serialize};

use super::grade::{GradeStyle, classify};

/// Local identity of a line annotation, stable for the lifetime of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(pub u64);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line#{}", self.0)
    }
}

/// Organization / area / structure triple addressing one set of lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub organization: String,
    pub area: String,
    pub structure: String,
}

impl Scope {
    pub fn new(
        organization: impl Into<String>,
        area: impl Into<String>,
        structure: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            area: area.into(),
            structure: structure.into(),
        }
    }

    /// Parses `"org/area/structure"`; every segment must be non-empty.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().trim_matches('/').split('/');
        let organization = parts.next().filter(|s| !s.is_empty())?;
        let area = parts.next().filter(|s| !s.is_empty())?;
        let structure = parts.next().filter(|s| !s.is_empty())?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(organization, area, structure))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.organization, self.area, self.structure)
    }
}

/// Editable text attributes of a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAttributes {
    pub name: String,
    pub grade: String,
    pub grade_alt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeField {
    Name,
    Grade,
    GradeAlt,
}

impl AttributeField {
    pub const ALL: [AttributeField; 3] = [Self::Name, Self::Grade, Self::GradeAlt];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Grade => "Grade",
            Self::GradeAlt => "Grade (sit start)",
        }
    }
}

impl LineAttributes {
    pub fn new(
        name: impl Into<String>,
        grade: impl Into<String>,
        grade_alt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            grade: grade.into(),
            grade_alt: grade_alt.into(),
        }
    }

    pub fn field(&self, field: AttributeField) -> &str {
        match field {
            AttributeField::Name => &self.name,
            AttributeField::Grade => &self.grade,
            AttributeField::GradeAlt => &self.grade_alt,
        }
    }

    pub fn field_mut(&mut self, field: AttributeField) -> &mut String {
        match field {
            AttributeField::Name => &mut self.name,
            AttributeField::Grade => &mut self.grade,
            AttributeField::GradeAlt => &mut self.grade_alt,
        }
    }

    /// Lexicographically greatest non-blank grade. Plain string order, so
    /// "7a" outranks "10a"; empty when both grades are blank.
    pub fn effective_grade(&self) -> &str {
        [self.grade.as_str(), self.grade_alt.as_str()]
            .into_iter()
            .filter(|grade| !grade.trim().is_empty())
            .max()
            .unwrap_or("")
    }

    pub fn label_text(&self) -> String {
        format!("{} \n {} ss", self.grade, self.grade_alt)
    }
}

/// Metrics derived from geometry only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineMetrics {
    /// Sum of consecutive segment lengths (metres).
    pub length: f32,
    /// Geodetic height range across all points (metres).
    pub height: f32,
}

impl LineMetrics {
    pub fn from_points(points: &[Vec3], frame: &GeoFrame) -> Self {
        let length = points
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum();

        let heights = points
            .iter()
            .map(|point| frame.world_to_geodetic(*point).height);
        let (min, max) = heights.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), h| {
            (lo.min(h), hi.max(h))
        });
        let height = if points.is_empty() { 0.0 } else { (max - min) as f32 };

        Self { length, height }
    }
}

/// Resolved display color and stroke width of a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineDisplay {
    pub color: Srgba,
    pub width: f32,
}

impl LineDisplay {
    pub fn normal(style: GradeStyle) -> Self {
        Self {
            color: Srgba {
                alpha: LINE_ALPHA,
                ..style.color
            },
            width: style.width,
        }
    }

    /// Same hue and width, raised alpha.
    pub fn highlighted(style: GradeStyle) -> Self {
        Self {
            color: Srgba {
                alpha: HIGHLIGHT_ALPHA,
                ..style.color
            },
            width: style.width,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineAnnotation {
    pub id: AnnotationId,
    pub remote_id: Option<String>,
    pub attributes: LineAttributes,
    pub points: Vec<Vec3>,
    pub metrics: LineMetrics,
    pub display: LineDisplay,
    pub highlighted: bool,
}

impl LineAnnotation {
    pub fn new(
        id: AnnotationId,
        remote_id: Option<String>,
        attributes: LineAttributes,
        points: Vec<Vec3>,
        frame: &GeoFrame,
    ) -> Self {
        let metrics = LineMetrics::from_points(&points, frame);
        let display = LineDisplay::normal(classify(attributes.effective_grade()));
        Self {
            id,
            remote_id,
            attributes,
            points,
            metrics,
            display,
            highlighted: false,
        }
    }

    pub fn grade_style(&self) -> GradeStyle {
        classify(self.attributes.effective_grade())
    }

    /// Re-derives metrics and display from the current geometry and attributes.
    pub fn refresh(&mut self, frame: &GeoFrame) {
        self.metrics = LineMetrics::from_points(&self.points, frame);
        self.refresh_display();
    }

    pub fn refresh_display(&mut self) {
        let style = self.grade_style();
        self.display = if self.highlighted {
            LineDisplay::highlighted(style)
        } else {
            LineDisplay::normal(style)
        };
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
        self.refresh_display();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constants::coordinate_system::Geodetic;

    #[test]
    fn effective_grade_is_lexicographic_max_of_non_blank() {
        assert_eq!(LineAttributes::new("", "6a", "6b").effective_grade(), "6b");
        assert_eq!(LineAttributes::new("", "7a", "").effective_grade(), "7a");
        assert_eq!(LineAttributes::new("", "  ", "5c").effective_grade(), "5c");
        assert_eq!(LineAttributes::new("", "", "").effective_grade(), "");
        // String order, not difficulty order.
        assert_eq!(LineAttributes::new("", "10a", "7a").effective_grade(), "7a");
    }

    #[test]
    fn label_text_keeps_empty_parts() {
        assert_eq!(LineAttributes::new("x", "6a", "").label_text(), "6a \n  ss");
    }

    #[test]
    fn scope_parses_three_segments() {
        let scope = Scope::parse("acme/north/block-a").expect("three segments");
        assert_eq!(scope.to_string(), "acme/north/block-a");
        assert_eq!(Scope::parse("acme/north"), None);
        assert_eq!(Scope::parse("a/b/c/d"), None);
        assert_eq!(Scope::parse("a//c"), None);
    }

    #[test]
    fn metrics_recompute_is_idempotent() {
        let frame = GeoFrame::new(Geodetic::new(45.0, 6.0, 1000.0));
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(3.0, 4.0, 0.0),
            Vec3::new(3.0, 4.0, 2.0),
        ];
        let mut line = LineAnnotation::new(
            AnnotationId(1),
            None,
            LineAttributes::new("a", "6b", ""),
            points,
            &frame,
        );
        let first = line.metrics;
        line.refresh(&frame);
        assert_eq!(line.metrics, first);
        assert!((first.length - 7.0).abs() < 1e-5);
        assert!((first.height - 4.0).abs() < 1e-2);
    }

    #[test]
    fn highlight_keeps_hue_and_width() {
        let frame = GeoFrame::default();
        let mut line = LineAnnotation::new(
            AnnotationId(1),
            None,
            LineAttributes::new("a", "7b", ""),
            vec![Vec3::ZERO, Vec3::X],
            &frame,
        );
        let base = line.display;
        line.set_highlighted(true);
        assert_eq!(line.display.width, base.width);
        assert_eq!(line.display.color.red, base.color.red);
        assert!(line.display.color.alpha > base.color.alpha);

        line.set_highlighted(false);
        assert_eq!(line.display, LineDisplay::normal(classify("7b")));
    }
}
