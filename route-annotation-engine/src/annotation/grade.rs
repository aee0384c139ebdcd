use bevy::prelude::*;

/// Display style derived from a grade: base hue and stroke width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeStyle {
    pub color: Srgba,
    pub width: f32,
}

#[derive(Debug, Clone, Copy)]
enum GradeRule {
    Prefix(&'static str),
    Exact(&'static str),
    Contains(&'static str),
}

impl GradeRule {
    fn matches(&self, grade: &str) -> bool {
        match self {
            Self::Prefix(prefix) => grade.starts_with(prefix),
            Self::Exact(value) => grade == *value,
            Self::Contains(fragment) => grade.contains(fragment),
        }
    }
}

/// One difficulty band of the classifier table.
#[derive(Debug, Clone, Copy)]
pub struct GradeBucket {
    pub label: &'static str,
    rules: &'static [GradeRule],
    rgb: [u8; 3],
    pub width: f32,
}

impl GradeBucket {
    fn matches(&self, grade: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(grade))
    }

    pub fn style(&self) -> GradeStyle {
        GradeStyle {
            color: Srgba::rgb_u8(self.rgb[0], self.rgb[1], self.rgb[2]),
            width: self.width,
        }
    }
}

/// Ordered easiest to hardest; the first matching bucket wins.
pub const GRADE_BUCKETS: [GradeBucket; 7] = [
    GradeBucket {
        label: "2-4",
        rules: &[
            GradeRule::Prefix("2"),
            GradeRule::Prefix("3"),
            GradeRule::Prefix("4"),
        ],
        rgb: [0x1E, 0x88, 0xE5],
        width: 3.0,
    },
    GradeBucket {
        label: "5-6a",
        rules: &[GradeRule::Prefix("5"), GradeRule::Exact("6a")],
        rgb: [0x43, 0xA0, 0x47],
        width: 3.5,
    },
    GradeBucket {
        label: "6a+-6b+",
        rules: &[GradeRule::Contains("6a+"), GradeRule::Contains("6b")],
        rgb: [0xFF, 0xD6, 0x00],
        width: 4.0,
    },
    GradeBucket {
        label: "6c-7a+",
        rules: &[GradeRule::Contains("6c"), GradeRule::Contains("7a")],
        rgb: [0xFB, 0x8C, 0x00],
        width: 4.5,
    },
    GradeBucket {
        label: "7b-7c+",
        rules: &[GradeRule::Contains("7b"), GradeRule::Contains("7c")],
        rgb: [0xE5, 0x39, 0x35],
        width: 5.0,
    },
    GradeBucket {
        label: "8a-8c+",
        rules: &[
            GradeRule::Contains("8a"),
            GradeRule::Contains("8b"),
            GradeRule::Contains("8c"),
        ],
        rgb: [0x8E, 0x24, 0xAA],
        width: 5.5,
    },
    GradeBucket {
        label: "9+",
        rules: &[GradeRule::Prefix("9")],
        rgb: [0x21, 0x21, 0x21],
        width: 6.0,
    },
];

pub const UNGRADED_WIDTH: f32 = 4.0;

/// Index into [`GRADE_BUCKETS`] of the band a grade falls in.
pub fn bucket_index(grade: &str) -> Option<usize> {
    GRADE_BUCKETS.iter().position(|bucket| bucket.matches(grade))
}

/// Total function: every string maps to a style.
pub fn classify(grade: &str) -> GradeStyle {
    if grade.is_empty() {
        return GradeStyle {
            color: Srgba::WHITE,
            width: UNGRADED_WIDTH,
        };
    }

    match bucket_index(grade) {
        Some(index) => GRADE_BUCKETS[index].style(),
        None => GradeStyle {
            color: Srgba::rgb_u8(0xF5, 0xF5, 0xF5),
            width: UNGRADED_WIDTH,
        },
    }
}
