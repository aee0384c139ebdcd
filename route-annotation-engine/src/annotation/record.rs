use constants::coordinate_system::{GeoFrame, Geodetic};
use serde::{Deserialize, Deserializer, Serialize};

use super::model::{LineAnnotation, LineAttributes};

/// Wire shape of one line as exchanged with the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "id_from_any")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub grade: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub grade_ss: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub length: f64,
    #[serde(default, alias = "heigth", deserialize_with = "null_as_default")]
    pub height: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub positions: Vec<Geodetic>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Some backends hand out numeric ids; keep them as strings either way.
fn id_from_any<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(id)) if !id.is_empty() => Some(id),
        Some(serde_json::Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

impl ProblemRecord {
    pub fn from_line(line: &LineAnnotation, frame: &GeoFrame) -> Self {
        Self {
            id: line.remote_id.clone(),
            name: line.attributes.name.clone(),
            grade: line.attributes.grade.clone(),
            grade_ss: line.attributes.grade_alt.clone(),
            length: f64::from(line.metrics.length),
            height: f64::from(line.metrics.height),
            positions: line
                .points
                .iter()
                .map(|point| frame.world_to_geodetic(*point))
                .collect(),
        }
    }

    pub fn attributes(&self) -> LineAttributes {
        LineAttributes::new(&self.name, &self.grade, &self.grade_ss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerates_nulls_and_missing_fields() {
        let record: ProblemRecord = serde_json::from_str(
            r#"{"id": 42, "name": null, "grade": "6a", "heigth": 3.5, "block_id": 7}"#,
        )
        .expect("lenient decode");

        assert_eq!(record.id.as_deref(), Some("42"));
        assert_eq!(record.name, "");
        assert_eq!(record.grade_ss, "");
        assert_eq!(record.height, 3.5);
        assert!(record.positions.is_empty());
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let record = ProblemRecord {
            id: None,
            name: "Arete".into(),
            grade: "6b".into(),
            grade_ss: "6c".into(),
            length: 4.0,
            height: 2.0,
            positions: vec![Geodetic::new(1.0, 2.0, 3.0)],
        };
        let json = serde_json::to_value(&record).expect("serializable");

        assert_eq!(json["grade_ss"], "6c");
        assert_eq!(json["positions"][0]["lat"], 1.0);
        assert!(json.get("id").is_none());
    }
}
