use std::collections::BTreeMap;

use bevy::prelude::*;
use constants::coordinate_system::GeoFrame;

use super::model::{AnnotationId, LineAnnotation, LineAttributes};
use super::record::ProblemRecord;

/// Outcome of replacing the store contents with a remote listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub loaded: Vec<AnnotationId>,
    /// Remote ids (or names when the id is absent) of records dropped as malformed.
    pub dropped: Vec<String>,
}

/// Client-side mirror of all committed lines. Write-through: callers enqueue
/// the matching persistence operation themselves.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    lines: BTreeMap<AnnotationId, LineAnnotation>,
    frame: GeoFrame,
    next_id: u64,
}

impl AnnotationStore {
    pub fn new(frame: GeoFrame) -> Self {
        Self {
            frame,
            ..default()
        }
    }

    pub fn frame(&self) -> &GeoFrame {
        &self.frame
    }

    /// Later loads and metric recomputes use the new frame; existing geometry is left as is.
    pub fn set_frame(&mut self, frame: GeoFrame) {
        self.frame = frame;
    }

    fn allocate_id(&mut self) -> AnnotationId {
        self.next_id += 1;
        AnnotationId(self.next_id)
    }

    /// Replaces the whole set. Records with fewer than two positions are dropped.
    pub fn load(&mut self, records: Vec<ProblemRecord>) -> LoadReport {
        self.lines.clear();
        let mut report = LoadReport::default();

        for record in records {
            if record.positions.len() < 2 {
                let key = record.id.clone().unwrap_or_else(|| record.name.clone());
                warn!(
                    "Dropping line record '{}' with {} position(s)",
                    key,
                    record.positions.len()
                );
                report.dropped.push(key);
                continue;
            }

            let points = record
                .positions
                .iter()
                .map(|position| self.frame.geodetic_to_world(position))
                .collect();
            let id = self.allocate_id();
            let line = LineAnnotation::new(
                id,
                record.id.clone(),
                record.attributes(),
                points,
                &self.frame,
            );
            self.lines.insert(id, line);
            report.loaded.push(id);
        }

        info!(
            "Annotation store loaded {} lines ({} dropped)",
            report.loaded.len(),
            report.dropped.len()
        );
        report
    }

    pub fn add(
        &mut self,
        attributes: LineAttributes,
        points: Vec<Vec3>,
        remote_id: Option<String>,
    ) -> AnnotationId {
        let id = self.allocate_id();
        let line = LineAnnotation::new(id, remote_id, attributes, points, &self.frame);
        self.lines.insert(id, line);
        id
    }

    /// Applies `edit` then re-derives metrics and display.
    pub fn update(&mut self, id: AnnotationId, edit: impl FnOnce(&mut LineAnnotation)) -> bool {
        let Some(line) = self.lines.get_mut(&id) else {
            return false;
        };
        edit(line);
        line.refresh(&self.frame);
        true
    }

    pub fn recompute_metrics(&mut self, id: AnnotationId) -> bool {
        self.update(id, |_| {})
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<LineAnnotation> {
        self.lines.remove(&id)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn get(&self, id: AnnotationId) -> Option<&LineAnnotation> {
        self.lines.get(&id)
    }

    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut LineAnnotation> {
        self.lines.get_mut(&id)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.lines.contains_key(&id)
    }

    /// Creation order.
    pub fn iter(&self) -> impl Iterator<Item = &LineAnnotation> {
        self.lines.values()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// First line holding a point exactly equal to `point`.
    pub fn find_owner_of_point(&self, point: Vec3) -> Option<AnnotationId> {
        self.lines
            .values()
            .find(|line| line.points.contains(&point))
            .map(|line| line.id)
    }

    pub fn find_by_remote_id(&self, remote_id: &str) -> Option<AnnotationId> {
        self.lines
            .values()
            .find(|line| line.remote_id.as_deref() == Some(remote_id))
            .map(|line| line.id)
    }

    pub fn to_record(&self, id: AnnotationId) -> Option<ProblemRecord> {
        self.get(id)
            .map(|line| ProblemRecord::from_line(line, &self.frame))
    }

    pub fn export_records(&self) -> Vec<ProblemRecord> {
        self.lines
            .values()
            .map(|line| ProblemRecord::from_line(line, &self.frame))
            .collect()
    }
}
