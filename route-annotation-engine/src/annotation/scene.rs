use std::collections::{BTreeMap, BTreeSet};

use bevy::prelude::*;

use super::model::AnnotationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRole {
    /// Removable vertex marker created when a line is committed.
    Endpoint,
    /// Follows the pointer while a drawing session is capturing.
    Floating,
}

/// Everything the editor shows on top of the structure. Owners are weak
/// references: the line itself lives in the annotation store.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEntity {
    Line {
        owner: AnnotationId,
    },
    Label {
        owner: AnnotationId,
    },
    Point {
        owner: Option<AnnotationId>,
        position: Vec3,
        role: MarkerRole,
    },
    /// Geometry is recomputed from the drawing session every frame.
    PreviewLine,
}

impl SceneEntity {
    pub fn owner(&self) -> Option<AnnotationId> {
        match self {
            Self::Line { owner } | Self::Label { owner } => Some(*owner),
            Self::Point { owner, .. } => *owner,
            Self::PreviewLine => None,
        }
    }
}

/// Changes since the last [`SceneGraph::take_changes`].
#[derive(Debug, Default, PartialEq)]
pub struct SceneChanges {
    pub changed: Vec<SceneId>,
    pub removed: Vec<SceneId>,
}

impl SceneChanges {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Pure-data mirror of the displayed overlay entities, drained into ECS by
/// the scene sync systems.
#[derive(Debug)]
pub struct SceneGraph {
    entities: BTreeMap<SceneId, SceneEntity>,
    changed: BTreeSet<SceneId>,
    removed: BTreeSet<SceneId>,
    next_id: u64,
    lines_visible: bool,
    labels_visible: bool,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            changed: BTreeSet::new(),
            removed: BTreeSet::new(),
            next_id: 0,
            lines_visible: true,
            labels_visible: true,
        }
    }
}

impl SceneGraph {
    pub fn add(&mut self, entity: SceneEntity) -> SceneId {
        self.next_id += 1;
        let id = SceneId(self.next_id);
        self.entities.insert(id, entity);
        self.changed.insert(id);
        id
    }

    pub fn remove(&mut self, id: SceneId) -> Option<SceneEntity> {
        let entity = self.entities.remove(&id)?;
        self.changed.remove(&id);
        self.removed.insert(id);
        Some(entity)
    }

    pub fn get(&self, id: SceneId) -> Option<&SceneEntity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: SceneId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SceneId, &SceneEntity)> {
        self.entities.iter().map(|(id, entity)| (*id, entity))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Marks an entity for re-sync after its backing data changed.
    pub fn touch(&mut self, id: SceneId) {
        if self.entities.contains_key(&id) {
            self.changed.insert(id);
        }
    }

    /// Re-syncs every entity owned by `owner` (line, label, markers).
    pub fn touch_owner(&mut self, owner: AnnotationId) {
        let owned: Vec<SceneId> = self.owned_by(owner).collect();
        self.changed.extend(owned);
    }

    pub fn move_point(&mut self, id: SceneId, to: Vec3) -> bool {
        match self.entities.get_mut(&id) {
            Some(SceneEntity::Point { position, .. }) => {
                *position = to;
                self.changed.insert(id);
                true
            }
            _ => false,
        }
    }

    pub fn owned_by(&self, owner: AnnotationId) -> impl Iterator<Item = SceneId> + '_ {
        self.entities
            .iter()
            .filter(move |(_, entity)| entity.owner() == Some(owner))
            .map(|(id, _)| *id)
    }

    pub fn line_of(&self, owner: AnnotationId) -> Option<SceneId> {
        self.iter()
            .find(|(_, entity)| matches!(entity, SceneEntity::Line { owner: o } if *o == owner))
            .map(|(id, _)| id)
    }

    pub fn label_of(&self, owner: AnnotationId) -> Option<SceneId> {
        self.iter()
            .find(|(_, entity)| matches!(entity, SceneEntity::Label { owner: o } if *o == owner))
            .map(|(id, _)| id)
    }

    /// Removes the line, its label and its markers.
    pub fn remove_owned(&mut self, owner: AnnotationId) -> usize {
        let owned: Vec<SceneId> = self.owned_by(owner).collect();
        for id in &owned {
            self.remove(*id);
        }
        owned.len()
    }

    /// Removes every committed-line entity, keeping drawing-session entities.
    pub fn clear_owned(&mut self) {
        let owned: Vec<SceneId> = self
            .iter()
            .filter(|(_, entity)| entity.owner().is_some())
            .map(|(id, _)| id)
            .collect();
        for id in owned {
            self.remove(id);
        }
    }

    /// Endpoint marker within `threshold` of `screen`, closest first.
    pub fn nearest_marker(
        &self,
        screen: Vec2,
        threshold: f32,
        project: impl Fn(Vec3) -> Option<Vec2>,
    ) -> Option<(SceneId, Vec3)> {
        self.iter()
            .filter_map(|(id, entity)| match entity {
                SceneEntity::Point {
                    position,
                    role: MarkerRole::Endpoint,
                    ..
                } => {
                    let distance = project(*position)?.distance(screen);
                    (distance < threshold).then_some((id, *position, distance))
                }
                _ => None,
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(id, position, _)| (id, position))
    }

    pub fn count(&self, predicate: impl Fn(&SceneEntity) -> bool) -> usize {
        self.entities.values().filter(|entity| predicate(entity)).count()
    }

    pub fn lines_visible(&self) -> bool {
        self.lines_visible
    }

    pub fn labels_visible(&self) -> bool {
        self.labels_visible
    }

    pub fn set_lines_visible(&mut self, visible: bool) {
        if self.lines_visible != visible {
            self.lines_visible = visible;
            self.touch_kind(|entity| matches!(entity, SceneEntity::Line { .. }));
        }
    }

    pub fn set_labels_visible(&mut self, visible: bool) {
        if self.labels_visible != visible {
            self.labels_visible = visible;
            self.touch_kind(|entity| matches!(entity, SceneEntity::Label { .. }));
        }
    }

    fn touch_kind(&mut self, predicate: impl Fn(&SceneEntity) -> bool) {
        let ids: Vec<SceneId> = self
            .iter()
            .filter(|(_, entity)| predicate(entity))
            .map(|(id, _)| id)
            .collect();
        self.changed.extend(ids);
    }

    pub fn take_changes(&mut self) -> SceneChanges {
        SceneChanges {
            changed: std::mem::take(&mut self.changed).into_iter().collect(),
            removed: std::mem::take(&mut self.removed).into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_owned_leaves_unowned_entities() {
        let mut scene = SceneGraph::default();
        let owner = AnnotationId(7);
        scene.add(SceneEntity::Line { owner });
        scene.add(SceneEntity::Label { owner });
        scene.add(SceneEntity::Point {
            owner: Some(owner),
            position: Vec3::ZERO,
            role: MarkerRole::Endpoint,
        });
        let preview = scene.add(SceneEntity::PreviewLine);

        assert_eq!(scene.remove_owned(owner), 3);
        assert_eq!(scene.len(), 1);
        assert!(scene.contains(preview));
    }

    #[test]
    fn changes_are_drained_once() {
        let mut scene = SceneGraph::default();
        let a = scene.add(SceneEntity::PreviewLine);
        let b = scene.add(SceneEntity::Line { owner: AnnotationId(1) });
        scene.remove(a);

        let changes = scene.take_changes();
        assert_eq!(changes.changed, vec![b]);
        assert_eq!(changes.removed, vec![a]);
        assert!(scene.take_changes().is_empty());
    }

    #[test]
    fn nearest_marker_ignores_floating_points() {
        let mut scene = SceneGraph::default();
        scene.add(SceneEntity::Point {
            owner: None,
            position: Vec3::ZERO,
            role: MarkerRole::Floating,
        });
        let endpoint = scene.add(SceneEntity::Point {
            owner: Some(AnnotationId(1)),
            position: Vec3::new(5.0, 0.0, 0.0),
            role: MarkerRole::Endpoint,
        });

        let project = |p: Vec3| Some(p.truncate() * 10.0);
        assert_eq!(scene.nearest_marker(Vec2::ZERO, 10.0, project), None);
        assert_eq!(
            scene.nearest_marker(Vec2::new(48.0, 0.0), 10.0, project),
            Some((endpoint, Vec3::new(5.0, 0.0, 0.0)))
        );
    }
}
