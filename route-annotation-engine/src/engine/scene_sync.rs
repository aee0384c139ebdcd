use std::collections::HashMap;

use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use constants::render_settings::{
    DRAW_VERTEX_SIZE, FLOATING_VERTEX_SIZE, LABEL_ALPHA, LABEL_BASE_OFFSET_PX, LABEL_FONT_SIZE,
    LINE_WIDTH_WORLD_SCALE, PREVIEW_LINE_ALPHA, PREVIEW_LINE_WIDTH,
};

use crate::annotation::{AnnotationId, LineAnnotation, MarkerRole, SceneEntity, SceneId};
use crate::tools::editor::AnnotationEditor;
use crate::tools::labels::PlacedLabel;

/// ECS entity standing in for one scene graph entry.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneNode(pub SceneId);

/// Annotation geometry; never a target of surface picks.
#[derive(Component)]
pub struct OverlayMesh;

#[derive(Component)]
pub struct LabelNode {
    pub owner: AnnotationId,
}

/// Root of the live drawing preview; its segments are rebuilt every frame.
#[derive(Component)]
pub struct PreviewLineRoot;

#[derive(Component)]
pub struct PreviewSegment;

#[derive(Resource, Default)]
pub struct SceneEntityMap {
    entities: HashMap<SceneId, Entity>,
}

impl SceneEntityMap {
    pub fn get(&self, id: SceneId) -> Option<Entity> {
        self.entities.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn overlay_material(color: Srgba) -> StandardMaterial {
    StandardMaterial {
        base_color: Color::Srgba(color),
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        ..default()
    }
}

fn spawn_segments(
    parent: &mut ChildSpawnerCommands,
    points: &[Vec3],
    thickness: f32,
    meshes: &mut Assets<Mesh>,
    material: &Handle<StandardMaterial>,
) {
    for pair in points.windows(2) {
        let dir = pair[1] - pair[0];
        let dist = dir.length();
        if dist <= 0.001 {
            continue;
        }
        let midpoint = (pair[0] + pair[1]) * 0.5;
        let rot = Quat::from_rotation_arc(Vec3::X, dir / dist);
        parent.spawn((
            Mesh3d(meshes.add(Cuboid::new(dist, thickness, thickness))),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(midpoint).with_rotation(rot),
            OverlayMesh,
            RenderLayers::layer(1),
        ));
    }
}

fn spawn_line(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    id: SceneId,
    line: &LineAnnotation,
    visible: bool,
) -> Entity {
    let material = materials.add(overlay_material(line.display.color));
    let thickness = line.display.width * LINE_WIDTH_WORLD_SCALE;
    commands
        .spawn((
            SceneNode(id),
            Transform::default(),
            visibility(visible),
        ))
        .with_children(|parent| spawn_segments(parent, &line.points, thickness, meshes, &material))
        .id()
}

fn spawn_label(commands: &mut Commands, id: SceneId, label: &PlacedLabel, visible: bool) -> Entity {
    commands
        .spawn((
            SceneNode(id),
            LabelNode { owner: label.owner },
            Text::new(label.text.clone()),
            TextFont {
                font_size: LABEL_FONT_SIZE,
                ..default()
            },
            TextColor(Color::Srgba(Srgba {
                alpha: LABEL_ALPHA,
                ..label.color
            })),
            TextLayout::new_with_justify(JustifyText::Center),
            Node {
                position_type: PositionType::Absolute,
                ..default()
            },
            visibility(visible),
        ))
        .id()
}

fn spawn_marker(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    id: SceneId,
    position: Vec3,
    role: MarkerRole,
) -> Entity {
    let (size, color) = match role {
        MarkerRole::Endpoint => (DRAW_VERTEX_SIZE, Srgba::WHITE),
        MarkerRole::Floating => (FLOATING_VERTEX_SIZE, Srgba::rgb(1.0, 1.0, 0.2)),
    };
    commands
        .spawn((
            SceneNode(id),
            Mesh3d(meshes.add(Sphere::new(size))),
            MeshMaterial3d(materials.add(overlay_material(color))),
            Transform::from_translation(position),
            OverlayMesh,
            RenderLayers::layer(1),
        ))
        .id()
}

fn visibility(visible: bool) -> Visibility {
    if visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    }
}

/// Applies scene graph changes since the last frame: removed entries are
/// despawned, changed entries are despawned and rebuilt from current data.
pub fn sync_scene_graph(
    mut commands: Commands,
    mut editor: ResMut<AnnotationEditor>,
    mut entity_map: ResMut<SceneEntityMap>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let changes = editor.scene_mut().take_changes();
    if changes.is_empty() {
        return;
    }
    let editor: &AnnotationEditor = &editor;
    let scene = editor.scene();

    for id in changes.removed.iter().chain(&changes.changed) {
        if let Some(entity) = entity_map.entities.remove(id) {
            commands.entity(entity).despawn();
        }
    }

    for id in changes.changed {
        let Some(entity) = scene.get(id) else {
            continue;
        };

        let spawned = match entity {
            SceneEntity::Line { owner } => editor.store().get(*owner).map(|line| {
                spawn_line(
                    &mut commands,
                    &mut meshes,
                    &mut materials,
                    id,
                    line,
                    scene.lines_visible(),
                )
            }),
            SceneEntity::Label { owner } => editor
                .labels()
                .get(*owner)
                .map(|label| spawn_label(&mut commands, id, label, scene.labels_visible())),
            SceneEntity::Point { position, role, .. } => Some(spawn_marker(
                &mut commands,
                &mut meshes,
                &mut materials,
                id,
                *position,
                *role,
            )),
            SceneEntity::PreviewLine => Some(
                commands
                    .spawn((
                        SceneNode(id),
                        PreviewLineRoot,
                        Transform::default(),
                        Visibility::default(),
                    ))
                    .id(),
            ),
        };

        match spawned {
            Some(spawned) => {
                entity_map.entities.insert(id, spawned);
            }
            None => debug!("Scene entry {:?} has no backing data yet", id),
        }
    }
}

/// Rebuilds the preview polyline (captured points plus floating point) every frame.
pub fn update_preview_line(
    mut commands: Commands,
    editor: Res<AnnotationEditor>,
    roots: Query<Entity, With<PreviewLineRoot>>,
    existing: Query<Entity, With<PreviewSegment>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // Clear previews every frame
    for e in &existing {
        commands.entity(e).despawn();
    }

    let Ok(root) = roots.single() else {
        return;
    };
    let points = editor.drawing().preview_points();
    if points.len() < 2 {
        return;
    }

    let material = materials.add(overlay_material(Srgba {
        alpha: PREVIEW_LINE_ALPHA,
        ..Srgba::WHITE
    }));
    let thickness = PREVIEW_LINE_WIDTH * LINE_WIDTH_WORLD_SCALE;
    commands.entity(root).with_children(|parent| {
        for pair in points.windows(2) {
            let dir = pair[1] - pair[0];
            let dist = dir.length();
            if dist <= 0.02 {
                continue;
            }
            let midpoint = (pair[0] + pair[1]) * 0.5;
            let rot = Quat::from_rotation_arc(Vec3::X, dir / dist);
            parent.spawn((
                Mesh3d(meshes.add(Cuboid::new(dist, thickness, thickness))),
                MeshMaterial3d(material.clone()),
                Transform::from_translation(midpoint).with_rotation(rot),
                PreviewSegment,
                OverlayMesh,
                RenderLayers::layer(1),
            ));
        }
    });
}

/// Positions label text above its projected anchor, plus the overlap nudge.
pub fn update_label_nodes(
    editor: Res<AnnotationEditor>,
    mut labels: Query<(&LabelNode, &mut Node, &mut Visibility, &ComputedNode)>,
) {
    let labels_visible = editor.scene().labels_visible();

    for (label_node, mut node, mut visibility, computed) in &mut labels {
        let placement = editor
            .labels()
            .get(label_node.owner)
            .and_then(|label| label.screen.map(|screen| (screen, label.offset)));

        match placement {
            Some((screen, offset)) if labels_visible => {
                let size = computed.size() * computed.inverse_scale_factor();
                node.left = Val::Px(screen.x - size.x * 0.5);
                node.top = Val::Px(screen.y - LABEL_BASE_OFFSET_PX - size.y * 0.5 + offset.y);
                *visibility = Visibility::Inherited;
            }
            _ => *visibility = Visibility::Hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{ProblemRecord, Scope};
    use constants::coordinate_system::GeoFrame;

    fn app_with_line() -> App {
        let frame = GeoFrame::default();
        let mut editor = AnnotationEditor::new(Scope::new("acme", "north", "block-a"), frame);
        editor.load_records(vec![ProblemRecord {
            id: Some("r1".into()),
            grade: "6b".into(),
            positions: [Vec3::ZERO, Vec3::Y, Vec3::new(1.0, 2.0, 0.0)]
                .iter()
                .map(|p| frame.world_to_geodetic(*p))
                .collect(),
            ..Default::default()
        }]);

        let mut app = App::new();
        app.insert_resource(editor)
            .init_resource::<SceneEntityMap>()
            .init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<StandardMaterial>>()
            .add_systems(Update, sync_scene_graph);
        app
    }

    fn count<F: bevy::ecs::query::QueryFilter>(app: &mut App) -> usize {
        app.world_mut()
            .query_filtered::<Entity, F>()
            .iter(app.world())
            .count()
    }

    #[test]
    fn loaded_line_spawns_segments_and_label() {
        let mut app = app_with_line();
        app.update();

        assert_eq!(app.world().resource::<SceneEntityMap>().len(), 2);
        assert_eq!(count::<With<LabelNode>>(&mut app), 1);
        assert_eq!(count::<(With<OverlayMesh>, With<Mesh3d>)>(&mut app), 2);
    }

    #[test]
    fn hiding_lines_respawns_them_hidden() {
        let mut app = app_with_line();
        app.update();
        app.world_mut()
            .resource_mut::<AnnotationEditor>()
            .set_lines_visible(false);
        app.update();

        let hidden = app
            .world_mut()
            .query_filtered::<&Visibility, (With<SceneNode>, Without<LabelNode>)>()
            .iter(app.world())
            .all(|visibility| *visibility == Visibility::Hidden);
        assert!(hidden);
        assert_eq!(app.world().resource::<SceneEntityMap>().len(), 2);
    }

    #[test]
    fn reloading_with_no_records_despawns_everything() {
        let mut app = app_with_line();
        app.update();
        app.world_mut()
            .resource_mut::<AnnotationEditor>()
            .load_records(Vec::new());
        app.update();

        assert!(app.world().resource::<SceneEntityMap>().is_empty());
        assert_eq!(count::<With<SceneNode>>(&mut app), 0);
        assert_eq!(count::<With<OverlayMesh>>(&mut app), 0);
    }
}
