#![allow(dead_code)]

use bevy::math::{Vec2, Vec3};
use route_annotation_engine::annotation::{LineAttributes, Scope};
use route_annotation_engine::engine::viewer::Viewer;
use route_annotation_engine::remote::client::RemoteAnnotationStore;
use route_annotation_engine::remote::outbox::execute;
use route_annotation_engine::tools::editor::AnnotationEditor;

/// Front view from far out on +Z; screen pixels map linearly onto world x/y.
pub struct ScriptedViewer {
    pub scale: f32,
    pub center: Vec2,
    hits: Vec<(Vec2, Vec3)>,
}

impl Default for ScriptedViewer {
    fn default() -> Self {
        Self {
            scale: 50.0,
            center: Vec2::new(640.0, 360.0),
            hits: Vec::new(),
        }
    }
}

impl ScriptedViewer {
    pub fn screen_of(&self, world: Vec3) -> Vec2 {
        Vec2::new(
            self.center.x + world.x * self.scale,
            self.center.y - world.y * self.scale,
        )
    }

    /// Makes a click at the returned screen point land on `world`.
    pub fn surface(&mut self, world: Vec3) -> Vec2 {
        let screen = self.screen_of(world);
        self.hits.push((screen, world));
        screen
    }
}

impl Viewer for ScriptedViewer {
    fn world_to_screen(&self, world: Vec3) -> Option<Vec2> {
        Some(self.screen_of(world))
    }

    fn camera_position(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, 5000.0)
    }

    fn camera_pitch(&self) -> f32 {
        -0.3
    }

    fn pick_depth(&mut self, screen: Vec2) -> Option<Vec3> {
        self.hits
            .iter()
            .find(|(at, _)| at.distance(screen) < 0.5)
            .map(|(_, world)| *world)
    }

    fn pick_structure(&mut self, _screen: Vec2) -> Option<Vec3> {
        None
    }

    fn pick_ellipsoid(&mut self, _screen: Vec2) -> Option<Vec3> {
        None
    }
}

pub fn scope() -> Scope {
    Scope::new("acme", "north", "block-a")
}

/// Runs a full drawing session through the editor's public input entry points.
pub fn draw(
    editor: &mut AnnotationEditor,
    viewer: &mut ScriptedViewer,
    points: &[Vec3],
    attributes: LineAttributes,
) -> Option<route_annotation_engine::annotation::AnnotationId> {
    editor.start_drawing();
    for point in points {
        let screen = viewer.surface(*point);
        editor.on_primary_click(screen, viewer);
    }
    editor.on_secondary_click();
    editor.confirm_attributes(Some(attributes))
}

/// Executes every queued remote operation and feeds the outcomes back.
pub fn flush(editor: &mut AnnotationEditor, store: &dyn RemoteAnnotationStore) {
    while !editor.outbox().is_empty() {
        for op in editor.take_outbox() {
            let outcome = execute(store, op);
            editor.apply_outcome(outcome);
        }
    }
}
