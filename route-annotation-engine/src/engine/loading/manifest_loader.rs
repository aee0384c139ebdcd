use bevy::asset::LoadState;
use bevy::prelude::*;
use constants::coordinate_system::GeoFrame;

use crate::config::EngineConfig;
use crate::engine::assets::structure_manifest::StructureManifest;
use crate::engine::camera::viewport_camera::ViewportCamera;
use crate::engine::loading::progress::LoadingProgress;
use crate::engine::scene_sync::OverlayMesh;
use crate::tools::editor::{AnnotationEditor, StructureBounds};

/// Radius used when no manifest could be loaded.
const FALLBACK_RADIUS: f32 = 20.0;

#[derive(Resource, Default)]
pub struct ManifestLoader {
    handle: Option<Handle<StructureManifest>>,
}

/// Root of the spawned structure glTF scene.
#[derive(Component)]
pub struct StructureModel;

/// Mesh belonging to the structure model; the only target of structure picks.
#[derive(Component)]
pub struct StructureMesh;

// Start the loading process
pub fn start_loading(
    mut manifest_loader: ResMut<ManifestLoader>,
    asset_server: Res<AssetServer>,
    config: Res<EngineConfig>,
) {
    let manifest_path = config.manifest_path();
    info!("Loading structure manifest {}", manifest_path);
    manifest_loader.handle = Some(asset_server.load(manifest_path));
}

/// Applies the manifest once loaded: world frame, structure bounds, camera
/// and model. A missing manifest falls back to a frame at the null island.
pub fn load_manifest_system(
    mut loading_progress: ResMut<LoadingProgress>,
    manifest_loader: Res<ManifestLoader>,
    manifests: Res<Assets<StructureManifest>>,
    asset_server: Res<AssetServer>,
    config: Res<EngineConfig>,
    mut editor: ResMut<AnnotationEditor>,
    mut commands: Commands,
) {
    if loading_progress.manifest_resolved {
        return;
    }
    let Some(ref handle) = manifest_loader.handle else {
        return;
    };

    if let Some(manifest) = manifests.get(handle) {
        let frame = manifest.frame();
        let (center, radius) = manifest.world_bounds();
        editor.set_structure(frame, StructureBounds { center, radius });
        commands.insert_resource(ViewportCamera::framing(center, radius));

        if let Some(model) = &manifest.model {
            let path = config.structure_asset(model);
            info!("Spawning structure model {}", path);
            commands.spawn((
                SceneRoot(asset_server.load(GltfAssetLabel::Scene(0).from_asset(path))),
                Transform::default(),
                StructureModel,
            ));
            loading_progress.model_requested = true;
        } else {
            warn!("Manifest has no model; projections fall back to the ellipsoid");
        }

        info!(
            "✓ Structure manifest loaded (origin {:?}, radius {:.1} m)",
            manifest.origin, radius
        );
        loading_progress.manifest_resolved = true;
        return;
    }

    if let Some(LoadState::Failed(error)) = asset_server.get_load_state(handle.id()) {
        error!("Structure manifest failed to load: {}", error);
        editor.set_structure(
            GeoFrame::default(),
            StructureBounds {
                center: Vec3::ZERO,
                radius: FALLBACK_RADIUS,
            },
        );
        commands.insert_resource(ViewportCamera::framing(Vec3::ZERO, FALLBACK_RADIUS));
        loading_progress.manifest_failed = true;
        loading_progress.manifest_resolved = true;
    }
}

/// Tags meshes spawned under the structure scene so structure picks can
/// filter on them.
pub fn tag_structure_meshes(
    mut commands: Commands,
    meshes: Query<Entity, (With<Mesh3d>, Without<StructureMesh>, Without<OverlayMesh>)>,
    parents: Query<&ChildOf>,
    models: Query<(), With<StructureModel>>,
) {
    for entity in &meshes {
        let belongs_to_model = parents
            .iter_ancestors(entity)
            .any(|ancestor| models.contains(ancestor));
        if belongs_to_model {
            commands.entity(entity).insert(StructureMesh);
        }
    }
}
