use std::sync::Arc;

use bevy::asset::AssetMetaCheck;
use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use bevy_common_assets::json::JsonAssetPlugin;
use constants::coordinate_system::GeoFrame;

use crate::config::EngineConfig;
// Crate engine modules
use crate::engine::assets::structure_manifest::StructureManifest;
use crate::engine::camera::viewport_camera::{
    ViewportCamera, apply_camera_requests, camera_controller,
};
use crate::engine::core::app_state::{AppState, transition_to_running};
use crate::engine::core::window_config::create_window_config;
use crate::engine::loading::manifest_loader::{
    ManifestLoader, load_manifest_system, start_loading, tag_structure_meshes,
};
use crate::engine::loading::progress::LoadingProgress;
use crate::engine::scene_sync::{
    SceneEntityMap, sync_scene_graph, update_label_nodes, update_preview_line,
};
// Persistence and RPC
#[cfg(target_arch = "wasm32")]
use crate::remote::client::FetchAnnotationStore;
#[cfg(not(target_arch = "wasm32"))]
use crate::remote::client::RemoteAnnotationStore;
use crate::remote::persistence::{PersistencePlugin, RemoteStoreHandle};
use crate::rpc::web_rpc::WebRpcPlugin;
// Crate tools modules
use crate::tools::editor::AnnotationEditor;
use crate::tools::input::{
    PointerTracker, UiPointerCapture, route_pointer_input, update_ui_pointer_capture,
};
use crate::tools::tool_manager::{handle_editor_commands, handle_editor_keyboard_shortcuts};
use crate::tools::ui::{EditorUiPlugin, handle_text_input};

pub fn create_app() -> App {
    let config = EngineConfig::from_env();
    let mut app = App::new();

    app.add_plugins(create_default_plugins())
        .init_state::<AppState>()
        // Registers StructureManifest as a loadable asset type from JSON files.
        .add_plugins(JsonAssetPlugin::<StructureManifest>::new(&["json"]))
        .add_plugins(WebRpcPlugin)
        .add_plugins(PersistencePlugin)
        .add_plugins(EditorUiPlugin);

    // Initialise resources early
    app.insert_resource(AnnotationEditor::new(
        config.scope.clone(),
        GeoFrame::default(),
    ))
    .insert_resource(RemoteStoreHandle(create_remote_store(&config)))
    .insert_resource(config)
    .init_resource::<LoadingProgress>()
    .init_resource::<ManifestLoader>()
    .init_resource::<SceneEntityMap>()
    .init_resource::<PointerTracker>()
    .init_resource::<UiPointerCapture>();

    // State-based system scheduling
    app.add_systems(Startup, (setup, start_loading).chain())
        .add_systems(
            Update,
            (load_manifest_system, transition_to_running)
                .chain()
                .run_if(in_state(AppState::Loading)),
        )
        // Scene instances spawn asynchronously, so tagging runs in every state.
        .add_systems(Update, tag_structure_meshes);

    let runtime_systems = (
        // Input routing
        update_ui_pointer_capture,
        route_pointer_input,
        handle_editor_keyboard_shortcuts, // Native shortcuts or no-op for WASM
        handle_text_input,
        handle_editor_commands,
        // Camera
        apply_camera_requests,
        camera_controller,
        // Scene graph mirror
        sync_scene_graph,
        update_preview_line,
        update_label_nodes,
    );

    app.add_systems(
        Update,
        runtime_systems
            .chain()
            .run_if(in_state(AppState::Running)),
    );

    app
}

#[cfg(not(target_arch = "wasm32"))]
fn create_remote_store(config: &EngineConfig) -> Arc<dyn RemoteAnnotationStore> {
    use crate::remote::client::HttpAnnotationStore;
    Arc::new(HttpAnnotationStore::new(config.backend_url.clone()))
}

#[cfg(target_arch = "wasm32")]
fn create_remote_store(config: &EngineConfig) -> Arc<FetchAnnotationStore> {
    Arc::new(FetchAnnotationStore::new(config.backend_url.clone()))
}

fn spawn_lighting(commands: &mut Commands) {
    commands.spawn((
        DirectionalLight {
            shadows_enabled: false,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(
            EulerRot::ZYX,
            0.0,
            1.0,
            -std::f32::consts::FRAC_PI_4,
        )),
    ));
    commands.insert_resource(AmbientLight {
        brightness: 400.0,
        ..default()
    });
}

fn create_viewport_camera(commands: &mut Commands) {
    let viewport = ViewportCamera::default();
    commands.spawn((
        Camera3d::default(),
        viewport.transform(),
        // Layer 1 carries the unlit overlay meshes.
        RenderLayers::default().with(1),
    ));
    commands.insert_resource(viewport);
}

// Startup system that only handles basic initialisation
fn setup(mut commands: Commands) {
    spawn_lighting(&mut commands);
    create_viewport_camera(&mut commands);
}

fn create_default_plugins() -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    DefaultPlugins.set(window_config).set(asset_config)
}
