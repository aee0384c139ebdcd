use bevy::prelude::*;

use crate::annotation::{LineAttributes, ProblemRecord};
use crate::rpc::web_rpc::WebRpcInterface;
use crate::tools::editor::{AnnotationEditor, NotificationLevel};
#[cfg(not(target_arch = "wasm32"))]
use crate::tools::ui::FocusedField;

/// File written by the export action on native builds.
#[cfg(not(target_arch = "wasm32"))]
pub const EXPORT_FILE: &str = "lines_export.json";

/// Editor-level actions requested from keyboard shortcuts or RPC.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct EditorCommandEvent {
    pub command: EditorCommand,
    pub source: CommandSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorCommand {
    SetEditing(bool),
    ToggleEditing,
    StartDrawing,
    CancelDrawing,
    /// Commits the pending line; `None` keeps the attributes typed in the modal.
    ConfirmAttributes(Option<LineAttributes>),
    SetLabelsVisible(bool),
    ToggleLabels,
    SetLinesVisible(bool),
    ToggleLines,
    CenterView,
    ExportLines,
    Reload,
}

/// Source of a command for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Rpc,
    Keyboard,
}

/// Applies one command to the editor. Returns exported records for
/// `ExportLines`, handed to the platform sink by the caller.
pub fn apply_command(editor: &mut AnnotationEditor, command: &EditorCommand) -> Option<Vec<ProblemRecord>> {
    match command {
        EditorCommand::SetEditing(editing) => {
            editor.set_editing(*editing);
        }
        EditorCommand::ToggleEditing => {
            editor.toggle_editing();
        }
        EditorCommand::StartDrawing => {
            editor.start_drawing();
        }
        EditorCommand::CancelDrawing => {
            editor.cancel_drawing();
        }
        EditorCommand::ConfirmAttributes(attributes) => {
            if editor.confirm_attributes(attributes.clone()).is_none() {
                warn!("No captured line is waiting for attributes");
            }
        }
        EditorCommand::SetLabelsVisible(visible) => editor.set_labels_visible(*visible),
        EditorCommand::ToggleLabels => {
            let visible = !editor.scene().labels_visible();
            editor.set_labels_visible(visible);
        }
        EditorCommand::SetLinesVisible(visible) => editor.set_lines_visible(*visible),
        EditorCommand::ToggleLines => {
            let visible = !editor.scene().lines_visible();
            editor.set_lines_visible(visible);
        }
        EditorCommand::CenterView => {
            if editor.center_view().is_none() {
                warn!("Nothing to center the view on");
            }
        }
        EditorCommand::ExportLines => return Some(editor.export_records()),
        EditorCommand::Reload => editor.request_reload(),
    }
    None
}

/// System handling editor commands with platform-specific export.
pub fn handle_editor_commands(
    mut events: EventReader<EditorCommandEvent>,
    mut editor: ResMut<AnnotationEditor>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for event in events.read() {
        debug!("Editor command {:?} from {:?}", event.command, event.source);
        let Some(records) = apply_command(&mut editor, &event.command) else {
            continue;
        };

        match export_records(&records) {
            Ok(location) => {
                info!("Exported {} lines to {}", records.len(), location);
                rpc_interface.send_notification(
                    "lines_exported",
                    serde_json::json!({ "count": records.len(), "lines": records }),
                );
            }
            Err(error) => {
                error!("Export failed: {}", error);
                editor.notify(NotificationLevel::Error, format!("Export failed: {error}"));
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn export_records(records: &[ProblemRecord]) -> Result<String, String> {
    let json = serde_json::to_string_pretty(records).map_err(|e| e.to_string())?;
    std::fs::write(EXPORT_FILE, json).map_err(|e| e.to_string())?;
    Ok(EXPORT_FILE.to_string())
}

// The host page receives the records through the `lines_exported` notification.
#[cfg(target_arch = "wasm32")]
fn export_records(_records: &[ProblemRecord]) -> Result<String, String> {
    Ok("host page".to_string())
}

/// System handling keyboard shortcuts for editor actions (native builds only).
#[cfg(not(target_arch = "wasm32"))]
pub fn handle_editor_keyboard_shortcuts(
    keyboard: Res<ButtonInput<KeyCode>>,
    focused_field: Res<FocusedField>,
    mut command_events: EventWriter<EditorCommandEvent>,
) {
    // Typing into a field must not trigger shortcuts.
    if focused_field.target.is_some() {
        return;
    }

    let shortcuts = [
        (KeyCode::KeyE, EditorCommand::ToggleEditing),
        (KeyCode::KeyD, EditorCommand::StartDrawing),
        (KeyCode::KeyL, EditorCommand::ToggleLabels),
        (KeyCode::KeyK, EditorCommand::ToggleLines),
        (KeyCode::KeyC, EditorCommand::CenterView),
        (KeyCode::KeyX, EditorCommand::ExportLines),
        (KeyCode::KeyR, EditorCommand::Reload),
    ];
    for (key, command) in shortcuts {
        if keyboard.just_pressed(key) {
            command_events.write(EditorCommandEvent {
                command,
                source: CommandSource::Keyboard,
            });
        }
    }
}

/// Placeholder system for WASM builds where keyboard shortcuts are disabled.
#[cfg(target_arch = "wasm32")]
pub fn handle_editor_keyboard_shortcuts() {
    // No keyboard shortcuts in WASM builds - editor controlled via RPC only.
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Scope;
    use crate::tools::drawing::DrawingPhase;
    use constants::coordinate_system::GeoFrame;

    fn editor() -> AnnotationEditor {
        AnnotationEditor::new(Scope::new("acme", "north", "block-a"), GeoFrame::default())
    }

    #[test]
    fn toggles_flip_visibility() {
        let mut editor = editor();
        apply_command(&mut editor, &EditorCommand::ToggleLabels);
        assert!(!editor.scene().labels_visible());
        apply_command(&mut editor, &EditorCommand::ToggleLines);
        assert!(!editor.scene().lines_visible());
        apply_command(&mut editor, &EditorCommand::SetLinesVisible(true));
        assert!(editor.scene().lines_visible());
    }

    #[test]
    fn start_drawing_only_takes_effect_while_editing() {
        let mut editor = editor();
        apply_command(&mut editor, &EditorCommand::StartDrawing);
        assert_eq!(editor.drawing_phase(), DrawingPhase::Idle);

        apply_command(&mut editor, &EditorCommand::SetEditing(true));
        apply_command(&mut editor, &EditorCommand::StartDrawing);
        assert_eq!(editor.drawing_phase(), DrawingPhase::Capturing);
        assert!(!editor.is_vertex_edit_armed());

        apply_command(&mut editor, &EditorCommand::CancelDrawing);
        assert_eq!(editor.drawing_phase(), DrawingPhase::Idle);
        assert!(editor.is_vertex_edit_armed());
    }

    #[test]
    fn export_returns_records_and_reload_queues_listing() {
        let mut editor = editor();
        assert_eq!(apply_command(&mut editor, &EditorCommand::ExportLines), Some(Vec::new()));
        assert_eq!(apply_command(&mut editor, &EditorCommand::Reload), None);
        assert_eq!(editor.outbox().len(), 1);
    }
}
