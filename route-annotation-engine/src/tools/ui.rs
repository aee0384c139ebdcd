use bevy::input::ButtonState;
use bevy::input::keyboard::{Key, KeyboardInput};
use bevy::prelude::*;

use crate::annotation::{AttributeField, LineAnnotation, LineAttributes, LineMetrics};
use crate::tools::drawing::DrawingPhase;
use crate::tools::editor::{AnnotationEditor, NotificationLevel, UserNotification};
use crate::tools::popup::{PopupId, PopupMode, read_only_rows};

/// Text field receiving keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    /// Attribute modal of a finished drawing capture.
    Draft(AttributeField),
    /// Edit popup of the selected line.
    Selected(AttributeField),
}

impl FieldTarget {
    pub fn field(&self) -> AttributeField {
        match self {
            Self::Draft(field) | Self::Selected(field) => *field,
        }
    }
}

#[derive(Resource, Default, Debug)]
pub struct FocusedField {
    pub target: Option<FieldTarget>,
}

/// What a panel button does when pressed.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    Focus(FieldTarget),
    ConfirmAttributes,
    CancelAttributes,
    UpdateLine,
    DeleteLine,
    ConfirmDelete,
    CancelDelete,
    ClosePopup,
    DismissNotification,
}

#[derive(Component)]
struct AttributeModalRoot;

#[derive(Component)]
struct PopupRoot;

#[derive(Component)]
struct NotificationRoot;

#[derive(Debug, Clone, PartialEq)]
struct PopupView {
    id: PopupId,
    mode: PopupMode,
    confirming_delete: bool,
    attributes: LineAttributes,
    metrics: LineMetrics,
}

/// Everything the panels display; they are rebuilt when it changes.
#[derive(Debug, Clone, Default, PartialEq)]
struct PanelState {
    draft: Option<LineAttributes>,
    popup: Option<PopupView>,
    notification: Option<UserNotification>,
    focused: Option<FieldTarget>,
}

const PANEL_BG: Color = Color::srgba(0.10, 0.11, 0.13, 0.94);
const BUTTON_BG: Color = Color::srgb(0.22, 0.24, 0.28);
const BUTTON_HOVER_BG: Color = Color::srgb(0.30, 0.33, 0.38);
const FIELD_BG: Color = Color::srgb(0.16, 0.17, 0.20);
const FIELD_FOCUS_BG: Color = Color::srgb(0.20, 0.26, 0.36);
const TEXT: Color = Color::srgb(1.0, 1.0, 1.0);
const MUTED_TEXT: Color = Color::srgb(0.7, 0.72, 0.76);
const ERROR_TEXT: Color = Color::srgb(1.0, 0.45, 0.4);

pub struct EditorUiPlugin;

impl Plugin for EditorUiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FocusedField>().add_systems(
            Update,
            (
                handle_ui_actions,
                release_stale_focus,
                rebuild_editor_panels,
                position_popup,
                reflect_button_hover,
            )
                .chain(),
        );
    }
}

/// Outcome of one key press on a text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdit {
    Edited,
    Unfocus,
    Ignored,
}

pub fn apply_key(value: &mut String, key: &Key) -> KeyEdit {
    match key {
        Key::Character(text) => {
            value.extend(text.chars().filter(|c| !c.is_control()));
            KeyEdit::Edited
        }
        Key::Space => {
            value.push(' ');
            KeyEdit::Edited
        }
        Key::Backspace => {
            value.pop();
            KeyEdit::Edited
        }
        Key::Enter | Key::Escape | Key::Tab => KeyEdit::Unfocus,
        _ => KeyEdit::Ignored,
    }
}

/// Routes typed text into the focused draft or popup field.
pub fn handle_text_input(
    mut keyboard_events: EventReader<KeyboardInput>,
    mut focused_field: ResMut<FocusedField>,
    mut editor: ResMut<AnnotationEditor>,
) {
    for event in keyboard_events.read() {
        if event.state != ButtonState::Pressed {
            continue;
        }
        let Some(target) = focused_field.target else {
            continue;
        };

        let current = match target {
            FieldTarget::Draft(field) => editor.draft().map(|draft| draft.field(field).to_string()),
            FieldTarget::Selected(field) => editor
                .selection()
                .selected()
                .and_then(|id| editor.store().get(id))
                .map(|line| line.attributes.field(field).to_string()),
        };
        let Some(mut value) = current else {
            focused_field.target = None;
            continue;
        };

        match apply_key(&mut value, &event.logical_key) {
            KeyEdit::Edited => {
                let applied = match target {
                    FieldTarget::Draft(field) => editor.edit_draft_field(field, value),
                    FieldTarget::Selected(field) => editor.edit_selected_field(field, value),
                };
                if !applied {
                    focused_field.target = None;
                }
            }
            KeyEdit::Unfocus => focused_field.target = None,
            KeyEdit::Ignored => {}
        }
    }
}

fn handle_ui_actions(
    interactions: Query<(&Interaction, &UiAction), (Changed<Interaction>, With<Button>)>,
    mut editor: ResMut<AnnotationEditor>,
    mut focused_field: ResMut<FocusedField>,
) {
    for (interaction, action) in &interactions {
        if *interaction != Interaction::Pressed {
            continue;
        }
        match *action {
            UiAction::Focus(target) => focused_field.target = Some(target),
            UiAction::ConfirmAttributes => {
                focused_field.target = None;
                editor.confirm_attributes(None);
            }
            UiAction::CancelAttributes => {
                focused_field.target = None;
                editor.cancel_drawing();
            }
            UiAction::UpdateLine => {
                focused_field.target = None;
                editor.request_update();
            }
            UiAction::DeleteLine => {
                editor.request_delete();
            }
            UiAction::ConfirmDelete => {
                focused_field.target = None;
                editor.confirm_delete();
            }
            UiAction::CancelDelete => editor.cancel_delete(),
            UiAction::ClosePopup => {
                focused_field.target = None;
                editor.close_popup();
            }
            UiAction::DismissNotification => {
                editor.dismiss_notification();
            }
        }
    }
}

/// Drops focus from a field whose panel went away.
fn release_stale_focus(editor: Res<AnnotationEditor>, mut focused_field: ResMut<FocusedField>) {
    let still_valid = match focused_field.target {
        None => return,
        Some(FieldTarget::Draft(_)) => editor.draft().is_some(),
        Some(FieldTarget::Selected(_)) => editor
            .selection()
            .popup()
            .is_some_and(|popup| popup.mode == PopupMode::Edit),
    };
    if !still_valid {
        focused_field.target = None;
    }
}

fn panel_state(editor: &AnnotationEditor, focused: Option<FieldTarget>) -> PanelState {
    let draft = (editor.drawing_phase() == DrawingPhase::AttributeCapture)
        .then(|| editor.draft().cloned())
        .flatten();

    let popup = editor.selection().popup().and_then(|popup| {
        let line = editor.store().get(popup.tracked)?;
        Some(PopupView {
            id: popup.id,
            mode: popup.mode,
            confirming_delete: popup.confirming_delete,
            attributes: line.attributes.clone(),
            metrics: line.metrics,
        })
    });

    PanelState {
        draft,
        popup,
        notification: editor.current_notification().cloned(),
        focused,
    }
}

fn rebuild_editor_panels(
    mut commands: Commands,
    editor: Res<AnnotationEditor>,
    focused_field: Res<FocusedField>,
    mut last: Local<PanelState>,
    roots: Query<Entity, Or<(With<AttributeModalRoot>, With<PopupRoot>, With<NotificationRoot>)>>,
) {
    let state = panel_state(&editor, focused_field.target);
    if *last == state {
        return;
    }

    for root in &roots {
        commands.entity(root).despawn();
    }

    if let Some(draft) = &state.draft {
        spawn_attribute_modal(&mut commands, draft, state.focused);
    }
    if let Some(popup) = &state.popup {
        let line = editor
            .selection()
            .popup()
            .and_then(|popup| editor.store().get(popup.tracked));
        if let Some(line) = line {
            spawn_popup(&mut commands, popup, line, state.focused);
        }
    }
    if let Some(notification) = &state.notification {
        spawn_notification(&mut commands, notification);
    }

    *last = state;
}

fn position_popup(editor: Res<AnnotationEditor>, mut popups: Query<(&mut Node, &mut Visibility), With<PopupRoot>>) {
    let anchor = editor.selection().popup().and_then(|popup| popup.anchor);
    for (mut node, mut visibility) in &mut popups {
        match anchor {
            Some(anchor) => {
                node.left = Val::Px(anchor.x);
                node.top = Val::Px(anchor.y);
                *visibility = Visibility::Inherited;
            }
            None => *visibility = Visibility::Hidden,
        }
    }
}

fn reflect_button_hover(
    mut buttons: Query<(&Interaction, &UiAction, &mut BackgroundColor), (Changed<Interaction>, With<Button>)>,
    focused_field: Res<FocusedField>,
) {
    for (interaction, action, mut bg) in &mut buttons {
        if let UiAction::Focus(target) = action {
            if focused_field.target == Some(*target) {
                continue;
            }
        }
        *bg = BackgroundColor(match interaction {
            Interaction::Hovered | Interaction::Pressed => BUTTON_HOVER_BG,
            Interaction::None => match action {
                UiAction::Focus(_) => FIELD_BG,
                _ => BUTTON_BG,
            },
        });
    }
}

fn panel_node() -> Node {
    Node {
        position_type: PositionType::Absolute,
        padding: UiRect::all(Val::Px(12.0)),
        row_gap: Val::Px(8.0),
        min_width: Val::Px(240.0),
        display: Display::Flex,
        flex_direction: FlexDirection::Column,
        border: UiRect::all(Val::Px(1.0)),
        ..default()
    }
}

fn text(parent: &mut ChildSpawnerCommands, value: impl Into<String>, size: f32, color: Color) {
    parent.spawn((
        Text::new(value),
        TextFont {
            font_size: size,
            ..default()
        },
        TextColor(color),
    ));
}

fn button(parent: &mut ChildSpawnerCommands, label: &str, action: UiAction) {
    parent
        .spawn((
            Button,
            action,
            Name::new(format!("{label}Button")),
            BackgroundColor(BUTTON_BG),
            BorderColor(Color::srgba(0.0, 0.0, 0.0, 0.25)),
            Node {
                height: Val::Px(30.0),
                padding: UiRect::axes(Val::Px(12.0), Val::Px(4.0)),
                display: Display::Flex,
                align_items: AlignItems::Center,
                justify_content: JustifyContent::Center,
                border: UiRect::all(Val::Px(1.0)),
                ..default()
            },
        ))
        .with_children(|btn| text(btn, label, 15.0, TEXT));
}

fn button_row(parent: &mut ChildSpawnerCommands, buttons: &[(&str, UiAction)]) {
    parent
        .spawn(Node {
            display: Display::Flex,
            flex_direction: FlexDirection::Row,
            column_gap: Val::Px(8.0),
            justify_content: JustifyContent::FlexEnd,
            ..default()
        })
        .with_children(|row| {
            for (label, action) in buttons {
                button(row, label, *action);
            }
        });
}

fn field(parent: &mut ChildSpawnerCommands, label: &str, value: &str, target: FieldTarget, focused: bool) {
    text(parent, label, 13.0, MUTED_TEXT);
    let shown = if focused { format!("{value}|") } else { value.to_string() };
    parent
        .spawn((
            Button,
            UiAction::Focus(target),
            BackgroundColor(if focused { FIELD_FOCUS_BG } else { FIELD_BG }),
            BorderColor(Color::srgba(1.0, 1.0, 1.0, 0.15)),
            Node {
                min_height: Val::Px(28.0),
                padding: UiRect::axes(Val::Px(8.0), Val::Px(4.0)),
                align_items: AlignItems::Center,
                border: UiRect::all(Val::Px(1.0)),
                ..default()
            },
        ))
        .with_children(|f| text(f, shown, 15.0, TEXT));
}

fn spawn_attribute_modal(commands: &mut Commands, draft: &LineAttributes, focused: Option<FieldTarget>) {
    commands
        .spawn((
            AttributeModalRoot,
            Name::new("AttributeModal"),
            Interaction::default(),
            BackgroundColor(PANEL_BG),
            BorderColor(Color::srgba(0.0, 0.0, 0.0, 0.4)),
            Node {
                left: Val::Percent(38.0),
                top: Val::Percent(30.0),
                ..panel_node()
            },
        ))
        .with_children(|panel| {
            text(panel, "New problem", 18.0, TEXT);
            for attribute in AttributeField::ALL {
                let target = FieldTarget::Draft(attribute);
                field(
                    panel,
                    attribute.label(),
                    draft.field(attribute),
                    target,
                    focused == Some(target),
                );
            }
            button_row(
                panel,
                &[
                    ("Cancel", UiAction::CancelAttributes),
                    ("Save", UiAction::ConfirmAttributes),
                ],
            );
        });
}

fn spawn_popup(
    commands: &mut Commands,
    view: &PopupView,
    line: &LineAnnotation,
    focused: Option<FieldTarget>,
) {
    commands
        .spawn((
            PopupRoot,
            Name::new("LinePopup"),
            Interaction::default(),
            BackgroundColor(PANEL_BG),
            BorderColor(Color::Srgba(Srgba {
                alpha: 0.9,
                ..line.display.color
            })),
            Visibility::Hidden,
            panel_node(),
        ))
        .with_children(|panel| {
            match view.mode {
                PopupMode::ReadOnly => {
                    for row in read_only_rows(line) {
                        text(panel, format!("{}: {}", row.label, row.value), 15.0, TEXT);
                    }
                }
                PopupMode::Edit => {
                    for attribute in AttributeField::ALL {
                        let target = FieldTarget::Selected(attribute);
                        field(
                            panel,
                            attribute.label(),
                            view.attributes.field(attribute),
                            target,
                            focused == Some(target),
                        );
                    }
                    text(
                        panel,
                        format!(
                            "Length: {:.2} m   Height: {:.2} m",
                            view.metrics.length, view.metrics.height
                        ),
                        13.0,
                        MUTED_TEXT,
                    );
                    if view.confirming_delete {
                        text(panel, "Delete this problem?", 15.0, ERROR_TEXT);
                        button_row(
                            panel,
                            &[
                                ("Keep", UiAction::CancelDelete),
                                ("Delete", UiAction::ConfirmDelete),
                            ],
                        );
                    } else {
                        button_row(
                            panel,
                            &[
                                ("Delete", UiAction::DeleteLine),
                                ("Update", UiAction::UpdateLine),
                            ],
                        );
                    }
                }
            }
            button_row(panel, &[("Close", UiAction::ClosePopup)]);
        });
}

fn spawn_notification(commands: &mut Commands, notification: &UserNotification) {
    let (title, color) = match notification.level {
        NotificationLevel::Info => ("Done", TEXT),
        NotificationLevel::Error => ("Something went wrong", ERROR_TEXT),
    };
    commands
        .spawn((
            NotificationRoot,
            Name::new("NotificationModal"),
            Interaction::default(),
            BackgroundColor(PANEL_BG),
            BorderColor(Color::srgba(0.0, 0.0, 0.0, 0.4)),
            GlobalZIndex(10),
            Node {
                left: Val::Percent(36.0),
                top: Val::Percent(12.0),
                ..panel_node()
            },
        ))
        .with_children(|panel| {
            text(panel, title, 18.0, color);
            text(panel, notification.message.clone(), 15.0, TEXT);
            button_row(panel, &[("OK", UiAction::DismissNotification)]);
        });
}
