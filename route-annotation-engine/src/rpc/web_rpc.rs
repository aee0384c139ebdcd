use crate::annotation::LineAttributes;
use crate::tools::editor::{AnnotationEditor, EditorNotice};
use crate::tools::tool_manager::{CommandSource, EditorCommand, EditorCommandEvent};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
use web_sys::{MessageEvent, window};

/// JSON-RPC 2.0 request structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 notification structure for one-way communication.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC error structure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Resource managing bidirectional RPC communication with the host page.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl WebRpcInterface {
    /// Send notification to the host page without expecting a response.
    pub fn send_notification(&mut self, method: &str, params: serde_json::Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    pub fn pending_notifications(&self) -> &[RpcNotification] {
        &self.outgoing_notifications
    }

    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }
}

/// Plugin establishing the postMessage layer for iframe deployment.
pub struct WebRpcPlugin;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WebRpcInterface>()
            .add_event::<IncomingRpcMessage>()
            .add_event::<EditorCommandEvent>()
            .add_systems(Update, (process_incoming_messages, handle_rpc_messages).chain())
            .add_systems(
                PostUpdate,
                (forward_editor_notices, send_outgoing_messages).chain(),
            );

        #[cfg(target_arch = "wasm32")]
        app.add_systems(Startup, setup_message_listener);
    }
}

#[cfg(target_arch = "wasm32")]
fn setup_message_listener(mut commands: Commands) {
    use std::sync::Arc;
    use std::sync::Mutex;

    let message_queue: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let queue_clone = message_queue.clone();

    let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Ok(data) = event.data().dyn_into::<js_sys::JsString>() {
            let message_str: String = data.into();
            if message_str.contains("jsonrpc") {
                if let Ok(mut queue) = queue_clone.lock() {
                    queue.push(message_str);
                }
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    let Some(window) = window() else {
        error!("Window object not available, RPC listener not installed");
        return;
    };
    if let Err(e) =
        window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
    {
        error!("Failed to register message listener: {:?}", e);
        return;
    }

    // Ownership moves to JS.
    closure.forget();
    commands.insert_resource(MessageQueue(message_queue));
}

/// Queue filled by the browser message listener.
#[derive(Resource)]
struct MessageQueue(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

/// Raw RPC message received from the host page.
#[derive(Event)]
struct IncomingRpcMessage {
    content: String,
}

fn process_incoming_messages(
    message_queue: Option<Res<MessageQueue>>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    let Some(queue_res) = message_queue else {
        return;
    };

    let messages = if let Ok(mut queue) = queue_res.0.lock() {
        std::mem::take(&mut *queue)
    } else {
        Vec::new()
    };

    for message_str in messages {
        message_events.write(IncomingRpcMessage {
            content: message_str,
        });
    }
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut command_events: EventWriter<EditorCommandEvent>,
) {
    for event in events.read() {
        match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) => {
                debug!("RPC → {}", request.method);
                if let Some(response) = handle_rpc_request(&request, &mut command_events) {
                    rpc_interface.queue_response(response);
                }
            }
            Err(parse_error) => {
                warn!("Dropping malformed RPC message: {}", parse_error);
            }
        }
    }
}

/// Handle one request; only requests carrying an id get a response.
fn handle_rpc_request(
    request: &RpcRequest,
    command_events: &mut EventWriter<EditorCommandEvent>,
) -> Option<RpcResponse> {
    let result = parse_command(&request.method, &request.params).map(|command| {
        info!("Editor command dispatched from RPC: {:?}", command);
        command_events.write(EditorCommandEvent {
            command,
            source: CommandSource::Rpc,
        });
        serde_json::json!({ "success": true })
    });

    let id = request.id.clone()?;
    match result {
        Ok(result_value) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result_value),
            error: None,
            id: Some(id),
        }),
        Err(error) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id: Some(id),
        }),
    }
}

/// Map an RPC method and its params onto an editor command.
fn parse_command(method: &str, params: &serde_json::Value) -> Result<EditorCommand, RpcError> {
    #[derive(Deserialize)]
    struct EditingParams {
        editing: bool,
    }

    #[derive(Deserialize)]
    struct VisibilityParams {
        visible: bool,
    }

    #[derive(Deserialize)]
    struct AttributeParams {
        name: String,
        #[serde(default)]
        grade: String,
        #[serde(default)]
        grade_ss: String,
    }

    let command = match method {
        "set_editing" => {
            let parsed = serde_json::from_value::<EditingParams>(params.clone())
                .map_err(|_| RpcError::invalid_params("Expected 'editing' parameter"))?;
            EditorCommand::SetEditing(parsed.editing)
        }
        "toggle_editing" => EditorCommand::ToggleEditing,
        "start_drawing" => EditorCommand::StartDrawing,
        "cancel_drawing" => EditorCommand::CancelDrawing,
        "confirm_attributes" => {
            if params.is_null() {
                EditorCommand::ConfirmAttributes(None)
            } else {
                let parsed = serde_json::from_value::<AttributeParams>(params.clone())
                    .map_err(|_| RpcError::invalid_params("Expected 'name', 'grade' and 'grade_ss'"))?;
                EditorCommand::ConfirmAttributes(Some(LineAttributes::new(
                    parsed.name,
                    parsed.grade,
                    parsed.grade_ss,
                )))
            }
        }
        "set_labels_visible" => {
            let parsed = serde_json::from_value::<VisibilityParams>(params.clone())
                .map_err(|_| RpcError::invalid_params("Expected 'visible' parameter"))?;
            EditorCommand::SetLabelsVisible(parsed.visible)
        }
        "set_lines_visible" => {
            let parsed = serde_json::from_value::<VisibilityParams>(params.clone())
                .map_err(|_| RpcError::invalid_params("Expected 'visible' parameter"))?;
            EditorCommand::SetLinesVisible(parsed.visible)
        }
        "center_view" => EditorCommand::CenterView,
        "export_lines" => EditorCommand::ExportLines,
        "reload_lines" => EditorCommand::Reload,
        _ => {
            warn!("Unknown RPC method: {}", method);
            return Err(RpcError::method_not_found(method));
        }
    };
    Ok(command)
}

/// Translate editor state changes into notifications for the host page.
fn forward_editor_notices(
    editor: Option<ResMut<AnnotationEditor>>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    let Some(mut editor) = editor else {
        return;
    };

    for notice in editor.take_notices() {
        let (method, params) = match notice {
            EditorNotice::EditingChanged(editing) => {
                ("editing_changed", serde_json::json!({ "editing": editing }))
            }
            EditorNotice::DrawingStateChanged(phase) => {
                ("drawing_state_changed", serde_json::json!({ "state": phase }))
            }
            EditorNotice::LineCommitted { id, name } => (
                "line_committed",
                serde_json::json!({ "id": id.0, "name": name }),
            ),
            EditorNotice::SelectionChanged(selected) => (
                "selection_changed",
                serde_json::json!({ "id": selected.map(|id| id.0) }),
            ),
            EditorNotice::LinesLoaded { loaded, dropped } => (
                "lines_loaded",
                serde_json::json!({ "loaded": loaded, "dropped": dropped }),
            ),
            EditorNotice::Notification(notification) => {
                ("user_notification", serde_json::json!(notification))
            }
        };
        rpc_interface.send_notification(method, params);
    }
}

/// Send queued notifications and responses to the host page.
fn send_outgoing_messages(mut rpc_interface: ResMut<WebRpcInterface>) {
    for notification in rpc_interface.outgoing_notifications.drain(..) {
        send_message_to_parent(&notification);
    }

    for response in rpc_interface.outgoing_responses.drain(..) {
        send_message_to_parent(&response);
    }
}

/// Send serialized message to the parent window.
fn send_message_to_parent<T: Serialize>(message: &T) {
    #[cfg(target_arch = "wasm32")]
    {
        match serde_json::to_string(message) {
            Ok(json) => {
                if let Some(window) = window() {
                    if let Some(parent) = window.parent().ok().flatten() {
                        if let Err(e) = parent.post_message(&JsValue::from_str(&json), "*") {
                            error!("Failed to send message to parent: {:?}", e);
                        }
                    } else {
                        warn!("No parent window available for message transmission");
                    }
                } else {
                    error!("Window object not available");
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
    }
}

/// Standard RPC error codes and constructors.
impl RpcError {
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "Method not found".to_string(),
            data: Some(serde_json::json!({ "method": method })),
        }
    }

    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Scope;
    use bevy::ecs::system::RunSystemOnce;
    use constants::coordinate_system::GeoFrame;

    #[test]
    fn parses_parameterised_methods() {
        assert_eq!(
            parse_command("set_editing", &serde_json::json!({ "editing": true })),
            Ok(EditorCommand::SetEditing(true))
        );
        assert_eq!(
            parse_command("set_labels_visible", &serde_json::json!({ "visible": false })),
            Ok(EditorCommand::SetLabelsVisible(false))
        );
        assert_eq!(
            parse_command(
                "confirm_attributes",
                &serde_json::json!({ "name": "Arete", "grade": "6b", "grade_ss": "6a+" })
            ),
            Ok(EditorCommand::ConfirmAttributes(Some(LineAttributes::new(
                "Arete", "6b", "6a+"
            ))))
        );
        assert_eq!(
            parse_command("confirm_attributes", &serde_json::Value::Null),
            Ok(EditorCommand::ConfirmAttributes(None))
        );
    }

    #[test]
    fn bad_params_and_unknown_methods_are_rejected() {
        let error = parse_command("set_lines_visible", &serde_json::json!({})).unwrap_err();
        assert_eq!(error.code, -32602);

        let error = parse_command("launch_rockets", &serde_json::Value::Null).unwrap_err();
        assert_eq!(error.code, -32601);
    }

    fn rpc_app() -> App {
        let mut app = App::new();
        app.add_plugins(WebRpcPlugin);
        app.insert_resource(AnnotationEditor::new(
            Scope::new("acme", "north", "block-a"),
            GeoFrame::default(),
        ));
        app
    }

    #[test]
    fn requests_become_editor_commands_and_responses() {
        let mut app = rpc_app();
        app.world_mut().send_event(IncomingRpcMessage {
            content: r#"{"jsonrpc":"2.0","method":"start_drawing","params":null,"id":7}"#.into(),
        });
        app.world_mut().run_system_once(handle_rpc_messages).expect("system runs");

        let commands: Vec<_> = app
            .world_mut()
            .resource_mut::<Events<EditorCommandEvent>>()
            .drain()
            .collect();
        assert_eq!(
            commands,
            vec![EditorCommandEvent {
                command: EditorCommand::StartDrawing,
                source: CommandSource::Rpc,
            }]
        );

        let rpc = app.world().resource::<WebRpcInterface>();
        assert_eq!(rpc.outgoing_responses.len(), 1);
        assert_eq!(rpc.outgoing_responses[0].id, Some(serde_json::json!(7)));
        assert!(rpc.outgoing_responses[0].error.is_none());
    }

    #[test]
    fn editor_notices_are_forwarded_as_notifications() {
        let mut app = rpc_app();
        app.world_mut().resource_mut::<AnnotationEditor>().set_editing(true);
        app.world_mut().run_system_once(forward_editor_notices).expect("system runs");

        let rpc = app.world().resource::<WebRpcInterface>();
        let methods: Vec<_> = rpc
            .pending_notifications()
            .iter()
            .map(|n| n.method.as_str())
            .collect();
        assert_eq!(methods, vec!["editing_changed"]);
        assert_eq!(
            rpc.pending_notifications()[0].params,
            serde_json::json!({ "editing": true })
        );
    }
}
