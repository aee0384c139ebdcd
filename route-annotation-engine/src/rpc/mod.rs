//! JSON-RPC 2.0 communication layer for host page integration.
//!
//! Implements bidirectional messaging between the engine and the embedding
//! page via iframe postMessage, supporting both request-response and
//! notification patterns.
//!
//! ## Message Flow
//!
//! ```text
//! Host page (Parent Window)  <──postMessage──>  Engine (iframe)
//!        │                                        │
//!        ├─ Request (with ID) ──────────────────> │
//!        │                                        ├─ EditorCommandEvent
//!        │ <───────────────── Response (with ID) ─┤
//!        │                                        │
//!        │ <────────── Notification (no ID) ─────┤
//! ```
//!
//! ## Methods
//!
//! - `set_editing` `{ editing }`, `toggle_editing`
//! - `start_drawing`, `cancel_drawing`
//! - `confirm_attributes` `{ name, grade, grade_ss }`
//! - `set_labels_visible` `{ visible }`, `set_lines_visible` `{ visible }`
//! - `center_view`, `export_lines`, `reload_lines`
//!
//! ## Notifications
//!
//! - `editing_changed` `{ editing }`
//! - `drawing_state_changed` `{ state }` (`idle`, `capturing`, `attribute_capture`)
//! - `line_committed` `{ id, name }`
//! - `selection_changed` `{ id }`
//! - `lines_loaded` `{ loaded, dropped }`
//! - `lines_exported` `{ count, lines }`
//! - `user_notification` `{ level, message }`
//!
//! ## Error Handling
//!
//! Standard JSON-RPC 2.0 error codes:
//! - `-32601`: Method not found
//! - `-32602`: Invalid params

/// JSON-RPC 2.0 bidirectional communication system.
///
/// Handles request-response patterns, notifications, and WASM message listeners.
pub mod web_rpc;
