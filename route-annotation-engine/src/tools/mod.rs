//! Interactive annotation tools for drawing and editing route lines.
//!
//! The [`editor::AnnotationEditor`] resource owns the store, the scene graph
//! mirror and every tool controller. Bevy systems feed it pointer and
//! keyboard input; RPC and keyboard shortcuts reach it as
//! [`tool_manager::EditorCommandEvent`]s.
//!
//! ## Input Routing
//!
//! ```text
//! Mouse/Keyboard
//!   └─> route_pointer_input()
//!       └─> HandlerRegistry decides who owns the event
//!           ├─> DrawingController   (while a session is armed)
//!           ├─> VertexEditController (editing, no session)
//!           └─> SelectionController  (fallback hit test)
//!
//! Keyboard shortcuts / RPC
//!   └─> EditorCommandEvent
//!       └─> handle_editor_commands()
//! ```
//!
//! ## Drawing Workflow
//!
//! 1. `D` key (native) or `start_drawing` RPC arms a session while editing
//! 2. Left clicks add surface-projected vertices, the preview follows the pointer
//! 3. Right click freezes the line and opens the attribute modal
//! 4. Confirming commits the line and queues a remote create; `Escape` cancels
//!
//! ## Shortcuts (native)
//!
//! | Key | Action |
//! |-----|--------|
//! | `E` | Toggle editing |
//! | `D` | Start drawing |
//! | `L` | Toggle labels |
//! | `K` | Toggle lines |
//! | `C` | Center view |
//! | `X` | Export lines |
//! | `R` | Reload lines |

/// Tool state machine for capturing a new line.
pub mod drawing;

/// Aggregate editor resource wiring the tools together.
pub mod editor;

/// Exclusive registration of pointer and key handlers.
pub mod handlers;

/// Bevy input systems translating raw events into editor calls.
pub mod input;

/// Screen-space label placement and overlap resolution.
pub mod labels;

/// Popup content and screen placement for the selected line.
pub mod popup;

/// Surface projection of screen points onto the structure.
pub mod projector;

/// Line hit testing, selection highlight and camera framing.
pub mod selection;

/// Editor commands, keyboard shortcuts and export.
pub mod tool_manager;

/// Attribute modal, popup panel and notification widgets.
pub mod ui;

/// Endpoint marker removal while editing.
pub mod vertex_edit;
