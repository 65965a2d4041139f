//! Application layer: the mode state machine and the runtime around it.
//!
//! # Architecture
//!
//! Data flows one way:
//!
//! ```text
//! Event sources → EventBus → handle_event → State Mutations → Actions → Services
//!                               ↑                                          ↓
//!                               └──────────── Job outcomes ────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`actions`]: Service calls emitted by mode entry and exit
//! - [`bus`]: Registered event sources and the typed event channel
//! - [`controls`]: Visibility of user controls
//! - [`handler`]: Event processing and transition coordination
//! - [`modes`]: `SelectingImage` and the `Drawing` sub-states
//! - [`runtime`]: Owns the services and executes actions
//! - [`state`]: Central state container and the transition table
//!
//! # Example
//!
//! ```rust
//! use arcanvas::app::{handle_event, AppState, Event};
//! use arcanvas::app::modes::AppMode;
//!
//! let mut state = AppState::new();
//! state.enter_initial();
//! let (_, actions) = handle_event(&mut state, &Event::FixPositionRequested)?;
//! assert!(actions.is_empty());
//! assert_eq!(state.mode(), AppMode::SelectingImage);
//! # Ok::<(), arcanvas::ArCanvasError>(())
//! ```

pub mod actions;
pub mod bus;
pub mod controls;
pub mod handler;
pub mod modes;
pub mod runtime;
pub mod state;

pub use actions::Action;
pub use bus::{BusMessage, EventBus, EventSender, EventSource};
pub use controls::ControlPanel;
pub use handler::{handle_event, Event};
pub use modes::{AppMode, DrawingPhase};
pub use runtime::{PermissionProvider, Runtime, Services};
pub use state::AppState;
