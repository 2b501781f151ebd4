//! Heka widget shell
//!
//! Thin view layer over the connection controller: forwards lifecycle and tap
//! events, and renders the static card content plus the current projection.

pub mod bootstrap;
pub mod component;
pub mod events;
pub mod view;

pub use component::{ComponentError, ConnectionViewModel, HekaComponent};
pub use view::ComponentView;
