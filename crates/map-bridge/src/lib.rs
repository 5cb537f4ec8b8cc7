//! Bridge between the native host and the embedded map page.
//!
//! Commands flow host → page through a [`CommandChannel`] that holds them back
//! until the page's [`ReadinessGate`] opens. Events flow page → host through an
//! [`EventDispatcher`]. A [`MapSession`] bundles both for one page mount.

pub mod channel;
pub mod command;
pub mod dispatcher;
pub mod event;
pub mod gate;
pub mod session;

pub use channel::{CommandChannel, Delivery, MapPage, RetryPolicy};
pub use command::{CommandKind, MapCommand, MapType, Marker, MarkerKind, RouteOverlay};
pub use dispatcher::EventDispatcher;
pub use event::{EventKind, MapEvent};
pub use gate::ReadinessGate;
pub use session::{HostState, MapSession};
