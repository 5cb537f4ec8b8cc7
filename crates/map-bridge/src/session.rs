//! One mounted map page and the host state it drives.

use std::sync::Arc;

use tracing::{debug, info, warn};
use transit_common::{Coordinate, Result};

use crate::channel::{CommandChannel, Delivery, MapPage, RetryPolicy};
use crate::command::MapCommand;
use crate::dispatcher::{parse_logged, EventDispatcher};
use crate::event::{EventKind, MapEvent};
use crate::gate::ReadinessGate;

/// Screen-level state updated by page events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostState {
    pub origin: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub active_route: Option<String>,
    /// Points placed by an administrator while drawing a route.
    pub admin_points: Vec<Coordinate>,
    pub last_error: Option<String>,
    pub follow_user: bool,
}

impl HostState {
    /// Origin and destination, once both are chosen.
    pub fn trip(&self) -> Option<(Coordinate, Coordinate)> {
        Some((self.origin?, self.destination?))
    }

    /// Fills the origin first, then the destination. A third point starts over.
    pub fn select_point(&mut self, point: Coordinate) {
        match (self.origin, self.destination) {
            (None, _) => self.origin = Some(point),
            (Some(_), None) => self.destination = Some(point),
            (Some(_), Some(_)) => {
                self.origin = Some(point);
                self.destination = None;
            }
        }
    }
}

/// Handlers that keep [`HostState`] in step with the page.
pub fn default_dispatcher() -> EventDispatcher<HostState> {
    let mut dispatcher = EventDispatcher::new();
    dispatcher
        .on(EventKind::PointSelected, |state: &mut HostState, event| {
            if let MapEvent::PointSelected { point } = event {
                state.select_point(*point);
            }
        })
        .on(EventKind::AdminMapPoint, |state: &mut HostState, event| {
            if let MapEvent::AdminMapPoint { point } = event {
                state.admin_points.push(*point);
            }
        })
        .on(EventKind::RouteClicked, |state: &mut HostState, event| {
            if let MapEvent::RouteClicked { route_id } = event {
                state.active_route = Some(route_id.clone());
            }
        })
        .on(EventKind::Error, |state: &mut HostState, event| {
            if let MapEvent::Error { message } = event {
                warn!("Map page reported an error: {}", message);
                state.last_error = Some(message.clone());
            }
        })
        .on(EventKind::WebviewDebug, |_: &mut HostState, event| {
            if let MapEvent::WebviewDebug { message } = event {
                debug!("[webview] {}", message);
            }
        });
    dispatcher
}

/// Bridge state for a single page mount.
///
/// Owns the page's readiness gate, its command channel and the host state.
/// Call [`unmount`](Self::unmount) when the page goes away.
pub struct MapSession {
    channel: CommandChannel,
    dispatcher: EventDispatcher<HostState>,
    state: HostState,
}

impl MapSession {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_dispatcher(policy, default_dispatcher())
    }

    pub fn with_dispatcher(policy: RetryPolicy, dispatcher: EventDispatcher<HostState>) -> Self {
        Self {
            channel: CommandChannel::new(ReadinessGate::new(), policy),
            dispatcher,
            state: HostState::default(),
        }
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn state(&self) -> &HostState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.channel.gate().is_ready()
    }

    pub async fn attach(&self, page: Arc<dyn MapPage>) {
        self.channel.attach(page).await;
    }

    pub async fn send(&self, command: MapCommand) -> Result<Delivery> {
        self.channel.send(command).await
    }

    /// Records whether the map should track the user and tells the page.
    pub async fn set_follow_user(&mut self, follow: bool) -> Result<Delivery> {
        self.state.follow_user = follow;
        self.channel.send(MapCommand::SetFollowUser { follow }).await
    }

    /// Handles one raw message from the page.
    ///
    /// `mapReady` opens the gate, which lets queued commands through. Every
    /// parsed event is then dispatched and returned for follow-up work.
    pub fn handle_message(&mut self, raw: &str) -> Option<MapEvent> {
        let event = parse_logged(raw)?;
        if event == MapEvent::MapReady {
            if self.channel.gate().open() {
                info!("✅ Map page ready");
            } else {
                debug!("Duplicate mapReady ignored");
            }
        }
        self.dispatcher.dispatch(&mut self.state, &event);
        Some(event)
    }

    /// Cancels pending retries and releases the page.
    pub async fn unmount(&self) {
        self.channel.close().await;
        self.channel.detach().await;
    }
}
