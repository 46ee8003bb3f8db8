//! Scrollable surface signals
//!
//! The signals a scrollable surface raises while the user manipulates it,
//! and a dispatcher that routes them to registered handlers.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

/// Event type identifier
pub type EventType = u32;

/// Surface identifier (one per scrollable host)
pub type SurfaceId = u64;

/// Surface event types
pub mod event_types {
    use super::EventType;

    /// A touch or drag manipulation began on the surface
    pub const MANIPULATION_STARTED: EventType = 1;
    /// The manipulation ended, including the surface's own snap-back
    pub const MANIPULATION_COMPLETED: EventType = 2;
    /// The host is about to render a frame
    pub const RENDERING: EventType = 3;
    /// The height of the scrollable content changed
    pub const SCROLLABLE_HEIGHT_CHANGED: EventType = 4;
}

new_key_type! {
    /// Handle returned by [`EventDispatcher::register`]
    pub struct HandlerId;
}

/// A surface event with associated data
#[derive(Clone, Debug)]
pub struct SurfaceEvent {
    pub event_type: EventType,
    pub surface: SurfaceId,
    pub data: EventData,
    /// Host timestamp in milliseconds
    pub timestamp: u64,
}

/// Event-specific data
#[derive(Clone, Debug, PartialEq)]
pub enum EventData {
    ScrollableHeight(f32),
    None,
}

impl SurfaceEvent {
    pub fn new(event_type: EventType, surface: SurfaceId) -> Self {
        Self {
            event_type,
            surface,
            data: EventData::None,
            timestamp: 0,
        }
    }

    pub fn manipulation_started(surface: SurfaceId) -> Self {
        Self::new(event_types::MANIPULATION_STARTED, surface)
    }

    pub fn manipulation_completed(surface: SurfaceId) -> Self {
        Self::new(event_types::MANIPULATION_COMPLETED, surface)
    }

    pub fn rendering(surface: SurfaceId) -> Self {
        Self::new(event_types::RENDERING, surface)
    }

    pub fn scrollable_height_changed(surface: SurfaceId, height: f32) -> Self {
        Self {
            data: EventData::ScrollableHeight(height),
            ..Self::new(event_types::SCROLLABLE_HEIGHT_CHANGED, surface)
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Scrollable height carried by the event, if any
    pub fn scrollable_height(&self) -> Option<f32> {
        match self.data {
            EventData::ScrollableHeight(height) => Some(height),
            EventData::None => None,
        }
    }
}

/// Event handler function type
pub type EventHandler = Box<dyn Fn(&SurfaceEvent) + Send + Sync>;

struct Registration {
    key: (SurfaceId, EventType),
    handler: EventHandler,
}

/// Dispatches surface events to registered handlers
pub struct EventDispatcher {
    registrations: SlotMap<HandlerId, Registration>,
    routes: FxHashMap<(SurfaceId, EventType), SmallVec<[HandlerId; 2]>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            registrations: SlotMap::with_key(),
            routes: FxHashMap::default(),
        }
    }

    /// Register an event handler for a surface and event type
    pub fn register<F>(&mut self, surface: SurfaceId, event_type: EventType, handler: F) -> HandlerId
    where
        F: Fn(&SurfaceEvent) + Send + Sync + 'static,
    {
        let key = (surface, event_type);
        let id = self.registrations.insert(Registration {
            key,
            handler: Box::new(handler),
        });
        self.routes.entry(key).or_default().push(id);
        id
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn unregister(&mut self, id: HandlerId) -> bool {
        let Some(registration) = self.registrations.remove(id) else {
            return false;
        };
        if let Some(ids) = self.routes.get_mut(&registration.key) {
            ids.retain(|h| *h != id);
            if ids.is_empty() {
                self.routes.remove(&registration.key);
            }
        }
        true
    }

    /// Dispatch an event to all handlers registered for it, in registration order
    pub fn dispatch(&self, event: &SurfaceEvent) -> usize {
        let Some(ids) = self.routes.get(&(event.surface, event.event_type)) else {
            return 0;
        };
        let mut delivered = 0;
        for id in ids {
            if let Some(registration) = self.registrations.get(*id) {
                (registration.handler)(event);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live handlers
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_dispatch_routes_by_surface_and_type() {
        let mut dispatcher = EventDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        dispatcher.register(7, event_types::RENDERING, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(dispatcher.dispatch(&SurfaceEvent::rendering(7)), 1);
        assert_eq!(dispatcher.dispatch(&SurfaceEvent::rendering(8)), 0);
        assert_eq!(dispatcher.dispatch(&SurfaceEvent::manipulation_started(7)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister() {
        let mut dispatcher = EventDispatcher::new();
        let id = dispatcher.register(1, event_types::MANIPULATION_STARTED, |_| {});
        assert_eq!(dispatcher.len(), 1);

        assert!(dispatcher.unregister(id));
        assert!(!dispatcher.unregister(id));
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.dispatch(&SurfaceEvent::manipulation_started(1)), 0);
    }

    #[test]
    fn test_scrollable_height_payload() {
        let event = SurfaceEvent::scrollable_height_changed(3, 1200.0).with_timestamp(42);
        assert_eq!(event.event_type, event_types::SCROLLABLE_HEIGHT_CHANGED);
        assert_eq!(event.scrollable_height(), Some(1200.0));
        assert_eq!(event.timestamp, 42);
        assert_eq!(SurfaceEvent::rendering(3).scrollable_height(), None);
    }
}
