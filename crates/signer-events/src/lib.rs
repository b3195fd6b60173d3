//! Event bus primitives: key state, event payloads, and a fixed-capacity
//! filter table that panels register against.
//!
//! Event names are encoded the way the firmware encodes them: a category in
//! the top byte (`RenderScene`, `Message`, `KeysDown`, `KeysUp`,
//! `KeysChanged`, `PanelFocus`, `PanelBlur`, `Custom`) with the low bytes
//! free for a per-category discriminator. Rust gets to replace the raw
//! `u32` name with a typed `EventPayload` enum instead, so the category byte
//! only matters for filter matching, not for carrying data.

use std::sync::Mutex;

use bitflags::bitflags;
use signer_codec::Cursor;
use thiserror::Error;

bitflags! {
    /// Physical key mask, directly mirroring the firmware's `Key` enum.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Keys: u8 {
        const NORTH  = 1 << 0;
        const EAST   = 1 << 1;
        const SOUTH  = 1 << 2;
        const WEST   = 1 << 3;
        const SELECT = 1 << 4;
        const CANCEL = 1 << 5;
        const OK     = 1 << 6;
        const AUX    = 1 << 7;
    }
}

impl Keys {
    /// The combination that requests a panel reset, same as the firmware's
    /// `KeyReset = Cancel | North`.
    pub const RESET: Keys = Keys::CANCEL.union(Keys::NORTH);
}

/// Top-byte category, used for filter matching only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    RenderScene,
    Message,
    KeysDown,
    KeysUp,
    KeysChanged,
    PanelFocus,
    PanelBlur,
    Custom,
}

/// A fully-formed event, dispatched by value to every matching filter.
#[derive(Debug, Clone)]
pub enum EventPayload {
    RenderScene,
    KeysDown(Keys),
    KeysUp(Keys),
    KeysChanged { down: Keys, changed: Keys },
    PanelFocus,
    PanelBlur,
    Message {
        id: u64,
        method: String,
        params: Cursor,
    },
    Custom { name: u32, data: Cursor },
}

impl EventPayload {
    pub fn category(&self) -> EventCategory {
        match self {
            EventPayload::RenderScene => EventCategory::RenderScene,
            EventPayload::KeysDown(_) => EventCategory::KeysDown,
            EventPayload::KeysUp(_) => EventCategory::KeysUp,
            EventPayload::KeysChanged { .. } => EventCategory::KeysChanged,
            EventPayload::PanelFocus => EventCategory::PanelFocus,
            EventPayload::PanelBlur => EventCategory::PanelBlur,
            EventPayload::Message { .. } => EventCategory::Message,
            EventPayload::Custom { .. } => EventCategory::Custom,
        }
    }
}

/// Opaque identity for panels registering filters, used to bulk-deregister
/// on pop instead of tracking individual `FilterId`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelId(pub u32);

/// Handle returned by `EventBus::register`, used with `EventBus::off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(u32);

struct FilterEntry {
    id: FilterId,
    owner: PanelId,
    category: EventCategory,
    sender: tokio::sync::mpsc::Sender<EventPayload>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventsError {
    #[error("filter table is at capacity")]
    FilterTableFull,
}

/// Fixed-capacity table of category filters. Panels register interest in a
/// category and receive matching events over an mpsc channel; popping a
/// panel clears every filter it owns in one call.
pub struct EventBus {
    capacity: usize,
    filters: Mutex<Vec<FilterEntry>>,
    next_id: Mutex<u32>,
    active_panel: Mutex<Option<PanelId>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            filters: Mutex::new(Vec::with_capacity(capacity)),
            next_id: Mutex::new(0),
            active_panel: Mutex::new(None),
        }
    }

    /// Records which panel is topmost, matching the firmware's `activePanel`
    /// update in `panel_push`/`panel_pop`. `publish` only reaches this
    /// panel's filters; `publish_to` is unaffected.
    pub fn set_active_panel(&self, owner: Option<PanelId>) {
        *self.active_panel.lock().expect("active panel poisoned") = owner;
    }

    pub fn active_panel(&self) -> Option<PanelId> {
        *self.active_panel.lock().expect("active panel poisoned")
    }

    pub fn register(
        &self,
        owner: PanelId,
        category: EventCategory,
        sender: tokio::sync::mpsc::Sender<EventPayload>,
    ) -> Result<FilterId, EventsError> {
        let mut filters = self.filters.lock().expect("event filter table poisoned");
        if filters.len() >= self.capacity {
            return Err(EventsError::FilterTableFull);
        }
        let mut next_id = self.next_id.lock().expect("event id counter poisoned");
        let id = FilterId(*next_id);
        *next_id += 1;
        filters.push(FilterEntry {
            id,
            owner,
            category,
            sender,
        });
        Ok(id)
    }

    pub fn off(&self, id: FilterId) {
        let mut filters = self.filters.lock().expect("event filter table poisoned");
        filters.retain(|entry| entry.id != id);
    }

    /// Removes every filter registered by `owner`, used when a panel pops.
    pub fn off_panel(&self, owner: PanelId) {
        let mut filters = self.filters.lock().expect("event filter table poisoned");
        filters.retain(|entry| entry.owner != owner);
    }

    /// Dispatches `payload` to the active panel's filters matching its
    /// category — only the topmost panel observes broadcast-category events,
    /// the same as the firmware only ever dispatches key/render/message
    /// events to `activePanel`. Filters whose receiver has been dropped are
    /// logged and pruned rather than treated as an error, matching the
    /// firmware's best-effort delivery.
    pub async fn publish(&self, payload: EventPayload) {
        let category = payload.category();
        let active = self.active_panel();
        let targets: Vec<_> = {
            let filters = self.filters.lock().expect("event filter table poisoned");
            filters
                .iter()
                .filter(|entry| Some(entry.owner) == active && entry.category == category)
                .map(|entry| entry.sender.clone())
                .collect()
        };

        if targets.is_empty() {
            tracing::trace!(?category, "no filters registered for event category on the active panel");
            return;
        }

        for sender in targets {
            if sender.send(payload.clone()).await.is_err() {
                tracing::debug!(?category, "dropping event for closed filter receiver");
            }
        }
    }

    /// Dispatches to filters owned by a single panel, used for focus/blur
    /// ordering guarantees where only the panel gaining or losing focus
    /// should observe the transition.
    pub async fn publish_to(&self, owner: PanelId, payload: EventPayload) {
        let category = payload.category();
        let targets: Vec<_> = {
            let filters = self.filters.lock().expect("event filter table poisoned");
            filters
                .iter()
                .filter(|entry| entry.owner == owner && entry.category == category)
                .map(|entry| entry.sender.clone())
                .collect()
        };
        for sender in targets {
            let _ = sender.send(payload.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_matching_category_only() {
        let bus = EventBus::new(4);
        let (tx_keys, mut rx_keys) = tokio::sync::mpsc::channel(4);
        let (tx_focus, mut rx_focus) = tokio::sync::mpsc::channel(4);
        bus.register(PanelId(1), EventCategory::KeysDown, tx_keys).unwrap();
        bus.register(PanelId(1), EventCategory::PanelFocus, tx_focus).unwrap();
        bus.set_active_panel(Some(PanelId(1)));

        bus.publish(EventPayload::KeysDown(Keys::OK)).await;

        let received = rx_keys.recv().await.unwrap();
        assert!(matches!(received, EventPayload::KeysDown(k) if k == Keys::OK));
        assert!(rx_focus.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_skips_filters_owned_by_inactive_panels() {
        let bus = EventBus::new(4);
        let (tx_background, mut rx_background) = tokio::sync::mpsc::channel(4);
        let (tx_active, mut rx_active) = tokio::sync::mpsc::channel(4);
        bus.register(PanelId(1), EventCategory::RenderScene, tx_background).unwrap();
        bus.register(PanelId(2), EventCategory::RenderScene, tx_active).unwrap();
        bus.set_active_panel(Some(PanelId(2)));

        bus.publish(EventPayload::RenderScene).await;

        assert!(rx_active.try_recv().is_ok());
        assert!(rx_background.try_recv().is_err());
    }

    #[tokio::test]
    async fn off_panel_clears_all_owned_filters() {
        let bus = EventBus::new(4);
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        bus.register(PanelId(7), EventCategory::RenderScene, tx).unwrap();
        bus.off_panel(PanelId(7));

        let filters = bus.filters.lock().unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn registration_fails_past_capacity() {
        let bus = EventBus::new(1);
        let (tx1, _r1) = tokio::sync::mpsc::channel(1);
        let (tx2, _r2) = tokio::sync::mpsc::channel(1);
        bus.register(PanelId(1), EventCategory::RenderScene, tx1).unwrap();
        assert_eq!(
            bus.register(PanelId(2), EventCategory::RenderScene, tx2),
            Err(EventsError::FilterTableFull)
        );
    }

    #[test]
    fn key_reset_combination_matches_firmware() {
        assert_eq!(Keys::RESET, Keys::CANCEL | Keys::NORTH);
    }
}
