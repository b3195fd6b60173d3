//! Panel stack and push/pop transitions, ported from `panel.c`'s
//! `panel_push`/`panel_pop`. Each panel owns a scene subtree and a bounded
//! event queue; pushing animates the new subtree in (and the previous one
//! out, per its transition style) and pops reverse the same motion.

use std::sync::{Arc, Mutex};

use signer_events::{EventBus, EventPayload, FilterId, PanelId};
use signer_scene::{CompletionKind, Handle, Point, Scene};
use tracing::warn;

const TRANSITION_MS: u64 = 300;
pub const EVENT_BACKLOG: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStyle {
    Instant,
    CoverUp,
    SlideLeft,
}

struct StackEntry {
    id: PanelId,
    node: Handle,
    style: PanelStyle,
    filters: Vec<FilterId>,
}

/// Owns the scene and event bus shared by every panel, and the stack of
/// currently-pushed panels.
pub struct PanelStack {
    scene: Mutex<Scene>,
    events: Arc<EventBus>,
    stack: Mutex<Vec<StackEntry>>,
    next_id: Mutex<u32>,
    screen_width: i32,
    screen_height: i32,
}

impl PanelStack {
    pub fn new(scene: Scene, events: Arc<EventBus>, screen_width: i32, screen_height: i32) -> Arc<Self> {
        Arc::new(PanelStack {
            scene: Mutex::new(scene),
            events,
            stack: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
            screen_width,
            screen_height,
        })
    }

    pub fn active_panel(&self) -> Option<PanelId> {
        self.stack.lock().unwrap().last().map(|e| e.id)
    }

    pub fn with_scene<R>(&self, f: impl FnOnce(&mut Scene) -> R) -> R {
        let mut scene = self.scene.lock().unwrap();
        f(&mut scene)
    }

    /// Registers a filter owned by the currently-active panel, recording it
    /// on the stack entry so `pop` can clear it later.
    pub fn register_filter(&self, category: signer_events::EventCategory, sender: tokio::sync::mpsc::Sender<EventPayload>) -> Option<FilterId> {
        let owner = self.active_panel()?;
        let id = self.events.register(owner, category, sender).ok()?;
        let mut stack = self.stack.lock().unwrap();
        if let Some(entry) = stack.last_mut() {
            entry.filters.push(id);
        }
        Some(id)
    }

    /// Pushes a new panel. `populate` runs against the new subtree's root
    /// node before it becomes visible, the moment `panel.c`'s init callback
    /// runs after `activePanel` is updated but before the entry animation
    /// starts.
    pub fn push(
        self: &Arc<Self>,
        style: PanelStyle,
        now_ms: u64,
        populate: impl FnOnce(&mut Scene, Handle) + Send + 'static,
    ) -> PanelId {
        let previous = self.active_panel();
        if let Some(previous) = previous {
            self.spawn_publish(EventPayload::PanelBlur, Some(previous));
        }

        let id = {
            let mut next_id = self.next_id.lock().unwrap();
            let id = PanelId(*next_id);
            *next_id += 1;
            id
        };

        let (new_start, new_end, old_end) = transition_offsets(style, self.screen_width, self.screen_height);

        let node = self.with_scene(|scene| {
            let node = scene.create_group().expect("scene arena exhausted");
            if new_start != Point::ORIGIN {
                scene.set_position(node, new_start);
            }
            populate(scene, node);
            scene.append_child(scene.root(), node);
            node
        });

        self.stack.lock().unwrap().push(StackEntry {
            id,
            node,
            style,
            filters: Vec::new(),
        });
        self.events.set_active_panel(Some(id));

        if let Some(previous_node) = self.node_below(id) {
            if old_end != Point::ORIGIN {
                self.with_scene(|scene| {
                    if style == PanelStyle::Instant {
                        scene.set_position(previous_node, old_end);
                    } else {
                        scene.animate_position(previous_node, old_end, signer_scene::ease_out_quad, now_ms, TRANSITION_MS, None);
                    }
                });
            }
        }

        if new_start != new_end {
            if style == PanelStyle::Instant {
                self.with_scene(|scene| scene.set_position(node, new_end));
                self.spawn_publish(EventPayload::PanelFocus, Some(id));
            } else {
                let events = self.events.clone();
                let on_complete: signer_scene::animation::OnComplete = Box::new(move |_: CompletionKind| {
                    let events = events.clone();
                    tokio::spawn(async move {
                        events.publish_to(id, EventPayload::PanelFocus).await;
                    });
                });
                self.with_scene(|scene| {
                    scene.animate_position(node, new_end, signer_scene::ease_out_quad, now_ms, TRANSITION_MS, Some(on_complete));
                });
            }
        } else {
            self.spawn_publish(EventPayload::PanelFocus, Some(id));
        }

        id
    }

    /// Pops the active panel: clears its filters, animates its subtree back
    /// out, removes it from the scene on completion, and re-focuses the
    /// parent.
    pub fn pop(self: &Arc<Self>, now_ms: u64) {
        let popped = {
            let mut stack = self.stack.lock().unwrap();
            stack.pop()
        };
        let Some(popped) = popped else {
            warn!("pop called with no active panel");
            return;
        };

        for filter in &popped.filters {
            self.events.off(*filter);
        }
        self.events.off_panel(popped.id);

        let parent = self.active_panel();
        self.events.set_active_panel(parent);
        let (_, _, old_end) = transition_offsets(popped.style, self.screen_width, self.screen_height);

        if popped.style == PanelStyle::Instant || old_end == Point::ORIGIN {
            self.with_scene(|scene| scene.remove(popped.node, true));
            if let Some(parent) = parent {
                self.spawn_publish(EventPayload::PanelFocus, Some(parent));
            }
            return;
        }

        let events = self.events.clone();
        let node = popped.node;
        let on_complete: signer_scene::animation::OnComplete = Box::new(move |_: CompletionKind| {
            if let Some(parent) = parent {
                tokio::spawn(async move {
                    events.publish_to(parent, EventPayload::PanelFocus).await;
                });
            }
        });
        self.with_scene(|scene| {
            scene.animate_position(node, old_end, signer_scene::ease_in_quad, now_ms, TRANSITION_MS, Some(on_complete));
        });

        if let Some(parent_node) = self.stack.lock().unwrap().last().map(|e| e.node) {
            self.with_scene(|scene| {
                if scene.position(parent_node) != Point::ORIGIN {
                    scene.animate_position(parent_node, Point::ORIGIN, signer_scene::ease_in_quad, now_ms, TRANSITION_MS, None);
                }
            });
        }
    }

    fn node_below(&self, current: PanelId) -> Option<Handle> {
        let stack = self.stack.lock().unwrap();
        let index = stack.iter().position(|e| e.id == current)?;
        if index == 0 {
            None
        } else {
            Some(stack[index - 1].node)
        }
    }

    fn spawn_publish(&self, payload: EventPayload, owner: Option<PanelId>) {
        let events = self.events.clone();
        tokio::spawn(async move {
            match owner {
                Some(owner) => events.publish_to(owner, payload).await,
                None => events.publish(payload).await,
            }
        });
    }
}

fn transition_offsets(style: PanelStyle, width: i32, height: i32) -> (Point, Point, Point) {
    match style {
        PanelStyle::Instant => (Point::ORIGIN, Point::ORIGIN, Point::ORIGIN),
        PanelStyle::CoverUp => (Point::new(0, height), Point::ORIGIN, Point::ORIGIN),
        PanelStyle::SlideLeft => (Point::new(width, 0), Point::ORIGIN, Point::new(-width, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_stack() -> Arc<PanelStack> {
        let scene = Scene::new(64);
        let events = Arc::new(EventBus::new(16));
        PanelStack::new(scene, events, 240, 240)
    }

    #[tokio::test]
    async fn push_registers_a_new_active_panel() {
        let stack = new_stack();
        let id = stack.push(PanelStyle::Instant, 0, |_, _| {});
        assert_eq!(stack.active_panel(), Some(id));
    }

    #[tokio::test]
    async fn pop_restores_the_parent_as_active() {
        let stack = new_stack();
        let first = stack.push(PanelStyle::Instant, 0, |_, _| {});
        let _second = stack.push(PanelStyle::Instant, 0, |_, _| {});
        stack.pop(0);
        assert_eq!(stack.active_panel(), Some(first));
    }

    #[tokio::test]
    async fn cover_up_starts_below_the_screen() {
        let stack = new_stack();
        let mut seen = Point::ORIGIN;
        stack.push(PanelStyle::CoverUp, 0, move |scene, node| {
            seen = scene.position(node);
        });
        assert_eq!(seen, Point::new(0, 240));
    }
}
