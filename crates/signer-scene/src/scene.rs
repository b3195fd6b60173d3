//! The retained scene graph: allocation, DFS sequencing into a render list,
//! and fragment rendering into RGB565 row buffers.

use crate::animation::{Animation, CompletionKind, OnComplete};
use crate::arena::{Arena, Handle};
use crate::curves::CurveFn;
use crate::node::{Node, NodeKind, Point, RenderEntry};
#[cfg(test)]
use crate::node::Color;

pub struct Scene {
    nodes: Arena<Node>,
    root: Handle,
    capacity: usize,
    render_list: Vec<RenderEntry>,
}

impl Scene {
    pub fn new(capacity: usize) -> Self {
        let mut nodes = Arena::new();
        let root = nodes
            .insert(Node::new(NodeKind::Group { children: Vec::new() }), capacity)
            .expect("capacity must allow at least the root node");
        Scene {
            nodes,
            root,
            capacity,
            render_list: Vec::new(),
        }
    }

    pub fn root(&self) -> Handle {
        self.root
    }

    /// Allocates a node; returns `None` when the arena is at capacity,
    /// mirroring the firmware's "no node" soft failure.
    pub fn create_node(&mut self, kind: NodeKind) -> Option<Handle> {
        let handle = self.nodes.insert(Node::new(kind), self.capacity);
        if handle.is_none() {
            tracing::warn!(capacity = self.capacity, "scene node arena exhausted");
        }
        handle
    }

    pub fn create_group(&mut self) -> Option<Handle> {
        self.create_node(NodeKind::Group { children: Vec::new() })
    }

    pub fn set_position(&mut self, handle: Handle, position: Point) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.position = position;
        }
    }

    pub fn position(&self, handle: Handle) -> Point {
        self.nodes.get(handle).map(|n| n.position).unwrap_or(Point::ORIGIN)
    }

    pub fn append_child(&mut self, parent: Handle, child: Handle) {
        if let Some(node) = self.nodes.get_mut(parent) {
            if let NodeKind::Group { children } = &mut node.kind {
                children.push(child);
            }
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Tags a node for removal on the next sequencing pass rather than
    /// unlinking it immediately, matching the firmware's deferred free.
    pub fn remove(&mut self, handle: Handle, detach_now: bool) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.pending_free = true;
        }
        if detach_now {
            self.detach_pending(handle);
        }
    }

    fn detach_pending(&mut self, handle: Handle) {
        let parent = self.nodes.get(handle).and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                if let NodeKind::Group { children } = &mut parent_node.kind {
                    children.retain(|&c| c != handle);
                }
            }
        }
        self.nodes.remove(handle);
    }

    pub fn animate_position(
        &mut self,
        handle: Handle,
        to: Point,
        curve: CurveFn,
        now_ms: u64,
        duration_ms: u64,
        on_complete: Option<OnComplete>,
    ) {
        let from = self.position(handle);
        if let Some(node) = self.nodes.get_mut(handle) {
            node.animations.push(Animation::new(from, to, curve, now_ms, duration_ms, on_complete));
        }
    }

    /// Tags the first in-flight animation on `handle` to stop on the next
    /// sequencing pass, matching `stop_animations`.
    pub fn stop_animations(&mut self, handle: Handle, kind: CompletionKind) {
        if let Some(node) = self.nodes.get_mut(handle) {
            if let Some(first) = node.animations.first_mut() {
                first.stop = Some(kind);
            }
        }
    }

    /// Advances all animations and rebuilds the render list in DFS order,
    /// returning nodes unlinked this pass so callers can run deferred
    /// completion work (e.g. removing them from the scene).
    pub fn sequence(&mut self, now_ms: u64) {
        self.render_list.clear();
        let root = self.root;
        let mut completions: Vec<(Handle, OnComplete, CompletionKind)> = Vec::new();
        self.sequence_node(root, Point::ORIGIN, now_ms, &mut completions);

        for (_, callback, kind) in completions {
            callback(kind);
        }
        self.sweep_pending(root);
    }

    fn sweep_pending(&mut self, handle: Handle) {
        let children: Vec<Handle> = match self.nodes.get(handle) {
            Some(Node { kind: NodeKind::Group { children }, .. }) => children.clone(),
            _ => return,
        };
        for child in children {
            self.sweep_pending(child);
            if self.nodes.get(child).map(|n| n.pending_free).unwrap_or(false) {
                self.detach_pending(child);
            }
        }
    }

    fn sequence_node(
        &mut self,
        handle: Handle,
        parent_offset: Point,
        now_ms: u64,
        completions: &mut Vec<(Handle, OnComplete, CompletionKind)>,
    ) {
        let mut finished = Vec::new();
        if let Some(node) = self.nodes.get_mut(handle) {
            let mut remaining = Vec::with_capacity(node.animations.len());
            for mut anim in std::mem::take(&mut node.animations) {
                let (position, done) = anim.step(now_ms);
                node.position = position;
                if let Some(kind) = done {
                    if let Some(cb) = anim.on_complete.take() {
                        finished.push((cb, kind));
                    }
                } else {
                    remaining.push(anim);
                }
            }
            node.animations = remaining;
        }
        for (cb, kind) in finished {
            completions.push((handle, cb, kind));
        }

        let (kind, position) = match self.nodes.get(handle) {
            Some(node) => (node.kind.clone(), node.position),
            None => return,
        };
        let offset = Point::new(parent_offset.x + position.x, parent_offset.y + position.y);

        match kind {
            NodeKind::Group { children } => {
                for child in children {
                    self.sequence_node(child, offset, now_ms, completions);
                }
            }
            NodeKind::Fill { color } => {
                self.render_list.push(RenderEntry::Fill { origin: offset, color });
            }
            NodeKind::Box { width, height, color } => {
                self.render_list.push(RenderEntry::Box { origin: offset, width, height, color });
            }
            NodeKind::Image { pixels, width, height } => {
                self.render_list.push(RenderEntry::Image { origin: offset, pixels, width, height });
            }
            NodeKind::Text { text, color } => {
                self.render_list.push(RenderEntry::Text { origin: offset, text, color });
            }
        }
    }

    pub fn render_list(&self) -> &[RenderEntry] {
        &self.render_list
    }

    /// Renders one horizontal fragment `[y0, y0+fragment_height)` into a
    /// `width * fragment_height` RGB565 buffer, clipping each entry to the
    /// fragment and to the screen width.
    pub fn render_fragment(&self, width: u32, y0: i32, fragment_height: u32) -> Vec<u16> {
        let mut buf = vec![0u16; (width * fragment_height) as usize];
        for entry in &self.render_list {
            draw_entry(entry, &mut buf, width, y0, fragment_height);
        }
        buf
    }
}

fn draw_entry(entry: &RenderEntry, buf: &mut [u16], width: u32, y0: i32, fragment_height: u32) {
    match entry {
        RenderEntry::Fill { color, .. } => {
            buf.fill(color.0);
        }
        RenderEntry::Box { origin, width: w, height: h, color } => {
            fill_rect(buf, width, y0, fragment_height, *origin, *w, *h, color.0);
        }
        RenderEntry::Image { origin, pixels, width: w, height: h } => {
            draw_image(buf, width, y0, fragment_height, *origin, pixels, *w, *h);
        }
        RenderEntry::Text { origin, text, color } => {
            draw_text(buf, width, y0, fragment_height, *origin, text, color.0);
        }
    }
}

fn fill_rect(
    buf: &mut [u16],
    screen_width: u32,
    y0: i32,
    fragment_height: u32,
    origin: Point,
    w: u32,
    h: u32,
    color: u16,
) {
    for row in 0..h as i32 {
        let screen_y = origin.y + row;
        if screen_y < y0 || screen_y >= y0 + fragment_height as i32 {
            continue;
        }
        let local_y = (screen_y - y0) as u32;
        for col in 0..w as i32 {
            let screen_x = origin.x + col;
            if screen_x < 0 || screen_x as u32 >= screen_width {
                continue;
            }
            buf[(local_y * screen_width + screen_x as u32) as usize] = color;
        }
    }
}

fn draw_image(
    buf: &mut [u16],
    screen_width: u32,
    y0: i32,
    fragment_height: u32,
    origin: Point,
    pixels: &[u16],
    w: u32,
    h: u32,
) {
    for row in 0..h as i32 {
        let screen_y = origin.y + row;
        if screen_y < y0 || screen_y >= y0 + fragment_height as i32 {
            continue;
        }
        let local_y = (screen_y - y0) as u32;
        for col in 0..w as i32 {
            let screen_x = origin.x + col;
            if screen_x < 0 || screen_x as u32 >= screen_width {
                continue;
            }
            let src = (row as u32 * w + col as u32) as usize;
            if src < pixels.len() {
                buf[(local_y * screen_width + screen_x as u32) as usize] = pixels[src];
            }
        }
    }
}

const FONT_WIDTH: i32 = 5;
const FONT_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = FONT_WIDTH + 1;

/// Row-packed 5x7 glyph bitmaps for `0`-`9`, bit 0 is the leftmost column.
/// The firmware's real `FontData` table (`main/system/scene.c`) covers the
/// full printable range with per-glyph top-offset/row-count metrics; that
/// pixel data isn't part of this tree, so unmapped characters fall back to
/// `BLOCK_GLYPH`, the same way the firmware falls back to glyph index 0 for
/// a code point past its table (`c -= 33; if (c >= 94) { c = 0; }`).
const BLOCK_GLYPH: [u8; FONT_HEIGHT as usize] = [0b11111; FONT_HEIGHT as usize];
const DIGIT_GLYPHS: [[u8; FONT_HEIGHT as usize]; 10] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110], // 0
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110], // 1
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111], // 2
    [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110], // 3
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010], // 4
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110], // 5
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110], // 6
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000], // 7
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110], // 8
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100], // 9
];

fn glyph_rows(ch: char) -> [u8; FONT_HEIGHT as usize] {
    if ch.is_ascii_digit() {
        DIGIT_GLYPHS[(ch as u8 - b'0') as usize]
    } else {
        BLOCK_GLYPH
    }
}

/// Blits one row of font bits, shifting off-screen columns out the same way
/// `_textRender` does (`row >>= si` to trim the left, a mask to trim the
/// right) instead of testing each pixel's absolute column.
fn blit_glyph_row(buf: &mut [u16], screen_width: u32, local_y: u32, ox: i32, mut row: u8, color: u16) {
    let mut out_x = ox;
    if out_x < 0 {
        let shift = (-out_x).min(FONT_WIDTH) as u32;
        row >>= shift;
        out_x += shift as i32;
    }
    let remaining = screen_width as i32 - out_x;
    if remaining <= 0 {
        return;
    }
    if remaining < FONT_WIDTH {
        row &= (1u8 << remaining) - 1;
    }
    while row != 0 {
        if row & 1 != 0 {
            buf[(local_y * screen_width + out_x as u32) as usize] = color;
        }
        row >>= 1;
        out_x += 1;
    }
}

fn draw_text(
    buf: &mut [u16],
    screen_width: u32,
    y0: i32,
    fragment_height: u32,
    origin: Point,
    text: &str,
    color: u16,
) {
    let fragment_end = y0 + fragment_height as i32;
    if origin.y >= fragment_end || origin.y + FONT_HEIGHT <= y0 {
        return;
    }

    let mut ox = origin.x;
    for ch in text.chars() {
        if ch == ' ' {
            ox += GLYPH_ADVANCE;
            continue;
        }
        if ox >= screen_width as i32 {
            break;
        }

        let rows = glyph_rows(ch);
        for (row_idx, row_bits) in rows.into_iter().enumerate() {
            let screen_y = origin.y + row_idx as i32;
            if screen_y < y0 || screen_y >= fragment_end {
                continue;
            }
            let local_y = (screen_y - y0) as u32;
            blit_glyph_row(buf, screen_width, local_y, ox, row_bits, color);
        }

        ox += GLYPH_ADVANCE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::linear;

    #[test]
    fn fill_node_covers_entire_fragment() {
        let mut scene = Scene::new(8);
        let fill = scene
            .create_node(NodeKind::Fill { color: Color(0x1234) })
            .unwrap();
        scene.append_child(scene.root(), fill);
        scene.sequence(0);

        let buf = scene.render_fragment(4, 0, 4);
        assert!(buf.iter().all(|&px| px == 0x1234));
    }

    #[test]
    fn box_clips_to_fragment_and_screen() {
        let mut scene = Scene::new(8);
        let node = scene
            .create_node(NodeKind::Box { width: 10, height: 10, color: Color(0xffff) })
            .unwrap();
        scene.set_position(node, Point::new(-2, 0));
        scene.append_child(scene.root(), node);
        scene.sequence(0);

        let buf = scene.render_fragment(4, 0, 4);
        assert_eq!(buf[0], 0xffff);
    }

    #[test]
    fn animation_completes_and_is_detached() {
        let mut scene = Scene::new(8);
        let group = scene.create_group().unwrap();
        scene.append_child(scene.root(), group);
        scene.animate_position(group, Point::new(100, 0), linear, 0, 100, None);

        scene.sequence(50);
        assert_eq!(scene.position(group), Point::new(50, 0));

        scene.sequence(100);
        assert_eq!(scene.position(group), Point::new(100, 0));
    }

    #[test]
    fn digit_glyph_draws_its_bit_pattern() {
        let mut scene = Scene::new(8);
        let text = scene
            .create_node(NodeKind::Text { text: "1".into(), color: Color(0xffff) })
            .unwrap();
        scene.append_child(scene.root(), text);
        scene.sequence(0);

        let buf = scene.render_fragment(8, 0, 8);
        // Row 0 of glyph '1' is 0b00100: only the middle column is lit.
        assert_eq!(buf[2], 0xffff);
        assert_eq!(buf[0], 0x0000);
        assert_eq!(buf[1], 0x0000);
    }

    #[test]
    fn glyph_row_is_masked_past_the_screen_edge() {
        let mut buf = vec![0u16; 4];
        blit_glyph_row(&mut buf, 4, 0, 2, 0b11111, 0xffff);
        assert_eq!(buf, vec![0x0000, 0x0000, 0xffff, 0xffff]);
    }

    #[test]
    fn pending_free_is_unlinked_after_sequencing() {
        let mut scene = Scene::new(8);
        let child = scene.create_group().unwrap();
        scene.append_child(scene.root(), child);
        scene.remove(child, false);
        scene.sequence(0);
        assert!(scene.nodes.get(child).is_none());
    }
}
