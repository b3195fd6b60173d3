//! Node kinds and their payloads, a discriminated union replacing the
//! firmware's shared `a`/`b` word slots (whose meaning depended on
//! `node->kind`) with an enum matched exhaustively at every call site.

use crate::arena::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u16);

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Children are walked in insertion order; `ffx_sceneGroup_appendChild`
    /// becomes a plain `Vec::push`.
    Group { children: Vec<Handle> },
    /// Emits one full-screen render entry per frame.
    Fill { color: Color },
    Box { width: u32, height: u32, color: Color },
    Image { pixels: std::sync::Arc<[u16]>, width: u32, height: u32 },
    Text { text: String, color: Color },
}

pub struct Node {
    pub kind: NodeKind,
    pub position: Point,
    pub parent: Option<Handle>,
    pub pending_free: bool,
    pub(crate) animations: Vec<crate::animation::Animation>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            position: Point::ORIGIN,
            parent: None,
            pending_free: false,
            animations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RenderEntry {
    Fill { origin: Point, color: Color },
    Box { origin: Point, width: u32, height: u32, color: Color },
    Image { origin: Point, pixels: std::sync::Arc<[u16]>, width: u32, height: u32 },
    Text { origin: Point, text: String, color: Color },
}
