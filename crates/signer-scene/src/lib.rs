//! Retained scene graph and fragment renderer.
//!
//! Nodes live in a generation-checked arena instead of the firmware's
//! intrusive free-list pointers; animations attach typed completion
//! closures instead of a function pointer plus `void*`; rendering walks the
//! tree once per frame into a render list, then rasterizes that list into
//! horizontal screen fragments.

pub mod animation;
pub mod arena;
pub mod curves;
pub mod node;
pub mod scene;

pub use animation::CompletionKind;
pub use arena::Handle;
pub use curves::{ease_in_cubic, ease_in_out_quad, ease_in_quad, ease_out_cubic, ease_out_quad, linear, CurveFn};
pub use node::{Color, NodeKind, Point, RenderEntry};
pub use scene::Scene;
