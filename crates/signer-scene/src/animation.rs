//! Per-node animations, ported from the sequencing-time interpolation
//! described for `ffx_sceneNode_animatePosition`: each animation computes a
//! clamped `[0,1]` progress from elapsed time, runs it through a curve, then
//! hands the eased value to an interpolator closure.

use crate::curves::CurveFn;
use crate::node::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Normal,
    CancelledAtCurrent,
    CancelledAtFinal,
}

/// A typed callback descriptor rather than an opaque function pointer plus
/// `void*` argument: the closure already owns whatever context it needs.
pub type OnComplete = Box<dyn FnOnce(CompletionKind) + Send>;

pub(crate) struct Animation {
    pub from: Point,
    pub to: Point,
    pub curve: CurveFn,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub stop: Option<CompletionKind>,
    pub on_complete: Option<OnComplete>,
}

impl Animation {
    pub fn new(
        from: Point,
        to: Point,
        curve: CurveFn,
        start_ms: u64,
        duration_ms: u64,
        on_complete: Option<OnComplete>,
    ) -> Self {
        Animation {
            from,
            to,
            curve,
            start_ms,
            duration_ms,
            stop: None,
            on_complete,
        }
    }

    /// Returns the interpolated position for `now_ms`, and `Some(kind)` when
    /// the animation has finished and should be detached.
    pub fn step(&self, now_ms: u64) -> (Point, Option<CompletionKind>) {
        if let Some(kind) = self.stop {
            let t = if kind == CompletionKind::CancelledAtFinal { 1.0 } else { self.progress(now_ms) };
            return (self.interpolate(t), Some(kind));
        }

        if self.duration_ms == 0 || now_ms >= self.start_ms + self.duration_ms {
            return (self.to, Some(CompletionKind::Normal));
        }

        (self.interpolate(self.progress(now_ms)), None)
    }

    fn progress(&self, now_ms: u64) -> f32 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(self.start_ms) as f32;
        (elapsed / self.duration_ms as f32).clamp(0.0, 1.0)
    }

    fn interpolate(&self, t_raw: f32) -> Point {
        let t = (self.curve)(t_raw);
        if self.from.x == self.to.x {
            Point::new(self.from.x, lerp(self.from.y, self.to.y, t))
        } else if self.from.y == self.to.y {
            Point::new(lerp(self.from.x, self.to.x, t), self.from.y)
        } else {
            Point::new(lerp(self.from.x, self.to.x, t), lerp(self.from.y, self.to.y, t))
        }
    }
}

fn lerp(a: i32, b: i32, t: f32) -> i32 {
    a + ((b - a) as f32 * t).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::linear;

    #[test]
    fn reaches_destination_at_duration() {
        let anim = Animation::new(Point::ORIGIN, Point::new(240, 0), linear, 0, 300, None);
        let (point, completion) = anim.step(300);
        assert_eq!(point, Point::new(240, 0));
        assert_eq!(completion, Some(CompletionKind::Normal));
    }

    #[test]
    fn midpoint_is_halfway_for_linear_curve() {
        let anim = Animation::new(Point::ORIGIN, Point::new(100, 0), linear, 0, 100, None);
        let (point, completion) = anim.step(50);
        assert_eq!(point, Point::new(50, 0));
        assert_eq!(completion, None);
    }
}
