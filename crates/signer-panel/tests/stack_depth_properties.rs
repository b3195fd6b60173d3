//! Property-based tests for panel stack depth across push/pop sequences.

use std::sync::Arc;

use proptest::prelude::*;
use signer_events::EventBus;
use signer_panel::{PanelStack, PanelStyle};
use signer_scene::Scene;

#[derive(Debug, Clone, Copy)]
enum Op {
    Push(PanelStyle),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Push(PanelStyle::Instant)),
        Just(Op::Push(PanelStyle::CoverUp)),
        Just(Op::Push(PanelStyle::SlideLeft)),
        Just(Op::Pop),
    ]
}

proptest! {
    // Pushing always grows the stack by one and pop shrinks it by at most
    // one; the active panel after replaying a sequence always matches the
    // number of pushes left un-popped.
    #[test]
    fn stack_depth_tracks_push_and_pop(ops in prop::collection::vec(op_strategy(), 0..20)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let scene = Scene::new(128);
            let events = Arc::new(EventBus::new(16));
            let stack = PanelStack::new(scene, events, 240, 240);

            let mut depth: usize = 0;
            for op in ops {
                match op {
                    Op::Push(style) => {
                        stack.push(style, 0, |_, _| {});
                        depth += 1;
                    }
                    Op::Pop => {
                        if depth > 0 {
                            stack.pop(0);
                            depth -= 1;
                        }
                    }
                }
            }

            prop_assert_eq!(stack.active_panel().is_some(), depth > 0);
            Ok(())
        })?;
    }
}
