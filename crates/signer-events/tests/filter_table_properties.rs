//! Property-based tests for the event bus's fixed-capacity filter table.

use proptest::prelude::*;
use signer_events::{EventBus, EventCategory, EventPayload, EventsError, Keys, PanelId};

proptest! {
    // Registering more filters than capacity always fails past the limit,
    // and every successful registration below it is distinct.
    #[test]
    fn registration_never_exceeds_capacity(capacity in 1usize..16, attempts in 1usize..32) {
        let bus = EventBus::new(capacity);
        let mut registered = 0;
        for i in 0..attempts {
            let (tx, _rx) = tokio::sync::mpsc::channel(1);
            let result = bus.register(PanelId(i as u32), EventCategory::KeysDown, tx);
            match result {
                Ok(_) => registered += 1,
                Err(EventsError::FilterTableFull) => {
                    prop_assert_eq!(registered, capacity);
                }
            }
        }
        prop_assert!(registered <= capacity);
    }

    // A published event reaches exactly the filters registered for its
    // category, never filters registered for a different one.
    #[test]
    fn publish_only_reaches_matching_category(send_keys_down in any::<bool>()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let bus = EventBus::new(4);
            let (tx_down, mut rx_down) = tokio::sync::mpsc::channel(4);
            let (tx_up, mut rx_up) = tokio::sync::mpsc::channel(4);
            bus.register(PanelId(1), EventCategory::KeysDown, tx_down).unwrap();
            bus.register(PanelId(1), EventCategory::KeysUp, tx_up).unwrap();

            if send_keys_down {
                bus.publish(EventPayload::KeysDown(Keys::OK)).await;
                prop_assert!(rx_down.recv().await.is_some());
                prop_assert!(rx_up.try_recv().is_err());
            } else {
                bus.publish(EventPayload::KeysUp(Keys::OK)).await;
                prop_assert!(rx_up.recv().await.is_some());
                prop_assert!(rx_down.try_recv().is_err());
            }
            Ok(())
        })?;
    }
}
