//! Counters shared by the heartbeat sender, the decoder and the GUI reader.

use crate::gui::KeyEvent;
use shared::TurnDirection;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Lock-free state read by the heartbeat on every tick.
#[derive(Debug, Default)]
pub struct SyncState {
    turn_direction: AtomicU8,
    next_expected_event_no: AtomicU32,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turn_direction(&self) -> TurnDirection {
        TurnDirection::try_from(self.turn_direction.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Key releases only clear the direction they belong to.
    pub fn apply_key(&self, key: KeyEvent) {
        let store = |direction: TurnDirection| {
            self.turn_direction.store(direction.into(), Ordering::Relaxed);
        };
        let release = |direction: TurnDirection| {
            let _ = self.turn_direction.compare_exchange(
                direction.into(),
                TurnDirection::Straight.into(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        };

        match key {
            KeyEvent::LeftDown => store(TurnDirection::Left),
            KeyEvent::RightDown => store(TurnDirection::Right),
            KeyEvent::LeftUp => release(TurnDirection::Left),
            KeyEvent::RightUp => release(TurnDirection::Right),
        }
    }

    pub fn next_expected_event_no(&self) -> u32 {
        self.next_expected_event_no.load(Ordering::Relaxed)
    }

    pub fn set_next_expected_event_no(&self, event_no: u32) {
        self.next_expected_event_no.store(event_no, Ordering::Relaxed);
    }
}
