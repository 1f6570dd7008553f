//! Combat event bus.
//!
//! The simulation publishes what happened each frame; hosts drain the bus or
//! forward events to an [`EventHandler`].

use clash_common::{FighterId, Frame};
use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::moves::MoveKind;

/// Something that happened during a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// An attack connected with a body
    Hit {
        /// Frame of the hit
        frame: Frame,
        /// Attacking fighter
        attacker: FighterId,
        /// Fighter that was hit
        defender: FighterId,
        /// Damage dealt
        damage: f32,
        /// Launch angle in degrees
        angle: f32,
        /// Launch speed
        launch_speed: f32,
        /// The launch is a spike
        spike: bool,
        /// Super armor absorbed the launch
        armored: bool,
    },
    /// An attack connected with a shield
    ShieldHit {
        /// Frame of the hit
        frame: Frame,
        /// Attacking fighter
        attacker: FighterId,
        /// Shielding fighter
        defender: FighterId,
        /// Shield damage
        damage: f32,
        /// Shield health left
        health: f32,
    },
    /// A shield ran out of health
    ShieldBreak {
        /// Frame of the break
        frame: Frame,
        /// Fighter whose shield broke
        fighter: FighterId,
    },
    /// A hit landed inside the defender's parry window
    Parry {
        /// Frame of the parry
        frame: Frame,
        /// Fighter whose attack was parried
        attacker: FighterId,
        /// Fighter that parried
        defender: FighterId,
    },
    /// A grab connected
    Grab {
        /// Frame of the grab
        frame: Frame,
        /// Grabbing fighter
        grabber: FighterId,
        /// Grabbed fighter
        victim: FighterId,
    },
    /// A grabbed fighter was thrown
    Throw {
        /// Frame of the throw
        frame: Frame,
        /// Throwing fighter
        grabber: FighterId,
        /// Thrown fighter
        victim: FighterId,
        /// Throw used
        kind: MoveKind,
    },
    /// A fighter teched a stage contact
    Tech {
        /// Frame of the tech
        frame: Frame,
        /// Fighter that teched
        fighter: FighterId,
    },
    /// A fighter in hitstun was stopped hard by the stage
    StageSpike {
        /// Frame of the contact
        frame: Frame,
        /// Fighter that was spiked
        fighter: FighterId,
        /// Surface normal at contact
        normal: Vec2,
    },
    /// A fighter landed in hitstun without teching
    Knockdown {
        /// Frame of the landing
        frame: Frame,
        /// Fighter knocked down
        fighter: FighterId,
    },
    /// A fighter left the blast zone
    Ko {
        /// Frame of the KO
        frame: Frame,
        /// Fighter that lost a stock
        fighter: FighterId,
        /// Stocks left
        stocks_left: u8,
    },
}

impl CombatEvent {
    /// Frame the event happened on.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        match self {
            Self::Hit { frame, .. }
            | Self::ShieldHit { frame, .. }
            | Self::ShieldBreak { frame, .. }
            | Self::Parry { frame, .. }
            | Self::Grab { frame, .. }
            | Self::Throw { frame, .. }
            | Self::Tech { frame, .. }
            | Self::StageSpike { frame, .. }
            | Self::Knockdown { frame, .. }
            | Self::Ko { frame, .. } => *frame,
        }
    }

    /// Short event name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hit { .. } => "hit",
            Self::ShieldHit { .. } => "shield_hit",
            Self::ShieldBreak { .. } => "shield_break",
            Self::Parry { .. } => "parry",
            Self::Grab { .. } => "grab",
            Self::Throw { .. } => "throw",
            Self::Tech { .. } => "tech",
            Self::StageSpike { .. } => "stage_spike",
            Self::Knockdown { .. } => "knockdown",
            Self::Ko { .. } => "ko",
        }
    }
}

/// Event bus for broadcasting combat events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<CombatEvent>,
    /// Receiver for collecting events
    receiver: Receiver<CombatEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: CombatEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<CombatEvent> {
        self.sender.clone()
    }
}

/// Typed event handler trait.
pub trait EventHandler: Send + Sync {
    /// Handles an event.
    fn handle(&self, event: &CombatEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech(frame: Frame) -> CombatEvent {
        CombatEvent::Tech {
            frame,
            fighter: FighterId::new(1),
        }
    }

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(8);
        bus.publish(tech(1));
        bus.publish(tech(2));
        assert_eq!(bus.pending_count(), 2);

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].frame(), 2);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops_events() {
        let bus = EventBus::new(1);
        bus.publish(tech(1));
        bus.publish(tech(2));
        assert_eq!(bus.drain(), vec![tech(1)]);
    }

    #[test]
    fn test_sender_handle() {
        let bus = EventBus::default();
        assert_eq!(bus.capacity(), 1024);
        let sender = bus.sender();
        sender.try_send(tech(5)).expect("room in channel");
        assert_eq!(bus.drain()[0].name(), "tech");
    }
}
