//! Combat event logging.
//!
//! Receives drained [`CombatEvent`]s from the match, writes them to the
//! `tracing` log and keeps per-kind tallies for the end-of-run summary.

use std::collections::BTreeMap;

use clash_common::FighterId;
use clash_gameplay::{CombatEvent, EventHandler};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Per-fighter tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FighterTally {
    /// Hits landed
    pub hits_landed: u32,
    /// Hits taken
    pub hits_taken: u32,
    /// Stocks lost
    pub kos: u32,
}

/// Logs combat events and counts them.
#[derive(Debug, Default)]
pub struct CombatLog {
    counts: Mutex<BTreeMap<&'static str, u32>>,
    fighters: Mutex<BTreeMap<FighterId, FighterTally>>,
}

impl CombatLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events seen of one kind.
    #[must_use]
    pub fn count(&self, kind: &str) -> u32 {
        self.counts.lock().get(kind).copied().unwrap_or(0)
    }

    /// Total events seen.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.counts.lock().values().sum()
    }

    /// Tallies for one fighter.
    #[must_use]
    pub fn tally(&self, fighter: FighterId) -> FighterTally {
        self.fighters.lock().get(&fighter).copied().unwrap_or_default()
    }

    /// Event counts by kind, in name order.
    #[must_use]
    pub fn counts(&self) -> Vec<(&'static str, u32)> {
        self.counts.lock().iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn record(&self, event: &CombatEvent) {
        *self.counts.lock().entry(event.name()).or_insert(0) += 1;

        let mut fighters = self.fighters.lock();
        match *event {
            CombatEvent::Hit { attacker, defender, .. } => {
                fighters.entry(attacker).or_default().hits_landed += 1;
                fighters.entry(defender).or_default().hits_taken += 1;
            },
            CombatEvent::Ko { fighter, .. } => {
                fighters.entry(fighter).or_default().kos += 1;
            },
            _ => {},
        }
    }
}

impl EventHandler for CombatLog {
    fn handle(&self, event: &CombatEvent) {
        self.record(event);
        match *event {
            CombatEvent::Hit {
                frame,
                attacker,
                defender,
                damage,
                angle,
                launch_speed,
                spike,
                armored,
            } => debug!(
                frame,
                %attacker,
                %defender,
                damage,
                angle,
                launch_speed,
                spike,
                armored,
                "hit"
            ),
            CombatEvent::Ko { frame, fighter, stocks_left } => {
                info!(frame, %fighter, stocks_left, "KO");
            },
            CombatEvent::ShieldBreak { frame, fighter } => {
                info!(frame, %fighter, "shield break");
            },
            CombatEvent::Parry { frame, attacker, defender } => {
                info!(frame, %attacker, %defender, "parry");
            },
            _ => debug!(frame = event.frame(), kind = event.name(), "combat event"),
        }
    }
}
