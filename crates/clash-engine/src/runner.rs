//! Headless match runner.
//!
//! Loads stage and roster data, builds a match from the host config and
//! drives it with scripted pilots, writing JSON snapshots as it goes.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clash_common::{CharacterId, FighterId, Frame};
use clash_gameplay::{CharacterTable, Fighter, InputRecord, Match, MatchSnapshot, Stage};
use tracing::{debug, info};

use crate::combat_log::CombatLog;
use crate::config::EngineConfig;
use crate::pilot::pilot_input;
use crate::timing::FrameTiming;

/// Fighters in the demo match.
pub const DEMO_FIGHTERS: [FighterId; 2] = [FighterId::new(1), FighterId::new(2)];

/// Outcome of a run.
#[derive(Debug)]
pub struct RunSummary {
    /// Frames simulated
    pub frames: Frame,
    /// Last fighter standing, if the match finished
    pub winner: Option<FighterId>,
    /// Snapshots written
    pub snapshots: usize,
    /// State after the last frame
    pub final_snapshot: MatchSnapshot,
}

/// Loads the stage named in the config, or the proving grounds.
pub fn load_stage(path: Option<&Path>) -> Result<Stage> {
    let Some(path) = path else {
        return Ok(Stage::proving_grounds());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read stage {}", path.display()))?;
    let stage =
        Stage::from_ron(&text).with_context(|| format!("invalid stage {}", path.display()))?;
    info!("Loaded stage '{}' from {}", stage.name, path.display());
    Ok(stage)
}

/// Loads the roster named in the config, or the built-in roster.
pub fn load_roster(path: Option<&Path>) -> Result<CharacterTable> {
    let Some(path) = path else {
        return Ok(CharacterTable::builtin());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read roster {}", path.display()))?;
    let roster = CharacterTable::from_ron(&text)
        .with_context(|| format!("invalid roster {}", path.display()))?;
    info!("Loaded {} characters from {}", roster.len(), path.display());
    Ok(roster)
}

/// Builds the demo match: one fighter per roster entry, cycling if short.
pub fn build_match(config: &EngineConfig) -> Result<Match> {
    let stage = load_stage(config.stage_path.as_deref())?;
    let roster = load_roster(config.roster_path.as_deref())?;
    let characters: Vec<CharacterId> = roster.ids().collect();
    if characters.is_empty() {
        bail!("roster has no characters");
    }

    let mut game = Match::new(stage, roster, config.combat.clone())
        .context("invalid combat configuration")?
        .with_stocks(config.stocks);
    for (slot, id) in DEMO_FIGHTERS.into_iter().enumerate() {
        game.spawn(id, characters[slot % characters.len()])?;
    }
    Ok(game)
}

/// Runs the demo match to completion or the configured frame limit.
pub fn run<W: Write>(config: &EngineConfig, out: &mut W) -> Result<RunSummary> {
    let mut game = build_match(config)?;
    let log = CombatLog::new();
    let mut timing = config.realtime.then(|| FrameTiming::new(config.target_fps));
    let mut snapshots = 0;

    info!(
        frames = config.frames,
        realtime = config.realtime,
        target_fps = timing.as_ref().map_or(0, FrameTiming::target_fps),
        stage = %game.stage().name,
        "Match starting"
    );
    // Setup time is not owed to the simulation
    if let Some(timing) = timing.as_mut() {
        timing.reset();
    }

    while !done(&game, config) {
        let due = match timing.as_mut() {
            Some(timing) => {
                timing.sleep_remainder();
                let dt = timing.delta_time();
                timing.accumulate(dt)
            },
            None => 1,
        };
        for _ in 0..due {
            if done(&game, config) {
                break;
            }
            advance(&mut game, config, &log)?;
            if config.snapshot_interval > 0 && game.frame() % config.snapshot_interval == 0 {
                writeln!(out, "{}", game.snapshot().to_json()?)?;
                snapshots += 1;
            }
        }
    }
    out.flush()?;

    let summary = RunSummary {
        frames: game.frame(),
        winner: game.winner(),
        snapshots,
        final_snapshot: game.snapshot(),
    };
    for (kind, count) in log.counts() {
        debug!(kind, count, "event total");
    }
    for id in DEMO_FIGHTERS {
        let tally = log.tally(id);
        info!(
            fighter = %id,
            landed = tally.hits_landed,
            taken = tally.hits_taken,
            kos = tally.kos,
            "Fighter summary"
        );
    }
    info!(
        frames = summary.frames,
        events = log.total(),
        kos = log.count("ko"),
        snapshots = summary.snapshots,
        projectiles = summary.final_snapshot.projectiles.len(),
        winner = ?summary.winner,
        rate = timing.as_ref().map_or(0.0, FrameTiming::current_rate),
        "Match finished"
    );
    Ok(summary)
}

fn done(game: &Match, config: &EngineConfig) -> bool {
    game.frame() >= config.frames || game.is_finished()
}

/// Feeds pilot inputs, steps one frame and handles the frame's events.
fn advance(game: &mut Match, config: &EngineConfig, log: &CombatLog) -> Result<()> {
    let frame = game.frame();
    let inputs: Vec<(FighterId, InputRecord)> = {
        let fighters: Vec<&Fighter> = game.fighters().collect();
        fighters
            .iter()
            .map(|me| {
                let target = fighters
                    .iter()
                    .find(|f| f.id() != me.id() && f.in_play())
                    .copied();
                (me.id(), pilot_input(frame, me, target))
            })
            .collect()
    };
    for (id, input) in inputs {
        game.set_input(id, input)?;
    }

    game.step();
    game.dispatch_events(log);

    if config.auto_respawn {
        let down: Vec<FighterId> = game
            .fighters()
            .filter(|f| !f.in_play() && f.stocks() > 0)
            .map(Fighter::id)
            .collect();
        for id in down {
            game.respawn(id)?;
        }
    }
    Ok(())
}
