//! End-to-end tests for the Clash host.
//!
//! These drive whole matches through the runner the way the binary does:
//! config in, data files loaded, frames stepped, snapshots out.

#![cfg(test)]

use std::fs;

use clash_common::FighterId;
use clash_gameplay::{CharacterTable, CombatConfig, MatchSnapshot, Stage};
use tempfile::TempDir;

use crate::config::EngineConfig;
use crate::runner::{self, build_match, load_stage, DEMO_FIGHTERS};

const STAGE_RON: &str = include_str!("../../../data/stage.ron");

fn short_run(frames: u32, snapshot_interval: u32) -> EngineConfig {
    EngineConfig {
        frames,
        snapshot_interval,
        ..Default::default()
    }
}

fn run_to_string(config: &EngineConfig) -> (runner::RunSummary, String) {
    let mut out = Vec::new();
    let summary = runner::run(config, &mut out).expect("match runs");
    let text = String::from_utf8(out).expect("utf-8 output");
    (summary, text)
}

/// Match setup and data loading
mod setup_tests {
    use super::*;

    #[test]
    fn e2e_default_match_has_two_fighters_on_the_floor() {
        let game = build_match(&EngineConfig::default()).expect("default match");
        let ids: Vec<FighterId> = game.fighters().map(|f| f.id()).collect();
        assert_eq!(ids, DEMO_FIGHTERS.to_vec());
        assert!(game.fighters().all(|f| f.is_grounded()));
        assert_eq!(game.stage().name, "Proving Grounds");
    }

    #[test]
    fn e2e_bundled_stage_parses() {
        let stage = Stage::from_ron(STAGE_RON).expect("bundled stage is valid");
        assert_eq!(stage.name, "Twin Ledges");
        assert_eq!(stage.segments().len(), 6);
    }

    #[test]
    fn e2e_stage_file_is_used() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("stage.ron");
        fs::write(&path, STAGE_RON).expect("write stage");

        let config = EngineConfig {
            stage_path: Some(path),
            ..short_run(30, 0)
        };
        let game = build_match(&config).expect("match from stage file");
        assert_eq!(game.stage().name, "Twin Ledges");
        let positions: Vec<f32> = game.fighters().map(|f| f.position().x).collect();
        assert_eq!(positions, vec![-20.0, 20.0]);
    }

    #[test]
    fn e2e_roster_file_round_trips() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("roster.ron");
        let text = CharacterTable::builtin().to_ron().expect("serialize roster");
        fs::write(&path, text).expect("write roster");

        let config = EngineConfig {
            roster_path: Some(path),
            ..short_run(30, 0)
        };
        let game = build_match(&config).expect("match from roster file");
        assert_eq!(game.roster().len(), 2);
    }

    #[test]
    fn e2e_missing_stage_file_is_an_error() {
        let config = EngineConfig {
            stage_path: Some("/nonexistent/stage.ron".into()),
            ..Default::default()
        };
        let err = build_match(&config).expect_err("missing stage");
        assert!(err.to_string().contains("failed to read stage"));
    }

    #[test]
    fn e2e_invalid_stage_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("stage.ron");
        let no_spawns = STAGE_RON.replace(
            "spawn_points: [(-20.0, 0.0), (20.0, 0.0), (-40.0, 0.0), (40.0, 0.0)]",
            "spawn_points: []",
        );
        assert_ne!(no_spawns, STAGE_RON);
        fs::write(&path, no_spawns).expect("write stage");

        assert!(load_stage(Some(&path)).is_err());
    }

    #[test]
    fn e2e_invalid_combat_config_is_rejected() {
        let config = EngineConfig {
            combat: CombatConfig {
                shield_max: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = build_match(&config).expect_err("bad combat table");
        assert!(err.to_string().contains("invalid combat configuration"));
    }
}

/// Running matches
mod run_tests {
    use super::*;

    #[test]
    fn e2e_demo_match_reaches_frame_limit() {
        let (summary, text) = run_to_string(&short_run(300, 60));
        assert!(summary.frames <= 300);
        if summary.winner.is_none() {
            assert_eq!(summary.frames, 300);
        }

        let snapshots: Vec<MatchSnapshot> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("snapshot json"))
            .collect();
        assert_eq!(snapshots.len(), summary.snapshots);
        assert!(snapshots.windows(2).all(|w| w[0].frame < w[1].frame));
        assert!(snapshots.iter().all(|s| s.fighters.len() == 2));
    }

    #[test]
    fn e2e_demo_match_is_deterministic() {
        let config = short_run(400, 20);
        let (first, first_text) = run_to_string(&config);
        let (second, second_text) = run_to_string(&config);
        assert_eq!(first_text, second_text);
        assert_eq!(first.final_snapshot, second.final_snapshot);
    }

    #[test]
    fn e2e_pilots_make_contact() {
        let (summary, _) = run_to_string(&short_run(900, 0));
        let damaged = summary
            .final_snapshot
            .fighters
            .iter()
            .any(|f| f.percent > 0.0 || f.stocks < 4);
        assert!(damaged, "scripted pilots should land at least one hit");
    }

    #[test]
    fn e2e_ko_ends_single_stock_match() {
        // Second spawn point sits above the blast zone
        let stage = STAGE_RON.replace("(20.0, 0.0), (-40.0", "(20.0, 200.0), (-40.0");
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("stage.ron");
        fs::write(&path, stage).expect("write stage");

        let config = EngineConfig {
            stocks: 1,
            stage_path: Some(path),
            ..short_run(600, 0)
        };
        let (summary, _) = run_to_string(&config);
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.winner, Some(DEMO_FIGHTERS[0]));
        let loser = &summary.final_snapshot.fighters[1];
        assert!(!loser.in_play);
        assert_eq!(loser.stocks, 0);
    }

    #[test]
    fn e2e_knocked_out_fighters_respawn() {
        let stage = STAGE_RON.replace("(20.0, 0.0), (-40.0", "(20.0, 200.0), (-40.0");
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("stage.ron");
        fs::write(&path, stage).expect("write stage");

        let config = EngineConfig {
            stocks: 3,
            stage_path: Some(path),
            ..short_run(5, 0)
        };
        let (summary, _) = run_to_string(&config);
        // The respawn point is above the blast zone too, so each frame costs a stock
        let loser = &summary.final_snapshot.fighters[1];
        assert_eq!(loser.stocks, 0);
        assert_eq!(summary.winner, Some(DEMO_FIGHTERS[0]));
        assert_eq!(summary.frames, 3);
    }
}
