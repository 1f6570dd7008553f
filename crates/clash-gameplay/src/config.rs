//! Global combat constants.
//!
//! Every value here is shared by all characters. Per-character numbers live
//! in [`crate::character::CharacterConstants`].

use clash_common::{DataError, Frame, FrameWindow};
use serde::{Deserialize, Serialize};

/// How long a moonwalk lasts once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoonwalkPersistence {
    /// Ends after a fixed number of frames.
    Fixed(Frame),
    /// Continues while the stick is held away from the facing direction.
    UntilRelease,
}

/// Global combat tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    // === Knockback ===
    /// Hitstun frames per unit of launch speed
    pub hitstun_multiplier: f32,
    /// Grounded defenders hit at a non-upward angle stay grounded below this launch speed
    pub grounded_launch_threshold: f32,
    /// Airborne hitstun ending at or above this launch speed enters tumble
    pub tumble_threshold: f32,
    /// Converts launch speed into units per frame
    pub launch_velocity_scale: f32,
    /// Launch velocity lost per frame of airborne hitstun
    pub launch_decay: f32,
    /// Half-width of the spike cone around straight down, in degrees
    pub spike_half_cone: f32,
    /// Largest rotation directional influence can apply, in degrees
    pub di_max_degrees: f32,
    /// Positional nudge per frame of hitlag while the stick is held
    pub sdi_distance: f32,

    // === Hitlag ===
    /// Hitlag frames before damage scaling
    pub hitlag_base: f32,
    /// Hitlag frames added per point of damage
    pub hitlag_per_damage: f32,
    /// Upper bound on hitlag frames
    pub hitlag_max: Frame,

    // === Stage ===
    /// Speed above which a hitstun contact with the stage spikes the fighter
    pub stage_spike_speed: f32,
    /// Frames a shield press stays valid as a tech input
    pub tech_window: Frame,
    /// Frames frozen at a stage spike contact
    pub stage_spike_freeze: Frame,
    /// Frames after touching a wall during which a wall jump is allowed
    pub wall_jump_window: Frame,
    /// Stick y at or below this value drops through platforms
    pub platform_drop_threshold: f32,

    // === Shield ===
    /// Maximum shield health
    pub shield_max: f32,
    /// Health regained per frame while not shielding
    pub shield_regen: f32,
    /// Health lost per frame while shielding
    pub shield_decay: f32,
    /// Shield stun frames per point of damage
    pub shield_stun_multiplier: f32,
    /// Frames spent in ShieldBroken
    pub shield_break_frames: Frame,
    /// Frames before impact a shield release still counts as a parry
    pub parry_window: Frame,
    /// Extra frozen frames given to a parried attacker
    pub parry_attacker_lag: Frame,

    // === Grab ===
    /// Frames a thrown victim cannot be re-grabbed by the same grabber
    pub grab_cooldown: Frame,
    /// Frames a grab can be held before both fighters are released
    pub grab_hold_frames: Frame,
    /// Distance in front of the grabber the victim is held at
    pub grab_hold_offset: f32,

    // === Defensive options ===
    /// Airdodge duration
    pub airdodge_frames: Frame,
    /// Airdodge initial speed
    pub airdodge_speed: f32,
    /// Airdodge velocity multiplier per frame
    pub airdodge_decay: f32,
    /// Intangible frames of an airdodge
    pub airdodge_intangible: FrameWindow,
    /// Spotdodge duration
    pub spotdodge_frames: Frame,
    /// Intangible frames of a spotdodge
    pub spotdodge_intangible: FrameWindow,
    /// Roll duration
    pub roll_frames: Frame,
    /// Roll speed
    pub roll_speed: f32,
    /// Intangible frames of a roll
    pub roll_intangible: FrameWindow,
    /// Knockdown duration
    pub knockdown_frames: Frame,
    /// Intangible frames granted on respawn
    pub respawn_intangible_frames: Frame,

    // === Movement ===
    /// Turnaround duration; facing flips at the midpoint
    pub turn_frames: Frame,
    /// How long a moonwalk lasts
    pub moonwalk: MoonwalkPersistence,
    /// Frames of braking after a run before a dash can start
    pub run_end_frames: Frame,
    /// Stick y below the negated value crouches
    pub crouch_threshold: f32,
    /// Duration of entering and of leaving a crouch
    pub crouch_transition_frames: Frame,
    /// Crouch after landing from a free fall or air dodge
    pub land_crouch_frames: Frame,

    // === Smash charge ===
    /// Longest a smash attack can be charged
    pub smash_charge_max_frames: Frame,
    /// Extra damage and knockback at full charge (0.5 = +50%)
    pub smash_charge_bonus: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            // Knockback
            hitstun_multiplier: 0.4,
            grounded_launch_threshold: 80.0,
            tumble_threshold: 80.0,
            launch_velocity_scale: 0.03,
            launch_decay: 0.051,
            spike_half_cone: 12.5,
            di_max_degrees: 15.0,
            sdi_distance: 0.6,

            // Hitlag
            hitlag_base: 3.0,
            hitlag_per_damage: 1.0 / 3.0,
            hitlag_max: 20,

            // Stage
            stage_spike_speed: 2.5,
            tech_window: 20,
            stage_spike_freeze: 1,
            wall_jump_window: 8,
            platform_drop_threshold: 0.7,

            // Shield
            shield_max: 60.0,
            shield_regen: 0.07,
            shield_decay: 0.14,
            shield_stun_multiplier: 0.45,
            shield_break_frames: 300,
            parry_window: 4,
            parry_attacker_lag: 10,

            // Grab
            grab_cooldown: 60,
            grab_hold_frames: 90,
            grab_hold_offset: 6.0,

            // Defensive options
            airdodge_frames: 15,
            airdodge_speed: 3.1,
            airdodge_decay: 0.9,
            airdodge_intangible: FrameWindow::Always,
            spotdodge_frames: 22,
            spotdodge_intangible: FrameWindow::range(2, 15),
            roll_frames: 30,
            roll_speed: 1.5,
            roll_intangible: FrameWindow::range(4, 19),
            knockdown_frames: 30,
            respawn_intangible_frames: 120,

            // Movement
            turn_frames: 8,
            moonwalk: MoonwalkPersistence::Fixed(15),
            run_end_frames: 6,
            crouch_threshold: 0.4,
            crouch_transition_frames: 6,
            land_crouch_frames: 6,

            // Smash charge
            smash_charge_max_frames: 60,
            smash_charge_bonus: 0.5,
        }
    }
}

impl CombatConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the moonwalk persistence.
    #[must_use]
    pub fn with_moonwalk(mut self, moonwalk: MoonwalkPersistence) -> Self {
        self.moonwalk = moonwalk;
        self
    }

    /// Checks that every value is usable by the simulation.
    pub fn validate(&self) -> Result<(), DataError> {
        let positive = [
            ("hitstun_multiplier", self.hitstun_multiplier),
            ("launch_velocity_scale", self.launch_velocity_scale),
            ("spike_half_cone", self.spike_half_cone),
            ("shield_max", self.shield_max),
            ("stage_spike_speed", self.stage_spike_speed),
            ("grab_hold_offset", self.grab_hold_offset),
            ("crouch_threshold", self.crouch_threshold),
        ];
        for (field, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(DataError::NonPositive {
                    owner: "combat config".to_string(),
                    field,
                    value,
                });
            }
        }

        let durations = [
            ("shield_break_frames", self.shield_break_frames),
            ("airdodge_frames", self.airdodge_frames),
            ("spotdodge_frames", self.spotdodge_frames),
            ("roll_frames", self.roll_frames),
            ("knockdown_frames", self.knockdown_frames),
            ("turn_frames", self.turn_frames),
            ("grab_hold_frames", self.grab_hold_frames),
            ("run_end_frames", self.run_end_frames),
            ("crouch_transition_frames", self.crouch_transition_frames),
            ("land_crouch_frames", self.land_crouch_frames),
        ];
        for (field, value) in durations {
            if value == 0 {
                return Err(DataError::ZeroDuration {
                    owner: "combat config".to_string(),
                    field,
                });
            }
        }

        if self.moonwalk == MoonwalkPersistence::Fixed(0) {
            return Err(DataError::ZeroDuration {
                owner: "combat config".to_string(),
                field: "moonwalk",
            });
        }

        Ok(())
    }

    /// Multiplier applied to damage and knockback after `charge` frames of smash charge.
    #[must_use]
    pub fn charge_multiplier(&self, charge: Frame) -> f32 {
        if self.smash_charge_max_frames == 0 {
            return 1.0;
        }
        let charge = charge.min(self.smash_charge_max_frames) as f32;
        1.0 + self.smash_charge_bonus * charge / self.smash_charge_max_frames as f32
    }
}
