//! Fighter states and their timing properties.

use clash_common::{FighterId, Frame, FrameWindow};
use serde::{Deserialize, Serialize};

use crate::character::CharacterConstants;
use crate::config::{CombatConfig, MoonwalkPersistence};
use crate::input::Facing;
use crate::moves::MoveKind;

/// What a fighter is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum State {
    /// Standing
    #[default]
    Idle,
    /// Airborne with nothing to do
    IdleAirborne,
    /// Walking
    Walk,
    /// Initial dash
    Dash,
    /// Running after a dash
    Run,
    /// Braking out of a run; a dash cannot start until it ends
    RunEnd,
    /// Turning around
    Turn {
        /// Entered from a run, ends in a reversed run
        from_run: bool,
    },
    /// Sliding backwards out of a dash
    Moonwalk,
    /// Lowering into a crouch
    EnterCrouch,
    /// Crouching while the stick is held down
    Crouch,
    /// Standing up from a crouch
    ExitCrouch,
    /// Brief crouch after touching down from a free fall or air dodge
    LandCrouch,
    /// Crouch before leaving the ground
    JumpSquat,
    /// Airborne after a jump
    Airborne,
    /// Recovery after landing during an aerial
    LandingLag {
        /// Lag duration
        frames: Frame,
    },
    /// Hit on the ground without being launched
    GroundedHitstun,
    /// Launched
    AirborneHitstun,
    /// Actionable tumble after a strong launch
    Tumble,
    /// Lying on the ground after a missed tech
    Knockdown,
    /// Holding shield
    Shield,
    /// Stunned after the shield ran out
    ShieldBroken,
    /// Dodging in place
    Spotdodge,
    /// Rolling
    Roll {
        /// Direction of travel
        direction: Facing,
    },
    /// Air dodge
    Airdodge,
    /// Performing a move
    Attack(MoveKind),
    /// Holding another fighter
    Grabbing {
        /// Fighter being held
        victim: FighterId,
    },
    /// Held by another fighter
    Grabbed {
        /// Fighter holding this one
        grabber: FighterId,
    },
}

impl State {
    /// Display name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::IdleAirborne => "IdleAirborne",
            Self::Walk => "Walk",
            Self::Dash => "Dash",
            Self::Run => "Run",
            Self::RunEnd => "RunEnd",
            Self::Turn { .. } => "Turn",
            Self::Moonwalk => "Moonwalk",
            Self::EnterCrouch => "EnterCrouch",
            Self::Crouch => "Crouch",
            Self::ExitCrouch => "ExitCrouch",
            Self::LandCrouch => "LandCrouch",
            Self::JumpSquat => "JumpSquat",
            Self::Airborne => "Airborne",
            Self::LandingLag { .. } => "LandingLag",
            Self::GroundedHitstun => "GroundedHitstun",
            Self::AirborneHitstun => "AirborneHitstun",
            Self::Tumble => "Tumble",
            Self::Knockdown => "Knockdown",
            Self::Shield => "Shield",
            Self::ShieldBroken => "ShieldBroken",
            Self::Spotdodge => "Spotdodge",
            Self::Roll { .. } => "Roll",
            Self::Airdodge => "Airdodge",
            Self::Attack(kind) => kind.name(),
            Self::Grabbing { .. } => "Grabbing",
            Self::Grabbed { .. } => "Grabbed",
        }
    }

    /// Hitstun of either kind.
    #[must_use]
    pub const fn is_hitstun(&self) -> bool {
        matches!(self, Self::GroundedHitstun | Self::AirborneHitstun)
    }

    /// States in which a stage contact is resolved with tech, spike or knockdown rules.
    #[must_use]
    pub const fn is_launched(&self) -> bool {
        matches!(self, Self::GroundedHitstun | Self::AirborneHitstun | Self::Tumble)
    }

    /// States that only make sense standing on a surface.
    #[must_use]
    pub const fn requires_ground(&self) -> bool {
        matches!(
            self,
            Self::Idle
                | Self::Walk
                | Self::Dash
                | Self::Run
                | Self::RunEnd
                | Self::Turn { .. }
                | Self::Moonwalk
                | Self::EnterCrouch
                | Self::Crouch
                | Self::ExitCrouch
                | Self::LandCrouch
                | Self::JumpSquat
                | Self::LandingLag { .. }
                | Self::Knockdown
                | Self::Shield
                | Self::ShieldBroken
                | Self::Spotdodge
                | Self::Roll { .. }
        )
    }

    /// Timing of this state for a character.
    #[must_use]
    pub fn props(&self, constants: &CharacterConstants, config: &CombatConfig) -> StateProps {
        match self {
            Self::Idle
            | Self::IdleAirborne
            | Self::Walk
            | Self::Run
            | Self::Crouch
            | Self::Airborne
            | Self::Tumble
            | Self::Shield
            | Self::Grabbing { .. } => StateProps::open(),
            Self::Dash => StateProps::open().with_duration(constants.dash_frames),
            Self::RunEnd => StateProps::open().with_duration(config.run_end_frames),
            Self::EnterCrouch | Self::ExitCrouch => {
                StateProps::locked(Some(config.crouch_transition_frames))
            },
            Self::LandCrouch => StateProps::locked(Some(config.land_crouch_frames)),
            Self::Turn { .. } => StateProps::open().with_duration(config.turn_frames),
            Self::Moonwalk => match config.moonwalk {
                MoonwalkPersistence::Fixed(frames) => StateProps::open().with_duration(frames),
                MoonwalkPersistence::UntilRelease => StateProps::open(),
            },
            Self::JumpSquat => StateProps::locked(Some(constants.jumpsquat_frames)),
            Self::LandingLag { frames } => StateProps::locked(Some(*frames)),
            Self::GroundedHitstun | Self::AirborneHitstun | Self::Grabbed { .. } => {
                StateProps::locked(None)
            },
            Self::Knockdown => StateProps::locked(Some(config.knockdown_frames)),
            Self::ShieldBroken => StateProps::locked(Some(config.shield_break_frames)),
            Self::Spotdodge => StateProps::locked(Some(config.spotdodge_frames))
                .with_intangible(config.spotdodge_intangible),
            Self::Roll { .. } => StateProps::locked(Some(config.roll_frames))
                .with_intangible(config.roll_intangible),
            Self::Airdodge => StateProps::locked(Some(config.airdodge_frames))
                .with_intangible(config.airdodge_intangible),
            Self::Attack(kind) => match constants.moves.get(*kind) {
                Some(def) => StateProps {
                    duration: Some(def.total_frames),
                    iasa: def.iasa,
                    intangible: def.intangible,
                    super_armor: def.super_armor,
                    armor_threshold: def.armor_threshold,
                },
                None => StateProps::locked(Some(1)),
            },
        }
    }
}

/// Timing properties of a state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateProps {
    /// Natural duration, `None` when the state persists until something ends it
    pub duration: Option<Frame>,
    /// First elapsed frame that accepts action requests; `None` never does
    pub iasa: Option<Frame>,
    /// Intangible frames
    pub intangible: Option<FrameWindow>,
    /// Super-armor frames
    pub super_armor: Option<FrameWindow>,
    /// Launch speed below which super armor absorbs a hit
    pub armor_threshold: f32,
}

impl StateProps {
    /// Actionable immediately, no natural end.
    #[must_use]
    pub const fn open() -> Self {
        Self {
            duration: None,
            iasa: Some(0),
            intangible: None,
            super_armor: None,
            armor_threshold: 0.0,
        }
    }

    /// Never actionable until it ends.
    #[must_use]
    pub const fn locked(duration: Option<Frame>) -> Self {
        Self {
            duration,
            iasa: None,
            intangible: None,
            super_armor: None,
            armor_threshold: 0.0,
        }
    }

    /// Sets the natural duration.
    #[must_use]
    pub const fn with_duration(mut self, frames: Frame) -> Self {
        self.duration = Some(frames);
        self
    }

    /// Sets intangible frames.
    #[must_use]
    pub const fn with_intangible(mut self, window: FrameWindow) -> Self {
        self.intangible = Some(window);
        self
    }

    /// Whether action requests are accepted `elapsed` frames in.
    #[must_use]
    pub fn is_actionable(&self, elapsed: Frame) -> bool {
        self.iasa.is_some_and(|iasa| elapsed >= iasa)
    }

    /// Whether the state is intangible `elapsed` frames in.
    #[must_use]
    pub fn is_intangible(&self, elapsed: Frame) -> bool {
        clash_common::window_active(self.intangible, elapsed)
    }

    /// Whether super armor is up `elapsed` frames in.
    #[must_use]
    pub fn has_armor(&self, elapsed: Frame) -> bool {
        clash_common::window_active(self.super_armor, elapsed)
    }

    /// Whether the natural duration has run out.
    #[must_use]
    pub fn is_finished(&self, elapsed: Frame) -> bool {
        self.duration.is_some_and(|d| elapsed >= d)
    }

    /// Frames left before the natural end.
    #[must_use]
    pub fn remaining(&self, elapsed: Frame) -> Option<Frame> {
        self.duration.map(|d| d.saturating_sub(elapsed))
    }
}
