//! Per-frame fighter input.
//!
//! Raw device handling is external: the input mapper hands the core a stick
//! vector, the held buttons and an already classified directional action.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Sticks shorter than this count as neutral.
pub const STICK_DEADZONE: f32 = 0.3;

/// A fighter button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    /// Normal attacks
    Attack,
    /// Special attacks
    Special,
    /// Jump
    Jump,
    /// Shield, airdodge and tech
    Shield,
    /// Grab
    Grab,
}

impl Button {
    /// All buttons in bit order.
    pub const ALL: [Self; 5] = [
        Self::Attack,
        Self::Special,
        Self::Jump,
        Self::Shield,
        Self::Grab,
    ];

    const fn bit(self) -> u8 {
        match self {
            Self::Attack => 1,
            Self::Special => 1 << 1,
            Self::Jump => 1 << 2,
            Self::Shield => 1 << 3,
            Self::Grab => 1 << 4,
        }
    }
}

/// Set of held buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ButtonSet(u8);

impl ButtonSet {
    /// No buttons held.
    pub const EMPTY: Self = Self(0);

    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Returns the set with `button` added.
    #[must_use]
    pub const fn with(self, button: Button) -> Self {
        Self(self.0 | button.bit())
    }

    /// Adds a button.
    pub fn insert(&mut self, button: Button) {
        self.0 |= button.bit();
    }

    /// Removes a button.
    pub fn remove(&mut self, button: Button) {
        self.0 &= !button.bit();
    }

    /// Checks whether a button is held.
    #[must_use]
    pub const fn contains(self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    /// Checks whether no button is held.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Buttons held now that were not held in `previous`.
    #[must_use]
    pub const fn pressed_since(self, previous: Self) -> Self {
        Self(self.0 & !previous.0)
    }

    /// Buttons held in `previous` that are no longer held.
    #[must_use]
    pub const fn released_since(self, previous: Self) -> Self {
        Self(previous.0 & !self.0)
    }

    /// Iterates over held buttons.
    pub fn iter(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

impl FromIterator<Button> for ButtonSet {
    fn from_iter<I: IntoIterator<Item = Button>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

/// Horizontal facing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    /// Facing negative x
    Left,
    /// Facing positive x
    #[default]
    Right,
}

impl Facing {
    /// `1.0` for right, `-1.0` for left.
    #[must_use]
    pub const fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }

    /// The opposite direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Direction of a horizontal component, `None` for zero.
    #[must_use]
    pub fn from_x(x: f32) -> Option<Self> {
        if x > 0.0 {
            Some(Self::Right)
        } else if x < 0.0 {
            Some(Self::Left)
        } else {
            None
        }
    }
}

/// One of the four stick directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinal {
    /// Positive y
    Up,
    /// Negative y
    Down,
    /// Negative x
    Left,
    /// Positive x
    Right,
}

impl Cardinal {
    /// Dominant direction of a stick vector, `None` inside the deadzone.
    ///
    /// Exact diagonals resolve to the horizontal direction.
    #[must_use]
    pub fn from_vector(v: Vec2) -> Option<Self> {
        if v.length() < STICK_DEADZONE {
            return None;
        }
        if v.x.abs() >= v.y.abs() {
            Some(if v.x > 0.0 { Self::Right } else { Self::Left })
        } else {
            Some(if v.y > 0.0 { Self::Up } else { Self::Down })
        }
    }

    /// Horizontal direction, if this is one.
    #[must_use]
    pub const fn facing(self) -> Option<Facing> {
        match self {
            Self::Left => Some(Facing::Left),
            Self::Right => Some(Facing::Right),
            Self::Up | Self::Down => None,
        }
    }

    /// Checks whether this is left or right.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

/// Rotation sense of a stick gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    /// Clockwise
    Clockwise,
    /// Counter-clockwise
    CounterClockwise,
}

/// Stick motion classified by the input mapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DirectionalAction {
    /// Slow or partial stick displacement
    Tilt(Vec2),
    /// Fast flick to the rim
    Smash(Vec2),
    /// Half-circle sweep of the stick
    HalfCircle(Rotation),
}

impl DirectionalAction {
    /// Cardinal direction of a tilt or smash.
    #[must_use]
    pub fn cardinal(&self) -> Option<Cardinal> {
        match self {
            Self::Tilt(v) | Self::Smash(v) => Cardinal::from_vector(*v),
            Self::HalfCircle(_) => None,
        }
    }

    /// Cardinal direction if this is a smash.
    #[must_use]
    pub fn smash(&self) -> Option<Cardinal> {
        match self {
            Self::Smash(v) => Cardinal::from_vector(*v),
            _ => None,
        }
    }

    /// Cardinal direction if this is a tilt.
    #[must_use]
    pub fn tilt(&self) -> Option<Cardinal> {
        match self {
            Self::Tilt(v) => Cardinal::from_vector(*v),
            _ => None,
        }
    }
}

/// Input for one fighter for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputRecord {
    /// Stick position, unit length or zero
    pub stick: Vec2,
    /// Buttons held this frame
    pub buttons: ButtonSet,
    /// Classified stick motion this frame
    pub directional: Option<DirectionalAction>,
}

impl InputRecord {
    /// No input.
    #[must_use]
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Sets the stick.
    #[must_use]
    pub fn with_stick(mut self, stick: Vec2) -> Self {
        self.stick = stick;
        self
    }

    /// Adds a held button.
    #[must_use]
    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons.insert(button);
        self
    }

    /// Sets the classified directional action.
    #[must_use]
    pub fn with_directional(mut self, action: DirectionalAction) -> Self {
        self.directional = Some(action);
        self
    }

    /// A smash flick in `direction`, stick held there.
    #[must_use]
    pub fn smash(direction: Vec2) -> Self {
        Self::neutral()
            .with_stick(direction)
            .with_directional(DirectionalAction::Smash(direction))
    }

    /// A tilt toward `direction`, stick held there.
    #[must_use]
    pub fn tilt(direction: Vec2) -> Self {
        Self::neutral()
            .with_stick(direction)
            .with_directional(DirectionalAction::Tilt(direction))
    }

    /// A single held button with a neutral stick.
    #[must_use]
    pub fn button(button: Button) -> Self {
        Self::neutral().with_button(button)
    }

    /// Checks whether a button is held.
    #[must_use]
    pub const fn held(&self, button: Button) -> bool {
        self.buttons.contains(button)
    }

    /// Dominant stick direction outside the deadzone.
    #[must_use]
    pub fn stick_cardinal(&self) -> Option<Cardinal> {
        Cardinal::from_vector(self.stick)
    }

    /// Unit stick direction, zero when neutral.
    #[must_use]
    pub fn stick_direction(&self) -> Vec2 {
        if self.stick.length() < STICK_DEADZONE {
            Vec2::ZERO
        } else {
            self.stick.normalize_or_zero()
        }
    }
}
