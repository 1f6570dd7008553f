//! Hitboxes, hitbox groups and the group collision pass.
//!
//! Groups are owned by a [`GroupRegistry`]. Each group remembers the ids of
//! groups it has already struck; the memory is cleared when either side is
//! refreshed or removed, so a pair of groups resolves at most once per life.
//! A transient group is removed by [`GroupRegistry::remove_spent`] once it
//! has made any contact.

use std::collections::BTreeMap;

use ahash::AHashSet;
use clash_common::{FighterId, GroupId, NearestPass, Shape};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

/// Errors from registry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HitboxError {
    /// A group with this id is still registered
    #[error("hitbox group {0:?} already registered")]
    DuplicateGroup(GroupId),
    /// No group with this id
    #[error("hitbox group {0:?} not registered")]
    UnknownGroup(GroupId),
}

/// Result type for registry operations.
pub type HitboxResult<T> = Result<T, HitboxError>;

// ============================================================================
// Attack data
// ============================================================================

/// How the launch angle of an attack is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AngleSpec {
    /// Fixed angle in degrees, authored for a right-facing attacker
    Fixed(f32),
    /// Directly away from the attacking hitbox
    Away,
    /// Away, but never below the given elevation in degrees
    UpAndAway(f32),
}

fn default_charge() -> f32 {
    1.0
}

/// Damage and knockback carried by an attack hitbox.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackData {
    /// Percent dealt
    pub damage: f32,
    /// Base knockback
    pub base_knockback: f32,
    /// Knockback added per 100 percent
    pub scaling_knockback: f32,
    /// Launch angle
    pub angle: AngleSpec,
    /// Collision priority; `None` loses to any value
    #[serde(default)]
    pub priority: Option<u16>,
    /// Smash-charge multiplier on damage and knockback
    #[serde(default = "default_charge")]
    pub charge_multiplier: f32,
}

impl AttackData {
    /// Creates attack data with no priority and no charge.
    #[must_use]
    pub const fn new(damage: f32, base_knockback: f32, scaling_knockback: f32, angle: AngleSpec) -> Self {
        Self {
            damage,
            base_knockback,
            scaling_knockback,
            angle,
            priority: None,
            charge_multiplier: 1.0,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u16) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the charge multiplier.
    #[must_use]
    pub const fn with_charge(mut self, multiplier: f32) -> Self {
        self.charge_multiplier = multiplier;
        self
    }

    /// Damage after the charge multiplier.
    #[must_use]
    pub fn charged_damage(&self) -> f32 {
        self.damage * self.charge_multiplier
    }
}

// ============================================================================
// Hitboxes and groups
// ============================================================================

/// What a hitbox does on contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HitboxPurpose {
    /// Can be hit
    Hurt,
    /// Absorbs attacks
    Shield,
    /// Grabs hurtboxes
    Grab,
    /// Hits hurtboxes and shields
    Attack(AttackData),
}

impl HitboxPurpose {
    /// Short name for snapshots and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hurt => "hurt",
            Self::Shield => "shield",
            Self::Grab => "grab",
            Self::Attack(_) => "attack",
        }
    }
}

/// A shape with a purpose, in fighter-local space facing right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hitbox {
    /// Local shape
    pub shape: Shape,
    /// Behaviour on contact
    pub purpose: HitboxPurpose,
}

impl Hitbox {
    /// Creates a hurtbox.
    #[must_use]
    pub const fn hurt(shape: Shape) -> Self {
        Self {
            shape,
            purpose: HitboxPurpose::Hurt,
        }
    }

    /// Creates a shield box.
    #[must_use]
    pub const fn shield(shape: Shape) -> Self {
        Self {
            shape,
            purpose: HitboxPurpose::Shield,
        }
    }

    /// Creates a grab box.
    #[must_use]
    pub const fn grab(shape: Shape) -> Self {
        Self {
            shape,
            purpose: HitboxPurpose::Grab,
        }
    }

    /// Creates an attack box.
    #[must_use]
    pub const fn attack(shape: Shape, data: AttackData) -> Self {
        Self {
            shape,
            purpose: HitboxPurpose::Attack(data),
        }
    }

    /// Attack data, if this is an attack box.
    #[must_use]
    pub const fn attack_data(&self) -> Option<&AttackData> {
        match &self.purpose {
            HitboxPurpose::Attack(data) => Some(data),
            _ => None,
        }
    }

    /// Collision priority; only attack boxes carry one.
    #[must_use]
    pub fn priority(&self) -> Option<u16> {
        self.attack_data().and_then(|d| d.priority)
    }

    /// Returns the hitbox placed in world space.
    #[must_use]
    pub fn placed(&self, placement: &Placement) -> Self {
        Self {
            shape: self.shape.placed(placement.origin, placement.facing_sign),
            purpose: self.purpose,
        }
    }
}

/// Where a group's owner stands this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Owner position
    pub origin: Vec2,
    /// `1.0` facing right, `-1.0` facing left
    pub facing_sign: f32,
    /// Hurtboxes of an intangible owner are ignored
    pub intangible: bool,
}

/// Hitboxes sharing one struck-set.
#[derive(Debug, Clone)]
pub struct HitboxGroup {
    id: GroupId,
    owner: FighterId,
    hitboxes: Vec<Hitbox>,
    struck: AHashSet<GroupId>,
    /// Own placement, used instead of the owner's
    placement: Option<Placement>,
    transient: bool,
}

impl HitboxGroup {
    /// Creates a group with an empty struck-set.
    #[must_use]
    pub fn new(id: GroupId, owner: FighterId, hitboxes: Vec<Hitbox>) -> Self {
        Self {
            id,
            owner,
            hitboxes,
            struck: AHashSet::new(),
            placement: None,
            transient: false,
        }
    }

    /// Marks the group for removal after its first contact.
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Whether the group goes away after its first contact.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.transient
    }

    /// Placement set with [`GroupRegistry::place`], if any.
    #[must_use]
    pub const fn placement(&self) -> Option<Placement> {
        self.placement
    }

    /// Group id.
    #[must_use]
    pub const fn id(&self) -> GroupId {
        self.id
    }

    /// Owning fighter.
    #[must_use]
    pub const fn owner(&self) -> FighterId {
        self.owner
    }

    /// Local hitboxes.
    #[must_use]
    pub fn hitboxes(&self) -> &[Hitbox] {
        &self.hitboxes
    }

    /// Whether this group already struck `other`.
    #[must_use]
    pub fn has_struck(&self, other: GroupId) -> bool {
        self.struck.contains(&other)
    }

    /// Number of groups remembered as struck.
    #[must_use]
    pub fn struck_count(&self) -> usize {
        self.struck.len()
    }
}

// ============================================================================
// Contacts
// ============================================================================

/// Kind of interaction between two groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactKind {
    /// Attack against a hurtbox
    Hit,
    /// Attack against a shield
    Shield,
    /// Grab against a hurtbox
    Grab,
}

/// A resolved group-pair interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupContact {
    /// Attacking (or grabbing) group
    pub attacker_group: GroupId,
    /// Owner of the attacking group
    pub attacker: FighterId,
    /// Group that was struck
    pub defender_group: GroupId,
    /// Owner of the struck group
    pub defender: FighterId,
    /// Interaction kind
    pub kind: ContactKind,
    /// Winning attack data, `None` for grabs
    pub attack: Option<AttackData>,
    /// World centre of the winning attacker hitbox
    pub attacker_center: Vec2,
    /// Midpoint between the winning shapes
    pub point: Vec2,
    /// Signed distance of the winning pair
    pub distance: f32,
}

struct PlacedGroup {
    id: GroupId,
    owner: FighterId,
    intangible: bool,
    hitboxes: Vec<Hitbox>,
}

struct Candidate {
    kind: ContactKind,
    first_attacks: bool,
    attack: Option<AttackData>,
    attacker_center: Vec2,
    high: Option<u16>,
    low: Option<u16>,
    pass: NearestPass,
}

impl Candidate {
    fn beats(&self, other: &Self) -> bool {
        if self.high != other.high {
            return self.high > other.high;
        }
        if self.low != other.low {
            return self.low > other.low;
        }
        self.pass.distance < other.pass.distance
    }
}

/// Interaction between a hitbox of the first group and one of the second.
fn classify(
    first: &Hitbox,
    second: &Hitbox,
    first_intangible: bool,
    second_intangible: bool,
) -> Option<(ContactKind, bool)> {
    use HitboxPurpose::{Attack, Grab, Hurt, Shield};
    match (first.purpose, second.purpose) {
        (Attack(_), Hurt) if !second_intangible => Some((ContactKind::Hit, true)),
        (Hurt, Attack(_)) if !first_intangible => Some((ContactKind::Hit, false)),
        (Attack(_), Shield) => Some((ContactKind::Shield, true)),
        (Shield, Attack(_)) => Some((ContactKind::Shield, false)),
        (Grab, Hurt) if !second_intangible => Some((ContactKind::Grab, true)),
        (Hurt, Grab) if !first_intangible => Some((ContactKind::Grab, false)),
        _ => None,
    }
}

fn resolve_pair(first: &PlacedGroup, second: &PlacedGroup) -> Option<GroupContact> {
    let mut best: Option<Candidate> = None;
    for h1 in &first.hitboxes {
        for h2 in &second.hitboxes {
            let Some((kind, first_attacks)) =
                classify(h1, h2, first.intangible, second.intangible)
            else {
                continue;
            };
            let pass = Shape::nearest_pass(&h1.shape, &h2.shape);
            if !pass.is_collision() {
                continue;
            }
            let (p1, p2) = (h1.priority(), h2.priority());
            let attacker_box = if first_attacks { h1 } else { h2 };
            let candidate = Candidate {
                kind,
                first_attacks,
                attack: attacker_box.attack_data().copied(),
                attacker_center: attacker_box.shape.center(),
                high: p1.max(p2),
                low: p1.min(p2),
                pass,
            };
            if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                best = Some(candidate);
            }
        }
    }

    best.map(|c| {
        let (attacker, defender) = if c.first_attacks {
            (first, second)
        } else {
            (second, first)
        };
        GroupContact {
            attacker_group: attacker.id,
            attacker: attacker.owner,
            defender_group: defender.id,
            defender: defender.owner,
            kind: c.kind,
            attack: c.attack,
            attacker_center: c.attacker_center,
            point: c.pass.midpoint,
            distance: c.pass.distance,
        }
    })
}

// ============================================================================
// Registry
// ============================================================================

/// Owns every live hitbox group, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: BTreeMap<GroupId, HitboxGroup>,
    next_id: u32,
}

impl GroupRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an id not currently registered.
    pub fn allocate_id(&mut self) -> GroupId {
        loop {
            let id = GroupId::new(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.groups.contains_key(&id) {
                return id;
            }
        }
    }

    /// Registers a group. Its id must not be in use.
    pub fn insert(&mut self, group: HitboxGroup) -> HitboxResult<GroupId> {
        let id = group.id;
        if self.groups.contains_key(&id) {
            return Err(HitboxError::DuplicateGroup(id));
        }
        debug!(
            group = id.raw(),
            owner = %group.owner,
            hitboxes = group.hitboxes.len(),
            "hitbox group created"
        );
        self.groups.insert(id, group);
        Ok(id)
    }

    /// Creates and registers a group under a fresh id.
    pub fn spawn(&mut self, owner: FighterId, hitboxes: Vec<Hitbox>) -> GroupId {
        let id = self.allocate_id();
        debug!(group = id.raw(), owner = %owner, hitboxes = hitboxes.len(), "hitbox group created");
        self.groups.insert(id, HitboxGroup::new(id, owner, hitboxes));
        id
    }

    /// Creates a transient group with its own placement.
    pub fn spawn_transient(&mut self, owner: FighterId, hitboxes: Vec<Hitbox>, placement: Placement) -> GroupId {
        let id = self.allocate_id();
        debug!(group = id.raw(), owner = %owner, hitboxes = hitboxes.len(), "transient group created");
        let mut group = HitboxGroup::new(id, owner, hitboxes).transient();
        group.placement = Some(placement);
        self.groups.insert(id, group);
        id
    }

    /// Moves a group that is placed independently of its owner.
    pub fn place(&mut self, id: GroupId, placement: Placement) -> HitboxResult<()> {
        let group = self
            .groups
            .get_mut(&id)
            .ok_or(HitboxError::UnknownGroup(id))?;
        group.placement = Some(placement);
        Ok(())
    }

    /// Removes every transient group taking part in `contacts`, returning their ids.
    pub fn remove_spent(&mut self, contacts: &[GroupContact]) -> Vec<GroupId> {
        let mut spent: Vec<GroupId> = contacts
            .iter()
            .flat_map(|c| [c.attacker_group, c.defender_group])
            .filter(|id| self.groups.get(id).is_some_and(HitboxGroup::is_transient))
            .collect();
        spent.sort_unstable();
        spent.dedup();
        for id in &spent {
            self.remove(*id);
        }
        spent
    }

    /// Removes a group; every other group forgets it.
    pub fn remove(&mut self, id: GroupId) -> Option<HitboxGroup> {
        let group = self.groups.remove(&id)?;
        self.forget(id);
        debug!(group = id.raw(), owner = %group.owner, "hitbox group removed");
        Some(group)
    }

    /// Removes every group owned by `owner`, returning how many were removed.
    pub fn remove_owned_by(&mut self, owner: FighterId) -> usize {
        let ids: Vec<GroupId> = self
            .groups
            .values()
            .filter(|g| g.owner == owner)
            .map(|g| g.id)
            .collect();
        for id in &ids {
            self.remove(*id);
        }
        ids.len()
    }

    /// Clears a group's struck-set and makes every other group forget it.
    pub fn refresh(&mut self, id: GroupId) -> HitboxResult<()> {
        let group = self
            .groups
            .get_mut(&id)
            .ok_or(HitboxError::UnknownGroup(id))?;
        group.struck.clear();
        self.forget(id);
        trace!(group = id.raw(), "hitbox group refreshed");
        Ok(())
    }

    /// Swaps a group's hitboxes, keeping its struck-set.
    pub fn replace_hitboxes(&mut self, id: GroupId, hitboxes: Vec<Hitbox>) -> HitboxResult<()> {
        let group = self
            .groups
            .get_mut(&id)
            .ok_or(HitboxError::UnknownGroup(id))?;
        group.hitboxes = hitboxes;
        Ok(())
    }

    fn forget(&mut self, id: GroupId) {
        for group in self.groups.values_mut() {
            group.struck.remove(&id);
        }
    }

    /// Whether either group remembers striking the other.
    #[must_use]
    pub fn has_struck(&self, a: GroupId, b: GroupId) -> bool {
        self.groups.get(&a).is_some_and(|g| g.has_struck(b))
            || self.groups.get(&b).is_some_and(|g| g.has_struck(a))
    }

    /// Looks up a group.
    #[must_use]
    pub fn get(&self, id: GroupId) -> Option<&HitboxGroup> {
        self.groups.get(&id)
    }

    /// Whether a group is registered.
    #[must_use]
    pub fn contains(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Groups in id order.
    pub fn iter(&self) -> impl Iterator<Item = &HitboxGroup> {
        self.groups.values()
    }

    /// Number of live groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no groups are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// World-space hitboxes of every group owned by `owner` and placed with it.
    #[must_use]
    pub fn world_hitboxes(&self, owner: FighterId, placement: &Placement) -> Vec<Hitbox> {
        self.groups
            .values()
            .filter(|g| g.owner == owner && g.placement.is_none())
            .flat_map(|g| g.hitboxes.iter().map(|h| h.placed(placement)))
            .collect()
    }

    /// Tests every unstruck pair of groups with different owners.
    ///
    /// Groups are placed by their own placement if set, otherwise by the
    /// owner's. Resolved pairs are marked as struck on both sides. Contacts are
    /// returned ordered by (first group id, second group id). When an attack
    /// group reaches both a shield and a hurtbox of the same fighter, only
    /// the shield contact is reported.
    pub fn detect<F>(&mut self, placement: F) -> Vec<GroupContact>
    where
        F: Fn(FighterId) -> Option<Placement>,
    {
        let placed: Vec<PlacedGroup> = self
            .groups
            .values()
            .filter_map(|g| {
                let p = g.placement.or_else(|| placement(g.owner))?;
                Some(PlacedGroup {
                    id: g.id,
                    owner: g.owner,
                    intangible: p.intangible,
                    hitboxes: g.hitboxes.iter().map(|h| h.placed(&p)).collect(),
                })
            })
            .collect();

        let mut contacts = Vec::new();
        for (i, first) in placed.iter().enumerate() {
            for second in &placed[i + 1..] {
                if first.owner == second.owner || self.has_struck(first.id, second.id) {
                    continue;
                }
                if let Some(contact) = resolve_pair(first, second) {
                    contacts.push(contact);
                }
            }
        }

        for contact in &contacts {
            if let Some(g) = self.groups.get_mut(&contact.attacker_group) {
                g.struck.insert(contact.defender_group);
            }
            if let Some(g) = self.groups.get_mut(&contact.defender_group) {
                g.struck.insert(contact.attacker_group);
            }
            trace!(
                attacker = contact.attacker_group.raw(),
                defender = contact.defender_group.raw(),
                kind = ?contact.kind,
                "group contact"
            );
        }

        let shielded: Vec<(GroupId, FighterId)> = contacts
            .iter()
            .filter(|c| c.kind == ContactKind::Shield)
            .map(|c| (c.attacker_group, c.defender))
            .collect();
        contacts.retain(|c| {
            c.kind != ContactKind::Hit || !shielded.contains(&(c.attacker_group, c.defender))
        });
        contacts
    }
}
