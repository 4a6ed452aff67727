//! Scene object registries: spawn points and interactables
//!
//! Scene objects register themselves when they enter the world and
//! unregister when they leave. The registries are owned by the session
//! context of each process rather than being process-wide globals, so
//! several independent sessions can coexist (e.g. in tests).

use crate::types::{PlayerId, Team, Transform, Vec3};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

pub type SpawnHandle = u32;
pub type InteractableHandle = u32;

/// Static per-team spawn transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub team: Team,
    pub transform: Transform,
}

/// Registered spawn points grouped by team.
///
/// The per-team lookup is rebuilt lazily from the registered set after any
/// registration change.
#[derive(Debug, Default)]
pub struct SpawnRegistry {
    next_handle: SpawnHandle,
    points: BTreeMap<SpawnHandle, SpawnPoint>,
    by_team: Option<HashMap<Team, Vec<Transform>>>,
    fallback: Transform,
}

impl SpawnRegistry {
    /// Creates an empty registry that falls back to `fallback` when a team
    /// has no spawn points
    pub fn new(fallback: Transform) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    pub fn register(&mut self, point: SpawnPoint) -> SpawnHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.points.insert(handle, point);
        self.by_team = None;
        handle
    }

    pub fn unregister(&mut self, handle: SpawnHandle) -> bool {
        let removed = self.points.remove(&handle).is_some();
        if removed {
            self.by_team = None;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Generic scene start position
    pub fn fallback(&self) -> Transform {
        self.fallback
    }

    pub fn set_fallback(&mut self, fallback: Transform) {
        self.fallback = fallback;
    }

    /// Spawn transforms registered for a team
    pub fn team_points(&mut self, team: Team) -> &[Transform] {
        let points = &self.points;
        let lookup = self.by_team.get_or_insert_with(|| {
            let mut grouped: HashMap<Team, Vec<Transform>> = HashMap::new();
            for point in points.values() {
                grouped.entry(point.team).or_default().push(point.transform);
            }
            grouped
        });
        lookup.get(&team).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Picks a spawn transform for `team` uniformly at random, or the scene
    /// start position when the team has none
    pub fn choose<R: Rng + ?Sized>(&mut self, team: Team, rng: &mut R) -> Transform {
        let fallback = self.fallback;
        let candidates = self.team_points(team);
        if candidates.is_empty() {
            return fallback;
        }
        candidates[rng.gen_range(0..candidates.len())]
    }
}

/// Contract for an object a player can activate by proximity
pub trait Interactable: Send {
    /// Prompt shown while a player is in range
    fn message(&self) -> &str;
    fn position(&self) -> Vec3;
    /// Activation radius around `position`
    fn radius(&self) -> f32;
    fn interact(&mut self, by: PlayerId);
}

/// Discoverable set of interactables in the scene
#[derive(Default)]
pub struct InteractableSet {
    next_handle: InteractableHandle,
    items: BTreeMap<InteractableHandle, Box<dyn Interactable>>,
}

impl InteractableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, item: Box<dyn Interactable>) -> InteractableHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.items.insert(handle, item);
        handle
    }

    pub fn unregister(&mut self, handle: InteractableHandle) -> bool {
        self.items.remove(&handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Closest interactable whose activation radius contains `position`
    pub fn nearest_in_range(&self, position: Vec3) -> Option<InteractableHandle> {
        self.items
            .iter()
            .map(|(handle, item)| (*handle, item.position().distance(&position), item.radius()))
            .filter(|(_, distance, radius)| distance <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(handle, _, _)| handle)
    }

    /// Prompt of the interactable in range, if any
    pub fn prompt(&self, position: Vec3) -> Option<&str> {
        let handle = self.nearest_in_range(position)?;
        self.items.get(&handle).map(|item| item.message())
    }

    /// Activates the interactable in range. Returns false when nothing is
    /// close enough.
    pub fn interact(&mut self, position: Vec3, by: PlayerId) -> bool {
        let Some(handle) = self.nearest_in_range(position) else {
            return false;
        };
        match self.items.get_mut(&handle) {
            Some(item) => {
                item.interact(by);
                true
            }
            None => false,
        }
    }
}

/// Scene-object registries owned by one session
pub struct SceneRegistry {
    pub spawns: SpawnRegistry,
    pub interactables: InteractableSet,
}

impl SceneRegistry {
    pub fn new(start: Transform) -> Self {
        Self {
            spawns: SpawnRegistry::new(start),
            interactables: InteractableSet::new(),
        }
    }
}

impl Default for SceneRegistry {
    fn default() -> Self {
        Self::new(Transform::default())
    }
}
