//! Client replica of the server's entity table.
//!
//! The server sends full [`WorldSnapshot`]s rather than deltas, so the store
//! is replaced wholesale on every snapshot. Differences against the previous
//! table are reported as [`ReplicationEvent`]s so the presentation layer can
//! create, move and tear down visuals without diffing itself.

use std::collections::BTreeMap;

use glam::Vec3;
use openmmo_events::EventQueue;
use openmmo_net::{EntityKind, EntityRecord, EntityStateData, INVALID_ID, WorldSnapshot};

// ---------------------------------------------------------------------------
// ReplicatedEntity
// ---------------------------------------------------------------------------

/// One entity as last described by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicatedEntity {
    /// Server-assigned identifier.
    pub id: u64,
    /// Broad category.
    pub kind: EntityKind,
    /// World position.
    pub position: Vec3,
    /// Euler rotation; `y` is the yaw.
    pub rotation: Vec3,
    /// Display and animation state.
    pub state: EntityStateData,
    /// Optional gender tag for player models.
    pub gender: Option<String>,
}

impl From<&EntityRecord> for ReplicatedEntity {
    fn from(record: &EntityRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            position: record.position.into(),
            rotation: record.rotation.into(),
            state: record.state.clone(),
            gender: record.gender.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReplicationEvent
// ---------------------------------------------------------------------------

/// A change to the entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationEvent {
    /// A new entity appeared.
    Spawned(u64),
    /// A known entity changed.
    Updated(u64),
    /// An entity left the snapshot.
    Despawned(u64),
    /// The locally controlled entity changed.
    LocalPlayerChanged {
        /// Previously controlled entity.
        previous: Option<u64>,
        /// Newly controlled entity.
        current: Option<u64>,
    },
}

// ---------------------------------------------------------------------------
// EntityReplicationStore
// ---------------------------------------------------------------------------

/// Snapshot-driven entity table.
#[derive(Debug, Clone, Default)]
pub struct EntityReplicationStore {
    entities: BTreeMap<u64, ReplicatedEntity>,
    local_player: Option<u64>,
    zone_id: u32,
    zone_name: String,
    events: EventQueue<ReplicationEvent>,
}

impl EntityReplicationStore {
    /// Creates an empty store whose event queue holds `event_capacity`
    /// undrained events.
    pub fn new(event_capacity: usize) -> Self {
        Self {
            events: EventQueue::new(event_capacity),
            ..Self::default()
        }
    }

    /// Replaces the table with the contents of `snapshot`.
    ///
    /// Records with an invalid id are skipped. Applying the same snapshot
    /// twice leaves the store unchanged and raises no events the second time.
    ///
    /// The event queue grows to hold every change of the snapshot on top of
    /// whatever is still undrained, so spawns and despawns are never evicted.
    /// A host that never drains therefore grows the queue without bound.
    pub fn apply_snapshot(&mut self, snapshot: &WorldSnapshot) {
        self.events
            .reserve(self.entities.len() + snapshot.entities.len() + 1);
        let mut incoming = BTreeMap::new();
        for record in &snapshot.entities {
            if record.id == INVALID_ID {
                tracing::warn!(
                    display_name = %record.state.display_name,
                    "Skipping entity without a valid id"
                );
                continue;
            }
            incoming.insert(record.id, ReplicatedEntity::from(record));
        }

        let departed: Vec<u64> = self
            .entities
            .keys()
            .filter(|id| !incoming.contains_key(id))
            .copied()
            .collect();
        for id in departed {
            self.remove(id);
        }
        for (id, entity) in incoming {
            self.upsert(id, entity);
        }

        let local = Some(snapshot.player_entity_id).filter(|id| *id != INVALID_ID);
        if local != self.local_player {
            tracing::info!(previous = ?self.local_player, current = ?local, "Local player entity changed");
            self.events.push(ReplicationEvent::LocalPlayerChanged {
                previous: self.local_player,
                current: local,
            });
            self.local_player = local;
        }
        if self.zone_id != snapshot.zone_id || self.zone_name != snapshot.zone_name {
            tracing::info!("Entered zone {} ({})", snapshot.zone_name, snapshot.zone_id);
            self.zone_id = snapshot.zone_id;
            self.zone_name.clone_from(&snapshot.zone_name);
        }
    }

    fn upsert(&mut self, id: u64, entity: ReplicatedEntity) {
        match self.entities.insert(id, entity) {
            None => self.events.push(ReplicationEvent::Spawned(id)),
            Some(previous) if self.entities.get(&id) != Some(&previous) => {
                self.events.push(ReplicationEvent::Updated(id));
            }
            Some(_) => {}
        }
    }

    fn remove(&mut self, id: u64) {
        if self.entities.remove(&id).is_some() {
            self.events.push(ReplicationEvent::Despawned(id));
        }
    }

    /// Entity by id.
    pub fn get(&self, id: u64) -> Option<&ReplicatedEntity> {
        self.entities.get(&id)
    }

    /// The locally controlled entity, if the last snapshot contained it.
    pub fn get_local_player(&self) -> Option<&ReplicatedEntity> {
        self.local_player.and_then(|id| self.entities.get(&id))
    }

    /// Id of the locally controlled entity.
    pub fn local_player_id(&self) -> Option<u64> {
        self.local_player
    }

    /// Entities within `radius` of `center`, in id order.
    ///
    /// This is a linear scan. Snapshots carry tens of entities, not
    /// thousands; a spatial index would be needed beyond that.
    pub fn query_within(&self, center: Vec3, radius: f32) -> Vec<&ReplicatedEntity> {
        let radius_sq = radius * radius;
        self.entities
            .values()
            .filter(|e| e.position.distance_squared(center) <= radius_sq)
            .collect()
    }

    /// All entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ReplicatedEntity> {
        self.entities.values()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Current zone id and name.
    pub fn zone(&self) -> (u32, &str) {
        (self.zone_id, &self.zone_name)
    }

    /// Empties the table, reporting every entity as despawned.
    pub fn clear(&mut self) {
        self.events.reserve(self.entities.len() + 1);
        let ids: Vec<u64> = self.entities.keys().copied().collect();
        for id in ids {
            self.remove(id);
        }
        if self.local_player.is_some() {
            self.events.push(ReplicationEvent::LocalPlayerChanged {
                previous: self.local_player.take(),
                current: None,
            });
        }
        self.zone_id = 0;
        self.zone_name.clear();
    }

    /// Drains changes raised since the last call.
    pub fn drain_events(&mut self) -> impl Iterator<Item = ReplicationEvent> + '_ {
        self.events.drain()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
