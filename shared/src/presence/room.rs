//! The shared room a session publishes into, and an in-process implementation of it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use super::{ClientId, CollectibleStatus, PresenceError, PresenceMap, PresencePatch, RoomStatePatch};
use crate::streamer::BoostId;

/// Shared presence/room collaborator.
///
/// Publishing is fire-and-forget: implementations validate the payload and queue or apply it,
/// but never wait for an acknowledgement.
pub trait PresenceRoom {
    /// Identity of the local client.
    fn client_id(&self) -> &ClientId;

    /// Merge a partial record into the local client's presence.
    fn update_presence(&mut self, patch: PresencePatch) -> Result<(), PresenceError>;

    /// Merge a partial update into room-wide state.
    fn update_room_state(&mut self, patch: RoomStatePatch);

    /// Display name of a peer, if it has one.
    fn username(&self, client: &ClientId) -> Option<String>;

    /// The full presence mapping, if it changed since the last call.
    ///
    /// This is the presence subscription: instead of registering a change callback, the frame
    /// loop polls once per frame and reconciles synchronously whenever a mapping comes back.
    fn poll_presence_change(&mut self) -> Option<PresenceMap>;
}

/// State shared by every [`MemoryRoom`] joined to it.
#[derive(Debug, Default)]
pub struct MemoryHub {
    presence: PresenceMap,
    usernames: BTreeMap<ClientId, String>,
    collectables: BTreeMap<BoostId, CollectibleStatus>,
    version: u64,
}

impl MemoryHub {
    pub fn shared() -> Arc<Mutex<MemoryHub>> {
        Arc::new(Mutex::new(MemoryHub::default()))
    }

    pub fn presence(&self) -> &PresenceMap {
        &self.presence
    }

    pub fn collectable(&self, id: BoostId) -> Option<&CollectibleStatus> {
        self.collectables.get(&id)
    }
}

/// One client's handle on an in-process [`MemoryHub`].
///
/// Used for offline sessions and for exercising multi-client behavior in tests.
pub struct MemoryRoom {
    hub: Arc<Mutex<MemoryHub>>,
    client_id: ClientId,
    seen_version: u64,
}

impl MemoryRoom {
    pub fn join(
        hub: &Arc<Mutex<MemoryHub>>,
        client_id: ClientId,
        username: Option<String>,
    ) -> Self {
        {
            let mut h = hub.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(name) = username {
                h.usernames.insert(client_id.clone(), name);
            }
        }
        info!("{client_id} joined the room");
        Self {
            hub: Arc::clone(hub),
            client_id,
            seen_version: 0,
        }
    }

    fn hub(&self) -> MutexGuard<'_, MemoryHub> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop this client's presence, as a disconnect would.
    pub fn leave(self) {
        let mut hub = self.hub();
        if hub.presence.remove(&self.client_id).is_some() {
            hub.version += 1;
        }
        hub.usernames.remove(&self.client_id);
        info!("{} left the room", self.client_id);
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        let mut hub = self.hub();
        hub.usernames.insert(self.client_id.clone(), username.into());
        hub.version += 1;
    }

    pub fn collectable(&self, id: BoostId) -> Option<CollectibleStatus> {
        self.hub().collectable(id).cloned()
    }

    pub fn presence_snapshot(&self) -> PresenceMap {
        self.hub().presence.clone()
    }
}

impl PresenceRoom for MemoryRoom {
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    fn update_presence(&mut self, patch: PresencePatch) -> Result<(), PresenceError> {
        let mut hub = self.hub();
        let mut record = hub.presence.get(&self.client_id).cloned().unwrap_or_default();
        record.apply(patch)?;
        hub.presence.insert(self.client_id.clone(), record);
        hub.version += 1;
        Ok(())
    }

    fn update_room_state(&mut self, patch: RoomStatePatch) {
        let mut hub = self.hub();
        for (id, status) in patch.collectables {
            debug!("boost {} collected by {}", id.0, status.collected_by);
            hub.collectables.insert(id, status);
        }
    }

    fn username(&self, client: &ClientId) -> Option<String> {
        self.hub().usernames.get(client).cloned()
    }

    fn poll_presence_change(&mut self) -> Option<PresenceMap> {
        let hub = self.hub();
        if hub.version == self.seen_version {
            return None;
        }
        let snapshot = hub.presence.clone();
        let version = hub.version;
        drop(hub);
        self.seen_version = version;
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::na::Vector3;

    #[test]
    fn peers_see_each_others_presence() {
        let hub = MemoryHub::shared();
        let mut a = MemoryRoom::join(&hub, ClientId::new("a"), Some("Ada".into()));
        let mut b = MemoryRoom::join(&hub, ClientId::new("b"), None);

        a.update_presence(PresencePatch {
            position: Some(Vector3::new(1.0, 1.0, 1.0)),
            ..Default::default()
        })
        .unwrap();

        let seen = b.poll_presence_change().expect("change");
        assert!(seen.contains_key(&ClientId::new("a")));
        assert!(b.poll_presence_change().is_none());

        assert_eq!(b.username(&ClientId::new("a")).as_deref(), Some("Ada"));
        assert_eq!(a.username(&ClientId::new("b")), None);
    }

    #[test]
    fn leaving_removes_presence_and_notifies() {
        let hub = MemoryHub::shared();
        let mut a = MemoryRoom::join(&hub, ClientId::new("a"), None);
        let mut b = MemoryRoom::join(&hub, ClientId::new("b"), None);
        a.update_presence(PresencePatch {
            position: Some(Vector3::zeros()),
            ..Default::default()
        })
        .unwrap();
        b.poll_presence_change();

        a.leave();
        let seen = b.poll_presence_change().expect("change");
        assert!(seen.is_empty());
    }

    #[test]
    fn rejected_patch_does_not_notify() {
        let hub = MemoryHub::shared();
        let mut a = MemoryRoom::join(&hub, ClientId::new("a"), None);
        assert!(
            a.update_presence(PresencePatch {
                acceleration_modifier: Some(-1.0),
                ..Default::default()
            })
            .is_err()
        );
        assert!(a.poll_presence_change().is_none());
        assert!(a.presence_snapshot().is_empty());
    }

    #[test]
    fn rejected_first_patch_leaves_no_record_for_peers() {
        let hub = MemoryHub::shared();
        let mut a = MemoryRoom::join(&hub, ClientId::new("a"), None);
        let mut b = MemoryRoom::join(&hub, ClientId::new("b"), None);
        assert!(
            a.update_presence(PresencePatch {
                acceleration_modifier: Some(-1.0),
                ..Default::default()
            })
            .is_err()
        );

        b.update_presence(PresencePatch {
            position: Some(Vector3::zeros()),
            ..Default::default()
        })
        .unwrap();
        let seen = a.poll_presence_change().expect("change");
        assert!(!seen.contains_key(&ClientId::new("a")));
        assert!(seen.contains_key(&ClientId::new("b")));
    }

    #[test]
    fn rejected_patch_keeps_the_previous_record() {
        let hub = MemoryHub::shared();
        let mut a = MemoryRoom::join(&hub, ClientId::new("a"), None);
        a.update_presence(PresencePatch {
            position: Some(Vector3::new(1.0, 2.0, 3.0)),
            acceleration_modifier: Some(2.0),
            ..Default::default()
        })
        .unwrap();

        assert!(
            a.update_presence(PresencePatch {
                position: Some(Vector3::new(9.0, 9.0, 9.0)),
                acceleration_modifier: Some(-1.0),
                ..Default::default()
            })
            .is_err()
        );
        let rec = a.presence_snapshot().remove(&ClientId::new("a")).expect("record");
        assert_eq!(rec.position, Some(Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(rec.acceleration_modifier, Some(2.0));
    }

    #[test]
    fn collectables_are_last_writer_wins() {
        let hub = MemoryHub::shared();
        let mut a = MemoryRoom::join(&hub, ClientId::new("a"), None);
        let mut b = MemoryRoom::join(&hub, ClientId::new("b"), None);
        let boost = BoostId(99);

        for room in [&mut a, &mut b] {
            let me = room.client_id().clone();
            room.update_room_state(RoomStatePatch {
                collectables: BTreeMap::from([(
                    boost,
                    CollectibleStatus {
                        collected: true,
                        collected_by: me,
                    },
                )]),
            });
        }

        let status = a.collectable(boost).expect("status");
        assert!(status.collected);
        assert_eq!(status.collected_by, ClientId::new("b"));
    }
}
