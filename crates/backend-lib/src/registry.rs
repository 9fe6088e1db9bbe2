// ============================
// crates/backend-lib/src/registry.rs
// ============================
//! Session registry: active meetings and connection memberships.
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use huddle_common::{ConnectionId, MeetingId};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use rand::Rng;

use crate::error::GatewayError;
use crate::meeting::Meeting;
use crate::metrics::{MEETING_ACTIVE, MEETING_CREATED, MEETING_ENDED};

/// A meeting shared between handlers. Lock, mutate, snapshot, unlock;
/// never hold the guard across an `.await`.
pub type SharedMeeting = Arc<Mutex<Meeting>>;

const MEETING_ID_LENGTH: usize = 8;
const MEETING_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// How long an unclaimed reservation is kept by default
pub const DEFAULT_RESERVATION_TTL_SECS: u64 = 60 * 60;

/// What `GET /api/meeting/{id}` can tell about an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingLookup {
    Active {
        is_locked: bool,
        participant_count: usize,
        host_name: Option<String>,
    },
    Reserved {
        reserved_at: DateTime<Utc>,
    },
    Ended {
        ended_at: DateTime<Utc>,
    },
    Unknown,
}

/// Registry of all active meetings, injected into the gateway and HTTP handlers
pub struct SessionRegistry {
    meetings: DashMap<MeetingId, SharedMeeting>,
    memberships: DashMap<ConnectionId, MeetingId>,
    reserved: DashMap<MeetingId, DateTime<Utc>>,
    /// IDs of finished meetings; never handed out again
    ended: DashMap<MeetingId, DateTime<Utc>>,
    reservation_ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_reservation_ttl(std::time::Duration::from_secs(DEFAULT_RESERVATION_TTL_SECS))
    }
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry whose unclaimed reservations lapse after `ttl`
    pub fn with_reservation_ttl(ttl: std::time::Duration) -> Self {
        Self {
            meetings: DashMap::new(),
            memberships: DashMap::new(),
            reserved: DashMap::new(),
            ended: DashMap::new(),
            reservation_ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }

    /// Reserve a fresh meeting ID for a host that has not joined yet
    pub fn reserve(&self) -> MeetingId {
        self.prune_reservations(Utc::now());
        loop {
            let id = generate_meeting_id();
            if self.meetings.contains_key(&id) || self.ended.contains_key(&id) {
                continue;
            }
            if let Entry::Vacant(slot) = self.reserved.entry(id.clone()) {
                slot.insert(Utc::now());
                return id;
            }
        }
    }

    /// Start a meeting with `host` as its host.
    ///
    /// Fails when a meeting with this ID is already running or has ended;
    /// a pending reservation is consumed.
    pub fn create_meeting(
        &self,
        meeting_id: MeetingId,
        host: ConnectionId,
        host_name: String,
    ) -> Result<SharedMeeting, GatewayError> {
        if self.ended.contains_key(&meeting_id) {
            return Err(GatewayError::MeetingEnded(meeting_id));
        }

        let shared = match self.meetings.entry(meeting_id.clone()) {
            Entry::Occupied(_) => return Err(GatewayError::MeetingAlreadyActive(meeting_id)),
            Entry::Vacant(slot) => {
                let meeting = Meeting::new(meeting_id.clone(), host.clone(), host_name);
                let shared = Arc::new(Mutex::new(meeting));
                slot.insert(shared.clone());
                shared
            },
        };

        self.reserved.remove(&meeting_id);
        self.memberships.insert(host, meeting_id);

        counter!(MEETING_CREATED).increment(1);
        gauge!(MEETING_ACTIVE).set(self.meetings.len() as f64);

        Ok(shared)
    }

    /// Generate an unused ID and start a meeting under it
    pub fn create_meeting_with_fresh_id(
        &self,
        host: ConnectionId,
        host_name: String,
    ) -> Result<SharedMeeting, GatewayError> {
        let id = self.reserve();
        self.create_meeting(id, host, host_name)
    }

    /// Get a meeting by ID
    pub fn meeting(&self, meeting_id: &str) -> Option<SharedMeeting> {
        self.meetings
            .get(meeting_id)
            .map(|entry| entry.value().clone())
    }

    /// Meeting ID the connection currently belongs to
    pub fn membership(&self, connection: &str) -> Option<MeetingId> {
        self.memberships
            .get(connection)
            .map(|entry| entry.value().clone())
    }

    /// Resolve the sender's meeting: membership first, then the meeting itself
    pub fn meeting_for(
        &self,
        connection: &str,
    ) -> Result<(MeetingId, SharedMeeting), GatewayError> {
        let meeting_id = self
            .membership(connection)
            .ok_or(GatewayError::NotInMeeting)?;
        let meeting = self
            .meeting(&meeting_id)
            .ok_or(GatewayError::MeetingNotFound)?;
        Ok((meeting_id, meeting))
    }

    pub fn bind(&self, connection: ConnectionId, meeting_id: MeetingId) {
        self.memberships.insert(connection, meeting_id);
    }

    pub fn unbind(&self, connection: &str) -> Option<MeetingId> {
        self.memberships.remove(connection).map(|(_, id)| id)
    }

    /// Drop a meeting and every membership pointing at it
    pub fn remove_meeting(&self, meeting_id: &str) -> Option<SharedMeeting> {
        let (_, meeting) = self.meetings.remove(meeting_id)?;
        self.memberships.retain(|_, id| id != meeting_id);
        self.ended.insert(meeting_id.to_string(), Utc::now());

        counter!(MEETING_ENDED).increment(1);
        gauge!(MEETING_ACTIVE).set(self.meetings.len() as f64);

        Some(meeting)
    }

    /// Forget reservations whose host never showed up
    fn prune_reservations(&self, now: DateTime<Utc>) {
        let before = self.reserved.len();
        self.reserved
            .retain(|_, reserved_at| !self.is_lapsed(*reserved_at, now));
        let pruned = before.saturating_sub(self.reserved.len());
        if pruned > 0 {
            tracing::debug!(pruned, "expired meeting reservations dropped");
        }
    }

    fn is_lapsed(&self, reserved_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(reserved_at) >= self.reservation_ttl
    }

    pub fn lookup(&self, meeting_id: &str) -> MeetingLookup {
        if let Some(meeting) = self.meeting(meeting_id) {
            let meeting = meeting.lock();
            return MeetingLookup::Active {
                is_locked: meeting.is_locked(),
                participant_count: meeting.len(),
                host_name: meeting
                    .participant(meeting.host_id())
                    .map(|p| p.name.clone()),
            };
        }
        self.prune_reservations(Utc::now());
        if let Some(entry) = self.reserved.get(meeting_id) {
            return MeetingLookup::Reserved {
                reserved_at: *entry.value(),
            };
        }
        match self.ended.get(meeting_id) {
            Some(entry) => MeetingLookup::Ended {
                ended_at: *entry.value(),
            },
            None => MeetingLookup::Unknown,
        }
    }
}

fn generate_meeting_id() -> MeetingId {
    let mut rng = rand::rng();
    (0..MEETING_ID_LENGTH)
        .map(|_| char::from(MEETING_ID_ALPHABET[rng.random_range(0..MEETING_ID_ALPHABET.len())]))
        .collect()
}
