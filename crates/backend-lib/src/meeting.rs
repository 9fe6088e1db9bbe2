// ============================
// crates/backend-lib/src/meeting.rs
// ============================
//! In-memory state of a single meeting.
//!
//! `Meeting` owns participants, roles, the spotlight slot, raised hands,
//! screen shares, lock state and the permission record. Every operation is
//! synchronous and either applies completely or changes nothing; callers
//! (the event gateway) decide who is allowed to invoke what.
//!
//! Invariant: the spotlight, every co-host, raised hand, recorder and screen
//! share refers to a current participant. `remove_participant` is the only
//! way a participant leaves and it clears all of them.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use huddle_common::{
    ConnectionId, ConnectionState, MeetingId, MeetingSnapshot, Participant, Permissions,
    PermissionsPatch, RecordingPermission, ScreenShareView,
};
use thiserror::Error;

use crate::validation::{validate_display_name, ValidationResult};

/// Audio level above which a speaker takes the spotlight automatically
pub const DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD: f64 = 0.3;

/// An active screen share
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenShare {
    pub stream_id: String,
    pub started_at: DateTime<Utc>,
    pub has_computer_audio: bool,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingError {
    #[error("Recording permission was just changed, try again in a moment")]
    Debounced,
}

#[derive(Debug)]
pub struct Meeting {
    id: MeetingId,
    host_id: ConnectionId,
    /// Join order
    participants: Vec<Participant>,
    co_hosts: HashSet<ConnectionId>,
    spotlight: Option<ConnectionId>,
    manual_spotlight: bool,
    screen_shares: HashMap<ConnectionId, ScreenShare>,
    raised_hands: HashSet<ConnectionId>,
    is_locked: bool,
    permissions: Permissions,
    recording: RecordingPermission,
    recording_changed_at: Option<Instant>,
    recorders: HashSet<ConnectionId>,
    created_at: DateTime<Utc>,
}

impl Meeting {
    /// Create a meeting with its host as the first participant
    pub fn new(id: MeetingId, host_id: ConnectionId, host_name: String) -> Self {
        let mut meeting = Self {
            id,
            host_id: host_id.clone(),
            participants: Vec::new(),
            co_hosts: HashSet::new(),
            spotlight: None,
            manual_spotlight: false,
            screen_shares: HashMap::new(),
            raised_hands: HashSet::new(),
            is_locked: false,
            permissions: Permissions::default(),
            recording: RecordingPermission::default(),
            recording_changed_at: None,
            recorders: HashSet::new(),
            created_at: Utc::now(),
        };
        meeting.add_participant(host_id, host_name, true);
        meeting
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_host(&self, id: &str) -> bool {
        self.host_id == id && self.contains(id)
    }

    pub fn is_co_host(&self, id: &str) -> bool {
        self.co_hosts.contains(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Participants in join order
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant_list(&self) -> Vec<Participant> {
        self.participants.clone()
    }

    pub fn participant_ids(&self) -> Vec<ConnectionId> {
        self.participants.iter().map(|p| p.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn spotlight(&self) -> Option<&str> {
        self.spotlight.as_deref()
    }

    pub fn is_manual_spotlight(&self) -> bool {
        self.manual_spotlight
    }

    pub fn co_hosts(&self) -> &HashSet<ConnectionId> {
        &self.co_hosts
    }

    pub fn raised_hands(&self) -> &HashSet<ConnectionId> {
        &self.raised_hands
    }

    pub fn screen_share(&self, id: &str) -> Option<&ScreenShare> {
        self.screen_shares.get(id)
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    pub fn recording_permission(&self) -> RecordingPermission {
        self.recording
    }

    pub fn is_recording(&self, id: &str) -> bool {
        self.recorders.contains(id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.participants.iter().position(|p| p.id == id)
    }

    fn participant_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// Insert a participant. Returns `false` if the connection is already present.
    ///
    /// The host takes the spotlight when nobody holds it yet.
    pub fn add_participant(&mut self, id: ConnectionId, name: String, is_host: bool) -> bool {
        if self.contains(&id) {
            return false;
        }

        if is_host && self.spotlight.is_none() {
            self.spotlight = Some(id.clone());
        }

        self.participants
            .push(Participant::new(id, name, is_host, Utc::now()));
        true
    }

    /// Remove a participant and every reference to it
    pub fn remove_participant(&mut self, id: &str) -> Option<Participant> {
        let index = self.position(id)?;
        let removed = self.participants.remove(index);

        self.co_hosts.remove(id);
        self.screen_shares.remove(id);
        self.raised_hands.remove(id);
        self.recorders.remove(id);

        if self.spotlight.as_deref() == Some(id) {
            self.spotlight = None;
            self.manual_spotlight = false;
        }

        Some(removed)
    }

    /// Manually spotlight a participant; automatic spotlighting stops until
    /// [`Meeting::remove_spotlight`]
    pub fn spotlight_participant(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.spotlight = Some(id.to_string());
        self.manual_spotlight = true;
        true
    }

    /// Clear the spotlight and hand it back to audio activity.
    /// Returns whether anything changed.
    pub fn remove_spotlight(&mut self) -> bool {
        let changed = self.spotlight.is_some() || self.manual_spotlight;
        self.spotlight = None;
        self.manual_spotlight = false;
        changed
    }

    /// Spotlight the current speaker.
    ///
    /// Single-sample comparison: `level` must be strictly above `threshold`.
    /// Returns `true` when the spotlight moved.
    pub fn handle_audio_activity(&mut self, id: &str, level: f64, threshold: f64) -> bool {
        if self.manual_spotlight || level <= threshold || !self.contains(id) {
            return false;
        }
        if self.spotlight.as_deref() == Some(id) {
            return false;
        }
        self.spotlight = Some(id.to_string());
        true
    }

    /// Only the host can grant or revoke co-host rights
    pub fn can_make_co_host(&self, id: &str) -> bool {
        self.is_host(id)
    }

    pub fn can_perform_host_action(&self, id: &str) -> bool {
        self.is_host(id) || self.is_co_host(id)
    }

    /// Grant co-host rights. No-op for the host, unknown ids and existing co-hosts.
    pub fn make_co_host(&mut self, id: &str) -> bool {
        if id == self.host_id || !self.contains(id) || !self.co_hosts.insert(id.to_string()) {
            return false;
        }
        if let Some(p) = self.participant_mut(id) {
            p.is_co_host = true;
        }
        true
    }

    pub fn remove_co_host(&mut self, id: &str) -> bool {
        if !self.co_hosts.remove(id) {
            return false;
        }
        if let Some(p) = self.participant_mut(id) {
            p.is_co_host = false;
        }
        true
    }

    /// Case-insensitive check against every participant other than `except`
    pub fn is_name_taken(&self, name: &str, except: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        self.participants
            .iter()
            .any(|p| p.id != except && p.name.to_lowercase() == wanted)
    }

    /// Rename a participant after validating the new name.
    ///
    /// Uniqueness is the caller's job (see [`Meeting::is_name_taken`]).
    /// Unknown ids are left alone.
    pub fn rename_participant(&mut self, id: &str, new_name: &str) -> ValidationResult<String> {
        let name = validate_display_name(new_name)?;
        if let Some(p) = self.participant_mut(id) {
            p.name.clone_from(&name);
        }
        Ok(name)
    }

    pub fn lock(&mut self) {
        self.is_locked = true;
    }

    pub fn unlock(&mut self) {
        self.is_locked = false;
    }

    /// Whether `id` may (re)enter: always while unlocked, members only while locked
    pub fn is_participant_allowed(&self, id: &str) -> bool {
        !self.is_locked || self.contains(id)
    }

    /// Merge a permission patch.
    ///
    /// When `mute_all_participants` turns on, every non-host participant is
    /// muted once; the ids whose state changed are returned. Later unmutes
    /// are not undone while the flag stays on.
    pub fn update_permissions(&mut self, patch: &PermissionsPatch) -> Vec<ConnectionId> {
        let was_muting_all = self.permissions.mute_all_participants;
        self.permissions = self.permissions.merge(patch);

        if was_muting_all || !self.permissions.mute_all_participants {
            return Vec::new();
        }

        let host_id = self.host_id.clone();
        self.participants
            .iter_mut()
            .filter(|p| p.id != host_id && !p.is_muted)
            .map(|p| {
                p.is_muted = true;
                p.id.clone()
            })
            .collect()
    }

    pub fn set_muted(&mut self, id: &str, muted: bool) -> bool {
        match self.participant_mut(id) {
            Some(p) if p.is_muted != muted => {
                p.is_muted = muted;
                true
            },
            _ => false,
        }
    }

    pub fn set_camera_off(&mut self, id: &str, camera_off: bool) -> bool {
        match self.participant_mut(id) {
            Some(p) if p.is_camera_off != camera_off => {
                p.is_camera_off = camera_off;
                true
            },
            _ => false,
        }
    }

    pub fn raise_hand(&mut self, id: &str) -> bool {
        if !self.contains(id) || !self.raised_hands.insert(id.to_string()) {
            return false;
        }
        if let Some(p) = self.participant_mut(id) {
            p.hand_raised = true;
        }
        true
    }

    pub fn lower_hand(&mut self, id: &str) -> bool {
        if !self.raised_hands.remove(id) {
            return false;
        }
        if let Some(p) = self.participant_mut(id) {
            p.hand_raised = false;
        }
        true
    }

    pub fn set_connection_state(&mut self, id: &str, state: ConnectionState) -> bool {
        match self.participant_mut(id) {
            Some(p) => {
                p.connection_state = state;
                true
            },
            None => false,
        }
    }

    /// Participants that have announced `participant-ready` and are still up,
    /// in join order
    pub fn ready_participants(&self) -> Vec<ConnectionId> {
        self.participants
            .iter()
            .filter(|p| {
                !matches!(
                    p.connection_state,
                    ConnectionState::New | ConnectionState::Disconnected
                )
            })
            .map(|p| p.id.clone())
            .collect()
    }

    /// Register or replace the screen share of a participant
    pub fn start_screen_share(
        &mut self,
        id: &str,
        stream_id: String,
        has_computer_audio: bool,
    ) -> bool {
        let Some(p) = self.participant_mut(id) else {
            return false;
        };
        p.is_screen_sharing = true;
        self.screen_shares.insert(
            id.to_string(),
            ScreenShare {
                stream_id,
                started_at: Utc::now(),
                has_computer_audio,
            },
        );
        true
    }

    pub fn stop_screen_share(&mut self, id: &str) -> bool {
        if self.screen_shares.remove(id).is_none() {
            return false;
        }
        if let Some(p) = self.participant_mut(id) {
            p.is_screen_sharing = false;
        }
        true
    }

    /// Change who may record. Rejected within `debounce` of the previous change.
    pub fn set_recording_permission(
        &mut self,
        permission: RecordingPermission,
        now: Instant,
        debounce: Duration,
    ) -> Result<bool, RecordingError> {
        if let Some(changed_at) = self.recording_changed_at {
            if now.saturating_duration_since(changed_at) < debounce {
                return Err(RecordingError::Debounced);
            }
        }
        if self.recording == permission {
            return Ok(false);
        }
        self.recording = permission;
        self.recording_changed_at = Some(now);
        Ok(true)
    }

    pub fn can_record(&self, id: &str) -> bool {
        match self.recording {
            RecordingPermission::HostOnly => self.can_perform_host_action(id),
            RecordingPermission::Everyone => self.contains(id),
        }
    }

    pub fn start_recording(&mut self, id: &str) -> bool {
        self.contains(id) && self.recorders.insert(id.to_string())
    }

    pub fn stop_recording(&mut self, id: &str) -> bool {
        self.recorders.remove(id)
    }

    /// Full view for a joining client
    pub fn snapshot(&self) -> MeetingSnapshot {
        let mut screen_shares: Vec<ScreenShareView> = self
            .screen_shares
            .iter()
            .map(|(id, share)| ScreenShareView {
                participant_id: id.clone(),
                stream_id: share.stream_id.clone(),
                started_at: share.started_at,
                has_computer_audio: share.has_computer_audio,
            })
            .collect();
        screen_shares.sort_by_key(|s| s.started_at);

        // raised hands in join order
        let raised_hands = self
            .participants
            .iter()
            .filter(|p| self.raised_hands.contains(&p.id))
            .map(|p| p.id.clone())
            .collect();

        MeetingSnapshot {
            host_id: self.host_id.clone(),
            participants: self.participant_list(),
            spotlight: self.spotlight.clone(),
            permissions: self.permissions,
            is_locked: self.is_locked,
            screen_shares,
            raised_hands,
            recording_permission: self.recording,
        }
    }

    /// Check the cross-reference invariant. Used by tests.
    pub fn check_invariants(&self) -> bool {
        let present = |id: &String| self.contains(id);
        self.spotlight.as_ref().is_none_or(present)
            && self.co_hosts.iter().all(present)
            && self.raised_hands.iter().all(present)
            && self.recorders.iter().all(present)
            && self.screen_shares.keys().all(present)
            && !self.co_hosts.contains(&self.host_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn meeting_with_ben() -> Meeting {
        let mut meeting = Meeting::new("ABC1".to_string(), "ada".to_string(), "Ada".to_string());
        meeting.add_participant("ben".to_string(), "Ben".to_string(), false);
        meeting
    }

    #[test]
    fn test_host_is_spotlighted_on_creation() {
        let meeting = Meeting::new("ABC1".to_string(), "ada".to_string(), "Ada".to_string());
        assert_eq!(meeting.spotlight(), Some("ada"));
        assert!(!meeting.is_manual_spotlight());
        assert!(meeting.participant("ada").unwrap().is_host);
    }

    #[test]
    fn test_spotlight_cleared_when_participant_leaves() {
        let mut meeting = meeting_with_ben();
        assert!(meeting.spotlight_participant("ben"));
        assert_eq!(meeting.spotlight(), Some("ben"));

        meeting.remove_participant("ben");
        assert_eq!(meeting.spotlight(), None);
        assert!(meeting.check_invariants());
    }

    #[test]
    fn test_spotlight_unknown_participant_is_rejected() {
        let mut meeting = meeting_with_ben();
        assert!(!meeting.spotlight_participant("ghost"));
        assert_eq!(meeting.spotlight(), Some("ada"));
    }

    #[test]
    fn test_audio_activity_auto_spotlight() {
        let mut meeting = meeting_with_ben();
        meeting.remove_spotlight();

        assert!(meeting.handle_audio_activity("ben", 0.5, DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD));
        assert_eq!(meeting.spotlight(), Some("ben"));
        assert!(!meeting.is_manual_spotlight());

        // already spotlighted
        assert!(!meeting.handle_audio_activity("ben", 0.9, DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD));
    }

    #[test]
    fn test_audio_activity_threshold_is_strict() {
        let mut meeting = meeting_with_ben();
        assert!(!meeting.handle_audio_activity("ben", 0.3, DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD));
        assert_eq!(meeting.spotlight(), Some("ada"));
        assert!(meeting.handle_audio_activity("ben", 0.300_001, DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD));
    }

    #[test]
    fn test_audio_activity_flaps_between_speakers_without_smoothing() {
        // Two speakers hovering just above the threshold swap the spotlight on
        // every sample; there is no hysteresis.
        let mut meeting = meeting_with_ben();
        let mut changes = 0;
        for i in 0..10 {
            let speaker = if i % 2 == 0 { "ben" } else { "ada" };
            if meeting.handle_audio_activity(speaker, 0.31, DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD) {
                changes += 1;
            }
        }
        assert_eq!(changes, 10);

        // Samples exactly at the threshold never move it
        let before = meeting.spotlight().map(str::to_string);
        for speaker in ["ada", "ben", "ada", "ben"] {
            assert!(!meeting.handle_audio_activity(
                speaker,
                0.3,
                DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD
            ));
        }
        assert_eq!(meeting.spotlight().map(str::to_string), before);
    }

    #[test]
    fn test_manual_spotlight_blocks_audio_activity() {
        let mut meeting = meeting_with_ben();
        meeting.spotlight_participant("ada");
        assert!(!meeting.handle_audio_activity("ben", 0.9, DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD));
        assert_eq!(meeting.spotlight(), Some("ada"));

        meeting.remove_spotlight();
        assert!(meeting.handle_audio_activity("ben", 0.9, DEFAULT_AUDIO_SPOTLIGHT_THRESHOLD));
    }

    #[test]
    fn test_co_host_management() {
        let mut meeting = meeting_with_ben();
        assert!(meeting.can_make_co_host("ada"));
        assert!(!meeting.can_make_co_host("ben"));

        // host identity is immutable
        assert!(!meeting.make_co_host("ada"));
        assert!(!meeting.is_co_host("ada"));

        assert!(meeting.make_co_host("ben"));
        assert!(!meeting.make_co_host("ben"));
        assert!(meeting.participant("ben").unwrap().is_co_host);
        assert!(meeting.can_perform_host_action("ben"));
        assert!(!meeting.can_make_co_host("ben"));

        assert!(meeting.remove_co_host("ben"));
        assert!(!meeting.can_perform_host_action("ben"));
        assert!(!meeting.participant("ben").unwrap().is_co_host);
    }

    #[test]
    fn test_rename_validates_and_reports_duplicates() {
        let mut meeting = meeting_with_ben();
        assert!(meeting.is_name_taken("ADA", "ben"));
        assert!(!meeting.is_name_taken("Ben", "ben"));
        assert!(meeting.rename_participant("ben", "   ").is_err());
        assert!(meeting.rename_participant("ben", &"b".repeat(51)).is_err());
        assert_eq!(meeting.participant("ben").unwrap().name, "Ben");

        assert_eq!(meeting.rename_participant("ben", "  Benjamin ").unwrap(), "Benjamin");
        assert_eq!(meeting.participant("ben").unwrap().name, "Benjamin");
    }

    #[test]
    fn test_lock_blocks_newcomers_only() {
        let mut meeting = meeting_with_ben();
        meeting.lock();
        assert!(meeting.is_participant_allowed("ben"));
        assert!(!meeting.is_participant_allowed("cara"));
        meeting.unlock();
        assert!(meeting.is_participant_allowed("cara"));
    }

    #[test]
    fn test_mute_all_is_a_one_time_sweep() {
        let mut meeting = meeting_with_ben();
        meeting.add_participant("cara".to_string(), "Cara".to_string(), false);
        meeting.make_co_host("cara");

        let muted = meeting.update_permissions(&PermissionsPatch {
            mute_all_participants: Some(true),
            ..PermissionsPatch::default()
        });
        assert_eq!(muted, vec!["ben".to_string(), "cara".to_string()]);
        assert!(!meeting.participant("ada").unwrap().is_muted);

        // unmuting afterwards sticks
        meeting.set_muted("ben", false);
        let muted = meeting.update_permissions(&PermissionsPatch {
            mute_all_participants: Some(true),
            ..PermissionsPatch::default()
        });
        assert!(muted.is_empty());
        assert!(!meeting.participant("ben").unwrap().is_muted);

        // newcomers are not auto-muted
        meeting.add_participant("dan".to_string(), "Dan".to_string(), false);
        assert!(!meeting.participant("dan").unwrap().is_muted);
        assert!(meeting.permissions().mute_all_participants);
    }

    #[test]
    fn test_update_permissions_merges() {
        let mut meeting = meeting_with_ben();
        meeting.update_permissions(&PermissionsPatch {
            chat_enabled: Some(false),
            ..PermissionsPatch::default()
        });
        let permissions = meeting.permissions();
        assert!(!permissions.chat_enabled);
        assert!(permissions.file_sharing);
        assert!(!permissions.mute_all_participants);
    }

    #[test]
    fn test_remove_participant_clears_derived_state() {
        let mut meeting = meeting_with_ben();
        meeting.make_co_host("ben");
        meeting.raise_hand("ben");
        meeting.start_screen_share("ben", "stream-1".to_string(), true);
        meeting.set_recording_permission(
            RecordingPermission::Everyone,
            Instant::now(),
            Duration::ZERO,
        )
        .unwrap();
        meeting.start_recording("ben");
        meeting.spotlight_participant("ben");

        let removed = meeting.remove_participant("ben").unwrap();
        assert_eq!(removed.name, "Ben");
        assert!(meeting.co_hosts().is_empty());
        assert!(meeting.raised_hands().is_empty());
        assert!(meeting.screen_share("ben").is_none());
        assert!(!meeting.is_recording("ben"));
        assert!(meeting.check_invariants());
    }

    #[test]
    fn test_ready_participants_in_join_order() {
        let mut meeting = meeting_with_ben();
        meeting.add_participant("cara".to_string(), "Cara".to_string(), false);
        meeting.set_connection_state("cara", ConnectionState::Ready);
        meeting.set_connection_state("ada", ConnectionState::Connected);
        assert_eq!(meeting.ready_participants(), vec!["ada", "cara"]);
    }

    #[test]
    fn test_recording_permission_debounce() {
        let mut meeting = meeting_with_ben();
        let start = Instant::now();
        let debounce = Duration::from_millis(1500);

        assert_eq!(
            meeting.set_recording_permission(RecordingPermission::Everyone, start, debounce),
            Ok(true)
        );
        assert_eq!(
            meeting.set_recording_permission(
                RecordingPermission::HostOnly,
                start + Duration::from_millis(500),
                debounce
            ),
            Err(RecordingError::Debounced)
        );
        assert!(meeting.can_record("ben"));
        assert_eq!(
            meeting.set_recording_permission(
                RecordingPermission::HostOnly,
                start + Duration::from_secs(2),
                debounce
            ),
            Ok(true)
        );
        assert!(!meeting.can_record("ben"));
        assert!(meeting.can_record("ada"));
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut meeting = meeting_with_ben();
        meeting.raise_hand("ben");
        meeting.start_screen_share("ada", "screen-a".to_string(), false);
        meeting.lock();

        let snapshot = meeting.snapshot();
        assert_eq!(snapshot.host_id, "ada");
        assert_eq!(snapshot.participants.len(), 2);
        assert_eq!(snapshot.participants[0].id, "ada");
        assert_eq!(snapshot.raised_hands, vec!["ben"]);
        assert_eq!(snapshot.screen_shares.len(), 1);
        assert!(snapshot.is_locked);
        assert!(snapshot.participants[0].is_screen_sharing);
    }

    #[test]
    fn test_random_add_remove_sequences_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let ids: Vec<String> = (0..6).map(|i| format!("p{i}")).collect();

        for _ in 0..50 {
            let mut meeting = Meeting::new("M-1".to_string(), "p0".to_string(), "Host".to_string());
            for _ in 0..200 {
                let id = &ids[rng.random_range(0..ids.len())];
                match rng.random_range(0..8) {
                    0 => {
                        meeting.add_participant(id.clone(), id.to_uppercase(), false);
                    },
                    1 => {
                        meeting.remove_participant(id);
                    },
                    2 => {
                        meeting.spotlight_participant(id);
                    },
                    3 => {
                        meeting.make_co_host(id);
                    },
                    4 => {
                        meeting.raise_hand(id);
                    },
                    5 => {
                        meeting.start_screen_share(id, "s".to_string(), false);
                    },
                    6 => {
                        meeting.handle_audio_activity(id, rng.random_range(0.0..1.0), 0.3);
                    },
                    _ => {
                        meeting.remove_spotlight();
                    },
                }
                assert!(meeting.check_invariants());
                if let Some(spotlight) = meeting.spotlight() {
                    assert!(meeting.contains(spotlight));
                }
            }
        }
    }
}
