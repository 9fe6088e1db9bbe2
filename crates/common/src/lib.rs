// ================
// crates/common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between the Huddle browser client and server.
//! This module defines the WebSocket protocol messages and supporting types.
//!
//! Every message is a JSON object whose `type` field carries the kebab-case
//! event name; the remaining fields are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a single WebSocket connection
pub type ConnectionId = String;

/// Identifier of a meeting
pub type MeetingId = String;

/// Messages sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Start a meeting as its host
    /// # Fields
    /// * `meeting_id` - Reserved meeting ID; a fresh one is generated when absent
    /// * `host_name` - Display name of the host
    JoinAsHost {
        #[serde(default)]
        meeting_id: Option<MeetingId>,
        host_name: String,
    },
    /// Join a running meeting
    JoinMeeting {
        meeting_id: MeetingId,
        participant_name: String,
    },
    /// Leave the current meeting without closing the connection
    LeaveMeeting,
    /// Media is ready; ask the server to pair this connection with its peers
    ParticipantReady,
    /// Report the state of this participant's peer connections
    #[serde(rename = "connection-state")]
    UpdateConnectionState { state: ConnectionState },
    /// WebRTC offer for `target`
    Offer {
        #[serde(default)]
        target: ConnectionId,
        #[serde(default)]
        offer: Value,
    },
    /// WebRTC answer for `target`
    Answer {
        #[serde(default)]
        target: ConnectionId,
        #[serde(default)]
        answer: Value,
    },
    /// ICE candidate for `target`
    IceCandidate {
        #[serde(default)]
        target: ConnectionId,
        #[serde(default)]
        candidate: Value,
    },
    SpotlightParticipant {
        target_id: ConnectionId,
    },
    RemoveSpotlight,
    /// Audio level sample in `0.0..=1.0` from the sender's microphone
    AudioActivity {
        level: f64,
    },
    MuteParticipant {
        target_id: ConnectionId,
    },
    #[serde(rename = "make-cohost")]
    MakeCoHost {
        target_id: ConnectionId,
    },
    #[serde(rename = "remove-cohost")]
    RemoveCoHost {
        target_id: ConnectionId,
    },
    KickParticipant {
        target_id: ConnectionId,
    },
    LowerParticipantHand {
        target_id: ConnectionId,
    },
    ToggleMic {
        is_muted: bool,
    },
    ToggleCamera {
        is_camera_off: bool,
    },
    RaiseHand,
    LowerHand,
    RenameParticipant {
        new_name: String,
    },
    StartScreenShare {
        stream_id: String,
        #[serde(default)]
        has_computer_audio: bool,
    },
    StopScreenShare,
    ToggleMeetingLock,
    UpdateMeetingPermissions {
        permissions: PermissionsPatch,
    },
    /// Chat message; `to` makes it private between sender and target
    ChatMessage {
        text: String,
        #[serde(default)]
        to: Option<ConnectionId>,
    },
    EmojiReaction {
        emoji: String,
    },
    CreatePoll {
        question: String,
        options: Vec<String>,
        #[serde(default)]
        duration_secs: Option<u64>,
    },
    VotePoll {
        poll_id: String,
        option_index: usize,
    },
    EndPoll {
        poll_id: String,
    },
    SetRecordingPermission {
        permission: RecordingPermission,
    },
    StartRecording,
    StopRecording,
}

/// Messages sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Response to a successful host or participant join
    JoinedMeeting {
        meeting_id: MeetingId,
        /// Connection ID the server assigned to the receiver
        self_id: ConnectionId,
        #[serde(flatten)]
        meeting: MeetingSnapshot,
    },
    /// Join failed: unknown meeting, duplicate host, bad name
    MeetingError {
        message: String,
    },
    /// Join refused because the meeting is locked
    MeetingLocked {
        message: String,
    },
    /// A request was rejected; nothing was changed
    ActionError {
        message: String,
    },
    ParticipantJoined {
        participant: Participant,
        participants: Vec<Participant>,
    },
    ParticipantLeft {
        participant_id: ConnectionId,
        participants: Vec<Participant>,
        spotlight: Option<ConnectionId>,
    },
    ParticipantsUpdated {
        participants: Vec<Participant>,
    },
    /// The host left; the meeting no longer exists
    MeetingEnded {
        reason: String,
    },
    /// Acknowledges `leave-meeting`
    LeftMeeting {
        meeting_id: MeetingId,
    },
    /// The receiver was removed by a host or co-host
    Kicked {
        meeting_id: MeetingId,
        by: ConnectionId,
    },
    /// Pairing instruction produced by `participant-ready`
    InitiateConnection {
        target_id: ConnectionId,
        should_create_offer: bool,
    },
    Offer {
        sender: ConnectionId,
        offer: Value,
    },
    Answer {
        sender: ConnectionId,
        answer: Value,
    },
    IceCandidate {
        sender: ConnectionId,
        candidate: Value,
    },
    SpotlightChanged {
        spotlight: Option<ConnectionId>,
        manual: bool,
        participants: Vec<Participant>,
    },
    ForceMuted {
        by: ConnectionId,
    },
    #[serde(rename = "cohost-updated")]
    CoHostUpdated {
        participant_id: ConnectionId,
        is_co_host: bool,
        participants: Vec<Participant>,
    },
    HandRaised {
        participant_id: ConnectionId,
        participants: Vec<Participant>,
    },
    HandLowered {
        participant_id: ConnectionId,
        participants: Vec<Participant>,
    },
    ParticipantRenamed {
        participant_id: ConnectionId,
        name: String,
        participants: Vec<Participant>,
    },
    ScreenShareStarted {
        participant_id: ConnectionId,
        stream_id: String,
        has_computer_audio: bool,
        participants: Vec<Participant>,
    },
    ScreenShareStopped {
        participant_id: ConnectionId,
        participants: Vec<Participant>,
    },
    MeetingLockChanged {
        is_locked: bool,
    },
    PermissionsUpdated {
        permissions: Permissions,
        participants: Vec<Participant>,
    },
    ChatMessage {
        id: String,
        sender_id: ConnectionId,
        sender_name: String,
        text: String,
        private_to: Option<ConnectionId>,
        sent_at: DateTime<Utc>,
    },
    EmojiReaction {
        participant_id: ConnectionId,
        emoji: String,
    },
    PollCreated {
        poll: PollView,
    },
    PollUpdated {
        poll: PollView,
    },
    PollEnded {
        poll: PollView,
    },
    RecordingPermissionChanged {
        permission: RecordingPermission,
    },
    RecordingStarted {
        participant_id: ConnectionId,
    },
    RecordingStopped {
        participant_id: ConnectionId,
    },
    FileShared {
        file: FileRecord,
    },
    FileRemoved {
        file_id: String,
    },
}

/// WebRTC connection progress reported by a participant
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    New,
    Ready,
    Connected,
    Failed,
    Disconnected,
}

/// A meeting participant as seen by every client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,
    pub is_host: bool,
    pub is_co_host: bool,
    pub is_muted: bool,
    pub is_camera_off: bool,
    pub is_screen_sharing: bool,
    pub hand_raised: bool,
    pub connection_state: ConnectionState,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(id: ConnectionId, name: String, is_host: bool, joined_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            is_host,
            is_co_host: false,
            is_muted: false,
            is_camera_off: false,
            is_screen_sharing: false,
            hand_raised: false,
            connection_state: ConnectionState::New,
            joined_at,
        }
    }
}

/// Meeting-wide policy switches controlled by the host
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub chat_enabled: bool,
    pub file_sharing: bool,
    pub emoji_reactions: bool,
    pub allow_rename: bool,
    pub allow_unmute: bool,
    pub allow_hand_raising: bool,
    pub mute_all_participants: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            chat_enabled: true,
            file_sharing: true,
            emoji_reactions: true,
            allow_rename: true,
            allow_unmute: true,
            allow_hand_raising: true,
            mute_all_participants: false,
        }
    }
}

impl Permissions {
    /// Return a copy with every field present in `patch` replaced
    #[must_use]
    pub fn merge(&self, patch: &PermissionsPatch) -> Self {
        Self {
            chat_enabled: patch.chat_enabled.unwrap_or(self.chat_enabled),
            file_sharing: patch.file_sharing.unwrap_or(self.file_sharing),
            emoji_reactions: patch.emoji_reactions.unwrap_or(self.emoji_reactions),
            allow_rename: patch.allow_rename.unwrap_or(self.allow_rename),
            allow_unmute: patch.allow_unmute.unwrap_or(self.allow_unmute),
            allow_hand_raising: patch.allow_hand_raising.unwrap_or(self.allow_hand_raising),
            mute_all_participants: patch
                .mute_all_participants
                .unwrap_or(self.mute_all_participants),
        }
    }
}

/// Partial update of [`Permissions`]; absent fields are left unchanged
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_sharing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji_reactions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_rename: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_unmute: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_hand_raising: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute_all_participants: Option<bool>,
}

/// Who may record the meeting locally
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingPermission {
    #[default]
    HostOnly,
    Everyone,
}

/// An active screen share
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScreenShareView {
    pub participant_id: ConnectionId,
    pub stream_id: String,
    pub started_at: DateTime<Utc>,
    pub has_computer_audio: bool,
}

/// Full view of a meeting, sent on join
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSnapshot {
    pub host_id: ConnectionId,
    /// Participants in join order
    pub participants: Vec<Participant>,
    pub spotlight: Option<ConnectionId>,
    pub permissions: Permissions,
    pub is_locked: bool,
    pub screen_shares: Vec<ScreenShareView>,
    pub raised_hands: Vec<ConnectionId>,
    pub recording_permission: RecordingPermission,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub text: String,
    pub votes: u32,
}

/// A poll as shown to participants; individual votes stay on the server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollView {
    pub id: String,
    pub question: String,
    pub options: Vec<PollOption>,
    pub created_by: ConnectionId,
    pub is_active: bool,
    pub total_votes: u32,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Metadata of a file shared in a meeting; the bytes live at `url`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub meeting_id: MeetingId,
    pub file_name: String,
    pub size: u64,
    pub mime_type: String,
    pub url: String,
    pub uploaded_by: ConnectionId,
    pub uploader_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Body of `POST /api/meeting/{id}/files`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShareFileRequest {
    /// Connection of the participant announcing the file
    pub connection_id: ConnectionId,
    pub file_name: String,
    pub size: u64,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    pub url: String,
}

fn default_mime_type() -> String {
    "application/octet-stream".to_string()
}

/// STUN/TURN server entry handed to browsers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_wire_names() {
        let parsed: ClientEvent = serde_json::from_value(json!({
            "type": "join-meeting",
            "meetingId": "ABC1",
            "participantName": "Ben",
        }))
        .unwrap();
        assert_eq!(
            parsed,
            ClientEvent::JoinMeeting {
                meeting_id: "ABC1".to_string(),
                participant_name: "Ben".to_string(),
            }
        );

        let parsed: ClientEvent =
            serde_json::from_value(json!({"type": "make-cohost", "targetId": "c2"})).unwrap();
        assert_eq!(
            parsed,
            ClientEvent::MakeCoHost {
                target_id: "c2".to_string()
            }
        );

        let parsed: ClientEvent = serde_json::from_value(json!({"type": "raise-hand"})).unwrap();
        assert_eq!(parsed, ClientEvent::RaiseHand);
    }

    #[test]
    fn test_signal_target_defaults_to_empty() {
        let parsed: ClientEvent =
            serde_json::from_value(json!({"type": "ice-candidate", "candidate": {"sdpMid": "0"}}))
                .unwrap();
        match parsed {
            ClientEvent::IceCandidate { target, candidate } => {
                assert!(target.is_empty());
                assert_eq!(candidate["sdpMid"], "0");
            },
            other => panic!("Expected IceCandidate, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let parsed = serde_json::from_value::<ClientEvent>(json!({"type": "draw-line"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_permissions_merge_only_touches_present_fields() {
        let base = Permissions::default();
        let patch = PermissionsPatch {
            chat_enabled: Some(false),
            mute_all_participants: Some(true),
            ..PermissionsPatch::default()
        };

        let merged = base.merge(&patch);
        assert!(!merged.chat_enabled);
        assert!(merged.mute_all_participants);
        assert!(merged.file_sharing);
        assert!(merged.allow_unmute);
        // merge is pure
        assert!(base.chat_enabled);
    }

    #[test]
    fn test_permissions_patch_parses_partial_object() {
        let patch: PermissionsPatch =
            serde_json::from_value(json!({"allowRename": false})).unwrap();
        assert_eq!(patch.allow_rename, Some(false));
        assert_eq!(patch.chat_enabled, None);
    }

    #[test]
    fn test_server_event_serialization() {
        let event = ServerEvent::InitiateConnection {
            target_id: "peer-1".to_string(),
            should_create_offer: true,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "initiate-connection");
        assert_eq!(value["targetId"], "peer-1");
        assert_eq!(value["shouldCreateOffer"], true);

        let event = ServerEvent::CoHostUpdated {
            participant_id: "c2".to_string(),
            is_co_host: true,
            participants: Vec::new(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "cohost-updated");
    }

    #[test]
    fn test_participant_serializes_camel_case() {
        let participant = Participant::new("c1".to_string(), "Ada".to_string(), true, Utc::now());
        let value = serde_json::to_value(&participant).unwrap();
        assert_eq!(value["isHost"], true);
        assert_eq!(value["connectionState"], "new");
        assert_eq!(value["handRaised"], false);
    }
}
