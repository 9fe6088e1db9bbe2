// ============================
// crates/backend-lib/src/gateway.rs
// ============================
//! Event gateway: turns inbound client events into meeting mutations and
//! outbound events.
//!
//! Every handler resolves the sender's meeting, locks it, checks roles and
//! permissions, validates input, mutates, and queues the resulting events.
//! Events are only sent after the meeting lock is released.
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use huddle_common::{
    ClientEvent, ConnectionId, ConnectionState, FileRecord, MeetingId, PermissionsPatch,
    RecordingPermission, ServerEvent, ShareFileRequest,
};
use metrics::counter;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{AppError, GatewayError};
use crate::hub::ConnectionHub;
use crate::meeting::Meeting;
use crate::metrics::{ACTION_REJECTED, FILE_SHARED, MEETING_JOINED};
use crate::polls::PollRegistry;
use crate::registry::{MeetingLookup, SessionRegistry};
use crate::signal::{Signal, SignalRelay};
use crate::storage::Storage;
use crate::validation::{
    validate_audio_level, validate_chat_text, validate_display_name, validate_emoji,
    validate_file_metadata, validate_meeting_id, validate_poll, validate_stream_id,
};

const HOST_LEFT_REASON: &str = "The host has ended the meeting";

/// Events queued while a meeting is locked
#[derive(Default)]
struct Outbox(Vec<(Vec<ConnectionId>, ServerEvent)>);

impl Outbox {
    fn to(&mut self, connection: &str, event: ServerEvent) {
        self.0.push((vec![connection.to_string()], event));
    }

    fn to_many(&mut self, connections: Vec<ConnectionId>, event: ServerEvent) {
        self.0.push((connections, event));
    }

    /// Queue `event` for every current participant
    fn to_all(&mut self, meeting: &Meeting, event: ServerEvent) {
        self.to_many(meeting.participant_ids(), event);
    }
}

/// Routes client events; shared by every connection
#[derive(Clone)]
pub struct EventGateway {
    registry: Arc<SessionRegistry>,
    hub: Arc<ConnectionHub>,
    polls: Arc<PollRegistry>,
    relay: SignalRelay,
    storage: Arc<dyn Storage>,
    settings: Arc<Settings>,
}

impl EventGateway {
    pub fn new(
        registry: Arc<SessionRegistry>,
        hub: Arc<ConnectionHub>,
        polls: Arc<PollRegistry>,
        storage: Arc<dyn Storage>,
        settings: Arc<Settings>,
    ) -> Self {
        let relay = SignalRelay::new(registry.clone(), hub.clone());
        Self {
            registry,
            hub,
            polls,
            relay,
            storage,
            settings,
        }
    }

    /// Handle one inbound event. Rejections are sent back to the sender.
    pub fn handle(&self, connection: &str, event: ClientEvent) {
        let is_join = matches!(
            event,
            ClientEvent::JoinAsHost { .. } | ClientEvent::JoinMeeting { .. }
        );

        if let Err(err) = self.dispatch(connection, event) {
            self.reject(connection, &err, is_join);
        }
    }

    /// Tell the sender its message could not be parsed
    pub fn reject_malformed(&self, connection: &str, reason: String) {
        self.reject(connection, &GatewayError::Malformed(reason), false);
    }

    /// Connection closed: leave the meeting, ending it if the host left
    pub fn disconnect(&self, connection: &str) {
        match self.depart(connection) {
            Ok(meeting_id) => {
                tracing::info!(%connection, %meeting_id, "participant disconnected");
            },
            Err(GatewayError::NotInMeeting) => {},
            Err(err) => {
                tracing::warn!(%connection, error = %err, "cleanup after disconnect failed");
            },
        }
    }

    fn reject(&self, connection: &str, err: &GatewayError, is_join: bool) {
        counter!(ACTION_REJECTED).increment(1);
        tracing::debug!(%connection, error = %err, "request rejected");

        let event = if is_join {
            err.to_join_event()
        } else {
            err.to_action_event()
        };
        self.hub.send(connection, event);
    }

    #[allow(clippy::too_many_lines)]
    fn dispatch(&self, connection: &str, event: ClientEvent) -> Result<(), GatewayError> {
        match event {
            ClientEvent::JoinAsHost {
                meeting_id,
                host_name,
            } => self.join_as_host(connection, meeting_id, &host_name),
            ClientEvent::JoinMeeting {
                meeting_id,
                participant_name,
            } => self.join_meeting(connection, &meeting_id, &participant_name),
            ClientEvent::LeaveMeeting => self.leave_meeting(connection),
            ClientEvent::ParticipantReady => self.participant_ready(connection),
            ClientEvent::UpdateConnectionState { state } => {
                self.update_connection_state(connection, state)
            },
            ClientEvent::Offer { target, offer } => {
                self.relay_signal(connection, &target, Signal::Offer(offer))
            },
            ClientEvent::Answer { target, answer } => {
                self.relay_signal(connection, &target, Signal::Answer(answer))
            },
            ClientEvent::IceCandidate { target, candidate } => {
                self.relay_signal(connection, &target, Signal::IceCandidate(candidate))
            },
            ClientEvent::SpotlightParticipant { target_id } => {
                self.spotlight_participant(connection, &target_id)
            },
            ClientEvent::RemoveSpotlight => self.remove_spotlight(connection),
            ClientEvent::AudioActivity { level } => self.audio_activity(connection, level),
            ClientEvent::MuteParticipant { target_id } => {
                self.mute_participant(connection, &target_id)
            },
            ClientEvent::MakeCoHost { target_id } => self.set_co_host(connection, &target_id, true),
            ClientEvent::RemoveCoHost { target_id } => {
                self.set_co_host(connection, &target_id, false)
            },
            ClientEvent::KickParticipant { target_id } => {
                self.kick_participant(connection, &target_id)
            },
            ClientEvent::LowerParticipantHand { target_id } => {
                self.lower_participant_hand(connection, &target_id)
            },
            ClientEvent::ToggleMic { is_muted } => self.toggle_mic(connection, is_muted),
            ClientEvent::ToggleCamera { is_camera_off } => {
                self.toggle_camera(connection, is_camera_off)
            },
            ClientEvent::RaiseHand => self.raise_hand(connection),
            ClientEvent::LowerHand => self.lower_hand(connection),
            ClientEvent::RenameParticipant { new_name } => {
                self.rename_participant(connection, &new_name)
            },
            ClientEvent::StartScreenShare {
                stream_id,
                has_computer_audio,
            } => self.start_screen_share(connection, &stream_id, has_computer_audio),
            ClientEvent::StopScreenShare => self.stop_screen_share(connection),
            ClientEvent::ToggleMeetingLock => self.toggle_meeting_lock(connection),
            ClientEvent::UpdateMeetingPermissions { permissions } => {
                self.update_permissions(connection, &permissions)
            },
            ClientEvent::ChatMessage { text, to } => {
                self.chat_message(connection, &text, to.as_deref())
            },
            ClientEvent::EmojiReaction { emoji } => self.emoji_reaction(connection, &emoji),
            ClientEvent::CreatePoll {
                question,
                options,
                duration_secs,
            } => self.create_poll(connection, &question, &options, duration_secs),
            ClientEvent::VotePoll {
                poll_id,
                option_index,
            } => self.vote_poll(connection, &poll_id, option_index),
            ClientEvent::EndPoll { poll_id } => self.end_poll(connection, &poll_id),
            ClientEvent::SetRecordingPermission { permission } => {
                self.set_recording_permission(connection, permission)
            },
            ClientEvent::StartRecording => self.set_recording(connection, true),
            ClientEvent::StopRecording => self.set_recording(connection, false),
        }
    }

    /// Lock the sender's meeting, run `f`, then deliver whatever it queued
    fn in_meeting<F>(&self, connection: &str, f: F) -> Result<(), GatewayError>
    where
        F: FnOnce(&mut Meeting, &mut Outbox) -> Result<(), GatewayError>,
    {
        let (_, shared) = self.registry.meeting_for(connection)?;
        let mut outbox = Outbox::default();
        {
            let mut meeting = shared.lock();
            ensure_running(&meeting)?;
            f(&mut meeting, &mut outbox)?;
        }
        self.flush(outbox);
        Ok(())
    }

    fn flush(&self, outbox: Outbox) {
        for (recipients, event) in outbox.0 {
            self.hub.send_many(&recipients, &event);
        }
    }

    fn broadcast_to_meeting(
        registry: &SessionRegistry,
        hub: &ConnectionHub,
        meeting_id: &str,
        event: &ServerEvent,
    ) {
        let Some(shared) = registry.meeting(meeting_id) else {
            return;
        };
        let recipients = shared.lock().participant_ids();
        hub.send_many(&recipients, event);
    }

    // ----- joining and leaving -----

    fn join_as_host(
        &self,
        connection: &str,
        meeting_id: Option<MeetingId>,
        host_name: &str,
    ) -> Result<(), GatewayError> {
        if self.registry.membership(connection).is_some() {
            return Err(GatewayError::AlreadyInMeeting);
        }
        let name = validate_display_name(host_name)?;

        let shared = match meeting_id {
            Some(id) => {
                let id = validate_meeting_id(&id)?.to_string();
                self.registry.create_meeting(id, connection.to_string(), name)?
            },
            None => self
                .registry
                .create_meeting_with_fresh_id(connection.to_string(), name)?,
        };

        let (meeting_id, snapshot) = {
            let meeting = shared.lock();
            (meeting.id().to_string(), meeting.snapshot())
        };

        tracing::info!(%connection, %meeting_id, "meeting started");
        counter!(MEETING_JOINED).increment(1);
        self.hub.send(
            connection,
            ServerEvent::JoinedMeeting {
                meeting_id,
                self_id: connection.to_string(),
                meeting: snapshot,
            },
        );
        Ok(())
    }

    fn join_meeting(
        &self,
        connection: &str,
        meeting_id: &str,
        participant_name: &str,
    ) -> Result<(), GatewayError> {
        if self.registry.membership(connection).is_some() {
            return Err(GatewayError::AlreadyInMeeting);
        }
        let meeting_id = validate_meeting_id(meeting_id)?;
        let name = validate_display_name(participant_name)?;

        let Some(shared) = self.registry.meeting(meeting_id) else {
            return Err(match self.registry.lookup(meeting_id) {
                MeetingLookup::Ended { .. } => GatewayError::MeetingEnded(meeting_id.to_string()),
                _ => GatewayError::MeetingNotFound,
            });
        };

        let mut outbox = Outbox::default();
        {
            let mut meeting = shared.lock();
            ensure_running(&meeting)?;
            if !meeting.is_participant_allowed(connection) {
                return Err(GatewayError::MeetingLocked);
            }

            meeting.add_participant(connection.to_string(), name, false);
            self.registry
                .bind(connection.to_string(), meeting_id.to_string());

            let participant = meeting
                .participant(connection)
                .cloned()
                .ok_or(GatewayError::ParticipantNotFound)?;
            let others = meeting
                .participant_ids()
                .into_iter()
                .filter(|id| id != connection)
                .collect();

            outbox.to(
                connection,
                ServerEvent::JoinedMeeting {
                    meeting_id: meeting_id.to_string(),
                    self_id: connection.to_string(),
                    meeting: meeting.snapshot(),
                },
            );
            outbox.to_many(
                others,
                ServerEvent::ParticipantJoined {
                    participant,
                    participants: meeting.participant_list(),
                },
            );
        }

        tracing::info!(%connection, %meeting_id, "participant joined");
        counter!(MEETING_JOINED).increment(1);
        self.flush(outbox);
        Ok(())
    }

    fn leave_meeting(&self, connection: &str) -> Result<(), GatewayError> {
        let meeting_id = self.depart(connection)?;
        tracing::info!(%connection, %meeting_id, "participant left");
        self.hub
            .send(connection, ServerEvent::LeftMeeting { meeting_id });
        Ok(())
    }

    /// Remove `connection` from its meeting. A departing host ends the meeting.
    fn depart(&self, connection: &str) -> Result<MeetingId, GatewayError> {
        let meeting_id = self
            .registry
            .membership(connection)
            .ok_or(GatewayError::NotInMeeting)?;
        let Some(shared) = self.registry.meeting(&meeting_id) else {
            self.registry.unbind(connection);
            return Ok(meeting_id);
        };

        let mut outbox = Outbox::default();
        let ended = {
            let mut meeting = shared.lock();
            let was_host = meeting.is_host(connection);
            let started_at = meeting.created_at();
            meeting.remove_participant(connection);

            if was_host {
                // unbinds everyone
                self.registry.remove_meeting(&meeting_id);
                outbox.to_all(
                    &meeting,
                    ServerEvent::MeetingEnded {
                        reason: HOST_LEFT_REASON.to_string(),
                    },
                );
            } else {
                self.registry.unbind(connection);
                outbox.to_all(
                    &meeting,
                    ServerEvent::ParticipantLeft {
                        participant_id: connection.to_string(),
                        participants: meeting.participant_list(),
                        spotlight: meeting.spotlight().map(str::to_string),
                    },
                );
            }
            was_host.then_some(started_at)
        };

        if let Some(started_at) = ended {
            self.end_meeting(&meeting_id, started_at);
        }
        self.flush(outbox);
        Ok(meeting_id)
    }

    fn end_meeting(&self, meeting_id: &str, started_at: DateTime<Utc>) {
        let cancelled = self.polls.teardown_meeting(meeting_id);
        let duration_secs = (Utc::now() - started_at).num_seconds();
        tracing::info!(%meeting_id, cancelled_polls = cancelled, duration_secs, "meeting ended");

        let storage = self.storage.clone();
        let meeting_id = meeting_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = storage.archive_meeting(&meeting_id).await {
                tracing::warn!(%meeting_id, error = %err, "failed to archive shared files");
            }
        });
    }

    // ----- connection setup -----

    fn participant_ready(&self, connection: &str) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            let peers: Vec<ConnectionId> = meeting
                .ready_participants()
                .into_iter()
                .filter(|id| id != connection)
                .collect();
            meeting.set_connection_state(connection, ConnectionState::Ready);

            // the newcomer offers, established peers answer
            for peer in peers {
                out.to(
                    connection,
                    ServerEvent::InitiateConnection {
                        target_id: peer.clone(),
                        should_create_offer: true,
                    },
                );
                out.to(
                    &peer,
                    ServerEvent::InitiateConnection {
                        target_id: connection.to_string(),
                        should_create_offer: false,
                    },
                );
            }
            Ok(())
        })
    }

    fn update_connection_state(
        &self,
        connection: &str,
        state: ConnectionState,
    ) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            meeting.set_connection_state(connection, state);
            out.to_all(
                meeting,
                ServerEvent::ParticipantsUpdated {
                    participants: meeting.participant_list(),
                },
            );
            Ok(())
        })
    }

    fn relay_signal(
        &self,
        connection: &str,
        target: &str,
        signal: Signal,
    ) -> Result<(), GatewayError> {
        self.relay.relay(connection, target, signal).map(|_| ())
    }

    // ----- spotlight -----

    fn spotlight_participant(&self, connection: &str, target: &str) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if !meeting.can_perform_host_action(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host or a co-host can spotlight participants",
                ));
            }
            if !meeting.spotlight_participant(target) {
                return Err(GatewayError::ParticipantNotFound);
            }
            out.to_all(meeting, spotlight_changed(meeting));
            Ok(())
        })
    }

    fn remove_spotlight(&self, connection: &str) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if !meeting.can_perform_host_action(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host or a co-host can change the spotlight",
                ));
            }
            if meeting.remove_spotlight() {
                out.to_all(meeting, spotlight_changed(meeting));
            }
            Ok(())
        })
    }

    fn audio_activity(&self, connection: &str, level: f64) -> Result<(), GatewayError> {
        let level = validate_audio_level(level)?;
        let threshold = self.settings.audio_spotlight_threshold;
        self.in_meeting(connection, |meeting, out| {
            if meeting.handle_audio_activity(connection, level, threshold) {
                out.to_all(meeting, spotlight_changed(meeting));
            }
            Ok(())
        })
    }

    // ----- moderation -----

    fn mute_participant(&self, connection: &str, target: &str) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if !meeting.can_perform_host_action(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host or a co-host can mute participants",
                ));
            }
            if !meeting.contains(target) {
                return Err(GatewayError::ParticipantNotFound);
            }
            if meeting.is_host(target) {
                return Err(GatewayError::NotPermitted("The host cannot be muted"));
            }

            meeting.set_muted(target, true);
            out.to(
                target,
                ServerEvent::ForceMuted {
                    by: connection.to_string(),
                },
            );
            out.to_all(
                meeting,
                ServerEvent::ParticipantsUpdated {
                    participants: meeting.participant_list(),
                },
            );
            Ok(())
        })
    }

    fn set_co_host(&self, connection: &str, target: &str, grant: bool) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if !meeting.can_make_co_host(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host can manage co-hosts",
                ));
            }
            if !meeting.contains(target) {
                return Err(GatewayError::ParticipantNotFound);
            }

            let changed = if grant {
                meeting.make_co_host(target)
            } else {
                meeting.remove_co_host(target)
            };
            if changed {
                out.to_all(
                    meeting,
                    ServerEvent::CoHostUpdated {
                        participant_id: target.to_string(),
                        is_co_host: grant,
                        participants: meeting.participant_list(),
                    },
                );
            }
            Ok(())
        })
    }

    fn kick_participant(&self, connection: &str, target: &str) -> Result<(), GatewayError> {
        let (meeting_id, shared) = self.registry.meeting_for(connection)?;
        let mut outbox = Outbox::default();
        {
            let mut meeting = shared.lock();
            ensure_running(&meeting)?;
            if !meeting.can_perform_host_action(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host or a co-host can remove participants",
                ));
            }
            if !meeting.contains(target) {
                return Err(GatewayError::ParticipantNotFound);
            }
            if target == connection {
                return Err(GatewayError::NotPermitted("Use leave-meeting to leave"));
            }
            if meeting.is_host(target) {
                return Err(GatewayError::NotPermitted("The host cannot be removed"));
            }
            if meeting.is_co_host(connection) && meeting.is_co_host(target) {
                return Err(GatewayError::NotPermitted(
                    "Co-hosts cannot remove other co-hosts",
                ));
            }

            meeting.remove_participant(target);
            self.registry.unbind(target);

            outbox.to(
                target,
                ServerEvent::Kicked {
                    meeting_id: meeting_id.clone(),
                    by: connection.to_string(),
                },
            );
            outbox.to_all(
                &meeting,
                ServerEvent::ParticipantLeft {
                    participant_id: target.to_string(),
                    participants: meeting.participant_list(),
                    spotlight: meeting.spotlight().map(str::to_string),
                },
            );
        }

        tracing::info!(%meeting_id, by = %connection, kicked = %target, "participant removed");
        self.flush(outbox);
        Ok(())
    }

    fn lower_participant_hand(&self, connection: &str, target: &str) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if !meeting.can_perform_host_action(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host or a co-host can lower hands",
                ));
            }
            if !meeting.contains(target) {
                return Err(GatewayError::ParticipantNotFound);
            }
            if meeting.lower_hand(target) {
                out.to_all(
                    meeting,
                    ServerEvent::HandLowered {
                        participant_id: target.to_string(),
                        participants: meeting.participant_list(),
                    },
                );
            }
            Ok(())
        })
    }

    fn toggle_meeting_lock(&self, connection: &str) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if !meeting.is_host(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host can lock or unlock the meeting",
                ));
            }
            if meeting.is_locked() {
                meeting.unlock();
            } else {
                meeting.lock();
            }
            out.to_all(
                meeting,
                ServerEvent::MeetingLockChanged {
                    is_locked: meeting.is_locked(),
                },
            );
            Ok(())
        })
    }

    fn update_permissions(
        &self,
        connection: &str,
        patch: &PermissionsPatch,
    ) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if !meeting.is_host(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host can change meeting permissions",
                ));
            }

            let muted = meeting.update_permissions(patch);
            out.to_all(
                meeting,
                ServerEvent::PermissionsUpdated {
                    permissions: meeting.permissions(),
                    participants: meeting.participant_list(),
                },
            );
            out.to_many(
                muted,
                ServerEvent::ForceMuted {
                    by: connection.to_string(),
                },
            );
            Ok(())
        })
    }

    // ----- self-service -----

    fn toggle_mic(&self, connection: &str, is_muted: bool) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            let may_unmute =
                meeting.permissions().allow_unmute || meeting.can_perform_host_action(connection);
            if !is_muted && !may_unmute {
                return Err(GatewayError::NotPermitted(
                    "The host has disabled unmuting",
                ));
            }
            if meeting.set_muted(connection, is_muted) {
                out.to_all(
                    meeting,
                    ServerEvent::ParticipantsUpdated {
                        participants: meeting.participant_list(),
                    },
                );
            }
            Ok(())
        })
    }

    fn toggle_camera(&self, connection: &str, is_camera_off: bool) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if meeting.set_camera_off(connection, is_camera_off) {
                out.to_all(
                    meeting,
                    ServerEvent::ParticipantsUpdated {
                        participants: meeting.participant_list(),
                    },
                );
            }
            Ok(())
        })
    }

    fn raise_hand(&self, connection: &str) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if !meeting.permissions().allow_hand_raising
                && !meeting.can_perform_host_action(connection)
            {
                return Err(GatewayError::NotPermitted(
                    "Hand raising is disabled in this meeting",
                ));
            }
            if meeting.raise_hand(connection) {
                out.to_all(
                    meeting,
                    ServerEvent::HandRaised {
                        participant_id: connection.to_string(),
                        participants: meeting.participant_list(),
                    },
                );
            }
            Ok(())
        })
    }

    fn lower_hand(&self, connection: &str) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if meeting.lower_hand(connection) {
                out.to_all(
                    meeting,
                    ServerEvent::HandLowered {
                        participant_id: connection.to_string(),
                        participants: meeting.participant_list(),
                    },
                );
            }
            Ok(())
        })
    }

    fn rename_participant(&self, connection: &str, new_name: &str) -> Result<(), GatewayError> {
        let name = validate_display_name(new_name)?;
        self.in_meeting(connection, |meeting, out| {
            if !meeting.permissions().allow_rename && !meeting.can_perform_host_action(connection)
            {
                return Err(GatewayError::NotPermitted(
                    "The host has disabled renaming",
                ));
            }
            if meeting.is_name_taken(&name, connection) {
                return Err(GatewayError::Conflict(format!(
                    "The name \"{name}\" is already taken"
                )));
            }

            let name = meeting.rename_participant(connection, &name)?;
            out.to_all(
                meeting,
                ServerEvent::ParticipantRenamed {
                    participant_id: connection.to_string(),
                    name,
                    participants: meeting.participant_list(),
                },
            );
            Ok(())
        })
    }

    fn start_screen_share(
        &self,
        connection: &str,
        stream_id: &str,
        has_computer_audio: bool,
    ) -> Result<(), GatewayError> {
        let stream_id = validate_stream_id(stream_id)?.to_string();
        self.in_meeting(connection, |meeting, out| {
            if !meeting.start_screen_share(connection, stream_id.clone(), has_computer_audio) {
                return Err(GatewayError::ParticipantNotFound);
            }
            out.to_all(
                meeting,
                ServerEvent::ScreenShareStarted {
                    participant_id: connection.to_string(),
                    stream_id,
                    has_computer_audio,
                    participants: meeting.participant_list(),
                },
            );
            Ok(())
        })
    }

    fn stop_screen_share(&self, connection: &str) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if meeting.stop_screen_share(connection) {
                out.to_all(
                    meeting,
                    ServerEvent::ScreenShareStopped {
                        participant_id: connection.to_string(),
                        participants: meeting.participant_list(),
                    },
                );
            }
            Ok(())
        })
    }

    // ----- chat and reactions -----

    fn chat_message(
        &self,
        connection: &str,
        text: &str,
        to: Option<&str>,
    ) -> Result<(), GatewayError> {
        let text = validate_chat_text(text)?;
        self.in_meeting(connection, |meeting, out| {
            if !meeting.permissions().chat_enabled && !meeting.can_perform_host_action(connection) {
                return Err(GatewayError::NotPermitted(
                    "Chat is disabled in this meeting",
                ));
            }
            let sender_name = meeting
                .participant(connection)
                .map(|p| p.name.clone())
                .ok_or(GatewayError::ParticipantNotFound)?;

            let recipients = match to {
                Some(target) if !meeting.contains(target) => {
                    return Err(GatewayError::ParticipantNotFound);
                },
                Some(target) if target == connection => vec![connection.to_string()],
                Some(target) => vec![connection.to_string(), target.to_string()],
                None => meeting.participant_ids(),
            };

            out.to_many(
                recipients,
                ServerEvent::ChatMessage {
                    id: Uuid::new_v4().to_string(),
                    sender_id: connection.to_string(),
                    sender_name,
                    text,
                    private_to: to.map(str::to_string),
                    sent_at: Utc::now(),
                },
            );
            Ok(())
        })
    }

    fn emoji_reaction(&self, connection: &str, emoji: &str) -> Result<(), GatewayError> {
        let emoji = validate_emoji(emoji)?.to_string();
        self.in_meeting(connection, |meeting, out| {
            if !meeting.permissions().emoji_reactions
                && !meeting.can_perform_host_action(connection)
            {
                return Err(GatewayError::NotPermitted(
                    "Reactions are disabled in this meeting",
                ));
            }
            out.to_all(
                meeting,
                ServerEvent::EmojiReaction {
                    participant_id: connection.to_string(),
                    emoji,
                },
            );
            Ok(())
        })
    }

    // ----- polls -----

    fn create_poll(
        &self,
        connection: &str,
        question: &str,
        options: &[String],
        duration_secs: Option<u64>,
    ) -> Result<(), GatewayError> {
        let (question, options) = validate_poll(question, options, duration_secs)?;
        let (meeting_id, shared) = self.registry.meeting_for(connection)?;
        let registry = self.registry.clone();
        let hub = self.hub.clone();
        let expiring_meeting = meeting_id.clone();

        // created under the meeting lock so a concurrent teardown sees the poll
        let (recipients, poll) = {
            let meeting = shared.lock();
            ensure_running(&meeting)?;
            if !meeting.can_perform_host_action(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host or a co-host can create polls",
                ));
            }
            let poll = self.polls.create(
                meeting_id,
                connection.to_string(),
                question,
                options,
                duration_secs.map(Duration::from_secs),
                move |poll| {
                    let event = ServerEvent::PollEnded { poll };
                    Self::broadcast_to_meeting(&registry, &hub, &expiring_meeting, &event);
                },
            );
            (meeting.participant_ids(), poll)
        };

        self.hub
            .send_many(&recipients, &ServerEvent::PollCreated { poll });
        Ok(())
    }

    fn vote_poll(
        &self,
        connection: &str,
        poll_id: &str,
        option_index: usize,
    ) -> Result<(), GatewayError> {
        let (meeting_id, _) = self.registry.meeting_for(connection)?;
        let poll = self
            .polls
            .vote(poll_id, &meeting_id, connection, option_index)?;
        Self::broadcast_to_meeting(
            &self.registry,
            &self.hub,
            &meeting_id,
            &ServerEvent::PollUpdated { poll },
        );
        Ok(())
    }

    fn end_poll(&self, connection: &str, poll_id: &str) -> Result<(), GatewayError> {
        let (meeting_id, shared) = self.registry.meeting_for(connection)?;
        {
            let meeting = shared.lock();
            ensure_running(&meeting)?;
            if !meeting.can_perform_host_action(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host or a co-host can end polls",
                ));
            }
        }

        if let Some(poll) = self.polls.end(poll_id, &meeting_id)? {
            Self::broadcast_to_meeting(
                &self.registry,
                &self.hub,
                &meeting_id,
                &ServerEvent::PollEnded { poll },
            );
        }
        Ok(())
    }

    // ----- recording -----

    fn set_recording_permission(
        &self,
        connection: &str,
        permission: RecordingPermission,
    ) -> Result<(), GatewayError> {
        let debounce = self.settings.recording_debounce();
        self.in_meeting(connection, |meeting, out| {
            if !meeting.is_host(connection) {
                return Err(GatewayError::Unauthorized(
                    "Only the host can change who may record",
                ));
            }
            if meeting.set_recording_permission(permission, Instant::now(), debounce)? {
                out.to_all(
                    meeting,
                    ServerEvent::RecordingPermissionChanged { permission },
                );
            }
            Ok(())
        })
    }

    fn set_recording(&self, connection: &str, start: bool) -> Result<(), GatewayError> {
        self.in_meeting(connection, |meeting, out| {
            if !start {
                if meeting.stop_recording(connection) {
                    out.to_all(
                        meeting,
                        ServerEvent::RecordingStopped {
                            participant_id: connection.to_string(),
                        },
                    );
                }
                return Ok(());
            }

            if !meeting.can_record(connection) {
                return Err(GatewayError::NotPermitted(
                    "Only the host can record this meeting",
                ));
            }
            if meeting.start_recording(connection) {
                out.to_all(
                    meeting,
                    ServerEvent::RecordingStarted {
                        participant_id: connection.to_string(),
                    },
                );
            }
            Ok(())
        })
    }

    // ----- shared files (HTTP) -----

    pub async fn list_files(&self, meeting_id: &str) -> Result<Vec<FileRecord>, AppError> {
        if self.registry.meeting(meeting_id).is_none() {
            return Err(AppError::MeetingNotFound);
        }
        self.storage.list_files(meeting_id).await
    }

    /// Record a file a participant uploaded elsewhere and announce it
    pub async fn share_file(
        &self,
        meeting_id: &str,
        request: ShareFileRequest,
    ) -> Result<FileRecord, AppError> {
        let shared = self
            .registry
            .meeting(meeting_id)
            .ok_or(AppError::MeetingNotFound)?;

        let uploader_name = {
            let meeting = shared.lock();
            let uploader = meeting
                .participant(&request.connection_id)
                .ok_or_else(|| {
                    AppError::Forbidden("Only participants can share files".to_string())
                })?;
            if !meeting.permissions().file_sharing
                && !meeting.can_perform_host_action(&request.connection_id)
            {
                return Err(AppError::Forbidden(
                    "File sharing is disabled in this meeting".to_string(),
                ));
            }
            uploader.name.clone()
        };

        validate_file_metadata(
            &request.file_name,
            request.size,
            &request.url,
            self.settings.max_file_size_bytes,
        )?;

        let record = FileRecord {
            id: Uuid::new_v4().to_string(),
            meeting_id: meeting_id.to_string(),
            file_name: request.file_name.trim().to_string(),
            size: request.size,
            mime_type: request.mime_type,
            url: request.url,
            uploaded_by: request.connection_id,
            uploader_name,
            uploaded_at: Utc::now(),
        };
        self.storage.add_file(&record).await?;

        counter!(FILE_SHARED).increment(1);
        tracing::info!(%meeting_id, file_id = %record.id, "file shared");
        Self::broadcast_to_meeting(
            &self.registry,
            &self.hub,
            meeting_id,
            &ServerEvent::FileShared {
                file: record.clone(),
            },
        );
        Ok(record)
    }

    /// Remove a shared file; allowed for its uploader and for hosts
    pub async fn remove_file(
        &self,
        meeting_id: &str,
        file_id: &str,
        connection: &str,
    ) -> Result<FileRecord, AppError> {
        let shared = self
            .registry
            .meeting(meeting_id)
            .ok_or(AppError::MeetingNotFound)?;
        let is_moderator = {
            let meeting = shared.lock();
            if !meeting.contains(connection) {
                return Err(AppError::Forbidden(
                    "Only participants can remove files".to_string(),
                ));
            }
            meeting.can_perform_host_action(connection)
        };

        let files = self.storage.list_files(meeting_id).await?;
        let record = files
            .iter()
            .find(|f| f.id == file_id)
            .ok_or_else(|| AppError::NotFound(format!("file {file_id}")))?;
        if record.uploaded_by != connection && !is_moderator {
            return Err(AppError::Forbidden(
                "Only the uploader or a host can remove this file".to_string(),
            ));
        }

        let removed = self
            .storage
            .remove_file(meeting_id, file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("file {file_id}")))?;

        Self::broadcast_to_meeting(
            &self.registry,
            &self.hub,
            meeting_id,
            &ServerEvent::FileRemoved {
                file_id: file_id.to_string(),
            },
        );
        Ok(removed)
    }
}

/// A meeting whose host is gone has ended, even if a handler still holds it
fn ensure_running(meeting: &Meeting) -> Result<(), GatewayError> {
    if meeting.is_host(meeting.host_id()) {
        Ok(())
    } else {
        Err(GatewayError::MeetingEnded(meeting.id().to_string()))
    }
}

fn spotlight_changed(meeting: &Meeting) -> ServerEvent {
    ServerEvent::SpotlightChanged {
        spotlight: meeting.spotlight().map(str::to_string),
        manual: meeting.is_manual_spotlight(),
        participants: meeting.participant_list(),
    }
}
