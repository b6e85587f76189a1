//! Voice session state machine.
//!
//! The controller owns all session state and is only ever driven from one
//! task (see [`SessionRuntime`](crate::session::runtime::SessionRuntime)), so
//! inputs are applied strictly one at a time in arrival order. The only
//! suspension point it creates itself is the permission request, which runs
//! on a spawned task and comes back as [`SessionInput::PermissionResolved`].
//!
//! Adapter failures never escape: each one becomes a spoken assistant entry
//! and the session drops back to idle, ready for another try.

use crate::config::VoiceConfig;
use crate::conversation::{Conversation, Speaker};
use crate::error::VoiceError;
use crate::permissions::{MicrophonePermission, PermissionOutcome};
use crate::responder::ResponseGenerator;
use crate::runtime::SessionEvent;
use crate::session::messages::{SessionInput, SessionPhase, SessionSnapshot, StatusLine};
use crate::stt::{CaptureErrorKind, CaptureEvent, SpeechCapture};
use crate::tts::SpeechOutput;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Spoken when the platform has no speech recognizer.
pub const UNSUPPORTED_MESSAGE: &str =
    "Speech recognition is not supported in this browser. Please use Chrome or Edge.";

/// Spoken when the permission prompt is refused.
pub const PERMISSION_DENIED_MESSAGE: &str =
    "Microphone access denied. Please allow microphone access and try again.";

/// Spoken when the recognizer refuses to start.
pub const START_FAILED_MESSAGE: &str = "Unable to start voice recognition. Please try again.";

/// Prefix of every capture error message.
pub const CAPTURE_ERROR_PREFIX: &str = "Voice recognition error.";

/// Full assistant message for a capture error.
#[must_use]
pub fn capture_error_message(kind: CaptureErrorKind) -> String {
    format!("{CAPTURE_ERROR_PREFIX} {}", kind.user_hint())
}

/// Platform collaborators the controller drives.
pub struct SessionAdapters {
    pub capture: Box<dyn SpeechCapture>,
    pub output: Arc<dyn SpeechOutput>,
    pub responder: Box<dyn ResponseGenerator>,
    pub permission: Arc<dyn MicrophonePermission>,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    is_listening: bool,
    permission_granted: bool,
    is_supported: bool,
    has_greeted: bool,
    conversation: Conversation,
    interim_transcript: Option<String>,
}

/// Orchestrates capture, reply generation and speech for one voice session.
pub struct VoiceSessionController {
    greeting: String,
    apology: String,
    capture: Box<dyn SpeechCapture>,
    output: Arc<dyn SpeechOutput>,
    responder: Box<dyn ResponseGenerator>,
    permission: Arc<dyn MicrophonePermission>,
    inbox: mpsc::UnboundedSender<SessionInput>,
    events: broadcast::Sender<SessionEvent>,
    /// Identifies the permission request whose answer is still wanted.
    permission_ticket: u64,
    state: SessionState,
}

impl VoiceSessionController {
    /// Build a closed controller.
    ///
    /// Capture support is probed here, once. Permission answers are posted to
    /// `inbox`; state changes are published on `events`.
    pub fn new(
        config: &VoiceConfig,
        adapters: SessionAdapters,
        inbox: mpsc::UnboundedSender<SessionInput>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let is_supported = adapters.capture.is_supported();
        info!(is_supported, "voice session controller created");

        Self {
            greeting: config.session.greeting.clone(),
            apology: config.responses.apology.clone(),
            capture: adapters.capture,
            output: adapters.output,
            responder: adapters.responder,
            permission: adapters.permission,
            inbox,
            events,
            permission_ticket: 0,
            state: SessionState {
                phase: SessionPhase::Closed,
                is_listening: false,
                permission_granted: false,
                is_supported,
                has_greeted: false,
                conversation: Conversation::default(),
                interim_transcript: None,
            },
        }
    }

    /// Apply one input.
    pub fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::Open => self.open(),
            SessionInput::Close => self.close(),
            SessionInput::ToggleListening => self.toggle_listening(),
            SessionInput::Capture(event) => self.on_capture(event),
            SessionInput::PermissionResolved { ticket, outcome } => {
                self.on_permission(ticket, outcome);
            }
            SessionInput::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    pub fn open(&mut self) {
        if self.is_open() {
            debug!("open ignored: session already open");
            return;
        }
        info!("voice session opened");

        // The microphone is shared; make sure nothing from a previous owner
        // is still running.
        self.capture.stop();
        self.state.conversation.clear();
        self.set_phase(SessionPhase::Idle);

        if !self.state.has_greeted {
            let greeting = self.greeting.clone();
            self.say(&greeting);
            self.state.has_greeted = true;
        }
    }

    /// Safe in every state, including mid-permission-request.
    pub fn close(&mut self) {
        if !self.is_open() {
            debug!("close on closed session; cancelling output only");
            self.output.cancel_all();
            return;
        }
        info!(phase = ?self.state.phase, "voice session closing");

        // Any permission answer still in flight is now stale.
        self.permission_ticket += 1;
        if self.state.is_listening || self.state.phase == SessionPhase::Starting {
            self.capture.stop();
        }
        self.output.cancel_all();

        self.state.conversation.clear();
        self.publish(SessionEvent::ConversationCleared);
        self.state.has_greeted = false;
        self.set_interim(None);
        self.set_listening(false);
        self.set_phase(SessionPhase::Closed);
    }

    pub fn toggle_listening(&mut self) {
        match self.state.phase {
            SessionPhase::Closed => debug!("toggle ignored: session closed"),
            SessionPhase::Idle => {
                if !self.state.is_supported {
                    info!("toggle on unsupported platform");
                    self.say(UNSUPPORTED_MESSAGE);
                    return;
                }
                self.request_permission();
            }
            SessionPhase::AwaitingPermission => {
                info!("pending permission request abandoned by toggle");
                self.permission_ticket += 1;
                self.set_phase(SessionPhase::Idle);
            }
            SessionPhase::Starting | SessionPhase::Listening => {
                info!("listening stopped by toggle");
                self.capture.stop();
                self.set_interim(None);
                self.set_listening(false);
                self.set_phase(SessionPhase::Idle);
            }
        }
    }

    fn request_permission(&mut self) {
        self.permission_ticket += 1;
        let ticket = self.permission_ticket;
        self.set_phase(SessionPhase::AwaitingPermission);

        let permission = Arc::clone(&self.permission);
        let inbox = self.inbox.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let outcome = permission.request().await;
                    if inbox
                        .send(SessionInput::PermissionResolved { ticket, outcome })
                        .is_err()
                    {
                        debug!("session runtime gone before permission answer");
                    }
                });
            }
            Err(_) => {
                warn!("no async runtime for permission prompt; starting capture directly");
                self.on_permission(ticket, PermissionOutcome::Unavailable);
            }
        }
    }

    fn on_permission(&mut self, ticket: u64, outcome: PermissionOutcome) {
        if ticket != self.permission_ticket || self.state.phase != SessionPhase::AwaitingPermission
        {
            debug!(ticket, ?outcome, "stale permission answer ignored");
            return;
        }

        match outcome {
            PermissionOutcome::Granted => {
                self.state.permission_granted = true;
                self.start_capture();
            }
            PermissionOutcome::Unavailable => self.start_capture(),
            PermissionOutcome::Denied => {
                info!("microphone permission denied");
                self.state.permission_granted = false;
                self.set_phase(SessionPhase::Idle);
                self.say(PERMISSION_DENIED_MESSAGE);
            }
        }
    }

    fn start_capture(&mut self) {
        self.set_phase(SessionPhase::Starting);
        match self.capture.start() {
            Ok(()) => debug!("capture start requested"),
            Err(VoiceError::UnsupportedPlatform) => {
                warn!("capture reported unsupported platform on start");
                self.set_phase(SessionPhase::Idle);
                self.say(UNSUPPORTED_MESSAGE);
            }
            Err(VoiceError::PermissionDenied) => {
                warn!("capture refused microphone access on start");
                self.state.permission_granted = false;
                self.set_phase(SessionPhase::Idle);
                self.say(PERMISSION_DENIED_MESSAGE);
            }
            Err(e) => {
                warn!(error = %e, "capture failed to start");
                self.set_phase(SessionPhase::Idle);
                self.say(START_FAILED_MESSAGE);
            }
        }
    }

    fn on_capture(&mut self, event: CaptureEvent) {
        if !self.is_open() {
            if event == CaptureEvent::Started {
                debug!("capture started after close; stopping it");
                self.capture.stop();
            } else {
                debug!(?event, "capture event after close ignored");
            }
            return;
        }

        match event {
            CaptureEvent::Started => {
                info!("capture started");
                self.state.permission_granted = true;
                self.set_listening(true);
                self.set_phase(SessionPhase::Listening);
            }
            CaptureEvent::Result {
                transcript,
                is_final: false,
            } => {
                let text = transcript.trim();
                if !text.is_empty() {
                    self.set_interim(Some(text.to_owned()));
                }
            }
            CaptureEvent::Result {
                transcript,
                is_final: true,
            } => {
                // A final result ends this turn even on continuous recognizers.
                self.capture.stop();
                self.finish_capture();
                self.on_final_transcript(transcript.trim());
            }
            CaptureEvent::Error(kind) => {
                warn!(%kind, "capture error");
                self.finish_capture();
                if kind == CaptureErrorKind::NotAllowed {
                    self.state.permission_granted = false;
                }
                self.say(&capture_error_message(kind));
            }
            CaptureEvent::Ended => {
                debug!("capture ended");
                self.finish_capture();
            }
        }
    }

    fn on_final_transcript(&mut self, transcript: &str) {
        if transcript.is_empty() {
            info!("blank final transcript");
            let apology = self.apology.clone();
            self.say(&apology);
            return;
        }

        info!(transcript, "final transcript");
        self.append(Speaker::User, transcript);
        let reply = self.responder.respond(transcript);
        self.say(&reply);
    }

    fn finish_capture(&mut self) {
        self.set_interim(None);
        self.set_listening(false);
        if matches!(
            self.state.phase,
            SessionPhase::Starting | SessionPhase::Listening
        ) {
            self.set_phase(SessionPhase::Idle);
        }
    }

    /// Append an assistant entry and speak it.
    fn say(&mut self, text: &str) {
        self.append(Speaker::Assistant, text);
        self.output.speak(text);
    }

    fn append(&mut self, speaker: Speaker, text: &str) {
        let Some(entry) = self.state.conversation.push(speaker, text).cloned() else {
            return;
        };
        self.publish(SessionEvent::EntryAppended(entry));
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.state.phase != phase {
            debug!(from = ?self.state.phase, to = ?phase, "session phase change");
            self.state.phase = phase;
            self.publish(SessionEvent::PhaseChanged { phase });
        }
    }

    fn set_listening(&mut self, active: bool) {
        if self.state.is_listening != active {
            self.state.is_listening = active;
            self.publish(SessionEvent::ListeningChanged { active });
        }
    }

    fn set_interim(&mut self, text: Option<String>) {
        if self.state.interim_transcript != text {
            self.state.interim_transcript = text.clone();
            self.publish(SessionEvent::InterimTranscript { text });
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine; the host may not be watching.
        let _ = self.events.send(event);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.phase.is_open()
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state.is_listening
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.state.conversation
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = &self.state;
        SessionSnapshot {
            is_open: state.phase.is_open(),
            is_listening: state.is_listening,
            permission_granted: state.permission_granted,
            is_supported: state.is_supported,
            has_greeted: state.has_greeted,
            phase: state.phase,
            conversation: state.conversation.entries().to_vec(),
            interim_transcript: state.interim_transcript.clone(),
            status: StatusLine::derive(
                state.is_supported,
                state.permission_granted,
                state.is_listening,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::ResponseConfig;
    use crate::responder::{TemplateResponder, render};
    use crate::permissions::StaticPermission;
    use crate::test_utils::{CaptureCall, OutputCall, RecordingCapture, RecordingOutput};

    struct Harness {
        controller: VoiceSessionController,
        inbox: mpsc::UnboundedReceiver<SessionInput>,
        events: broadcast::Receiver<SessionEvent>,
        capture: RecordingCapture,
        output: RecordingOutput,
    }

    impl Harness {
        fn new(supported: bool, permission: PermissionOutcome) -> Self {
            let config = VoiceConfig::default();
            let capture = RecordingCapture::new(supported);
            let output = RecordingOutput::default();
            let (tx, inbox) = mpsc::unbounded_channel();
            let (events_tx, events) = broadcast::channel(256);
            let adapters = SessionAdapters {
                capture: Box::new(capture.clone()),
                output: Arc::new(output.clone()),
                responder: Box::new(TemplateResponder::seeded(&config.responses, 1).unwrap()),
                permission: Arc::new(StaticPermission(permission)),
            };
            Self {
                controller: VoiceSessionController::new(&config, adapters, tx, events_tx),
                inbox,
                events,
                capture,
                output,
            }
        }

        /// Feed queued permission answers back into the controller.
        async fn pump(&mut self) {
            let input = self.inbox.recv().await.expect("queued input");
            self.controller.handle(input);
        }

        fn capture(&mut self, event: CaptureEvent) {
            self.controller.handle(SessionInput::Capture(event));
        }

        /// Open, toggle, grant and start: ends in Listening.
        async fn listening(&mut self) {
            self.controller.open();
            self.controller.toggle_listening();
            self.pump().await;
            self.capture(CaptureEvent::Started);
            assert!(self.controller.is_listening());
        }

        fn entries(&self) -> Vec<(Speaker, String)> {
            self.controller
                .conversation()
                .entries()
                .iter()
                .map(|e| (e.speaker(), e.text().to_owned()))
                .collect()
        }
    }

    fn known_replies(utterance: &str) -> Vec<String> {
        ResponseConfig::default()
            .templates
            .iter()
            .map(|t| render(t, utterance))
            .collect()
    }

    #[test]
    fn open_greets_once() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        let greeting = VoiceConfig::default().session.greeting;

        h.controller.open();
        assert_eq!(h.entries(), vec![(Speaker::Assistant, greeting.clone())]);
        assert!(h.controller.snapshot().has_greeted);
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert_eq!(h.output.calls(), vec![OutputCall::Speak(greeting.clone())]);

        h.controller.open();
        assert_eq!(h.controller.conversation().len(), 1);
        assert_eq!(h.output.calls().len(), 1);
    }

    #[test]
    fn reopen_greets_again() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.controller.open();
        h.controller.close();
        h.controller.open();
        assert_eq!(h.controller.conversation().len(), 1);
        assert!(h.controller.snapshot().has_greeted);
    }

    #[tokio::test]
    async fn full_exchange_scenario() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.controller.open();

        h.controller.toggle_listening();
        assert_eq!(h.controller.phase(), SessionPhase::AwaitingPermission);
        assert!(!h.controller.is_listening());

        h.pump().await;
        assert_eq!(h.controller.phase(), SessionPhase::Starting);
        assert!(h.capture.calls().contains(&CaptureCall::Start));
        assert!(!h.controller.is_listening());

        h.capture(CaptureEvent::Started);
        assert!(h.controller.is_listening());
        assert!(h.controller.snapshot().permission_granted);

        h.capture(CaptureEvent::Result {
            transcript: "hello".to_owned(),
            is_final: true,
        });
        let entries = h.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1], (Speaker::User, "hello".to_owned()));
        assert_eq!(entries[2].0, Speaker::Assistant);
        assert!(known_replies("hello").contains(&entries[2].1));
        assert!(!h.controller.is_listening());
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert_eq!(
            h.output.calls().last(),
            Some(&OutputCall::Speak(entries[2].1.clone()))
        );

        h.controller.close();
        let snapshot = h.controller.snapshot();
        assert!(snapshot.conversation.is_empty());
        assert!(!snapshot.has_greeted);
        assert!(!snapshot.is_listening);
        assert!(!snapshot.is_open);
    }

    #[tokio::test]
    async fn final_transcript_is_trimmed() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.listening().await;
        h.capture(CaptureEvent::Result {
            transcript: "  pricing plans \n".to_owned(),
            is_final: true,
        });
        assert_eq!(h.entries()[1], (Speaker::User, "pricing plans".to_owned()));
        assert!(h.entries()[2].1.contains("pricing plans"));
    }

    #[tokio::test]
    async fn blank_final_transcript_apologises_without_reply() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.listening().await;
        h.capture(CaptureEvent::Result {
            transcript: "   ".to_owned(),
            is_final: true,
        });

        let entries = h.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1],
            (Speaker::Assistant, ResponseConfig::default().apology)
        );
        assert!(!h.controller.is_listening());
    }

    #[tokio::test]
    async fn interim_results_do_not_trigger_reply() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.listening().await;
        h.capture(CaptureEvent::Result {
            transcript: "hel".to_owned(),
            is_final: false,
        });

        assert_eq!(h.controller.conversation().len(), 1);
        assert!(h.controller.is_listening());
        assert_eq!(
            h.controller.snapshot().interim_transcript.as_deref(),
            Some("hel")
        );

        h.capture(CaptureEvent::Result {
            transcript: "hello".to_owned(),
            is_final: true,
        });
        assert_eq!(h.controller.snapshot().interim_transcript, None);
    }

    #[test]
    fn unsupported_platform_reports_once_per_toggle() {
        let mut h = Harness::new(false, PermissionOutcome::Granted);
        h.controller.open();
        h.controller.toggle_listening();

        let entries = h.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1],
            (Speaker::Assistant, UNSUPPORTED_MESSAGE.to_owned())
        );
        assert!(entries[1].1.contains("not supported"));
        assert!(!h.controller.is_listening());
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert!(!h.capture.calls().contains(&CaptureCall::Start));
        assert_eq!(
            h.output.calls().last(),
            Some(&OutputCall::Speak(UNSUPPORTED_MESSAGE.to_owned()))
        );
    }

    #[tokio::test]
    async fn not_allowed_error_revokes_permission() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.listening().await;
        h.capture(CaptureEvent::Error(CaptureErrorKind::NotAllowed));

        let snapshot = h.controller.snapshot();
        assert!(!snapshot.permission_granted);
        assert!(!snapshot.is_listening);
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert_eq!(snapshot.conversation.len(), 2);
        let last = snapshot.conversation.last().unwrap();
        assert_eq!(last.speaker(), Speaker::Assistant);
        assert!(last.text().contains("allow microphone access"));
    }

    #[tokio::test]
    async fn every_error_kind_is_reported_and_recoverable() {
        for kind in [
            CaptureErrorKind::NoSpeech,
            CaptureErrorKind::AudioCaptureFailure,
            CaptureErrorKind::NetworkFailure,
            CaptureErrorKind::Aborted,
            CaptureErrorKind::Other,
        ] {
            let mut h = Harness::new(true, PermissionOutcome::Granted);
            h.listening().await;
            h.capture(CaptureEvent::Error(kind));

            assert_eq!(
                h.entries().last().unwrap(),
                &(Speaker::Assistant, capture_error_message(kind))
            );
            assert!(h.controller.snapshot().permission_granted);
            assert!(!h.controller.is_listening());

            // Retry works after any recoverable error.
            h.controller.toggle_listening();
            assert_eq!(h.controller.phase(), SessionPhase::AwaitingPermission);
        }
    }

    #[tokio::test]
    async fn permission_denied_reports_and_stays_idle() {
        let mut h = Harness::new(true, PermissionOutcome::Denied);
        h.controller.open();
        h.controller.toggle_listening();
        h.pump().await;

        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert!(!h.capture.calls().contains(&CaptureCall::Start));
        assert!(!h.controller.snapshot().permission_granted);
        assert_eq!(
            h.entries().last().unwrap(),
            &(Speaker::Assistant, PERMISSION_DENIED_MESSAGE.to_owned())
        );
    }

    #[tokio::test]
    async fn unavailable_permission_api_starts_capture_directly() {
        let mut h = Harness::new(true, PermissionOutcome::Unavailable);
        h.controller.open();
        h.controller.toggle_listening();
        h.pump().await;

        assert_eq!(h.controller.phase(), SessionPhase::Starting);
        assert!(h.capture.calls().contains(&CaptureCall::Start));
        assert!(!h.controller.snapshot().permission_granted);
    }

    #[tokio::test]
    async fn capture_start_failure_is_reported() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.capture.fail_next_start(VoiceError::Capture("busy".into()));
        h.controller.open();
        h.controller.toggle_listening();
        h.pump().await;

        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert_eq!(
            h.entries().last().unwrap(),
            &(Speaker::Assistant, START_FAILED_MESSAGE.to_owned())
        );
    }

    #[tokio::test]
    async fn capture_start_unsupported_uses_unsupported_message() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.capture.fail_next_start(VoiceError::UnsupportedPlatform);
        h.controller.open();
        h.controller.toggle_listening();
        h.pump().await;

        assert_eq!(
            h.entries().last().unwrap(),
            &(Speaker::Assistant, UNSUPPORTED_MESSAGE.to_owned())
        );
    }

    #[tokio::test]
    async fn capture_start_refused_clears_permission() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.capture.fail_next_start(VoiceError::PermissionDenied);
        h.controller.open();
        h.controller.toggle_listening();
        h.pump().await;

        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert!(!h.controller.snapshot().permission_granted);
        assert_eq!(
            h.entries().last().unwrap(),
            &(Speaker::Assistant, PERMISSION_DENIED_MESSAGE.to_owned())
        );
    }

    #[tokio::test]
    async fn toggle_while_listening_stops_capture() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.listening().await;
        h.controller.toggle_listening();

        assert!(!h.controller.is_listening());
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert_eq!(h.capture.calls().last(), Some(&CaptureCall::Stop));
        assert_eq!(h.controller.conversation().len(), 1);
    }

    #[tokio::test]
    async fn result_after_manual_stop_is_still_answered() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.listening().await;
        h.controller.toggle_listening();
        h.capture(CaptureEvent::Result {
            transcript: "late words".to_owned(),
            is_final: true,
        });
        assert_eq!(h.entries()[1], (Speaker::User, "late words".to_owned()));
        assert_eq!(h.controller.conversation().len(), 3);
    }

    #[tokio::test]
    async fn end_event_forces_listening_false() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.listening().await;
        h.capture(CaptureEvent::Ended);

        assert!(!h.controller.is_listening());
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert_eq!(h.controller.conversation().len(), 1);
    }

    #[tokio::test]
    async fn close_while_listening_stops_and_resets() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.listening().await;
        h.controller.close();

        assert_eq!(h.capture.calls().last(), Some(&CaptureCall::Stop));
        assert_eq!(h.output.calls().last(), Some(&OutputCall::CancelAll));
        let snapshot = h.controller.snapshot();
        assert!(!snapshot.is_listening);
        assert!(!snapshot.has_greeted);
        assert!(snapshot.conversation.is_empty());
        assert_eq!(snapshot.phase, SessionPhase::Closed);
    }

    #[tokio::test]
    async fn permission_answer_after_close_is_ignored() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.controller.open();
        h.controller.toggle_listening();
        h.controller.close();
        h.pump().await;

        assert_eq!(h.controller.phase(), SessionPhase::Closed);
        assert!(!h.capture.calls().contains(&CaptureCall::Start));
    }

    #[tokio::test]
    async fn permission_answer_after_reopen_is_ignored() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.controller.open();
        h.controller.toggle_listening();
        h.controller.close();
        h.controller.open();
        h.pump().await;

        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert!(!h.capture.calls().contains(&CaptureCall::Start));
    }

    #[tokio::test]
    async fn toggle_while_awaiting_permission_cancels_request() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.controller.open();
        h.controller.toggle_listening();
        h.controller.toggle_listening();
        assert_eq!(h.controller.phase(), SessionPhase::Idle);

        h.pump().await;
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert!(!h.capture.calls().contains(&CaptureCall::Start));
    }

    #[test]
    fn late_capture_events_after_close_are_ignored() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.controller.open();
        h.controller.close();

        h.capture(CaptureEvent::Result {
            transcript: "ghost".to_owned(),
            is_final: true,
        });
        h.capture(CaptureEvent::Error(CaptureErrorKind::NetworkFailure));
        assert!(h.controller.conversation().is_empty());

        h.capture(CaptureEvent::Started);
        assert!(!h.controller.is_listening());
        assert_eq!(h.capture.calls().last(), Some(&CaptureCall::Stop));
    }

    #[test]
    fn close_is_safe_when_already_closed() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.controller.close();
        h.controller.close();
        let snapshot = h.controller.snapshot();
        assert!(!snapshot.is_open);
        assert!(snapshot.conversation.is_empty());
        assert_eq!(
            h.output.calls(),
            vec![OutputCall::CancelAll, OutputCall::CancelAll]
        );
    }

    #[test]
    fn toggle_on_closed_session_is_ignored() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.controller.toggle_listening();
        assert_eq!(h.controller.phase(), SessionPhase::Closed);
        assert!(h.controller.conversation().is_empty());
    }

    #[tokio::test]
    async fn listening_tracks_only_capture_events() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.controller.open();
        h.controller.toggle_listening();
        h.pump().await;
        assert!(!h.controller.is_listening(), "start request alone is not listening");

        h.capture(CaptureEvent::Started);
        assert!(h.controller.is_listening());
        h.capture(CaptureEvent::Result {
            transcript: "partial".to_owned(),
            is_final: false,
        });
        assert!(h.controller.is_listening());
        h.capture(CaptureEvent::Error(CaptureErrorKind::Aborted));
        assert!(!h.controller.is_listening());

        // A recognizer that starts on its own is still believed.
        h.capture(CaptureEvent::Started);
        assert!(h.controller.is_listening());
    }

    #[tokio::test]
    async fn events_are_published_in_order() {
        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.listening().await;
        h.capture(CaptureEvent::Result {
            transcript: "hello".to_owned(),
            is_final: true,
        });

        let mut appended = Vec::new();
        let mut listening = Vec::new();
        while let Ok(event) = h.events.try_recv() {
            match event {
                SessionEvent::EntryAppended(entry) => appended.push(entry.speaker()),
                SessionEvent::ListeningChanged { active } => listening.push(active),
                _ => {}
            }
        }
        assert_eq!(
            appended,
            vec![Speaker::Assistant, Speaker::User, Speaker::Assistant]
        );
        assert_eq!(listening, vec![true, false]);
    }

    #[test]
    fn status_line_follows_state() {
        let mut h = Harness::new(false, PermissionOutcome::Granted);
        h.controller.open();
        assert_eq!(
            h.controller.snapshot().status.headline,
            "Speech recognition not supported"
        );

        let mut h = Harness::new(true, PermissionOutcome::Granted);
        h.controller.open();
        assert_eq!(
            h.controller.snapshot().status.headline,
            "Click to enable microphone"
        );
    }
}
