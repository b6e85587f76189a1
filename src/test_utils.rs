//! Recording adapters shared by the unit test modules.
//!
//! Each mock appends to a shared call log so tests can assert on the exact
//! order of adapter calls.

use crate::error::{Result, VoiceError};
use crate::stt::SpeechCapture;
use crate::tts::{SpeechOutput, SpeechSynthesizer, Utterance};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureCall {
    Start,
    Stop,
}

/// Capture adapter that records calls and never emits events by itself.
#[derive(Clone)]
pub struct RecordingCapture {
    supported: bool,
    calls: Arc<Mutex<Vec<CaptureCall>>>,
    next_start_error: Arc<Mutex<Option<VoiceError>>>,
}

impl RecordingCapture {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            calls: Arc::new(Mutex::new(Vec::new())),
            next_start_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn calls(&self) -> Vec<CaptureCall> {
        self.calls.lock().expect("lock capture calls").clone()
    }

    /// Make the next `start` fail with `error`.
    pub fn fail_next_start(&self, error: VoiceError) {
        *self.next_start_error.lock().expect("lock start error") = Some(error);
    }
}

impl SpeechCapture for RecordingCapture {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&mut self) -> Result<()> {
        self.calls
            .lock()
            .expect("lock capture calls")
            .push(CaptureCall::Start);
        match self.next_start_error.lock().expect("lock start error").take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn stop(&mut self) {
        self.calls
            .lock()
            .expect("lock capture calls")
            .push(CaptureCall::Stop);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputCall {
    Speak(String),
    CancelAll,
}

/// Speech output that records calls without any settle delay.
#[derive(Clone, Default)]
pub struct RecordingOutput {
    calls: Arc<Mutex<Vec<OutputCall>>>,
}

impl RecordingOutput {
    pub fn calls(&self) -> Vec<OutputCall> {
        self.calls.lock().expect("lock output calls").clone()
    }
}

impl SpeechOutput for RecordingOutput {
    fn speak(&self, text: &str) {
        self.calls
            .lock()
            .expect("lock output calls")
            .push(OutputCall::Speak(text.to_owned()));
    }

    fn cancel_all(&self) {
        self.calls
            .lock()
            .expect("lock output calls")
            .push(OutputCall::CancelAll);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthCall {
    Cancel,
    Utter(String),
}

/// Raw synthesizer that records calls.
#[derive(Clone, Default)]
pub struct RecordingSynthesizer {
    calls: Arc<Mutex<Vec<SynthCall>>>,
}

impl RecordingSynthesizer {
    pub fn calls(&self) -> Vec<SynthCall> {
        self.calls.lock().expect("lock synth calls").clone()
    }
}

impl SpeechSynthesizer for RecordingSynthesizer {
    fn cancel(&self) {
        self.calls
            .lock()
            .expect("lock synth calls")
            .push(SynthCall::Cancel);
    }

    fn utter(&self, utterance: &Utterance) {
        self.calls
            .lock()
            .expect("lock synth calls")
            .push(SynthCall::Utter(utterance.text.clone()));
    }
}
