//! In-memory stand-ins for the platform bridges, shared by the unit tests.

use crate::capture::{
    CaptureError, MediaBackend, MediaConstraints, MediaRecorder, MediaStream, MediaTrack,
    RecorderState, TrackKind,
};
use crate::narration::{SpeechSynthesizer, SynthesisError, Utterance, Voice};
use crate::transcription::{
    RecognitionError, RecognitionEvent, RecognitionResult, RecognitionService, RecognizerOptions,
    SpeechRecognizer,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// --- Media ---

#[derive(Default)]
struct MediaState {
    sender: Option<mpsc::UnboundedSender<Bytes>>,
    pauses: usize,
    resumes: usize,
    acquisitions: usize,
}

pub struct FakeMediaBackend {
    state: Arc<Mutex<MediaState>>,
    deny_permission: bool,
    final_chunk: bool,
    streams: AtomicUsize,
}

impl FakeMediaBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            deny_permission: false,
            final_chunk: true,
            streams: AtomicUsize::new(0),
        }
    }

    /// The recorder delivers nothing on stop, so only emitted chunks count.
    pub fn without_final_chunk(mut self) -> Self {
        self.final_chunk = false;
        self
    }

    pub fn denying_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    /// Pushes a chunk from the active recorder, if any.
    pub fn emit_chunk(&self, data: &[u8]) {
        let state = self.state.lock().unwrap();
        if let Some(sender) = state.sender.as_ref() {
            let _ = sender.send(Bytes::copy_from_slice(data));
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.state.lock().unwrap().acquisitions
    }

    pub fn recorder_pauses(&self) -> usize {
        self.state.lock().unwrap().pauses
    }

    pub fn recorder_resumes(&self) -> usize {
        self.state.lock().unwrap().resumes
    }
}

#[async_trait]
impl MediaBackend for FakeMediaBackend {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if self.deny_permission {
            return Err(CaptureError::PermissionDenied);
        }
        self.state.lock().unwrap().acquisitions += 1;
        let n = self.streams.fetch_add(1, Ordering::SeqCst);
        let mut tracks = vec![MediaTrack::new(format!("audio-{n}"), TrackKind::Audio)];
        if constraints.video.is_some() {
            tracks.push(MediaTrack::new(format!("video-{n}"), TrackKind::Video));
        }
        Ok(MediaStream::new(format!("stream-{n}"), tracks))
    }

    fn create_recorder(
        &self,
        _stream: &MediaStream,
    ) -> Result<Box<dyn MediaRecorder>, CaptureError> {
        Ok(Box::new(FakeRecorder {
            state: self.state.clone(),
            final_chunk: self.final_chunk,
            recorder_state: RecorderState::Inactive,
        }))
    }
}

struct FakeRecorder {
    state: Arc<Mutex<MediaState>>,
    final_chunk: bool,
    recorder_state: RecorderState,
}

impl MediaRecorder for FakeRecorder {
    fn start(&mut self, chunks: mpsc::UnboundedSender<Bytes>) -> Result<(), CaptureError> {
        self.state.lock().unwrap().sender = Some(chunks);
        self.recorder_state = RecorderState::Recording;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        self.state.lock().unwrap().pauses += 1;
        self.recorder_state = RecorderState::Paused;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        self.state.lock().unwrap().resumes += 1;
        self.recorder_state = RecorderState::Recording;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let mut state = self.state.lock().unwrap();
        if let Some(sender) = state.sender.take() {
            if self.final_chunk {
                let _ = sender.send(Bytes::from_static(b"final"));
            }
        }
        self.recorder_state = RecorderState::Inactive;
        Ok(())
    }

    fn state(&self) -> RecorderState {
        self.recorder_state
    }
}

// --- Recognition ---

#[derive(Default)]
struct RecognitionState {
    sender: Option<mpsc::UnboundedSender<RecognitionEvent>>,
    listening: bool,
    start_calls: usize,
    stop_calls: usize,
    fail_next_stop: bool,
}

pub struct FakeRecognitionService {
    supported: bool,
    state: Arc<Mutex<RecognitionState>>,
}

impl FakeRecognitionService {
    pub fn new() -> Self {
        Self {
            supported: true,
            state: Arc::default(),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            state: Arc::default(),
        }
    }

    pub fn emit(&self, event: RecognitionEvent) {
        let state = self.state.lock().unwrap();
        if let Some(sender) = state.sender.as_ref() {
            let _ = sender.send(event);
        }
    }

    /// Emits `text` as a single finalized segment.
    pub fn say(&self, text: &str) {
        self.emit(RecognitionEvent::Result {
            result_index: 0,
            results: vec![RecognitionResult::final_text(text)],
        });
    }

    pub fn is_listening(&self) -> bool {
        self.state.lock().unwrap().listening
    }

    pub fn start_calls(&self) -> usize {
        self.state.lock().unwrap().start_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.state.lock().unwrap().stop_calls
    }

    pub fn fail_next_stop(&self) {
        self.state.lock().unwrap().fail_next_stop = true;
    }
}

impl RecognitionService for FakeRecognitionService {
    fn create(
        &self,
        _options: RecognizerOptions,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Option<Box<dyn SpeechRecognizer>> {
        if !self.supported {
            return None;
        }
        self.state.lock().unwrap().sender = Some(events);
        Some(Box::new(FakeRecognizer {
            state: self.state.clone(),
        }))
    }
}

struct FakeRecognizer {
    state: Arc<Mutex<RecognitionState>>,
}

impl SpeechRecognizer for FakeRecognizer {
    fn start(&mut self) -> Result<(), RecognitionError> {
        let mut state = self.state.lock().unwrap();
        state.start_calls += 1;
        state.listening = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecognitionError> {
        let mut state = self.state.lock().unwrap();
        state.stop_calls += 1;
        state.listening = false;
        if std::mem::take(&mut state.fail_next_stop) {
            return Err(RecognitionError::Platform(
                "InvalidStateError: recognition has already stopped".to_string(),
            ));
        }
        Ok(())
    }
}

// --- Synthesis ---

#[derive(Default)]
struct SynthState {
    voices: Vec<Voice>,
    spoken: Vec<Utterance>,
    speaking: bool,
    cancels: usize,
    resumes: usize,
}

/// Starts "speaking" on every utterance and never finishes on its own.
#[derive(Default)]
pub struct FakeSynthesizer {
    state: Mutex<SynthState>,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voices(voices: Vec<Voice>) -> Self {
        let synth = Self::default();
        synth.state.lock().unwrap().voices = voices;
        synth
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.state.lock().unwrap().spoken.clone()
    }

    pub fn current_text(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .spoken
            .last()
            .map(|utterance| utterance.text.clone())
    }

    pub fn cancel_count(&self) -> usize {
        self.state.lock().unwrap().cancels
    }

    /// Number of pause/resume keep-alive nudges.
    pub fn nudge_count(&self) -> usize {
        self.state.lock().unwrap().resumes
    }

    pub fn finish_speaking(&self) {
        self.state.lock().unwrap().speaking = false;
    }
}

impl SpeechSynthesizer for FakeSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.state.lock().unwrap().voices.clone()
    }

    fn speak(&self, utterance: Utterance) -> Result<(), SynthesisError> {
        let mut state = self.state.lock().unwrap();
        state.spoken.push(utterance);
        state.speaking = true;
        Ok(())
    }

    fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        state.cancels += 1;
        state.speaking = false;
    }

    fn pause(&self) {}

    fn resume(&self) {
        self.state.lock().unwrap().resumes += 1;
    }

    fn is_speaking(&self) -> bool {
        self.state.lock().unwrap().speaking
    }
}
