//! Speech-to-text bridge.
//!
//! Platform recognizers report results the way the Web Speech API does: each
//! event carries the full result list plus the index of the first changed
//! entry. [`Transcriber`] folds those events into the accumulated final
//! transcript (what gets submitted) and a throwaway interim caption.

use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("speech recognition is not supported on this platform")]
    Unsupported,
    #[error("speech recognition failed: {0}")]
    Platform(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    pub fn final_text(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    NotAllowed,
    NoSpeech,
    Aborted,
    Network,
    Other(String),
}

impl From<&str> for RecognitionErrorKind {
    fn from(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" => RecognitionErrorKind::NotAllowed,
            "no-speech" => RecognitionErrorKind::NoSpeech,
            "aborted" => RecognitionErrorKind::Aborted,
            "network" => RecognitionErrorKind::Network,
            other => RecognitionErrorKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Result {
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    Error(RecognitionErrorKind),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognizerOptions {
    pub continuous: bool,
    pub interim_results: bool,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: true,
        }
    }
}

pub trait SpeechRecognizer: Send {
    fn start(&mut self) -> Result<(), RecognitionError>;
    /// Platforms may fail when stopping an idle recognizer; callers ignore that.
    fn stop(&mut self) -> Result<(), RecognitionError>;
}

pub trait RecognitionService: Send + Sync {
    /// Builds a recognizer that reports on `events`, or `None` when the
    /// platform has no speech recognition at all.
    fn create(
        &self,
        options: RecognizerOptions,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Option<Box<dyn SpeechRecognizer>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub final_text: String,
    pub interim_text: String,
}

pub struct Transcriber {
    service: Arc<dyn RecognitionService>,
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    events: Option<mpsc::UnboundedReceiver<RecognitionEvent>>,
    transcript: Transcript,
    listening: bool,
}

impl Transcriber {
    pub fn new(service: Arc<dyn RecognitionService>) -> Self {
        Self {
            service,
            recognizer: None,
            events: None,
            transcript: Transcript::default(),
            listening: false,
        }
    }

    /// Creates a continuous, interim-enabled recognizer.
    ///
    /// Returns `false` when the platform cannot recognize speech. That is a
    /// capability gate, not something worth retrying.
    pub fn setup(&mut self) -> bool {
        self.stop();
        let (tx, rx) = mpsc::unbounded_channel();
        match self.service.create(RecognizerOptions::default(), tx) {
            Some(recognizer) => {
                self.recognizer = Some(recognizer);
                self.events = Some(rx);
                true
            }
            None => {
                tracing::warn!("Speech recognition is not available on this platform");
                self.recognizer = None;
                self.events = None;
                false
            }
        }
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Starts listening. Starting while already listening does nothing.
    pub fn start(&mut self) -> Result<(), RecognitionError> {
        if self.listening {
            return Ok(());
        }
        let recognizer = self
            .recognizer
            .as_mut()
            .ok_or(RecognitionError::Unsupported)?;
        recognizer.start()?;
        self.listening = true;
        self.transcript.interim_text.clear();
        Ok(())
    }

    /// Stops listening. Idempotent; the accumulated final text is kept.
    pub fn stop(&mut self) {
        if self.listening {
            if let Some(recognizer) = self.recognizer.as_mut() {
                if let Err(e) = recognizer.stop() {
                    tracing::debug!("Ignoring recognizer stop error: {e}");
                }
            }
            self.listening = false;
        }
        self.transcript.interim_text.clear();
    }

    /// Clears both the final and the interim text. Used between questions.
    pub fn reset(&mut self) {
        self.transcript = Transcript::default();
    }

    /// Applies every pending recognizer event and returns any errors reported.
    pub fn pump(&mut self) -> Vec<RecognitionErrorKind> {
        let mut pending = Vec::new();
        if let Some(rx) = self.events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                pending.push(event);
            }
        }

        let mut errors = Vec::new();
        for event in pending {
            if let Some(error) = self.apply(event) {
                errors.push(error);
            }
        }
        errors
    }

    /// Folds one event into the transcript.
    pub fn apply(&mut self, event: RecognitionEvent) -> Option<RecognitionErrorKind> {
        match event {
            RecognitionEvent::Result {
                result_index,
                results,
            } => {
                let mut finalized = String::new();
                let mut interim = String::new();
                for result in results.iter().skip(result_index) {
                    if result.is_final {
                        finalized.push_str(&result.transcript);
                    } else {
                        interim.push_str(&result.transcript);
                    }
                }
                if !finalized.is_empty() {
                    self.transcript.final_text.push_str(&finalized);
                }
                self.transcript.interim_text = interim;
                None
            }
            RecognitionEvent::Error(kind) => {
                tracing::error!("Speech recognition error: {kind:?}");
                Some(kind)
            }
            RecognitionEvent::End => {
                tracing::debug!("Speech recognition ended");
                None
            }
        }
    }

    pub fn final_transcript(&self) -> &str {
        &self.transcript.final_text
    }

    pub fn interim_transcript(&self) -> &str {
        &self.transcript.interim_text
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRecognitionService;

    fn transcriber() -> (Transcriber, Arc<FakeRecognitionService>) {
        let service = Arc::new(FakeRecognitionService::new());
        (Transcriber::new(service.clone()), service)
    }

    #[test]
    fn test_final_segments_accumulate_and_interim_is_replaced() {
        let (mut transcriber, service) = transcriber();
        assert!(transcriber.setup());
        transcriber.start().unwrap();

        service.emit(RecognitionEvent::Result {
            result_index: 0,
            results: vec![RecognitionResult::interim("I have")],
        });
        transcriber.pump();
        assert_eq!(transcriber.interim_transcript(), "I have");
        assert_eq!(transcriber.final_transcript(), "");

        service.emit(RecognitionEvent::Result {
            result_index: 0,
            results: vec![
                RecognitionResult::final_text("I have five years"),
                RecognitionResult::interim(" of"),
            ],
        });
        service.emit(RecognitionEvent::Result {
            result_index: 1,
            results: vec![
                RecognitionResult::final_text("I have five years"),
                RecognitionResult::final_text(" of experience"),
            ],
        });
        transcriber.pump();

        assert_eq!(
            transcriber.final_transcript(),
            "I have five years of experience"
        );
        assert_eq!(transcriber.interim_transcript(), "");
    }

    #[test]
    fn test_stop_twice_keeps_transcript() {
        let (mut transcriber, service) = transcriber();
        transcriber.setup();
        transcriber.start().unwrap();
        service.say("hello there");
        transcriber.pump();

        transcriber.stop();
        transcriber.stop();

        assert!(!transcriber.is_listening());
        assert_eq!(transcriber.final_transcript(), "hello there");
        assert_eq!(service.stop_calls(), 1);
    }

    #[test]
    fn test_stop_swallows_platform_errors() {
        let (mut transcriber, service) = transcriber();
        transcriber.setup();
        transcriber.start().unwrap();
        service.fail_next_stop();

        transcriber.stop();
        assert!(!transcriber.is_listening());
    }

    #[test]
    fn test_unsupported_platform_fails_setup() {
        let service = Arc::new(FakeRecognitionService::unsupported());
        let mut transcriber = Transcriber::new(service);

        assert!(!transcriber.setup());
        assert!(matches!(
            transcriber.start(),
            Err(RecognitionError::Unsupported)
        ));
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut transcriber, service) = transcriber();
        transcriber.setup();
        transcriber.start().unwrap();
        service.say("something");
        transcriber.pump();

        transcriber.reset();
        assert_eq!(transcriber.transcript(), &Transcript::default());
    }

    #[test]
    fn test_errors_are_reported_by_pump() {
        let (mut transcriber, service) = transcriber();
        transcriber.setup();
        transcriber.start().unwrap();
        service.emit(RecognitionEvent::Error(RecognitionErrorKind::from(
            "not-allowed",
        )));
        service.emit(RecognitionEvent::End);

        let errors = transcriber.pump();
        assert_eq!(errors, vec![RecognitionErrorKind::NotAllowed]);
    }

    #[test]
    fn test_error_codes_map_to_kinds() {
        assert_eq!(
            RecognitionErrorKind::from("no-speech"),
            RecognitionErrorKind::NoSpeech
        );
        assert_eq!(
            RecognitionErrorKind::from("audio-capture"),
            RecognitionErrorKind::Other("audio-capture".to_string())
        );
    }
}
