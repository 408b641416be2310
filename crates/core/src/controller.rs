//! The interview state machine.
//!
//! [`InterviewController`] owns every bridge (media, transcription, narration)
//! and the gateway client, and is driven one input at a time by [`run`]. The
//! controller itself enforces which transitions are legal and that only one
//! network-bound transition is in flight; the presentation layer only renders
//! the [`Command`]s it emits.

use crate::auth::AuthContext;
use crate::capture::{CaptureError, MediaBackend, MediaBlob, MediaCapture, MediaStream, TrackKind};
use crate::countdown::{Countdown, DEFAULT_QUESTION_SECS, TickOutcome};
use crate::gateway::{AnswerSubmission, ApiError, QuestionRequest, SessionApi};
use crate::narration::{Narrator, SpeechSynthesizer, SynthesisError, VoicePreference};
use crate::summary::{CompletedTurn, InterviewSummary, Outcome};
use crate::transcription::{
    RecognitionError, RecognitionErrorKind, RecognitionService, Transcriber, Transcript,
};
use crate::{Command, Input, Notification};
use interview_types::{Analysis, Difficulty, Question, Session};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Time given to the recorder to deliver its last chunk after `stop`.
pub const ANSWER_FLUSH_GRACE: Duration = Duration::from_millis(300);

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    NotStarted,
    Running { answering: bool },
    Paused { answering: bool },
    Completed,
    Canceled,
}

impl ControllerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControllerState::Completed | ControllerState::Canceled)
    }

    /// Running or paused: a remote session exists and devices are held.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ControllerState::Running { .. } | ControllerState::Paused { .. }
        )
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::NotStarted => "not started",
            ControllerState::Running { answering: false } => "running",
            ControllerState::Running { answering: true } => "answering",
            ControllerState::Paused { .. } => "paused",
            ControllerState::Completed => "completed",
            ControllerState::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InterviewError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error("another operation is still in progress")]
    Busy,
    #[error("no active session")]
    NoActiveSession,
    #[error("cannot {op} while {state}")]
    InvalidTransition {
        op: &'static str,
        state: ControllerState,
    },
    #[error("not signed in")]
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterviewSettings {
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub description: String,
    pub focus_areas: Vec<String>,
    pub question_duration_secs: u32,
    /// Submit and move on automatically when the countdown runs out.
    pub auto_advance: bool,
    pub voice: VoicePreference,
    /// 0 to 100.
    pub volume: u8,
    pub video_enabled: bool,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            title: "Practice Interview".to_string(),
            category: "Software Engineering".to_string(),
            difficulty: Difficulty::Medium,
            description: String::new(),
            focus_areas: Vec::new(),
            question_duration_secs: DEFAULT_QUESTION_SECS,
            auto_advance: false,
            voice: VoicePreference::Female,
            volume: 50,
            video_enabled: true,
        }
    }
}

/// The platform capabilities the controller drives.
#[derive(Clone)]
pub struct Platform {
    pub media: Arc<dyn MediaBackend>,
    pub recognition: Arc<dyn RecognitionService>,
    pub synthesis: Arc<dyn SpeechSynthesizer>,
}

// A packaged answer that has not been accepted by the processing service yet.
#[derive(Debug, Clone)]
struct PendingAnswer {
    media: MediaBlob,
    transcript: String,
}

pub struct InterviewController {
    api: Arc<dyn SessionApi>,
    auth: Arc<AuthContext>,
    settings: InterviewSettings,
    capture: MediaCapture,
    transcriber: Transcriber,
    narrator: Narrator,
    countdown: Countdown,
    commands: mpsc::UnboundedSender<Command>,

    state: ControllerState,
    is_loading: bool,
    session: Option<Session>,
    current: Option<Question>,
    turns: Vec<CompletedTurn>,
    pending: Option<PendingAnswer>,
    recognition_supported: bool,
    muted: bool,
    video_enabled: bool,
    elapsed_secs: u64,
}

impl InterviewController {
    pub fn new(
        api: Arc<dyn SessionApi>,
        auth: Arc<AuthContext>,
        platform: Platform,
        settings: InterviewSettings,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        let countdown = Countdown::new(settings.question_duration_secs);
        let video_enabled = settings.video_enabled;
        Self {
            api,
            auth,
            capture: MediaCapture::new(platform.media),
            transcriber: Transcriber::new(platform.recognition),
            narrator: Narrator::new(platform.synthesis),
            countdown,
            commands,
            settings,
            state: ControllerState::NotStarted,
            is_loading: false,
            session: None,
            current: None,
            turns: Vec::new(),
            pending: None,
            recognition_supported: false,
            muted: false,
            video_enabled,
            elapsed_secs: 0,
        }
    }

    // --- Transitions ---

    /// Acquires devices, opens a remote session and asks the first question.
    pub async fn start(&mut self) -> Result<(), InterviewError> {
        if self.state != ControllerState::NotStarted {
            return Err(self.invalid("start"));
        }
        if !self.auth.is_authenticated() {
            tracing::warn!("No bearer credential, redirecting to sign-in");
            self.emit(Command::RedirectToLogin);
            return Err(InterviewError::Unauthenticated);
        }
        self.begin()?;
        let result = self.start_inner().await;
        self.is_loading = false;
        result
    }

    async fn start_inner(&mut self) -> Result<(), InterviewError> {
        // --- 1. Media ---
        if let Err(e) = self.capture.acquire(self.video_enabled).await {
            tracing::error!("Media error: {e}");
            self.notify(Notification::error(
                "Media Error",
                "Unable to access camera or microphone. Please check your permissions.",
            ));
            return Err(e.into());
        }

        // --- 2. Remote session ---
        let session = match self.api.start_session(&self.settings.title).await {
            Ok(session) if !session.id.trim().is_empty() => session,
            Ok(_) => {
                self.capture.release();
                let e = ApiError::Decode("session response has no id".to_string());
                tracing::error!("Error starting interview: {e}");
                self.notify(Notification::error(
                    "Error",
                    "Unable to start interview session. Please try again later.",
                ));
                return Err(e.into());
            }
            Err(e) => {
                self.capture.release();
                tracing::error!("Error starting interview: {e}");
                self.report_api_error(
                    &e,
                    "Unable to start interview session. Please try again later.",
                );
                return Err(e.into());
            }
        };
        tracing::info!("Interview session {} started", session.id);
        self.session = Some(session);

        // --- 3. Speech recognition capability ---
        self.recognition_supported = self.transcriber.setup();
        if !self.recognition_supported {
            self.notify(Notification::error(
                "Speech Recognition Unavailable",
                "Your platform doesn't support speech recognition. Answers will be recorded without a transcript.",
            ));
        }

        self.state = ControllerState::Running { answering: false };
        self.elapsed_secs = 0;

        // --- 4. First question ---
        self.fetch_question().await
    }

    /// Starts recording and transcribing an answer to the current question.
    pub async fn answer(&mut self) -> Result<(), InterviewError> {
        if self.state != (ControllerState::Running { answering: false }) || self.current.is_none()
        {
            return Err(self.invalid("answer"));
        }
        self.begin()?;
        let result = self.answer_inner();
        self.is_loading = false;
        result
    }

    fn answer_inner(&mut self) -> Result<(), InterviewError> {
        self.pending = None;
        self.transcriber.reset();

        if let Err(e) = self.capture.start_recording() {
            tracing::error!("Error starting media recorder: {e}");
            self.notify(Notification::error(
                "Recording Error",
                "Unable to start recording. Please check your permissions.",
            ));
            return Err(e.into());
        }
        if self.recognition_supported {
            if let Err(e) = self.transcriber.start() {
                tracing::error!("Error starting speech recognition: {e}");
            }
        }

        self.state = ControllerState::Running { answering: true };
        tracing::info!("Answering question {}", self.turns.len() + 1);
        Ok(())
    }

    /// Submits the recorded answer for feedback and moves to the next question.
    pub async fn next(&mut self) -> Result<(), InterviewError> {
        if !matches!(self.state, ControllerState::Running { .. }) {
            return Err(self.invalid("next"));
        }
        self.begin()?;
        let result = self.next_inner().await;
        self.is_loading = false;
        result
    }

    async fn next_inner(&mut self) -> Result<(), InterviewError> {
        let Some(session_id) = self.session.as_ref().map(|session| session.id.clone()) else {
            tracing::error!("Cannot advance without a session");
            self.notify(Notification::error(
                "Error",
                "No active session found. Please restart the interview.",
            ));
            return Err(InterviewError::NoActiveSession);
        };

        // The last question fetch failed; there is nothing to answer yet.
        let Some(question) = self.current.clone() else {
            return self.fetch_question().await;
        };

        if self.pending.is_none() {
            self.transcriber.stop();
            self.capture.stop_recording();
            self.state = ControllerState::Running { answering: false };

            tokio::time::sleep(ANSWER_FLUSH_GRACE).await;
            self.pump_transcriber();

            match self.capture.take_recording() {
                Ok(media) => {
                    self.pending = Some(PendingAnswer {
                        media,
                        transcript: self.transcriber.final_transcript().to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!("Error completing answer: {e}");
                    self.notify(Notification::error(
                        "Error",
                        "No recording data available. Press Answer and respond before moving on.",
                    ));
                    return Err(e.into());
                }
            }
        }
        let Some(pending) = self.pending.clone() else {
            return Err(CaptureError::NoRecordingData.into());
        };

        let submission = AnswerSubmission {
            media: pending.media,
            question: question.clone(),
            transcript: pending.transcript.clone(),
            session_id,
        };
        let analysis = match self.api.submit_answer(submission).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::error!("Error submitting answer: {e}");
                self.report_api_error(&e, "Failed to process your answer. Please try again.");
                return Err(e.into());
            }
        };

        let index = self.turns.len();
        tracing::info!(
            "Feedback received for question {} (confidence {})",
            index + 1,
            analysis.confidence_score
        );
        self.turns.push(CompletedTurn {
            question,
            answer: pending.transcript,
            analysis: analysis.clone(),
        });
        self.pending = None;
        self.current = None;
        self.emit(Command::AnalysisReady { index, analysis });

        self.fetch_question().await
    }

    /// Throws away the current attempt and reads the same question again.
    pub async fn retry(&mut self) -> Result<(), InterviewError> {
        if !matches!(self.state, ControllerState::Running { .. }) || self.current.is_none() {
            return Err(self.invalid("retry"));
        }
        self.begin()?;

        self.transcriber.stop();
        self.capture.discard_recording();
        self.transcriber.reset();
        self.pending = None;
        self.countdown.reset();
        self.countdown.start();
        self.state = ControllerState::Running { answering: false };
        self.narrate();
        tracing::info!("Retrying question {}", self.turns.len() + 1);

        self.is_loading = false;
        Ok(())
    }

    /// Silences everything without releasing the stream.
    pub async fn pause(&mut self) -> Result<(), InterviewError> {
        let ControllerState::Running { answering } = self.state else {
            return Err(self.invalid("pause"));
        };
        self.begin()?;

        self.capture.suspend_tracks();
        self.transcriber.stop();
        self.narrator.cancel_all();
        self.countdown.stop();
        self.capture.pause_recording();
        self.state = ControllerState::Paused { answering };
        tracing::info!("Interview paused");

        self.is_loading = false;
        Ok(())
    }

    pub async fn resume(&mut self) -> Result<(), InterviewError> {
        let ControllerState::Paused { answering } = self.state else {
            return Err(self.invalid("resume"));
        };
        self.begin()?;

        self.capture.restore_tracks();
        if answering && self.recognition_supported {
            if let Err(e) = self.transcriber.start() {
                tracing::error!("Error restarting speech recognition: {e}");
            }
        }
        self.capture.resume_recording();
        if self.current.is_some() {
            self.countdown.start();
        }
        self.state = ControllerState::Running { answering };
        tracing::info!("Interview resumed");

        self.is_loading = false;
        Ok(())
    }

    /// Mutes narration. Unmuting mid-question reads the question again.
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        tracing::info!("Narration {}", if self.muted { "muted" } else { "unmuted" });
        if self.narrator.is_speaking() {
            self.narrator.cancel_all();
            if !self.muted && self.state.is_live() {
                self.narrate();
            }
        }
    }

    pub fn toggle_video(&mut self) {
        self.video_enabled = !self.video_enabled;
        self.capture
            .toggle_track_enabled(TrackKind::Video, self.video_enabled);
        tracing::info!(
            "Camera {}",
            if self.video_enabled { "on" } else { "off" }
        );
    }

    /// Ends the session normally. Always accepted while the interview is live.
    pub async fn complete(&mut self) -> Result<(), InterviewError> {
        self.finish(Outcome::Completed).await
    }

    /// Abandons the session. Always accepted while the interview is live.
    pub async fn cancel(&mut self) -> Result<(), InterviewError> {
        self.finish(Outcome::Canceled).await
    }

    async fn finish(&mut self, outcome: Outcome) -> Result<(), InterviewError> {
        if !self.state.is_live() {
            let op = match outcome {
                Outcome::Completed => "complete",
                Outcome::Canceled => "cancel",
            };
            return Err(self.invalid(op));
        }

        self.teardown();

        let remote = match self.session.as_ref().map(|session| session.id.clone()) {
            Some(id) => match outcome {
                Outcome::Completed => self.api.end_session(&id).await,
                Outcome::Canceled => self.api.cancel_session(&id).await,
            },
            None => Ok(()),
        };

        self.state = match outcome {
            Outcome::Completed => ControllerState::Completed,
            Outcome::Canceled => ControllerState::Canceled,
        };
        self.is_loading = false;
        tracing::info!("Interview {}", self.state);

        match outcome {
            Outcome::Completed => self.notify(Notification::info(
                "Interview Complete",
                "Great job! Your interview has been completed successfully.",
            )),
            Outcome::Canceled => self.notify(Notification::info(
                "Interview Cancelled",
                "Your interview has been cancelled.",
            )),
        }
        if let Err(e) = &remote {
            tracing::error!("Error closing the remote session: {e}");
            self.report_api_error(e, "The session could not be closed on the server.");
        }

        self.emit(Command::Finished(self.build_summary(outcome)));
        remote.map_err(Into::into)
    }

    /// Leaves the interview: cancels a live session and releases every device.
    pub async fn shutdown(&mut self) {
        if self.state.is_live() {
            if let Err(e) = self.cancel().await {
                tracing::warn!("Cancel on shutdown failed: {e}");
            }
        } else {
            self.teardown();
        }
    }

    /// One second of interview time.
    ///
    /// Only counts while running. When the countdown expires and auto-advance
    /// is on, the answer is submitted exactly as a manual `next` would.
    pub async fn tick(&mut self) -> Result<(), InterviewError> {
        if !matches!(self.state, ControllerState::Running { .. }) {
            return Ok(());
        }
        self.elapsed_secs += 1;
        self.pump_transcriber();

        let outcome = self.countdown.tick();
        self.emit(Command::Progress {
            percent: self.countdown.progress(),
            elapsed_secs: self.elapsed_secs,
        });

        if outcome == TickOutcome::Expired && self.settings.auto_advance && !self.is_loading {
            tracing::info!("Time is up, moving to the next question");
            return self.next().await;
        }
        Ok(())
    }

    pub async fn handle(&mut self, input: Input) -> Result<(), InterviewError> {
        match input {
            Input::Start => self.start().await,
            Input::Answer => self.answer().await,
            Input::Next => self.next().await,
            Input::Retry => self.retry().await,
            Input::Pause => self.pause().await,
            Input::Resume => self.resume().await,
            Input::ToggleMute => {
                self.toggle_mute();
                Ok(())
            }
            Input::ToggleVideo => {
                self.toggle_video();
                Ok(())
            }
            Input::Complete => self.complete().await,
            Input::Cancel => self.cancel().await,
            Input::Shutdown => {
                self.shutdown().await;
                Ok(())
            }
        }
    }

    // --- Accessors ---

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn settings(&self) -> &InterviewSettings {
        &self.settings
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    /// Every question asked so far, in order, including the current one.
    pub fn questions(&self) -> Vec<Question> {
        self.turns
            .iter()
            .map(|turn| turn.question.clone())
            .chain(self.current.clone())
            .collect()
    }

    pub fn answers(&self) -> Vec<String> {
        self.turns.iter().map(|turn| turn.answer.clone()).collect()
    }

    pub fn analyses(&self) -> Vec<Analysis> {
        self.turns.iter().map(|turn| turn.analysis.clone()).collect()
    }

    pub fn turns(&self) -> &[CompletedTurn] {
        &self.turns
    }

    pub fn transcript(&self) -> &Transcript {
        self.transcriber.transcript()
    }

    pub fn media_stream(&self) -> Option<&MediaStream> {
        self.capture.stream()
    }

    pub fn progress(&self) -> f64 {
        self.countdown.progress()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_video_enabled(&self) -> bool {
        self.video_enabled
    }

    /// Available once the interview has reached a terminal state.
    pub fn summary(&self) -> Option<InterviewSummary> {
        match self.state {
            ControllerState::Completed => Some(self.build_summary(Outcome::Completed)),
            ControllerState::Canceled => Some(self.build_summary(Outcome::Canceled)),
            _ => None,
        }
    }

    // --- Helpers ---

    fn begin(&mut self) -> Result<(), InterviewError> {
        if self.is_loading {
            tracing::warn!("Rejected transition while another one is in flight");
            return Err(InterviewError::Busy);
        }
        self.is_loading = true;
        Ok(())
    }

    fn invalid(&self, op: &'static str) -> InterviewError {
        tracing::warn!("Cannot {op} while {}", self.state);
        InterviewError::InvalidTransition {
            op,
            state: self.state,
        }
    }

    async fn fetch_question(&mut self) -> Result<(), InterviewError> {
        let Some(session_id) = self.session.as_ref().map(|session| session.id.clone()) else {
            self.notify(Notification::error(
                "Error",
                "No active session found. Please restart the interview.",
            ));
            return Err(InterviewError::NoActiveSession);
        };
        let request = QuestionRequest {
            category: self.settings.category.clone(),
            difficulty: self.settings.difficulty,
            session_id,
            description: self.settings.description.clone(),
            focus_areas: self.settings.focus_areas.clone(),
        };

        match self.api.request_question(&request).await {
            Ok(question) => {
                let index = self.turns.len();
                tracing::info!("Question {}: {}", index + 1, question.question_text);
                self.current = Some(question.clone());
                self.transcriber.reset();
                self.countdown.reset();
                self.countdown.start();
                self.emit(Command::QuestionReady { index, question });
                self.narrate();
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error generating question: {e}");
                self.report_api_error(&e, "Failed to generate the next question. Please try again.");
                Err(e.into())
            }
        }
    }

    fn narrate(&mut self) {
        let Some(question) = self.current.as_ref() else {
            return;
        };
        let volume = if self.muted {
            0.0
        } else {
            f32::from(self.settings.volume.min(100)) / 100.0
        };
        if let Err(e) = self
            .narrator
            .speak(&question.question_text, self.settings.voice, volume)
        {
            tracing::error!("Speech synthesis error: {e}");
        }
    }

    fn pump_transcriber(&mut self) {
        for error in self.transcriber.pump() {
            if error == RecognitionErrorKind::NotAllowed {
                self.notify(Notification::error(
                    "Microphone Access Denied",
                    "Please allow microphone access to use the interview simulator.",
                ));
            }
        }
    }

    fn teardown(&mut self) {
        self.transcriber.stop();
        self.capture.release();
        self.narrator.cancel_all();
        self.countdown.stop();
        self.pending = None;
    }

    fn build_summary(&self, outcome: Outcome) -> InterviewSummary {
        InterviewSummary {
            session_id: self.session.as_ref().map(|session| session.id.clone()),
            outcome,
            elapsed_secs: self.elapsed_secs,
            questions: self.questions(),
            turns: self.turns.clone(),
        }
    }

    fn report_api_error(&self, error: &ApiError, description: &str) {
        if matches!(error, ApiError::Unauthenticated) {
            self.emit(Command::RedirectToLogin);
        }
        self.notify(Notification::error("Error", description));
    }

    fn notify(&self, notification: Notification) {
        self.emit(Command::Notify(notification));
    }

    fn emit(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Command receiver dropped");
        }
    }
}

impl Drop for InterviewController {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Drives `controller` until the interview ends or the input channel closes.
///
/// Inputs are handled one at a time, interleaved with a one-second tick. A
/// `Shutdown` input, or every sender going away, cancels a live session
/// before returning.
pub async fn run(
    mut controller: InterviewController,
    mut inputs: mpsc::Receiver<Input>,
) -> ControllerState {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            input = inputs.recv() => match input {
                Some(Input::Shutdown) | None => {
                    controller.shutdown().await;
                    break;
                }
                Some(input) => {
                    if let Err(e) = controller.handle(input).await {
                        tracing::warn!("{input:?} failed: {e}");
                    }
                }
            },
            _ = ticker.tick() => {
                if let Err(e) = controller.tick().await {
                    tracing::warn!("Tick failed: {e}");
                }
            }
        }
        if controller.state().is_terminal() {
            break;
        }
    }
    controller.state()
}
