//! Terminal stand-ins for the browser's speech engines, plus the line
//! protocol and rendering used by the practice binary.

use interview_core::narration::{SpeechSynthesizer, SynthesisError, Utterance, Voice};
use interview_core::summary::{InterviewSummary, Outcome};
use interview_core::transcription::{
    RecognitionError, RecognitionEvent, RecognitionResult, RecognitionService, RecognizerOptions,
    SpeechRecognizer,
};
use interview_core::{Command, Input, Severity};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub const HELP: &str = "\
Commands:
  /start     begin the interview
  /answer    start answering the current question
  /next      submit the answer and get the next question
  /retry     discard the answer and try again
  /pause     pause the interview
  /resume    resume the interview
  /mute      toggle question narration
  /video     toggle the camera
  /complete  finish and show the summary
  /cancel    abandon the interview
  /quit      leave (cancels a running interview)
Anything else you type while answering becomes part of your answer.";

/// What one line of terminal input means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Input(Input),
    Speech(String),
    Help,
    Unknown(String),
    Empty,
}

pub fn parse_line(line: &str) -> ConsoleLine {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleLine::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ConsoleLine::Speech(line.to_string());
    };
    let input = match command.to_ascii_lowercase().as_str() {
        "start" => Input::Start,
        "answer" => Input::Answer,
        "next" => Input::Next,
        "retry" => Input::Retry,
        "pause" => Input::Pause,
        "resume" => Input::Resume,
        "mute" => Input::ToggleMute,
        "video" => Input::ToggleVideo,
        "complete" => Input::Complete,
        "cancel" => Input::Cancel,
        "quit" | "exit" => Input::Shutdown,
        "help" | "?" => return ConsoleLine::Help,
        _ => return ConsoleLine::Unknown(line.to_string()),
    };
    ConsoleLine::Input(input)
}

// --- Speech recognition ---

#[derive(Debug, Default)]
struct Dictation {
    events: Option<mpsc::UnboundedSender<RecognitionEvent>>,
    results: Vec<RecognitionResult>,
    listening: bool,
}

type SharedDictation = Arc<Mutex<Dictation>>;

fn lock(dictation: &SharedDictation) -> MutexGuard<'_, Dictation> {
    match dictation.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Treats typed lines as recognized speech.
///
/// Each line becomes one final result, reported the way a continuous
/// recognizer reports a newly finalized phrase.
#[derive(Debug, Default)]
pub struct TypedRecognitionService {
    dictation: SharedDictation,
}

impl TypedRecognitionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a typed line to the active recognizer. Returns `false` when
    /// nothing is listening, so the caller can tell the user.
    pub fn dictate(&self, text: &str) -> bool {
        let mut dictation = lock(&self.dictation);
        if !dictation.listening {
            return false;
        }
        dictation
            .results
            .push(RecognitionResult::final_text(format!("{} ", text.trim())));
        let event = RecognitionEvent::Result {
            result_index: dictation.results.len() - 1,
            results: dictation.results.clone(),
        };
        dictation
            .events
            .as_ref()
            .is_some_and(|events| events.send(event).is_ok())
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.dictation).listening
    }
}

impl RecognitionService for TypedRecognitionService {
    fn create(
        &self,
        _options: RecognizerOptions,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Option<Box<dyn SpeechRecognizer>> {
        *lock(&self.dictation) = Dictation {
            events: Some(events),
            ..Dictation::default()
        };
        Some(Box::new(TypedRecognizer {
            dictation: self.dictation.clone(),
        }))
    }
}

struct TypedRecognizer {
    dictation: SharedDictation,
}

impl SpeechRecognizer for TypedRecognizer {
    fn start(&mut self) -> Result<(), RecognitionError> {
        let mut dictation = lock(&self.dictation);
        dictation.results.clear();
        dictation.listening = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecognitionError> {
        let mut dictation = lock(&self.dictation);
        if !dictation.listening {
            return Err(RecognitionError::Platform("recognizer is not running".to_string()));
        }
        dictation.listening = false;
        if let Some(events) = dictation.events.as_ref() {
            let _ = events.send(RecognitionEvent::End);
        }
        Ok(())
    }
}

// --- Speech synthesis ---

/// Roughly 150 words per minute at rate 1.0.
const WORDS_PER_SECOND: f32 = 2.5;

/// A synthesizer with no audio output. The question text is already printed,
/// so it only keeps track of how long reading it aloud would take.
#[derive(Debug, Default)]
pub struct ConsoleSynthesizer {
    speaking_until: Mutex<Option<Instant>>,
}

impl ConsoleSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn speaking_until(&self) -> MutexGuard<'_, Option<Instant>> {
        match self.speaking_until.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// How long `utterance` would take to read aloud.
pub fn speaking_time(utterance: &Utterance) -> Duration {
    let words = utterance.text.split_whitespace().count() as f32;
    let rate = if utterance.rate > 0.0 { utterance.rate } else { 1.0 };
    Duration::from_secs_f32(words / WORDS_PER_SECOND / rate)
}

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        vec![
            Voice::new("Console Female", "en-US"),
            Voice::new("Console Male", "en-US"),
        ]
    }

    fn speak(&self, utterance: Utterance) -> Result<(), SynthesisError> {
        if utterance.volume <= 0.0 {
            tracing::debug!("Narration is muted, not speaking");
            *self.speaking_until() = None;
            return Ok(());
        }
        let voice = utterance
            .voice
            .as_ref()
            .map_or("default voice", |voice| voice.name.as_str());
        tracing::info!(
            "Narrating {} words with {voice} (volume {:.2}, pitch {:.1})",
            utterance.text.split_whitespace().count(),
            utterance.volume,
            utterance.pitch
        );
        *self.speaking_until() = Some(Instant::now() + speaking_time(&utterance));
        Ok(())
    }

    fn cancel(&self) {
        *self.speaking_until() = None;
    }

    fn pause(&self) {}

    fn resume(&self) {}

    fn is_speaking(&self) -> bool {
        self.speaking_until()
            .is_some_and(|until| Instant::now() < until)
    }
}

// --- Rendering ---

/// Turns controller commands into terminal text.
///
/// Progress is only shown when the countdown crosses a quarter mark, so the
/// terminal isn't flooded with one line per second.
#[derive(Debug, Default)]
pub struct ConsoleRenderer {
    last_quarter: u8,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, command: &Command) -> Option<String> {
        match command {
            Command::Notify(notification) => {
                let tag = match notification.severity {
                    Severity::Info => "info",
                    Severity::Error => "error",
                };
                Some(format!(
                    "[{tag}] {}: {}",
                    notification.title, notification.description
                ))
            }
            Command::RedirectToLogin => Some(
                "You are not signed in. Set INTERVIEW_TOKEN and start again.".to_string(),
            ),
            Command::QuestionReady { index, question } => {
                self.last_quarter = 0;
                let tag = if question.category.is_empty() {
                    question.difficulty.to_string()
                } else {
                    format!("{}, {}", question.category, question.difficulty)
                };
                Some(format!(
                    "\nQuestion {} ({tag}):\n  {}\nType /answer when you are ready.",
                    index + 1,
                    question.question_text
                ))
            }
            Command::AnalysisReady { index, analysis } => Some(format!(
                "\nFeedback for question {}:\n  confidence {:.1}/10, overall {:.1}/10, eye contact {:.1}/10\n  {}\n  Next steps: {}",
                index + 1,
                analysis.confidence_score,
                analysis.overall_performance_score,
                analysis.eye_contact_score,
                analysis.ai_feedback,
                analysis.next_steps
            )),
            Command::Progress {
                percent,
                elapsed_secs,
            } => {
                let quarter = (percent / 25.0).floor().clamp(0.0, 4.0) as u8;
                if quarter <= self.last_quarter {
                    return None;
                }
                self.last_quarter = quarter;
                Some(format!(
                    "[{:<4}] {:.0}% of the answer time used, {} elapsed",
                    "#".repeat(usize::from(quarter)),
                    percent,
                    interview_core::summary::format_elapsed(*elapsed_secs)
                ))
            }
            Command::Finished(summary) => Some(render_summary(summary)),
        }
    }
}

pub fn render_summary(summary: &InterviewSummary) -> String {
    let heading = match summary.outcome {
        Outcome::Completed => "Interview complete",
        Outcome::Canceled => "Interview cancelled",
    };
    let mut lines = vec![
        format!("\n{heading}"),
        format!("  Duration: {}", summary.elapsed()),
        format!("  Questions: {}", summary.question_count()),
        format!("  Average confidence: {:.1}/10", summary.average_confidence()),
    ];
    for (i, turn) in summary.turns.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, turn.question.question_text));
        lines.push(format!(
            "     confidence {:.1}/10: {}",
            turn.analysis.confidence_score, turn.analysis.ai_feedback
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::Notification;
    use interview_core::summary::CompletedTurn;
    use interview_core::transcription::Transcriber;
    use interview_core::types::{Analysis, Question};

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("  /next "), ConsoleLine::Input(Input::Next));
        assert_eq!(parse_line("/MUTE"), ConsoleLine::Input(Input::ToggleMute));
        assert_eq!(parse_line("/quit"), ConsoleLine::Input(Input::Shutdown));
        assert_eq!(parse_line("/?"), ConsoleLine::Help);
        assert_eq!(parse_line("/dance"), ConsoleLine::Unknown("/dance".to_string()));
        assert_eq!(parse_line("   "), ConsoleLine::Empty);
        assert_eq!(
            parse_line(" I led the migration "),
            ConsoleLine::Speech("I led the migration".to_string())
        );
    }

    #[test]
    fn test_typed_lines_reach_the_transcript_only_while_listening() {
        let service = Arc::new(TypedRecognitionService::new());
        let mut transcriber = Transcriber::new(service.clone());
        assert!(transcriber.setup());

        assert!(!service.dictate("too early"));

        transcriber.start().unwrap();
        assert!(service.is_listening());
        assert!(service.dictate("I led the migration"));
        assert!(service.dictate("  to Rust  "));
        transcriber.pump();
        assert_eq!(transcriber.final_transcript(), "I led the migration to Rust ");

        transcriber.stop();
        assert!(!service.is_listening());
        assert!(!service.dictate("after stop"));
        transcriber.pump();
        assert_eq!(transcriber.final_transcript(), "I led the migration to Rust ");
    }

    #[test]
    fn test_synthesizer_tracks_speaking_time() {
        let synth = ConsoleSynthesizer::new();
        let utterance = Utterance {
            text: "Tell me about a time you disagreed with a teammate".to_string(),
            volume: 0.5,
            rate: 1.0,
            pitch: 1.0,
            voice: None,
        };
        assert_eq!(speaking_time(&utterance), Duration::from_secs(4));

        synth.speak(utterance.clone()).unwrap();
        assert!(synth.is_speaking());
        synth.cancel();
        assert!(!synth.is_speaking());

        synth
            .speak(Utterance {
                volume: 0.0,
                ..utterance
            })
            .unwrap();
        assert!(!synth.is_speaking());
    }

    #[test]
    fn test_progress_is_rendered_at_quarter_marks() {
        let mut renderer = ConsoleRenderer::new();
        let progress = |percent| Command::Progress {
            percent,
            elapsed_secs: 75,
        };

        assert!(renderer.render(&progress(10.0)).is_none());
        let line = renderer.render(&progress(26.0)).unwrap();
        assert!(line.contains("26%"));
        assert!(line.contains("1:15"));
        assert!(renderer.render(&progress(40.0)).is_none());
        assert!(renderer.render(&progress(100.0)).is_some());

        renderer.render(&Command::QuestionReady {
            index: 1,
            question: Question::new("Next one"),
        });
        assert!(renderer.render(&progress(30.0)).is_some());
    }

    #[test]
    fn test_render_notifications_and_questions() {
        let mut renderer = ConsoleRenderer::new();
        let toast = renderer
            .render(&Command::Notify(Notification::error(
                "Recording Error",
                "No recording data available.",
            )))
            .unwrap();
        assert_eq!(toast, "[error] Recording Error: No recording data available.");

        let question = renderer
            .render(&Command::QuestionReady {
                index: 0,
                question: Question::new("Why Rust?"),
            })
            .unwrap();
        assert!(question.contains("Question 1"));
        assert!(question.contains("Why Rust?"));
    }

    #[test]
    fn test_summary_lists_turns() {
        let turn = CompletedTurn {
            question: Question::new("Why Rust?"),
            answer: "Safety".to_string(),
            analysis: Analysis {
                confidence_score: 8.0,
                ai_feedback: "Crisp".to_string(),
                ..Analysis::default()
            },
        };
        let summary = InterviewSummary {
            session_id: Some("s1".to_string()),
            outcome: Outcome::Completed,
            elapsed_secs: 125,
            questions: vec![turn.question.clone(), Question::new("Unanswered")],
            turns: vec![turn],
        };

        let text = render_summary(&summary);
        assert!(text.contains("Interview complete"));
        assert!(text.contains("Duration: 2:05"));
        assert!(text.contains("Questions: 2"));
        assert!(text.contains("Average confidence: 4.0/10"));
        assert!(text.contains("1. Why Rust?"));
    }
}
