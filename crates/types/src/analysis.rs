use serde::{Deserialize, Serialize};

/// AI feedback for one submitted answer.
///
/// Scores are on a 0–10 scale. The free-text sections are markdown produced by
/// the processing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Analysis {
    pub id: Option<String>,
    pub session_id: Option<String>,
    pub question_id: Option<String>,
    pub analyzer: Option<String>,
    pub users_answer: Option<String>,
    pub emotion_analysis: String,
    pub speech_analysis: String,
    pub eye_contact_score: f64,
    pub confidence_score: f64,
    pub overall_performance_score: f64,
    pub ai_feedback: String,
    pub next_steps: String,
    pub processed_at: Option<String>,
}
