use interview_types::{Analysis, Question};

/// One finished interview turn. Question, answer and feedback always travel
/// together so the three lists can never drift out of step.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTurn {
    pub question: Question,
    pub answer: String,
    pub analysis: Analysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Canceled,
}

/// What the end-of-interview view shows.
#[derive(Debug, Clone, PartialEq)]
pub struct InterviewSummary {
    pub session_id: Option<String>,
    pub outcome: Outcome,
    pub elapsed_secs: u64,
    /// Every question shown, including one that was never answered.
    pub questions: Vec<Question>,
    pub turns: Vec<CompletedTurn>,
}

impl InterviewSummary {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Sum of confidence scores divided by the number of questions asked.
    /// An unanswered question counts as zero.
    pub fn average_confidence(&self) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .turns
            .iter()
            .map(|turn| turn.analysis.confidence_score)
            .sum();
        total / self.questions.len() as f64
    }

    pub fn elapsed(&self) -> String {
        format_elapsed(self.elapsed_secs)
    }
}

/// Formats seconds as `m:ss`.
pub fn format_elapsed(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
