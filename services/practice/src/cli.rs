use clap::Parser;
use interview_core::controller::InterviewSettings;
use interview_core::countdown::DEFAULT_QUESTION_SECS;
use interview_core::narration::VoicePreference;
use interview_core::types::Difficulty;
use std::path::PathBuf;

/// Practice a mock interview from the terminal.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Title shown for this practice session
    #[arg(long, default_value = "Practice Interview")]
    pub title: String,

    /// Job category the questions are generated for
    #[arg(long, default_value = "Software Engineering")]
    pub category: String,

    /// EASY, MEDIUM or HARD
    #[arg(long, default_value_t = Difficulty::Medium)]
    pub difficulty: Difficulty,

    /// Free-text job description passed to the question generator
    #[arg(long, default_value = "")]
    pub description: String,

    /// Comma-separated focus areas, e.g. `--focus rust,system-design`
    #[arg(long = "focus", value_delimiter = ',')]
    pub focus_areas: Vec<String>,

    /// Seconds available to answer each question
    #[arg(long, default_value_t = DEFAULT_QUESTION_SECS)]
    pub duration: u32,

    /// Submit the answer and move on when time runs out
    #[arg(long)]
    pub auto_advance: bool,

    /// default, male, female or robotic
    #[arg(long, default_value_t = VoicePreference::Female)]
    pub voice: VoicePreference,

    /// Narration volume, 0 to 100
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub volume: u8,

    /// Do not ask for a camera
    #[arg(long)]
    pub no_video: bool,

    /// Read configuration from this file instead of `./.env`
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Record answers from a real microphone (needs the `microphone` feature)
    #[arg(long)]
    pub microphone: bool,

    /// Input device name to record from; defaults to the system input
    #[arg(long)]
    pub device: Option<String>,

    /// Print the available input devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Cli {
    pub fn settings(&self) -> InterviewSettings {
        InterviewSettings {
            title: self.title.clone(),
            category: self.category.clone(),
            difficulty: self.difficulty,
            description: self.description.clone(),
            focus_areas: self
                .focus_areas
                .iter()
                .map(|area| area.trim().to_string())
                .filter(|area| !area.is_empty())
                .collect(),
            question_duration_secs: self.duration.max(1),
            auto_advance: self.auto_advance,
            voice: self.voice,
            volume: self.volume,
            video_enabled: !self.no_video,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_interview_settings() {
        let cli = Cli::try_parse_from(["interview-practice"]).unwrap();
        assert_eq!(cli.settings(), InterviewSettings::default());
        assert!(!cli.microphone);
    }

    #[test]
    fn test_flags_map_onto_settings() {
        let cli = Cli::try_parse_from([
            "interview-practice",
            "--category",
            "Data Science",
            "--difficulty",
            "hard",
            "--focus",
            "sql, statistics,,",
            "--duration",
            "90",
            "--auto-advance",
            "--voice",
            "robotic",
            "--volume",
            "80",
            "--no-video",
        ])
        .unwrap();

        let settings = cli.settings();
        assert_eq!(settings.category, "Data Science");
        assert_eq!(settings.difficulty, Difficulty::Hard);
        assert_eq!(settings.focus_areas, vec!["sql", "statistics"]);
        assert_eq!(settings.question_duration_secs, 90);
        assert!(settings.auto_advance);
        assert_eq!(settings.voice, VoicePreference::Robotic);
        assert_eq!(settings.volume, 80);
        assert!(!settings.video_enabled);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(Cli::try_parse_from(["interview-practice", "--volume", "150"]).is_err());
        assert!(Cli::try_parse_from(["interview-practice", "--difficulty", "brutal"]).is_err());
        assert!(Cli::try_parse_from(["interview-practice", "--voice", "whisper"]).is_err());
    }
}
