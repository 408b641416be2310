//! Text-to-speech bridge used to read questions aloud.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Some speech engines silently pause an utterance that runs for more than
/// ~15 seconds. Nudging the engine (pause + resume) at this interval keeps it
/// going.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("speech synthesis is not supported on this platform")]
    Unsupported,
    #[error("speech synthesis failed: {0}")]
    Platform(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoicePreference {
    Default,
    Male,
    #[default]
    Female,
    Robotic,
}

impl fmt::Display for VoicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoicePreference::Default => "default",
            VoicePreference::Male => "male",
            VoicePreference::Female => "female",
            VoicePreference::Robotic => "robotic",
        };
        f.write_str(name)
    }
}

impl FromStr for VoicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(VoicePreference::Default),
            "male" => Ok(VoicePreference::Male),
            "female" => Ok(VoicePreference::Female),
            "robotic" => Ok(VoicePreference::Robotic),
            other => Err(format!(
                "unknown voice '{other}', expected default, male, female or robotic"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// 0.0 (silent) to 1.0.
    pub volume: f32,
    pub rate: f32,
    pub pitch: f32,
    /// `None` means the platform default voice.
    pub voice: Option<Voice>,
}

pub trait SpeechSynthesizer: Send + Sync {
    fn voices(&self) -> Vec<Voice>;
    /// Queues an utterance. Returns once it is queued, not once it is spoken.
    fn speak(&self, utterance: Utterance) -> Result<(), SynthesisError>;
    /// Drops the in-flight utterance and everything queued behind it.
    fn cancel(&self);
    fn pause(&self);
    fn resume(&self);
    fn is_speaking(&self) -> bool;
}

pub struct Narrator {
    synth: Arc<dyn SpeechSynthesizer>,
    keep_alive_interval: Option<Duration>,
    keep_alive: Option<JoinHandle<()>>,
}

impl Narrator {
    pub fn new(synth: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            synth,
            keep_alive_interval: Some(KEEP_ALIVE_INTERVAL),
            keep_alive: None,
        }
    }

    /// For engines that never auto-pause long utterances.
    pub fn without_keep_alive(mut self) -> Self {
        self.keep_alive_interval = None;
        self
    }

    /// Builds the utterance for `text` without speaking it.
    ///
    /// Voices are matched by name substring ("Male"/"Female"); when nothing
    /// matches the platform default is used. The robotic preference never looks
    /// up a voice and only lowers pitch and rate.
    pub fn utterance(&self, text: &str, preference: VoicePreference, volume: f32) -> Utterance {
        let mut utterance = Utterance {
            text: text.to_string(),
            volume: volume.clamp(0.0, 1.0),
            rate: 1.0,
            pitch: 1.0,
            voice: None,
        };

        let needle = match preference {
            VoicePreference::Male => Some("Male"),
            VoicePreference::Female => Some("Female"),
            VoicePreference::Robotic => {
                utterance.pitch = 0.5;
                utterance.rate = 0.8;
                None
            }
            VoicePreference::Default => None,
        };

        if let Some(needle) = needle {
            utterance.voice = self
                .synth
                .voices()
                .into_iter()
                .find(|voice| voice.name.contains(needle));
            if utterance.voice.is_none() {
                tracing::debug!("No '{needle}' voice available, using the platform default");
            }
        }
        utterance
    }

    /// Cancels whatever is being said and reads `text` instead.
    pub fn speak(
        &mut self,
        text: &str,
        preference: VoicePreference,
        volume: f32,
    ) -> Result<(), SynthesisError> {
        self.cancel_all();
        let utterance = self.utterance(text, preference, volume);
        self.synth.speak(utterance)?;
        self.spawn_keep_alive();
        Ok(())
    }

    /// Stops any in-flight or queued utterance immediately.
    pub fn cancel_all(&mut self) {
        self.stop_keep_alive();
        self.synth.cancel();
    }

    pub fn is_speaking(&self) -> bool {
        self.synth.is_speaking()
    }

    fn spawn_keep_alive(&mut self) {
        let Some(interval) = self.keep_alive_interval else {
            return;
        };
        let synth = self.synth.clone();
        self.keep_alive = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !synth.is_speaking() {
                    break;
                }
                synth.pause();
                synth.resume();
            }
        }));
    }

    fn stop_keep_alive(&mut self) {
        if let Some(handle) = self.keep_alive.take() {
            handle.abort();
        }
    }
}

impl Drop for Narrator {
    fn drop(&mut self) {
        self.stop_keep_alive();
    }
}
