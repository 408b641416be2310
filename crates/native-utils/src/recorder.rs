//! A media recorder that buffers PCM from any sample source and delivers the
//! answer as a single WAV chunk when stopped.

use crate::audio::{WAV_MIME_TYPE, WavFormat, convert_f32_to_i16, downmix, encode_wav};
use bytes::Bytes;
use interview_core::capture::{CaptureError, MediaRecorder, RecorderState};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Where a capture source pushes samples and a recorder collects them.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    recording: bool,
    samples: Vec<f32>,
}

impl SampleBuffer {
    /// Appends interleaved samples, but only while a recording is running.
    pub fn push(&mut self, samples: &[f32]) {
        if self.recording {
            self.samples.extend_from_slice(samples);
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

pub type SharedBuffer = Arc<Mutex<SampleBuffer>>;

pub(crate) fn lock(buffer: &SharedBuffer) -> MutexGuard<'_, SampleBuffer> {
    match buffer.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct WavRecorder {
    buffer: SharedBuffer,
    format: WavFormat,
    state: RecorderState,
    chunks: Option<mpsc::UnboundedSender<Bytes>>,
}

impl WavRecorder {
    /// `format` describes what the source pushes; the output is always mono.
    pub fn new(buffer: SharedBuffer, format: WavFormat) -> Self {
        Self {
            buffer,
            format,
            state: RecorderState::Inactive,
            chunks: None,
        }
    }
}

impl MediaRecorder for WavRecorder {
    fn start(&mut self, chunks: mpsc::UnboundedSender<Bytes>) -> Result<(), CaptureError> {
        if self.state != RecorderState::Inactive {
            return Err(CaptureError::Recorder("recorder already started".to_string()));
        }
        let mut buffer = lock(&self.buffer);
        buffer.samples.clear();
        buffer.recording = true;
        self.chunks = Some(chunks);
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        if self.state != RecorderState::Recording {
            return Err(CaptureError::Recorder("recorder is not recording".to_string()));
        }
        lock(&self.buffer).recording = false;
        self.state = RecorderState::Paused;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        if self.state != RecorderState::Paused {
            return Err(CaptureError::Recorder("recorder is not paused".to_string()));
        }
        lock(&self.buffer).recording = true;
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if self.state == RecorderState::Inactive {
            return Err(CaptureError::Recorder("recorder is not running".to_string()));
        }
        self.state = RecorderState::Inactive;
        let samples = {
            let mut buffer = lock(&self.buffer);
            buffer.recording = false;
            std::mem::take(&mut buffer.samples)
        };
        let Some(chunks) = self.chunks.take() else {
            return Ok(());
        };
        if samples.is_empty() {
            tracing::debug!("Recorder stopped without any samples");
            return Ok(());
        }

        let mono = downmix(&samples, self.format.channels);
        let format = WavFormat {
            sample_rate: self.format.sample_rate,
            channels: 1,
        };
        let wav = encode_wav(&convert_f32_to_i16(&mono), format)
            .map_err(|e| CaptureError::Recorder(e.to_string()))?;
        tracing::debug!("Recorded {} samples ({} bytes)", mono.len(), wav.len());
        let _ = chunks.send(Bytes::from(wav));
        Ok(())
    }

    fn state(&self) -> RecorderState {
        self.state
    }

    fn mime_type(&self) -> &str {
        WAV_MIME_TYPE
    }
}
