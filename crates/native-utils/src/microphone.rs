//! Records answers from a real input device through cpal.

use crate::audio::WavFormat;
use crate::device::get_or_default_input;
use crate::recorder::{SharedBuffer, WavRecorder, lock};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use interview_core::capture::{
    CaptureError, MediaBackend, MediaConstraints, MediaRecorder, MediaStream, MediaTrack, TrackKind,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

const LIVENESS_POLL: Duration = Duration::from_millis(100);

pub struct MicrophoneBackend {
    device_name: Option<String>,
    streams: Mutex<HashMap<String, (SharedBuffer, WavFormat)>>,
}

impl MicrophoneBackend {
    /// `None` picks the host's default input device.
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            streams: Mutex::default(),
        }
    }
}

#[async_trait]
impl MediaBackend for MicrophoneBackend {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if constraints.video.is_some() {
            tracing::warn!("Camera capture is not supported natively, recording audio only");
        }

        let track = MediaTrack::new("microphone", TrackKind::Audio);
        let buffer = SharedBuffer::default();
        let (ready_tx, ready_rx) = oneshot::channel();

        // cpal streams are not Send, so the stream lives on its own thread
        // until the track is stopped.
        let device_name = self.device_name.clone();
        let thread_track = track.clone();
        let thread_buffer = buffer.clone();
        std::thread::spawn(move || {
            match open_input(device_name.as_deref(), thread_track.clone(), thread_buffer) {
                Ok((stream, format)) => {
                    let _ = ready_tx.send(Ok(format));
                    while thread_track.is_live() {
                        std::thread::sleep(LIVENESS_POLL);
                    }
                    drop(stream);
                    tracing::debug!("Microphone stream closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        let format = ready_rx
            .await
            .map_err(|_| CaptureError::Unavailable("capture thread exited".to_string()))??;
        tracing::info!(
            "Microphone open at {} Hz, {} channel(s)",
            format.sample_rate,
            format.channels
        );

        let stream = MediaStream::new("microphone", vec![track]);
        self.streams
            .lock()
            .map_err(|_| CaptureError::Unavailable("device table poisoned".to_string()))?
            .insert(stream.id().to_string(), (buffer, format));
        Ok(stream)
    }

    fn create_recorder(
        &self,
        stream: &MediaStream,
    ) -> Result<Box<dyn MediaRecorder>, CaptureError> {
        let streams = self
            .streams
            .lock()
            .map_err(|_| CaptureError::Unavailable("device table poisoned".to_string()))?;
        let (buffer, format) = streams
            .get(stream.id())
            .cloned()
            .ok_or_else(|| CaptureError::Unavailable(format!("unknown stream {}", stream.id())))?;
        Ok(Box::new(WavRecorder::new(buffer, format)))
    }
}

fn open_input(
    device_name: Option<&str>,
    track: MediaTrack,
    buffer: SharedBuffer,
) -> Result<(cpal::Stream, WavFormat), CaptureError> {
    let device =
        get_or_default_input(device_name).map_err(|e| CaptureError::Unavailable(e.to_string()))?;
    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
    let format = WavFormat {
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
    };
    let err_fn = |e: cpal::StreamError| tracing::error!("Microphone stream error: {e}");

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if track.is_enabled() {
                    lock(&buffer).push(data);
                } else {
                    lock(&buffer).push(&vec![0.0; data.len()]);
                }
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> = if track.is_enabled() {
                    data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                } else {
                    vec![0.0; data.len()]
                };
                lock(&buffer).push(&samples);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(CaptureError::Unavailable(format!(
                "unsupported sample format {other:?}"
            )));
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::PermissionDenied,
        other => CaptureError::Unavailable(other.to_string()),
    })?;

    stream
        .play()
        .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
    Ok((stream, format))
}
