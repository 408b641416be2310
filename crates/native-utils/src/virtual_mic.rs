//! A microphone that needs no hardware: it produces silence in real time.
//!
//! Used when answers are typed rather than spoken, so the processing service
//! still receives a recording whose length matches the time spent answering.

use crate::audio::WavFormat;
use crate::recorder::{SharedBuffer, WavRecorder, lock};
use async_trait::async_trait;
use interview_core::capture::{
    CaptureError, MediaBackend, MediaConstraints, MediaRecorder, MediaStream, MediaTrack, TrackKind,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(100);

pub struct VirtualMicrophone {
    format: WavFormat,
    buffers: Mutex<HashMap<String, SharedBuffer>>,
    next_id: AtomicUsize,
}

impl VirtualMicrophone {
    pub fn new() -> Self {
        Self::with_format(WavFormat::default())
    }

    pub fn with_format(format: WavFormat) -> Self {
        Self {
            format,
            buffers: Mutex::default(),
            next_id: AtomicUsize::new(0),
        }
    }

    fn frame_len(&self) -> usize {
        let per_channel = self.format.sample_rate as usize * FRAME.as_millis() as usize / 1000;
        per_channel * usize::from(self.format.channels)
    }
}

impl Default for VirtualMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaBackend for VirtualMicrophone {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if !constraints.audio {
            return Err(CaptureError::Unavailable(
                "the virtual microphone only provides audio".to_string(),
            ));
        }
        if constraints.video.is_some() {
            tracing::warn!("No camera available, continuing with audio only");
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let track = MediaTrack::new(format!("virtual-audio-{n}"), TrackKind::Audio);
        let stream = MediaStream::new(format!("virtual-{n}"), vec![track.clone()]);

        let buffer = SharedBuffer::default();
        self.buffers
            .lock()
            .map_err(|_| CaptureError::Unavailable("device table poisoned".to_string()))?
            .insert(stream.id().to_string(), buffer.clone());

        let frame = vec![0.0_f32; self.frame_len()];
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FRAME);
            ticker.tick().await;
            while track.is_live() {
                ticker.tick().await;
                lock(&buffer).push(&frame);
            }
            tracing::debug!("Virtual microphone {} stopped", track.id());
        });

        Ok(stream)
    }

    fn create_recorder(
        &self,
        stream: &MediaStream,
    ) -> Result<Box<dyn MediaRecorder>, CaptureError> {
        let buffers = self
            .buffers
            .lock()
            .map_err(|_| CaptureError::Unavailable("device table poisoned".to_string()))?;
        let buffer = buffers
            .get(stream.id())
            .cloned()
            .ok_or_else(|| CaptureError::Unavailable(format!("unknown stream {}", stream.id())))?;
        Ok(Box::new(WavRecorder::new(buffer, self.format)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::capture::MediaCapture;
    use std::io::Cursor;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_recording_length_follows_wall_clock() {
        let mut capture = MediaCapture::new(Arc::new(VirtualMicrophone::new()));
        let stream = capture.acquire(true).await.unwrap().clone();
        assert_eq!(stream.tracks().len(), 1);

        capture.start_recording().unwrap();
        tokio::time::sleep(Duration::from_millis(1050)).await;
        capture.stop_recording();

        let blob = capture.take_recording().unwrap();
        assert_eq!(blob.mime_type, "audio/wav");
        assert_eq!(blob.extension(), "wav");
        let reader = hound::WavReader::new(Cursor::new(blob.data.to_vec())).unwrap();
        assert_eq!(reader.len(), 16_000);

        capture.release();
        assert!(!stream.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_time_is_not_recorded() {
        let mut capture = MediaCapture::new(Arc::new(VirtualMicrophone::new()));
        capture.acquire(false).await.unwrap();

        capture.start_recording().unwrap();
        tokio::time::sleep(Duration::from_millis(550)).await;
        capture.pause_recording();
        tokio::time::sleep(Duration::from_secs(2)).await;
        capture.resume_recording();
        tokio::time::sleep(Duration::from_millis(500)).await;
        capture.stop_recording();

        let blob = capture.take_recording().unwrap();
        let reader = hound::WavReader::new(Cursor::new(blob.data.to_vec())).unwrap();
        assert_eq!(reader.len(), 16_000);
    }

    #[tokio::test]
    async fn test_audio_is_required() {
        let mic = VirtualMicrophone::new();
        let constraints = MediaConstraints {
            video: None,
            audio: false,
        };
        assert!(matches!(
            mic.get_user_media(&constraints).await,
            Err(CaptureError::Unavailable(_))
        ));
    }
}
