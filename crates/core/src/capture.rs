//! Media capture: acquiring camera/microphone streams and recording answers.
//!
//! The platform side (browser `getUserMedia`/`MediaRecorder`, a native audio
//! device, a test fake) implements [`MediaBackend`] and [`MediaRecorder`].
//! [`MediaCapture`] owns the single shared [`MediaStream`] and the recorder
//! lifecycle on top of them.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Container type used when the recorder does not report its own.
pub const RECORDING_MIME_TYPE: &str = "video/webm";

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera or microphone permission was denied")]
    PermissionDenied,
    #[error("media capture unavailable: {0}")]
    Unavailable(String),
    #[error("recorder error: {0}")]
    Recorder(String),
    #[error("no recording data available")]
    NoRecordingData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 30,
        }
    }
}

/// What to ask the platform for. Video values are "ideal", not exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: Option<VideoConstraints>,
    pub audio: bool,
}

impl MediaConstraints {
    /// Audio is always requested; video only when the user has it switched on.
    pub fn for_interview(video_enabled: bool) -> Self {
        Self {
            video: video_enabled.then(VideoConstraints::default),
            audio: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug)]
struct TrackState {
    enabled: AtomicBool,
    live: AtomicBool,
}

/// Handle to one platform track. Clones observe and mutate the same track,
/// so the backend producing samples sees `enabled` flips immediately.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    state: Arc<TrackState>,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            state: Arc::new(TrackState {
                enabled: AtomicBool::new(true),
                live: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::SeqCst)
    }

    /// A disabled track keeps running but produces silence/black frames.
    pub fn set_enabled(&self, enabled: bool) {
        self.state.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Releases the underlying device. A stopped track never comes back.
    pub fn stop(&self) {
        self.state.live.store(false, Ordering::SeqCst);
        self.state.enabled.store(false, Ordering::SeqCst);
    }
}

/// The one stream shared by the live preview and the recorder.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(move |track| track.kind() == kind)
    }

    /// True while at least one track is still live.
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
    Paused,
}

/// A platform recorder bound to one stream.
///
/// Encoded data is delivered as chunks on the sender given to `start`. The
/// final chunk may arrive shortly after `stop` returns.
pub trait MediaRecorder: Send {
    fn start(&mut self, chunks: mpsc::UnboundedSender<Bytes>) -> Result<(), CaptureError>;
    fn pause(&mut self) -> Result<(), CaptureError>;
    fn resume(&mut self) -> Result<(), CaptureError>;
    fn stop(&mut self) -> Result<(), CaptureError>;
    fn state(&self) -> RecorderState;

    fn mime_type(&self) -> &str {
        RECORDING_MIME_TYPE
    }
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Asks for device access. Denial maps to [`CaptureError::PermissionDenied`].
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError>;

    fn create_recorder(&self, stream: &MediaStream)
    -> Result<Box<dyn MediaRecorder>, CaptureError>;
}

/// A finished recording, ready to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub mime_type: String,
    pub data: Bytes,
}

impl MediaBlob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File extension matching the mime type, used for the upload's file name.
    pub fn extension(&self) -> &'static str {
        let essence = self.mime_type.split(';').next().unwrap_or_default().trim();
        match essence {
            "video/webm" | "audio/webm" => "webm",
            "video/mp4" | "audio/mp4" => "mp4",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/ogg" => "ogg",
            _ => "bin",
        }
    }
}

pub struct MediaCapture {
    backend: Arc<dyn MediaBackend>,
    stream: Option<MediaStream>,
    recorder: Option<Box<dyn MediaRecorder>>,
    chunk_rx: Option<mpsc::UnboundedReceiver<Bytes>>,
    chunks: Vec<Bytes>,
    mime_type: String,
    // Pre-pause `enabled` flags, keyed by track id.
    suspended: Option<Vec<(String, bool)>>,
}

impl MediaCapture {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            stream: None,
            recorder: None,
            chunk_rx: None,
            chunks: Vec::new(),
            mime_type: RECORDING_MIME_TYPE.to_string(),
            suspended: None,
        }
    }

    /// Acquires camera and microphone. An already active stream is reused.
    pub async fn acquire(&mut self, video_enabled: bool) -> Result<&MediaStream, CaptureError> {
        let reusable = self.stream.as_ref().is_some_and(MediaStream::is_active);
        if !reusable {
            let constraints = MediaConstraints::for_interview(video_enabled);
            let stream = self.backend.get_user_media(&constraints).await?;
            tracing::info!(
                "Acquired media stream {} with {} track(s)",
                stream.id(),
                stream.tracks().len()
            );
            self.stream = Some(stream);
        }
        self.stream
            .as_ref()
            .ok_or_else(|| CaptureError::Unavailable("no media stream acquired".to_string()))
    }

    pub fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder
            .as_ref()
            .is_some_and(|recorder| recorder.state() != RecorderState::Inactive)
    }

    /// Starts a fresh recording on the shared stream, discarding any leftovers.
    pub fn start_recording(&mut self) -> Result<(), CaptureError> {
        if self.is_recording() {
            return Err(CaptureError::Recorder(
                "a recording is already in progress".to_string(),
            ));
        }
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| CaptureError::Unavailable("no media stream acquired".to_string()))?;

        let mut recorder = self.backend.create_recorder(stream)?;
        let (tx, rx) = mpsc::unbounded_channel();
        recorder.start(tx)?;

        self.chunks.clear();
        self.mime_type = recorder.mime_type().to_string();
        self.chunk_rx = Some(rx);
        self.recorder = Some(recorder);
        tracing::debug!("Recording started ({})", self.mime_type);
        Ok(())
    }

    /// Asks the recorder to stop. Stopping an idle recorder is a no-op.
    pub fn stop_recording(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            if recorder.state() != RecorderState::Inactive {
                if let Err(e) = recorder.stop() {
                    tracing::debug!("Ignoring recorder stop error: {e}");
                }
            }
        }
    }

    /// Collects every chunk delivered so far into one blob and clears the buffer.
    ///
    /// Call after [`stop_recording`](Self::stop_recording) and a short grace
    /// period, so the recorder's final chunk has landed.
    pub fn take_recording(&mut self) -> Result<MediaBlob, CaptureError> {
        self.drain_chunks();
        self.recorder = None;
        self.chunk_rx = None;

        let chunks = std::mem::take(&mut self.chunks);
        if chunks.is_empty() {
            return Err(CaptureError::NoRecordingData);
        }

        let mut data = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            data.extend_from_slice(&chunk);
        }
        Ok(MediaBlob {
            mime_type: self.mime_type.clone(),
            data: data.freeze(),
        })
    }

    /// Stops any recording and throws its data away.
    pub fn discard_recording(&mut self) {
        self.stop_recording();
        self.recorder = None;
        self.chunk_rx = None;
        self.chunks.clear();
    }

    pub fn pause_recording(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            if recorder.state() == RecorderState::Recording {
                if let Err(e) = recorder.pause() {
                    tracing::warn!("Error pausing media recorder: {e}");
                }
            }
        }
    }

    pub fn resume_recording(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            if recorder.state() == RecorderState::Paused {
                if let Err(e) = recorder.resume() {
                    tracing::warn!("Error resuming media recorder: {e}");
                }
            }
        }
    }

    /// Flips `enabled` on every track of `kind` without stopping the stream.
    ///
    /// While the tracks are suspended the change is recorded instead and
    /// applied by [`restore_tracks`](Self::restore_tracks).
    pub fn toggle_track_enabled(&mut self, kind: TrackKind, enabled: bool) {
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        for track in stream.tracks_of(kind) {
            match self.suspended.as_mut() {
                Some(saved) => {
                    if let Some(entry) = saved.iter_mut().find(|(id, _)| id == track.id()) {
                        entry.1 = enabled;
                    }
                }
                None => track.set_enabled(enabled),
            }
        }
    }

    /// Disables every track, remembering the previous flags.
    pub fn suspend_tracks(&mut self) {
        if self.suspended.is_some() {
            return;
        }
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        let saved = stream
            .tracks()
            .iter()
            .map(|track| (track.id().to_string(), track.is_enabled()))
            .collect();
        for track in stream.tracks() {
            track.set_enabled(false);
        }
        self.suspended = Some(saved);
    }

    /// Puts back the flags saved by [`suspend_tracks`](Self::suspend_tracks).
    pub fn restore_tracks(&mut self) {
        let Some(saved) = self.suspended.take() else {
            return;
        };
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        for track in stream.tracks() {
            if let Some((_, enabled)) = saved.iter().find(|(id, _)| id == track.id()) {
                track.set_enabled(*enabled);
            }
        }
    }

    /// Stops the recorder and every track, and forgets the stream.
    pub fn release(&mut self) {
        self.discard_recording();
        self.suspended = None;
        if let Some(stream) = self.stream.take() {
            stream.stop_all();
            tracing::info!("Released media stream {}", stream.id());
        }
    }

    fn drain_chunks(&mut self) {
        if let Some(rx) = self.chunk_rx.as_mut() {
            while let Ok(chunk) = rx.try_recv() {
                if !chunk.is_empty() {
                    self.chunks.push(chunk);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMediaBackend;

    #[test]
    fn test_constraints_request_hd_video_and_audio() {
        let constraints = MediaConstraints::for_interview(true);
        assert!(constraints.audio);
        assert_eq!(
            constraints.video,
            Some(VideoConstraints {
                width: 1280,
                height: 720,
                frame_rate: 30
            })
        );
        assert!(MediaConstraints::for_interview(false).video.is_none());
    }

    #[tokio::test]
    async fn test_recording_collects_chunks_into_one_blob() {
        let backend = Arc::new(FakeMediaBackend::new());
        let mut capture = MediaCapture::new(backend.clone());
        capture.acquire(true).await.unwrap();

        capture.start_recording().unwrap();
        backend.emit_chunk(b"abc");
        backend.emit_chunk(b"def");
        capture.stop_recording();

        let blob = capture.take_recording().unwrap();
        // The fake recorder flushes a final chunk on stop.
        assert_eq!(&blob.data[..], b"abcdeffinal");
        assert_eq!(blob.mime_type, "video/webm");
        assert!(!capture.is_recording());

        // The buffer is cleared after a take.
        assert!(matches!(
            capture.take_recording(),
            Err(CaptureError::NoRecordingData)
        ));
    }

    #[tokio::test]
    async fn test_recording_without_chunks_is_an_error() {
        let backend = Arc::new(FakeMediaBackend::new().without_final_chunk());
        let mut capture = MediaCapture::new(backend);
        capture.acquire(false).await.unwrap();

        capture.start_recording().unwrap();
        capture.stop_recording();
        assert!(matches!(
            capture.take_recording(),
            Err(CaptureError::NoRecordingData)
        ));
    }

    #[tokio::test]
    async fn test_second_recording_is_rejected_while_one_is_active() {
        let backend = Arc::new(FakeMediaBackend::new());
        let mut capture = MediaCapture::new(backend);
        capture.acquire(true).await.unwrap();

        capture.start_recording().unwrap();
        assert!(matches!(
            capture.start_recording(),
            Err(CaptureError::Recorder(_))
        ));
    }

    #[tokio::test]
    async fn test_suspend_and_restore_keep_previous_flags() {
        let backend = Arc::new(FakeMediaBackend::new());
        let mut capture = MediaCapture::new(backend);
        capture.acquire(true).await.unwrap();
        capture.toggle_track_enabled(TrackKind::Video, false);

        capture.suspend_tracks();
        let stream = capture.stream().unwrap().clone();
        assert!(stream.tracks().iter().all(|t| !t.is_enabled()));

        capture.restore_tracks();
        assert!(stream.tracks_of(TrackKind::Audio).all(MediaTrack::is_enabled));
        assert!(stream.tracks_of(TrackKind::Video).all(|t| !t.is_enabled()));
        assert!(stream.is_active());
    }

    #[tokio::test]
    async fn test_toggle_while_suspended_applies_on_restore() {
        let backend = Arc::new(FakeMediaBackend::new());
        let mut capture = MediaCapture::new(backend);
        capture.acquire(true).await.unwrap();

        capture.suspend_tracks();
        capture.toggle_track_enabled(TrackKind::Video, false);
        let stream = capture.stream().unwrap().clone();
        assert!(stream.tracks().iter().all(|t| !t.is_enabled()));

        capture.restore_tracks();
        assert!(stream.tracks_of(TrackKind::Video).all(|t| !t.is_enabled()));
        assert!(stream.tracks_of(TrackKind::Audio).all(MediaTrack::is_enabled));
    }

    #[tokio::test]
    async fn test_release_stops_every_track() {
        let backend = Arc::new(FakeMediaBackend::new());
        let mut capture = MediaCapture::new(backend);
        let stream = capture.acquire(true).await.unwrap().clone();
        capture.start_recording().unwrap();

        capture.release();
        assert!(!stream.is_active());
        assert!(capture.stream().is_none());
        assert!(!capture.is_recording());

        // Releasing twice is harmless.
        capture.release();
    }

    #[tokio::test]
    async fn test_permission_denied_is_reported() {
        let backend = Arc::new(FakeMediaBackend::new().denying_permission());
        let mut capture = MediaCapture::new(backend);
        assert!(matches!(
            capture.acquire(true).await,
            Err(CaptureError::PermissionDenied)
        ));
        assert!(capture.stream().is_none());
    }

    #[test]
    fn test_blob_extension_follows_mime_type() {
        let blob = MediaBlob {
            mime_type: "video/webm;codecs=vp8,opus".to_string(),
            data: Bytes::from_static(b"x"),
        };
        assert_eq!(blob.extension(), "webm");

        let wav = MediaBlob {
            mime_type: "audio/wav".to_string(),
            data: Bytes::new(),
        };
        assert_eq!(wav.extension(), "wav");
        assert!(wav.is_empty());
    }
}
