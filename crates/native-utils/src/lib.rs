pub mod audio;
pub mod recorder;
pub mod virtual_mic;

#[cfg(feature = "microphone")]
pub mod device;
#[cfg(feature = "microphone")]
pub mod microphone;

pub use virtual_mic::VirtualMicrophone;

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneBackend;
