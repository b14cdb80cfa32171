use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("No microphone found. Please check your system audio settings.")]
    NoMicrophoneFound,

    #[error("Failed to initialize audio device: {0}")]
    DeviceInitFailed(String),

    #[error("Unsupported input sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to start audio stream: {0}")]
    StreamStartFailed(String),

    #[error("Failed to spawn monitor thread: {0}")]
    Thread(#[from] std::io::Error),
}
