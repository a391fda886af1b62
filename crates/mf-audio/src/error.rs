use thiserror::Error;

/// Errors originating from the audio front end.
#[derive(Error, Debug)]
pub enum AudioError {
    /// The container has no track the decoder can read.
    #[error("No decodable audio track in {0}")]
    NoTrack(String),

    /// Unsupported audio format.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The file decoded to zero samples.
    #[error("No audio samples in {0}")]
    EmptySignal(String),
}
