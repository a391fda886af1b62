// Audio decoding, windowing and per-window features for mirfeat.

pub mod analyzer;
pub mod decode;
pub mod error;
pub mod features;
pub mod fft;
pub mod window;

pub use analyzer::{AudioSource, RecordingAnalyzer, scan_sources};
pub use features::audio_registry;
pub use window::{AudioWindow, Recording};
