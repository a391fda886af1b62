//! Lyrics front end for mirfeat.
//!
//! Parses song texts, defines the lyric features and keyword profiles, and
//! builds word-frequency reports over a corpus.

pub mod corpus;
pub mod features;
pub mod frequency;
pub mod profile;
pub mod song;

pub use features::lyrics_registry;
pub use frequency::WordFrequencyProfile;
pub use profile::WordProfile;
pub use song::SongLyrics;
