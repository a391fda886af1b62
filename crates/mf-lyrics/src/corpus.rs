use std::path::Path;

use anyhow::Result;
use mf_core::corpus::{item_id, scan_files};

use crate::song::SongLyrics;

pub const LYRICS_EXTENSIONS: &[&str] = &["txt"];

/// Parses every `.txt` file under `root` (or `root` itself if it is a file).
///
/// # Errors
/// Returns an error if nothing is found or a file cannot be read.
pub fn load_corpus(root: &Path) -> Result<Vec<SongLyrics>> {
    let songs = scan_files(root, LYRICS_EXTENSIONS)?
        .iter()
        .map(|path| SongLyrics::from_file(item_id(root, path), path))
        .collect::<Result<Vec<_>>>()?;
    let empty = songs.iter().filter(|s| !s.has_lyrics()).count();
    if empty > 0 {
        log::info!("{empty} of {} lyrics file(s) are empty", songs.len());
    }
    Ok(songs)
}
