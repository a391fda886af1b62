use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mf_core::traits::Item;

/// The lyrics of one song, broken into words, lines and segments.
///
/// Words are maximal runs of non-whitespace characters. Lines are split on
/// `\r\n`, `\r` or `\n` with empty lines dropped. Segments are groups of
/// consecutive non-empty lines separated by empty ones.
///
/// # Example
/// ```
/// use mf_lyrics::song::SongLyrics;
/// let song = SongLyrics::parse("demo", "la la\nsing\n\nagain");
/// assert_eq!(song.words().len(), 4);
/// assert_eq!(song.lines().len(), 3);
/// assert_eq!(song.segments().len(), 2);
/// assert_eq!(song.unique_word_count(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SongLyrics {
    id: String,
    path: Option<PathBuf>,
    raw: Option<String>,
    words: Vec<String>,
    lines: Vec<String>,
    segments: Vec<Vec<String>>,
    word_counts: HashMap<String, usize>,
}

impl SongLyrics {
    /// Parses lyrics text. An empty text means the song has no lyrics.
    #[must_use]
    pub fn parse(id: impl Into<String>, text: &str) -> Self {
        let mut song = Self {
            id: id.into(),
            path: None,
            raw: None,
            words: Vec::new(),
            lines: Vec::new(),
            segments: Vec::new(),
            word_counts: HashMap::new(),
        };
        if text.is_empty() {
            return song;
        }

        song.words = text.split_whitespace().map(str::to_string).collect();
        for word in &song.words {
            *song.word_counts.entry(word.clone()).or_insert(0) += 1;
        }

        let mut current: Vec<String> = Vec::new();
        for line in split_lines(text) {
            if line.is_empty() {
                if !current.is_empty() {
                    song.segments.push(std::mem::take(&mut current));
                }
            } else {
                song.lines.push(line.to_string());
                current.push(line.to_string());
            }
        }
        if !current.is_empty() {
            song.segments.push(current);
        }

        song.raw = Some(text.to_string());
        song
    }

    /// Reads and parses a lyrics file. Bytes that are not valid UTF-8 are
    /// replaced with U+FFFD.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn from_file(id: impl Into<String>, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read lyrics from {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        if matches!(text, Cow::Owned(_)) {
            log::warn!("{} is not valid UTF-8, invalid bytes replaced", path.display());
        }
        let mut song = Self::parse(id, &text);
        song.path = Some(path.to_path_buf());
        Ok(song)
    }

    /// Whether the source text was non-empty.
    #[must_use]
    pub fn has_lyrics(&self) -> bool {
        self.raw.is_some()
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn words(&self) -> &[String] {
        &self.words
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn segments(&self) -> &[Vec<String>] {
        &self.segments
    }

    /// Occurrences of each distinct word (case-sensitive).
    #[must_use]
    pub fn word_counts(&self) -> &HashMap<String, usize> {
        &self.word_counts
    }

    #[must_use]
    pub fn unique_word_count(&self) -> usize {
        self.word_counts.len()
    }
}

impl Item for SongLyrics {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Splits on `\r\n`, `\r` or `\n`, keeping empty pieces.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let s = rest?;
        match s.find(['\r', '\n']) {
            Some(i) => {
                let skip = if s[i..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&s[i + skip..]);
                Some(&s[..i])
            }
            None => {
                rest = None;
                Some(s)
            }
        }
    })
}
