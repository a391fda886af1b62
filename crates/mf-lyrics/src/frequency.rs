use std::collections::HashMap;
use std::fmt;

use crate::song::SongLyrics;

/// Word frequencies over a set of songs, lowercased, most frequent first.
#[derive(Debug, Clone, PartialEq)]
pub struct WordFrequencyProfile {
    pub songs_with_lyrics: usize,
    pub songs_without_lyrics: usize,
    pub total_words: usize,
    /// `(word, count)`, by descending count then alphabetically.
    pub words: Vec<(String, usize)>,
}

impl WordFrequencyProfile {
    #[must_use]
    pub fn build(songs: &[SongLyrics]) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut total_words = 0;
        for song in songs {
            for word in song.words() {
                *counts.entry(word.to_lowercase()).or_insert(0) += 1;
                total_words += 1;
            }
        }
        let mut words: Vec<(String, usize)> = counts.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let songs_with_lyrics = songs.iter().filter(|s| s.has_lyrics()).count();
        Self {
            songs_with_lyrics,
            songs_without_lyrics: songs.len() - songs_with_lyrics,
            total_words,
            words,
        }
    }

    /// Share of all words taken by `count`, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self, count: usize) -> f64 {
        if self.total_words == 0 {
            return 0.0;
        }
        100.0 * count as f64 / self.total_words as f64
    }
}

impl fmt::Display for WordFrequencyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.songs_with_lyrics == 0 {
            return writeln!(f, "No text found in any of the provided files");
        }
        writeln!(f, "Songs with lyrics: {}", self.songs_with_lyrics)?;
        writeln!(f, "Songs without lyrics: {}", self.songs_without_lyrics)?;
        writeln!(f)?;
        writeln!(f, "Total words: {}", self.total_words)?;
        writeln!(f, "Unique words: {}", self.words.len())?;
        writeln!(f)?;
        for (word, count) in &self.words {
            writeln!(f, "{word}\t{count}\t{:.4}", self.percentage(*count))?;
        }
        Ok(())
    }
}
