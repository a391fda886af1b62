//! Whole-song lyric features.
//!
//! Every feature yields one value per song. Songs without lyrics get 0, and
//! ratios whose denominator is 0 are 0 rather than NaN.

use std::collections::HashSet;
use std::sync::Arc;

use mf_core::aggregator::sample_variance;
use mf_core::descriptor::FeatureDescriptor;
use mf_core::error::CoreError;
use mf_core::registry::FeatureRegistry;
use mf_core::traits::{FeatureExtractor, FeatureInputs};

use crate::profile::WordProfile;
use crate::song::SongLyrics;

pub const CONTAINS_WORDS: &str = "Contains Words";
pub const NUMBER_OF_WORDS: &str = "Number of Words";
pub const NUMBER_OF_UNIQUE_WORDS: &str = "Number of Unique Words";
pub const WORD_VARIETY: &str = "Word Variety";
pub const LETTERS_PER_WORD_AVERAGE: &str = "Letters Per Word Average";
pub const LETTERS_PER_WORD_VARIANCE: &str = "Letters Per Word Variance";
pub const NUMBER_OF_LINES: &str = "Number of Lines";
pub const WORDS_PER_LINE_AVERAGE: &str = "Words Per Line Average";
pub const WORDS_PER_LINE_VARIANCE: &str = "Words Per Line Variance";
pub const NUMBER_OF_SEGMENTS: &str = "Number of Segments";
pub const LINES_PER_SEGMENT_AVERAGE: &str = "Lines Per Segment Average";
pub const LINES_PER_SEGMENT_VARIANCE: &str = "Lines Per Segment Variance";
pub const AUTOMATED_READABILITY_INDEX: &str = "Automated Readability Index";

/// What a [`LyricFeature`] measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LyricMeasure {
    ContainsWords,
    NumberOfWords,
    NumberOfUniqueWords,
    WordVariety,
    LettersPerWordAverage,
    LettersPerWordVariance,
    NumberOfLines,
    WordsPerLineAverage,
    WordsPerLineVariance,
    NumberOfSegments,
    LinesPerSegmentAverage,
    LinesPerSegmentVariance,
    AutomatedReadabilityIndex,
}

impl LyricMeasure {
    pub const ALL: [Self; 13] = [
        Self::ContainsWords,
        Self::NumberOfWords,
        Self::NumberOfUniqueWords,
        Self::WordVariety,
        Self::LettersPerWordAverage,
        Self::LettersPerWordVariance,
        Self::NumberOfLines,
        Self::WordsPerLineAverage,
        Self::WordsPerLineVariance,
        Self::NumberOfSegments,
        Self::LinesPerSegmentAverage,
        Self::LinesPerSegmentVariance,
        Self::AutomatedReadabilityIndex,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::ContainsWords => CONTAINS_WORDS,
            Self::NumberOfWords => NUMBER_OF_WORDS,
            Self::NumberOfUniqueWords => NUMBER_OF_UNIQUE_WORDS,
            Self::WordVariety => WORD_VARIETY,
            Self::LettersPerWordAverage => LETTERS_PER_WORD_AVERAGE,
            Self::LettersPerWordVariance => LETTERS_PER_WORD_VARIANCE,
            Self::NumberOfLines => NUMBER_OF_LINES,
            Self::WordsPerLineAverage => WORDS_PER_LINE_AVERAGE,
            Self::WordsPerLineVariance => WORDS_PER_LINE_VARIANCE,
            Self::NumberOfSegments => NUMBER_OF_SEGMENTS,
            Self::LinesPerSegmentAverage => LINES_PER_SEGMENT_AVERAGE,
            Self::LinesPerSegmentVariance => LINES_PER_SEGMENT_VARIANCE,
            Self::AutomatedReadabilityIndex => AUTOMATED_READABILITY_INDEX,
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::ContainsWords => {
                "Whether there is at least one word of non-whitespace characters (1) or not (0)."
            }
            Self::NumberOfWords => {
                "The total number of words in the text, repeated words counted every time."
            }
            Self::NumberOfUniqueWords => {
                "The number of distinct words in the text. Case and punctuation make words distinct."
            }
            Self::WordVariety => "The number of words divided by the number of unique words.",
            Self::LettersPerWordAverage => {
                "The average number of characters per word, punctuation and digits included."
            }
            Self::LettersPerWordVariance => {
                "The variance of the number of characters per word, punctuation and digits included."
            }
            Self::NumberOfLines => "The number of lines in the text, blank lines excluded.",
            Self::WordsPerLineAverage => "The average number of words per non-blank line.",
            Self::WordsPerLineVariance => "The variance of the number of words per non-blank line.",
            Self::NumberOfSegments => {
                "The number of segments (verses, choruses...), separated by blank lines."
            }
            Self::LinesPerSegmentAverage => "The average number of lines per segment.",
            Self::LinesPerSegmentVariance => "The variance of the number of lines per segment.",
            Self::AutomatedReadabilityIndex => {
                "Automated Readability Index, an estimate of the grade level needed to \
                 understand the text, computed from characters per word and words per line."
            }
        }
    }

    fn dependencies(self) -> &'static [&'static str] {
        match self {
            Self::WordVariety => &[NUMBER_OF_WORDS, NUMBER_OF_UNIQUE_WORDS],
            Self::WordsPerLineAverage => &[NUMBER_OF_WORDS],
            Self::LinesPerSegmentAverage => &[NUMBER_OF_LINES, NUMBER_OF_SEGMENTS],
            Self::AutomatedReadabilityIndex => &[NUMBER_OF_WORDS, NUMBER_OF_LINES],
            _ => &[],
        }
    }
}

/// One of the fixed lyric features.
pub struct LyricFeature {
    measure: LyricMeasure,
    descriptor: FeatureDescriptor,
    dependencies: Vec<String>,
}

impl LyricFeature {
    #[must_use]
    pub fn new(measure: LyricMeasure) -> Self {
        Self {
            measure,
            descriptor: FeatureDescriptor::new(measure.name(), measure.description(), false, 1),
            dependencies: measure
                .dependencies()
                .iter()
                .map(|d| (*d).to_string())
                .collect(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn count(n: usize) -> f64 {
    n as f64
}

/// `num / den`, or 0 when `den` is 0.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

fn char_count(word: &str) -> usize {
    word.chars().count()
}

impl FeatureExtractor<SongLyrics> for LyricFeature {
    fn descriptor(&self) -> &FeatureDescriptor {
        &self.descriptor
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn extract(&self, song: &SongLyrics, inputs: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
        if !song.has_lyrics() {
            return Ok(Some(vec![0.0]));
        }
        let words = song.words();
        let value = match self.measure {
            LyricMeasure::ContainsWords => {
                if words.is_empty() {
                    0.0
                } else {
                    1.0
                }
            }
            LyricMeasure::NumberOfWords => count(words.len()),
            LyricMeasure::NumberOfUniqueWords => count(song.unique_word_count()),
            LyricMeasure::WordVariety => ratio(inputs.required(0)?[0], inputs.required(1)?[0]),
            LyricMeasure::LettersPerWordAverage => {
                let letters: usize = words.iter().map(|w| char_count(w)).sum();
                ratio(count(letters), count(words.len()))
            }
            LyricMeasure::LettersPerWordVariance => {
                let lengths: Vec<f64> = words.iter().map(|w| count(char_count(w))).collect();
                sample_variance(&lengths)
            }
            LyricMeasure::NumberOfLines => count(song.lines().len()),
            LyricMeasure::WordsPerLineAverage => {
                ratio(inputs.required(0)?[0], count(song.lines().len()))
            }
            LyricMeasure::WordsPerLineVariance => {
                let per_line: Vec<f64> = song
                    .lines()
                    .iter()
                    .map(|l| count(l.split_whitespace().count()))
                    .collect();
                sample_variance(&per_line)
            }
            LyricMeasure::NumberOfSegments => count(song.segments().len()),
            LyricMeasure::LinesPerSegmentAverage => {
                ratio(inputs.required(0)?[0], inputs.required(1)?[0])
            }
            LyricMeasure::LinesPerSegmentVariance => {
                let per_segment: Vec<f64> =
                    song.segments().iter().map(|s| count(s.len())).collect();
                sample_variance(&per_segment)
            }
            LyricMeasure::AutomatedReadabilityIndex => {
                let words_n = inputs.required(0)?[0];
                let lines_n = inputs.required(1)?[0];
                if words_n == 0.0 || lines_n == 0.0 {
                    0.0
                } else {
                    let letters: usize = words.iter().map(|w| char_count(w)).sum();
                    4.71 * (count(letters) / words_n) + 0.5 * (words_n / lines_n) - 21.43
                }
            }
        };
        Ok(Some(vec![value]))
    }
}

/// Percentage of a song's words found in a keyword profile.
pub struct WordProfileMatch {
    descriptor: FeatureDescriptor,
    dependencies: Vec<String>,
    external: Vec<String>,
}

impl WordProfileMatch {
    #[must_use]
    pub fn new(profile: &WordProfile) -> Self {
        let description = format!(
            "The percentage of words in the text found in the '{}' keyword list, over all \
             words rather than unique ones. Case is ignored. The keywords are: {}.",
            profile.name(),
            profile.keywords().join(" ")
        );
        Self {
            descriptor: FeatureDescriptor::new(profile.feature_name(), description, false, 1),
            dependencies: vec![NUMBER_OF_WORDS.to_string()],
            external: vec![profile.external_key()],
        }
    }
}

impl FeatureExtractor<SongLyrics> for WordProfileMatch {
    fn descriptor(&self) -> &FeatureDescriptor {
        &self.descriptor
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn external_dependencies(&self) -> &[String] {
        &self.external
    }

    fn extract(&self, song: &SongLyrics, inputs: &FeatureInputs<'_>) -> anyhow::Result<Option<Vec<f64>>> {
        if !song.has_lyrics() {
            return Ok(Some(vec![0.0]));
        }
        let keywords: HashSet<String> = inputs.external(0).iter().map(|k| k.to_lowercase()).collect();
        if keywords.is_empty() {
            anyhow::bail!("keyword list is empty");
        }
        let total = inputs.required(0)?[0];
        let matches = song
            .words()
            .iter()
            .filter(|w| keywords.contains(&w.to_lowercase()))
            .count();
        Ok(Some(vec![ratio(100.0 * count(matches), total)]))
    }
}

/// Registry of every lyric feature plus one profile match per profile.
///
/// # Errors
/// Returns an error if two profiles share a name.
///
/// # Example
/// ```
/// use mf_lyrics::features::lyrics_registry;
/// use mf_lyrics::profile::WordProfile;
/// let registry = lyrics_registry(&WordProfile::builtin()).unwrap();
/// assert_eq!(registry.len(), 19);
/// ```
pub fn lyrics_registry(profiles: &[WordProfile]) -> Result<FeatureRegistry<SongLyrics>, CoreError> {
    let mut registry = FeatureRegistry::new();
    for measure in LyricMeasure::ALL {
        registry.register(Arc::new(LyricFeature::new(measure)))?;
    }
    for profile in profiles {
        registry.register(Arc::new(WordProfileMatch::new(profile)))?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use mf_core::engine::ExtractionEngine;

    use super::*;
    use crate::profile::profile_data;

    const EPS: f64 = 1e-9;

    fn engine(profiles: &[WordProfile]) -> ExtractionEngine<SongLyrics> {
        let registry = lyrics_registry(profiles).unwrap();
        let selection = registry.select(&[]).unwrap();
        ExtractionEngine::new(selection.extractors, &profile_data(profiles)).unwrap()
    }

    fn value(e: &ExtractionEngine<SongLyrics>, song: &SongLyrics, name: &str) -> f64 {
        let m = e.extract_item(song).unwrap();
        m.get(0, e.position(name).unwrap()).unwrap()[0]
    }

    fn words(n: usize, distinct: usize) -> String {
        (0..n).map(|i| format!("w{}", i % distinct)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn word_counts_and_variety_across_items() {
        let e = engine(&[]);
        let songs = [
            SongLyrics::parse("one", &words(10, 5)),
            SongLyrics::parse("two", ""),
            SongLyrics::parse("three", &words(20, 4)),
        ];
        let counts: Vec<f64> = songs.iter().map(|s| value(&e, s, NUMBER_OF_WORDS)).collect();
        assert_eq!(counts, vec![10.0, 0.0, 20.0]);

        let variety: Vec<f64> = songs.iter().map(|s| value(&e, s, WORD_VARIETY)).collect();
        assert_eq!(variety, vec![2.0, 0.0, 5.0]);
    }

    #[test]
    fn whitespace_only_song_divides_safely() {
        let e = engine(&WordProfile::builtin());
        let song = SongLyrics::parse("blank", "   \n \n");
        let m = e.extract_item(&song).unwrap();
        for cell in &m.rows()[0] {
            let v = cell.as_ref().unwrap()[0];
            assert!(v.is_finite());
        }
        assert!(value(&e, &song, AUTOMATED_READABILITY_INDEX).abs() < EPS);
        assert!(value(&e, &song, WORDS_PER_LINE_AVERAGE).abs() < EPS);
    }

    #[test]
    fn line_and_segment_statistics() {
        let e = engine(&[]);
        let song = SongLyrics::parse("s", "a b c\nd\n\ne f\n");
        assert!((value(&e, &song, NUMBER_OF_LINES) - 3.0).abs() < EPS);
        assert!((value(&e, &song, NUMBER_OF_SEGMENTS) - 2.0).abs() < EPS);
        assert!((value(&e, &song, WORDS_PER_LINE_AVERAGE) - 2.0).abs() < EPS);
        // Words per line 3, 1, 2.
        assert!((value(&e, &song, WORDS_PER_LINE_VARIANCE) - 1.0).abs() < EPS);
        assert!((value(&e, &song, LINES_PER_SEGMENT_AVERAGE) - 1.5).abs() < EPS);
        assert!((value(&e, &song, LINES_PER_SEGMENT_VARIANCE) - 0.5).abs() < EPS);
        assert!((value(&e, &song, CONTAINS_WORDS) - 1.0).abs() < EPS);
    }

    #[test]
    fn letters_and_readability() {
        let e = engine(&[]);
        let song = SongLyrics::parse("s", "ab abcd\nabcdef");
        assert!((value(&e, &song, LETTERS_PER_WORD_AVERAGE) - 4.0).abs() < EPS);
        assert!((value(&e, &song, LETTERS_PER_WORD_VARIANCE) - 4.0).abs() < EPS);
        let expected = 4.71 * (12.0 / 3.0) + 0.5 * (3.0 / 2.0) - 21.43;
        assert!((value(&e, &song, AUTOMATED_READABILITY_INDEX) - expected).abs() < EPS);
    }

    #[test]
    fn profile_match_ignores_case() {
        let folk = WordProfile::new("Folk", vec!["River".into(), "home".into()]).unwrap();
        let e = engine(&[folk.clone()]);
        let song = SongLyrics::parse("s", "the river takes me HOME again");
        let v = value(&e, &song, &folk.feature_name());
        assert!((v - 100.0 * 2.0 / 6.0).abs() < EPS);
    }

    #[test]
    fn missing_profile_keywords_fail_engine_build() {
        let folk = WordProfile::new("Folk", vec!["river".into()]).unwrap();
        let registry = lyrics_registry(&[folk]).unwrap();
        let selection = registry.select(&[]).unwrap();
        let r = ExtractionEngine::new(selection.extractors, &Default::default());
        assert!(matches!(r, Err(CoreError::Configuration(_))));
    }

    #[test]
    fn duplicate_profile_names_rejected() {
        let a = WordProfile::new("Folk", vec!["x".into()]).unwrap();
        assert!(lyrics_registry(&[a.clone(), a]).is_err());
    }
}
