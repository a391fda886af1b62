use mf_core::engine::ExternalData;
use mf_core::error::CoreError;

/// A named keyword list matched against lyrics, case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordProfile {
    name: String,
    keywords: Vec<String>,
}

impl WordProfile {
    /// # Errors
    /// Returns [`CoreError::Configuration`] if the name is blank or there
    /// are no keywords.
    pub fn new(name: impl Into<String>, keywords: Vec<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::config("word profile with an empty name"));
        }
        if keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(CoreError::config(format!("word profile '{name}' has no keywords")));
        }
        Ok(Self { name, keywords })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Name of the feature matching this profile.
    #[must_use]
    pub fn feature_name(&self) -> String {
        format!("Word Profile Match {}", self.name)
    }

    /// Key under which the keywords are handed to the engine.
    #[must_use]
    pub fn external_key(&self) -> String {
        format!("Word Profile: {}", self.name)
    }

    /// Genre profiles shipped with the tool.
    #[must_use]
    pub fn builtin() -> Vec<Self> {
        BUILTIN
            .iter()
            .map(|(name, words)| Self {
                name: (*name).to_string(),
                keywords: words.iter().map(|w| (*w).to_string()).collect(),
            })
            .collect()
    }

    /// Built-in profiles followed by `extra`; an extra profile replaces a
    /// built-in one of the same name.
    #[must_use]
    pub fn with_builtin(extra: Vec<Self>) -> Vec<Self> {
        let mut all: Vec<Self> = Self::builtin()
            .into_iter()
            .filter(|b| !extra.iter().any(|e| e.name == b.name))
            .collect();
        all.extend(extra);
        all
    }
}

/// Keyword lists of `profiles`, keyed for the extraction engine.
#[must_use]
pub fn profile_data(profiles: &[WordProfile]) -> ExternalData {
    profiles
        .iter()
        .map(|p| (p.external_key(), p.keywords.clone()))
        .collect()
}

const BUILTIN: &[(&str, &[&str])] = &[
    (
        "Traditional Blues",
        &[
            "ain't", "baby", "baby,", "blues", "boy", "child", "child,", "evil", "gonna", "hot",
            "lord,", "love", "mojo", "oh", "old", "red", "tamales", "working", "worried", "yeah",
        ],
    ),
    (
        "Modern Blues",
        &[
            "'cause", "ain't", "baby", "baby,", "bad", "blues", "down", "feel", "gonna", "little",
            "lord", "love", "shame", "wanna", "woman", "wrong", "yeah", "yeah,",
        ],
    ),
    (
        "Classical",
        &[
            "auf", "bist", "dein", "dich", "die", "dies", "du", "dum", "et", "finde", "gott",
            "herz", "ich", "ihn", "ist", "la", "le", "mein", "mi", "mir", "nach", "nicht", "thy",
            "und",
        ],
    ),
    (
        "Jazz",
        &[
            "ain't", "baby", "blue", "cheek", "good", "heart", "love", "never", "please", "right",
        ],
    ),
    (
        "Rap",
        &[
            "'em", "ain't", "cuz", "gonna", "gotta", "hit", "like", "money", "wanna", "wit",
            "y'all", "ya", "yeah", "yo",
        ],
    ),
    (
        "Metal",
        &[
            "'cause", "ain't", "anger", "battery", "bleed", "blood", "dead", "death", "die", "end",
            "eyes", "fear", "fire", "god", "gonna", "hate", "heaven's", "human", "kill", "lie",
            "life", "night", "oh", "ooh", "shoot", "tick", "world", "yeah", "yeah!",
        ],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_builtin_profiles() {
        let names: Vec<_> = WordProfile::builtin().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["Traditional Blues", "Modern Blues", "Classical", "Jazz", "Rap", "Metal"]
        );
    }

    #[test]
    fn empty_profiles_rejected() {
        assert!(WordProfile::new("", vec!["a".into()]).is_err());
        assert!(WordProfile::new("Folk", vec![]).is_err());
        assert!(WordProfile::new("Folk", vec![" ".into()]).is_err());
    }

    #[test]
    fn extra_profile_overrides_builtin() {
        let jazz = WordProfile::new("Jazz", vec!["swing".into()]).unwrap();
        let all = WordProfile::with_builtin(vec![jazz]);
        assert_eq!(all.len(), 6);
        let last = all.last().unwrap();
        assert_eq!(last.name(), "Jazz");
        assert_eq!(last.keywords(), ["swing"]);
        let data = profile_data(&all);
        assert_eq!(data["Word Profile: Jazz"], vec!["swing".to_string()]);
    }
}
