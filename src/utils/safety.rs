use regex::{Regex, RegexBuilder};

/// Content safety rules for social posts.
///
/// The allow-list decides whether a post is shown at all; the block-list
/// masks individual words in posts that are shown.
#[derive(Debug, Clone)]
pub struct SafetyFilter {
    safe_words: Vec<String>,
    blocked: Option<Regex>,
}

impl SafetyFilter {
    pub fn new(safe_words: &[String], blocked_words: &[String]) -> Self {
        let safe_words = safe_words
            .iter()
            .map(|w| w.to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        let alternatives: Vec<String> = blocked_words
            .iter()
            .filter(|w| !w.is_empty())
            .map(|w| regex::escape(w))
            .collect();

        // The pattern is built from escaped literals, so it always compiles.
        let blocked = if alternatives.is_empty() {
            None
        } else {
            RegexBuilder::new(&alternatives.join("|"))
                .case_insensitive(true)
                .build()
                .ok()
        };

        Self {
            safe_words,
            blocked,
        }
    }

    /// True if the text contains at least one allow-listed word,
    /// case-insensitive substring match.
    pub fn is_safe(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.safe_words.iter().any(|w| lowered.contains(w.as_str()))
    }

    /// Replaces every blocked word with `***`.
    pub fn mask(&self, text: &str) -> String {
        match &self.blocked {
            Some(re) => re.replace_all(text, "***").into_owned(),
            None => text.to_string(),
        }
    }
}
