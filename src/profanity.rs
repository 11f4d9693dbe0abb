use log::debug;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Built-in word/phrase list, roughly ordered by how often each shows up in dialogue.
pub const DEFAULT_MATCHING_WORDS: &[&str] = &[
    "fucking",
    "fuck",
    "shit",
    "damn",
    "hell",
    "ass",
    "bitch",
    "bastard",
    "bullshit",
    "fucker",
    "fucked",
    "asshole",
    "piss",
    "jesus christ",
    "jesus",
    "sex",
    "pussy",
    "son of a bitch",
    "sonofabitch",
    "jackass",
    "smartass",
    "tits",
    "whore",
    "cunt",
    "slut",
    "boobs",
    "orgasm",
    "penis",
    "blowjob",
    "handjob",
    "hard on",
    "cocksucker",
    "dipshit",
    "horseshit",
    "jack off",
    "nympho",
    "rape",
    "fuckface",
    "skank",
    "shitspray",
    "bitches",
    "nigga",
    "nigger",
    "dickhead",
    "prick",
    "arsehole",
    "motherfucker",
    "goddamn",
    "shithead",
    "douchebag",
    "fag",
    "faggot",
];

/// Everything except word characters, whitespace and apostrophes.
static STRIP_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s']").expect("static pattern is valid"));

/// The default list as owned strings, for config defaults.
pub fn default_matching_words() -> Vec<String> {
    DEFAULT_MATCHING_WORDS.iter().map(|w| w.to_string()).collect()
}

/// Strip punctuation (keeping apostrophes) and lower-case subtitle text.
/// Typographic apostrophes count as apostrophes.
pub fn clean_subtitle_text(text: &str) -> String {
    let text = text.replace(&['\u{2019}', '\u{2018}'][..], "'");
    STRIP_PUNCTUATION.replace_all(&text, "").to_lowercase()
}

/// Case-insensitive whole-word matcher over a fixed word list.
///
/// Every entry is escaped literally and the alternation is anchored on word
/// boundaries, so "ass" never fires inside "assistant". An empty list yields
/// a matcher that matches nothing.
#[derive(Debug, Clone)]
pub struct ProfanityMatcher {
    pattern: Option<Regex>,
    word_count: usize,
}

impl ProfanityMatcher {
    pub fn new<S: AsRef<str>>(words: &[S]) -> Self {
        let alternatives: Vec<String> = words
            .iter()
            .map(|w| w.as_ref().trim())
            .filter(|w| !w.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            return Self {
                pattern: None,
                word_count: 0,
            };
        }

        let source = format!(r"\b(?:{})\b", alternatives.join("|"));
        // Escaped literals joined by '|' always form a valid pattern; the size
        // limit is the only way this can fail, in which case we match nothing.
        let pattern = match RegexBuilder::new(&source).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(e) => {
                log::error!("Failed to compile profanity pattern: {}", e);
                None
            }
        };

        Self {
            word_count: alternatives.len(),
            pattern,
        }
    }

    /// Number of non-blank entries the matcher was built from
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Match against text that has already gone through [`clean_subtitle_text`]
    pub fn matches_cleaned(&self, cleaned: &str) -> bool {
        self.pattern
            .as_ref()
            .map(|re| re.is_match(cleaned))
            .unwrap_or(false)
    }

    /// Clean a raw dialogue line and test it
    pub fn is_profane(&self, text: &str) -> bool {
        let cleaned = clean_subtitle_text(text);
        let hit = self.matches_cleaned(&cleaned);
        if hit {
            debug!("Profanity match in: \"{}\"", cleaned);
        }
        hit
    }
}

impl Default for ProfanityMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCHING_WORDS)
    }
}
