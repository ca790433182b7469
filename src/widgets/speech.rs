//! Read-aloud preparation. Synthesis itself happens in the browser; this module
//! only cleans the text, picks a voice language and builds the script fragment.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const SPEECH_PITCH: f32 = 1.05;
pub const SPEECH_RATE: f32 = 0.95;

static EMOJI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}\x{1F1E0}-\x{1F1FF}\x{2500}-\x{2BEF}\x{2702}-\x{27B0}\x{24C2}-\x{1F251}]+"
    ).expect("emoji pattern is a valid regex")
});

const TAGALOG_MARKERS: &[&str] = &[
    "ang", "ng", "mga", "sa", "na", "ay", "ako", "ikaw", "ka", "ko", "mo", "siya", "kami",
    "tayo", "kayo", "sila", "natin", "namin", "nila", "hindi", "oo", "opo", "po", "naman",
    "lang", "talaga", "salamat", "kaya", "yan", "iyan", "ito", "dito", "nang", "din", "rin",
    "ba", "kung", "pero", "para", "may", "wala", "gusto", "sige", "ano", "bakit", "paano",
    "saan", "kailan", "kumusta", "maganda", "mahal", "galing", "kita", "akin", "iyo",
];

const ENGLISH_MARKERS: &[&str] = &[
    "the", "and", "is", "are", "you", "your", "to", "of", "a", "an", "in", "it", "that",
    "for", "with", "this", "be", "have", "i", "my", "we", "can", "will", "what", "how", "on",
    "not", "do", "so", "just", "here", "there", "great", "good",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Filipino,
    Other,
}

impl Language {
    /// Voice tag for the browser. Anything not Filipino is read as English.
    pub fn speech_tag(&self) -> &'static str {
        match self {
            Language::Filipino => "fil-PH",
            Language::Other => "en-US",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpeechError {
    #[error("no alphabetic text to detect a language from")]
    NoFeatures,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub lang: &'static str,
    pub pitch: f32,
    pub rate: f32,
}

impl SpeechRequest {
    /// Builds a read-aloud request from the raw assistant reply. Detection runs
    /// on the unmodified reply; undetectable text falls back to Filipino.
    pub fn from_reply(reply: &str) -> Self {
        let lang = detect_language(reply).unwrap_or(Language::Filipino);
        Self {
            text: remove_emojis(reply),
            lang: lang.speech_tag(),
            pitch: SPEECH_PITCH,
            rate: SPEECH_RATE,
        }
    }

    pub fn to_script(&self) -> String {
        format!(
            "if ('speechSynthesis' in window) {{\n    const utterance = new SpeechSynthesisUtterance(\"{}\");\n    utterance.lang = \"{}\";\n    utterance.pitch = {};\n    utterance.rate = {};\n    speechSynthesis.speak(utterance);\n}} else {{\n    alert('Speech synthesis not supported in this browser.');\n}}",
            js_escape(&self.text),
            self.lang,
            self.pitch,
            self.rate
        )
    }
}

pub fn remove_emojis(text: &str) -> String {
    EMOJI_PATTERN.replace_all(text, "").into_owned()
}

/// Escapes text for a double-quoted JS string literal. Line breaks become spaces.
pub fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', " ").replace('\r', " ")
}

/// Best-effort Tagalog/Filipino detection by function-word frequency.
pub fn detect_language(text: &str) -> Result<Language, SpeechError> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphabetic() && c != '\'')
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty() {
        return Err(SpeechError::NoFeatures);
    }

    let tagalog = words
        .iter()
        .filter(|w| TAGALOG_MARKERS.contains(w))
        .count();
    let english = words
        .iter()
        .filter(|w| ENGLISH_MARKERS.contains(w))
        .count();

    if tagalog > 0 && tagalog >= english {
        Ok(Language::Filipino)
    } else {
        Ok(Language::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_emoji_and_is_idempotent() {
        let raw = "Great job, Alexie! 🎉💪 Keep going 🌟";
        let once = remove_emojis(raw);
        assert_eq!(once, "Great job, Alexie!  Keep going ");
        assert_eq!(remove_emojis(&once), once);
    }

    #[test]
    fn escapes_quotes_backslashes_and_newlines() {
        assert_eq!(js_escape("say \"hi\"\\\nnow\r"), "say \\\"hi\\\"\\\\ now ");
    }

    #[test]
    fn detects_tagalog_and_english() {
        assert_eq!(detect_language("Kaya mo yan, Alexie! Keep pushing forward!"), Ok(Language::Filipino));
        assert_eq!(detect_language("Hi there! How can I help you today?"), Ok(Language::Other));
    }

    #[test]
    fn detection_fails_without_words() {
        assert_eq!(detect_language("🎉 123 !!"), Err(SpeechError::NoFeatures));
    }

    #[test]
    fn undetectable_reply_falls_back_to_filipino() {
        let request = SpeechRequest::from_reply("💖💖");
        assert_eq!(request.lang, "fil-PH");
        assert_eq!(request.text, "");
    }

    #[test]
    fn english_reply_builds_escaped_script() {
        let request = SpeechRequest::from_reply("You can do \"this\" 💪");
        assert_eq!(request.lang, "en-US");
        let script = request.to_script();
        assert!(script.contains("new SpeechSynthesisUtterance(\"You can do \\\"this\\\" \")"));
        assert!(script.contains("utterance.lang = \"en-US\""));
        assert!(script.contains("utterance.rate = 0.95"));
    }
}
