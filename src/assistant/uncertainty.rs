//! Uncertainty detection over model responses.
//!
//! A static, lowercase substring scan against a configurable phrase list —
//! deliberately not a learned signal, so the set can be tuned and tested
//! independently of the model.

/// Default markers of an unconfident answer. All lowercase; matching is
/// case-insensitive substring containment.
pub fn default_phrases() -> Vec<String> {
    [
        "i don't know",
        "i do not know",
        "i cannot answer",
        "i can't answer",
        "i'm not sure",
        "i am not sure",
        "i don't have",
        "i do not have",
        "real-time",
        "real time",
        "up-to-date",
        "knowledge cutoff",
        "training data",
        "cannot access",
        "unable to access",
        "can't access",
        "cannot browse",
        "cannot search",
        "may be outdated",
        "most recent information",
        "latest information",
        "recommend checking",
        "suggest checking",
        "sorry",
        "apologize",
        "as an ai",
        "weather app",
        "weather website",
        "search engine",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Whether `text` contains any of the configured uncertainty markers.
pub fn is_uncertain(text: &str, phrases: &[String]) -> bool {
    if text.is_empty() || phrases.is_empty() {
        return false;
    }
    let lowered = text.to_lowercase();
    phrases.iter().any(|phrase| lowered.contains(phrase.as_str()))
}
