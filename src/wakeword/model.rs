//! Wake-word models and the preset catalog

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// Punctuation dropped from an utterance once the wake phrase is removed
const UTTERANCE_PUNCTUATION: [char; 10] = ['，', '。', ',', '.', '!', '！', '?', '？', '\n', '\t'];

/// A named set of trigger phrases
///
/// Phrases match case-insensitively as substrings of a transcript, tried in
/// order; the first hit wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeWordModel {
    /// Model id, e.g. `jarvis-en`
    pub id: String,
    /// Trigger phrases in match order
    pub trigger_phrases: Vec<String>,
}

impl WakeWordModel {
    /// Build a model from an id and its phrases
    pub fn new<I, S>(id: impl Into<String>, trigger_phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        WakeWordModel {
            id: id.into(),
            trigger_phrases: trigger_phrases.into_iter().map(Into::into).collect(),
        }
    }

    /// The built-in catalog
    pub fn presets() -> Vec<WakeWordModel> {
        vec![
            WakeWordModel::new(
                "jarvis-cn",
                [
                    "你好贾维斯",
                    "嘿贾维斯",
                    "贾维斯",
                    "杰维斯",
                    "jarvis",
                    "javis",
                    "hey jarvis",
                    "hey javis",
                ],
            ),
            WakeWordModel::new(
                "jarvis-en",
                ["hey jarvis", "ok jarvis", "jarvis", "hey javis", "ok javis", "javis"],
            ),
            WakeWordModel::new("solituder-cn", ["你好孤旅", "孤旅助手"]),
            WakeWordModel::new("solituder-en", ["hello solituder", "ok solituder"]),
        ]
    }

    /// Look a preset up by id
    pub fn find(id: &str) -> Option<WakeWordModel> {
        Self::presets().into_iter().find(|m| m.id == id)
    }

    /// First trigger phrase contained in `transcript`
    pub fn first_match(&self, transcript: &str) -> Option<&str> {
        let normalized = transcript.trim().to_lowercase();
        self.trigger_phrases
            .iter()
            .find(|phrase| normalized.contains(&phrase.to_lowercase()))
            .map(String::as_str)
    }
}

/// Remove a model's trigger phrases from an utterance
///
/// Phrases are removed case-insensitively (longest first, so "hey jarvis"
/// does not leave a stray "hey"), punctuation becomes whitespace, and runs
/// of whitespace collapse to one space.
pub fn strip_wake_phrases(transcript: &str, model: &WakeWordModel) -> String {
    let mut phrases: Vec<&str> = model
        .trigger_phrases
        .iter()
        .map(String::as_str)
        .filter(|p| !p.trim().is_empty())
        .collect();
    phrases.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));

    let stripped = if phrases.is_empty() {
        transcript.to_string()
    } else {
        let alternation = phrases
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        match RegexBuilder::new(&alternation).case_insensitive(true).build() {
            Ok(pattern) => pattern.replace_all(transcript, " ").into_owned(),
            Err(_) => transcript.to_string(),
        }
    };

    stripped
        .replace(&UTTERANCE_PUNCTUATION[..], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_catalog() {
        let ids: Vec<String> = WakeWordModel::presets().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["jarvis-cn", "jarvis-en", "solituder-cn", "solituder-en"]);
        assert!(WakeWordModel::find("jarvis-en").is_some());
        assert!(WakeWordModel::find("alexa").is_none());
    }

    #[test]
    fn test_first_match_in_catalog_order() {
        let model = WakeWordModel::find("jarvis-en").unwrap();
        assert_eq!(model.first_match("  HEY Jarvis, lights on "), Some("hey jarvis"));
        assert_eq!(model.first_match("jarvis?"), Some("jarvis"));
        assert_eq!(model.first_match("good morning"), None);

        let cn = WakeWordModel::find("jarvis-cn").unwrap();
        assert_eq!(cn.first_match("你好贾维斯，今天天气怎么样"), Some("你好贾维斯"));
        // "jarvis" precedes "hey jarvis" in this model
        assert_eq!(cn.first_match("hey jarvis"), Some("jarvis"));
    }

    #[test]
    fn test_strip_wake_phrases() {
        let en = WakeWordModel::find("jarvis-en").unwrap();
        assert_eq!(
            strip_wake_phrases("Hey Jarvis, what's on my calendar?", &en),
            "what's on my calendar"
        );

        let cn = WakeWordModel::find("jarvis-cn").unwrap();
        assert_eq!(strip_wake_phrases("你好贾维斯，今天天气怎么样？", &cn), "今天天气怎么样");
        assert_eq!(strip_wake_phrases("hey jarvis", &cn), "");
    }
}
