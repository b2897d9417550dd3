//! The fixed instruction sent alongside every medicine photo.

use serde::{Deserialize, Serialize};

const PROMPT_EN: &str = "What medicine is this? Write a summary of it in English for first responders, \
including: a one-sentence introduction, main uses, contraindications, the usual dosage in an \
emergency, and key side effects. If the image is unclear or the medicine cannot be identified, \
say so directly.";

const PROMPT_ZH: &str = "这是什么药品？请用中文为急救人员提供一份关于它的摘要，包括：一句话简介、主要用途、禁忌症、紧急情况下的常用剂量和关键副作用。如果图片不清晰或无法识别，请直接说明。";

/// Language the summary is requested in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptLanguage {
    /// English summary.
    #[default]
    #[serde(rename = "en")]
    English,
    /// Simplified Chinese summary.
    #[serde(rename = "zh")]
    Chinese,
}

impl PromptLanguage {
    /// Returns the short language code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Chinese => "zh",
        }
    }

    /// Parses a language code such as `en` or `zh-CN`.
    pub fn from_code(code: &str) -> Option<Self> {
        let lower = code.to_lowercase();
        match lower.split(['-', '_']).next().unwrap_or("") {
            "en" => Some(Self::English),
            "zh" => Some(Self::Chinese),
            _ => None,
        }
    }

    /// Returns the prompt text for this language.
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::English => PROMPT_EN,
            Self::Chinese => PROMPT_ZH,
        }
    }
}

impl std::fmt::Display for PromptLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
