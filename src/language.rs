use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Languages snippets can be requested for.
///
/// Display and serde names match the values stored with results, so a record
/// written by one client reads back the same in another.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Default,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
pub enum CodeLanguage {
    #[default]
    #[value(name = "javascript", alias = "js")]
    JavaScript,
    #[value(name = "python", alias = "py")]
    Python,
    #[serde(rename = "C++")]
    #[strum(to_string = "C++")]
    #[value(name = "cpp", alias = "c++")]
    Cpp,
    #[value(name = "java")]
    Java,
    #[value(name = "go")]
    Go,
    #[value(name = "rust", alias = "rs")]
    Rust,
}

impl CodeLanguage {
    pub const ALL: [CodeLanguage; 6] = [
        CodeLanguage::JavaScript,
        CodeLanguage::Python,
        CodeLanguage::Cpp,
        CodeLanguage::Java,
        CodeLanguage::Go,
        CodeLanguage::Rust,
    ];

    /// Lowercase identifier used for file names and CLI values
    pub fn slug(&self) -> &'static str {
        match self {
            CodeLanguage::JavaScript => "javascript",
            CodeLanguage::Python => "python",
            CodeLanguage::Cpp => "cpp",
            CodeLanguage::Java => "java",
            CodeLanguage::Go => "go",
            CodeLanguage::Rust => "rust",
        }
    }

    /// Parse a display name ("C++") or slug ("cpp"), case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let needle = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.slug() == needle || lang.to_string().to_lowercase() == needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_match_stored_values() {
        let names: Vec<String> = CodeLanguage::ALL.iter().map(|l| l.to_string()).collect();
        assert_eq!(names, ["JavaScript", "Python", "C++", "Java", "Go", "Rust"]);
    }

    #[test]
    fn serde_uses_display_names() {
        let json = serde_json::to_string(&CodeLanguage::Cpp).unwrap();
        assert_eq!(json, "\"C++\"");

        let lang: CodeLanguage = serde_json::from_str("\"JavaScript\"").unwrap();
        assert_eq!(lang, CodeLanguage::JavaScript);
    }

    #[test]
    fn from_name_accepts_slug_and_display_name() {
        assert_eq!(CodeLanguage::from_name("c++"), Some(CodeLanguage::Cpp));
        assert_eq!(CodeLanguage::from_name("cpp"), Some(CodeLanguage::Cpp));
        assert_eq!(CodeLanguage::from_name(" Go "), Some(CodeLanguage::Go));
        assert_eq!(CodeLanguage::from_name("cobol"), None);
    }

    #[test]
    fn cli_value_names() {
        let value = CodeLanguage::from_str("cpp", true).unwrap();
        assert_eq!(value, CodeLanguage::Cpp);
        let alias = CodeLanguage::from_str("js", true).unwrap();
        assert_eq!(alias, CodeLanguage::JavaScript);
    }
}
