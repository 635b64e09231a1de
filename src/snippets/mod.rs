use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::error::SnippetError;
use crate::language::CodeLanguage;

static SNIPPET_DIR: Dir = include_dir!("src/snippets");

/// Code to be reproduced in one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub code: String,
    pub language: CodeLanguage,
    pub placeholder: bool,
}

impl Snippet {
    pub fn new(code: impl Into<String>, language: CodeLanguage) -> Self {
        Self {
            code: code.into(),
            language,
            placeholder: false,
        }
    }

    /// Stand-in used when the provider fails, so typing can continue.
    pub fn placeholder(language: CodeLanguage) -> Self {
        let code = format!(
            "// [offline] no {language} snippet could be loaded.\n// Practice on this one while the provider recovers.\n\nfunction hello() {{\n  console.log(\"Hello World\");\n}}"
        );
        Self {
            code,
            language,
            placeholder: true,
        }
    }
}

/// Anything that can hand out snippets for a language
pub trait SnippetSource: Send + Sync {
    fn get_snippet(&self, language: CodeLanguage) -> Result<Snippet, SnippetError>;
}

#[derive(Deserialize, Clone, Debug)]
struct Corpus {
    language: CodeLanguage,
    snippets: Vec<String>,
}

/// Snippets compiled into the binary, one JSON corpus per language.
#[derive(Debug, Clone)]
pub struct EmbeddedSnippets {
    corpora: Vec<Corpus>,
}

impl EmbeddedSnippets {
    pub fn new() -> Self {
        let corpora = CodeLanguage::ALL
            .iter()
            .filter_map(|lang| match read_corpus(lang.slug()) {
                Ok(corpus) => Some(corpus),
                Err(e) => {
                    tracing::warn!(language = %lang, error = %e, "skipping snippet corpus");
                    None
                }
            })
            .collect();
        Self { corpora }
    }

    pub fn snippets_for(&self, language: CodeLanguage) -> &[String] {
        self.corpora
            .iter()
            .find(|c| c.language == language)
            .map(|c| c.snippets.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for EmbeddedSnippets {
    fn default() -> Self {
        Self::new()
    }
}

impl SnippetSource for EmbeddedSnippets {
    fn get_snippet(&self, language: CodeLanguage) -> Result<Snippet, SnippetError> {
        let rng = &mut rand::thread_rng();
        self.snippets_for(language)
            .choose(rng)
            .map(|code| Snippet::new(code.clone(), language))
            .ok_or(SnippetError::Empty(language))
    }
}

fn read_corpus(slug: &str) -> Result<Corpus, SnippetError> {
    let file = SNIPPET_DIR
        .get_file(format!("{slug}.json"))
        .ok_or_else(|| SnippetError::Unavailable(format!("missing corpus {slug}.json")))?;

    let contents = file
        .contents_utf8()
        .ok_or_else(|| SnippetError::Unavailable(format!("{slug}.json is not utf-8")))?;

    serde_json::from_str(contents).map_err(|e| SnippetError::Unavailable(e.to_string()))
}

/// Always returns the same code; used for custom prompts.
#[derive(Debug, Clone)]
pub struct FixedSnippet {
    code: String,
}

impl FixedSnippet {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl SnippetSource for FixedSnippet {
    fn get_snippet(&self, language: CodeLanguage) -> Result<Snippet, SnippetError> {
        if self.code.is_empty() {
            return Err(SnippetError::Empty(language));
        }
        Ok(Snippet::new(self.code.clone(), language))
    }
}
