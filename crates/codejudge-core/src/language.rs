use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    JavaScript,
    Cpp,
    Java,
}

impl Language {
    pub fn label(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::Cpp => "C++",
            Language::Java => "Java",
        }
    }

    /// Identifier the execution service knows this language by.
    pub fn runtime_name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Cpp => "c++",
            Language::Java => "java",
        }
    }

    /// Inserted between the candidate source and the synthesized driver.
    pub fn statement_separator(&self) -> &'static str {
        match self {
            Language::Python => "\n\n",
            Language::JavaScript => ";\n\n",
            Language::Cpp | Language::Java => "\n\n",
        }
    }

    /// Source file name the composed program is uploaded as.
    pub fn file_name(&self) -> &'static str {
        match self {
            Language::Python => "main.py",
            Language::JavaScript => "main.js",
            Language::Cpp => "main.cpp",
            Language::Java => "Main.java",
        }
    }

    pub fn line_comment(&self) -> &'static str {
        match self {
            Language::Python => "#",
            Language::JavaScript | Language::Cpp | Language::Java => "//",
        }
    }

    pub fn fence_tag(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Cpp => "cpp",
            Language::Java => "java",
        }
    }

    pub fn all() -> &'static [Language] {
        &[
            Language::Python,
            Language::JavaScript,
            Language::Cpp,
            Language::Java,
        ]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.runtime_name())
    }
}

impl FromStr for Language {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" | "python3" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "cpp" | "c++" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            other => Err(ExecutionError::Config(format!(
                "unsupported language: {}",
                other
            ))),
        }
    }
}

/// Exact interpreter/compiler pinned for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runtime {
    pub language: String,
    pub version: String,
}

impl Runtime {
    pub fn new(language: &str, version: &str) -> Self {
        Self {
            language: language.to_string(),
            version: version.to_string(),
        }
    }
}

/// Language → runtime lookup, loaded once and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeTable {
    entries: BTreeMap<Language, Runtime>,
}

impl RuntimeTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn with(mut self, language: Language, version: &str) -> Self {
        self.insert(language, version);
        self
    }

    pub fn insert(&mut self, language: Language, version: &str) {
        self.entries
            .insert(language, Runtime::new(language.runtime_name(), version));
    }

    pub fn resolve(&self, language: Language) -> Result<&Runtime, ExecutionError> {
        self.entries.get(&language).ok_or_else(|| {
            ExecutionError::Config(format!("no runtime registered for {}", language))
        })
    }

    pub fn languages(&self) -> Vec<Language> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Language, &Runtime)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RuntimeTable {
    fn default() -> Self {
        Self::empty()
            .with(Language::Python, "3.10.0")
            .with(Language::JavaScript, "18.15.0")
            .with(Language::Cpp, "10.2.0")
            .with(Language::Java, "15.0.2")
    }
}
