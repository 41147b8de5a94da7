//! Heuristic task complexity classification.
//!
//! Shared by the planner (which skips the planning call for simple
//! prompts) and by [`select_strategy`](crate::strategy::select_strategy).
//! Rules, first match wins:
//!
//! 1. any image phrase → [`TaskComplexity::Image`]
//! 2. any complex phrase, or more than 50 words → [`TaskComplexity::Complex`]
//! 3. any moderate phrase, or more than 20 words → [`TaskComplexity::Moderate`]
//! 4. otherwise → [`TaskComplexity::Simple`]
//!
//! Phrases match as case-insensitive substrings.

use std::fmt;
use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};

/// Word count above which a prompt is at least moderate.
pub const MODERATE_WORD_THRESHOLD: usize = 20;
/// Word count above which a prompt is complex.
pub const COMPLEX_WORD_THRESHOLD: usize = 50;

const IMAGE_PHRASES: &[&str] = &[
    "image",
    "picture",
    "photo",
    "screenshot",
    "diagram",
    "what is in this",
    "describe this image",
    "analyze this photo",
    "look at this",
    "what do you see",
];

const COMPLEX_PHRASES: &[&str] = &[
    "analyze",
    "critique",
    "plan",
    "design",
    "create a system",
    "build",
    "implement",
    "step by step",
    "how would you",
    "develop",
    "architecture",
    "break down",
    "organize",
    "pros and cons",
    "trade-offs",
    "compare and contrast",
    "write code",
    "debug",
    "refactor",
    "explain the reasoning",
    "philosophy",
    "ethical",
    "strategy",
    "think through",
];

const MODERATE_PHRASES: &[&str] = &[
    "explain",
    "describe",
    "summarize",
    "write",
    "generate",
    "list",
    "compare",
    "what are",
    "how to",
    "create",
];

/// Complexity label attached to every plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskComplexity {
    Simple,
    Moderate,
    Complex,
    Image,
}

impl TaskComplexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for TaskComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// A phrase set compiled into an automaton, with a linear scan as backup
/// if the automaton could not be built.
struct PhraseSet {
    phrases: &'static [&'static str],
    automaton: Option<AhoCorasick>,
}

impl PhraseSet {
    fn new(name: &str, phrases: &'static [&'static str]) -> Self {
        let automaton = match AhoCorasick::new(phrases) {
            Ok(ac) => Some(ac),
            Err(e) => {
                tracing::error!(set = name, error = %e, "failed to build aho-corasick automaton");
                None
            }
        };
        Self { phrases, automaton }
    }

    /// `haystack` must already be lowercase.
    fn is_match(&self, haystack: &str) -> bool {
        match &self.automaton {
            Some(ac) => ac.is_match(haystack),
            None => self.phrases.iter().any(|p| haystack.contains(p)),
        }
    }
}

struct Classifier {
    image: PhraseSet,
    complex: PhraseSet,
    moderate: PhraseSet,
}

static CLASSIFIER: LazyLock<Classifier> = LazyLock::new(|| Classifier {
    image: PhraseSet::new("image", IMAGE_PHRASES),
    complex: PhraseSet::new("complex", COMPLEX_PHRASES),
    moderate: PhraseSet::new("moderate", MODERATE_PHRASES),
});

/// Classify a prompt. Deterministic and free of I/O.
pub fn classify_complexity(prompt: &str) -> TaskComplexity {
    let lower = prompt.to_lowercase();
    let words = prompt.split_whitespace().count();
    let c = &*CLASSIFIER;

    let complexity = if c.image.is_match(&lower) {
        TaskComplexity::Image
    } else if c.complex.is_match(&lower) || words > COMPLEX_WORD_THRESHOLD {
        TaskComplexity::Complex
    } else if c.moderate.is_match(&lower) || words > MODERATE_WORD_THRESHOLD {
        TaskComplexity::Moderate
    } else {
        TaskComplexity::Simple
    };

    tracing::trace!(words, %complexity, "prompt classified");
    complexity
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
