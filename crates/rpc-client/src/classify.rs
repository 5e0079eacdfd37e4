// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Unsupported-method heuristic for JSON-RPC error messages
//!
//! JSON-RPC providers do not agree on error codes for "this method is not available here", so
//! the only usable signal is the error message. A message containing one of a configurable set
//! of phrases (case-insensitive) means the method is unsupported; any other error, including
//! the validation error a deliberately malformed probe payload is expected to trigger, means
//! the method exists and the endpoint is functioning.
//!
//! This is an approximation, not a protocol guarantee. A provider that phrases its
//! "method unavailable" error differently will be treated as supporting the method.

use std::sync::LazyLock;

use regex::{RegexSet, RegexSetBuilder};

/// Phrases recognized out of the box
pub const DEFAULT_UNSUPPORTED_PHRASES: &[&str] =
    &["method not found", "method not supported", "not implemented"];

/// Verdict for a JSON-RPC error message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorClass {
    /// The endpoint does not serve the method
    Unsupported,
    /// The endpoint serves the method but rejected this particular input
    Rejected,
}

/// Case-insensitive phrase matcher backing [`classify_rpc_error`]
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    phrases: Vec<String>,
    matcher: RegexSet,
}

impl ErrorClassifier {
    /// Build a classifier from a phrase list
    ///
    /// Phrases are matched literally as substrings; blank phrases are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the compiled matcher would exceed the regex size limit.
    pub fn new<I, S>(phrases: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases: Vec<String> = phrases
            .into_iter()
            .map(|phrase| phrase.as_ref().trim().to_string())
            .filter(|phrase| !phrase.is_empty())
            .collect();

        let matcher = RegexSetBuilder::new(phrases.iter().map(|phrase| regex::escape(phrase)))
            .case_insensitive(true)
            .build()?;

        Ok(Self { phrases, matcher })
    }

    /// Classify an error message
    pub fn classify(&self, message: &str) -> RpcErrorClass {
        if self.matcher.is_match(message) {
            RpcErrorClass::Unsupported
        } else {
            RpcErrorClass::Rejected
        }
    }

    /// Returns the configured phrases
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_UNSUPPORTED_PHRASES).unwrap_or_else(|_| Self {
            phrases: Vec::new(),
            matcher: RegexSet::empty(),
        })
    }
}

static DEFAULT_CLASSIFIER: LazyLock<ErrorClassifier> = LazyLock::new(ErrorClassifier::default);

/// Classify an error message with the default phrase list
pub fn classify_rpc_error(message: &str) -> RpcErrorClass {
    DEFAULT_CLASSIFIER.classify(message)
}
