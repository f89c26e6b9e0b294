//! Response Validation
//!
//! Decides whether an assistant response is complete enough to act on, and
//! classifies unusable ones so the retry controller can pick a sleep.
//!
//! A response is usable iff it is long enough, carries no rate-limit
//! sentinel, has no unclosed code fence, and does not trail off in an
//! ellipsis. Timeout and transport classifications come from the call
//! sites (driver errors), not from content.

use serde::{Deserialize, Serialize};

/// Substrings the assistant emits when its quota is exhausted
const RATE_LIMIT_SENTINELS: &[&str] = &[
    "rate limit",
    "Rate limit",
    "too many requests",
    "Too many requests",
    "quota has been exceeded",
    "exceeded your premium request allowance",
    "try again later",
];

/// Suffixes indicating a response was cut off mid-sentence
const ELLIPSIS_SUFFIXES: &[&str] = &["...", "\u{2026}", "\u{3002}\u{3002}\u{3002}"];

/// Marker opening/closing a fenced code block
const CODE_FENCE: &str = "```";

/// Outcome classes for one assistant exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClass {
    /// Usable response
    Ok,
    /// The assistant reported a rate limit; back off for a long time
    RateLimit,
    /// The response looks cut off (short, unclosed fence, trailing ellipsis)
    Truncated,
    /// The wait for a response exceeded its budget
    Timeout,
    /// The editor bridge call itself failed, or the copy came back empty
    Transport,
}

impl ResponseClass {
    /// Whether this exchange may be acted on without a retry
    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseClass::Ok)
    }
}

impl std::fmt::Display for ResponseClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResponseClass::Ok => "ok",
            ResponseClass::RateLimit => "rate_limit",
            ResponseClass::Truncated => "truncated",
            ResponseClass::Timeout => "timeout",
            ResponseClass::Transport => "transport",
        };
        f.write_str(s)
    }
}

/// Content-based response validator
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    min_content_length: usize,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self {
            min_content_length: 100,
        }
    }
}

impl ResponseValidator {
    /// Validator with a custom minimum length (tests use small values)
    pub fn with_min_length(min_content_length: usize) -> Self {
        Self { min_content_length }
    }

    /// Classify a copied response body.
    pub fn classify(&self, response: &str) -> ResponseClass {
        if self.has_rate_limit_sentinel(response) {
            return ResponseClass::RateLimit;
        }
        if !self.is_complete(response) {
            return ResponseClass::Truncated;
        }
        ResponseClass::Ok
    }

    /// Whether a response satisfies every usability rule.
    pub fn is_usable(&self, response: &str) -> bool {
        self.classify(response).is_ok()
    }

    fn has_rate_limit_sentinel(&self, response: &str) -> bool {
        RATE_LIMIT_SENTINELS.iter().any(|s| response.contains(s))
    }

    fn is_complete(&self, response: &str) -> bool {
        let trimmed = response.trim();
        if trimmed.len() < self.min_content_length {
            return false;
        }
        // An odd number of fence markers means a code block never closed
        if trimmed.matches(CODE_FENCE).count() % 2 != 0 {
            return false;
        }
        if ELLIPSIS_SUFFIXES.iter().any(|s| trimmed.ends_with(s)) {
            return false;
        }
        true
    }
}
