//! Policy-denial recognition
//!
//! Skill errors coming back from the mediator may encode a policy denial
//! (e.g. "This operation is blocked by Tansive policy"). Denials are
//! recognised with regex patterns from configuration.
//!
//! # Configuration Format
//!
//! ```toml
//! [policy]
//! denial_patterns = ["(?i)blocked by \\w+ policy"]
//! enforce_denials = true
//! ```
//!
//! With `enforce_denials` on, the loop does not hand a denial back to the
//! model; it ends the run with [`refusal_message`].

use anyhow::{Context, Result};
use fancy_regex::Regex;

/// Patterns matching the mediator's denial texts
pub const DEFAULT_DENIAL_PATTERNS: &[&str] = &[r"(?i)\bblocked by (\w+ )?policy\b"];

/// Compiled denial patterns
#[derive(Debug, Default)]
pub struct DenialMatcher {
    patterns: Vec<Regex>,
}

impl DenialMatcher {
    /// Compile denial patterns
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(p).with_context(|| format!("Invalid denial pattern: {}", p))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Matcher for the built-in patterns
    pub fn builtin() -> Result<Self> {
        Self::compile(DEFAULT_DENIAL_PATTERNS)
    }

    /// Whether a skill error text is a policy denial
    pub fn is_denial(&self, message: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.is_match(message).unwrap_or(false))
    }
}

/// Fixed answer given to the user when a skill call was denied
pub fn refusal_message(skill: &str, reason: &str) -> String {
    format!(
        "I tried to use Skill: {skill} but it was blocked by policy ({reason}). \
         Please contact the administrator of your system to obtain access."
    )
}
