//! System-level directives injected into every conversation.

use crate::config::PolicyConfig;

/// Instructs the model how to react to policy-blocked tool results. It is
/// always the first message of a transcript.
pub const POLICY_DIRECTIVE: &str = r#"
All tools with tag [TansivePolicy: true] are governed by Tansive policy.
If any tool call with such tag returns an error containing "This operation is blocked by Tansive policy", you must respond to the user with:
"I tried to use Skill: <tool-name> for <reason> but it was blocked by Tansive policy. Please contact the administrator of your Tansive system to obtain access." Do not attempt to bypass, hallucinate, or reroute the request. Respect the policy boundaries.
"#;

/// The directive in effect for this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDirective(String);

impl PolicyDirective {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Directive from configuration, falling back to [`POLICY_DIRECTIVE`]
    pub fn from_config(config: &PolicyConfig) -> Self {
        match config.directive.as_deref() {
            Some(text) if !text.trim().is_empty() => Self::new(text),
            _ => Self::default(),
        }
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl Default for PolicyDirective {
    fn default() -> Self {
        Self::new(POLICY_DIRECTIVE)
    }
}
