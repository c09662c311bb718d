//! Declarative tool rules.
//!
//! A rule selects tools by name pattern (optionally scoped to one server) and may
//! force their enabled state and attach tags. Rules are evaluated in declared order.

use serde::{Deserialize, Serialize};

use super::pattern::{PatternMatcher, PatternSet};
use crate::error::PatternError;

/// A tool rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolRule {
    /// Glob, `/regex/flags`, or `!`-negated patterns matched against the tool name.
    pub pattern: Vec<String>,

    /// Restrict the rule to a single server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Explicit enabled state for matching tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Tags added to every matching tool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ToolRule {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pattern: patterns.into_iter().map(Into::into).collect(),
            server: None,
            enabled: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn compile(&self) -> Result<CompiledRule, PatternError> {
        Ok(CompiledRule {
            patterns: PatternSet::compile(&self.pattern)?,
            server: self.server.clone(),
            enabled: self.enabled,
            tags: self.tags.clone(),
        })
    }
}

/// A rule with its patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub patterns: PatternSet,
    pub server: Option<String>,
    pub enabled: Option<bool>,
    pub tags: Vec<String>,
}

/// Result of evaluating a rule set against one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub enabled: bool,
    pub tags: Vec<String>,
}

/// An ordered, compiled rule list.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    whitelist: bool,
}

impl RuleSet {
    pub fn compile(rules: &[ToolRule]) -> Result<Self, PatternError> {
        let rules = rules
            .iter()
            .map(ToolRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_compiled(rules))
    }

    pub fn from_compiled(rules: Vec<CompiledRule>) -> Self {
        let whitelist = rules.iter().any(|rule| rule.enabled == Some(true));
        Self { rules, whitelist }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True when any rule explicitly enables tools; unmatched tools then start disabled.
    pub fn is_whitelist(&self) -> bool {
        self.whitelist
    }

    /// Evaluate every rule against one tool.
    ///
    /// The enabled flag starts from the pass default and takes the value of each
    /// matching rule that sets it, so the last such rule decides. Tags accumulate from
    /// every matching rule after `existing_tags`, deduplicated in first-seen order.
    pub fn evaluate(&self, server: &str, tool: &str, existing_tags: &[String]) -> RuleOutcome {
        let mut enabled = !self.whitelist;
        let mut tags: Vec<String> = Vec::with_capacity(existing_tags.len());
        for tag in existing_tags {
            push_unique(&mut tags, tag);
        }

        for rule in PatternMatcher::find_matching_rules(tool, server, &self.rules) {
            if let Some(value) = rule.enabled {
                enabled = value;
            }
            for tag in &rule.tags {
                push_unique(&mut tags, tag);
            }
        }

        RuleOutcome { enabled, tags }
    }
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
    if !tags.iter().any(|t| t == tag) {
        tags.push(tag.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklist_default_enables() {
        let rules = RuleSet::compile(&[ToolRule::new(["*delete*"]).with_enabled(false)]).unwrap();
        assert!(!rules.is_whitelist());
        assert!(rules.evaluate("github", "create_issue", &[]).enabled);
        assert!(!rules.evaluate("github", "delete_repo", &[]).enabled);
    }

    #[test]
    fn test_whitelist_default_disables() {
        let rules = RuleSet::compile(&[ToolRule::new(["*create*"]).with_enabled(true)]).unwrap();
        assert!(rules.is_whitelist());
        assert!(rules.evaluate("github", "create_issue", &[]).enabled);
        assert!(!rules.evaluate("github", "delete_repo", &[]).enabled);
        assert!(rules.evaluate("jira", "create_ticket", &[]).enabled);
    }

    #[test]
    fn test_later_enabled_rule_overrides() {
        let rules = RuleSet::compile(&[
            ToolRule::new(["*"]).with_enabled(true),
            ToolRule::new(["*delete*"]).with_enabled(false),
        ])
        .unwrap();
        assert!(!rules.evaluate("github", "delete_repo", &[]).enabled);
        assert!(rules.evaluate("github", "create_issue", &[]).enabled);
    }

    #[test]
    fn test_rule_without_enabled_only_tags() {
        let rules = RuleSet::compile(&[ToolRule::new(["!*delete*"]).with_tags(["safe"])]).unwrap();
        let outcome = rules.evaluate("github", "delete_repo", &[]);
        assert!(outcome.enabled);
        assert!(outcome.tags.is_empty());

        let outcome = rules.evaluate("github", "create_issue", &[]);
        assert!(outcome.enabled);
        assert_eq!(outcome.tags, vec!["safe"]);
    }

    #[test]
    fn test_tags_accumulate_in_rule_order_without_duplicates() {
        let rules = RuleSet::compile(&[
            ToolRule::new(["*create*"]).with_tags(["create", "write"]),
            ToolRule::new(["*issue*"]).with_tags(["issues", "write"]),
            ToolRule::new(["*"]).with_server("github").with_tags(["github"]),
        ])
        .unwrap();
        let existing = vec!["github".to_string()];
        let outcome = rules.evaluate("github", "create_issue", &existing);
        assert_eq!(outcome.tags, vec!["github", "create", "write", "issues"]);
    }

    #[test]
    fn test_scoped_rule_ignores_other_servers() {
        let rules = RuleSet::compile(&[ToolRule::new(["*create*"])
            .with_server("github")
            .with_enabled(false)
            .with_tags(["github-create"])])
        .unwrap();
        let outcome = rules.evaluate("jira", "create_ticket", &[]);
        assert!(outcome.enabled);
        assert!(outcome.tags.is_empty());
    }

    #[test]
    fn test_rule_yaml_shape() {
        let yaml = r#"
- pattern: ["*delete*", "/^drop_/"]
  enabled: false
- pattern: ["*"]
  server: github
  tags: [github]
"#;
        let rules: Vec<ToolRule> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].enabled, Some(false));
        assert!(rules[0].tags.is_empty());
        assert_eq!(rules[1].server.as_deref(), Some("github"));
        assert_eq!(rules[1].enabled, None);
        assert!(RuleSet::compile(&rules).is_ok());
    }
}
