//! Tool metadata store.
//!
//! Tools live in a flat arena addressed by a `(server, name)` index. A catalog is built
//! in full during discovery and then shared read-only; reloads build a fresh catalog.

use std::collections::HashMap;

use tracing::debug;

use super::types::{QualifiedToolName, ToolMetadata};
use crate::{
    error::PatternError,
    rules::{RuleSet, ToolRule},
};

#[derive(Debug, Clone, Default)]
pub struct ToolMetadataManager {
    tools: Vec<ToolMetadata>,
    index: HashMap<QualifiedToolName, usize>,
}

impl ToolMetadataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tool, replacing any existing entry with the same server and name.
    pub fn add_tool(&mut self, tool: ToolMetadata) {
        let key = tool.qualified_name();
        match self.index.get(&key) {
            Some(&slot) => {
                debug!(tool = %key, "Replacing catalog entry");
                self.tools[slot] = tool;
            }
            None => {
                self.index.insert(key, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get_tool(&self, server: &str, name: &str) -> Option<&ToolMetadata> {
        self.index
            .get(&QualifiedToolName::new(server, name))
            .map(|&slot| &self.tools[slot])
    }

    pub fn get_tools_by_server(&self, server: &str, include_disabled: bool) -> Vec<ToolMetadata> {
        self.tools
            .iter()
            .filter(|t| t.server == server && (include_disabled || t.enabled))
            .cloned()
            .collect()
    }

    pub fn get_all_tools(&self, include_disabled: bool) -> Vec<ToolMetadata> {
        self.tools
            .iter()
            .filter(|t| include_disabled || t.enabled)
            .cloned()
            .collect()
    }

    /// All stored tools, in insertion order.
    pub fn tools(&self) -> &[ToolMetadata] {
        &self.tools
    }

    /// Recompute every tool's enabled flag and tags from `rules`.
    pub fn apply_rules(&mut self, rules: &RuleSet) {
        debug!(
            rules = rules.rules().len(),
            whitelist = rules.is_whitelist(),
            tools = self.tools.len(),
            "Applying tool rules"
        );
        for tool in &mut self.tools {
            let outcome = rules.evaluate(&tool.server, &tool.name, &tool.tags);
            tool.enabled = outcome.enabled;
            tool.tags = outcome.tags;
        }
    }

    /// Compile and apply configuration rules.
    pub fn apply_tool_rules(&mut self, rules: &[ToolRule]) -> Result<(), PatternError> {
        let compiled = RuleSet::compile(rules)?;
        self.apply_rules(&compiled);
        Ok(())
    }

    pub fn get_tool_count(&self, server: &str) -> usize {
        self.tools.iter().filter(|t| t.server == server).count()
    }

    pub fn get_enabled_count(&self, server: &str) -> usize {
        self.tools
            .iter()
            .filter(|t| t.server == server && t.enabled)
            .count()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(server: &str, name: &str, enabled: bool) -> ToolMetadata {
        ToolMetadata::new(server, name, format!("{} on {}", name, server)).with_enabled(enabled)
    }

    fn populated() -> ToolMetadataManager {
        let mut manager = ToolMetadataManager::new();
        manager.add_tool(tool("github", "create_issue", true));
        manager.add_tool(tool("github", "delete_repo", true));
        manager.add_tool(tool("jira", "create_ticket", true));
        manager
    }

    #[test]
    fn test_add_and_get_tool() {
        let manager = populated();
        let found = manager.get_tool("github", "create_issue").unwrap();
        assert_eq!(found.summary, "create_issue on github");
        assert!(manager.get_tool("github", "nonexistent").is_none());
        assert!(manager.get_tool("jira", "create_issue").is_none());
    }

    #[test]
    fn test_add_tool_upserts() {
        let mut manager = populated();
        manager.add_tool(ToolMetadata::new("github", "create_issue", "Updated summary"));
        assert_eq!(manager.len(), 3);
        assert_eq!(
            manager.get_tool("github", "create_issue").unwrap().summary,
            "Updated summary"
        );
    }

    #[test]
    fn test_listing_excludes_disabled_by_default() {
        let mut manager = ToolMetadataManager::new();
        manager.add_tool(tool("github", "create_issue", true));
        manager.add_tool(tool("github", "delete_repo", false));
        manager.add_tool(tool("jira", "create_ticket", true));

        assert_eq!(manager.get_tools_by_server("github", false).len(), 1);
        assert_eq!(manager.get_tools_by_server("github", true).len(), 2);
        assert!(manager.get_tools_by_server("unknown", true).is_empty());
        assert_eq!(manager.get_all_tools(false).len(), 2);
        assert_eq!(manager.get_all_tools(true).len(), 3);
    }

    #[test]
    fn test_counts() {
        let mut manager = ToolMetadataManager::new();
        manager.add_tool(tool("github", "create_issue", true));
        manager.add_tool(tool("github", "delete_repo", false));
        assert_eq!(manager.get_tool_count("github"), 2);
        assert_eq!(manager.get_enabled_count("github"), 1);
        assert_eq!(manager.get_tool_count("unknown"), 0);
        assert_eq!(manager.get_enabled_count("unknown"), 0);
    }

    #[test]
    fn test_rule_mode_selection() {
        let mut manager = populated();
        manager
            .apply_tool_rules(&[
                ToolRule::new(["*"]).with_enabled(true),
                ToolRule::new(["*delete*"]).with_enabled(false),
            ])
            .unwrap();
        assert!(!manager.get_tool("github", "delete_repo").unwrap().enabled);
        assert!(manager.get_tool("github", "create_issue").unwrap().enabled);
    }

    #[test]
    fn test_whitelist_mode_disables_unmatched() {
        let mut manager = populated();
        manager
            .apply_tool_rules(&[ToolRule::new(["*create*"]).with_enabled(true)])
            .unwrap();
        assert!(manager.get_tool("github", "create_issue").unwrap().enabled);
        assert!(!manager.get_tool("github", "delete_repo").unwrap().enabled);
        assert!(manager.get_tool("jira", "create_ticket").unwrap().enabled);
    }

    #[test]
    fn test_tag_accumulation() {
        let mut manager = populated();
        manager
            .apply_tool_rules(&[
                ToolRule::new(["*create*"]).with_tags(["create"]),
                ToolRule::new(["*issue*"]).with_tags(["issues"]),
                ToolRule::new(["*"]).with_server("github").with_tags(["github"]),
            ])
            .unwrap();
        let tags = &manager.get_tool("github", "create_issue").unwrap().tags;
        assert_eq!(tags, &vec!["create", "issues", "github"]);
    }

    #[test]
    fn test_reapplying_rules_does_not_duplicate_tags() {
        let mut manager = populated();
        let rules = [ToolRule::new(["*create*"]).with_tags(["create"])];
        manager.apply_tool_rules(&rules).unwrap();
        manager.apply_tool_rules(&rules).unwrap();
        assert_eq!(
            manager.get_tool("jira", "create_ticket").unwrap().tags,
            vec!["create"]
        );
    }

    #[test]
    fn test_server_scoped_rules() {
        let mut manager = populated();
        manager
            .apply_tool_rules(&[
                ToolRule::new(["*create*"])
                    .with_server("github")
                    .with_tags(["github-create"]),
                ToolRule::new(["*create*"])
                    .with_server("jira")
                    .with_tags(["jira-create"]),
                ToolRule::new(["*"]).with_server("github").with_enabled(false),
            ])
            .unwrap();
        let github = manager.get_tool("github", "create_issue").unwrap();
        let jira = manager.get_tool("jira", "create_ticket").unwrap();
        assert_eq!(github.tags, vec!["github-create"]);
        assert!(!github.enabled);
        assert_eq!(jira.tags, vec!["jira-create"]);
        assert!(jira.enabled);
    }

    #[test]
    fn test_negation_rule_without_enabled_keeps_delete_enabled() {
        let mut manager = ToolMetadataManager::new();
        manager.add_tool(
            ToolMetadata::new("github", "create_issue", "Create a new GitHub issue")
                .with_tags(["github", "issues"]),
        );
        manager.add_tool(
            ToolMetadata::new("github", "delete_repo", "Delete a GitHub repository")
                .with_tags(["github", "dangerous"]),
        );
        manager.add_tool(
            ToolMetadata::new("jira", "create_ticket", "Create a new Jira ticket").with_tags(["jira"]),
        );

        manager
            .apply_tool_rules(&[ToolRule::new(["!*delete*"])])
            .unwrap();

        assert!(manager.get_tool("github", "delete_repo").unwrap().enabled);
        assert!(manager.get_tool("github", "create_issue").unwrap().enabled);
        assert!(manager.get_tool("jira", "create_ticket").unwrap().enabled);
        assert_eq!(
            manager.get_tool("github", "delete_repo").unwrap().tags,
            vec!["github", "dangerous"]
        );
    }

    #[test]
    fn test_invalid_rule_pattern_reports_error() {
        let mut manager = populated();
        assert!(manager.apply_tool_rules(&[ToolRule::new(["/(/"])]).is_err());
        // catalog untouched
        assert!(manager.get_tool("github", "delete_repo").unwrap().enabled);
    }
}
