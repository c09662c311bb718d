//! Tool name patterns.
//!
//! Three pattern forms are supported:
//! - globs (`create_*`, `get_?`, `{list,get}_*`, `[abc]*`), anchored and case-insensitive
//! - regular expressions wrapped in slashes (`/^gh_.*$/i`)
//! - negations of either form, prefixed with `!`
//!
//! Patterns are compiled once when a rule is loaded.

use std::{fmt, str::FromStr};

use regex::{Regex, RegexBuilder};

use super::rule::CompiledRule;
use crate::error::PatternError;

/// A compiled tool name pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    Glob { source: String, regex: Regex },
    Regex { source: String, regex: Regex },
    Negated(Box<Pattern>),
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        match raw.strip_prefix('!') {
            Some(inner) => Ok(Pattern::Negated(Box::new(Self::parse_positive(inner)?))),
            None => Self::parse_positive(raw),
        }
    }

    fn parse_positive(raw: &str) -> Result<Self, PatternError> {
        if is_regex_literal(raw) {
            let regex = compile_regex_literal(raw)?;
            Ok(Pattern::Regex {
                source: raw.to_string(),
                regex,
            })
        } else {
            let translated = glob_to_regex(raw);
            let regex = RegexBuilder::new(&translated)
                .case_insensitive(true)
                .build()
                .map_err(|source| PatternError::Regex {
                    pattern: raw.to_string(),
                    source,
                })?;
            Ok(Pattern::Glob {
                source: raw.to_string(),
                regex,
            })
        }
    }

    pub fn is_negated(&self) -> bool {
        matches!(self, Pattern::Negated(_))
    }

    /// Whether the underlying expression matches, ignoring negation.
    ///
    /// For a negated pattern this reports whether `value` falls in the excluded set.
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Pattern::Glob { regex, .. } | Pattern::Regex { regex, .. } => regex.is_match(value),
            Pattern::Negated(inner) => inner.is_match(value),
        }
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Glob { source, .. } | Pattern::Regex { source, .. } => f.write_str(source),
            Pattern::Negated(inner) => write!(f, "!{}", inner),
        }
    }
}

/// An ordered list of compiled patterns evaluated together.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn compile<S: AsRef<str>>(raw: &[S]) -> Result<Self, PatternError> {
        let patterns = raw
            .iter()
            .map(|p| Pattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, value: &str) -> bool {
        PatternMatcher::match_tool(value, &self.patterns)
    }
}

impl From<Vec<Pattern>> for PatternSet {
    fn from(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }
}

/// Pattern and rule matching entry points.
pub struct PatternMatcher;

impl PatternMatcher {
    /// Match a tool identifier against a pattern list.
    ///
    /// An empty list matches everything. Any matching negation excludes the tool.
    /// A list made only of negations matches whatever none of them excluded.
    pub fn match_tool(tool_id: &str, patterns: &[Pattern]) -> bool {
        if patterns.is_empty() {
            return true;
        }

        let (negative, positive): (Vec<&Pattern>, Vec<&Pattern>) =
            patterns.iter().partition(|p| p.is_negated());

        if negative.iter().any(|p| p.is_match(tool_id)) {
            return false;
        }
        if positive.is_empty() {
            return true;
        }
        positive.iter().any(|p| p.is_match(tool_id))
    }

    /// Compile `patterns` and match in one step.
    pub fn match_tool_str<S: AsRef<str>>(tool_id: &str, patterns: &[S]) -> Result<bool, PatternError> {
        Ok(PatternSet::compile(patterns)?.matches(tool_id))
    }

    /// Whether `rule` applies to the tool, honoring its optional server scope.
    pub fn match_rule(tool_id: &str, server_id: &str, rule: &CompiledRule) -> bool {
        if let Some(scope) = rule.server.as_deref() {
            if scope != server_id {
                return false;
            }
        }
        rule.patterns.matches(tool_id)
    }

    /// All rules applying to the tool, in declared order.
    pub fn find_matching_rules<'a>(
        tool_id: &str,
        server_id: &str,
        rules: &'a [CompiledRule],
    ) -> Vec<&'a CompiledRule> {
        rules
            .iter()
            .filter(|rule| Self::match_rule(tool_id, server_id, rule))
            .collect()
    }
}

fn is_regex_literal(raw: &str) -> bool {
    raw.starts_with('/') && raw.rfind('/').is_some_and(|idx| idx > 0)
}

fn compile_regex_literal(raw: &str) -> Result<Regex, PatternError> {
    // is_regex_literal guarantees a closing slash past index 0
    let last = raw.rfind('/').unwrap_or(0);
    let body = &raw[1..last];
    let flags = &raw[last + 1..];

    let mut builder = RegexBuilder::new(body);
    if flags.is_empty() {
        builder.case_insensitive(true);
    }
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            // stateful or unicode flags have no effect on a single test
            'g' | 'u' | 'y' => {}
            other => {
                return Err(PatternError::UnknownFlag {
                    pattern: raw.to_string(),
                    flag: other,
                })
            }
        }
    }
    builder.build().map_err(|source| PatternError::Regex {
        pattern: raw.to_string(),
        source,
    })
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    translate_glob(glob, &mut out, true);
    out.push('$');
    out
}

fn translate_glob(glob: &str, out: &mut String, allow_braces: bool) {
    let mut rest = glob;
    while let Some(c) = rest.chars().next() {
        let width = c.len_utf8();
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '{' if allow_braces => {
                if let Some(end) = closing(rest, '}') {
                    out.push('(');
                    for (i, alternative) in rest[1..end].split(',').enumerate() {
                        if i > 0 {
                            out.push('|');
                        }
                        translate_glob(alternative, out, false);
                    }
                    out.push(')');
                    rest = &rest[end + 1..];
                    continue;
                }
                out.push_str(r"\{");
            }
            '[' => {
                if let Some(end) = closing(rest, ']') {
                    let class = &rest[1..end];
                    out.push('[');
                    let class = match class.strip_prefix('!') {
                        Some(negated) => {
                            out.push('^');
                            negated
                        }
                        None => class,
                    };
                    out.push_str(&regex::escape(class).replace(r"\-", "-"));
                    out.push(']');
                    rest = &rest[end + 1..];
                    continue;
                }
                out.push_str(r"\[");
            }
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
        rest = &rest[width..];
    }
}

/// Byte offset of the delimiter closing a non-empty group that opens at `s[0]`.
fn closing(s: &str, delimiter: char) -> Option<usize> {
    let end = s[1..].find(delimiter)? + 1;
    (end > 1).then_some(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ToolRule;

    fn set(raw: &[&str]) -> PatternSet {
        PatternSet::compile(raw).unwrap()
    }

    #[test]
    fn test_empty_pattern_list_matches_everything() {
        assert!(set(&[]).matches("anything"));
        assert!(PatternMatcher::match_tool("x", &[]));
    }

    #[test]
    fn test_glob_wildcards() {
        let patterns = set(&["create_*"]);
        assert!(patterns.matches("create_issue"));
        assert!(!patterns.matches("delete_issue"));

        let patterns = set(&["get_?"]);
        assert!(patterns.matches("get_a"));
        assert!(!patterns.matches("get_ab"));
    }

    #[test]
    fn test_glob_is_anchored_and_case_insensitive() {
        let patterns = set(&["issue"]);
        assert!(patterns.matches("ISSUE"));
        assert!(!patterns.matches("create_issue"));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let patterns = set(&["v1.0+beta"]);
        assert!(patterns.matches("v1.0+beta"));
        assert!(!patterns.matches("v1x0beta"));
    }

    #[test]
    fn test_glob_braces_and_classes() {
        let patterns = set(&["{list,get}_*"]);
        assert!(patterns.matches("list_repos"));
        assert!(patterns.matches("get_repo"));
        assert!(!patterns.matches("delete_repo"));

        let patterns = set(&["tool_[abc]"]);
        assert!(patterns.matches("tool_b"));
        assert!(!patterns.matches("tool_d"));

        let patterns = set(&["tool_[!abc]"]);
        assert!(patterns.matches("tool_d"));
        assert!(!patterns.matches("tool_a"));
    }

    #[test]
    fn test_unclosed_group_is_literal() {
        let patterns = set(&["a{b"]);
        assert!(patterns.matches("a{b"));
        let patterns = set(&["a[b"]);
        assert!(patterns.matches("a[b"));
    }

    #[test]
    fn test_regex_patterns() {
        let patterns = set(&["/^gh_(issue|pr)s?$/"]);
        assert!(patterns.matches("gh_issues"));
        assert!(patterns.matches("GH_PR"));
        assert!(!patterns.matches("gh_repo"));

        // explicit flags replace the case-insensitive default
        let patterns = set(&["/^create/m"]);
        assert!(patterns.matches("create_issue"));
        assert!(!patterns.matches("CREATE_issue"));

        // unanchored regex searches anywhere
        assert!(set(&["/delete/"]).matches("repo_delete_all"));
    }

    #[test]
    fn test_single_slash_is_a_glob() {
        let patterns = set(&["/"]);
        assert!(matches!(patterns.patterns()[0], Pattern::Glob { .. }));
        assert!(patterns.matches("/"));
    }

    #[test]
    fn test_invalid_patterns_fail_to_compile() {
        assert!(matches!(
            Pattern::parse("/(unclosed/"),
            Err(PatternError::Regex { .. })
        ));
        assert!(matches!(
            Pattern::parse("/abc/q"),
            Err(PatternError::UnknownFlag { flag: 'q', .. })
        ));
    }

    #[test]
    fn test_negation_precedence() {
        assert!(!PatternMatcher::match_tool_str("delete_repo", &["!*delete*"]).unwrap());
        assert!(PatternMatcher::match_tool_str("create_repo", &["!*delete*"]).unwrap());
        assert!(!PatternMatcher::match_tool_str("delete_repo", &["*repo*", "!*delete*"]).unwrap());
        assert!(PatternMatcher::match_tool_str("create_repo", &["*repo*", "!*delete*"]).unwrap());
        assert!(!PatternMatcher::match_tool_str("create_issue", &["*repo*", "!*delete*"]).unwrap());
    }

    #[test]
    fn test_negated_regex() {
        let patterns = set(&["!/^admin_/"]);
        assert!(!patterns.matches("admin_reset"));
        assert!(patterns.matches("user_reset"));
    }

    #[test]
    fn test_display_round_trips_source() {
        let pattern = Pattern::parse("!/^x/i").unwrap();
        assert_eq!(pattern.to_string(), "!/^x/i");
        let parsed: Pattern = "get_*".parse().unwrap();
        assert_eq!(parsed.to_string(), "get_*");
    }

    #[test]
    fn test_match_rule_server_scope() {
        let rule = ToolRule::new(["*create*"]).with_server("github").compile().unwrap();
        assert!(PatternMatcher::match_rule("create_issue", "github", &rule));
        assert!(!PatternMatcher::match_rule("create_ticket", "jira", &rule));

        let unscoped = ToolRule::new(["*create*"]).compile().unwrap();
        assert!(PatternMatcher::match_rule("create_ticket", "jira", &unscoped));
    }

    #[test]
    fn test_find_matching_rules_preserves_order() {
        let rules = vec![
            ToolRule::new(["*issue*"]).with_tags(["issues"]).compile().unwrap(),
            ToolRule::new(["*delete*"]).with_tags(["dangerous"]).compile().unwrap(),
            ToolRule::new(["create_*"]).with_tags(["create"]).compile().unwrap(),
        ];
        let matched = PatternMatcher::find_matching_rules("create_issue", "github", &rules);
        let tags: Vec<&str> = matched.iter().map(|r| r.tags[0].as_str()).collect();
        assert_eq!(tags, vec!["issues", "create"]);
    }
}
