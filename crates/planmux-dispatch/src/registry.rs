//! Solver registry
//!
//! A solver is a named external worker identity with capability limits:
//! a complexity ceiling, a concurrency cap, matching criteria (summary
//! regex, capability tags, supported file extensions) and the models it is
//! rate limited on. The registry is constructed once and treated as an
//! immutable value afterwards.

use planmux_core::SolverName;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;

/// Capabilities and constraints of one solver
#[derive(Clone, Debug)]
pub struct SolverCapability {
    pub name: SolverName,

    // Matching criteria
    pub summary_regex: Option<Regex>,
    pub capability_tags: Vec<String>,
    /// Supported file extensions including the leading dot, lowercase
    pub supported_extensions: Vec<String>,
    pub required_tools: Vec<String>,

    // Constraints
    /// 1-10, higher = can handle more complex tasks
    pub max_complexity: u8,
    /// Max parallel sessions
    pub concurrency: u32,
    /// Models whose rate limits gate this solver; empty = never limited
    pub rate_limited_models: Vec<String>,
    /// Set when the solver is out of service regardless of rate limits
    pub unavailable_reason: Option<String>,

    // Metadata
    pub strengths: Vec<String>,
}

impl SolverCapability {
    pub fn new(name: impl Into<String>, max_complexity: u8) -> Self {
        Self {
            name: name.into(),
            summary_regex: None,
            capability_tags: Vec::new(),
            supported_extensions: Vec::new(),
            required_tools: Vec::new(),
            max_complexity,
            concurrency: 1,
            rate_limited_models: Vec::new(),
            unavailable_reason: None,
            strengths: Vec::new(),
        }
    }

    /// Case-insensitive summary pattern for rule-2 matching
    pub fn summary_pattern(mut self, pattern: &str) -> Self {
        self.summary_regex = Some(
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("registry summary patterns are static and valid"),
        );
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capability_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_extensions
            .extend(extensions.into_iter().map(Into::into));
        self
    }

    pub fn tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_tools.extend(tools.into_iter().map(Into::into));
        self
    }

    pub fn concurrency(mut self, sessions: u32) -> Self {
        self.concurrency = sessions;
        self
    }

    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rate_limited_models
            .extend(models.into_iter().map(Into::into));
        self
    }

    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable_reason = Some(reason.into());
        self
    }

    pub fn strengths<I, S>(mut self, strengths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strengths.extend(strengths.into_iter().map(Into::into));
        self
    }
}

/// Immutable mapping from solver name to capability
#[derive(Clone, Debug, Default)]
pub struct SolverRegistry {
    solvers: BTreeMap<SolverName, SolverCapability>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, capability: SolverCapability) -> Self {
        self.solvers.insert(capability.name.clone(), capability);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SolverCapability> {
        self.solvers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.solvers.contains_key(name)
    }

    /// Capabilities in name order
    pub fn iter(&self) -> impl Iterator<Item = &SolverCapability> {
        self.solvers.values()
    }

    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    /// The solver with the highest complexity ceiling; ties resolve to the
    /// first name in order.
    pub fn most_capable(&self) -> Option<&SolverCapability> {
        self.solvers
            .values()
            .fold(None, |best: Option<&SolverCapability>, candidate| {
                match best {
                    Some(current) if current.max_complexity >= candidate.max_complexity => best,
                    _ => Some(candidate),
                }
            })
    }

    /// The production solver fleet
    pub fn builtin() -> Self {
        Self::new()
            .register(
                SolverCapability::new("local-slm", 3)
                    .summary_pattern(r"^(quick|simple|offline|local)\b")
                    .tags(["quick", "text"])
                    .concurrency(999)
                    .strengths(["Quick tasks", "Privacy-sensitive", "Offline operation"]),
            )
            .register(
                SolverCapability::new("gemini", 7)
                    .summary_pattern(
                        r"^(analyze|review|audit|assess|document|describe|explain|plan)\b",
                    )
                    .tags(["analysis", "planning", "docs", "code-review"])
                    .tools(["youtrack"])
                    .concurrency(10)
                    .models(["gemini-1.5-pro", "gemini-1.5-flash"])
                    .strengths(["Text analysis", "Code review", "Documentation generation"]),
            )
            .register(
                SolverCapability::new("perplexity", 5)
                    .summary_pattern(r"^(research|investigate|explore|compare|fact-check)\b")
                    .tags(["research", "web-search"])
                    .unavailable("no subscription")
                    .strengths(["Web research", "Source citation", "Fact verification"]),
            )
            .register(
                SolverCapability::new("angrav", 6)
                    .summary_pattern(r"^(automate|browser|ui|click|navigate)\b")
                    .tags(["automation", "browser", "gemini-ui"])
                    .concurrency(3)
                    .models([
                        "gemini-2.0-flash-thinking-exp",
                        "gemini-2.0-flash-exp",
                        "gemini-1.5-pro",
                    ])
                    .strengths(["Browser automation", "Rate limit tracking"]),
            )
            .register(
                SolverCapability::new("jules", 10)
                    .summary_pattern(r"^(implement|create|add|build|refactor|fix|bug)\b")
                    .tags(["code", "implementation", "refactor", "bug-fix"])
                    .extensions([".py", ".ts", ".js", ".go", ".md", ".sh"])
                    .concurrency(15)
                    .strengths(["Code implementation", "Refactoring", "Bug fixes"]),
            )
    }
}
