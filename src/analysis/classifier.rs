//! Path-to-domain classification driven by an ordered rule table.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Label for paths no rule matches. Never part of an execution plan.
pub const OTHER_DOMAIN: &str = "other";

/// One path pattern as written in configuration.
///
/// Regexes are case-insensitive and unanchored unless the pattern anchors
/// itself. Prefix and suffix matchers compare literally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    Regex(String),
    Prefix(String),
    Suffix(String),
}

/// A configured domain: a label, a task description, and its patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSpec {
    pub name: String,
    pub description: String,
    /// Written as single-key maps (`- regex: '...'`) rather than YAML tags.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub patterns: Vec<Matcher>,
}

impl DomainSpec {
    /// Compiles the patterns into a rule ready for matching.
    pub fn compile(&self) -> Result<DomainRule, regex::Error> {
        let matchers = self
            .patterns
            .iter()
            .map(CompiledMatcher::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DomainRule {
            name: self.name.clone(),
            description: self.description.clone(),
            matchers,
        })
    }
}

#[derive(Debug)]
enum CompiledMatcher {
    Regex(Regex),
    Prefix(String),
    Suffix(String),
}

impl CompiledMatcher {
    fn compile(matcher: &Matcher) -> Result<Self, regex::Error> {
        Ok(match matcher {
            Matcher::Regex(pattern) => Self::Regex(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()?,
            ),
            Matcher::Prefix(prefix) => Self::Prefix(prefix.clone()),
            Matcher::Suffix(suffix) => Self::Suffix(suffix.clone()),
        })
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(path),
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Suffix(suffix) => path.ends_with(suffix.as_str()),
        }
    }
}

/// A compiled domain rule.
#[derive(Debug)]
pub struct DomainRule {
    name: String,
    description: String,
    matchers: Vec<CompiledMatcher>,
}

impl DomainRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}

/// Ordered rule table. The first rule with any matching pattern wins.
#[derive(Debug)]
pub struct DomainClassifier {
    rules: Vec<DomainRule>,
}

impl DomainClassifier {
    pub fn new(specs: &[DomainSpec]) -> Result<Self, regex::Error> {
        let rules = specs
            .iter()
            .map(DomainSpec::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Classifier over the built-in backend/frontend/database/tests/docs table.
    pub fn builtin() -> Result<Self, regex::Error> {
        Self::new(&default_domains())
    }

    /// Returns the label of the first matching rule, or [`OTHER_DOMAIN`].
    pub fn classify(&self, path: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(DomainRule::name)
            .unwrap_or(OTHER_DOMAIN)
    }

    /// Returns every domain whose rule matches the path, in rule order.
    pub fn matching_domains(&self, path: &str) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(path))
            .map(DomainRule::name)
            .collect()
    }

    pub fn description(&self, domain: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.name == domain)
            .map(DomainRule::description)
    }

    pub fn rules(&self) -> &[DomainRule] {
        &self.rules
    }
}

fn regex_spec(name: &str, description: &str, patterns: &[&str]) -> DomainSpec {
    DomainSpec {
        name: name.to_string(),
        description: description.to_string(),
        patterns: patterns
            .iter()
            .map(|p| Matcher::Regex(p.to_string()))
            .collect(),
    }
}

/// The built-in rule table used when configuration omits `domains`.
pub fn default_domains() -> Vec<DomainSpec> {
    vec![
        regex_spec(
            "backend",
            "Backend API implementation",
            &[
                r"^src/backend/",
                r"^src/api/",
                r"^src/services/",
                r"^src/models/",
                r"^backend/",
                r"^api/",
                r"^services/",
                r"^models/",
                r"\.service\.py$",
                r"\.controller\.py$",
                r"\.router\.py$",
            ],
        ),
        regex_spec(
            "frontend",
            "Frontend UI implementation",
            &[
                r"^src/frontend/",
                r"^src/components/",
                r"^src/pages/",
                r"^src/ui/",
                r"^frontend/",
                r"^components/",
                r"^pages/",
                r"^ui/",
                r"\.tsx?$",
                r"\.jsx?$",
                r"\.vue$",
                r"\.svelte$",
            ],
        ),
        regex_spec(
            "database",
            "Database schema and migrations",
            &[
                r"^migrations/",
                r"^alembic/",
                r"^src/database/",
                r"^src/schemas/",
                r"^database/",
                r"^schemas/",
                r"migration.*\.py$",
                r"\.sql$",
            ],
        ),
        regex_spec(
            "tests",
            "Test suite implementation",
            &[
                r"^tests/",
                r"^test/",
                r"test_.*\.py$",
                r".*_test\.py$",
                r"\.test\.ts$",
                r"\.spec\.ts$",
            ],
        ),
        regex_spec(
            "docs",
            "Documentation updates",
            &[
                r"^docs/",
                r"^documentation/",
                r"README.*\.md$",
                r"\.md$",
                r"\.rst$",
            ],
        ),
    ]
}
