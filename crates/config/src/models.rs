//! Model name mapping configuration.

use std::{borrow::Cow, fmt};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer};

/// How requested model names are turned into upstream model identifiers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelsConfig {
    /// Forces every request to this upstream model.
    #[serde(rename = "override")]
    pub override_model: Option<String>,
    /// Fetch the upstream model catalog at startup and derive tier rules from it.
    pub discover: bool,
    /// Ordered mapping rules. The first matching rule wins.
    pub rules: Vec<ModelRule>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            override_model: None,
            discover: true,
            rules: Vec::new(),
        }
    }
}

/// A single mapping rule.
#[derive(Debug, Clone)]
pub struct ModelRule {
    pub matcher: ModelMatcher,
    pub target: String,
}

impl ModelRule {
    pub fn new(matcher: ModelMatcher, target: impl Into<String>) -> Self {
        Self {
            matcher,
            target: target.into(),
        }
    }

    /// Returns the target if the rule applies to the requested model.
    pub fn apply(&self, model: &str) -> Option<&str> {
        self.matcher.is_match(model).then_some(self.target.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum ModelMatcher {
    /// Literal prefix of the requested model name.
    Prefix(String),
    /// Case-insensitive regular expression searched in the requested model name.
    Pattern(ModelFilter),
}

impl ModelMatcher {
    pub fn is_match(&self, model: &str) -> bool {
        match self {
            ModelMatcher::Prefix(prefix) => model.starts_with(prefix.as_str()),
            ModelMatcher::Pattern(filter) => filter.is_match(model),
        }
    }
}

impl<'de> Deserialize<'de> for ModelRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct ModelRuleSerde {
            #[serde(default)]
            prefix: Option<String>,
            #[serde(default)]
            pattern: Option<ModelFilter>,
            target: String,
        }

        let raw = ModelRuleSerde::deserialize(deserializer)?;

        if raw.target.trim().is_empty() {
            return Err(serde::de::Error::custom("model rule target cannot be empty"));
        }

        let matcher = match (raw.prefix, raw.pattern) {
            (Some(prefix), None) if prefix.is_empty() => {
                return Err(serde::de::Error::custom("model rule prefix cannot be empty"));
            }
            (Some(prefix), None) => ModelMatcher::Prefix(prefix),
            (None, Some(pattern)) => ModelMatcher::Pattern(pattern),
            (Some(_), Some(_)) => {
                return Err(serde::de::Error::custom(
                    "model rule must set either `prefix` or `pattern`, not both",
                ));
            }
            (None, None) => {
                return Err(serde::de::Error::custom("model rule must set `prefix` or `pattern`"));
            }
        };

        Ok(ModelRule {
            matcher,
            target: raw.target,
        })
    }
}

/// Case-insensitive regex filter for matching model identifiers.
#[derive(Clone)]
pub struct ModelFilter {
    regex: Regex,
}

impl ModelFilter {
    /// Create a new validated model filter.
    pub fn new(pattern: &str) -> Result<Self, String> {
        let trimmed = pattern.trim();

        if trimmed.is_empty() {
            return Err("model pattern cannot be empty".to_string());
        }

        let regex = RegexBuilder::new(trimmed)
            .case_insensitive(true)
            .build()
            .map_err(|err| format!("invalid model pattern regex: {err}"))?;

        Ok(Self { regex })
    }

    /// Return the original pattern string.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Check whether the supplied model identifier matches the pattern.
    pub fn is_match(&self, model: &str) -> bool {
        self.regex.is_match(model)
    }
}

impl fmt::Debug for ModelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFilter").field("pattern", &self.pattern()).finish()
    }
}

impl<'de> Deserialize<'de> for ModelFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pattern = Cow::<'de, str>::deserialize(deserializer)?;
        ModelFilter::new(pattern.as_ref()).map_err(serde::de::Error::custom)
    }
}
