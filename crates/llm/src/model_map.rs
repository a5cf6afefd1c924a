//! Maps requested model names to upstream model identifiers.

use config::{ModelRule, ModelsConfig};

/// Ordered rule table with an optional global override.
#[derive(Debug, Clone, Default)]
pub struct ModelMapper {
    override_model: Option<String>,
    rules: Vec<ModelRule>,
}

impl ModelMapper {
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            override_model: config.override_model.clone(),
            rules: config.rules.clone(),
        }
    }

    /// Appends rules evaluated after the existing ones.
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = ModelRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Resolves the upstream model for a requested name.
    ///
    /// The override wins over everything. Names already in `vendor/model` form pass through,
    /// then the first matching rule applies. Unmatched names pass through unchanged so the
    /// upstream gets to reject them.
    pub fn map(&self, requested: &str) -> String {
        if let Some(model) = &self.override_model {
            return model.clone();
        }

        if requested.contains('/') {
            return requested.to_string();
        }

        match self.rules.iter().find_map(|rule| rule.apply(requested)) {
            Some(target) => target.to_string(),
            None => {
                log::debug!("No model rule matches '{requested}', passing it through");
                requested.to_string()
            }
        }
    }
}
