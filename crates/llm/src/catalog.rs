//! Upstream model catalog, used for model listings and tier rules.

use config::{ModelFilter, ModelMatcher, ModelRule, ModelsConfig};
use jiff::Timestamp;

use crate::messages::{
    anthropic::{AnthropicModel, AnthropicModelsResponse},
    openai::Model,
};

/// Claude tiers that get a rule pointing at their newest upstream model.
const TIERS: [&str; 3] = ["haiku", "sonnet", "opus"];

/// Upstream ids prefixed like this are Claude models.
const CLAUDE_PREFIX: &str = "anthropic/claude";

/// Variants that are not a plain release of a model.
const EXCLUDED_VARIANTS: [&str; 3] = [":free", ":beta", ":extended"];

#[derive(Debug, Clone, Default)]
pub(crate) struct ModelCatalog {
    models: Vec<Model>,
}

impl ModelCatalog {
    pub(crate) fn new(models: Vec<Model>) -> Self {
        Self { models }
    }

    /// A catalog of the configured targets, for when discovery is off or failed.
    pub(crate) fn from_config(config: &ModelsConfig) -> Self {
        let mut models: Vec<Model> = Vec::new();

        let targets = config
            .override_model
            .iter()
            .map(String::as_str)
            .chain(config.rules.iter().map(|rule| rule.target.as_str()));

        for target in targets {
            if models.iter().all(|model| model.id != target) {
                models.push(Model {
                    id: target.to_string(),
                    name: None,
                    created: 0,
                });
            }
        }

        Self { models }
    }

    pub(crate) fn len(&self) -> usize {
        self.models.len()
    }

    pub(crate) fn find(&self, id: &str) -> Option<&Model> {
        self.models.iter().find(|model| model.id == id)
    }

    /// One rule per tier, matching the tier name and targeting its newest Claude model.
    pub(crate) fn tier_rules(&self) -> Vec<ModelRule> {
        TIERS
            .into_iter()
            .filter_map(|tier| {
                let newest = self
                    .models
                    .iter()
                    .filter(|model| is_release(&model.id) && model.id.contains(tier))
                    .max_by_key(|model| model.created)?;

                let filter = match ModelFilter::new(tier) {
                    Ok(filter) => filter,
                    Err(e) => {
                        log::error!("Invalid tier pattern '{tier}': {e}");
                        return None;
                    }
                };

                log::debug!("Mapping tier '{tier}' to upstream model '{}'", newest.id);

                Some(ModelRule::new(ModelMatcher::Pattern(filter), newest.id.clone()))
            })
            .collect()
    }

    /// The catalog in Anthropic listing format, newest first.
    pub(crate) fn anthropic_models(&self) -> AnthropicModelsResponse {
        let mut models: Vec<&Model> = self.models.iter().collect();
        models.sort_by(|a, b| b.created.cmp(&a.created));

        let data: Vec<AnthropicModel> = models.into_iter().map(AnthropicModel::from).collect();

        AnthropicModelsResponse {
            first_id: data.first().map(|model| model.id.clone()),
            last_id: data.last().map(|model| model.id.clone()),
            has_more: false,
            data,
        }
    }
}

fn is_release(id: &str) -> bool {
    id.starts_with(CLAUDE_PREFIX) && !EXCLUDED_VARIANTS.iter().any(|variant| id.ends_with(variant))
}

impl From<&Model> for AnthropicModel {
    fn from(model: &Model) -> Self {
        let created_at = i64::try_from(model.created)
            .ok()
            .and_then(|seconds| Timestamp::from_second(seconds).ok())
            .unwrap_or(Timestamp::UNIX_EPOCH);

        Self {
            id: model.id.clone(),
            model_type: "model".to_string(),
            display_name: model.name.clone().unwrap_or_else(|| model.id.clone()),
            created_at: created_at.to_string(),
        }
    }
}
