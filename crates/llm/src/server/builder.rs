//! Builder for the messages handler, including model discovery.

use config::Config;

use crate::{
    catalog::ModelCatalog,
    model_map::ModelMapper,
    provider::{Provider, openai::OpenAIProvider},
    server::LlmHandler,
};

pub(crate) struct LlmServerBuilder<'a> {
    config: &'a Config,
}

impl<'a> LlmServerBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub async fn build(self) -> crate::Result<LlmHandler> {
        let provider = OpenAIProvider::new(&self.config.upstream)?;
        self.build_with_provider(Box::new(provider)).await
    }

    async fn build_with_provider(self, provider: Box<dyn Provider>) -> crate::Result<LlmHandler> {
        let models = &self.config.models;
        let mut mapper = ModelMapper::new(models);

        let catalog = if models.discover {
            match provider.list_models().await {
                Ok(discovered) => {
                    let catalog = ModelCatalog::new(discovered);
                    mapper = mapper.with_rules(catalog.tier_rules());

                    log::debug!(
                        "Discovered {} models from the '{}' upstream",
                        catalog.len(),
                        provider.name()
                    );

                    catalog
                }
                Err(e) => {
                    log::warn!("Model discovery failed, continuing with configured rules only: {e}");
                    ModelCatalog::from_config(models)
                }
            }
        } else {
            ModelCatalog::from_config(models)
        };

        Ok(LlmHandler {
            provider,
            mapper,
            catalog,
        })
    }
}
