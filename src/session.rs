use std::rc::Rc;

use crate::cache::JsonFieldCache;
use crate::config::{Config, FieldDiscovery, Prompts};
use crate::error::{AstoundError, Result};
use crate::fields::{FieldResolver, LayeredFieldResolver, OracleFieldResolver, StaticFieldTable};
use crate::generate::{AnthropicClient, GenerationRequest, GenerationSettings, TextGenerator};

/// Collaborators and settings shared by every operation of one navigation
/// session. Passed by reference into anything that needs a service.
pub struct Session {
    fields: Box<dyn FieldResolver>,
    generator: Option<Rc<dyn TextGenerator>>,
    model: String,
    prompts: Prompts,
    summary: GenerationSettings,
    split_depth: usize,
}

impl Session {
    pub fn new(fields: Box<dyn FieldResolver>) -> Self {
        let defaults = Config::default();
        Self {
            fields,
            generator: None,
            model: defaults.model,
            prompts: defaults.prompts,
            summary: defaults.summary,
            split_depth: defaults.split_depth,
        }
    }

    pub fn with_generator(mut self, generator: Rc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_split_depth(mut self, split_depth: usize) -> Self {
        self.split_depth = split_depth;
        self
    }

    pub fn from_config(cfg: &Config) -> Self {
        let generator: Option<Rc<dyn TextGenerator>> = AnthropicClient::from_env(&cfg.api_base, &cfg.api_key_env)
            .map(|client| Rc::new(client) as Rc<dyn TextGenerator>);
        if generator.is_none() {
            tracing::warn!(env = %cfg.api_key_env, "no API key found; summaries and oracle field discovery are disabled");
        }

        let oracle = generator.clone().map(|generator| {
            OracleFieldResolver::new(Box::new(JsonFieldCache::open(&cfg.field_cache)), generator, &cfg.model)
                .with_prompts(&cfg.prompts.field_system, &cfg.prompts.field_query)
                .with_max_tokens(cfg.field_query.max_tokens)
        });

        let fields: Box<dyn FieldResolver> = match (cfg.field_discovery, oracle) {
            (FieldDiscovery::Static, _) => Box::new(StaticFieldTable),
            (FieldDiscovery::Oracle, Some(oracle)) => Box::new(oracle),
            (FieldDiscovery::Oracle, None) => {
                tracing::warn!("oracle field discovery requested without a generator; using the static table");
                Box::new(StaticFieldTable)
            }
            (FieldDiscovery::Layered, oracle) => Box::new(LayeredFieldResolver::new(oracle)),
        };

        Self {
            fields,
            generator,
            model: cfg.model.clone(),
            prompts: cfg.prompts.clone(),
            summary: cfg.summary.clone(),
            split_depth: cfg.split_depth,
        }
    }

    pub fn fields(&self) -> &dyn FieldResolver {
        self.fields.as_ref()
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn split_depth(&self) -> usize {
        self.split_depth
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Send one summarization prompt. A blank reply is an error.
    pub fn summarize_prompt(&self, prompt: String) -> Result<String> {
        let generator = self.generator.as_ref().ok_or(AstoundError::GeneratorUnavailable)?;
        let request = GenerationRequest::new(&self.model, &self.summary, &self.prompts.summary_system, prompt);
        let reply = generator.generate(&request)?;
        if reply.trim().is_empty() {
            return Err(AstoundError::Generation("empty reply".to_string()));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summaries_need_a_generator() {
        let session = Session::new(Box::new(StaticFieldTable));
        assert!(!session.has_generator());
        let err = session.summarize_prompt("x".to_string()).unwrap_err();
        assert!(matches!(err, AstoundError::GeneratorUnavailable));
    }

    struct Blank;

    impl TextGenerator for Blank {
        fn generate(&self, _request: &GenerationRequest) -> Result<String> {
            Ok("  \n".to_string())
        }
    }

    #[test]
    fn blank_replies_are_errors() {
        let session = Session::new(Box::new(StaticFieldTable)).with_generator(Rc::new(Blank));
        let err = session.summarize_prompt("x".to_string()).unwrap_err();
        assert!(matches!(err, AstoundError::Generation(_)));
    }

    #[test]
    fn config_without_key_still_builds() {
        let cfg = Config {
            api_key_env: "ASTOUND_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            split_depth: 4,
            ..Config::default()
        };
        let session = Session::from_config(&cfg);
        assert!(!session.has_generator());
        assert_eq!(session.split_depth(), 4);
    }
}
