//! The conversations the bot offers, declared as step lists.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use crate::dialogue::{Flow, FlowError, MultiStep, SingleStep, DEFAULT_TERMINATOR};
use crate::localization::{t_args_lang, t_lang, DEFAULT_LANGUAGE};
use crate::validation::{all_of, http_url, max_length, non_empty, not_command, MAX_TITLE_LENGTH};

pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_IMAGE_URL: &str = "image_url";
pub const FIELD_LINKS: &str = "links";

/// Which conversation a flow implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Recipe,
    Movie,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Recipe => "recipe",
            FlowKind::Movie => "movie",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recipe" => Ok(FlowKind::Recipe),
            "movie" => Ok(FlowKind::Movie),
            other => Err(format!("unknown flow: {other}")),
        }
    }
}

fn title_validator(language: Option<&str>) -> crate::dialogue::Validator {
    all_of(vec![
        non_empty(t_lang("title-empty", language)),
        max_length(MAX_TITLE_LENGTH, t_lang("title-too-long", language)),
    ])
}

/// Title, description and image URL
pub fn recipe_flow(language: Option<&str>) -> Result<Flow, FlowError> {
    Flow::builder(FlowKind::Recipe.as_str())
        .validator_failed_message(t_lang("validator-failed", language))
        .step(
            SingleStep::new(FIELD_TITLE, t_lang("recipe-title-prompt", language))
                .validator(title_validator(language)),
        )
        .step(
            SingleStep::new(
                FIELD_DESCRIPTION,
                t_lang("recipe-description-prompt", language),
            )
            .validator(non_empty(t_lang("description-empty", language))),
        )
        .step(
            SingleStep::new(FIELD_IMAGE_URL, t_lang("recipe-image-prompt", language))
                .validator(http_url(t_lang("url-invalid", language))),
        )
        .build()
}

/// Title, then download links until the terminator
pub fn movie_flow(language: Option<&str>) -> Result<Flow, FlowError> {
    let terminator = [("terminator", DEFAULT_TERMINATOR)];
    Flow::builder(FlowKind::Movie.as_str())
        .validator_failed_message(t_lang("validator-failed", language))
        .step(
            SingleStep::new(FIELD_TITLE, t_lang("movie-title-prompt", language))
                .validator(title_validator(language)),
        )
        .step(
            MultiStep::new(
                FIELD_LINKS,
                t_args_lang("movie-links-prompt", &terminator, language),
            )
            .terminator(DEFAULT_TERMINATOR)
            .min_count(1)
            .item_validator(all_of(vec![
                not_command(t_args_lang("link-is-command", &terminator, language)),
                http_url(t_lang("url-invalid", language)),
            ]))
            .ack(t_args_lang("link-added", &terminator, language))
            .min_count_message(t_args_lang(
                "links-too-few",
                &[("min", "1"), ("terminator", DEFAULT_TERMINATOR)],
                language,
            )),
        )
        .build()
}

/// Builds flows per language on first use and shares them afterwards
#[derive(Default)]
pub struct FlowCatalog {
    cache: Mutex<HashMap<(FlowKind, String), Arc<Flow>>>,
}

impl FlowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: FlowKind, language: Option<&str>) -> Result<Arc<Flow>, FlowError> {
        let key = (kind, language.unwrap_or(DEFAULT_LANGUAGE).to_lowercase());
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(flow) = cache.get(&key) {
            return Ok(Arc::clone(flow));
        }
        let flow = Arc::new(match kind {
            FlowKind::Recipe => recipe_flow(language)?,
            FlowKind::Movie => movie_flow(language)?,
        });
        cache.insert(key, Arc::clone(&flow));
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::{Step, GENERIC_VALIDATION_MESSAGE};

    #[test]
    fn test_recipe_flow_fields_in_prompt_order() {
        let flow = recipe_flow(None).unwrap();
        let fields: Vec<&str> = flow.steps().iter().map(Step::field).collect();
        assert_eq!(fields, vec![FIELD_TITLE, FIELD_DESCRIPTION, FIELD_IMAGE_URL]);
        assert_eq!(flow.name(), "recipe");
    }

    #[test]
    fn test_movie_flow_ends_with_multi_step() {
        let flow = movie_flow(Some("fr")).unwrap();
        assert!(matches!(flow.steps()[1], Step::Multi(_)));
        assert_eq!(
            flow.steps()[1].prompt().terminator.as_deref(),
            Some(DEFAULT_TERMINATOR)
        );
    }

    #[test]
    fn test_validator_failure_message_is_localized() {
        let flow = movie_flow(Some("fr")).unwrap();
        assert_eq!(
            flow.validator_failed_message(),
            t_lang("validator-failed", Some("fr"))
        );
        assert_ne!(flow.validator_failed_message(), GENERIC_VALIDATION_MESSAGE);
    }

    #[test]
    fn test_catalog_caches_per_language() {
        let catalog = FlowCatalog::new();
        let first = catalog.get(FlowKind::Movie, Some("en")).unwrap();
        let second = catalog.get(FlowKind::Movie, Some("EN")).unwrap();
        let french = catalog.get(FlowKind::Movie, Some("fr")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &french));
    }

    #[test]
    fn test_flow_kind_round_trips_through_name() {
        for kind in [FlowKind::Recipe, FlowKind::Movie] {
            assert_eq!(kind.as_str().parse::<FlowKind>(), Ok(kind));
        }
        assert!("other".parse::<FlowKind>().is_err());
    }
}
