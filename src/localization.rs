//! # Localization Module
//!
//! User-facing text for the bot, backed by Fluent resources embedded at
//! compile time. English is the fallback for any unsupported language.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use tracing::{error, warn};
use unic_langid::LanguageIdentifier;

/// Language used when the requested one is not available
pub const DEFAULT_LANGUAGE: &str = "en";

const RESOURCES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("fr", include_str!("../locales/fr/main.ftl")),
];

/// Localization manager for the bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a manager with every embedded language loaded
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        for (code, source) in RESOURCES {
            let locale: LanguageIdentifier = code.parse()?;
            bundles.insert(code.to_string(), Self::create_bundle(locale, source)?);
        }
        Ok(Self { bundles })
    }

    fn create_bundle(
        locale: LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Keep output free of bidi isolation marks around arguments
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("invalid resource for {locale}: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("duplicate messages for {locale}: {errors:?}"))?;
        Ok(bundle)
    }

    /// Is `language` (or its primary subtag) one we ship
    pub fn is_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(&primary_subtag(language))
    }

    /// Get a localized message, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let code = primary_subtag(language);
        let Some(bundle) = self
            .bundles
            .get(&code)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        else {
            return format!("Missing translation: {key}");
        };

        let Some(pattern) = bundle.get_message(key).and_then(|message| message.value()) else {
            return format!("Missing translation: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::try_number(*value));
            }
            fluent_args
        });

        let mut errors = Vec::new();
        let value = bundle
            .format_pattern(pattern, fluent_args.as_ref(), &mut errors)
            .into_owned();
        if !errors.is_empty() {
            warn!(key, language = %code, errors = ?errors, "Message formatted with errors");
        }
        value
    }
}

fn primary_subtag(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_lowercase()
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_none() {
        let _ = LOCALIZATION_MANAGER.set(LocalizationManager::new()?);
    }
    Ok(())
}

fn manager() -> Option<&'static LocalizationManager> {
    if let Err(e) = init_localization() {
        error!(error = %e, "Failed to initialize localization");
    }
    LOCALIZATION_MANAGER.get()
}

/// Localized message for `language` (English when `None`)
pub fn t_lang(key: &str, language: Option<&str>) -> String {
    match manager() {
        Some(manager) => {
            manager.get_message_in_language(key, language.unwrap_or(DEFAULT_LANGUAGE), None)
        }
        None => format!("Missing translation: {key}"),
    }
}

/// Localized message with arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: Option<&str>) -> String {
    let args: HashMap<&str, &str> = args.iter().cloned().collect();
    match manager() {
        Some(manager) => manager.get_message_in_language(
            key,
            language.unwrap_or(DEFAULT_LANGUAGE),
            Some(&args),
        ),
        None => format!("Missing translation: {key}"),
    }
}
