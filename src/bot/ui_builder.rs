//! UI Builder module for keyboards and composed messages

use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove};

use crate::dialogue::{Prompt, DEFAULT_TERMINATOR};
use crate::localization::{t_args_lang, t_lang};

pub fn welcome_message(language_code: Option<&str>) -> String {
    format!(
        "👋 **{}**\n\n{}\n\n{}\n{}\n{}\n{}\n{}",
        t_lang("welcome-title", language_code),
        t_lang("welcome-description", language_code),
        t_lang("welcome-commands", language_code),
        t_lang("welcome-recipe", language_code),
        t_lang("welcome-movie", language_code),
        t_lang("welcome-cancel", language_code),
        t_lang("welcome-help", language_code),
    )
}

pub fn help_message(language_code: Option<&str>) -> String {
    [
        t_lang("help-title", language_code),
        t_lang("help-step1", language_code),
        t_lang("help-step2", language_code),
        t_args_lang(
            "help-step3",
            &[("terminator", DEFAULT_TERMINATOR)],
            language_code,
        ),
        t_lang("help-step4", language_code),
        t_lang("help-commands", language_code),
    ]
    .join("\n\n")
}

/// Rejection message followed by the prompt being repeated
pub fn format_validation(message: &str, prompt: &Prompt) -> Prompt {
    Prompt {
        text: format!("⚠️ {message}\n\n{}", prompt.text),
        terminator: prompt.terminator.clone(),
    }
}

/// Running count followed by the step's acknowledgement
pub fn format_ack(prompt: &Prompt, collected: usize, language_code: Option<&str>) -> Prompt {
    let count = collected.to_string();
    Prompt {
        text: format!(
            "✅ {}\n{}",
            t_args_lang("items-collected", &[("count", count.as_str())], language_code),
            prompt.text
        ),
        terminator: prompt.terminator.clone(),
    }
}

/// One-button keyboard offering the terminator
pub fn terminator_keyboard(terminator: &str) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(terminator)]])
}

pub fn remove_keyboard() -> KeyboardRemove {
    KeyboardRemove::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_validation_keeps_terminator() {
        let prompt = Prompt {
            text: "links?".to_string(),
            terminator: Some("/end".to_string()),
        };
        let shown = format_validation("bad link", &prompt);
        assert!(shown.text.contains("bad link"));
        assert!(shown.text.ends_with("links?"));
        assert_eq!(shown.terminator.as_deref(), Some("/end"));
    }

    #[test]
    fn test_format_ack_counts_items() {
        let prompt = Prompt {
            text: "more?".to_string(),
            terminator: Some("/end".to_string()),
        };
        assert!(format_ack(&prompt, 1, None).text.contains("1 link collected"));
        assert!(format_ack(&prompt, 3, None).text.contains("3 links collected"));
    }
}
