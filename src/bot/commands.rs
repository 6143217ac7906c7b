//! Top-level commands. Anything else is an answer for the live conversation.

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "show the welcome message.")]
    Start,
    #[command(description = "explain how it works.")]
    Help,
    #[command(description = "build a recipe page.")]
    Recipe,
    #[command(description = "build a movie page.")]
    Movie,
    #[command(description = "abandon the current conversation.")]
    Cancel,
}

/// `None` for plain text, unknown commands, and the list terminator
pub fn parse_command(text: &str, bot_username: &str) -> Option<Command> {
    Command::parse(text.trim(), bot_username).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_commands() {
        assert_eq!(parse_command("/recipe", ""), Some(Command::Recipe));
        assert_eq!(parse_command(" /movie ", ""), Some(Command::Movie));
        assert_eq!(parse_command("/cancel", ""), Some(Command::Cancel));
    }

    #[test]
    fn test_terminator_and_text_are_not_commands() {
        assert_eq!(parse_command("/end", ""), None);
        assert_eq!(parse_command("/unknown", ""), None);
        assert_eq!(parse_command("Chocolate cake", ""), None);
    }

    #[test]
    fn test_addressed_commands() {
        assert_eq!(
            parse_command("/recipe@pages_bot", "pages_bot"),
            Some(Command::Recipe)
        );
    }
}
