//! Input line parsing.

/// What one line of input asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Plain text: send as chat.
    Chat(String),
    /// `/nick <name>`
    Nick(String),
    /// `/color <#rrggbb>`
    Color(String),
    /// `/reconnect`
    Reconnect,
    /// `/status`
    Status,
    /// `/help`
    Help,
    /// `/quit` or `/exit`
    Quit,
    /// Slash command that is unknown or missing its argument.
    Invalid(String),
    /// Blank line.
    Empty,
}

/// Usage text for `/help`.
pub const HELP: &str = "\
commands:
  /nick <name>      change nickname
  /color <#rrggbb>  set the shared color
  /reconnect        reconnect now
  /status           show connection status
  /quit             leave";

/// Parse one input line.
pub fn parse_line(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Chat(line.to_owned());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match (name, arg.is_empty()) {
        ("nick", false) => Command::Nick(arg.to_owned()),
        ("color", false) => Command::Color(arg.to_owned()),
        ("reconnect", true) => Command::Reconnect,
        ("status", true) => Command::Status,
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        ("nick" | "color", true) => Command::Invalid(format!("/{name} needs an argument")),
        _ => Command::Invalid(format!("unknown command /{name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(parse_line("  hello there "), Command::Chat("hello there".into()));
    }

    #[test]
    fn blank_is_empty() {
        assert_eq!(parse_line("   "), Command::Empty);
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(parse_line("/nick  dj nova "), Command::Nick("dj nova".into()));
        assert_eq!(parse_line("/color #ff0000"), Command::Color("#ff0000".into()));
    }

    #[test]
    fn bare_commands() {
        assert_eq!(parse_line("/reconnect"), Command::Reconnect);
        assert_eq!(parse_line("/status"), Command::Status);
        assert_eq!(parse_line("/quit"), Command::Quit);
        assert_eq!(parse_line("/exit"), Command::Quit);
        assert_eq!(parse_line("/help"), Command::Help);
    }

    #[test]
    fn missing_argument_is_invalid() {
        assert_eq!(parse_line("/nick"), Command::Invalid("/nick needs an argument".into()));
    }

    #[test]
    fn unknown_command_is_invalid() {
        assert_eq!(parse_line("/dance"), Command::Invalid("unknown command /dance".into()));
        assert_eq!(parse_line("/status now"), Command::Invalid("unknown command /status".into()));
    }
}
