//! Slash command parsing for the REPL

use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Add a file (image, video, audio, PDF, DOCX) to the conversation
    Attach(PathBuf),
    /// Add a voice recording
    Speech(PathBuf),
    Reset,
    Models,
    History,
    Help,
    Quit,
    Unknown(String),
    /// A command that needs an argument was given none
    MissingArgument(&'static str),
}

impl Command {
    /// `None` when the line is a prompt rather than a command
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        Some(match command {
            "/attach" if arg.is_empty() => Command::MissingArgument("/attach <path>"),
            "/attach" => Command::Attach(expand_home(arg)),
            "/speech" if arg.is_empty() => Command::MissingArgument("/speech <path>"),
            "/speech" => Command::Speech(expand_home(arg)),
            "/reset" | "/clear" => Command::Reset,
            "/models" => Command::Models,
            "/history" => Command::History,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        })
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().unwrap_or_default().join(rest),
        None => PathBuf::from(path),
    }
}

pub fn print_help() {
    println!("Commands:");
    println!("  /attach <path>     - Add an image, video, audio, PDF or DOCX file");
    println!("  /speech <path>     - Add a voice recording (answered on next send)");
    println!("  /reset             - Clear the conversation and uploaded files");
    println!("  /models            - List models usable with your keys");
    println!("  /history           - Show the conversation");
    println!("  /quit              - Exit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_are_not_commands() {
        assert_eq!(Command::parse("hello there"), None);
        assert_eq!(Command::parse("  what is /tmp?"), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("/attach  clip.mp4 "),
            Some(Command::Attach(PathBuf::from("clip.mp4")))
        );
        assert_eq!(
            Command::parse("/speech"),
            Some(Command::MissingArgument("/speech <path>"))
        );
        assert_eq!(Command::parse("/reset"), Some(Command::Reset));
        assert_eq!(Command::parse("/exit"), Some(Command::Quit));
        assert_eq!(
            Command::parse("/nope"),
            Some(Command::Unknown("/nope".into()))
        );
    }
}
