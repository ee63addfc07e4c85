//! Line commands typed by the respondent.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Begin,
    /// `number` is 1-based; an empty `value` clears the answer.
    Answer {
        number: usize,
        value: String,
    },
    Flag {
        number: usize,
    },
    Goto {
        number: usize,
    },
    Next,
    Prev,
    Status,
    Submit,
    Retry,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'; type 'help' for the list")]
    Unknown(String),
    #[error("'{0}' needs a question number")]
    MissingNumber(&'static str),
    #[error("'{0}' is not a question number")]
    InvalidNumber(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim_start()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "begin" | "start" => Ok(Command::Begin),
            "answer" | "a" => {
                let (number, value) = match rest.split_once(char::is_whitespace) {
                    Some((number, value)) => (number, value.trim()),
                    None => (rest, ""),
                };
                Ok(Command::Answer {
                    number: parse_number("answer", number)?,
                    value: value.to_string(),
                })
            }
            "clear" => Ok(Command::Answer {
                number: parse_number("clear", rest)?,
                value: String::new(),
            }),
            "flag" => Ok(Command::Flag {
                number: parse_number("flag", rest)?,
            }),
            "goto" | "g" => Ok(Command::Goto {
                number: parse_number("goto", rest)?,
            }),
            "next" | "n" => Ok(Command::Next),
            "prev" | "p" => Ok(Command::Prev),
            "status" | "s" => Ok(Command::Status),
            "submit" => Ok(Command::Submit),
            "retry" => Ok(Command::Retry),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Begin => "begin",
            Command::Answer { value, .. } if value.is_empty() => "clear",
            Command::Answer { .. } => "answer",
            Command::Flag { .. } => "flag",
            Command::Goto { .. } => "goto",
            Command::Next => "next",
            Command::Prev => "prev",
            Command::Status => "status",
            Command::Submit => "submit",
            Command::Retry => "retry",
            Command::Help => "help",
            Command::Quit => "quit",
        }
    }
}

fn parse_number(command: &'static str, raw: &str) -> Result<usize, CommandError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CommandError::MissingNumber(command));
    }
    match raw.parse::<usize>() {
        Ok(number) if number >= 1 => Ok(number),
        _ => Err(CommandError::InvalidNumber(raw.to_string())),
    }
}

pub const HELP: &str = "\
commands:
  begin                 start the timer
  answer <n> <value>    answer question n (choice id, true/false, or text)
  clear <n>             remove the answer to question n
  flag <n>              flag or unflag question n for review
  goto <n> | next | prev
  status               show progress and time left
  submit               hand in your answers
  quit                 leave without submitting";

#[cfg(test)]
#[path = "../tests/commands_tests.rs"]
mod tests;
