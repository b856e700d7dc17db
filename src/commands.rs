//! Operator commands
//! This module turns one line of operator input into a closed command value.
//! Both loops parse first and then dispatch by matching on the result.

use thiserror::Error;

use crate::core::SessionError;
use crate::utils::parse_payload;

/// Help shown in the scan/selection loop
pub const SELECTION_HELP: &[&str] = &[
    "Commands:",
    "  <number>   connect to the device with that number",
    "  refresh    scan again and show the new device list",
    "  help       show this help",
    "  quit/exit  leave the program",
];

/// Help shown inside a connected session
pub const SESSION_HELP: &[&str] = &[
    "Commands:",
    "  list                list services and characteristics",
    "  read <n>            read characteristic <n>",
    "  subscribe <n>       print notifications/indications from characteristic <n>",
    "  unsubscribe <n>     stop notifications from characteristic <n>",
    "  subscriptions       show active subscriptions",
    "  write <n> <data>    write text (or hex:0a0b...) to characteristic <n>",
    "  rescan              disconnect and scan for devices again",
    "  help                show this help",
    "  quit/exit           disconnect and leave the program",
];

/// Input accepted while choosing a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionInput {
    Help,
    Quit,
    Refresh,
    Select(usize),
    Empty,
    Invalid(String),
}

impl SelectionInput {
    pub fn parse(line: &str) -> Self {
        let input = line.trim();
        if input.is_empty() {
            return Self::Empty;
        }

        match input.to_lowercase().as_str() {
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            "refresh" => Self::Refresh,
            _ => match parse_index(input) {
                Some(index) => Self::Select(index),
                None => Self::Invalid(input.to_string()),
            },
        }
    }
}

/// Commands accepted inside a connected session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Read(usize),
    Subscribe(usize),
    Unsubscribe(usize),
    Subscriptions,
    Write(usize, Vec<u8>),
    Rescan,
    Exit,
    Empty,
    Invalid(CommandError),
}

/// Why a session command line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help' for options")]
    Unknown(String),

    #[error("'{command}' takes no arguments")]
    UnexpectedArgument { command: &'static str },

    #[error("'{command}' expects an index, e.g. '{command} 0'")]
    MissingIndex { command: &'static str },

    #[error("'{command}' expects a single index, e.g. '{command} 0'")]
    ExtraArgument { command: &'static str },

    #[error("'{value}' is not a valid index for '{command}'")]
    BadIndex { command: &'static str, value: String },

    #[error("'write' expects a payload, e.g. 'write 0 hello' or 'write 0 hex:0a0b'")]
    MissingPayload,

    #[error("invalid payload: {0}")]
    BadPayload(String),
}

impl From<CommandError> for SessionError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Unknown(_) | CommandError::UnexpectedArgument { .. } => {
                SessionError::InvalidCommand(err.to_string())
            }
            _ => SessionError::InvalidArgument(err.to_string()),
        }
    }
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let (keyword, rest) = split_token(line);
        if keyword.is_empty() {
            return Self::Empty;
        }

        match keyword.to_lowercase().as_str() {
            "help" => no_args("help", rest, Self::Help),
            "list" => no_args("list", rest, Self::List),
            "subscriptions" => no_args("subscriptions", rest, Self::Subscriptions),
            "rescan" => no_args("rescan", rest, Self::Rescan),
            "exit" => no_args("exit", rest, Self::Exit),
            "quit" => no_args("quit", rest, Self::Exit),
            "read" => with_index("read", rest, Self::Read),
            "subscribe" => with_index("subscribe", rest, Self::Subscribe),
            "unsubscribe" => with_index("unsubscribe", rest, Self::Unsubscribe),
            "write" => Self::parse_write(rest),
            _ => Self::Invalid(CommandError::Unknown(keyword.to_string())),
        }
    }

    fn parse_write(rest: &str) -> Self {
        let (index, payload) = split_token(rest);
        if index.is_empty() {
            return Self::Invalid(CommandError::MissingIndex { command: "write" });
        }
        let Some(index) = parse_index(index) else {
            return Self::Invalid(CommandError::BadIndex {
                command: "write",
                value: index.to_string(),
            });
        };
        if payload.is_empty() {
            return Self::Invalid(CommandError::MissingPayload);
        }
        match parse_payload(payload) {
            Ok(bytes) => Self::Write(index, bytes),
            Err(reason) => Self::Invalid(CommandError::BadPayload(reason)),
        }
    }
}

fn no_args(command: &'static str, rest: &str, parsed: Command) -> Command {
    if rest.is_empty() {
        parsed
    } else {
        Command::Invalid(CommandError::UnexpectedArgument { command })
    }
}

fn with_index(command: &'static str, rest: &str, build: fn(usize) -> Command) -> Command {
    let mut args = rest.split_whitespace();
    let (Some(value), None) = (args.next(), args.next()) else {
        return Command::Invalid(if rest.is_empty() {
            CommandError::MissingIndex { command }
        } else {
            CommandError::ExtraArgument { command }
        });
    };

    match parse_index(value) {
        Some(index) => build(index),
        None => Command::Invalid(CommandError::BadIndex {
            command,
            value: value.to_string(),
        }),
    }
}

/// Parses a non-negative integer literal.
///
/// Literals too large for `usize` map to `usize::MAX` so they are reported as
/// out of range rather than malformed.
fn parse_index(value: &str) -> Option<usize> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(value.parse().unwrap_or(usize::MAX))
}

/// Splits off the first whitespace-delimited token; the remainder keeps its inner spacing
fn split_token(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim()),
        None => (line, ""),
    }
}
