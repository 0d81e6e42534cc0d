use crate::{AppError, AppResult};

use std::{panic::Location, str::FromStr};

use error_location::ErrorLocation;
use voice_notes_core::{AudioFormat, SessionEvent};

/// Usage text printed by `help`.
pub(crate) const HELP: &str = "\
Commands:
  record [--format lossless|aac|mp3] <name>   start recording a note
  stop                                        stop recording or playback
  discard                                     stop recording and throw it away
  list                                        list saved notes, newest first
  play <n>                                    play note number n from the list
  delete <n>                                  delete note number n
  elapsed                                     show recording time
  permission                                  check or request microphone access
  interrupt begin|end                         simulate an audio interruption
  background | foreground                     simulate app lifecycle changes
  route                                       simulate an output route change
  proximity near|far                          simulate the proximity sensor
  help                                        show this text
  quit                                        exit";

/// Commands sent from the console to the main application.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Start recording a new note.
    Record {
        /// Name for the record.
        name: String,
        /// Encoding; the configured default when `None`.
        format: Option<AudioFormat>,
    },
    /// Stop the current recording or playback.
    Stop,
    /// Stop the current recording without saving it.
    Discard,
    /// Print saved records.
    List,
    /// Play the record at this 1-based list position.
    Play {
        /// 1-based position in the last listing.
        index: usize,
    },
    /// Delete the record at this 1-based list position.
    Delete {
        /// 1-based position in the last listing.
        index: usize,
    },
    /// Print the running recording time.
    Elapsed,
    /// Check microphone permission, asking if undetermined.
    Permission,
    /// Forward a simulated platform notification to the controller.
    Session(SessionEvent),
    /// Print usage.
    Help,
    /// Request application shutdown.
    Quit,
}

impl FromStr for AppCommand {
    type Err = AppError;

    #[track_caller]
    fn from_str(line: &str) -> AppResult<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(invalid("empty command"));
        };
        let rest: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), rest.as_slice()) {
            ("record", args) => parse_record(args)?,
            ("stop", []) => AppCommand::Stop,
            ("discard", []) => AppCommand::Discard,
            ("list" | "ls", []) => AppCommand::List,
            ("play", [n]) => AppCommand::Play {
                index: parse_index(n)?,
            },
            ("delete" | "rm", [n]) => AppCommand::Delete {
                index: parse_index(n)?,
            },
            ("elapsed", []) => AppCommand::Elapsed,
            ("permission", []) => AppCommand::Permission,
            ("interrupt", ["begin"]) => AppCommand::Session(SessionEvent::InterruptionBegan),
            ("interrupt", ["end"]) => AppCommand::Session(SessionEvent::InterruptionEnded),
            ("background", []) => AppCommand::Session(SessionEvent::EnteredBackground),
            ("foreground", []) => AppCommand::Session(SessionEvent::EnteredForeground),
            ("route", []) => AppCommand::Session(SessionEvent::RouteChanged),
            ("proximity", ["near"]) => {
                AppCommand::Session(SessionEvent::ProximityChanged { near: true })
            }
            ("proximity", ["far"]) => {
                AppCommand::Session(SessionEvent::ProximityChanged { near: false })
            }
            ("help" | "?", []) => AppCommand::Help,
            ("quit" | "exit", []) => AppCommand::Quit,
            (verb, _) => {
                return Err(invalid(&format!(
                    "unrecognized command '{}'; type 'help'",
                    verb
                )));
            }
        };

        Ok(command)
    }
}

#[track_caller]
fn parse_record(args: &[&str]) -> AppResult<AppCommand> {
    let (format, name_words) = match args {
        ["--format", format, name @ ..] => {
            let format = format.parse::<AudioFormat>().map_err(|e| invalid(&e))?;
            (Some(format), name)
        }
        name => (None, name),
    };

    let name = name_words.join(" ");
    if name.is_empty() {
        return Err(invalid("record needs a name"));
    }

    Ok(AppCommand::Record { name, format })
}

#[track_caller]
fn parse_index(word: &str) -> AppResult<usize> {
    match word.parse::<usize>() {
        Ok(index) if index > 0 => Ok(index),
        _ => Err(invalid(&format!(
            "'{}' is not a list position (1, 2, ...)",
            word
        ))),
    }
}

#[track_caller]
fn invalid(reason: &str) -> AppError {
    AppError::InvalidCommand {
        reason: reason.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}
