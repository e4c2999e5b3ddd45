use crate::events::AppEvent;
use crossbeam_channel::Sender;
use std::io::{self, BufRead};
use std::path::PathBuf;

pub const HELP: &str = "\
Commands:
  token <value>    set the bearer token
  model <name>     set the model name
  file <path>      choose the audio file
  submit           send the transcription request
  cancel           cancel the running request
  status           show the current status
  show             print the result text
  edit <text>      replace the result text
  clear            clear the result text
  copy             copy the result to the clipboard
  export <path>    write the result to a text file
  save             remember token, model and file
  help             show this help
  quit             exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetToken(String),
    SetModel(String),
    SetFile(String),
    Submit,
    Cancel,
    Status,
    Show,
    Edit(String),
    Clear,
    Copy,
    Export(PathBuf),
    Save,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match (verb.to_ascii_lowercase().as_str(), rest) {
            ("", _) => Command::Empty,
            ("token", value) => Command::SetToken(value.to_string()),
            ("model", value) => Command::SetModel(value.to_string()),
            ("file", value) => Command::SetFile(value.to_string()),
            ("submit" | "s", "") => Command::Submit,
            ("cancel" | "c", "") => Command::Cancel,
            ("status", "") => Command::Status,
            ("show", "") => Command::Show,
            ("edit", text) => Command::Edit(text.to_string()),
            ("clear", "") => Command::Clear,
            ("copy", "") => Command::Copy,
            ("export", path) if !path.is_empty() => Command::Export(PathBuf::from(path)),
            ("save", "") => Command::Save,
            ("help" | "?", _) => Command::Help,
            ("quit" | "exit" | "q", "") => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

/// Read stdin lines on a background thread and forward them as events.
pub fn listen(tx: Sender<AppEvent>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(AppEvent::Command(Command::parse(&line))).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    log::error!("Failed to read input: {}", e);
                    break;
                }
            }
        }
        let _ = tx.send(AppEvent::InputClosed);
    });
}
