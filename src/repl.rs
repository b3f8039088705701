//! Line commands understood by the interactive chat loop.

use client::net::types::ViewMode;

#[cfg(test)]
#[path = "repl_test.rs"]
mod repl_test;

pub const HELP: &str = "\
commands:
  /new              start a new conversation
  /history          list stored conversations
  /open <id>        load a stored conversation
  /continue         run the blocked query despite the database warning
  /configure        open connection settings from the database warning
  /dismiss          close the database warning
  /model [id]       set the model, or reset to the backend default
  /view chat|dashboard
  /help             show this help
  /quit             leave
anything else is sent as a question; Ctrl-C stops a running query";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    New,
    History,
    Open(String),
    Continue,
    Configure,
    Dismiss,
    Model(Option<String>),
    View(ViewMode),
    Help,
    Quit,
    Empty,
    /// Slash command that is unknown or missing its argument.
    Invalid(String),
}

impl ReplCommand {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Send(line.to_owned());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match (name, arg) {
            ("new", "") => Self::New,
            ("history", "") => Self::History,
            ("open", "") => Self::Invalid("/open needs a conversation id".to_owned()),
            ("open", id) => Self::Open(id.to_owned()),
            ("continue", "") => Self::Continue,
            ("configure", "") => Self::Configure,
            ("dismiss", "") => Self::Dismiss,
            ("model", "") => Self::Model(None),
            ("model", id) => Self::Model(Some(id.to_owned())),
            ("view", "chat") => Self::View(ViewMode::Chat),
            ("view", "dashboard") => Self::View(ViewMode::Dashboard),
            ("view", _) => Self::Invalid("/view expects chat or dashboard".to_owned()),
            ("help", "") => Self::Help,
            ("quit" | "exit", "") => Self::Quit,
            _ => Self::Invalid(format!("unknown command: {line}")),
        }
    }
}
