use crate::console::Command;

/// Events sent to the front-end event loop from input threads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A parsed line from the interactive console
    Command(Command),
    /// Ctrl-C; cancels the running request instead of killing the process
    Interrupt,
    /// Standard input reached end of file
    InputClosed,
}
