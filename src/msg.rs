use crossterm::event::KeyEvent;

use crate::panel::PanelMsg;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Resize,

    // -- Repository panel (user intents and settled host calls)
    Panel(PanelMsg),

    // -- System
    Tick,
}
