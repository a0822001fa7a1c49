// (C) 2025 - Enzo Lombardi
// termgrid - terminal cell-grid toolkit
// Core modules
pub mod core;
pub mod terminfo;
pub mod terminal;
pub mod input;
pub mod runtime;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

// Re-export commonly used types
pub mod prelude {
    pub use crate::core::cell::{Cell, Cursor};
    pub use crate::core::color::Color;
    pub use crate::core::error::{Error, Result};
    pub use crate::core::event::{
        Event, Key, KeyEvent, Modifiers, MouseButton, MouseEvent, MouseKind,
    };
    pub use crate::core::style::{Attribute, Style};
    pub use crate::runtime::{EventLoop, EventSource};
    pub use crate::terminal::{Terminal, TerminalMode, TerminalOptions};
}
