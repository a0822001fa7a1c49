// (C) 2025 - Enzo Lombardi
// Dump decoded input events to see what the terminal actually sends
use std::fs::File;
use std::time::Duration;

use simplelog::{Config, LevelFilter, WriteLogger};
use termgrid::core::event::{Event, Key};
use termgrid::runtime::{EventLoop, InputSource, SleepSource};
use termgrid::terminal::Terminal;

fn main() -> termgrid::core::error::Result<()> {
    // parser diagnostics (dropped sequences etc.) land in the log file,
    // not on the screen we are drawing to
    if let Ok(file) = File::create("event_debug.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, Config::default(), file);
    }

    let mut terminal = Terminal::init()?;
    let escape_timeout = terminal.escape_timeout();

    let mut events = EventLoop::new();
    events.add_source(Box::new(InputSource::from_fd(
        terminal.input_fd(),
        escape_timeout,
    )));
    events.add_source(Box::new(SleepSource::new(Duration::from_secs(1))));
    events.start();

    terminal.put_str(0, 0, "termgrid event debug - press q to quit", Default::default());
    terminal.present()?;

    let mut row: u16 = 2;
    loop {
        let Some(event) = events.wait_for_event(Duration::from_millis(250)) else {
            continue;
        };
        log::debug!("{}", event);

        if row >= terminal.height() {
            terminal.clear();
            terminal.put_str(0, 0, "termgrid event debug - press q to quit", Default::default());
            row = 2;
        }
        terminal.put_str(0, row, &format!("{}", event), Default::default());
        row += 1;
        terminal.present()?;

        if let Event::Key(key) = event {
            if key.key == Key::Char('q') {
                break;
            }
        }
    }

    events.stop();
    terminal.close()?;
    Ok(())
}
