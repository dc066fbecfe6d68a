//! Console spinner fed by refresh progress events.

use ccq_core::RefreshEvent;
use std::io::Write;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

const FRAMES: [char; 4] = ['|', '/', '-', '\\'];
const TICK: Duration = Duration::from_millis(100);

/// Renders a spinner on stderr until the sending side hangs up.
pub fn spin_until_done(events: &Receiver<RefreshEvent>) {
    let mut stderr = std::io::stderr();
    let mut label = String::from("Updating database...");
    let mut frame = 0usize;

    loop {
        match events.recv_timeout(TICK) {
            Ok(event) => label = describe(&event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        let _ = write!(stderr, "\r[{}] {label}\x1b[K", FRAMES[frame % FRAMES.len()]);
        let _ = stderr.flush();
        frame += 1;
    }

    let _ = write!(stderr, "\r\x1b[K");
    let _ = stderr.flush();
}

fn describe(event: &RefreshEvent) -> String {
    match event {
        RefreshEvent::Fetching { title, urns } => {
            format!("Downloading 《{title}》 ({urns} sections)...")
        }
        RefreshEvent::Fetched { title, sections } => {
            format!("Downloaded 《{title}》 ({sections} sections)")
        }
        RefreshEvent::Saving { books } => format!("Saving {books} books..."),
        RefreshEvent::Completed(_) => "Finishing...".to_string(),
    }
}
