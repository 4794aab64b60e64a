//! Cooperative stop signal for the scan loop.
//!
//! The loop only checks the flag between ticks, so a tick that has started
//! always finishes persisting its rows.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

/// Flag set by Ctrl+C or by typing `q`.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Flag the console control handler sets; the handler cannot capture state.
static CONSOLE_STOP: OnceLock<StopFlag> = OnceLock::new();

/// Routes Ctrl+C / Ctrl+Break to `stop`. A second press while a stop is
/// already pending terminates the process as usual.
#[cfg(windows)]
pub fn install_console_handler(stop: &StopFlag) -> anyhow::Result<()> {
    use windows::Win32::Foundation::{BOOL, TRUE};
    use windows::Win32::System::Console::{SetConsoleCtrlHandler, CTRL_BREAK_EVENT, CTRL_C_EVENT};

    unsafe extern "system" fn handler(ctrl_type: u32) -> BOOL {
        if ctrl_type != CTRL_C_EVENT && ctrl_type != CTRL_BREAK_EVENT {
            return BOOL(0);
        }
        match CONSOLE_STOP.get() {
            Some(flag) if !flag.is_requested() => {
                flag.request();
                BOOL(1)
            }
            _ => BOOL(0),
        }
    }

    if CONSOLE_STOP.set(stop.clone()).is_err() {
        log::debug!("Console handler already installed");
        return Ok(());
    }
    unsafe {
        SetConsoleCtrlHandler(Some(handler), TRUE)?;
    }
    log::debug!("Console control handler installed");
    Ok(())
}

/// No handler off Windows: Ctrl+C ends the process. A tick's listings are
/// written to the log in one batch, so the tick in flight is either fully
/// persisted or dropped; use `q` + Enter for a clean stop.
#[cfg(not(windows))]
pub fn install_console_handler(stop: &StopFlag) -> anyhow::Result<()> {
    let _ = CONSOLE_STOP.set(stop.clone());
    log::debug!("No console control handler on this platform");
    Ok(())
}

/// True for the lines that ask the scanner to stop.
fn is_quit_command(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "q" | "quit" | "exit")
}

/// Watches `input` on a background thread and sets `stop` on `q`.
///
/// End of input only ends the watch, so a detached stdin never stops a scan.
pub fn spawn_quit_watcher<R>(input: R, stop: StopFlag) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        for line in input.lines() {
            let Ok(line) = line else {
                break;
            };
            if is_quit_command(&line) {
                log::info!("Stop requested, finishing current scan...");
                stop.request();
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_stop_flag_is_shared_between_clones() {
        let stop = StopFlag::new();
        let clone = stop.clone();
        assert!(!stop.is_requested());

        clone.request();
        assert!(stop.is_requested());
    }

    #[test]
    fn test_quit_watcher_stops_on_q() {
        let stop = StopFlag::new();
        spawn_quit_watcher(Cursor::new("hello\n  Q \nmore\n"), stop.clone())
            .join()
            .unwrap();
        assert!(stop.is_requested());
    }

    #[test]
    fn test_quit_watcher_ignores_end_of_input() {
        let stop = StopFlag::new();
        spawn_quit_watcher(Cursor::new("status\n"), stop.clone())
            .join()
            .unwrap();
        assert!(!stop.is_requested());
    }
}
