//! Stop/reopen flags set from signal handlers, and the interval ticker that is
//! the only place the sampling loop blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

use crate::error::{MetricsError, Result};

const POLL_SLICE: Duration = Duration::from_millis(100);

pub struct ControlFlags {
    stop: AtomicBool,
    reopen: AtomicBool,
}

impl ControlFlags {
    pub const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            reopen: AtomicBool::new(false),
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn request_reopen(&self) {
        self.reopen.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Returns and clears the reopen request.
    pub fn take_reopen(&self) -> bool {
        self.reopen.swap(false, Ordering::SeqCst)
    }
}

impl Default for ControlFlags {
    fn default() -> Self {
        Self::new()
    }
}

pub static CONTROL: ControlFlags = ControlFlags::new();

#[cfg(unix)]
extern "C" fn on_terminate(_: libc::c_int) {
    CONTROL.request_stop();
}

#[cfg(unix)]
extern "C" fn on_hangup(_: libc::c_int) {
    CONTROL.request_reopen();
}

/// SIGINT and SIGTERM request a stop, SIGHUP an output reopen.
pub fn install_handlers() -> Result<()> {
    ctrlc::set_handler(|| CONTROL.request_stop())
        .map_err(|e| MetricsError::config(format!("cannot install SIGINT handler: {e}")))?;
    #[cfg(unix)]
    unsafe {
        let term = on_terminate as extern "C" fn(libc::c_int);
        let hup = on_hangup as extern "C" fn(libc::c_int);
        if libc::signal(libc::SIGTERM, term as libc::sighandler_t) == libc::SIG_ERR
            || libc::signal(libc::SIGHUP, hup as libc::sighandler_t) == libc::SIG_ERR
        {
            return Err(MetricsError::Io(std::io::Error::last_os_error()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Tick,
    Stop,
}

/// Fixed-rate ticks. Ticks missed while a cycle overran are dropped, not replayed.
pub struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    /// Blocks until the next tick or a stop request, whichever comes first.
    pub fn wait(&mut self, flags: &ControlFlags) -> Wake {
        loop {
            if flags.stop_requested() {
                info!("stop requested");
                return Wake::Stop;
            }
            let now = Instant::now();
            if now >= self.next {
                while self.next <= now {
                    self.next += self.interval;
                }
                return Wake::Tick;
            }
            std::thread::sleep((self.next - now).min(POLL_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_wins_over_tick() {
        let flags = ControlFlags::new();
        flags.request_stop();
        let mut t = Ticker::new(Duration::from_secs(3600));
        assert_eq!(t.wait(&flags), Wake::Stop);
    }

    #[test]
    fn reopen_is_taken_once() {
        let flags = ControlFlags::new();
        flags.request_reopen();
        assert!(flags.take_reopen());
        assert!(!flags.take_reopen());
    }

    #[test]
    fn short_interval_ticks() {
        let flags = ControlFlags::new();
        let mut t = Ticker::new(Duration::from_millis(10));
        assert_eq!(t.wait(&flags), Wake::Tick);
    }
}
