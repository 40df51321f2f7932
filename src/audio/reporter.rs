//! Position reporter: one thread per session that samples the stream
//! position at a fixed interval and publishes it.
//!
//! The thread also performs the end-of-stream teardown, so the output
//! callback only has to flag the session as ended.

use std::io;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use super::backend::AudioBackend;
use super::coordinator::Inner;
use super::signal::{SessionSignal, Wake};

pub(super) fn spawn<B: AudioBackend>(
    inner: Weak<Inner<B>>,
    session: u64,
    signal: Arc<SessionSignal>,
    interval: Duration,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("position-reporter-{session}"))
        .spawn(move || run(inner, session, signal, interval))
}

fn run<B: AudioBackend>(
    inner: Weak<Inner<B>>,
    session: u64,
    signal: Arc<SessionSignal>,
    interval: Duration,
) {
    debug!(session, "position reporter started");
    loop {
        match signal.wait(interval) {
            Wake::Closed => break,
            Wake::Ended => {
                if let Some(inner) = inner.upgrade() {
                    inner.finish(session);
                }
                break;
            }
            Wake::Tick => {
                // Coordinator dropped: nothing left to report to.
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                if !inner.report_position(session) {
                    break;
                }
            }
        }
    }
    debug!(session, "position reporter stopped");
}
