use std::{
    io,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use mio::{Events, Interest, Registry, Token, event::Event, event::Source};

/// How often `run` wakes up even with nothing readable, purely to recheck
/// the stop flag. `mio` retries `epoll_wait` internally on `EINTR`, so a
/// signal-only flag never interrupts a `None`-timeout poll by itself —
/// this bounds how long a `SIGINT`/`SIGTERM` can go unnoticed when no
/// client traffic happens to arrive afterward.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// Level-triggered, single-threaded cooperative poll reactor.
///
/// `add`/`modify`/`delete` register descriptors with the underlying `mio`
/// registry; `run` blocks until the caller-owned `stop` flag (typically
/// raised by a `signal_hook` SIGINT/SIGTERM handler) is set, or a callback
/// asks to stop. All callbacks run serially on the calling thread; none
/// may observe another's partial state.
pub struct Reactor {
    poll: mio::Poll,
    events: Events,
}

impl Reactor {
    pub fn new(event_capacity: usize) -> io::Result<Self> {
        Ok(Self { poll: mio::Poll::new()?, events: Events::with_capacity(event_capacity) })
    }

    pub fn registry(&self) -> &Registry {
        self.poll.registry()
    }

    pub fn add<S: Source>(&self, source: &mut S, token: Token, interest: Interest) -> io::Result<()> {
        self.poll.registry().register(source, token, interest)
    }

    pub fn modify<S: Source>(
        &self,
        source: &mut S,
        token: Token,
        interest: Interest,
    ) -> io::Result<()> {
        self.poll.registry().reregister(source, token, interest)
    }

    pub fn delete<S: Source>(&self, source: &mut S) -> io::Result<()> {
        self.poll.registry().deregister(source)
    }

    /// Runs the reactor until `stop` reports true or `on_event` requests a
    /// stop by returning `false`. `stop` is rechecked at least every
    /// `STOP_CHECK_INTERVAL`, not just after a readiness event, since a
    /// bare signal flag doesn't otherwise interrupt the poll wait.
    pub fn run<F>(&mut self, stop: &AtomicBool, mut on_event: F) -> io::Result<()>
    where
        F: FnMut(&Event, &Registry) -> bool,
    {
        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }

            match self.poll.poll(&mut self.events, Some(STOP_CHECK_INTERVAL)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }

            let registry = self.poll.registry();
            for event in self.events.iter() {
                if !on_event(event, registry) {
                    return Ok(());
                }
            }
        }
    }
}
