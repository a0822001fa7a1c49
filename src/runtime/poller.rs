// (C) 2025 - Enzo Lombardi

//! Platform poller: one interface over epoll, kqueue, and poll(2).
//!
//! Linux gets epoll with timerfd-backed timers, the BSDs and macOS get
//! kqueue with `EVFILT_TIMER`, and everything else falls back to poll(2)
//! with monotonic-clock deadline tracking. Timer wakes report how many
//! intervals expired since the last wake, so a stalled consumer can
//! account for what it missed.

use std::time::Duration;

use crate::core::error::{Error, Result};

/// Handle to a timer registered with [`Poller::add_timer`] or
/// [`Poller::add_oneshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) u64);

/// One readiness notification out of [`Poller::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The registered descriptor is readable.
    Fd(std::os::fd::RawFd),
    /// A timer fired. `expirations` counts intervals since the last
    /// report (at least 1).
    Timer { id: TimerId, expirations: u64 },
}

/// Readiness multiplexer over descriptors and timers.
///
/// `register_fd` is idempotent: re-registering a descriptor updates its
/// interest instead of erroring. `wait` honors the caller's timeout even
/// when an internal timer would fire later - the shorter deadline always
/// wins.
pub struct Poller {
    inner: imp::Inner,
    next_timer: u64,
}

impl Poller {
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: imp::Inner::new()?,
            next_timer: 0,
        })
    }

    /// Watches a descriptor for read readiness.
    pub fn register_fd(&mut self, fd: std::os::fd::RawFd) -> Result<()> {
        self.inner.register_fd(fd)
    }

    /// Adds a repeating timer.
    pub fn add_timer(&mut self, interval: Duration) -> Result<TimerId> {
        let id = TimerId(self.alloc_timer());
        self.inner.add_timer(id, interval, true)?;
        Ok(id)
    }

    /// Adds a timer that fires once.
    pub fn add_oneshot(&mut self, delay: Duration) -> Result<TimerId> {
        let id = TimerId(self.alloc_timer());
        self.inner.add_timer(id, delay, false)?;
        Ok(id)
    }

    /// Waits for readiness, at most `timeout`.
    ///
    /// An empty result means the timeout passed. EINTR restarts the wait
    /// internally.
    pub fn wait(&mut self, timeout: Duration) -> Result<Vec<Wake>> {
        self.inner.wait(timeout)
    }

    fn alloc_timer(&mut self) -> u64 {
        let id = self.next_timer;
        self.next_timer += 1;
        id
    }
}

#[cfg(target_os = "linux")]
fn timeout_millis(timeout: Duration) -> u16 {
    u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX)
}

#[cfg(target_os = "linux")]
mod imp {
    //! epoll + timerfd backend.

    use std::collections::HashMap;
    use std::io;
    use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
    use std::time::Duration;

    use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
    use nix::sys::time::TimeSpec;
    use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};

    use super::{timeout_millis, Error, Result, TimerId, Wake};

    /// Epoll data values for timers carry this tag; plain descriptors use
    /// their fd value, which never has the high bit set.
    const TIMER_TAG: u64 = 1 << 63;

    pub(super) struct Inner {
        epoll: Epoll,
        fds: Vec<RawFd>,
        timers: HashMap<u64, TimerFd>,
    }

    impl Inner {
        pub(super) fn new() -> Result<Self> {
            let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)
                .map_err(|e| Error::io("epoll_create", io::Error::from_raw_os_error(e as i32)))?;
            Ok(Self {
                epoll,
                fds: Vec::new(),
                timers: HashMap::new(),
            })
        }

        pub(super) fn register_fd(&mut self, fd: RawFd) -> Result<()> {
            if self.fds.contains(&fd) {
                return Ok(());
            }
            let event = EpollEvent::new(EpollFlags::EPOLLIN, fd as u64);
            // SAFETY: the caller keeps the descriptor open while it is
            // registered with this poller.
            let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
            self.epoll
                .add(borrowed, event)
                .map_err(|e| Error::io("epoll_ctl", io::Error::from_raw_os_error(e as i32)))?;
            self.fds.push(fd);
            Ok(())
        }

        pub(super) fn add_timer(
            &mut self,
            id: TimerId,
            interval: Duration,
            repeating: bool,
        ) -> Result<()> {
            let tfd = TimerFd::new(
                ClockId::CLOCK_MONOTONIC,
                TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC,
            )
            .map_err(|e| Error::io("timerfd_create", io::Error::from_raw_os_error(e as i32)))?;
            let spec = TimeSpec::from_duration(interval);
            let expiration = if repeating {
                Expiration::Interval(spec)
            } else {
                Expiration::OneShot(spec)
            };
            tfd.set(expiration, TimerSetTimeFlags::empty())
                .map_err(|e| Error::io("timerfd_settime", io::Error::from_raw_os_error(e as i32)))?;
            let event = EpollEvent::new(EpollFlags::EPOLLIN, TIMER_TAG | id.0);
            self.epoll
                .add(tfd.as_fd(), event)
                .map_err(|e| Error::io("epoll_ctl", io::Error::from_raw_os_error(e as i32)))?;
            self.timers.insert(id.0, tfd);
            Ok(())
        }

        pub(super) fn wait(&mut self, timeout: Duration) -> Result<Vec<Wake>> {
            let mut events = [EpollEvent::empty(); 16];
            let n = loop {
                match self
                    .epoll
                    .wait(&mut events, EpollTimeout::from(timeout_millis(timeout)))
                {
                    Ok(n) => break n,
                    Err(nix::errno::Errno::EINTR) => continue,
                    Err(e) => {
                        return Err(Error::io(
                            "epoll_wait",
                            io::Error::from_raw_os_error(e as i32),
                        ));
                    }
                }
            };

            let mut wakes = Vec::with_capacity(n);
            for event in &events[..n] {
                let data = event.data();
                if data & TIMER_TAG == 0 {
                    wakes.push(Wake::Fd(data as RawFd));
                    continue;
                }
                let id = data & !TIMER_TAG;
                let expirations = match self.timers.get(&id) {
                    Some(tfd) => read_expirations(tfd.as_fd().as_raw_fd()),
                    None => 1,
                };
                wakes.push(Wake::Timer {
                    id: TimerId(id),
                    expirations,
                });
            }
            Ok(wakes)
        }
    }

    /// Drains the timerfd expiration counter.
    fn read_expirations(fd: RawFd) -> u64 {
        let mut buf = [0u8; 8];
        loop {
            // SAFETY: the pointer/length pair comes from a live array.
            let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n == 8 {
                return u64::from_ne_bytes(buf).max(1);
            }
            if n < 0 && io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
                continue;
            }
            // EAGAIN: the counter was already drained; treat as one firing
            return 1;
        }
    }
}

#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
))]
mod imp {
    //! kqueue backend with EVFILT_TIMER.

    use std::io;
    use std::os::fd::RawFd;
    use std::time::Duration;

    use nix::sys::event::{EventFilter, EventFlag, FilterFlag, KEvent, Kqueue};

    use super::{Error, Result, TimerId, Wake};

    /// Timer idents live above any plausible descriptor value.
    const TIMER_BASE: usize = 1 << 32;

    pub(super) struct Inner {
        kq: Kqueue,
        fds: Vec<RawFd>,
    }

    impl Inner {
        pub(super) fn new() -> Result<Self> {
            let kq = Kqueue::new()
                .map_err(|e| Error::io("kqueue", io::Error::from_raw_os_error(e as i32)))?;
            Ok(Self {
                kq,
                fds: Vec::new(),
            })
        }

        fn apply(&self, changes: &[KEvent]) -> Result<()> {
            self.kq
                .kevent(changes, &mut [], None)
                .map_err(|e| Error::io("kevent", io::Error::from_raw_os_error(e as i32)))?;
            Ok(())
        }

        pub(super) fn register_fd(&mut self, fd: RawFd) -> Result<()> {
            if self.fds.contains(&fd) {
                return Ok(());
            }
            let change = KEvent::new(
                fd as usize,
                EventFilter::EVFILT_READ,
                EventFlag::EV_ADD | EventFlag::EV_ENABLE,
                FilterFlag::empty(),
                0,
                0,
            );
            self.apply(&[change])?;
            self.fds.push(fd);
            Ok(())
        }

        pub(super) fn add_timer(
            &mut self,
            id: TimerId,
            interval: Duration,
            repeating: bool,
        ) -> Result<()> {
            let mut flags = EventFlag::EV_ADD | EventFlag::EV_ENABLE;
            if !repeating {
                flags |= EventFlag::EV_ONESHOT;
            }
            // EVFILT_TIMER defaults to milliseconds
            let change = KEvent::new(
                TIMER_BASE + id.0 as usize,
                EventFilter::EVFILT_TIMER,
                flags,
                FilterFlag::empty(),
                interval.as_millis() as isize,
                0,
            );
            self.apply(&[change])
        }

        pub(super) fn wait(&mut self, timeout: Duration) -> Result<Vec<Wake>> {
            let mut events = [KEvent::new(
                0,
                EventFilter::EVFILT_READ,
                EventFlag::empty(),
                FilterFlag::empty(),
                0,
                0,
            ); 16];
            let spec = nix::sys::time::TimeSpec::from_duration(timeout);
            let n = loop {
                match self.kq.kevent(&[], &mut events, Some(*spec.as_ref())) {
                    Ok(n) => break n,
                    Err(nix::errno::Errno::EINTR) => continue,
                    Err(e) => {
                        return Err(Error::io("kevent", io::Error::from_raw_os_error(e as i32)));
                    }
                }
            };

            let mut wakes = Vec::with_capacity(n);
            for event in &events[..n] {
                match event.filter() {
                    Ok(EventFilter::EVFILT_TIMER) => wakes.push(Wake::Timer {
                        id: TimerId((event.ident() - TIMER_BASE) as u64),
                        expirations: (event.data() as u64).max(1),
                    }),
                    _ => wakes.push(Wake::Fd(event.ident() as RawFd)),
                }
            }
            Ok(wakes)
        }
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
mod imp {
    //! Portable poll(2) backend with deadline bookkeeping.

    use std::io;
    use std::os::fd::RawFd;
    use std::time::{Duration, Instant};

    use super::{Error, Result, TimerId, Wake};

    struct Timer {
        id: TimerId,
        interval: Duration,
        deadline: Instant,
        repeating: bool,
        expired: bool,
    }

    pub(super) struct Inner {
        fds: Vec<RawFd>,
        timers: Vec<Timer>,
    }

    impl Inner {
        pub(super) fn new() -> Result<Self> {
            Ok(Self {
                fds: Vec::new(),
                timers: Vec::new(),
            })
        }

        pub(super) fn register_fd(&mut self, fd: RawFd) -> Result<()> {
            if !self.fds.contains(&fd) {
                self.fds.push(fd);
            }
            Ok(())
        }

        pub(super) fn add_timer(
            &mut self,
            id: TimerId,
            interval: Duration,
            repeating: bool,
        ) -> Result<()> {
            self.timers.push(Timer {
                id,
                interval,
                deadline: Instant::now() + interval,
                repeating,
                expired: false,
            });
            Ok(())
        }

        pub(super) fn wait(&mut self, timeout: Duration) -> Result<Vec<Wake>> {
            let now = Instant::now();
            // the caller's timeout wins over any pending timer deadline
            let mut sleep = timeout;
            for timer in self.timers.iter().filter(|t| !t.expired) {
                let until = timer.deadline.saturating_duration_since(now);
                sleep = sleep.min(until);
            }

            let mut pollfds: Vec<libc::pollfd> = self
                .fds
                .iter()
                .map(|&fd| libc::pollfd {
                    fd,
                    events: libc::POLLIN,
                    revents: 0,
                })
                .collect();
            let ms = i32::try_from(sleep.as_millis()).unwrap_or(i32::MAX);
            let rc = loop {
                // SAFETY: pollfds points at a live, initialized vector.
                let rc = unsafe {
                    libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, ms)
                };
                if rc >= 0 {
                    break rc;
                }
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(Error::io("poll", err));
            };

            let mut wakes = Vec::new();
            if rc > 0 {
                for pollfd in &pollfds {
                    if pollfd.revents & (libc::POLLIN | libc::POLLHUP) != 0 {
                        wakes.push(Wake::Fd(pollfd.fd));
                    }
                }
            }

            let now = Instant::now();
            for timer in &mut self.timers {
                if timer.expired || timer.deadline > now {
                    continue;
                }
                let late = now.duration_since(timer.deadline);
                let mut expirations = 1;
                if timer.repeating && !timer.interval.is_zero() {
                    let behind = late.as_nanos() / timer.interval.as_nanos().max(1);
                    expirations += behind as u64;
                    timer.deadline += timer.interval * (expirations as u32);
                } else {
                    timer.expired = true;
                }
                wakes.push(Wake::Timer {
                    id: timer.id,
                    expirations,
                });
            }
            self.timers.retain(|t| !t.expired);
            Ok(wakes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::time::Instant;

    #[test]
    fn fd_readiness() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        let mut poller = Poller::new().unwrap();
        poller.register_fd(rx.as_raw_fd()).unwrap();

        let wakes = poller.wait(Duration::from_millis(10)).unwrap();
        assert!(wakes.is_empty());

        tx.write_all(b"x").unwrap();
        let wakes = poller.wait(Duration::from_millis(500)).unwrap();
        assert_eq!(wakes, vec![Wake::Fd(rx.as_raw_fd())]);
    }

    #[test]
    fn register_fd_is_idempotent() {
        let (_tx, rx) = UnixStream::pair().unwrap();
        let mut poller = Poller::new().unwrap();
        poller.register_fd(rx.as_raw_fd()).unwrap();
        poller.register_fd(rx.as_raw_fd()).unwrap();
    }

    #[test]
    fn repeating_timer_fires() {
        let mut poller = Poller::new().unwrap();
        let id = poller.add_timer(Duration::from_millis(10)).unwrap();
        let mut fired = 0u64;
        let start = Instant::now();
        while fired < 2 && start.elapsed() < Duration::from_secs(2) {
            for wake in poller.wait(Duration::from_millis(100)).unwrap() {
                if let Wake::Timer { id: got, expirations } = wake {
                    assert_eq!(got, id);
                    assert!(expirations >= 1);
                    fired += expirations;
                }
            }
        }
        assert!(fired >= 2);
    }

    #[test]
    fn oneshot_fires_once() {
        let mut poller = Poller::new().unwrap();
        poller.add_oneshot(Duration::from_millis(10)).unwrap();
        let mut fired = 0;
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(300) {
            fired += poller
                .wait(Duration::from_millis(50))
                .unwrap()
                .iter()
                .filter(|w| matches!(w, Wake::Timer { .. }))
                .count();
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn caller_timeout_wins_over_distant_timer() {
        let mut poller = Poller::new().unwrap();
        poller.add_timer(Duration::from_secs(3600)).unwrap();
        let start = Instant::now();
        let wakes = poller.wait(Duration::from_millis(20)).unwrap();
        assert!(wakes.is_empty());
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
