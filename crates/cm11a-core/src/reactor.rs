//! Wait objects for an externally owned event loop
//!
//! The engine never waits. It reports the handles it is interested in through
//! [`WaitObjects`]; the host performs the readiness wait with whatever
//! primitive it likes and reports the outcome back as a [`Readiness`].
//! A `poll(2)` based [`wait`] is provided for hosts that have no loop of
//! their own.

use std::time::Duration;

/// An OS-level handle that can be watched for readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitHandle(i32);

impl WaitHandle {
    /// Wrap a raw descriptor
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw descriptor
    pub const fn as_raw(&self) -> i32 {
        self.0
    }
}

#[cfg(unix)]
impl From<std::os::fd::RawFd> for WaitHandle {
    fn from(fd: std::os::fd::RawFd) -> Self {
        Self(fd)
    }
}

/// Handles a host loop should wait on, plus an advisory timeout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitObjects {
    /// Handles to watch for read-readiness
    pub read: Vec<WaitHandle>,
    /// Handles to watch for write-readiness
    pub write: Vec<WaitHandle>,
    /// Advisory upper bound on the wait; `None` leaves it unconstrained
    pub timeout: Option<Duration>,
}

impl WaitObjects {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle to the read set
    pub fn add_read(&mut self, handle: WaitHandle) {
        self.read.push(handle);
    }

    /// Add a handle to the write set
    pub fn add_write(&mut self, handle: WaitHandle) {
        self.write.push(handle);
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }

    /// Effective timeout: the shorter of the hint and the host's own cap
    pub fn effective_timeout(&self, cap: Option<Duration>) -> Option<Duration> {
        match (self.timeout, cap) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Handles a readiness wait reported as ready
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    readable: Vec<WaitHandle>,
    writable: Vec<WaitHandle>,
}

impl Readiness {
    /// Nothing ready (e.g. the wait timed out)
    pub fn none() -> Self {
        Self::default()
    }

    /// Mark a handle readable
    pub fn readable(mut self, handle: WaitHandle) -> Self {
        self.mark_readable(handle);
        self
    }

    /// Mark a handle writable
    pub fn writable(mut self, handle: WaitHandle) -> Self {
        self.mark_writable(handle);
        self
    }

    /// Record read-readiness
    pub fn mark_readable(&mut self, handle: WaitHandle) {
        if !self.readable.contains(&handle) {
            self.readable.push(handle);
        }
    }

    /// Record write-readiness
    pub fn mark_writable(&mut self, handle: WaitHandle) {
        if !self.writable.contains(&handle) {
            self.writable.push(handle);
        }
    }

    /// Whether `handle` can be read without blocking
    pub fn is_readable(&self, handle: WaitHandle) -> bool {
        self.readable.contains(&handle)
    }

    /// Whether `handle` can be written without blocking
    pub fn is_writable(&self, handle: WaitHandle) -> bool {
        self.writable.contains(&handle)
    }

    /// Whether anything is ready
    pub fn is_empty(&self) -> bool {
        self.readable.is_empty() && self.writable.is_empty()
    }
}

/// `poll(2)` timeout in whole milliseconds, rounded up; `-1` blocks
///
/// A sub-millisecond remainder still waits one millisecond instead of
/// returning at once.
#[cfg(unix)]
fn poll_timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    timeout
        .map(|d| d.as_micros().div_ceil(1000).try_into().unwrap_or(libc::c_int::MAX))
        .unwrap_or(-1)
}

/// Wait until a registered handle becomes ready or the timeout elapses
///
/// `cap` bounds the wait together with the hint carried by `objs`; with
/// neither set the call blocks indefinitely. A timeout yields an empty
/// [`Readiness`]. Hang-up and error conditions on a read handle are reported
/// as readable so the next read surfaces the failure.
#[cfg(unix)]
pub fn wait(objs: &WaitObjects, cap: Option<Duration>) -> std::io::Result<Readiness> {
    use std::io;

    let timeout_ms = poll_timeout_ms(objs.effective_timeout(cap));

    let mut fds: Vec<libc::pollfd> = Vec::with_capacity(objs.read.len() + objs.write.len());
    for (handle, events) in objs
        .read
        .iter()
        .map(|h| (h, libc::POLLIN))
        .chain(objs.write.iter().map(|h| (h, libc::POLLOUT)))
    {
        match fds.iter_mut().find(|p| p.fd == handle.as_raw()) {
            Some(existing) => existing.events |= events,
            None => fds.push(libc::pollfd {
                fd: handle.as_raw(),
                events,
                revents: 0,
            }),
        }
    }

    loop {
        // SAFETY: fds is a live, correctly sized vector of pollfd structures.
        let res = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if res < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        break;
    }

    let mut ready = Readiness::none();
    for p in &fds {
        let handle = WaitHandle::from_raw(p.fd);
        if p.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0
            && p.events & libc::POLLIN != 0
        {
            ready.mark_readable(handle);
        }
        if p.revents & libc::POLLOUT != 0 {
            ready.mark_writable(handle);
        }
    }
    Ok(ready)
}

/// Zero-timeout check that `handle` is writable right now
#[cfg(unix)]
pub fn is_writable_now(handle: WaitHandle) -> std::io::Result<bool> {
    let objs = WaitObjects {
        write: vec![handle],
        ..WaitObjects::default()
    };
    Ok(wait(&objs, Some(Duration::ZERO))?.is_writable(handle))
}
