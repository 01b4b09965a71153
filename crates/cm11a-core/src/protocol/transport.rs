use std::io;

use crate::reactor::WaitHandle;

/// Byte-level, non-blocking access to the interface
///
/// The engine only ever reads one byte per readable event and writes whatever
/// suffix of the pending frame the transport will take. Closing is `Drop`.
pub trait Transport {
    /// Read up to `buf.len()` bytes without blocking
    ///
    /// Returns `Ok(0)` when nothing is available.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write as much of `buf` as possible without blocking
    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Handle the host loop should watch for readiness
    fn wait_handle(&self) -> WaitHandle;

    /// Zero-timeout check that a write would not block
    ///
    /// Only consulted for frames submitted after the host's wait began.
    /// The default defers them to the next tick.
    fn poll_writable(&mut self) -> io::Result<bool> {
        Ok(false)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_nonblocking(buf)
    }

    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write_nonblocking(buf)
    }

    fn wait_handle(&self) -> WaitHandle {
        (**self).wait_handle()
    }

    fn poll_writable(&mut self) -> io::Result<bool> {
        (**self).poll_writable()
    }
}
