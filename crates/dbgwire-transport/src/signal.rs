//! Self-pipe shutdown signal.
//!
//! A blocking `recv` on a socket cannot be interrupted portably from another
//! thread. Instead the reading thread waits with `poll` on both the socket and
//! the read end of a pipe; another thread wakes it by writing to (and
//! closing) the write end.

use std::io::ErrorKind;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use tracing::{debug, warn};

use crate::error::{Result, TransportError};

const POLL_EVENTS: libc::c_short = libc::POLLIN | libc::POLLERR | libc::POLLHUP;

/// Write side of the shutdown signal.
///
/// Firing consumes the trigger, so a signal can be raised at most once.
#[derive(Debug)]
pub struct ShutdownTrigger {
    write: OwnedFd,
}

/// Read side of the shutdown signal, observed by [`wait_for_input`].
#[derive(Debug)]
pub struct ShutdownWatch {
    read: OwnedFd,
}

/// Outcome of waiting on a stream and its shutdown watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The shutdown signal fired (or its write side was dropped).
    Shutdown,
    /// The stream has bytes to read (or an orderly close to report).
    Readable,
    /// The stream reported error or hangup without readable data.
    Hangup { revents: libc::c_short },
}

/// Create a linked trigger/watch pair.
pub fn shutdown_signal() -> Result<(ShutdownTrigger, ShutdownWatch)> {
    let mut fds: [libc::c_int; 2] = [-1; 2];
    // SAFETY: `fds` is a valid, writable array of two descriptors.
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc < 0 {
        return Err(TransportError::Signal(std::io::Error::last_os_error()));
    }

    // SAFETY: `pipe` succeeded, so both descriptors are open and owned by us.
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    set_cloexec(read.as_raw_fd()).map_err(TransportError::Signal)?;
    set_cloexec(write.as_raw_fd()).map_err(TransportError::Signal)?;

    debug!(read = fds[0], write = fds[1], "created shutdown signal");
    Ok((ShutdownTrigger { write }, ShutdownWatch { read }))
}

fn set_cloexec(fd: RawFd) -> std::io::Result<()> {
    // SAFETY: `fd` is an open descriptor; F_GETFD/F_SETFD take no pointers.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

impl ShutdownTrigger {
    /// Wake the watching thread and close the write side.
    pub fn fire(self) {
        let value = 0u8;
        loop {
            // SAFETY: writes one byte from a valid stack location to an open fd.
            let rc = unsafe {
                libc::write(
                    self.write.as_raw_fd(),
                    (&value as *const u8).cast::<libc::c_void>(),
                    1,
                )
            };
            if rc >= 0 {
                break;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            // Closing the write side below still wakes the reader with POLLHUP.
            warn!(error = %err, "failed to write shutdown signal");
            break;
        }
        debug!("shutdown signal fired");
    }
}

impl AsRawFd for ShutdownWatch {
    fn as_raw_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }
}

/// Block until `stream` is readable, reports error/hangup, or `watch` fires.
///
/// There is no timeout; the shutdown signal is the only way to cancel the
/// wait. Interrupted waits are retried.
pub fn wait_for_input(stream: &impl AsRawFd, watch: &ShutdownWatch) -> Result<Readiness> {
    let mut fds = [
        libc::pollfd {
            fd: watch.as_raw_fd(),
            events: POLL_EVENTS,
            revents: 0,
        },
        libc::pollfd {
            fd: stream.as_raw_fd(),
            events: POLL_EVENTS,
            revents: 0,
        },
    ];

    loop {
        // SAFETY: `fds` is a valid array of `fds.len()` pollfd entries.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc >= 0 {
            break;
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != ErrorKind::Interrupted {
            return Err(TransportError::Poll(err));
        }
    }

    let [watch_fd, stream_fd] = fds;
    if watch_fd.revents != 0 {
        Ok(Readiness::Shutdown)
    } else if stream_fd.revents & libc::POLLIN == 0 {
        Ok(Readiness::Hangup {
            revents: stream_fd.revents,
        })
    } else {
        Ok(Readiness::Readable)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn readable_when_peer_writes() {
        let (local, mut remote) = UnixStream::pair().unwrap();
        let (_trigger, watch) = shutdown_signal().unwrap();

        remote.write_all(b"{}\0").unwrap();
        assert_eq!(wait_for_input(&local, &watch).unwrap(), Readiness::Readable);
    }

    #[test]
    fn fire_wakes_blocked_wait() {
        let (local, _remote) = UnixStream::pair().unwrap();
        let (trigger, watch) = shutdown_signal().unwrap();

        let waiter = std::thread::spawn(move || wait_for_input(&local, &watch).unwrap());

        std::thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        trigger.fire();

        assert_eq!(waiter.join().unwrap(), Readiness::Shutdown);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn dropped_trigger_also_wakes() {
        let (local, _remote) = UnixStream::pair().unwrap();
        let (trigger, watch) = shutdown_signal().unwrap();

        drop(trigger);
        assert_eq!(wait_for_input(&local, &watch).unwrap(), Readiness::Shutdown);
    }

    #[test]
    fn shutdown_takes_precedence_over_data() {
        let (local, mut remote) = UnixStream::pair().unwrap();
        let (trigger, watch) = shutdown_signal().unwrap();

        remote.write_all(b"pending").unwrap();
        trigger.fire();
        assert_eq!(wait_for_input(&local, &watch).unwrap(), Readiness::Shutdown);
    }

    #[test]
    fn orderly_close_reports_readable() {
        // EOF is delivered through POLLIN; the caller sees a zero-length read.
        let (local, remote) = UnixStream::pair().unwrap();
        let (_trigger, watch) = shutdown_signal().unwrap();

        drop(remote);
        assert_eq!(wait_for_input(&local, &watch).unwrap(), Readiness::Readable);
    }

    #[test]
    fn descriptors_are_close_on_exec() {
        let (trigger, watch) = shutdown_signal().unwrap();
        for fd in [trigger.write.as_raw_fd(), watch.as_raw_fd()] {
            // SAFETY: fd is open for the duration of the test.
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert!(flags & libc::FD_CLOEXEC != 0);
        }
    }
}
