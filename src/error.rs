//! Error kinds surfaced by process control operations.

use std::io;

/// The error type for terminal allocation, spawning, I/O, signal
/// delivery and reaping.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No terminal allocation strategy is configured for this platform.
    #[error("terminal support is not configured")]
    NotConfigured,

    /// The pty (or the pipe pair) could not be allocated.
    #[error("cannot allocate the terminal")]
    Setup(#[source] io::Error),

    /// The child program could not be spawned.
    #[error("cannot spawn the child process")]
    Spawn(#[source] io::Error),

    /// Reading from or writing to the child failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A signal could not be delivered to the child.
    #[error("cannot deliver a signal to the child")]
    Signal(#[source] io::Error),

    /// Waiting on the child failed.
    #[error("cannot wait for the child process")]
    Wait(#[source] io::Error),
}

/// Crate wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(unix)]
impl Error {
    pub(crate) fn setup(err: nix::Error) -> Self {
        Error::Setup(errno_to_io(err))
    }

    pub(crate) fn spawn(err: nix::Error) -> Self {
        Error::Spawn(errno_to_io(err))
    }

    pub(crate) fn signal(err: nix::Error) -> Self {
        Error::Signal(errno_to_io(err))
    }

    pub(crate) fn wait(err: nix::Error) -> Self {
        Error::Wait(errno_to_io(err))
    }

    pub(crate) fn io(err: nix::Error) -> Self {
        Error::Io(errno_to_io(err))
    }
}

#[cfg(unix)]
pub(crate) fn errno_to_io(err: nix::Error) -> io::Error {
    io::Error::from_raw_os_error(err as i32)
}
