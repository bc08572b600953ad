//! Waiting for read readiness across several descriptors.

/// Which of the polled descriptors turned out readable.
///
/// Indexes follow the order of the slice given to [`poll`]. An empty
/// set means the timeout elapsed with no data available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    ready: Vec<bool>,
}

impl Readiness {
    fn none(len: usize) -> Self {
        Self {
            ready: vec![false; len],
        }
    }

    /// Number of descriptors with data available.
    pub fn count(&self) -> usize {
        self.ready.iter().filter(|ready| **ready).count()
    }

    /// Whether the descriptor at `index` is readable.
    pub fn is_ready(&self, index: usize) -> bool {
        self.ready.get(index).copied().unwrap_or(false)
    }

    /// True when no descriptor became readable in time.
    pub fn timed_out(&self) -> bool {
        self.count() == 0
    }
}

#[cfg(unix)]
pub use self::unix::poll;
#[cfg(windows)]
pub use self::windows::poll;

#[cfg(unix)]
mod unix {
    use super::Readiness;
    use crate::error::{errno_to_io, Error, Result};
    use nix::sys::select::{select, FdSet};
    use nix::sys::time::{TimeVal, TimeValLike};
    use std::os::unix::prelude::RawFd;
    use std::time::Duration;

    /// Wait until one of `fds` has data to read.
    ///
    /// A timeout of `None` waits indefinitely.
    pub fn poll(fds: &[RawFd], timeout: Option<Duration>) -> Result<Readiness> {
        loop {
            let mut read_set = FdSet::new();
            let mut except_set = FdSet::new();
            for &fd in fds {
                read_set.insert(fd);
                except_set.insert(fd);
            }

            let mut tv = timeout.map(|timeout| TimeVal::milliseconds(timeout.as_millis() as i64));

            let ready = select(None, &mut read_set, None, &mut except_set, tv.as_mut())
                .map_err(|err| Error::Io(errno_to_io(err)))?;

            if ready > 0 {
                let ready = fds.iter().map(|&fd| read_set.contains(fd)).collect();
                return Ok(Readiness { ready });
            }

            if timeout.is_some() {
                return Ok(Readiness::none(fds.len()));
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::Readiness;
    use crate::error::{Error, Result};
    use std::io;
    use std::os::windows::io::RawHandle;
    use std::ptr;
    use std::time::Duration;
    use windows_sys::Win32::System::Pipes::PeekNamedPipe;
    use windows_sys::Win32::System::Threading::Sleep;

    const MAX_DELAY_MS: u32 = 100;

    /// Wait until one of the pipe `handles` has data to read.
    ///
    /// A timeout of `None` waits indefinitely.
    pub fn poll(handles: &[RawHandle], timeout: Option<Duration>) -> Result<Readiness> {
        let mut budget = timeout.map(|timeout| timeout.as_millis() as i64);
        // Start with small delays and increase them, so that a long
        // wait does not degenerate into a busy loop.
        let mut delay: u32 = 5;

        loop {
            for (index, &handle) in handles.iter().enumerate() {
                let mut avail: u32 = 0;
                let ok = unsafe {
                    PeekNamedPipe(
                        handle as _,
                        ptr::null_mut(),
                        0,
                        ptr::null_mut(),
                        &mut avail,
                        ptr::null_mut(),
                    )
                };
                if ok == 0 {
                    return Err(Error::Io(io::Error::last_os_error()));
                }

                if avail > 0 {
                    let mut ready = vec![false; handles.len()];
                    ready[index] = true;
                    return Ok(Readiness { ready });
                }
            }

            if let Some(left) = budget {
                if left <= 0 {
                    return Ok(Readiness::none(handles.len()));
                }
            }

            unsafe { Sleep(delay) };
            if let Some(left) = budget.as_mut() {
                *left -= i64::from(delay);
            }

            if delay < MAX_DELAY_MS {
                delay += 10;
            }
        }
    }
}
