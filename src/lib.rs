//! A library for running a child program under interactive control.
//!
//! On Unix the child is attached to the slave side of a freshly
//! allocated [PTY/TTY](https://en.wikipedia.org/wiki/Pseudoterminal)
//! as its controlling terminal, so it behaves the way it would on a
//! real terminal: line discipline, job control signals, window size.
//! On Windows, where no such device exists, the same contract is
//! provided over anonymous pipes with console signal injection, and a
//! `safe_unlink` helper removes files the way `rm -f` would, even
//! read-only or open ones.
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(unix)] {
//! use ptychild::PtyProcess;
//! use std::process::Command;
//! use std::io::{BufRead, BufReader};
//!
//! // spawn a cat process
//! let mut process = PtyProcess::spawn(Command::new("cat")).expect("failed to spawn a process");
//!
//! // send a message to the process
//! process.send_line("Hello cat").expect("failed to write to the process");
//!
//! // read a line back
//! let stream = process.get_pty_stream().expect("failed to create a stream");
//! let mut reader = BufReader::new(stream);
//! let mut buf = String::new();
//! reader.read_line(&mut buf).expect("failed to read the process output");
//!
//! println!("line={}", buf);
//!
//! // stop the process
//! assert!(process.exit(true).expect("failed to stop the process"));
//! # }
//! ```
//!
//! Waiting for output across several children goes through
//! [`poll::poll`], which reports which descriptors have data within a
//! timeout.

mod control_code;
mod error;
pub mod poll;

#[cfg(unix)]
pub mod stream;
#[cfg(unix)]
mod unix;
#[cfg(unix)]
mod util;

#[cfg(windows)]
pub mod win;

pub use control_code::ControlCode;
pub use error::{Error, Result};

#[cfg(unix)]
pub use crate::unix::{interrupt_pid, PtyProcess, Tty};
#[cfg(unix)]
pub use nix::sys::signal::Signal;
#[cfg(unix)]
pub use nix::unistd::Pid;
#[cfg(unix)]
pub use nix::sys::wait::WaitStatus;

#[cfg(windows)]
pub use crate::win::{interrupt_pid, PipeProcess};

/// Whether real terminal allocation is available on this platform.
///
/// On Windows this returns false and `win::PipeProcess` is the way to
/// spawn children.
pub fn tty_supported() -> bool {
    cfg!(unix)
}
