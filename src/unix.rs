//! Child processes attached to a pseudo terminal.

use crate::control_code::ControlCode;
use crate::error::{Error, Result};
use crate::stream::Stream;
use log::debug;
use nix::libc::{self, winsize, STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::sys::signal::{self, Signal};
use nix::sys::termios::{self, SetArg, SpecialCharacterIndices};
use nix::sys::wait::{self, waitpid, WaitStatus};
use nix::unistd::{
    self, close, dup, dup2, fork, getpid, isatty, pipe, setpgid, setsid, sysconf, tcsetpgrp, write,
    ForkResult, Pid, SysconfVar,
};
use nix::{errno::Errno, fcntl, ioctl_write_ptr_bad};
use std::fs::File;
use std::io;
use std::os::unix::prelude::{AsRawFd, CommandExt, FromRawFd, IntoRawFd, RawFd};
use std::process::{self, Command};
use std::thread;
use std::time::Duration;

const DEFAULT_TERM_COLS: u16 = 80;
const DEFAULT_TERM_ROWS: u16 = 24;

const DEFAULT_TERMINATE_DELAY: Duration = Duration::from_millis(100);

// The POSIX sentinel that disables a control character slot.
#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
const VDISABLE: u8 = 0xff;
#[cfg(not(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
const VDISABLE: u8 = 0;

/// PtyProcess controls a child process spawned on the slave side of a
/// pseudo terminal.
///
/// Communication goes through the master side, see
/// [`Self::get_pty_stream`].
///
/// ```no_run
/// use ptychild::PtyProcess;
/// use std::process::Command;
///
/// let mut process = PtyProcess::spawn(Command::new("cat")).unwrap();
/// process.send_line("Hello World").unwrap();
/// ```
#[derive(Debug)]
pub struct PtyProcess {
    master: Option<Master>,
    child_pid: Pid,
    terminate_delay: Duration,
}

impl PtyProcess {
    /// Spawns a child process on a freshly allocated pseudo terminal.
    ///
    /// The child gets the slave side as controlling terminal and as its
    /// std streams; the parent keeps the master side.
    ///
    /// ```no_run
    ///   # use std::process::Command;
    ///   # use ptychild::PtyProcess;
    ///     let proc = PtyProcess::spawn(Command::new("bash"));
    /// ```
    pub fn spawn(mut command: Command) -> Result<Self> {
        let mut master = open_pty()?;

        // Exec failures in the child are reported back through a pipe,
        // which closes silently on a successful exec.
        let (exec_err_pipe_r, exec_err_pipe_w) = pipe().map_err(Error::setup)?;

        let fork = unsafe { fork() }.map_err(Error::spawn)?;
        match fork {
            ForkResult::Child => {
                let err = || -> nix::Result<()> {
                    setup_child_pty(&mut master)?;

                    close(exec_err_pipe_r)?;
                    fcntl::fcntl(
                        exec_err_pipe_w,
                        fcntl::FcntlArg::F_SETFD(fcntl::FdFlag::FD_CLOEXEC),
                    )?;

                    // Do not allow the child to inherit open descriptors
                    // from the parent.
                    close_all_descriptors(&[0, 1, 2, exec_err_pipe_w])?;

                    let _ = command.exec();
                    Err(Errno::last())
                }()
                .unwrap_err();

                let code = err as i32;

                // Intentionally ignoring errors to exit the process properly
                let _ = write(exec_err_pipe_w, &code.to_be_bytes());
                let _ = close(exec_err_pipe_w);

                process::exit(code);
            }
            ForkResult::Parent { child } => {
                close(exec_err_pipe_w).map_err(Error::spawn)?;

                let mut pipe_buf = [0u8; 4];
                unistd::read(exec_err_pipe_r, &mut pipe_buf).map_err(Error::spawn)?;
                close(exec_err_pipe_r).map_err(Error::spawn)?;
                let code = i32::from_be_bytes(pipe_buf);
                if code != 0 {
                    return Err(Error::Spawn(io::Error::from_raw_os_error(code)));
                }

                // The slave side belongs to the child. Holding onto our
                // copy would leak a descriptor per spawn.
                master.release_slave();

                debug!("spawned child {} on {}", child, master.name);

                Ok(Self {
                    master: Some(master),
                    child_pid: child,
                    terminate_delay: DEFAULT_TERMINATE_DELAY,
                })
            }
        }
    }

    /// Returns a pid of a child process.
    pub fn pid(&self) -> Pid {
        self.child_pid
    }

    /// Returns a file representation of the master side, which can be
    /// used to communicate with the child.
    ///
    /// # Safety
    ///
    /// Be carefull changing a descriptors inner state (e.g `fcntl`)
    /// because it affects all structures which use it.
    pub fn get_raw_handle(&self) -> Result<File> {
        let fd = dup(self.master()?.as_raw_fd()).map_err(Error::io)?;
        Ok(unsafe { File::from_raw_fd(fd) })
    }

    /// Returns a stream representation of the master side.
    pub fn get_pty_stream(&self) -> Result<Stream> {
        self.get_raw_handle().map(Stream::new)
    }

    /// The end of file character of the child's terminal.
    pub fn get_eof_char(&self) -> u8 {
        ControlCode::EOT.into()
    }

    /// The interrupt character of the child's terminal.
    pub fn get_intr_char(&self) -> u8 {
        ControlCode::ETX.into()
    }

    /// The name of the slave side terminal device.
    pub fn tty_name(&self) -> Result<&str> {
        Ok(self.master()?.name.as_str())
    }

    /// Get window size of a terminal.
    ///
    /// Default size is 80x24.
    pub fn get_window_size(&self) -> Result<(u16, u16)> {
        get_term_size(self.master()?.as_raw_fd()).map_err(Error::io)
    }

    /// Sets a terminal size and lets the child know about it.
    pub fn set_window_size(&mut self, cols: u16, rows: u16) -> Result<()> {
        set_term_size(self.master()?.as_raw_fd(), cols, rows).map_err(Error::io)?;
        // The child may already be gone, which is fine here.
        let _ = signal::kill(self.child_pid, Signal::SIGWINCH);
        Ok(())
    }

    /// The function returns true if an echo setting is setup.
    pub fn get_echo(&self) -> Result<bool> {
        termios::tcgetattr(self.master()?.as_raw_fd())
            .map(|flags| flags.local_flags.contains(termios::LocalFlags::ECHO))
            .map_err(Error::io)
    }

    /// Sets a echo setting for a terminal.
    pub fn set_echo(&mut self, on: bool) -> Result<()> {
        set_echo(self.master()?.as_raw_fd(), on).map_err(Error::io)
    }

    /// Returns true if the master side is connected to a terminal.
    pub fn isatty(&self) -> Result<bool> {
        isatty(self.master()?.as_raw_fd()).map_err(Error::io)
    }

    /// Reapplies the expected line settings to the master side.
    pub fn reset_tty(&self) -> Result<()> {
        child_setup_tty(self.master()?.as_raw_fd()).map_err(Error::io)
    }

    /// Set the delay used between termination attempts in [`Self::exit`].
    pub fn set_terminate_delay(&mut self, delay: Duration) {
        self.terminate_delay = delay;
    }

    /// Send writes a string to the STDIN of the child.
    pub fn send<S: AsRef<str>>(&mut self, s: S) -> Result<()> {
        self.write_bytes(s.as_ref().as_bytes())
    }

    /// Send writes a line to the STDIN of the child.
    pub fn send_line<S: AsRef<str>>(&mut self, s: S) -> Result<()> {
        self.write_bytes(s.as_ref().as_bytes())?;
        self.write_bytes(b"\n")
    }

    /// Send a control character to the child's terminal.
    pub fn send_control(&mut self, code: ControlCode) -> Result<()> {
        self.write_bytes(&[code.into()])
    }

    /// Send an end of file indicator to the child's terminal.
    pub fn send_eof(&mut self) -> Result<()> {
        self.send_control(ControlCode::EOT)
    }

    /// Send an interrupt character to the child's terminal.
    pub fn send_intr(&mut self) -> Result<()> {
        self.send_control(ControlCode::ETX)
    }

    /// Deliver `signal` to the child as a control character, through
    /// the terminal line discipline.
    ///
    /// Works for the signals which have a character representation
    /// (see [`ControlCode::from_signal`]); any other signal is refused.
    pub fn send_signal_char(&mut self, signal: Signal) -> Result<()> {
        let code = ControlCode::from_signal(signal)
            .ok_or_else(|| Error::Signal(io::Error::from_raw_os_error(libc::EINVAL)))?;
        self.send_control(code)
    }

    /// Interrupt the child, as if Control-C was typed on its terminal.
    pub fn interrupt(&mut self) -> Result<()> {
        self.send_signal_char(Signal::SIGINT)
    }

    /// Status returns a status a of child process.
    pub fn status(&self) -> Result<WaitStatus> {
        waitpid(self.child_pid, Some(wait::WaitPidFlag::WNOHANG)).map_err(Error::wait)
    }

    /// Kill sends a signal to a child process.
    ///
    /// The operation is non-blocking.
    pub fn kill(&mut self, signal: Signal) -> Result<()> {
        signal::kill(self.child_pid, signal).map_err(Error::signal)
    }

    /// Signal is an alias to [`Self::kill`].
    pub fn signal(&mut self, signal: Signal) -> Result<()> {
        self.kill(signal)
    }

    /// Stop the child for good.
    ///
    /// The master side is closed before the kill, so a child blocked on
    /// terminal I/O observes end of file even when the kill is delayed.
    pub fn terminate(&mut self) -> Result<()> {
        drop(self.master.take());
        signal::kill(self.child_pid, Signal::SIGKILL).map_err(Error::signal)
    }

    /// Wait blocks until a child process exits.
    ///
    /// It returns a error if the child was DEAD or not exist
    /// at the time of a call.
    ///
    /// If you need to verify that a process is dead in non-blocking way
    /// you can use [`Self::is_alive`].
    pub fn wait(&self) -> Result<WaitStatus> {
        waitpid(self.child_pid, None).map_err(Error::wait)
    }

    /// Checks if a process is still exists.
    ///
    /// It's a non blocking operation.
    ///
    /// Keep in mind that after calling this method process might be
    /// marked as DEAD by kernel, because a check of its status.
    /// Therefore second call to [`Self::status`] or [`Self::is_alive`]
    /// might return a different status.
    pub fn is_alive(&self) -> Result<bool> {
        match waitpid(self.child_pid, Some(wait::WaitPidFlag::WNOHANG)) {
            Ok(status) if status == WaitStatus::StillAlive => Ok(true),
            Ok(_) | Err(Errno::ECHILD) | Err(Errno::ESRCH) => Ok(false),
            Err(err) => Err(Error::wait(err)),
        }
    }

    /// Try to force a child to terminate.
    ///
    /// This returns true if the child was terminated. and returns false
    /// if the child could not be terminated.
    ///
    /// It makes 4 tries getting more thorough.
    ///
    /// 1. SIGHUP
    /// 2. SIGCONT
    /// 3. SIGINT
    /// 4. SIGTERM
    ///
    /// If "force" is `true` then moves onto SIGKILL.
    pub fn exit(&mut self, force: bool) -> Result<bool> {
        if !self.is_alive()? {
            return Ok(true);
        }

        for &signal in &[
            Signal::SIGHUP,
            Signal::SIGCONT,
            Signal::SIGINT,
            Signal::SIGTERM,
        ] {
            if self.try_to_terminate(signal)? {
                return Ok(true);
            }
        }

        if !force {
            return Ok(false);
        }

        self.try_to_terminate(Signal::SIGKILL)
    }

    fn try_to_terminate(&mut self, signal: Signal) -> Result<bool> {
        self.kill(signal)?;
        thread::sleep(self.terminate_delay);

        self.is_alive().map(|is_alive| !is_alive)
    }

    fn master(&self) -> Result<&Master> {
        self.master
            .as_ref()
            .ok_or_else(|| Error::Io(io::Error::from_raw_os_error(libc::EBADF)))
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        let fd = self.master()?.as_raw_fd();
        let mut written = 0;
        while written < buf.len() {
            written += write(fd, &buf[written..]).map_err(Error::io)?;
        }
        Ok(())
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if let Ok(WaitStatus::StillAlive) = self.status() {
            self.exit(true).unwrap();
        }
    }
}

/// Interrupt the process group led by `pid`, as `kill(-pid, SIGINT)`.
pub fn interrupt_pid(pid: Pid) -> Result<()> {
    signal::killpg(pid, Signal::SIGINT).map_err(Error::signal)
}

/// A standalone terminal allocation.
///
/// The terminal gets the same line settings a spawned child would see;
/// the slave side is meant to be handed over to an external program
/// (a debugger, usually) by name.
#[derive(Debug)]
pub struct Tty {
    master: Master,
}

impl Tty {
    /// Allocates a terminal and applies the expected line settings to it.
    pub fn new() -> Result<Self> {
        let master = open_pty()?;
        child_setup_tty(master.as_raw_fd()).map_err(Error::io)?;
        Ok(Self { master })
    }

    /// The name of the slave side device.
    pub fn name(&self) -> &str {
        &self.master.name
    }

    /// The descriptor of the master side.
    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// Reapplies the expected line settings.
    pub fn reset(&self) -> Result<()> {
        child_setup_tty(self.master.as_raw_fd()).map_err(Error::io)
    }
}

/// The master side of an allocated pseudo terminal.
///
/// Every descriptor is owned by exactly one field, so a double close
/// cannot happen on any path.
#[derive(Debug)]
struct Master {
    fd: File,
    // Only the openpty based allocation opens the slave side up front.
    slave: Option<File>,
    name: String,
}

impl Master {
    fn release_slave(&mut self) {
        drop(self.slave.take());
    }

    fn take_slave(&mut self) -> Option<File> {
        self.slave.take()
    }
}

impl AsRawFd for Master {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

// POSIX does not specify how to open the master side of a terminal,
// so every platform family gets its own strategy. Exactly one of these
// is compiled in.

#[cfg(any(target_os = "linux", target_os = "android"))]
fn open_pty() -> Result<Master> {
    use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt};

    let master = posix_openpt(fcntl::OFlag::O_RDWR).map_err(Error::setup)?;
    grantpt(&master).map_err(Error::setup)?;
    unlockpt(&master).map_err(Error::setup)?;

    let name = ptsname_r(&master).map_err(Error::setup)?;
    let fd = unsafe { File::from_raw_fd(master.into_raw_fd()) };

    Ok(Master {
        fd,
        slave: None,
        name,
    })
}

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
fn open_pty() -> Result<Master> {
    use nix::sys::stat::Mode;
    use std::ffi::CStr;

    // The System V clone device.
    let fd = fcntl::open(
        "/dev/ptmx",
        fcntl::OFlag::O_RDWR | fcntl::OFlag::O_NONBLOCK,
        Mode::empty(),
    )
    .map_err(Error::setup)?;
    let fd = unsafe { File::from_raw_fd(fd) };

    let name = unsafe {
        if libc::grantpt(fd.as_raw_fd()) != 0 || libc::unlockpt(fd.as_raw_fd()) != 0 {
            return Err(Error::setup(Errno::last()));
        }

        let name = libc::ptsname(fd.as_raw_fd());
        if name.is_null() {
            return Err(Error::setup(Errno::last()));
        }

        // ptsname returns a statically allocated string, copy it out.
        CStr::from_ptr(name).to_string_lossy().into_owned()
    };

    Ok(Master {
        fd,
        slave: None,
        name,
    })
}

#[cfg(target_os = "aix")]
fn open_pty() -> Result<Master> {
    use std::ffi::{CStr, CString};

    // Opening the clone device hands out a master; the slave is
    // resolved by name and opened later, in the child.
    let device = CString::new("/dev/ptc").expect("no interior nul");
    let fd = unsafe { libc::open(device.as_ptr(), libc::O_RDWR | libc::O_NONBLOCK) };
    if fd < 0 {
        return Err(Error::setup(Errno::last()));
    }
    let fd = unsafe { File::from_raw_fd(fd) };

    let name = unsafe {
        let name = libc::ptsname(fd.as_raw_fd());
        if name.is_null() {
            return Err(Error::setup(Errno::last()));
        }
        CStr::from_ptr(name).to_string_lossy().into_owned()
    };

    Ok(Master {
        fd,
        slave: None,
        name,
    })
}

#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn open_pty() -> Result<Master> {
    use nix::pty::openpty;
    use nix::unistd::ttyname;

    let pty = openpty(None, None).map_err(Error::setup)?;
    let name = match ttyname(pty.slave) {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(err) => {
            let _ = close(pty.master);
            let _ = close(pty.slave);
            return Err(Error::setup(err));
        }
    };

    Ok(Master {
        fd: unsafe { File::from_raw_fd(pty.master) },
        slave: Some(unsafe { File::from_raw_fd(pty.slave) }),
        name,
    })
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "aix",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn open_pty() -> Result<Master> {
    Err(Error::NotConfigured)
}

/// The child half of the spawn: make the slave side our controlling
/// terminal and our std streams, then put ourselves into the
/// foreground.
fn setup_child_pty(master: &mut Master) -> nix::Result<()> {
    // A fresh session, so that the terminal can become controlling.
    setsid()?;

    let slave_fd = match master.take_slave() {
        Some(file) => file.into_raw_fd(),
        None => open_slave(&master.name)?,
    };

    push_terminal_modules(slave_fd)?;
    acquire_controlling_tty(slave_fd)?;

    child_setup_tty(slave_fd)?;
    // Some shells complain on startup when there is no size at all.
    set_term_size(slave_fd, DEFAULT_TERM_COLS, DEFAULT_TERM_ROWS)?;

    redirect_std_streams(slave_fd)?;

    // Own process group, owning the terminal. Both can fail in exotic
    // session setups while the child is still usable, so no hard error.
    let pid = getpid();
    let _ = setpgid(pid, pid);
    let _ = tcsetpgrp(STDIN_FILENO, pid);

    Ok(())
}

#[cfg(target_os = "aix")]
fn open_slave(name: &str) -> nix::Result<RawFd> {
    use nix::sys::stat::Mode;

    // Without O_NONBLOCK a read on the slave cannot tell "no data yet"
    // from a true end of file, and interactive programs hang on it.
    fcntl::open(
        name,
        fcntl::OFlag::O_RDWR | fcntl::OFlag::O_NONBLOCK,
        Mode::empty(),
    )
}

#[cfg(not(target_os = "aix"))]
fn open_slave(name: &str) -> nix::Result<RawFd> {
    use nix::sys::stat::Mode;

    fcntl::open(name, fcntl::OFlag::O_RDWR, Mode::empty())
}

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
fn push_terminal_modules(fd: RawFd) -> nix::Result<()> {
    // A System V pty only gets termios semantics once the line
    // discipline modules are stacked onto the slave, in this order.
    for module in &["ptem\0", "ldterm\0", "ttcompat\0"] {
        let res = unsafe { libc::ioctl(fd, libc::I_PUSH as _, module.as_ptr()) };
        if res < 0 {
            return Err(Errno::last());
        }
    }
    Ok(())
}

#[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
fn push_terminal_modules(_fd: RawFd) -> nix::Result<()> {
    Ok(())
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn acquire_controlling_tty(fd: RawFd) -> nix::Result<()> {
    if unsafe { libc::ioctl(fd, libc::TIOCSCTTY as _, 0) } != 0 {
        return Err(Errno::last());
    }
    Ok(())
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn acquire_controlling_tty(_fd: RawFd) -> nix::Result<()> {
    // On System V derivatives the first terminal opened after setsid
    // became controlling already, no ioctl exists.
    Ok(())
}

/// Applies the line settings a spawned program expects.
///
/// Eight bit characters pass through unmodified in both directions,
/// nothing is echoed back, canonical processing stays on, and Control-C
/// must raise an interrupt: delivering signals through the terminal
/// depends on it.
fn child_setup_tty(fd: RawFd) -> nix::Result<()> {
    use termios::{ControlFlags, InputFlags, LocalFlags, OutputFlags};

    let mut term = termios::tcgetattr(fd)?;

    term.input_flags.remove(InputFlags::ISTRIP);
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        let iuclc = InputFlags::from_bits_truncate(libc::IUCLC);
        term.input_flags.remove(iuclc);
    }

    term.output_flags.insert(OutputFlags::OPOST);
    // No NL -> CR NL mapping; what the child writes is what is read
    // back on the master.
    term.output_flags.remove(OutputFlags::ONLCR);
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        term.output_flags.remove(OutputFlags::OLCUC);
        let delays = OutputFlags::from_bits_truncate(
            libc::NLDLY | libc::CRDLY | libc::TABDLY | libc::BSDLY | libc::VTDLY | libc::FFDLY,
        );
        term.output_flags.remove(delays);
    }

    term.control_flags.remove(ControlFlags::CSIZE);
    term.control_flags.insert(ControlFlags::CS8);

    term.local_flags.remove(LocalFlags::ECHO);
    term.local_flags
        .insert(LocalFlags::ISIG | LocalFlags::ICANON);

    term.control_chars[SpecialCharacterIndices::VEOF as usize] = ControlCode::EOT.into();
    term.control_chars[SpecialCharacterIndices::VERASE as usize] = VDISABLE;
    term.control_chars[SpecialCharacterIndices::VKILL as usize] = VDISABLE;
    term.control_chars[SpecialCharacterIndices::VQUIT as usize] = ControlCode::FS.into();
    term.control_chars[SpecialCharacterIndices::VINTR as usize] = ControlCode::ETX.into();
    term.control_chars[SpecialCharacterIndices::VEOL as usize] = VDISABLE;
    term.control_chars[SpecialCharacterIndices::VSUSP as usize] = ControlCode::SUB.into();

    termios::tcsetattr(fd, SetArg::TCSADRAIN, &term)
}

fn redirect_std_streams(fd: RawFd) -> nix::Result<()> {
    // If fildes2 is already a valid open file descriptor, it shall be closed first
    close(STDIN_FILENO)?;
    close(STDOUT_FILENO)?;
    close(STDERR_FILENO)?;

    // use slave fd as std[in/out/err]
    dup2(fd, STDIN_FILENO)?;
    dup2(fd, STDOUT_FILENO)?;
    dup2(fd, STDERR_FILENO)?;

    if fd > 2 {
        close(fd)?;
    }

    Ok(())
}

fn set_echo(fd: RawFd, on: bool) -> nix::Result<()> {
    let mut flags = termios::tcgetattr(fd)?;
    match on {
        true => flags.local_flags |= termios::LocalFlags::ECHO,
        false => flags.local_flags &= !termios::LocalFlags::ECHO,
    }

    termios::tcsetattr(fd, SetArg::TCSANOW, &flags)?;
    Ok(())
}

fn set_term_size(fd: i32, cols: u16, rows: u16) -> nix::Result<()> {
    ioctl_write_ptr_bad!(_set_window_size, libc::TIOCSWINSZ, winsize);

    let size = winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    let _ = unsafe { _set_window_size(fd, &size) }?;

    Ok(())
}

fn get_term_size(fd: i32) -> nix::Result<(u16, u16)> {
    nix::ioctl_read_bad!(_get_window_size, libc::TIOCGWINSZ, winsize);

    let mut size = winsize {
        ws_col: 0,
        ws_row: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    let _ = unsafe { _get_window_size(fd, &mut size) }?;

    Ok((size.ws_col, size.ws_row))
}

// Except is used for cases like double free memory
fn close_all_descriptors(except: &[RawFd]) -> nix::Result<()> {
    // On linux could be used getrlimit(RLIMIT_NOFILE, rlim) interface
    let max_open_fds = sysconf(SysconfVar::OPEN_MAX)?.unwrap_or(1024) as i32;
    (0..max_open_fds)
        .filter(|fd| !except.contains(fd))
        .for_each(|fd| {
            // We don't handle errors intentionally,
            // because it will be hard to determine which descriptors closed already.
            let _ = close(fd);
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pty() -> Result<()> {
        let master = open_pty()?;

        let expected_path = if cfg!(target_os = "freebsd") {
            "/dev/pts/"
        } else if cfg!(target_os = "macos") {
            "/dev/ttys"
        } else {
            "/dev/pts/"
        };

        assert!(
            master.name.starts_with(expected_path),
            "unexpected slave name {}",
            master.name
        );

        Ok(())
    }

    #[test]
    fn tty_applies_line_settings() -> Result<()> {
        let tty = Tty::new()?;

        assert!(tty.name().starts_with("/dev/"));
        assert!(tty.master_fd() >= 0);

        tty.reset()
    }
}
