//! A blocking byte stream over the terminal master.

use crate::error::errno_to_io;
use crate::util::{make_blocking, make_non_blocking};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read, Write},
    os::unix::prelude::{AsRawFd, RawFd},
};

/// Stream represents the parent side of the terminal.
///
/// Writes appear on the child's stdin, reads return whatever the child
/// printed. It implements [std::io::Read], [std::io::Write] and
/// [std::io::BufRead].
#[derive(Debug)]
pub struct Stream {
    inner: File,
    reader: BufReader<File>,
}

impl Stream {
    pub fn new(file: File) -> Self {
        let copy_file = file
            .try_clone()
            .expect("It's ok to clone fd as it will be just DUPed");
        let reader = BufReader::new(copy_file);
        Self {
            inner: file,
            reader,
        }
    }

    /// Try to read in a non-blocking mode.
    ///
    /// It returns `Ok(None)` if there's nothing to read.
    /// Otherwise it operates as general `std::io::Read` interface.
    pub fn try_read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let fd = self.inner.as_raw_fd();
        make_non_blocking(fd).map_err(errno_to_io)?;

        let result = match self.read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        };

        // As file is DUPed changes in one descriptor affects all ones
        // so we need to make blocking file after we finished.
        make_blocking(fd).map_err(errno_to_io)?;

        result
    }

    /// Try to read a byte in a non-blocking mode.
    ///
    /// Returns:
    ///     - `None` if there's nothing to read.
    ///     - `Some(None)` on eof.
    ///     - `Some(Some(byte))` on sucessfull call.
    ///
    /// For more information look at [`Self::try_read`].
    pub fn try_read_byte(&mut self) -> io::Result<Option<Option<u8>>> {
        let mut buf = [0; 1];
        match self.try_read(&mut buf)? {
            Some(1) => Ok(Some(Some(buf[0]))),
            Some(0) => Ok(Some(None)),
            None => Ok(None),
            Some(_) => unreachable!(),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn write_vectored(&mut self, bufs: &[io::IoSlice<'_>]) -> io::Result<usize> {
        self.inner.write_vectored(bufs)
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.read(buf) {
            Err(ref err) if pty_hung_up(err) => Ok(0),
            result => result,
        }
    }
}

impl BufRead for Stream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self.reader.fill_buf() {
            Err(ref err) if pty_hung_up(err) => Ok(&[]),
            result => result,
        }
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl AsRawFd for Stream {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

// On Linux the master read fails with EIO once the slave side is gone,
// which for a caller simply means end of stream.
fn pty_hung_up(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}
