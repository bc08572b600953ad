use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::Result;
use std::os::unix::prelude::RawFd;

pub(crate) fn make_non_blocking(fd: RawFd) -> Result<()> {
    set_non_blocking(fd, true)
}

pub(crate) fn make_blocking(fd: RawFd) -> Result<()> {
    set_non_blocking(fd, false)
}

fn set_non_blocking(fd: RawFd, on: bool) -> Result<()> {
    let opt = fcntl(fd, FcntlArg::F_GETFL)?;
    let mut opt = OFlag::from_bits_truncate(opt);
    opt.set(OFlag::O_NONBLOCK, on);
    fcntl(fd, FcntlArg::F_SETFL(opt))?;
    Ok(())
}
