#![cfg(unix)]

use ptychild::{Error, PtyProcess};
use std::process::Command;

#[test]
fn spawn_reports_the_child_errno() {
    let err = PtyProcess::spawn(Command::new("/does/not/exist")).unwrap_err();

    match err {
        Error::Spawn(err) => assert_eq!(err.raw_os_error(), Some(libc::ENOENT)),
        err => panic!("unexpected error kind: {}", err),
    }
}

#[test]
fn empty_program_name() {
    let err = PtyProcess::spawn(Command::new("")).unwrap_err();

    assert!(matches!(err, Error::Spawn(_)));
}
