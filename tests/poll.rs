#![cfg(unix)]

use ptychild::poll::poll;
use ptychild::PtyProcess;
use std::os::unix::prelude::AsRawFd;
use std::process::Command;
use std::time::{Duration, Instant};

#[test]
fn poll_sees_data_once_written() {
    let mut proc = PtyProcess::spawn(Command::new("cat")).unwrap();
    let stream = proc.get_pty_stream().unwrap();
    let fd = stream.as_raw_fd();

    // Nothing was sent yet, nothing can be ready.
    let ready = poll(&[fd], Some(Duration::from_millis(100))).unwrap();
    assert!(ready.timed_out());

    proc.send_line("hello").unwrap();

    let ready = poll(&[fd], Some(Duration::from_secs(5))).unwrap();
    assert_eq!(ready.count(), 1);
    assert!(ready.is_ready(0));

    assert!(proc.exit(true).unwrap());
}

#[test]
fn poll_times_out_on_a_silent_child() {
    let mut command = Command::new("sleep");
    command.arg("10");
    let proc = PtyProcess::spawn(command).unwrap();
    let stream = proc.get_pty_stream().unwrap();

    let started = Instant::now();
    let ready = poll(&[stream.as_raw_fd()], Some(Duration::from_millis(50))).unwrap();
    let elapsed = started.elapsed();

    assert!(ready.timed_out());
    assert!(
        elapsed >= Duration::from_millis(40),
        "poll returned too early: {:?}",
        elapsed
    );
    assert!(
        elapsed <= Duration::from_millis(500),
        "poll returned too late: {:?}",
        elapsed
    );

    drop(proc);
}

#[test]
fn poll_reports_the_right_descriptor() {
    let mut quiet = PtyProcess::spawn(Command::new("cat")).unwrap();
    let mut noisy = PtyProcess::spawn(Command::new("cat")).unwrap();

    let quiet_stream = quiet.get_pty_stream().unwrap();
    let noisy_stream = noisy.get_pty_stream().unwrap();

    noisy.send_line("data").unwrap();

    let ready = poll(
        &[quiet_stream.as_raw_fd(), noisy_stream.as_raw_fd()],
        Some(Duration::from_secs(5)),
    )
    .unwrap();

    assert!(!ready.is_ready(0));
    assert!(ready.is_ready(1));
    assert_eq!(ready.count(), 1);

    assert!(quiet.exit(true).unwrap());
    assert!(noisy.exit(true).unwrap());
}
