#![cfg(unix)]

use ptychild::{ControlCode, PtyProcess, Signal, WaitStatus};
use std::{
    io::{BufRead, BufReader, Read},
    process::Command,
    thread,
    time::Duration,
};

#[test]
fn cat() {
    let mut process = PtyProcess::spawn(Command::new("cat")).unwrap();
    process.send_line("hello cat").unwrap();

    let stream = process.get_pty_stream().unwrap();
    let mut reader = BufReader::new(stream);
    let mut buf = String::new();
    reader.read_line(&mut buf).unwrap();

    // The line settings clear ONLCR, so the line comes back exactly as
    // the child wrote it.
    assert_eq!(buf, "hello cat\n");

    drop(reader);

    assert_eq!(process.exit(true).unwrap(), true);
}

#[test]
fn cat_interrupt() {
    let mut process = PtyProcess::spawn(Command::new("cat")).unwrap();

    // this sleep solves an edge case of some cases when cat is somehow not "ready"
    // to take the ^C (occasional test hangs)
    thread::sleep(Duration::from_millis(300));
    process.interrupt().unwrap();

    let status = process.wait().unwrap();

    assert_eq!(
        WaitStatus::Signaled(process.pid(), Signal::SIGINT, false),
        status
    );
}

#[test]
fn cat_eof() {
    let mut proc = PtyProcess::spawn(Command::new("cat")).unwrap();

    // this sleep solves an edge case of some cases when cat is somehow not "ready"
    // to take the ^D (occasional test hangs)
    thread::sleep(Duration::from_millis(300));
    proc.send_eof().unwrap();

    let status = proc.wait().unwrap();

    assert_eq!(WaitStatus::Exited(proc.pid(), 0), status);
}

#[test]
fn read_after_eof() {
    let msg = "hello cat";

    let mut command = Command::new("echo");
    command.arg(msg);
    let proc = PtyProcess::spawn(command).unwrap();

    let mut stream = proc.get_pty_stream().unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).unwrap();
    assert_eq!(buf, format!("{}\n", msg).as_bytes());

    assert_eq!(0, stream.read(&mut [0; 8]).unwrap());
    assert_eq!(0, stream.read(&mut [0; 8]).unwrap());

    assert_eq!(WaitStatus::Exited(proc.pid(), 0), proc.wait().unwrap());
}

#[test]
fn terminal_line_settings() {
    let mut command = Command::new("stty");
    command.arg("-a");
    let proc = PtyProcess::spawn(command).unwrap();

    let mut stream = proc.get_pty_stream().unwrap();
    let mut buf = String::new();
    stream.read_to_string(&mut buf).unwrap();

    println!("{}", buf);

    for expected in &["-echo", "-onlcr", "icanon", "isig"] {
        assert!(
            buf.split_whitespace().any(|word| word == *expected),
            "{} is not in the line settings",
            expected
        );
    }
}

#[test]
fn send_control() {
    let mut process = PtyProcess::spawn(Command::new("cat")).unwrap();

    thread::sleep(Duration::from_millis(300));
    process.send_control(ControlCode::EOT).unwrap();

    assert_eq!(
        WaitStatus::Exited(process.pid(), 0),
        process.wait().unwrap()
    );
}

#[test]
fn send_signal_char_rejects_unmapped_signals() {
    let mut process = PtyProcess::spawn(Command::new("cat")).unwrap();

    assert!(process.send_signal_char(Signal::SIGTERM).is_err());

    assert!(process.exit(true).unwrap());
}

#[test]
fn terminate_then_reap() {
    let mut process = PtyProcess::spawn(Command::new("cat")).unwrap();

    process.terminate().unwrap();

    let status = process.wait().unwrap();
    assert_eq!(
        WaitStatus::Signaled(process.pid(), Signal::SIGKILL, false),
        status
    );
}
