#![cfg(unix)]

use ptychild::PtyProcess;
use std::io::Read;
use std::process::Command;

#[test]
fn default_win_size() {
    let proc = PtyProcess::spawn(Command::new("cat")).unwrap();

    assert_eq!(proc.get_window_size().unwrap(), (80, 24));
}

#[test]
fn set_win_size() {
    let mut proc = PtyProcess::spawn(Command::new("cat")).unwrap();

    proc.set_window_size(100, 200).unwrap();

    assert_eq!(proc.get_window_size().unwrap(), (100, 200));
}

#[test]
fn child_observes_win_size() {
    let mut command = Command::new("sh");
    command.args(&["-c", "sleep 1; stty size"]);
    let mut proc = PtyProcess::spawn(command).unwrap();

    proc.set_window_size(132, 40).unwrap();

    let mut stream = proc.get_pty_stream().unwrap();
    let mut buf = String::new();
    stream.read_to_string(&mut buf).unwrap();

    assert!(buf.contains("40 132"), "unexpected stty output: {:?}", buf);
}

#[test]
fn default_echo() {
    let proc = PtyProcess::spawn(Command::new("cat")).unwrap();

    assert!(!proc.get_echo().unwrap());
}

#[test]
fn set_echo() {
    let mut proc = PtyProcess::spawn(Command::new("cat")).unwrap();

    assert!(proc.isatty().unwrap());

    proc.set_echo(true).unwrap();

    assert!(proc.get_echo().unwrap());
}

#[test]
fn tty_name_points_at_a_device() {
    let proc = PtyProcess::spawn(Command::new("cat")).unwrap();

    assert!(proc.tty_name().unwrap().starts_with("/dev/"));
}

#[test]
fn reset_tty_reapplies_the_line_settings() {
    let proc = PtyProcess::spawn(Command::new("cat")).unwrap();

    proc.reset_tty().unwrap();
    proc.reset_tty().unwrap();

    assert!(!proc.get_echo().unwrap());
}

#[test]
fn tty_is_supported() {
    assert!(ptychild::tty_supported());
}
