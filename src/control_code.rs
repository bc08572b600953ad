//! The C0 control characters of the ASCII table.

/// A C0 control character.
///
/// They can be sent to a child with
/// [`PtyProcess::send_control`](crate::PtyProcess::send_control).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCode {
    /// `^@`, a null byte.
    NUL,
    /// `^A`, start of heading.
    SOH,
    /// `^B`, start of text.
    STX,
    /// `^C`, end of text.
    ///
    /// Raises an interrupt when written to a terminal with `ISIG` set.
    ETX,
    /// `^D`, end of transmission.
    ///
    /// Marks end of file in canonical mode.
    EOT,
    /// `^E`, enquiry.
    ENQ,
    /// `^F`, acknowledge.
    ACK,
    /// `^G`, bell.
    BEL,
    /// `^H`, backspace.
    BS,
    /// `^I`, horizontal tabulation.
    HT,
    /// `^J`, line feed.
    LF,
    /// `^K`, vertical tabulation.
    VT,
    /// `^L`, form feed.
    FF,
    /// `^M`, carriage return.
    CR,
    /// `^N`, shift out.
    SO,
    /// `^O`, shift in.
    SI,
    /// `^P`, data link escape.
    DLE,
    /// `^Q`, device control one (XON).
    DC1,
    /// `^R`, device control two.
    DC2,
    /// `^S`, device control three (XOFF).
    DC3,
    /// `^T`, device control four.
    DC4,
    /// `^U`, negative acknowledge.
    NAK,
    /// `^V`, synchronous idle.
    SYN,
    /// `^W`, end of transmission block.
    ETB,
    /// `^X`, cancel.
    CAN,
    /// `^Y`, end of medium.
    EM,
    /// `^Z`, substitute.
    ///
    /// Suspends the foreground job when written to a terminal with
    /// `ISIG` set.
    SUB,
    /// `^[`, escape.
    ESC,
    /// `^\`, file separator.
    ///
    /// Raises a quit when written to a terminal with `ISIG` set.
    FS,
    /// `^]`, group separator.
    GS,
    /// `^^`, record separator.
    RS,
    /// `^_`, unit separator.
    US,
    /// `^?`, delete.
    DEL,
}

impl ControlCode {
    /// The control character the terminal line discipline turns into
    /// `signal`, if there is one.
    #[cfg(unix)]
    pub fn from_signal(signal: nix::sys::signal::Signal) -> Option<Self> {
        use nix::sys::signal::Signal;

        match signal {
            Signal::SIGINT => Some(ControlCode::ETX),
            Signal::SIGQUIT => Some(ControlCode::FS),
            Signal::SIGTSTP => Some(ControlCode::SUB),
            _ => None,
        }
    }
}

impl From<ControlCode> for u8 {
    fn from(code: ControlCode) -> Self {
        use ControlCode::*;

        match code {
            NUL => 0x00,
            SOH => 0x01,
            STX => 0x02,
            ETX => 0x03,
            EOT => 0x04,
            ENQ => 0x05,
            ACK => 0x06,
            BEL => 0x07,
            BS => 0x08,
            HT => 0x09,
            LF => 0x0a,
            VT => 0x0b,
            FF => 0x0c,
            CR => 0x0d,
            SO => 0x0e,
            SI => 0x0f,
            DLE => 0x10,
            DC1 => 0x11,
            DC2 => 0x12,
            DC3 => 0x13,
            DC4 => 0x14,
            NAK => 0x15,
            SYN => 0x16,
            ETB => 0x17,
            CAN => 0x18,
            EM => 0x19,
            SUB => 0x1a,
            ESC => 0x1b,
            FS => 0x1c,
            GS => 0x1d,
            RS => 0x1e,
            US => 0x1f,
            DEL => 0x7f,
        }
    }
}

impl From<ControlCode> for char {
    fn from(code: ControlCode) -> Self {
        u8::from(code) as char
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_ascii_table() {
        assert_eq!(u8::from(ControlCode::ETX), 3);
        assert_eq!(u8::from(ControlCode::EOT), 4);
        assert_eq!(u8::from(ControlCode::SUB), 26);
        assert_eq!(u8::from(ControlCode::FS), 28);
        assert_eq!(u8::from(ControlCode::DEL), 127);
    }

    #[cfg(unix)]
    #[test]
    fn signal_mapping() {
        use nix::sys::signal::Signal;

        assert_eq!(
            ControlCode::from_signal(Signal::SIGINT),
            Some(ControlCode::ETX)
        );
        assert_eq!(
            ControlCode::from_signal(Signal::SIGQUIT),
            Some(ControlCode::FS)
        );
        assert_eq!(
            ControlCode::from_signal(Signal::SIGTSTP),
            Some(ControlCode::SUB)
        );
        assert_eq!(ControlCode::from_signal(Signal::SIGTERM), None);
    }
}
