use std::io::{self, ErrorKind, Read, Write};

const MAX_LINE_LENGTH: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Nak,
    Value(Vec<String>),
}

pub fn send_line(sender: &mut impl Write, line: &str) -> io::Result<()> {
    sender.write_all(line.as_bytes())?;
    sender.write_all(b"\r\n")?;
    sender.flush()
}

pub fn read_line(sender: &mut impl Read) -> io::Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        sender.read_exact(&mut byte)?;

        match byte[0] {
            b'\n' => break,
            b'\r' => {}
            b => line.push(b),
        }

        if line.len() > MAX_LINE_LENGTH {
            return Err(io::Error::new(ErrorKind::InvalidData, "Reply line too long"));
        }
    }

    String::from_utf8(line).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
}

/// Parses one reply line of the remote shell.
///
/// Replies look like `SET MIST ACK`, `GET ESTOP NAK`, `HELLO ACK linuxcncrsh 1.1`
/// or `ABS_ACT_POS 1.0000 2.0000 ...`. The leading `SET`/`GET` echo is optional.
pub fn parse_reply(key: &str, line: &str) -> io::Result<Reply> {
    let mut tokens = line.split_whitespace().peekable();

    if let Some(first) = tokens.peek() {
        if first.eq_ignore_ascii_case("SET") || first.eq_ignore_ascii_case("GET") {
            tokens.next();
        }
    }

    match tokens.next() {
        Some(reply_key) if reply_key.eq_ignore_ascii_case(key) => {}
        Some(reply_key) => {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Unexpected reply key: expected {}, got {}", key, reply_key),
            ));
        }
        None => {
            return Err(io::Error::new(ErrorKind::InvalidData, "Empty reply"));
        }
    }

    let rest: Vec<String> = tokens.map(str::to_string).collect();

    match rest.first().map(String::as_str) {
        Some("ACK") => Ok(Reply::Ack),
        Some("NAK") => Ok(Reply::Nak),
        _ => Ok(Reply::Value(rest)),
    }
}

pub fn read_reply(sender: &mut impl Read, key: &str) -> io::Result<Reply> {
    read_reply_skipping(sender, key, &[])
}

/// Reads the reply for `key`, dropping blank lines and echoes of `sent` lines.
/// Echo stays on until the session turns it off, so the handshake needs this.
pub fn read_reply_skipping(sender: &mut impl Read, key: &str, sent: &[&str]) -> io::Result<Reply> {
    loop {
        let line = read_line(sender)?;
        let trimmed = line.trim();

        if trimmed.is_empty() || sent.iter().any(|s| s.eq_ignore_ascii_case(trimmed)) {
            continue;
        }

        return parse_reply(key, trimmed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_acknowledgements() {
        assert_eq!(parse_reply("MIST", "SET MIST ACK").unwrap(), Reply::Ack);
        assert_eq!(parse_reply("JOG_STOP", "SET JOG_STOP NAK").unwrap(), Reply::Nak);
        assert_eq!(
            parse_reply("HELLO", "HELLO ACK linuxcncrsh 1.1").unwrap(),
            Reply::Ack
        );
    }

    #[test]
    fn parses_get_values() {
        let reply = parse_reply("estop", "ESTOP OFF").unwrap();
        assert_eq!(reply, Reply::Value(vec!["OFF".to_string()]));
    }

    #[test]
    fn rejects_mismatched_key() {
        let err = parse_reply("ESTOP", "MACHINE ON").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn skips_echoed_commands() {
        let mut input: &[u8] = b"set echo off\r\nset verbose on\r\nSET VERBOSE ACK\r\n";
        assert_eq!(
            read_reply_skipping(&mut input, "VERBOSE", &["set echo off", "set verbose on"])
                .unwrap(),
            Reply::Ack
        );
    }

    #[test]
    fn reads_crlf_terminated_lines() {
        let mut input: &[u8] = b"\r\nESTOP ON\r\n";
        assert_eq!(
            read_reply(&mut input, "ESTOP").unwrap(),
            Reply::Value(vec!["ON".to_string()])
        );
    }
}
