use reply::{read_reply, read_reply_skipping, send_line, Reply};
use state::{parse_floats, parse_on_off, parse_yes_no, JointLimit, StateParams};
use std::io::{Error, ErrorKind, Read, Result, Write};

pub mod reply;
pub mod state;

const PROTOCOL_VERSION: &str = "1.1";

/// Index passed to `set home` to home every joint.
pub const ALL_JOINTS: i8 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Manual,
    Auto,
    Mdi,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Manual => "manual",
            Mode::Auto => "auto",
            Mode::Mdi => "mdi",
        }
    }
}

fn on_off(state: bool) -> &'static str {
    if state { "on" } else { "off" }
}

/// Client for the LinuxCNC remote shell (`linuxcncrsh`).
#[derive(Debug, Clone)]
pub struct LinuxCnc {
    password: String,
    client_name: String,
}

impl LinuxCnc {
    pub fn new(password: impl Into<String>, client_name: impl Into<String>) -> Self {
        LinuxCnc {
            password: password.into(),
            client_name: client_name.into(),
        }
    }

    /// Greets the shell and switches the session into a mode where every
    /// `set` command is acknowledged.
    pub fn handshake(&self, sender: &mut (impl Write + Read)) -> Result<()> {
        let hello = format!(
            "hello {} {} {}",
            self.password, self.client_name, PROTOCOL_VERSION
        );
        send_line(sender, &hello)?;
        if read_reply_skipping(sender, "HELLO", &[hello.as_str()])? != Reply::Ack {
            return Err(Error::new(
                ErrorKind::PermissionDenied,
                "Remote shell rejected hello",
            ));
        }

        // Without verbose a successful set is silent, so nothing can be acknowledged yet.
        send_line(sender, "set echo off")?;
        send_line(sender, "set verbose on")?;
        read_reply_skipping(sender, "VERBOSE", &["set echo off", "set verbose on"])?;

        if !self.set(sender, &format!("enable {}", self.password))? {
            return Err(Error::new(
                ErrorKind::PermissionDenied,
                "Remote shell rejected enable password",
            ));
        }

        Ok(())
    }

    pub fn set(&self, sender: &mut (impl Write + Read), command: &str) -> Result<bool> {
        let key = command
            .split_whitespace()
            .next()
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Empty set command"))?;

        send_line(sender, &format!("set {}", command))?;

        match read_reply(sender, key)? {
            Reply::Ack => Ok(true),
            Reply::Nak => Ok(false),
            Reply::Value(values) => Err(Error::new(
                ErrorKind::InvalidData,
                format!("Unexpected reply to set {}: {:?}", key, values),
            )),
        }
    }

    pub fn get(&self, sender: &mut (impl Write + Read), key: &str) -> Result<Vec<String>> {
        send_line(sender, &format!("get {}", key))?;

        match read_reply(sender, key)? {
            Reply::Value(values) => Ok(values),
            Reply::Ack => Ok(Vec::new()),
            Reply::Nak => Err(Error::new(
                ErrorKind::Other,
                format!("Remote shell rejected get {}", key),
            )),
        }
    }

    pub fn set_estop(&self, sender: &mut (impl Write + Read), on: bool) -> Result<bool> {
        self.set(sender, &format!("estop {}", on_off(on)))
    }

    pub fn set_machine(&self, sender: &mut (impl Write + Read), on: bool) -> Result<bool> {
        self.set(sender, &format!("machine {}", on_off(on)))
    }

    pub fn set_mode(&self, sender: &mut (impl Write + Read), mode: Mode) -> Result<bool> {
        self.set(sender, &format!("mode {}", mode.as_str()))
    }

    pub fn set_teleop(&self, sender: &mut (impl Write + Read), enabled: bool) -> Result<bool> {
        self.set(sender, &format!("teleop_enable {}", on_off(enabled)))
    }

    pub fn jog_continuous(
        &self,
        sender: &mut (impl Write + Read),
        joint: u8,
        velocity: f64,
    ) -> Result<bool> {
        self.set(sender, &format!("jog {} {:.4}", joint, velocity))
    }

    pub fn jog_increment(
        &self,
        sender: &mut (impl Write + Read),
        joint: u8,
        speed: f64,
        increment: f64,
    ) -> Result<bool> {
        self.set(
            sender,
            &format!("jog_incr {} {:.4} {:.4}", joint, speed, increment),
        )
    }

    pub fn jog_stop(&self, sender: &mut (impl Write + Read), joint: u8) -> Result<bool> {
        self.set(sender, &format!("jog_stop {}", joint))
    }

    pub fn home(&self, sender: &mut (impl Write + Read), joint: i8) -> Result<bool> {
        self.set(sender, &format!("home {}", joint))
    }

    pub fn mdi(&self, sender: &mut (impl Write + Read), line: &str) -> Result<bool> {
        self.set(sender, &format!("mdi {}", line))
    }

    pub fn set_mist(&self, sender: &mut (impl Write + Read), on: bool) -> Result<bool> {
        self.set(sender, &format!("mist {}", on_off(on)))
    }

    pub fn set_flood(&self, sender: &mut (impl Write + Read), on: bool) -> Result<bool> {
        self.set(sender, &format!("flood {}", on_off(on)))
    }

    pub fn get_estop(&self, sender: &mut (impl Write + Read)) -> Result<bool> {
        parse_on_off(&self.get(sender, "estop")?)
    }

    pub fn get_state(&self, sender: &mut (impl Write + Read)) -> Result<StateParams> {
        let estop = self.get_estop(sender)?;
        let machine_on = parse_on_off(&self.get(sender, "machine")?)?;
        let positions = parse_floats(&self.get(sender, "abs_act_pos")?)?;
        let homed = self
            .get(sender, "joint_homed")?
            .iter()
            .map(|token| parse_yes_no(token))
            .collect::<Result<Vec<_>>>()?;
        let limits = self
            .get(sender, "joint_limit")?
            .iter()
            .map(|token| JointLimit::from_token(token))
            .collect::<Result<Vec<_>>>()?;
        let in_position = self
            .get(sender, "inpos")?
            .first()
            .map(|token| parse_yes_no(token))
            .transpose()?
            .unwrap_or(false);

        Ok(StateParams {
            estop,
            machine_on,
            in_position,
            positions,
            homed,
            limits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(replies: &str) -> Self {
            MockStream {
                input: Cursor::new(replies.as_bytes().to_vec()),
                output: Vec::new(),
            }
        }

        fn written(&self) -> String {
            String::from_utf8_lossy(&self.output).to_string()
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn handshake_enables_session() {
        let cnc = LinuxCnc::new("EMC", "xytable");
        let mut stream = MockStream::new(
            "hello EMC xytable 1.1\r\nHELLO ACK linuxcncrsh 1.1\r\nset echo off\r\nSET VERBOSE ACK\r\nSET ENABLE ACK\r\n",
        );

        cnc.handshake(&mut stream).unwrap();

        let written = stream.written();
        assert!(written.starts_with("hello EMC xytable 1.1\r\n"));
        assert!(written.contains("set echo off\r\n"));
        assert!(written.ends_with("set enable EMC\r\n"));
    }

    #[test]
    fn handshake_fails_on_rejected_hello() {
        let cnc = LinuxCnc::new("wrong", "xytable");
        let mut stream = MockStream::new("HELLO NAK\r\n");

        let err = cnc.handshake(&mut stream).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn set_commands_report_nak_as_false() {
        let cnc = LinuxCnc::new("EMC", "xytable");
        let mut stream = MockStream::new("SET JOG ACK\r\nSET JOG_STOP NAK\r\n");

        assert!(cnc.jog_continuous(&mut stream, 0, -2.0).unwrap());
        assert!(!cnc.jog_stop(&mut stream, 0).unwrap());
        assert_eq!(
            stream.written(),
            "set jog 0 -2.0000\r\nset jog_stop 0\r\n"
        );
    }

    #[test]
    fn reads_full_state() {
        let cnc = LinuxCnc::new("EMC", "xytable");
        let mut stream = MockStream::new(concat!(
            "ESTOP OFF\r\n",
            "MACHINE ON\r\n",
            "ABS_ACT_POS 1.2500 0.5000 0.0000\r\n",
            "JOINT_HOMED YES NO\r\n",
            "JOINT_LIMIT OK MAXHARD\r\n",
            "INPOS YES\r\n",
        ));

        let state = cnc.get_state(&mut stream).unwrap();

        assert!(!state.is_estop());
        assert!(state.is_machine_on());
        assert!(state.in_position);
        assert_eq!(state.position(0), Some(1.25));
        assert_eq!(state.is_homed(1), Some(false));
        assert!(state.limit(1).unwrap().upper());
        assert_eq!(state.position(7), None);
    }

    #[test]
    fn rejected_get_is_an_error() {
        let cnc = LinuxCnc::new("EMC", "xytable");
        let mut stream = MockStream::new("GET ESTOP NAK\r\n");

        assert!(cnc.get_estop(&mut stream).is_err());
    }
}
