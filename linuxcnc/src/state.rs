use bitflags::bitflags;
use std::io::{self, ErrorKind};

bitflags!(
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct JointLimit: u8 {
        const MIN_SOFT = 0b0001;
        const MIN_HARD = 0b0010;
        const MAX_SOFT = 0b0100;
        const MAX_HARD = 0b1000;
    }
);

impl JointLimit {
    pub fn from_token(token: &str) -> io::Result<Self> {
        match token.to_ascii_uppercase().as_str() {
            "OK" => Ok(JointLimit::empty()),
            "MINSOFT" => Ok(JointLimit::MIN_SOFT),
            "MINHARD" => Ok(JointLimit::MIN_HARD),
            "MAXSOFT" => Ok(JointLimit::MAX_SOFT),
            "MAXHARD" => Ok(JointLimit::MAX_HARD),
            other => Err(invalid(format!("Unknown joint limit state: {}", other))),
        }
    }

    pub fn lower(&self) -> bool {
        self.intersects(JointLimit::MIN_SOFT | JointLimit::MIN_HARD)
    }

    pub fn upper(&self) -> bool {
        self.intersects(JointLimit::MAX_SOFT | JointLimit::MAX_HARD)
    }
}

/// Snapshot of the machine as reported by a series of `get` queries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateParams {
    pub estop: bool,
    pub machine_on: bool,
    pub in_position: bool,
    pub positions: Vec<f64>,
    pub homed: Vec<bool>,
    pub limits: Vec<JointLimit>,
}

impl StateParams {
    pub fn is_estop(&self) -> bool {
        self.estop
    }

    pub fn is_machine_on(&self) -> bool {
        self.machine_on
    }

    pub fn position(&self, joint: usize) -> Option<f64> {
        self.positions.get(joint).copied()
    }

    pub fn is_homed(&self, joint: usize) -> Option<bool> {
        self.homed.get(joint).copied()
    }

    pub fn limit(&self, joint: usize) -> Option<JointLimit> {
        self.limits.get(joint).copied()
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, message)
}

pub fn parse_on_off(values: &[String]) -> io::Result<bool> {
    match values.first().map(|v| v.to_ascii_uppercase()) {
        Some(v) if v == "ON" => Ok(true),
        Some(v) if v == "OFF" => Ok(false),
        other => Err(invalid(format!("Expected ON/OFF, got {:?}", other))),
    }
}

pub fn parse_yes_no(token: &str) -> io::Result<bool> {
    match token.to_ascii_uppercase().as_str() {
        "YES" => Ok(true),
        "NO" => Ok(false),
        other => Err(invalid(format!("Expected YES/NO, got {}", other))),
    }
}

pub fn parse_floats(values: &[String]) -> io::Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.parse::<f64>()
                .map_err(|e| invalid(format!("Invalid number {}: {}", v, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn limit_tokens_map_to_sides() {
        assert!(JointLimit::from_token("MINHARD").unwrap().lower());
        assert!(JointLimit::from_token("maxsoft").unwrap().upper());
        assert!(JointLimit::from_token("OK").unwrap().is_empty());
        assert!(JointLimit::from_token("SIDEWAYS").is_err());
    }

    #[test]
    fn parses_values() {
        assert!(parse_on_off(&tokens("ON")).unwrap());
        assert!(!parse_on_off(&tokens("off")).unwrap());
        assert!(parse_on_off(&tokens("")).is_err());
        assert_eq!(
            parse_floats(&tokens("1.2500 -0.5000")).unwrap(),
            vec![1.25, -0.5]
        );
        assert!(parse_yes_no("MAYBE").is_err());
    }
}
