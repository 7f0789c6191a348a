use std::str::FromStr;

use crate::{
    axis::Axis,
    models::{Command, CommandError},
};

fn number<T: FromStr>(field: &str, value: &str) -> Result<T, CommandError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| format!("Invalid {} '{}'", field, value).into())
}

fn axis(value: &str) -> Result<Axis, CommandError> {
    value.parse::<Axis>().map_err(|e| e.to_string().into())
}

fn optional_speed(parts: &[&str], index: usize) -> Result<Option<f64>, CommandError> {
    parts
        .get(index)
        .map(|value| number::<f64>("speed", value))
        .transpose()
}

fn on_off(value: &str) -> Result<bool, CommandError> {
    match value {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        other => Err(format!("Invalid IO state '{}', expected on or off", other).into()),
    }
}

fn expect_fields(parts: &[&str], min: usize, max: usize) -> Result<(), CommandError> {
    if parts.len() < min || parts.len() > max {
        return Err(format!("Invalid command format for '{}'", parts[0]).into());
    }
    Ok(())
}

/// Parses one colon-separated request line, e.g. `move:x:0.5:3`.
pub fn parse_command(cmd_str: &str) -> Result<Command, CommandError> {
    let parts: Vec<&str> = cmd_str.trim().split(':').map(str::trim).collect();

    let command = match parts[0] {
        "move" => {
            expect_fields(&parts, 3, 4)?;
            Command::Move {
                axis: axis(parts[1])?,
                distance: number("distance", parts[2])?,
                speed: optional_speed(&parts, 3)?,
            }
        }
        "move_xy" => {
            expect_fields(&parts, 3, 4)?;
            Command::MoveXy {
                x_distance: number("distance", parts[1])?,
                y_distance: number("distance", parts[2])?,
                speed: optional_speed(&parts, 3)?,
            }
        }
        "move_to" => {
            expect_fields(&parts, 3, 4)?;
            Command::MoveTo {
                x: number("position", parts[1])?,
                y: number("position", parts[2])?,
                speed: optional_speed(&parts, 3)?,
            }
        }
        "home" => {
            expect_fields(&parts, 1, 2)?;
            match parts.get(1) {
                Some(name) => Command::HomeAxis { axis: axis(name)? },
                None => Command::Home,
            }
        }
        "jog" => {
            expect_fields(&parts, 4, 4)?;
            Command::Jog {
                axis: axis(parts[1])?,
                direction: number("direction", parts[2].trim_start_matches('+'))?,
                speed: number("speed", parts[3])?,
            }
        }
        "jog_stop" => {
            expect_fields(&parts, 2, 2)?;
            Command::JogStop {
                axis: axis(parts[1])?,
            }
        }
        "estop" => {
            expect_fields(&parts, 1, 1)?;
            Command::EmergencyStop
        }
        "estop_clear" => {
            expect_fields(&parts, 1, 1)?;
            Command::ClearEmergencyStop
        }
        "io" => {
            expect_fields(&parts, 3, 3)?;
            Command::SetIo {
                name: parts[1].to_string(),
                state: on_off(parts[2])?,
            }
        }
        "status" => {
            expect_fields(&parts, 1, 1)?;
            Command::Status
        }
        "limits" => {
            expect_fields(&parts, 1, 1)?;
            Command::Limits
        }
        "" => return Err("Empty command".into()),
        other => return Err(format!("Unknown command '{}'", other).into()),
    };

    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_moves_with_optional_speed() {
        assert_eq!(
            parse_command("move:x:0.5:3\n").unwrap(),
            Command::Move {
                axis: Axis::X,
                distance: 0.5,
                speed: Some(3.0)
            }
        );
        assert_eq!(
            parse_command("move_xy:-1:2").unwrap(),
            Command::MoveXy {
                x_distance: -1.0,
                y_distance: 2.0,
                speed: None
            }
        );
        assert!(matches!(
            parse_command("move_to:1:1:0.5").unwrap(),
            Command::MoveTo { speed: Some(_), .. }
        ));
    }

    #[test]
    fn parses_jog_and_io() {
        assert_eq!(
            parse_command("jog:y:+1:2.0").unwrap(),
            Command::Jog {
                axis: Axis::Y,
                direction: 1,
                speed: 2.0
            }
        );
        assert_eq!(
            parse_command("jog:x:-1:2.0").unwrap(),
            Command::Jog {
                axis: Axis::X,
                direction: -1,
                speed: 2.0
            }
        );
        assert_eq!(
            parse_command("io:start:on").unwrap(),
            Command::SetIo {
                name: "start".to_string(),
                state: true
            }
        );
        assert_eq!(
            parse_command("home:y").unwrap(),
            Command::HomeAxis { axis: Axis::Y }
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_command("").is_err());
        assert!(parse_command("move:x").is_err());
        assert!(parse_command("move:z:1").unwrap_err().message.contains("Unknown axis"));
        assert!(parse_command("move:x:far").is_err());
        assert!(parse_command("io:down:maybe").is_err());
        assert!(parse_command("estop:now").is_err());
        assert!(parse_command("dance").is_err());
    }
}
