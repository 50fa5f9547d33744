//! Keyboard control surface.
//!
//! Raw keys are mapped onto discrete [`Command`]s (one-shot presses) and a
//! [`CameraControls`] snapshot (held keys). The pipeline only ever sees the
//! mapped values, so any input backend can drive it.

use std::fmt;
use std::str::FromStr;

use crate::camera::CameraControls;
use crate::post_processing::PostProcess;

/// One-shot action triggered by a key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    AppendEffect(PostProcess),
    ClearEffects,
    ToggleFrameLock,
    ToggleLightOrbit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    P,
    L,
    Up,
    Down,
    Left,
    Right,
    W,
    A,
    S,
    D,
}

impl Key {
    pub fn name(self) -> &'static str {
        match self {
            Key::Digit0 => "0",
            Key::Digit1 => "1",
            Key::Digit2 => "2",
            Key::Digit3 => "3",
            Key::Digit4 => "4",
            Key::Digit5 => "5",
            Key::P => "p",
            Key::L => "l",
            Key::Up => "up",
            Key::Down => "down",
            Key::Left => "left",
            Key::Right => "right",
            Key::W => "w",
            Key::A => "a",
            Key::S => "s",
            Key::D => "d",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key '{0}'")]
pub struct UnknownKey(pub String);

impl FromStr for Key {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.trim().to_lowercase().as_str() {
            "0" => Key::Digit0,
            "1" => Key::Digit1,
            "2" => Key::Digit2,
            "3" => Key::Digit3,
            "4" => Key::Digit4,
            "5" => Key::Digit5,
            "p" => Key::P,
            "l" => Key::L,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "w" => Key::W,
            "a" => Key::A,
            "s" => Key::S,
            "d" => Key::D,
            _ => return Err(UnknownKey(s.to_string())),
        };
        Ok(key)
    }
}

/// Command for a pressed key, if the key has one.
pub fn command_for_key(key: Key) -> Option<Command> {
    match key {
        Key::Digit1 => Some(Command::AppendEffect(PostProcess::HlsGradient)),
        Key::Digit2 => Some(Command::AppendEffect(PostProcess::GaussianBlur)),
        Key::Digit3 => Some(Command::AppendEffect(PostProcess::UnderWater)),
        Key::Digit4 => Some(Command::AppendEffect(PostProcess::Retro)),
        Key::Digit5 => Some(Command::AppendEffect(PostProcess::Bloom)),
        Key::Digit0 => Some(Command::ClearEffects),
        Key::P => Some(Command::ToggleFrameLock),
        Key::L => Some(Command::ToggleLightOrbit),
        _ => None,
    }
}

/// Camera controls for a set of held keys.
pub fn controls_for_keys(held: &[Key]) -> CameraControls {
    let mut controls = CameraControls::none();
    for key in held {
        match key {
            Key::Up => controls.turn_up = true,
            Key::Down => controls.turn_down = true,
            Key::Left => controls.turn_left = true,
            Key::Right => controls.turn_right = true,
            Key::W => controls.move_forward = true,
            Key::S => controls.move_backward = true,
            Key::A => controls.move_left = true,
            Key::D => controls.move_right = true,
            _ => {}
        }
    }
    controls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_keys_append_effects() {
        let expected = [
            (Key::Digit1, PostProcess::HlsGradient),
            (Key::Digit2, PostProcess::GaussianBlur),
            (Key::Digit3, PostProcess::UnderWater),
            (Key::Digit4, PostProcess::Retro),
            (Key::Digit5, PostProcess::Bloom),
        ];
        for (key, effect) in expected {
            assert_eq!(command_for_key(key), Some(Command::AppendEffect(effect)));
        }
    }

    #[test]
    fn test_toggle_and_clear_keys() {
        assert_eq!(command_for_key(Key::Digit0), Some(Command::ClearEffects));
        assert_eq!(command_for_key(Key::P), Some(Command::ToggleFrameLock));
        assert_eq!(command_for_key(Key::L), Some(Command::ToggleLightOrbit));
        assert_eq!(command_for_key(Key::W), None);
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!("3".parse::<Key>(), Ok(Key::Digit3));
        assert_eq!(" Up ".parse::<Key>(), Ok(Key::Up));
        assert_eq!("P".parse::<Key>(), Ok(Key::P));
        assert!("f12".parse::<Key>().is_err());
        for key in [Key::Digit0, Key::L, Key::Right, Key::D] {
            assert_eq!(key.name().parse::<Key>(), Ok(key));
        }
    }

    #[test]
    fn test_held_keys_to_controls() {
        let controls = controls_for_keys(&[Key::W, Key::Right, Key::Digit1]);
        assert!(controls.move_forward);
        assert!(controls.turn_right);
        assert!(!controls.move_backward);
        assert!(!controls_for_keys(&[Key::P, Key::L]).any());
    }
}
