//! Operator input for a scanning session
//!
//! Pointer coordinates are in screen space, relative to the top-left corner
//! of the preview area.

use std::str::FromStr;

use crate::domain::Symbology;

// ============================================================================
// Input Events
// ============================================================================

/// One operator action
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Pointer moved over the preview
    PointerMoved(f32, f32),
    /// Pointer left the preview
    PointerLeft,
    /// Click at position
    Click(f32, f32),
    /// Enable/disable a symbology for the following scans
    Toggle(Symbology),
    /// Switch the capture source
    Source(String),
    /// Save the current composited frame
    Save,
    /// End the session
    Quit,
}

impl FromStr for InputEvent {
    type Err = String;

    /// Parse one command line, e.g. `click 120 40` or `toggle qr`
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match verb.to_ascii_lowercase().as_str() {
            "move" => parse_point(rest).map(|(x, y)| InputEvent::PointerMoved(x, y)),
            "click" => parse_point(rest).map(|(x, y)| InputEvent::Click(x, y)),
            "leave" => Ok(InputEvent::PointerLeft),
            "toggle" => rest.parse().map(InputEvent::Toggle),
            "source" if !rest.is_empty() => Ok(InputEvent::Source(rest.to_string())),
            "source" => Err("source needs a selector".to_string()),
            "save" => Ok(InputEvent::Save),
            "quit" | "exit" => Ok(InputEvent::Quit),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

fn parse_point(args: &str) -> Result<(f32, f32), String> {
    let mut parts = args.split_whitespace().map(str::parse::<f32>);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y)), None) if x.is_finite() && y.is_finite() => Ok((x, y)),
        _ => Err(format!("expected two coordinates, got '{args}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pointer_commands() {
        assert_eq!("move 10 20.5".parse::<InputEvent>(), Ok(InputEvent::PointerMoved(10.0, 20.5)));
        assert_eq!("  CLICK 1 2 ".parse::<InputEvent>(), Ok(InputEvent::Click(1.0, 2.0)));
        assert_eq!("leave".parse::<InputEvent>(), Ok(InputEvent::PointerLeft));
    }

    #[test]
    fn test_parse_settings_commands() {
        assert_eq!(
            "toggle qr".parse::<InputEvent>(),
            Ok(InputEvent::Toggle(Symbology::QrCode))
        );
        assert_eq!(
            "source /srv/frames/bench 2".parse::<InputEvent>(),
            Ok(InputEvent::Source("/srv/frames/bench 2".to_string()))
        );
        assert_eq!("save".parse::<InputEvent>(), Ok(InputEvent::Save));
        assert_eq!("exit".parse::<InputEvent>(), Ok(InputEvent::Quit));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("click 1".parse::<InputEvent>().is_err());
        assert!("click 1 2 3".parse::<InputEvent>().is_err());
        assert!("move a b".parse::<InputEvent>().is_err());
        assert!("toggle pdf417".parse::<InputEvent>().is_err());
        assert!("source".parse::<InputEvent>().is_err());
        assert!("dance".parse::<InputEvent>().is_err());
        assert!("".parse::<InputEvent>().is_err());
    }
}
