//! Inbound control-channel parsing.
//!
//! Viewers can send two text messages upstream:
//!
//! - `ping` — liveness probe, answered with `pong` to that viewer only.
//! - `BTN_EVENT:PIN=<int>,TYPE=PRESS|RELEASE|CLICK|LONG_PRESS` — a
//!   synthesized button press, forwarded to the device's input-event
//!   bus as if a physical button had produced it.
//!
//! Anything else is ignored. Malformed `BTN_EVENT` fields are dropped
//! with a log line and never surface as an error to the transport.

use std::fmt;
use std::str::FromStr;

use crate::error::CastError;

// ── ButtonAction ─────────────────────────────────────────────────

/// Kind of button interaction a viewer synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Press,
    Release,
    Click,
    LongPress,
}

impl FromStr for ButtonAction {
    type Err = CastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("PRESS") {
            Ok(ButtonAction::Press)
        } else if s.eq_ignore_ascii_case("RELEASE") {
            Ok(ButtonAction::Release)
        } else if s.eq_ignore_ascii_case("CLICK") {
            Ok(ButtonAction::Click)
        } else if s.eq_ignore_ascii_case("LONG_PRESS") {
            Ok(ButtonAction::LongPress)
        } else {
            Err(CastError::InvalidControl(format!(
                "unknown button event type: {s}"
            )))
        }
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ButtonAction::Press => "PRESS",
            ButtonAction::Release => "RELEASE",
            ButtonAction::Click => "CLICK",
            ButtonAction::LongPress => "LONG_PRESS",
        };
        write!(f, "{s}")
    }
}

// ── ButtonEvent ──────────────────────────────────────────────────

/// A synthesized button event bound for the input bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    /// GPIO pin number the virtual button maps to.
    pub pin: u32,
    /// What the button did.
    pub action: ButtonAction,
}

impl ButtonEvent {
    /// Render as the wire control string, `BTN_EVENT:PIN=..,TYPE=..`.
    pub fn to_control_string(self) -> String {
        format!("BTN_EVENT:PIN={},TYPE={}", self.pin, self.action)
    }
}

/// The abstract input-event bus: button events are fire-and-forget
/// into the device application's channel.
pub type InputSink = tokio::sync::mpsc::UnboundedSender<ButtonEvent>;

// ── ControlMessage ───────────────────────────────────────────────

/// A recognized inbound control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Liveness probe; reply `pong` to the sender.
    Ping,
    /// A synthesized button event to forward.
    Button(ButtonEvent),
}

/// Reply sent for [`ControlMessage::Ping`].
pub const PONG: &str = "pong";

const BTN_EVENT_PREFIX: &str = "BTN_EVENT:";

/// Parse one inbound text message.
///
/// Returns `Ok(None)` for text that is neither a ping nor a button
/// event (ignored by design), and an error for a `BTN_EVENT` whose
/// fields cannot be parsed — the caller logs and drops it.
pub fn parse(text: &str) -> Result<Option<ControlMessage>, CastError> {
    if text == "ping" {
        return Ok(Some(ControlMessage::Ping));
    }

    let Some(fields) = text.strip_prefix(BTN_EVENT_PREFIX) else {
        return Ok(None);
    };

    let mut pin = None;
    let mut action = None;
    for field in fields.split(',') {
        if let Some(value) = field.strip_prefix("PIN=") {
            pin = Some(value.parse::<u32>().map_err(|_| {
                CastError::InvalidControl(format!("bad PIN value: {value}"))
            })?);
        } else if let Some(value) = field.strip_prefix("TYPE=") {
            action = Some(value.parse::<ButtonAction>()?);
        }
    }

    match (pin, action) {
        (Some(pin), Some(action)) => {
            Ok(Some(ControlMessage::Button(ButtonEvent { pin, action })))
        }
        _ => Err(CastError::InvalidControl(format!(
            "missing PIN or TYPE in: {text}"
        ))),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_parses() {
        assert_eq!(parse("ping").unwrap(), Some(ControlMessage::Ping));
    }

    #[test]
    fn button_event_parses() {
        let msg = parse("BTN_EVENT:PIN=2,TYPE=CLICK").unwrap();
        assert_eq!(
            msg,
            Some(ControlMessage::Button(ButtonEvent {
                pin: 2,
                action: ButtonAction::Click,
            }))
        );
    }

    #[test]
    fn type_matching_is_case_insensitive() {
        let msg = parse("BTN_EVENT:PIN=0,TYPE=long_press").unwrap();
        assert_eq!(
            msg,
            Some(ControlMessage::Button(ButtonEvent {
                pin: 0,
                action: ButtonAction::LongPress,
            }))
        );
    }

    #[test]
    fn field_order_does_not_matter() {
        let msg = parse("BTN_EVENT:TYPE=PRESS,PIN=34").unwrap();
        assert_eq!(
            msg,
            Some(ControlMessage::Button(ButtonEvent {
                pin: 34,
                action: ButtonAction::Press,
            }))
        );
    }

    #[test]
    fn bad_pin_is_an_error() {
        assert!(parse("BTN_EVENT:PIN=abc,TYPE=PRESS").is_err());
        assert!(parse("BTN_EVENT:PIN=-1,TYPE=PRESS").is_err());
    }

    #[test]
    fn unknown_type_is_an_error() {
        assert!(parse("BTN_EVENT:PIN=1,TYPE=DOUBLE_TAP").is_err());
    }

    #[test]
    fn missing_fields_are_an_error() {
        assert!(parse("BTN_EVENT:PIN=1").is_err());
        assert!(parse("BTN_EVENT:TYPE=CLICK").is_err());
        assert!(parse("BTN_EVENT:").is_err());
    }

    #[test]
    fn other_text_is_ignored() {
        assert_eq!(parse("hello").unwrap(), None);
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("PING").unwrap(), None); // ping is exact-match
    }

    #[test]
    fn control_string_roundtrip() {
        let ev = ButtonEvent {
            pin: 1,
            action: ButtonAction::Release,
        };
        let msg = parse(&ev.to_control_string()).unwrap();
        assert_eq!(msg, Some(ControlMessage::Button(ev)));
    }
}
