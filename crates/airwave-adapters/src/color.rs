//! Color sync: a shared `#rrggbb` theme color, `{type:"color", color, nickname?}`.

use airwave_core::{Envelope, SessionError};
use airwave_session::SessionManager;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::attachment::Attachment;

/// Envelope type for color updates.
pub const COLOR: &str = "color";

/// A color change and who made it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorUpdate {
    /// Lowercase `#rrggbb`.
    pub color: String,
    /// Who set it, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

/// Normalise `#RRGGBB` to lowercase, rejecting anything else.
pub fn parse_hex_color(input: &str) -> Option<String> {
    let hex = input.trim().strip_prefix('#')?;
    (hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .then(|| format!("#{}", hex.to_ascii_lowercase()))
}

/// Tracks and sets the shared color.
pub struct ColorSyncAdapter {
    session: SessionManager,
    color: watch::Receiver<Option<ColorUpdate>>,
    _attachment: Attachment,
}

impl ColorSyncAdapter {
    /// Start tracking on `session`.
    pub fn new(session: &SessionManager) -> Self {
        let (tx, color) = watch::channel(None);
        let attachment = Attachment::new(session, move |envelope| {
            if !envelope.is(COLOR) {
                return;
            }
            let update = match envelope.decode::<ColorUpdate>() {
                Ok(update) => update,
                Err(e) => {
                    debug!(envelope_type = COLOR, error = %e, "ignoring color frame with unexpected shape");
                    return;
                }
            };
            let Some(color) = parse_hex_color(&update.color) else {
                debug!(envelope_type = COLOR, color = %update.color, "ignoring invalid color");
                return;
            };
            let _ = tx.send_replace(Some(ColorUpdate { color, ..update }));
        });
        Self {
            session: session.clone(),
            color,
            _attachment: attachment,
        }
    }

    /// Latest shared color.
    pub fn current(&self) -> Option<ColorUpdate> {
        self.color.borrow().clone()
    }

    /// Watch color changes.
    pub fn changes(&self) -> watch::Receiver<Option<ColorUpdate>> {
        self.color.clone()
    }

    /// Broadcast a new color. Accepts `#rrggbb` in either case.
    pub fn set_color(&self, color: &str) -> Result<ColorUpdate, SessionError> {
        let color = parse_hex_color(color)
            .ok_or_else(|| SessionError::InvalidInput(format!("{color:?} is not a #rrggbb color")))?;
        let update = ColorUpdate {
            color,
            nickname: self.session.identity(),
        };
        let mut envelope = Envelope::new(COLOR).with("color", update.color.as_str());
        if let Some(nickname) = &update.nickname {
            envelope = envelope.with("nickname", nickname.as_str());
        }
        self.session.send(&envelope)?;
        Ok(update)
    }
}
