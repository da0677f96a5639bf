//! Tagged command variants understood by display units.
//!
//! Commands are kept typed until the protocol boundary, where
//! [`Display`](std::fmt::Display) produces the verb text that follows the
//! device identifier in a command frame.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A command addressed to a display unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceCommand {
    /// Load a 3D model, optionally repeated or looped.
    Model {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repeat: Option<u32>,
        #[serde(default, rename = "loop")]
        looping: bool,
    },
    /// Play a video.
    Video { url: String },
    /// Stop the current video.
    StopVideo,
    /// Set the rotation speed.
    Rpm { value: f64 },
    /// Set the phase angle in degrees.
    Phase { degrees: i32 },
    /// Set the light intensity.
    Light { value: f64 },
    /// Reset the animation.
    Reset,
}

impl DeviceCommand {
    /// Model command without repeat or loop.
    pub fn model(url: impl Into<String>) -> Self {
        Self::Model {
            url: url.into(),
            repeat: None,
            looping: false,
        }
    }

    /// Wire verb of this command.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Model { .. } => "model",
            Self::Video { .. } => "video",
            Self::StopVideo => "stop_video",
            Self::Rpm { .. } => "rpm",
            Self::Phase { .. } => "phase",
            Self::Light { .. } => "light",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = self.verb();
        match self {
            Self::Model {
                url,
                repeat,
                looping,
            } => {
                write!(f, "{verb} {url}")?;
                if let Some(n) = repeat {
                    write!(f, " repeat={n}")?;
                }
                if *looping {
                    write!(f, " loop")?;
                }
                Ok(())
            }
            Self::Video { url } => write!(f, "{verb} {url}"),
            Self::Rpm { value } | Self::Light { value } => write!(f, "{verb} {value}"),
            Self::Phase { degrees } => write!(f, "{verb} {degrees}"),
            Self::StopVideo | Self::Reset => f.write_str(verb),
        }
    }
}

impl From<DeviceCommand> for String {
    fn from(cmd: DeviceCommand) -> Self {
        cmd.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_variants() {
        assert_eq!(
            DeviceCommand::model("http://x/cube.glb").to_string(),
            "model http://x/cube.glb"
        );
        let repeat = DeviceCommand::Model {
            url: "http://x/cube.glb".into(),
            repeat: Some(3),
            looping: false,
        };
        assert_eq!(repeat.to_string(), "model http://x/cube.glb repeat=3");
        let looped = DeviceCommand::Model {
            url: "http://x/cube.glb".into(),
            repeat: None,
            looping: true,
        };
        assert_eq!(looped.to_string(), "model http://x/cube.glb loop");
    }

    #[test]
    fn scalar_variants() {
        assert_eq!(DeviceCommand::Rpm { value: 450.0 }.to_string(), "rpm 450");
        assert_eq!(DeviceCommand::Light { value: 1.5 }.to_string(), "light 1.5");
        assert_eq!(DeviceCommand::Phase { degrees: 90 }.to_string(), "phase 90");
    }

    #[test]
    fn bare_verbs() {
        assert_eq!(DeviceCommand::StopVideo.to_string(), "stop_video");
        assert_eq!(DeviceCommand::Reset.to_string(), "reset");
        assert_eq!(
            DeviceCommand::Video {
                url: "http://x/a.ogv".into()
            }
            .to_string(),
            "video http://x/a.ogv"
        );
    }

    #[test]
    fn serde_tagging() {
        let json = serde_json::to_value(DeviceCommand::Phase { degrees: 45 }).unwrap();
        assert_eq!(json["type"], "phase");
        assert_eq!(json["degrees"], 45);

        let back: DeviceCommand =
            serde_json::from_str(r#"{"type":"model","url":"u","loop":true}"#).unwrap();
        assert_eq!(
            back,
            DeviceCommand::Model {
                url: "u".into(),
                repeat: None,
                looping: true
            }
        );
    }
}
