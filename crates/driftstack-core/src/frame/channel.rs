use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One scalar plane of an [`Image`](super::Image).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Gray,
    Luminance,
    Alpha,
}

impl Channel {
    pub const RGB: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Red => "Red",
            Channel::Green => "Green",
            Channel::Blue => "Blue",
            Channel::Gray => "Gray",
            Channel::Luminance => "Luminance",
            Channel::Alpha => "Alpha",
        };
        f.write_str(name)
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" | "r" => Ok(Channel::Red),
            "green" | "g" => Ok(Channel::Green),
            "blue" | "b" => Ok(Channel::Blue),
            "gray" | "grey" => Ok(Channel::Gray),
            "luminance" | "l" => Ok(Channel::Luminance),
            "alpha" | "a" => Ok(Channel::Alpha),
            other => Err(format!("unknown channel '{other}'")),
        }
    }
}
