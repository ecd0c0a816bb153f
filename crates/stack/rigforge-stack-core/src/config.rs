//! Shared rig configuration: naming convention and component taxonomy.
//!
//! One `Config` is owned by the stack and shared by reference across every
//! component in it. Read-mostly by contract; mutating naming state while a
//! build is running is undefined behavior and must be avoided by the caller.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Middle,
}

/// Classification taxonomy used by registry identifiers, e.g.
/// "Standard : Arm" or "Augment : Twister".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Standard,
    Augment,
    Utility,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Standard => "Standard",
            Classification::Augment => "Augment",
            Classification::Utility => "Utility",
        }
    }

    /// Build a registry identifier from this classification and a name.
    pub fn qualify(&self, name: &str) -> String {
        format!("{} : {}", self.as_str(), name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Token separator inside generated node names.
    pub separator: String,
    /// Side tokens prefixed onto generated names.
    pub side_left: String,
    pub side_right: String,
    pub side_middle: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            side_left: "L".to_string(),
            side_right: "R".to_string(),
            side_middle: "M".to_string(),
        }
    }
}

impl Config {
    pub fn side_token(&self, side: Side) -> &str {
        match side {
            Side::Left => &self.side_left,
            Side::Right => &self.side_right,
            Side::Middle => &self.side_middle,
        }
    }

    /// Format a node name from optional side, component label and role,
    /// e.g. `("L", "Arm", "ik_ctl") -> "L_Arm_ik_ctl"`.
    pub fn format_name(&self, side: Option<Side>, label: &str, role: &str) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(side) = side {
            parts.push(self.side_token(side));
        }
        parts.push(label);
        parts.push(role);
        parts.join(&self.separator)
    }

    /// Parse a side from a user-facing location option value ("Left", "L", …).
    pub fn parse_side(&self, raw: &str) -> Option<Side> {
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "left" | "l" => Some(Side::Left),
            "right" | "r" => Some(Side::Right),
            "middle" | "m" | "mid" | "center" => Some(Side::Middle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_formatting() {
        let cfg = Config::default();
        assert_eq!(
            cfg.format_name(Some(Side::Left), "Arm", "ik_ctl"),
            "L_Arm_ik_ctl"
        );
        assert_eq!(cfg.format_name(None, "Root", "ctl"), "Root_ctl");
    }

    #[test]
    fn qualify_identifiers() {
        assert_eq!(Classification::Standard.qualify("Arm"), "Standard : Arm");
        assert_eq!(
            Classification::Augment.qualify("Twister"),
            "Augment : Twister"
        );
    }

    #[test]
    fn side_parsing() {
        let cfg = Config::default();
        assert_eq!(cfg.parse_side("Left"), Some(Side::Left));
        assert_eq!(cfg.parse_side("r"), Some(Side::Right));
        assert_eq!(cfg.parse_side("nowhere"), None);
    }
}
