//! Address parsing and formatting.
//!
//! Grammar:
//!   <component-ref>.<attribute-name>
//! - The split happens on the LAST unescaped '.'; `\.` escapes a literal dot
//!   and `\\` escapes a backslash on either side.
//! - `component-ref` is a stack index when it is all digits, otherwise a
//!   component label.
//!
//! Examples:
//!   "0.Hand"            -> index 0, attribute "Hand"
//!   "Left Arm.Hand"     -> label "Left Arm", attribute "Hand"
//!   "v1\.2 Arm.Hand"    -> label "v1.2 Arm", attribute "Hand"

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// How the owning component is located within the stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentRef {
    /// Position in the stack, zero-based.
    Index(usize),
    /// Unique component label.
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub component: ComponentRef,
    pub attribute: String,
}

impl Address {
    pub fn new(component: ComponentRef, attribute: impl Into<String>) -> Self {
        Self {
            component,
            attribute: attribute.into(),
        }
    }

    pub fn index(index: usize, attribute: impl Into<String>) -> Self {
        Self::new(ComponentRef::Index(index), attribute)
    }

    pub fn label(label: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::new(ComponentRef::Label(label.into()), attribute)
    }

    /// Parse an address string according to the grammar described above.
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("empty address".to_string());
        }
        let split = last_unescaped_dot(s)
            .ok_or_else(|| format!("invalid address '{s}': no attribute separator"))?;
        let raw_ref = &s[..split];
        let raw_attr = &s[split + 1..];
        if raw_ref.is_empty() {
            return Err(format!("invalid address '{s}': empty component reference"));
        }
        if raw_attr.is_empty() {
            return Err(format!("invalid address '{s}': empty attribute name"));
        }
        let component_ref = unescape(raw_ref)?;
        let attribute = unescape(raw_attr)?;
        let component = if component_ref.chars().all(|c| c.is_ascii_digit()) {
            let index = component_ref
                .parse::<usize>()
                .map_err(|_| format!("invalid address '{s}': index out of range"))?;
            ComponentRef::Index(index)
        } else {
            ComponentRef::Label(component_ref)
        };
        Ok(Address {
            component,
            attribute,
        })
    }
}

/// Byte offset of the last '.' not preceded by an active escape.
fn last_unescaped_dot(s: &str) -> Option<usize> {
    let mut last = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '.' => last = Some(i),
            _ => {}
        }
    }
    last
}

fn unescape(s: &str) -> Result<String, String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('.' | '\\')) => out.push(next),
                Some(other) => {
                    return Err(format!("invalid escape sequence '\\{other}'"));
                }
                None => return Err("dangling escape at end of address".to_string()),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '.' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            ComponentRef::Index(i) => write!(f, "{i}")?,
            ComponentRef::Label(label) => f.write_str(&escape(label))?,
        }
        write!(f, ".{}", escape(&self.attribute))
    }
}

impl FromStr for Address {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

// Serde support: serialize as string, deserialize from string
impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Address, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(de::Error::custom)
    }
}
