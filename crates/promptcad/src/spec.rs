//! Model specification types matching the collaborator wire format
//!
//! A structured document always carries a `model` object tagged by `type`:
//!
//! ```json
//! {"model": {"type": "primitive", "primitive": "box", "scale": 1.0, "color": "#ff0000"}}
//! ```
//!
//! Documents come from an untrusted generator, so the only way to obtain a
//! [`ParsedSpec`] is through [`ParsedSpec::from_document`], which runs the
//! validator before any typed decoding happens.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::validate::validate;

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("hex color pattern compiles"));

/// Scale a model gets when nothing says otherwise
pub const DEFAULT_SCALE: f64 = 1.0;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("document does not satisfy the model schema")]
    Invalid,

    #[error("invalid color '{0}': expected #RRGGBB")]
    InvalidColor(String),

    #[error("unknown primitive '{0}'")]
    UnknownPrimitive(String),

    #[error("failed to decode model: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The five recognized solids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Sphere,
    Box,
    Cylinder,
    Cone,
    Torus,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 5] = [
        PrimitiveKind::Sphere,
        PrimitiveKind::Box,
        PrimitiveKind::Cylinder,
        PrimitiveKind::Cone,
        PrimitiveKind::Torus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Sphere => "sphere",
            PrimitiveKind::Box => "box",
            PrimitiveKind::Cylinder => "cylinder",
            PrimitiveKind::Cone => "cone",
            PrimitiveKind::Torus => "torus",
        }
    }
}

impl FromStr for PrimitiveKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PrimitiveKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SpecError::UnknownPrimitive(s.to_string()))
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `#RRGGBB` color, kept exactly as written
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    pub fn parse(value: &str) -> Result<Self, SpecError> {
        if is_hex_color(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(SpecError::InvalidColor(value.to_string()))
        }
    }

    /// For compile-time vocabulary entries that are known to match the pattern.
    pub(crate) fn from_static(value: &'static str) -> Self {
        debug_assert!(is_hex_color(value), "bad color constant {value}");
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Linear 0..1 channels
    pub fn rgb(&self) -> [f32; 3] {
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&self.0[range], 16).map_or(0.0, |c| c as f32 / 255.0)
        };
        [channel(1..3), channel(3..5), channel(5..7)]
    }
}

impl TryFrom<String> for HexColor {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_hex_color(&value) {
            Ok(Self(value))
        } else {
            Err(SpecError::InvalidColor(value))
        }
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR.is_match(value)
}

/// A single solid at the origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveSpec {
    pub primitive: PrimitiveKind,
    pub scale: f64,
    pub color: HexColor,
}

/// One part of a composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    pub primitive: PrimitiveKind,
    pub scale: f64,
    pub color: HexColor,
    pub offset: [f64; 3],
    /// Euler angles in radians, applied X then Y then Z about local axes
    pub rotation: [f64; 3],
    /// Free-form hint such as "attached to body"; never checked
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSpec {
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSpec {
    Primitive(PrimitiveSpec),
    Composite(CompositeSpec),
}

impl ModelSpec {
    pub fn primitive(kind: PrimitiveKind, scale: f64, color: HexColor) -> Self {
        ModelSpec::Primitive(PrimitiveSpec {
            primitive: kind,
            scale,
            color,
        })
    }

    /// Representative scale: the primitive's own, or the first component's.
    pub fn scale(&self) -> Option<f64> {
        match self {
            ModelSpec::Primitive(p) => Some(p.scale),
            ModelSpec::Composite(c) => c.components.first().map(|part| part.scale),
        }
    }

    /// Representative color, chosen the same way as [`ModelSpec::scale`].
    pub fn color(&self) -> Option<&HexColor> {
        match self {
            ModelSpec::Primitive(p) => Some(&p.color),
            ModelSpec::Composite(c) => c.components.first().map(|part| &part.color),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, ModelSpec::Composite(_))
    }

    /// Wrap in a `{"model": ...}` document, the shape the validator checks.
    pub fn to_document(&self) -> Value {
        serde_json::json!({ "model": self })
    }

    pub fn is_valid(&self) -> bool {
        validate(&self.to_document())
    }
}

/// A validated structured reply from the collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSpec {
    pub model: ModelSpec,
    pub explanation: Option<String>,
    /// Refined restatement of the request, when the collaborator offers one
    pub prompt: Option<String>,
}

impl ParsedSpec {
    /// Validate an untyped document and decode it. Rejected documents never
    /// produce a partially-typed value.
    pub fn from_document(document: &Value) -> Result<Self, SpecError> {
        if !validate(document) {
            return Err(SpecError::Invalid);
        }

        let model: ModelSpec = serde_json::from_value(document["model"].clone())?;
        let text_field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| document.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(String::from)
        };

        Ok(ParsedSpec {
            model,
            explanation: text_field(&["explanation", "message"]),
            prompt: text_field(&["prompt"]),
        })
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_optional_string(deserializer)?.unwrap_or_default())
}

// Advisory fields are not part of the schema contract, so anything that is
// not a string is dropped rather than rejected.
fn lenient_optional_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        _ => None,
    })
}
