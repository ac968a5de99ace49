//! Explicit color and size words in user text
//!
//! Modifiers are what the user literally asked for, so they win over
//! whatever the collaborator decided.

use serde::Serialize;

use crate::spec::{HexColor, ModelSpec, DEFAULT_SCALE};

/// Checked in this order; the first word found anywhere in the text wins,
/// regardless of where it appears.
pub const COLOR_WORDS: [(&str, &str); 6] = [
    ("red", "#ff0000"),
    ("blue", "#0000ff"),
    ("orange", "#ffa500"),
    ("green", "#00ff00"),
    ("white", "#ffffff"),
    ("black", "#000000"),
];

pub const SMALL_SCALE: f64 = 0.6;
pub const LARGE_SCALE: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modifiers {
    pub color: Option<HexColor>,
    pub size: f64,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            color: None,
            size: DEFAULT_SCALE,
        }
    }
}

pub fn extract_modifiers(text: &str) -> Modifiers {
    let lower = text.to_lowercase();

    let color = COLOR_WORDS
        .iter()
        .find(|(word, _)| lower.contains(*word))
        .map(|&(_, hex)| HexColor::from_static(hex));

    // Later rules override earlier ones
    let mut size = DEFAULT_SCALE;
    if lower.contains("small") {
        size = SMALL_SCALE;
    }
    if lower.contains("large") {
        size = LARGE_SCALE;
    }

    Modifiers { color, size }
}

impl Modifiers {
    /// Color always overrides. Size only fills in where the model left the
    /// default scale; composites are handled per component.
    pub fn apply(&self, model: ModelSpec) -> ModelSpec {
        match model {
            ModelSpec::Primitive(mut primitive) => {
                self.apply_to(&mut primitive.color, &mut primitive.scale);
                ModelSpec::Primitive(primitive)
            }
            ModelSpec::Composite(mut composite) => {
                for part in &mut composite.components {
                    self.apply_to(&mut part.color, &mut part.scale);
                }
                ModelSpec::Composite(composite)
            }
        }
    }

    fn apply_to(&self, color: &mut HexColor, scale: &mut f64) {
        if let Some(override_color) = &self.color {
            *color = override_color.clone();
        }
        if is_default_scale(*scale) {
            *scale = self.size;
        }
    }
}

fn is_default_scale(scale: f64) -> bool {
    (scale - DEFAULT_SCALE).abs() < f64::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Component, CompositeSpec, PrimitiveKind};
    use pretty_assertions::assert_eq;

    fn hex(s: &str) -> HexColor {
        HexColor::parse(s).unwrap()
    }

    #[test]
    fn test_color_words() {
        assert_eq!(extract_modifiers("a RED ball").color, Some(hex("#ff0000")));
        assert_eq!(extract_modifiers("Green hat").color, Some(hex("#00ff00")));
        assert_eq!(extract_modifiers("a ball").color, None);
    }

    #[test]
    fn test_color_tie_break_follows_vocabulary_order() {
        // "blue" appears first in the text but "red" is earlier in the table
        assert_eq!(extract_modifiers("blue and red").color, Some(hex("#ff0000")));
        assert_eq!(extract_modifiers("black or orange").color, Some(hex("#ffa500")));
    }

    #[test]
    fn test_size_words() {
        assert_eq!(extract_modifiers("a cube").size, 1.0);
        assert_eq!(extract_modifiers("a small cube").size, SMALL_SCALE);
        assert_eq!(extract_modifiers("a LARGE cube").size, LARGE_SCALE);
        assert_eq!(extract_modifiers("large, no, small cube").size, LARGE_SCALE);
    }

    #[test]
    fn test_color_overrides_model_regardless_of_scale() {
        let modifiers = extract_modifiers("make it large blue");
        let model = ModelSpec::primitive(PrimitiveKind::Sphere, 3.0, hex("#000000"));

        let ModelSpec::Primitive(result) = modifiers.apply(model) else {
            panic!("expected primitive");
        };
        assert_eq!(result.color, hex("#0000ff"));
        assert_eq!(result.scale, 3.0);
    }

    #[test]
    fn test_size_fills_default_scale_only() {
        let modifiers = extract_modifiers("small");
        let model = ModelSpec::primitive(PrimitiveKind::Box, 1.0, hex("#123456"));
        assert_eq!(
            modifiers.apply(model),
            ModelSpec::primitive(PrimitiveKind::Box, SMALL_SCALE, hex("#123456"))
        );
    }

    #[test]
    fn test_applies_to_each_component() {
        let part = |scale| Component {
            name: "part".into(),
            primitive: PrimitiveKind::Cone,
            scale,
            color: hex("#111111"),
            offset: [0.0; 3],
            rotation: [0.0; 3],
            relation: None,
            metadata: None,
        };
        let model = ModelSpec::Composite(CompositeSpec {
            components: vec![part(1.0), part(0.25)],
        });

        let ModelSpec::Composite(result) = extract_modifiers("large white").apply(model) else {
            panic!("expected composite");
        };
        assert_eq!(result.components[0].scale, LARGE_SCALE);
        assert_eq!(result.components[1].scale, 0.25);
        assert!(result.components.iter().all(|c| c.color == hex("#ffffff")));
    }
}
