//! Schema validation for untyped structured documents
//!
//! This is the trust boundary between the collaborator's free-form output
//! and the rest of the crate. It never panics and never errors: anything
//! that does not match the schema is simply `false`.

use serde_json::Value;

use crate::spec::{is_hex_color, PrimitiveKind};

/// Check a `{"model": ...}` document against the model schema.
pub fn validate(candidate: &Value) -> bool {
    let Some(model) = candidate.get("model") else {
        return false;
    };

    match model.get("type").and_then(Value::as_str) {
        Some("primitive") => has_solid_fields(model),
        Some("composite") => model
            .get("components")
            .and_then(Value::as_array)
            .is_some_and(|components| components.iter().all(is_valid_component)),
        _ => false,
    }
}

/// Kind, scale and color: the rules shared by primitives and components.
fn has_solid_fields(value: &Value) -> bool {
    let kind_ok = value
        .get("primitive")
        .and_then(Value::as_str)
        .is_some_and(|kind| kind.parse::<PrimitiveKind>().is_ok());
    let scale_ok = value.get("scale").is_some_and(Value::is_number);
    let color_ok = value
        .get("color")
        .and_then(Value::as_str)
        .is_some_and(is_hex_color);

    kind_ok && scale_ok && color_ok
}

fn is_valid_component(component: &Value) -> bool {
    has_solid_fields(component)
        && is_vec3(component.get("offset"))
        && is_vec3(component.get("rotation"))
}

fn is_vec3(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_array)
        .is_some_and(|items| items.len() == 3 && items.iter().all(Value::is_number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component() -> Value {
        json!({
            "name": "leg",
            "primitive": "cylinder",
            "scale": 0.4,
            "color": "#654321",
            "offset": [0.5, -1.0, 0.25],
            "rotation": [0.0, 0.0, 0.0]
        })
    }

    #[test]
    fn test_primitive_rules() {
        for kind in ["sphere", "box", "cylinder", "cone", "torus"] {
            let doc = json!({"model": {"type": "primitive", "primitive": kind, "scale": 1, "color": "#00FF00"}});
            assert!(validate(&doc), "{kind} should be accepted");
        }

        let bad = [
            json!({"model": {"type": "primitive", "primitive": "cube", "scale": 1, "color": "#00ff00"}}),
            json!({"model": {"type": "primitive", "primitive": "box", "scale": "1", "color": "#00ff00"}}),
            json!({"model": {"type": "primitive", "primitive": "box", "color": "#00ff00"}}),
            json!({"model": {"type": "primitive", "primitive": "box", "scale": 1, "color": "green"}}),
            json!({"model": {"type": "primitive", "primitive": "box", "scale": 1, "color": "#00ff00 "}}),
            json!({"model": {"type": "primitive", "primitive": "box", "scale": 1, "color": "#0f0"}}),
        ];
        for doc in bad {
            assert!(!validate(&doc), "{doc} should be rejected");
        }
    }

    #[test]
    fn test_missing_or_unknown_model() {
        assert!(!validate(&json!({})));
        assert!(!validate(&json!({"model": null})));
        assert!(!validate(&json!({"model": {"type": "mesh"}})));
        assert!(!validate(&json!("not an object")));
        assert!(!validate(&json!({"primitive": "box", "scale": 1, "color": "#000000"})));
    }

    #[test]
    fn test_composite_rules() {
        assert!(validate(&json!({"model": {"type": "composite", "components": []}})));
        assert!(validate(
            &json!({"model": {"type": "composite", "components": [component(), component()]}})
        ));
        assert!(!validate(&json!({"model": {"type": "composite"}})));
        assert!(!validate(&json!({"model": {"type": "composite", "components": {}}})));

        let mut short_offset = component();
        short_offset["offset"] = json!([1.0, 2.0]);
        assert!(!validate(
            &json!({"model": {"type": "composite", "components": [component(), short_offset]}})
        ));

        let mut text_rotation = component();
        text_rotation["rotation"] = json!([0, "90deg", 0]);
        assert!(!validate(
            &json!({"model": {"type": "composite", "components": [text_rotation]}})
        ));

        let mut bad_color = component();
        bad_color["color"] = json!("#12345G");
        assert!(!validate(&json!({"model": {"type": "composite", "components": [bad_color]}})));
    }

    #[test]
    fn test_advisory_fields_are_not_checked() {
        let mut part = component();
        part["relation"] = json!(42);
        part["metadata"] = json!(["anything"]);
        part.as_object_mut().unwrap().remove("name");
        assert!(validate(&json!({"model": {"type": "composite", "components": [part]}})));
    }
}
