//! Instruction text for the chat collaborator

use minijinja::{context, Environment};
use serde::Serialize;

use crate::exemplars::{self, DECOMPOSITION_HINT};
use crate::spec::ModelSpec;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for interactive 3D design. \
You turn user requests into declarative model specifications. \
Always answer with one short sentence followed by exactly one ```json block that follows the schema you are given.";

pub const SCHEMA_DESCRIPTION: &str = r##"{
  "model": {
    "type": "primitive",
    "primitive": "sphere" | "box" | "cylinder" | "cone" | "torus",
    "scale": number,
    "color": "#RRGGBB"
  }
  OR
  "model": {
    "type": "composite",
    "components": [
      {
        "name": string,
        "primitive": "sphere" | "box" | "cylinder" | "cone" | "torus",
        "scale": number,
        "color": "#RRGGBB",
        "offset": [x, y, z],
        "rotation": [x, y, z],
        "relation": string (optional),
        "metadata": object (optional)
      }
    ]
  },
  "explanation": string,
  "prompt": string (optional, a refined one-line restatement of the request)
}"##;

pub const RULES: [&str; 5] = [
    "`model.type` must be \"primitive\" or \"composite\".",
    "`primitive` must be one of sphere, box, cylinder, cone, torus.",
    "`scale` must be a number (1.0 is the normal size).",
    "`color` must be a 6-digit hex color such as \"#ff8800\".",
    "Every component needs `offset` and `rotation` arrays of exactly three numbers; rotation is in radians.",
];

const INSTRUCTION_TEMPLATE: &str = r##"Describe the requested object as a model specification.

Schema:
{{ schema }}

Rules:
{% for rule in rules %}- {{ rule }}
{% endfor %}
Examples:
{% for exemplar in exemplars %}
Request: "{{ exemplar.request }}"
```json
{{ exemplar.document }}
```
{% endfor %}
{% if hint %}
Hint: {{ hint }}
{% endif %}
{% if current_model %}
The current model is below. Modify it to satisfy the request instead of starting over.
```json
{{ current_model }}
```
{% endif %}
User request: "{{ user_text }}"

Reply with one short sentence, then exactly one ```json block."##;

const CORRECTION_TEMPLATE: &str = r##"Your previous reply could not be used: it did not contain a ```json block that satisfies the schema.
{% if failed_reply %}
Previous reply:
{{ failed_reply }}
{% endif %}
Schema:
{{ schema }}

Rules:
{% for rule in rules %}- {{ rule }}
{% endfor %}
Original user request: "{{ user_text }}"

Reply again with one short sentence, then exactly one ```json block that follows every rule."##;

/// Longest slice of a failed reply echoed back in a correction.
const FAILED_REPLY_LIMIT: usize = 1500;

#[derive(Serialize)]
struct ExemplarContext {
    request: &'static str,
    document: &'static str,
}

/// Primary instruction for a request with no current model.
pub fn compose(user_text: &str) -> Result<String, minijinja::Error> {
    compose_refinement(user_text, None)
}

/// Primary instruction, carrying the current model when one exists so the
/// collaborator edits instead of replacing.
pub fn compose_refinement(
    user_text: &str,
    current: Option<&ModelSpec>,
) -> Result<String, minijinja::Error> {
    let set = exemplars::select(user_text);
    let exemplars: Vec<ExemplarContext> = set
        .exemplars
        .iter()
        .map(|e| ExemplarContext {
            request: e.request,
            document: e.document,
        })
        .collect();
    let current_model = current
        .map(|model| serde_json::to_string_pretty(&model.to_document()))
        .transpose()
        .map_err(|e| {
            minijinja::Error::new(minijinja::ErrorKind::BadSerialization, e.to_string())
        })?;

    let mut env = Environment::new();
    env.add_template("instruction", INSTRUCTION_TEMPLATE)?;
    env.get_template("instruction")?.render(context! {
        schema => SCHEMA_DESCRIPTION,
        rules => RULES,
        exemplars => exemplars,
        hint => set.multi_part.then_some(DECOMPOSITION_HINT),
        current_model => current_model,
        user_text => user_text,
    })
}

/// Follow-up instruction after a reply failed extraction or validation.
pub fn compose_correction(
    user_text: &str,
    failed_reply: Option<&str>,
) -> Result<String, minijinja::Error> {
    let failed_reply = failed_reply.map(|reply| truncate_chars(reply.trim(), FAILED_REPLY_LIMIT));

    let mut env = Environment::new();
    env.add_template("correction", CORRECTION_TEMPLATE)?;
    env.get_template("correction")?.render(context! {
        schema => SCHEMA_DESCRIPTION,
        rules => RULES,
        failed_reply => failed_reply,
        user_text => user_text,
    })
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exemplars::{GENERIC, TOPICS};
    use crate::spec::{HexColor, PrimitiveKind};

    #[test]
    fn test_elephant_gets_its_exemplars_and_hint() {
        let text = compose("a big elephant").unwrap();
        assert!(text.contains(TOPICS[1].exemplars[0].document));
        assert!(text.contains(DECOMPOSITION_HINT));
        assert!(!text.contains(GENERIC.exemplars[0].document));
        assert!(text.contains("User request: \"a big elephant\""));
    }

    #[test]
    fn test_unknown_subject_uses_generic_exemplar_only() {
        let text = compose("a teapot").unwrap();
        assert!(text.contains(GENERIC.exemplars[0].document));
        assert!(!text.contains(DECOMPOSITION_HINT));
        for set in &TOPICS {
            assert!(!text.contains(set.exemplars[0].document));
        }
    }

    #[test]
    fn test_compose_is_deterministic_and_embeds_rules() {
        let first = compose("a cat").unwrap();
        assert_eq!(first, compose("a cat").unwrap());
        assert!(first.contains(SCHEMA_DESCRIPTION));
        for rule in RULES {
            assert!(first.contains(rule));
        }
    }

    #[test]
    fn test_refinement_embeds_current_model() {
        let current = ModelSpec::primitive(PrimitiveKind::Box, 2.0, HexColor::parse("#abcdef").unwrap());
        let text = compose_refinement("make it rounder", Some(&current)).unwrap();
        assert!(text.contains("\"#abcdef\""));
        assert!(!compose("make it rounder").unwrap().contains("The current model"));
    }

    #[test]
    fn test_correction_references_failure_and_request() {
        let text = compose_correction("a small red cube", Some("Here is a cube!")).unwrap();
        assert!(text.contains("Here is a cube!"));
        assert!(text.contains("Original user request: \"a small red cube\""));

        let long = "x".repeat(FAILED_REPLY_LIMIT + 10);
        let text = compose_correction("a cube", Some(&long)).unwrap();
        assert!(!text.contains(&long));
    }
}
