//! Worked request/specification pairs embedded in collaborator instructions

#[derive(Debug, Clone, Copy)]
pub struct Exemplar {
    pub request: &'static str,
    /// Structured document exactly as it is shown to the collaborator
    pub document: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ExemplarSet {
    /// Substring that selects this set; `None` for the generic fallback
    pub topic: Option<&'static str>,
    pub exemplars: &'static [Exemplar],
    /// Multi-part subjects get an extra hint asking for one component per part
    pub multi_part: bool,
}

pub static GENERIC: ExemplarSet = ExemplarSet {
    topic: None,
    exemplars: &[Exemplar {
        request: "a red ball",
        document: r##"{
  "model": {"type": "primitive", "primitive": "sphere", "scale": 1.0, "color": "#ff0000"},
  "explanation": "A single red sphere.",
  "prompt": "a smooth red ball"
}"##,
    }],
    multi_part: false,
};

/// Topic sets, checked in order.
pub static TOPICS: [ExemplarSet; 2] = [
    ExemplarSet {
        topic: Some("cat"),
        exemplars: &[Exemplar {
            request: "a sitting cat",
            document: r##"{
  "model": {
    "type": "composite",
    "components": [
      {"name": "body", "primitive": "sphere", "scale": 1.0, "color": "#a0a0a0", "offset": [0, 0, 0], "rotation": [0, 0, 0]},
      {"name": "head", "primitive": "sphere", "scale": 0.6, "color": "#a0a0a0", "offset": [0, 1.2, 0.4], "rotation": [0, 0, 0], "relation": "on top of body"},
      {"name": "left ear", "primitive": "cone", "scale": 0.25, "color": "#a0a0a0", "offset": [-0.3, 1.8, 0.4], "rotation": [0, 0, 0.3], "relation": "on head"},
      {"name": "right ear", "primitive": "cone", "scale": 0.25, "color": "#a0a0a0", "offset": [0.3, 1.8, 0.4], "rotation": [0, 0, -0.3], "relation": "on head"},
      {"name": "tail", "primitive": "cylinder", "scale": 0.2, "color": "#808080", "offset": [0, 0.2, -1.1], "rotation": [1.2, 0, 0], "relation": "behind body"}
    ]
  },
  "explanation": "A cat built from a round body, a head with two ears, and a tail.",
  "prompt": "a grey cat sitting upright"
}"##,
        }],
        multi_part: true,
    },
    ExemplarSet {
        topic: Some("elephant"),
        exemplars: &[Exemplar {
            request: "an elephant",
            document: r##"{
  "model": {
    "type": "composite",
    "components": [
      {"name": "body", "primitive": "box", "scale": 1.4, "color": "#8a8a8a", "offset": [0, 1.2, 0], "rotation": [0, 0, 0]},
      {"name": "head", "primitive": "sphere", "scale": 0.8, "color": "#8a8a8a", "offset": [1.3, 1.7, 0], "rotation": [0, 0, 0], "relation": "front of body"},
      {"name": "trunk", "primitive": "cylinder", "scale": 0.3, "color": "#7a7a7a", "offset": [1.9, 1.0, 0], "rotation": [0, 0, 0.2], "relation": "below head"},
      {"name": "front left leg", "primitive": "cylinder", "scale": 0.4, "color": "#8a8a8a", "offset": [0.6, 0.3, 0.5], "rotation": [0, 0, 0]},
      {"name": "front right leg", "primitive": "cylinder", "scale": 0.4, "color": "#8a8a8a", "offset": [0.6, 0.3, -0.5], "rotation": [0, 0, 0]},
      {"name": "back left leg", "primitive": "cylinder", "scale": 0.4, "color": "#8a8a8a", "offset": [-0.6, 0.3, 0.5], "rotation": [0, 0, 0]},
      {"name": "back right leg", "primitive": "cylinder", "scale": 0.4, "color": "#8a8a8a", "offset": [-0.6, 0.3, -0.5], "rotation": [0, 0, 0]},
      {"name": "left ear", "primitive": "torus", "scale": 0.35, "color": "#9a9a9a", "offset": [1.2, 1.9, 0.6], "rotation": [0, 1.57, 0], "relation": "side of head"},
      {"name": "right ear", "primitive": "torus", "scale": 0.35, "color": "#9a9a9a", "offset": [1.2, 1.9, -0.6], "rotation": [0, 1.57, 0], "relation": "side of head"}
    ]
  },
  "explanation": "An elephant with a boxy body, four legs, a trunk and big ears.",
  "prompt": "a grey elephant standing on four legs"
}"##,
        }],
        multi_part: true,
    },
];

pub const DECOMPOSITION_HINT: &str = "This subject has several distinct parts. Use a composite model with one named component per part (body, head, limbs, and so on), place each part with an offset relative to the body, and say how parts connect in `relation`.";

/// Pick the set whose topic occurs in the text, or the generic one.
pub fn select(user_text: &str) -> &'static ExemplarSet {
    let lower = user_text.to_lowercase();
    TOPICS
        .iter()
        .find(|set| set.topic.is_some_and(|topic| lower.contains(topic)))
        .unwrap_or(&GENERIC)
}
