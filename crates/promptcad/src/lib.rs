//! promptcad: conversational design of simple 3D models
//!
//! This crate provides:
//! - The declarative model specification and its validator
//! - Instruction composition and a bounded two-call refinement protocol
//!   against an external chat collaborator
//! - Lexical color/size modifiers that override collaborator output
//! - Geometry synthesis, merged STL export and schematic export
//! - Per-design undo/redo and a session store owning every design
//!
//! The chat collaborator is only seen through [`ChatClient`]; everything
//! downstream of its reply is validated before it reaches a design.

pub mod chat;
pub mod exemplars;
pub mod export;
pub mod extract;
pub mod history;
pub mod mesh;
pub mod modifiers;
pub mod prompt;
pub mod refine;
pub mod session;
pub mod spec;
pub mod synth;
pub mod validate;

pub use chat::{ChatClient, ChatConfig, ChatError, ChatRequest, ChatTurn, HttpChatClient};
pub use export::{export_schematic, export_stl, ExportError};
pub use extract::extract_document;
pub use history::HistoryStack;
pub use mesh::{MeshConfig, MeshData};
pub use modifiers::{extract_modifiers, Modifiers};
pub use refine::{Interpretation, RefineConfig, RefineError, Refiner, Resolution};
pub use session::{Design, DesignId, DesignSessionStore, Message, Role, SessionError};
pub use spec::{Component, CompositeSpec, HexColor, ModelSpec, ParsedSpec, PrimitiveKind, PrimitiveSpec, SpecError};
pub use synth::{merge_for_export, synthesize, Scene};
pub use validate::validate;

use serde_json::{json, Value};

/// Parse a model from JSON text. Accepts a full document (`{"model": ...}`)
/// or a bare model object.
pub fn load_model(json: &str) -> Result<ModelSpec, SpecError> {
    let value: Value = serde_json::from_str(json)?;
    let document = if value.get("model").is_some() {
        value
    } else {
        json!({ "model": value })
    };
    Ok(ParsedSpec::from_document(&document)?.model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_model_accepts_document_or_bare_model() {
        let bare = r##"{"type": "primitive", "primitive": "cone", "scale": 1, "color": "#00ff00"}"##;
        let wrapped = format!(r#"{{"model": {bare}, "explanation": "a cone"}}"#);
        assert_eq!(load_model(bare).unwrap(), load_model(&wrapped).unwrap());
    }

    #[test]
    fn test_load_model_rejects_invalid() {
        assert!(matches!(load_model("{not json"), Err(SpecError::Decode(_))));
        assert!(matches!(
            load_model(r##"{"type": "primitive", "primitive": "cube", "scale": 1, "color": "#000000"}"##),
            Err(SpecError::Invalid)
        ));
    }
}
