//! Per-design undo/redo over model snapshots
//!
//! A historical state lives in exactly one place: the design's current
//! model, `past`, or `future`. Every operation moves states between those
//! three slots and never copies one.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::Design;
use crate::spec::ModelSpec;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStack {
    /// Most recent last
    pub past: Vec<ModelSpec>,
    /// Next redo last
    pub future: Vec<ModelSpec>,
}

impl HistoryStack {
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn depth(&self) -> (usize, usize) {
        (self.past.len(), self.future.len())
    }
}

/// Install `model`, snapshotting the current one and dropping redo states.
pub fn push(mut design: Design, model: ModelSpec) -> Design {
    if let Some(current) = design.model.take() {
        design.history.past.push(current);
    }
    design.history.future.clear();
    design.model = Some(model);
    debug!("History push on design {} (past={})", design.id, design.history.past.len());
    design
}

pub fn undo(mut design: Design) -> Design {
    let Some(previous) = design.history.past.pop() else {
        return design;
    };
    if let Some(current) = design.model.replace(previous) {
        design.history.future.push(current);
    }
    debug!("Undo on design {} {:?}", design.id, design.history.depth());
    design
}

pub fn redo(mut design: Design) -> Design {
    let Some(next) = design.history.future.pop() else {
        return design;
    };
    if let Some(current) = design.model.replace(next) {
        design.history.past.push(current);
    }
    debug!("Redo on design {} {:?}", design.id, design.history.depth());
    design
}
