//! Design session store
//!
//! Owns every design, its conversation, and which design is active. All
//! mutation goes through update-by-id methods that hand back snapshots, so
//! callers never hold a reference into the store across an await point.
//!
//! An interpretation is split in two so a server can release its lock
//! while the chat collaborator is working:
//!
//! ```text
//! begin_interpretation  -> PendingTurn     (marks the design busy)
//! Refiner::interpret    -> Interpretation  (no store access)
//! complete_interpretation(pending, result) (commits or discards, clears busy)
//! ```

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::history::{self, HistoryStack};
use crate::refine::{Interpretation, RefineError, Refiner, Resolution};
use crate::spec::ModelSpec;

pub const INITIAL_ACKNOWLEDGEMENT: &str = "I'll help you create that! Let me generate the 3D model...";

pub type DesignId = u64;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("design {0} not found")]
    NotFound(DesignId),

    #[error("design {0} already has an interpretation in flight")]
    Busy(DesignId),

    #[error("message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Refine(#[from] RefineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(id: u64, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    pub id: DesignId,
    pub name: String,
    pub messages: Vec<Message>,
    pub model: Option<ModelSpec>,
    pub refined_prompt: String,
    pub history: HistoryStack,
    pub created_at: DateTime<Utc>,
}

impl Design {
    pub fn new(id: DesignId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            messages: Vec::new(),
            model: None,
            refined_prompt: String::new(),
            history: HistoryStack::default(),
            created_at: Utc::now(),
        }
    }
}

/// Everything an interpretation needs, captured when it starts
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub design_id: DesignId,
    pub text: String,
    pub previous: Option<ModelSpec>,
    pub history: Vec<Message>,
    /// False when the user message was already seeded at creation
    append_user: bool,
}

#[derive(Debug, Clone)]
pub struct CompletedTurn {
    pub design: Design,
    pub resolution: Resolution,
    pub calls: usize,
}

#[derive(Debug, Default)]
pub struct DesignSessionStore {
    designs: BTreeMap<DesignId, Design>,
    active: Option<DesignId>,
    in_flight: HashSet<DesignId>,
    next_design_id: DesignId,
    next_message_id: u64,
}

impl DesignSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a design and make it active. With an initial prompt the
    /// conversation is seeded with the request and an acknowledgement;
    /// follow with [`Self::begin_initial_interpretation`].
    pub fn create_design(&mut self, initial_prompt: Option<&str>) -> Design {
        self.next_design_id += 1;
        let id = self.next_design_id;
        let mut design = Design::new(id, format!("Design {}", self.designs.len() + 1));

        if let Some(prompt) = initial_prompt.map(str::trim).filter(|p| !p.is_empty()) {
            let user = self.message(Role::User, prompt);
            let ack = self.message(Role::Assistant, INITIAL_ACKNOWLEDGEMENT);
            design.messages.extend([user, ack]);
        }

        info!("Created {} (id={})", design.name, id);
        self.designs.insert(id, design.clone());
        self.active = Some(id);
        design
    }

    /// Remove a design. If it was active, the first remaining design
    /// becomes active.
    pub fn delete_design(&mut self, id: DesignId) -> Result<Design, SessionError> {
        let removed = self.designs.remove(&id).ok_or(SessionError::NotFound(id))?;
        self.in_flight.remove(&id);
        if self.active == Some(id) {
            self.active = self.designs.keys().next().copied();
        }
        info!("Deleted {} (id={}), active={:?}", removed.name, id, self.active);
        Ok(removed)
    }

    pub fn set_active(&mut self, id: DesignId) -> Result<&Design, SessionError> {
        let design = self.designs.get(&id).ok_or(SessionError::NotFound(id))?;
        self.active = Some(id);
        Ok(design)
    }

    pub fn design(&self, id: DesignId) -> Result<&Design, SessionError> {
        self.designs.get(&id).ok_or(SessionError::NotFound(id))
    }

    /// All designs in creation order
    pub fn designs(&self) -> impl Iterator<Item = &Design> {
        self.designs.values()
    }

    pub fn active_id(&self) -> Option<DesignId> {
        self.active
    }

    pub fn active(&self) -> Option<&Design> {
        self.active.and_then(|id| self.designs.get(&id))
    }

    pub fn is_generating(&self, id: DesignId) -> bool {
        self.in_flight.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.designs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.designs.is_empty()
    }

    /// Start a chat turn. A design with an interpretation already in
    /// flight rejects the submission.
    pub fn begin_interpretation(
        &mut self,
        id: DesignId,
        text: &str,
    ) -> Result<PendingTurn, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let design = self.designs.get(&id).ok_or(SessionError::NotFound(id))?;
        if !self.in_flight.insert(id) {
            warn!("Rejected submission to design {}: busy", id);
            return Err(SessionError::Busy(id));
        }
        debug!("Interpretation started on design {}", id);
        Ok(PendingTurn {
            design_id: id,
            text: text.to_string(),
            previous: design.model.clone(),
            history: design.messages.clone(),
            append_user: true,
        })
    }

    /// Start interpreting the prompt a design was created with.
    pub fn begin_initial_interpretation(&mut self, id: DesignId) -> Result<PendingTurn, SessionError> {
        let design = self.designs.get(&id).ok_or(SessionError::NotFound(id))?;
        let text = design
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .ok_or(SessionError::EmptyMessage)?;
        if !self.in_flight.insert(id) {
            return Err(SessionError::Busy(id));
        }
        Ok(PendingTurn {
            design_id: id,
            text,
            previous: None,
            history: Vec::new(),
            append_user: false,
        })
    }

    /// Commit a finished interpretation. On error nothing about the design
    /// changes; either way the design is ready for the next submission.
    pub fn complete_interpretation(
        &mut self,
        pending: PendingTurn,
        result: Result<Interpretation, RefineError>,
    ) -> Result<CompletedTurn, SessionError> {
        let id = pending.design_id;
        self.in_flight.remove(&id);

        let interpretation = match result {
            Ok(interpretation) => interpretation,
            Err(e) => {
                warn!("Interpretation on design {} failed: {}", id, e);
                return Err(e.into());
            }
        };

        let mut new_messages = Vec::with_capacity(2);
        if pending.append_user {
            new_messages.push(self.message(Role::User, pending.text));
        }
        new_messages.push(self.message(Role::Assistant, interpretation.explanation));

        let design = self.designs.remove(&id).ok_or(SessionError::NotFound(id))?;
        let mut design = history::push(design, interpretation.model);
        design.messages.extend(new_messages);
        design.refined_prompt = interpretation.refined_prompt;
        self.designs.insert(id, design.clone());

        info!(
            "Design {} updated ({:?}, {} call(s))",
            id, interpretation.resolution, interpretation.calls
        );
        Ok(CompletedTurn {
            design,
            resolution: interpretation.resolution,
            calls: interpretation.calls,
        })
    }

    /// Run a whole chat turn while holding the store.
    pub async fn submit(
        &mut self,
        refiner: &Refiner,
        id: DesignId,
        text: &str,
    ) -> Result<CompletedTurn, SessionError> {
        let pending = self.begin_interpretation(id, text)?;
        let result = refiner
            .interpret(&pending.text, pending.previous.as_ref(), &pending.history)
            .await;
        self.complete_interpretation(pending, result)
    }

    pub fn undo(&mut self, id: DesignId) -> Result<Design, SessionError> {
        self.update_history(id, history::undo)
    }

    pub fn redo(&mut self, id: DesignId) -> Result<Design, SessionError> {
        self.update_history(id, history::redo)
    }

    fn update_history(
        &mut self,
        id: DesignId,
        op: fn(Design) -> Design,
    ) -> Result<Design, SessionError> {
        if self.in_flight.contains(&id) {
            return Err(SessionError::Busy(id));
        }
        let design = self.designs.remove(&id).ok_or(SessionError::NotFound(id))?;
        let design = op(design);
        self.designs.insert(id, design.clone());
        Ok(design)
    }

    fn message(&mut self, role: Role, content: impl Into<String>) -> Message {
        self.next_message_id += 1;
        Message::new(self.next_message_id, role, content)
    }
}
