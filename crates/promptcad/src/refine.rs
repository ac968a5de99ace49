//! Two-phase interpretation against the chat collaborator
//!
//! Idle -> AwaitingPrimary -> (Resolved | AwaitingCorrection)
//! AwaitingCorrection -> (Resolved | Fallback)
//!
//! At most two external calls are made per interpretation. If neither reply
//! yields a valid specification the user still gets a plain box, so every
//! successful interpretation produces something renderable.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::chat::{ChatClient, ChatError, ChatRequest, ChatTurn};
use crate::extract::extract_document;
use crate::modifiers::{extract_modifiers, Modifiers};
use crate::prompt::{self, DEFAULT_SYSTEM_PROMPT};
use crate::session::Message;
use crate::spec::{HexColor, ModelSpec, ParsedSpec, PrimitiveKind};

/// Upper bound on collaborator round trips per interpretation.
pub const MAX_CALLS: usize = 2;

const FALLBACK_EXPLANATION: &str =
    "I couldn't work out a detailed model for that, so here is a simple box to start from.";
const DEFAULT_EXPLANATION: &str = "Here is your model.";

#[derive(Debug, Error)]
pub enum RefineError {
    #[error("failed to render instruction: {0}")]
    Template(#[from] minijinja::Error),

    #[error("chat collaborator unreachable: {0}")]
    Transport(#[source] ChatError),
}

#[derive(Debug, Clone)]
pub struct RefineConfig {
    /// System prompt sent with every call; the built-in persona when `None`
    pub system_prompt: Option<String>,
    /// Fill color for the fallback box when nothing else supplies one
    pub fallback_color: HexColor,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            fallback_color: HexColor::from_static("#cccccc"),
        }
    }
}

/// How an interpretation arrived at its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Primary,
    Corrected,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub model: ModelSpec,
    pub explanation: String,
    pub refined_prompt: String,
    pub resolution: Resolution,
    pub calls: usize,
}

enum Phase {
    Idle,
    AwaitingPrimary,
    AwaitingCorrection { failed_reply: Option<String> },
    Resolved { parsed: ParsedSpec, resolution: Resolution },
    Fallback,
}

/// Outcome of a single round trip
enum Attempt {
    Parsed(ParsedSpec),
    Unusable(Option<String>),
    Unreachable(ChatError),
}

pub struct Refiner {
    client: Arc<dyn ChatClient>,
    config: RefineConfig,
}

impl Refiner {
    pub fn new(client: Arc<dyn ChatClient>, config: RefineConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RefineConfig {
        &self.config
    }

    /// Turn one user message into a validated model.
    ///
    /// Fails only when every call failed at the transport level; in that
    /// case the caller commits nothing.
    pub async fn interpret(
        &self,
        user_text: &str,
        previous: Option<&ModelSpec>,
        history: &[Message],
    ) -> Result<Interpretation, RefineError> {
        let modifiers = extract_modifiers(user_text);
        let turns: Vec<ChatTurn> = history.iter().map(ChatTurn::from).collect();
        let mut calls = 0usize;
        let mut transport_failure: Option<ChatError> = None;
        let mut phase = Phase::Idle;

        loop {
            phase = match phase {
                Phase::Idle => Phase::AwaitingPrimary,
                Phase::AwaitingPrimary => {
                    let message = prompt::compose_refinement(user_text, previous)?;
                    match self.attempt(message, &turns, &mut calls).await {
                        Attempt::Parsed(parsed) => Phase::Resolved {
                            parsed,
                            resolution: Resolution::Primary,
                        },
                        Attempt::Unusable(reply) => {
                            Phase::AwaitingCorrection { failed_reply: reply }
                        }
                        Attempt::Unreachable(e) => {
                            transport_failure = Some(e);
                            Phase::AwaitingCorrection { failed_reply: None }
                        }
                    }
                }
                Phase::AwaitingCorrection { failed_reply } => {
                    let message = prompt::compose_correction(user_text, failed_reply.as_deref())?;
                    match self.attempt(message, &turns, &mut calls).await {
                        Attempt::Parsed(parsed) => Phase::Resolved {
                            parsed,
                            resolution: Resolution::Corrected,
                        },
                        Attempt::Unusable(_) => Phase::Fallback,
                        Attempt::Unreachable(e) => match transport_failure.take() {
                            // Neither call reached the collaborator
                            Some(_) => return Err(RefineError::Transport(e)),
                            None => Phase::Fallback,
                        },
                    }
                }
                Phase::Resolved { parsed, resolution } => {
                    info!("Interpretation resolved ({:?}) after {} call(s)", resolution, calls);
                    return Ok(Interpretation {
                        model: modifiers.apply(parsed.model),
                        explanation: parsed
                            .explanation
                            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string()),
                        refined_prompt: parsed.prompt.unwrap_or_else(|| user_text.to_string()),
                        resolution,
                        calls,
                    });
                }
                Phase::Fallback => {
                    warn!("No valid specification after {} call(s), using fallback box", calls);
                    let model = fallback_model(previous, &modifiers, &self.config.fallback_color);
                    return Ok(Interpretation {
                        model: modifiers.apply(model),
                        explanation: FALLBACK_EXPLANATION.to_string(),
                        refined_prompt: user_text.to_string(),
                        resolution: Resolution::Fallback,
                        calls,
                    });
                }
            };
        }
    }

    async fn attempt(&self, message: String, turns: &[ChatTurn], calls: &mut usize) -> Attempt {
        debug_assert!(*calls < MAX_CALLS, "call budget exceeded");
        *calls += 1;

        let request = ChatRequest {
            message,
            history: turns.to_vec(),
            system_prompt: Some(
                self.config
                    .system_prompt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            ),
        };

        let reply = match self.client.send(&request).await {
            Ok(reply) => reply,
            // The collaborator answered, just not in a shape we can read
            Err(ChatError::MalformedBody(e)) => {
                warn!("Chat call {} returned a malformed body: {}", calls, e);
                return Attempt::Unusable(None);
            }
            Err(e) => {
                warn!("Chat call {} failed: {}", calls, e);
                return Attempt::Unreachable(e);
            }
        };

        let Some(document) = extract_document(&reply) else {
            warn!("Chat call {} returned no structured block", calls);
            return Attempt::Unusable(Some(reply));
        };
        match ParsedSpec::from_document(&document) {
            Ok(parsed) => Attempt::Parsed(parsed),
            Err(e) => {
                warn!("Chat call {} returned an unusable specification: {}", calls, e);
                Attempt::Unusable(Some(reply))
            }
        }
    }
}

/// Plain box carrying over what it can from the previous model.
pub fn fallback_model(
    previous: Option<&ModelSpec>,
    modifiers: &Modifiers,
    neutral: &HexColor,
) -> ModelSpec {
    let scale = previous
        .and_then(ModelSpec::scale)
        .unwrap_or(modifiers.size);
    let color = previous
        .and_then(ModelSpec::color)
        .or(modifiers.color.as_ref())
        .unwrap_or(neutral)
        .clone();
    ModelSpec::primitive(PrimitiveKind::Box, scale, color)
}
