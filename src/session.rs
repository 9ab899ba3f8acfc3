//! Session controller
//!
//! What this module provides
//! - [`Session`]: owns the [`SessionState`], tracks the one active agent and
//!   runs each turn to completion: model round, tool dispatch, handoff
//! - [`Turn`]: what enters a session (user text or an external mention)
//! - [`TurnOutcome`]: replies spoken during the turn and the handoffs it caused
//!
//! Turn loop
//! 1. Append the turn to the active agent's context.
//! 2. Ask the model with `ToolChoice::Auto`. A text reply ends the turn.
//! 3. Tool calls are dispatched in order against the shared state; every
//!    call and result is recorded in the active agent's context.
//! 4. A `Transfer` result deactivates the current agent, activates the
//!    target (context rebuild) and asks the target for an introduction with
//!    `ToolChoice::None`. The turn ends there.
//! 5. More than `max_tool_steps` tool rounds is an error.
//!
//! `handle_turn` takes `&mut self`, so turns never overlap. [`Session::run`]
//! drains an inbox sequentially for hosts that feed turns from several
//! sources (user I/O plus the mention listener).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower::ServiceExt;
use tracing::{debug, error, info, instrument, warn};

use crate::agent::{self, Agent, AgentKind, DEFAULT_CARRY_OVER};
use crate::agents;
use crate::bridge::{Mention, MentionBridge};
use crate::config::{ShopConfig, VoiceTable, DEFAULT_MAX_TOOL_STEPS};
use crate::error::{Result, ShopError};
use crate::items::{ConversationItem, ToolCall};
use crate::provider::{ModelReply, ModelRequest, ModelService, ToolChoice};
use crate::state::{AgentName, SessionState};
use crate::tool::{ToolContext, ToolOutcome};

const SKIPPED_AFTER_TRANSFER: &str = "Not executed: the conversation was transferred.";

/// Input admitted into a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Turn {
    User(String),
    Mention(Mention),
}

impl Turn {
    fn kind(&self) -> &'static str {
        match self {
            Turn::User(_) => "user",
            Turn::Mention(_) => "mention",
        }
    }

    fn into_item(self) -> ConversationItem {
        match self {
            Turn::User(text) => ConversationItem::user(text),
            Turn::Mention(mention) => ConversationItem::user(mention.to_string()),
        }
    }
}

impl From<&str> for Turn {
    fn from(text: &str) -> Self {
        Turn::User(text.to_string())
    }
}

impl From<String> for Turn {
    fn from(text: String) -> Self {
        Turn::User(text)
    }
}

impl From<Mention> for Turn {
    fn from(mention: Mention) -> Self {
        Turn::Mention(mention)
    }
}

/// Text spoken by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    pub agent: AgentName,
    pub text: String,
}

/// A completed handoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Option<AgentName>,
    pub to: AgentName,
    pub carried_items: usize,
}

/// Everything that happened during one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub replies: Vec<AgentReply>,
    pub transitions: Vec<Transition>,
    /// Agent that will receive the next turn
    pub active_agent: AgentName,
}

impl TurnOutcome {
    /// Last thing said during the turn.
    pub fn last_reply(&self) -> Option<&AgentReply> {
        self.replies.last()
    }

    pub fn transferred(&self) -> bool {
        !self.transitions.is_empty()
    }
}

/// One conversation routed across the shopping agents.
pub struct Session<M> {
    state: SessionState,
    current: Option<AgentName>,
    model: M,
    bridge: Arc<dyn MentionBridge>,
    max_tool_steps: usize,
    carry_over: usize,
    voices: VoiceTable,
}

impl<M> Session<M>
where
    M: ModelService,
    M::Future: Send,
{
    pub fn new(state: SessionState, model: M, bridge: Arc<dyn MentionBridge>) -> Self {
        Self {
            state,
            current: None,
            model,
            bridge,
            max_tool_steps: DEFAULT_MAX_TOOL_STEPS,
            carry_over: DEFAULT_CARRY_OVER,
            voices: VoiceTable::default(),
        }
    }

    /// The four shopping agents with the configured catalog and limits.
    pub fn from_config(config: &ShopConfig, model: M, bridge: Arc<dyn MentionBridge>) -> Self {
        let state = SessionState::new(agents::registry(&config.product_catalog));
        Self::new(state, model, bridge)
            .with_max_tool_steps(config.max_tool_steps)
            .with_carry_over(config.carry_over_items)
            .with_voices(config.voices.clone())
    }

    pub fn with_voices(mut self, voices: VoiceTable) -> Self {
        self.voices = voices;
        self
    }

    /// Text-to-speech voice of `agent`, for the I/O collaborator.
    pub fn voice_for(&self, agent: &str) -> Option<&str> {
        AgentKind::from_name(agent).map(|kind| self.voices.voice_for(kind))
    }

    pub fn with_max_tool_steps(mut self, steps: usize) -> Self {
        self.max_tool_steps = steps;
        self
    }

    pub fn with_carry_over(mut self, items: usize) -> Self {
        self.carry_over = items;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn current_agent(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn into_state(self) -> SessionState {
        self.state
    }

    /// Activate `initial` and let it introduce itself.
    ///
    /// Calling `start` again restarts at `initial`; the agent that was active
    /// becomes the previous agent.
    #[instrument(skip_all, fields(initial = %initial))]
    pub async fn start(&mut self, initial: &str) -> Result<TurnOutcome> {
        if !self.state.agents.contains(initial) {
            return Err(ShopError::InvalidTransition {
                target: initial.to_string(),
            });
        }
        let from = self.current.take();
        if let Some(prev) = &from {
            agent::deactivate(&mut self.state, prev);
            self.state.previous_agent = Some(prev.clone());
        }

        let mut outcome = TurnOutcome::default();
        self.enter(from, initial, &mut outcome).await?;
        Ok(outcome)
    }

    /// Run one user turn.
    pub async fn handle_turn(&mut self, input: impl Into<String>) -> Result<TurnOutcome> {
        self.handle(Turn::User(input.into())).await
    }

    /// Run one turn of any kind to completion.
    #[instrument(skip_all, fields(turn = turn.kind()))]
    pub async fn handle(&mut self, turn: Turn) -> Result<TurnOutcome> {
        let active = self.current.clone().ok_or(ShopError::NotStarted)?;
        info!(agent = %active, kind = turn.kind(), "turn admitted");
        self.agent_mut(&active)?
            .chat_ctx_mut()
            .push(turn.into_item());

        let mut outcome = TurnOutcome {
            active_agent: active.clone(),
            ..Default::default()
        };

        for step in 0..self.max_tool_steps {
            debug!(agent = %active, step, "model round");
            match self.generate(&active, ToolChoice::Auto).await? {
                ModelReply::Message(text) => {
                    self.agent_mut(&active)?
                        .chat_ctx_mut()
                        .push(ConversationItem::assistant(text.clone()));
                    outcome.replies.push(AgentReply {
                        agent: active.clone(),
                        text,
                    });
                    return Ok(outcome);
                }
                ModelReply::ToolCalls(calls) => {
                    if let Some(target) = self.run_tool_calls(&active, calls).await? {
                        agent::deactivate(&mut self.state, &active);
                        self.enter(Some(active), &target, &mut outcome).await?;
                        return Ok(outcome);
                    }
                }
            }
        }

        error!(agent = %active, max_steps = self.max_tool_steps, "tool step budget exhausted");
        Err(ShopError::MaxToolStepsExceeded {
            max_steps: self.max_tool_steps,
        })
    }

    /// Process turns from `inbox` one at a time until it closes.
    ///
    /// Each turn's result is sent on `outbox`; the loop also ends once the
    /// receiving side of `outbox` is gone. Returns the session so the host
    /// can inspect the final state.
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Turn>,
        outbox: mpsc::Sender<Result<TurnOutcome>>,
    ) -> Self {
        while let Some(turn) = inbox.recv().await {
            let result = self.handle(turn).await;
            if let Err(e) = &result {
                warn!(error = %e, "turn failed");
            }
            if outbox.send(result).await.is_err() {
                break;
            }
        }
        debug!("session inbox closed");
        self
    }

    /// Activate `target`, record the transition and collect its introduction.
    async fn enter(
        &mut self,
        from: Option<AgentName>,
        target: &str,
        outcome: &mut TurnOutcome,
    ) -> Result<()> {
        let activation = agent::activate(&mut self.state, target, self.carry_over)?;
        self.current = Some(target.to_string());
        outcome.transitions.push(Transition {
            from,
            to: target.to_string(),
            carried_items: activation.carried_items,
        });
        outcome.active_agent = target.to_string();

        match self.generate(target, ToolChoice::None).await? {
            ModelReply::Message(text) => {
                self.agent_mut(target)?
                    .chat_ctx_mut()
                    .push(ConversationItem::assistant(text.clone()));
                outcome.replies.push(AgentReply {
                    agent: target.to_string(),
                    text,
                });
            }
            ModelReply::ToolCalls(calls) => {
                warn!(
                    agent = %target,
                    calls = calls.len(),
                    "ignoring tool calls in introduction"
                );
            }
        }
        Ok(())
    }

    /// Dispatch `calls` for `agent_name`; returns the transfer target if one
    /// of them handed off. Calls after a transfer are recorded as skipped.
    async fn run_tool_calls(
        &mut self,
        agent_name: &str,
        calls: Vec<ToolCall>,
    ) -> Result<Option<AgentName>> {
        let router = self.agent(agent_name)?.tools();
        let bridge = self.bridge.clone();
        let mut transfer = None;

        for call in calls {
            let output = if transfer.is_some() {
                debug!(tool = %call.name, "skipping tool call after transfer");
                SKIPPED_AFTER_TRANSFER.to_string()
            } else {
                let mut ctx = ToolContext::new(&mut self.state, agent_name);
                match router.dispatch(&call, &mut ctx, bridge.as_ref()).await? {
                    ToolOutcome::Answer { text } => text,
                    ToolOutcome::Transfer { target, message } => {
                        transfer = Some(target);
                        message
                    }
                }
            };

            let output_item = ConversationItem::tool_output(&call.id, &call.name, output);
            let ctx = self.agent_mut(agent_name)?.chat_ctx_mut();
            ctx.push(ConversationItem::tool_call(call));
            ctx.push(output_item);
        }
        Ok(transfer)
    }

    async fn generate(&mut self, agent_name: &str, tool_choice: ToolChoice) -> Result<ModelReply> {
        let agent = self.agent(agent_name)?;
        let request = ModelRequest {
            agent: agent_name.to_string(),
            items: agent.chat_ctx().items().to_vec(),
            tools: agent.tool_specs(),
            tool_choice,
            parallel_tool_calls: agent.parallel_tool_calls(),
        };

        let reply = ServiceExt::ready(&mut self.model)
            .await
            .map_err(ShopError::Collaborator)?
            .call(request)
            .await
            .map_err(|e| {
                error!(agent = %agent_name, error = %e, "model call failed");
                ShopError::Collaborator(e)
            })?;
        Ok(reply)
    }

    fn agent(&self, name: &str) -> Result<&Agent> {
        self.state
            .agents
            .get(name)
            .ok_or_else(|| ShopError::InvalidTransition {
                target: name.to_string(),
            })
    }

    fn agent_mut(&mut self, name: &str) -> Result<&mut Agent> {
        self.state
            .agents
            .get_mut(name)
            .ok_or_else(|| ShopError::InvalidTransition {
                target: name.to_string(),
            })
    }
}
