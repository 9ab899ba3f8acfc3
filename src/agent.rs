//! # Agent (orientation)
//!
//! An [`Agent`] owns one phase of the shopping conversation: a persona
//! (instructions), a working [`ChatContext`], and the tools it exposes to the
//! model. The set of agents is closed ([`AgentKind`]); the specialised tool
//! lists live in [`crate::agents`].
//!
//! Agents move between *inactive* and *active* any number of times. Entering
//! an agent ([`activate`]) rebuilds its working context from three sources:
//!
//! 1. its own previous context,
//! 2. the tail of the previous agent's context (system messages removed, tool
//!    records kept, at most `carry_over` items), merged by item identity,
//! 3. a fresh system message carrying a snapshot of the session state.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ShopError};
use crate::items::{ChatContext, ConversationItem};
use crate::state::{AgentName, SessionState};
use crate::tool::{bridge_tools, ToolDef, ToolRouter, ToolSpec};

/// Default number of items carried over from the previous agent.
pub const DEFAULT_CARRY_OVER: usize = 6;

/// The closed set of agents a session can route between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Greeter,
    ShoppingCart,
    Takeaway,
    Checkout,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Greeter,
        AgentKind::ShoppingCart,
        AgentKind::Takeaway,
        AgentKind::Checkout,
    ];

    /// Registry key.
    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Greeter => "greeter",
            AgentKind::ShoppingCart => "shopping_cart",
            AgentKind::Takeaway => "takeaway",
            AgentKind::Checkout => "checkout",
        }
    }

    /// Name the agent uses to introduce itself to the model.
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::Greeter => "ShoppingGreeter",
            AgentKind::ShoppingCart => "ShoppingCartAgent",
            AgentKind::Takeaway => "TakeawayAgent",
            AgentKind::Checkout => "CheckoutAgent",
        }
    }

    /// Text-to-speech voice of the agent, for I/O collaborators.
    pub fn voice_id(&self) -> &'static str {
        match self {
            AgentKind::Greeter => "794f9389-aac1-45b6-b726-9d9369183238",
            AgentKind::ShoppingCart => "156fb8d2-335b-4950-9cb3-a2d33befec77",
            AgentKind::Takeaway => "6f84f4b8-58a2-430c-8c79-688dad597532",
            AgentKind::Checkout => "39b376fc-488e-4d0c-8b37-e00b72059fdd",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    fn entry_message(&self, summary: &str) -> String {
        format!(
            "You are {} agent. Current user data is {}. \
             External agents outside the shopping system may contact you: use the \
             wait_for_mentions tool to listen for their messages at all times and the \
             send_message tool to answer them. Right after your introduction, start \
             calling wait_for_mentions and keep monitoring for mentions.",
            self.display_name(),
            summary.trim_end()
        )
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One conversational agent with its own working context.
#[derive(Debug, Clone)]
pub struct Agent {
    kind: AgentKind,
    instructions: String,
    chat_ctx: ChatContext,
    tools: Arc<ToolRouter>,
    parallel_tool_calls: Option<bool>,
    active: bool,
    activations: usize,
}

impl Agent {
    /// Creates an agent whose context starts with its instructions.
    ///
    /// The external-messaging tools are appended to `tools`.
    pub fn new(kind: AgentKind, instructions: impl Into<String>, tools: Vec<ToolDef>) -> Self {
        let instructions = instructions.into();
        let mut chat_ctx = ChatContext::new();
        chat_ctx.push(ConversationItem::system(instructions.clone()));

        let mut all_tools = tools;
        all_tools.extend(bridge_tools());

        Self {
            kind,
            instructions,
            chat_ctx,
            tools: Arc::new(ToolRouter::new(all_tools)),
            parallel_tool_calls: None,
            active: false,
            activations: 0,
        }
    }

    /// Whether the model may request several tool calls in one reply.
    pub fn with_parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = Some(enabled);
        self
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn chat_ctx(&self) -> &ChatContext {
        &self.chat_ctx
    }

    pub fn chat_ctx_mut(&mut self) -> &mut ChatContext {
        &mut self.chat_ctx
    }

    pub fn update_chat_ctx(&mut self, ctx: ChatContext) {
        self.chat_ctx = ctx;
    }

    pub fn tools(&self) -> Arc<ToolRouter> {
        self.tools.clone()
    }

    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools.specs()
    }

    pub fn parallel_tool_calls(&self) -> Option<bool> {
        self.parallel_tool_calls
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activations(&self) -> usize {
        self.activations
    }
}

/// What happened while entering an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub agent: AgentName,
    pub previous: Option<AgentName>,
    pub carried_items: usize,
}

/// Rebuild the working context of `name` and mark it active.
///
/// Generating the introduction reply is left to the caller.
pub fn activate(state: &mut SessionState, name: &str, carry_over: usize) -> Result<Activation> {
    if !state.agents.contains(name) {
        return Err(ShopError::InvalidTransition {
            target: name.to_string(),
        });
    }

    let previous = state.previous_agent.clone();
    let carried = previous
        .as_deref()
        .and_then(|p| state.agents.get(p))
        .map(|prev| prev.chat_ctx().copy(true, false).truncate(carry_over))
        .unwrap_or_default();
    let summary = state.summarize()?;

    let agent = state
        .agents
        .get_mut(name)
        .ok_or_else(|| ShopError::InvalidTransition {
            target: name.to_string(),
        })?;

    let mut ctx = agent.chat_ctx.copy(false, false);
    let offered = carried.len();
    let carried_items = ctx.merge(carried);
    ctx.push(ConversationItem::system(agent.kind.entry_message(&summary)));
    agent.update_chat_ctx(ctx);
    agent.active = true;
    agent.activations += 1;

    info!("entering task {}", agent.kind.display_name());
    debug!(
        agent = %name,
        previous = ?previous,
        offered,
        carried_items,
        "merged previous agent context"
    );

    Ok(Activation {
        agent: name.to_string(),
        previous,
        carried_items,
    })
}

/// Mark `name` inactive. Its context is left untouched.
pub fn deactivate(state: &mut SessionState, name: &str) {
    if let Some(agent) = state.agents.get_mut(name) {
        agent.active = false;
        debug!(agent = %name, "agent deactivated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::Role;
    use crate::state::AgentRegistry;
    use pretty_assertions::assert_eq;

    fn state() -> SessionState {
        SessionState::new(AgentRegistry::from_agents(
            AgentKind::ALL
                .into_iter()
                .map(|k| Agent::new(k, format!("{} instructions", k), vec![])),
        ))
    }

    #[test]
    fn test_agent_kind_names() {
        assert_eq!(AgentKind::ShoppingCart.name(), "shopping_cart");
        assert_eq!(AgentKind::from_name("takeaway"), Some(AgentKind::Takeaway));
        assert_eq!(AgentKind::from_name("bakery"), None);
        assert_eq!(AgentKind::Checkout.to_string(), "checkout");
    }

    #[test]
    fn test_new_agent_exposes_bridge_tools() {
        let agent = Agent::new(AgentKind::Greeter, "hello", vec![]);
        let names: Vec<_> = agent.tool_specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["wait_for_mentions", "send_message"]);
        assert_eq!(agent.chat_ctx().len(), 1);
        assert!(agent.chat_ctx().items()[0].is_system());
        assert!(!agent.is_active());
    }

    #[test]
    fn test_first_activation_appends_snapshot() {
        let mut state = state();
        let activation = activate(&mut state, "greeter", DEFAULT_CARRY_OVER).unwrap();
        assert_eq!(activation.previous, None);
        assert_eq!(activation.carried_items, 0);

        let agent = state.agents.get("greeter").unwrap();
        assert!(agent.is_active());
        assert_eq!(agent.activations(), 1);
        let last = agent.chat_ctx().last().unwrap();
        assert_eq!(last.role(), Role::System);
        let text = last.text().unwrap();
        assert!(text.starts_with("You are ShoppingGreeter agent."));
        assert!(text.contains("customer_name: unknown"));
    }

    #[test]
    fn test_activation_carries_bounded_tail_without_system_messages() {
        let mut state = state();
        {
            let greeter = state.agents.get_mut("greeter").unwrap();
            for i in 0..10 {
                greeter
                    .chat_ctx_mut()
                    .push(ConversationItem::user(format!("msg {i}")).with_id(format!("g{i}")));
            }
            greeter
                .chat_ctx_mut()
                .push(ConversationItem::system("late system").with_id("gsys"));
        }
        state.previous_agent = Some("greeter".into());

        let activation = activate(&mut state, "shopping_cart", 6).unwrap();
        assert_eq!(activation.carried_items, 6);

        let cart = state.agents.get("shopping_cart").unwrap();
        let ids: Vec<_> = cart.chat_ctx().items().iter().map(|i| i.id.as_str()).collect();
        // own instructions, carried tail (system item dropped), entry snapshot
        assert_eq!(ids.len(), 8);
        assert_eq!(&ids[1..7], &["g4", "g5", "g6", "g7", "g8", "g9"]);
        assert!(!ids.contains(&"gsys"));
    }

    #[test]
    fn test_reentry_does_not_duplicate_history() {
        let mut state = state();
        state
            .agents
            .get_mut("greeter")
            .unwrap()
            .chat_ctx_mut()
            .push(ConversationItem::user("hi").with_id("u1"));

        state.previous_agent = Some("greeter".into());
        activate(&mut state, "shopping_cart", 6).unwrap();
        let first_len = state.agents.get("shopping_cart").unwrap().chat_ctx().len();

        // back to the greeter, then to the cart again
        state.previous_agent = Some("shopping_cart".into());
        activate(&mut state, "greeter", 6).unwrap();
        state.previous_agent = Some("greeter".into());
        activate(&mut state, "shopping_cart", 6).unwrap();

        let cart = state.agents.get("shopping_cart").unwrap();
        let u1_count = cart.chat_ctx().items().iter().filter(|i| i.id == "u1").count();
        assert_eq!(u1_count, 1);
        // only a new snapshot message per activation, plus no re-carried items
        assert!(cart.chat_ctx().len() <= first_len + 2);
    }

    #[test]
    fn test_activate_unknown_agent() {
        let mut state = state();
        let err = activate(&mut state, "bakery", 6).unwrap_err();
        assert!(matches!(err, ShopError::InvalidTransition { .. }));
    }

    #[test]
    fn test_deactivate_keeps_context() {
        let mut state = state();
        activate(&mut state, "greeter", 6).unwrap();
        let before = state.agents.get("greeter").unwrap().chat_ctx().clone();
        deactivate(&mut state, "greeter");
        let greeter = state.agents.get("greeter").unwrap();
        assert!(!greeter.is_active());
        assert_eq!(greeter.chat_ctx(), &before);
    }
}
