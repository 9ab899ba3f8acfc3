//! Tool contract and dispatch
//!
//! Every operation an agent exposes to the model is a [`ToolDef`]: a name, a
//! description, a JSON schema for its arguments and a handler. Handlers get
//! the shared [`SessionState`] through a [`ToolContext`] and return a
//! [`ToolOutcome`], which is either a plain answer or a transfer to another
//! agent. The controller pattern-matches on that outcome to decide whether
//! the active agent changes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::bridge::MentionBridge;
use crate::error::{Result, ShopError};
use crate::items::ToolCall;
use crate::state::{AgentName, SessionState};

/// Result of a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// Text surfaced back to the model
    Answer { text: String },
    /// Hand the conversation to another agent
    Transfer { target: AgentName, message: String },
}

impl ToolOutcome {
    pub fn answer(text: impl Into<String>) -> Self {
        ToolOutcome::Answer { text: text.into() }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, ToolOutcome::Transfer { .. })
    }

    /// The text recorded as the tool result in the chat history.
    pub fn text(&self) -> &str {
        match self {
            ToolOutcome::Answer { text } => text,
            ToolOutcome::Transfer { message, .. } => message,
        }
    }
}

/// What a tool handler can see: the shared state and the calling agent.
pub struct ToolContext<'a> {
    pub state: &'a mut SessionState,
    agent: &'a str,
}

impl<'a> ToolContext<'a> {
    pub fn new(state: &'a mut SessionState, agent: &'a str) -> Self {
        Self { state, agent }
    }

    /// Name of the agent executing the tool.
    pub fn agent(&self) -> &str {
        self.agent
    }

    /// Hand control to `target`.
    ///
    /// Fails with [`ShopError::InvalidTransition`] without touching the state
    /// when `target` is not registered. Otherwise records the calling agent
    /// as the previous agent.
    pub fn transfer_to(&mut self, target: &str) -> Result<ToolOutcome> {
        if !self.state.agents.contains(target) {
            return Err(ShopError::InvalidTransition {
                target: target.to_string(),
            });
        }
        info!(from = %self.agent, to = %target, "transfer requested");
        self.state.previous_agent = Some(self.agent.to_string());
        Ok(ToolOutcome::Transfer {
            target: target.to_string(),
            message: format!("Transferring to {target}."),
        })
    }
}

/// Handler of a local tool.
pub type ToolHandler =
    Arc<dyn Fn(&mut ToolContext<'_>, Value) -> Result<ToolOutcome> + Send + Sync + 'static>;

/// Operations served by the external messaging collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOp {
    WaitForMentions,
    SendMessage,
}

#[derive(Clone)]
enum ToolKind {
    Local(ToolHandler),
    Bridge(BridgeOp),
}

/// Function spec handed to the language collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Definition of a tool: function spec plus implementation.
#[derive(Clone)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters_schema: Value,
    kind: ToolKind,
}

impl fmt::Debug for ToolDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ToolKind::Local(_) => "local",
            ToolKind::Bridge(_) => "bridge",
        };
        f.debug_struct("ToolDef")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("kind", &kind)
            .finish()
    }
}

impl ToolDef {
    /// Create a tool from a handler taking raw JSON arguments.
    pub fn from_handler(
        name: &'static str,
        description: &'static str,
        parameters_schema: Value,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name,
            description,
            parameters_schema,
            kind: ToolKind::Local(handler),
        }
    }

    fn bridge(
        name: &'static str,
        description: &'static str,
        parameters_schema: Value,
        op: BridgeOp,
    ) -> Self {
        Self {
            name,
            description,
            parameters_schema,
            kind: ToolKind::Bridge(op),
        }
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self.kind, ToolKind::Bridge(_))
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.parameters_schema.clone(),
        }
    }
}

fn schema_of<A: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(A);
    serde_json::to_value(schema.schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

/// Create a tool from a typed handler.
/// - `A` is the argument struct (Deserialize + JsonSchema); its schema is
///   generated once at construction
pub fn tool_typed<A, H>(name: &'static str, description: &'static str, handler: H) -> ToolDef
where
    A: DeserializeOwned + JsonSchema + 'static,
    H: Fn(&mut ToolContext<'_>, A) -> Result<ToolOutcome> + Send + Sync + 'static,
{
    let handler: ToolHandler = Arc::new(move |ctx: &mut ToolContext<'_>, raw: Value| {
        let args: A = parse_args(name, raw)?;
        handler(ctx, args)
    });
    ToolDef::from_handler(name, description, schema_of::<A>(), handler)
}

fn parse_args<A: DeserializeOwned>(tool: &str, raw: Value) -> Result<A> {
    // models send `null` or "" for argument-less calls
    let raw = match raw {
        Value::Null => Value::Object(Default::default()),
        Value::String(s) if s.trim().is_empty() => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(raw).map_err(|source| ShopError::ToolArguments {
        tool: tool.to_string(),
        source,
    })
}

/// Answer of `wait_for_mentions` when nothing is queued.
pub const NO_PENDING_MENTIONS: &str =
    "No new messages from external agents. New mentions are delivered to you as they arrive.";

/// Arguments of tools that take none.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NoArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendMessageArgs {
    /// Identifier of the external agent to message
    pub recipient: String,
    /// Message body
    pub content: String,
}

/// The two standing tools every agent exposes for external agents.
pub fn bridge_tools() -> Vec<ToolDef> {
    vec![
        ToolDef::bridge(
            "wait_for_mentions",
            "Check for a message from an external agent that mentions you. \
             Call it again after handling each message.",
            schema_of::<NoArgs>(),
            BridgeOp::WaitForMentions,
        ),
        ToolDef::bridge(
            "send_message",
            "Send a message to an external agent.",
            schema_of::<SendMessageArgs>(),
            BridgeOp::SendMessage,
        ),
    ]
}

/// Name → tool table of one agent.
#[derive(Clone, Debug, Default)]
pub struct ToolRouter {
    name_to_index: HashMap<&'static str, usize>,
    tools: Vec<ToolDef>,
}

impl ToolRouter {
    /// Later definitions with the same name replace earlier ones.
    pub fn new(tools: Vec<ToolDef>) -> Self {
        let mut router = Self::default();
        for td in tools {
            match router.name_to_index.get(td.name) {
                Some(&i) => router.tools[i] = td,
                None => {
                    router.name_to_index.insert(td.name, router.tools.len());
                    router.tools.push(td);
                }
            }
        }
        router
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(ToolDef::spec).collect()
    }

    /// Execute `call` for the agent in `ctx`.
    ///
    /// Unknown tools and malformed arguments are errors; domain dead-ends
    /// come back as answers from the handlers themselves.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        ctx: &mut ToolContext<'_>,
        bridge: &dyn MentionBridge,
    ) -> Result<ToolOutcome> {
        let td = self
            .name_to_index
            .get(call.name.as_str())
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ShopError::UnknownTool {
                agent: ctx.agent().to_string(),
                tool: call.name.clone(),
            })?;
        debug!(agent = %ctx.agent(), tool = %call.name, call_id = %call.id, "dispatching tool");

        match &td.kind {
            ToolKind::Local(handler) => (handler.as_ref())(ctx, call.arguments.clone()),
            // never parks the turn: a running listener delivers mentions as turns
            ToolKind::Bridge(BridgeOp::WaitForMentions) => match bridge.poll_mention().await? {
                Some(mention) => Ok(ToolOutcome::answer(mention.to_string())),
                None => Ok(ToolOutcome::answer(NO_PENDING_MENTIONS)),
            },
            ToolKind::Bridge(BridgeOp::SendMessage) => {
                let args: SendMessageArgs = parse_args(td.name, call.arguments.clone())?;
                bridge.send_message(&args.recipient, &args.content).await?;
                Ok(ToolOutcome::answer(format!(
                    "Message sent to {}.",
                    args.recipient
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentKind};
    use crate::bridge::ChannelBridge;
    use crate::state::AgentRegistry;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoArgs {
        word: String,
    }

    fn echo(_ctx: &mut ToolContext<'_>, args: EchoArgs) -> Result<ToolOutcome> {
        Ok(ToolOutcome::answer(args.word))
    }

    fn state_with(kinds: &[AgentKind]) -> SessionState {
        SessionState::new(AgentRegistry::from_agents(
            kinds.iter().map(|k| Agent::new(*k, "test", vec![])),
        ))
    }

    #[test]
    fn test_tool_typed_schema() {
        let tool = tool_typed("echo", "Echo a word", echo);
        assert_eq!(tool.name, "echo");
        assert_eq!(tool.parameters_schema["type"], "object");
        assert!(tool.parameters_schema["properties"]["word"].is_object());
        assert!(!tool.is_bridge());
    }

    #[tokio::test]
    async fn test_dispatch_local_tool() {
        let router = ToolRouter::new(vec![tool_typed("echo", "Echo a word", echo)]);
        let (bridge, _tx) = ChannelBridge::new();
        let mut state = SessionState::default();
        let mut ctx = ToolContext::new(&mut state, "greeter");

        let call = ToolCall::new("c1", "echo", serde_json::json!({"word": "hi"}));
        let out = router.dispatch(&call, &mut ctx, &bridge).await.unwrap();
        assert_eq!(out, ToolOutcome::answer("hi"));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_unknown_tool_and_bad_args() {
        let router = ToolRouter::new(vec![tool_typed("echo", "Echo a word", echo)]);
        let (bridge, _tx) = ChannelBridge::new();
        let mut state = SessionState::default();
        let mut ctx = ToolContext::new(&mut state, "greeter");

        let call = ToolCall::new("c1", "shout", Value::Null);
        let err = router.dispatch(&call, &mut ctx, &bridge).await.unwrap_err();
        assert!(matches!(err, ShopError::UnknownTool { .. }));

        let call = ToolCall::new("c2", "echo", serde_json::json!({"nope": 1}));
        let err = router.dispatch(&call, &mut ctx, &bridge).await.unwrap_err();
        assert!(matches!(err, ShopError::ToolArguments { .. }));
    }

    #[test]
    fn test_no_args_accepts_null() {
        let args: NoArgs = parse_args("t", Value::Null).unwrap();
        let _ = args;
        let args: NoArgs = parse_args("t", Value::String(String::new())).unwrap();
        let _ = args;
    }

    #[test]
    fn test_transfer_to_known_agent() {
        let mut state = state_with(&[AgentKind::Greeter, AgentKind::ShoppingCart]);
        let mut ctx = ToolContext::new(&mut state, "greeter");
        let out = ctx.transfer_to("shopping_cart").unwrap();
        assert_eq!(
            out,
            ToolOutcome::Transfer {
                target: "shopping_cart".into(),
                message: "Transferring to shopping_cart.".into(),
            }
        );
        assert_eq!(state.previous_agent.as_deref(), Some("greeter"));
    }

    #[test]
    fn test_transfer_to_unknown_agent_does_not_mutate() {
        let mut state = state_with(&[AgentKind::Greeter]);
        let mut ctx = ToolContext::new(&mut state, "greeter");
        let err = ctx.transfer_to("bakery").unwrap_err();
        assert!(matches!(err, ShopError::InvalidTransition { ref target } if target == "bakery"));
        assert!(state.previous_agent.is_none());
    }

    #[test]
    fn test_router_replaces_duplicate_names() {
        let first = tool_typed("echo", "first", echo);
        let second = tool_typed("echo", "second", echo);
        let router = ToolRouter::new(vec![first, second]);
        assert_eq!(router.names(), vec!["echo"]);
        assert_eq!(router.specs()[0].description, "second");
    }

    #[tokio::test]
    async fn test_bridge_tools_route_to_bridge() {
        let router = ToolRouter::new(bridge_tools());
        let (bridge, _tx) = ChannelBridge::new();
        let mut state = SessionState::default();
        let mut ctx = ToolContext::new(&mut state, "greeter");

        let call = ToolCall::new(
            "c1",
            "send_message",
            serde_json::json!({"recipient": "inventory", "content": "stock?"}),
        );
        let out = router.dispatch(&call, &mut ctx, &bridge).await.unwrap();
        assert_eq!(out, ToolOutcome::answer("Message sent to inventory."));
        assert_eq!(bridge.sent()[0].recipient, "inventory");
    }

    #[tokio::test]
    async fn test_wait_for_mentions_answers_without_blocking() {
        let router = ToolRouter::new(bridge_tools());
        let (bridge, tx) = ChannelBridge::new();
        let mut state = SessionState::default();
        let mut ctx = ToolContext::new(&mut state, "greeter");
        let call = ToolCall::new("w1", "wait_for_mentions", Value::Null);

        let out = router.dispatch(&call, &mut ctx, &bridge).await.unwrap();
        assert_eq!(out, ToolOutcome::answer(NO_PENDING_MENTIONS));

        tx.send(crate::bridge::Mention::new("inventory", "stock?"))
            .await
            .unwrap();
        let out = router.dispatch(&call, &mut ctx, &bridge).await.unwrap();
        assert_eq!(out, ToolOutcome::answer("Message from inventory: stock?"));
    }
}
