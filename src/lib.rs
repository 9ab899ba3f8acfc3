//! # Shopping agents
//!
//! One ongoing shopping conversation routed across four specialised agents
//! (greeter, shopping cart, takeaway order, checkout) that share a single
//! mutable session state.
//!
//! ## Core Concepts
//!
//! - **SessionState**: customer, cart, order, card and expense data plus the
//!   fixed agent registry; lent to one tool call at a time
//! - **ChatContext**: identity-tagged conversation items with filtered copy,
//!   truncation and id-dedup merge
//! - **Tools**: typed handlers returning either an answer or a transfer to
//!   another agent
//! - **Handoff**: on a transfer the target rebuilds its context from its own
//!   history, a bounded tail of the previous agent's history and a snapshot
//!   of the session state
//! - **ModelService**: the language model is a Tower service, so any
//!   provider (or a scripted one in tests) plugs in
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shopping_agents::{ChannelBridge, OpenAIProvider, Session, ShopConfig};
//!
//! # async fn example() -> shopping_agents::Result<()> {
//! let config = ShopConfig::from_env();
//! let (bridge, _mentions) = ChannelBridge::new();
//! let provider = OpenAIProvider::from_config(&config);
//!
//! let mut session = Session::from_config(&config, provider, Arc::new(bridge));
//! session.start("greeter").await?;
//! let outcome = session.handle_turn("I'd like a used monitor").await?;
//! for reply in outcome.replies {
//!     println!("[{}] {}", reply.agent, reply.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agents;
pub mod bridge;
pub mod config;
pub mod error;
pub mod items;
pub mod provider;
pub mod session;
pub mod state;
pub mod tool;

pub use agent::{Agent, AgentKind, DEFAULT_CARRY_OVER};
pub use bridge::{ChannelBridge, Mention, MentionBridge, MentionListener, OutboundMessage};
pub use config::{ConfigBuilder, LlmProvider, ShopConfig};
pub use error::{Result, ShopError};
pub use items::{ChatContext, ConversationItem, ItemContent, Role, ToolCall};
pub use provider::{
    ModelReply, ModelRequest, ModelService, OpenAIProvider, ScriptedProvider, ToolChoice,
};
pub use session::{AgentReply, Session, Transition, Turn, TurnOutcome};
pub use state::{AgentName, AgentRegistry, SessionState, StateSnapshot};
pub use tool::{tool_typed, ToolContext, ToolDef, ToolOutcome, ToolRouter, ToolSpec};
