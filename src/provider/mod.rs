//! Language-generation collaborator
//!
//! What this module provides
//! - The request/response models the session controller exchanges with a
//!   language model: the active agent's context, the tools it exposes, and
//!   whether the model may call a tool on this turn
//!
//! Exports
//! - Models
//!   - `ModelRequest { agent, items, tools, tool_choice, parallel_tool_calls }`
//!   - `ModelReply::{Message, ToolCalls}`
//!   - `ToolChoice::{Auto, None}`
//! - Services
//!   - `ModelService: Service<ModelRequest, Response = ModelReply, Error = BoxError>`
//!   - Implementations: [`OpenAIProvider`], [`ScriptedProvider`]
//!
//! Testing strategy
//! - Swap in `ScriptedProvider` to replay canned replies and inspect the
//!   requests the controller built

pub mod openai;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tower::{BoxError, Service};

use crate::items::{ConversationItem, ToolCall};
use crate::state::AgentName;
use crate::tool::ToolSpec;

pub use openai::OpenAIProvider;

/// Whether the model may request tools on this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    /// Used for the introduction right after a handoff.
    None,
}

/// One generation request for the active agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub agent: AgentName,
    pub items: Vec<ConversationItem>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
    pub parallel_tool_calls: Option<bool>,
}

/// What the model produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelReply {
    Message(String),
    ToolCalls(Vec<ToolCall>),
}

impl ModelReply {
    pub fn message(text: impl Into<String>) -> Self {
        ModelReply::Message(text.into())
    }

    /// A single tool call.
    pub fn call(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        ModelReply::ToolCalls(vec![ToolCall::new(id, name, arguments)])
    }
}

pub trait ModelService:
    Service<ModelRequest, Response = ModelReply, Error = BoxError> + Send
{
}
impl<T> ModelService for T where
    T: Service<ModelRequest, Response = ModelReply, Error = BoxError> + Send
{
}

/// Replays a fixed queue of replies and records every request.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<ModelReply>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
    fallback: Option<String>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            ..Default::default()
        }
    }

    /// Reply with `text` once the script runs out instead of failing.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Append to the script; clones share the same queue.
    pub fn push(&self, reply: ModelReply) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl Service<ModelRequest> for ScriptedProvider {
    type Response = ModelReply;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ModelRequest) -> Self::Future {
        let replies = self.replies.clone();
        let requests = self.requests.clone();
        let fallback = self.fallback.clone();
        Box::pin(async move {
            requests
                .lock()
                .map_err(|_| "request log poisoned")?
                .push(req);
            let next = replies
                .lock()
                .map_err(|_| "reply script poisoned")?
                .pop_front();
            match (next, fallback) {
                (Some(reply), _) => Ok(reply),
                (None, Some(text)) => Ok(ModelReply::Message(text)),
                (None, None) => Err("scripted provider exhausted".into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn request() -> ModelRequest {
        ModelRequest {
            agent: "greeter".into(),
            items: vec![ConversationItem::user("hi")],
            tools: vec![],
            tool_choice: ToolChoice::Auto,
            parallel_tool_calls: None,
        }
    }

    #[tokio::test]
    async fn scripted_provider_replays_in_order() {
        let mut p = ScriptedProvider::new(vec![
            ModelReply::message("one"),
            ModelReply::call("c1", "view_cart", serde_json::json!({})),
        ]);
        let first = p.ready().await.unwrap().call(request()).await.unwrap();
        assert_eq!(first, ModelReply::message("one"));
        let second = p.ready().await.unwrap().call(request()).await.unwrap();
        assert!(matches!(second, ModelReply::ToolCalls(ref calls) if calls[0].name == "view_cart"));
        assert_eq!(p.requests().len(), 2);
        assert_eq!(p.remaining(), 0);
    }

    #[tokio::test]
    async fn scripted_provider_push_through_clone() {
        let handle = ScriptedProvider::new(vec![]);
        let mut p = handle.clone();
        handle.push(ModelReply::message("late"));
        assert_eq!(p.remaining(), 1);

        let reply = p.ready().await.unwrap().call(request()).await.unwrap();
        assert_eq!(reply, ModelReply::message("late"));
        assert_eq!(handle.requests().len(), 1);
    }

    #[tokio::test]
    async fn scripted_provider_fallback_and_exhaustion() {
        let mut p = ScriptedProvider::new(vec![]);
        assert!(p.ready().await.unwrap().call(request()).await.is_err());

        let mut p = ScriptedProvider::new(vec![]).with_fallback("ok");
        let reply = p.ready().await.unwrap().call(request()).await.unwrap();
        assert_eq!(reply, ModelReply::message("ok"));
    }
}
