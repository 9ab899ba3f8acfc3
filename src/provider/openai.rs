//! OpenAI-compatible provider
//!
//! Maps an agent's conversation items onto chat-completion messages using
//! async-openai. Groq is served through the same adapter via its
//! OpenAI-compatible endpoint.

use std::collections::HashSet;
use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolChoiceOption,
        ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        FunctionCall, FunctionObjectArgs,
    },
    Client,
};
use futures::future::BoxFuture;
use serde_json::Value;
use tower::{BoxError, Service};
use tracing::{debug, error};

use crate::config::{LlmProvider, ShopConfig};
use crate::items::{ConversationItem, ItemContent, Role, ToolCall};
use crate::provider::{ModelReply, ModelRequest, ToolChoice};
use crate::tool::ToolSpec;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// `ModelService` backed by an OpenAI-compatible chat completion API.
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
}

impl OpenAIProvider {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Client and model as configured; unknown providers were already
    /// mapped to OpenAI by the configuration layer.
    pub fn from_config(config: &ShopConfig) -> Self {
        let mut openai = OpenAIConfig::new();
        if let Some(key) = &config.api_key {
            openai = openai.with_api_key(key);
        }
        if config.llm_provider == LlmProvider::Groq {
            openai = openai.with_api_base(GROQ_API_BASE);
        }
        Self::new(Arc::new(Client::with_config(openai)), config.llm_model.clone())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the chat completion request for `req`.
    pub fn build_request(
        &self,
        req: &ModelRequest,
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(to_openai_messages(&req.items)?);

        // tool_choice without tools is rejected by the API
        if !req.tools.is_empty() {
            builder.tools(to_openai_tools(&req.tools)?);
            builder.tool_choice(match req.tool_choice {
                ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
                ToolChoice::None => ChatCompletionToolChoiceOption::None,
            });
            if let Some(parallel) = req.parallel_tool_calls {
                builder.parallel_tool_calls(parallel);
            }
        }
        builder.build()
    }
}

impl Service<ModelRequest> for OpenAIProvider {
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
        let client = self.client.clone();
        let built = self.build_request(&req);
        let agent = req.agent;
        Box::pin(async move {
            let request = built?;
            debug!(%agent, messages = request.messages.len(), "chat completion request");
            let response = client.chat().create(request).await.map_err(|e| {
                error!(%agent, error = %e, "chat completion failed");
                e
            })?;

            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or("no choices in chat completion response")?;

            match choice.message.tool_calls {
                Some(calls) if !calls.is_empty() => Ok(ModelReply::ToolCalls(
                    calls.into_iter().map(from_openai_call).collect(),
                )),
                _ => Ok(ModelReply::Message(
                    choice.message.content.unwrap_or_default(),
                )),
            }
        })
    }
}

fn from_openai_call(tc: ChatCompletionMessageToolCall) -> ToolCall {
    let arguments = if tc.function.arguments.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null)
    };
    ToolCall::new(tc.id, tc.function.name, arguments)
}

fn to_openai_call(call: &ToolCall) -> ChatCompletionMessageToolCall {
    let arguments = match &call.arguments {
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    };
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments,
        },
    }
}

/// Convert conversation items to chat messages.
///
/// Consecutive tool-call records become one assistant message. Calls and
/// results whose counterpart was truncated away are dropped, since the API
/// rejects unmatched tool messages.
pub fn to_openai_messages(
    items: &[ConversationItem],
) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let answered: HashSet<&str> = items
        .iter()
        .filter_map(|item| match &item.content {
            ItemContent::ToolOutput { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        })
        .collect();

    let mut messages = Vec::with_capacity(items.len());
    let mut pending: Vec<ChatCompletionMessageToolCall> = Vec::new();
    let mut emitted: HashSet<&str> = HashSet::new();

    for item in items {
        if let ItemContent::ToolCall { call } = &item.content {
            if answered.contains(call.id.as_str()) {
                emitted.insert(call.id.as_str());
                pending.push(to_openai_call(call));
            }
            continue;
        }
        if !pending.is_empty() {
            messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(std::mem::take(&mut pending))
                    .build()?
                    .into(),
            );
        }
        match &item.content {
            ItemContent::Message { role, content } => {
                messages.push(text_message(*role, content)?);
            }
            ItemContent::ToolOutput {
                call_id, output, ..
            } => {
                if emitted.contains(call_id.as_str()) {
                    messages.push(
                        ChatCompletionRequestToolMessageArgs::default()
                            .content(output.clone())
                            .tool_call_id(call_id.clone())
                            .build()?
                            .into(),
                    );
                }
            }
            ItemContent::ToolCall { .. } => {}
        }
    }
    if !pending.is_empty() {
        messages.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .tool_calls(pending)
                .build()?
                .into(),
        );
    }
    Ok(messages)
}

fn text_message(role: Role, content: &str) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = content.to_string();
    Ok(match role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        // free-standing tool text has no call to attach to
        Role::Tool => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    })
}

/// Convert tool specs into function tools.
pub fn to_openai_tools(specs: &[ToolSpec]) -> Result<Vec<ChatCompletionTool>, OpenAIError> {
    specs
        .iter()
        .map(|spec| {
            let function = FunctionObjectArgs::default()
                .name(spec.name.clone())
                .description(spec.description.clone())
                .parameters(spec.parameters.clone())
                .build()?;
            ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function)
                .build()
        })
        .collect()
}
