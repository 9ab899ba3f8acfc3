//! Configuration for a shopping session
//!
//! Provider selection, model, per-turn tool budget, carry-over bound, the
//! product catalog and the external coordination endpoint.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agent::{AgentKind, DEFAULT_CARRY_OVER};
use crate::agents::DEFAULT_CATALOG;
use crate::error::{Result, ShopError};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_AGENT_ID: &str = "shopping-voice-agent";
pub const DEFAULT_AGENT_DESCRIPTION: &str = "You are a helpful shopping AI assistant that can help \
with finding products and managing a shopping cart.";
pub const DEFAULT_MAX_TOOL_STEPS: usize = 5;

/// Which OpenAI-compatible backend serves the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Groq,
}

impl LlmProvider {
    /// Case-insensitive; anything unrecognised falls back to OpenAI.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => LlmProvider::OpenAI,
            "groq" => LlmProvider::Groq,
            other => {
                warn!(provider = %other, "unknown LLM provider, defaulting to OpenAI");
                LlmProvider::OpenAI
            }
        }
    }
}

/// Text-to-speech voice per agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceTable {
    pub greeter: String,
    pub shopping_cart: String,
    pub takeaway: String,
    pub checkout: String,
}

impl Default for VoiceTable {
    fn default() -> Self {
        Self {
            greeter: AgentKind::Greeter.voice_id().to_string(),
            shopping_cart: AgentKind::ShoppingCart.voice_id().to_string(),
            takeaway: AgentKind::Takeaway.voice_id().to_string(),
            checkout: AgentKind::Checkout.voice_id().to_string(),
        }
    }
}

impl VoiceTable {
    pub fn voice_for(&self, kind: AgentKind) -> &str {
        match kind {
            AgentKind::Greeter => &self.greeter,
            AgentKind::ShoppingCart => &self.shopping_cart,
            AgentKind::Takeaway => &self.takeaway,
            AgentKind::Checkout => &self.checkout,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    /// Falls back to the provider client's own environment lookup when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model rounds allowed per turn before giving up
    pub max_tool_steps: usize,
    /// Items carried from the previous agent on a handoff
    pub carry_over_items: usize,
    pub product_catalog: String,

    /// Base URL of the external coordination service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coral_sse_url: Option<String>,
    pub agent_id: String,
    pub agent_description: String,

    pub voices: VoiceTable,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            llm_provider: LlmProvider::default(),
            llm_model: DEFAULT_MODEL.to_string(),
            api_key: None,
            max_tool_steps: DEFAULT_MAX_TOOL_STEPS,
            carry_over_items: DEFAULT_CARRY_OVER,
            product_catalog: DEFAULT_CATALOG.to_string(),
            coral_sse_url: None,
            agent_id: DEFAULT_AGENT_ID.to_string(),
            agent_description: DEFAULT_AGENT_DESCRIPTION.to_string(),
            voices: VoiceTable::default(),
        }
    }
}

impl ShopConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ShopConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = ShopConfig::default();

        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.llm_provider = LlmProvider::parse(&provider);
        }
        if let Some(model) = lookup("LLM_MODEL").filter(|m| !m.is_empty()) {
            config.llm_model = model;
        }
        config.api_key = lookup("API_KEY").filter(|k| !k.is_empty());

        if let Some(steps) = lookup("MAX_TOOL_STEPS") {
            match steps.parse::<usize>() {
                Ok(n) => config.max_tool_steps = n,
                Err(_) => warn!(value = %steps, "ignoring invalid MAX_TOOL_STEPS"),
            }
        }

        config.coral_sse_url = lookup("CORAL_SSE_URL").filter(|u| !u.is_empty());
        if let Some(id) = lookup("CORAL_SHOPPING_VOICE_AGENT_ID").filter(|i| !i.is_empty()) {
            config.agent_id = id;
        }

        config
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ShopError::ConfigError(e.to_string()))
    }

    /// Endpoint of the coordination service with this assistant's identity
    /// in the query string. `None` when no base URL is configured.
    pub fn mentions_url(&self) -> Option<String> {
        self.coral_sse_url.as_ref().map(|base| {
            format!(
                "{}?agentId={}&agentDescription={}",
                base,
                urlencoding::encode(&self.agent_id),
                urlencoding::encode(&self.agent_description)
            )
        })
    }
}

/// Configuration builder
pub struct ConfigBuilder {
    config: ShopConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ShopConfig::default(),
        }
    }

    pub fn provider(mut self, provider: LlmProvider) -> Self {
        self.config.llm_provider = provider;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.llm_model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn max_tool_steps(mut self, steps: usize) -> Self {
        self.config.max_tool_steps = steps;
        self
    }

    pub fn carry_over_items(mut self, items: usize) -> Self {
        self.config.carry_over_items = items;
        self
    }

    pub fn catalog(mut self, catalog: impl Into<String>) -> Self {
        self.config.product_catalog = catalog.into();
        self
    }

    pub fn coral_sse_url(mut self, url: impl Into<String>) -> Self {
        self.config.coral_sse_url = Some(url.into());
        self
    }

    pub fn agent_id(mut self, id: impl Into<String>) -> Self {
        self.config.agent_id = id.into();
        self
    }

    pub fn build(self) -> ShopConfig {
        self.config
    }
}
