//! Shared session state
//!
//! One [`SessionState`] exists per conversation. The session controller owns
//! it and lends it, mutably, to exactly one tool call at a time.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::agent::Agent;
use crate::error::Result;

/// Registry key of an agent (`greeter`, `shopping_cart`, ...).
pub type AgentName = String;

const UNKNOWN: &str = "unknown";

/// The fixed set of agents of a session, keyed by name.
///
/// Membership is decided at construction; agents can be looked up and their
/// chat contexts updated, but none can be added or removed afterwards.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentName, Agent>,
}

impl AgentRegistry {
    pub fn from_agents(agents: impl IntoIterator<Item = Agent>) -> Self {
        Self {
            agents: agents
                .into_iter()
                .map(|agent| (agent.name().to_string(), agent))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Agent> {
        self.agents.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// All transaction data of one conversation plus the agent registry.
#[derive(Debug, Default)]
pub struct SessionState {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,

    pub cart: Vec<String>,
    pub order: Option<Vec<String>>,

    pub card_number: Option<String>,
    pub card_expiry: Option<String>,
    pub card_cvv: Option<String>,

    pub expense: Option<f64>,
    pub checked_out: bool,

    pub agents: AgentRegistry,
    pub previous_agent: Option<AgentName>,
}

impl SessionState {
    pub fn new(agents: AgentRegistry) -> Self {
        Self {
            agents,
            ..Default::default()
        }
    }

    /// True when number, expiry and CVV are all present and non-empty.
    pub fn has_complete_card(&self) -> bool {
        [&self.card_number, &self.card_expiry, &self.card_cvv]
            .iter()
            .all(|field| field.as_deref().is_some_and(|v| !v.is_empty()))
    }

    pub fn has_order(&self) -> bool {
        self.order.as_ref().is_some_and(|items| !items.is_empty())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let credit_card = self
            .card_number
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(|number| CardSnapshot {
                number: number.to_string(),
                expiry: or_unknown(self.card_expiry.clone()),
                cvv: or_unknown(self.card_cvv.clone()),
            });

        StateSnapshot {
            customer_name: or_unknown(self.customer_name.clone()),
            customer_phone: or_unknown(self.customer_phone.clone()),
            shopping_cart: non_empty_or_unknown(Some(&self.cart)),
            order: non_empty_or_unknown(self.order.as_ref()),
            credit_card,
            expense: self
                .expense
                .map(Value::from)
                .unwrap_or_else(|| Value::from(UNKNOWN)),
            checked_out: self.checked_out,
        }
    }

    /// YAML rendering of [`SessionState::snapshot`].
    pub fn summarize(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.snapshot())?)
    }
}

/// Serialized view of the transaction data handed to an agent on activation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub customer_name: Value,
    pub customer_phone: Value,
    pub shopping_cart: Value,
    pub order: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card: Option<CardSnapshot>,
    pub expense: Value,
    pub checked_out: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardSnapshot {
    pub number: String,
    pub expiry: Value,
    pub cvv: Value,
}

fn or_unknown(value: Option<String>) -> Value {
    match value {
        Some(v) if !v.is_empty() => Value::String(v),
        _ => Value::from(UNKNOWN),
    }
}

fn non_empty_or_unknown(items: Option<&Vec<String>>) -> Value {
    match items {
        Some(items) if !items.is_empty() => Value::from(items.clone()),
        _ => Value::from(UNKNOWN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_state_snapshot_is_unknown() {
        let state = SessionState::default();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.customer_name, Value::from("unknown"));
        assert_eq!(snapshot.shopping_cart, Value::from("unknown"));
        assert_eq!(snapshot.order, Value::from("unknown"));
        assert_eq!(snapshot.expense, Value::from("unknown"));
        assert!(snapshot.credit_card.is_none());
        assert!(!snapshot.checked_out);
    }

    #[test]
    fn test_summary_omits_card_without_number() {
        let state = SessionState {
            card_expiry: Some("12/29".into()),
            ..Default::default()
        };
        let yaml = state.summarize().unwrap();
        assert!(!yaml.contains("credit_card"));
        assert!(yaml.contains("customer_name: unknown"));
        assert!(yaml.contains("checked_out: false"));
    }

    #[test]
    fn test_summary_nests_card_group() {
        let state = SessionState {
            customer_name: Some("Ada".into()),
            cart: vec!["Mouse (new)".into()],
            card_number: Some("4111111111111111".into()),
            expense: Some(42.5),
            ..Default::default()
        };
        let yaml = state.summarize().unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed["customer_name"], serde_yaml::Value::from("Ada"));
        assert_eq!(parsed["shopping_cart"][0], serde_yaml::Value::from("Mouse (new)"));
        assert_eq!(parsed["credit_card"]["number"], serde_yaml::Value::from("4111111111111111"));
        assert_eq!(parsed["credit_card"]["cvv"], serde_yaml::Value::from("unknown"));
        assert_eq!(parsed["expense"], serde_yaml::Value::from(42.5));
    }

    #[test]
    fn test_card_completeness() {
        let mut state = SessionState {
            card_number: Some("4111".into()),
            card_expiry: Some("01/30".into()),
            ..Default::default()
        };
        assert!(!state.has_complete_card());
        state.card_cvv = Some(String::new());
        assert!(!state.has_complete_card());
        state.card_cvv = Some("123".into());
        assert!(state.has_complete_card());
    }

    #[test]
    fn test_has_order() {
        let mut state = SessionState::default();
        assert!(!state.has_order());
        state.order = Some(vec![]);
        assert!(!state.has_order());
        state.order = Some(vec!["Laptop (new)".into()]);
        assert!(state.has_order());
    }
}
