//! The four shopping agents
//!
//! Each submodule builds one [`Agent`] with its persona and domain tools.
//! [`registry`] assembles the fixed set a session routes between.

pub mod cart;
pub mod checkout;
pub mod greeter;
pub mod shared;
pub mod takeaway;

use crate::agent::Agent;
use crate::state::AgentRegistry;

/// Product catalog used when none is configured.
pub const DEFAULT_CATALOG: &str = "Laptop (new): $1200, Laptop (used): $800, \
Mouse (new): $25, Mouse (used): $15, \
Keyboard (new): $75, Keyboard (used): $50, \
Monitor (new): $300, Monitor (used): $200";

/// All four agents, sharing one catalog.
pub fn all_agents(catalog: &str) -> Vec<Agent> {
    vec![
        greeter::agent(catalog),
        cart::agent(catalog),
        takeaway::agent(catalog),
        checkout::agent(catalog),
    ]
}

/// Registry with all four agents.
pub fn registry(catalog: &str) -> AgentRegistry {
    AgentRegistry::from_agents(all_agents(catalog))
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_has_fixed_names() {
        let registry = registry(DEFAULT_CATALOG);
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["checkout", "greeter", "shopping_cart", "takeaway"]);
    }

    #[test]
    fn test_every_agent_exposes_bridge_tools() {
        for agent in all_agents(DEFAULT_CATALOG) {
            let tools = agent.tools();
            assert!(tools.contains("wait_for_mentions"), "{}", agent.name());
            assert!(tools.contains("send_message"), "{}", agent.name());
        }
    }

    #[test]
    fn test_catalog_reaches_instructions() {
        for agent in all_agents("Widget: $1") {
            assert!(agent.instructions().contains("Widget: $1"), "{}", agent.name());
        }
    }
}
