//! Takeaway: records the order and hands over to checkout

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

use crate::agent::{Agent, AgentKind};
use crate::agents::shared;
use crate::error::Result;
use crate::tool::{tool_typed, NoArgs, ToolContext, ToolOutcome};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OrderArgs {
    /// The items of the full order
    pub items: Vec<String>,
}

pub fn instructions(catalog: &str) -> String {
    format!(
        "You are a takeaway agent that takes orders from the customer. \
         Our menu is: {catalog}\n\
         Clarify special requests and confirm the order with the customer."
    )
}

/// Replaces the whole order; items are never merged with a previous order.
pub fn update_order(ctx: &mut ToolContext<'_>, args: OrderArgs) -> Result<ToolOutcome> {
    let answer = format!("The order is updated to {:?}", args.items);
    ctx.state.order = Some(args.items);
    Ok(ToolOutcome::answer(answer))
}

pub fn to_checkout(ctx: &mut ToolContext<'_>, _args: NoArgs) -> Result<ToolOutcome> {
    if !ctx.state.has_order() {
        warn!("checkout requested without an order");
        return Ok(ToolOutcome::answer(
            "No takeaway order found. Please make an order first.",
        ));
    }
    ctx.transfer_to(AgentKind::Checkout.name())
}

pub fn agent(catalog: &str) -> Agent {
    Agent::new(
        AgentKind::Takeaway,
        instructions(catalog),
        vec![
            shared::to_greeter_tool(),
            tool_typed(
                "update_order",
                "Called when the user creates or updates their order.",
                update_order,
            ),
            tool_typed(
                "to_checkout",
                "Called when the user confirms the order.",
                to_checkout,
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::state;
    use pretty_assertions::assert_eq;

    fn order(items: &[&str]) -> OrderArgs {
        OrderArgs {
            items: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_update_order_replaces_previous_order() {
        let mut state = state();
        let mut ctx = ToolContext::new(&mut state, "takeaway");
        update_order(&mut ctx, order(&["Laptop (new)"])).unwrap();
        let out = update_order(&mut ctx, order(&["Keyboard (new)"])).unwrap();
        assert_eq!(out.text(), "The order is updated to [\"Keyboard (new)\"]");
        assert_eq!(state.order, Some(vec!["Keyboard (new)".to_string()]));
    }

    #[test]
    fn test_to_checkout_without_order_is_rejected() {
        let mut state = state();
        let mut ctx = ToolContext::new(&mut state, "takeaway");
        let out = to_checkout(&mut ctx, NoArgs {}).unwrap();
        assert_eq!(
            out,
            ToolOutcome::answer("No takeaway order found. Please make an order first.")
        );
        assert!(state.previous_agent.is_none());

        state.order = Some(vec![]);
        let mut ctx = ToolContext::new(&mut state, "takeaway");
        assert!(!to_checkout(&mut ctx, NoArgs {}).unwrap().is_transfer());
    }

    #[test]
    fn test_to_checkout_with_order_transfers() {
        let mut state = state();
        state.order = Some(vec!["Monitor (new)".into()]);
        let mut ctx = ToolContext::new(&mut state, "takeaway");
        let out = to_checkout(&mut ctx, NoArgs {}).unwrap();
        assert_eq!(
            out,
            ToolOutcome::Transfer {
                target: "checkout".into(),
                message: "Transferring to checkout.".into(),
            }
        );
        assert_eq!(state.previous_agent.as_deref(), Some("takeaway"));
    }
}
