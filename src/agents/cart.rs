//! Shopping cart: add, remove and list items

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

use crate::agent::{Agent, AgentKind};
use crate::agents::shared;
use crate::error::Result;
use crate::tool::{tool_typed, NoArgs, ToolContext, ToolOutcome};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ItemArgs {
    /// The catalog item, e.g. "Mouse (new)"
    pub item: String,
}

pub fn instructions(catalog: &str) -> String {
    format!(
        "You are a shopping cart agent. Your job is to manage the user's shopping cart. \
         The product catalog is: {catalog}\n\
         You can add items, remove items, and view the current cart."
    )
}

pub fn add_to_cart(ctx: &mut ToolContext<'_>, args: ItemArgs) -> Result<ToolOutcome> {
    ctx.state.cart.push(args.item.clone());
    Ok(ToolOutcome::answer(format!(
        "Added {} to your cart. Your cart now has: {}",
        args.item,
        ctx.state.cart.join(", ")
    )))
}

/// Removes the first occurrence of the item.
pub fn remove_from_cart(ctx: &mut ToolContext<'_>, args: ItemArgs) -> Result<ToolOutcome> {
    let cart = &mut ctx.state.cart;
    match cart.iter().position(|i| *i == args.item) {
        Some(idx) => {
            cart.remove(idx);
            Ok(ToolOutcome::answer(format!(
                "Removed {} from your cart. Your cart now has: {}",
                args.item,
                cart.join(", ")
            )))
        }
        None => {
            warn!(item = %args.item, "remove requested for item not in cart");
            Ok(ToolOutcome::answer(format!("{} is not in your cart.", args.item)))
        }
    }
}

pub fn view_cart(ctx: &mut ToolContext<'_>, _args: NoArgs) -> Result<ToolOutcome> {
    if ctx.state.cart.is_empty() {
        return Ok(ToolOutcome::answer("Your shopping cart is empty."));
    }
    Ok(ToolOutcome::answer(format!(
        "Your cart contains: {}",
        ctx.state.cart.join(", ")
    )))
}

pub fn agent(catalog: &str) -> Agent {
    Agent::new(
        AgentKind::ShoppingCart,
        instructions(catalog),
        vec![
            shared::to_greeter_tool(),
            tool_typed("add_to_cart", "Adds an item to the shopping cart.", add_to_cart),
            tool_typed(
                "remove_from_cart",
                "Removes an item from the shopping cart.",
                remove_from_cart,
            ),
            tool_typed(
                "view_cart",
                "Views the items currently in the shopping cart.",
                view_cart,
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::state;
    use pretty_assertions::assert_eq;

    fn item(name: &str) -> ItemArgs {
        ItemArgs { item: name.into() }
    }

    #[test]
    fn test_add_then_remove_leaves_cart_empty() {
        let mut state = state();
        let mut ctx = ToolContext::new(&mut state, "shopping_cart");

        let out = add_to_cart(&mut ctx, item("Mouse (new)")).unwrap();
        assert_eq!(
            out.text(),
            "Added Mouse (new) to your cart. Your cart now has: Mouse (new)"
        );
        remove_from_cart(&mut ctx, item("Mouse (new)")).unwrap();
        assert!(state.cart.is_empty());
    }

    #[test]
    fn test_remove_absent_item_is_an_answer() {
        let mut state = state();
        state.cart.push("Keyboard (used)".into());
        let mut ctx = ToolContext::new(&mut state, "shopping_cart");

        let out = remove_from_cart(&mut ctx, item("Mouse (new)")).unwrap();
        assert_eq!(out, ToolOutcome::answer("Mouse (new) is not in your cart."));
        assert_eq!(state.cart, vec!["Keyboard (used)".to_string()]);
    }

    #[test]
    fn test_duplicates_keep_order_and_remove_first() {
        let mut state = state();
        let mut ctx = ToolContext::new(&mut state, "shopping_cart");
        add_to_cart(&mut ctx, item("Mouse (new)")).unwrap();
        add_to_cart(&mut ctx, item("Monitor (used)")).unwrap();
        add_to_cart(&mut ctx, item("Mouse (new)")).unwrap();
        remove_from_cart(&mut ctx, item("Mouse (new)")).unwrap();

        assert_eq!(state.cart, vec!["Monitor (used)".to_string(), "Mouse (new)".to_string()]);
    }

    #[test]
    fn test_view_cart() {
        let mut state = state();
        let mut ctx = ToolContext::new(&mut state, "shopping_cart");
        let out = view_cart(&mut ctx, NoArgs {}).unwrap();
        assert_eq!(out.text(), "Your shopping cart is empty.");

        add_to_cart(&mut ctx, item("Laptop (new)")).unwrap();
        let out = view_cart(&mut ctx, NoArgs {}).unwrap();
        assert_eq!(out.text(), "Your cart contains: Laptop (new)");
    }
}
