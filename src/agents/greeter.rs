//! Greeter: first point of contact, routes browsing to the cart agent

use crate::agent::{Agent, AgentKind};
use crate::error::Result;
use crate::tool::{tool_typed, NoArgs, ToolContext, ToolOutcome};

pub fn instructions(catalog: &str) -> String {
    format!(
        "You are a friendly shopping assistant. Stay silent until an external agent \
         mentions you; introduce yourself without waiting for a reply to your greeting, \
         then keep calling the wait_for_mentions tool to listen for messages from \
         external agents. The product catalog is: {catalog}\n\
         Your job is to greet whoever mentions you, understand what they want and help \
         with their shopping needs. Guide them to the right agent using tools.\n\
         External agent communication:\n\
         - Use wait_for_mentions all the time to check for messages from external agents\n\
         - Use send_message to respond to external agents when they contact you\n\
         - If customers want to reach external services, relay their messages with send_message\n"
    )
}

pub fn to_shopping_cart(ctx: &mut ToolContext<'_>, _args: NoArgs) -> Result<ToolOutcome> {
    ctx.transfer_to(AgentKind::ShoppingCart.name())
}

pub fn agent(catalog: &str) -> Agent {
    Agent::new(
        AgentKind::Greeter,
        instructions(catalog),
        vec![tool_typed(
            "to_shopping_cart",
            "Called when the user wants to manage their shopping cart, like adding, \
             removing, or viewing items.",
            to_shopping_cart,
        )],
    )
    .with_parallel_tool_calls(false)
}
