//! Tools shared by several agents

use schemars::JsonSchema;
use serde::Deserialize;

use crate::agent::AgentKind;
use crate::error::Result;
use crate::tool::{tool_typed, NoArgs, ToolContext, ToolDef, ToolOutcome};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NameArgs {
    /// The customer's name
    pub name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PhoneArgs {
    /// The customer's phone number
    pub phone: String,
}

pub fn update_name(ctx: &mut ToolContext<'_>, args: NameArgs) -> Result<ToolOutcome> {
    let answer = format!("The name is updated to {}", args.name);
    ctx.state.customer_name = Some(args.name);
    Ok(ToolOutcome::answer(answer))
}

pub fn update_phone(ctx: &mut ToolContext<'_>, args: PhoneArgs) -> Result<ToolOutcome> {
    let answer = format!("The phone number is updated to {}", args.phone);
    ctx.state.customer_phone = Some(args.phone);
    Ok(ToolOutcome::answer(answer))
}

pub fn to_greeter(ctx: &mut ToolContext<'_>, _args: NoArgs) -> Result<ToolOutcome> {
    ctx.transfer_to(AgentKind::Greeter.name())
}

pub fn update_name_tool() -> ToolDef {
    tool_typed(
        "update_name",
        "Called when the user provides their name. \
         Confirm the spelling with the user before calling the function.",
        update_name,
    )
}

pub fn update_phone_tool() -> ToolDef {
    tool_typed(
        "update_phone",
        "Called when the user provides their phone number. \
         Confirm the spelling with the user before calling the function.",
        update_phone,
    )
}

pub fn to_greeter_tool() -> ToolDef {
    tool_typed(
        "to_greeter",
        "Called when the user asks unrelated questions or requests \
         services outside your job description.",
        to_greeter,
    )
}
