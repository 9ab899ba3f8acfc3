//! Checkout: confirms the expense, collects payment details, completes the
//! transaction

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use crate::agent::{Agent, AgentKind};
use crate::agents::shared;
use crate::error::Result;
use crate::tool::{tool_typed, NoArgs, ToolContext, ToolOutcome};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExpenseArgs {
    /// The expense of the order
    pub expense: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CardArgs {
    /// The credit card number
    pub number: String,
    /// The expiry date of the credit card
    pub expiry: String,
    /// The CVV of the credit card
    pub cvv: String,
}

pub fn instructions(catalog: &str) -> String {
    format!(
        "You are a checkout agent. The menu is: {catalog}\n\
         You are responsible for confirming the expense of the order and then \
         collecting the customer's name, phone number and credit card information, \
         including the card number, expiry date, and CVV, step by step."
    )
}

pub fn confirm_expense(ctx: &mut ToolContext<'_>, args: ExpenseArgs) -> Result<ToolOutcome> {
    if !args.expense.is_finite() || args.expense < 0.0 {
        warn!(expense = args.expense, "rejected expense");
        return Ok(ToolOutcome::answer(
            "The expense must be a non-negative amount. Please confirm it again.",
        ));
    }
    ctx.state.expense = Some(args.expense);
    Ok(ToolOutcome::answer(format!(
        "The expense is confirmed to be {}",
        args.expense
    )))
}

pub fn update_credit_card(ctx: &mut ToolContext<'_>, args: CardArgs) -> Result<ToolOutcome> {
    let answer = format!("The credit card number is updated to {}", args.number);
    ctx.state.card_number = Some(args.number);
    ctx.state.card_expiry = Some(args.expiry);
    ctx.state.card_cvv = Some(args.cvv);
    Ok(ToolOutcome::answer(answer))
}

/// Completes the transaction once expense and card are known.
pub fn confirm_checkout(ctx: &mut ToolContext<'_>, _args: NoArgs) -> Result<ToolOutcome> {
    if ctx.state.expense.is_none() {
        warn!("checkout confirmation without expense");
        return Ok(ToolOutcome::answer("Please confirm the expense first."));
    }
    if !ctx.state.has_complete_card() {
        warn!("checkout confirmation without complete card details");
        return Ok(ToolOutcome::answer(
            "Please provide the credit card information first.",
        ));
    }

    // transfer first so an unregistered greeter leaves the state untouched
    let outcome = ctx.transfer_to(AgentKind::Greeter.name())?;
    ctx.state.checked_out = true;
    info!(expense = ?ctx.state.expense, "checkout completed");
    Ok(outcome)
}

pub fn to_takeaway(ctx: &mut ToolContext<'_>, _args: NoArgs) -> Result<ToolOutcome> {
    ctx.transfer_to(AgentKind::Takeaway.name())
}

pub fn agent(catalog: &str) -> Agent {
    Agent::new(
        AgentKind::Checkout,
        instructions(catalog),
        vec![
            shared::update_name_tool(),
            shared::update_phone_tool(),
            shared::to_greeter_tool(),
            tool_typed(
                "confirm_expense",
                "Called when the user confirms the expense.",
                confirm_expense,
            ),
            tool_typed(
                "update_credit_card",
                "Called when the user provides their credit card number, expiry date, \
                 and CVV. Confirm the spelling with the user before calling the function.",
                update_credit_card,
            ),
            tool_typed(
                "confirm_checkout",
                "Called when the user confirms the checkout.",
                confirm_checkout,
            ),
            tool_typed(
                "to_takeaway",
                "Called when the user wants to update their order.",
                to_takeaway,
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::state;
    use crate::state::SessionState;
    use pretty_assertions::assert_eq;

    fn card() -> CardArgs {
        CardArgs {
            number: "4111111111111111".into(),
            expiry: "12/29".into(),
            cvv: "123".into(),
        }
    }

    fn confirm(state: &mut SessionState) -> ToolOutcome {
        let mut ctx = ToolContext::new(state, "checkout");
        confirm_checkout(&mut ctx, NoArgs {}).unwrap()
    }

    #[test]
    fn test_confirm_without_expense() {
        let mut state = state();
        let out = confirm(&mut state);
        assert_eq!(out, ToolOutcome::answer("Please confirm the expense first."));
        assert!(out.text().contains("expense"));
        assert!(!state.checked_out);
        assert!(state.previous_agent.is_none());
    }

    #[test]
    fn test_confirm_without_card() {
        let mut state = state();
        state.expense = Some(42.5);
        state.card_number = Some("4111".into());
        let out = confirm(&mut state);
        assert_eq!(
            out,
            ToolOutcome::answer("Please provide the credit card information first.")
        );
        assert!(!state.checked_out);
    }

    #[test]
    fn test_confirm_with_expense_and_card() {
        let mut state = state();
        {
            let mut ctx = ToolContext::new(&mut state, "checkout");
            let out = confirm_expense(&mut ctx, ExpenseArgs { expense: 42.5 }).unwrap();
            assert_eq!(out.text(), "The expense is confirmed to be 42.5");
            update_credit_card(&mut ctx, card()).unwrap();
        }
        let out = confirm(&mut state);
        assert_eq!(
            out,
            ToolOutcome::Transfer {
                target: "greeter".into(),
                message: "Transferring to greeter.".into(),
            }
        );
        assert!(state.checked_out);
        assert_eq!(state.previous_agent.as_deref(), Some("checkout"));
    }

    #[test]
    fn test_negative_expense_is_rejected() {
        let mut state = state();
        let mut ctx = ToolContext::new(&mut state, "checkout");
        let out = confirm_expense(&mut ctx, ExpenseArgs { expense: -3.0 }).unwrap();
        assert!(!out.is_transfer());
        assert!(state.expense.is_none());
    }

    #[test]
    fn test_to_takeaway() {
        let mut state = state();
        let mut ctx = ToolContext::new(&mut state, "checkout");
        let out = to_takeaway(&mut ctx, NoArgs {}).unwrap();
        assert_eq!(out.text(), "Transferring to takeaway.");
    }

    #[test]
    fn test_checkout_tool_list() {
        let names = agent("catalog").tools().names();
        for expected in [
            "update_name",
            "update_phone",
            "to_greeter",
            "confirm_expense",
            "update_credit_card",
            "confirm_checkout",
            "to_takeaway",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }
}
