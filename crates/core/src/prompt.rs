//! Turns a validated [`AdvisoryInput`] into the text sent to the model.
//!
//! The template shape never changes: every field has a fixed label and line, and an
//! undisclosed optional field is rendered as [`NOT_DISCLOSED`] instead of being dropped.

use crate::domain::advisory::AdvisoryInput;

pub const PREAMBLE: &str = "You are an AI investment advisor. Based on the user's financial information and goals, provide personalized investment suggestions.";

pub const CLOSING_INSTRUCTION: &str = "Respond with investment suggestions and the reasoning behind them. Reply with a JSON object containing exactly two non-empty string fields: \"suggestions\" and \"reasoning\".";

pub const NOT_DISCLOSED: &str = "(not disclosed)";

pub const LABEL_INCOME: &str = "Income";
pub const LABEL_EXPENSES: &str = "Expenses";
pub const LABEL_INVESTMENT_GOALS: &str = "Investment Goals";
pub const LABEL_RISK_TOLERANCE: &str = "Risk Tolerance";
pub const LABEL_CURRENT_INVESTMENTS: &str = "Current Investments";

pub fn render(input: &AdvisoryInput) -> String {
    let current_investments = input.current_investments().unwrap_or(NOT_DISCLOSED);

    [
        PREAMBLE.to_string(),
        String::new(),
        format!("{LABEL_INCOME}: {}", input.income()),
        format!("{LABEL_EXPENSES}: {}", input.expenses()),
        format!("{LABEL_INVESTMENT_GOALS}: {}", input.investment_goals()),
        format!("{LABEL_RISK_TOLERANCE}: {}", input.risk_tolerance()),
        format!("{LABEL_CURRENT_INVESTMENTS}: {current_investments}"),
        String::new(),
        CLOSING_INSTRUCTION.to_string(),
    ]
    .join("\n")
}
