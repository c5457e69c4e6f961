use crate::domain::advisory::{AdvisoryInput, AdvisoryOutput, RiskTolerance};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

pub const FIELD_INCOME: &str = "income";
pub const FIELD_EXPENSES: &str = "expenses";
pub const FIELD_INVESTMENT_GOALS: &str = "investmentGoals";
pub const FIELD_RISK_TOLERANCE: &str = "riskTolerance";
pub const FIELD_CURRENT_INVESTMENTS: &str = "currentInvestments";
pub const FIELD_SUGGESTIONS: &str = "suggestions";
pub const FIELD_REASONING: &str = "reasoning";

/// Field name used when the record itself has the wrong shape.
pub const FIELD_ROOT: &str = "$";

pub const MIN_INVESTMENT_GOALS_CHARS: usize = 10;

const REASON_REQUIRED: &str = "is required";
const REASON_NOT_NUMBER: &str = "must be a number";
const REASON_NOT_STRING: &str = "must be a string";
const REASON_NOT_OBJECT: &str = "must be a JSON object";
const REASON_EMPTY: &str = "must be non-empty";
const REASON_INCOME: &str = "Income must be a positive number.";
const REASON_EXPENSES: &str = "Expenses must be a positive number.";
const REASON_GOALS: &str = "Please describe your investment goals in at least 10 characters.";
const REASON_RISK: &str = "must be one of: low, medium, high";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every constraint a record failed, in field declaration order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} schema violation(s): {}", .violations.len(), summarize(.violations))]
pub struct ValidationError {
    violations: Vec<SchemaViolation>,
}

impl ValidationError {
    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<SchemaViolation> {
        self.violations
    }

    pub fn cites(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

pub(crate) fn summarize(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Shape declaration handed to the model client alongside the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema document.
    pub schema: Value,
}

#[derive(Debug, Default)]
struct Violations(Vec<SchemaViolation>);

impl Violations {
    fn push(&mut self, field: &str, reason: &str) {
        self.0.push(SchemaViolation {
            field: field.to_string(),
            reason: reason.to_string(),
        });
    }

    fn into_result<T>(self, value: Option<T>) -> Result<T, ValidationError> {
        match value {
            Some(value) if self.0.is_empty() => Ok(value),
            _ => Err(ValidationError { violations: self.0 }),
        }
    }
}

/// Borrowed view of the caller's record; `null` counts as absent.
struct RawAdvisoryInput<'a> {
    income: Option<&'a Value>,
    expenses: Option<&'a Value>,
    investment_goals: Option<&'a Value>,
    risk_tolerance: Option<&'a Value>,
    current_investments: Option<&'a Value>,
}

impl<'a> RawAdvisoryInput<'a> {
    fn from_object(obj: &'a Map<String, Value>) -> Self {
        let field = |name: &str| obj.get(name).filter(|v| !v.is_null());
        Self {
            income: field(FIELD_INCOME),
            expenses: field(FIELD_EXPENSES),
            investment_goals: field(FIELD_INVESTMENT_GOALS),
            risk_tolerance: field(FIELD_RISK_TOLERANCE),
            current_investments: field(FIELD_CURRENT_INVESTMENTS),
        }
    }

    fn validate_and_into_input(self) -> Result<AdvisoryInput, ValidationError> {
        let mut violations = Violations::default();

        let income = positive_amount(self.income, FIELD_INCOME, REASON_INCOME, &mut violations);
        let expenses =
            positive_amount(self.expenses, FIELD_EXPENSES, REASON_EXPENSES, &mut violations);

        let investment_goals = match self.investment_goals {
            None => {
                violations.push(FIELD_INVESTMENT_GOALS, REASON_REQUIRED);
                None
            }
            Some(Value::String(s)) => {
                // Length counts the text as typed; whitespace-only text is still rejected.
                if s.chars().count() >= MIN_INVESTMENT_GOALS_CHARS && !s.trim().is_empty() {
                    Some(s.clone())
                } else {
                    violations.push(FIELD_INVESTMENT_GOALS, REASON_GOALS);
                    None
                }
            }
            Some(_) => {
                violations.push(FIELD_INVESTMENT_GOALS, REASON_NOT_STRING);
                None
            }
        };

        let risk_tolerance = match self.risk_tolerance {
            None => Some(RiskTolerance::default()),
            Some(value) => {
                let parsed = value.as_str().and_then(RiskTolerance::parse);
                if parsed.is_none() {
                    violations.push(FIELD_RISK_TOLERANCE, REASON_RISK);
                }
                parsed
            }
        };

        let current_investments = match self.current_investments {
            None => None,
            Some(Value::String(s)) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Some(_) => {
                violations.push(FIELD_CURRENT_INVESTMENTS, REASON_NOT_STRING);
                None
            }
        };

        let input = match (income, expenses, investment_goals, risk_tolerance) {
            (Some(income), Some(expenses), Some(investment_goals), Some(risk_tolerance)) => {
                Some(AdvisoryInput {
                    income,
                    expenses,
                    investment_goals,
                    risk_tolerance,
                    current_investments,
                })
            }
            _ => None,
        };
        violations.into_result(input)
    }
}

/// Accepts a JSON number or a numeric string, matching how the web form coerces amounts.
/// A blank string coerces to 0 and so fails the positivity check.
fn positive_amount(
    value: Option<&Value>,
    field: &str,
    not_positive: &str,
    violations: &mut Violations,
) -> Option<f64> {
    let Some(value) = value else {
        violations.push(field, REASON_REQUIRED);
        return None;
    };

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite());

    match number {
        None => {
            violations.push(field, REASON_NOT_NUMBER);
            None
        }
        Some(n) if n <= 0.0 => {
            violations.push(field, not_positive);
            None
        }
        Some(n) => Some(n),
    }
}

impl AdvisoryInput {
    /// Validates an untyped caller record. All violations are reported together.
    pub fn validate(raw: &Value) -> Result<Self, ValidationError> {
        let Some(obj) = raw.as_object() else {
            let mut violations = Violations::default();
            violations.push(FIELD_ROOT, REASON_NOT_OBJECT);
            return violations.into_result(None);
        };
        RawAdvisoryInput::from_object(obj).validate_and_into_input()
    }

    pub fn schema() -> SchemaDescriptor {
        SchemaDescriptor {
            name: "advisory_input",
            description: "A user's monthly financial snapshot and investment preferences",
            schema: serde_json::json!({
                "type": "object",
                "required": [FIELD_INCOME, FIELD_EXPENSES, FIELD_INVESTMENT_GOALS],
                "properties": {
                    FIELD_INCOME: {
                        "type": "number",
                        "exclusiveMinimum": 0,
                        "description": "The user's monthly income."
                    },
                    FIELD_EXPENSES: {
                        "type": "number",
                        "exclusiveMinimum": 0,
                        "description": "The user's monthly expenses."
                    },
                    FIELD_INVESTMENT_GOALS: {
                        "type": "string",
                        "minLength": MIN_INVESTMENT_GOALS_CHARS,
                        "description": "The user's investment goals."
                    },
                    FIELD_RISK_TOLERANCE: {
                        "type": "string",
                        "enum": RiskTolerance::ALL.map(RiskTolerance::as_str),
                        "default": RiskTolerance::default().as_str(),
                        "description": "The user's risk tolerance."
                    },
                    FIELD_CURRENT_INVESTMENTS: {
                        "type": "string",
                        "description": "The user's current investments."
                    }
                }
            }),
        }
    }
}

impl AdvisoryOutput {
    /// The single gate model output passes before it is trusted. Valid text is kept verbatim.
    pub fn validate(raw: &Value) -> Result<Self, ValidationError> {
        let mut violations = Violations::default();
        let Some(obj) = raw.as_object() else {
            violations.push(FIELD_ROOT, REASON_NOT_OBJECT);
            return violations.into_result(None);
        };

        let mut required_text = |field: &str| match obj.get(field) {
            None | Some(Value::Null) => {
                violations.push(field, REASON_REQUIRED);
                None
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                violations.push(field, REASON_EMPTY);
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                violations.push(field, REASON_NOT_STRING);
                None
            }
        };

        let suggestions = required_text(FIELD_SUGGESTIONS);
        let reasoning = required_text(FIELD_REASONING);

        let output = suggestions
            .zip(reasoning)
            .map(|(suggestions, reasoning)| AdvisoryOutput {
                suggestions,
                reasoning,
            });
        violations.into_result(output)
    }

    pub fn schema() -> SchemaDescriptor {
        SchemaDescriptor {
            name: "emit_advisory",
            description: "Emit the personalized investment suggestions and the reasoning behind them",
            schema: serde_json::json!({
                "type": "object",
                "additionalProperties": false,
                "required": [FIELD_SUGGESTIONS, FIELD_REASONING],
                "properties": {
                    FIELD_SUGGESTIONS: {
                        "type": "string",
                        "minLength": 1,
                        "description": "Personalized investment suggestions based on user data."
                    },
                    FIELD_REASONING: {
                        "type": "string",
                        "minLength": 1,
                        "description": "Explanation of why the suggestions were made."
                    }
                }
            }),
        }
    }
}
