use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    /// Applied when the caller leaves the field out.
    #[default]
    Medium,
    High,
}

impl RiskTolerance {
    pub const ALL: [RiskTolerance; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Exact, case-sensitive match against the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|risk| risk.as_str() == value)
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's financial snapshot for a single advisory request.
///
/// Only obtainable through [`AdvisoryInput::validate`], so holding one means every field
/// constraint already passed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryInput {
    pub(in crate::domain) income: f64,
    pub(in crate::domain) expenses: f64,
    pub(in crate::domain) investment_goals: String,
    pub(in crate::domain) risk_tolerance: RiskTolerance,
    pub(in crate::domain) current_investments: Option<String>,
}

impl AdvisoryInput {
    /// Monthly income, always > 0.
    pub fn income(&self) -> f64 {
        self.income
    }

    /// Monthly expenses, always > 0.
    pub fn expenses(&self) -> f64 {
        self.expenses
    }

    pub fn investment_goals(&self) -> &str {
        &self.investment_goals
    }

    pub fn risk_tolerance(&self) -> RiskTolerance {
        self.risk_tolerance
    }

    /// `None` means "not disclosed", not "no investments".
    pub fn current_investments(&self) -> Option<&str> {
        self.current_investments.as_deref()
    }
}

/// The model's answer after it passed the output contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvisoryOutput {
    pub(in crate::domain) suggestions: String,
    pub(in crate::domain) reasoning: String,
}

impl AdvisoryOutput {
    pub fn suggestions(&self) -> &str {
        &self.suggestions
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_tolerance_parses_only_the_closed_set() {
        assert_eq!(RiskTolerance::parse("low"), Some(RiskTolerance::Low));
        assert_eq!(RiskTolerance::parse("medium"), Some(RiskTolerance::Medium));
        assert_eq!(RiskTolerance::parse("high"), Some(RiskTolerance::High));

        for bad in ["", "Low", "HIGH", "moderate", " medium", "very high"] {
            assert_eq!(RiskTolerance::parse(bad), None, "{bad:?} should be rejected");
        }
    }

    #[test]
    fn risk_tolerance_defaults_to_medium() {
        assert_eq!(RiskTolerance::default(), RiskTolerance::Medium);
    }

    #[test]
    fn risk_tolerance_serializes_lowercase() {
        let v = serde_json::to_value(RiskTolerance::High).unwrap();
        assert_eq!(v, serde_json::json!("high"));
    }
}
