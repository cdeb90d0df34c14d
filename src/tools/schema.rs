//! Tool input and output schemas
//!
//! Every payload crossing the registry is parsed into one of these structs.
//! Unknown fields are rejected and field constraints are checked after
//! parsing. The normalized form (defaults filled in) is what handlers and
//! callers see.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field constraints checked after structural parsing
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

fn non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} must not be empty", field));
    }
    Ok(())
}

fn non_negative(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must be a non-negative number", field));
    }
    Ok(())
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// Parse, check and normalize a payload as `T`
pub fn validate_as<T>(value: &Value) -> Result<Value, String>
where
    T: DeserializeOwned + Serialize + Validate,
{
    let parsed: T = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    parsed.validate()?;
    serde_json::to_value(&parsed).map_err(|e| e.to_string())
}

/// A named, type-erased schema check
#[derive(Clone, Copy)]
pub struct SchemaSpec {
    pub name: &'static str,
    check: fn(&Value) -> Result<Value, String>,
}

impl SchemaSpec {
    pub fn of<T>(name: &'static str) -> Self
    where
        T: DeserializeOwned + Serialize + Validate,
    {
        Self {
            name,
            check: validate_as::<T>,
        }
    }

    /// Validate `value`, returning its normalized form
    pub fn validate(&self, value: &Value) -> Result<Value, String> {
        (self.check)(value)
    }
}

impl std::fmt::Debug for SchemaSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaSpec").field("name", &self.name).finish()
    }
}

// ---- Read tools ----

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetCustomerProfileInput {
    pub customer_id: String,
}

impl Validate for GetCustomerProfileInput {
    fn validate(&self) -> Result<(), String> {
        non_empty("customer_id", &self.customer_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetCustomerProfileOutput {
    pub customer_id: String,
    pub preferred_language: String,
    pub loyalty_tier: String,
    pub account_age_days: u32,
    pub lifetime_orders: u32,
    pub ninety_day_compensation_total: f64,
    pub fraud_watch: bool,
}

impl Validate for GetCustomerProfileOutput {
    fn validate(&self) -> Result<(), String> {
        non_negative(
            "ninety_day_compensation_total",
            self.ninety_day_compensation_total,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetOrderDetailsInput {
    pub order_id: String,
}

impl Validate for GetOrderDetailsInput {
    fn validate(&self) -> Result<(), String> {
        non_empty("order_id", &self.order_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetOrderDetailsOutput {
    pub order_id: String,
    pub customer_id: String,
    pub currency: String,
    pub order_total: f64,
    pub item_count: u32,
    pub status: String,
}

impl Validate for GetOrderDetailsOutput {
    fn validate(&self) -> Result<(), String> {
        non_negative("order_total", self.order_total)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseHistoryRecord {
    pub case_id: String,
    pub order_id: String,
    pub complaint_type: String,
    pub decision: String,
    pub status: String,
    pub opened_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetCaseHistoryInput {
    pub customer_id: String,
}

impl Validate for GetCaseHistoryInput {
    fn validate(&self) -> Result<(), String> {
        non_empty("customer_id", &self.customer_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetCaseHistoryOutput {
    pub customer_id: String,
    pub open_case_count: u32,
    pub recent_escalations: u32,
    pub cases: Vec<CaseHistoryRecord>,
}

impl Validate for GetCaseHistoryOutput {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

// ---- Action tools ----

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCompensationInput {
    pub case_id: String,
    #[serde(rename = "type")]
    pub compensation_type: String,
    pub value: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Validate for CreateCompensationInput {
    fn validate(&self) -> Result<(), String> {
        non_empty("case_id", &self.case_id)?;
        non_negative("value", self.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCompensationOutput {
    pub compensation_id: String,
    pub status: String,
    pub applied_value: f64,
    pub currency: String,
    pub created_at: String,
}

impl Validate for CreateCompensationOutput {
    fn validate(&self) -> Result<(), String> {
        non_negative("applied_value", self.applied_value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueRefundInput {
    pub order_id: String,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Validate for IssueRefundInput {
    fn validate(&self) -> Result<(), String> {
        non_empty("order_id", &self.order_id)?;
        non_negative("amount", self.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueRefundOutput {
    pub refund_id: String,
    pub status: String,
    pub amount: f64,
    pub currency: String,
    pub processed_at: String,
}

impl Validate for IssueRefundOutput {
    fn validate(&self) -> Result<(), String> {
        non_negative("amount", self.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSupportTicketInput {
    pub case_payload: Map<String, Value>,
    pub priority: String,
}

impl Validate for CreateSupportTicketInput {
    fn validate(&self) -> Result<(), String> {
        non_empty("priority", &self.priority)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSupportTicketOutput {
    pub ticket_id: String,
    pub status: String,
    pub queue: String,
    pub created_at: String,
}

impl Validate for CreateSupportTicketOutput {
    fn validate(&self) -> Result<(), String> {
        non_empty("ticket_id", &self.ticket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_normalized_in() {
        let spec = SchemaSpec::of::<IssueRefundInput>("IssueRefundInput");
        let normalized = spec
            .validate(&json!({"order_id": "ORD-1", "amount": 12.5}))
            .unwrap();
        assert_eq!(normalized["currency"], "EUR");
        assert_eq!(normalized["amount"], 12.5);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let spec = SchemaSpec::of::<GetOrderDetailsInput>("GetOrderDetailsInput");
        let err = spec
            .validate(&json!({"order_id": "ORD-1", "force": true}))
            .unwrap_err();
        assert!(err.contains("force"));
    }

    #[test]
    fn test_constraints() {
        let refund = SchemaSpec::of::<IssueRefundInput>("IssueRefundInput");
        assert!(refund
            .validate(&json!({"order_id": "ORD-1", "amount": -1.0}))
            .is_err());
        assert!(refund
            .validate(&json!({"order_id": "  ", "amount": 1.0}))
            .is_err());

        let profile = SchemaSpec::of::<GetCustomerProfileOutput>("GetCustomerProfileOutput");
        let err = profile
            .validate(&json!({
                "customer_id": "C1",
                "preferred_language": "FR",
                "loyalty_tier": "GOLD",
                "account_age_days": -3,
                "lifetime_orders": 2,
                "ninety_day_compensation_total": 0.0,
                "fraud_watch": false
            }))
            .unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_type_field_renamed() {
        let spec = SchemaSpec::of::<CreateCompensationInput>("CreateCompensationInput");
        let normalized = spec
            .validate(&json!({"case_id": "CASE-1", "type": "VOUCHER", "value": 15.0}))
            .unwrap();
        assert_eq!(normalized["type"], "VOUCHER");
        assert!(normalized.get("compensation_type").is_none());
    }

    #[test]
    fn test_missing_field_rejected() {
        let spec = SchemaSpec::of::<CreateSupportTicketInput>("CreateSupportTicketInput");
        assert!(spec.validate(&json!({"priority": "HIGH"})).is_err());
        assert!(spec.validate(&json!("not an object")).is_err());
    }
}
