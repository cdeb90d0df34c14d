//! Back-office tool handlers
//!
//! Handlers receive input that already passed the input schema and know
//! nothing about roles, schemas or retries. They report failures as a
//! typed [`HandlerError`] so the registry can decide what to retry.

use super::role::Role;
use super::schema::{
    CaseHistoryRecord, CreateCompensationInput, CreateCompensationOutput,
    CreateSupportTicketInput, CreateSupportTicketOutput, GetCaseHistoryInput,
    GetCaseHistoryOutput, GetCustomerProfileInput, GetCustomerProfileOutput,
    GetOrderDetailsInput, GetOrderDetailsOutput, IssueRefundInput, IssueRefundOutput, SchemaSpec,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Failure reported by a handler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Safe to retry: the operation did not take effect
    #[error("transient failure: {0}")]
    Transient(String),
    /// The operation timed out; whether it took effect is unknown
    #[error("timed out: {0}")]
    Timeout(String),
    /// Retrying cannot help
    #[error("{0}")]
    Permanent(String),
}

/// Capability implemented by every tool handler
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, input: Value) -> std::result::Result<Value, HandlerError>;
}

/// The closed set of back-office tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    GetCustomerProfile,
    GetOrderDetails,
    GetCaseHistory,
    CreateCompensation,
    IssueRefund,
    CreateSupportTicket,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        Self::GetCustomerProfile,
        Self::GetOrderDetails,
        Self::GetCaseHistory,
        Self::CreateCompensation,
        Self::IssueRefund,
        Self::CreateSupportTicket,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetCustomerProfile => "get_customer_profile",
            Self::GetOrderDetails => "get_order_details",
            Self::GetCaseHistory => "get_case_history",
            Self::CreateCompensation => "create_compensation",
            Self::IssueRefund => "issue_refund",
            Self::CreateSupportTicket => "create_support_ticket",
        }
    }

    /// Read tools may be retried after a timeout; action tools may not
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Self::GetCustomerProfile | Self::GetOrderDetails | Self::GetCaseHistory
        )
    }

    pub fn allowed_role(&self) -> Role {
        if self.is_idempotent() {
            Role::ContextPolicy
        } else {
            Role::Resolution
        }
    }

    pub fn input_schema(&self) -> SchemaSpec {
        match self {
            Self::GetCustomerProfile => {
                SchemaSpec::of::<GetCustomerProfileInput>("GetCustomerProfileInput")
            }
            Self::GetOrderDetails => SchemaSpec::of::<GetOrderDetailsInput>("GetOrderDetailsInput"),
            Self::GetCaseHistory => SchemaSpec::of::<GetCaseHistoryInput>("GetCaseHistoryInput"),
            Self::CreateCompensation => {
                SchemaSpec::of::<CreateCompensationInput>("CreateCompensationInput")
            }
            Self::IssueRefund => SchemaSpec::of::<IssueRefundInput>("IssueRefundInput"),
            Self::CreateSupportTicket => {
                SchemaSpec::of::<CreateSupportTicketInput>("CreateSupportTicketInput")
            }
        }
    }

    pub fn output_schema(&self) -> SchemaSpec {
        match self {
            Self::GetCustomerProfile => {
                SchemaSpec::of::<GetCustomerProfileOutput>("GetCustomerProfileOutput")
            }
            Self::GetOrderDetails => {
                SchemaSpec::of::<GetOrderDetailsOutput>("GetOrderDetailsOutput")
            }
            Self::GetCaseHistory => SchemaSpec::of::<GetCaseHistoryOutput>("GetCaseHistoryOutput"),
            Self::CreateCompensation => {
                SchemaSpec::of::<CreateCompensationOutput>("CreateCompensationOutput")
            }
            Self::IssueRefund => SchemaSpec::of::<IssueRefundOutput>("IssueRefundOutput"),
            Self::CreateSupportTicket => {
                SchemaSpec::of::<CreateSupportTicketOutput>("CreateSupportTicketOutput")
            }
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Customer record as stored by the CRM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: String,
    pub preferred_language: String,
    pub loyalty_tier: String,
    pub account_age_days: u32,
    pub lifetime_orders: u32,
    pub ninety_day_compensation_total: f64,
    pub fraud_watch: bool,
}

/// Order record as stored by the order management system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub customer_id: String,
    pub currency: String,
    pub order_total: f64,
    pub item_count: u32,
    pub status: String,
}

/// Past complaint case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_id: String,
    pub customer_id: String,
    pub order_id: String,
    pub complaint_type: String,
    pub decision: String,
    pub status: String,
    pub opened_at: String,
}

/// Back-office data the read tools serve from
#[derive(Debug, Clone, Default)]
pub struct BackOfficeData {
    pub customers: Vec<CustomerRecord>,
    pub orders: Vec<OrderRecord>,
    pub cases: Vec<CaseRecord>,
}

impl BackOfficeData {
    pub const CUSTOMERS_FILE: &'static str = "mock_customers.json";
    pub const ORDERS_FILE: &'static str = "mock_orders.json";
    pub const CASES_FILE: &'static str = "mock_cases.json";

    /// Load the three JSON record files from `dir`
    pub async fn from_json_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            customers: load_records(&dir.join(Self::CUSTOMERS_FILE)).await?,
            orders: load_records(&dir.join(Self::ORDERS_FILE)).await?,
            cases: load_records(&dir.join(Self::CASES_FILE)).await?,
        })
    }
}

async fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(Error::NotFound(format!("data file {}", path.display())));
    }
    let content = tokio::fs::read_to_string(path).await?;
    let records: Vec<T> = serde_json::from_str(&content)?;
    tracing::debug!(path = %path.display(), count = records.len(), "Loaded records");
    Ok(records)
}

/// Deterministic action id: `<prefix>-<first uuid5 segment>`
fn action_id(prefix: &str, token: &str) -> String {
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_URL, token.as_bytes()).to_string();
    let segment = uuid.split('-').next().unwrap_or(&uuid);
    format!("{}-{}", prefix, segment.to_uppercase())
}

fn parse_input<T: DeserializeOwned>(input: Value) -> std::result::Result<T, HandlerError> {
    serde_json::from_value(input).map_err(|e| HandlerError::Permanent(e.to_string()))
}

fn to_output<T: Serialize>(output: &T) -> std::result::Result<Value, HandlerError> {
    serde_json::to_value(output).map_err(|e| HandlerError::Permanent(e.to_string()))
}

/// Handler for one back-office tool
pub struct BackOfficeHandler {
    kind: ToolKind,
    data: Arc<BackOfficeData>,
}

impl BackOfficeHandler {
    pub fn new(kind: ToolKind, data: Arc<BackOfficeData>) -> Self {
        Self { kind, data }
    }

    fn customer_profile(&self, input: Value) -> std::result::Result<Value, HandlerError> {
        let input: GetCustomerProfileInput = parse_input(input)?;
        let customer = self
            .data
            .customers
            .iter()
            .find(|c| c.customer_id == input.customer_id)
            .ok_or_else(|| {
                HandlerError::Permanent(format!("Customer not found: {}", input.customer_id))
            })?;

        to_output(&GetCustomerProfileOutput {
            customer_id: customer.customer_id.clone(),
            preferred_language: customer.preferred_language.clone(),
            loyalty_tier: customer.loyalty_tier.clone(),
            account_age_days: customer.account_age_days,
            lifetime_orders: customer.lifetime_orders,
            ninety_day_compensation_total: customer.ninety_day_compensation_total,
            fraud_watch: customer.fraud_watch,
        })
    }

    fn order_details(&self, input: Value) -> std::result::Result<Value, HandlerError> {
        let input: GetOrderDetailsInput = parse_input(input)?;
        let order = self
            .data
            .orders
            .iter()
            .find(|o| o.order_id == input.order_id)
            .ok_or_else(|| {
                HandlerError::Permanent(format!("Order not found: {}", input.order_id))
            })?;

        to_output(&GetOrderDetailsOutput {
            order_id: order.order_id.clone(),
            customer_id: order.customer_id.clone(),
            currency: order.currency.clone(),
            order_total: order.order_total,
            item_count: order.item_count,
            status: order.status.clone(),
        })
    }

    fn case_history(&self, input: Value) -> std::result::Result<Value, HandlerError> {
        let input: GetCaseHistoryInput = parse_input(input)?;
        let cases: Vec<&CaseRecord> = self
            .data
            .cases
            .iter()
            .filter(|c| c.customer_id == input.customer_id)
            .collect();

        let count_status =
            |status: &str| cases.iter().filter(|c| c.status == status).count() as u32;

        to_output(&GetCaseHistoryOutput {
            customer_id: input.customer_id.clone(),
            open_case_count: count_status("OPEN"),
            recent_escalations: count_status("ESCALATED"),
            cases: cases
                .iter()
                .map(|c| CaseHistoryRecord {
                    case_id: c.case_id.clone(),
                    order_id: c.order_id.clone(),
                    complaint_type: c.complaint_type.clone(),
                    decision: c.decision.clone(),
                    status: c.status.clone(),
                    opened_at: c.opened_at.clone(),
                })
                .collect(),
        })
    }

    fn create_compensation(&self, input: Value) -> std::result::Result<Value, HandlerError> {
        let input: CreateCompensationInput = parse_input(input)?;
        let token = format!(
            "{}:{}:{:.2}:{}",
            input.case_id, input.compensation_type, input.value, input.currency
        );

        to_output(&CreateCompensationOutput {
            compensation_id: action_id("CMP", &token),
            status: "CREATED".to_string(),
            applied_value: input.value,
            currency: input.currency,
            created_at: Utc::now().to_rfc3339(),
        })
    }

    fn issue_refund(&self, input: Value) -> std::result::Result<Value, HandlerError> {
        let input: IssueRefundInput = parse_input(input)?;
        let token = format!("{}:{:.2}:{}", input.order_id, input.amount, input.currency);

        to_output(&IssueRefundOutput {
            refund_id: action_id("RFD", &token),
            status: "ISSUED".to_string(),
            amount: input.amount,
            currency: input.currency,
            processed_at: Utc::now().to_rfc3339(),
        })
    }

    fn create_support_ticket(&self, input: Value) -> std::result::Result<Value, HandlerError> {
        let input: CreateSupportTicketInput = parse_input(input)?;
        let case_id = input
            .case_payload
            .get("case_id")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");
        let priority = input.priority.trim().to_uppercase();
        let queue = match priority.as_str() {
            "HIGH" | "CRITICAL" => "LEGAL",
            _ => "STANDARD",
        };

        to_output(&CreateSupportTicketOutput {
            ticket_id: action_id("TCK", &format!("{}:{}", case_id, input.priority)),
            status: "OPEN".to_string(),
            queue: queue.to_string(),
            created_at: Utc::now().to_rfc3339(),
        })
    }
}

#[async_trait]
impl ToolHandler for BackOfficeHandler {
    async fn invoke(&self, input: Value) -> std::result::Result<Value, HandlerError> {
        match self.kind {
            ToolKind::GetCustomerProfile => self.customer_profile(input),
            ToolKind::GetOrderDetails => self.order_details(input),
            ToolKind::GetCaseHistory => self.case_history(input),
            ToolKind::CreateCompensation => self.create_compensation(input),
            ToolKind::IssueRefund => self.issue_refund(input),
            ToolKind::CreateSupportTicket => self.create_support_ticket(input),
        }
    }
}
