use crate::error::{IngestError, RecordFailure, RecordKind};
use core_types::{
    BillingRecord, CashForecastLine, CloseEvent, ClosedPeriod, CoreError, CostCodeBudget,
    CostRecord, MarginSnapshot, PeriodLedgerLine, Project, ReceivableRecord,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

/// A record kind the snapshot carries: its section, how it is identified in failure reports,
/// and its domain validation.
pub trait LedgerRecord: DeserializeOwned {
    const KIND: RecordKind;
    /// Field quoted as the record id when the record is rejected.
    const ID_FIELD: &'static str;

    fn validate(&self) -> Result<(), CoreError>;
}

impl LedgerRecord for Project {
    const KIND: RecordKind = RecordKind::Project;
    const ID_FIELD: &'static str = "id";

    fn validate(&self) -> Result<(), CoreError> {
        Project::validate(self)
    }
}

impl LedgerRecord for CostRecord {
    const KIND: RecordKind = RecordKind::Cost;
    const ID_FIELD: &'static str = "id";

    fn validate(&self) -> Result<(), CoreError> {
        CostRecord::validate(self)
    }
}

impl LedgerRecord for BillingRecord {
    const KIND: RecordKind = RecordKind::Billing;
    const ID_FIELD: &'static str = "id";

    fn validate(&self) -> Result<(), CoreError> {
        BillingRecord::validate(self)
    }
}

impl LedgerRecord for ReceivableRecord {
    const KIND: RecordKind = RecordKind::Receivable;
    const ID_FIELD: &'static str = "id";

    fn validate(&self) -> Result<(), CoreError> {
        ReceivableRecord::validate(self)
    }
}

impl LedgerRecord for MarginSnapshot {
    const KIND: RecordKind = RecordKind::MarginSnapshot;
    const ID_FIELD: &'static str = "project_id";

    fn validate(&self) -> Result<(), CoreError> {
        MarginSnapshot::validate(self)
    }
}

impl LedgerRecord for CostCodeBudget {
    const KIND: RecordKind = RecordKind::Budget;
    const ID_FIELD: &'static str = "cost_code";

    fn validate(&self) -> Result<(), CoreError> {
        CostCodeBudget::validate(self)
    }
}

impl LedgerRecord for CashForecastLine {
    const KIND: RecordKind = RecordKind::CashForecast;
    const ID_FIELD: &'static str = "category";

    fn validate(&self) -> Result<(), CoreError> {
        CashForecastLine::validate(self)
    }
}

impl LedgerRecord for PeriodLedgerLine {
    const KIND: RecordKind = RecordKind::Ledger;
    const ID_FIELD: &'static str = "label";

    fn validate(&self) -> Result<(), CoreError> {
        PeriodLedgerLine::validate(self)
    }
}

impl LedgerRecord for ClosedPeriod {
    const KIND: RecordKind = RecordKind::ClosedPeriod;
    const ID_FIELD: &'static str = "period_id";

    fn validate(&self) -> Result<(), CoreError> {
        ClosedPeriod::validate(self)
    }
}

impl LedgerRecord for CloseEvent {
    const KIND: RecordKind = RecordKind::CloseEvent;
    const ID_FIELD: &'static str = "period_id";

    fn validate(&self) -> Result<(), CoreError> {
        CloseEvent::validate(self)
    }
}

/// Accepted records of one kind, plus the ones that were rejected.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub accepted: Vec<T>,
    pub rejected: Vec<RecordFailure>,
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self {
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Batch<T> {
    /// Moves the rejected records into `failures` and returns the accepted ones.
    fn split_into(self, failures: &mut Vec<RecordFailure>) -> Vec<T> {
        failures.extend(self.rejected);
        self.accepted
    }
}

/// Everything the accounting feed delivered, validated record by record.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub projects: Vec<Project>,
    pub costs: Vec<CostRecord>,
    pub billing: Vec<BillingRecord>,
    pub receivables: Vec<ReceivableRecord>,
    pub margin_snapshots: Vec<MarginSnapshot>,
    pub budgets: Vec<CostCodeBudget>,
    pub cash_forecast: Vec<CashForecastLine>,
    pub ledger: Vec<PeriodLedgerLine>,
    pub closed_periods: Vec<ClosedPeriod>,
    pub close_log: Vec<CloseEvent>,
    /// Every record rejected across all sections.
    pub failures: Vec<RecordFailure>,
}

/// Reads and validates a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<LedgerSnapshot, IngestError> {
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_snapshot(&text)
}

/// Parses a snapshot document. Missing sections are treated as empty.
pub fn parse_snapshot(text: &str) -> Result<LedgerSnapshot, IngestError> {
    let root: Value = serde_json::from_str(text)?;
    let Value::Object(root) = root else {
        return Err(IngestError::Shape("top level must be a JSON object".to_string()));
    };

    let mut failures = Vec::new();
    let f = &mut failures;

    let projects = ingest_projects(section::<Project>(&root)?).split_into(f);
    let costs = ingest(section::<CostRecord>(&root)?).split_into(f);
    let billing = ingest(section::<BillingRecord>(&root)?).split_into(f);
    let receivables = ingest(section::<ReceivableRecord>(&root)?).split_into(f);
    let margin_snapshots = ingest(section::<MarginSnapshot>(&root)?).split_into(f);
    let budgets = ingest(section::<CostCodeBudget>(&root)?).split_into(f);
    let cash_forecast = ingest(section::<CashForecastLine>(&root)?).split_into(f);
    let ledger = ingest(section::<PeriodLedgerLine>(&root)?).split_into(f);
    let closed_periods = ingest(section::<ClosedPeriod>(&root)?).split_into(f);
    let close_log = ingest(section::<CloseEvent>(&root)?).split_into(f);

    let snapshot = LedgerSnapshot {
        projects,
        costs,
        billing,
        receivables,
        margin_snapshots,
        budgets,
        cash_forecast,
        ledger,
        closed_periods,
        close_log,
        failures,
    };

    tracing::info!(
        projects = snapshot.projects.len(),
        costs = snapshot.costs.len(),
        billing = snapshot.billing.len(),
        receivables = snapshot.receivables.len(),
        rejected = snapshot.failures.len(),
        "Ledger snapshot ingested."
    );
    Ok(snapshot)
}

fn section<T: LedgerRecord>(root: &Map<String, Value>) -> Result<&[Value], IngestError> {
    let name = T::KIND.section();
    match root.get(name) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(IngestError::Shape(format!("'{name}' must be an array"))),
    }
}

/// Decodes and validates every record, collecting per-record failures instead of stopping.
pub fn ingest<T: LedgerRecord>(values: &[Value]) -> Batch<T> {
    ingest_with(values, |_| Ok(()))
}

/// Projects are keyed by id across the whole engine, so a repeated id is rejected.
pub fn ingest_projects(values: &[Value]) -> Batch<Project> {
    let mut seen = HashSet::new();
    ingest_with(values, |project: &Project| {
        if seen.insert(project.id.clone()) {
            Ok(())
        } else {
            Err(CoreError::invalid("id", format!("duplicate project id '{}'", project.id)))
        }
    })
}

fn ingest_with<T, F>(values: &[Value], mut check: F) -> Batch<T>
where
    T: LedgerRecord,
    F: FnMut(&T) -> Result<(), CoreError>,
{
    let mut batch = Batch::default();
    for (index, value) in values.iter().enumerate() {
        let outcome = decode::<T>(value).and_then(|record| {
            record
                .validate()
                .and_then(|()| check(&record))
                .map(|()| record)
                .map_err(|e| (e.field().to_string(), e.to_string()))
        });
        match outcome {
            Ok(record) => batch.accepted.push(record),
            Err((field, message)) => {
                let failure = RecordFailure {
                    kind: T::KIND,
                    index,
                    record_id: peek_id(value, T::ID_FIELD),
                    field,
                    message,
                };
                tracing::warn!(%failure, "Rejected record.");
                batch.rejected.push(failure);
            }
        }
    }
    batch
}

/// Deserializes one record, returning the failing field and message on error.
fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, (String, String)> {
    serde_path_to_error::deserialize(value).map_err(|error| {
        let message = error.inner().to_string();
        let path = error.path().to_string();
        // Missing fields fail on the record itself; the message names them.
        let field = if path == "." {
            message
                .strip_prefix("missing field `")
                .and_then(|rest| rest.split('`').next())
                .unwrap_or("record")
                .to_string()
        } else {
            path
        };
        (field, message)
    })
}

fn peek_id(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{CostCategory, ReceivableStatus};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn doc() -> String {
        json!({
            "projects": [
                { "id": "PRJ-042", "name": "Custom Home", "original_contract": 500000,
                  "change_orders": 10000, "percent_complete": 70, "costs_to_date": 280000,
                  "budgeted_margin_pct": 18.0 },
                { "id": "PRJ-051", "name": "Remodel", "original_contract": 128000,
                  "percent_complete": 140, "costs_to_date": 42800, "budgeted_margin_pct": 12 }
            ],
            "costs": [
                { "id": "C1", "project_id": "PRJ-042", "vendor": "Thompson Framing",
                  "cost_code": "06-100", "amount": 13600, "posted_on": "2026-02-22",
                  "category": "Subcontract" },
                { "id": "C2", "amount": 1248, "posted_on": "2026-02-19", "category": "material" },
                { "id": "C3", "project_id": "PRJ-042", "amount": -50, "posted_on": "2026-02-19",
                  "category": "material" },
                { "id": "C4", "project_id": "PRJ-042", "amount": 50, "posted_on": "19/02/2026",
                  "category": "material" }
            ],
            "receivables": [
                { "id": "INV-1", "client": "Johnson", "invoice_amount": 10000, "balance": 10000,
                  "issued_on": "2026-01-01", "due_on": "2026-01-31", "status": "sent" }
            ]
        })
        .to_string()
    }

    #[test]
    fn bad_records_are_reported_without_aborting_the_batch() {
        let snapshot = parse_snapshot(&doc()).unwrap();

        assert_eq!(snapshot.projects.len(), 1);
        assert_eq!(snapshot.costs.len(), 2);
        assert_eq!(snapshot.receivables.len(), 1);
        assert_eq!(snapshot.failures.len(), 3);

        let percent = &snapshot.failures[0];
        assert_eq!(percent.kind, RecordKind::Project);
        assert_eq!(percent.record_id.as_deref(), Some("PRJ-051"));
        assert_eq!(percent.field, "percent_complete");

        let fields: Vec<_> = snapshot.failures[1..].iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["amount", "posted_on"]);
    }

    #[test]
    fn unassigned_costs_are_kept() {
        let snapshot = parse_snapshot(&doc()).unwrap();
        let unassigned = snapshot.costs.iter().find(|c| c.id == "C2").unwrap();
        assert_eq!(unassigned.project_id, None);
        assert_eq!(unassigned.category, CostCategory::Material);
    }

    #[test]
    fn values_are_carried_exactly() {
        let snapshot = parse_snapshot(&doc()).unwrap();
        let project = &snapshot.projects[0];
        assert_eq!(project.revised_contract(), dec!(510000));
        assert_eq!(snapshot.receivables[0].status, ReceivableStatus::Sent);
    }

    #[test]
    fn duplicate_project_ids_are_rejected() {
        let text = json!({
            "projects": [
                { "id": "A", "original_contract": 1, "percent_complete": 0,
                  "costs_to_date": 0, "budgeted_margin_pct": 10 },
                { "id": "A", "original_contract": 2, "percent_complete": 0,
                  "costs_to_date": 0, "budgeted_margin_pct": 10 }
            ]
        })
        .to_string();
        let snapshot = parse_snapshot(&text).unwrap();
        assert_eq!(snapshot.projects.len(), 1);
        assert_eq!(snapshot.projects[0].original_contract, dec!(1));
        assert_eq!(snapshot.failures[0].index, 1);
    }

    #[test]
    fn long_amounts_keep_every_digit() {
        let text = r#"{
            "costs": [
                { "id": "C1", "amount": 1234567890.123456789, "posted_on": "2026-02-22",
                  "category": "labor" },
                { "id": "C2", "amount": "0.88", "posted_on": "2026-02-22", "category": "labor" }
            ]
        }"#;
        let snapshot = parse_snapshot(text).unwrap();
        assert!(snapshot.failures.is_empty());
        assert_eq!(snapshot.costs[0].amount, dec!(1234567890.123456789));
        assert_eq!(snapshot.costs[1].amount, dec!(0.88));
    }

    #[test]
    fn missing_and_malformed_fields_are_named() {
        let text = json!({
            "receivables": [
                { "id": "INV-1", "client": "Johnson", "balance": 10,
                  "issued_on": "2026-01-01", "status": "sent" },
                { "id": "INV-2", "client": "Johnson", "invoice_amount": 10, "balance": 10,
                  "issued_on": "2026-01-01", "status": "void" }
            ]
        })
        .to_string();
        let snapshot = parse_snapshot(&text).unwrap();
        let fields: Vec<_> = snapshot.failures.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["invoice_amount", "status"]);
        assert_eq!(snapshot.failures[1].record_id.as_deref(), Some("INV-2"));
    }

    #[test]
    fn magnitudes_that_would_overflow_are_rejected() {
        let text = format!(
            r#"{{ "projects": [ {{ "id": "BIG", "original_contract": {}, "change_orders": 1,
                "percent_complete": 50, "costs_to_date": 0, "budgeted_margin_pct": 10 }} ] }}"#,
            rust_decimal::Decimal::MAX
        );
        let snapshot = parse_snapshot(&text).unwrap();
        assert!(snapshot.projects.is_empty());
        assert_eq!(snapshot.failures[0].field, "original_contract");
    }

    #[test]
    fn section_of_wrong_type_is_a_shape_error() {
        let err = parse_snapshot(r#"{ "costs": {} }"#).unwrap_err();
        assert!(matches!(err, IngestError::Shape(_)));
    }

    #[test]
    fn missing_sections_are_empty() {
        let snapshot = parse_snapshot("{}").unwrap();
        assert!(snapshot.failures.is_empty());
        assert!(snapshot.projects.is_empty());
    }
}
