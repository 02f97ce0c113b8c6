use crate::aggregation::group_and_total;
use crate::costs::UNASSIGNED;
use crate::report::{AgingRow, InvoiceAging};
use chrono::NaiveDate;
use core_types::{ReceivableRecord, ReceivableStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AnalyticsError;

/// Age classification of an outstanding balance. Upper bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgingBucket {
    /// Not yet due, or due today.
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "d1_30")]
    Days1To30,
    #[serde(rename = "d31_60")]
    Days31To60,
    #[serde(rename = "d60plus")]
    Days60Plus,
}

impl AgingBucket {
    pub fn for_age(age_days: i64) -> Self {
        match age_days {
            i64::MIN..=0 => AgingBucket::Current,
            1..=30 => AgingBucket::Days1To30,
            31..=60 => AgingBucket::Days31To60,
            _ => AgingBucket::Days60Plus,
        }
    }
}

/// A receivable tagged with its age on the as-of date.
#[derive(Debug, Clone, PartialEq)]
pub struct AgedReceivable<'a> {
    pub record: &'a ReceivableRecord,
    pub age_days: i64,
    pub bucket: AgingBucket,
    /// Collection status on the as-of date; a sent invoice past its due date reads as overdue.
    pub status: ReceivableStatus,
}

/// Remaining balances per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingTotals {
    pub current: Decimal,
    pub d1_30: Decimal,
    pub d31_60: Decimal,
    pub d60plus: Decimal,
}

impl AgingTotals {
    pub fn add(&mut self, bucket: AgingBucket, amount: Decimal) {
        match bucket {
            AgingBucket::Current => self.current += amount,
            AgingBucket::Days1To30 => self.d1_30 += amount,
            AgingBucket::Days31To60 => self.d31_60 += amount,
            AgingBucket::Days60Plus => self.d60plus += amount,
        }
    }

    pub fn total(&self) -> Decimal {
        self.current + self.d1_30 + self.d31_60 + self.d60plus
    }

    fn into_row(self, group_key: String) -> AgingRow {
        AgingRow {
            group_key,
            current: self.current,
            d1_30: self.d1_30,
            d31_60: self.d31_60,
            d60plus: self.d60plus,
            total: self.total(),
        }
    }
}

/// Output of [`bucketize`]: the bucket totals plus each contributing record's tag.
#[derive(Debug, Clone, PartialEq)]
pub struct AgingReport<'a> {
    pub as_of: NaiveDate,
    pub totals: AgingTotals,
    pub records: Vec<AgedReceivable<'a>>,
}

/// Classifies each open receivable by age on `as_of`.
///
/// Age is measured from the due date (the issue date when there is none). Each record adds its
/// remaining balance to exactly one bucket; fully paid records are left out entirely.
pub fn bucketize(records: &[ReceivableRecord], as_of: NaiveDate) -> AgingReport<'_> {
    let mut totals = AgingTotals::default();
    let mut aged = Vec::with_capacity(records.len());

    for record in records.iter().filter(|r| !r.balance.is_zero()) {
        let age_days = (as_of - record.aging_date()).num_days();
        let bucket = AgingBucket::for_age(age_days);
        totals.add(bucket, record.balance);
        tracing::debug!(id = %record.id, age_days, ?bucket, "Receivable bucketed.");
        aged.push(AgedReceivable {
            record,
            age_days,
            bucket,
            status: record.status_as_of(as_of),
        });
    }

    AgingReport {
        as_of,
        totals,
        records: aged,
    }
}

/// Key used to roll aged receivables up into report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgingGroupBy {
    Client,
    Project,
}

impl AgingGroupBy {
    fn key(&self, record: &ReceivableRecord) -> String {
        match self {
            AgingGroupBy::Client => record.client.clone(),
            AgingGroupBy::Project => record
                .project_id
                .clone()
                .unwrap_or_else(|| UNASSIGNED.to_string()),
        }
    }
}

impl FromStr for AgingGroupBy {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(AgingGroupBy::Client),
            "project" => Ok(AgingGroupBy::Project),
            other => Err(AnalyticsError::InvalidArgument(format!(
                "unknown aging grouping '{other}' (expected client or project)"
            ))),
        }
    }
}

impl AgingReport<'_> {
    /// One row per client or project, largest outstanding total first.
    pub fn rollup(&self, by: AgingGroupBy) -> Vec<AgingRow> {
        group_and_total(&self.records, |aged| by.key(aged.record), |aged| aged.record.balance)
            .into_iter()
            .map(|group| {
                let totals = group.items.iter().fold(AgingTotals::default(), |mut acc, aged| {
                    acc.add(aged.bucket, aged.record.balance);
                    acc
                });
                totals.into_row(group.key)
            })
            .collect()
    }

    /// The grand-total row.
    pub fn total_row(&self) -> AgingRow {
        self.totals.into_row("Total".to_string())
    }

    /// One row per open invoice, oldest first.
    pub fn invoices(&self) -> Vec<InvoiceAging> {
        let mut rows: Vec<InvoiceAging> = self
            .records
            .iter()
            .map(|aged| InvoiceAging {
                id: aged.record.id.clone(),
                client: aged.record.client.clone(),
                project_id: aged.record.project_id.clone(),
                balance: aged.record.balance,
                age_days: aged.age_days,
                bucket: aged.bucket,
                status: aged.status,
            })
            .collect();
        rows.sort_by(|a, b| b.age_days.cmp(&a.age_days).then_with(|| a.id.cmp(&b.id)));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn receivable(id: &str, client: &str, balance: Decimal, age_days: i64) -> ReceivableRecord {
        let due = as_of() - chrono::Duration::days(age_days);
        ReceivableRecord {
            id: id.to_string(),
            client: client.to_string(),
            project_id: None,
            invoice_amount: balance,
            balance,
            issued_on: due - chrono::Duration::days(30),
            due_on: Some(due),
            status: ReceivableStatus::Sent,
        }
    }

    #[test]
    fn bucket_boundaries_are_inclusive_of_the_upper_bound() {
        assert_eq!(AgingBucket::for_age(-5), AgingBucket::Current);
        assert_eq!(AgingBucket::for_age(0), AgingBucket::Current);
        assert_eq!(AgingBucket::for_age(1), AgingBucket::Days1To30);
        assert_eq!(AgingBucket::for_age(30), AgingBucket::Days1To30);
        assert_eq!(AgingBucket::for_age(31), AgingBucket::Days31To60);
        assert_eq!(AgingBucket::for_age(60), AgingBucket::Days31To60);
        assert_eq!(AgingBucket::for_age(61), AgingBucket::Days60Plus);
    }

    #[test]
    fn remaining_balance_is_bucketed_not_invoice_amount() {
        let mut r = receivable("INV-1", "Johnson", dec!(4000), 10);
        r.invoice_amount = dec!(10000);
        let records = vec![r];
        let report = bucketize(&records, as_of());
        assert_eq!(report.totals.d1_30, dec!(4000));
        assert_eq!(report.totals.total(), dec!(4000));
    }

    #[test]
    fn paid_records_are_excluded() {
        let records = vec![
            receivable("INV-1", "Johnson", dec!(0), 90),
            receivable("INV-2", "Johnson", dec!(500), 90),
        ];
        let report = bucketize(&records, as_of());
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.totals.d60plus, dec!(500));
    }

    #[test]
    fn invoice_rows_carry_the_status_on_the_as_of_date() {
        let records = vec![
            receivable("INV-1", "Johnson", dec!(1000), -10),
            receivable("INV-2", "Oak Creek", dec!(2500), 45),
            receivable("INV-3", "Johnson", dec!(0), 90),
        ];
        let report = bucketize(&records, as_of());
        let rows = report.invoices();

        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["INV-2", "INV-1"]);
        assert_eq!(rows[0].status, ReceivableStatus::Overdue);
        assert_eq!(rows[0].bucket, AgingBucket::Days31To60);
        assert_eq!(rows[1].status, ReceivableStatus::Sent);
        assert_eq!(rows[1].bucket, AgingBucket::Current);
    }

    #[test]
    fn issue_date_is_used_when_no_due_date() {
        let mut r = receivable("INV-1", "Johnson", dec!(100), 0);
        r.due_on = None;
        r.issued_on = as_of() - chrono::Duration::days(45);
        let records = vec![r];
        let report = bucketize(&records, as_of());
        assert_eq!(report.records[0].age_days, 45);
        assert_eq!(report.records[0].bucket, AgingBucket::Days31To60);
    }

    #[test]
    fn rollup_sums_each_bucket_per_group() {
        let mut unassigned = receivable("INV-4", "Oak Creek", dec!(700), 3);
        unassigned.project_id = None;
        let mut a = receivable("INV-1", "Johnson", dec!(1000), 5);
        a.project_id = Some("PRJ-1".to_string());
        let mut b = receivable("INV-2", "Johnson", dec!(2000), 45);
        b.project_id = Some("PRJ-1".to_string());
        let records = vec![a, b, unassigned];
        let report = bucketize(&records, as_of());

        let by_client = report.rollup(AgingGroupBy::Client);
        assert_eq!(by_client[0].group_key, "Johnson");
        assert_eq!(by_client[0].d1_30, dec!(1000));
        assert_eq!(by_client[0].d31_60, dec!(2000));
        assert_eq!(by_client[0].total, dec!(3000));

        let by_project = report.rollup(AgingGroupBy::Project);
        assert_eq!(by_project[1].group_key, UNASSIGNED);
        assert_eq!(by_project[1].total, dec!(700));
    }

    proptest! {
        #[test]
        fn buckets_partition_the_open_balances(
            entries in prop::collection::vec((0i64..5_000_000, -30i64..400), 0..50)
        ) {
            let records: Vec<ReceivableRecord> = entries
                .iter()
                .enumerate()
                .map(|(i, (cents, age))| {
                    receivable(&format!("INV-{i}"), "C", Decimal::new(*cents, 2), *age)
                })
                .collect();
            let report = bucketize(&records, as_of());
            let balances: Decimal = records.iter().map(|r| r.balance).sum();
            prop_assert_eq!(report.totals.total(), balances);

            let rolled: Decimal = report.rollup(AgingGroupBy::Client).iter().map(|r| r.total).sum();
            prop_assert_eq!(rolled, balances);
        }
    }
}
