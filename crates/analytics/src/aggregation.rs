use crate::report::AggregationRow;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::fmt::Display;

/// One group produced by [`group_and_total`].
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a, K, T> {
    pub key: K,
    pub items: Vec<&'a T>,
    pub total: Decimal,
    /// Share of the grand total as a fraction (0.25 = 25%). Zero when the grand total is zero.
    pub pct_of_grand: Decimal,
}

impl<K: Display, T> Group<'_, K, T> {
    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn to_row(&self) -> AggregationRow {
        AggregationRow {
            key: self.key.to_string(),
            total: self.total,
            count: self.items.len(),
            pct_of_grand: self.pct_of_grand.round_dp(6),
        }
    }
}

/// Groups `items` by `key_fn` and totals `amount_fn` per group.
///
/// Groups come back sorted by total, largest first; equal totals keep key order, so repeated
/// calls on the same input return the same sequence. The group totals always sum to the grand
/// total of `amount_fn` over `items`.
pub fn group_and_total<'a, T, K, FK, FA>(
    items: &'a [T],
    key_fn: FK,
    amount_fn: FA,
) -> Vec<Group<'a, K, T>>
where
    K: Ord,
    FK: Fn(&T) -> K,
    FA: Fn(&T) -> Decimal,
{
    let mut grand_total = Decimal::ZERO;
    let mut groups: BTreeMap<K, (Vec<&'a T>, Decimal)> = BTreeMap::new();

    for item in items {
        let amount = amount_fn(item);
        grand_total += amount;
        let entry = groups.entry(key_fn(item)).or_insert_with(|| (Vec::new(), Decimal::ZERO));
        entry.0.push(item);
        entry.1 += amount;
    }

    let mut result: Vec<Group<'a, K, T>> = groups
        .into_iter()
        .map(|(key, (items, total))| Group {
            key,
            items,
            total,
            pct_of_grand: share(total, grand_total),
        })
        .collect();

    // `sort_by` is stable: ties stay in key order from the BTreeMap.
    result.sort_by(|a, b| b.total.cmp(&a.total));
    result
}

/// `part / whole`, or zero when `whole` is zero.
pub fn share(part: Decimal, whole: Decimal) -> Decimal {
    part.checked_div(whole).unwrap_or(Decimal::ZERO)
}

/// `part / whole * 100`. `None` when `whole` is zero or the result does not fit a `Decimal`.
pub fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    part.checked_div(whole)?.checked_mul(dec!(100))
}
