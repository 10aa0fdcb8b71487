//! Day Partitioner: group orders by the calendar day of their display
//! timestamp.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use ordertrace_core::{parse_display_date, OrderSummary};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct Partitioned {
    /// Orders per day, days ascending, list order kept within a day.
    pub days: BTreeMap<NaiveDate, Vec<OrderSummary>>,
    /// Orders whose timestamp had no recognisable date.
    pub undated: Vec<OrderSummary>,
}

pub fn partition_by_day(orders: Vec<OrderSummary>) -> Partitioned {
    let mut out = Partitioned::default();
    for order in orders {
        match parse_display_date(&order.display_date_time) {
            Some(date) => out.days.entry(date).or_default().push(order),
            None => {
                warn!(
                    order_id = %order.order_id,
                    display_date_time = %order.display_date_time,
                    "order has no parseable date, not persisted"
                );
                out.undated.push(order);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, when: &str) -> OrderSummary {
        OrderSummary {
            order_id: id.into(),
            display_date_time: when.into(),
            ..Default::default()
        }
    }

    #[test]
    fn groups_by_day_in_date_order() {
        let parts = partition_by_day(vec![
            order("3", "5/14/2024 6:00 PM"),
            order("1", "5/13/2024 9:00 AM"),
            order("2", "5/14/2024 8:00 AM"),
            order("4", "pending"),
        ]);
        let days: Vec<String> = parts.days.keys().map(|d| d.to_string()).collect();
        assert_eq!(days, vec!["2024-05-13", "2024-05-14"]);
        let may14: Vec<&str> = parts.days[&NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()]
            .iter()
            .map(|o| o.order_id.as_str())
            .collect();
        assert_eq!(may14, vec!["3", "2"]);
        assert_eq!(parts.undated.len(), 1);
    }
}
