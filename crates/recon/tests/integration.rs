use std::fs;
use std::path::Path;

use ordertrace_core::{ItemKey, LineItem, Money, OrderSummary, YearMonth};
use ordertrace_io::IncrementalStore;
use ordertrace_recon::model::{ItemRow, OrderInfo};
use ordertrace_recon::{
    compare_month, run, write_outputs, MonthStatus, ReconConfig, ReconResult, SideData,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn order(id: &str) -> OrderSummary {
    OrderSummary {
        order_id: id.into(),
        display_date_time: "5/14/2024 3:22 PM".into(),
        fulfillment_location: "Downtown".into(),
        demand_location: "Downtown".into(),
        total: Money(2000),
        ..Default::default()
    }
}

fn item(order_id: &str, product: &str, color: &str, size: &str, qty: u32) -> LineItem {
    LineItem {
        order_id: order_id.into(),
        line_number: 1,
        product_name: product.into(),
        color: color.into(),
        size: size.into(),
        quantity: qty,
        unit_price: Money(1000),
        discounted_price: Money(1000),
        ..Default::default()
    }
}

fn config(candidate: &Path, reference: &Path, from: &str, to: &str) -> ReconConfig {
    let mut config = ReconConfig::default();
    config.candidate.root = candidate.to_path_buf();
    config.reference.root = reference.to_path_buf();
    config.range.from = Some(from.parse().unwrap());
    config.range.to = Some(to.parse().unwrap());
    config
}

fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn quantity_difference_on_one_key() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let day = date(2024, 5, 14);
    IncrementalStore::new(a.path())
        .write(day, &[order("O1")], &[item("O1", "Shirt", "Red", "M", 2)])
        .unwrap();
    IncrementalStore::new(b.path())
        .write(day, &[order("O1")], &[item("O1", "Shirt", "Red", "M", 1)])
        .unwrap();

    let result = run(&config(a.path(), b.path(), "2024-05", "2024-05")).unwrap();
    let month = &result.months[0];
    assert_eq!(month.raw_mismatches.len(), 1);
    let d = &month.raw_mismatches[0];
    assert_eq!(d.key.to_string(), "Shirt|Red|M");
    assert_eq!((d.reference, d.candidate, d.delta), (1, 2, 1));

    assert_eq!(result.raw.top.len(), 1);
    assert_eq!(result.raw.top[0].delta, 1);
}

#[test]
fn month_missing_on_candidate_side() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let reference = IncrementalStore::new(b.path());
    let orders = [order("R1"), order("R2"), order("R3")];
    let items: Vec<LineItem> = orders.iter().map(|o| item(&o.order_id, "Tee", "", "", 1)).collect();
    reference.write(date(2024, 5, 2), &orders, &items).unwrap();

    let result = run(&config(a.path(), b.path(), "2024-05", "2024-05")).unwrap();
    let month = &result.months[0];
    assert_eq!(month.status, MonthStatus::Ok);
    assert_eq!(month.orders_delta(), -3);
    assert_eq!(month.only_reference.len(), 3);

    let out = TempDir::new().unwrap();
    write_outputs(&result, out.path(), false).unwrap();
    let summary = fs::read_to_string(out.path().join("summary.csv")).unwrap();
    let mut reader = csv::Reader::from_reader(summary.as_bytes());
    let headers = reader.headers().unwrap().clone();
    let row = reader.records().next().unwrap().unwrap();
    let col = |name: &str| {
        let i = headers.iter().position(|h| h == name).unwrap();
        row.get(i).unwrap().to_string()
    };
    assert_eq!(col("month"), "2024-05");
    assert_eq!(col("status"), "ok");
    assert_eq!(col("orders_delta"), "-3");
    assert_eq!(col("reference_only_orders"), "3");
}

#[test]
fn error_placeholder_is_ranked_only_on_request() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let day = date(2024, 5, 14);
    let o = order("O9");
    IncrementalStore::new(a.path())
        .write(day, &[o.clone()], &[LineItem::placeholder(&o, true)])
        .unwrap();
    IncrementalStore::new(b.path())
        .write(day, &[o.clone()], &[item("O9", "Canvas Tote", "", "", 1)])
        .unwrap();

    let mut cfg = config(a.path(), b.path(), "2024-05", "2024-05");
    let default = run(&cfg).unwrap();
    assert!(default
        .raw
        .top
        .iter()
        .all(|d| d.key.product != "Error - Store Purchase"));
    assert!(default
        .raw
        .all
        .iter()
        .any(|d| d.key.product == "Error - Store Purchase"));
    assert_eq!(default.months[0].candidate.error_placeholder_items, 1);

    cfg.output.include_placeholders = true;
    let included = run(&cfg).unwrap();
    assert!(included
        .raw
        .top
        .iter()
        .any(|d| d.key.product == "Error - Store Purchase"));
}

#[test]
fn formatting_variants_collapse_before_normalized_diff() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let day = date(2024, 5, 14);
    IncrementalStore::new(a.path())
        .write(
            day,
            &[order("O1")],
            &[item("O1", "Men's Tee", "Red", "M", 1), item("O1", "mens tee", "red", "m", 1)],
        )
        .unwrap();
    IncrementalStore::new(b.path())
        .write(day, &[order("O1")], &[item("O1", "Mens Tee", "Red", "M", 2)])
        .unwrap();

    let result = run(&config(a.path(), b.path(), "2024-05", "2024-05")).unwrap();
    assert!(result.months[0].normalized_mismatches.is_empty());
    assert!(result.normalized.all.is_empty());
    // Raw keys all differ in form.
    assert_eq!(result.raw.all.len(), 3);
}

// -------------------------------------------------------------------------
// Layout and failure handling
// -------------------------------------------------------------------------

#[test]
fn reference_month_files_with_mapped_columns() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    IncrementalStore::new(a.path())
        .write(date(2024, 5, 1), &[order("1001")], &[item("1001", "Tee", "Blue", "S", 1)])
        .unwrap();
    write_file(
        &b.path().join("2024/2024-05/2024-05_orders.csv"),
        "Order Number,Fulfillment,Demand\n1001,Downtown,Web\n",
    );
    write_file(
        &b.path().join("2024/2024-05/2024-05_line-items.csv"),
        "Order Number,Item,Colour,Size,Qty\n1001,Tee,Blue,S,1\n",
    );

    let toml = r#"
[reference.columns]
order_id = "Order Number"
product_name = "Item"
color = "Colour"
size = "Size"
quantity = "Qty"
fulfillment_location = "Fulfillment"
demand_location = "Demand"
"#;
    let mut cfg = ReconConfig::from_toml(toml, Path::new("recon.toml")).unwrap();
    cfg.candidate.root = a.path().to_path_buf();
    cfg.reference.root = b.path().to_path_buf();
    cfg.range.from = Some("2024-05".parse().unwrap());
    cfg.range.to = Some("2024-05".parse().unwrap());

    let result = run(&cfg).unwrap();
    let month = &result.months[0];
    assert!(month.only_candidate.is_empty());
    assert!(month.raw_mismatches.is_empty());
    assert_eq!(month.reference.store_split.cross_store, 1);
    assert_eq!(month.candidate.store_split.same_store, 1);
}

#[test]
fn unreadable_month_is_marked_failed() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    // A directory where a data file is expected cannot be read.
    fs::create_dir_all(a.path().join("2024/2024-04/2024-04-02_orders.csv")).unwrap();
    IncrementalStore::new(a.path())
        .write(date(2024, 5, 3), &[order("O1")], &[item("O1", "Tee", "", "", 1)])
        .unwrap();

    let result = run(&config(a.path(), b.path(), "2024-04", "2024-05")).unwrap();
    assert_eq!(result.months.len(), 2);
    assert_eq!(result.months[0].status, MonthStatus::Failed);
    assert!(result.months[0].error.is_some());
    assert_eq!(result.months[1].status, MonthStatus::Ok);
    assert_eq!(result.summary.failed_months, 1);
    assert_eq!(result.summary.only_candidate, 1);

    let out = TempDir::new().unwrap();
    let written = write_outputs(&result, out.path(), true).unwrap();
    assert!(written.iter().any(|p| p.ends_with("recon.json")));
    assert!(!out.path().join("2024-04").exists());
    assert!(out.path().join("2024-05/item_mismatches_raw.csv").exists());
}

#[test]
fn empty_range_writes_headers_only() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let result = run(&config(a.path(), b.path(), "2024-01", "2024-02")).unwrap();
    assert!(result.summary.is_clean());

    let out = TempDir::new().unwrap();
    write_outputs(&result, out.path(), false).unwrap();
    let top = fs::read_to_string(out.path().join("top_discrepancies_raw.csv")).unwrap();
    assert_eq!(top, "rank,key,product_name,color,size,candidate,reference,delta\n");

    // No months at all: the summary keeps the same columns.
    let none = TempDir::new().unwrap();
    write_outputs(&ReconResult::default(), none.path(), false).unwrap();
    let first_line = |dir: &Path| {
        fs::read_to_string(dir.join("summary.csv"))
            .unwrap()
            .lines()
            .next()
            .unwrap()
            .to_string()
    };
    assert_eq!(first_line(none.path()), first_line(out.path()));
    assert!(first_line(none.path()).ends_with("reference_unattributed"));
}

// -------------------------------------------------------------------------
// Properties
// -------------------------------------------------------------------------

fn arb_side() -> impl Strategy<Value = SideData> {
    let row = ("[A-Ca-c' ]{1,4}", "(Red|red)?", "(M|m)?", 1i64..4);
    prop::collection::btree_map("O[1-6]", prop::collection::vec(row, 0..4), 0..6).prop_map(|orders| {
        let mut side = SideData::default();
        for (id, rows) in orders {
            side.orders.insert(id.clone(), OrderInfo::default());
            let items = rows
                .into_iter()
                .map(|(p, c, s, q)| ItemRow {
                    key: ItemKey::new(&p, &c, &s),
                    quantity: q,
                    revenue: Money(100 * q),
                })
                .collect::<Vec<_>>();
            if !items.is_empty() {
                side.items.insert(id, items);
            }
        }
        side
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn swapping_sides_negates_every_delta(a in arb_side(), b in arb_side()) {
        let month = YearMonth::new(2024, 5).unwrap();
        let ab = compare_month(month, &a, &b);
        let ba = compare_month(month, &b, &a);

        prop_assert_eq!(&ab.only_candidate, &ba.only_reference);
        prop_assert_eq!(&ab.only_reference, &ba.only_candidate);

        for (x, y) in [
            (&ab.raw_mismatches, &ba.raw_mismatches),
            (&ab.normalized_mismatches, &ba.normalized_mismatches),
        ] {
            prop_assert_eq!(x.len(), y.len());
            for (d, e) in x.iter().zip(y.iter()) {
                prop_assert_eq!(&d.order_id, &e.order_id);
                prop_assert_eq!(&d.key, &e.key);
                prop_assert_eq!(d.delta, -e.delta);
                prop_assert_eq!(d.candidate, e.reference);
            }
        }
        for (key, count) in &ab.raw_counts {
            prop_assert_eq!(ba.raw_counts.get(key).copied(), Some(count.swapped()));
        }
    }
}
