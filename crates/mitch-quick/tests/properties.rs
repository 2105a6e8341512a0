use std::collections::HashSet;

use mitch_quick::config::ComparatorMode;
use mitch_quick::export::{Record, to_csv};
use mitch_quick::selection::SelectionStore;
use mitch_quick::table::{Header, Row, SortDirection, Table, parse_numeric};
use proptest::prelude::*;
use serde_json::Value;

fn header(label: &str) -> Header {
    Header {
        label: label.into(),
        sortable: true,
        marker: None,
    }
}

fn table(rows: &[Vec<String>]) -> Table {
    Table::new(
        vec![header("Item"), header("Note")],
        rows.iter().map(|cells| Row::new(cells.clone())).collect(),
    )
}

/// Renders cents the way the price column does, with thousands grouping.
fn price_text(cents: u64) -> String {
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${grouped}.{:02}", cents % 100)
}

fn cells() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-zA-Z ]{0,8}", 2)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn selection_count_matches_distinct_checked_ids(
        ops in proptest::collection::vec((0u8..6, any::<bool>()), 0..40)
    ) {
        let mut store = SelectionStore::default();
        let mut model = HashSet::new();
        for (id, checked) in ops {
            let id = id.to_string();
            let changed = store.toggle(&id, checked);
            let model_changed = if checked { model.insert(id.clone()) } else { model.remove(&id) };
            prop_assert_eq!(changed, model_changed);
            prop_assert!(!store.toggle(&id, checked));
            prop_assert_eq!(store.contains(&id), checked);
        }
        prop_assert_eq!(store.count(), model.len());
    }

    #[test]
    fn filter_shows_exactly_the_rows_containing_the_term(
        rows in proptest::collection::vec(cells(), 0..12),
        term in "[a-zA-Z]{0,3}",
    ) {
        let mut t = table(&rows);
        t.filter(&term);
        let needle = term.to_ascii_lowercase();
        for (row, cells) in t.rows.iter().zip(&rows) {
            prop_assert_eq!(&row.cells, cells);
            prop_assert_eq!(row.visible, cells.join(" ").to_ascii_lowercase().contains(&needle));
        }

        let once: Vec<bool> = t.rows.iter().map(|r| r.visible).collect();
        t.filter(&term);
        let twice: Vec<bool> = t.rows.iter().map(|r| r.visible).collect();
        prop_assert_eq!(once.clone(), twice);

        let mut reversed: Vec<Vec<String>> = rows.clone();
        reversed.reverse();
        let mut rt = table(&reversed);
        rt.filter(&term);
        let mut back: Vec<bool> = rt.rows.iter().map(|r| r.visible).collect();
        back.reverse();
        prop_assert_eq!(once, back);
    }

    #[test]
    fn numeric_column_sorts_both_ways(
        prices in proptest::collection::vec(0u64..10_000_000, 1..20),
        mode in prop_oneof![Just(ComparatorMode::Pairwise), Just(ComparatorMode::Column)],
    ) {
        let rows: Vec<Row> = prices
            .iter()
            .enumerate()
            .map(|(i, c)| Row::new([format!("item {i}"), price_text(*c)]))
            .collect();
        let mut t = Table::new(vec![header("Item"), header("Price")], rows);
        let values = |t: &Table| -> Vec<f64> {
            t.rows.iter().filter_map(|r| parse_numeric(&r.cells[1])).collect()
        };

        prop_assert_eq!(t.sort(1, mode).unwrap(), SortDirection::Ascending);
        let asc = values(&t);
        prop_assert_eq!(asc.len(), prices.len());
        prop_assert!(asc.windows(2).all(|w| w[0] <= w[1]));

        prop_assert_eq!(t.sort(1, mode).unwrap(), SortDirection::Descending);
        let mut desc = values(&t);
        desc.reverse();
        prop_assert_eq!(desc, asc);
    }

    #[test]
    fn csv_lines_split_back_into_their_fields(
        rows in proptest::collection::vec(
            ("[a-zA-Z0-9 .]{0,8}", any::<i32>(), proptest::option::of(any::<bool>())),
            1..10,
        )
    ) {
        let records: Vec<Record> = rows
            .iter()
            .map(|(name, qty, sold)| {
                let mut r = Record::new();
                r.insert("name".into(), Value::from(name.clone()));
                r.insert("qty".into(), Value::from(*qty));
                r.insert("sold".into(), sold.map(Value::from).unwrap_or(Value::Null));
                r
            })
            .collect();
        let csv = to_csv(&records);
        let lines: Vec<&str> = csv.split('\n').collect();
        prop_assert_eq!(lines.len(), rows.len() + 1);
        prop_assert_eq!(lines[0], "name,qty,sold");
        for (line, (name, qty, sold)) in lines[1..].iter().zip(&rows) {
            let fields: Vec<&str> = line.split(',').collect();
            let qty = qty.to_string();
            let sold = sold.map(|b| b.to_string()).unwrap_or_default();
            let expected = vec![name.as_str(), qty.as_str(), sold.as_str()];
            prop_assert_eq!(fields, expected);
        }
    }

    #[test]
    fn csv_quotes_text_with_commas(left in "[a-z]{0,4}", right in "[a-z]{0,4}") {
        let note = format!("{left},{right}");
        let mut r = Record::new();
        r.insert("note".into(), Value::from(note.clone()));
        prop_assert_eq!(to_csv(&[r]), format!("note\n\"{note}\""));
    }
}
