//! In-place filtering and column sorting over rows the server already
//! rendered.

use std::cmp::Ordering;

use serde::Deserialize;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::config::ComparatorMode;
use crate::error::{Error, Result};
use crate::format::parse_float;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn marker_class(self) -> &'static str {
        match self {
            SortDirection::Ascending => "sort-asc",
            SortDirection::Descending => "sort-desc",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    pub label: String,
    #[serde(default)]
    pub sortable: bool,
    #[serde(skip)]
    pub marker: Option<SortDirection>,
}

fn visible_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Row {
    pub cells: Vec<String>,
    #[serde(skip, default = "visible_by_default")]
    pub visible: bool,
}

impl Row {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
            visible: true,
        }
    }

    /// Whole-row text as the filter sees it.
    pub fn text(&self) -> String {
        self.cells.join(" ")
    }

    fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(|c| c.trim()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Table {
    pub headers: Vec<Header>,
    #[serde(default)]
    pub rows: Vec<Row>,
    /// Whether a search input sits next to this table.
    #[serde(default)]
    pub has_search: bool,
    #[serde(skip)]
    pub filter: String,
}

impl Table {
    pub fn new(headers: Vec<Header>, rows: Vec<Row>) -> Self {
        Self {
            headers,
            rows,
            has_search: false,
            filter: String::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.headers.is_empty() {
            return Err(Error::msg("table has no headers"));
        }
        Ok(())
    }

    /// Case-insensitive substring match over each row's text. Hidden rows
    /// stay in place; order is untouched.
    pub fn filter(&mut self, term: &str) {
        self.filter = term.to_string();
        let needle = term.to_lowercase();
        for row in &mut self.rows {
            row.visible = row.text().to_lowercase().contains(&needle);
        }
    }

    pub fn active_sort(&self) -> Option<(usize, SortDirection)> {
        self.headers
            .iter()
            .enumerate()
            .find_map(|(i, h)| h.marker.map(|d| (i, d)))
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| r.visible)
    }

    /// Header click. A header without a marker starts ascending, the marked
    /// header flips direction, and every other marker is cleared.
    pub fn sort(&mut self, column: usize, mode: ComparatorMode) -> Result<SortDirection> {
        let Some(header) = self.headers.get(column) else {
            return Err(Error::msg(format!("no column at index {column}")));
        };
        if !header.sortable {
            return Err(Error::msg(format!(
                "column '{}' is not sortable",
                header.label
            )));
        }
        let direction = match header.marker {
            Some(SortDirection::Ascending) => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };

        let rows = std::mem::take(&mut self.rows);
        let numeric_column = match mode {
            ComparatorMode::Pairwise => None,
            ComparatorMode::Column => Some(
                rows.iter()
                    .all(|r| parse_numeric(r.cell(column)).is_some()),
            ),
        };
        let cmp = |a: &Row, b: &Row| {
            let (a, b) = (a.cell(column), b.cell(column));
            let ord = match numeric_column {
                None => compare_pairwise(a, b),
                Some(numeric) => compare_classified(a, b, numeric),
            };
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        };
        self.rows = merge_sort_by(rows, &cmp);

        for h in &mut self.headers {
            h.marker = None;
        }
        self.headers[column].marker = Some(direction);
        Ok(direction)
    }
}

/// Strips `$` and `,`, then reads the leading float literal.
pub fn parse_numeric(cell: &str) -> Option<f64> {
    let stripped: String = cell.chars().filter(|c| *c != '$' && *c != ',').collect();
    parse_float(&stripped)
}

/// Numeric only when both sides parse; otherwise text order of the raw
/// cells. Mixed columns can make this inconsistent across pairs.
pub fn compare_pairwise(a: &str, b: &str) -> Ordering {
    match (parse_numeric(a), parse_numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => locale_compare(a, b),
    }
}

fn compare_classified(a: &str, b: &str, numeric: bool) -> Ordering {
    if numeric {
        let x = parse_numeric(a).unwrap_or(f64::NAN);
        let y = parse_numeric(b).unwrap_or(f64::NAN);
        return x.total_cmp(&y);
    }
    locale_compare(a, b)
}

fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

/// Combining marks attached to each base character, in order.
fn accents(s: &str) -> Vec<Vec<char>> {
    let mut out: Vec<Vec<char>> = Vec::new();
    for c in s.nfd() {
        if is_combining_mark(c) {
            if let Some(last) = out.last_mut() {
                last.push(c);
            }
        } else {
            out.push(Vec::new());
        }
    }
    out
}

/// Collation-style order: letters compared without accents or case, then
/// unaccented before accented, then lowercase before uppercase, then code
/// points.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accents(a).cmp(&accents(b)))
        .then_with(|| {
            a.nfd()
                .map(char::is_uppercase)
                .cmp(b.nfd().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

/// Stable merge sort that tolerates comparators which are not a total
/// order (the pairwise comparator on mixed columns).
fn merge_sort_by<T, F>(mut items: Vec<T>, cmp: &F) -> Vec<T>
where
    F: Fn(&T, &T) -> Ordering,
{
    if items.len() <= 1 {
        return items;
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort_by(items, cmp);
    let right = merge_sort_by(right, cmp);

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();
    loop {
        let take_left = match (l.peek(), r.peek()) {
            (Some(a), Some(b)) => cmp(a, b) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { l.next() } else { r.next() };
        out.extend(next);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(label: &str) -> Header {
        Header {
            label: label.into(),
            sortable: true,
            marker: None,
        }
    }

    fn items_table() -> Table {
        Table::new(
            vec![header("Item"), header("Cost"), header("Status")],
            vec![
                Row::new(["Lamp", "$1,200.50", "Listed"]),
                Row::new(["chair", "$35", "Sold"]),
                Row::new(["Bench", "$300", "watchlist"]),
                Row::new(["desk", "$35", "Sold"]),
            ],
        )
    }

    fn column(t: &Table, idx: usize) -> Vec<String> {
        t.rows.iter().map(|r| r.cells[idx].clone()).collect()
    }

    #[test]
    fn parses_like_parse_float() {
        assert_eq!(parse_numeric("$1,234.50"), Some(1234.5));
        assert_eq!(parse_numeric("12 units"), Some(12.0));
        assert_eq!(parse_numeric("-3.5%"), Some(-3.5));
        assert_eq!(parse_numeric(".5"), Some(0.5));
        assert_eq!(parse_numeric("1e3x"), Some(1000.0));
        assert_eq!(parse_numeric("2e"), Some(2.0));
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("."), None);
    }

    #[test]
    fn filter_is_case_insensitive_and_keeps_order() {
        let mut t = items_table();
        t.filter("SOLD");
        let visible: Vec<_> = t.visible_rows().map(|r| r.cells[0].as_str()).collect();
        assert_eq!(visible, vec!["chair", "desk"]);
        assert_eq!(t.rows.len(), 4);
        assert_eq!(column(&t, 0), vec!["Lamp", "chair", "Bench", "desk"]);

        t.filter("SOLD");
        assert_eq!(t.visible_rows().count(), 2);

        t.filter("");
        assert_eq!(t.visible_rows().count(), 4);
    }

    #[test]
    fn numeric_column_sorts_then_flips() {
        let mut t = items_table();
        assert_eq!(t.sort(1, ComparatorMode::Pairwise).unwrap(), SortDirection::Ascending);
        assert_eq!(column(&t, 1), vec!["$35", "$35", "$300", "$1,200.50"]);
        assert_eq!(column(&t, 0)[..2], ["chair", "desk"]);

        assert_eq!(t.sort(1, ComparatorMode::Pairwise).unwrap(), SortDirection::Descending);
        assert_eq!(column(&t, 1), vec!["$1,200.50", "$300", "$35", "$35"]);

        assert_eq!(t.sort(1, ComparatorMode::Pairwise).unwrap(), SortDirection::Ascending);
    }

    #[test]
    fn switching_columns_resets_marker() {
        let mut t = items_table();
        t.sort(1, ComparatorMode::Pairwise).unwrap();
        t.sort(1, ComparatorMode::Pairwise).unwrap();
        assert_eq!(t.active_sort(), Some((1, SortDirection::Descending)));

        assert_eq!(t.sort(0, ComparatorMode::Pairwise).unwrap(), SortDirection::Ascending);
        assert_eq!(t.active_sort(), Some((0, SortDirection::Ascending)));
        assert!(t.headers[1].marker.is_none());
        assert_eq!(column(&t, 0), vec!["Bench", "chair", "desk", "Lamp"]);
    }

    #[test]
    fn hidden_rows_are_reordered_too() {
        let mut t = items_table();
        t.filter("sold");
        t.sort(0, ComparatorMode::Pairwise).unwrap();
        assert_eq!(column(&t, 0), vec!["Bench", "chair", "desk", "Lamp"]);
        let hidden: Vec<_> = t
            .rows
            .iter()
            .filter(|r| !r.visible)
            .map(|r| r.cells[0].as_str())
            .collect();
        assert_eq!(hidden, vec!["Bench", "Lamp"]);
    }

    #[test]
    fn rejects_unsortable_and_missing_columns() {
        let mut t = items_table();
        t.headers[2].sortable = false;
        assert!(t.sort(2, ComparatorMode::Pairwise).is_err());
        assert!(t.sort(9, ComparatorMode::Pairwise).is_err());
        assert!(t.active_sort().is_none());
    }

    #[test]
    fn column_mode_uses_text_order_for_mixed_columns() {
        let rows = vec![
            Row::new(["10"]),
            Row::new(["n/a"]),
            Row::new(["9"]),
        ];
        let mut t = Table::new(vec![header("Price")], rows);
        t.sort(0, ComparatorMode::Column).unwrap();
        assert_eq!(column(&t, 0), vec!["10", "9", "n/a"]);
    }

    #[test]
    fn pairwise_mode_never_panics_on_mixed_columns() {
        let rows = ["10", "n/a", "9", "abc", "100", "", "$5"]
            .iter()
            .map(|c| Row::new([*c]))
            .collect();
        let mut t = Table::new(vec![header("Price")], rows);
        t.sort(0, ComparatorMode::Pairwise).unwrap();
        assert_eq!(t.rows.len(), 7);
        let mut cells = column(&t, 0);
        cells.sort();
        assert_eq!(cells, vec!["", "$5", "10", "100", "9", "abc", "n/a"]);
    }

    #[test]
    fn missing_cells_compare_as_empty_text() {
        let rows = vec![Row::new(["b", "x"]), Row::new(["a"])];
        let mut t = Table::new(vec![header("A"), header("B")], rows);
        t.sort(1, ComparatorMode::Pairwise).unwrap();
        assert_eq!(t.rows[0].cells, vec!["a"]);
    }

    #[test]
    fn locale_compare_orders_case_insensitively() {
        assert_eq!(locale_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn accented_names_sort_with_their_base_letters() {
        assert_eq!(locale_compare("Éclair", "Fork"), Ordering::Less);
        assert_eq!(locale_compare("café", "cafz"), Ordering::Less);
        assert_eq!(locale_compare("cafe", "café"), Ordering::Less);
        assert_eq!(locale_compare("café", "Cafe"), Ordering::Greater);
        assert_eq!(locale_compare("résumé", "resume"), Ordering::Greater);

        let mut t = Table::new(
            vec![header("Item")],
            vec![
                Row::new(["Zither"]),
                Row::new(["Émail vase"]),
                Row::new(["Armoire"]),
                Row::new(["eagle print"]),
            ],
        );
        t.sort(0, ComparatorMode::Pairwise).unwrap();
        let names: Vec<String> = t.rows.iter().map(|r| r.cells[0].clone()).collect();
        assert_eq!(names, vec!["Armoire", "eagle print", "Émail vase", "Zither"]);
    }
}
