//! Change detection between the last-saved table and an edited one.

use serde::Serialize;

use crate::domain::RawTable;

/// One contiguous block of data rows to overwrite.
///
/// Rows are 1-based sheet rows, so the first data row is row 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeUpdate {
    pub start_row: usize,
    pub end_row: usize,
    pub values: Vec<Vec<String>>,
}

impl RangeUpdate {
    /// A1 notation for this block, e.g. `A5:H7`.
    pub fn a1(&self) -> String {
        let width = self.values.first().map(Vec::len).unwrap_or(1).max(1);
        format!(
            "A{}:{}{}",
            self.start_row,
            column_letter(width),
            self.end_row
        )
    }

    /// A1 notation qualified with a sheet name.
    pub fn qualified(&self, sheet: &str) -> String {
        format!("{}!{}", quote_sheet(sheet), self.a1())
    }
}

/// Spreadsheet column name for a 1-based index: 1 -> A, 27 -> AA.
pub fn column_letter(mut index: usize) -> String {
    let mut out = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        out.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

pub(crate) fn quote_sheet(sheet: &str) -> String {
    if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

/// Group changed rows into contiguous range updates.
///
/// Returns `None` when a partial update cannot express the change (header or
/// row count differs) and the caller must overwrite the whole sheet.
pub fn changed_row_ranges(original: &RawTable, edited: &RawTable) -> Option<Vec<RangeUpdate>> {
    if original.headers != edited.headers || original.rows.len() != edited.rows.len() {
        return None;
    }

    let changed: Vec<usize> = original
        .rows
        .iter()
        .zip(edited.rows.iter())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i)
        .collect();

    let mut updates = Vec::new();
    let mut iter = changed.into_iter().peekable();
    while let Some(first) = iter.next() {
        let mut last = first;
        while iter.peek() == Some(&(last + 1)) {
            last += 1;
            iter.next();
        }
        updates.push(RangeUpdate {
            start_row: first + 2,
            end_row: last + 2,
            values: edited.rows[first..=last].to_vec(),
        });
    }
    Some(updates)
}

/// Cells of the previous `old_rows` x `old_width` block (header included)
/// that an overwrite with `new_rows` x `new_width` leaves behind.
pub fn stale_ranges(
    sheet: &str,
    (old_rows, old_width): (usize, usize),
    (new_rows, new_width): (usize, usize),
) -> Vec<String> {
    let sheet = quote_sheet(sheet);
    let mut out = Vec::new();
    if old_rows > new_rows && old_width > 0 {
        out.push(format!(
            "{sheet}!A{}:{}{}",
            new_rows + 1,
            column_letter(old_width),
            old_rows
        ));
    }
    let overlap = old_rows.min(new_rows);
    if old_width > new_width && overlap > 0 {
        out.push(format!(
            "{sheet}!{}1:{}{}",
            column_letter(new_width + 1),
            column_letter(old_width),
            overlap
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn table(rows: &[[&str; 2]]) -> RawTable {
        RawTable::new(
            vec!["date".into(), "peak_demand".into()],
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[rstest]
    #[case(1, "A")]
    #[case(8, "H")]
    #[case(26, "Z")]
    #[case(27, "AA")]
    #[case(52, "AZ")]
    #[case(703, "AAA")]
    fn test_column_letter(#[case] index: usize, #[case] expected: &str) {
        assert_eq!(column_letter(index), expected);
    }

    #[test]
    fn test_groups_contiguous_rows() {
        let original = table(&[["d1", "1"], ["d2", "2"], ["d3", "3"], ["d4", "4"], ["d5", "5"]]);
        let edited = table(&[["d1", "1"], ["d2", "20"], ["d3", "30"], ["d4", "4"], ["d5", "50"]]);

        let updates = changed_row_ranges(&original, &edited).unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].start_row, 3);
        assert_eq!(updates[0].end_row, 4);
        assert_eq!(updates[0].a1(), "A3:B4");
        assert_eq!(updates[0].values.len(), 2);
        assert_eq!(updates[1].a1(), "A6:B6");
        assert_eq!(updates[1].qualified("Sheet1"), "Sheet1!A6:B6");
    }

    #[test]
    fn test_no_changes_yields_empty_update_set() {
        let t = table(&[["d1", "1"]]);
        assert_eq!(changed_row_ranges(&t, &t), Some(vec![]));
    }

    #[test]
    fn test_shape_change_requires_full_write() {
        let original = table(&[["d1", "1"]]);
        let edited = table(&[["d1", "1"], ["d2", "2"]]);
        assert_eq!(changed_row_ranges(&original, &edited), None);
    }

    #[rstest]
    #[case((5, 3), (3, 3), vec!["Sheet1!A4:C5"])]
    #[case((3, 4), (3, 2), vec!["Sheet1!C1:D3"])]
    #[case((6, 4), (2, 3), vec!["Sheet1!A3:D6", "Sheet1!D1:D2"])]
    #[case((2, 2), (4, 3), vec![])]
    #[case((0, 0), (4, 3), vec![])]
    fn test_stale_ranges(
        #[case] old: (usize, usize),
        #[case] new: (usize, usize),
        #[case] expected: Vec<&str>,
    ) {
        assert_eq!(stale_ranges("Sheet1", old, new), expected);
    }

    #[test]
    fn test_quote_sheet() {
        assert_eq!(quote_sheet("Sheet1"), "Sheet1");
        assert_eq!(quote_sheet("시트1"), "'시트1'");
        assert_eq!(quote_sheet("Bob's data"), "'Bob''s data'");
    }
}
