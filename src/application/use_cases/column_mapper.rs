// ============================================================
// COLUMN MAPPER
// ============================================================
// Positional projection of raw rows into name-keyed records

use crate::domain::table::{cell_at, NormalizedTable, RawTable, Record};
use crate::domain::transform::ColumnMapping;

/// Output headers in mapping order. Duplicates and omissions are kept as given.
pub fn output_headers(mapping: &[ColumnMapping]) -> Vec<String> {
    mapping.iter().map(|m| m.output_name.clone()).collect()
}

/// Build one record. Missing source cells become "". When several entries
/// share an output name the last one wins.
pub fn project_row(row: &[String], mapping: &[ColumnMapping]) -> Record {
    let mut record = Record::with_capacity(mapping.len());
    for entry in mapping {
        record.insert(
            entry.output_name.clone(),
            cell_at(row, entry.source_index).to_string(),
        );
    }
    record
}

/// Lazily project rows one at a time.
pub fn project_rows<'a, I>(
    rows: I,
    mapping: &'a [ColumnMapping],
) -> impl Iterator<Item = Record> + 'a
where
    I: IntoIterator<Item = &'a Vec<String>>,
    I::IntoIter: 'a,
{
    rows.into_iter().map(move |row| project_row(row, mapping))
}

/// Project a whole table. Row count and order are preserved exactly.
pub fn project(raw: &RawTable, mapping: &[ColumnMapping]) -> NormalizedTable {
    NormalizedTable {
        headers: output_headers(mapping),
        rows: project_rows(&raw.rows, mapping).collect(),
    }
}

/// `outputName = headers[i]`, `sourceIndex = i`: pass-through.
pub fn identity_mapping(headers: &[String]) -> Vec<ColumnMapping> {
    headers
        .iter()
        .enumerate()
        .map(|(index, header)| ColumnMapping::new(header.clone(), index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(strings(headers), rows.iter().map(|r| strings(r)).collect())
    }

    #[test]
    fn test_basic_mapping() {
        let table = raw(&["A", "B", "C"], &[&["x", "y", "z"]]);
        let mapping = vec![ColumnMapping::new("First", 2), ColumnMapping::new("Second", 0)];

        let result = project(&table, &mapping);

        assert_eq!(result.headers, strings(&["First", "Second"]));
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0]["First"], "z");
        assert_eq!(result.rows[0]["Second"], "x");
        assert_eq!(result.rows[0].len(), 2);
    }

    #[test]
    fn test_ragged_row_out_of_range_is_empty() {
        let table = raw(&["A"], &[&["only-one-cell"]]);
        let mapping = vec![ColumnMapping::new("Far", 5)];

        let result = project(&table, &mapping);
        assert_eq!(result.rows[0]["Far"], "");
    }

    #[test]
    fn test_unmapped_entry_is_empty() {
        let table = raw(&["A"], &[&["a"]]);
        let result = project(&table, &[ColumnMapping::unmapped("Nothing")]);
        assert_eq!(result.rows[0]["Nothing"], "");
    }

    #[test]
    fn test_identity_mapping_round_trips() {
        let table = raw(
            &["Name", "Email", "City"],
            &[&["Alice", "a@x.io", "Paris"], &["Bob", "b@x.io"], &[""]],
        );

        let result = project(&table, &identity_mapping(&table.headers));

        assert_eq!(result.headers, table.headers);
        assert_eq!(result.rows.len(), table.rows.len());
        for (record, row) in result.rows.iter().zip(&table.rows) {
            for (index, header) in table.headers.iter().enumerate() {
                assert_eq!(record[header], cell_at(row, index));
            }
        }
        assert_eq!(result.rows[1]["City"], "");
    }

    #[test]
    fn test_row_count_preserved_for_ragged_and_empty_rows() {
        let table = raw(&["A", "B"], &[&[], &["1"], &["1", "2", "3"], &[""]]);
        let mapping = vec![ColumnMapping::new("B", 1), ColumnMapping::new("Z", 9)];

        let result = project(&table, &mapping);
        assert_eq!(result.rows.len(), 4);
        assert!(result.rows.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn test_repeated_and_non_monotonic_sources() {
        let table = raw(&["A", "B", "C"], &[&["a", "b", "c"]]);
        let mapping = vec![
            ColumnMapping::new("C1", 2),
            ColumnMapping::new("A1", 0),
            ColumnMapping::new("C2", 2),
        ];

        let result = project(&table, &mapping);
        assert_eq!(result.rows[0]["C1"], "c");
        assert_eq!(result.rows[0]["C2"], "c");
        assert_eq!(result.rows[0]["A1"], "a");
    }

    #[test]
    fn test_duplicate_output_names_last_write_wins() {
        let table = raw(&["A", "B"], &[&["first", "second"]]);
        let mapping = vec![ColumnMapping::new("Dup", 0), ColumnMapping::new("Dup", 1)];

        let result = project(&table, &mapping);
        assert_eq!(result.headers, strings(&["Dup", "Dup"]));
        assert_eq!(result.rows[0].len(), 1);
        assert_eq!(result.rows[0]["Dup"], "second");
    }

    #[test]
    fn test_empty_mapping_keeps_row_count() {
        let table = raw(&["A"], &[&["1"], &["2"], &["3"]]);
        let result = project(&table, &[]);
        assert!(result.headers.is_empty());
        assert_eq!(result.rows.len(), 3);
        assert!(result.rows.iter().all(|r| r.is_empty()));
    }

    #[test]
    fn test_mapping_ignores_raw_header_text() {
        let table = raw(&["Email", "Name"], &[&["a@x.io", "Alice"]]);
        let mapping = vec![ColumnMapping::new("Email", 1)];

        let result = project(&table, &mapping);
        assert_eq!(result.rows[0]["Email"], "Alice");
    }

    #[test]
    fn test_project_rows_is_lazy_and_ordered() {
        let table = raw(&["A"], &[&["1"], &["2"], &["3"]]);
        let mapping = vec![ColumnMapping::new("A", 0)];

        let mut iter = project_rows(&table.rows, &mapping);
        assert_eq!(iter.next().unwrap()["A"], "1");
        assert_eq!(iter.next().unwrap()["A"], "2");
    }
}
