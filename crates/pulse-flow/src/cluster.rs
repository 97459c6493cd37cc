//! The clustered extract and representative-row selection.
//!
//! The external clustering job writes a CSV where every row carries a
//! `cluster` id (-1 meaning "no cluster") and an `is_unique` flag. The two
//! are synonymous in well-formed output; selection must not double-count a
//! row that is both unique and (incorrectly) tagged with a non-negative
//! cluster id.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Column carrying the cluster id.
const CLUSTER_COLUMN: &str = "cluster";
/// Column flagging rows without a cluster.
const IS_UNIQUE_COLUMN: &str = "is_unique";
/// Working column the clustering job concatenates comments into; dropped on
/// read.
const COMBINED_COMMENTS_COLUMN: &str = "combined_comments";

/// One row of the clustered extract.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRecord {
    /// Original row fields in file order, excluding the clustering columns.
    pub fields: Vec<(String, String)>,
    /// Cluster id; `None` when the cell is empty, `Some(-1)` for "no cluster".
    pub cluster: Option<i64>,
    /// True when the row did not land in any cluster.
    pub is_unique: bool,
}

impl ClusterRecord {
    /// Renders the row as a `col: value` list for prompt embedding.
    #[must_use]
    pub fn render(&self) -> String {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(column, value)| format!("{column}: {value}"))
            .collect();
        parts.join("; ")
    }
}

/// Parses the clustered extract CSV.
///
/// # Errors
///
/// Returns `Error::Serialization` if the CSV cannot be read or lacks the
/// `cluster`/`is_unique` columns.
pub fn parse_clustered_extract(data: &Bytes) -> Result<Vec<ClusterRecord>> {
    let mut reader = csv::Reader::from_reader(data.as_ref());
    let headers = reader
        .headers()
        .map_err(|e| Error::serialization(format!("unreadable clustered extract: {e}")))?
        .clone();

    let cluster_idx = find_column(&headers, CLUSTER_COLUMN)?;
    let unique_idx = find_column(&headers, IS_UNIQUE_COLUMN)?;
    let combined_idx = headers.iter().position(|h| h == COMBINED_COMMENTS_COLUMN);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| Error::serialization(format!("bad extract row: {e}")))?;
        let cluster = parse_cluster_id(row.get(cluster_idx).unwrap_or_default())?;
        let is_unique = parse_flag(row.get(unique_idx).unwrap_or_default());

        let fields = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| {
                *idx != cluster_idx && *idx != unique_idx && Some(*idx) != combined_idx
            })
            .map(|(idx, column)| {
                (
                    column.to_string(),
                    row.get(idx).unwrap_or_default().to_string(),
                )
            })
            .collect();

        records.push(ClusterRecord {
            fields,
            cluster,
            is_unique,
        });
    }
    Ok(records)
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| Error::serialization(format!("'{name}' column not found in extract")))
}

/// Cluster ids arrive as integers or floats (`3`, `3.0`, `-1`); empty cells
/// mean the row was dropped from clustering.
fn parse_cluster_id(cell: &str) -> Result<Option<i64>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    if let Ok(id) = cell.parse::<i64>() {
        return Ok(Some(id));
    }
    cell.parse::<f64>()
        .map(|f| Some(f as i64))
        .map_err(|_| Error::serialization(format!("invalid cluster id: {cell:?}")))
}

fn parse_flag(cell: &str) -> bool {
    matches!(cell.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

/// Builds the representative row set: every uniquely-flagged row, plus one
/// representative per distinct non-negative cluster id, deduplicated by
/// full-row identity.
///
/// A row that is unique *and* tagged with a non-negative id covers the
/// unique rule only; the cluster still gets its own representative from the
/// remaining rows, so the two rules contribute two rows unless they name the
/// identical row. No row ever appears twice.
#[must_use]
pub fn select_representatives(records: &[ClusterRecord]) -> Vec<&ClusterRecord> {
    // Linear scans keep first-appearance order; extracts are prompt-sized.
    let mut selected: Vec<&ClusterRecord> = Vec::new();
    for record in records.iter().filter(|r| r.is_unique) {
        if !selected.iter().any(|s| **s == *record) {
            selected.push(record);
        }
    }

    let mut seen_clusters: Vec<i64> = Vec::new();
    for record in records {
        let Some(id) = record.cluster else { continue };
        if id < 0 || seen_clusters.contains(&id) {
            continue;
        }
        seen_clusters.push(id);

        let representative = records
            .iter()
            .filter(|r| r.cluster == Some(id))
            .find(|candidate| !selected.iter().any(|s| *s == *candidate));
        if let Some(representative) = representative {
            selected.push(representative);
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, cluster: Option<i64>, is_unique: bool) -> ClusterRecord {
        ClusterRecord {
            fields: vec![("id".to_string(), id.to_string())],
            cluster,
            is_unique,
        }
    }

    #[test]
    fn parses_extract_and_drops_working_columns() {
        let data = Bytes::from(
            "id,comment_burnout_reason,combined_comments,cluster,is_unique\n\
             1,long hours,long hours,0,False\n\
             2,no parking,no parking,-1,True\n",
        );
        let records = parse_clustered_extract(&data).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cluster, Some(0));
        assert!(!records[0].is_unique);
        assert_eq!(records[1].cluster, Some(-1));
        assert!(records[1].is_unique);
        assert_eq!(
            records[0].fields,
            vec![
                ("id".to_string(), "1".to_string()),
                ("comment_burnout_reason".to_string(), "long hours".to_string()),
            ]
        );
    }

    #[test]
    fn float_cluster_ids_are_accepted() {
        let data = Bytes::from("id,cluster,is_unique\n1,3.0,False\n2,,False\n");
        let records = parse_clustered_extract(&data).unwrap();
        assert_eq!(records[0].cluster, Some(3));
        assert_eq!(records[1].cluster, None);
    }

    #[test]
    fn missing_cluster_column_is_rejected() {
        let data = Bytes::from("id,is_unique\n1,True\n");
        let err = parse_clustered_extract(&data).unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn missing_is_unique_column_is_rejected() {
        let data = Bytes::from("id,cluster\n1,0\n");
        assert!(parse_clustered_extract(&data).is_err());
    }

    #[test]
    fn unique_rows_and_first_cluster_rows_are_selected() {
        let records = vec![
            record("a", Some(-1), true),
            record("b", Some(0), false),
            record("c", Some(0), false),
            record("d", Some(1), false),
        ];
        let reps = select_representatives(&records);
        let ids: Vec<&str> = reps.iter().map(|r| r.fields[0].1.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d"]);
    }

    #[test]
    fn unique_row_with_cluster_id_does_not_suppress_cluster_representative() {
        // Row "a" is unique but (incorrectly) tagged with cluster 3; row "b"
        // also bears cluster 3. Both rules fire: two rows, each exactly once.
        for records in [
            vec![record("a", Some(3), true), record("b", Some(3), false)],
            vec![record("b", Some(3), false), record("a", Some(3), true)],
        ] {
            let reps = select_representatives(&records);
            let mut ids: Vec<&str> = reps.iter().map(|r| r.fields[0].1.as_str()).collect();
            ids.sort_unstable();
            assert_eq!(ids, vec!["a", "b"]);
        }
    }

    #[test]
    fn unique_row_that_is_the_whole_cluster_contributes_once() {
        let records = vec![record("a", Some(3), true)];
        assert_eq!(select_representatives(&records).len(), 1);
    }

    #[test]
    fn negative_and_missing_cluster_ids_contribute_no_cluster_rows() {
        let records = vec![record("a", Some(-1), false), record("b", None, false)];
        assert!(select_representatives(&records).is_empty());
    }

    #[test]
    fn identical_duplicate_rows_collapse() {
        let records = vec![record("a", Some(-1), true), record("a", Some(-1), true)];
        assert_eq!(select_representatives(&records).len(), 1);
    }
}
