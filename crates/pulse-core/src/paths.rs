//! Object-store key layout.
//!
//! Every artifact the pipeline reads or writes lives under a fixed prefix:
//!
//! | Prefix | Contents |
//! |--------|----------|
//! | `raw/` | Original survey upload |
//! | `filter/` | Managed-query output (newest-wins selection) |
//! | `processed/<job>/` | Clustered extract, scoped by job id |
//! | `scripts/` | Clustering job code asset |
//! | `jobs/` | Per-job write-ahead records |
//!
//! Intermediate artifacts are scoped by job id so that concurrent jobs never
//! overwrite each other's extracts.

use crate::id::JobId;

/// Prefix holding raw survey uploads.
pub const RAW_PREFIX: &str = "raw/";
/// Prefix the managed query engine writes filtered extracts into.
pub const FILTER_PREFIX: &str = "filter/";
/// Prefix holding clustered extracts, one directory per job.
pub const PROCESSED_PREFIX: &str = "processed/";
/// Prefix holding pipeline code assets.
pub const SCRIPTS_PREFIX: &str = "scripts/";
/// Prefix holding per-job state records.
pub const JOBS_PREFIX: &str = "jobs/";

/// Fixed file name of the clustered extract within a job's directory.
pub const CLUSTERED_RESULTS_FILE: &str = "clustered_results.csv";

/// Key builders for the fixed object layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectPaths;

impl ObjectPaths {
    /// Key of the raw upload for the given file name.
    #[must_use]
    pub fn raw(file_name: &str) -> String {
        format!("{RAW_PREFIX}{file_name}")
    }

    /// Key of a managed-query output object given its base file name.
    #[must_use]
    pub fn filtered(object_name: &str) -> String {
        format!("{FILTER_PREFIX}{object_name}")
    }

    /// Key of the clustered extract for the given job.
    #[must_use]
    pub fn clustered_results(job_id: JobId) -> String {
        format!("{PROCESSED_PREFIX}{job_id}/{CLUSTERED_RESULTS_FILE}")
    }

    /// Key of the clustering job's code asset.
    #[must_use]
    pub fn processing_script() -> String {
        format!("{SCRIPTS_PREFIX}processing_script.py")
    }

    /// Key of the write-ahead record for the given job.
    #[must_use]
    pub fn job_record(job_id: JobId) -> String {
        format!("{JOBS_PREFIX}{job_id}.json")
    }

    /// Strips the filter prefix from a full key, returning the base file name.
    #[must_use]
    pub fn filtered_base_name(key: &str) -> &str {
        key.strip_prefix(FILTER_PREFIX).unwrap_or(key)
    }
}

/// Returns true if the key names a query-engine metadata sidecar rather than
/// a result object.
#[must_use]
pub fn is_metadata_sidecar(key: &str) -> bool {
    key.ends_with("metadata")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_use_fixed_prefixes() {
        let job = JobId::generate();
        assert_eq!(ObjectPaths::raw("survey.csv"), "raw/survey.csv");
        assert_eq!(ObjectPaths::filtered("east.csv"), "filter/east.csv");
        assert_eq!(
            ObjectPaths::clustered_results(job),
            format!("processed/{job}/clustered_results.csv")
        );
        assert_eq!(ObjectPaths::job_record(job), format!("jobs/{job}.json"));
    }

    #[test]
    fn clustered_results_are_job_scoped() {
        let a = ObjectPaths::clustered_results(JobId::generate());
        let b = ObjectPaths::clustered_results(JobId::generate());
        assert_ne!(a, b);
    }

    #[test]
    fn metadata_sidecars_are_detected() {
        assert!(is_metadata_sidecar("filter/abc123.csv.metadata"));
        assert!(is_metadata_sidecar("filter/abc123.csv_metadata"));
        assert!(!is_metadata_sidecar("filter/abc123.csv"));
    }

    #[test]
    fn filtered_base_name_strips_prefix() {
        assert_eq!(ObjectPaths::filtered_base_name("filter/east.csv"), "east.csv");
        assert_eq!(ObjectPaths::filtered_base_name("east.csv"), "east.csv");
    }
}
