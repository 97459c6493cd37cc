//! Storage backend abstraction for object storage.
//!
//! This module defines the storage contract every backend must implement:
//!
//! - Whole-object reads and conditional writes
//! - Prefix listing with `last_modified` metadata (newest-wins selection)
//! - Signed URL generation for direct client access
//! - Multipart upload sessions (initiate, per-part signed URLs, complete)
//!
//! The version token is an opaque `String` so the contract fits S3-style
//! (`ETag`), GCS-style (numeric generation), and the in-memory backend alike.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::id::UploadId;

/// Precondition for conditional writes (CAS operations).
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if the object does not exist.
    DoesNotExist,
    /// Write only if the object's version matches the given token.
    MatchesVersion(String),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded, returns the new version token.
    Success {
        /// The new version token after the write.
        version: String,
    },
    /// Precondition failed, returns the current version token.
    PreconditionFailed {
        /// The current version that caused the precondition to fail.
        current_version: String,
    },
}

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Opaque version token for CAS operations.
    pub version: String,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// One acknowledged part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u32,
    /// Integrity tag returned by the store when the part was written.
    pub etag: String,
}

/// Storage backend trait for object storage.
///
/// All backends (S3-compatible stores, the in-memory test backend) implement
/// this trait. The contract is designed around cloud object storage semantics.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes with an optional precondition.
    ///
    /// Returns `WriteResult::PreconditionFailed` if the precondition is not
    /// met. Precondition failure is a normal result, never an error.
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult>;

    /// Deletes an object. Idempotent.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Lists objects with the given prefix.
    ///
    /// Ordering is backend-defined; callers requiring deterministic order
    /// must sort (the query runner sorts by `last_modified`).
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if the object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;

    /// Generates a signed URL for direct access to an object.
    async fn signed_url(&self, path: &str, expiry: Duration) -> Result<String>;

    /// Opens a multipart upload session against the given key.
    ///
    /// Returns the store-issued session identifier.
    async fn create_multipart_upload(&self, path: &str, content_type: &str) -> Result<UploadId>;

    /// Generates a signed URL granting write access to exactly one part of
    /// an open session.
    ///
    /// Returns `Error::NotFound` if the session is unknown to the store.
    async fn upload_part_url(
        &self,
        path: &str,
        upload_id: &UploadId,
        part_number: u32,
        expiry: Duration,
    ) -> Result<String>;

    /// Finalizes a multipart upload session.
    ///
    /// Parts must be supplied in ascending part-number order with matching
    /// integrity tags. Returns `Error::IntegrityCheck` if any tag is
    /// rejected, leaving the session abandoned so the caller may retry or
    /// abort. Returns `Error::NotFound` if the session is unknown.
    async fn complete_multipart_upload(
        &self,
        path: &str,
        upload_id: &UploadId,
        parts: &[CompletedPart],
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    /// Numeric version stored as i64 internally, exposed as String via API.
    version: i64,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct UploadSession {
    path: String,
    parts: HashMap<u32, (Bytes, String)>,
}

/// In-memory storage backend for tests and debug deployments.
///
/// Thread-safe via `RwLock`. Not suitable for production: no durability and
/// no cross-process visibility.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<String, StoredObject>>,
    uploads: RwLock<HashMap<String, UploadSession>>,
    next_upload: RwLock<u64>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one part of an open session, returning its integrity tag.
    ///
    /// Stands in for the client-side PUT against a part URL, which real
    /// backends receive directly at the store.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the session is unknown.
    pub fn put_part(&self, upload_id: &UploadId, part_number: u32, data: Bytes) -> Result<String> {
        let mut uploads = self.uploads.write().map_err(|_| Error::internal("lock poisoned"))?;
        let session = uploads
            .get_mut(upload_id.as_str())
            .ok_or_else(|| Error::not_found(format!("upload session {upload_id}")))?;
        let etag = part_etag(&data);
        session.parts.insert(part_number, (data, etag.clone()));
        Ok(etag)
    }
}

fn part_etag(data: &Bytes) -> String {
    let digest = Sha256::digest(data);
    // Short hex prefix is enough for an opaque tag.
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::internal("lock poisoned"))?;
        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::not_found(format!("object not found: {path}")))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut objects = self.objects.write().map_err(|_| Error::internal("lock poisoned"))?;
        let current = objects.get(path).map(|o| o.version);

        match (&precondition, current) {
            (WritePrecondition::DoesNotExist, Some(version)) => {
                return Ok(WriteResult::PreconditionFailed {
                    current_version: version.to_string(),
                });
            }
            (WritePrecondition::MatchesVersion(expected), Some(version)) => {
                if expected != &version.to_string() {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: version.to_string(),
                    });
                }
            }
            (WritePrecondition::MatchesVersion(_), None) => {
                return Err(Error::not_found(format!("object not found: {path}")));
            }
            _ => {}
        }

        let version = current.unwrap_or(0) + 1;
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                version,
                last_modified: Utc::now(),
            },
        );
        Ok(WriteResult::Success {
            version: version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::internal("lock poisoned"))?;
        objects.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::internal("lock poisoned"))?;
        Ok(objects
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, o)| ObjectMeta {
                path: path.clone(),
                size: o.data.len() as u64,
                version: o.version.to_string(),
                last_modified: Some(o.last_modified),
            })
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::internal("lock poisoned"))?;
        Ok(objects.get(path).map(|o| ObjectMeta {
            path: path.to_string(),
            size: o.data.len() as u64,
            version: o.version.to_string(),
            last_modified: Some(o.last_modified),
        }))
    }

    async fn signed_url(&self, path: &str, expiry: Duration) -> Result<String> {
        Ok(format!("memory://{path}?expires={}", expiry.as_secs()))
    }

    async fn create_multipart_upload(&self, path: &str, _content_type: &str) -> Result<UploadId> {
        let mut next = self.next_upload.write().map_err(|_| Error::internal("lock poisoned"))?;
        *next += 1;
        let id = format!("upload-{next:04}", next = *next);
        let mut uploads = self.uploads.write().map_err(|_| Error::internal("lock poisoned"))?;
        uploads.insert(
            id.clone(),
            UploadSession {
                path: path.to_string(),
                parts: HashMap::new(),
            },
        );
        Ok(UploadId::new(id))
    }

    async fn upload_part_url(
        &self,
        path: &str,
        upload_id: &UploadId,
        part_number: u32,
        expiry: Duration,
    ) -> Result<String> {
        let uploads = self.uploads.read().map_err(|_| Error::internal("lock poisoned"))?;
        if !uploads.contains_key(upload_id.as_str()) {
            return Err(Error::not_found(format!("upload session {upload_id}")));
        }
        Ok(format!(
            "memory://{path}?uploadId={upload_id}&partNumber={part_number}&expires={}",
            expiry.as_secs()
        ))
    }

    async fn complete_multipart_upload(
        &self,
        path: &str,
        upload_id: &UploadId,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let session = {
            let uploads = self.uploads.read().map_err(|_| Error::internal("lock poisoned"))?;
            let session = uploads
                .get(upload_id.as_str())
                .ok_or_else(|| Error::not_found(format!("upload session {upload_id}")))?;
            if session.path != path {
                return Err(Error::InvalidInput(format!(
                    "upload session {upload_id} is not open against {path}"
                )));
            }
            session.parts.clone()
        };

        let mut assembled = Vec::new();
        let mut previous = 0u32;
        for part in parts {
            if part.part_number <= previous {
                return Err(Error::InvalidInput(format!(
                    "parts must be in ascending order: {} after {previous}",
                    part.part_number
                )));
            }
            previous = part.part_number;

            let (data, etag) = session.get(&part.part_number).ok_or_else(|| {
                Error::integrity(format!("part {} was never uploaded", part.part_number))
            })?;
            if etag != &part.etag {
                return Err(Error::integrity(format!(
                    "part {} tag mismatch: expected {etag}, got {}",
                    part.part_number, part.etag
                )));
            }
            assembled.extend_from_slice(data);
        }

        self.put(path, Bytes::from(assembled), WritePrecondition::None)
            .await?;
        let mut uploads = self.uploads.write().map_err(|_| Error::internal("lock poisoned"))?;
        uploads.remove(upload_id.as_str());
        Ok(())
    }
}
