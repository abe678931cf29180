//! In-Memory Storage Services
//!
//! [`MemoryStore`] implements both [`FileService`] and [`BlobService`] inside
//! the process. Files are [`SparseFile`]s, so only written ranges take memory.
//!
//! All state sits behind one async `RwLock`: writes to disjoint ranges of a
//! file never interleave, and range listings see a consistent snapshot.
//! Copies complete on a spawned task after the configured copy latency, or
//! inline when no latency is set. Completing a copy reads the whole source,
//! holes included, so sources above `MAX_COPY_SOURCE_SIZE` are refused.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::connection::{ResourceLocator, StorageAccount};
use crate::errors::{FileShareError, Result};
use crate::protocol::{join_path, split_path};
use crate::sas::{strip_sas, verify_sas};
use crate::service::{BlobService, FileService};
use crate::sparse::SparseFile;
use crate::types::*;

struct FileNode {
    data: SparseFile,
    last_modified: DateTime<Utc>,
}

enum Node {
    Directory(DirectoryNode),
    File(FileNode),
}

struct DirectoryNode {
    entries: BTreeMap<String, Node>,
}

impl DirectoryNode {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    fn walk(&self, components: &[String]) -> Option<&DirectoryNode> {
        components
            .iter()
            .try_fold(self, |dir, name| match dir.entries.get(name) {
                Some(Node::Directory(child)) => Some(child),
                _ => None,
            })
    }

    fn walk_mut(&mut self, components: &[String]) -> Option<&mut DirectoryNode> {
        let mut dir = self;
        for name in components {
            dir = match dir.entries.get_mut(name) {
                Some(Node::Directory(child)) => child,
                _ => return None,
            };
        }
        Some(dir)
    }
}

struct BlobEntry {
    content: Bytes,
    last_modified: DateTime<Utc>,
    copy_state: Option<CopyState>,
}

impl BlobEntry {
    fn has_pending_copy(&self) -> bool {
        matches!(&self.copy_state, Some(copy) if copy.status == CopyStatus::Pending)
    }
}

#[derive(Default)]
struct Container {
    blobs: BTreeMap<String, BlobEntry>,
}

#[derive(Default)]
struct StoreState {
    shares: HashMap<String, DirectoryNode>,
    containers: HashMap<String, Container>,
}

fn not_found(resource: impl Into<String>) -> FileShareError {
    FileShareError::ResourceNotFound(resource.into())
}

fn resource_name(scope: &str, path: &str) -> String {
    join_path(scope, path)
}

/// Splits a path into its parent components and final name
fn split_parent(share: &str, path: &str) -> Result<(Vec<String>, String)> {
    let mut components = split_path(path)?;
    let name = components.pop().ok_or_else(|| {
        FileShareError::InvalidArgument(format!("Path names the root of share {}", share))
    })?;
    Ok((components, name))
}

impl StoreState {
    fn share(&self, share: &str) -> Result<&DirectoryNode> {
        self.shares.get(share).ok_or_else(|| not_found(share))
    }

    fn share_mut(&mut self, share: &str) -> Result<&mut DirectoryNode> {
        self.shares.get_mut(share).ok_or_else(|| not_found(share))
    }

    /// Parent directory of `path` and the final path component
    fn parent_mut(&mut self, share: &str, path: &str) -> Result<(&mut DirectoryNode, String)> {
        let (parent, name) = split_parent(share, path)?;
        let dir = self
            .share_mut(share)?
            .walk_mut(&parent)
            .ok_or_else(|| not_found(resource_name(share, &parent.join("/"))))?;
        Ok((dir, name))
    }

    fn file(&self, share: &str, path: &str) -> Result<&FileNode> {
        let (parent, name) = split_parent(share, path)?;
        let dir = self
            .share(share)?
            .walk(&parent)
            .ok_or_else(|| not_found(resource_name(share, path)))?;
        match dir.entries.get(&name) {
            Some(Node::File(file)) => Ok(file),
            _ => Err(not_found(resource_name(share, path))),
        }
    }

    fn file_mut(&mut self, share: &str, path: &str) -> Result<&mut FileNode> {
        let (dir, name) = self.parent_mut(share, path)?;
        match dir.entries.get_mut(&name) {
            Some(Node::File(file)) => Ok(file),
            _ => Err(not_found(resource_name(share, path))),
        }
    }

    fn container_mut(&mut self, container: &str) -> Result<&mut Container> {
        self.containers.get_mut(container).ok_or_else(|| not_found(container))
    }

    fn blob(&self, container: &str, blob: &str) -> Result<&BlobEntry> {
        self.containers
            .get(container)
            .ok_or_else(|| not_found(container))?
            .blobs
            .get(blob)
            .ok_or_else(|| not_found(resource_name(container, blob)))
    }

    fn blob_mut(&mut self, container: &str, blob: &str) -> Result<&mut BlobEntry> {
        self.container_mut(container)?
            .blobs
            .get_mut(blob)
            .ok_or_else(|| not_found(resource_name(container, blob)))
    }

    /// Size of a copy source, refusing sources above `MAX_COPY_SOURCE_SIZE`
    fn source_len(&self, source: &ResourceLocator) -> Result<u64> {
        let len = match source {
            ResourceLocator::File { share, path } => self.file(share, path)?.data.max_size(),
            ResourceLocator::Blob { container, blob } => self.blob(container, blob)?.content.len() as u64,
        };
        if len > MAX_COPY_SOURCE_SIZE {
            return Err(FileShareError::InvalidSize(len));
        }
        Ok(len)
    }

    fn read_source(&self, source: &ResourceLocator) -> Result<Bytes> {
        self.source_len(source)?;
        match source {
            ResourceLocator::File { share, path } => self.file(share, path)?.data.read_all(),
            ResourceLocator::Blob { container, blob } => Ok(self.blob(container, blob)?.content.clone()),
        }
    }

    /// Finishes copy `copy_id` into `container/blob` from the current source content
    ///
    /// Does nothing when the destination is gone, was overwritten by another
    /// copy or is no longer pending.
    fn complete_copy(&mut self, container: &str, blob: &str, copy_id: &str, source: &ResourceLocator) {
        let content = self.read_source(source);

        let Ok(entry) = self.blob_mut(container, blob) else {
            debug!(container, blob, copy_id, "copy destination vanished before completion");
            return;
        };
        let Some(copy) = entry.copy_state.as_mut() else {
            return;
        };
        if copy.copy_id != copy_id || copy.status != CopyStatus::Pending {
            return;
        }

        let now = Utc::now();
        match content {
            Ok(bytes) => {
                copy.status = CopyStatus::Success;
                copy.bytes_copied = bytes.len() as u64;
                copy.total_bytes = bytes.len() as u64;
                entry.content = bytes;
                debug!(container, blob, copy_id, "copy completed");
            }
            Err(e) => {
                copy.status = CopyStatus::Failed;
                copy.status_description = Some(e.to_string());
                warn!(container, blob, copy_id, error = %e, "copy failed");
            }
        }
        copy.completion_time = Some(now);
        entry.last_modified = now;
    }
}

/// In-process file and blob service
pub struct MemoryStore {
    account: StorageAccount,
    copy_latency: Option<Duration>,
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Creates an empty store for `account`
    ///
    /// Copy sources are authenticated with the account's key.
    pub fn new(account: StorageAccount) -> Self {
        Self {
            account,
            copy_latency: None,
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Sets how long a started copy stays pending before it completes
    pub fn with_copy_latency(mut self, latency: Duration) -> Self {
        self.copy_latency = Some(latency);
        self
    }

    /// Account served by this store
    pub fn account(&self) -> &StorageAccount {
        &self.account
    }
}

#[async_trait]
impl FileService for MemoryStore {
    async fn create_share(&self, share: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.shares.contains_key(share) {
            return Err(FileShareError::ResourceAlreadyExists(share.to_string()));
        }
        state.shares.insert(share.to_string(), DirectoryNode::new());
        Ok(())
    }

    async fn delete_share(&self, share: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.shares.remove(share).map(|_| ()).ok_or_else(|| not_found(share))
    }

    async fn share_exists(&self, share: &str) -> Result<bool> {
        Ok(self.state.read().await.shares.contains_key(share))
    }

    async fn create_directory(&self, share: &str, path: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let (dir, name) = state.parent_mut(share, path)?;
        match dir.entries.get(&name) {
            Some(Node::Directory(_)) => {
                return Err(FileShareError::ResourceAlreadyExists(resource_name(share, path)))
            }
            Some(Node::File(_)) => {
                return Err(FileShareError::ResourceTypeMismatch(format!(
                    "{} is a file",
                    resource_name(share, path)
                )))
            }
            None => {}
        }
        dir.entries.insert(name, Node::Directory(DirectoryNode::new()));
        Ok(())
    }

    async fn delete_directory(&self, share: &str, path: &str, recursive: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let (dir, name) = state.parent_mut(share, path)?;
        match dir.entries.get(&name) {
            Some(Node::Directory(target)) => {
                if !recursive && !target.entries.is_empty() {
                    return Err(FileShareError::DirectoryNotEmpty(resource_name(share, path)));
                }
            }
            _ => return Err(not_found(resource_name(share, path))),
        }
        dir.entries.remove(&name);
        Ok(())
    }

    async fn list_directory(&self, share: &str, path: &str) -> Result<Vec<ListItem>> {
        let components = split_path(path)?;
        let state = self.state.read().await;
        let dir = state
            .share(share)?
            .walk(&components)
            .ok_or_else(|| not_found(resource_name(share, path)))?;

        let parent = components.join("/");
        Ok(dir
            .entries
            .iter()
            .map(|(name, node)| match node {
                Node::Directory(_) => ListItem::Directory(DirectoryItem {
                    name: name.clone(),
                    path: join_path(&parent, name),
                }),
                Node::File(file) => ListItem::File(FileItem {
                    name: name.clone(),
                    path: join_path(&parent, name),
                    content_length: file.data.max_size(),
                }),
            })
            .collect())
    }

    async fn create_file(&self, share: &str, path: &str, max_size: u64) -> Result<()> {
        let data = SparseFile::new(max_size)?;
        let mut state = self.state.write().await;
        let (dir, name) = state.parent_mut(share, path)?;
        if let Some(Node::Directory(_)) = dir.entries.get(&name) {
            return Err(FileShareError::ResourceTypeMismatch(format!(
                "{} is a directory",
                resource_name(share, path)
            )));
        }
        dir.entries.insert(
            name,
            Node::File(FileNode {
                data,
                last_modified: Utc::now(),
            }),
        );
        Ok(())
    }

    async fn get_file_properties(&self, share: &str, path: &str) -> Result<FileProperties> {
        let state = self.state.read().await;
        let file = state.file(share, path)?;
        Ok(FileProperties {
            path: split_path(path)?.join("/"),
            content_length: file.data.max_size(),
            allocated_bytes: file.data.allocated_bytes(),
            last_modified: file.last_modified,
        })
    }

    async fn write_range(&self, share: &str, path: &str, offset: u64, data: Bytes) -> Result<()> {
        let mut state = self.state.write().await;
        let file = state.file_mut(share, path)?;
        file.data.write_range(offset, &data)?;
        file.last_modified = Utc::now();
        Ok(())
    }

    async fn clear_range(&self, share: &str, path: &str, offset: u64, length: u64) -> Result<()> {
        let mut state = self.state.write().await;
        let file = state.file_mut(share, path)?;
        file.data.clear_range(offset, length)?;
        file.last_modified = Utc::now();
        Ok(())
    }

    async fn read_range(&self, share: &str, path: &str, offset: u64, length: u64) -> Result<Bytes> {
        let state = self.state.read().await;
        state.file(share, path)?.data.read_range(offset, length)
    }

    async fn list_ranges(&self, share: &str, path: &str) -> Result<Vec<FileRange>> {
        let state = self.state.read().await;
        Ok(state.file(share, path)?.data.list_ranges())
    }

    async fn delete_file(&self, share: &str, path: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let (dir, name) = state.parent_mut(share, path)?;
        match dir.entries.get(&name) {
            Some(Node::File(_)) => {
                dir.entries.remove(&name);
                Ok(())
            }
            _ => Err(not_found(resource_name(share, path))),
        }
    }
}

#[async_trait]
impl BlobService for MemoryStore {
    async fn create_container(&self, container: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.containers.contains_key(container) {
            return Err(FileShareError::ResourceAlreadyExists(container.to_string()));
        }
        state.containers.insert(container.to_string(), Container::default());
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .containers
            .remove(container)
            .map(|_| ())
            .ok_or_else(|| not_found(container))
    }

    async fn upload_blob(&self, container: &str, blob: &str, data: Bytes) -> Result<()> {
        let mut state = self.state.write().await;
        let target = state.container_mut(container)?;
        if target.blobs.get(blob).is_some_and(BlobEntry::has_pending_copy) {
            return Err(FileShareError::CopyPending(resource_name(container, blob)));
        }
        target.blobs.insert(
            blob.to_string(),
            BlobEntry {
                content: data,
                last_modified: Utc::now(),
                copy_state: None,
            },
        );
        Ok(())
    }

    async fn download_blob(&self, container: &str, blob: &str) -> Result<Bytes> {
        let state = self.state.read().await;
        Ok(state.blob(container, blob)?.content.clone())
    }

    async fn get_blob_properties(&self, container: &str, blob: &str) -> Result<BlobProperties> {
        let state = self.state.read().await;
        let entry = state.blob(container, blob)?;
        Ok(BlobProperties {
            name: blob.to_string(),
            content_length: entry.content.len() as u64,
            last_modified: entry.last_modified,
            copy_state: entry.copy_state.clone(),
        })
    }

    async fn start_copy(&self, container: &str, blob: &str, source: &Url) -> Result<String> {
        let (locator, permissions) = verify_sas(&self.account, source, Utc::now())?;
        if !permissions.contains(SasPermissions::READ) {
            return Err(FileShareError::AuthenticationFailed(format!(
                "Copy source {} is not signed for read access",
                locator
            )));
        }

        let copy_id = Uuid::new_v4().to_string();
        {
            let mut state = self.state.write().await;
            let total_bytes = state.source_len(&locator)?;

            let target = state.container_mut(container)?;
            if target.blobs.get(blob).is_some_and(BlobEntry::has_pending_copy) {
                return Err(FileShareError::CopyPending(resource_name(container, blob)));
            }
            target.blobs.insert(
                blob.to_string(),
                BlobEntry {
                    content: Bytes::new(),
                    last_modified: Utc::now(),
                    copy_state: Some(CopyState {
                        copy_id: copy_id.clone(),
                        status: CopyStatus::Pending,
                        source: strip_sas(source),
                        bytes_copied: 0,
                        total_bytes,
                        completion_time: None,
                        status_description: None,
                    }),
                },
            );

            if self.copy_latency.is_none() {
                state.complete_copy(container, blob, &copy_id, &locator);
                return Ok(copy_id);
            }
        }

        let latency = self.copy_latency.unwrap_or_default();
        let state = Arc::clone(&self.state);
        let container = container.to_string();
        let blob = blob.to_string();
        let task_copy_id = copy_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            state
                .write()
                .await
                .complete_copy(&container, &blob, &task_copy_id, &locator);
        });

        Ok(copy_id)
    }

    async fn abort_copy(&self, container: &str, blob: &str, copy_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state.blob_mut(container, blob)?;
        let resource = resource_name(container, blob);

        let Some(copy) = entry.copy_state.as_mut() else {
            return Err(FileShareError::NoPendingCopy(resource));
        };
        match copy.status {
            CopyStatus::Success => Err(FileShareError::CopyAlreadyCompleted(copy.copy_id.clone())),
            CopyStatus::Aborted | CopyStatus::Failed => Err(FileShareError::NoPendingCopy(resource)),
            CopyStatus::Pending if copy.copy_id != copy_id => Err(FileShareError::CopyIdMismatch {
                expected: copy.copy_id.clone(),
                actual: copy_id.to_string(),
            }),
            CopyStatus::Pending => {
                let now = Utc::now();
                copy.status = CopyStatus::Aborted;
                copy.bytes_copied = 0;
                copy.completion_time = Some(now);
                copy.status_description = Some("Copy aborted on request".to_string());
                entry.content = Bytes::new();
                entry.last_modified = now;
                Ok(())
            }
        }
    }

    async fn delete_blob(&self, container: &str, blob: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .container_mut(container)?
            .blobs
            .remove(blob)
            .map(|_| ())
            .ok_or_else(|| not_found(resource_name(container, blob)))
    }
}
