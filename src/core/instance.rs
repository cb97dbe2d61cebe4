//! Instance records and the ordered registry backing the instance list.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Derived presentation state for an instance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceHint {
    /// Installed and current.
    Ready,
    /// Remote-only listing; launching it installs first.
    NotInstalled,
    /// Present locally but never fully installed.
    RequiresUpdate,
    /// Installed with an update waiting.
    UpdatePending,
}

impl InstanceHint {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::NotInstalled => "Not installed",
            Self::RequiresUpdate => "Requires update",
            Self::UpdatePending => "Update pending",
        }
    }
}

/// A configured installation of the managed game client.
///
/// Identity is the content directory. All fields are mutated only from
/// the affinity domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Display title.
    pub title: String,
    /// Directory holding the instance's files.
    pub content_dir: PathBuf,
    /// Manifest location; `None` for manually added instances, which
    /// cannot be updated.
    pub manifest_url: Option<String>,
    /// Present on disk, as opposed to a remote-only listing.
    pub local: bool,
    /// Fully installed; a local instance may still need its first install.
    pub installed: bool,
    /// An update is waiting to be applied on the next launch.
    pub update_pending: bool,
    /// Selected in the instance list.
    #[serde(skip)]
    pub selected: bool,
}

impl Instance {
    /// Create a manually added, locally installed instance.
    pub fn new(title: impl Into<String>, content_dir: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            content_dir: content_dir.into(),
            manifest_url: None,
            local: true,
            installed: true,
            update_pending: false,
            selected: false,
        }
    }

    /// Create a remote-only listing that has yet to be installed.
    pub fn remote(
        title: impl Into<String>,
        content_dir: impl Into<PathBuf>,
        manifest_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content_dir: content_dir.into(),
            manifest_url: Some(manifest_url.into()),
            local: false,
            installed: false,
            update_pending: false,
            selected: false,
        }
    }

    pub fn with_manifest(mut self, manifest_url: impl Into<String>) -> Self {
        self.manifest_url = Some(manifest_url.into());
        self
    }

    /// Whether updates can ever apply to this instance.
    pub fn can_update(&self) -> bool {
        self.manifest_url.is_some()
    }

    pub fn hint(&self) -> InstanceHint {
        if !self.local {
            InstanceHint::NotInstalled
        } else if !self.installed {
            InstanceHint::RequiresUpdate
        } else if self.update_pending {
            InstanceHint::UpdatePending
        } else {
            InstanceHint::Ready
        }
    }
}

/// Ordered mutable collection of instances.
///
/// Display order is derived by [`sort`](Self::sort) and never recomputed
/// implicitly on mutation. Writes are valid only from the affinity
/// domain; the surrounding lock exists to satisfy sharing, not to relax
/// that rule.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: Vec<Instance>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instance> {
        self.instances.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Instance> {
        self.instances.get_mut(index)
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Replace the whole collection (instance list reload).
    pub fn replace_all(&mut self, instances: Vec<Instance>) {
        self.instances = instances;
    }

    pub fn push(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    pub fn remove(&mut self, index: usize) -> Option<Instance> {
        if index < self.instances.len() {
            Some(self.instances.remove(index))
        } else {
            None
        }
    }

    /// Index of the instance whose content directory is `content_dir`.
    pub fn position(&self, content_dir: &Path) -> Option<usize> {
        self.instances
            .iter()
            .position(|instance| instance.content_dir == content_dir)
    }

    /// Write back an updated instance record by identity, keeping the
    /// current selection flag. Returns whether a matching entry existed.
    pub fn apply(&mut self, updated: Instance) -> bool {
        match self.position(&updated.content_dir) {
            Some(index) => {
                let selected = self.instances[index].selected;
                self.instances[index] = Instance { selected, ..updated };
                true
            }
            None => false,
        }
    }

    /// Recompute display order: installed local instances first,
    /// fully-current before update-pending, then case-insensitive title.
    /// Stable; ties keep their prior relative order.
    pub fn sort(&mut self) {
        self.instances.sort_by_key(sort_rank);
    }

    /// Mark the instance at `index` as the single selection.
    pub fn select(&mut self, index: usize) {
        for (position, instance) in self.instances.iter_mut().enumerate() {
            instance.selected = position == index;
        }
    }

    /// Index of the selected instance, if any.
    pub fn selected(&self) -> Option<usize> {
        self.instances.iter().position(|instance| instance.selected)
    }

    pub fn set_update_pending(&mut self, index: usize, pending: bool) {
        if let Some(instance) = self.instances.get_mut(index) {
            instance.update_pending = pending;
        }
    }
}

fn sort_rank(instance: &Instance) -> (bool, bool, String) {
    (
        !(instance.local && instance.installed),
        instance.update_pending,
        instance.title.to_lowercase(),
    )
}
