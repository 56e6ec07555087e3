//! Identity map: generated file name <-> remote record id
//!
//! Each remote record is materialized as one note named after its title.
//! Titles collide, so names get a numeric suffix (`Title.md`, `Title-2.md`,
//! ...). The mapping lives in `SyncState::content_map` and is what keeps a
//! record attached to the same file across syncs.
//!
//! Resolution never mutates the map. The engine commits the association after
//! handling the record, so repeating a resolution after a crash yields the
//! same answer.

use crate::sync::SyncState;
use crate::vault::{self, Vault, VaultResult};

/// Extension of generated notes
pub const NOTE_EXTENSION: &str = "md";

/// Characters that are unsafe in file names on common filesystems
const UNSAFE_CHARS: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Stem used for records without a usable title
const UNTITLED: &str = "Untitled";

/// Replace filesystem-unsafe characters with `-`
pub fn sanitize(title: &str) -> String {
    if title.trim().is_empty() {
        return UNTITLED.to_string();
    }
    title
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '-' } else { c })
        .collect()
}

/// The `n`-th candidate name for a stem (`stem.md`, `stem-2.md`, ...)
pub fn candidate_name(stem: &str, n: u32) -> String {
    if n <= 1 {
        format!("{}.{}", stem, NOTE_EXTENSION)
    } else {
        format!("{}-{}.{}", stem, n, NOTE_EXTENSION)
    }
}

/// Position of `name` in the candidate sequence of `stem`, if it is one
fn candidate_index(stem: &str, name: &str) -> Option<u32> {
    let base = name.strip_suffix(NOTE_EXTENSION)?.strip_suffix('.')?;
    if base == stem {
        return Some(1);
    }
    let suffix = base.strip_prefix(stem)?.strip_prefix('-')?;
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().filter(|n| *n >= 2)
}

/// Resolves note names against the vault and the persisted map
pub struct IdentityMap<'a, V: Vault + ?Sized> {
    vault: &'a V,
    state: &'a SyncState,
}

impl<'a, V: Vault + ?Sized> IdentityMap<'a, V> {
    pub fn new(vault: &'a V, state: &'a SyncState) -> Self {
        Self { vault, state }
    }

    /// Resolve the file name for a record
    ///
    /// A name this record already holds wins. Otherwise the first candidate
    /// that is neither an existing file nor held by another record is used.
    pub async fn resolve_name(&self, title: &str, record_id: &str) -> VaultResult<String> {
        let stem = sanitize(title);

        let previous = self
            .state
            .names_for(record_id)
            .into_iter()
            .filter_map(|name| candidate_index(&stem, name).map(|n| (n, name)))
            .min_by_key(|(n, _)| *n);
        if let Some((_, name)) = previous {
            return Ok(name.to_string());
        }

        let mut n = 1;
        loop {
            let name = candidate_name(&stem, n);
            if !self.is_taken(&name, record_id).await? {
                return Ok(name);
            }
            n += 1;
        }
    }

    /// Vault path of a note inside the data directory
    pub fn path_for(&self, name: &str) -> String {
        vault::join(&self.state.data_dir, name)
    }

    async fn is_taken(&self, name: &str, record_id: &str) -> VaultResult<bool> {
        match self.state.content_map.get(name) {
            Some(owner) if owner == record_id => Ok(false),
            Some(_) => Ok(true),
            None => self.vault.exists(&self.path_for(name)).await,
        }
    }
}

/// Record that `file_name` belongs to `record_id`
pub fn commit(state: &mut SyncState, file_name: &str, record_id: &str) {
    state
        .content_map
        .insert(file_name.to_string(), record_id.to_string());
}
