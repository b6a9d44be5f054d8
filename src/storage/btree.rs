//! B+Tree Engine: ordered `bytes -> map<string, typed>` store built over
//! the PageManager and the value serializer. Recursive descent insert with
//! split propagated upward, leaf linking via `next_page_id`, range scans
//! that walk the leaf chain.

use std::path::Path;

use crate::error::{Error, Result};
use crate::storage::page::{Page, FLAG_BRANCH, FLAG_LEAF, FLAG_METADATA, HEADER_SIZE, SLOT_HEADER_SIZE};
use crate::storage::pager::PageManager;
use crate::value::{self, ValueMap};

/// 13-byte sentinel key for the metadata page's sole entry.
const ROOT_SENTINEL_KEY: &[u8] = b"BTREE_ROOT_ID";

/// A single minimal element (`SLOT_HEADER_SIZE` + tiny key/value) must fit
/// twice over, plus the header, or a split can never make progress.
fn validate_page_size(page_size: usize) -> Result<()> {
    let minimum = HEADER_SIZE + 2 * (SLOT_HEADER_SIZE + 1);
    if page_size < minimum {
        return Err(Error::PageTooSmall {
            page_size,
            reason: format!("need at least {minimum} bytes for header + two minimal slots"),
        });
    }
    Ok(())
}

fn validate_flags(flags: u8) -> Result<()> {
    match flags {
        FLAG_LEAF | FLAG_BRANCH | FLAG_METADATA => Ok(()),
        other => Err(Error::FormatError(format!("unknown page flag combination: {other:#x}"))),
    }
}

pub struct BTree {
    pager: PageManager,
    page_size: usize,
    root_page_id: u64,
}

impl BTree {
    /// Open (creating if absent) a B+Tree file. An empty file gets page 0
    /// (metadata) and page 1 (empty leaf root). A non-empty file is
    /// expected to have a metadata page at 0; a page-size mismatch with an
    /// existing file surfaces as `FormatError`.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        validate_page_size(page_size)?;
        let mut pager = PageManager::open(path, page_size)?;
        let file_size = pager.file_size()?;

        if file_size == 0 {
            let meta_id = pager.allocate()?;
            let root_id = pager.allocate()?;
            debug_assert_eq!(meta_id, 0);
            debug_assert_eq!(root_id, 1);

            let mut root = Page::new(page_size, root_id);
            root.set_flags(FLAG_LEAF);
            root.set_next_page_id(0);
            pager.write(&root)?;

            let mut meta = Page::new(page_size, meta_id);
            meta.set_flags(FLAG_METADATA);
            meta.insert(ROOT_SENTINEL_KEY, &root_id.to_be_bytes(), false);
            // The metadata page's `next_page_id` carries the page size this
            // file was created with.
            meta.set_next_page_id(page_size as u64);
            pager.write(&meta)?;

            Ok(BTree { pager, page_size, root_page_id: root_id })
        } else {
            if file_size % page_size as u64 != 0 {
                return Err(Error::FormatError(format!(
                    "file size {file_size} is not a multiple of page size {page_size}"
                )));
            }
            let meta = pager.read(0)?;
            let root_page_id = if meta.flags() & FLAG_METADATA != 0 {
                // Check the recorded page size before trusting any payload
                // offset on this page.
                let recorded_page_size = meta.next_page_id();
                if recorded_page_size != page_size as u64 {
                    return Err(Error::FormatError(format!(
                        "page size mismatch: file was created with {recorded_page_size}, opened with {page_size}"
                    )));
                }
                if meta.count() != 1 {
                    return Err(Error::FormatError("metadata page must hold exactly one entry".into()));
                }
                let elem = meta.element(0)?;
                if elem.key != ROOT_SENTINEL_KEY {
                    return Err(Error::FormatError("metadata page missing BTREE_ROOT_ID sentinel".into()));
                }
                if elem.value.len() != 8 {
                    return Err(Error::FormatError("root id value must be 8 bytes".into()));
                }
                u64::from_be_bytes(elem.value.try_into().unwrap())
            } else {
                // Legacy layout: no metadata page, page 0 is itself the root.
                0
            };
            Ok(BTree { pager, page_size, root_page_id })
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Advisory branching factor; `Page::insert` returning `false` is the
    /// sole authority on fullness.
    pub fn degree(&self) -> usize {
        (self.page_size - HEADER_SIZE) / (2 * SLOT_HEADER_SIZE)
    }

    pub fn page_reads(&self) -> u64 {
        self.pager.page_reads()
    }

    pub fn page_writes(&self) -> u64 {
        self.pager.page_writes()
    }

    pub fn reset_counters(&mut self) {
        self.pager.reset_counters()
    }

    pub fn close(self) -> Result<()> {
        self.pager.close()
    }

    fn read_page(&mut self, id: u64) -> Result<Page> {
        let page = self.pager.read(id)?;
        validate_flags(page.flags())?;
        Ok(page)
    }

    /// For a branch page, find the index of the child that should contain
    /// `key`: exact separator match descends into that child; otherwise the
    /// child just left of the insertion point (element 0's empty key is the
    /// −∞ sentinel, so the insertion point is never 0).
    fn child_index(page: &Page, key: &[u8]) -> usize {
        match page.find_slot(key) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    fn child_id(page: &Page, idx: usize) -> Result<u64> {
        let elem = page.element(idx)?;
        Ok(u64::from_be_bytes(elem.value.as_slice().try_into().map_err(|_| {
            Error::FormatError("branch child pointer must be 8 bytes".into())
        })?))
    }

    fn descend_to_leaf(&mut self, key: &[u8]) -> Result<u64> {
        let mut page_id = self.root_page_id;
        loop {
            let page = self.read_page(page_id)?;
            if page.flags() & FLAG_LEAF != 0 {
                return Ok(page_id);
            }
            let idx = Self::child_index(&page, key);
            page_id = Self::child_id(&page, idx)?;
        }
    }

    /// Write (insert-or-replace) `key -> values`.
    pub fn write(&mut self, key: &[u8], values: &ValueMap) -> Result<()> {
        let serialized = value::encode(values);
        let max_value_len = self.page_size.saturating_sub(HEADER_SIZE + SLOT_HEADER_SIZE + key.len());
        if serialized.len() > max_value_len {
            return Err(Error::ValueTooLarge { size: serialized.len() });
        }

        if let Some((sep, right_id)) = self.insert_into(self.root_page_id, key, &serialized)? {
            self.promote_root(sep, right_id)?;
        }
        Ok(())
    }

    /// Batch insert; the core contract allows collapsing this to many
    /// individual writes.
    pub fn write_batch(&mut self, items: &[(Vec<u8>, ValueMap)]) -> Result<()> {
        for (key, values) in items {
            self.write(key, values)?;
        }
        Ok(())
    }

    fn promote_root(&mut self, separator: Vec<u8>, right_id: u64) -> Result<()> {
        let old_root = self.root_page_id;
        let new_root_id = self.pager.allocate()?;
        let mut new_root = Page::new(self.page_size, new_root_id);
        new_root.set_flags(FLAG_BRANCH);
        if !new_root.insert(&[], &old_root.to_be_bytes(), false) {
            return Err(Error::PageTooSmall {
                page_size: self.page_size,
                reason: "cannot hold even the empty-key leftmost entry in a fresh root".into(),
            });
        }
        if !new_root.insert(&separator, &right_id.to_be_bytes(), false) {
            return Err(Error::PageTooSmall {
                page_size: self.page_size,
                reason: "cannot hold the promoted separator in a fresh root".into(),
            });
        }
        self.pager.write(&new_root)?;

        self.root_page_id = new_root_id;
        let mut meta = self.pager.read(0)?;
        meta.insert(ROOT_SENTINEL_KEY, &new_root_id.to_be_bytes(), false);
        self.pager.write(&meta)?;
        log::debug!("promoted new root page {new_root_id} (old root was {old_root})");
        Ok(())
    }

    /// Recursive descent insert. Returns `Some((separator, right_child_id))`
    /// if `page_id` split and the caller (parent branch, or `write` for the
    /// root) must absorb the new separator.
    fn insert_into(&mut self, page_id: u64, key: &[u8], value: &[u8]) -> Result<Option<(Vec<u8>, u64)>> {
        let mut page = self.read_page(page_id)?;

        if page.flags() & FLAG_LEAF != 0 {
            if page.insert(key, value, false) {
                self.pager.write(&page)?;
                return Ok(None);
            }
            return self.split_leaf(page, key, value);
        }

        let idx = Self::child_index(&page, key);
        let child_id = Self::child_id(&page, idx)?;
        let split = self.insert_into(child_id, key, value)?;

        match split {
            None => Ok(None),
            Some((sep, right_id)) => {
                if page.insert(&sep, &right_id.to_be_bytes(), false) {
                    self.pager.write(&page)?;
                    Ok(None)
                } else {
                    self.split_branch(page, sep, right_id)
                }
            }
        }
    }

    fn split_leaf(&mut self, mut page: Page, key: &[u8], value: &[u8]) -> Result<Option<(Vec<u8>, u64)>> {
        let mut merged: Vec<(Vec<u8>, Vec<u8>)> =
            page.elements().into_iter().map(|e| (e.key, e.value)).collect();
        match merged.binary_search_by(|(k, _)| k.as_slice().cmp(key)) {
            Ok(i) => merged[i] = (key.to_vec(), value.to_vec()),
            Err(i) => merged.insert(i, (key.to_vec(), value.to_vec())),
        }

        let mid = merged.len() / 2;
        let (left_items, right_items) = merged.split_at(mid);
        if left_items.is_empty() || right_items.is_empty() {
            return Err(Error::PageTooSmall {
                page_size: self.page_size,
                reason: "leaf split produced an empty side".into(),
            });
        }

        let right_id = self.pager.allocate()?;
        let mut right_page = Page::new(self.page_size, right_id);
        right_page.set_flags(FLAG_LEAF);
        right_page.set_next_page_id(page.next_page_id());
        for (k, v) in right_items {
            if !right_page.insert(k, v, false) {
                return Err(Error::PageTooSmall {
                    page_size: self.page_size,
                    reason: "right leaf half does not fit after split".into(),
                });
            }
        }

        page.clear();
        for (k, v) in left_items {
            if !page.insert(k, v, false) {
                return Err(Error::PageTooSmall {
                    page_size: self.page_size,
                    reason: "left leaf half does not fit after split".into(),
                });
            }
        }
        page.set_next_page_id(right_id);

        self.pager.write(&right_page)?;
        self.pager.write(&page)?;

        let separator = right_items[0].0.clone();
        log::debug!(
            "split leaf page {} -> new right page {right_id} ({} left / {} right elements)",
            page.page_id(),
            left_items.len(),
            right_items.len()
        );
        Ok(Some((separator, right_id)))
    }

    fn split_branch(
        &mut self,
        mut page: Page,
        new_sep: Vec<u8>,
        new_right_id: u64,
    ) -> Result<Option<(Vec<u8>, u64)>> {
        let mut merged: Vec<(Vec<u8>, Vec<u8>)> =
            page.elements().into_iter().map(|e| (e.key, e.value)).collect();
        let new_entry = (new_sep, new_right_id.to_be_bytes().to_vec());
        match merged.binary_search_by(|(k, _)| k.as_slice().cmp(&new_entry.0)) {
            Ok(i) => merged.insert(i + 1, new_entry),
            Err(i) => merged.insert(i, new_entry),
        }

        let mid = merged.len() / 2;
        if mid == 0 || mid + 1 > merged.len() {
            return Err(Error::PageTooSmall {
                page_size: self.page_size,
                reason: "branch split has no element to promote".into(),
            });
        }
        let promoted = merged[mid].clone();
        let left_items = &merged[0..mid];
        let right_rest = &merged[mid + 1..];
        // right_rest may legitimately be empty: the right page still holds
        // the promoted child as its leftmost (empty-key) entry.

        let right_id = self.pager.allocate()?;
        let mut right_page = Page::new(self.page_size, right_id);
        right_page.set_flags(FLAG_BRANCH);
        if !right_page.insert(&[], &promoted.1, false) {
            return Err(Error::PageTooSmall {
                page_size: self.page_size,
                reason: "right branch half cannot hold its leftmost child".into(),
            });
        }
        for (k, v) in right_rest {
            if !right_page.insert(k, v, false) {
                return Err(Error::PageTooSmall {
                    page_size: self.page_size,
                    reason: "right branch half does not fit after split".into(),
                });
            }
        }

        page.clear();
        for (k, v) in left_items {
            if !page.insert(k, v, false) {
                return Err(Error::PageTooSmall {
                    page_size: self.page_size,
                    reason: "left branch half does not fit after split".into(),
                });
            }
        }

        self.pager.write(&right_page)?;
        self.pager.write(&page)?;

        log::debug!(
            "split branch page {} -> new right page {right_id}, promoted separator {} bytes",
            page.page_id(),
            promoted.0.len()
        );
        Ok(Some((promoted.0, right_id)))
    }

    /// Point read. `O(height)` page reads.
    pub fn read(&mut self, key: &[u8]) -> Result<Option<ValueMap>> {
        let leaf_id = self.descend_to_leaf(key)?;
        let page = self.read_page(leaf_id)?;
        match page.find_slot(key) {
            Ok(idx) => Ok(Some(value::decode(&page.element(idx)?.value)?)),
            Err(_) => Ok(None),
        }
    }

    /// Range scan: `[start_key, end_key)`, following leaf links. `columns`,
    /// if present, projects the decoded map down to the named fields;
    /// absent columns are silently omitted.
    pub fn scan(
        &mut self,
        start_key: Option<&[u8]>,
        end_key: Option<&[u8]>,
        columns: Option<&[String]>,
    ) -> Result<Vec<(Vec<u8>, ValueMap)>> {
        let start = start_key.unwrap_or(&[]);
        let mut leaf_id = self.descend_to_leaf(start)?;
        let mut results = Vec::new();

        loop {
            let page = self.read_page(leaf_id)?;
            for elem in page.elements() {
                if elem.key.as_slice() < start {
                    continue;
                }
                if let Some(end) = end_key {
                    if elem.key.as_slice() >= end {
                        return Ok(results);
                    }
                }
                let mut decoded = value::decode(&elem.value)?;
                if let Some(cols) = columns {
                    decoded.retain(|k, _| cols.iter().any(|c| c == k));
                }
                results.push((elem.key, decoded));
            }
            let next = page.next_page_id();
            if next == 0 {
                break;
            }
            leaf_id = next;
        }
        Ok(results)
    }

    /// Delete is not part of the core contract.
    pub fn delete(&mut self, _key: &[u8]) -> Result<()> {
        Err(Error::Unsupported("delete"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn map(pairs: Vec<(&str, crate::value::Value)>) -> ValueMap {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn fresh_tree_has_leaf_root_at_page_1() {
        let dir = tempdir().unwrap();
        let tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
        assert_eq!(tree.root_page_id, 1);
    }

    #[test]
    fn reopen_with_a_different_page_size_is_a_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut tree = BTree::open(&path, 4096).unwrap();
            tree.write(b"a", &map(vec![("x", crate::value::Value::Int32(1))])).unwrap();
        }
        let err = BTree::open(&path, 8192).unwrap_err();
        assert!(matches!(err, Error::FormatError(_)));
    }

    #[test]
    fn point_read_after_insert() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
        tree.write(b"a", &map(vec![("x", crate::value::Value::Int32(1))])).unwrap();
        let got = tree.read(b"a").unwrap().unwrap();
        assert_eq!(got.get("x"), Some(&crate::value::Value::Int32(1)));
        assert!(tree.read(b"missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_replaces() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
        tree.write(b"a", &map(vec![("x", crate::value::Value::Int32(1))])).unwrap();
        tree.write(b"a", &map(vec![("x", crate::value::Value::Int32(2))])).unwrap();
        let got = tree.read(b"a").unwrap().unwrap();
        assert_eq!(got.get("x"), Some(&crate::value::Value::Int32(2)));
    }

    #[test]
    fn empty_scan_on_disjoint_range() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
        for k in ["a", "b", "c"] {
            tree.write(k.as_bytes(), &map(vec![("v", crate::value::Value::Int32(1))])).unwrap();
        }
        let results = tree.scan(Some(b"x"), None, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn split_triggers_and_all_keys_remain_readable() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
        for i in 0..35 {
            let key = format!("CUST{i:04}");
            let v = map(vec![
                ("id", crate::value::Value::Int32(i)),
                ("name", crate::value::Value::Text("a".repeat(10))),
                ("email", crate::value::Value::Text("b".repeat(15))),
                ("age", crate::value::Value::Int32(30)),
                ("city", crate::value::Value::Text("c".repeat(8))),
            ]);
            tree.write(key.as_bytes(), &v).unwrap();
        }
        for i in 0..35 {
            let key = format!("CUST{i:04}");
            assert!(tree.read(key.as_bytes()).unwrap().is_some(), "missing {key}");
        }
    }

    #[test]
    fn reverse_order_insert_scans_ascending() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
        for i in (1..=50).rev() {
            let key = format!("CUST{i:04}");
            tree.write(key.as_bytes(), &map(vec![("id", crate::value::Value::Int32(i))])).unwrap();
        }
        let results = tree.scan(Some(b"CUST0001"), Some(b"CUST0051"), None).unwrap();
        assert_eq!(results.len(), 50);
        let keys: Vec<_> = results.iter().map(|(k, _)| k.clone()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn reopen_preserves_state_and_growth() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut tree = BTree::open(&path, 4096).unwrap();
            for i in 1..=100 {
                let key = format!("CUST{i:04}");
                tree.write(key.as_bytes(), &map(vec![("id", crate::value::Value::Int32(i))])).unwrap();
            }
        }
        {
            let mut tree = BTree::open(&path, 4096).unwrap();
            for i in 101..=200 {
                let key = format!("CUST{i:04}");
                tree.write(key.as_bytes(), &map(vec![("id", crate::value::Value::Int32(i))])).unwrap();
            }
            for i in 1..=200 {
                let key = format!("CUST{i:04}");
                assert!(tree.read(key.as_bytes()).unwrap().is_some(), "missing {key}");
            }
        }
    }

    #[test]
    fn delete_is_unsupported() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
        let err = tree.delete(b"a").unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn value_too_large_is_rejected_cleanly() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
        let huge = map(vec![("blob", crate::value::Value::Text("x".repeat(10_000)))]);
        let err = tree.write(b"k", &huge).unwrap_err();
        assert!(matches!(err, Error::ValueTooLarge { .. }));
        assert!(tree.read(b"k").unwrap().is_none());
    }

    #[test]
    fn leaf_linkage_visits_every_key_once_in_order() {
        let dir = tempdir().unwrap();
        let mut tree = BTree::open(dir.path().join("t.db"), 4096).unwrap();
        for i in 0..60 {
            let key = format!("K{i:04}");
            tree.write(key.as_bytes(), &map(vec![("v", crate::value::Value::Int32(i))])).unwrap();
        }
        let all = tree.scan(None, None, None).unwrap();
        assert_eq!(all.len(), 60);
        let mut seen = std::collections::HashSet::new();
        for (k, _) in &all {
            assert!(seen.insert(k.clone()), "duplicate key in scan: {k:?}");
        }
    }
}
