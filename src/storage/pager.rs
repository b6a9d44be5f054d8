//! PageManager: owns the on-disk file, hands out pages, persists them.
//! Read-through on every access; no in-process cache is kept, so every
//! `read`/`write` performs exactly one disk operation and bumps the
//! matching counter.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::storage::page::Page;

pub struct PageManager {
    file: File,
    page_size: usize,
    page_reads: u64,
    page_writes: u64,
}

impl PageManager {
    /// Open (creating if absent) the page file at `path`. On reopen, the
    /// stored page size is inferred from the file length only if the file
    /// is non-empty and `page_size` divides it evenly; callers that know
    /// the original page size (the B+Tree engine, via its metadata page)
    /// are responsible for surfacing a `FormatError` on mismatch (see
    /// `BTree::open`).
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(PageManager {
            file,
            page_size,
            page_reads: 0,
            page_writes: 0,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn page_count(&self) -> Result<u64> {
        Ok(self.file_size()? / self.page_size as u64)
    }

    /// Allocate a fresh page id (the current page count) and extend the
    /// file by one zero-filled page.
    pub fn allocate(&mut self) -> Result<u64> {
        let page_id = self.page_count()?;
        log::trace!("allocating page {page_id}");
        let zeros = vec![0u8; self.page_size];
        let offset = page_id * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&zeros)?;
        self.file.flush()?;
        Ok(page_id)
    }

    /// Read `page_id` from disk. Fails with `PageOutOfRange` if the page
    /// has never been allocated.
    pub fn read(&mut self, page_id: u64) -> Result<Page> {
        let offset = page_id * self.page_size as u64;
        let file_size = self.file_size()?;
        if offset >= file_size {
            return Err(Error::PageOutOfRange {
                requested: page_id,
                file_pages: file_size / self.page_size as u64,
            });
        }
        let mut buf = vec![0u8; self.page_size];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        self.page_reads += 1;
        log::trace!("read page {page_id} ({} reads so far)", self.page_reads);
        Ok(Page::from_bytes(buf))
    }

    /// Persist `page` at its own `page_id * page_size` offset. Durable
    /// with respect to subsequent `read` calls in this process; no fsync
    /// is performed.
    pub fn write(&mut self, page: &Page) -> Result<()> {
        let offset = page.page_id() * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.bytes())?;
        self.page_writes += 1;
        log::trace!("wrote page {} ({} writes so far)", page.page_id(), self.page_writes);
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        drop(self);
        Ok(())
    }

    pub fn page_reads(&self) -> u64 {
        self.page_reads
    }

    pub fn page_writes(&self) -> u64 {
        self.page_writes
    }

    pub fn reset_counters(&mut self) {
        self.page_reads = 0;
        self.page_writes = 0;
    }
}
