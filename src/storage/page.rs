//! Page identity and page-sized buffers.

use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::ptr::NonNull;

/// 4KB page size. Process-wide constant: every file is a dense sequence of
/// pages of exactly this size.
pub const PAGE_SIZE: usize = 4096;

/// Stable identifier of one table file.
///
/// Derived from the file's canonical path with a fixed-key hasher, so the
/// same path always yields the same id within (and across) processes. The
/// derivation happens once at file open; pages remember their owner through
/// the [`PageId`] they are addressed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u64);

impl FileId {
    /// Creates a FileId from a raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Derives the id for a file path.
    ///
    /// Callers must pass the canonical path; two spellings of the same file
    /// hash to different ids otherwise.
    pub fn from_path(path: &Path) -> Self {
        // DefaultHasher uses fixed keys, so the result is deterministic.
        let mut hasher = DefaultHasher::new();
        path.as_os_str().hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Returns the raw id value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Unique identifier for a page: owning file plus zero-based page number.
///
/// Value semantics; usable as a map key wherever pages are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    /// The file this page belongs to.
    pub file: FileId,
    /// Zero-based page number within the file.
    pub page_no: u64,
}

impl PageId {
    /// Creates a new PageId.
    pub const fn new(file: FileId, page_no: u64) -> Self {
        Self { file, page_no }
    }

    /// Byte offset of this page within its file.
    pub const fn byte_offset(self) -> u64 {
        self.page_no * PAGE_SIZE as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.file, self.page_no)
    }
}

/// Page-aligned, zero-initialized `PAGE_SIZE` buffer.
///
/// Buffer-pool frames and raw I/O staging use this type. Aligning whole
/// pages keeps the allocation compatible with direct I/O and avoids
/// straddling cache lines at page boundaries.
///
/// # Safety
///
/// Invariants maintained by this type:
/// - `ptr` is valid, page-aligned, and sized exactly `PAGE_SIZE`
/// - the allocation is released exactly once, in `Drop`
pub struct PageData {
    ptr: NonNull<u8>,
}

impl PageData {
    /// Allocates a zeroed page buffer.
    pub fn new() -> Self {
        let layout = Self::layout();
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(layout);
        };
        Self { ptr }
    }

    fn layout() -> Layout {
        // PAGE_SIZE is a non-zero power of two, so this cannot fail.
        Layout::from_size_align(PAGE_SIZE, PAGE_SIZE).expect("valid page layout")
    }

    /// Returns the page bytes.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for PAGE_SIZE bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), PAGE_SIZE) }
    }

    /// Returns the page bytes mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for PAGE_SIZE bytes and we hold &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), PAGE_SIZE) }
    }
}

impl Default for PageData {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PageData {
    fn drop(&mut self) {
        // SAFETY: ptr and layout match the values used at allocation.
        unsafe {
            dealloc(self.ptr.as_ptr(), Self::layout());
        }
    }
}

// PageData owns its allocation; shared access only hands out &[u8].
unsafe impl Send for PageData {}
unsafe impl Sync for PageData {}

impl AsRef<[u8]> for PageData {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for PageData {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl fmt::Debug for PageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageData").field("ptr", &self.ptr).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_page_id_byte_offset() {
        let file = FileId::new(7);
        assert_eq!(PageId::new(file, 0).byte_offset(), 0);
        assert_eq!(PageId::new(file, 1).byte_offset(), 4096);
        assert_eq!(PageId::new(file, 100).byte_offset(), 409600);
    }

    #[test]
    fn test_page_id_ordering_and_equality() {
        let a = FileId::new(1);
        let b = FileId::new(2);
        assert!(PageId::new(a, 0) < PageId::new(a, 1));
        assert!(PageId::new(a, 100) < PageId::new(b, 0));
        assert_eq!(PageId::new(a, 42), PageId::new(a, 42));
        assert_ne!(PageId::new(a, 42), PageId::new(b, 42));
    }

    #[test]
    fn test_file_id_is_stable_per_path() {
        let path = PathBuf::from("/tmp/strata/users.tbl");
        assert_eq!(FileId::from_path(&path), FileId::from_path(&path));
        assert_ne!(
            FileId::from_path(&path),
            FileId::from_path(&PathBuf::from("/tmp/strata/orders.tbl"))
        );
    }

    #[test]
    fn test_page_data_zeroed_and_aligned() {
        let page = PageData::new();
        assert_eq!(page.as_slice().len(), PAGE_SIZE);
        assert!(page.as_slice().iter().all(|&b| b == 0));
        let addr = page.as_slice().as_ptr() as usize;
        assert_eq!(addr % PAGE_SIZE, 0);
    }

    #[test]
    fn test_page_data_write_and_read() {
        let mut page = PageData::new();
        let slice = page.as_mut_slice();
        slice[0] = 42;
        slice[PAGE_SIZE - 1] = 99;

        assert_eq!(page.as_slice()[0], 42);
        assert_eq!(page.as_slice()[PAGE_SIZE - 1], 99);
        assert_eq!(page.as_slice()[1], 0);
    }

    #[test]
    fn test_display_formats() {
        let pid = PageId::new(FileId::new(0xAB), 3);
        assert_eq!(pid.to_string(), "00000000000000ab.3");
    }
}
