//! Shared byte buffers with an adjustable view window.
//!
//! A [`MemBuf`] is a handle; cloning it shares the underlying region and
//! its view parameters (offset and logical size) with every other handle.
//! The storage itself is a sum of two cases:
//!
//! - `Owned`: the handle group owns a heap allocation, freed when the
//!   last handle drops.
//! - `Borrowed`: the bytes belong to an external party that guarantees
//!   they outlive every handle; nothing is freed on drop.
//!
//! [`MemBuf::grab`] promotes a borrowed region to an owned copy of the
//! current view (copy-on-write), and [`MemBuf::lock`] goes the other way:
//! it hands the storage over to an external owner so the handle group will
//! never free it.
//!
//! View changes (`set_offset`, `set_size`, `resize`) are visible through
//! every handle sharing the region. Out-of-range view parameters are
//! programming errors and abort via `assert!`.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

enum Storage {
    Owned(Vec<u8>),
    Borrowed(&'static [u8]),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v.as_slice(),
            Storage::Borrowed(s) => s,
        }
    }

    fn backing_len(&self) -> usize {
        self.as_slice().len()
    }
}

struct Inner {
    storage: RefCell<Storage>,
    /// Logical size of the region; never exceeds the backing allocation.
    size: Cell<usize>,
    /// View start; invariant `offset <= size`.
    offset: Cell<usize>,
}

/// Reference-counted byte region with an offset/size view.
pub struct MemBuf {
    inner: Rc<Inner>,
}

impl Clone for MemBuf {
    /// Shares the region: both handles see the same bytes and the same
    /// view parameters. Use [`MemBuf::duplicate`] for a deep copy.
    fn clone(&self) -> Self {
        MemBuf {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl MemBuf {
    fn from_storage(storage: Storage) -> Self {
        let size = storage.backing_len();
        MemBuf {
            inner: Rc::new(Inner {
                storage: RefCell::new(storage),
                size: Cell::new(size),
                offset: Cell::new(0),
            }),
        }
    }

    /// Allocate `size` zeroed bytes, owned by the handle group.
    pub fn alloc(size: usize) -> Self {
        Self::from_storage(Storage::Owned(vec![0; size]))
    }

    /// Take ownership of an existing allocation.
    pub fn take(bytes: Vec<u8>) -> Self {
        Self::from_storage(Storage::Owned(bytes))
    }

    /// Copy `bytes` into a fresh owned buffer.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::from_storage(Storage::Owned(bytes.to_vec()))
    }

    /// Wrap bytes owned by an external party. The handle group will never
    /// free them; `grab` makes a private copy when mutation or outliving
    /// the owner is required.
    pub fn borrowed(bytes: &'static [u8]) -> Self {
        Self::from_storage(Storage::Borrowed(bytes))
    }

    /// The visible bytes: the region from the view offset to the logical
    /// size.
    pub fn bytes(&self) -> Ref<'_, [u8]> {
        let offset = self.inner.offset.get();
        let size = self.inner.size.get();
        Ref::map(self.inner.storage.borrow(), |s| &s.as_slice()[offset..size])
    }

    /// Mutable access to the visible bytes. The region must be owned;
    /// call [`MemBuf::grab`] first for borrowed storage.
    pub fn bytes_mut(&self) -> RefMut<'_, [u8]> {
        let offset = self.inner.offset.get();
        let size = self.inner.size.get();
        RefMut::map(self.inner.storage.borrow_mut(), |s| match s {
            Storage::Owned(v) => &mut v.as_mut_slice()[offset..size],
            Storage::Borrowed(_) => panic!("MemBuf::bytes_mut on borrowed storage; grab() first"),
        })
    }

    /// Number of visible bytes (`size - offset`).
    pub fn len(&self) -> usize {
        self.inner.size.get() - self.inner.offset.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move the view start. Panics when `offset` exceeds the logical size.
    pub fn set_offset(&self, offset: usize) {
        assert!(
            offset <= self.inner.size.get(),
            "MemBuf offset {offset} out of range (size {})",
            self.inner.size.get()
        );
        self.inner.offset.set(offset);
    }

    /// Change the logical size. The new size must stay within the backing
    /// allocation and at or past the view offset; growing the backing goes
    /// through [`MemBuf::resize`].
    pub fn set_size(&self, size: usize) {
        assert!(
            size <= self.inner.storage.borrow().backing_len(),
            "MemBuf size {size} exceeds backing allocation"
        );
        assert!(size >= self.inner.offset.get(), "MemBuf size below view offset");
        self.inner.size.set(size);
    }

    /// Reallocate to `new_size` backing bytes, preserving existing content
    /// up to the shorter length. Borrowed storage is promoted to owned
    /// first.
    pub fn resize(&self, new_size: usize) {
        self.grab();
        let mut storage = self.inner.storage.borrow_mut();
        match &mut *storage {
            Storage::Owned(v) => v.resize(new_size, 0),
            Storage::Borrowed(_) => unreachable!("grab() promoted to owned"),
        }
        drop(storage);
        self.inner.size.set(new_size);
        if self.inner.offset.get() > new_size {
            self.inner.offset.set(new_size);
        }
    }

    /// Deep copy of the visible bytes into a fresh owned buffer.
    pub fn duplicate(&self) -> MemBuf {
        MemBuf::from_slice(&self.bytes())
    }

    /// Promote borrowed storage to a private owned copy of the current
    /// view; the offset collapses to zero. No-op on owned buffers.
    pub fn grab(&self) {
        let owned = {
            let storage = self.inner.storage.borrow();
            match &*storage {
                Storage::Owned(_) => return,
                Storage::Borrowed(s) => {
                    s[self.inner.offset.get()..self.inner.size.get()].to_vec()
                }
            }
        };
        let len = owned.len();
        *self.inner.storage.borrow_mut() = Storage::Owned(owned);
        self.inner.size.set(len);
        self.inner.offset.set(0);
    }

    /// Relinquish ownership: the storage is handed to an external owner
    /// and will never be freed by the handle group. No-op when already
    /// borrowed.
    pub fn lock(&self) {
        let mut storage = self.inner.storage.borrow_mut();
        if let Storage::Owned(v) = &mut *storage {
            let leaked: &'static [u8] = Box::leak(std::mem::take(v).into_boxed_slice());
            *storage = Storage::Borrowed(leaked);
        }
    }

    /// Whether this is the only handle to the region. Gate for in-place
    /// mutation of shared payloads.
    pub fn is_unique(&self) -> bool {
        Rc::strong_count(&self.inner) == 1
    }

    /// Whether the handle group owns (and will free) the storage.
    pub fn owns_storage(&self) -> bool {
        matches!(&*self.inner.storage.borrow(), Storage::Owned(_))
    }
}

impl std::fmt::Debug for MemBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemBuf")
            .field("len", &self.len())
            .field("offset", &self.inner.offset.get())
            .field("owned", &self.owns_storage())
            .field("unique", &self.is_unique())
            .finish()
    }
}
