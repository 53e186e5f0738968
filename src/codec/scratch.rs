//! Call-scoped staging area for encoded bytes.

/// Largest copy kept in the inline array instead of the heap buffer.
pub const INLINE_CAPACITY: usize = 16;

/// Owns the bytes an encoder had to materialize for a single engine call.
///
/// A scratch either hands back caller memory untouched ([`Scratch::view`]) or
/// stores a copy and hands back a view of that copy. Every view borrows the
/// scratch, so it cannot outlive the scratch or survive the next write to it.
/// Nothing here is global or thread-local: each table operation creates its
/// own scratch per encoded operand.
#[derive(Debug, Default)]
pub struct Scratch {
    heap: Vec<u8>,
    inline: [u8; INLINE_CAPACITY],
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-copy view of caller memory.
    pub fn view<'a>(&'a mut self, bytes: &'a [u8]) -> &'a [u8] {
        bytes
    }

    /// Copies `bytes` into the heap buffer.
    pub fn view_copy(&mut self, bytes: &[u8]) -> &[u8] {
        self.heap.clear();
        self.heap.extend_from_slice(bytes);
        &self.heap
    }

    /// Copies `bytes` into the inline array when they fit, the heap otherwise.
    pub fn view_small_copy(&mut self, bytes: &[u8]) -> &[u8] {
        if bytes.len() <= INLINE_CAPACITY {
            self.inline[..bytes.len()].copy_from_slice(bytes);
            &self.inline[..bytes.len()]
        } else {
            self.view_copy(bytes)
        }
    }

    /// Lets `fill` append an encoding to the cleared heap buffer and returns it.
    pub fn build(&mut self, fill: impl FnOnce(&mut Vec<u8>)) -> &[u8] {
        self.heap.clear();
        fill(&mut self.heap);
        &self.heap
    }

    /// Fallible form of [`Scratch::build`].
    pub fn try_build<E>(
        &mut self,
        fill: impl FnOnce(&mut Vec<u8>) -> Result<(), E>,
    ) -> Result<&[u8], E> {
        self.heap.clear();
        fill(&mut self.heap)?;
        Ok(&self.heap)
    }
}
