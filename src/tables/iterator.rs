//! Iterator over decoded table entries.

/// Finite, ordered sequence of decoded entries.
///
/// Entries are decoded while the transaction that read them is still open,
/// so the iterator holds no engine resources and cannot fail.
pub struct TableIter<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> TableIter<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> Iterator for TableIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<T> ExactSizeIterator for TableIter<T> {
    fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T> DoubleEndedIterator for TableIter<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.items.next_back()
    }
}
