//! Iterator helpers

/// Group an iterator into consecutive `Vec`s of at most `size` items.
///
/// Order is preserved and only the last group may be short. A `size` of
/// zero is treated as one.
pub fn chunked<I>(iter: I, size: usize) -> Chunked<I::IntoIter>
where
    I: IntoIterator,
{
    Chunked {
        inner: iter.into_iter(),
        size: size.max(1),
    }
}

/// Iterator returned by [`chunked`]
pub struct Chunked<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Chunked<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let group: Vec<_> = self.inner.by_ref().take(self.size).collect();
        if group.is_empty() {
            None
        } else {
            Some(group)
        }
    }
}
