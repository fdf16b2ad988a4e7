//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Query inputs such as [`FilterCriteria`](crate::FilterCriteria) and
/// [`Pagination`](crate::Pagination) are compared by value: the directory
/// controller only re-issues a query when the new value differs from the old.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {
    /// Overwrite `self` with `next`, reporting whether the value changed.
    fn replace_with(&mut self, next: Self) -> bool
    where
        Self: Sized,
    {
        let changed = *self != next;
        *self = next;
        changed
    }
}
