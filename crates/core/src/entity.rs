//! Records addressed by an API-assigned identifier.

/// A record whose identifier is assigned by the API and survives edits.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    fn id(&self) -> &Self::Id;

    /// Item path under a collection path, e.g. `/api/users` becomes `/api/users/7`.
    fn resource_path(&self, collection: &str) -> String {
        format!("{}/{}", collection.trim_end_matches('/'), self.id())
    }
}
