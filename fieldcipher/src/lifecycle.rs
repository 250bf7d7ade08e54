//! Seams with the persistence engine's lifecycle dispatch.

use crate::error::Error;

/// Change tracking of one pending update, owned by the persistence engine.
pub trait ChangeSet<E: ?Sized> {
    /// Returns `true` if `field` changed since the entity was loaded or last flushed.
    fn has_changed_field(&self, field: &str) -> bool;

    /// Re-diffs `entity` so that values written after the original change
    /// detection are part of the outgoing write.
    fn recompute(&mut self, entity: &E);
}

/// Listener the persistence engine invokes around entity state transitions.
///
/// Errors are fatal for the operation in progress: the engine is expected to
/// abort the write (or the load) and surface the error unchanged.
pub trait EntityListener<E> {
    /// Called after an entity has been hydrated from storage.
    ///
    /// # Errors
    ///
    /// Any failure to turn stored state into in-memory state.
    fn on_load(&self, entity: &mut E) -> Result<(), Error>;

    /// Called before an entity is first written.
    ///
    /// # Errors
    ///
    /// Any failure to turn in-memory state into stored state.
    fn on_before_create(&self, entity: &mut E) -> Result<(), Error>;

    /// Called before a changed entity is written. Only valid place to call
    /// [`ChangeSet::recompute`].
    ///
    /// # Errors
    ///
    /// Same as [`on_before_create`](Self::on_before_create).
    fn on_before_update(&self, entity: &mut E, changes: &mut dyn ChangeSet<E>)
        -> Result<(), Error>;
}
