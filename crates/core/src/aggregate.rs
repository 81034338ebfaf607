//! Decide/commit split for entities whose state moves through guarded transitions.

use crate::entity::Entity;

/// Transition semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` validates a command against the
///   current state and returns the change it would cause.
/// - **State mutation**: `execute(&mut self, cmd)` handles the command and
///   commits the resulting change.
///
/// Implementations keep their mutation step private, so state only changes
/// through a change that `handle` accepted.
pub trait Aggregate: Entity {
    type Command: Clone + core::fmt::Debug;
    type Change: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Number of changes committed since construction.
    fn version(&self) -> u64;

    /// Decide which change a command produces, without mutating state.
    fn handle(&self, command: &Self::Command) -> Result<Self::Change, Self::Error>;

    /// Handle a command and, if accepted, commit the resulting change.
    ///
    /// On error the state is left exactly as it was; on success `version()`
    /// has grown by one.
    fn execute(&mut self, command: &Self::Command) -> Result<Self::Change, Self::Error>;
}
