use crate::errors::DivisionError;

use serde::{Deserialize, Serialize};

/// Contains all events which can arise during the cycle of a capsule and need to be
/// communicated to the lifecycle manager (see also [Cycle]).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CycleEvent {
    /// Calls the [Cycle::divide] method which will spawn an additional capsule and shorten the
    /// existing one.
    Division,
}

/// Growth and division of a single agent.
///
/// The `update_cycle` function is designed to be called once per external tick and return
/// something only if a specific cycle event is supposed to be occurring.
pub trait Cycle<Id, Float = f64>: Sized {
    /// Advances the growth state by the time increment `dt`.
    fn grow(&mut self, dt: Float);

    /// Grows the agent and reports if it is now ready to divide.
    #[must_use]
    fn update_cycle(&mut self, dt: Float) -> Option<CycleEvent> {
        self.grow(dt);
        if self.ready_to_divide() {
            Some(CycleEvent::Division)
        } else {
            None
        }
    }

    /// Checks if the division threshold has been exceeded.
    fn ready_to_divide(&self) -> bool;

    /// Performs division by modifying the existing agent and spawning an additional one which
    /// carries the supplied identifier.
    /// Corresponds to [CycleEvent::Division].
    fn divide(
        &mut self,
        rng: &mut rand_chacha::ChaCha8Rng,
        new_id: Id,
    ) -> Result<Self, DivisionError>;
}
