//! Acting-user lookup.

use crate::entity::UserId;
use parking_lot::RwLock;

/// Supplies the identity of the user on whose behalf a transaction runs.
///
/// `None` is a normal answer (background jobs, system tasks) and produces
/// revisions without an author.
pub trait ActorProvider: Send + Sync {
    /// Returns the current acting user, if any.
    fn current_user(&self) -> Option<UserId>;
}

/// Provider that never knows the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActor;

impl ActorProvider for NoActor {
    fn current_user(&self) -> Option<UserId> {
        None
    }
}

/// Provider that always returns the same user.
#[derive(Debug, Clone)]
pub struct FixedActor(pub UserId);

impl ActorProvider for FixedActor {
    fn current_user(&self) -> Option<UserId> {
        Some(self.0.clone())
    }
}

/// Provider whose user can be switched at runtime, e.g. by request middleware.
#[derive(Debug, Default)]
pub struct SharedActor {
    user: RwLock<Option<UserId>>,
}

impl SharedActor {
    /// Creates a provider with no user.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the acting user.
    pub fn set(&self, user: UserId) {
        *self.user.write() = Some(user);
    }

    /// Clears the acting user.
    pub fn clear(&self) {
        *self.user.write() = None;
    }
}

impl ActorProvider for SharedActor {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_actor_switches() {
        let actor = SharedActor::new();
        assert_eq!(actor.current_user(), None);
        actor.set(UserId::from("archivist"));
        assert_eq!(actor.current_user(), Some(UserId::from("archivist")));
        actor.clear();
        assert_eq!(actor.current_user(), None);
    }
}
