//! Capability checks.

use common::{ActorContext, CompanyId, OwnerScope, Role};
use thiserror::Error;

/// Why a caller was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("role {actual} does not satisfy required role {required}")]
    InsufficientRole { required: Role, actual: Role },

    #[error("actor bound to {actor_scope} cannot act on {target}")]
    OutOfScope {
        actor_scope: OwnerScope,
        target: OwnerScope,
    },
}

/// Checks that `actor` ranks at least `min_role` and may act on `target`.
///
/// An actor may act on its own scope. A company-scoped actor may also act on
/// a franchise whose owning company is `parent`.
pub fn require(
    actor: &ActorContext,
    min_role: Role,
    target: OwnerScope,
    parent: Option<CompanyId>,
) -> Result<(), AccessDenied> {
    if !actor.role.satisfies(min_role) {
        return Err(AccessDenied::InsufficientRole {
            required: min_role,
            actual: actor.role,
        });
    }

    let in_scope = actor.scope == target
        || matches!(
            (actor.scope, target, parent),
            (OwnerScope::Company(own), OwnerScope::Franchise(_), Some(parent)) if own == parent
        );

    if !in_scope {
        return Err(AccessDenied::OutOfScope {
            actor_scope: actor.scope,
            target,
        });
    }

    Ok(())
}
