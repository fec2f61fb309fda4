//! Roster and waitlist decisions for a single game.
//!
//! Everything here is pure: given a game, a principal and an action it computes the next
//! membership lists without touching storage. The caller's record is never mutated; each call
//! returns an owned [`Transition`] the coordinator can try to persist.
//!
//! After every transition the following hold:
//! - a principal appears at most once across `roster` and `waitlist`;
//! - `roster.len() <= capacity`;
//! - the waitlist is empty whenever the roster has a free slot.

use std::fmt;

use crate::dao::models::GameEntity;

/// Membership change requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAction {
    Join,
    Drop,
}

impl fmt::Display for MembershipAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipAction::Join => f.write_str("join"),
            MembershipAction::Drop => f.write_str("drop"),
        }
    }
}

/// What a transition did to the principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipOutcome {
    /// Took a free roster slot.
    Rostered,
    /// Roster was full; appended to the waitlist.
    Waitlisted,
    AlreadyRostered,
    AlreadyWaitlisted,
    /// Left the roster, possibly promoting the head of the waitlist.
    Removed { promoted: Option<String> },
    LeftWaitlist,
    /// Drop for a principal on neither list.
    NotEnrolled,
}

impl MembershipOutcome {
    /// Whether the outcome implies a write.
    pub fn is_change(&self) -> bool {
        !matches!(
            self,
            MembershipOutcome::AlreadyRostered
                | MembershipOutcome::AlreadyWaitlisted
                | MembershipOutcome::NotEnrolled
        )
    }
}

/// Result of applying an action to a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Game with the updated lists. The version is left as read.
    pub game: GameEntity,
    pub changed: bool,
    pub outcome: MembershipOutcome,
}

impl Transition {
    fn unchanged(game: &GameEntity, outcome: MembershipOutcome) -> Self {
        Self {
            game: game.clone(),
            changed: false,
            outcome,
        }
    }

    fn changed(game: GameEntity, outcome: MembershipOutcome) -> Self {
        Self {
            game,
            changed: true,
            outcome,
        }
    }
}

/// Dispatch `action` to [`join`] or [`drop_out`].
pub fn apply(game: &GameEntity, principal: &str, action: MembershipAction) -> Transition {
    match action {
        MembershipAction::Join => join(game, principal),
        MembershipAction::Drop => drop_out(game, principal),
    }
}

/// Enroll `principal`, on the roster when a slot is free and on the waitlist otherwise.
///
/// A capacity of zero means every joiner is waitlisted.
pub fn join(game: &GameEntity, principal: &str) -> Transition {
    if game.is_rostered(principal) {
        return Transition::unchanged(game, MembershipOutcome::AlreadyRostered);
    }
    if game.is_waitlisted(principal) {
        return Transition::unchanged(game, MembershipOutcome::AlreadyWaitlisted);
    }

    let mut next = game.clone();
    if next.roster.len() < next.capacity() {
        next.roster.push(principal.to_owned());
        Transition::changed(next, MembershipOutcome::Rostered)
    } else {
        next.waitlist.push(principal.to_owned());
        Transition::changed(next, MembershipOutcome::Waitlisted)
    }
}

/// Remove `principal` from whichever list holds it.
///
/// Leaving the roster promotes at most one waitlisted principal, oldest first.
pub fn drop_out(game: &GameEntity, principal: &str) -> Transition {
    if let Some(position) = game.roster.iter().position(|p| p == principal) {
        let mut next = game.clone();
        next.roster.remove(position);

        let promoted = if next.roster.len() < next.capacity() && !next.waitlist.is_empty() {
            let head = next.waitlist.remove(0);
            next.roster.push(head.clone());
            Some(head)
        } else {
            None
        };

        return Transition::changed(next, MembershipOutcome::Removed { promoted });
    }

    if let Some(position) = game.waitlist.iter().position(|p| p == principal) {
        let mut next = game.clone();
        next.waitlist.remove(position);
        return Transition::changed(next, MembershipOutcome::LeftWaitlist);
    }

    Transition::unchanged(game, MembershipOutcome::NotEnrolled)
}
