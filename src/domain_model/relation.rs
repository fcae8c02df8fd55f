use crate::domain_model::UserId;
use serde::Serialize;
use std::fmt;

/// One of the three per-user sub-collections that make up the social graph.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// Requests received and not yet resolved.
    Incoming,
    /// Requests sent and not yet resolved.
    Outgoing,
    /// Confirmed friends.
    Friends,
}

impl RelationKind {
    pub const ALL: [RelationKind; 3] = [
        RelationKind::Incoming,
        RelationKind::Outgoing,
        RelationKind::Friends,
    ];

    /// Sub-collection name under `users/{id}`.
    pub fn collection(&self) -> &'static str {
        match self {
            RelationKind::Incoming => "waitingUsers",
            RelationKind::Outgoing => "sendedRequests",
            RelationKind::Friends => "friendIDs",
        }
    }

    /// Field holding the other user's id inside a membership document.
    pub fn id_field(&self) -> &'static str {
        match self {
            RelationKind::Incoming | RelationKind::Outgoing => "userID",
            RelationKind::Friends => "friendID",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::Incoming => f.write_str("incoming"),
            RelationKind::Outgoing => f.write_str("outgoing"),
            RelationKind::Friends => f.write_str("friends"),
        }
    }
}

/// Relationship between `me` and another user, as seen from `me`'s own
/// sub-collections.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationState {
    None,
    RequestSent,
    RequestReceived,
    Friends,
}

impl RelationState {
    /// Folds the three memberships into a state. `None` is returned when more
    /// than one membership holds at once.
    pub fn from_memberships(outgoing: bool, incoming: bool, friends: bool) -> Option<Self> {
        match (outgoing, incoming, friends) {
            (false, false, false) => Some(RelationState::None),
            (true, false, false) => Some(RelationState::RequestSent),
            (false, true, false) => Some(RelationState::RequestReceived),
            (false, false, true) => Some(RelationState::Friends),
            _ => None,
        }
    }
}

/// A membership row write: insert or remove `other` in `owner`'s `kind`
/// sub-collection.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MembershipWrite {
    pub op: MembershipOp,
    pub owner: UserId,
    pub kind: RelationKind,
    pub other: UserId,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MembershipOp {
    Insert,
    Remove,
}

impl MembershipWrite {
    fn insert(owner: &UserId, kind: RelationKind, other: &UserId) -> Self {
        Self {
            op: MembershipOp::Insert,
            owner: owner.clone(),
            kind,
            other: other.clone(),
        }
    }

    fn remove(owner: &UserId, kind: RelationKind, other: &UserId) -> Self {
        Self {
            op: MembershipOp::Remove,
            owner: owner.clone(),
            kind,
            other: other.clone(),
        }
    }
}

/// A relationship lifecycle step. The first user is always the one acting.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Transition {
    Send { from: UserId, to: UserId },
    Accept { me: UserId, requester: UserId },
    Deny { me: UserId, requester: UserId },
    CancelRequest { me: UserId, recipient: UserId },
    RemoveFriend { me: UserId, friend: UserId },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Send { .. } => "send",
            Transition::Accept { .. } => "accept",
            Transition::Deny { .. } => "deny",
            Transition::CancelRequest { .. } => "cancel_request",
            Transition::RemoveFriend { .. } => "remove_friend",
        }
    }

    pub fn actor(&self) -> &UserId {
        match self {
            Transition::Send { from, .. } => from,
            Transition::Accept { me, .. }
            | Transition::Deny { me, .. }
            | Transition::CancelRequest { me, .. }
            | Transition::RemoveFriend { me, .. } => me,
        }
    }

    pub fn counterpart(&self) -> &UserId {
        match self {
            Transition::Send { to, .. } => to,
            Transition::Accept { requester, .. } | Transition::Deny { requester, .. } => requester,
            Transition::CancelRequest { recipient, .. } => recipient,
            Transition::RemoveFriend { friend, .. } => friend,
        }
    }

    /// Ordered write plan. Each write runs only after the previous one
    /// succeeded.
    pub fn writes(&self) -> Vec<MembershipWrite> {
        use RelationKind::*;

        match self {
            Transition::Send { from, to } => vec![
                MembershipWrite::insert(from, Outgoing, to),
                MembershipWrite::insert(to, Incoming, from),
            ],
            Transition::Accept { me, requester } => vec![
                MembershipWrite::remove(me, Incoming, requester),
                MembershipWrite::remove(requester, Outgoing, me),
                MembershipWrite::insert(me, Friends, requester),
                MembershipWrite::insert(requester, Friends, me),
            ],
            Transition::Deny { me, requester } => vec![
                MembershipWrite::remove(me, Incoming, requester),
                MembershipWrite::remove(requester, Outgoing, me),
            ],
            Transition::CancelRequest { me, recipient } => vec![
                MembershipWrite::remove(me, Outgoing, recipient),
                MembershipWrite::remove(recipient, Incoming, me),
            ],
            Transition::RemoveFriend { me, friend } => vec![
                MembershipWrite::remove(me, Friends, friend),
                MembershipWrite::remove(friend, Friends, me),
            ],
        }
    }
}

/// Membership diff delivered for one change notification.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct RelationChange {
    pub added: Vec<UserId>,
    pub removed: Vec<UserId>,
}

impl RelationChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> UserId {
        s.parse().unwrap()
    }

    #[test]
    fn accept_removes_the_request_before_creating_the_friendship() {
        let plan = Transition::Accept {
            me: id("u2"),
            requester: id("u1"),
        }
        .writes();

        let ops: Vec<_> = plan.iter().map(|w| (w.op, w.owner.as_str(), w.kind)).collect();
        assert_eq!(
            ops,
            vec![
                (MembershipOp::Remove, "u2", RelationKind::Incoming),
                (MembershipOp::Remove, "u1", RelationKind::Outgoing),
                (MembershipOp::Insert, "u2", RelationKind::Friends),
                (MembershipOp::Insert, "u1", RelationKind::Friends),
            ]
        );
    }

    #[test]
    fn every_plan_touches_both_sides() {
        let (a, b) = (id("a"), id("b"));
        let transitions = [
            Transition::Send { from: a.clone(), to: b.clone() },
            Transition::Deny { me: a.clone(), requester: b.clone() },
            Transition::CancelRequest { me: a.clone(), recipient: b.clone() },
            Transition::RemoveFriend { me: a.clone(), friend: b.clone() },
        ];
        for t in transitions {
            let plan = t.writes();
            assert_eq!(plan.len(), 2, "{}", t.name());
            assert_eq!(plan[0].owner, a);
            assert_eq!(plan[0].other, b);
            assert_eq!(plan[1].owner, b);
            assert_eq!(plan[1].other, a);
        }
    }

    #[test]
    fn contradictory_memberships_have_no_state() {
        assert_eq!(
            RelationState::from_memberships(false, true, false),
            Some(RelationState::RequestReceived)
        );
        assert_eq!(RelationState::from_memberships(true, true, false), None);
        assert_eq!(RelationState::from_memberships(true, false, true), None);
    }
}
