//! Status transition table for demands and demand-provider pairings.
//!
//! The table is an exhaustive `match` over [`DemandStatus`], so adding a state does not
//! compile until its outgoing transitions are declared. Nothing here clamps or corrects a
//! status: callers ask [`is_legal_transition`] and reject the write themselves.

use crate::entities::DemandStatus;
use std::fmt;
use std::str::FromStr;

use DemandStatus::{
    AcceptedByClient, CancelledByClient, CancelledByProvider, Completed, EventCompleted,
    InPreparation, MissionConfirmed, NewRequest, ProposalSent, RefusedByClient,
    RefusedByProvider, UnderStudy,
};

/// Every status, in lifecycle order followed by the side branches.
pub const ALL_STATUSES: [DemandStatus; 12] = [
    NewRequest,
    UnderStudy,
    ProposalSent,
    AcceptedByClient,
    MissionConfirmed,
    InPreparation,
    EventCompleted,
    Completed,
    RefusedByProvider,
    RefusedByClient,
    CancelledByClient,
    CancelledByProvider,
];

impl DemandStatus {
    /// Status every demand and pairing starts in.
    pub const INITIAL: Self = NewRequest;

    /// Statuses reachable in one step from `self`. Empty for terminal states.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            NewRequest => &[UnderStudy, RefusedByProvider, CancelledByClient],
            UnderStudy => &[ProposalSent, RefusedByProvider, CancelledByClient],
            ProposalSent => &[AcceptedByClient, RefusedByClient, CancelledByClient],
            AcceptedByClient => &[MissionConfirmed, CancelledByClient, CancelledByProvider],
            MissionConfirmed => &[InPreparation, CancelledByClient, CancelledByProvider],
            InPreparation => &[EventCompleted, CancelledByClient, CancelledByProvider],
            EventCompleted => &[Completed],
            Completed | RefusedByProvider | RefusedByClient | CancelledByClient
            | CancelledByProvider => &[],
        }
    }

    /// Whether moving from `self` to `next` is in the table.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Successor on the happy path, `None` once completed or on a side branch.
    #[must_use]
    pub const fn next_normal_status(self) -> Option<Self> {
        match self {
            NewRequest => Some(UnderStudy),
            UnderStudy => Some(ProposalSent),
            ProposalSent => Some(AcceptedByClient),
            AcceptedByClient => Some(MissionConfirmed),
            MissionConfirmed => Some(InPreparation),
            InPreparation => Some(EventCompleted),
            EventCompleted => Some(Completed),
            Completed | RefusedByProvider | RefusedByClient | CancelledByClient
            | CancelledByProvider => None,
        }
    }

    /// End of the lifecycle: no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Still being worked on (neither finished nor cancelled nor refused, and not merely
    /// waiting for the final close after the event).
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            NewRequest
                | UnderStudy
                | ProposalSent
                | AcceptedByClient
                | MissionConfirmed
                | InPreparation
        )
    }

    /// Organizer-side cancellation is possible.
    #[must_use]
    pub fn can_be_cancelled(self) -> bool {
        self.can_transition_to(CancelledByClient)
    }

    /// The provider may still decline.
    #[must_use]
    pub fn can_provider_refuse(self) -> bool {
        self.can_transition_to(RefusedByProvider)
    }

    /// The organizer may decline a proposal.
    #[must_use]
    pub fn can_client_refuse(self) -> bool {
        self.can_transition_to(RefusedByClient)
    }

    /// Stable snake_case code, identical to the stored value.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            NewRequest => "new_request",
            UnderStudy => "under_study",
            ProposalSent => "proposal_sent",
            RefusedByProvider => "refused_by_provider",
            AcceptedByClient => "accepted_by_client",
            RefusedByClient => "refused_by_client",
            MissionConfirmed => "mission_confirmed",
            InPreparation => "in_preparation",
            EventCompleted => "event_completed",
            Completed => "completed",
            CancelledByClient => "cancelled_by_client",
            CancelledByProvider => "cancelled_by_provider",
        }
    }

    /// Label shown to people.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            NewRequest => "New request",
            UnderStudy => "Under study",
            ProposalSent => "Proposal sent",
            RefusedByProvider => "Refused by provider",
            AcceptedByClient => "Accepted by client",
            RefusedByClient => "Refused by client",
            MissionConfirmed => "Mission confirmed",
            InPreparation => "In preparation",
            EventCompleted => "Event completed",
            Completed => "Completed",
            CancelledByClient => "Cancelled by client",
            CancelledByProvider => "Cancelled by provider",
        }
    }
}

impl fmt::Display for DemandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DemandStatus {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        ALL_STATUSES
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or_else(|| crate::errors::Error::validation(format!("Unknown demand status: {s}")))
    }
}

/// Whether `from -> to` is in the table.
#[must_use]
pub fn is_legal_transition(from: DemandStatus, to: DemandStatus) -> bool {
    from.can_transition_to(to)
}

/// Statuses reachable in one step from `status`.
#[must_use]
pub const fn available_transitions(status: DemandStatus) -> &'static [DemandStatus] {
    status.allowed_transitions()
}

/// Rejects `from -> to` unless it is in the table.
///
/// # Errors
/// Returns [`crate::errors::Error::IllegalTransition`] for any move the table does not list.
pub fn ensure_transition(from: DemandStatus, to: DemandStatus) -> crate::errors::Result<()> {
    if is_legal_transition(from, to) {
        Ok(())
    } else {
        Err(crate::errors::Error::IllegalTransition { from, to })
    }
}
