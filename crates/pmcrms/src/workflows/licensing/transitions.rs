//! Transition graph over [`ApplicationStage`].
//!
//! Every legal edge is tagged with the trigger that may drive it. Officer decisions,
//! signature completion, payment completion and appointment scheduling each consult the
//! same table through [`plan`], so the signature path and the officer path cannot drift
//! apart unnoticed; [`divergent_edges`] reports where they deliberately differ.

use serde::Serialize;

use super::access::{self, AccessDenied};
use super::domain::{ApplicationStage, PositionType};
use super::roles::{OfficerLevel, RoleClass};

use ApplicationStage::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransitionTrigger {
    OfficerDecision,
    SignatureCompletion,
    PaymentCompletion,
    AppointmentScheduling,
}

impl TransitionTrigger {
    pub const fn guard(self) -> EdgeGuard {
        match self {
            TransitionTrigger::OfficerDecision | TransitionTrigger::SignatureCompletion => {
                EdgeGuard::StageOwner
            }
            TransitionTrigger::PaymentCompletion => EdgeGuard::PaymentGateway,
            TransitionTrigger::AppointmentScheduling => EdgeGuard::JuniorOfCategory,
        }
    }
}

/// Authorization predicate attached to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeGuard {
    /// Officer must own the source stage (and match category when scoped).
    StageOwner,
    /// Stage owner who is additionally a Junior officer.
    JuniorOfCategory,
    /// Only the payment callback may drive the edge.
    PaymentGateway,
}

/// Who is trying to move an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Officer(RoleClass),
    PaymentGateway,
}

impl EdgeGuard {
    pub fn check(
        self,
        actor: &Actor,
        from: ApplicationStage,
        category: PositionType,
    ) -> Result<(), AccessDenied> {
        match (self, actor) {
            (EdgeGuard::PaymentGateway, Actor::PaymentGateway) => Ok(()),
            (EdgeGuard::PaymentGateway, Actor::Officer(_))
            | (EdgeGuard::StageOwner | EdgeGuard::JuniorOfCategory, Actor::PaymentGateway) => {
                Err(AccessDenied::NotAnOfficer)
            }
            (EdgeGuard::StageOwner, Actor::Officer(role)) => {
                access::authorize(role, from, category)
            }
            (EdgeGuard::JuniorOfCategory, Actor::Officer(role)) => {
                access::authorize(role, from, category)?;
                if role.level == OfficerLevel::Junior {
                    Ok(())
                } else {
                    Err(AccessDenied::StageNotOwned {
                        level: role.level,
                        stage: from,
                    })
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub from: ApplicationStage,
    pub to: ApplicationStage,
    pub trigger: TransitionTrigger,
    pub guard: EdgeGuard,
}

impl Edge {
    const fn new(from: ApplicationStage, to: ApplicationStage, trigger: TransitionTrigger) -> Self {
        Self {
            from,
            to,
            trigger,
            guard: trigger.guard(),
        }
    }
}

const OFFICER: TransitionTrigger = TransitionTrigger::OfficerDecision;
const SIGNATURE: TransitionTrigger = TransitionTrigger::SignatureCompletion;

const FORWARD_EDGES: [Edge; 19] = [
    Edge::new(
        JuniorEngineerPending,
        DocumentVerificationPending,
        TransitionTrigger::AppointmentScheduling,
    ),
    Edge::new(DocumentVerificationPending, AssistantEngineerPending, OFFICER),
    Edge::new(AssistantEngineerPending, ExecutiveEngineerPending, OFFICER),
    Edge::new(ExecutiveEngineerPending, CityEngineerPending, OFFICER),
    Edge::new(ExecutiveEngineerPending, ExecutiveEngineerSignPending, OFFICER),
    Edge::new(CityEngineerPending, PaymentPending, OFFICER),
    Edge::new(CityEngineerPending, CityEngineerSignPending, OFFICER),
    Edge::new(PaymentPending, ClerkPending, TransitionTrigger::PaymentCompletion),
    Edge::new(ClerkPending, ExecutiveEngineerSignPending, OFFICER),
    Edge::new(ExecutiveEngineerSignPending, CityEngineerSignPending, OFFICER),
    Edge::new(CityEngineerSignPending, Approved, OFFICER),
    Edge::new(JuniorEngineerPending, AssistantEngineerPending, SIGNATURE),
    Edge::new(AssistantEngineerPending, ExecutiveEngineerPending, SIGNATURE),
    Edge::new(ExecutiveEngineerPending, CityEngineerPending, SIGNATURE),
    Edge::new(CityEngineerPending, PaymentPending, SIGNATURE),
    Edge::new(PaymentPending, ClerkPending, SIGNATURE),
    Edge::new(ClerkPending, ExecutiveEngineerSignPending, SIGNATURE),
    Edge::new(ExecutiveEngineerSignPending, CityEngineerSignPending, SIGNATURE),
    Edge::new(CityEngineerSignPending, Approved, SIGNATURE),
];

/// Every edge of the graph, rejections included.
pub fn edges() -> impl Iterator<Item = Edge> {
    let rejections = ApplicationStage::ALL
        .into_iter()
        .filter(|stage| !stage.is_terminal())
        .map(|stage| Edge::new(stage, Rejected, OFFICER));
    FORWARD_EDGES.into_iter().chain(rejections)
}

pub fn find_edge(
    from: ApplicationStage,
    to: ApplicationStage,
    trigger: TransitionTrigger,
) -> Option<Edge> {
    edges().find(|edge| edge.from == from && edge.to == to && edge.trigger == trigger)
}

/// Stages an officer may move an application to from `from`.
pub fn officer_targets(from: ApplicationStage) -> Vec<ApplicationStage> {
    edges()
        .filter(|edge| edge.from == from && edge.trigger == OFFICER)
        .map(|edge| edge.to)
        .collect()
}

/// Single successor used when a signature completes at `from`.
pub fn next_after_signature(from: ApplicationStage) -> Option<ApplicationStage> {
    edges()
        .find(|edge| edge.from == from && edge.trigger == SIGNATURE)
        .map(|edge| edge.to)
}

/// Forward edges whose stage pair is reachable by only one of the officer or signature paths.
pub fn divergent_edges() -> Vec<Edge> {
    let pair_has = |edge: &Edge, trigger: TransitionTrigger| {
        FORWARD_EDGES
            .iter()
            .any(|other| other.from == edge.from && other.to == edge.to && other.trigger == trigger)
    };
    FORWARD_EDGES
        .into_iter()
        .filter(|edge| match edge.trigger {
            TransitionTrigger::OfficerDecision => !pair_has(edge, SIGNATURE),
            TransitionTrigger::SignatureCompletion => !pair_has(edge, OFFICER),
            _ => false,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("application is already {stage} and accepts no further transitions")]
    Terminal { stage: ApplicationStage },
    #[error("cannot move from {from} to {to} by {trigger:?}")]
    Illegal {
        from: ApplicationStage,
        to: ApplicationStage,
        trigger: TransitionTrigger,
    },
    #[error("no {trigger:?} successor defined for {from}")]
    NoSuccessor {
        from: ApplicationStage,
        trigger: TransitionTrigger,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionRefusal {
    #[error(transparent)]
    Denied(#[from] AccessDenied),
    #[error(transparent)]
    Invalid(#[from] TransitionError),
}

/// Proof that an edge exists and its guard admitted the actor. Only [`plan`] builds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    edge: Edge,
}

impl Transition {
    pub fn from(&self) -> ApplicationStage {
        self.edge.from
    }

    pub fn to(&self) -> ApplicationStage {
        self.edge.to
    }

    pub fn trigger(&self) -> TransitionTrigger {
        self.edge.trigger
    }
}

/// Validate a move: terminal stages refuse first, then the trigger's guard is checked
/// against the current stage, then the edge itself must exist.
pub fn plan(
    from: ApplicationStage,
    to: ApplicationStage,
    trigger: TransitionTrigger,
    actor: &Actor,
    category: PositionType,
) -> Result<Transition, TransitionRefusal> {
    if from.is_terminal() {
        return Err(TransitionError::Terminal { stage: from }.into());
    }
    trigger.guard().check(actor, from, category)?;
    let edge = find_edge(from, to, trigger).ok_or(TransitionError::Illegal { from, to, trigger })?;
    Ok(Transition { edge })
}

/// Plan the signature-driven advance from `from`.
pub fn plan_signature(
    from: ApplicationStage,
    actor: &Actor,
    category: PositionType,
) -> Result<Transition, TransitionRefusal> {
    if from.is_terminal() {
        return Err(TransitionError::Terminal { stage: from }.into());
    }
    let to = next_after_signature(from).ok_or(TransitionError::NoSuccessor {
        from,
        trigger: SIGNATURE,
    })?;
    plan(from, to, SIGNATURE, actor, category)
}
