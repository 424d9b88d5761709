use crate::compiler_midend::ir::ir_nodes::InstId;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Rewritten,
    Rejected(Rejection),
}

impl CandidateOutcome {
    pub fn is_rewritten(&self) -> bool {
        matches!(self, CandidateOutcome::Rewritten)
    }
}

/// Which proof obligation a rejected candidate failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectedCheck {
    Precondition,
    UseClassification,
    SourceMutation,
    DestroyShape,
}

/// Why a candidate slot was left alone. Rejections are never errors, the IR is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    // Preconditions
    NotACandidate(InstId),
    NotInitialization,
    AssignStore,
    DestNotStackSlot,
    DynamicLifetime,
    SelfCopy,

    // Use classification
    UseOutsideBlock(InstId),
    UnsupportedUse(InstId),
    WriteAccess(InstId),
    ConsumingCall(InstId),
    IndirectCallWithoutSource(InstId),
    InoutMayAliasSource(InstId),
    MutableExistential(InstId),
    NonOptionalEnumPayload(InstId),
    ProjectionWithoutSource(InstId),
    ProjectionTooDeep(InstId),
    TakeThroughProjection(InstId),
    BorrowWithoutSource(InstId),
    WritesSlot(InstId),

    // Source mutation
    SourceModified(InstId),
    LoadsOutsideBlock,

    // Destroy shape
    NoLifetimeFrontier,
    LifetimeEndsAtBlockStart(InstId),
    UnexpectedDestroy(InstId),
}

impl Rejection {
    pub fn check(&self) -> RejectedCheck {
        match self {
            Rejection::NotACandidate(_)
            | Rejection::NotInitialization
            | Rejection::AssignStore
            | Rejection::DestNotStackSlot
            | Rejection::DynamicLifetime
            | Rejection::SelfCopy => RejectedCheck::Precondition,

            Rejection::SourceModified(_) | Rejection::LoadsOutsideBlock => {
                RejectedCheck::SourceMutation
            }

            Rejection::NoLifetimeFrontier
            | Rejection::LifetimeEndsAtBlockStart(_)
            | Rejection::UnexpectedDestroy(_) => RejectedCheck::DestroyShape,

            _ => RejectedCheck::UseClassification,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotACandidate(inst) => {
                write!(f, "inst#{} is neither a copy_addr nor a store", inst.0)
            }
            Rejection::NotInitialization => write!(f, "copy does not initialize its destination"),
            Rejection::AssignStore => write!(f, "store assigns over an existing value"),
            Rejection::DestNotStackSlot => write!(f, "destination is not an alloc_stack"),
            Rejection::DynamicLifetime => write!(f, "slot has a dynamic lifetime"),
            Rejection::SelfCopy => write!(f, "slot is initialized from itself"),
            Rejection::UseOutsideBlock(inst) => {
                write!(f, "inst#{} uses the slot outside its block", inst.0)
            }
            Rejection::UnsupportedUse(inst) => {
                write!(f, "inst#{} may write or destroy the slot", inst.0)
            }
            Rejection::WriteAccess(inst) => write!(f, "inst#{} opens a non-read access", inst.0),
            Rejection::ConsumingCall(inst) => {
                write!(f, "inst#{} passes the slot under a consuming convention", inst.0)
            }
            Rejection::IndirectCallWithoutSource(inst) => write!(
                f,
                "inst#{} needs an address but the slot has no source address",
                inst.0
            ),
            Rejection::InoutMayAliasSource(inst) => {
                write!(f, "inst#{} passes an inout argument that may alias the source", inst.0)
            }
            Rejection::MutableExistential(inst) => {
                write!(f, "inst#{} opens the existential mutably", inst.0)
            }
            Rejection::NonOptionalEnumPayload(inst) => {
                write!(f, "inst#{} takes the payload of a non-optional enum", inst.0)
            }
            Rejection::ProjectionWithoutSource(inst) => {
                write!(f, "inst#{} projects a slot that has no source address", inst.0)
            }
            Rejection::ProjectionTooDeep(inst) => {
                write!(f, "projection chain at inst#{} is too deep", inst.0)
            }
            Rejection::TakeThroughProjection(inst) => {
                write!(f, "inst#{} takes a value out of a projection", inst.0)
            }
            Rejection::BorrowWithoutSource(inst) => {
                write!(f, "inst#{} borrows a slot that has no source address", inst.0)
            }
            Rejection::WritesSlot(inst) => write!(f, "inst#{} writes into the slot", inst.0),
            Rejection::SourceModified(inst) => {
                write!(f, "inst#{} may modify the source while the slot is read", inst.0)
            }
            Rejection::LoadsOutsideBlock => {
                write!(f, "not every read of the slot follows the copy in its block")
            }
            Rejection::NoLifetimeFrontier => {
                write!(f, "slot lifetime ends on a critical edge")
            }
            Rejection::LifetimeEndsAtBlockStart(inst) => {
                write!(f, "slot lifetime ends at the start of the block of inst#{}", inst.0)
            }
            Rejection::UnexpectedDestroy(inst) => {
                write!(f, "slot lifetime ends after inst#{}, which is not a destroy", inst.0)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TempSlotStats {
    pub copies_examined: usize,
    pub copies_rewritten: usize,
    pub stores_examined: usize,
    pub stores_rewritten: usize,
    pub identity_copies_removed: usize,

    pub rejected_precondition: usize,
    pub rejected_use_classification: usize,
    pub rejected_source_mutation: usize,
    pub rejected_destroy_shape: usize,
}

impl TempSlotStats {
    pub fn record_rejection(&mut self, rejection: &Rejection) {
        match rejection.check() {
            RejectedCheck::Precondition => self.rejected_precondition += 1,
            RejectedCheck::UseClassification => self.rejected_use_classification += 1,
            RejectedCheck::SourceMutation => self.rejected_source_mutation += 1,
            RejectedCheck::DestroyShape => self.rejected_destroy_shape += 1,
        }
    }

    pub fn merge(&mut self, other: &TempSlotStats) {
        self.copies_examined += other.copies_examined;
        self.copies_rewritten += other.copies_rewritten;
        self.stores_examined += other.stores_examined;
        self.stores_rewritten += other.stores_rewritten;
        self.identity_copies_removed += other.identity_copies_removed;
        self.rejected_precondition += other.rejected_precondition;
        self.rejected_use_classification += other.rejected_use_classification;
        self.rejected_source_mutation += other.rejected_source_mutation;
        self.rejected_destroy_shape += other.rejected_destroy_shape;
    }

    pub fn slots_eliminated(&self) -> usize {
        self.copies_rewritten + self.stores_rewritten
    }
}

impl fmt::Display for TempSlotStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "copies {}/{}, stores {}/{}, identity copies removed {}, rejected: precondition {}, uses {}, source mutation {}, destroy shape {}",
            self.copies_rewritten,
            self.copies_examined,
            self.stores_rewritten,
            self.stores_examined,
            self.identity_copies_removed,
            self.rejected_precondition,
            self.rejected_use_classification,
            self.rejected_source_mutation,
            self.rejected_destroy_shape,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct TempSlotReport {
    pub changed: bool,
    pub stats: TempSlotStats,
}
