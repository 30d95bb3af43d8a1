//! Stage ownership and category scoping for officers.

use super::domain::{ApplicationStage, PositionType};
use super::roles::{OfficerLevel, RoleClass};

/// Why an officer was refused access to an application at a given stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("role carries no officer privileges")]
    NotAnOfficer,
    #[error("{level:?} officers do not act on {stage}")]
    StageNotOwned {
        level: OfficerLevel,
        stage: ApplicationStage,
    },
    #[error("officer category {officer:?} does not match application category {application}")]
    CategoryMismatch {
        officer: Option<PositionType>,
        application: PositionType,
    },
}

/// Stages an officer level is responsible for.
pub const fn owned_stages(level: OfficerLevel) -> &'static [ApplicationStage] {
    match level {
        OfficerLevel::Junior => &[
            ApplicationStage::JuniorEngineerPending,
            ApplicationStage::DocumentVerificationPending,
        ],
        OfficerLevel::Assistant => &[ApplicationStage::AssistantEngineerPending],
        OfficerLevel::Executive => &[
            ApplicationStage::ExecutiveEngineerPending,
            ApplicationStage::ExecutiveEngineerSignPending,
        ],
        OfficerLevel::CityEngineer => &[
            ApplicationStage::CityEngineerPending,
            ApplicationStage::CityEngineerSignPending,
        ],
        OfficerLevel::Clerk => &[ApplicationStage::ClerkPending],
        OfficerLevel::Admin | OfficerLevel::User => &[],
    }
}

/// Level that owns a stage, if any. Terminal stages and PAYMENT_PENDING are unowned.
pub fn stage_owner(stage: ApplicationStage) -> Option<OfficerLevel> {
    [
        OfficerLevel::Junior,
        OfficerLevel::Assistant,
        OfficerLevel::Executive,
        OfficerLevel::CityEngineer,
        OfficerLevel::Clerk,
    ]
    .into_iter()
    .find(|level| owned_stages(*level).contains(&stage))
}

/// Authorize an officer against an application's current stage and category.
///
/// Stage ownership is checked first, then the high-level override, then the category
/// match required of Junior and Assistant officers.
pub fn authorize(
    role: &RoleClass,
    stage: ApplicationStage,
    category: PositionType,
) -> Result<(), AccessDenied> {
    if !role.is_officer() {
        return Err(AccessDenied::NotAnOfficer);
    }
    if !owned_stages(role.level).contains(&stage) {
        return Err(AccessDenied::StageNotOwned {
            level: role.level,
            stage,
        });
    }
    if role.is_high_level() {
        return Ok(());
    }
    match role.level {
        OfficerLevel::Junior | OfficerLevel::Assistant if role.category != Some(category) => {
            Err(AccessDenied::CategoryMismatch {
                officer: role.category,
                application: category,
            })
        }
        _ => Ok(()),
    }
}

pub fn can_view(role: &RoleClass, stage: ApplicationStage, category: PositionType) -> bool {
    authorize(role, stage, category).is_ok()
}

/// Mutation uses the same predicate as viewing.
pub fn can_mutate(role: &RoleClass, stage: ApplicationStage, category: PositionType) -> bool {
    can_view(role, stage, category)
}
