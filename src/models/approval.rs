// src/models/approval.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// --- Enums (Mapeando o Postgres) ---

/// Etapas da cadeia de aprovação. A ordem das variantes forward é a ordem da cadeia;
/// `Rejected` fica fora da cadeia e é terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "approval_stage", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStage {
    SubmittedByAdminOps,
    AcknowledgedByStaffOps,
    ApprovedByManagerOps,
    ReviewedByFinance,
    ApprovedByManagerFin,
    ApprovedByDirector,
    Rejected,
}

/// Cadeia ordenada (índice 0..=5). `Rejected` não faz parte.
pub const CHAIN: [ApprovalStage; 6] = [
    ApprovalStage::SubmittedByAdminOps,
    ApprovalStage::AcknowledgedByStaffOps,
    ApprovalStage::ApprovedByManagerOps,
    ApprovalStage::ReviewedByFinance,
    ApprovalStage::ApprovedByManagerFin,
    ApprovalStage::ApprovedByDirector,
];

pub const LAST_STAGE_INDEX: usize = CHAIN.len() - 1;

impl ApprovalStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStage::SubmittedByAdminOps => "SUBMITTED_BY_ADMIN_OPS",
            ApprovalStage::AcknowledgedByStaffOps => "ACKNOWLEDGED_BY_STAFF_OPS",
            ApprovalStage::ApprovedByManagerOps => "APPROVED_BY_MANAGER_OPS",
            ApprovalStage::ReviewedByFinance => "REVIEWED_BY_FINANCE",
            ApprovalStage::ApprovedByManagerFin => "APPROVED_BY_MANAGER_FIN",
            ApprovalStage::ApprovedByDirector => "APPROVED_BY_DIRECTOR",
            ApprovalStage::Rejected => "REJECTED",
        }
    }

    /// Título curto usado no PDF e na timeline.
    pub fn title(&self) -> &'static str {
        match self {
            ApprovalStage::SubmittedByAdminOps => "Submitted by Admin Ops",
            ApprovalStage::AcknowledgedByStaffOps => "Acknowledged by Staff Ops",
            ApprovalStage::ApprovedByManagerOps => "Approved by Manager Ops",
            ApprovalStage::ReviewedByFinance => "Reviewed by Finance",
            ApprovalStage::ApprovedByManagerFin => "Approved by Manager Finance",
            ApprovalStage::ApprovedByDirector => "Approved by Director",
            ApprovalStage::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ApprovalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cargo organizacional do usuário (vem da sessão / JWT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Role {
    #[serde(rename = "ADMIN OPS")]
    AdminOps,
    #[serde(rename = "STAFF")]
    Staff,
    #[serde(rename = "MANAGER OPS")]
    ManagerOps,
    #[serde(rename = "FINANCE")]
    Finance,
    #[serde(rename = "MANAGER FIN")]
    ManagerFin,
    #[serde(rename = "DIRECTOR")]
    Director,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::AdminOps,
        Role::Staff,
        Role::ManagerOps,
        Role::Finance,
        Role::ManagerFin,
        Role::Director,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AdminOps => "ADMIN OPS",
            Role::Staff => "STAFF",
            Role::ManagerOps => "MANAGER OPS",
            Role::Finance => "FINANCE",
            Role::ManagerFin => "MANAGER FIN",
            Role::Director => "DIRECTOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cargo desconhecido: '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

// =========================================================================
//  REGISTRO DE ETAPAS
// =========================================================================

/// Posição da etapa na cadeia. `None` para `Rejected`.
pub fn stage_index(stage: ApprovalStage) -> Option<usize> {
    CHAIN.iter().position(|s| *s == stage)
}

/// Cargo que registra a etapa. A etapa 0 é implícita (criação) e não tem cargo.
pub fn role_for_stage(stage: ApprovalStage) -> Option<Role> {
    match stage {
        ApprovalStage::AcknowledgedByStaffOps => Some(Role::Staff),
        ApprovalStage::ApprovedByManagerOps => Some(Role::ManagerOps),
        ApprovalStage::ReviewedByFinance => Some(Role::Finance),
        ApprovalStage::ApprovedByManagerFin => Some(Role::ManagerFin),
        ApprovalStage::ApprovedByDirector => Some(Role::Director),
        ApprovalStage::SubmittedByAdminOps | ApprovalStage::Rejected => None,
    }
}

/// Mapeamento inverso: a etapa que o "aprovar" de um cargo registra.
pub fn stage_for_role(role: Role) -> Option<ApprovalStage> {
    CHAIN
        .into_iter()
        .find(|stage| role_for_stage(*stage) == Some(role))
}

pub fn action_label(stage: ApprovalStage) -> Option<&'static str> {
    match stage {
        ApprovalStage::AcknowledgedByStaffOps => Some("Acknowledge"),
        ApprovalStage::ReviewedByFinance => Some("Review"),
        ApprovalStage::ApprovedByManagerOps
        | ApprovalStage::ApprovedByManagerFin
        | ApprovalStage::ApprovedByDirector => Some("Approve"),
        ApprovalStage::SubmittedByAdminOps | ApprovalStage::Rejected => None,
    }
}

pub const REJECT_ACTION_LABEL: &str = "Reject";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_indices_follow_declaration_order() {
        for (i, stage) in CHAIN.iter().enumerate() {
            assert_eq!(stage_index(*stage), Some(i));
        }
        assert_eq!(stage_index(ApprovalStage::Rejected), None);
    }

    #[test]
    fn submission_stage_has_no_actor() {
        assert_eq!(role_for_stage(ApprovalStage::SubmittedByAdminOps), None);
        assert_eq!(role_for_stage(ApprovalStage::Rejected), None);
        assert_eq!(stage_for_role(Role::AdminOps), None);
    }

    #[test]
    fn every_gatekeeping_role_maps_back_to_its_stage() {
        for stage in &CHAIN[1..] {
            let role = role_for_stage(*stage).expect("etapa com cargo");
            assert_eq!(stage_for_role(role), Some(*stage));
        }
    }

    #[test]
    fn action_labels() {
        assert_eq!(action_label(ApprovalStage::AcknowledgedByStaffOps), Some("Acknowledge"));
        assert_eq!(action_label(ApprovalStage::ReviewedByFinance), Some("Review"));
        assert_eq!(action_label(ApprovalStage::ApprovedByDirector), Some("Approve"));
        assert_eq!(action_label(ApprovalStage::SubmittedByAdminOps), None);
    }

    #[test]
    fn roles_parse_from_session_strings() {
        assert_eq!("MANAGER OPS".parse::<Role>(), Ok(Role::ManagerOps));
        assert_eq!(" manager fin ".parse::<Role>(), Ok(Role::ManagerFin));
        assert!("MANAGER_OPS".parse::<Role>().is_err());
    }

    #[test]
    fn stage_wire_names_match_serde() {
        let json = serde_json::to_string(&ApprovalStage::ApprovedByManagerFin).unwrap();
        assert_eq!(json, "\"APPROVED_BY_MANAGER_FIN\"");
        let role: Role = serde_json::from_str("\"MANAGER OPS\"").unwrap();
        assert_eq!(role, Role::ManagerOps);
    }
}
