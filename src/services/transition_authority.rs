// src/services/transition_authority.rs

//! Decide qual transição o cargo do usuário pode submeter.
//! O cargo entra como parâmetro explícito; nada é lido de estado global.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    models::{
        approval::{action_label, stage_for_role, stage_index, ApprovalStage, Role, REJECT_ACTION_LABEL},
        fund_request::{ApprovalLogSubmission, NOTES_PLACEHOLDER},
    },
    services::status_resolver::ResolvedStatus,
};

pub const NOTES_MAX_LENGTH: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

/// O que a tela de detalhe oferece ao usuário.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailableActions {
    pub role: Role,
    pub approve_stage: ApprovalStage,
    pub approve_label: String,
    pub reject_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("o cargo {0} não participa da cadeia de aprovação")]
    RoleHasNoStage(Role),

    #[error("a solicitação já foi rejeitada")]
    AlreadyRejected,

    #[error("a solicitação ainda não foi submetida")]
    NotSubmitted,

    #[error("a cadeia de aprovação já foi concluída")]
    ChainComplete,

    #[error("não é a vez do cargo {role}: aguardando {awaiting}")]
    OutOfTurn { role: Role, awaiting: ApprovalStage },

    #[error("a nota excede {max} caracteres ({len})")]
    NotesTooLong { max: usize, len: usize },
}

/// Verifica se o cargo pode agir agora. Retorna a etapa que o "aprovar" registraria.
pub fn check_turn(role: Role, status: &ResolvedStatus) -> Result<ApprovalStage, TransitionError> {
    let own_stage = stage_for_role(role).ok_or(TransitionError::RoleHasNoStage(role))?;

    if status.is_rejected {
        return Err(TransitionError::AlreadyRejected);
    }
    if status.is_draft {
        return Err(TransitionError::NotSubmitted);
    }

    let own_index = stage_index(own_stage).unwrap_or_default();
    let awaiting = status
        .awaiting_stage()
        .ok_or(TransitionError::ChainComplete)?;

    // Etapa do cargo já passou (ou foi pulada) ou ainda não chegou.
    if status.last_completed_index.is_some_and(|last| own_index <= last)
        || Some(own_index) != status.awaiting_index()
    {
        return Err(TransitionError::OutOfTurn { role, awaiting });
    }

    Ok(own_stage)
}

pub fn available_actions(role: Role, status: &ResolvedStatus) -> Option<AvailableActions> {
    let stage = check_turn(role, status).ok()?;
    Some(AvailableActions {
        role,
        approve_stage: stage,
        approve_label: action_label(stage).unwrap_or("Approve").to_string(),
        reject_label: REJECT_ACTION_LABEL.to_string(),
    })
}

pub fn normalize_notes(notes: Option<&str>) -> Result<String, TransitionError> {
    let trimmed = notes.map(str::trim).unwrap_or_default();
    let len = trimmed.chars().count();
    if len > NOTES_MAX_LENGTH {
        return Err(TransitionError::NotesTooLong { max: NOTES_MAX_LENGTH, len });
    }
    if trimmed.is_empty() {
        Ok(NOTES_PLACEHOLDER.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Monta o rascunho do log. Nenhum efeito colateral: quem grava é a camada de persistência.
pub fn submit_action(
    action: ApprovalAction,
    role: Role,
    fund_request_id: i64,
    status: &ResolvedStatus,
    notes: Option<&str>,
) -> Result<ApprovalLogSubmission, TransitionError> {
    let own_stage = check_turn(role, status)?;
    let notes = normalize_notes(notes)?;

    let approval_stage = match action {
        ApprovalAction::Approve => own_stage,
        ApprovalAction::Reject => ApprovalStage::Rejected,
    };

    Ok(ApprovalLogSubmission {
        approval_stage,
        stage_timestamp: None,
        notes,
        fund_request_id,
    })
}

/// Validação do lado do servidor: a etapa submetida tem que ser exatamente
/// a que o cargo poderia registrar agora.
pub fn authorize_submission(
    role: Role,
    status: &ResolvedStatus,
    submitted: ApprovalStage,
) -> Result<(), TransitionError> {
    let own_stage = check_turn(role, status)?;
    if submitted == ApprovalStage::Rejected || submitted == own_stage {
        Ok(())
    } else {
        let awaiting = status.awaiting_stage().unwrap_or(own_stage);
        Err(TransitionError::OutOfTurn { role, awaiting })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{approval::CHAIN, fund_request::ApprovalLogEntry};
    use crate::services::status_resolver::resolve;
    use chrono::{Duration, TimeZone, Utc};

    fn logs(stages: &[ApprovalStage]) -> Vec<ApprovalLogEntry> {
        let t0 = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        stages
            .iter()
            .enumerate()
            .map(|(i, stage)| ApprovalLogEntry {
                id: i as i64 + 1,
                fund_request_id: 42,
                approval_stage: *stage,
                stage_timestamp: t0 + Duration::hours(i as i64),
                notes: None,
                created_by: None,
            })
            .collect()
    }

    #[test]
    fn manager_ops_acts_after_staff_acknowledges() {
        let status = resolve(&logs(&CHAIN[..2]));
        let actions = available_actions(Role::ManagerOps, &status).expect("ação disponível");
        assert_eq!(actions.approve_stage, ApprovalStage::ApprovedByManagerOps);
        assert_eq!(actions.approve_label, "Approve");

        let draft = submit_action(ApprovalAction::Approve, Role::ManagerOps, 42, &status, Some("ok")).unwrap();
        assert_eq!(draft.approval_stage, ApprovalStage::ApprovedByManagerOps);
        assert_eq!(draft.stage_timestamp, None);
        assert_eq!(draft.notes, "ok");
        assert_eq!(draft.fund_request_id, 42);
    }

    #[test]
    fn roles_already_passed_have_no_action() {
        let status = resolve(&logs(&CHAIN[..4]));
        for role in [Role::Staff, Role::ManagerOps, Role::Finance] {
            assert!(available_actions(role, &status).is_none(), "{role}");
        }
        assert!(available_actions(Role::ManagerFin, &status).is_some());
    }

    #[test]
    fn roles_ahead_of_the_chain_must_wait() {
        let status = resolve(&logs(&CHAIN[..1]));
        assert_eq!(
            check_turn(Role::Director, &status),
            Err(TransitionError::OutOfTurn {
                role: Role::Director,
                awaiting: ApprovalStage::AcknowledgedByStaffOps,
            })
        );
        assert!(available_actions(Role::Staff, &status).is_some());
    }

    #[test]
    fn reject_always_records_rejected() {
        let status = resolve(&logs(&CHAIN[..3]));
        let draft = submit_action(ApprovalAction::Reject, Role::Finance, 42, &status, None).unwrap();
        assert_eq!(draft.approval_stage, ApprovalStage::Rejected);
        assert_eq!(draft.notes, NOTES_PLACEHOLDER);
    }

    #[test]
    fn nobody_acts_on_rejected_requests() {
        let mut stages = CHAIN[..4].to_vec();
        stages.push(ApprovalStage::Rejected);
        let status = resolve(&logs(&stages));
        for role in Role::ALL {
            assert!(available_actions(role, &status).is_none(), "{role}");
        }
        assert_eq!(
            submit_action(ApprovalAction::Reject, Role::ManagerFin, 42, &status, None),
            Err(TransitionError::AlreadyRejected)
        );
    }

    #[test]
    fn draft_and_complete_requests_offer_nothing() {
        let draft = resolve(&[]);
        assert_eq!(check_turn(Role::Staff, &draft), Err(TransitionError::NotSubmitted));

        let done = resolve(&logs(&CHAIN));
        assert_eq!(check_turn(Role::Director, &done), Err(TransitionError::ChainComplete));
    }

    #[test]
    fn admin_ops_never_acts() {
        let status = resolve(&logs(&CHAIN[..1]));
        assert_eq!(
            check_turn(Role::AdminOps, &status),
            Err(TransitionError::RoleHasNoStage(Role::AdminOps))
        );
    }

    #[test]
    fn notes_are_normalized_and_bounded() {
        assert_eq!(normalize_notes(Some("   ")).unwrap(), NOTES_PLACEHOLDER);
        assert_eq!(normalize_notes(Some(" fine ")).unwrap(), "fine");
        let long = "x".repeat(NOTES_MAX_LENGTH + 1);
        assert_eq!(
            normalize_notes(Some(&long)),
            Err(TransitionError::NotesTooLong { max: NOTES_MAX_LENGTH, len: NOTES_MAX_LENGTH + 1 })
        );
    }

    #[test]
    fn server_side_check_rejects_foreign_stage() {
        let status = resolve(&logs(&CHAIN[..2]));
        assert!(authorize_submission(Role::ManagerOps, &status, ApprovalStage::ApprovedByManagerOps).is_ok());
        assert!(authorize_submission(Role::ManagerOps, &status, ApprovalStage::Rejected).is_ok());
        assert!(authorize_submission(Role::ManagerOps, &status, ApprovalStage::ApprovedByDirector).is_err());
        assert!(authorize_submission(Role::Finance, &status, ApprovalStage::ReviewedByFinance).is_err());
    }
}
