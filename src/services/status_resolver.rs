// src/services/status_resolver.rs

//! Reconcilia os logs de aprovação (sem ordem garantida) no status atual da solicitação.
//!
//! Tudo aqui é puro: a mesma lista de logs sempre produz o mesmo `ResolvedStatus`.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};
use utoipa::ToSchema;

use crate::models::{
    approval::{action_label, role_for_stage, stage_index, ApprovalStage, Role, CHAIN, LAST_STAGE_INDEX},
    fund_request::ApprovalLogEntry,
};

/// Rótulo da listagem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Draft,
    /// Histórico com buracos (ex.: etapa 3 presente sem a etapa 2).
    Inconsistent,
    Stage(ApprovalStage),
}

impl DisplayStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DisplayStatus::Draft => "DRAFT",
            DisplayStatus::Inconsistent => "INCONSISTENT",
            DisplayStatus::Stage(stage) => stage.as_str(),
        }
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DisplayStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletedStage {
    pub stage: ApprovalStage,
    pub index: usize,
    pub entry: ApprovalLogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStatus {
    /// Etapas da cadeia com log válido, em ordem de registro.
    pub completed_stages: Vec<CompletedStage>,
    pub last_completed_index: Option<usize>,
    pub is_rejected: bool,
    pub rejection: Option<ApprovalLogEntry>,
    pub current_index: Option<usize>,
    #[schema(value_type = String, example = "APPROVED_BY_MANAGER_OPS")]
    pub display_status: DisplayStatus,
    /// Etapas ausentes abaixo de `last_completed_index` (a etapa 0 nunca conta).
    pub gaps: Vec<ApprovalStage>,
    /// Sem nenhum log: a cadeia ainda não foi aberta.
    pub is_draft: bool,
}

impl ResolvedStatus {
    pub fn is_completed(&self, stage: ApprovalStage) -> bool {
        self.completed_stages.iter().any(|c| c.stage == stage)
    }

    pub fn entry_for(&self, stage: ApprovalStage) -> Option<&ApprovalLogEntry> {
        if stage == ApprovalStage::Rejected {
            return self.rejection.as_ref();
        }
        self.completed_stages
            .iter()
            .find(|c| c.stage == stage)
            .map(|c| &c.entry)
    }

    pub fn is_fully_approved(&self) -> bool {
        !self.is_rejected && self.last_completed_index == Some(LAST_STAGE_INDEX)
    }

    pub fn is_consistent(&self) -> bool {
        self.gaps.is_empty()
    }

    /// Índice da etapa que realmente espera uma ação.
    /// A etapa 0 é um sentinela sempre satisfeito, então nunca é a etapa acionável.
    pub fn awaiting_index(&self) -> Option<usize> {
        if self.is_draft || self.is_rejected {
            return None;
        }
        self.current_index.map(|i| i.max(1))
    }

    pub fn awaiting_stage(&self) -> Option<ApprovalStage> {
        self.awaiting_index().map(|i| CHAIN[i])
    }
}

/// Resolve o status a partir do conjunto completo de logs.
pub fn resolve(logs: &[ApprovalLogEntry]) -> ResolvedStatus {
    // Rejeição: a mais antiga é a que vale.
    let rejection = logs
        .iter()
        .filter(|log| log.approval_stage == ApprovalStage::Rejected)
        .min_by_key(|log| (log.stage_timestamp, log.id))
        .cloned();
    let is_rejected = rejection.is_some();
    let rejected_at = rejection.as_ref().map(|r| r.stage_timestamp);

    // Uma entrada por etapa (a mais antiga). Entradas posteriores à rejeição são ignoradas.
    let mut by_index: HashMap<usize, &ApprovalLogEntry> = HashMap::new();
    for log in logs {
        let Some(index) = stage_index(log.approval_stage) else {
            continue;
        };
        if rejected_at.is_some_and(|at| log.stage_timestamp > at) {
            continue;
        }
        by_index
            .entry(index)
            .and_modify(|kept| {
                if (log.stage_timestamp, log.id) < (kept.stage_timestamp, kept.id) {
                    *kept = log;
                }
            })
            .or_insert(log);
    }

    let completed_stages: Vec<CompletedStage> = CHAIN
        .iter()
        .enumerate()
        .filter_map(|(index, stage)| {
            by_index.get(&index).map(|entry| CompletedStage {
                stage: *stage,
                index,
                entry: (*entry).clone(),
            })
        })
        .collect();

    // Varredura do maior índice para baixo: confia no maior índice presente.
    let last_completed_index = (0..CHAIN.len())
        .rev()
        .find(|index| by_index.contains_key(index));

    let gaps: Vec<ApprovalStage> = match last_completed_index {
        Some(last) => (1..last)
            .filter(|index| !by_index.contains_key(index))
            .map(|index| CHAIN[index])
            .collect(),
        None => Vec::new(),
    };

    let current_index = if is_rejected {
        None
    } else {
        let next = last_completed_index.map_or(0, |last| last + 1);
        (next <= LAST_STAGE_INDEX).then_some(next)
    };

    let is_draft = logs.is_empty();

    let display_status = if is_rejected {
        DisplayStatus::Stage(ApprovalStage::Rejected)
    } else if !gaps.is_empty() {
        DisplayStatus::Inconsistent
    } else {
        by_index
            .iter()
            .max_by_key(|(index, entry)| (entry.stage_timestamp, **index))
            .map(|(_, entry)| DisplayStatus::Stage(entry.approval_stage))
            .unwrap_or(DisplayStatus::Draft)
    };

    if !gaps.is_empty() {
        let request_id = logs.first().map(|l| l.fund_request_id);
        tracing::warn!(?request_id, ?gaps, "Histórico de aprovação com etapas faltando");
    }

    ResolvedStatus {
        completed_stages,
        last_completed_index,
        is_rejected,
        rejection,
        current_index,
        display_status,
        gaps,
        is_draft,
    }
}

// =========================================================================
//  TIMELINE (visão de detalhe)
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Completed,
    Current,
    Pending,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub stage: ApprovalStage,
    pub state: StepState,
    pub role: Option<Role>,
    pub action_label: Option<String>,
    pub entry: Option<ApprovalLogEntry>,
    /// Sem linha de conexão para o próximo passo.
    pub is_last: bool,
}

pub fn steps(status: &ResolvedStatus) -> Vec<StepView> {
    let awaiting = status.awaiting_index();

    let mut steps: Vec<StepView> = CHAIN
        .iter()
        .enumerate()
        .map(|(index, stage)| {
            let entry = status.entry_for(*stage).cloned();
            let implicit_submission = index == 0 && !status.is_draft;
            let state = if entry.is_some() || implicit_submission {
                StepState::Completed
            } else if Some(index) == awaiting {
                StepState::Current
            } else {
                StepState::Pending
            };
            StepView {
                stage: *stage,
                state,
                role: role_for_stage(*stage),
                action_label: action_label(*stage).map(str::to_string),
                entry,
                is_last: !status.is_rejected && index == LAST_STAGE_INDEX,
            }
        })
        .collect();

    if let Some(rejection) = &status.rejection {
        steps.push(StepView {
            stage: ApprovalStage::Rejected,
            state: StepState::Rejected,
            role: None,
            action_label: None,
            entry: Some(rejection.clone()),
            is_last: true,
        });
    }

    steps
}
