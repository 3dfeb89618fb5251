// src/services/fund_request_service.rs

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::{fund_request_repo::assemble, FundRequestRepository},
    models::{
        approval::{ApprovalStage, Role},
        fund_request::{
            ApprovalLogEntry, ApprovalLogSubmission, FinanceItem, FundRequest, FundRequestPayload,
        },
    },
    services::{
        status_resolver::{self, ResolvedStatus, StepView},
        transition_authority::{self, AvailableActions},
    },
};

/// Quem está agindo (vem da sessão, passado explicitamente).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub name: String,
    pub role: Role,
}

/// Linha da listagem: o agregado + o rótulo derivado.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FundRequestSummary {
    #[serde(flatten)]
    pub request: FundRequest,
    #[schema(example = "APPROVED_BY_MANAGER_OPS")]
    pub display_status: String,
}

/// Visão de detalhe: timeline + ações disponíveis para o cargo de quem pergunta.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FundRequestDetail {
    pub request: FundRequest,
    pub status: ResolvedStatus,
    pub steps: Vec<StepView>,
    pub available_actions: Option<AvailableActions>,
}

impl FundRequestDetail {
    pub fn build(request: FundRequest, role: Option<Role>) -> Self {
        let status = status_resolver::resolve(&request.approval_logs);
        let steps = status_resolver::steps(&status);
        let available_actions = role.and_then(|r| transition_authority::available_actions(r, &status));
        Self { request, status, steps, available_actions }
    }
}

#[derive(Clone)]
pub struct FundRequestService {
    repo: FundRequestRepository,
    pool: PgPool,
}

impl FundRequestService {
    pub fn new(repo: FundRequestRepository, pool: PgPool) -> Self {
        Self { repo, pool }
    }

    // Carrega cabeçalhos + filhos numa única conexão
    async fn load(&self, conn: &mut PgConnection, only: Option<i64>) -> Result<Vec<FundRequest>, AppError> {
        let headers: Vec<_> = match only {
            Some(id) => self.repo.find_header(&mut *conn, id).await?.into_iter().collect(),
            None => self.repo.list_headers(&mut *conn).await?,
        };
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = headers.iter().map(|h| h.id).collect();
        let items = self.repo.list_items(&mut *conn, &ids).await?;
        let logs = self.repo.list_logs(&mut *conn, &ids).await?;

        Ok(assemble(headers, items, logs))
    }

    // --- LEITURA ---

    pub async fn list_all(&self) -> Result<Vec<FundRequest>, AppError> {
        let mut conn = self.pool.acquire().await?;
        self.load(&mut *conn, None).await
    }

    /// Filtro do lado do servidor: só o que espera a ação deste cargo.
    pub async fn list_pending_for_role(&self, role: Role) -> Result<Vec<FundRequest>, AppError> {
        let all = self.list_all().await?;
        Ok(pending_for_role(all, role))
    }

    pub async fn get(&self, id: i64) -> Result<FundRequest, AppError> {
        let mut conn = self.pool.acquire().await?;
        self.load(&mut *conn, Some(id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ResourceNotFound(format!("Fund request {}", id)))
    }

    // --- ESCRITA ---

    /// Cria (sem id) ou edita (com id). O total é recalculado dos itens.
    /// Na criação, a etapa 0 é registrada em nome de quem criou.
    pub async fn create_or_update(
        &self,
        payload: &FundRequestPayload,
        actor: &Actor,
    ) -> Result<FundRequest, AppError> {
        payload.validate()?;
        let date = payload
            .date
            .ok_or_else(|| anyhow::anyhow!("payload sem data chegou ao service"))?;
        let total = payload
            .total_amount()
            .ok_or_else(|| anyhow::anyhow!("total estourou após a validação"))?;

        let mut tx = self.pool.begin().await?;

        let header = match payload.id {
            Some(id) => self.repo
                .update_header(&mut *tx, id, &payload.code, date, total, &payload.total_amount_in_words)
                .await?
                .ok_or_else(|| AppError::ResourceNotFound(format!("Fund request {}", id)))?,
            None => self.repo
                .insert_header(&mut *tx, &payload.code, date, total, &payload.total_amount_in_words)
                .await?,
        };

        if payload.id.is_some() {
            self.repo.delete_items(&mut *tx, header.id).await?;
        }
        for (position, item) in payload.items.iter().enumerate() {
            self.repo
                .insert_item(&mut *tx, header.id, position as i32, item)
                .await?;
        }

        if payload.id.is_none() {
            let submission = ApprovalLogSubmission {
                approval_stage: ApprovalStage::SubmittedByAdminOps,
                stage_timestamp: None,
                notes: transition_authority::normalize_notes(None)?,
                fund_request_id: header.id,
            };
            self.repo.insert_log(&mut *tx, &submission, &actor.name).await?;
        }

        let saved = self.load(&mut *tx, Some(header.id)).await?;
        tx.commit().await?;

        tracing::info!(
            id = header.id,
            code = %header.code,
            total,
            actor = %actor.name,
            created = payload.id.is_none(),
            "Solicitação de fundos salva"
        );

        saved
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ResourceNotFound(format!("Fund request {}", header.id)))
    }

    /// Anexa um log de aprovação. A vez do cargo é revalidada com a linha travada,
    /// e o índice único garante no máximo um registro por etapa.
    pub async fn append_approval_log(
        &self,
        submission: &ApprovalLogSubmission,
        actor: &Actor,
    ) -> Result<ApprovalLogEntry, AppError> {
        let notes = transition_authority::normalize_notes(Some(&submission.notes))?;

        let mut tx = self.pool.begin().await?;

        self.repo
            .lock_header(&mut *tx, submission.fund_request_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Fund request {}", submission.fund_request_id)))?;

        let logs = self.repo.list_logs(&mut *tx, &[submission.fund_request_id]).await?;
        let status = status_resolver::resolve(&logs);

        if let Err(reason) =
            transition_authority::authorize_submission(actor.role, &status, submission.approval_stage)
        {
            tracing::warn!(
                id = submission.fund_request_id,
                actor = %actor.name,
                role = %actor.role,
                stage = %submission.approval_stage,
                %reason,
                "Transição recusada"
            );
            return Err(reason.into());
        }

        // Carimbo do servidor: o timestamp enviado pelo cliente é ignorado
        let normalized = ApprovalLogSubmission {
            stage_timestamp: None,
            notes,
            ..submission.clone()
        };
        let entry = self.repo.insert_log(&mut *tx, &normalized, &actor.name).await?;

        tx.commit().await?;

        tracing::info!(
            id = entry.fund_request_id,
            stage = %entry.approval_stage,
            actor = %actor.name,
            "Etapa registrada"
        );

        Ok(entry)
    }

    // --- LOOKUP ---

    pub async fn list_finance_items(&self) -> Result<Vec<FinanceItem>, AppError> {
        self.repo.list_finance_items(&self.pool).await
    }

    pub async fn create_finance_item(&self, name: &str) -> Result<FinanceItem, AppError> {
        self.repo.create_finance_item(&self.pool, name.trim()).await
    }
}

pub fn summarize(request: FundRequest) -> FundRequestSummary {
    let display_status = status_resolver::resolve(&request.approval_logs)
        .display_status
        .label()
        .to_string();
    FundRequestSummary { request, display_status }
}

pub fn pending_for_role(requests: Vec<FundRequest>, role: Role) -> Vec<FundRequest> {
    requests
        .into_iter()
        .filter(|r| {
            let status = status_resolver::resolve(&r.approval_logs);
            transition_authority::available_actions(role, &status).is_some()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::approval::CHAIN;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn request(id: i64, stages: &[ApprovalStage]) -> FundRequest {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, 0).unwrap();
        FundRequest {
            id,
            code: format!("FR-{id}"),
            date: NaiveDate::from_ymd_opt(2026, 2, 3).unwrap(),
            total_amount: 0,
            total_amount_in_words: String::new(),
            items: vec![],
            approval_logs: stages
                .iter()
                .enumerate()
                .map(|(i, stage)| ApprovalLogEntry {
                    id: id * 100 + i as i64,
                    fund_request_id: id,
                    approval_stage: *stage,
                    stage_timestamp: t0 + Duration::minutes(i as i64),
                    notes: None,
                    created_by: None,
                })
                .collect(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn pending_list_only_holds_requests_awaiting_the_role() {
        let all = vec![
            request(1, &CHAIN[..1]),
            request(2, &CHAIN[..3]),
            request(3, &[CHAIN[0], CHAIN[1], CHAIN[2], ApprovalStage::Rejected]),
            request(4, &CHAIN[..3]),
            request(5, &[]),
        ];
        let ids = |role| pending_for_role(all.clone(), role).iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids(Role::Staff), vec![1]);
        assert_eq!(ids(Role::Finance), vec![2, 4]);
        assert!(ids(Role::Director).is_empty());
        assert!(ids(Role::AdminOps).is_empty());
    }

    #[test]
    fn summary_carries_display_label() {
        assert_eq!(summarize(request(1, &[])).display_status, "DRAFT");
        assert_eq!(summarize(request(2, &CHAIN[..2])).display_status, "ACKNOWLEDGED_BY_STAFF_OPS");
    }

    #[test]
    fn detail_exposes_actions_for_the_asking_role() {
        let detail = FundRequestDetail::build(request(1, &CHAIN[..2]), Some(Role::ManagerOps));
        assert_eq!(
            detail.available_actions.map(|a| a.approve_stage),
            Some(ApprovalStage::ApprovedByManagerOps)
        );
        let detail = FundRequestDetail::build(request(1, &CHAIN[..2]), None);
        assert!(detail.available_actions.is_none());
        assert_eq!(detail.steps.len(), 6);
    }
}
