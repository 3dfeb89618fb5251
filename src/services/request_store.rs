// src/services/request_store.rs

//! Cache em memória das solicitações, alimentado pela camada de persistência.
//!
//! Duas listas independentes (todas / pendentes do cargo) sem relação transacional.
//! Cada refresh recebe uma geração crescente; resultado de geração antiga que chega
//! depois de uma mais nova é descartado. Nenhuma mutação otimista: o estado local só
//! muda depois que a persistência confirma e o refresh traz a verdade do servidor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::{
    common::error::AppError,
    models::{
        approval::Role,
        fund_request::{ApprovalLogEntry, ApprovalLogSubmission, FundRequest, FundRequestPayload},
    },
    services::{
        fund_request_service::{summarize, FundRequestDetail, FundRequestSummary},
        status_resolver,
        transition_authority::{self, ApprovalAction, TransitionError},
    },
};

/// As quatro operações da camada de persistência.
#[async_trait]
pub trait FundRequestSource: Send + Sync {
    async fn list_all(&self) -> Result<Vec<FundRequest>, AppError>;
    async fn list_pending_for_role(&self, role: Role) -> Result<Vec<FundRequest>, AppError>;
    async fn append_approval_log(&self, entry: ApprovalLogSubmission) -> Result<ApprovalLogEntry, AppError>;
    async fn create_or_update(&self, payload: FundRequestPayload) -> Result<FundRequest, AppError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("falha ao buscar as solicitações: {0}")]
    Fetch(#[source] AppError),

    #[error("falha ao registrar a ação: {0}")]
    ActionSubmission(#[source] AppError),

    #[error("ação indisponível: {0}")]
    Transition(#[from] TransitionError),

    #[error("formulário inválido")]
    Validation(#[from] ValidationErrors),

    #[error("falha ao salvar a solicitação: {0}")]
    Save(#[source] AppError),

    #[error("solicitação {0} não está carregada")]
    UnknownRequest(i64),
}

#[derive(Debug, Default)]
struct Snapshot {
    requests: Vec<FundRequest>,
    pending: Vec<FundRequest>,
    requests_generation: u64,
    pending_generation: u64,
    // Banner de erro, um por lista: o sucesso de uma não apaga a falha da outra
    requests_error: Option<String>,
    pending_error: Option<String>,
}

enum List {
    All,
    Pending,
}

pub struct RequestStore<S> {
    source: S,
    role: Role,
    generation: AtomicU64,
    state: Mutex<Snapshot>,
}

impl<S: FundRequestSource> RequestStore<S> {
    pub fn new(source: S, role: Role) -> Self {
        Self {
            source,
            role,
            generation: AtomicU64::new(0),
            state: Mutex::new(Snapshot::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, Snapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn requests(&self) -> Vec<FundRequest> {
        self.state().requests.clone()
    }

    pub fn pending(&self) -> Vec<FundRequest> {
        self.state().pending.clone()
    }

    pub fn fetch_error(&self) -> Option<String> {
        let state = self.state();
        state.requests_error.clone().or_else(|| state.pending_error.clone())
    }

    pub fn find(&self, id: i64) -> Option<FundRequest> {
        self.state().requests.iter().find(|r| r.id == id).cloned()
    }

    pub fn summaries(&self) -> Vec<FundRequestSummary> {
        self.requests().into_iter().map(summarize).collect()
    }

    pub fn detail(&self, id: i64) -> Option<FundRequestDetail> {
        self.find(id).map(|r| FundRequestDetail::build(r, Some(self.role)))
    }

    /// Busca as duas listas. O erro de uma não impede a outra de ser aplicada.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (all, pending) = tokio::join!(
            self.source.list_all(),
            self.source.list_pending_for_role(self.role),
        );

        let all = self.apply(List::All, generation, all);
        let pending = self.apply(List::Pending, generation, pending);
        all.and(pending)
    }

    fn apply(
        &self,
        list: List,
        generation: u64,
        result: Result<Vec<FundRequest>, AppError>,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let applied = match list {
            List::All => state.requests_generation,
            List::Pending => state.pending_generation,
        };

        if generation < applied {
            tracing::debug!(generation, applied, "Resposta antiga descartada");
            return Ok(());
        }

        match result {
            Ok(requests) => {
                match list {
                    List::All => {
                        state.requests = requests;
                        state.requests_generation = generation;
                        state.requests_error = None;
                    }
                    List::Pending => {
                        state.pending = requests;
                        state.pending_generation = generation;
                        state.pending_error = None;
                    }
                }
                Ok(())
            }
            Err(e) => {
                // Mantém os dados anteriores; o usuário tenta de novo manualmente.
                tracing::error!(error = %e, "Falha ao buscar solicitações");
                let message = Some(e.to_string());
                match list {
                    List::All => state.requests_error = message,
                    List::Pending => state.pending_error = message,
                }
                Err(StoreError::Fetch(e))
            }
        }
    }

    /// Aprovar/rejeitar. A ação só é montada se o cargo estiver na vez;
    /// depois de confirmada, as duas listas são buscadas de novo.
    pub async fn submit_action(
        &self,
        action: ApprovalAction,
        request_id: i64,
        notes: Option<&str>,
    ) -> Result<ApprovalLogEntry, StoreError> {
        let request = self.find(request_id).ok_or(StoreError::UnknownRequest(request_id))?;
        let status = status_resolver::resolve(&request.approval_logs);
        let draft = transition_authority::submit_action(action, self.role, request_id, &status, notes)?;

        match self.source.append_approval_log(draft).await {
            Ok(entry) => {
                tracing::info!(request_id, stage = %entry.approval_stage, "Ação registrada");
                if let Err(e) = self.refresh().await {
                    tracing::warn!(error = %e, "Ação registrada, mas o refresh falhou");
                }
                Ok(entry)
            }
            Err(e) => {
                // Provável corrida perdida: busca o estado verdadeiro e reporta a falha.
                tracing::warn!(request_id, error = %e, "Falha ao registrar a ação");
                if let Err(refresh_err) = self.refresh().await {
                    tracing::warn!(error = %refresh_err, "Refresh após falha também falhou");
                }
                Err(StoreError::ActionSubmission(e))
            }
        }
    }

    /// Salva o formulário. Validação é local: payload inválido nunca vai para a persistência.
    pub async fn save(&self, payload: FundRequestPayload) -> Result<FundRequest, StoreError> {
        payload.validate()?;

        let saved = self
            .source
            .create_or_update(payload)
            .await
            .map_err(StoreError::Save)?;

        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Solicitação salva, mas o refresh falhou");
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        approval::{ApprovalStage, CHAIN},
        fund_request::{FundRequestItemPayload, NOTES_PLACEHOLDER},
    };
    use crate::services::fund_request_service::pending_for_role;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio::sync::Notify;

    /// Persistência falsa em memória. Carimba timestamp e autor como o servidor faria.
    #[derive(Default)]
    struct FakeSource {
        data: Mutex<Vec<FundRequest>>,
        fail_lists: AtomicBool,
        fail_list_all: AtomicBool,
        fail_append: AtomicBool,
        list_calls: AtomicUsize,
        saves: AtomicUsize,
        // Segura a primeira listagem até a segunda terminar
        gate: Option<Notify>,
        stale_snapshot: Mutex<Vec<FundRequest>>,
    }

    impl FakeSource {
        fn with(requests: Vec<FundRequest>) -> Self {
            Self { data: Mutex::new(requests), ..Default::default() }
        }

        fn snapshot(&self) -> Vec<FundRequest> {
            self.data.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FundRequestSource for FakeSource {
        async fn list_all(&self) -> Result<Vec<FundRequest>, AppError> {
            let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_lists.load(Ordering::SeqCst) || self.fail_list_all.load(Ordering::SeqCst) {
                return Err(AppError::InternalServerError(anyhow::anyhow!("offline")));
            }
            if let Some(gate) = &self.gate {
                if call == 0 {
                    gate.notified().await;
                    return Ok(self.stale_snapshot.lock().unwrap().clone());
                }
                gate.notify_one();
            }
            Ok(self.snapshot())
        }

        async fn list_pending_for_role(&self, role: Role) -> Result<Vec<FundRequest>, AppError> {
            if self.fail_lists.load(Ordering::SeqCst) {
                return Err(AppError::InternalServerError(anyhow::anyhow!("offline")));
            }
            Ok(pending_for_role(self.snapshot(), role))
        }

        async fn append_approval_log(&self, entry: ApprovalLogSubmission) -> Result<ApprovalLogEntry, AppError> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(AppError::StageAlreadyRecorded(entry.approval_stage));
            }
            let mut data = self.data.lock().unwrap();
            let request = data
                .iter_mut()
                .find(|r| r.id == entry.fund_request_id)
                .ok_or_else(|| AppError::ResourceNotFound("Fund request".into()))?;
            let log = ApprovalLogEntry {
                id: request.approval_logs.len() as i64 + 1000,
                fund_request_id: request.id,
                approval_stage: entry.approval_stage,
                // sempre depois dos logs de teste
                stage_timestamp: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
                notes: Some(entry.notes),
                created_by: Some("manager.ops@company.com".into()),
            };
            request.approval_logs.push(log.clone());
            Ok(log)
        }

        async fn create_or_update(&self, payload: FundRequestPayload) -> Result<FundRequest, AppError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            let mut data = self.data.lock().unwrap();
            let request = FundRequest {
                id: data.len() as i64 + 1,
                code: payload.code.clone(),
                date: payload.date.unwrap_or_default(),
                total_amount: payload.total_amount().unwrap_or_default(),
                total_amount_in_words: payload.total_amount_in_words.clone(),
                items: vec![],
                approval_logs: vec![],
                created_at: None,
                updated_at: None,
            };
            data.push(request.clone());
            Ok(request)
        }
    }

    fn request(id: i64, stages: &[ApprovalStage]) -> FundRequest {
        let t0 = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();
        FundRequest {
            id,
            code: format!("FR-{id}"),
            date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            total_amount: 100,
            total_amount_in_words: "one hundred".into(),
            items: vec![],
            approval_logs: stages
                .iter()
                .enumerate()
                .map(|(i, stage)| ApprovalLogEntry {
                    id: id * 10 + i as i64,
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

    #[tokio::test]
    async fn refresh_loads_both_lists() {
        let source = FakeSource::with(vec![request(1, &CHAIN[..2]), request(2, &CHAIN[..1])]);
        let store = RequestStore::new(source, Role::ManagerOps);

        store.refresh().await.unwrap();

        assert_eq!(store.requests().len(), 2);
        assert_eq!(store.pending().iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
        assert!(store.fetch_error().is_none());
    }

    #[tokio::test]
    async fn approve_round_trip_shows_server_stamped_entry() {
        let source = FakeSource::with(vec![request(1, &CHAIN[..2])]);
        let store = RequestStore::new(source, Role::ManagerOps);
        store.refresh().await.unwrap();

        let entry = store
            .submit_action(ApprovalAction::Approve, 1, Some("ok"))
            .await
            .unwrap();
        assert_eq!(entry.approval_stage, ApprovalStage::ApprovedByManagerOps);

        let status = status_resolver::resolve(&store.find(1).unwrap().approval_logs);
        let recorded = status.entry_for(ApprovalStage::ApprovedByManagerOps).unwrap();
        assert_eq!(recorded.notes.as_deref(), Some("ok"));
        assert!(recorded.created_by.is_some());
        // a lista de pendentes também foi buscada de novo
        assert!(store.pending().is_empty());
    }

    #[tokio::test]
    async fn reject_records_terminal_stage_with_placeholder_notes() {
        let source = FakeSource::with(vec![request(1, &CHAIN[..2])]);
        let store = RequestStore::new(source, Role::ManagerOps);
        store.refresh().await.unwrap();

        let entry = store.submit_action(ApprovalAction::Reject, 1, Some("")).await.unwrap();
        assert_eq!(entry.approval_stage, ApprovalStage::Rejected);
        assert_eq!(entry.notes.as_deref(), Some(NOTES_PLACEHOLDER));

        let detail = store.detail(1).unwrap();
        assert!(detail.status.is_rejected);
        assert!(detail.available_actions.is_none());
    }

    #[tokio::test]
    async fn failed_append_leaves_local_state_untouched() {
        let source = FakeSource::with(vec![request(1, &CHAIN[..2])]);
        source.fail_append.store(true, Ordering::SeqCst);
        let store = RequestStore::new(source, Role::ManagerOps);
        store.refresh().await.unwrap();
        let before = store.requests();

        let result = store.submit_action(ApprovalAction::Approve, 1, None).await;

        assert!(matches!(result, Err(StoreError::ActionSubmission(_))));
        assert_eq!(store.requests(), before);
    }

    #[tokio::test]
    async fn out_of_turn_action_never_reaches_the_source() {
        let source = FakeSource::with(vec![request(1, &CHAIN[..2])]);
        let store = RequestStore::new(source, Role::Director);
        store.refresh().await.unwrap();

        let result = store.submit_action(ApprovalAction::Approve, 1, None).await;
        assert!(matches!(result, Err(StoreError::Transition(TransitionError::OutOfTurn { .. }))));
        assert_eq!(store.find(1).unwrap().approval_logs.len(), 2);
    }

    #[tokio::test]
    async fn unknown_request_is_reported() {
        let store = RequestStore::new(FakeSource::default(), Role::Staff);
        let result = store.submit_action(ApprovalAction::Approve, 77, None).await;
        assert!(matches!(result, Err(StoreError::UnknownRequest(77))));
    }

    #[tokio::test]
    async fn fetch_failure_sets_banner_and_keeps_previous_data() {
        let source = FakeSource::with(vec![request(1, &CHAIN[..1])]);
        let store = RequestStore::new(source, Role::Staff);
        store.refresh().await.unwrap();

        store.source.fail_lists.store(true, Ordering::SeqCst);
        let result = store.refresh().await;

        assert!(matches!(result, Err(StoreError::Fetch(_))));
        assert!(store.fetch_error().is_some());
        assert_eq!(store.requests().len(), 1);

        store.source.fail_lists.store(false, Ordering::SeqCst);
        store.refresh().await.unwrap();
        assert!(store.fetch_error().is_none());
    }

    #[tokio::test]
    async fn banner_survives_when_only_the_full_list_fails() {
        let source = FakeSource::with(vec![request(1, &CHAIN[..1])]);
        source.fail_list_all.store(true, Ordering::SeqCst);
        let store = RequestStore::new(source, Role::Staff);

        let result = store.refresh().await;

        assert!(matches!(result, Err(StoreError::Fetch(_))));
        assert!(store.fetch_error().is_some());
        assert!(store.requests().is_empty());
        assert_eq!(store.pending().len(), 1);

        store.source.fail_list_all.store(false, Ordering::SeqCst);
        store.refresh().await.unwrap();
        assert!(store.fetch_error().is_none());
        assert_eq!(store.requests().len(), 1);
    }

    #[tokio::test]
    async fn stale_fetch_does_not_overwrite_newer_one() {
        let source = FakeSource {
            data: Mutex::new(vec![request(1, &CHAIN[..3])]),
            stale_snapshot: Mutex::new(vec![request(1, &CHAIN[..1])]),
            gate: Some(Notify::new()),
            ..Default::default()
        };
        let store = RequestStore::new(source, Role::Finance);

        let (first, second) = tokio::join!(store.refresh(), store.refresh());
        first.unwrap();
        second.unwrap();

        let logs = store.find(1).unwrap().approval_logs;
        assert_eq!(logs.len(), 3);
    }

    #[tokio::test]
    async fn invalid_form_is_never_sent() {
        let store = RequestStore::new(FakeSource::default(), Role::AdminOps);
        let payload = FundRequestPayload {
            id: None,
            code: "FR-9".into(),
            date: None,
            total_amount_in_words: String::new(),
            items: vec![FundRequestItemPayload {
                finance_item_id: None,
                description: None,
                amount: 0,
                bank_account_number: String::new(),
            }],
        };

        let result = store.save(payload).await;

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.source.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_form_is_saved_and_list_refreshed() {
        let store = RequestStore::new(FakeSource::default(), Role::AdminOps);
        let payload = FundRequestPayload {
            id: None,
            code: "FR-1".into(),
            date: NaiveDate::from_ymd_opt(2026, 4, 10),
            total_amount_in_words: "three hundred".into(),
            items: vec![
                FundRequestItemPayload {
                    finance_item_id: Some(1),
                    description: Some("fuel".into()),
                    amount: 100,
                    bank_account_number: "001".into(),
                },
                FundRequestItemPayload {
                    finance_item_id: Some(2),
                    description: None,
                    amount: 200,
                    bank_account_number: "002".into(),
                },
            ],
        };

        let saved = store.save(payload).await.unwrap();

        assert_eq!(saved.total_amount, 300);
        assert_eq!(store.requests().len(), 1);
        assert_eq!(store.summaries()[0].display_status, "DRAFT");
    }
}
