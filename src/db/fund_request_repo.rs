// src/db/fund_request_repo.rs

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, FromRow, Postgres};

use crate::{
    common::error::{map_constraint_error, AppError},
    models::fund_request::{
        ApprovalLogEntry, ApprovalLogSubmission, FinanceItem, FundRequest, FundRequestItem,
        FundRequestItemPayload,
    },
};

const HEADER_COLUMNS: &str =
    "id, code, date, total_amount, total_amount_in_words, created_at, updated_at";

const LOG_COLUMNS: &str =
    "id, fund_request_id, approval_stage, stage_timestamp, notes, created_by";

// --- Linhas cruas (a montagem do agregado é feita em `assemble`) ---

#[derive(Debug, Clone, FromRow)]
pub struct FundRequestRow {
    pub id: i64,
    pub code: String,
    pub date: NaiveDate,
    pub total_amount: i64,
    pub total_amount_in_words: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FundRequestItemRow {
    pub id: i64,
    pub fund_request_id: i64,
    pub finance_item_id: i64,
    pub finance_item_name: String,
    pub description: Option<String>,
    pub amount: i64,
    pub bank_account_number: String,
}

/// Junta cabeçalhos, itens e logs nos agregados. Mantém a ordem dos cabeçalhos
/// e a ordem dos itens como vieram (o SQL já ordena por posição).
pub fn assemble(
    headers: Vec<FundRequestRow>,
    items: Vec<FundRequestItemRow>,
    logs: Vec<ApprovalLogEntry>,
) -> Vec<FundRequest> {
    let mut items_by_request: HashMap<i64, Vec<FundRequestItem>> = HashMap::new();
    for row in items {
        items_by_request
            .entry(row.fund_request_id)
            .or_default()
            .push(FundRequestItem {
                id: row.id,
                finance_item: FinanceItem {
                    id: row.finance_item_id,
                    name: row.finance_item_name,
                },
                description: row.description,
                amount: row.amount,
                bank_account_number: row.bank_account_number,
            });
    }

    let mut logs_by_request: HashMap<i64, Vec<ApprovalLogEntry>> = HashMap::new();
    for log in logs {
        logs_by_request.entry(log.fund_request_id).or_default().push(log);
    }

    headers
        .into_iter()
        .map(|h| FundRequest {
            items: items_by_request.remove(&h.id).unwrap_or_default(),
            approval_logs: logs_by_request.remove(&h.id).unwrap_or_default(),
            id: h.id,
            code: h.code,
            date: h.date,
            total_amount: h.total_amount,
            total_amount_in_words: h.total_amount_in_words,
            created_at: h.created_at,
            updated_at: h.updated_at,
        })
        .collect()
}

#[derive(Clone, Default)]
pub struct FundRequestRepository;

impl FundRequestRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn list_headers<'e, E>(&self, executor: E) -> Result<Vec<FundRequestRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, FundRequestRow>(&format!(
            "SELECT {HEADER_COLUMNS} FROM fund_requests ORDER BY date DESC, id DESC"
        ))
            .fetch_all(executor)
            .await?;

        Ok(rows)
    }

    pub async fn find_header<'e, E>(
        &self,
        executor: E,
        id: i64,
    ) -> Result<Option<FundRequestRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, FundRequestRow>(&format!(
            "SELECT {HEADER_COLUMNS} FROM fund_requests WHERE id = $1"
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(row)
    }

    /// Trava a linha da solicitação até o fim da transação (serializa aprovações concorrentes).
    pub async fn lock_header<'e, E>(
        &self,
        executor: E,
        id: i64,
    ) -> Result<Option<FundRequestRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, FundRequestRow>(&format!(
            "SELECT {HEADER_COLUMNS} FROM fund_requests WHERE id = $1 FOR UPDATE"
        ))
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(row)
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        request_ids: &[i64],
    ) -> Result<Vec<FundRequestItemRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, FundRequestItemRow>(
            r#"
            SELECT
                i.id, i.fund_request_id,
                i.finance_item_id, f.name AS finance_item_name,
                i.description, i.amount, i.bank_account_number
            FROM fund_request_items i
            JOIN finance_items f ON f.id = i.finance_item_id
            WHERE i.fund_request_id = ANY($1)
            ORDER BY i.fund_request_id, i.position, i.id
            "#,
        )
            .bind(request_ids)
            .fetch_all(executor)
            .await?;

        Ok(rows)
    }

    pub async fn list_logs<'e, E>(
        &self,
        executor: E,
        request_ids: &[i64],
    ) -> Result<Vec<ApprovalLogEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let logs = sqlx::query_as::<_, ApprovalLogEntry>(&format!(
            "SELECT {LOG_COLUMNS} FROM approval_logs WHERE fund_request_id = ANY($1)"
        ))
            .bind(request_ids)
            .fetch_all(executor)
            .await?;

        Ok(logs)
    }

    // =========================================================================
    //  ESCRITA (sempre dentro de uma transação aberta pelo service)
    // =========================================================================

    pub async fn insert_header<'e, E>(
        &self,
        executor: E,
        code: &str,
        date: NaiveDate,
        total_amount: i64,
        total_amount_in_words: &str,
    ) -> Result<FundRequestRow, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, FundRequestRow>(&format!(
            r#"
            INSERT INTO fund_requests (code, date, total_amount, total_amount_in_words)
            VALUES ($1, $2, $3, $4)
            RETURNING {HEADER_COLUMNS}
            "#
        ))
            .bind(code)
            .bind(date)
            .bind(total_amount)
            .bind(total_amount_in_words)
            .fetch_one(executor)
            .await
            .map_err(|e| map_constraint_error(e, "Já existe uma solicitação com esse código."))?;

        Ok(row)
    }

    pub async fn update_header<'e, E>(
        &self,
        executor: E,
        id: i64,
        code: &str,
        date: NaiveDate,
        total_amount: i64,
        total_amount_in_words: &str,
    ) -> Result<Option<FundRequestRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, FundRequestRow>(&format!(
            r#"
            UPDATE fund_requests
            SET code = $2, date = $3, total_amount = $4, total_amount_in_words = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {HEADER_COLUMNS}
            "#
        ))
            .bind(id)
            .bind(code)
            .bind(date)
            .bind(total_amount)
            .bind(total_amount_in_words)
            .fetch_optional(executor)
            .await
            .map_err(|e| map_constraint_error(e, "Já existe uma solicitação com esse código."))?;

        Ok(row)
    }

    pub async fn delete_items<'e, E>(&self, executor: E, fund_request_id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM fund_request_items WHERE fund_request_id = $1")
            .bind(fund_request_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        fund_request_id: i64,
        position: i32,
        item: &FundRequestItemPayload,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO fund_request_items (
                fund_request_id, position, finance_item_id,
                description, amount, bank_account_number
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
            .bind(fund_request_id)
            .bind(position)
            .bind(item.finance_item_id)
            .bind(item.description.as_deref())
            .bind(item.amount)
            .bind(&item.bank_account_number)
            .execute(executor)
            .await
            .map_err(|e| map_constraint_error(e, "Item duplicado."))?;

        Ok(())
    }

    /// Grava o log. O timestamp é sempre do servidor (NOW()), nunca do cliente.
    pub async fn insert_log<'e, E>(
        &self,
        executor: E,
        submission: &ApprovalLogSubmission,
        created_by: &str,
    ) -> Result<ApprovalLogEntry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let log = sqlx::query_as::<_, ApprovalLogEntry>(&format!(
            r#"
            INSERT INTO approval_logs (fund_request_id, approval_stage, stage_timestamp, notes, created_by)
            VALUES ($1, $2, NOW(), $3, $4)
            RETURNING {LOG_COLUMNS}
            "#
        ))
            .bind(submission.fund_request_id)
            .bind(submission.approval_stage)
            .bind(&submission.notes)
            .bind(created_by)
            .fetch_one(executor)
            .await
            .map_err(|e| {
                // Índice único (fund_request_id, approval_stage): no máximo um registro por etapa
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_unique_violation() {
                        return AppError::StageAlreadyRecorded(submission.approval_stage);
                    }
                }
                e.into()
            })?;

        Ok(log)
    }

    // =========================================================================
    //  ITENS FINANCEIROS (lookup)
    // =========================================================================

    pub async fn list_finance_items<'e, E>(&self, executor: E) -> Result<Vec<FinanceItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, FinanceItem>(
            "SELECT id, name FROM finance_items ORDER BY name ASC",
        )
            .fetch_all(executor)
            .await?;

        Ok(items)
    }

    pub async fn create_finance_item<'e, E>(&self, executor: E, name: &str) -> Result<FinanceItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, FinanceItem>(
            "INSERT INTO finance_items (name) VALUES ($1) RETURNING id, name",
        )
            .bind(name)
            .fetch_one(executor)
            .await
            .map_err(|e| map_constraint_error(e, "Já existe um item financeiro com esse nome."))?;

        Ok(item)
    }
}
