// src/models/fund_request.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::models::approval::ApprovalStage;

/// Placeholder gravado quando a nota vem vazia.
pub const NOTES_PLACEHOLDER: &str = "N/A";
/// Nome exibido quando o log não tem autor.
pub const SYSTEM_ACTOR: &str = "System";

// --- Structs ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinanceItem {
    #[schema(example = 3)]
    pub id: i64,

    #[schema(example = "Operational Transport")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FundRequestItem {
    pub id: i64,
    pub finance_item: FinanceItem,

    #[schema(example = "Fuel for site visit")]
    pub description: Option<String>,

    #[schema(example = 250000)]
    pub amount: i64,

    #[schema(example = "0123456789")]
    pub bank_account_number: String,
}

/// Registro imutável de uma transição. Nunca é alterado depois de criado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalLogEntry {
    pub id: i64,
    pub fund_request_id: i64,
    pub approval_stage: ApprovalStage,
    pub stage_timestamp: DateTime<Utc>,

    #[schema(example = "ok")]
    pub notes: Option<String>,

    #[schema(example = "finance@company.com")]
    pub created_by: Option<String>,
}

impl ApprovalLogEntry {
    pub fn notes_or_placeholder(&self) -> &str {
        match self.notes.as_deref() {
            Some(n) if !n.trim().is_empty() => n,
            _ => NOTES_PLACEHOLDER,
        }
    }

    pub fn actor_or_system(&self) -> &str {
        self.created_by.as_deref().unwrap_or(SYSTEM_ACTOR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FundRequest {
    pub id: i64,

    #[schema(example = "FR-2026-0042")]
    pub code: String,

    #[schema(value_type = String, format = Date, example = "2026-10-20")]
    pub date: NaiveDate,

    #[schema(example = 750000)]
    pub total_amount: i64,

    #[schema(example = "seven hundred fifty thousand")]
    pub total_amount_in_words: String,

    pub items: Vec<FundRequestItem>,
    pub approval_logs: Vec<ApprovalLogEntry>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// O total é sempre derivado dos itens; nunca editado diretamente.
/// `None` quando a soma estoura `i64`.
pub fn total_amount<'a, I>(amounts: I) -> Option<i64>
where
    I: IntoIterator<Item = &'a i64>,
{
    amounts.into_iter().try_fold(0_i64, |acc, amount| acc.checked_add(*amount))
}

// ---
// Validação Customizada: a soma dos itens precisa caber no total
// ---
fn validate_total(payload: &FundRequestPayload) -> Result<(), ValidationError> {
    if payload.total_amount().is_none() {
        let mut err = ValidationError::new("total_overflow");
        err.message = Some("A soma dos itens excede o valor máximo permitido.".into());
        return Err(err);
    }
    Ok(())
}

// --- Payloads ---

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FundRequestItemPayload {
    #[validate(required(message = "Selecione o item financeiro."))]
    #[schema(example = 3)]
    pub finance_item_id: Option<i64>,

    #[validate(length(max = 500, message = "A descrição deve ter no máximo 500 caracteres."))]
    pub description: Option<String>,

    #[validate(range(min = 1, message = "O valor deve ser maior que zero."))]
    #[schema(example = 250000)]
    pub amount: i64,

    #[validate(length(min = 1, message = "A conta bancária é obrigatória."))]
    #[schema(example = "0123456789")]
    pub bank_account_number: String,
}

/// Payload de criação/edição (`createOrUpdate`). O total não é aceito do cliente.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_total"))]
pub struct FundRequestPayload {
    #[serde(default)]
    pub id: Option<i64>,

    #[validate(length(min = 1, max = 64, message = "O código é obrigatório."))]
    #[schema(example = "FR-2026-0042")]
    pub code: String,

    #[validate(required(message = "A data é obrigatória."))]
    #[schema(value_type = Option<String>, format = Date, example = "2026-10-20")]
    pub date: Option<NaiveDate>,

    #[serde(default)]
    #[schema(example = "seven hundred fifty thousand")]
    pub total_amount_in_words: String,

    #[validate(length(min = 1, message = "Inclua pelo menos um item."), nested)]
    pub items: Vec<FundRequestItemPayload>,
}

impl FundRequestPayload {
    pub fn total_amount(&self) -> Option<i64> {
        total_amount(self.items.iter().map(|item| &item.amount))
    }
}

/// Submissão de log: o timestamp vai sempre nulo, quem preenche é o servidor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalLogSubmission {
    pub approval_stage: ApprovalStage,

    #[serde(default)]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub stage_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    #[validate(length(max = 500, message = "A nota deve ter no máximo 500 caracteres."))]
    #[schema(example = "ok")]
    pub notes: String,

    #[schema(example = 42)]
    pub fund_request_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFinanceItemPayload {
    #[validate(length(min = 1, max = 120, message = "O nome é obrigatório."))]
    #[schema(example = "Operational Transport")]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(amount: i64) -> FundRequestItemPayload {
        FundRequestItemPayload {
            finance_item_id: Some(1),
            description: None,
            amount,
            bank_account_number: "123".into(),
        }
    }

    fn payload(items: Vec<FundRequestItemPayload>) -> FundRequestPayload {
        FundRequestPayload {
            id: None,
            code: "FR-1".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20),
            total_amount_in_words: String::new(),
            items,
        }
    }

    #[test]
    fn total_is_the_sum_of_item_amounts() {
        let p = payload(vec![item(100), item(250), item(50)]);
        assert_eq!(p.total_amount(), Some(400));
        assert_eq!(payload(vec![]).total_amount(), Some(0));
    }

    #[test]
    fn overflowing_total_fails_validation() {
        let p = payload(vec![item(i64::MAX), item(5)]);
        assert_eq!(p.total_amount(), None);

        let errors = p.validate().unwrap_err();
        let all = &errors.field_errors()["__all__"];
        assert_eq!(all[0].code, "total_overflow");
    }

    #[test]
    fn valid_payload_passes() {
        assert!(payload(vec![item(10)]).validate().is_ok());
    }

    #[test]
    fn empty_items_are_rejected() {
        let errors = payload(vec![]).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("items"));
    }

    #[test]
    fn missing_date_is_rejected() {
        let mut p = payload(vec![item(10)]);
        p.date = None;
        let errors = p.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("date"));
    }

    #[test]
    fn item_level_failures_are_reported() {
        let mut bad = item(0);
        bad.bank_account_number = String::new();
        bad.finance_item_id = None;
        assert!(bad.validate().is_err());
        assert!(payload(vec![item(5), bad]).validate().is_err());
    }

    #[test]
    fn log_display_defaults() {
        let log = ApprovalLogEntry {
            id: 1,
            fund_request_id: 1,
            approval_stage: ApprovalStage::SubmittedByAdminOps,
            stage_timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
            notes: Some("  ".into()),
            created_by: None,
        };
        assert_eq!(log.notes_or_placeholder(), NOTES_PLACEHOLDER);
        assert_eq!(log.actor_or_system(), SYSTEM_ACTOR);
    }
}
