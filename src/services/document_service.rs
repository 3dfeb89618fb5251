// src/services/document_service.rs

use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;

use crate::{
    common::error::AppError,
    models::{
        approval::{ApprovalStage, CHAIN},
        fund_request::FundRequest,
    },
    services::{
        fund_request_service::FundRequestService,
        status_resolver::{self, ResolvedStatus},
    },
};

#[derive(Clone)]
pub struct DocumentService {
    fund_requests: FundRequestService,
    fonts_dir: String,
    font_family: String,
    company_name: String,
}

impl DocumentService {
    pub fn new(
        fund_requests: FundRequestService,
        fonts_dir: String,
        font_family: String,
        company_name: String,
    ) -> Self {
        Self { fund_requests, fonts_dir, font_family, company_name }
    }

    pub async fn generate_fund_request_pdf(&self, id: i64) -> Result<Vec<u8>, AppError> {
        // 1. Busca os Dados (somente leitura)
        let request = self.fund_requests.get(id).await?;

        // 2. genpdf é síncrono e pesado: roda fora do executor
        let fonts_dir = self.fonts_dir.clone();
        let font_family = self.font_family.clone();
        let company_name = self.company_name.clone();

        let bytes = tokio::task::spawn_blocking(move || {
            render_fund_request(&request, &fonts_dir, &font_family, &company_name)
        })
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de renderização: {}", e))??;

        tracing::info!(id, size = bytes.len(), "PDF gerado");
        Ok(bytes)
    }
}

fn render_error(e: impl std::fmt::Display) -> AppError {
    AppError::DocumentRender(e.to_string())
}

fn render_fund_request(
    request: &FundRequest,
    fonts_dir: &str,
    font_family: &str,
    company_name: &str,
) -> Result<Vec<u8>, AppError> {
    let status = status_resolver::resolve(&request.approval_logs);

    // Carrega a fonte da pasta configurada
    let fonts = genpdf::fonts::from_files(fonts_dir, font_family, None)
        .map_err(|_| AppError::FontNotFound(format!("{} em {}", font_family, fonts_dir)))?;

    let mut doc = genpdf::Document::new(fonts);
    doc.set_title(format!("Fund Request {}", request.code));
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    // --- CABEÇALHO ---
    doc.push(elements::Paragraph::new(company_name.to_string())
        .styled(style::Style::new().bold().with_font_size(18)));
    doc.push(elements::Break::new(1.5));

    doc.push(elements::Paragraph::new(format!("FUND REQUEST {}", request.code))
        .styled(style::Style::new().bold().with_font_size(14)));
    doc.push(elements::Paragraph::new(format!("Date needed: {}", request.date.format("%d/%m/%Y"))));
    doc.push(elements::Paragraph::new(format!("Status: {}", status.display_status)));

    doc.push(elements::Break::new(2));

    // --- TABELA DE ITENS ---
    // Pesos das colunas: Item (3), Descrição (4), Conta (3), Valor (2)
    let mut table = elements::TableLayout::new(vec![3, 4, 3, 2]);
    table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

    let style_bold = style::Style::new().bold();
    table.row()
        .element(elements::Paragraph::new("Finance item").styled(style_bold))
        .element(elements::Paragraph::new("Description").styled(style_bold))
        .element(elements::Paragraph::new("Bank account").styled(style_bold))
        .element(elements::Paragraph::new("Amount").styled(style_bold))
        .push()
        .map_err(render_error)?;

    for item in &request.items {
        table.row()
            .element(elements::Paragraph::new(item.finance_item.name.clone()))
            .element(elements::Paragraph::new(item.description.clone().unwrap_or_else(|| "-".to_string())))
            .element(elements::Paragraph::new(item.bank_account_number.clone()))
            .element(elements::Paragraph::new(format_amount(item.amount)))
            .push()
            .map_err(render_error)?;
    }

    doc.push(table);
    doc.push(elements::Break::new(1));

    // --- TOTAIS ---
    let mut total_paragraph = elements::Paragraph::new(
        format!("TOTAL: {}", format_amount(request.total_amount))
    );
    total_paragraph.set_alignment(genpdf::Alignment::Right);
    doc.push(total_paragraph.styled(style::Style::new().bold().with_font_size(12)));

    if !request.total_amount_in_words.trim().is_empty() {
        let mut words = elements::Paragraph::new(format!("({})", request.total_amount_in_words.trim()));
        words.set_alignment(genpdf::Alignment::Right);
        doc.push(words.styled(style::Style::new().italic()));
    }

    doc.push(elements::Break::new(2));

    // --- APROVAÇÕES (uma linha por etapa, buscada pela chave da etapa) ---
    doc.push(elements::Paragraph::new("APPROVALS")
        .styled(style::Style::new().bold().with_font_size(12)));

    let mut approvals = elements::TableLayout::new(vec![4, 3, 3, 4]);
    approvals.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));
    approvals.row()
        .element(elements::Paragraph::new("Stage").styled(style_bold))
        .element(elements::Paragraph::new("By").styled(style_bold))
        .element(elements::Paragraph::new("At").styled(style_bold))
        .element(elements::Paragraph::new("Notes").styled(style_bold))
        .push()
        .map_err(render_error)?;

    for (stage, by, at, notes) in approval_rows(&status) {
        approvals.row()
            .element(elements::Paragraph::new(stage))
            .element(elements::Paragraph::new(by))
            .element(elements::Paragraph::new(at))
            .element(elements::Paragraph::new(notes))
            .push()
            .map_err(render_error)?;
    }
    doc.push(approvals);

    doc.push(elements::Break::new(2));

    // --- QR CODE (código da solicitação, para conferência) ---
    let code = QrCode::new(request.code.as_bytes()).map_err(render_error)?;
    let image_buffer = code.render::<Luma<u8>>().build();
    let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);
    let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
        .map_err(render_error)?
        .with_scale(genpdf::Scale::new(0.5, 0.5));
    doc.push(pdf_image);

    // 3. Renderiza para Buffer (Memória)
    let mut buffer = Vec::new();
    doc.render(&mut buffer).map_err(render_error)?;

    Ok(buffer)
}

/// Linhas do bloco de aprovações: as seis etapas e, se houver, a rejeição.
/// Usa o status resolvido, então o PDF mostra o mesmo que a timeline.
fn approval_rows(status: &ResolvedStatus) -> Vec<(String, String, String, String)> {
    let mut stages: Vec<ApprovalStage> = CHAIN.to_vec();
    if status.is_rejected {
        stages.push(ApprovalStage::Rejected);
    }

    stages
        .into_iter()
        .map(|stage| match status.entry_for(stage) {
            Some(log) => (
                stage.title().to_string(),
                log.actor_or_system().to_string(),
                log.stage_timestamp.format("%d/%m/%Y %H:%M").to_string(),
                log.notes_or_placeholder().to_string(),
            ),
            None => (stage.title().to_string(), "-".to_string(), "-".to_string(), "-".to_string()),
        })
        .collect()
}

/// 1234567 -> "1.234.567"
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    if amount < 0 {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fund_request::ApprovalLogEntry;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn amounts_get_thousand_separators() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1000), "1.000");
        assert_eq!(format_amount(1234567), "1.234.567");
        assert_eq!(format_amount(-25000), "-25.000");
    }

    #[test]
    fn approval_block_lists_every_stage_and_the_rejection() {
        let log = |id, stage| ApprovalLogEntry {
            id,
            fund_request_id: 1,
            approval_stage: stage,
            stage_timestamp: Utc.with_ymd_and_hms(2026, 6, 1, 14, 30, 0).unwrap(),
            notes: None,
            created_by: if id == 1 { None } else { Some("fin@company.com".into()) },
        };
        let request = FundRequest {
            id: 1,
            code: "FR-1".into(),
            date: NaiveDate::from_ymd_opt(2026, 6, 2).unwrap(),
            total_amount: 0,
            total_amount_in_words: String::new(),
            items: vec![],
            approval_logs: vec![
                log(1, ApprovalStage::SubmittedByAdminOps),
                log(2, ApprovalStage::Rejected),
            ],
            created_at: None,
            updated_at: None,
        };

        let rows = approval_rows(&status_resolver::resolve(&request.approval_logs));
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].1, "System");
        assert_eq!(rows[0].2, "01/06/2026 14:30");
        assert_eq!(rows[0].3, "N/A");
        assert_eq!(rows[1].1, "-");
        assert_eq!(rows[6].0, "Rejected");
        assert_eq!(rows[6].1, "fin@company.com");
    }

    #[test]
    fn stage_signed_after_the_rejection_is_left_blank() {
        let at = |m| Utc.with_ymd_and_hms(2026, 6, 1, 14, m, 0).unwrap();
        let log = |id, stage, m| ApprovalLogEntry {
            id,
            fund_request_id: 1,
            approval_stage: stage,
            stage_timestamp: at(m),
            notes: None,
            created_by: Some("staff@company.com".into()),
        };
        let logs = vec![
            log(1, ApprovalStage::SubmittedByAdminOps, 0),
            log(2, ApprovalStage::Rejected, 10),
            log(3, ApprovalStage::AcknowledgedByStaffOps, 20),
        ];

        let rows = approval_rows(&status_resolver::resolve(&logs));

        assert_eq!(rows[0].1, "staff@company.com");
        assert_eq!(rows[1].0, ApprovalStage::AcknowledgedByStaffOps.title());
        assert_eq!(rows[1].1, "-");
        assert_eq!(rows[6].0, "Rejected");
    }
}
