use crate::{
    audit::AuditAction,
    constants::{API_ERROR_REPORT_FIELDS, API_ERROR_REPORT_NOT_FOUND},
    error::ApiError,
    models::{IncidentReport, ReportFields, ReportFilter, ReportStatistics, ReportStatus},
    storage::{REPORT_NUMBER, Store},
};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{debug, instrument};
use uuid::Uuid;

fn not_found() -> ApiError {
    ApiError::http(StatusCode::NOT_FOUND, API_ERROR_REPORT_NOT_FOUND)
}

impl Store {
    pub async fn list_reports(&self, actor: &str) -> Result<Vec<IncidentReport>, ApiError> {
        let reports = self.list_records::<IncidentReport>().await?;
        self.audit(actor, AuditAction::ReportsListed, "Listagem de boletins")
            .await?;
        Ok(reports)
    }

    #[instrument(skip(self, fields))]
    pub async fn create_report(
        &self,
        actor: &str,
        fields: ReportFields,
    ) -> Result<IncidentReport, ApiError> {
        if !fields.has_required() {
            return Err(ApiError::http(
                StatusCode::BAD_REQUEST,
                API_ERROR_REPORT_FIELDS,
            ));
        }
        let number = fields.number.clone().unwrap_or_default();
        REPORT_NUMBER.ensure_free(self.kv(), &number).await?;

        let now = Utc::now();
        let mut report = IncidentReport {
            id: Uuid::new_v4().to_string(),
            number: String::new(),
            occurred_at: None,
            occurrence_type: String::new(),
            location: String::new(),
            description: String::new(),
            declarant_id: None,
            officer_id: actor.to_string(),
            involved: Vec::new(),
            status: ReportStatus::Registered,
            created_at: now,
            updated_at: now,
            coordinates: None,
            district: None,
            neighborhood: None,
            municipality: None,
            evidence: None,
            correlated: None,
            related_reports: None,
        };
        fields.apply_to(&mut report);
        // New reports always start registered.
        report.status = ReportStatus::Registered;

        REPORT_NUMBER
            .claim(self.kv(), &report.number, &report.id)
            .await?;
        self.save_record(&report).await?;
        self.audit(
            actor,
            AuditAction::ReportCreated,
            format!("B.O. {} - {}", report.number, report.occurrence_type),
        )
        .await?;
        debug!(report_id = report.id, "report created");
        Ok(report)
    }

    pub async fn get_report(&self, actor: &str, id: &str) -> Result<IncidentReport, ApiError> {
        let report = self
            .load_record::<IncidentReport>(id)
            .await?
            .ok_or_else(not_found)?;
        self.audit(
            actor,
            AuditAction::ReportViewed,
            format!("B.O. {}", report.number),
        )
        .await?;
        Ok(report)
    }

    #[instrument(skip(self, fields))]
    pub async fn update_report(
        &self,
        actor: &str,
        id: &str,
        fields: ReportFields,
    ) -> Result<IncidentReport, ApiError> {
        let mut report = self
            .load_record::<IncidentReport>(id)
            .await?
            .ok_or_else(not_found)?;
        let previous_number = report.number.clone();
        let previous_update = report.updated_at;

        if fields.blanks_required() {
            return Err(ApiError::http(
                StatusCode::BAD_REQUEST,
                API_ERROR_REPORT_FIELDS,
            ));
        }
        fields.apply_to(&mut report);
        report.updated_at = Utc::now().max(previous_update);

        if report.number != previous_number {
            REPORT_NUMBER
                .claim(self.kv(), &report.number, &report.id)
                .await?;
            REPORT_NUMBER.release(self.kv(), &previous_number).await?;
            debug!(
                report_id = report.id,
                previous_number, "report number re-indexed"
            );
        }
        self.save_record(&report).await?;
        self.audit(
            actor,
            AuditAction::ReportUpdated,
            format!("B.O. {previous_number} atualizado"),
        )
        .await?;
        Ok(report)
    }

    #[instrument(skip(self, filter))]
    pub async fn search_reports(
        &self,
        actor: &str,
        filter: ReportFilter,
    ) -> Result<Vec<IncidentReport>, ApiError> {
        let reports = self
            .list_records::<IncidentReport>()
            .await?
            .into_iter()
            .filter(|report| filter.matches(report))
            .collect::<Vec<_>>();
        let applied = serde_json::to_string(&filter)?;
        self.audit(
            actor,
            AuditAction::ReportsSearched,
            format!("Busca com filtros: {applied}"),
        )
        .await?;
        debug!(matches = reports.len(), "report search finished");
        Ok(reports)
    }

    pub async fn report_statistics(&self, actor: &str) -> Result<ReportStatistics, ApiError> {
        let reports = self.list_records::<IncidentReport>().await?;
        let stats = ReportStatistics::from_reports(&reports);
        self.audit(
            actor,
            AuditAction::StatisticsViewed,
            "Relatório de estatísticas gerado",
        )
        .await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::Config,
        models::{ReportFields, ReportFilter, ReportStatus},
        storage::Store,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    async fn store() -> Store {
        Store::open(&Config::in_memory()).await.expect("store")
    }

    fn fields(number: &str) -> ReportFields {
        serde_json::from_value(json!({
            "numeroBoletim": number,
            "tipoOcorrencia": "Furto Simples",
            "local": "Mercado do Roque Santeiro",
            "descricao": "Telemóvel furtado",
            "dataHoraOcorrencia": "2025-01-15T10:30",
            "status": "resolvido"
        }))
        .expect("fields")
    }

    #[tokio::test]
    async fn updates_cannot_blank_required_fields() {
        let store = store().await;
        let report = store
            .create_report("officer-1", fields("BO-2025-120"))
            .await
            .expect("create");
        for field in ["numeroBoletim", "tipoOcorrencia", "local", "descricao"] {
            let patch: ReportFields =
                serde_json::from_value(json!({ field: "  " })).expect("patch");
            let err = store
                .update_report("officer-1", &report.id, patch)
                .await
                .expect_err("blank required field");
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
        let unchanged = store
            .get_report("officer-1", &report.id)
            .await
            .expect("get");
        assert_eq!(unchanged.location, "Mercado do Roque Santeiro");
        assert_eq!(unchanged.description, "Telemóvel furtado");
    }

    #[tokio::test]
    async fn created_reports_start_registered_and_carry_author() {
        let store = store().await;
        let report = store
            .create_report("officer-1", fields("BO-2025-099"))
            .await
            .expect("create");
        assert_eq!(report.status, ReportStatus::Registered);
        assert_eq!(report.officer_id, "officer-1");

        let err = store
            .create_report("officer-2", fields("BO-2025-099"))
            .await
            .expect_err("duplicate");
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let all = store.list_reports("officer-1").await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].officer_id, "officer-1");
    }

    #[tokio::test]
    async fn renumbering_moves_the_index() {
        let store = store().await;
        let first = store
            .create_report("officer-1", fields("BO-1"))
            .await
            .expect("create");
        store
            .create_report("officer-1", fields("BO-2"))
            .await
            .expect("create");

        let clash: ReportFields =
            serde_json::from_value(json!({"numeroBoletim": "BO-2"})).expect("patch");
        let err = store
            .update_report("officer-1", &first.id, clash)
            .await
            .expect_err("taken");
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let renumber: ReportFields =
            serde_json::from_value(json!({"numeroBoletim": "BO-3"})).expect("patch");
        let updated = store
            .update_report("officer-1", &first.id, renumber)
            .await
            .expect("renumber");
        assert_eq!(updated.number, "BO-3");
        assert!(updated.updated_at >= first.updated_at);

        store
            .create_report("officer-1", fields("BO-1"))
            .await
            .expect("old number is free again");
    }

    #[tokio::test]
    async fn search_filters_by_status_and_range() {
        let store = store().await;
        let report = store
            .create_report("officer-1", fields("BO-2025-010"))
            .await
            .expect("create");
        let filter = ReportFilter {
            status: Some("registrado".to_string()),
            from: Some("2025-01-01".to_string()),
            to: Some("2025-01-31".to_string()),
            ..ReportFilter::default()
        };
        let found = store
            .search_reports("officer-1", filter)
            .await
            .expect("search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, report.id);

        let none = store
            .search_reports(
                "officer-1",
                ReportFilter {
                    status: Some("arquivado".to_string()),
                    ..ReportFilter::default()
                },
            )
            .await
            .expect("search");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn unknown_report_is_not_found() {
        let err = store()
            .await
            .get_report("officer-1", "missing")
            .await
            .expect_err("missing");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
