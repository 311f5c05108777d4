use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::LazyLock};

static BADGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^PN\d{6}$").expect("valid badge pattern"));
static IDENTITY_NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{9}[A-Z]{2}\d{3}$").expect("valid identity pattern"));

/// `PN` followed by six digits.
pub fn is_valid_badge(badge: &str) -> bool {
    BADGE_PATTERN.is_match(badge)
}

/// National identity card number, e.g. `005485692LA042`.
pub fn is_valid_identity_number(value: &str) -> bool {
    IDENTITY_NUMBER_PATTERN.is_match(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "Agente")]
    Agent,
    #[serde(rename = "Agente Principal")]
    PrincipalAgent,
    #[serde(rename = "Aspirante")]
    Aspirant,
    #[serde(rename = "Subcomissário")]
    SubCommissioner,
    #[serde(rename = "Comissário")]
    Commissioner,
    #[serde(rename = "Comandante")]
    Commander,
    #[serde(rename = "Subintendente")]
    SubIntendant,
    #[serde(rename = "Intendente")]
    Intendant,
    #[serde(rename = "Superintendente")]
    Superintendent,
}

impl Rank {
    /// Lowest to highest.
    pub const ALL: [Rank; 9] = [
        Rank::Agent,
        Rank::PrincipalAgent,
        Rank::Aspirant,
        Rank::SubCommissioner,
        Rank::Commissioner,
        Rank::Commander,
        Rank::SubIntendant,
        Rank::Intendant,
        Rank::Superintendent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "Agente",
            Self::PrincipalAgent => "Agente Principal",
            Self::Aspirant => "Aspirante",
            Self::SubCommissioner => "Subcomissário",
            Self::Commissioner => "Comissário",
            Self::Commander => "Comandante",
            Self::SubIntendant => "Subintendente",
            Self::Intendant => "Intendente",
            Self::Superintendent => "Superintendente",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rank| rank.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Officer {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "posto")]
    pub rank: Rank,
    #[serde(rename = "matricula")]
    pub badge: String,
    #[serde(rename = "distrito", default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(rename = "esquadra", default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "criadoEm", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Officer {
    /// The identity handed back by signup and login.
    pub fn summary(&self) -> Officer {
        Officer {
            email: None,
            created_at: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonRole {
    #[serde(rename = "declarante")]
    Declarant,
    #[serde(rename = "vitima")]
    Victim,
    #[serde(rename = "suspeito")]
    Suspect,
    #[serde(rename = "testemunha")]
    Witness,
}

impl PersonRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Declarant => "declarante",
            Self::Victim => "vitima",
            Self::Suspect => "suspeito",
            Self::Witness => "testemunha",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersonStatus {
    #[serde(rename = "ativo")]
    Active,
    #[serde(rename = "procurado")]
    Wanted,
    #[serde(rename = "detido")]
    Detained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DangerLevel {
    #[serde(rename = "baixo")]
    Low,
    #[serde(rename = "medio")]
    Medium,
    #[serde(rename = "alto")]
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "codinome", default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "tipo")]
    pub role: PersonRole,
    #[serde(rename = "bilheteIdentidade")]
    pub identity_number: String,
    #[serde(rename = "telefone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "endereco", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "dataNascimento", default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(rename = "foto", default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(rename = "coordenadas", default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(rename = "distrito", default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(rename = "bairro", default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(rename = "municipio", default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PersonStatus>,
    #[serde(rename = "nivelPericulosidade", default, skip_serializing_if = "Option::is_none")]
    pub danger_level: Option<DangerLevel>,
    #[serde(rename = "crimesRelacionados", default, skip_serializing_if = "Option::is_none")]
    pub related_reports: Option<Vec<String>>,
    #[serde(rename = "criadaEm")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "atualizadaEm", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Editable person fields as they arrive on the wire. Creation requires name,
/// role and identity number; updates apply whatever is present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersonFields {
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "codinome")]
    pub alias: Option<String>,
    #[serde(rename = "tipo")]
    pub role: Option<PersonRole>,
    #[serde(rename = "bilheteIdentidade")]
    pub identity_number: Option<String>,
    #[serde(rename = "telefone")]
    pub phone: Option<String>,
    #[serde(rename = "endereco")]
    pub address: Option<String>,
    #[serde(rename = "dataNascimento")]
    pub birth_date: Option<String>,
    #[serde(rename = "foto")]
    pub photo: Option<String>,
    #[serde(rename = "coordenadas")]
    pub coordinates: Option<Coordinates>,
    #[serde(rename = "distrito")]
    pub district: Option<String>,
    #[serde(rename = "bairro")]
    pub neighborhood: Option<String>,
    #[serde(rename = "municipio")]
    pub municipality: Option<String>,
    pub status: Option<PersonStatus>,
    #[serde(rename = "nivelPericulosidade")]
    pub danger_level: Option<DangerLevel>,
    #[serde(rename = "crimesRelacionados")]
    pub related_reports: Option<Vec<String>>,
}

impl PersonFields {
    pub fn apply_to(self, person: &mut Person) {
        if let Some(value) = self.name {
            person.name = value;
        }
        if let Some(value) = self.role {
            person.role = value;
        }
        if let Some(value) = self.identity_number {
            person.identity_number = value;
        }
        merge(&mut person.alias, self.alias);
        merge(&mut person.phone, self.phone);
        merge(&mut person.address, self.address);
        merge(&mut person.birth_date, self.birth_date);
        merge(&mut person.photo, self.photo);
        merge(&mut person.coordinates, self.coordinates);
        merge(&mut person.district, self.district);
        merge(&mut person.neighborhood, self.neighborhood);
        merge(&mut person.municipality, self.municipality);
        merge(&mut person.status, self.status);
        merge(&mut person.danger_level, self.danger_level);
        merge(&mut person.related_reports, self.related_reports);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "registrado")]
    Registered,
    #[serde(rename = "em_andamento")]
    InProgress,
    #[serde(rename = "resolvido")]
    Resolved,
    #[serde(rename = "arquivado")]
    Archived,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registrado",
            Self::InProgress => "em_andamento",
            Self::Resolved => "resolvido",
            Self::Archived => "arquivado",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Involvement {
    #[serde(rename = "pessoaId")]
    pub person_id: String,
    #[serde(rename = "papel")]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub id: String,
    #[serde(rename = "numeroBoletim")]
    pub number: String,
    #[serde(rename = "dataHoraOcorrencia", default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<String>,
    #[serde(rename = "tipoOcorrencia")]
    pub occurrence_type: String,
    #[serde(rename = "local")]
    pub location: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "declaranteId", default, skip_serializing_if = "Option::is_none")]
    pub declarant_id: Option<String>,
    #[serde(rename = "policialId")]
    pub officer_id: String,
    #[serde(rename = "envolvidos", default)]
    pub involved: Vec<Involvement>,
    pub status: ReportStatus,
    #[serde(rename = "criadoEm")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "atualizadoEm")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "coordenadas", default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(rename = "distrito", default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(rename = "bairro", default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(rename = "municipio", default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(rename = "evidencias", default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<String>>,
    #[serde(rename = "correlacionado", default, skip_serializing_if = "Option::is_none")]
    pub correlated: Option<bool>,
    #[serde(rename = "crimesRelacionados", default, skip_serializing_if = "Option::is_none")]
    pub related_reports: Option<Vec<String>>,
}

/// Editable report fields as they arrive on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportFields {
    #[serde(rename = "numeroBoletim")]
    pub number: Option<String>,
    #[serde(rename = "dataHoraOcorrencia")]
    pub occurred_at: Option<String>,
    #[serde(rename = "tipoOcorrencia")]
    pub occurrence_type: Option<String>,
    #[serde(rename = "local")]
    pub location: Option<String>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "declaranteId")]
    pub declarant_id: Option<String>,
    #[serde(rename = "envolvidos")]
    pub involved: Option<Vec<Involvement>>,
    pub status: Option<ReportStatus>,
    #[serde(rename = "coordenadas")]
    pub coordinates: Option<Coordinates>,
    #[serde(rename = "distrito")]
    pub district: Option<String>,
    #[serde(rename = "bairro")]
    pub neighborhood: Option<String>,
    #[serde(rename = "municipio")]
    pub municipality: Option<String>,
    #[serde(rename = "evidencias")]
    pub evidence: Option<Vec<String>>,
    #[serde(rename = "correlacionado")]
    pub correlated: Option<bool>,
    #[serde(rename = "crimesRelacionados")]
    pub related_reports: Option<Vec<String>>,
}

impl ReportFields {
    pub fn has_required(&self) -> bool {
        [
            &self.number,
            &self.occurrence_type,
            &self.location,
            &self.description,
        ]
        .into_iter()
        .all(|field| field.as_deref().is_some_and(|value| !value.trim().is_empty()))
    }

    /// A patch may omit required fields but never clear them.
    pub fn blanks_required(&self) -> bool {
        [
            &self.number,
            &self.occurrence_type,
            &self.location,
            &self.description,
        ]
        .into_iter()
        .any(|field| field.as_deref().is_some_and(|value| value.trim().is_empty()))
    }

    /// Status transitions are unconstrained: any status may follow any other.
    pub fn apply_to(self, report: &mut IncidentReport) {
        if let Some(value) = self.number {
            report.number = value;
        }
        if let Some(value) = self.occurrence_type {
            report.occurrence_type = value;
        }
        if let Some(value) = self.location {
            report.location = value;
        }
        if let Some(value) = self.description {
            report.description = value;
        }
        if let Some(value) = self.involved {
            report.involved = value;
        }
        if let Some(value) = self.status {
            report.status = value;
        }
        merge(&mut report.occurred_at, self.occurred_at);
        merge(&mut report.declarant_id, self.declarant_id);
        merge(&mut report.coordinates, self.coordinates);
        merge(&mut report.district, self.district);
        merge(&mut report.neighborhood, self.neighborhood);
        merge(&mut report.municipality, self.municipality);
        merge(&mut report.evidence, self.evidence);
        merge(&mut report.correlated, self.correlated);
        merge(&mut report.related_reports, self.related_reports);
    }
}

fn merge<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportFilter {
    #[serde(rename = "numeroBoletim", skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "tipoOcorrencia", skip_serializing_if = "Option::is_none")]
    pub occurrence_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "dataInicio", skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(rename = "dataFim", skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl ReportFilter {
    pub fn matches(&self, report: &IncidentReport) -> bool {
        if let Some(number) = non_blank(&self.number)
            && !report
                .number
                .to_lowercase()
                .contains(&number.to_lowercase())
        {
            return false;
        }
        if let Some(kind) = non_blank(&self.occurrence_type)
            && report.occurrence_type != kind
        {
            return false;
        }
        if let Some(status) = non_blank(&self.status)
            && report.status.as_str() != status
        {
            return false;
        }
        if let (Some(from), Some(to)) = (non_blank(&self.from), non_blank(&self.to)) {
            let occurred = report.occurred_at.as_deref().and_then(parse_occurrence_time);
            let (Some(occurred), Some(from), Some(to)) =
                (occurred, parse_occurrence_time(from), parse_occurrence_time(to))
            else {
                return false;
            };
            return occurred >= from && occurred <= to;
        }
        true
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

/// Accepts RFC 3339, `datetime-local` form values and bare dates (midnight).
pub fn parse_occurrence_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportStatistics {
    #[serde(rename = "totalBoletins")]
    pub total: usize,
    #[serde(rename = "porTipo")]
    pub by_type: BTreeMap<String, usize>,
    #[serde(rename = "porStatus")]
    pub by_status: BTreeMap<String, usize>,
    #[serde(rename = "ultimosDias")]
    pub by_day: BTreeMap<String, usize>,
}

impl ReportStatistics {
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a IncidentReport>) -> Self {
        let mut stats = Self::default();
        for report in reports {
            stats.total += 1;
            let kind = if report.occurrence_type.trim().is_empty() {
                "outros".to_string()
            } else {
                report.occurrence_type.clone()
            };
            *stats.by_type.entry(kind).or_default() += 1;
            *stats
                .by_status
                .entry(report.status.as_str().to_string())
                .or_default() += 1;
            if let Some(occurred) = report.occurred_at.as_deref().and_then(parse_occurrence_time) {
                *stats
                    .by_day
                    .entry(occurred.date().format("%Y-%m-%d").to_string())
                    .or_default() += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(number: &str, kind: &str, occurred_at: Option<&str>) -> IncidentReport {
        let now = Utc::now();
        IncidentReport {
            id: number.to_lowercase(),
            number: number.to_string(),
            occurred_at: occurred_at.map(ToOwned::to_owned),
            occurrence_type: kind.to_string(),
            location: "Rua X".to_string(),
            description: "descrição".to_string(),
            declarant_id: None,
            officer_id: "officer-1".to_string(),
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
        }
    }

    #[test]
    fn badge_and_identity_formats() {
        assert!(is_valid_badge("PN001234"));
        assert!(!is_valid_badge("pn001234"));
        assert!(!is_valid_badge("PN12345"));
        assert!(is_valid_identity_number("005485692LA042"));
        assert!(!is_valid_identity_number("005485692la042"));
        assert!(!is_valid_identity_number("123.456.789-00"));
    }

    #[test]
    fn ranks_are_ordered_and_round_trip_their_labels() {
        assert!(Rank::Agent < Rank::Commander);
        assert!(Rank::Intendant < Rank::Superintendent);
        assert_eq!(Rank::parse("subcomissário"), Some(Rank::SubCommissioner));
        assert_eq!(Rank::parse("Soldado"), None);
        assert_eq!(
            serde_json::to_value(Rank::PrincipalAgent).expect("json"),
            json!("Agente Principal")
        );
    }

    #[test]
    fn report_patch_keeps_absent_fields() {
        let mut existing = report("BO-2025-001", "Furto Simples", Some("2025-01-10T08:00"));
        existing.district = Some("Maianga".to_string());
        let patch: ReportFields =
            serde_json::from_value(json!({"status": "em_andamento", "descricao": "nova"}))
                .expect("patch");
        patch.apply_to(&mut existing);

        assert_eq!(existing.status, ReportStatus::InProgress);
        assert_eq!(existing.description, "nova");
        assert_eq!(existing.district.as_deref(), Some("Maianga"));
        assert_eq!(existing.location, "Rua X");
    }

    #[test]
    fn required_report_fields_reject_blank_values() {
        let fields: ReportFields = serde_json::from_value(json!({
            "numeroBoletim": "BO-2025-001",
            "tipoOcorrencia": "Burla",
            "local": "  ",
            "descricao": "x"
        }))
        .expect("fields");
        assert!(!fields.has_required());
    }

    #[test]
    fn filter_applies_date_range_only_with_both_bounds() {
        let inside = report("BO-2025-010", "Burla", Some("2025-01-15T10:30"));
        let undated = report("BO-2025-011", "Burla", None);

        let open_ended = ReportFilter {
            from: Some("2025-01-01".to_string()),
            ..ReportFilter::default()
        };
        assert!(open_ended.matches(&undated));

        let ranged = ReportFilter {
            from: Some("2025-01-01".to_string()),
            to: Some("2025-01-31".to_string()),
            ..ReportFilter::default()
        };
        assert!(ranged.matches(&inside));
        assert!(!ranged.matches(&undated));
    }

    #[test]
    fn filter_number_is_case_insensitive_substring() {
        let target = report("BO-2025-099", "Furto Simples", None);
        let filter = ReportFilter {
            number: Some("bo-2025-09".to_string()),
            occurrence_type: Some(String::new()),
            ..ReportFilter::default()
        };
        assert!(filter.matches(&target));
    }

    #[test]
    fn statistics_group_by_type_status_and_day() {
        let reports = [
            report("BO-1", "Burla", Some("2025-01-15T10:30:00Z")),
            report("BO-2", "Burla", Some("2025-01-15T18:00")),
            report("BO-3", "", None),
        ];
        let stats = ReportStatistics::from_reports(&reports);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_type.get("Burla"), Some(&2));
        assert_eq!(stats.by_type.get("outros"), Some(&1));
        assert_eq!(stats.by_status.get("registrado"), Some(&3));
        assert_eq!(stats.by_day.get("2025-01-15"), Some(&2));
    }
}
