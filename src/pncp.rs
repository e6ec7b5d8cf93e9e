// ============================================================================
// PNCP Consulta Client - queries the public procurement registry
// ============================================================================
//
// Talks to the PNCP "consulta" API: the contract and procurement update
// feeds, per-contract detail lookups, and a raw passthrough used by the
// debug route. Also hosts the keyword post-filter, because the registry
// offers no free-text search of its own.
//
// ============================================================================

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::{Config, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::db::NewContract;
use crate::error::{AppError, AppResult};
use crate::metrics::UPSTREAM_REQUESTS_TOTAL;

// ============================================================================
// Search filters
// ============================================================================

/// Filters accepted by the search routes, in the API's own vocabulary.
/// Translation to registry parameter names happens in [`SearchFilters::to_query`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub keyword: Option<String>,
    /// Two-letter federative unit code, e.g. "SP"
    pub region: Option<String>,
    pub status: Option<String>,
    /// YYYY-MM-DD
    pub start_date: Option<String>,
    /// YYYY-MM-DD
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl SearchFilters {
    /// Builds the registry query string: region becomes `uf`, status becomes
    /// `situacao`, dates are compacted to YYYYMMDD. Absent filters are left
    /// out entirely rather than sent empty.
    pub fn to_query(&self) -> AppResult<Vec<(String, String)>> {
        let mut query = vec![
            ("pagina".to_string(), self.page.unwrap_or(DEFAULT_PAGE).to_string()),
            (
                "tamanhoPagina".to_string(),
                self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).to_string(),
            ),
        ];

        if let Some(region) = &self.region {
            query.push(("uf".to_string(), region.clone()));
        }
        if let Some(status) = &self.status {
            query.push(("situacao".to_string(), status.clone()));
        }
        if let Some(start_date) = &self.start_date {
            query.push(("dataInicial".to_string(), compact_date(start_date)?));
        }
        if let Some(end_date) = &self.end_date {
            query.push(("dataFinal".to_string(), compact_date(end_date)?));
        }

        Ok(query)
    }
}

/// Converts YYYY-MM-DD to the registry's compact YYYYMMDD form.
/// Rejects anything that is not a real calendar date.
fn compact_date(date: &str) -> AppResult<String> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date '{date}', expected YYYY-MM-DD")))?;
    Ok(parsed.format("%Y%m%d").to_string())
}

// ============================================================================
// Update feed payloads
// ============================================================================

/// One page of an update feed. Only `data` is typed; the pagination metadata
/// (totalRegistros, totalPaginas, ...) is carried through untouched so the
/// response mirrors whatever the registry sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl<T> Default for UpdatePage<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            meta: Map::new(),
        }
    }
}

/// Entry of the contract update feed. The three named fields are the ones
/// the keyword filter inspects; everything else passes through `rest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objeto_contrato: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numero_contrato_empenho: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome_razao_social_fornecedor: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Entry of the procurement (contratação) update feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objeto_compra: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orgao_entidade: Option<ProcuringBody>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcuringBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub razao_social: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

// ============================================================================
// Keyword post-filter
// ============================================================================

/// Feed entries expose the text fields the keyword filter searches.
pub trait KeywordSearchable {
    fn searchable_fields(&self) -> [Option<&str>; 3];
}

impl KeywordSearchable for ContractUpdate {
    fn searchable_fields(&self) -> [Option<&str>; 3] {
        [
            self.objeto_contrato.as_deref(),
            self.numero_contrato_empenho.as_deref(),
            self.nome_razao_social_fornecedor.as_deref(),
        ]
    }
}

impl KeywordSearchable for ProcurementUpdate {
    fn searchable_fields(&self) -> [Option<&str>; 3] {
        [
            self.objeto_compra.as_deref(),
            self.processo.as_deref(),
            self.orgao_entidade
                .as_ref()
                .and_then(|body| body.razao_social.as_deref()),
        ]
    }
}

/// Case-insensitive substring filter over the entries of a page. A missing
/// or blank keyword leaves the page as-is; pagination metadata is never
/// recomputed, so totals keep describing the unfiltered feed.
pub fn filter_by_keyword<T: KeywordSearchable>(page: &mut UpdatePage<T>, keyword: Option<&str>) {
    let needle = match keyword {
        Some(raw) => raw.trim().to_lowercase(),
        None => return,
    };
    if needle.is_empty() {
        return;
    }

    page.data.retain(|entry| {
        entry
            .searchable_fields()
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    });
}

// ============================================================================
// Contract detail payload
// ============================================================================

/// Detail record for a single contract, as served by `/contratos/{id}`.
/// Every field is optional; the registry omits plenty of them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetail {
    pub objeto: Option<String>,
    pub descricao: Option<String>,
    pub orgao: Option<ContractDetailOrgan>,
    pub situacao: Option<String>,
    pub uf: Option<String>,
    pub modalidade: Option<String>,
    pub data_publicacao: Option<String>,
    pub data_abertura: Option<String>,
    pub valor_estimado: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetailOrgan {
    pub nome: Option<String>,
}

impl ContractDetail {
    /// Maps the registry payload onto our cache record shape.
    pub fn into_cache_record(self, pncp_id: &str) -> NewContract {
        NewContract {
            pncp_id: pncp_id.to_string(),
            title: self.objeto,
            description: self.descricao,
            organization: self.orgao.and_then(|organ| organ.nome),
            status: self.situacao,
            region: self.uf,
            modality: self.modalidade,
            publication_date: parse_registry_date(self.data_publicacao.as_deref()),
            opening_date: parse_registry_date(self.data_abertura.as_deref()),
            value: self.valor_estimado,
        }
    }
}

/// The registry is inconsistent about timestamp formats. Accept RFC 3339,
/// a zone-less datetime, or a bare date; anything else is stored as NULL.
fn parse_registry_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = parsed.and_hms_opt(0, 0, 0) {
            return Some(midnight.and_utc());
        }
    }
    None
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the procurement registry.
#[derive(Clone)]
pub struct PncpClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PncpClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.pncp_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// One page of the contract update feed, keyword filter not yet applied.
    pub async fn contract_updates(
        &self,
        filters: &SearchFilters,
    ) -> AppResult<UpdatePage<ContractUpdate>> {
        let query = filters.to_query()?;
        self.get_json("/contratos/atualizacao", &query).await
    }

    /// One page of the procurement update feed.
    pub async fn procurement_updates(
        &self,
        filters: &SearchFilters,
    ) -> AppResult<UpdatePage<ProcurementUpdate>> {
        let query = filters.to_query()?;
        self.get_json("/contratacoes/atualizacao", &query).await
    }

    /// Full detail record for one contract.
    pub async fn contract_detail(&self, pncp_id: &str) -> AppResult<ContractDetail> {
        let path = format!("/contratos/{pncp_id}");
        self.get_json(&path, &[]).await
    }

    /// Unfiltered GET against an arbitrary registry endpoint (debug route).
    pub async fn raw_query(&self, endpoint: &str, params: &Map<String, Value>) -> AppResult<Value> {
        let query: Vec<(String, String)> = params
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect();

        self.get_json(endpoint, &query).await
    }

    async fn get_json<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);

        UPSTREAM_REQUESTS_TOTAL.inc();
        tracing::debug!(url = %url, "Querying procurement registry");

        let mut request = self.http_client.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;

        let status = response.status();

        // The registry answers an empty result page with 204 and no body
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(T::default());
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(
                url = %url,
                status = %status,
                "Procurement registry returned an error status"
            );
            return Err(AppError::upstream(status, body));
        }

        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contract_entry(value: Value) -> ContractUpdate {
        serde_json::from_value(value).unwrap()
    }

    fn procurement_entry(value: Value) -> ProcurementUpdate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_compact_date_valid() {
        assert_eq!(compact_date("2024-05-10").unwrap(), "20240510");
        assert_eq!(compact_date("2024-12-31").unwrap(), "20241231");
    }

    #[test]
    fn test_compact_date_rejects_bad_input() {
        assert!(compact_date("2024-13-01").is_err());
        assert!(compact_date("20240510").is_err());
        assert!(compact_date("10/05/2024").is_err());
        assert!(compact_date("not-a-date").is_err());
    }

    #[test]
    fn test_to_query_defaults() {
        let query = SearchFilters::default().to_query().unwrap();
        assert_eq!(
            query,
            vec![
                ("pagina".to_string(), "1".to_string()),
                ("tamanhoPagina".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_to_query_translates_filter_names() {
        let filters = SearchFilters {
            region: Some("SP".to_string()),
            status: Some("recebendo_proposta".to_string()),
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-01-31".to_string()),
            page: Some(3),
            page_size: Some(25),
            ..Default::default()
        };

        let query = filters.to_query().unwrap();
        assert_eq!(
            query,
            vec![
                ("pagina".to_string(), "3".to_string()),
                ("tamanhoPagina".to_string(), "25".to_string()),
                ("uf".to_string(), "SP".to_string()),
                ("situacao".to_string(), "recebendo_proposta".to_string()),
                ("dataInicial".to_string(), "20240101".to_string()),
                ("dataFinal".to_string(), "20240131".to_string()),
            ]
        );
    }

    #[test]
    fn test_to_query_rejects_invalid_date() {
        let filters = SearchFilters {
            start_date: Some("01-01-2024".to_string()),
            ..Default::default()
        };
        assert!(filters.to_query().is_err());
    }

    #[test]
    fn test_filter_matches_any_contract_field() {
        let mut page = UpdatePage {
            data: vec![
                contract_entry(json!({"objetoContrato": "Aquisição de notebooks"})),
                contract_entry(json!({"numeroContratoEmpenho": "NOTEBOOK-42"})),
                contract_entry(json!({"nomeRazaoSocialFornecedor": "Notebooks do Brasil LTDA"})),
                contract_entry(json!({"objetoContrato": "Serviços de limpeza"})),
            ],
            meta: Map::new(),
        };

        filter_by_keyword(&mut page, Some("notebook"));
        assert_eq!(page.data.len(), 3);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let mut page = UpdatePage {
            data: vec![contract_entry(
                json!({"objetoContrato": "MANUTENÇÃO PREDIAL"}),
            )],
            meta: Map::new(),
        };

        filter_by_keyword(&mut page, Some("manutenção"));
        assert_eq!(page.data.len(), 1);
    }

    #[test]
    fn test_blank_keyword_leaves_page_untouched() {
        let entries = vec![
            contract_entry(json!({"objetoContrato": "Obra A"})),
            contract_entry(json!({"objetoContrato": "Obra B"})),
        ];

        for keyword in [None, Some(""), Some("   ")] {
            let mut page = UpdatePage {
                data: entries.clone(),
                meta: Map::new(),
            };
            filter_by_keyword(&mut page, keyword);
            assert_eq!(page.data.len(), 2);
        }
    }

    #[test]
    fn test_filter_checks_procuring_body_name() {
        let mut page = UpdatePage {
            data: vec![
                procurement_entry(json!({
                    "objetoCompra": "Material de escritório",
                    "orgaoEntidade": {"razaoSocial": "Prefeitura de Campinas"}
                })),
                procurement_entry(json!({
                    "objetoCompra": "Material hospitalar",
                    "orgaoEntidade": {"razaoSocial": "Hospital das Clínicas"}
                })),
            ],
            meta: Map::new(),
        };

        filter_by_keyword(&mut page, Some("campinas"));
        assert_eq!(page.data.len(), 1);
        assert_eq!(
            page.data[0].objeto_compra.as_deref(),
            Some("Material de escritório")
        );
    }

    #[test]
    fn test_page_metadata_survives_filtering() {
        let mut page: UpdatePage<ContractUpdate> = serde_json::from_value(json!({
            "data": [
                {"objetoContrato": "Reforma escolar", "valorGlobal": 150000.0},
                {"objetoContrato": "Compra de merenda"}
            ],
            "totalRegistros": 240,
            "totalPaginas": 24,
            "numeroPagina": 1
        }))
        .unwrap();

        filter_by_keyword(&mut page, Some("reforma"));

        let rendered = serde_json::to_value(&page).unwrap();
        assert_eq!(rendered["totalRegistros"], 240);
        assert_eq!(rendered["totalPaginas"], 24);
        assert_eq!(rendered["data"].as_array().unwrap().len(), 1);
        assert_eq!(rendered["data"][0]["valorGlobal"], 150000.0);
    }

    #[test]
    fn test_parse_registry_date_formats() {
        assert_eq!(
            parse_registry_date(Some("2024-05-10T08:30:00-03:00"))
                .unwrap()
                .to_rfc3339(),
            "2024-05-10T11:30:00+00:00"
        );
        assert!(parse_registry_date(Some("2024-05-10T08:30:00")).is_some());
        assert!(parse_registry_date(Some("2024-05-10")).is_some());
        assert!(parse_registry_date(Some("10/05/2024")).is_none());
        assert!(parse_registry_date(Some("")).is_none());
        assert!(parse_registry_date(None).is_none());
    }

    #[test]
    fn test_detail_maps_to_cache_record() {
        let detail: ContractDetail = serde_json::from_value(json!({
            "objeto": "Aquisição de ambulâncias",
            "descricao": "Pregão eletrônico para frota municipal",
            "orgao": {"nome": "Secretaria de Saúde"},
            "situacao": "ativa",
            "uf": "MG",
            "modalidade": "Pregão",
            "dataPublicacao": "2024-03-01T00:00:00",
            "dataAbertura": "2024-03-15T09:00:00",
            "valorEstimado": 1200000.5
        }))
        .unwrap();

        let record = detail.into_cache_record("07854402000100-1-000099/2024");
        assert_eq!(record.pncp_id, "07854402000100-1-000099/2024");
        assert_eq!(record.title.as_deref(), Some("Aquisição de ambulâncias"));
        assert_eq!(record.organization.as_deref(), Some("Secretaria de Saúde"));
        assert_eq!(record.region.as_deref(), Some("MG"));
        assert_eq!(record.value, Some(1200000.5));
        assert!(record.publication_date.is_some());
        assert!(record.opening_date.is_some());
    }

    #[test]
    fn test_detail_tolerates_missing_fields() {
        let detail: ContractDetail = serde_json::from_value(json!({
            "objeto": "Compra direta"
        }))
        .unwrap();

        let record = detail.into_cache_record("123");
        assert_eq!(record.title.as_deref(), Some("Compra direta"));
        assert!(record.organization.is_none());
        assert!(record.publication_date.is_none());
        assert!(record.value.is_none());
    }
}
