

use rmcp::{
    handler::server::{
        router::tool::ToolRouter,
        router::prompt::PromptRouter,
        wrapper::Parameters,
    },
    model::*,
    tool, tool_handler, tool_router,
    prompt, prompt_handler, prompt_router,
    transport::stdio,
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::config::{OntomatchConfig, StorageBackend};
use crate::core::error::{ErrorKind, OntomatchError};
use crate::core::ontomatch_client::OntomatchClient;
use crate::toolkit::evolution::{
    ApproveCandidateRequest, CandidateQuery, CandidateSort, CandidateStatus, JobOutcome,
    RejectCandidateRequest, SortOrder,
};
use crate::toolkit::ontology::TaxonomyLoader;


#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct InferConceptsParams {
    #[schemars(description = "Student or lecturer profile ID")]
    pub profile_id: String,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct RecommendLecturersParams {
    #[schemars(description = "Student profile ID")]
    pub student_id: String,
    #[schemars(description = "Max recommendations (default: 10)")]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct SearchLecturersParams {
    #[schemars(description = "Free-text query; may contain a lecturer name and/or research topics")]
    pub query: String,
    #[schemars(description = "Max results (default: 10)")]
    pub limit: Option<u32>,
    #[schemars(description = "Rerank with the LLM (default: true when an LLM is configured)")]
    pub rerank: Option<bool>,
    #[schemars(description = "Drop near-duplicate profiles (default: true)")]
    pub diversify: Option<bool>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct ListCandidatesParams {
    #[schemars(description = "Status filter: 'pending', 'approved', 'rejected'")]
    pub status: Option<String>,
    #[schemars(description = "1-based page (default: 1)")]
    pub page: Option<u32>,
    #[schemars(description = "Page size (default: 20, max: 100)")]
    pub page_size: Option<u32>,
    #[schemars(description = "Sort field: 'frequency', 'created_at', 'updated_at'")]
    pub sort: Option<String>,
    #[schemars(description = "Sort order: 'asc' or 'desc'")]
    pub order: Option<String>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct CandidateIdParams {
    #[schemars(description = "Candidate UUID")]
    pub candidate_id: String,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct ApproveCandidateParams {
    #[schemars(description = "Candidate UUID")]
    pub candidate_id: String,
    #[schemars(description = "New concept key, e.g. 'it.security.blockchain'")]
    pub key: String,
    #[schemars(description = "Display label of the new concept")]
    pub label: String,
    #[schemars(description = "Extra aliases (Vietnamese or English)")]
    pub aliases: Option<Vec<String>>,
    #[schemars(description = "Parent key; the new key must sit directly under it")]
    pub parent: Option<String>,
    #[schemars(description = "Optional description")]
    pub description: Option<String>,
    #[schemars(description = "Administrator identifier")]
    pub approved_by: String,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct RejectCandidateParams {
    #[schemars(description = "Candidate UUID")]
    pub candidate_id: String,
    #[schemars(description = "Why the candidate is rejected")]
    pub reason: String,
    #[schemars(description = "Administrator identifier")]
    pub rejected_by: String,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct SeedTaxonomyParams {
    #[schemars(description = "Path of a taxonomy JSON file on the server (default: built-in taxonomy)")]
    pub path: Option<String>,
    #[schemars(description = "Inline taxonomy JSON document; takes precedence over path")]
    pub taxonomy_json: Option<String>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct SyncEmbeddingsParams {
    #[schemars(description = "Re-embed concepts that already have an embedding")]
    pub force: Option<bool>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct SyncKnowledgeParams {
    #[schemars(description = "Lecturer profile ID (default: every lecturer)")]
    pub lecturer_id: Option<String>,
}


#[derive(Debug, Serialize, Deserialize, rmcp::schemars::JsonSchema)]
pub struct CurationGuideArgs {
    #[schemars(description = "Minimum frequency worth reviewing (default: 3)")]
    pub min_frequency: Option<u32>,
}


fn parse_uuid(field: &str, value: &str) -> Result<Uuid, McpError> {
    Uuid::parse_str(value.trim())
        .map_err(|e| McpError::invalid_params(format!("{}: invalid UUID '{}': {}", field, value, e), None))
}

fn parse_enum<T: std::str::FromStr>(field: &str, value: Option<&str>) -> Result<Option<T>, McpError> {
    value
        .map(|v| {
            v.trim()
                .to_lowercase()
                .parse::<T>()
                .map_err(|_| McpError::invalid_params(format!("{}: unsupported value '{}'", field, v), None))
        })
        .transpose()
}


#[derive(Clone)]
pub struct OntomatchMcpServer {
    client: Arc<OntomatchClient>,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl OntomatchMcpServer {
    pub fn new(client: Arc<OntomatchClient>) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    fn convert_error(err: OntomatchError) -> McpError {
        let kind = err.kind();
        let data = Some(json!({ "kind": kind }));
        match kind {
            ErrorKind::NotFound | ErrorKind::Validation | ErrorKind::EmptyProfile => {
                McpError::invalid_params(err.to_string(), data)
            }
            ErrorKind::InvalidState | ErrorKind::Conflict => {
                McpError::invalid_request(err.to_string(), data)
            }
            ErrorKind::ProviderFailure | ErrorKind::Storage | ErrorKind::Config => {
                McpError::internal_error(err.to_string(), data)
            }
        }
    }

    fn result_to_json<T: Serialize>(result: T) -> Result<String, McpError> {
        serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    fn success<T: Serialize>(result: T) -> Result<CallToolResult, McpError> {
        let json = Self::result_to_json(result)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_router]
impl OntomatchMcpServer {
    #[tool(description = "Extract ontology concepts from a student or lecturer profile and store them on the profile. Returns: {profile_id, concepts: [{key, label, depth, sources}], unmatched_tokens}")]
    async fn infer_concepts(
        &self,
        Parameters(params): Parameters<InferConceptsParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("🧩 Inferring concepts for profile={}", params.profile_id);

        let report = self
            .client
            .infer_concepts(&params.profile_id)
            .await
            .map_err(Self::convert_error)?;

        info!("✅ {} concepts, {} unmatched", report.concepts.len(), report.unmatched_tokens.len());
        Self::success(&report)
    }

    #[tool(description = "Recommend supervisors for a student by depth-weighted concept matching with parent boost. Returns: {recommendations: [{lecturer_id, full_name, result: {score, core_score, boost_score, matched_concepts}, explanation}]}")]
    async fn recommend_lecturers(
        &self,
        Parameters(params): Parameters<RecommendLecturersParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("🎓 Recommending lecturers for student={}", params.student_id);

        let report = self
            .client
            .recommend_for_student(&params.student_id, params.limit.map(|l| l as usize))
            .await
            .map_err(Self::convert_error)?;

        info!("✅ {} recommendations", report.recommendations.len());
        Self::success(&report)
    }

    #[tool(description = "Hybrid lecturer search: name-first when the query names a person, semantic otherwise; diversity filtered and optionally LLM reranked. Returns: {strategy, threshold, results: [{lecturer_id, full_name, final_score, match_type, rerank_reason}]}")]
    async fn search_lecturers(
        &self,
        Parameters(params): Parameters<SearchLecturersParams>,
    ) -> Result<CallToolResult, McpError> {
        let query_preview = crate::safe_truncate(&params.query, 50);
        info!("🔍 Searching lecturers: '{}' [limit={:?}]", query_preview, params.limit);

        let mut options = self.client.search_options(params.limit.map(|l| l as usize));
        if let Some(rerank) = params.rerank {
            options.rerank = rerank;
        }
        if let Some(diversify) = params.diversify {
            options.diversify = diversify;
        }

        let response = self
            .client
            .recommend_for_query(&params.query, options)
            .await
            .map_err(Self::convert_error)?;

        info!(
            "✅ {} results via {} (cached={})",
            response.results.len(),
            response.strategy,
            response.cached
        );
        Self::success(&response)
    }

    #[tool(description = "List concept candidates proposed from unmatched profile tokens. Returns: {items: [...], total, page, page_size}")]
    async fn list_candidates(
        &self,
        Parameters(params): Parameters<ListCandidatesParams>,
    ) -> Result<CallToolResult, McpError> {
        let defaults = CandidateQuery::default();
        let query = CandidateQuery {
            status: parse_enum::<CandidateStatus>("status", params.status.as_deref())?,
            page: params.page.map_or(defaults.page, |p| p as usize),
            page_size: params.page_size.map_or(defaults.page_size, |p| p as usize),
            sort: parse_enum::<CandidateSort>("sort", params.sort.as_deref())?.unwrap_or(defaults.sort),
            order: parse_enum::<SortOrder>("order", params.order.as_deref())?.unwrap_or(defaults.order),
        };

        let page = self
            .client
            .list_candidates(&query)
            .await
            .map_err(Self::convert_error)?;
        Self::success(&page)
    }

    #[tool(description = "Get one concept candidate with its variants and examples")]
    async fn get_candidate(
        &self,
        Parameters(params): Parameters<CandidateIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_uuid("candidate_id", &params.candidate_id)?;
        let candidate = self.client.get_candidate(id).await.map_err(Self::convert_error)?;
        Self::success(&candidate)
    }

    #[tool(description = "Approve a pending candidate as a new concept and reload the concept index. Returns: {candidate, concept}")]
    async fn approve_candidate(
        &self,
        Parameters(params): Parameters<ApproveCandidateParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = ApproveCandidateRequest {
            candidate_id: parse_uuid("candidate_id", &params.candidate_id)?,
            key: params.key,
            label: params.label,
            aliases: params.aliases.unwrap_or_default(),
            parent: params.parent,
            description: params.description,
            approved_by: params.approved_by,
        };
        info!("✅ Approving candidate {} as {}", request.candidate_id, request.key);

        let outcome = self
            .client
            .approve_candidate(request)
            .await
            .map_err(Self::convert_error)?;
        Self::success(&outcome)
    }

    #[tool(description = "Reject a pending candidate with a reason")]
    async fn reject_candidate(
        &self,
        Parameters(params): Parameters<RejectCandidateParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = RejectCandidateRequest {
            candidate_id: parse_uuid("candidate_id", &params.candidate_id)?,
            reason: params.reason,
            rejected_by: params.rejected_by,
        };
        info!("🚫 Rejecting candidate {}", request.candidate_id);

        let candidate = self
            .client
            .reject_candidate(request)
            .await
            .map_err(Self::convert_error)?;
        Self::success(&candidate)
    }

    #[tool(description = "Delete a concept candidate. Returns: {deleted: true, candidate_id}")]
    async fn delete_candidate(
        &self,
        Parameters(params): Parameters<CandidateIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_uuid("candidate_id", &params.candidate_id)?;
        self.client.delete_candidate(id).await.map_err(Self::convert_error)?;

        warn!("🗑️ Candidate {} deleted", id);
        Self::success(json!({ "deleted": true, "candidate_id": id }))
    }

    #[tool(description = "Idempotently seed the concept taxonomy (inline JSON, server file, or built-in) and reload the index. Returns: {inserted, updated, unchanged}")]
    async fn seed_taxonomy(
        &self,
        Parameters(params): Parameters<SeedTaxonomyParams>,
    ) -> Result<CallToolResult, McpError> {
        let concepts = match (params.taxonomy_json.as_deref(), params.path.as_deref()) {
            (Some(json), _) => TaxonomyLoader::parse(json),
            (None, Some(path)) => TaxonomyLoader::from_path(path),
            (None, None) => TaxonomyLoader::builtin(),
        }
        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        info!("🌱 Seeding {} concepts", concepts.len());

        let report = self
            .client
            .seed_taxonomy(concepts)
            .await
            .map_err(Self::convert_error)?;
        Self::success(&report)
    }

    #[tool(description = "Embed taxonomy concepts and mirror them into the vector store. Returns: {embedded, skipped, vectors_written}")]
    async fn sync_taxonomy_embeddings(
        &self,
        Parameters(params): Parameters<SyncEmbeddingsParams>,
    ) -> Result<CallToolResult, McpError> {
        let report = self
            .client
            .sync_taxonomy_embeddings(params.force.unwrap_or(false))
            .await
            .map_err(Self::convert_error)?;
        Self::success(&report)
    }

    #[tool(description = "Chunk and embed lecturer research text for semantic search. Returns: {lecturers, chunks, skipped, failed}")]
    async fn sync_lecturer_knowledge(
        &self,
        Parameters(params): Parameters<SyncKnowledgeParams>,
    ) -> Result<CallToolResult, McpError> {
        let report = self
            .client
            .sync_lecturer_knowledge(params.lecturer_id.as_deref())
            .await
            .map_err(Self::convert_error)?;
        Self::success(&report)
    }

    #[tool(description = "Rebuild the concept index from the concept store. Returns index statistics")]
    async fn reload_index(&self) -> Result<CallToolResult, McpError> {
        let stats = self.client.reload_index().await.map_err(Self::convert_error)?;
        Self::success(&stats)
    }

    #[tool(description = "Run candidate detection over profiles updated since the last run. A run already in progress makes this a no-op. Returns: {outcome: 'completed' | 'skipped', ...}")]
    async fn run_candidate_detection(&self) -> Result<CallToolResult, McpError> {
        let outcome = self
            .client
            .run_candidate_detection()
            .await
            .map_err(Self::convert_error)?;

        match &outcome {
            JobOutcome::Completed(report) => info!(
                "✅ Detection scanned {} profiles, {} new candidates",
                report.profiles_scanned,
                report.detection.created.len()
            ),
            JobOutcome::Skipped => warn!("⏭️ Detection already running"),
        }
        Self::success(&outcome)
    }
}


#[prompt_router]
impl OntomatchMcpServer {
    #[prompt(
        name = "curation_guide",
        description = "Walk an administrator through reviewing pending concept candidates"
    )]
    async fn curation_guide(
        &self,
        Parameters(args): Parameters<CurationGuideArgs>,
    ) -> Result<GetPromptResult, McpError> {
        let min_frequency = args.min_frequency.unwrap_or(3);

        let messages = vec![
            PromptMessage::new_text(
                PromptMessageRole::User,
                format!(
                    "Review pending concept candidates.

Use list_candidates with status='pending' and sort='frequency'.
For every candidate seen at least {} times:
1. Read its variants and examples
2. Decide whether it names a real research topic
3. Approve it under the suggested parent (or a better one) with approve_candidate
4. Otherwise reject it with a short reason via reject_candidate",
                    min_frequency
                ),
            ),
        ];

        Ok(GetPromptResult {
            description: Some("Concept candidate review".to_string()),
            messages,
        })
    }
}


#[tool_handler]
#[prompt_handler]
impl ServerHandler for OntomatchMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "ontomatch".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Ontomatch - concept ontology matching between students and lecturers. Use \
                 recommend_lecturers for concept-based supervisor matching, search_lecturers for \
                 free-text search, and the candidate tools to grow the taxonomy."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new("config://ontomatch", "ontomatch-config".to_string())
                    .no_annotation(),
                RawResource::new("status://concept-index", "concept-index-status".to_string())
                    .no_annotation(),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match uri.as_str() {
            "config://ontomatch" => {
                let config = self.client.config();

                let content = serde_json::to_string_pretty(&json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "storage": config.storage_backend,
                    "llm": {
                        "provider": config.llm_provider,
                        "model": config.llm_model,
                    },
                    "embedding": {
                        "provider": config.embedding_provider,
                        "model": config.embedding_model,
                        "dimensions": config.embedding_dimensions,
                    },
                    "matching": config.matching,
                    "search": config.search,
                    "evolution": config.evolution,
                })).unwrap_or_default();

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            "status://concept-index" => {
                let index = self.client.index();

                let content = serde_json::to_string_pretty(&json!({
                    "ready": index.is_ready(),
                    "generation": index.generation(),
                    "stats": index.snapshot().stats(),
                })).unwrap_or_default();

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            _ => Err(McpError::resource_not_found(
                format!("Unknown resource: {}", uri),
                Some(json!({ "uri": uri })),
            )),
        }
    }
}


pub async fn run_server() -> anyhow::Result<()> {
    info!("🚀 Initializing Ontomatch MCP Server...");

    let config = OntomatchConfig::from_env();
    let client = OntomatchClient::new(config)?;
    let stats = client.initialize().await?;

    // the memory backend starts without vectors
    if client.config().storage_backend == StorageBackend::Memory {
        match client.sync_lecturer_knowledge(None).await {
            Ok(report) => info!("📚 Indexed {} knowledge chunks", report.chunks),
            Err(e) => warn!("Lecturer knowledge sync failed: {}", e),
        }
    }

    info!("✅ Ontomatch MCP Server ready");
    info!("   📍 Storage: {}", client.config().storage_backend);
    info!(
        "   🤖 LLM: {}/{}",
        client.config().llm_provider,
        client.config().llm_model
    );
    info!("   🧠 Concepts: {} (max depth {})", stats.total_concepts, stats.max_depth);

    let server = OntomatchMcpServer::new(Arc::new(client));
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
