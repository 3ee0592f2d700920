//! §4.F request orchestrator: the 8-step dispatch flow (classify, parse,
//! resolve a provider, pivot through the canonical model, dispatch with
//! retry, and render the result in the client's dialect).

pub mod wire;

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;

use multigate_common::{ErrorKind, GatewayError, GlobalConfig, PromptLogMode, SystemPromptMode, retry_backoff};
use multigate_provider_core::{
    AdapterError, ByteStream, Credential, Headers, Outcome, ProviderEntry, ProviderPool,
    ProviderRegistry, prefix,
};
use multigate_storage::PoolFileStore;
use multigate_transform::canonical::CanonicalRequest;
use multigate_transform::{
    GenerateContentRequest, GenerateContentResponse, ModelListResponse, Op, Proto, StreamEvent,
    TransformContext, convert, new_stream_transformer, stream_format,
};

use crate::bootstrap::Bootstrap;
use crate::classify::{ProxyRoute, classify_request};
use crate::metrics::MetricsCore;

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub type BodyStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

/// Framework-agnostic request shape; the router crate adapts its web
/// framework's request type into this at the HTTP boundary.
pub struct ProxyRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Headers,
    pub body: Bytes,
}

pub enum EngineResponse {
    Unary {
        status: u16,
        content_type: &'static str,
        body: Bytes,
    },
    Stream {
        status: u16,
        content_type: &'static str,
        body: BodyStream,
    },
}

impl EngineResponse {
    fn error(dialect: Proto, err: &GatewayError) -> Self {
        let (status, body) = render_error_body(dialect, err);
        EngineResponse::Unary {
            status,
            content_type: "application/json",
            body,
        }
    }
}

pub struct ProxyEngine {
    config: GlobalConfig,
    registry: Arc<ProviderRegistry>,
    pool: Arc<ProviderPool>,
    store: Arc<PoolFileStore>,
    metrics: Arc<MetricsCore>,
    system_prompt: Option<String>,
}

impl ProxyEngine {
    pub fn from_bootstrap(bootstrap: &Bootstrap) -> Self {
        Self {
            config: bootstrap.config.clone(),
            registry: bootstrap.registry.clone(),
            pool: bootstrap.pool.clone(),
            store: bootstrap.store.clone(),
            metrics: bootstrap.metrics.clone(),
            system_prompt: bootstrap.system_prompt.clone(),
        }
    }

    pub async fn handle(&self, req: ProxyRequest) -> EngineResponse {
        let (route, path_kind_override) =
            classify_request(&req.method, &req.path, req.query.as_deref(), &req.headers);

        let dialect_guess = match &route {
            ProxyRoute::Generate { dialect, .. } | ProxyRoute::ModelList { dialect } => *dialect,
            _ => Proto::OpenAIChat,
        };

        if let Err(err) = crate::auth::check_api_key(
            &self.config.required_api_key,
            &req.headers,
            req.query.as_deref(),
        ) {
            return EngineResponse::error(dialect_guess, &err);
        }

        if req.body.len() > MAX_BODY_BYTES {
            let err = GatewayError::bad_request("request body exceeds the 8 MiB limit");
            return EngineResponse::error(dialect_guess, &err);
        }

        let trace_id = multigate_common::new_trace_id();
        let started = Instant::now();
        tracing::info!(
            event = "request_received",
            trace_id = %trace_id,
            method = %req.method,
            path = %req.path,
        );

        let response = match route {
            ProxyRoute::Generate {
                dialect,
                op,
                model_from_path,
            } => {
                self.handle_generate(dialect, op, model_from_path, path_kind_override, &req)
                    .await
            }
            ProxyRoute::ModelList { dialect } => self.handle_model_list(dialect).await,
            ProxyRoute::OllamaTags => self.handle_ollama_tags().await,
            ProxyRoute::OllamaVersion => handle_ollama_version(),
            ProxyRoute::OllamaShow => self.handle_ollama_show(&req.body),
            ProxyRoute::NotFound => {
                let err = GatewayError::new(ErrorKind::NotFound, "no route matches this request");
                EngineResponse::error(dialect_guess, &err)
            }
        };

        let (status, is_stream) = match &response {
            EngineResponse::Unary { status, .. } => (*status, false),
            EngineResponse::Stream { status, .. } => (*status, true),
        };
        tracing::info!(
            event = "request_finished",
            trace_id = %trace_id,
            method = %req.method,
            path = %req.path,
            status,
            is_stream,
            latency_ms = started.elapsed().as_millis() as u64,
        );

        response
    }

    async fn handle_generate(
        &self,
        dialect: Proto,
        op: Op,
        model_from_path: Option<String>,
        path_kind_override: Option<String>,
        req: &ProxyRequest,
    ) -> EngineResponse {
        let parsed = match parse_generate_request(dialect, op, model_from_path, &req.path, &req.body)
        {
            Ok(p) => p,
            Err(err) => return EngineResponse::error(dialect, &err),
        };

        let raw_model = request_model(&parsed.request).to_string();
        let (display_kind, stripped_model) = prefix::strip_display_prefix(&raw_model);
        let model = stripped_model.to_string();

        let kind = path_kind_override
            .or_else(|| display_kind.map(|k| k.to_string()))
            .or_else(|| prefix::classify_fallback(&model).map(|k| k.to_string()))
            .unwrap_or_else(|| self.config.model_provider.clone());

        let mut current_entry = match self.pool.select(&kind, &model) {
            Ok(entry) => entry,
            Err(err) => return EngineResponse::error(dialect, &err),
        };

        let Some(provider_proto) = prefix::protocol_of(&current_entry.kind) else {
            let err = GatewayError::internal(format!(
                "provider kind {} has no known protocol",
                current_entry.kind
            ));
            return EngineResponse::error(dialect, &err);
        };

        let Some(provider) = self.registry.get(&current_entry.kind) else {
            let err = GatewayError::internal(format!(
                "no adapter registered for kind {}",
                current_entry.kind
            ));
            return EngineResponse::error(dialect, &err);
        };

        let mut client_request = parsed.request;
        set_request_model(&mut client_request, model.clone());

        let mut canonical = convert::request_to_canonical(client_request);
        self.apply_system_prompt(&mut canonical);
        let provider_request = convert::request_from_canonical(provider_proto, canonical);

        let outbound_body = match serialize_generate_request(&provider_request) {
            Ok(bytes) => bytes,
            Err(err) => return EngineResponse::error(dialect, &err),
        };

        self.log_prompt(&outbound_body).await;

        let wants_stream = parsed.stream;
        self.metrics.request_started();
        let started = Instant::now();

        let mut attempt = 0u32;
        loop {
            let credential = current_entry.credentials.clone();
            let dispatch_result = if wants_stream {
                provider
                    .generate_content_stream(&credential, &model, outbound_body.clone())
                    .await
                    .map(DispatchOutcome::Stream)
            } else {
                provider
                    .generate_content(&credential, &model, outbound_body.clone())
                    .await
                    .map(DispatchOutcome::Unary)
            };

            match dispatch_result {
                Ok(DispatchOutcome::Unary(outcome)) => {
                    self.persist_refresh(&current_entry, outcome.refreshed);
                    return self.finish_unary(
                        dialect,
                        provider_proto,
                        current_entry.kind.clone(),
                        started,
                        outcome.value,
                    );
                }
                Ok(DispatchOutcome::Stream(outcome)) => {
                    self.persist_refresh(&current_entry, outcome.refreshed);
                    self.metrics.request_finished(
                        current_entry.kind.clone(),
                        0,
                        0,
                        started.elapsed().as_millis() as u64,
                        false,
                    );
                    let body = pump_stream(outcome.value, provider_proto, dialect);
                    return EngineResponse::Stream {
                        status: 200,
                        content_type: wire::content_type_for_stream(dialect),
                        body,
                    };
                }
                Err(adapter_err) => {
                    let gw = classify_adapter_error(&adapter_err);
                    self.pool
                        .mark_unhealthy(&current_entry.kind, current_entry.uuid, gw.message.clone());
                    tracing::warn!(
                        event = "adapter_error",
                        kind = %current_entry.kind,
                        status = adapter_err.status,
                        message = %gw.message,
                    );

                    if gw.kind.is_retryable() && attempt < self.config.request_max_retries {
                        tokio::time::sleep(retry_backoff(self.config.request_base_delay_ms, attempt))
                            .await;
                        attempt += 1;
                        match self.pool.select(&kind, &model) {
                            Ok(next_entry) => {
                                current_entry = next_entry;
                                continue;
                            }
                            Err(err) => {
                                self.metrics.request_finished(
                                    current_entry.kind.clone(),
                                    0,
                                    0,
                                    started.elapsed().as_millis() as u64,
                                    true,
                                );
                                return EngineResponse::error(dialect, &err);
                            }
                        }
                    }

                    self.metrics.request_finished(
                        current_entry.kind.clone(),
                        0,
                        0,
                        started.elapsed().as_millis() as u64,
                        true,
                    );
                    return EngineResponse::error(dialect, &gw);
                }
            }
        }
    }

    fn finish_unary(
        &self,
        dialect: Proto,
        provider_proto: Proto,
        provider_kind: String,
        started: Instant,
        body: Bytes,
    ) -> EngineResponse {
        let provider_resp = match parse_generate_response(provider_proto, &body) {
            Ok(r) => r,
            Err(err) => {
                self.metrics.request_finished(
                    provider_kind,
                    0,
                    0,
                    started.elapsed().as_millis() as u64,
                    true,
                );
                return EngineResponse::error(dialect, &err);
            }
        };

        let canonical = convert::response_to_canonical(provider_resp);
        let input_tokens = canonical.usage.input_tokens as u64;
        let output_tokens = canonical.usage.output_tokens as u64;
        let client_resp = convert::response_from_canonical(dialect, canonical);

        let body = match serialize_generate_response(&client_resp) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.metrics.request_finished(
                    provider_kind,
                    input_tokens,
                    output_tokens,
                    started.elapsed().as_millis() as u64,
                    true,
                );
                return EngineResponse::error(dialect, &err);
            }
        };

        self.metrics.request_finished(
            provider_kind,
            input_tokens,
            output_tokens,
            started.elapsed().as_millis() as u64,
            false,
        );
        EngineResponse::Unary {
            status: 200,
            content_type: "application/json",
            body,
        }
    }

    async fn handle_model_list(&self, dialect: Proto) -> EngineResponse {
        let list = self.collect_canonical_models().await;
        match convert::model_list_from_canonical(dialect, list) {
            Ok(resp) => match serialize_model_list(&resp) {
                Ok(body) => EngineResponse::Unary {
                    status: 200,
                    content_type: "application/json",
                    body,
                },
                Err(err) => EngineResponse::error(dialect, &err),
            },
            Err(_) => EngineResponse::error(
                dialect,
                &GatewayError::internal("unsupported model-list dialect"),
            ),
        }
    }

    async fn handle_ollama_tags(&self) -> EngineResponse {
        let list = self.collect_canonical_models().await;
        match convert::model_list_from_canonical(Proto::Ollama, list) {
            Ok(resp) => match serialize_model_list(&resp) {
                Ok(body) => EngineResponse::Unary {
                    status: 200,
                    content_type: "application/json",
                    body,
                },
                Err(err) => EngineResponse::error(Proto::Ollama, &err),
            },
            Err(_) => EngineResponse::error(
                Proto::Ollama,
                &GatewayError::internal("unsupported model-list dialect"),
            ),
        }
    }

    fn handle_ollama_show(&self, body: &Bytes) -> EngineResponse {
        let parsed: convert::ollama_types::ShowRequest = match serde_json::from_slice(body) {
            Ok(p) => p,
            Err(e) => {
                return EngineResponse::error(
                    Proto::Ollama,
                    &GatewayError::bad_request(format!("invalid show request: {e}")),
                );
            }
        };
        let (_, stripped_model) = prefix::strip_display_prefix(&parsed.name);
        let details = convert::ollama_types::ModelDetails::default();
        let num_ctx = convert::ollama_types::context_window_for_model(stripped_model);
        let num_predict = convert::ollama_types::max_output_tokens_for_model(stripped_model);
        let response = convert::ollama_types::ShowResponse {
            modelfile: format!(
                "FROM {stripped_model}\nPARAMETER num_ctx {num_ctx}\nPARAMETER num_predict {num_predict}\n"
            ),
            parameters: format!("num_ctx                       {num_ctx}\nnum_predict                    {num_predict}\n"),
            template: String::new(),
            details,
        };
        let body = match serde_json::to_vec(&response) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                return EngineResponse::error(
                    Proto::Ollama,
                    &GatewayError::internal(format!("failed to encode show response: {e}")),
                );
            }
        };
        EngineResponse::Unary {
            status: 200,
            content_type: "application/json",
            body,
        }
    }

    /// Queries every registered kind with at least one non-disabled pool
    /// entry and merges their model lists into one canonical view.
    async fn collect_canonical_models(&self) -> multigate_transform::canonical::CanonicalModelList {
        let document = self.pool.document();
        let mut models = Vec::new();
        for (kind, entries) in document.entries.iter() {
            let Some(entry) = entries.iter().find(|e| !e.is_disabled) else {
                continue;
            };
            let Some(provider) = self.registry.get(kind) else {
                continue;
            };
            let Ok(outcome) = provider.list_models(&entry.credentials).await else {
                continue;
            };
            for info in outcome.value {
                models.push(multigate_transform::canonical::ModelEntry {
                    id: prefix::with_display_prefix(kind, &info.id),
                    display_name: info.display_name,
                    created: None,
                });
            }
        }
        multigate_transform::canonical::CanonicalModelList { models }
    }

    fn apply_system_prompt(&self, canonical: &mut CanonicalRequest) {
        let Some(prompt) = &self.system_prompt else {
            return;
        };
        match self.config.system_prompt_mode {
            SystemPromptMode::Off => {}
            SystemPromptMode::Override => canonical.system = Some(prompt.clone()),
            SystemPromptMode::Append => {
                canonical.system = Some(match canonical.system.take() {
                    Some(existing) if !existing.is_empty() => format!("{existing}\n\n{prompt}"),
                    _ => prompt.clone(),
                });
            }
        }
    }

    async fn log_prompt(&self, body: &Bytes) {
        match self.config.prompt_log_mode {
            PromptLogMode::None => {}
            PromptLogMode::Console => {
                tracing::debug!(event = "prompt_log", prompt = %String::from_utf8_lossy(body));
            }
            PromptLogMode::File => {
                let path = format!("{}.log", self.config.prompt_log_base_name);
                if let Ok(mut file) = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await
                {
                    use tokio::io::AsyncWriteExt;
                    let _ = file.write_all(body).await;
                    let _ = file.write_all(b"\n").await;
                }
            }
        }
    }

    /// Rotated credentials are written back to the pool immediately and
    /// flushed to disk on a detached task; the response path never waits
    /// on the round-trip.
    fn persist_refresh(&self, entry: &ProviderEntry, refreshed: Option<Credential>) {
        let Some(credential) = refreshed else {
            return;
        };
        let mut updated = entry.clone();
        updated.credentials = credential;
        self.pool.update(&entry.kind, updated);

        let store = self.store.clone();
        let document = self.pool.document();
        tokio::spawn(async move {
            let _ = store.store(document).await;
        });
    }
}

fn handle_ollama_version() -> EngineResponse {
    let response = convert::ollama_types::VersionResponse {
        version: "0.1.0".to_string(),
    };
    let body = Bytes::from(serde_json::to_vec(&response).unwrap_or_default());
    EngineResponse::Unary {
        status: 200,
        content_type: "application/json",
        body,
    }
}

enum DispatchOutcome {
    Unary(Outcome<Bytes>),
    Stream(Outcome<ByteStream>),
}

struct ParsedGenerate {
    request: GenerateContentRequest,
    stream: bool,
}

fn parse_generate_request(
    dialect: Proto,
    op: Op,
    model_from_path: Option<String>,
    path: &str,
    body: &Bytes,
) -> Result<ParsedGenerate, GatewayError> {
    use convert::{claude_types, gemini_types, ollama_types, openai_chat_types, openai_responses_types};

    match dialect {
        Proto::Claude => {
            let parsed: claude_types::CreateMessageRequest = serde_json::from_slice(body)
                .map_err(|e| GatewayError::bad_request(format!("invalid claude request body: {e}")))?;
            let stream = parsed.stream;
            Ok(ParsedGenerate {
                stream,
                request: GenerateContentRequest::Claude(parsed),
            })
        }
        Proto::OpenAIChat => {
            let parsed: openai_chat_types::CreateChatCompletionRequest = serde_json::from_slice(body)
                .map_err(|e| {
                    GatewayError::bad_request(format!("invalid openai chat request body: {e}"))
                })?;
            let stream = parsed.stream;
            Ok(ParsedGenerate {
                stream,
                request: GenerateContentRequest::OpenAIChat(parsed),
            })
        }
        Proto::OpenAIResponse => {
            let parsed: openai_responses_types::CreateResponseRequest = serde_json::from_slice(body)
                .map_err(|e| {
                    GatewayError::bad_request(format!("invalid openai responses request body: {e}"))
                })?;
            let stream = parsed.stream;
            Ok(ParsedGenerate {
                stream,
                request: GenerateContentRequest::OpenAIResponse(parsed),
            })
        }
        Proto::Gemini => {
            let mut parsed: gemini_types::GenerateContentRequest = serde_json::from_slice(body)
                .map_err(|e| GatewayError::bad_request(format!("invalid gemini request body: {e}")))?;
            parsed.model = model_from_path.unwrap_or_default();
            let stream = op == Op::StreamGenerateContent;
            Ok(ParsedGenerate {
                stream,
                request: GenerateContentRequest::Gemini(parsed),
            })
        }
        Proto::Ollama => {
            if path.trim_end_matches('/').ends_with("/api/generate") {
                let parsed: ollama_types::GenerateRequest = serde_json::from_slice(body)
                    .map_err(|e| {
                        GatewayError::bad_request(format!("invalid ollama generate body: {e}"))
                    })?;
                let stream = parsed.stream;
                let mut messages = Vec::new();
                if let Some(system) = parsed.system {
                    messages.push(ollama_types::OllamaMessage {
                        role: ollama_types::Role::System,
                        content: system,
                    });
                }
                messages.push(ollama_types::OllamaMessage {
                    role: ollama_types::Role::User,
                    content: parsed.prompt,
                });
                let chat = ollama_types::ChatRequest {
                    model: parsed.model,
                    messages,
                    stream,
                    options: parsed.options,
                };
                Ok(ParsedGenerate {
                    stream,
                    request: GenerateContentRequest::Ollama(chat),
                })
            } else {
                let parsed: ollama_types::ChatRequest = serde_json::from_slice(body)
                    .map_err(|e| GatewayError::bad_request(format!("invalid ollama chat body: {e}")))?;
                let stream = parsed.stream;
                Ok(ParsedGenerate {
                    stream,
                    request: GenerateContentRequest::Ollama(parsed),
                })
            }
        }
    }
}

fn request_model(req: &GenerateContentRequest) -> &str {
    match req {
        GenerateContentRequest::Claude(r) => &r.model,
        GenerateContentRequest::OpenAIChat(r) => &r.model,
        GenerateContentRequest::OpenAIResponse(r) => &r.model,
        GenerateContentRequest::Gemini(r) => &r.model,
        GenerateContentRequest::Ollama(r) => &r.model,
    }
}

fn set_request_model(req: &mut GenerateContentRequest, model: String) {
    match req {
        GenerateContentRequest::Claude(r) => r.model = model,
        GenerateContentRequest::OpenAIChat(r) => r.model = model,
        GenerateContentRequest::OpenAIResponse(r) => r.model = model,
        GenerateContentRequest::Gemini(r) => r.model = model,
        GenerateContentRequest::Ollama(r) => r.model = model,
    }
}

fn serialize_generate_request(req: &GenerateContentRequest) -> Result<Bytes, GatewayError> {
    let err = |e: serde_json::Error| GatewayError::internal(format!("failed to encode request: {e}"));
    let bytes = match req {
        GenerateContentRequest::Claude(r) => serde_json::to_vec(r).map_err(err)?,
        GenerateContentRequest::OpenAIChat(r) => serde_json::to_vec(r).map_err(err)?,
        GenerateContentRequest::OpenAIResponse(r) => serde_json::to_vec(r).map_err(err)?,
        GenerateContentRequest::Gemini(r) => serde_json::to_vec(r).map_err(err)?,
        GenerateContentRequest::Ollama(r) => serde_json::to_vec(r).map_err(err)?,
    };
    Ok(Bytes::from(bytes))
}

fn parse_generate_response(
    proto: Proto,
    body: &Bytes,
) -> Result<GenerateContentResponse, GatewayError> {
    let err = |e: serde_json::Error| {
        GatewayError::new(
            ErrorKind::UpstreamServerError,
            format!("failed to parse upstream response: {e}"),
        )
        .with_upstream_body(String::from_utf8_lossy(body).to_string())
    };
    Ok(match proto {
        Proto::Claude => GenerateContentResponse::Claude(serde_json::from_slice(body).map_err(err)?),
        Proto::OpenAIChat => {
            GenerateContentResponse::OpenAIChat(serde_json::from_slice(body).map_err(err)?)
        }
        Proto::OpenAIResponse => {
            GenerateContentResponse::OpenAIResponse(serde_json::from_slice(body).map_err(err)?)
        }
        Proto::Gemini => GenerateContentResponse::Gemini(serde_json::from_slice(body).map_err(err)?),
        Proto::Ollama => GenerateContentResponse::Ollama(serde_json::from_slice(body).map_err(err)?),
    })
}

fn serialize_generate_response(resp: &GenerateContentResponse) -> Result<Bytes, GatewayError> {
    let err = |e: serde_json::Error| GatewayError::internal(format!("failed to encode response: {e}"));
    let bytes = match resp {
        GenerateContentResponse::Claude(r) => serde_json::to_vec(r).map_err(err)?,
        GenerateContentResponse::OpenAIChat(r) => serde_json::to_vec(r).map_err(err)?,
        GenerateContentResponse::OpenAIResponse(r) => serde_json::to_vec(r).map_err(err)?,
        GenerateContentResponse::Gemini(r) => serde_json::to_vec(r).map_err(err)?,
        GenerateContentResponse::Ollama(r) => serde_json::to_vec(r).map_err(err)?,
    };
    Ok(Bytes::from(bytes))
}

fn serialize_model_list(resp: &ModelListResponse) -> Result<Bytes, GatewayError> {
    let err = |e: serde_json::Error| GatewayError::internal(format!("failed to encode model list: {e}"));
    let bytes = match resp {
        ModelListResponse::Claude(r) => serde_json::to_vec(r).map_err(err)?,
        ModelListResponse::OpenAIChat(r) => serde_json::to_vec(r).map_err(err)?,
        ModelListResponse::Gemini(r) => serde_json::to_vec(r).map_err(err)?,
        ModelListResponse::Ollama(r) => serde_json::to_vec(r).map_err(err)?,
    };
    Ok(Bytes::from(bytes))
}

/// `status == 0` marks a transport-level failure (connect/read timeout,
/// DNS, TLS) rather than a real upstream status line.
fn classify_adapter_error(err: &AdapterError) -> GatewayError {
    if err.status == 0 {
        return GatewayError::new(ErrorKind::UpstreamTimeout, err.message.clone());
    }
    let body = err.upstream_body.clone().unwrap_or_default();
    GatewayError::from_upstream_status(err.status, body)
}

/// Drives an upstream byte stream through the decode -> canonical-pivot
/// transform -> encode pipeline, one client-framed chunk at a time.
fn pump_stream(upstream: ByteStream, src: Proto, dst: Proto) -> BodyStream {
    struct PumpState {
        upstream: ByteStream,
        decoder: wire::StreamDecoder,
        transformer: multigate_transform::StreamTransformer,
        dst: Proto,
        pending: VecDeque<Bytes>,
        finished: bool,
    }

    let state = PumpState {
        decoder: wire::StreamDecoder::new(src, stream_format(src)),
        transformer: new_stream_transformer(TransformContext {
            src,
            dst,
            src_op: Op::StreamGenerateContent,
            dst_op: Op::StreamGenerateContent,
        }),
        upstream,
        dst,
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.pending.pop_front() {
                return Some((chunk, state));
            }
            if state.finished {
                return None;
            }

            match state.upstream.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.push_bytes(&chunk) {
                        encode_into(&mut state.transformer, state.dst, event, &mut state.pending);
                    }
                }
                Some(Err(err)) => {
                    let gw = classify_adapter_error(&err);
                    state.pending.push_back(render_stream_error(state.dst, &gw));
                    state.finished = true;
                }
                None => {
                    for event in state.decoder.finish() {
                        encode_into(&mut state.transformer, state.dst, event, &mut state.pending);
                    }
                    if state.dst == Proto::OpenAIChat {
                        state.pending.push_back(wire::encode_openai_chat_done());
                    }
                    state.finished = true;
                }
            }
        }
    }))
}

fn encode_into(
    transformer: &mut multigate_transform::StreamTransformer,
    dst: Proto,
    event: StreamEvent,
    pending: &mut VecDeque<Bytes>,
) {
    let Ok(out_events) = transformer.feed(event) else {
        return;
    };
    for out in out_events {
        if let Some(bytes) = wire::encode_stream_event(dst, &out) {
            pending.push_back(bytes);
        }
    }
}

fn render_error_body(dialect: Proto, err: &GatewayError) -> (u16, Bytes) {
    let status = err.kind.status_code();
    let body = match dialect {
        Proto::Claude => serde_json::json!({
            "type": "error",
            "error": { "type": anthropic_error_type(err.kind), "message": err.message },
        }),
        Proto::OpenAIChat | Proto::OpenAIResponse => serde_json::json!({
            "error": {
                "message": err.message,
                "type": openai_error_type(err.kind),
                "code": serde_json::Value::Null,
            },
        }),
        Proto::Gemini => serde_json::json!({
            "error": {
                "code": status,
                "message": err.message,
                "status": gemini_error_status(err.kind),
            },
        }),
        Proto::Ollama => serde_json::json!({ "error": err.message }),
    };
    (status, Bytes::from(serde_json::to_vec(&body).unwrap_or_default()))
}

/// §7's single terminal stream event, framed per dialect.
fn render_stream_error(dialect: Proto, err: &GatewayError) -> Bytes {
    let (_, body) = render_error_body(dialect, err);
    let data = String::from_utf8_lossy(&body);
    match dialect {
        Proto::Claude | Proto::OpenAIResponse => {
            Bytes::from(format!("event: error\ndata: {data}\n\n"))
        }
        Proto::OpenAIChat | Proto::Gemini => Bytes::from(format!("data: {data}\n\n")),
        Proto::Ollama => Bytes::from(format!("{data}\n")),
    }
}

fn anthropic_error_type(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Unauthorized => "authentication_error",
        ErrorKind::Forbidden => "permission_error",
        ErrorKind::NotFound => "not_found_error",
        ErrorKind::RateLimited => "rate_limit_error",
        ErrorKind::BadRequest | ErrorKind::ProtocolMismatch => "invalid_request_error",
        _ => "api_error",
    }
}

fn openai_error_type(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Unauthorized => "authentication_error",
        ErrorKind::Forbidden => "permission_error",
        ErrorKind::RateLimited => "rate_limit_error",
        ErrorKind::BadRequest | ErrorKind::ProtocolMismatch | ErrorKind::NotFound => {
            "invalid_request_error"
        }
        _ => "server_error",
    }
}

fn gemini_error_status(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::BadRequest | ErrorKind::ProtocolMismatch => "INVALID_ARGUMENT",
        ErrorKind::Unauthorized => "UNAUTHENTICATED",
        ErrorKind::Forbidden => "PERMISSION_DENIED",
        ErrorKind::NotFound => "NOT_FOUND",
        ErrorKind::RateLimited => "RESOURCE_EXHAUSTED",
        ErrorKind::UpstreamServerError
        | ErrorKind::UpstreamTimeout
        | ErrorKind::NoHealthyProvider
        | ErrorKind::Internal => "INTERNAL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_matches_dialect_shape() {
        let err = GatewayError::new(ErrorKind::RateLimited, "slow down");

        let (status, body) = render_error_body(Proto::Claude, &err);
        assert_eq!(status, 429);
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["error"]["type"], "rate_limit_error");

        let (_, body) = render_error_body(Proto::Gemini, &err);
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["status"], "RESOURCE_EXHAUSTED");
    }

    #[test]
    fn stream_error_uses_named_event_for_anthropic_dialects() {
        let err = GatewayError::new(ErrorKind::Internal, "boom");
        let framed = render_stream_error(Proto::Claude, &err);
        let text = String::from_utf8(framed.to_vec()).unwrap();
        assert!(text.starts_with("event: error\n"));

        let framed = render_stream_error(Proto::OpenAIChat, &err);
        let text = String::from_utf8(framed.to_vec()).unwrap();
        assert!(text.starts_with("data: "));
        assert!(!text.starts_with("event:"));
    }

    #[test]
    fn transport_failure_classifies_as_upstream_timeout() {
        let adapter_err = AdapterError::transport("connect timed out");
        let gw = classify_adapter_error(&adapter_err);
        assert_eq!(gw.kind, ErrorKind::UpstreamTimeout);
    }

    #[test]
    fn ollama_generate_body_becomes_a_single_user_message_chat_request() {
        let body = Bytes::from(
            serde_json::to_vec(&serde_json::json!({
                "model": "llama3",
                "prompt": "hello",
                "system": "be terse",
                "stream": false
            }))
            .unwrap(),
        );
        let parsed =
            parse_generate_request(Proto::Ollama, Op::GenerateContent, None, "/api/generate", &body)
                .unwrap();
        match parsed.request {
            GenerateContentRequest::Ollama(chat) => {
                assert_eq!(chat.messages.len(), 2);
                assert_eq!(chat.messages[1].content, "hello");
            }
            _ => panic!("expected an ollama chat request"),
        }
    }
}
