//! Executor abstraction for structured model calls.
//!
//! The [`Executor`] trait decouples the agents from the model backend. A
//! backend receives a prompt and a JSON Schema and must write a single JSON
//! document to `output_path`. Loading then validates that document against the
//! same schema before decoding it into a typed value, so agents only ever see
//! well-formed output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use jsonschema::Draft;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::agents::AgentError;
use crate::io::gemini::GeminiExecutor;
use crate::io::process::run_command;

/// Parameters for one model call.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Directory holding this call's artifacts; also the backend's cwd.
    pub workdir: PathBuf,
    pub prompt: String,
    /// JSON Schema that constrains the output document.
    pub output_schema_path: PathBuf,
    /// Where the backend must write the output JSON.
    pub output_path: PathBuf,
    /// Raw backend log (process output or HTTP response).
    pub log_path: PathBuf,
    pub timeout: Duration,
    /// Truncate backend logs beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl ExecRequest {
    /// Standard artifact layout inside `workdir`.
    pub fn in_dir(workdir: &Path, prompt: String, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            prompt,
            output_schema_path: workdir.join("output.schema.json"),
            output_path: workdir.join("output.json"),
            log_path: workdir.join("backend.log"),
            timeout,
            output_limit_bytes,
        }
    }
}

/// Abstraction over model backends.
pub trait Executor {
    /// Run the model. Must write its JSON answer to `request.output_path`.
    fn exec(&self, request: &ExecRequest) -> Result<()>;
}

/// Backend that spawns `codex exec` with an output schema.
#[derive(Debug, Clone, Default)]
pub struct CodexExecutor {
    pub model: Option<String>,
}

impl Executor for CodexExecutor {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        info!(workdir = %request.workdir.display(), "starting codex exec");
        if !request.output_schema_path.exists() {
            return Err(anyhow!(
                "missing output schema {}",
                request.output_schema_path.display()
            ));
        }

        let mut cmd = Command::new("codex");
        cmd.arg("exec")
            // Drafting never needs to touch the filesystem.
            .arg("--sandbox")
            .arg("read-only")
            .arg("--skip-git-repo-check");
        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }
        cmd.arg("--output-schema")
            .arg(&request.output_schema_path)
            .arg("--output-last-message")
            .arg(&request.output_path)
            .arg("-")
            .current_dir(&request.workdir);

        let output = run_command(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .context("run codex exec")?;
        write_log(
            &request.log_path,
            &output.render_log("codex"),
            request.output_limit_bytes,
        )?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "codex exec timed out");
            return Err(anyhow!("codex exec timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "codex exec failed");
            return Err(anyhow!(
                "codex exec failed with status {:?}",
                output.status.code()
            ));
        }
        debug!("codex exec completed successfully");
        Ok(())
    }
}

/// Backend selected from configuration at startup.
pub enum Backend {
    Codex(CodexExecutor),
    Gemini(GeminiExecutor),
}

impl Executor for Backend {
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        match self {
            Backend::Codex(codex) => codex.exec(request),
            Backend::Gemini(gemini) => gemini.exec(request),
        }
    }
}

/// Write `schema` next to the request, run the backend, then validate and
/// decode its output.
#[instrument(skip_all, fields(output_path = %request.output_path.display()))]
pub fn execute_and_load_json<E: Executor + ?Sized, T: DeserializeOwned>(
    executor: &E,
    request: &ExecRequest,
    schema: &str,
) -> Result<T, AgentError> {
    write_file(&request.output_schema_path, schema).map_err(AgentError::Backend)?;
    executor.exec(request).map_err(AgentError::Backend)?;

    if !request.output_path.exists() {
        return Err(AgentError::MissingOutput(request.output_path.clone()));
    }
    let contents = fs::read_to_string(&request.output_path)
        .with_context(|| format!("read model output {}", request.output_path.display()))
        .map_err(AgentError::Backend)?;
    let instance: Value = serde_json::from_str(&contents)
        .map_err(|err| AgentError::Decode(format!("output is not JSON: {err}")))?;

    let schema: Value = serde_json::from_str(schema)
        .map_err(|err| AgentError::Backend(anyhow!("invalid output schema: {err}")))?;
    let violations = schema_violations(&instance, &schema).map_err(AgentError::Backend)?;
    if !violations.is_empty() {
        warn!(count = violations.len(), "model output violates schema");
        return Err(AgentError::Schema(violations.join("; ")));
    }

    let value = serde_json::from_value(instance).map_err(|err| AgentError::Decode(err.to_string()))?;
    debug!("model output validated");
    Ok(value)
}

/// Validate `instance` against `schema` (Draft 2020-12), returning every violation.
pub fn schema_violations(instance: &Value, schema: &Value) -> Result<Vec<String>> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| anyhow!("compile json schema: {err}"))?;
    Ok(compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

/// Write a backend log, truncated to `limit` bytes on a char boundary.
pub fn write_log(path: &Path, body: &str, limit: usize) -> Result<()> {
    if body.len() <= limit {
        return write_file(path, body);
    }
    let mut cut = limit;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    let truncated = format!("{}\n[truncated {} bytes]\n", &body[..cut], body.len() - cut);
    write_file(path, &truncated)
}
