//! Generated-code execution engine: runs a candidate snippet against a
//! controlled namespace of tables, validates the produced result against the
//! declared contract, and retries with corrected code on failure, bounded by
//! the retry budget.

use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::response;
use crate::script::value::Value;
use crate::table::TableHandle;

pub mod analyzer;
pub mod context;
pub mod executor;
pub mod provenance;
pub mod sandbox;
pub mod validator;

pub use context::ExecutionContext;
pub use validator::OutputType;

/// External collaborator that turns failing code and its diagnostic into a
/// replacement candidate.
pub trait Corrector {
    fn correct(&self, code: &str, diagnostic: &str) -> anyhow::Result<String>;
}

/// Observer invoked with (code, diagnostic) at failure/retry boundaries.
pub type Notification = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Final envelope for a successful run.
#[derive(Debug)]
pub struct RunOutput {
    pub value: Value,
    pub success: bool,
    pub message: String,
    /// Transport-serialized projection of `value`.
    pub response: serde_json::Value,
}

/// One in-flight request's engine. Synchronous and single-use at a time:
/// callers needing concurrency create independent instances.
pub struct ExecutionEngine<'a> {
    tables: &'a [TableHandle],
    config: EngineConfig,
    dependencies: HashMap<String, Value>,
    output_type: Option<OutputType>,
    corrector: Option<&'a dyn Corrector>,
    on_failure: Option<Notification>,
    on_retry: Option<Notification>,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(tables: &'a [TableHandle], config: EngineConfig) -> Self {
        Self {
            tables,
            config,
            dependencies: HashMap::new(),
            output_type: None,
            corrector: None,
            on_failure: None,
            on_retry: None,
        }
    }

    /// Extra named dependency handles merged verbatim into the namespace.
    pub fn with_dependencies(mut self, dependencies: HashMap<String, Value>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = Some(output_type);
        self
    }

    pub fn with_corrector(mut self, corrector: &'a dyn Corrector) -> Self {
        self.corrector = Some(corrector);
        self
    }

    pub fn on_failure(mut self, callback: Notification) -> Self {
        self.on_failure = Some(callback);
        self
    }

    pub fn on_retry(mut self, callback: Notification) -> Self {
        self.on_retry = Some(callback);
        self
    }

    /// Drive execute → validate → (retry | stop) until success or the retry
    /// budget is exhausted. Total attempts never exceed `max_retries + 1`.
    /// On exhaustion the causing error is returned unchanged, never
    /// swallowed or replaced by a default result.
    pub fn run(&self, code: &str, ctx: &ExecutionContext) -> Result<RunOutput, EngineError> {
        let mut attempt = 0usize;
        let mut code = code.to_string();
        loop {
            let attempt_ctx = ctx.for_attempt(attempt);
            match self.attempt(&code, &attempt_ctx) {
                Ok(value) => {
                    info!(
                        correlation_id = %ctx.correlation_id(),
                        attempt,
                        "code executed successfully"
                    );
                    let response = response::serialize(&value);
                    return Ok(RunOutput {
                        value,
                        success: true,
                        message: "code executed successfully".to_string(),
                        response,
                    });
                }
                Err(err) => {
                    let diagnostic = err.to_string();
                    error!(
                        correlation_id = %ctx.correlation_id(),
                        attempt,
                        "execution failed: {diagnostic}"
                    );
                    if let Some(cb) = &self.on_failure {
                        cb(&code, &diagnostic);
                    }
                    if !self.config.use_error_correction_framework
                        || attempt >= self.config.max_retries
                    {
                        return Err(err);
                    }
                    let Some(corrector) = self.corrector else {
                        return Err(err);
                    };
                    attempt += 1;
                    warn!(
                        correlation_id = %ctx.correlation_id(),
                        "retrying with corrected code [retry number: {attempt}]"
                    );
                    if let Some(cb) = &self.on_retry {
                        cb(&code, &diagnostic);
                    }
                    code = match corrector.correct(&code, &diagnostic) {
                        Ok(corrected) => corrected,
                        Err(correction_err) => {
                            error!("corrector failed: {correction_err}");
                            return Err(err);
                        }
                    };
                }
            }
        }
    }

    /// One attempt: analyze → build sandbox → execute → validate. Every
    /// attempt gets a fresh namespace; no state leaks between attempts.
    fn attempt(&self, code: &str, ctx: &ExecutionContext) -> Result<Value, EngineError> {
        let required = analyzer::required_tables(code, self.tables);
        let mut env = sandbox::build(&required, self.tables, &self.config, &self.dependencies)?;
        let value = executor::execute(code, &mut env, ctx)?;
        if let Some(expected) = self.output_type {
            validator::validate_declared(expected, &value)?;
        }
        validator::validate_envelope(&value)?;
        Ok(value)
    }
}
