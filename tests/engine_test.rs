//! End-to-end engine behavior: retry budget, lazy fetching, contracts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;

use tablegpt::config::EngineConfig;
use tablegpt::engine::{
    provenance, Corrector, ExecutionContext, ExecutionEngine, OutputType,
};
use tablegpt::errors::EngineError;
use tablegpt::script::parser;
use tablegpt::script::value::Value;
use tablegpt::table::{Connector, Table, TableHandle};

struct CountingConnector {
    table: Arc<Table>,
    fetches: AtomicUsize,
}

impl CountingConnector {
    fn new(csv: &str) -> Arc<Self> {
        Arc::new(Self {
            table: Arc::new(Table::from_csv("t", csv).unwrap()),
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Connector for CountingConnector {
    fn name(&self) -> &str {
        &self.table.name
    }

    fn fetch(&self) -> Result<Arc<Table>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.clone())
    }
}

/// Corrector returning a fixed replacement, counting invocations.
struct FixedCorrector {
    replacement: String,
    calls: AtomicUsize,
}

impl FixedCorrector {
    fn new(replacement: &str) -> Self {
        Self { replacement: replacement.to_string(), calls: AtomicUsize::new(0) }
    }
}

impl Corrector for FixedCorrector {
    fn correct(&self, _code: &str, _diagnostic: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.replacement.clone())
    }
}

fn counter() -> (Arc<AtomicUsize>, tablegpt::engine::Notification) {
    let count = Arc::new(AtomicUsize::new(0));
    let cloned = count.clone();
    let cb: tablegpt::engine::Notification =
        Box::new(move |_code, _diag| {
            cloned.fetch_add(1, Ordering::SeqCst);
        });
    (count, cb)
}

#[test]
fn number_scenario_skips_unreferenced_table() {
    let first = CountingConnector::new("amount\n1\n2\n");
    let second = CountingConnector::new("amount\n10\n20\n");
    let tables = vec![
        TableHandle::Lazy(first.clone()),
        TableHandle::Lazy(second.clone()),
    ];
    let engine = ExecutionEngine::new(&tables, EngineConfig::default())
        .with_output_type(OutputType::Number);

    let out = engine
        .run(
            "result = {'type': 'number', 'value': dfs[1].sum('amount')}",
            &ExecutionContext::new(),
        )
        .unwrap();

    assert!(out.success);
    assert_eq!(out.message, "code executed successfully");
    let (tag, value) = out.value.as_envelope().unwrap();
    assert_eq!(tag, "number");
    assert_eq!(*value, Value::Int(30));
    assert_eq!(out.response["value"]["value"], serde_json::json!(30));
    assert_eq!(first.fetch_count(), 0, "unreferenced table must never be fetched");
    assert_eq!(second.fetch_count(), 1);
}

#[test]
fn need_all_idiom_fetches_every_table() {
    let first = CountingConnector::new("amount\n1\n");
    let second = CountingConnector::new("amount\n2\n");
    let tables = vec![
        TableHandle::Lazy(first.clone()),
        TableHandle::Lazy(second.clone()),
    ];
    let engine = ExecutionEngine::new(&tables, EngineConfig::default());

    let out = engine
        .run(
            "result = {'type': 'number', 'value': concat(dfs).count()}",
            &ExecutionContext::new(),
        )
        .unwrap();

    assert_eq!(*out.value.as_envelope().unwrap().1, Value::Int(2));
    assert_eq!(first.fetch_count(), 1);
    assert_eq!(second.fetch_count(), 1);
}

#[test]
fn attempts_are_bounded_by_retry_budget() {
    let tables = vec![TableHandle::Materialized(Arc::new(
        Table::from_csv("t", "x\n1\n").unwrap(),
    ))];
    let corrector = FixedCorrector::new("result = still_broken()");
    let (failures, on_failure) = counter();
    let config = EngineConfig { max_retries: 2, ..EngineConfig::default() };
    let engine = ExecutionEngine::new(&tables, config)
        .with_corrector(&corrector)
        .on_failure(on_failure);

    let err = engine
        .run("result = broken()", &ExecutionContext::new())
        .unwrap_err();

    assert!(matches!(err, EngineError::Execution(_)));
    // max_retries + 1 attempts, one failure notification each.
    assert_eq!(failures.load(Ordering::SeqCst), 3);
    assert_eq!(corrector.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn missing_result_binding_raises_no_result_found() {
    let tables = vec![TableHandle::Materialized(Arc::new(
        Table::from_csv("t", "x\n1\n").unwrap(),
    ))];
    // Correction is enabled but no corrector is configured: the engine must
    // re-raise immediately instead of looping.
    let engine = ExecutionEngine::new(&tables, EngineConfig::default());
    let err = engine
        .run("x = dfs[0].count()", &ExecutionContext::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::NoResultFound));
}

#[test]
fn corrected_code_succeeds_on_second_attempt() {
    let tables = vec![TableHandle::Materialized(Arc::new(
        Table::from_csv("t", "amount\n3\n4\n").unwrap(),
    ))];
    let corrector = FixedCorrector::new("result = {'type': 'number', 'value': df.sum('amount')}");
    let (retries, on_retry) = counter();
    let (failures, on_failure) = counter();
    let engine = ExecutionEngine::new(&tables, EngineConfig::default())
        .with_corrector(&corrector)
        .on_retry(on_retry)
        .on_failure(on_failure);

    let out = engine
        .run("result = df.sum('missing')", &ExecutionContext::new())
        .unwrap();

    assert_eq!(*out.value.as_envelope().unwrap().1, Value::Int(7));
    assert_eq!(retries.load(Ordering::SeqCst), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(corrector.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn correction_disabled_reraises_after_first_attempt() {
    let tables = vec![TableHandle::Materialized(Arc::new(
        Table::from_csv("t", "x\n1\n").unwrap(),
    ))];
    let corrector = FixedCorrector::new("result = {'type': 'string', 'value': 'fixed'}");
    let config = EngineConfig { use_error_correction_framework: false, ..EngineConfig::default() };
    let engine = ExecutionEngine::new(&tables, config).with_corrector(&corrector);

    let err = engine
        .run("result = broken()", &ExecutionContext::new())
        .unwrap_err();

    assert!(matches!(err, EngineError::Execution(_)));
    assert_eq!(corrector.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn declared_type_mismatch_is_surfaced_after_budget() {
    let tables = vec![TableHandle::Materialized(Arc::new(
        Table::from_csv("t", "x\n1\n").unwrap(),
    ))];
    let code = "result = {'type': 'number', 'value': 5}";
    let corrector = FixedCorrector::new(code);
    let config = EngineConfig { max_retries: 1, ..EngineConfig::default() };
    let engine = ExecutionEngine::new(&tables, config)
        .with_output_type(OutputType::Dataframe)
        .with_corrector(&corrector);

    let err = engine.run(code, &ExecutionContext::new()).unwrap_err();

    let EngineError::InvalidOutputType { violations } = err else {
        panic!("expected InvalidOutputType, got {err}");
    };
    assert!(violations.iter().any(|v| v.contains("dataframe")));
    assert_eq!(corrector.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn envelope_mismatch_fails_like_an_execution_error() {
    let tables = vec![TableHandle::Materialized(Arc::new(
        Table::from_csv("t", "x\n1\n").unwrap(),
    ))];
    let config = EngineConfig { use_error_correction_framework: false, ..EngineConfig::default() };
    let engine = ExecutionEngine::new(&tables, config);

    let err = engine
        .run("result = {'type': 'number', 'value': 'five'}", &ExecutionContext::new())
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidOutputValueMismatch { .. }));
}

#[test]
fn single_table_alias_is_the_same_object() {
    let table = Arc::new(Table::from_csv("t", "x\n1\n").unwrap());
    let tables = vec![TableHandle::Materialized(table.clone())];
    let engine = ExecutionEngine::new(&tables, EngineConfig::default());

    let out = engine
        .run("result = {'type': 'dataframe', 'value': df}", &ExecutionContext::new())
        .unwrap();

    let (_, value) = out.value.as_envelope().unwrap();
    let Value::Table(returned) = value else { panic!("expected a table") };
    assert!(Arc::ptr_eq(returned, &table), "alias must share the sequence element");
}

#[test]
fn attempts_run_in_fresh_namespaces() {
    let tables = vec![TableHandle::Materialized(Arc::new(
        Table::from_csv("t", "x\n1\n").unwrap(),
    ))];
    // The first attempt binds `leftover` before failing; the corrected code
    // reads it. It must not be visible in the retry's namespace.
    let corrector = FixedCorrector::new("result = {'type': 'number', 'value': leftover}");
    let config = EngineConfig { max_retries: 1, ..EngineConfig::default() };
    let engine = ExecutionEngine::new(&tables, config).with_corrector(&corrector);

    let err = engine
        .run("leftover = 5\nresult = broken()", &ExecutionContext::new())
        .unwrap_err();

    let EngineError::Execution(script_err) = err else {
        panic!("expected an execution error, got {err}");
    };
    assert!(script_err.to_string().contains("leftover"));
}

#[test]
fn provenance_round_trip() {
    let program = parser::parse("x = dfs[2]\nresult = {'type': 'dataframe', 'value': x}").unwrap();
    let assignments = provenance::collect_assignments(&program);
    assert_eq!(
        provenance::resolve_table_alias(2, &assignments, "x").as_deref(),
        Some("table[2]")
    );
    // A use strictly before the assignment resolves to nothing.
    assert_eq!(provenance::resolve_table_alias(0, &assignments, "x"), None);
}

#[test]
fn correlation_id_is_stable_across_attempts() {
    let ctx = ExecutionContext::new();
    let retry = ctx.for_attempt(2);
    assert_eq!(ctx.correlation_id(), retry.correlation_id());
    assert_eq!(retry.attempt(), 2);
}
