//! End-to-end question handler: build the prompt, obtain a code candidate,
//! run it through the execution engine, print the result.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use owo_colors::OwoColorize;

use crate::{
    cli::Cli,
    config::{Config, EngineConfig},
    engine::{ExecutionContext, ExecutionEngine, OutputType},
    llm::{ChatOptions, LlmClient, LlmCorrector},
    printer, prompt,
    script::value::{NativeFn, Value},
    script::ScriptError,
    table::{Table, TableHandle},
};

pub async fn run(args: &Cli, question: &str) -> Result<()> {
    let cfg = Config::load();

    if args.table.is_empty() {
        bail!("provide at least one --table file");
    }
    let mut tables = Vec::new();
    for path in &args.table {
        tables.push(TableHandle::from_path(Path::new(path), args.lazy)?);
    }

    let mut engine_cfg = EngineConfig::from_config(&cfg);
    if let Some(max_retries) = args.max_retries {
        engine_cfg.max_retries = max_retries;
    }
    if args.no_correction {
        engine_cfg.use_error_correction_framework = false;
    }
    if args.direct_sql {
        engine_cfg.direct_sql = true;
    }

    let output_type = args
        .output_type
        .as_deref()
        .map(OutputType::from_str)
        .transpose()
        .map_err(|e| anyhow!(e))?;

    // The correlation id is fixed before execution so artifact names can be
    // derived from it; the naming convention is ours, not the engine's.
    let ctx = ExecutionContext::new();
    let chart_path = cfg.charts_path().join(format!("{}.svg", ctx.correlation_id()));
    let dependencies = chart_dependencies(&chart_path);

    let model = args
        .model
        .clone()
        .or_else(|| cfg.get("DEFAULT_MODEL"))
        .unwrap_or_else(|| "gpt-4o".to_string());
    let opts = ChatOptions {
        model,
        temperature: args.temperature,
        top_p: args.top_p,
        max_tokens: None,
    };

    let code = match &args.code {
        Some(snippet) => snippet.clone(),
        None => {
            if question.trim().is_empty() {
                bail!("provide a question or --code");
            }
            let client = LlmClient::from_config(&cfg)?;
            let messages = prompt::generation_messages(&tables, question, output_type);
            let text = client.complete(messages, opts.clone()).await?;
            prompt::strip_code_fences(&text)
        }
    };
    if args.show_code {
        eprintln!("{}\n{}", "generated code:".cyan(), code);
    }

    let corrector = if engine_cfg.use_error_correction_framework {
        Some(LlmCorrector::new(LlmClient::from_config(&cfg)?, opts))
    } else {
        None
    };

    let mut engine = ExecutionEngine::new(&tables, engine_cfg).with_dependencies(dependencies);
    if let Some(ty) = output_type {
        engine = engine.with_output_type(ty);
    }
    if let Some(corrector) = &corrector {
        engine = engine.with_corrector(corrector);
    }

    // The engine is synchronous; keep it (and the corrector's bridge back
    // into the runtime) off the async path.
    let output = tokio::task::block_in_place(|| engine.run(&code, &ctx))?;
    printer::print_output(&output);
    Ok(())
}

/// Extra namespace handles for chart output: `save_chart(df)` writes an SVG
/// named after the correlation id and returns its path.
fn chart_dependencies(chart_path: &Path) -> HashMap<String, Value> {
    let path = chart_path.to_path_buf();
    let func: NativeFn = Arc::new(move |args: &[Value]| {
        let [Value::Table(table)] = args else {
            return Err(ScriptError::Type("save_chart() takes one dataframe".to_string()));
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ScriptError::Runtime(format!("failed to create chart dir: {e}")))?;
        }
        let svg = render_svg_bars(table);
        fs::write(&path, svg)
            .map_err(|e| ScriptError::Runtime(format!("failed to write chart: {e}")))?;
        Ok(Value::Str(path.to_string_lossy().into_owned()))
    });
    HashMap::from([("save_chart".to_string(), Value::callable("save_chart", func))])
}

/// Minimal bar chart: first numeric column as bar lengths, first non-numeric
/// column (if any) as labels.
fn render_svg_bars(table: &Table) -> String {
    let numeric = table
        .columns
        .iter()
        .find(|c| c.numeric().next().is_some());
    let labels = table
        .columns
        .iter()
        .find(|c| c.numeric().next().is_none());

    let values: Vec<f64> = numeric.map(|c| c.numeric().collect()).unwrap_or_default();
    let max = values.iter().cloned().fold(1.0_f64, f64::max);
    let bar_h = 18;
    let height = values.len() * (bar_h + 4) + 20;

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"640\" height=\"{height}\">"
    );
    for (i, v) in values.iter().enumerate() {
        let y = 10 + i * (bar_h + 4);
        let w = (v / max * 480.0).max(1.0) as usize;
        let label = labels
            .and_then(|c| c.values.get(i))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let _ = write!(
            svg,
            "<rect x=\"120\" y=\"{y}\" width=\"{w}\" height=\"{bar_h}\" fill=\"steelblue\"/>\
             <text x=\"4\" y=\"{ty}\" font-size=\"12\">{label}</text>\
             <text x=\"{tx}\" y=\"{ty}\" font-size=\"12\">{v}</text>",
            ty = y + bar_h - 4,
            tx = 124 + w,
        );
    }
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_chart_writes_and_returns_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.svg");
        let deps = chart_dependencies(&path);
        let Value::Callable { func, .. } = &deps["save_chart"] else { panic!() };
        let table = Arc::new(
            Table::from_csv("t", "region,amount\nnorth,10\nsouth,25\n").unwrap(),
        );
        let out = func(&[Value::Table(table)]).unwrap();
        assert_eq!(out, Value::Str(path.to_string_lossy().into_owned()));
        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("north"));
    }
}
