//! Output contract checks, run on every successful execution.

use std::path::Path;

use crate::errors::EngineError;
use crate::script::value::Value;

/// Caller-declared expected result shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Dataframe,
    Plot,
    String,
    Number,
}

impl OutputType {
    pub fn tag(self) -> &'static str {
        match self {
            OutputType::Dataframe => "dataframe",
            OutputType::Plot => "plot",
            OutputType::String => "string",
            OutputType::Number => "number",
        }
    }
}

impl std::str::FromStr for OutputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dataframe" => Ok(OutputType::Dataframe),
            "plot" => Ok(OutputType::Plot),
            "string" => Ok(OutputType::String),
            "number" => Ok(OutputType::Number),
            other => Err(format!(
                "unknown output type `{other}` (expected dataframe, plot, string or number)"
            )),
        }
    }
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Check the result against the declared contract. Collects every violated
/// expectation rather than stopping at the first.
pub fn validate_declared(expected: OutputType, result: &Value) -> Result<(), EngineError> {
    let mut violations = Vec::new();
    match result.as_envelope() {
        None => violations.push(
            "result must be a dict with `type` and `value` keys".to_string(),
        ),
        Some((tag, value)) => {
            if tag != expected.tag() {
                violations.push(format!(
                    "output type must be `{expected}`, the code declared `{tag}`"
                ));
            }
            if let Some(violation) = check_value(expected, value) {
                violations.push(violation);
            }
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(EngineError::InvalidOutputType { violations })
    }
}

fn check_value(expected: OutputType, value: &Value) -> Option<String> {
    match expected {
        OutputType::Number if !value.is_number() => {
            Some(format!("value must be numeric, got `{}`", value.kind()))
        }
        OutputType::String if !matches!(value, Value::Str(_)) => {
            Some(format!("value must be a string, got `{}`", value.kind()))
        }
        OutputType::Dataframe if !matches!(value, Value::Table(_) | Value::Dict(_)) => {
            Some(format!("value must be a dataframe, got `{}`", value.kind()))
        }
        OutputType::Plot => match value {
            Value::Str(path) if Path::new(path).exists() => None,
            Value::Str(path) => Some(format!("chart file `{path}` does not exist")),
            other => Some(format!("value must be a chart file path, got `{}`", other.kind())),
        },
        _ => None,
    }
}

/// Envelope self-consistency: when the result carries its own type tag, the
/// value's runtime kind must agree with it. Raw (non-envelope) results are
/// exempt.
pub fn validate_envelope(result: &Value) -> Result<(), EngineError> {
    let Some((tag, value)) = result.as_envelope() else {
        return Ok(());
    };
    let consistent = match tag {
        "number" => value.is_number(),
        "string" => matches!(value, Value::Str(_)),
        "dataframe" => matches!(value, Value::Table(_) | Value::Dict(_)),
        "plot" => matches!(value, Value::Str(_)),
        _ => false,
    };
    if consistent {
        Ok(())
    } else {
        Err(EngineError::InvalidOutputValueMismatch {
            declared: tag.to_string(),
            actual: value.kind().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::sync::Arc;

    fn envelope(tag: &str, value: Value) -> Value {
        let mut map = BTreeMap::new();
        map.insert("type".to_string(), Value::Str(tag.to_string()));
        map.insert("value".to_string(), value);
        Value::Dict(map)
    }

    #[test]
    fn declared_number_accepts_numeric_envelope() {
        assert!(validate_declared(OutputType::Number, &envelope("number", Value::Int(5))).is_ok());
        assert!(
            validate_declared(OutputType::Number, &envelope("number", Value::Float(5.5))).is_ok()
        );
    }

    #[test]
    fn declared_dataframe_rejects_number_envelope() {
        let err =
            validate_declared(OutputType::Dataframe, &envelope("number", Value::Int(5)))
                .unwrap_err();
        let EngineError::InvalidOutputType { violations } = err else {
            panic!("expected InvalidOutputType");
        };
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn raw_result_violates_declared_contract() {
        let err = validate_declared(OutputType::Number, &Value::Int(5)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidOutputType { .. }));
    }

    #[test]
    fn plot_requires_existing_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "<svg/>").unwrap();
        let path = f.path().to_string_lossy().into_owned();
        assert!(validate_declared(OutputType::Plot, &envelope("plot", Value::Str(path))).is_ok());
        let gone = envelope("plot", Value::Str("/definitely/not/here.svg".to_string()));
        assert!(validate_declared(OutputType::Plot, &gone).is_err());
    }

    #[test]
    fn envelope_mismatch_is_detected() {
        let bad = envelope("number", Value::Str("42".to_string()));
        let err = validate_envelope(&bad).unwrap_err();
        let EngineError::InvalidOutputValueMismatch { declared, actual } = err else {
            panic!("expected InvalidOutputValueMismatch");
        };
        assert_eq!(declared, "number");
        assert_eq!(actual, "str");
    }

    #[test]
    fn envelope_with_unknown_tag_is_a_mismatch() {
        assert!(validate_envelope(&envelope("gif", Value::Int(1))).is_err());
    }

    #[test]
    fn raw_results_skip_envelope_check() {
        assert!(validate_envelope(&Value::Int(7)).is_ok());
        let t = Value::Table(Arc::new(Table::new("t", vec![])));
        assert!(validate_envelope(&t).is_ok());
    }
}
