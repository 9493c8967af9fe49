//! Single-attempt execution: run one candidate, pull out `result`.

use tracing::debug;

use crate::errors::EngineError;
use crate::script::interp::{self, Env};
use crate::script::parser;
use crate::script::value::Value;

use super::context::ExecutionContext;

/// Parse and run one candidate in the prepared namespace. The executed code
/// must leave a binding named `result`; its value is returned unexamined,
/// validation happens separately.
pub fn execute(code: &str, env: &mut Env, ctx: &ExecutionContext) -> Result<Value, EngineError> {
    debug!(
        correlation_id = %ctx.correlation_id(),
        attempt = ctx.attempt(),
        "executing candidate ({} bytes)",
        code.len()
    );
    let program = parser::parse(code).map_err(EngineError::Execution)?;
    interp::exec(&program, env)?;
    env.get("result").cloned().ok_or(EngineError::NoResultFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_result_binding_fails() {
        let mut env = Env::new();
        let err = execute("x = 1 + 1", &mut env, &ExecutionContext::new()).unwrap_err();
        assert!(matches!(err, EngineError::NoResultFound));
    }

    #[test]
    fn result_binding_is_returned_unexamined() {
        let mut env = Env::new();
        let value = execute(
            "result = {'type': 'bogus', 'value': 1}",
            &mut env,
            &ExecutionContext::new(),
        )
        .unwrap();
        // Executor does not validate; the bogus tag survives to this point.
        assert_eq!(value.as_envelope().unwrap().0, "bogus");
    }

    #[test]
    fn parse_failures_surface_as_execution_errors() {
        let mut env = Env::new();
        let err = execute("result = (", &mut env, &ExecutionContext::new()).unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
    }
}
