//! Sandboxed evaluation of extracted decoder fragments

use crate::error::MediaError;
use crate::platform::cipher::DecoderFunction;
use deno_core::{v8, FastString, JsRuntime, RuntimeOptions};
use std::sync::Arc;
use tracing::debug;

/// A loaded entry point, ready to invoke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocable {
    entry_point: String,
}

impl Invocable {
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// Loads decoder fragments and invokes their entry points.
///
/// Implementations must keep evaluated code away from the file system,
/// network and environment. One instance serves one resolution; it is never
/// shared between threads.
pub trait ScriptEvaluator {
    /// Load `decoder.script` and check that its entry point is a function
    fn compile(&mut self, decoder: &DecoderFunction) -> Result<Invocable, MediaError>;

    /// Call the entry point with a single string argument
    fn invoke(&mut self, invocable: &Invocable, arg: &str) -> Result<String, MediaError>;
}

/// Creates a fresh evaluator for each resolution
pub type EvaluatorFactory =
    Arc<dyn Fn() -> Result<Box<dyn ScriptEvaluator>, MediaError> + Send + Sync>;

/// Default factory backed by [`DenoEvaluator`]
pub fn deno_evaluator_factory() -> EvaluatorFactory {
    Arc::new(|| Ok(Box::new(DenoEvaluator::new()?) as Box<dyn ScriptEvaluator>))
}

/// V8 isolate without any ops registered, so scripts have no host access
pub struct DenoEvaluator {
    runtime: JsRuntime,
}

impl DenoEvaluator {
    pub fn new() -> Result<Self, MediaError> {
        let mut runtime = JsRuntime::new(RuntimeOptions::default());
        runtime
            .execute_script(
                "<sandbox>",
                FastString::from(
                    "delete globalThis.Deno; if (typeof Deno !== 'undefined') { globalThis.Deno = undefined; }"
                        .to_string(),
                ),
            )
            .map_err(|e| MediaError::Evaluation(format!("Sandbox setup failed: {}", e)))?;
        Ok(Self { runtime })
    }

    fn eval_to_string(&mut self, name: &'static str, code: String) -> Result<Option<String>, MediaError> {
        let result = self
            .runtime
            .execute_script(name, FastString::from(code))
            .map_err(|e| MediaError::Evaluation(format!("{}", e)))?;

        let scope = &mut self.runtime.handle_scope();
        let local = v8::Local::new(scope, result);
        if local.is_null_or_undefined() {
            return Ok(None);
        }
        Ok(Some(local.to_rust_string_lossy(scope)))
    }
}

impl ScriptEvaluator for DenoEvaluator {
    fn compile(&mut self, decoder: &DecoderFunction) -> Result<Invocable, MediaError> {
        self.runtime
            .execute_script("<decoder>", FastString::from(decoder.script.clone()))
            .map_err(|e| {
                MediaError::Evaluation(format!(
                    "Loading {} failed: {}",
                    decoder.entry_point, e
                ))
            })?;

        let check = format!("typeof {}", decoder.entry_point);
        match self.eval_to_string("<check>", check)?.as_deref() {
            Some("function") => {
                debug!("Loaded decoder entry point {}", decoder.entry_point);
                Ok(Invocable {
                    entry_point: decoder.entry_point.clone(),
                })
            }
            _ => Err(MediaError::Evaluation(format!(
                "Entry point {} is not a function",
                decoder.entry_point
            ))),
        }
    }

    fn invoke(&mut self, invocable: &Invocable, arg: &str) -> Result<String, MediaError> {
        let literal = serde_json::to_string(arg)?;
        let call = format!("{}({})", invocable.entry_point, literal);
        self.eval_to_string("<call>", call)?.ok_or_else(|| {
            MediaError::Evaluation(format!("{} returned no value", invocable.entry_point))
        })
    }
}
