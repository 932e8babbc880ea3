//! Mapping script evaluator
//!
//! A mapping script is a rhai snippet, not a function declaration. It is
//! re-executed in full for every event against one persistent scope owned by
//! its `MappingScript` instance. Before each run the parsed event is bound as
//! `event`; the script's final expression is read back as the result object.
//!
//! Cross-event state lives in the `state` object map, created empty at load
//! time and carried in the scope across runs:
//!
//! ```rhai
//! if !("sum" in state) { state.sum = 0.0; state.count = 0; }
//! state.sum += event.amount;
//! state.count += 1;
//! #{ sample: "kick", pitch: state.sum / state.count, volume: 0.4 }
//! ```
//!
//! Script-local `let` bindings are discarded between runs; only `state`
//! persists.
//!
//! # Error policy
//!
//! Evaluation never returns an error. Malformed event JSON, compile failures,
//! runtime errors and non-object results all degrade to the neutral
//! `PlaybackParams` and a log line. Missing result fields fall back to their
//! defaults independently.
//!
//! # Concurrency
//!
//! The persistent scope is not safe for concurrent mutation. `evaluate` takes
//! `&mut self` and the runner only ever calls it from the session's single
//! pipeline task.

use pulse_common::params::PlaybackParams;
use pulse_common::Result;
use rhai::{Dynamic, Engine, Map, Scope, AST};
use tracing::{debug, warn};

/// Name the parsed event is bound to before each run
const EVENT_VAR: &str = "event";
/// Name of the persistent accumulator map
const STATE_VAR: &str = "state";

/// Sandbox limits: a mapping script maps one event, it does not compute
const MAX_OPERATIONS: u64 = 500_000;
const MAX_EXPR_DEPTH: usize = 64;
const MAX_FN_EXPR_DEPTH: usize = 32;
const MAX_CALL_LEVELS: usize = 24;
const MAX_STRING_SIZE: usize = 100_000;
const MAX_ARRAY_SIZE: usize = 10_000;
const MAX_MAP_SIZE: usize = 10_000;

/// One loaded mapping script with its persistent state
pub struct MappingScript {
    engine: Engine,
    scope: Scope<'static>,
    source: String,
    /// Compiled lazily on first evaluate so that content errors surface at
    /// evaluation time, not load time
    ast: Option<AST>,
    /// Set when compilation failed; the source will never compile, stop trying
    poisoned: bool,
    released: bool,
}

impl MappingScript {
    /// Create an evaluator for the given script source
    ///
    /// Never fails on script content; errors in the source surface on the
    /// first `evaluate` call.
    pub fn load(source: &str) -> Result<Self> {
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FN_EXPR_DEPTH);
        engine.set_max_call_levels(MAX_CALL_LEVELS);
        engine.set_max_string_size(MAX_STRING_SIZE);
        engine.set_max_array_size(MAX_ARRAY_SIZE);
        engine.set_max_map_size(MAX_MAP_SIZE);

        let mut scope = Scope::new();
        scope.push(STATE_VAR, Map::new());

        Ok(Self {
            engine,
            scope,
            source: source.to_string(),
            ast: None,
            poisoned: false,
            released: false,
        })
    }

    /// Map one raw event to playback parameters
    ///
    /// `raw` is the unmodified payload from the transport and is expected to
    /// be a JSON document.
    pub fn evaluate(&mut self, raw: &str) -> PlaybackParams {
        if self.released {
            debug!("evaluate called on released script");
            return PlaybackParams::silent();
        }

        let event = match Self::parse_event(raw) {
            Some(event) => event,
            None => return PlaybackParams::silent(),
        };

        if self.ast.is_none() && !self.poisoned {
            match self.engine.compile(&self.source) {
                Ok(ast) => self.ast = Some(ast),
                Err(e) => {
                    warn!("mapping script failed to compile: {e}");
                    self.poisoned = true;
                }
            }
        }
        let Some(ast) = self.ast.as_ref() else {
            return PlaybackParams::silent();
        };

        // Keep `state` (index 0), drop the previous event and any top-level
        // `let` bindings left behind by the last run
        self.scope.rewind(1);
        self.scope.push_dynamic(EVENT_VAR, event);

        match self.engine.eval_ast_with_scope::<Dynamic>(&mut self.scope, ast) {
            Ok(result) => match result.try_cast::<Map>() {
                Some(map) => params_from_map(&map),
                None => {
                    debug!("mapping script result is not an object map");
                    PlaybackParams::silent()
                }
            },
            Err(e) => {
                warn!("mapping script execution failed: {e}");
                PlaybackParams::silent()
            }
        }
    }

    /// Discard interpreter resources; safe to call multiple times
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.ast = None;
        self.scope.clear();
    }

    fn parse_event(raw: &str) -> Option<Dynamic> {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("event is not valid JSON: {e}");
                return None;
            }
        };
        match rhai::serde::to_dynamic(&value) {
            Ok(dynamic) => Some(dynamic),
            Err(e) => {
                warn!("event could not be bound into the script scope: {e}");
                None
            }
        }
    }
}

/// Read the script's result object, falling back per missing field
fn params_from_map(map: &Map) -> PlaybackParams {
    let defaults = PlaybackParams::default();
    PlaybackParams {
        sample: map
            .get("sample")
            .and_then(|v| v.clone().into_string().ok())
            .filter(|s| !s.is_empty()),
        pitch: map.get("pitch").and_then(as_number).unwrap_or(defaults.pitch),
        volume: map
            .get("volume")
            .and_then(as_number)
            .unwrap_or(defaults.volume),
        duration_ms: map.get("duration").and_then(as_integer),
    }
}

fn as_number(value: &Dynamic) -> Option<f64> {
    value
        .as_float()
        .ok()
        .or_else(|| value.as_int().ok().map(|i| i as f64))
}

fn as_integer(value: &Dynamic) -> Option<i64> {
    value
        .as_int()
        .ok()
        .or_else(|| value.as_float().ok().map(|f| f as i64))
}
