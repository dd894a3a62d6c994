//! Matrix scripts: the bundled transformation language.
//!
//! - `matrix`: script and rule definitions (what a job compiles into)
//! - `operations`: the function vocabulary rules can chain
//! - `executor`: the interpreter stage and the `ScriptEngine` seam
//!
//! ```text
//! Job mappings ──► MatrixScriptBuilder ──► MatrixScript ──► MatrixEngine
//!                                                              │
//!                      record events ──► MatrixInterpreter ◄───┘
//! ```

pub mod executor;
pub mod matrix;
pub mod operations;

pub use executor::{InterpreterStats, MatrixEngine, MatrixInterpreter, ScriptEngine};
pub use matrix::{example_script, CompiledRule, FieldRule, MatrixScript, RuleInput};
pub use operations::{functions_description, CaseMode, CompiledFunction, Function};
