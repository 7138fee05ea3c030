//! The seam between the loader and a script engine.

use crate::bundle::ModuleSource;
use crate::error::LoadError;

/// A script engine the loader can feed modules into.
///
/// The engine value is the process-wide engine context: it is created
/// once, passed by `&mut` to the loader and the driver, and released when
/// dropped.
pub trait ScriptEngine {
    /// A compiled, not yet executed module.
    type Unit;

    /// Compile the body streamed by `source` under `name`.
    ///
    /// Errors from `source` must be propagated unchanged; engine
    /// diagnostics become [`LoadError::Compile`].
    fn compile(&mut self, name: &str, source: &mut dyn ModuleSource)
        -> Result<Self::Unit, LoadError>;

    /// Make a library module resolvable by name. A later registration
    /// under the same name replaces the earlier one.
    fn register(&mut self, name: &str, unit: Self::Unit) -> Result<(), LoadError>;

    /// Run the entry module. Returns its result if it is numeric.
    ///
    /// Failures raised by the program are [`LoadError::Runtime`].
    fn execute(&mut self, unit: Self::Unit) -> Result<Option<f64>, LoadError>;
}
