//! Rhai binding for the loader.
//!
//! Library modules are evaluated once when registered and stored in a
//! static module resolver, so the entry module (and later libraries) can
//! `import "name" as alias;` them.
//!
//! `Engine::compile` needs the whole script as one `&str`, so `compile`
//! drains the chunked [`ModuleSource`] into a single buffer. Memory stays
//! bounded by the chunk size only up to that seam; past it a module costs
//! its full body length.

use rhai::module_resolvers::StaticModuleResolver;
use rhai::{Dynamic, Engine, Module, Scope, AST};
use tracing::debug;

use crate::bundle::{read_to_end, ModuleSource};
use crate::engine::ScriptEngine;
use crate::error::LoadError;

/// Name of the constant holding the process arguments.
pub const ARGS_CONSTANT: &str = "ARGS";

const UNKNOWN_ERROR: &str = "An error has occurred.";

/// A Rhai engine plus the module cache it resolves imports from.
pub struct RhaiEngine {
    engine: Engine,
    modules: StaticModuleResolver,
    registered: Vec<String>,
    args: rhai::Array,
}

impl RhaiEngine {
    pub fn new() -> Self {
        Self::with_args(Vec::new())
    }

    /// Create an engine exposing `args` to scripts as `ARGS`.
    pub fn with_args(args: Vec<String>) -> Self {
        Self {
            engine: Engine::new(),
            modules: StaticModuleResolver::new(),
            registered: Vec::new(),
            args: args.into_iter().map(Dynamic::from).collect(),
        }
    }

    /// Fresh top-level scope holding `ARGS`.
    fn scope(&self) -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push_constant(ARGS_CONSTANT, self.args.clone());
        scope
    }

    /// Registered module names, first registration order.
    pub fn modules(&self) -> &[String] {
        &self.registered
    }

    /// Whether `name` resolves to a registered module.
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_path(name)
    }
}

impl Default for RhaiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for RhaiEngine {
    type Unit = AST;

    fn compile(&mut self, name: &str, source: &mut dyn ModuleSource) -> Result<AST, LoadError> {
        let body = read_to_end(source)?;
        let script = String::from_utf8(body)
            .map_err(|_| LoadError::compile(name, "module body is not valid UTF-8"))?;

        let mut ast = self
            .engine
            .compile(&script)
            .map_err(|err| LoadError::compile(name, diagnostic(err.to_string())))?;
        ast.set_source(name);
        Ok(ast)
    }

    fn register(&mut self, name: &str, unit: AST) -> Result<(), LoadError> {
        let module = Module::eval_ast_as_new(self.scope(), &unit, &self.engine)
            .map_err(|err| LoadError::compile(name, diagnostic(err.to_string())))?;

        self.modules.insert(name, module);
        self.engine.set_module_resolver(self.modules.clone());
        if !self.registered.iter().any(|m| m == name) {
            self.registered.push(name.to_string());
        }
        Ok(())
    }

    fn execute(&mut self, unit: AST) -> Result<Option<f64>, LoadError> {
        let mut scope = self.scope();
        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &unit)
            .map_err(|err| LoadError::Runtime(diagnostic(err.to_string())))?;

        if let Ok(int) = value.as_int() {
            Ok(Some(int as f64))
        } else if let Ok(float) = value.as_float() {
            Ok(Some(float))
        } else {
            Ok(None)
        }
    }
}

impl Drop for RhaiEngine {
    fn drop(&mut self) {
        debug!(modules = self.registered.len(), "releasing script engine");
    }
}

fn diagnostic(message: String) -> String {
    if message.is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BodyReader;
    use std::io::Cursor;

    fn compile(engine: &mut RhaiEngine, name: &str, script: &str) -> Result<AST, LoadError> {
        let mut file = Cursor::new(script.as_bytes().to_vec());
        let mut buf = Vec::new();
        let mut body = BodyReader::new(&mut file, name, script.len() as u64, &mut buf, 8);
        engine.compile(name, &mut body)
    }

    #[test]
    fn test_numeric_results() {
        let mut engine = RhaiEngine::new();
        let ast = compile(&mut engine, "main", "40 + 2").unwrap();
        assert_eq!(engine.execute(ast).unwrap(), Some(42.0));

        let ast = compile(&mut engine, "main", "2.75").unwrap();
        assert_eq!(engine.execute(ast).unwrap(), Some(2.75));

        let ast = compile(&mut engine, "main", "\"done\"").unwrap();
        assert_eq!(engine.execute(ast).unwrap(), None);
    }

    #[test]
    fn test_syntax_error_names_module() {
        let mut engine = RhaiEngine::new();
        match compile(&mut engine, "broken", "let = ;").unwrap_err() {
            LoadError::Compile { module, message } => {
                assert_eq!(module, "broken");
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut engine = RhaiEngine::new();
        let mut file = Cursor::new(vec![0xFF, 0xFE, 0x00]);
        let mut buf = Vec::new();
        let mut body = BodyReader::new(&mut file, "bin", 3, &mut buf, 8);
        assert!(matches!(
            engine.compile("bin", &mut body),
            Err(LoadError::Compile { .. })
        ));
    }

    #[test]
    fn test_registered_module_is_importable() {
        let mut engine = RhaiEngine::new();
        let lib = compile(&mut engine, "util", "fn answer() { 42 }").unwrap();
        engine.register("util", lib).unwrap();
        assert!(engine.has_module("util"));

        let main = compile(&mut engine, "main", "import \"util\" as u; u::answer()").unwrap();
        assert_eq!(engine.execute(main).unwrap(), Some(42.0));
    }

    #[test]
    fn test_reregistering_replaces_module() {
        let mut engine = RhaiEngine::new();
        let first = compile(&mut engine, "util", "fn answer() { 1 }").unwrap();
        engine.register("util", first).unwrap();
        let second = compile(&mut engine, "util", "fn answer() { 2 }").unwrap();
        engine.register("util", second).unwrap();
        assert_eq!(engine.modules(), ["util".to_string()]);

        let main = compile(&mut engine, "main", "import \"util\" as u; u::answer()").unwrap();
        assert_eq!(engine.execute(main).unwrap(), Some(2.0));
    }

    #[test]
    fn test_runtime_error_is_verbatim() {
        let mut engine = RhaiEngine::new();
        let main = compile(&mut engine, "main", "throw \"bad input\";").unwrap();
        let err = engine.execute(main).unwrap_err();
        assert!(err.is_runtime());
        assert!(err.to_string().contains("bad input"));
    }

    #[test]
    fn test_args_visible_to_entry() {
        let mut engine = RhaiEngine::with_args(vec!["host".into(), "a".into(), "b".into()]);
        let main = compile(&mut engine, "main", "ARGS.len()").unwrap();
        assert_eq!(engine.execute(main).unwrap(), Some(3.0));
    }

    #[test]
    fn test_failing_library_is_load_error() {
        let mut engine = RhaiEngine::new();
        let lib = compile(&mut engine, "util", "throw \"init failed\";").unwrap();
        match engine.register("util", lib).unwrap_err() {
            LoadError::Compile { module, message } => {
                assert_eq!(module, "util");
                assert!(message.contains("init failed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!engine.has_module("util"));
    }
}
