//! Shared helpers for the loader integration tests.

#![allow(dead_code)]

use dogfood_runtime::bundle::ModuleSource;
use dogfood_runtime::{LoadError, PayloadBuilder, ScriptEngine};

/// Something the loader asked the engine to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Compile(String),
    Register(String),
    Execute(String),
}

/// A "compiled" module: just the bytes it was built from.
#[derive(Debug, Clone)]
pub struct Unit {
    pub name: String,
    pub body: Vec<u8>,
}

/// Engine that records every call and keeps bodies as compiled units.
#[derive(Default)]
pub struct RecordingEngine {
    pub events: Vec<Event>,
    pub cache: Vec<(String, Vec<u8>)>,
    pub largest_chunk: usize,
    pub reject: Option<String>,
    pub result: Option<f64>,
    pub cache_at_execute: Vec<String>,
}

impl RecordingEngine {
    pub fn returning(result: Option<f64>) -> Self {
        Self {
            result,
            ..Self::default()
        }
    }

    pub fn cached(&self, name: &str) -> Option<&[u8]> {
        self.cache
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, body)| body.as_slice())
    }
}

impl ScriptEngine for RecordingEngine {
    type Unit = Unit;

    fn compile(&mut self, name: &str, source: &mut dyn ModuleSource) -> Result<Unit, LoadError> {
        self.events.push(Event::Compile(name.to_string()));
        assert_eq!(source.module_name(), name);

        let mut body = Vec::new();
        while let Some(chunk) = source.next_chunk()? {
            self.largest_chunk = self.largest_chunk.max(chunk.len());
            body.extend_from_slice(chunk);
        }

        if self.reject.as_deref() == Some(name) {
            return Err(LoadError::compile(name, "rejected by test engine"));
        }
        Ok(Unit {
            name: name.to_string(),
            body,
        })
    }

    fn register(&mut self, name: &str, unit: Unit) -> Result<(), LoadError> {
        self.events.push(Event::Register(name.to_string()));
        match self.cache.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = unit.body,
            None => self.cache.push((name.to_string(), unit.body)),
        }
        Ok(())
    }

    fn execute(&mut self, unit: Unit) -> Result<Option<f64>, LoadError> {
        self.events.push(Event::Execute(unit.name.clone()));
        self.cache_at_execute = self.cache.iter().map(|(n, _)| n.clone()).collect();
        if unit.body == b"fail" {
            return Err(LoadError::Runtime(format!("{} failed", unit.name)));
        }
        Ok(self.result)
    }
}

/// A host of `host_len` filler bytes with the given modules appended.
pub fn image(host_len: usize, entry: (&str, &[u8]), libraries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = PayloadBuilder::new(entry.0, entry.1.to_vec()).unwrap();
    for (name, body) in libraries {
        builder.library(*name, body.to_vec()).unwrap();
    }
    let mut out = Vec::new();
    builder.write_image(&vec![0xE8u8; host_len], &mut out).unwrap();
    out
}
