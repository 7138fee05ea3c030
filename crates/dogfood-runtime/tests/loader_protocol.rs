//! Loader protocol tests against a recording engine.

mod common;

use common::{image, Event, RecordingEngine};
use dogfood_runtime::bundle::{BoundsPolicy, BundleLoader, LoaderConfig};
use dogfood_runtime::{driver, FormatError, LoadError};
use std::io::Cursor;

fn load(bytes: Vec<u8>, engine: &mut RecordingEngine) -> Result<common::Unit, LoadError> {
    BundleLoader::new(Cursor::new(bytes))
        .load(engine)
        .map(|bundle| bundle.entry)
}

// ────────────────────────────────────────────────────────────────────────────
// Ordering
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_libraries_registered_before_entry_compiles() {
    let bytes = image(
        128,
        ("main", b"entry code"),
        &[("a", b"alpha"), ("b", b"beta")],
    );
    let mut engine = RecordingEngine::default();
    let entry = load(bytes, &mut engine).unwrap();

    assert_eq!(entry.name, "main");
    assert_eq!(entry.body, b"entry code");
    assert_eq!(
        engine.events,
        vec![
            Event::Compile("a".into()),
            Event::Register("a".into()),
            Event::Compile("b".into()),
            Event::Register("b".into()),
            Event::Compile("main".into()),
        ]
    );
}

#[test]
fn test_layout_example_loads() {
    let mut bytes = vec![0u8; 0x100];
    bytes.extend_from_slice(b"\r\n-- main 00000010\r\n");
    bytes.extend_from_slice(b"return util::x;\n");
    bytes.extend_from_slice(b"\r\n-- util 00000005\r\n");
    bytes.extend_from_slice(b"x = 1");
    bytes.extend_from_slice(b"\r\n-- dogfood 00000100\r\n");

    let mut engine = RecordingEngine::default();
    let entry = load(bytes, &mut engine).unwrap();

    assert_eq!(entry.name, "main");
    assert_eq!(entry.body, b"return util::x;\n");
    assert_eq!(engine.cache, vec![("util".to_string(), b"x = 1".to_vec())]);
}

#[test]
fn test_entry_sees_full_cache_when_executed() {
    let bytes = image(16, ("main", b"run"), &[("marker", b"set"), ("other", b"x")]);
    let mut engine = RecordingEngine::returning(Some(42.0));

    let code = driver::run_image(Cursor::new(bytes), &mut engine, LoaderConfig::default()).unwrap();

    assert_eq!(code, 42);
    assert_eq!(engine.cache_at_execute, vec!["marker", "other"]);
    assert_eq!(engine.events.last(), Some(&Event::Execute("main".into())));
}

#[test]
fn test_entry_only_payload() {
    let mut engine = RecordingEngine::default();
    let entry = load(image(0, ("main", b"solo"), &[]), &mut engine).unwrap();
    assert_eq!(entry.body, b"solo");
    assert!(engine.cache.is_empty());
}

// ────────────────────────────────────────────────────────────────────────────
// Module cache
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_duplicate_library_last_wins() {
    let bytes = image(
        8,
        ("main", b"m"),
        &[("util", b"first"), ("io", b"io"), ("util", b"second")],
    );
    let mut engine = RecordingEngine::default();
    load(bytes, &mut engine).unwrap();

    assert_eq!(engine.cache.len(), 2);
    assert_eq!(engine.cached("util"), Some(&b"second"[..]));
    assert_eq!(engine.cached("io"), Some(&b"io"[..]));
    assert_eq!(engine.cache[0].0, "util");
}

#[test]
fn test_empty_library_body_is_allowed() {
    let bytes = image(8, ("main", b"m"), &[("empty", b"")]);
    let mut engine = RecordingEngine::default();
    load(bytes, &mut engine).unwrap();
    assert_eq!(engine.cached("empty"), Some(&b""[..]));
}

// ────────────────────────────────────────────────────────────────────────────
// Streaming
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_bodies_arrive_in_bounded_chunks() {
    let big = vec![b'z'; 10_000];
    let bytes = image(64, ("main", &big[..]), &[("lib", &big[..777])]);
    let config = LoaderConfig {
        chunk_capacity: 256,
        ..LoaderConfig::default()
    };
    let mut engine = RecordingEngine::default();
    let bundle = BundleLoader::with_config(Cursor::new(bytes), config)
        .load(&mut engine)
        .unwrap();

    assert_eq!(engine.largest_chunk, 256);
    assert_eq!(bundle.entry.body.len(), 10_000);
    assert_eq!(engine.cached("lib").map(<[u8]>::len), Some(777));
}

#[test]
fn test_records_cover_payload_exactly() {
    let bytes = image(300, ("main", b"0123456789abcdef"), &[("util", b"hello"), ("x", b"")]);
    let mut engine = RecordingEngine::default();
    let bundle = BundleLoader::new(Cursor::new(bytes)).load(&mut engine).unwrap();
    let dir = bundle.directory;

    assert_eq!(dir.span.start, 300);
    let mut cursor = dir.span.start;
    for record in dir.records() {
        assert_eq!(record.header_offset, cursor);
        cursor = record.end();
    }
    assert_eq!(cursor, dir.span.end);
}

// ────────────────────────────────────────────────────────────────────────────
// Failures
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_compile_error_aborts_loading() {
    let bytes = image(8, ("main", b"m"), &[("a", b"1"), ("bad", b"2"), ("c", b"3")]);
    let mut engine = RecordingEngine {
        reject: Some("bad".into()),
        ..RecordingEngine::default()
    };

    match load(bytes, &mut engine).unwrap_err() {
        LoadError::Compile { module, .. } => assert_eq!(module, "bad"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!engine.events.contains(&Event::Compile("c".into())));
    assert!(!engine.events.contains(&Event::Compile("main".into())));
}

#[test]
fn test_missing_trailer() {
    let mut engine = RecordingEngine::default();
    let err = load(vec![0u8; 100], &mut engine).unwrap_err();
    assert!(matches!(err, LoadError::Format(FormatError::MissingTrailer)));
    assert!(engine.events.is_empty());
}

#[test]
fn test_truncated_trailer_is_not_misread() {
    let mut bytes = image(8, ("main", b"m"), &[]);
    bytes.pop();
    let mut engine = RecordingEngine::default();
    let err = load(bytes, &mut engine).unwrap_err();
    assert!(matches!(err, LoadError::Format(FormatError::MissingTrailer)));
}

#[test]
fn test_overrunning_library_rejected() {
    let mut bytes = b"\r\n-- main 00000001\r\nm".to_vec();
    bytes.extend_from_slice(b"\r\n-- util 00000100\r\nshort");
    bytes.extend_from_slice(b"\r\n-- dogfood 00000000\r\n");
    let mut engine = RecordingEngine::default();

    match load(bytes, &mut engine).unwrap_err() {
        LoadError::Format(FormatError::Overrun { module, .. }) => assert_eq!(module, "util"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(engine.events.is_empty());
}

#[test]
fn test_truncated_body_is_short_read() {
    // Lenient bounds let the body run into the trailer and then off the end
    // of the file.
    let mut bytes = b"\r\n-- main 00000001\r\nm".to_vec();
    bytes.extend_from_slice(b"\r\n-- util 00000100\r\nshort");
    bytes.extend_from_slice(b"\r\n-- dogfood 00000000\r\n");
    let config = LoaderConfig {
        bounds: BoundsPolicy::Lenient,
        ..LoaderConfig::default()
    };
    let mut engine = RecordingEngine::default();

    let err = BundleLoader::with_config(Cursor::new(bytes), config)
        .load(&mut engine)
        .map(|_| ())
        .unwrap_err();
    match err {
        LoadError::ShortRead {
            module,
            expected,
            read,
        } => {
            assert_eq!(module, "util");
            assert_eq!(expected, 0x100);
            assert_eq!(read, 5 + 23);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(engine.cache.is_empty());
}

#[test]
fn test_runtime_error_exit_code() {
    let bytes = image(8, ("main", b"fail"), &[]);
    let mut engine = RecordingEngine::default();
    let result = driver::run_image(Cursor::new(bytes), &mut engine, LoaderConfig::default());

    let err = result.unwrap_err();
    assert!(err.is_runtime());
    let mut out = Vec::new();
    assert_eq!(driver::report(&err, &mut out), 1);
    assert_eq!(String::from_utf8(out).unwrap(), "main failed\n");
}

#[test]
fn test_non_numeric_result_exits_zero() {
    let bytes = image(8, ("main", b"m"), &[]);
    let mut engine = RecordingEngine::returning(None);
    let code = driver::run_image(Cursor::new(bytes), &mut engine, LoaderConfig::default()).unwrap();
    assert_eq!(code, 0);
}
