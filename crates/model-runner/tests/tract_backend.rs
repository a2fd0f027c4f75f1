//! Error surfaces of the tract engine that need no real model

use model_runner::{Device, InferenceEngine, ModelRunner, NetworkFiles, RunnerConfig, RunnerError, TractEngine};

#[test]
fn test_missing_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let engine = TractEngine::new();

    let files = NetworkFiles::new(dir.path().join("person-detection.onnx"));
    match engine.read_network(&files) {
        Err(RunnerError::MissingFile(path)) => assert_eq!(path, files.descriptor),
        other => panic!("expected missing descriptor, got {:?}", other.err()),
    }
}

#[test]
fn test_missing_weights() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = dir.path().join("person-detection.onnx");
    std::fs::write(&descriptor, b"not read").unwrap();

    let mut runner = ModelRunner::new(TractEngine::new());
    match runner.load(&descriptor, &Device::Cpu, None) {
        Err(RunnerError::MissingFile(path)) => {
            assert_eq!(path, dir.path().join("person-detection.bin"))
        }
        other => panic!("expected missing weights, got {:?}", other.err()),
    }
    assert!(!runner.is_loaded());
}

#[test]
fn test_malformed_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = dir.path().join("broken.onnx");
    std::fs::write(&descriptor, [0xffu8, 0x00, 0x13, 0x37, 0x42]).unwrap();
    std::fs::write(dir.path().join("broken.bin"), [0u8; 16]).unwrap();

    let mut runner = ModelRunner::new(TractEngine::new());
    let result = runner.load(&descriptor, &Device::Cpu, None);
    assert!(matches!(result, Err(RunnerError::ModelLoad(_))), "got {:?}", result.err());
}

#[test]
fn test_extension_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = TractEngine::new();

    let missing = dir.path().join("libcpu_extension.so");
    assert!(matches!(
        engine.add_extension(&missing, &Device::Cpu),
        Err(RunnerError::MissingFile(_))
    ));

    std::fs::write(&missing, b"\x7fELF").unwrap();
    assert!(matches!(
        engine.add_extension(&missing, &Device::Cpu),
        Err(RunnerError::Extension(_))
    ));
}

#[test]
fn test_from_config_requires_model_path() {
    let config = RunnerConfig::default();
    assert!(matches!(
        ModelRunner::from_config(&config),
        Err(RunnerError::Config(_))
    ));
}
