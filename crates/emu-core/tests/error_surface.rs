use emu_core::errors::{EmuError, ErrorInfo};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("rank", 1)
        .with_context("reason", "example")
}

#[test]
fn partition_error_surface() {
    let err = EmuError::Partition(sample_info("partition_no_processes", "no processes"));
    assert_eq!(err.code(), "partition_no_processes");
    assert!(err.info().context.contains_key("rank"));
}

#[test]
fn comm_error_surface() {
    let err = EmuError::Comm(sample_info("comm_timeout", "worker did not respond"));
    assert_eq!(err.info().code, "comm_timeout");
    assert!(err.to_string().starts_with("communication error"));
}

#[test]
fn numerical_error_surface() {
    let err = EmuError::Numerical(sample_info("numerical_singular", "cholesky failed"))
        .with_context("system", 3);
    assert_eq!(err.info().context.get("system").map(String::as_str), Some("3"));
}

#[test]
fn error_display_includes_hint() {
    let err = EmuError::Config(
        ErrorInfo::new("config_threads_env", "bad thread count").with_hint("use a positive integer"),
    );
    let rendered = err.to_string();
    assert!(rendered.contains("config_threads_env"));
    assert!(rendered.contains("hint: use a positive integer"));
}

#[test]
fn error_serializes_with_family_tag() {
    let err = EmuError::Model(sample_info("model_output_len", "short output"));
    let value = serde_json::to_value(&err).unwrap();
    assert_eq!(value["family"], "Model");
    assert_eq!(value["detail"]["code"], "model_output_len");
    let back: EmuError = serde_json::from_value(value).unwrap();
    assert_eq!(back, err);
}
