use cli::logging::filter_from;

#[test]
fn rust_log_directives_are_honoured() {
    assert_eq!(filter_from(Some("debug")).to_string(), "debug");
    assert_eq!(filter_from(Some("info")).to_string(), "info");
    assert!(filter_from(Some("converter_core=trace"))
        .to_string()
        .contains("converter_core=trace"));
}

#[test]
fn falls_back_to_warn_when_unset() {
    assert_eq!(filter_from(None).to_string(), "warn");
}
