//! End-to-end tests against a real wkhtmltopdf.
//!
//! Each test skips itself when no wkhtmltopdf is installed, so they pass on
//! machines without one. Run with:
//!   cargo test -p pagekit-render --test wkhtmltopdf -- --nocapture

use pagekit_render::{Converter, Output, Settings};

macro_rules! converter_or_skip {
    () => {{
        match Converter::new(Settings::default()) {
            Ok(converter) => converter,
            Err(e) => {
                println!("SKIP: {e}");
                return;
            },
        }
    }};
}

#[test]
fn test_html_to_pdf() {
    let converter = converter_or_skip!();
    let pdf = converter.document("<h1>Oh Hai</h1>").to_pdf().unwrap();
    assert_eq!(&pdf[..4], b"%PDF");
}

#[test]
fn test_html_with_stylesheet_and_meta() {
    let converter = converter_or_skip!();
    let html = r#"<html><head><meta name="pdfkit-orientation" content="Landscape"></head><body>Hai!</body></html>"#;
    let pdf = converter.document(html).with_style("body { font-size: 20px; }").unwrap().to_pdf().unwrap();
    assert_eq!(&pdf[..4], b"%PDF");
}

#[test]
fn test_file_to_file() {
    let converter = converter_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.html");
    std::fs::write(&input, "<p>From a file</p>").unwrap();
    let output = converter.document(input.as_path()).to_file(dir.path().join("output.pdf")).unwrap();
    assert!(matches!(output, Output::Persisted(_)));
    assert_eq!(&std::fs::read(output.path()).unwrap()[..4], b"%PDF");
}

#[test]
fn test_to_temp() {
    let converter = converter_or_skip!();
    let output = converter.document("<p>Temporary</p>").to_temp().unwrap();
    let path = output.path().to_path_buf();
    assert_eq!(&std::fs::read(&path).unwrap()[..4], b"%PDF");
    drop(output);
    assert!(!path.exists());
}
