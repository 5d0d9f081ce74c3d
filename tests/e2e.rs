//! End-to-end integration tests for edgequake-ingest.
//!
//! These tests use real documents in `./test_cases/`, bind the real pdfium
//! library and make live vision API calls. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=./libpdfium.so cargo test --test e2e -- --nocapture
//!
//! Expected files (any missing one skips its test):
//!   test_cases/digital.pdf   a born-digital PDF with a full text layer
//!   test_cases/scanned.pdf   an image-only PDF (no text layer)
//!   test_cases/receipt.jpg   a photographed receipt
//!   test_cases/memo.docx     a short Word document

use edgequake_ingest::pipeline::density::needs_ocr;
use edgequake_ingest::pipeline::input::read_local;
use edgequake_ingest::pipeline::pdf::extract_text_layer;
use edgequake_ingest::{
    FileStatus, IngestConfig, IngestionSession, OcrFailurePolicy, PdfBackend, PdfiumBackend,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_test::assert_ok;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn live_session(config: IngestConfig) -> IngestionSession {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("edgequake_ingest=debug"))
        .with_test_writer()
        .try_init();
    IngestionSession::with_defaults(config).expect("a vision provider must be configured for e2e")
}

/// Assert the plaintext passes basic quality checks.
fn assert_text_quality(text: &str, context: &str) {
    assert!(!text.trim().is_empty(), "[{context}] text is empty");
    assert!(
        !text.lines().next().unwrap_or("").starts_with("```"),
        "[{context}] transcription still wrapped in a code fence"
    );
    let invisible = ['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'];
    for ch in invisible {
        assert!(
            !text.contains(ch),
            "[{context}] text contains invisible char U+{:04X}",
            ch as u32
        );
    }
    println!("[{context}] ✓  {} chars, quality checks passed", text.chars().count());
}

// ── pdfium only (no LLM) ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_pdfium_binds() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }
    assert_ok!(PdfiumBackend::from_env().probe());
}

#[tokio::test]
async fn test_digital_pdf_has_dense_text_layer() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("digital.pdf"));
    let source = assert_ok!(read_local(&path).await);

    let backend: Arc<dyn PdfBackend> = Arc::new(PdfiumBackend::from_env());
    let layer = assert_ok!(extract_text_layer(backend, source.bytes, None).await);
    let text = layer.full_text();

    assert!(layer.page_count() > 0);
    assert!(!needs_ocr(&text, layer.page_count(), 50));
    println!("{} pages, {} chars", layer.page_count(), text.chars().count());
}

#[tokio::test]
async fn test_scanned_pdf_has_sparse_text_layer() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("scanned.pdf"));
    let source = assert_ok!(read_local(&path).await);

    let backend: Arc<dyn PdfBackend> = Arc::new(PdfiumBackend::from_env());
    let layer = assert_ok!(extract_text_layer(backend, source.bytes, None).await);

    assert!(needs_ocr(&layer.full_text(), layer.page_count(), 50));
}

// ── Full pipeline (live LLM) ─────────────────────────────────────────────────

#[tokio::test]
async fn test_scanned_pdf_is_transcribed() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("scanned.pdf"));
    let source = assert_ok!(read_local(&path).await);

    let config = IngestConfig::builder()
        .ocr_failure(OcrFailurePolicy::FailFile)
        .build()
        .unwrap();
    let session = live_session(config);
    let summary = session.submit(vec![source]).await;

    let file = &session.files()[0];
    assert_eq!(summary.ready, 1, "error: {:?}", file.error());
    assert!(file.content().starts_with("--- PAGE 1 ---"));
    assert_eq!(file.ocr_pages, file.page_count.unwrap_or_default());
    assert_text_quality(file.content(), "scanned.pdf");
}

#[tokio::test]
async fn test_receipt_image_is_transcribed() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("receipt.jpg"));
    let source = assert_ok!(read_local(&path).await);

    let session = live_session(IngestConfig::default());
    session.submit(vec![source]).await;

    let file = &session.files()[0];
    assert_eq!(file.status(), FileStatus::Ready, "error: {:?}", file.error());
    assert_text_quality(file.content(), "receipt.jpg");
}

#[tokio::test]
async fn test_mixed_batch_context() {
    let dir = test_cases_dir();
    let digital = e2e_skip_unless_ready!(dir.join("digital.pdf"));
    let memo = e2e_skip_unless_ready!(dir.join("memo.docx"));

    let mut sources = Vec::new();
    for p in [&digital, &memo] {
        sources.push(assert_ok!(read_local(p).await));
    }
    sources.push(edgequake_ingest::SourceFile::new(
        "notes.txt",
        "text/plain",
        b"Meeting moved to Thursday.".to_vec(),
    ));

    let session = live_session(IngestConfig::default());
    let summary = session.submit(sources).await;
    assert_eq!(summary.ready, 3);

    let context = session.context();
    assert!(context.starts_with("FILE: digital.pdf\n"));
    assert!(context.contains("\n\nFILE: memo.docx\n"));
    assert!(context.ends_with("FILE: notes.txt\nMeeting moved to Thursday."));
}
