//! Test fixtures shared by the integration tests.
//!
//! - Normalization corpus (kind, raw input, expected normalized text)
//! - Shell-script stand-ins for the TeX compiler and rasterizer

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use latex2image::PictureKind;

/// Path to the normalization corpus
pub fn normalize_corpus_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/normalize_corpus.json")
}

/// One normalization case from normalize_corpus.json
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NormalizeCase {
    pub name: String,
    pub kind: PictureKind,
    pub input: String,
    pub expected: String,
}

#[derive(Debug, serde::Deserialize)]
struct Corpus {
    cases: Vec<NormalizeCase>,
}

pub fn load_normalize_corpus() -> Vec<NormalizeCase> {
    let text = fs::read_to_string(normalize_corpus_path()).expect("read normalize corpus");
    let corpus: Corpus = serde_json::from_str(&text).expect("parse normalize corpus");
    corpus.cases
}

/// Compiler stand-in: copies the .tex into figure.pdf, or fails with a TeX
/// style log when the document contains BROKEN.
pub const FAKE_COMPILER: &str = r#"#!/bin/sh
out=""
tex=""
while [ $# -gt 0 ]; do
    case "$1" in
        -output-directory) out="$2"; shift 2 ;;
        -*) shift ;;
        *) tex="$1"; shift ;;
    esac
done
if grep -q BROKEN "$tex"; then
    echo "! Undefined control sequence." > "$out/figure.log"
    exit 1
fi
cp "$tex" "$out/figure.pdf"
"#;

/// ImageMagick stand-in: `convert -density DPI in.pdf out.png`.
pub const FAKE_CONVERT: &str = r#"#!/bin/sh
{ echo "density=$2"; cat "$3"; } > "$4"
"#;

/// Write an executable script into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, body).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}
