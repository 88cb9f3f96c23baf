#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// A fresh, empty directory under ./test_docs for one test's input files.
pub fn doc_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from(format!("./test_docs/{}", name));
    if dir.exists() {
        fs::remove_dir_all(&dir).expect("Failed to clear test directory");
    }
    fs::create_dir_all(&dir).expect("Failed to create test directory");
    dir
}

pub fn write_doc(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).expect("Failed to write test document");
}
