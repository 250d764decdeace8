//! Common test utilities: distribution archives and properties files.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Zip bytes holding `<root>/bin/tool` and `<root>/lib/tool.jar`.
pub fn distribution_zip(root: &str) -> Vec<u8> {
    zip_bytes(&[
        (&format!("{root}/bin/tool"), b"#!/bin/sh\necho tool\n"),
        (&format!("{root}/lib/tool.jar"), b"jar"),
    ])
}

/// Zip bytes holding the given `(name, content)` entries.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A scratch project: a directory for the properties file and a cache root.
pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Cache root handed to the path assembler.
    pub fn user_home(&self) -> PathBuf {
        self.path().join("user-home")
    }

    /// Write `wrapper/wrapper.properties` and return its path.
    pub fn write_properties(&self, content: &str) -> PathBuf {
        let file = self.path().join("wrapper").join("wrapper.properties");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, content).unwrap();
        file
    }

    /// Write `bytes` under the project directory and return the path.
    pub fn write_file(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let file = self.path().join(relative);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, bytes).unwrap();
        file
    }
}
