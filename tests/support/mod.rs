#![allow(dead_code)]

pub mod classfile;

use std::path::Path;

pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    write_jar_with(path, entries, zip::CompressionMethod::Deflated)
}

/// Members are stored uncompressed, so their bytes appear verbatim in the file.
pub fn write_stored_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    write_jar_with(path, entries, zip::CompressionMethod::Stored)
}

fn write_jar_with(
    path: &Path,
    entries: &[(&str, &[u8])],
    method: zip::CompressionMethod,
) -> anyhow::Result<()> {
    use std::io::Write;
    use zip::write::FileOptions;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(method);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

pub fn write_file(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
