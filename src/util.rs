use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Writes `value` as pretty JSON through a sibling temp file that is renamed
/// into place, so readers never see a half-written collection.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }

    let mut data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json for {}", path.display()))?;
    data.push(b'\n');

    let staging = staging_path(path);
    let mut file = File::create(&staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;
    file.write_all(&data)
        .and_then(|()| file.sync_all())
        .with_context(|| format!("failed to write {}", staging.display()))?;
    drop(file);

    fs::rename(&staging, path).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            staging.display(),
            path.display()
        )
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.partial"))
}

/// Thousands-separated rendering used for frequency columns.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_json_pretty_replaces_file_without_leaving_staging_copy() {
        let dir = std::env::temp_dir().join(format!("cdbk-util-{}", std::process::id()));
        let path = dir.join("records.json");

        write_json_pretty(&path, &vec![1, 2]).expect("first write should succeed");
        write_json_pretty(&path, &vec!["a"]).expect("second write should succeed");

        let text = fs::read_to_string(&path).expect("output should be readable");
        assert_eq!(text, "[\n  \"a\"\n]\n");
        assert!(!staging_path(&path).exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn format_count_inserts_thousands_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(15_000_000), "15,000,000");
    }
}
