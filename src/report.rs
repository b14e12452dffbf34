use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::snapshot::{Snapshot, SnapshotError};

/// Writes labelled snapshots to `<base>.txt` and `<base>.csv`.
///
/// Each section is written as its title, the table body and a blank
/// separator. Returns the two paths written.
pub fn export_to_file(
    base: impl AsRef<Path>,
    sections: &[(&str, &Snapshot)],
) -> Result<(PathBuf, PathBuf), SnapshotError> {
    let base = base.as_ref();
    let txt_path = with_suffix(base, "txt");
    let csv_path = with_suffix(base, "csv");

    let mut txt = String::new();
    let mut csv = String::new();
    for (title, snapshot) in sections {
        txt.push_str(title);
        txt.push_str(":\n");
        txt.push_str(&snapshot.to_table());
        txt.push('\n');

        csv.push_str(title);
        csv.push('\n');
        csv.push_str(&snapshot.to_csv());
        csv.push('\n');
    }

    if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&txt_path, txt)?;
    fs::write(&csv_path, csv)?;
    info!(
        txt = %txt_path.display(),
        csv = %csv_path.display(),
        sections = sections.len(),
        "exported results"
    );
    Ok((txt_path, csv_path))
}

fn with_suffix(base: &Path, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
