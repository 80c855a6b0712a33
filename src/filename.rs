//! Canonical file naming under a database directory.
//!
//! Every file the engine creates follows `<number>.<ext>` with the
//! number zero-padded to at least six digits, plus a handful of fixed
//! names (`CURRENT`, `LOCK`, `LOG`). [`parse_file_name`] is the inverse
//! used by `DeleteObsoleteFiles` and by recovery to classify whatever
//! it finds on disk.

use std::path::{Path, PathBuf};

/// What a file under the database directory is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Log,
    DbLock,
    Table,
    Descriptor,
    Current,
    Temp,
    InfoLog,
}

fn numbered(db_path: &Path, number: u64, ext: &str) -> PathBuf {
    db_path.join(format!("{number:06}.{ext}"))
}

pub fn log_file_name(db_path: &Path, number: u64) -> PathBuf {
    numbered(db_path, number, "log")
}

/// New-style SST extension. [`parse_file_name`] also recognizes the
/// legacy `.sst` extension on read, but every table this engine writes
/// uses `.ldb`.
pub fn table_file_name(db_path: &Path, number: u64) -> PathBuf {
    numbered(db_path, number, "ldb")
}

pub fn sst_file_name(db_path: &Path, number: u64) -> PathBuf {
    numbered(db_path, number, "sst")
}

pub fn descriptor_file_name(db_path: &Path, number: u64) -> PathBuf {
    db_path.join(format!("MANIFEST-{number:06}"))
}

pub fn current_file_name(db_path: &Path) -> PathBuf {
    db_path.join("CURRENT")
}

pub fn lock_file_name(db_path: &Path) -> PathBuf {
    db_path.join("LOCK")
}

pub fn info_log_file_name(db_path: &Path) -> PathBuf {
    db_path.join("LOG")
}

pub fn old_info_log_file_name(db_path: &Path) -> PathBuf {
    db_path.join("LOG.old")
}

/// A temp file used while writing `CURRENT` or repairing a table,
/// renamed into place once fully written and synced.
pub fn temp_file_name(db_path: &Path, number: u64) -> PathBuf {
    numbered(db_path, number, "dbtmp")
}

/// Classifies a bare file name (no directory component) found while
/// scanning the database directory. Returns `(file_type, number)`;
/// `number` is `0` for `CURRENT`, `LOCK`, and `LOG`/`LOG.old`, which
/// carry no embedded number.
pub fn parse_file_name(name: &str) -> Option<(FileType, u64)> {
    if name == "CURRENT" {
        return Some((FileType::Current, 0));
    }
    if name == "LOCK" {
        return Some((FileType::DbLock, 0));
    }
    if name == "LOG" || name == "LOG.old" {
        return Some((FileType::InfoLog, 0));
    }
    if let Some(rest) = name.strip_prefix("MANIFEST-") {
        let number = rest.parse::<u64>().ok()?;
        return Some((FileType::Descriptor, number));
    }
    let (stem, ext) = name.rsplit_once('.')?;
    let number = stem.parse::<u64>().ok()?;
    match ext {
        "log" => Some((FileType::Log, number)),
        "ldb" | "sst" => Some((FileType::Table, number)),
        "dbtmp" => Some((FileType::Temp, number)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_file_type() {
        let dir = Path::new("/db");
        let cases: &[(PathBuf, FileType, u64)] = &[
            (log_file_name(dir, 7), FileType::Log, 7),
            (table_file_name(dir, 42), FileType::Table, 42),
            (sst_file_name(dir, 42), FileType::Table, 42),
            (descriptor_file_name(dir, 3), FileType::Descriptor, 3),
            (current_file_name(dir), FileType::Current, 0),
            (lock_file_name(dir), FileType::DbLock, 0),
            (temp_file_name(dir, 9), FileType::Temp, 9),
        ];
        for (path, expected_type, expected_number) in cases {
            let name = path.file_name().unwrap().to_str().unwrap();
            let (ty, number) = parse_file_name(name).unwrap_or_else(|| panic!("failed to parse {name}"));
            assert_eq!(ty, *expected_type, "for {name}");
            assert_eq!(number, *expected_number, "for {name}");
        }
    }

    #[test]
    fn numbers_are_zero_padded_to_six_digits() {
        let path = log_file_name(Path::new("/db"), 7);
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "000007.log");
    }

    #[test]
    fn rejects_garbage_names() {
        assert!(parse_file_name("readme.txt").is_none());
        assert!(parse_file_name("not-a-number.log").is_none());
    }
}
