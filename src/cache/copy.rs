//! Staleness-guarded artifact placement.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Source must be at least this much newer than the destination to be copied.
pub const MTIME_TOLERANCE: Duration = Duration::from_secs(1);

/// What [`copy_if_newer`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    UpToDate,
    SourceMissing,
}

/// Copy `src` to `dest` unless `dest` is already current.
///
/// Parent directories of `dest` are created. The copy is written to a hidden
/// sibling temp file and renamed into place, so readers never observe a
/// partially written destination.
pub fn copy_if_newer(src: &Path, dest: &Path) -> io::Result<CopyOutcome> {
    let src_meta = match fs::metadata(src) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CopyOutcome::SourceMissing),
        Err(e) => return Err(e),
    };

    if let Ok(dest_meta) = fs::metadata(dest) {
        if !is_newer(src_meta.modified()?, dest_meta.modified()?) {
            tracing::trace!(dest = %dest.display(), "destination up to date");
            return Ok(CopyOutcome::UpToDate);
        }
    }

    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(parent)?;
    io::copy(&mut File::open(src)?, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| e.error)?;

    tracing::debug!(src = %src.display(), dest = %dest.display(), "copied artifact");
    Ok(CopyOutcome::Copied)
}

fn is_newer(src: SystemTime, dest: SystemTime) -> bool {
    src.duration_since(dest)
        .map(|delta| delta > MTIME_TOLERANCE)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_copies_when_destination_missing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("figure.png");
        fs::write(&src, b"png").unwrap();
        let dest = dir.path().join("cache/equation/abc.png");

        assert_eq!(copy_if_newer(&src, &dest).unwrap(), CopyOutcome::Copied);
        assert_eq!(fs::read(&dest).unwrap(), b"png");
    }

    #[test]
    fn test_skips_within_tolerance() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.png");
        let dest = dir.path().join("dest.png");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let now = SystemTime::now();
        set_mtime(&dest, now);
        set_mtime(&src, now + Duration::from_millis(900));

        assert_eq!(copy_if_newer(&src, &dest).unwrap(), CopyOutcome::UpToDate);
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }

    #[test]
    fn test_skips_older_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.png");
        let dest = dir.path().join("dest.png");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();
        set_mtime(&src, SystemTime::now() - Duration::from_secs(60));

        assert_eq!(copy_if_newer(&src, &dest).unwrap(), CopyOutcome::UpToDate);
    }

    #[test]
    fn test_replaces_stale_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.png");
        let dest = dir.path().join("dest.png");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();
        set_mtime(&dest, SystemTime::now() - Duration::from_secs(10));

        assert_eq!(copy_if_newer(&src, &dest).unwrap(), CopyOutcome::Copied);
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let outcome = copy_if_newer(&dir.path().join("nope"), &dir.path().join("dest")).unwrap();
        assert_eq!(outcome, CopyOutcome::SourceMissing);
        assert!(!dir.path().join("dest").exists());
    }

    #[test]
    fn test_no_temp_files_left() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.png");
        fs::write(&src, b"png").unwrap();
        let out = dir.path().join("out");
        copy_if_newer(&src, &out.join("x.png")).unwrap();

        let names: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["x.png"]);
    }
}
