// src/kitchen/archive.rs

//! Source unpacking and bottle pouring

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::debug;
use xz2::read::XzDecoder;

use super::fs::Filesystem;

/// Payload container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    TarXz,
    Tar,
    /// Anything else, copied verbatim
    Plain,
}

impl ArchiveKind {
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            ArchiveKind::TarGz
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            ArchiveKind::TarXz
        } else if lower.ends_with(".tar") {
            ArchiveKind::Tar
        } else {
            ArchiveKind::Plain
        }
    }
}

fn unpack_error(archive: &str, e: impl std::fmt::Display) -> Error {
    Error::Unpack {
        archive: archive.to_string(),
        message: e.to_string(),
    }
}

/// Unpack a verified source payload into `dest`
///
/// Returns the source directory: the single top-level directory when the
/// archive has exactly one, `dest` otherwise.
pub fn unpack_source(data: &[u8], filename: &str, dest: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest)?;

    match ArchiveKind::from_filename(filename) {
        ArchiveKind::TarGz => Archive::new(GzDecoder::new(data))
            .unpack(dest)
            .map_err(|e| unpack_error(filename, e))?,
        ArchiveKind::TarXz => Archive::new(XzDecoder::new(data))
            .unpack(dest)
            .map_err(|e| unpack_error(filename, e))?,
        ArchiveKind::Tar => Archive::new(data)
            .unpack(dest)
            .map_err(|e| unpack_error(filename, e))?,
        ArchiveKind::Plain => {
            debug!("{} is not an archive, copying verbatim", filename);
            fs::write(dest.join(filename), data)?;
            return Ok(dest.to_path_buf());
        }
    }

    // Archives usually wrap everything in one top-level directory
    let entries: Vec<_> = fs::read_dir(dest)?.filter_map(|e| e.ok()).collect();
    if entries.len() == 1 && entries[0].file_type().map(|t| t.is_dir()).unwrap_or(false) {
        let source_dir = entries[0].path();
        debug!("Source directory: {}", source_dir.display());
        return Ok(source_dir);
    }

    Ok(dest.to_path_buf())
}

/// Pour a bottle into the installation prefix
///
/// Bottles are gzipped tarballs whose entries live under
/// `<name>/<version>/`; those two leading components are stripped.
/// Returns the number of files and links written.
pub fn pour_bottle(
    data: &[u8],
    archive_name: &str,
    name: &str,
    version: &str,
    prefix: &Path,
    filesystem: &dyn Filesystem,
) -> Result<usize> {
    let mut archive = Archive::new(GzDecoder::new(data));
    let mut written = 0;

    filesystem.create_dir_all(prefix)?;

    for entry in archive.entries().map_err(|e| unpack_error(archive_name, e))? {
        let mut entry = entry.map_err(|e| unpack_error(archive_name, e))?;
        let path = entry
            .path()
            .map_err(|e| unpack_error(archive_name, e))?
            .into_owned();

        let relative = strip_keg_components(&path, name, version).ok_or_else(|| {
            unpack_error(
                archive_name,
                format!("entry {} is outside {}/{}", path.display(), name, version),
            )
        })?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = prefix.join(&relative);

        if let Some(link) = relative
            .ancestors()
            .skip(1)
            .filter(|a| !a.as_os_str().is_empty())
            .find(|a| filesystem.is_symlink(&prefix.join(a)))
        {
            return Err(unpack_error(
                archive_name,
                format!("entry {} goes through symlink {}", path.display(), link.display()),
            ));
        }

        match entry.header().entry_type() {
            EntryType::Directory => filesystem.create_dir_all(&target)?,
            EntryType::Regular | EntryType::Continuous => {
                let mut contents = Vec::new();
                entry.read_to_end(&mut contents)?;
                filesystem.write(&target, &contents)?;
                if let Ok(mode) = entry.header().mode() {
                    filesystem.set_mode(&target, mode & 0o7777)?;
                }
                written += 1;
            }
            EntryType::Symlink => {
                if let Some(link) = entry.link_name().map_err(|e| unpack_error(archive_name, e))? {
                    if !link_stays_in_keg(&relative, &link) {
                        return Err(unpack_error(
                            archive_name,
                            format!("symlink {} points outside the keg: {}", path.display(), link.display()),
                        ));
                    }
                    filesystem.symlink(&link, &target)?;
                    written += 1;
                }
            }
            other => debug!("Skipping {:?} entry {}", other, path.display()),
        }
    }

    Ok(written)
}

/// A link target must be relative, with any `..` leading and no deeper
/// than the link's own directory
fn link_stays_in_keg(relative: &Path, link: &Path) -> bool {
    let depth = relative.components().count().saturating_sub(1);
    let mut ups = 0;
    let mut descending = false;
    for component in link.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if !descending => ups += 1,
            Component::Normal(_) => descending = true,
            _ => return false,
        }
    }
    ups <= depth
}

/// Strip `<name>/<version>/` and reject paths escaping the keg
fn strip_keg_components(path: &Path, name: &str, version: &str) -> Option<PathBuf> {
    let mut components = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir));

    match (components.next(), components.next()) {
        (Some(Component::Normal(n)), Some(Component::Normal(v))) if n == name && v == version => {}
        (Some(Component::Normal(n)), None) if n == name => return Some(PathBuf::new()),
        _ => return None,
    }

    let mut relative = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => relative.push(part),
            _ => return None,
        }
    }
    Some(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kitchen::fs::LocalFilesystem;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, path, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_archive_kind() {
        assert_eq!(ArchiveKind::from_filename("transmission-2.94.tar.xz"), ArchiveKind::TarXz);
        assert_eq!(ArchiveKind::from_filename("a.TGZ"), ArchiveKind::TarGz);
        assert_eq!(ArchiveKind::from_filename("a.tar"), ArchiveKind::Tar);
        assert_eq!(ArchiveKind::from_filename("install.sh"), ArchiveKind::Plain);
    }

    #[test]
    fn test_unpack_single_top_level_dir() {
        let data = tarball(&[
            ("hello-1.0/configure", b"#!/bin/sh\n"),
            ("hello-1.0/src/main.c", b"int main;"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let source = unpack_source(&data, "hello-1.0.tar.gz", dir.path()).unwrap();
        assert_eq!(source, dir.path().join("hello-1.0"));
        assert!(source.join("src/main.c").exists());
    }

    #[test]
    fn test_unpack_flat_archive() {
        let data = tarball(&[("configure", b"x"), ("Makefile", b"y")]);
        let dir = tempfile::tempdir().unwrap();
        let source = unpack_source(&data, "flat.tgz", dir.path()).unwrap();
        assert_eq!(source, dir.path());
    }

    #[test]
    fn test_unpack_plain_payload() {
        let dir = tempfile::tempdir().unwrap();
        let source = unpack_source(b"echo hi", "install.sh", dir.path()).unwrap();
        assert_eq!(std::fs::read(source.join("install.sh")).unwrap(), b"echo hi");
    }

    #[test]
    fn test_unpack_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            unpack_source(b"not gzip", "broken.tar.gz", dir.path()),
            Err(Error::Unpack { .. })
        ));
    }

    #[test]
    fn test_pour_bottle_strips_keg_prefix() {
        let data = tarball(&[
            ("transmission/2.94/bin/transmission-daemon", b"\x7fELF"),
            ("transmission/2.94/share/doc/README", b"docs"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("Cellar/transmission/2.94");

        let written =
            pour_bottle(&data, "t.bottle.tar.gz", "transmission", "2.94", &prefix, &LocalFilesystem)
                .unwrap();
        assert_eq!(written, 2);
        assert_eq!(std::fs::read(prefix.join("bin/transmission-daemon")).unwrap(), b"\x7fELF");
        assert!(prefix.join("share/doc/README").exists());
    }

    #[test]
    fn test_pour_bottle_rejects_foreign_entries() {
        let data = tarball(&[("other/1.0/bin/x", b"x")]);
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            pour_bottle(&data, "b.tar.gz", "transmission", "2.94", dir.path(), &LocalFilesystem),
            Err(Error::Unpack { .. })
        ));
    }

    fn with_symlink(entries: &[(&str, &str)], files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, link) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            header.set_mode(0o777);
            builder.append_link(&mut header, path, link).unwrap();
        }
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_pour_bottle_keeps_relative_links() {
        let data = with_symlink(
            &[("hello/1.0/bin/hello", "../libexec/hello")],
            &[("hello/1.0/libexec/hello", b"#!/bin/sh\n")],
        );
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("prefix");

        let written = pour_bottle(&data, "hello.bottle.tar.gz", "hello", "1.0", &prefix, &LocalFilesystem).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            std::fs::read_link(prefix.join("bin/hello")).unwrap(),
            PathBuf::from("../libexec/hello")
        );
    }

    #[test]
    fn test_pour_bottle_rejects_escaping_links() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        let prefix = dir.path().join("prefix");
        let absolute = outside.to_string_lossy().into_owned();

        for link in [absolute.as_str(), "../../outside", "lib/../.."] {
            let data = with_symlink(&[("hello/1.0/lib", link)], &[]);
            let result = pour_bottle(&data, "hello.bottle.tar.gz", "hello", "1.0", &prefix, &LocalFilesystem);
            assert!(matches!(result, Err(Error::Unpack { .. })), "{} accepted", link);
            assert!(!prefix.join("lib").is_symlink());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_pour_bottle_never_writes_through_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        let prefix = dir.path().join("prefix");
        std::fs::create_dir_all(&prefix).unwrap();
        std::os::unix::fs::symlink(&outside, prefix.join("lib")).unwrap();

        let data = tarball(&[("hello/1.0/lib/pwned", b"x")]);
        let result = pour_bottle(&data, "hello.bottle.tar.gz", "hello", "1.0", &prefix, &LocalFilesystem);
        assert!(matches!(result, Err(Error::Unpack { .. })));
        assert!(!outside.join("pwned").exists());
    }

    #[test]
    fn test_link_stays_in_keg() {
        assert!(link_stays_in_keg(Path::new("bin/hello"), Path::new("../libexec/hello")));
        assert!(link_stays_in_keg(Path::new("lib/libz.so"), Path::new("libz.so.1")));
        assert!(!link_stays_in_keg(Path::new("lib"), Path::new("../outside")));
        assert!(!link_stays_in_keg(Path::new("bin/hello"), Path::new("../../x")));
        assert!(!link_stays_in_keg(Path::new("bin/hello"), Path::new("/usr/bin/hello")));
        assert!(!link_stays_in_keg(Path::new("a/b"), Path::new("c/../..")));
    }

    #[test]
    fn test_strip_keg_components() {
        assert_eq!(
            strip_keg_components(Path::new("./foo/1.0/bin/foo"), "foo", "1.0"),
            Some(PathBuf::from("bin/foo"))
        );
        assert_eq!(strip_keg_components(Path::new("foo/1.0"), "foo", "1.0"), Some(PathBuf::new()));
        assert_eq!(strip_keg_components(Path::new("foo"), "foo", "1.0"), Some(PathBuf::new()));
        assert_eq!(strip_keg_components(Path::new("foo/1.0/../x"), "foo", "1.0"), None);
        assert_eq!(strip_keg_components(Path::new("foo/2.0/bin"), "foo", "1.0"), None);
    }
}
