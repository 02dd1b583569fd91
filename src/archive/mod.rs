//! Extraction of `.tar.gz` release archives.

use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow, bail};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

/// Extractor for `.tar.gz` / `.tgz` archives.
///
/// Source releases ship with a single top-level directory
/// (`xmake-v2.9.9/...`); that directory is stripped so its contents land
/// directly in the destination.
///
/// Nothing is ever written outside the destination: entries with `..` or
/// absolute paths are skipped, and the extraction fails on symlinks pointing
/// out of their top-level directory or on entries that would be written
/// through a symlink.
pub struct TarGzExtractor;

impl TarGzExtractor {
    pub fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    #[tracing::instrument(skip(self, runtime))]
    pub fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        if !self.can_handle(archive_path) {
            return Err(anyhow!(
                "Unsupported archive format: {}",
                archive_path.display()
            ));
        }

        debug!("Extracting {:?} to {:?}...", archive_path, extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        let file_name = extract_to
            .file_name()
            .with_context(|| format!("Invalid extraction directory {:?}", extract_to))?;
        let temp_extract_dir =
            extract_to.with_file_name(format!("{}_temp_extract", file_name.to_string_lossy()));
        if runtime.exists(&temp_extract_dir) {
            runtime.remove_dir_all(&temp_extract_dir)?;
        }
        runtime.create_dir_all(&temp_extract_dir)?;

        let result = self
            .unpack(runtime, file, &temp_extract_dir)
            .and_then(|()| self.move_into_place(runtime, &temp_extract_dir, extract_to));

        if runtime.exists(&temp_extract_dir)
            && let Err(e) = runtime.remove_dir_all(&temp_extract_dir)
        {
            debug!("Failed to remove {:?}: {}", temp_extract_dir, e);
        }
        result?;

        info!("Extraction complete.");
        Ok(())
    }

    fn unpack<R: Runtime>(
        &self,
        runtime: &R,
        file: Box<dyn Read + Send>,
        temp_extract_dir: &Path,
    ) -> Result<()> {
        let mut archive = Archive::new(GzDecoder::new(file));

        for entry in archive.entries().context("Failed to read tar entries")? {
            let mut entry = entry.context("Failed to read tar entry")?;
            let entry_path = entry.path().context("Invalid path in tar entry")?.into_owned();

            let Some(relative) = enclosed_path(&entry_path) else {
                debug!("Skipping entry with unsafe path {:?}", entry_path);
                continue;
            };
            reject_symlink_ancestors(runtime, temp_extract_dir, &relative)?;
            let full_path = temp_extract_dir.join(&relative);

            match entry.header().entry_type() {
                EntryType::Directory => runtime.create_dir_all(&full_path)?,
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest_file = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest_file)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    drop(dest_file);

                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                }
                EntryType::Symlink => {
                    let target = entry
                        .link_name()
                        .context("Invalid symlink target in tar entry")?
                        .with_context(|| format!("Symlink {:?} has no target", entry_path))?
                        .into_owned();
                    if !symlink_target_enclosed(&relative, &target) {
                        bail!(
                            "Refusing symlink {:?} -> {:?}: target leaves the archive",
                            entry_path,
                            target
                        );
                    }
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    runtime.symlink(&target, &full_path)?;
                }
                other => debug!("Skipping {:?} entry {:?}", other, entry_path),
            }
        }
        Ok(())
    }

    fn move_into_place<R: Runtime>(
        &self,
        runtime: &R,
        temp_extract_dir: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        let entries = runtime
            .read_dir(temp_extract_dir)
            .context("Failed to read temp extraction directory")?;

        let Some(first) = entries.first() else {
            bail!("Archive appears to be empty.");
        };
        let source_dir = if entries.len() == 1 && runtime.is_dir(first) {
            first.clone()
        } else {
            temp_extract_dir.to_path_buf()
        };

        runtime.create_dir_all(extract_to)?;
        debug!("Moving contents from {:?} to {:?}", source_dir, extract_to);
        for item in runtime.read_dir(&source_dir)? {
            let name = item
                .file_name()
                .with_context(|| format!("Invalid entry {:?}", item))?;
            runtime.rename(&item, &extract_to.join(name))?;
        }
        Ok(())
    }
}

/// Relative, normalized form of an archive path, or `None` when it would
/// escape the destination.
fn enclosed_path(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Fail when `relative` or any of its ancestors under `root` is a symlink
/// created by an earlier entry.
fn reject_symlink_ancestors<R: Runtime>(runtime: &R, root: &Path, relative: &Path) -> Result<()> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        if runtime.is_symlink(&current) {
            bail!(
                "Refusing to extract {:?}: {:?} is a symlink",
                relative,
                current
            );
        }
    }
    Ok(())
}

/// Whether a symlink at `link` (normalized, relative to the archive root)
/// pointing at `target` stays inside the link's top-level directory, so it
/// still resolves inside the destination once that directory is stripped.
fn symlink_target_enclosed(link: &Path, target: &Path) -> bool {
    let link_depth = link.components().count();
    let floor = usize::from(link_depth > 1);
    let mut depth = link_depth.saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth <= floor {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}
