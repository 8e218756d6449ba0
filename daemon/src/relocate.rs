/// Replay relocation: decide where a freshly saved clip belongs, then move it.
///
/// With a resolved label the clip goes to `<root>\<label>\<file name>`, where
/// `<root>` is the configured base directory or the clip's own directory, and
/// "Replay" in the file name is replaced by the label when enabled:
///   `C:\Vids\Replay 2024-01-01.mp4` -> `C:\Vids\Game One\Game One 2024-01-01.mp4`
///
/// Moves use `fs::rename` only. A move across volumes fails with the OS error
/// instead of silently copying.
use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::OutputConfig;

/// Subfolder used for clips whose window could not be identified.
pub const PLACEHOLDER_LABEL: &str = "Windowsapps";
/// Token in the recorder's default file name that the label replaces.
pub const REPLAY_TOKEN: &str = "Replay";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    /// No label, no placeholder and no base directory: the clip stays put.
    LeaveInPlace,
    /// Move the clip to `destination`, creating its parent directory first.
    Move { destination: PathBuf },
}

/// Computes where `source` should go given the resolved (sanitized) `label`.
///
/// Pure: touches neither the filesystem nor the clip.
pub fn plan(source: &Path, label: &str, output: &OutputConfig) -> Result<Relocation> {
    let file_name = source
        .file_name()
        .with_context(|| format!("Replay path has no file name: {}", source.display()))?;
    let base_dir = output.base_dir();

    let label = if !label.is_empty() {
        label
    } else if output.use_windowsapps {
        PLACEHOLDER_LABEL
    } else if let Some(base) = base_dir {
        // Unidentified and no placeholder: drop it into the base directory as-is.
        return Ok(Relocation::Move { destination: base.join(file_name) });
    } else {
        return Ok(Relocation::LeaveInPlace);
    };

    // Names that are not valid UTF-8 keep their original bytes.
    let file_name: OsString = match file_name.to_str() {
        Some(name) if output.prepend_window_name => name.replace(REPLAY_TOKEN, label).into(),
        _ => file_name.to_os_string(),
    };

    let root = match base_dir {
        Some(base) => base,
        None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    Ok(Relocation::Move { destination: root.join(label).join(file_name) })
}

/// Carries out `relocation` for `source`. Returns the clip's final path, or
/// `None` if it was left in place.
///
/// Refuses to overwrite an existing file at the destination.
pub fn execute(source: &Path, relocation: &Relocation) -> Result<Option<PathBuf>> {
    let destination = match relocation {
        Relocation::LeaveInPlace => return Ok(None),
        Relocation::Move { destination } => destination,
    };

    if destination == source || is_same_file(source, destination) {
        return Ok(Some(source.to_path_buf()));
    }
    if destination.exists() {
        bail!("Destination already exists: {}", destination.display());
    }

    if let Some(dir) = destination.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    std::fs::rename(source, destination).with_context(|| {
        format!("Failed to move {} to {}", source.display(), destination.display())
    })?;
    Ok(Some(destination.clone()))
}

/// True if both paths resolve to the same existing file, catching spellings
/// that differ only in case (on Windows), `..` components or links.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Plans and executes the relocation of `source` in one step.
pub fn relocate(source: &Path, label: &str, output: &OutputConfig) -> Result<Option<PathBuf>> {
    let relocation = plan(source, label, output)?;
    execute(source, &relocation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(base: Option<&Path>, use_windowsapps: bool, prepend: bool) -> OutputConfig {
        OutputConfig {
            base_save_path: base.map(|b| b.to_string_lossy().into_owned()).unwrap_or_default(),
            use_windowsapps,
            prepend_window_name: prepend,
        }
    }

    fn touch(path: &Path) {
        std::fs::write(path, b"clip").unwrap();
    }

    // ── plan ──────────────────────────────────────────────────────────────────

    #[test]
    fn plan_labelled_clip_goes_to_label_folder_with_renamed_file() {
        let vids = PathBuf::from("vids");
        let source = vids.join("Replay 2024-01-01.mp4");
        let plan = plan(&source, "Game One", &output(None, true, true)).unwrap();
        assert_eq!(
            plan,
            Relocation::Move { destination: vids.join("Game One").join("Game One 2024-01-01.mp4") }
        );
    }

    #[test]
    fn plan_replaces_every_replay_occurrence() {
        let source = PathBuf::from("vids").join("Replay Replay.mkv");
        let Relocation::Move { destination } =
            plan(&source, "Game", &output(None, true, true)).unwrap()
        else {
            panic!("expected a move");
        };
        assert_eq!(destination.file_name().unwrap(), "Game Game.mkv");
    }

    #[test]
    fn plan_keeps_file_name_when_prepend_disabled() {
        let vids = PathBuf::from("vids");
        let source = vids.join("Replay 2024-01-01.mp4");
        let plan = plan(&source, "Game One", &output(None, true, false)).unwrap();
        assert_eq!(
            plan,
            Relocation::Move { destination: vids.join("Game One").join("Replay 2024-01-01.mp4") }
        );
    }

    #[test]
    fn plan_uses_base_dir_as_root_when_set() {
        let base = PathBuf::from("clips");
        let source = PathBuf::from("vids").join("Replay 1.mp4");
        let plan = plan(&source, "Game", &output(Some(&base), true, true)).unwrap();
        assert_eq!(plan, Relocation::Move { destination: base.join("Game").join("Game 1.mp4") });
    }

    #[test]
    fn plan_unlabelled_uses_placeholder_folder() {
        let vids = PathBuf::from("vids");
        let source = vids.join("Replay 1.mp4");
        let plan = plan(&source, "", &output(None, true, true)).unwrap();
        assert_eq!(
            plan,
            Relocation::Move {
                destination: vids.join(PLACEHOLDER_LABEL).join(format!("{PLACEHOLDER_LABEL} 1.mp4"))
            }
        );
    }

    #[test]
    fn plan_unlabelled_without_placeholder_moves_unchanged_into_base_dir() {
        let base = PathBuf::from("clips");
        let source = PathBuf::from("vids").join("Replay 2024-01-01.mp4");
        let plan = plan(&source, "", &output(Some(&base), false, true)).unwrap();
        assert_eq!(plan, Relocation::Move { destination: base.join("Replay 2024-01-01.mp4") });
    }

    #[test]
    fn plan_unlabelled_without_placeholder_or_base_dir_leaves_in_place() {
        let source = PathBuf::from("vids").join("Replay 1.mp4");
        let plan = plan(&source, "", &output(None, false, true)).unwrap();
        assert_eq!(plan, Relocation::LeaveInPlace);
    }

    #[test]
    fn plan_only_renames_the_file_name_not_the_directory() {
        let source = PathBuf::from("Replay dir").join("Replay 1.mp4");
        let Relocation::Move { destination } =
            plan(&source, "Game", &output(None, true, true)).unwrap()
        else {
            panic!("expected a move");
        };
        assert_eq!(destination, PathBuf::from("Replay dir").join("Game").join("Game 1.mp4"));
    }

    #[test]
    fn plan_rejects_path_without_file_name() {
        assert!(plan(Path::new("/"), "Game", &output(None, true, true)).is_err());
    }

    #[cfg(windows)]
    #[test]
    fn plan_matches_windows_examples() {
        let source = Path::new(r"C:\Vids\Replay 2024-01-01.mp4");
        assert_eq!(
            plan(source, "Game One", &output(None, true, true)).unwrap(),
            Relocation::Move { destination: PathBuf::from(r"C:\Vids\Game One\Game One 2024-01-01.mp4") }
        );
        assert_eq!(
            plan(source, "", &output(Some(Path::new(r"D:\Clips")), false, true)).unwrap(),
            Relocation::Move { destination: PathBuf::from(r"D:\Clips\Replay 2024-01-01.mp4") }
        );
    }

    // ── relocate (filesystem) ─────────────────────────────────────────────────

    #[test]
    fn relocate_moves_clip_into_new_label_folder() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Replay 2024-01-01.mp4");
        touch(&source);

        let moved = relocate(&source, "Game One", &output(None, true, true)).unwrap().unwrap();

        assert_eq!(moved, dir.path().join("Game One").join("Game One 2024-01-01.mp4"));
        assert!(moved.exists());
        assert!(!source.exists());
    }

    #[test]
    fn relocate_into_existing_label_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Game")).unwrap();
        let source = dir.path().join("Replay 2.mp4");
        touch(&source);

        let moved = relocate(&source, "Game", &output(None, true, true)).unwrap().unwrap();
        assert_eq!(moved, dir.path().join("Game").join("Game 2.mp4"));
        assert!(moved.exists());
    }

    #[test]
    fn relocate_unlabelled_into_base_dir_keeps_name() {
        let src_dir = tempfile::tempdir().unwrap();
        let base = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("Replay 2024-01-01.mp4");
        touch(&source);

        let moved = relocate(&source, "", &output(Some(base.path()), false, true)).unwrap().unwrap();

        assert_eq!(moved, base.path().join("Replay 2024-01-01.mp4"));
        assert!(moved.exists());
        assert!(!source.exists());
    }

    #[test]
    fn relocate_unlabelled_without_targets_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Replay 1.mp4");
        touch(&source);

        let moved = relocate(&source, "", &output(None, false, true)).unwrap();

        assert!(moved.is_none());
        assert!(source.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn relocate_refuses_to_overwrite_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Replay 1.mp4");
        touch(&source);
        std::fs::create_dir(dir.path().join("Game")).unwrap();
        let existing = dir.path().join("Game").join("Game 1.mp4");
        std::fs::write(&existing, b"older clip").unwrap();

        let err = relocate(&source, "Game", &output(None, true, true)).unwrap_err();

        assert!(err.to_string().contains("already exists"), "unexpected error: {err}");
        assert!(source.exists());
        assert_eq!(std::fs::read(&existing).unwrap(), b"older clip");
    }

    #[test]
    fn relocate_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Replay gone.mp4");
        let err = relocate(&source, "Game", &output(None, true, true)).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to move"));
    }

    #[test]
    fn execute_differently_spelled_same_path_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let source = dir.path().join("Replay 1.mp4");
        touch(&source);
        let destination = dir.path().join("sub").join("..").join("Replay 1.mp4");

        let relocation = Relocation::Move { destination };
        assert_eq!(execute(&source, &relocation).unwrap(), Some(source.clone()));
        assert!(source.exists());
    }

    #[cfg(windows)]
    #[test]
    fn execute_same_path_in_different_case_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Replay 1.mp4");
        touch(&source);
        let upper = PathBuf::from(dir.path().to_string_lossy().to_uppercase()).join("Replay 1.mp4");

        let relocation = Relocation::Move { destination: upper };
        assert_eq!(execute(&source, &relocation).unwrap(), Some(source.clone()));
        assert!(source.exists());
    }

    #[cfg(unix)]
    #[test]
    fn plan_keeps_non_utf8_file_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = OsStr::from_bytes(b"Replay \xff.mp4");
        let source = PathBuf::from("vids").join(name);
        let plan = plan(&source, "Game", &output(None, true, true)).unwrap();
        assert_eq!(
            plan,
            Relocation::Move { destination: PathBuf::from("vids").join("Game").join(name) }
        );
    }

    #[test]
    fn execute_same_path_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        touch(&source);
        let relocation = Relocation::Move { destination: source.clone() };
        assert_eq!(execute(&source, &relocation).unwrap(), Some(source.clone()));
        assert!(source.exists());
    }
}
