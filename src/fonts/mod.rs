//! Font discovery for the PDF and the chart renderer.
//!
//! The report prefers the bundled Roboto family. When it cannot be found a system sans-serif
//! family (Liberation Sans on Linux, Arial on Windows) is used instead.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{FontData, FontFamily};
use log::{debug, warn};

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Overrides the bundled font directory.
pub const FONTS_DIR_ENV: &str = "RISK_REPORT_FONTS_DIR";
/// Overrides the directory searched for the system fallback family.
pub const SYSTEM_FONTS_DIR_ENV: &str = "RISK_REPORT_SYSTEM_FONTS_DIR";

/// File names of one family's four faces.
#[derive(Clone, Copy, Debug)]
struct FamilyFiles {
    name: &'static str,
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

impl FamilyFiles {
    fn all(&self) -> [&'static str; 4] {
        [self.regular, self.bold, self.italic, self.bold_italic]
    }

    fn missing_in(&self, directory: &Path) -> Vec<&'static str> {
        self.all()
            .into_iter()
            .filter(|file| !directory.join(file).is_file())
            .collect()
    }
}

const ROBOTO: FamilyFiles = FamilyFiles {
    name: DEFAULT_FONT_FAMILY_NAME,
    regular: "Roboto-Regular.ttf",
    bold: "Roboto-Bold.ttf",
    italic: "Roboto-Italic.ttf",
    bold_italic: "Roboto-BoldItalic.ttf",
};

const SYSTEM_FAMILIES: [FamilyFiles; 2] = [
    FamilyFiles {
        name: "Liberation Sans",
        regular: "LiberationSans-Regular.ttf",
        bold: "LiberationSans-Bold.ttf",
        italic: "LiberationSans-Italic.ttf",
        bold_italic: "LiberationSans-BoldItalic.ttf",
    },
    FamilyFiles {
        name: "Arial",
        regular: "arial.ttf",
        bold: "arialbd.ttf",
        italic: "ariali.ttf",
        bold_italic: "arialbi.ttf",
    },
];

/// A family whose four faces were all found on disk.
#[derive(Clone, Debug)]
struct ResolvedFamily {
    files: FamilyFiles,
    directory: PathBuf,
}

impl ResolvedFamily {
    fn path(&self, file: &str) -> PathBuf {
        self.directory.join(file)
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

fn push_unique(candidates: &mut Vec<PathBuf>, candidate: PathBuf) {
    if !candidates.iter().any(|existing| existing == &candidate) {
        candidates.push(candidate);
    }
}

fn bundled_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = env_path(FONTS_DIR_ENV) {
        candidates.push(path);
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            push_unique(&mut candidates, bin_dir.join("assets/fonts"));
        }
    }

    push_unique(
        &mut candidates,
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts"),
    );

    candidates
}

fn system_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = env_path(SYSTEM_FONTS_DIR_ENV) {
        candidates.push(path);
    }

    for dir in [
        "/usr/share/fonts/truetype/liberation",
        "/usr/share/fonts/truetype/liberation2",
        "/usr/share/fonts/liberation-sans",
        "/usr/share/fonts/liberation",
    ] {
        push_unique(&mut candidates, PathBuf::from(dir));
    }

    for var in ["WINDIR", "SystemRoot"] {
        if let Some(root) = env_path(var) {
            push_unique(&mut candidates, root.join("Fonts"));
        }
    }

    candidates
}

fn find_family(
    families: &[FamilyFiles],
    directories: &[PathBuf],
    attempts: &mut Vec<String>,
) -> Option<ResolvedFamily> {
    for directory in directories {
        if !directory.is_dir() {
            attempts.push(format!("{} (directory missing)", directory.display()));
            continue;
        }
        for files in families {
            let missing = files.missing_in(directory);
            if missing.is_empty() {
                return Some(ResolvedFamily {
                    files: *files,
                    directory: directory.clone(),
                });
            }
            attempts.push(format!(
                "{} ({} missing [{}])",
                directory.display(),
                files.name,
                missing.join(", ")
            ));
        }
    }
    None
}

fn resolve_family() -> Result<ResolvedFamily, Error> {
    let mut attempts = Vec::new();

    if let Some(bundled) = find_family(&[ROBOTO], &bundled_directory_candidates(), &mut attempts) {
        return Ok(bundled);
    }

    if let Some(system) = find_family(&SYSTEM_FAMILIES, &system_directory_candidates(), &mut attempts)
    {
        warn!(
            "Bundled {} fonts unavailable; falling back to system '{}' family in {}",
            DEFAULT_FONT_FAMILY_NAME,
            system.files.name,
            system.directory.display()
        );
        return Ok(system);
    }

    Err(Error::new(
        format!(
            "Unable to locate report fonts. Checked: {}. Set {} or {}.",
            attempts.join(", "),
            FONTS_DIR_ENV,
            SYSTEM_FONTS_DIR_ENV
        ),
        io::Error::new(io::ErrorKind::NotFound, "report fonts not found"),
    ))
}

fn load_face(family: &ResolvedFamily, file: &str, style: &str) -> Result<FontData, Error> {
    let path = family.path(file);
    FontData::load(&path, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load {} {} font at {}: {}",
                family.files.name,
                style,
                path.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

/// Returns the report font family: bundled Roboto, else a system sans-serif family.
pub fn default_font_family() -> Result<FontFamily<FontData>, Error> {
    let family = resolve_family()?;
    debug!(
        "Using {} fonts from {}",
        family.files.name,
        family.directory.display()
    );

    Ok(FontFamily {
        regular: load_face(&family, family.files.regular, "regular")?,
        bold: load_face(&family, family.files.bold, "bold")?,
        italic: load_face(&family, family.files.italic, "italic")?,
        bold_italic: load_face(&family, family.files.bold_italic, "bold italic")?,
    })
}

/// Indicates whether any usable report font family is present on disk.
pub fn default_fonts_available() -> bool {
    resolve_family().is_ok()
}

/// Whether `err` means the fonts are absent rather than broken.
pub fn fonts_missing(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

/// Raw bytes of the regular and bold faces, read once per process.
///
/// The chart renderer registers these with its text backend, which needs `'static` data.
pub fn chart_font_bytes() -> Option<(&'static [u8], &'static [u8])> {
    static BYTES: OnceLock<Option<(&'static [u8], &'static [u8])>> = OnceLock::new();
    *BYTES.get_or_init(|| {
        let family = match resolve_family() {
            Ok(family) => family,
            Err(err) => {
                warn!("Chart text disabled: {}", err);
                return None;
            }
        };
        let read = |file: &str| -> Option<&'static [u8]> {
            match fs::read(family.path(file)) {
                Ok(bytes) => Some(Box::leak(bytes.into_boxed_slice())),
                Err(err) => {
                    warn!("Failed to read chart font {}: {}", file, err);
                    None
                }
            }
        };
        Some((read(family.files.regular)?, read(family.files.bold)?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_faces_are_listed() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join(ROBOTO.regular), b"").expect("touch regular");
        assert_eq!(
            ROBOTO.missing_in(dir.path()),
            vec![ROBOTO.bold, ROBOTO.italic, ROBOTO.bold_italic]
        );
    }

    #[test]
    fn family_search_reports_every_attempt() {
        let empty = tempfile::tempdir().expect("temp dir");
        let absent = empty.path().join("nope");
        let mut attempts = Vec::new();
        let found = find_family(
            &SYSTEM_FAMILIES,
            &[absent.clone(), empty.path().to_path_buf()],
            &mut attempts,
        );
        assert!(found.is_none());
        assert_eq!(attempts.len(), 1 + SYSTEM_FAMILIES.len());
        assert!(attempts[0].contains("directory missing"));
    }

    #[test]
    fn family_search_picks_first_complete_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        for file in SYSTEM_FAMILIES[1].all() {
            fs::write(dir.path().join(file), b"").expect("touch face");
        }
        let mut attempts = Vec::new();
        let found = find_family(&SYSTEM_FAMILIES, &[dir.path().to_path_buf()], &mut attempts)
            .expect("arial family found");
        assert_eq!(found.files.name, "Arial");
        assert_eq!(attempts.len(), 1);
    }
}
