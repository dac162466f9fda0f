//! High-level [`Determinizer`] API: rewrite a ZIP/JAR so that two builds of
//! the same sources produce byte-identical archives.
//!
//! ```no_run
//! use detjar::determinizer::{Determinizer, DeterminizeOptions};
//!
//! let report = Determinizer::new(DeterminizeOptions::default())
//!     .run("build/libs/app-dev.jar", "build/libs/app.jar")?;
//! println!("{} entries, digest {}", report.entries_written, report.digest_hex());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # What changes
//! - Entries are written in ascending byte order of their names.
//! - Every entry gets the same modification time ([`DeterminizeOptions::timestamp`])
//!   and a fixed Unix mode; comments and extra fields are dropped.
//! - Names in [`DeterminizeOptions::excluded_entries`] are not written at all.
//! - Entries ending in [`DeterminizeOptions::canonical_suffix`] are parsed as
//!   JSON and replaced by their canonical serialization.
//!
//! Everything else (names, compression methods, payload bytes) is preserved.
//!
//! # Failure
//! The output is staged in a temporary file next to the destination and only
//! renamed into place once the central directory has been written.  A failed
//! run leaves no archive at the output path.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{DateTime, ZipArchive, ZipWriter};

use crate::canonical::to_canonical_string;
use crate::error::DeterminizeError;
use crate::value::{ParseError, StructuredValue};

// ── Defaults ─────────────────────────────────────────────────────────────────

/// Annotation cache written by the Forge toolchain; contents vary per build.
pub const FML_CACHE_ANNOTATION: &str = "META-INF/fml_cache_annotation.json";
/// Class-version cache written by the Forge toolchain; contents vary per build.
pub const FML_CACHE_CLASS_VERSIONS: &str = "META-INF/fml_cache_class_versions.json";
/// Mixin reference maps.
pub const REFMAP_SUFFIX: &str = ".refmap.json";

pub const FILE_PERMISSIONS: u32 = 0o644;
pub const DIR_PERMISSIONS:  u32 = 0o755;

/// Entries at or above this size need the ZIP64 extensions.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

// ── DeterminizeOptions ───────────────────────────────────────────────────────

/// Configuration for [`Determinizer::new`].
#[derive(Debug, Clone)]
pub struct DeterminizeOptions {
    /// Entry names dropped from the output.
    pub excluded_entries:    BTreeSet<String>,
    /// Entries whose name ends with this suffix are canonicalized as JSON.
    pub canonical_suffix:    String,
    /// Modification time stamped on every entry.  Defaults to the DOS epoch,
    /// 1980-01-01 00:00:00, the earliest time the format can represent.
    pub timestamp:           DateTime,
    /// Reject canonicalizable payloads whose root is not a JSON object.
    pub require_object_root: bool,
}

impl Default for DeterminizeOptions {
    fn default() -> Self {
        Self {
            excluded_entries: [FML_CACHE_ANNOTATION, FML_CACHE_CLASS_VERSIONS]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            canonical_suffix:    REFMAP_SUFFIX.to_owned(),
            timestamp:           DateTime::default(),
            require_object_root: true,
        }
    }
}

// ── DeterminizeReport ────────────────────────────────────────────────────────

/// Summary of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeterminizeReport {
    /// Entries written to the output, including canonicalized ones.
    pub entries_written: usize,
    /// Entries rewritten through the canonical JSON serializer.
    pub canonicalized:   usize,
    /// Entries dropped because their name is excluded.
    pub excluded:        usize,
    /// BLAKE3 of the finished output archive.
    pub digest:          [u8; 32],
}

impl DeterminizeReport {
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

// ── Determinizer ─────────────────────────────────────────────────────────────

pub struct Determinizer {
    options: DeterminizeOptions,
}

impl Determinizer {
    pub fn new(options: DeterminizeOptions) -> Self {
        Self { options }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.options.excluded_entries.contains(name)
    }

    pub fn is_canonicalizable(&self, name: &str) -> bool {
        name.ends_with(self.options.canonical_suffix.as_str())
    }

    /// Read `input`, write its deterministic form to `output`.
    ///
    /// `output` is created or replaced; `input` is never modified.  The two
    /// paths must name different files.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<DeterminizeReport, DeterminizeError> {
        let input = input.as_ref();
        let output = output.as_ref();
        info!(input = %input.display(), output = %output.display(), "running determinizer");

        let source = File::open(input).map_err(|e| DeterminizeError::io(input, e))?;
        let permissions = source
            .metadata()
            .map_err(|e| DeterminizeError::io(input, e))?
            .permissions();
        let mut archive = ZipArchive::new(BufReader::new(source))
            .map_err(|e| DeterminizeError::archive(input, e))?;

        let staged = NamedTempFile::new_in(staging_dir(output))
            .map_err(|e| DeterminizeError::io(output, e))?;
        let mut report = DeterminizeReport::default();
        {
            let mut zip = ZipWriter::new(BufWriter::new(staged.as_file()));
            self.copy_entries(&mut archive, &mut zip, input, &mut report)?;
            let mut sink = zip.finish().map_err(|e| DeterminizeError::archive(output, e))?;
            sink.flush().map_err(|e| DeterminizeError::io(output, e))?;
        }
        staged.as_file().sync_all().map_err(|e| DeterminizeError::io(output, e))?;
        fs::set_permissions(staged.path(), permissions)
            .map_err(|e| DeterminizeError::io(output, e))?;

        let mut finished = staged
            .persist(output)
            .map_err(|e| DeterminizeError::io(output, e.error))?;
        report.digest = digest(&mut finished).map_err(|e| DeterminizeError::io(output, e))?;

        info!(
            entries = report.entries_written,
            canonicalized = report.canonicalized,
            excluded = report.excluded,
            digest = %report.digest_hex(),
            "wrote {}",
            output.display()
        );
        Ok(report)
    }

    fn copy_entries<R: Read + Seek, W: Write + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        zip: &mut ZipWriter<W>,
        input: &Path,
        report: &mut DeterminizeReport,
    ) -> Result<(), DeterminizeError> {
        for name in sorted_entry_names(archive) {
            if self.is_excluded(&name) {
                debug!(entry = %name, "dropping generated entry");
                report.excluded += 1;
                continue;
            }

            let mut entry = archive
                .by_name(&name)
                .map_err(|e| DeterminizeError::archive(input, e))?;
            let options = SimpleFileOptions::default()
                .compression_method(entry.compression())
                .last_modified_time(self.options.timestamp)
                .large_file(entry.size() >= ZIP64_THRESHOLD);

            // add_directory would force Stored; start_file keeps the method.
            let permissions = if entry.is_dir() { DIR_PERMISSIONS } else { FILE_PERMISSIONS };
            zip.start_file(name.as_str(), options.unix_permissions(permissions))
                .map_err(|e| DeterminizeError::archive(input, e))?;

            if entry.is_dir() {
                debug!(entry = %name, "directory");
            } else if self.is_canonicalizable(&name) {
                debug!(entry = %name, "canonicalizing");
                let mut payload = Vec::new();
                entry
                    .read_to_end(&mut payload)
                    .map_err(|e| DeterminizeError::entry(&name, e))?;
                let canonical = self
                    .canonicalize_payload(payload)
                    .map_err(|e| DeterminizeError::parse(&name, e))?;
                zip.write_all(canonical.as_bytes())
                    .map_err(|e| DeterminizeError::entry(&name, e))?;
                report.canonicalized += 1;
            } else {
                debug!(entry = %name, "copying");
                io::copy(&mut entry, zip).map_err(|e| DeterminizeError::entry(&name, e))?;
            }
            report.entries_written += 1;
        }
        Ok(())
    }

    fn canonicalize_payload(&self, payload: Vec<u8>) -> Result<String, ParseError> {
        let value = StructuredValue::parse_bytes(payload)?;
        if self.options.require_object_root && !value.is_object() {
            return Err(ParseError::NotAnObject(value.kind()));
        }
        Ok(to_canonical_string(&value))
    }
}

/// Run with [`DeterminizeOptions::default`].
pub fn determinize<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<DeterminizeReport, DeterminizeError> {
    Determinizer::new(DeterminizeOptions::default()).run(input, output)
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Entry names in ascending byte order.  Names are unique within an archive,
/// so the order is total.
fn sorted_entry_names<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    names.sort_unstable();
    names
}

fn staging_dir(output: &Path) -> &Path {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn digest(file: &mut File) -> io::Result<[u8; 32]> {
    file.seek(SeekFrom::Start(0))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(file, &mut hasher)?;
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_forge_layout() {
        let d = Determinizer::new(DeterminizeOptions::default());
        assert!(d.is_excluded(FML_CACHE_ANNOTATION));
        assert!(d.is_excluded(FML_CACHE_CLASS_VERSIONS));
        assert!(!d.is_excluded("META-INF/MANIFEST.MF"));
        assert!(d.is_canonicalizable("mixins.baritone.refmap.json"));
        assert!(!d.is_canonicalizable("mixins.baritone.json"));
        assert!(!d.is_canonicalizable("refmap.json.bak"));
    }

    #[test]
    fn default_timestamp_is_dos_epoch() {
        let t = DeterminizeOptions::default().timestamp;
        assert_eq!((t.year(), t.month(), t.day()), (1980, 1, 1));
        assert_eq!((t.hour(), t.minute(), t.second()), (0, 0, 0));
    }

    #[test]
    fn payload_root_must_be_object() {
        let d = Determinizer::new(DeterminizeOptions::default());
        let err = d.canonicalize_payload(b"[1,2]".to_vec()).unwrap_err();
        assert!(matches!(err, ParseError::NotAnObject("array")));

        let lenient = Determinizer::new(DeterminizeOptions {
            require_object_root: false,
            ..DeterminizeOptions::default()
        });
        assert_eq!(lenient.canonicalize_payload(b"[1,2]".to_vec()).unwrap(), "[1,2]\n");
    }

    #[test]
    fn staging_dir_falls_back_to_cwd() {
        assert_eq!(staging_dir(Path::new("out.jar")), Path::new("."));
        assert_eq!(staging_dir(Path::new("build/out.jar")), Path::new("build"));
    }
}
