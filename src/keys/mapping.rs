//! Note-to-key mapping files
//!
//! Plain two-column text, one `NoteName,Key` row per line (`C4,a`). Rows that
//! do not parse are skipped, which also covers `#` comment lines.

use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SessionError;
use crate::types::note::{note_name, parse_note_name};

pub const DEFAULT_MAPPING_FILE: &str = "default_config.csv";

const DEFAULT_MAPPING: &str = "C4,a\nD4,s\nE4,d\nF4,f\nG4,g\nA4,h\nB4,j\nC5,k\n\
# Format: [Note][Octave], [Key]\n\
# Example: C4, a (maps middle C to the 'a' key)\n";

/// Semitone index to key name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMapping {
    keys: BTreeMap<i32, String>,
}

impl KeyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse mapping text, skipping rows that do not parse
    pub fn parse(text: &str) -> Self {
        let mut keys = BTreeMap::new();
        for line in text.lines() {
            let mut columns = line.split(',');
            let (Some(name), Some(key)) = (columns.next(), columns.next()) else {
                continue;
            };

            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            if let Some(note) = parse_note_name(name) {
                keys.insert(note, key.to_string());
            }
        }
        Self { keys }
    }

    /// Load a mapping file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| SessionError::MappingLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::parse(&text))
    }

    /// Load a mapping file, falling back to an empty mapping with a warning
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(mapping) => {
                info!("Loaded {} key mappings from {}", mapping.len(), path.as_ref().display());
                mapping
            }
            Err(e) => {
                warn!("{}; every note is unmapped", e);
                Self::new()
            }
        }
    }

    pub fn key_for(&self, note: i32) -> Option<&str> {
        self.keys.get(&note).map(String::as_str)
    }

    /// Mapped notes in ascending order
    pub fn entries(&self) -> impl Iterator<Item = (i32, &str)> {
        self.keys.iter().map(|(note, key)| (*note, key.as_str()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Human-readable table sorted by note
    pub fn describe(&self) -> String {
        if self.keys.is_empty() {
            return "No mapping loaded".to_string();
        }

        let mut text = String::from("MIDI Note\tKey\n-----------------\n");
        for (note, key) in &self.keys {
            text.push_str(&format!("{} ({})\t{}\n", note, note_name(*note), key));
        }
        text
    }
}

/// Write the default mapping into `dir`, creating the directory if needed
pub fn create_default(dir: impl AsRef<Path>) -> io::Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(DEFAULT_MAPPING_FILE);
    fs::write(&path, DEFAULT_MAPPING)?;
    Ok(path)
}

/// List `.csv` mapping files in `dir`, sorted by name
/// A missing or empty directory is seeded with the default mapping
pub fn scan_mapping_files(dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        info!("Creating mapping directory {}", dir.display());
        return Ok(vec![create_default(dir)?]);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();

    if files.is_empty() {
        info!("No mapping files in {}, writing default", dir.display());
        files.push(create_default(dir)?);
    }

    files.sort();
    Ok(files)
}

/// Mapping files the user can pick from
/// Either the `.csv` files of a mapping directory or a single explicit file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingCatalog {
    dir: Option<PathBuf>,
    files: Vec<PathBuf>,
    selected: usize,
}

impl MappingCatalog {
    /// Scan `dir`, seeding it with the default mapping when missing or empty
    pub fn scan(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            files: scan_mapping_files(dir)?,
            dir: Some(dir.to_path_buf()),
            selected: 0,
        })
    }

    /// A catalog holding one explicitly chosen file
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self {
            dir: None,
            files: vec![path.into()],
            selected: 0,
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn selected(&self) -> Option<&Path> {
        self.files.get(self.selected).map(PathBuf::as_path)
    }

    /// Advance to the next file, wrapping around
    pub fn select_next(&mut self) -> Option<&Path> {
        if !self.files.is_empty() {
            self.selected = (self.selected + 1) % self.files.len();
        }
        self.selected()
    }

    /// Rescan the directory, keeping the current selection when it still exists
    pub fn refresh(&mut self) -> io::Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let current = self.selected().map(Path::to_path_buf);
        let files = scan_mapping_files(dir)?;
        self.selected = current
            .and_then(|current| files.iter().position(|path| *path == current))
            .unwrap_or(0);
        self.files = files;
        Ok(())
    }

    /// Load the selected file, or an empty mapping when nothing is selected
    pub fn load_selected(&self) -> KeyMapping {
        match self.selected() {
            Some(path) => KeyMapping::load_or_empty(path),
            None => KeyMapping::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("stylomidi-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_parse_rows() {
        let mapping = KeyMapping::parse("C4,a\nF#3,z\n");
        assert_eq!(mapping.key_for(60), Some("a"));
        assert_eq!(mapping.key_for(54), Some("z"));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let mapping = KeyMapping::parse("C4\nX9,q\nC4,\n,b\nC999999999,a\nD4 , s \n# comment, row\n");
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.key_for(62), Some("s"));
    }

    #[test]
    fn test_later_rows_override_earlier() {
        let mapping = KeyMapping::parse("C4,a\nC4,b\n");
        assert_eq!(mapping.key_for(60), Some("b"));
    }

    #[test]
    fn test_default_mapping_contents() {
        let mapping = KeyMapping::parse(DEFAULT_MAPPING);
        assert_eq!(mapping.len(), 8);
        assert_eq!(mapping.key_for(60), Some("a"));
        assert_eq!(mapping.key_for(72), Some("k"));
    }

    #[test]
    fn test_missing_file_falls_back_to_empty() {
        let path = scratch_dir("missing").join("nope.csv");
        assert!(matches!(KeyMapping::load(&path), Err(SessionError::MappingLoad { .. })));
        assert!(KeyMapping::load_or_empty(&path).is_empty());
    }

    #[test]
    fn test_scan_seeds_missing_directory() {
        let dir = scratch_dir("scan");
        let files = scan_mapping_files(&dir).unwrap();
        assert_eq!(files, vec![dir.join(DEFAULT_MAPPING_FILE)]);

        fs::write(dir.join("bass.CSV"), "E1,e\n").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();
        let files = scan_mapping_files(&dir).unwrap();
        assert_eq!(files.len(), 2);

        let mapping = KeyMapping::load(&files[0]).unwrap();
        assert_eq!(mapping.key_for(28), Some("e"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_describe() {
        assert_eq!(KeyMapping::new().describe(), "No mapping loaded");
        let text = KeyMapping::parse("A4,h\n").describe();
        assert!(text.contains("69 (A4)\th"));
    }

    #[test]
    fn test_catalog_cycles_and_keeps_selection_on_refresh() {
        let dir = scratch_dir("catalog");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.csv"), "C4,a\n").unwrap();
        fs::write(dir.join("b.csv"), "C4,b\n").unwrap();

        let mut catalog = MappingCatalog::scan(&dir).unwrap();
        assert_eq!(catalog.files().len(), 2);
        assert_eq!(catalog.load_selected().key_for(60), Some("a"));

        assert_eq!(catalog.select_next(), Some(dir.join("b.csv").as_path()));
        assert_eq!(catalog.load_selected().key_for(60), Some("b"));

        // A file sorted before the selection must not move it
        fs::write(dir.join("0.csv"), "C4,z\n").unwrap();
        catalog.refresh().unwrap();
        assert_eq!(catalog.files().len(), 3);
        assert_eq!(catalog.selected(), Some(dir.join("b.csv").as_path()));

        assert_eq!(catalog.select_next(), Some(dir.join("0.csv").as_path()));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_single_catalog_does_not_rescan() {
        let mut catalog = MappingCatalog::single("/definitely/not/here.csv");
        catalog.refresh().unwrap();
        assert_eq!(catalog.files().len(), 1);
        assert_eq!(catalog.select_next(), Some(Path::new("/definitely/not/here.csv")));
        assert!(catalog.load_selected().is_empty());
    }
}
