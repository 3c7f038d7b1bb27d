use crate::io::{ExportError, RosterTable};
use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub trait ArtifactSink {
    /// Persiste un tableau sous un nom d'artefact ; renvoie son emplacement.
    fn persist(&mut self, name: &str, table: &RosterTable) -> Result<PathBuf, ExportError>;
}

/// Un fichier `<name>.csv` par artefact dans un répertoire.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    dir: PathBuf,
}

impl CsvDirectory {
    /// Crée le répertoire au besoin.
    pub fn open<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }
}

impl ArtifactSink for CsvDirectory {
    /// Écriture atomique : fichier temporaire dans le même répertoire puis renommage.
    fn persist(&mut self, name: &str, table: &RosterTable) -> Result<PathBuf, ExportError> {
        let path = self.path_for(name);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        table.write_csv(&mut tmp)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)?;
        Ok(path)
    }
}

/// Garde les tableaux en mémoire (tests, `--dry-run`).
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    tables: Vec<(String, RosterTable)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> &[(String, RosterTable)] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&RosterTable> {
        self.tables.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tables.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl ArtifactSink for MemorySink {
    fn persist(&mut self, name: &str, table: &RosterTable) -> Result<PathBuf, ExportError> {
        self.tables.push((name.to_string(), table.clone()));
        Ok(PathBuf::from(name))
    }
}

impl<S: ArtifactSink + ?Sized> ArtifactSink for &mut S {
    fn persist(&mut self, name: &str, table: &RosterTable) -> Result<PathBuf, ExportError> {
        (**self).persist(name, table)
    }
}
