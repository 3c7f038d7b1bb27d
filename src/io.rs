use crate::model::{DomainModel, SlotId};
use crate::schedule::Schedule;
use anyhow::Context;
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Format des dates dans les tableaux exportés.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// En-tête de la première colonne.
pub const DATE_HEADER: &str = "Date";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("atomic rename failed: {0}")]
    Persist(#[from] tempfile::PersistError),
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing header row")]
    MissingHeader,
    #[error("first column must be \"Date\", found {0:?}")]
    MissingDateColumn(String),
    #[error("unknown shift column {0:?}")]
    UnknownColumn(String),
    #[error("shift column {0:?} appears more than once")]
    DuplicateColumn(String),
    #[error("row {row}: expected {expected} cells, found {found}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row}: invalid date {value:?}")]
    BadDate { row: usize, value: String },
    #[error("row {row}: date {date} is outside the horizon")]
    DateOutsideHorizon { row: usize, date: NaiveDate },
    #[error("row {row}: date {date} already appears on row {first}")]
    DuplicateDate {
        row: usize,
        first: usize,
        date: NaiveDate,
    },
    #[error("row {row}: unknown nurse {name:?}")]
    UnknownNurse { row: usize, name: String },
}

/// Une ligne du tableau : une date et une cellule par créneau.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub date: NaiveDate,
    pub cells: Vec<String>,
}

/// Tableau exporté : dates × libellés de créneaux → noms affichés.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterTable {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl RosterTable {
    /// Une ligne par jour de l'horizon ; cellule vide pour un créneau sans affectation.
    pub fn from_schedule(domain: &DomainModel, schedule: &Schedule) -> Self {
        let columns = domain.slots().iter().map(|s| s.label.clone()).collect();
        let rows = domain
            .calendar()
            .days()
            .iter()
            .map(|day| TableRow {
                date: day.date,
                cells: domain
                    .slots()
                    .iter()
                    .map(|slot| {
                        schedule
                            .get(day.index, slot.id)
                            .and_then(|n| domain.nurse(n))
                            .map(|n| n.name.clone())
                            .unwrap_or_default()
                    })
                    .collect(),
            })
            .collect();
        Self { columns, rows }
    }

    /// Reconstruit un `Schedule` en résolvant libellés, dates et noms contre le modèle.
    ///
    /// Une colonne ou une date en double est refusée plutôt que d'écraser des cellules.
    pub fn to_schedule(&self, domain: &DomainModel) -> Result<Schedule, TableError> {
        let mut slots: Vec<SlotId> = Vec::with_capacity(self.columns.len());
        for label in &self.columns {
            let slot = domain
                .slots()
                .iter()
                .find(|s| &s.label == label)
                .map(|s| s.id)
                .ok_or_else(|| TableError::UnknownColumn(label.clone()))?;
            if slots.contains(&slot) {
                return Err(TableError::DuplicateColumn(label.clone()));
            }
            slots.push(slot);
        }

        let calendar = domain.calendar();
        let mut schedule = Schedule::new(calendar.len(), domain.slots().len());
        let mut seen: HashMap<usize, usize> = HashMap::new();
        for (idx, row) in self.rows.iter().enumerate() {
            let line = idx + 2;
            let day = calendar
                .days()
                .iter()
                .find(|d| d.date == row.date)
                .ok_or(TableError::DateOutsideHorizon {
                    row: line,
                    date: row.date,
                })?;
            if let Some(&first) = seen.get(&day.index) {
                return Err(TableError::DuplicateDate {
                    row: line,
                    first,
                    date: row.date,
                });
            }
            seen.insert(day.index, line);
            for (slot, name) in slots.iter().zip(&row.cells) {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let nurse = domain
                    .find_nurse_by_name(name)
                    .ok_or_else(|| TableError::UnknownNurse {
                        row: line,
                        name: name.to_string(),
                    })?;
                schedule.assign(day.index, *slot, Some(nurse.id));
            }
        }
        Ok(schedule)
    }

    /// En-tête `Date` + libellés, puis une ligne par jour (`dd/mm/YYYY`).
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut w = WriterBuilder::new().has_headers(false).from_writer(writer);
        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(DATE_HEADER);
        header.extend(self.columns.iter().map(String::as_str));
        w.write_record(&header)?;
        for row in &self.rows {
            let date = row.date.format(DATE_FORMAT).to_string();
            let mut record = Vec::with_capacity(row.cells.len() + 1);
            record.push(date.as_str());
            record.extend(row.cells.iter().map(String::as_str));
            w.write_record(&record)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn read_csv<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = rdr.records();
        let header = records.next().ok_or(TableError::MissingHeader)??;
        let mut fields = header.iter();
        match fields.next() {
            Some(first) if first.trim() == DATE_HEADER => {}
            other => {
                return Err(TableError::MissingDateColumn(
                    other.unwrap_or_default().to_string(),
                ))
            }
        }
        let columns: Vec<String> = fields.map(|f| f.trim().to_string()).collect();

        let mut rows = Vec::new();
        for (idx, rec) in records.enumerate() {
            let rec = rec?;
            let line = idx + 2;
            if rec.len() != columns.len() + 1 {
                return Err(TableError::RowWidth {
                    row: line,
                    expected: columns.len() + 1,
                    found: rec.len(),
                });
            }
            let raw = rec.get(0).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
                TableError::BadDate {
                    row: line,
                    value: raw.to_string(),
                }
            })?;
            let cells = rec.iter().skip(1).map(|c| c.trim().to_string()).collect();
            rows.push(TableRow { date, cells });
        }
        Ok(Self { columns, rows })
    }

    pub fn to_csv_string(&self) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Export CSV d'un tableau vers un chemin (écriture directe, non atomique).
pub fn export_table_csv<P: AsRef<Path>>(path: P, table: &RosterTable) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    table
        .write_csv(file)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Import d'un tableau exporté : header `Date,<libellés...>`.
pub fn import_table_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<RosterTable> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let table =
        RosterTable::read_csv(file).with_context(|| format!("parsing {}", path.display()))?;
    Ok(table)
}
