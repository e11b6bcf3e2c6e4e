//! LAMMPS text dump reader and writer
//!
//! Only the single-frame, orthogonal-box layout is supported:
//!
//! ```text
//! ITEM: TIMESTEP
//! 0
//! ITEM: NUMBER OF ATOMS
//! 2
//! ITEM: BOX BOUNDS pp pp pp
//! 0 3.24
//! 0 3.24
//! 0 3.24
//! ITEM: ATOMS id type x y z
//! 1 1 0.00 0.00 0.00
//! 2 2 1.62 1.62 1.62
//! ```
//!
//! Extra atom columns are allowed on input and ignored. Coordinates and
//! bounds are rounded to two decimals on read, which removes the jitter a
//! relaxed or re-exported structure carries before it is snapped to the mesh.

use crate::core_types::{AtomRecord, Configuration, Vec3};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// LAMMPS dump errors
#[derive(Debug, Clone, PartialEq)]
pub enum DumpError {
    /// Underlying file or stream failure
    Io(String),
    /// A section header or its value is missing or malformed
    Header { line: usize, message: String },
    /// An atom line could not be parsed
    Atom { line: usize, message: String },
    /// Fewer atom lines than announced
    Count { expected: usize, found: usize },
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpError::Io(msg) => write!(f, "Dump I/O error: {msg}"),
            DumpError::Header { line, message } => {
                write!(f, "Malformed dump header at line {line}: {message}")
            }
            DumpError::Atom { line, message } => {
                write!(f, "Malformed atom at line {line}: {message}")
            }
            DumpError::Count { expected, found } => {
                write!(f, "Dump announces {expected} atoms but holds {found}")
            }
        }
    }
}

impl std::error::Error for DumpError {}

impl From<std::io::Error> for DumpError {
    fn from(e: std::io::Error) -> Self {
        DumpError::Io(e.to_string())
    }
}

/// Upper bound on atoms reserved up front from the header count
const MAX_PREALLOCATED_ATOMS: usize = 1 << 20;

/// Round to two decimals
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Line cursor tracking 1-based line numbers
struct Lines<R> {
    inner: std::io::Lines<R>,
    number: usize,
}

impl<R: BufRead> Lines<R> {
    fn next_line(&mut self) -> Result<Option<String>, DumpError> {
        match self.inner.next() {
            Some(line) => {
                self.number += 1;
                Ok(Some(line?))
            }
            None => Ok(None),
        }
    }

    fn expect_line(&mut self, what: &str) -> Result<String, DumpError> {
        self.next_line()?.ok_or_else(|| DumpError::Header {
            line: self.number + 1,
            message: format!("unexpected end of file, expected {what}"),
        })
    }

    fn expect_item(&mut self, item: &str) -> Result<String, DumpError> {
        let line = self.expect_line(item)?;
        let rest = line
            .trim()
            .strip_prefix("ITEM:")
            .map(str::trim)
            .filter(|rest| rest.starts_with(item))
            .ok_or_else(|| DumpError::Header {
                line: self.number,
                message: format!("expected 'ITEM: {item}', found '{}'", line.trim()),
            })?;
        Ok(rest[item.len()..].trim().to_string())
    }

    fn header_value<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, DumpError> {
        let line = self.expect_line(what)?;
        line.trim().parse().map_err(|_| DumpError::Header {
            line: self.number,
            message: format!("invalid {what}: '{}'", line.trim()),
        })
    }
}

/// Column positions of the fields we need in the ATOMS section
struct Columns {
    id: usize,
    atom_type: usize,
    xyz: [usize; 3],
    width: usize,
}

impl Columns {
    fn parse(header: &str, line: usize) -> Result<Self, DumpError> {
        let names: Vec<&str> = header.split_whitespace().collect();
        let find = |name: &str| {
            names
                .iter()
                .position(|&n| n == name)
                .ok_or_else(|| DumpError::Header {
                    line,
                    message: format!("ATOMS section has no '{name}' column"),
                })
        };
        Ok(Self {
            id: find("id")?,
            atom_type: find("type")?,
            xyz: [find("x")?, find("y")?, find("z")?],
            width: names.len(),
        })
    }
}

/// Read one configuration from a LAMMPS dump
///
/// # Errors
///
/// Returns a [`DumpError`] describing the first malformed line.
pub fn read_dump<R: BufRead>(reader: R) -> Result<Configuration, DumpError> {
    let mut lines = Lines {
        inner: reader.lines(),
        number: 0,
    };

    lines.expect_item("TIMESTEP")?;
    let timestep: u64 = lines.header_value("timestep")?;
    lines.expect_item("NUMBER OF ATOMS")?;
    let count: usize = lines.header_value("atom count")?;
    lines.expect_item("BOX BOUNDS")?;

    let mut bounds = [[0.0; 2]; 3];
    for axis in &mut bounds {
        let line = lines.expect_line("box bounds")?;
        let values: Vec<f64> = line
            .split_whitespace()
            .take(2)
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| DumpError::Header {
                line: lines.number,
                message: format!("invalid box bounds: '{}'", line.trim()),
            })?;
        if values.len() != 2 {
            return Err(DumpError::Header {
                line: lines.number,
                message: format!("expected 'lo hi', found '{}'", line.trim()),
            });
        }
        *axis = [round2(values[0]), round2(values[1])];
    }

    let header = lines.expect_item("ATOMS")?;
    let columns = Columns::parse(&header, lines.number)?;

    // The header count is untrusted; cap the preallocation
    let mut atoms = Vec::with_capacity(count.min(MAX_PREALLOCATED_ATOMS));
    while atoms.len() < count {
        let Some(line) = lines.next_line()? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let number = lines.number;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < columns.width {
            return Err(DumpError::Atom {
                line: number,
                message: format!("expected {} columns, found {}", columns.width, fields.len()),
            });
        }
        let atom_error = |what: &str| DumpError::Atom {
            line: number,
            message: format!("invalid {what}"),
        };
        // Integral ids and types may be written as floats by some tools
        let integer = |field: &str, what: &str| -> Result<u32, DumpError> {
            let value: f64 = field.parse().map_err(|_| atom_error(what))?;
            if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
                return Err(atom_error(what));
            }
            Ok(value as u32)
        };
        let coordinate = |axis: usize| -> Result<f64, DumpError> {
            fields[columns.xyz[axis]]
                .parse::<f64>()
                .map(round2)
                .map_err(|_| atom_error("coordinate"))
        };

        atoms.push(AtomRecord::new(
            integer(fields[columns.id], "id")?,
            integer(fields[columns.atom_type], "type")?,
            Vec3::new(coordinate(0)?, coordinate(1)?, coordinate(2)?),
        ));
    }

    if atoms.len() != count {
        return Err(DumpError::Count {
            expected: count,
            found: atoms.len(),
        });
    }

    Ok(Configuration {
        timestep,
        bounds,
        atoms,
    })
}

/// Read a dump from disk
///
/// # Errors
///
/// Returns [`DumpError::Io`] if the file cannot be opened, otherwise as
/// [`read_dump`].
pub fn read_dump_file(path: impl AsRef<Path>) -> Result<Configuration, DumpError> {
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|e| DumpError::Io(format!("{}: {e}", path.display())))?;
    let config = read_dump(BufReader::new(file))?;
    let lengths = config.box_lengths();
    info!(
        "Read {} atoms from {} (box {:.2} x {:.2} x {:.2})",
        config.len(),
        path.display(),
        lengths.x,
        lengths.y,
        lengths.z
    );
    Ok(config)
}

/// Append one frame, atoms in the order given
///
/// # Errors
///
/// Propagates write failures.
pub fn write_dump<W: Write>(writer: &mut W, config: &Configuration) -> Result<(), DumpError> {
    writeln!(writer, "ITEM: TIMESTEP")?;
    writeln!(writer, "{}", config.timestep)?;
    writeln!(writer, "ITEM: NUMBER OF ATOMS")?;
    writeln!(writer, "{}", config.len())?;
    writeln!(writer, "ITEM: BOX BOUNDS pp pp pp")?;
    for [lo, hi] in config.bounds {
        writeln!(writer, "{lo} {hi:.2}")?;
    }
    writeln!(writer, "ITEM: ATOMS id type x y z")?;
    for atom in &config.atoms {
        writeln!(
            writer,
            "{} {} {:.2} {:.2} {:.2}",
            atom.id, atom.atom_type, atom.position.x, atom.position.y, atom.position.z
        )?;
    }
    Ok(())
}

/// Write a single-frame dump file, replacing any existing file
///
/// # Errors
///
/// Propagates create and write failures.
pub fn write_dump_file(path: impl AsRef<Path>, config: &Configuration) -> Result<(), DumpError> {
    let path = path.as_ref();
    let file =
        File::create(path).map_err(|e| DumpError::Io(format!("{}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    write_dump(&mut writer, config)?;
    writer.flush()?;
    info!("Wrote {} atoms to {}", config.len(), path.display());
    Ok(())
}
