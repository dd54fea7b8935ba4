//! Result output
//!
//! Tables on a console stream, or little-endian binary files in a
//! directory, one file per island and quantity:
//!
//! - `fitness_{id}.dat`: per individual, an `i32` id then an `f64` fitness
//! - `bsf_{id}.dat`, `average_fitness_{id}.dat`: one `f64` per generation
//! - `best_genome_{id}.dat`: one `f64` per gene

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Stdout, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::genome::real_vector::RealVector;
use crate::population::individual::Individual;
use crate::results::IslandOutcome;

const CONSOLE_SENTINEL: &str = "stdout";
const RULE_WIDTH: usize = 30;

/// Where results are written
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Destination {
    Console,
    Directory(PathBuf),
}

impl From<String> for Destination {
    fn from(value: String) -> Self {
        if value == CONSOLE_SENTINEL {
            Self::Console
        } else {
            Self::Directory(PathBuf::from(value))
        }
    }
}

impl From<&str> for Destination {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Destination> for String {
    fn from(value: Destination) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console => f.write_str(CONSOLE_SENTINEL),
            Self::Directory(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Default for Destination {
    fn default() -> Self {
        Self::Console
    }
}

/// Which quantities are written at the end of a run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintOptions {
    pub fitness: bool,
    pub average_fitness: bool,
    pub bsf: bool,
    pub best_genome: bool,
    #[serde(rename = "where_to_write")]
    pub destination: Destination,
}

impl PrintOptions {
    /// Write every enabled quantity for one island
    pub fn emit<R: Reporter + ?Sized>(
        &self,
        reporter: &mut R,
        sorted_population: &[Individual],
        outcome: &IslandOutcome,
    ) -> io::Result<()> {
        let island = outcome.island;
        if self.fitness {
            reporter.print_fitness(sorted_population, island)?;
        }
        if self.average_fitness {
            reporter.print_average_fitness(&outcome.average_fitness, island)?;
        }
        if self.bsf {
            reporter.print_bsf(&outcome.bsf, island)?;
        }
        if self.best_genome {
            reporter.print_best_genome(&outcome.best_genome, island)?;
        }
        Ok(())
    }
}

/// Sink for end-of-run results
pub trait Reporter: Send {
    fn print_fitness(&mut self, population: &[Individual], island: usize) -> io::Result<()>;

    fn print_bsf(&mut self, trace: &[f64], island: usize) -> io::Result<()>;

    fn print_average_fitness(&mut self, trace: &[f64], island: usize) -> io::Result<()>;

    fn print_best_genome(&mut self, genome: &RealVector, island: usize) -> io::Result<()>;
}

/// Writes result tables to a console stream or binary files to a directory
pub struct ResultWriter<W: Write + Send = Stdout> {
    destination: Destination,
    console: W,
}

impl ResultWriter<Stdout> {
    /// Writer whose console stream is standard output
    pub fn stdout(destination: Destination) -> Self {
        Self::new(destination, io::stdout())
    }
}

impl<W: Write + Send> ResultWriter<W> {
    pub fn new(destination: Destination, console: W) -> Self {
        Self {
            destination,
            console,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Recover the console stream
    pub fn into_inner(self) -> W {
        self.console
    }

    /// Open `{prefix}{island}.dat`, or `None` when the directory is missing
    fn create(&self, prefix: &str, island: usize) -> io::Result<Option<BufWriter<File>>> {
        let Destination::Directory(dir) = &self.destination else {
            return Ok(None);
        };
        if !dir.is_dir() {
            warn!(directory = %dir.display(), "output directory does not exist, nothing will be saved");
            return Ok(None);
        }
        let path = dir.join(format!("{prefix}{island}.dat"));
        info!(path = %path.display(), "writing results");
        Ok(Some(BufWriter::new(File::create(path)?)))
    }

    fn write_trace(&mut self, header: &str, prefix: &str, trace: &[f64], island: usize) -> io::Result<()> {
        match self.destination {
            Destination::Console => {
                writeln!(self.console, "{:^12} | {:^10}", "Generation #", header)?;
                writeln!(self.console, "{}", "-".repeat(RULE_WIDTH))?;
                for (generation, value) in trace.iter().enumerate() {
                    writeln!(self.console, "{generation:>12} | {value:>10.7}")?;
                }
                Ok(())
            }
            Destination::Directory(_) => {
                if let Some(mut file) = self.create(prefix, island)? {
                    for value in trace {
                        file.write_all(&value.to_le_bytes())?;
                    }
                    file.flush()?;
                }
                Ok(())
            }
        }
    }
}

impl<W: Write + Send> Reporter for ResultWriter<W> {
    fn print_fitness(&mut self, population: &[Individual], island: usize) -> io::Result<()> {
        match self.destination {
            Destination::Console => {
                writeln!(self.console, "{:^5} | {:^10}", "ID", "Fitness")?;
                writeln!(self.console, "{}", "-".repeat(RULE_WIDTH))?;
                for individual in population {
                    writeln!(
                        self.console,
                        "{:>5} | {:>10.7}",
                        individual.id,
                        individual.rank_value()
                    )?;
                }
                Ok(())
            }
            Destination::Directory(_) => {
                if let Some(mut file) = self.create("fitness_", island)? {
                    for individual in population {
                        let id = i32::try_from(individual.id).unwrap_or(i32::MAX);
                        file.write_all(&id.to_le_bytes())?;
                        file.write_all(&individual.rank_value().to_le_bytes())?;
                    }
                    file.flush()?;
                }
                Ok(())
            }
        }
    }

    fn print_bsf(&mut self, trace: &[f64], island: usize) -> io::Result<()> {
        self.write_trace("BSF", "bsf_", trace, island)
    }

    fn print_average_fitness(&mut self, trace: &[f64], island: usize) -> io::Result<()> {
        self.write_trace("Average Fitness", "average_fitness_", trace, island)
    }

    fn print_best_genome(&mut self, genome: &RealVector, island: usize) -> io::Result<()> {
        match self.destination {
            Destination::Console => {
                writeln!(self.console)?;
                writeln!(self.console, "Best Genome")?;
                writeln!(self.console, "{}", "-".repeat(RULE_WIDTH))?;
                let line: Vec<String> = genome.genes().iter().map(f64::to_string).collect();
                writeln!(self.console, "{}", line.join("  "))?;
                Ok(())
            }
            Destination::Directory(_) => {
                if let Some(mut file) = self.create("best_genome_", island)? {
                    for gene in genome.genes() {
                        file.write_all(&gene.to_le_bytes())?;
                    }
                    file.flush()?;
                }
                Ok(())
            }
        }
    }
}

/// Read a binary `f64` trace written in directory mode
pub fn read_trace(path: impl AsRef<Path>) -> io::Result<Vec<f64>> {
    let bytes = fs::read(path.as_ref())?;
    if bytes.len() % 8 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("trace length {} is not a multiple of 8", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome() -> IslandOutcome {
        IslandOutcome {
            island: 3,
            bsf: vec![-4.0, -2.5, -1.0],
            average_fitness: vec![-9.0, -6.0, -3.0],
            best_genome: RealVector::new(vec![0.5, -0.25]),
        }
    }

    fn population() -> Vec<Individual> {
        vec![
            Individual::with_fitness(0, RealVector::new(vec![1.0, 1.0]), -2.0),
            Individual::with_fitness(1, RealVector::new(vec![0.5, -0.25]), -0.3125),
        ]
    }

    #[test]
    fn test_destination_parse() {
        assert_eq!(Destination::from("stdout"), Destination::Console);
        assert_eq!(
            Destination::from("/tmp/out"),
            Destination::Directory(PathBuf::from("/tmp/out"))
        );
        let json = serde_json::to_string(&Destination::Console).unwrap();
        assert_eq!(json, "\"stdout\"");
    }

    #[test]
    fn test_console_tables() {
        let options = PrintOptions {
            fitness: true,
            average_fitness: true,
            bsf: true,
            best_genome: true,
            destination: Destination::Console,
        };
        let mut writer = ResultWriter::new(Destination::Console, Vec::new());
        options.emit(&mut writer, &population(), &outcome()).unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.contains("Fitness"));
        assert!(text.contains("Generation # |    BSF"));
        assert!(text.contains("Average Fitness"));
        assert!(text.contains("Best Genome"));
        assert!(text.contains("0.5  -0.25"));
        assert_eq!(text.matches(&"-".repeat(RULE_WIDTH)).count(), 4);
    }

    #[test]
    fn test_directory_files() {
        let dir = tempfile::tempdir().unwrap();
        let destination = Destination::Directory(dir.path().to_path_buf());
        let options = PrintOptions {
            fitness: true,
            average_fitness: true,
            bsf: true,
            best_genome: true,
            destination: destination.clone(),
        };
        let mut writer = ResultWriter::new(destination, Vec::new());
        options.emit(&mut writer, &population(), &outcome()).unwrap();

        assert_eq!(read_trace(dir.path().join("bsf_3.dat")).unwrap(), outcome().bsf);
        assert_eq!(
            read_trace(dir.path().join("average_fitness_3.dat")).unwrap(),
            outcome().average_fitness
        );
        assert_eq!(
            read_trace(dir.path().join("best_genome_3.dat")).unwrap(),
            vec![0.5, -0.25]
        );

        let raw = fs::read(dir.path().join("fitness_3.dat")).unwrap();
        assert_eq!(raw.len(), 2 * (4 + 8));
        assert_eq!(i32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]), 1);
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn test_missing_directory_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let mut writer = ResultWriter::new(Destination::Directory(missing.clone()), Vec::new());
        writer.print_bsf(&[1.0], 0).unwrap();
        assert!(!missing.exists());
    }

    #[test]
    fn test_read_trace_rejects_partial_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.dat");
        fs::write(&path, [0u8; 5]).unwrap();
        assert!(read_trace(&path).is_err());
    }
}
