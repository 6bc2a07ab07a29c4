//! Textual encodings of a [`Dataset`].
//!
//! Two encodings are written for every run, each holding the four tensors in
//! the order `X_train`, `y_train`, `X_test`, `y_test`:
//!
//! * a declarative listing, loadable as a Python module:
//!   ```text
//!   X_train_shape = [ 23 , 8 , 21 ]
//!   X_train_seq = [ 1, 0, 0, ... ]
//!   ```
//! * a flat table, one header row with the shape triple and one data row:
//!   ```text
//!   23,8,21
//!   1,0,0,...
//!   ```
//!
//! Values are flattened sequence-major, then step-major, then feature-major.
//! Both encodings decode to the same tensors.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
    Bit,
    corpus::{Corpus, Dataset},
    tensor::{Shape, Tensor3, TensorError},
};

pub const MODULE_FILE_NAME: &str = "maze_dataset.py";
pub const CSV_FILE_NAME: &str = "maze_dataset.csv";

const TENSOR_NAMES: [&str; 4] = ["X_train", "y_train", "X_test", "y_test"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Line {line}: expected {expected}")]
    Malformed { line: usize, expected: String },
    #[error("Line {line}: invalid value '{token}', expected 0 or 1")]
    InvalidValue { line: usize, token: String },
    #[error("Line {line}: invalid shape entry '{token}'")]
    InvalidShape { line: usize, token: String },
    #[error("Missing record {0}")]
    MissingRecord(String),
    #[error("Line {line}: {source}")]
    Tensor {
        line: usize,
        #[source]
        source: TensorError,
    },
    #[error("Line {0}: unexpected content after the last record")]
    TrailingContent(usize),
}

fn tensors(dataset: &Dataset) -> [&Tensor3<Bit>; 4] {
    [
        &dataset.train.x,
        &dataset.train.y,
        &dataset.test.x,
        &dataset.test.y,
    ]
}

fn join_values(values: &[Bit], separator: &str) -> String {
    let mut out = String::with_capacity(values.len() * (1 + separator.len()));
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        let _ = write!(out, "{}", value);
    }
    out
}

/// Renders the declarative listing.
pub fn to_module(dataset: &Dataset) -> String {
    let mut out = String::new();
    for (name, tensor) in TENSOR_NAMES.iter().zip(tensors(dataset)) {
        let shape = tensor.shape();
        let _ = writeln!(
            out,
            "{}_shape = [ {} , {} , {} ]",
            name, shape.count, shape.steps, shape.width
        );
        let _ = writeln!(
            out,
            "{}_seq = [ {} ]",
            name,
            join_values(tensor.as_slice(), ", ")
        );
    }
    out
}

/// Renders the flat table.
pub fn to_csv(dataset: &Dataset) -> String {
    let mut out = String::new();
    for tensor in tensors(dataset) {
        let shape = tensor.shape();
        let _ = writeln!(out, "{},{},{}", shape.count, shape.steps, shape.width);
        let _ = writeln!(out, "{}", join_values(tensor.as_slice(), ","));
    }
    out
}

fn parse_shape(tokens: &[&str], line: usize) -> Result<Shape, ParseError> {
    if tokens.len() != 3 {
        return Err(ParseError::Malformed {
            line,
            expected: format!("a shape triple, found {} entries", tokens.len()),
        });
    }
    let mut dims = [0usize; 3];
    for (dim, token) in dims.iter_mut().zip(tokens) {
        *dim = token.parse().map_err(|_| ParseError::InvalidShape {
            line,
            token: token.to_string(),
        })?;
    }
    Ok(Shape::new(dims[0], dims[1], dims[2]))
}

fn parse_values<'a>(
    tokens: impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<Vec<Bit>, ParseError> {
    tokens
        .map(|token| match token {
            "0" => Ok(0),
            "1" => Ok(1),
            other => Err(ParseError::InvalidValue {
                line,
                token: other.to_string(),
            }),
        })
        .collect()
}

fn build_tensor(
    shape: Shape,
    values: Vec<Bit>,
    line: usize,
) -> Result<Tensor3<Bit>, ParseError> {
    Tensor3::from_values(shape, values).map_err(|source| ParseError::Tensor { line, source })
}

/// Splits `name = [ a, b, c ]` into its list entries.
fn list_entries<'a>(text: &'a str, name: &str, line: usize) -> Result<Vec<&'a str>, ParseError> {
    let malformed = || ParseError::Malformed {
        line,
        expected: format!("'{} = [ ... ]'", name),
    };
    let (key, value) = text.split_once('=').ok_or_else(malformed)?;
    if key.trim() != name {
        return Err(malformed());
    }
    let inner = value
        .trim()
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(malformed)?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<&str> = inner.split(',').map(str::trim).collect();
    if entries.iter().any(|token| token.is_empty()) {
        return Err(ParseError::Malformed {
            line,
            expected: format!("'{}' entries separated by single commas", name),
        });
    }
    Ok(entries)
}

/// Decodes the declarative listing.
pub fn from_module(text: &str) -> Result<Dataset, ParseError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let mut record = |name: &str| -> Result<Tensor3<Bit>, ParseError> {
        let shape_name = format!("{}_shape", name);
        let (line, text) = lines
            .next()
            .ok_or_else(|| ParseError::MissingRecord(shape_name.clone()))?;
        let shape = parse_shape(&list_entries(text, &shape_name, line)?, line)?;

        let seq_name = format!("{}_seq", name);
        let (line, text) = lines
            .next()
            .ok_or_else(|| ParseError::MissingRecord(seq_name.clone()))?;
        let values = parse_values(list_entries(text, &seq_name, line)?.into_iter(), line)?;
        build_tensor(shape, values, line)
    };

    let dataset = Dataset {
        train: Corpus {
            x: record("X_train")?,
            y: record("y_train")?,
        },
        test: Corpus {
            x: record("X_test")?,
            y: record("y_test")?,
        },
    };
    if let Some((line, _)) = lines.next() {
        return Err(ParseError::TrailingContent(line));
    }
    Ok(dataset)
}

/// Decodes the flat table.
pub fn from_csv(text: &str) -> Result<Dataset, ParseError> {
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

    let mut record = |name: &str| -> Result<Tensor3<Bit>, ParseError> {
        let (line, header) = lines
            .next()
            .ok_or_else(|| ParseError::MissingRecord(format!("{} shape row", name)))?;
        let tokens: Vec<&str> = header.split(',').map(str::trim).collect();
        let shape = parse_shape(&tokens, line)?;

        let (line, row) = lines
            .next()
            .ok_or_else(|| ParseError::MissingRecord(format!("{} data row", name)))?;
        let values = if row.trim().is_empty() {
            Vec::new()
        } else {
            parse_values(row.split(',').map(str::trim), line)?
        };
        build_tensor(shape, values, line)
    };

    let dataset = Dataset {
        train: Corpus {
            x: record("X_train")?,
            y: record("y_train")?,
        },
        test: Corpus {
            x: record("X_test")?,
            y: record("y_test")?,
        },
    };
    if let Some((line, _)) = lines.find(|(_, line)| !line.trim().is_empty()) {
        return Err(ParseError::TrailingContent(line));
    }
    Ok(dataset)
}

/// Where a successful write put each artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub module: PathBuf,
    pub csv: PathBuf,
}

/// Both encodings of one dataset, fully rendered before anything touches disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetArtifacts {
    pub module: String,
    pub csv: String,
}

impl DatasetArtifacts {
    pub fn render(dataset: &Dataset) -> Self {
        DatasetArtifacts {
            module: to_module(dataset),
            csv: to_csv(dataset),
        }
    }

    /// Writes both artifacts into `dir` with the default file names.
    pub fn write_to(&self, dir: &Path) -> io::Result<ArtifactPaths> {
        self.write_named(dir, MODULE_FILE_NAME, CSV_FILE_NAME)
    }

    /// Writes both artifacts into `dir`.
    ///
    /// Each file is staged under a temporary name and only renamed into place
    /// once both have been written. If the second rename fails the first is
    /// rolled back, restoring any module file it replaced, so a failure never
    /// leaves one artifact without the other.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` without touching the disk if both names are the same.
    pub fn write_named(
        &self,
        dir: &Path,
        module_name: &str,
        csv_name: &str,
    ) -> io::Result<ArtifactPaths> {
        if module_name == csv_name {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("module and csv artifacts share the file name '{}'", module_name),
            ));
        }
        fs::create_dir_all(dir)?;
        let paths = ArtifactPaths {
            module: dir.join(module_name),
            csv: dir.join(csv_name),
        };
        let module_tmp = temp_path(dir, module_name, "tmp");
        let csv_tmp = temp_path(dir, csv_name, "tmp");
        let module_backup = temp_path(dir, module_name, "bak");

        let staged = fs::write(&module_tmp, &self.module)
            .and_then(|_| fs::write(&csv_tmp, &self.csv))
            .and_then(|_| publish(&module_tmp, &csv_tmp, &module_backup, &paths));
        if let Err(e) = staged {
            let _ = fs::remove_file(&module_tmp);
            let _ = fs::remove_file(&csv_tmp);
            return Err(e);
        }

        info!(
            module = %paths.module.display(),
            csv = %paths.csv.display(),
            "Wrote maze dataset"
        );
        Ok(paths)
    }
}

/// Moves both staged files into place, undoing the module rename if the csv
/// rename fails.
fn publish(
    module_tmp: &Path,
    csv_tmp: &Path,
    module_backup: &Path,
    paths: &ArtifactPaths,
) -> io::Result<()> {
    let backed_up = match fs::rename(&paths.module, module_backup) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };
    let restore = || {
        if backed_up {
            let _ = fs::rename(module_backup, &paths.module);
        }
    };

    if let Err(e) = fs::rename(module_tmp, &paths.module) {
        restore();
        return Err(e);
    }
    if let Err(e) = fs::rename(csv_tmp, &paths.csv) {
        let _ = fs::remove_file(&paths.module);
        restore();
        return Err(e);
    }
    if backed_up {
        let _ = fs::remove_file(module_backup);
    }
    Ok(())
}

fn temp_path(dir: &Path, file_name: &str, suffix: &str) -> PathBuf {
    dir.join(format!(".{}.{}", file_name, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MazeConfig, corpus::generate};

    fn small_dataset() -> Dataset {
        let layout = crate::FeatureLayout::new(1, 1);
        let x = Tensor3::from_values(Shape::new(1, 2, layout.input_width()), vec![
            1, 0, 0, 0, 0, 1, 0, 0, 0, //
            0, 0, 0, 1, 0, 0, 0, 0, 1,
        ])
        .unwrap();
        let y = Tensor3::from_values(Shape::new(1, 2, 2), vec![1, 0, 1, 0]).unwrap();
        let empty_x = Tensor3::from_values(Shape::new(0, 2, 9), Vec::new()).unwrap();
        let empty_y = Tensor3::from_values(Shape::new(0, 2, 2), Vec::new()).unwrap();
        Dataset {
            train: Corpus { x, y },
            test: Corpus {
                x: empty_x,
                y: empty_y,
            },
        }
    }

    #[test]
    fn module_layout() {
        let text = to_module(&small_dataset());
        let expected = "\
X_train_shape = [ 1 , 2 , 9 ]
X_train_seq = [ 1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1 ]
y_train_shape = [ 1 , 2 , 2 ]
y_train_seq = [ 1, 0, 1, 0 ]
X_test_shape = [ 0 , 2 , 9 ]
X_test_seq = [  ]
y_test_shape = [ 0 , 2 , 2 ]
y_test_seq = [  ]
";
        assert_eq!(text, expected);
    }

    #[test]
    fn csv_layout() {
        let text = to_csv(&small_dataset());
        let expected = "\
1,2,9
1,0,0,0,0,1,0,0,0,0,0,0,1,0,0,0,0,1
1,2,2
1,0,1,0
0,2,9

0,2,2

";
        assert_eq!(text, expected);
    }

    #[test]
    fn both_encodings_decode_to_the_generated_dataset() {
        let config = MazeConfig::default().validate().unwrap();
        let dataset = generate(&config).unwrap();
        let artifacts = DatasetArtifacts::render(&dataset);

        let from_module = from_module(&artifacts.module).unwrap();
        let from_csv = from_csv(&artifacts.csv).unwrap();
        assert_eq!(from_module, dataset);
        assert_eq!(from_csv, dataset);
    }

    #[test]
    fn empty_test_split_survives_both_encodings() {
        let dataset = small_dataset();
        assert_eq!(from_module(&to_module(&dataset)).unwrap(), dataset);
        assert_eq!(from_csv(&to_csv(&dataset)).unwrap(), dataset);
    }

    #[test]
    fn rejects_length_mismatch() {
        let text = to_csv(&small_dataset()).replacen("1,0,1,0", "1,0,1", 1);
        let err = from_csv(&text).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Tensor {
                line: 4,
                source: TensorError::LengthMismatch { expected: 4, found: 3, .. }
            }
        ));
    }

    #[test]
    fn rejects_non_binary_values() {
        let text = to_module(&small_dataset()).replacen("[ 1, 0, 1, 0 ]", "[ 1, 0, 2, 0 ]", 1);
        assert_eq!(
            from_module(&text).unwrap_err(),
            ParseError::InvalidValue {
                line: 4,
                token: "2".to_string()
            }
        );
    }

    #[test]
    fn rejects_misnamed_and_missing_records() {
        let text = to_module(&small_dataset()).replacen("y_train_shape", "y_shape", 1);
        assert!(matches!(
            from_module(&text),
            Err(ParseError::Malformed { line: 3, .. })
        ));

        let csv = to_csv(&small_dataset());
        let truncated = csv.lines().take(5).collect::<Vec<_>>().join("\n");
        assert!(matches!(
            from_csv(&truncated),
            Err(ParseError::MissingRecord(_))
        ));

        let extra = format!("{}extra = [ 1 ]\n", to_module(&small_dataset()));
        assert_eq!(from_module(&extra), Err(ParseError::TrailingContent(9)));
    }

    #[test]
    fn writes_both_files_and_no_temporaries() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DatasetArtifacts::render(&small_dataset());
        let paths = artifacts.write_to(dir.path()).unwrap();

        assert_eq!(paths.module, dir.path().join(MODULE_FILE_NAME));
        assert_eq!(fs::read_to_string(&paths.module).unwrap(), artifacts.module);
        assert_eq!(fs::read_to_string(&paths.csv).unwrap(), artifacts.csv);

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn identical_runs_write_identical_bytes() {
        let config = MazeConfig::default().validate().unwrap();
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        DatasetArtifacts::render(&generate(&config).unwrap())
            .write_to(a.path())
            .unwrap();
        DatasetArtifacts::render(&generate(&config).unwrap())
            .write_to(b.path())
            .unwrap();
        for name in [MODULE_FILE_NAME, CSV_FILE_NAME] {
            assert_eq!(
                fs::read(a.path().join(name)).unwrap(),
                fs::read(b.path().join(name)).unwrap()
            );
        }
    }

    #[test]
    fn rejects_empty_list_entries() {
        let text = to_module(&small_dataset()).replacen("[ 1, 0, 1, 0 ]", "[ 1,, 0, 1, 0 ]", 1);
        assert!(matches!(
            from_module(&text),
            Err(ParseError::Malformed { line: 4, .. })
        ));

        let text = to_module(&small_dataset()).replacen("[ 1 , 2 , 2 ]", "[ 1 , 2 , 2, ]", 1);
        assert!(matches!(
            from_module(&text),
            Err(ParseError::Malformed { line: 3, .. })
        ));

        let csv = to_csv(&small_dataset()).replacen("1,0,1,0", "1,,0,1,0", 1);
        assert!(from_csv(&csv).is_err());
    }

    #[test]
    fn failed_csv_rename_leaves_no_module() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join(CSV_FILE_NAME);
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("occupied"), "x").unwrap();

        let artifacts = DatasetArtifacts::render(&small_dataset());
        assert!(artifacts.write_to(dir.path()).is_err());

        assert!(!dir.path().join(MODULE_FILE_NAME).exists());
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(CSV_FILE_NAME)]);
    }

    #[test]
    fn failed_csv_rename_restores_previous_module() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join(MODULE_FILE_NAME);
        fs::write(&module, "previous").unwrap();
        let blocker = dir.path().join(CSV_FILE_NAME);
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("occupied"), "x").unwrap();

        let artifacts = DatasetArtifacts::render(&small_dataset());
        assert!(artifacts.write_to(dir.path()).is_err());
        assert_eq!(fs::read_to_string(&module).unwrap(), "previous");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn overwrites_previous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MODULE_FILE_NAME), "previous").unwrap();
        fs::write(dir.path().join(CSV_FILE_NAME), "previous").unwrap();

        let artifacts = DatasetArtifacts::render(&small_dataset());
        let paths = artifacts.write_to(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&paths.module).unwrap(), artifacts.module);
        assert_eq!(fs::read_to_string(&paths.csv).unwrap(), artifacts.csv);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn rejects_shared_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let artifacts = DatasetArtifacts::render(&small_dataset());
        let err = artifacts.write_named(&out, "same", "same").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(!out.exists());
    }
}
