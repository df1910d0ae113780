use std::fmt;

use rand::Rng;
use serde::ser::{Error as _, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{NnError, Result};
use crate::math::rng;

/// Dense row-major matrix of `f64`.
///
/// Operations come in two flavours:
/// - associated functions (`Matrix::sum`, `Matrix::multiply`, `transpose`, `mapped`, ...)
///   leave their operands untouched and allocate a new result;
/// - `&mut self` methods (`add`, `subtract`, `multiply_hadamard`, `map`, ...) update the
///   matrix in place and hand it back for chaining.
///
/// `data` always holds exactly `rows` rows of `cols` values and both dimensions are
/// positive; constructors and deserialization check this.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "MatrixRecord")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<Vec<f64>>,
}

/// Wire shape of a matrix, checked before it becomes a `Matrix`.
#[derive(Deserialize)]
struct MatrixRecord {
    rows: usize,
    cols: usize,
    data: Vec<Vec<f64>>,
}

/// Why a decoded record was refused. Wrapped into `NnError::MalformedRecord` once,
/// at the outermost decode call.
#[derive(Debug)]
pub(crate) struct RecordError(pub(crate) String);

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<MatrixRecord> for Matrix {
    type Error = RecordError;

    fn try_from(record: MatrixRecord) -> std::result::Result<Matrix, RecordError> {
        let MatrixRecord { rows, cols, data } = record;
        if rows == 0 || cols == 0 {
            return Err(RecordError(format!(
                "matrix must have positive dimensions, got {rows}x{cols}"
            )));
        }
        if data.len() != rows {
            return Err(RecordError(format!(
                "matrix declares {rows} rows but data has {}",
                data.len()
            )));
        }
        if let Some((i, row)) = data.iter().enumerate().find(|(_, row)| row.len() != cols) {
            return Err(RecordError(format!(
                "matrix declares {cols} columns but row {i} has {}",
                row.len()
            )));
        }
        Ok(Matrix { rows, cols, data })
    }
}

/// Refuses NaN and ±inf, which JSON would silently turn into `null`.
impl Serialize for Matrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if let Some((row, col, value)) = self.first_non_finite() {
            return Err(S::Error::custom(format!(
                "matrix entry ({row}, {col}) is {value}"
            )));
        }
        let mut state = serializer.serialize_struct("Matrix", 3)?;
        state.serialize_field("rows", &self.rows)?;
        state.serialize_field("cols", &self.cols)?;
        state.serialize_field("data", &self.data)?;
        state.end()
    }
}

fn ensure_same_shape(op: &'static str, a: &Matrix, b: &Matrix) -> Result<()> {
    if a.rows != b.rows || a.cols != b.cols {
        return Err(NnError::DimensionMismatch {
            op,
            left: a.shape(),
            right: b.shape(),
        });
    }
    Ok(())
}

fn check_dimensions(rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(NnError::EmptyMatrix { rows, cols });
    }
    Ok(())
}

impl Matrix {
    /// Unchecked allocation for shapes derived from existing matrices.
    fn zeroed(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows],
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Result<Matrix> {
        check_dimensions(rows, cols)?;
        Ok(Matrix::zeroed(rows, cols))
    }

    /// Builds a matrix from nested rows. All rows must have the same, non-zero length.
    pub fn from_data(data: Vec<Vec<f64>>) -> Result<Matrix> {
        let rows = data.len();
        let cols = data.first().map_or(0, Vec::len);
        check_dimensions(rows, cols)?;
        Matrix::try_from(MatrixRecord { rows, cols, data })
            .map_err(|e| NnError::MalformedRecord(e.0))
    }

    /// Promotes a non-empty slice of length N into an N×1 column matrix.
    pub fn from_array(values: &[f64]) -> Result<Matrix> {
        check_dimensions(values.len(), 1)?;
        Ok(Matrix {
            rows: values.len(),
            cols: 1,
            data: values.iter().map(|&v| vec![v]).collect(),
        })
    }

    /// Flattens row-major.
    pub fn to_array(&self) -> Vec<f64> {
        self.data.iter().flatten().copied().collect()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row][col]
    }

    fn first_non_finite(&self) -> Option<(usize, usize, f64)> {
        self.data.iter().enumerate().find_map(|(i, row)| {
            row.iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite())
                .map(|(j, &v)| (i, j, v))
        })
    }

    /// Fails with `NonFinite` if any entry is NaN or infinite. `what` names the
    /// matrix in the error message.
    pub fn ensure_finite(&self, what: &str) -> Result<()> {
        match self.first_non_finite() {
            Some((row, col, value)) => Err(NnError::NonFinite(format!(
                "{what} entry ({row}, {col}) is {value}"
            ))),
            None => Ok(()),
        }
    }

    // ── Copy-returning operations ──────────────────────────────────────────

    pub fn sum(a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let mut res = a.clone();
        res.add(b)?;
        Ok(res)
    }

    pub fn difference(a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let mut res = a.clone();
        res.subtract(b)?;
        Ok(res)
    }

    /// Element-wise (Hadamard) product of two same-shape matrices.
    pub fn hadamard(a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let mut res = a.clone();
        res.multiply_hadamard(b)?;
        Ok(res)
    }

    pub fn scaled(a: &Matrix, n: f64) -> Matrix {
        let mut res = a.clone();
        res.multiply_scalar(n);
        res
    }

    /// Matrix product. Requires `a.cols == b.rows`; the result is `a.rows × b.cols`.
    pub fn multiply(a: &Matrix, b: &Matrix) -> Result<Matrix> {
        if a.cols != b.rows {
            return Err(NnError::DimensionMismatch {
                op: "multiply",
                left: a.shape(),
                right: b.shape(),
            });
        }

        let mut res = Matrix::zeroed(a.rows, b.cols);

        for i in 0..res.rows {
            for j in 0..res.cols {
                let mut sum = 0.0;

                for k in 0..a.cols {
                    sum += a.data[i][k] * b.data[k][j];
                }

                res.data[i][j] = sum;
            }
        }

        Ok(res)
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeroed(self.cols, self.rows);

        for i in 0..res.rows {
            for j in 0..res.cols {
                res.data[i][j] = self.data[j][i];
            }
        }

        res
    }

    /// Applies `f(value, row, col)` to a copy of this matrix.
    pub fn mapped<F>(&self, f: F) -> Matrix
    where
        F: FnMut(f64, usize, usize) -> f64,
    {
        let mut res = self.clone();
        res.map(f);
        res
    }

    /// A `rows × cols` matrix drawn from the process-wide generator.
    pub fn randomized(rows: usize, cols: usize) -> Result<Matrix> {
        let mut res = Matrix::zeros(rows, cols)?;
        res.randomize();
        Ok(res)
    }

    pub fn randomized_with<R: Rng + ?Sized>(rows: usize, cols: usize, source: &mut R) -> Result<Matrix> {
        let mut res = Matrix::zeros(rows, cols)?;
        res.randomize_with(source);
        Ok(res)
    }

    // ── In-place operations ────────────────────────────────────────────────

    /// Applies `f(value, row, col)` to every entry in place.
    pub fn map<F>(&mut self, mut f: F) -> &mut Self
    where
        F: FnMut(f64, usize, usize) -> f64,
    {
        for (i, row) in self.data.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = f(*value, i, j);
            }
        }
        self
    }

    pub fn add(&mut self, other: &Matrix) -> Result<&mut Self> {
        ensure_same_shape("add", self, other)?;
        Ok(self.map(|v, i, j| v + other.data[i][j]))
    }

    pub fn subtract(&mut self, other: &Matrix) -> Result<&mut Self> {
        ensure_same_shape("subtract", self, other)?;
        Ok(self.map(|v, i, j| v - other.data[i][j]))
    }

    pub fn multiply_hadamard(&mut self, other: &Matrix) -> Result<&mut Self> {
        ensure_same_shape("multiply_hadamard", self, other)?;
        Ok(self.map(|v, i, j| v * other.data[i][j]))
    }

    pub fn add_scalar(&mut self, n: f64) -> &mut Self {
        self.map(|v, _, _| v + n)
    }

    pub fn subtract_scalar(&mut self, n: f64) -> &mut Self {
        self.map(|v, _, _| v - n)
    }

    pub fn multiply_scalar(&mut self, n: f64) -> &mut Self {
        self.map(|v, _, _| v * n)
    }

    /// Refills every entry uniformly from [-1, 1) using the process-wide generator.
    pub fn randomize(&mut self) -> &mut Self {
        rng::with_global(|g| {
            self.randomize_with(g);
        });
        self
    }

    pub fn randomize_with<R: Rng + ?Sized>(&mut self, source: &mut R) -> &mut Self {
        self.map(|_, _, _| rng::uniform_signed(source))
    }

    // ── Persistence ────────────────────────────────────────────────────────

    /// Encodes as `{"rows":..,"cols":..,"data":[[..],..]}`.
    pub fn to_json(&self) -> Result<String> {
        self.ensure_finite("matrix")?;
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes the string form produced by [`Matrix::to_json`].
    pub fn from_json(json: &str) -> Result<Matrix> {
        serde_json::from_str(json).map_err(malformed)
    }

    /// Decodes an already-parsed `{rows, cols, data}` record.
    pub fn from_value(value: Value) -> Result<Matrix> {
        serde_json::from_value(value).map_err(malformed)
    }
}

/// Shape and content problems found while decoding a record.
pub(crate) fn malformed(err: serde_json::Error) -> NnError {
    NnError::MalformedRecord(err.to_string())
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix {}x{}", self.rows, self.cols)?;
        for (i, row) in self.data.iter().enumerate() {
            write!(f, "{i:>4} |")?;
            for value in row {
                write!(f, " {value:>10.4}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
