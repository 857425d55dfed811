//! Persistence of operators, fields and sweep results.
//!
//! Matrices and vectors go to disk in PETSc's binary viewer format
//! (big-endian, classid-tagged), so external toolkits can pick them up
//! directly. Run and sweep records use the same byte order.

use std::{
  fs::File,
  io::{BufReader, BufWriter, Read, Write},
  path::Path,
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::{
  error::CpmError,
  scheme::{EvolutionOperator, Scheme},
};

const PETSC_MAT_FILE_CLASSID: i32 = 1211216;
const PETSC_VEC_FILE_CLASSID: i32 = 1211214;

pub fn petsc_write_matrix(
  matrix: &nas::CsrMatrix<f64>,
  path: impl AsRef<Path>,
) -> Result<(), CpmError> {
  let file = File::create(path)?;
  let mut writer = BufWriter::new(file);
  write_matrix(&mut writer, matrix)?;
  writer.flush()?;
  Ok(())
}

pub fn petsc_read_matrix(path: impl AsRef<Path>) -> Result<nas::CsrMatrix<f64>, CpmError> {
  let file = File::open(path)?;
  let mut reader = BufReader::new(file);
  read_matrix(&mut reader)
}

pub fn petsc_write_vector(
  vector: &na::DVector<f64>,
  path: impl AsRef<Path>,
) -> Result<(), CpmError> {
  let file = File::create(path)?;
  let mut writer = BufWriter::new(file);
  write_vector(&mut writer, vector)?;
  writer.flush()?;
  Ok(())
}

pub fn petsc_read_vector(path: impl AsRef<Path>) -> Result<na::DVector<f64>, CpmError> {
  let file = File::open(path)?;
  let mut reader = BufReader::new(file);
  read_vector(&mut reader)
}

/// Write the operators a scheme is built from, named the way the
/// original drivers do: `L`/`E` for the explicit scheme, the
/// stabilized `M` for the semi-implicit one, the system matrix `A`
/// for the implicit one.
pub fn export_operators(evo: &EvolutionOperator, dir: impl AsRef<Path>) -> Result<(), CpmError> {
  let dir = dir.as_ref();
  if let Some(diff) = evo.diff() {
    petsc_write_matrix(diff, dir.join("Lmatrix.dat"))?;
  }
  if let Some(ext) = evo.ext() {
    petsc_write_matrix(ext, dir.join("Ematrix.dat"))?;
  }
  if let Some(stabilized) = evo.stabilized() {
    petsc_write_matrix(stabilized, dir.join("Mmatrix.dat"))?;
  }
  if let Some(system) = evo.system() {
    petsc_write_matrix(system, dir.join("Amatrix.dat"))?;
  }
  Ok(())
}

/// Scalar parameters and fields of one finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
  pub dx: f64,
  pub scheme: Scheme,
  pub tf: f64,
  pub numtimesteps: usize,
  pub dt: f64,
  pub initial_field: na::DVector<f64>,
  pub final_field: na::DVector<f64>,
}

impl RunRecord {
  pub fn write(&self, path: impl AsRef<Path>) -> Result<(), CpmError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_f64::<BigEndian>(self.dx)?;
    writer.write_i32::<BigEndian>(self.scheme.index() as i32)?;
    writer.write_f64::<BigEndian>(self.tf)?;
    writer.write_u64::<BigEndian>(self.numtimesteps as u64)?;
    writer.write_f64::<BigEndian>(self.dt)?;
    write_vector(&mut writer, &self.initial_field)?;
    write_vector(&mut writer, &self.final_field)?;
    writer.flush()?;
    Ok(())
  }

  pub fn read(path: impl AsRef<Path>) -> Result<Self, CpmError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let dx = reader.read_f64::<BigEndian>()?;
    let scheme_index = reader.read_i32::<BigEndian>()?;
    let scheme = Scheme::from_index(scheme_index as u8)
      .ok_or_else(|| invalid_data(format!("unknown scheme index {scheme_index}")))?;
    let tf = reader.read_f64::<BigEndian>()?;
    let numtimesteps = reader.read_u64::<BigEndian>()? as usize;
    let dt = reader.read_f64::<BigEndian>()?;
    let initial_field = read_vector(&mut reader)?;
    let final_field = read_vector(&mut reader)?;
    Ok(Self {
      dx,
      scheme,
      tf,
      numtimesteps,
      dt,
      initial_field,
      final_field,
    })
  }
}

/// Persist the `(dx, error)` samples of a sweep.
pub fn write_sweep_result(
  result: &crate::sweep::SweepResult,
  path: impl AsRef<Path>,
) -> Result<(), CpmError> {
  let file = File::create(path)?;
  let mut writer = BufWriter::new(file);
  writer.write_u64::<BigEndian>(result.len() as u64)?;
  for record in result.records() {
    writer.write_f64::<BigEndian>(record.dx)?;
    writer.write_f64::<BigEndian>(record.error)?;
  }
  writer.flush()?;
  Ok(())
}

pub fn read_sweep_result(path: impl AsRef<Path>) -> Result<crate::sweep::SweepResult, CpmError> {
  let file = File::open(path)?;
  let mut reader = BufReader::new(file);
  let count = reader.read_u64::<BigEndian>()? as usize;
  let mut result = crate::sweep::SweepResult::new();
  for _ in 0..count {
    let dx = reader.read_f64::<BigEndian>()?;
    let error = reader.read_f64::<BigEndian>()?;
    result.push(dx, error);
  }
  Ok(result)
}

fn write_matrix(writer: &mut impl Write, matrix: &nas::CsrMatrix<f64>) -> Result<(), CpmError> {
  writer.write_i32::<BigEndian>(PETSC_MAT_FILE_CLASSID)?;

  let nrows = matrix.nrows() as i32;
  let ncols = matrix.ncols() as i32;
  let nnz = matrix.nnz() as i32;
  writer.write_i32::<BigEndian>(nrows)?;
  writer.write_i32::<BigEndian>(ncols)?;
  writer.write_i32::<BigEndian>(nnz)?;

  let row_offsets = matrix.row_offsets();
  for i in 0..nrows as usize {
    let row_nnz = (row_offsets[i + 1] - row_offsets[i]) as i32;
    writer.write_i32::<BigEndian>(row_nnz)?;
  }

  for &col in matrix.col_indices() {
    writer.write_i32::<BigEndian>(col as i32)?;
  }

  for &value in matrix.values() {
    writer.write_f64::<BigEndian>(value)?;
  }

  Ok(())
}

fn read_matrix(reader: &mut impl Read) -> Result<nas::CsrMatrix<f64>, CpmError> {
  let magic = reader.read_i32::<BigEndian>()?;
  if magic != PETSC_MAT_FILE_CLASSID {
    return Err(invalid_data(format!("bad matrix classid {magic}")));
  }

  let nrows = reader.read_i32::<BigEndian>()? as usize;
  let ncols = reader.read_i32::<BigEndian>()? as usize;
  let nnz = reader.read_i32::<BigEndian>()? as usize;

  let mut row_offsets = Vec::with_capacity(nrows + 1);
  row_offsets.push(0usize);
  for _ in 0..nrows {
    let row_nnz = reader.read_i32::<BigEndian>()? as usize;
    row_offsets.push(row_offsets.last().unwrap() + row_nnz);
  }
  if *row_offsets.last().unwrap() != nnz {
    return Err(invalid_data("row counts disagree with nnz"));
  }

  let mut col_indices = Vec::with_capacity(nnz);
  for _ in 0..nnz {
    col_indices.push(reader.read_i32::<BigEndian>()? as usize);
  }
  let mut values = Vec::with_capacity(nnz);
  for _ in 0..nnz {
    values.push(reader.read_f64::<BigEndian>()?);
  }

  nas::CsrMatrix::try_from_csr_data(nrows, ncols, row_offsets, col_indices, values)
    .map_err(|e| invalid_data(format!("malformed CSR data: {e}")))
}

fn write_vector(writer: &mut impl Write, vector: &na::DVector<f64>) -> Result<(), CpmError> {
  writer.write_i32::<BigEndian>(PETSC_VEC_FILE_CLASSID)?;
  writer.write_i32::<BigEndian>(vector.nrows() as i32)?;
  for &value in vector {
    writer.write_f64::<BigEndian>(value)?;
  }
  Ok(())
}

fn read_vector(reader: &mut impl Read) -> Result<na::DVector<f64>, CpmError> {
  let magic = reader.read_i32::<BigEndian>()?;
  if magic != PETSC_VEC_FILE_CLASSID {
    return Err(invalid_data(format!("bad vector classid {magic}")));
  }
  let nrows = reader.read_i32::<BigEndian>()? as usize;
  let mut vector = na::DVector::zeros(nrows);
  for i in 0..nrows {
    vector[i] = reader.read_f64::<BigEndian>()?;
  }
  Ok(vector)
}

fn invalid_data(msg: impl Into<String>) -> CpmError {
  CpmError::Io(std::io::Error::new(
    std::io::ErrorKind::InvalidData,
    msg.into(),
  ))
}
