//! Chunk persistence: one [`Frame`] per gzip-compressed Parquet file.
//!
//! Column types are inferred per chunk: a column whose non-null cells are
//! all integers maps to Int64, anything else to Utf8; every field is
//! nullable. Writes go to a sibling `*.inprogress` path and are renamed
//! into place, so a failed write never leaves a partial file at the final
//! destination.

use crate::frame::{Frame, Value};
use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, Int64Array, LargeStringArray, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Write one chunk to `path`, creating parent directories first.
///
/// Directory creation is idempotent and safe under concurrent creation of
/// sibling paths. Writing a zero-row chunk is fine (a zero-row file keeps
/// chunk numbering contiguous).
///
/// # Returns
/// Number of rows written.
///
/// # Errors
/// Returns an error if the batch cannot be assembled or the file cannot be
/// written; on failure the temp file is removed and the final path is left
/// untouched.
pub fn write_chunk(frame: &Frame, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }

    let batch = to_record_batch(frame)?;
    let tmp = in_progress_path(path)?;

    if let Err(error) = write_batch(&batch, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(error);
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} into place", tmp.display()))?;
    Ok(frame.len())
}

/// Read a chunk file back into a [`Frame`].
///
/// # Errors
/// Returns an error if the file cannot be opened or holds column types
/// outside the integer/text model.
pub fn read_chunk(path: impl AsRef<Path>) -> Result<Frame> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("open parquet reader")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder
        .with_batch_size(64 * 1024)
        .build()
        .context("build parquet reader")?;

    let mut frame = Frame::new(columns);
    for batch in reader {
        let batch = batch.context("read record batch")?;
        append_batch(&mut frame, &batch)?;
    }
    Ok(frame)
}

fn in_progress_path(path: &Path) -> Result<PathBuf> {
    match path.file_name() {
        Some(name) => {
            let mut tmp_name = name.to_os_string();
            tmp_name.push(".inprogress");
            Ok(path.with_file_name(tmp_name))
        }
        None => bail!("chunk path {} has no file name", path.display()),
    }
}

fn write_batch(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::GZIP(GzipLevel::default()))
        .build();
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), Some(props)).context("create parquet writer")?;
    writer.write(batch).context("write record batch")?;
    writer.close().context("close parquet writer")?;
    Ok(())
}

fn to_record_batch(frame: &Frame) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(frame.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(frame.columns().len());
    for (index, name) in frame.columns().iter().enumerate() {
        let all_int = frame.column(index).all(|v| !matches!(v, Value::Text(_)));
        if all_int {
            let cells: Vec<Option<i64>> = frame.column(index).map(Value::as_int).collect();
            fields.push(Field::new(name, DataType::Int64, true));
            arrays.push(Arc::new(Int64Array::from(cells)) as ArrayRef);
        } else {
            let cells: Vec<Option<String>> = frame
                .column(index)
                .map(|v| match v {
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            fields.push(Field::new(name, DataType::Utf8, true));
            arrays.push(Arc::new(StringArray::from_iter(cells)) as ArrayRef);
        }
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).context("assemble record batch")
}

fn append_batch(frame: &mut Frame, batch: &RecordBatch) -> Result<()> {
    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(batch.num_columns());
    for (index, field) in batch.schema().fields().iter().enumerate() {
        columns.push(column_values(field.name(), batch.column(index))?);
    }
    for row in 0..batch.num_rows() {
        let cells = columns.iter().map(|col| col[row].clone()).collect();
        frame.push_row(cells)?;
    }
    Ok(())
}

fn column_values(name: &str, array: &ArrayRef) -> Result<Vec<Value>> {
    match array.data_type() {
        DataType::Int64 => {
            let ints = array
                .as_any()
                .downcast_ref::<Int64Array>()
                .with_context(|| format!("column {name}: expected Int64 data"))?;
            Ok((0..ints.len())
                .map(|i| {
                    if ints.is_null(i) {
                        Value::Null
                    } else {
                        Value::Int(ints.value(i))
                    }
                })
                .collect())
        }
        DataType::Utf8 => {
            let strings = array
                .as_any()
                .downcast_ref::<StringArray>()
                .with_context(|| format!("column {name}: expected Utf8 data"))?;
            Ok((0..strings.len())
                .map(|i| {
                    if strings.is_null(i) {
                        Value::Null
                    } else {
                        Value::Text(strings.value(i).to_string())
                    }
                })
                .collect())
        }
        DataType::LargeUtf8 => {
            let strings = array
                .as_any()
                .downcast_ref::<LargeStringArray>()
                .with_context(|| format!("column {name}: expected LargeUtf8 data"))?;
            Ok((0..strings.len())
                .map(|i| {
                    if strings.is_null(i) {
                        Value::Null
                    } else {
                        Value::Text(strings.value(i).to_string())
                    }
                })
                .collect())
        }
        other => bail!("column {name}: unsupported chunk column type {other}"),
    }
}
