//! Delimited-text and Parquet writers for the flat exports.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use arrow2::array::{Array, Utf8Array};
use arrow2::chunk::Chunk;
use arrow2::datatypes::{DataType, Field, Schema};
use arrow2::io::parquet::read as parquet_read;
use arrow2::io::parquet::write::{
    transverse, CompressionOptions, Encoding, FileWriter, RowGroupIterator, Version, WriteOptions,
};
use tracing::info;

use crate::category_table::{LanguageTable, UnifiedCategoryTable};
use crate::config::OutputFormat;
use crate::error::ExportError;
use crate::model::CatalogId;
use crate::path_format::LEAF_ID;
use crate::property::{UnifiedPropertyTable, ValueGlossary};

static WRITE_OPTIONS: WriteOptions = WriteOptions {
    write_statistics: true,
    compression: CompressionOptions::Snappy,
    version: Version::V2,
    data_pagesize_limit: None,
};

/// A table with a fixed header and nullable text cells.
pub trait Tabular {
    fn header(&self) -> Vec<String>;
    fn records(&self) -> Vec<Vec<Option<String>>>;
}

impl Tabular for UnifiedCategoryTable {
    fn header(&self) -> Vec<String> {
        UnifiedCategoryTable::header(self)
    }

    fn records(&self) -> Vec<Vec<Option<String>>> {
        UnifiedCategoryTable::records(self)
    }
}

impl Tabular for LanguageTable {
    fn header(&self) -> Vec<String> {
        LanguageTable::header(self)
    }

    fn records(&self) -> Vec<Vec<Option<String>>> {
        LanguageTable::records(self)
    }
}

impl Tabular for UnifiedPropertyTable {
    fn header(&self) -> Vec<String> {
        UnifiedPropertyTable::header(self)
    }

    fn records(&self) -> Vec<Vec<Option<String>>> {
        UnifiedPropertyTable::records(self)
    }
}

impl Tabular for ValueGlossary {
    fn header(&self) -> Vec<String> {
        ValueGlossary::header(self)
    }

    fn records(&self) -> Vec<Vec<Option<String>>> {
        ValueGlossary::records(self)
    }
}

/// Null cells are written as empty fields.
pub fn write_csv<T: Tabular + ?Sized, W: Write>(
    table: &T,
    writer: W,
    delimiter: u8,
) -> Result<(), ExportError> {
    let mut out = csv::WriterBuilder::new().delimiter(delimiter).from_writer(writer);
    out.write_record(table.header())?;
    for record in table.records() {
        out.write_record(record.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    out.flush()?;
    Ok(())
}

/// Every column is a nullable UTF-8 column named after the CSV header.
pub fn write_parquet<T: Tabular + ?Sized, W: Write>(table: &T, writer: W) -> Result<(), ExportError> {
    let header = table.header();
    let records = table.records();

    let schema = Schema::from(
        header
            .iter()
            .map(|name| Field::new(name.as_str(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );

    let columns: Vec<Box<dyn Array>> = (0..header.len())
        .map(|i| {
            let values: Vec<Option<&str>> = records
                .iter()
                .map(|record| record.get(i).and_then(|cell| cell.as_deref()))
                .collect();
            Utf8Array::<i32>::from(values).boxed()
        })
        .collect();
    let chunk = Chunk::try_new(columns)?;

    let encodings = schema
        .fields
        .iter()
        .map(|f| transverse(&f.data_type, |_| Encoding::Plain))
        .collect();
    let row_groups =
        RowGroupIterator::try_new(vec![Ok(chunk)].into_iter(), &schema, WRITE_OPTIONS, encodings)?;

    let mut file_writer = FileWriter::try_new(writer, schema, WRITE_OPTIONS)?;
    for group in row_groups {
        file_writer.write(group?)?;
    }
    file_writer.end(None)?;
    Ok(())
}

/// Writes `table` to `dir/file_name`, swapping the extension to match `format`.
pub fn export_table<T: Tabular + ?Sized>(
    table: &T,
    dir: &Path,
    file_name: &str,
    format: OutputFormat,
    delimiter: u8,
) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(Path::new(file_name).with_extension(format.extension()));
    let writer = BufWriter::new(File::create(&path)?);

    match format {
        OutputFormat::Csv => write_csv(table, writer, delimiter)?,
        OutputFormat::Parquet => write_parquet(table, writer)?,
    }

    info!(path = %path.display(), "export written");
    Ok(path)
}

/// Reads the unique, sorted leaf ids from a unified category export.
///
/// A `.parquet` file is read as Parquet; anything else as delimited text.
pub fn read_leaf_category_ids(path: &Path, delimiter: u8) -> Result<Vec<CatalogId>, ExportError> {
    let is_parquet = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(OutputFormat::Parquet.extension()));
    let mut ids = if is_parquet {
        read_parquet_leaf_ids(path)?
    } else {
        read_csv_leaf_ids(path, delimiter)?
    };
    ids.sort();
    ids.dedup();
    Ok(ids)
}

fn missing_leaf_column(path: &Path) -> ExportError {
    ExportError::MissingColumn(LEAF_ID.to_string(), path.display().to_string())
}

fn read_csv_leaf_ids(path: &Path, delimiter: u8) -> Result<Vec<CatalogId>, ExportError> {
    let mut reader = csv::ReaderBuilder::new().delimiter(delimiter).from_path(path)?;
    let column = reader
        .headers()?
        .iter()
        .position(|h| h == LEAF_ID)
        .ok_or_else(|| missing_leaf_column(path))?;

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record?;
        match record.get(column) {
            Some(id) if !id.is_empty() => ids.push(CatalogId::new(id)),
            _ => {}
        }
    }
    Ok(ids)
}

fn read_parquet_leaf_ids(path: &Path) -> Result<Vec<CatalogId>, ExportError> {
    let mut file = File::open(path)?;
    let metadata = parquet_read::read_metadata(&mut file)?;
    let schema = parquet_read::infer_schema(&metadata)?.filter(|_, field| field.name == LEAF_ID);
    if schema.fields.is_empty() {
        return Err(missing_leaf_column(path));
    }

    let chunks = parquet_read::FileReader::new(file, metadata.row_groups, schema, None, None, None);
    let mut ids = Vec::new();
    for chunk in chunks {
        let chunk = chunk?;
        let Some(column) = chunk.arrays().first() else {
            continue;
        };
        let values = column
            .as_any()
            .downcast_ref::<Utf8Array<i32>>()
            .ok_or_else(|| ExportError::ColumnType(LEAF_ID.to_string(), path.display().to_string()))?;
        ids.extend(values.iter().flatten().filter(|id| !id.is_empty()).map(CatalogId::new));
    }
    Ok(ids)
}
