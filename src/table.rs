//! 整形済みレポート表

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Decimal128Array, Float64Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;

use crate::error::ReportError;
use crate::row::ReportRow;
use crate::schema::{Dtype, Schema};
use crate::value::Value;

/// Currency 列の Decimal128 精度 (i64 のマイクロ値が収まる桁数)
const CURRENCY_PRECISION: u8 = 19;
const CURRENCY_SCALE: i8 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// GAQL のフィールド名
    pub field: String,
    /// 出力用の列名
    pub name: String,
    pub dtype: Dtype,
}

/// 型付きの表。列順は要求フィールド順で固定。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl ReportTable {
    pub(crate) fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    /// 行を持たない表
    pub fn empty(schema: &Schema) -> Self {
        let columns = schema
            .columns()
            .iter()
            .map(|c| Column {
                field: c.field.clone(),
                name: c.field.clone(),
                dtype: c.dtype,
            })
            .collect();
        Self::new(columns, Vec::new())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn fields(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.field.as_str()).collect()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.field == field)
    }

    pub fn get(&self, row: usize, field: &str) -> Option<&Value> {
        let idx = self.column_index(field)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// 1列分の値
    pub fn column(&self, field: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(field)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// 整形前と同じ形の行に戻す (再整形用)
    pub fn to_rows(&self) -> Vec<ReportRow> {
        self.rows
            .iter()
            .map(|values| {
                self.columns
                    .iter()
                    .zip(values)
                    .map(|(col, v)| (col.field.clone(), v.clone()))
                    .collect()
            })
            .collect()
    }

    /// 型情報を保ったまま Arrow の RecordBatch に変換する
    pub fn to_record_batch(&self) -> Result<RecordBatch, ReportError> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, arrow_type(c.dtype), true))
            .collect();
        let schema = Arc::new(ArrowSchema::new(fields));

        let arrays = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, col)| self.build_array(idx, col.dtype))
            .collect::<Result<Vec<ArrayRef>, ReportError>>()?;

        Ok(RecordBatch::try_new(schema, arrays)?)
    }

    fn build_array(&self, idx: usize, dtype: Dtype) -> Result<ArrayRef, ReportError> {
        let cells = self.rows.iter().map(|r| &r[idx]);
        let array: ArrayRef = match dtype {
            Dtype::Text => Arc::new(cells.map(|v| v.as_str()).collect::<StringArray>()),
            Dtype::Int64 => Arc::new(cells.map(|v| v.as_i64()).collect::<Int64Array>()),
            Dtype::Float64 => Arc::new(
                cells
                    .map(|v| match v {
                        Value::Float(f) => Some(*f),
                        _ => None,
                    })
                    .collect::<Float64Array>(),
            ),
            Dtype::Currency => Arc::new(
                cells
                    .map(|v| v.as_micros().map(|m| m.to_decimal128()))
                    .collect::<Decimal128Array>()
                    .with_precision_and_scale(CURRENCY_PRECISION, CURRENCY_SCALE)?,
            ),
            Dtype::Date => {
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
                Arc::new(
                    cells
                        .map(|v| v.as_date().map(|d| (d - epoch).num_days() as i32))
                        .collect::<Date32Array>(),
                )
            }
            Dtype::Bool => Arc::new(
                cells
                    .map(|v| match v {
                        Value::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect::<BooleanArray>(),
            ),
        };
        Ok(array)
    }

    pub(crate) fn retain_rows<F>(&mut self, keep: F)
    where
        F: FnMut(&Vec<Value>) -> bool,
    {
        self.rows.retain(keep);
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<Value>> {
        &mut self.rows
    }
}

fn arrow_type(dtype: Dtype) -> DataType {
    match dtype {
        Dtype::Text => DataType::Utf8,
        Dtype::Int64 => DataType::Int64,
        Dtype::Float64 => DataType::Float64,
        Dtype::Currency => DataType::Decimal128(CURRENCY_PRECISION, CURRENCY_SCALE),
        Dtype::Date => DataType::Date32,
        Dtype::Bool => DataType::Boolean,
    }
}
