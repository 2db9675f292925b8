// In: src/bridge/arrow_impl.rs

//! DATA MARSHALLING between Arrow and the engine's own `Dataset`.
//!
//! Arrow is only a boundary format: everything past this module works on owned,
//! typed `ColumnValues`. Arrow null bitmaps become validity vectors; the values
//! stored under null slots are carried along unchanged and later replaced by the
//! column's null sentinel.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, PrimitiveArray};
use arrow::buffer::NullBuffer;
use arrow::datatypes::*;
use arrow::record_batch::RecordBatch;

use crate::dataset::{Column, ColumnValues, Dataset};
use crate::error::TambakError;
use crate::types::TambakDataType;

/// Converts one Arrow array into a named `Column`.
pub fn column_from_array(name: &str, array: &dyn Array) -> Result<Column, TambakError> {
    macro_rules! extract_values {
        ($T:ty) => {{
            let primitive = array.as_primitive_opt::<$T>().ok_or_else(|| {
                TambakError::InternalError(format!("column '{}' failed to downcast", name))
            })?;
            ColumnValues::from(primitive.values().to_vec())
        }};
    }

    let values = match TambakDataType::from_arrow_type(array.data_type())? {
        TambakDataType::Int8 => extract_values!(Int8Type),
        TambakDataType::Int16 => extract_values!(Int16Type),
        TambakDataType::Int32 => extract_values!(Int32Type),
        TambakDataType::Int64 => extract_values!(Int64Type),
        TambakDataType::UInt8 => extract_values!(UInt8Type),
        TambakDataType::UInt16 => extract_values!(UInt16Type),
        TambakDataType::UInt32 => extract_values!(UInt32Type),
        TambakDataType::UInt64 => extract_values!(UInt64Type),
        TambakDataType::Float32 => extract_values!(Float32Type),
        TambakDataType::Float64 => extract_values!(Float64Type),
        TambakDataType::Boolean => {
            let bools = array.as_boolean_opt().ok_or_else(|| {
                TambakError::InternalError(format!("column '{}' failed to downcast", name))
            })?;
            ColumnValues::Boolean(bools.values().iter().collect())
        }
    };

    let column = Column::new(name, values);
    match array.nulls() {
        Some(nulls) if nulls.null_count() > 0 => column.with_validity(nulls.inner().iter().collect()),
        _ => Ok(column),
    }
}

/// Converts a `RecordBatch` into a `Dataset`, preserving the schema's field order.
pub fn dataset_from_record_batch(batch: &RecordBatch) -> Result<Dataset, TambakError> {
    let schema = batch.schema();
    let columns = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, array)| column_from_array(field.name(), array.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Dataset::new(columns)
}

/// Builds an Arrow array from typed values and an optional validity vector.
pub fn column_values_to_array(
    values: &ColumnValues,
    validity: Option<&[bool]>,
) -> ArrayRef {
    let nulls = validity.map(|mask| NullBuffer::from(mask.to_vec()));

    macro_rules! build_primitive {
        ($T:ty, $v:expr) => {
            Arc::new(PrimitiveArray::<$T>::new($v.clone().into(), nulls)) as ArrayRef
        };
    }

    match values {
        ColumnValues::Int8(v) => build_primitive!(Int8Type, v),
        ColumnValues::Int16(v) => build_primitive!(Int16Type, v),
        ColumnValues::Int32(v) => build_primitive!(Int32Type, v),
        ColumnValues::Int64(v) => build_primitive!(Int64Type, v),
        ColumnValues::UInt8(v) => build_primitive!(UInt8Type, v),
        ColumnValues::UInt16(v) => build_primitive!(UInt16Type, v),
        ColumnValues::UInt32(v) => build_primitive!(UInt32Type, v),
        ColumnValues::UInt64(v) => build_primitive!(UInt64Type, v),
        ColumnValues::Float32(v) => build_primitive!(Float32Type, v),
        ColumnValues::Float64(v) => build_primitive!(Float64Type, v),
        ColumnValues::Boolean(v) => Arc::new(BooleanArray::new(v.iter().copied().collect(), nulls)),
    }
}

/// Converts a `Dataset` back into a `RecordBatch`.
pub fn dataset_to_record_batch(dataset: &Dataset) -> Result<RecordBatch, TambakError> {
    let fields: Vec<Field> = dataset
        .columns()
        .iter()
        .map(|c| Field::new(c.name(), c.dtype().to_arrow_type(), c.validity().is_some()))
        .collect();
    let arrays: Vec<ArrayRef> = dataset
        .columns()
        .iter()
        .map(|c| column_values_to_array(c.values(), c.validity()))
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int32Array, UInt8Array};

    #[test]
    fn test_record_batch_to_dataset() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("v", DataType::Float64, true),
            Field::new("ok", DataType::Boolean, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 2, 3])),
                Arc::new(Float64Array::from(vec![Some(0.5), None, Some(2.0)])),
                Arc::new(BooleanArray::from(vec![true, false, true])),
            ],
        )
        .unwrap();

        let ds = dataset_from_record_batch(&batch).unwrap();
        let names: Vec<_> = ds.column_names().collect();
        assert_eq!(names, vec!["id", "v", "ok"]);
        assert_eq!(ds.column("id").unwrap().values(), &ColumnValues::Int32(vec![1, 2, 3]));
        assert_eq!(
            ds.column("v").unwrap().validity(),
            Some(&[true, false, true][..])
        );
        assert!(ds.column("id").unwrap().validity().is_none());
        assert_eq!(
            ds.column("ok").unwrap().values(),
            &ColumnValues::Boolean(vec![true, false, true])
        );
    }

    #[test]
    fn test_unsupported_arrow_type_is_rejected() {
        let array = arrow::array::StringArray::from(vec!["a"]);
        assert!(matches!(
            column_from_array("s", &array),
            Err(TambakError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_dataset_record_batch_roundtrip() {
        let ds = Dataset::new(vec![
            Column::new("a", vec![3u8, 4])
                .with_validity(vec![true, false])
                .unwrap(),
            Column::new("b", vec![-1i64, 7]),
        ])
        .unwrap();
        let batch = dataset_to_record_batch(&ds).unwrap();
        let a = batch.column(0).as_any().downcast_ref::<UInt8Array>().unwrap();
        assert!(a.is_null(1));
        assert_eq!(a.value(0), 3);
        assert_eq!(dataset_from_record_batch(&batch).unwrap(), ds);
    }
}
