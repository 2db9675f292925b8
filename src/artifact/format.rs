// In: src/artifact/format.rs

//! Defines all on-disk constants of the export artifacts. This is the single source
//! of truth for data keys and the split-file naming scheme, so that the writer and
//! every decoder agree on them.

use std::path::{Component, Path};

use crate::error::TambakError;

//==================================================================================
// I. Schema Document
//==================================================================================

/// The version of the schema document layout written into every artifact.
pub const SCHEMA_VERSION: &str = "1.0";

/// The file name of the standalone schema document in a split artifact.
pub const SCHEMA_FILE_NAME: &str = "schema.json";

//==================================================================================
// II. Split Files & Data Keys
//==================================================================================

/// Suffix of every compressed blob file in a split artifact.
pub const BLOB_FILE_SUFFIX: &str = ".bin.zst";

/// The data key of one column of a columnar stream.
pub fn columnar_data_key(stream: &str, column: &str) -> String {
    format!("{}__{}_bin", stream, column)
}

/// The data key of the single blob of a row-major stream.
pub fn row_major_data_key(stream: &str) -> String {
    format!("{}_rows", stream)
}

/// The file a blob is written to in a split artifact.
pub fn blob_file_name(data_key: &str) -> String {
    format!("{}{}", data_key, BLOB_FILE_SUFFIX)
}

/// Checks that a stream or column name can be embedded in a data key.
///
/// `__` separates the stream from the column in a columnar key, so a name may not
/// contain it, nor start or end with `_` (which would merge into the separator).
/// Path separators are rejected because keys become split-file names.
pub fn check_name_part(kind: &str, name: &str) -> Result<(), TambakError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.contains("__") {
        Some("must not contain '__'")
    } else if name.starts_with('_') || name.ends_with('_') {
        Some("must not start or end with '_'")
    } else if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
        Some("must not contain path separators or be a relative path")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(TambakError::ContractConfig(format!(
            "{} name '{}' {}",
            kind, name, reason
        ))),
        None => Ok(()),
    }
}

/// Checks that `file_name` names a single file directly inside an artifact
/// directory. Applies to names we write and to names read from a `schema.json`.
pub fn check_file_name(file_name: &str) -> Result<(), TambakError> {
    let mut components = Path::new(file_name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if single_normal && !file_name.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(TambakError::packaging(
            file_name,
            "file name must be a single path component inside the artifact directory",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_and_file_naming() {
        assert_eq!(columnar_data_key("units", "hp"), "units__hp_bin");
        assert_eq!(row_major_data_key("positions"), "positions_rows");
        assert_eq!(blob_file_name("positions_rows"), "positions_rows.bin.zst");
    }

    #[test]
    fn test_name_parts_cannot_produce_the_same_key() {
        // ("a__b", "c") and ("a", "b__c") would both give "a__b__c_bin".
        assert!(check_name_part("stream", "a__b").is_err());
        assert!(check_name_part("column", "b__c").is_err());
        // ("a_", "b") and ("a", "_b") would both give "a___b_bin".
        assert!(check_name_part("stream", "a_").is_err());
        assert!(check_name_part("column", "_b").is_err());

        assert!(check_name_part("stream", "army_value").is_ok());
        assert!(check_name_part("column", "x").is_ok());
        assert!(matches!(
            check_name_part("stream", ""),
            Err(TambakError::ContractConfig(_))
        ));
    }

    #[test]
    fn test_name_parts_reject_path_syntax() {
        for bad in ["/tmp/escaped", "../up", "a/b", "a\\b", ".", ".."] {
            assert!(check_name_part("stream", bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_file_names_must_stay_inside_the_directory() {
        assert!(check_file_name("units__hp_bin.bin.zst").is_ok());
        for bad in [
            "/tmp/escaped__c_bin.bin.zst",
            "../outside.bin.zst",
            "sub/inner.bin.zst",
            "sub/.",
            "..",
            "",
        ] {
            assert!(
                matches!(check_file_name(bad), Err(TambakError::Packaging { .. })),
                "{}",
                bad
            );
        }
    }
}
