//! Layout descriptors
//!
//! Each index's region in the segment carries a [`LayoutDescriptor`] written
//! when the region was created. On open the descriptor compiled into the
//! running binary is compared against the stored one; any difference means
//! the persisted bytes were produced by an incompatible schema.

use crate::error::{Error, Result};
use crate::object::Object;
use serde::{Deserialize, Serialize};

/// Version of the region encoding itself, independent of any record type.
pub const REGION_FORMAT_VERSION: u32 = 1;

/// Versioned description of how one record type is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutDescriptor {
    /// Region encoding version
    pub format_version: u32,
    /// Routing id
    pub type_id: u16,
    /// Type name
    pub type_name: String,
    /// Record schema version
    pub schema_version: u32,
    /// Secondary ordering names, in declaration order
    pub orderings: Vec<String>,
    /// Encoded size of a default-valued record
    pub default_size: u64,
}

impl LayoutDescriptor {
    /// Descriptor of `T` as compiled into this binary
    pub fn of<T: Object>() -> Self {
        LayoutDescriptor {
            format_version: REGION_FORMAT_VERSION,
            type_id: T::TYPE_ID,
            type_name: T::TYPE_NAME.to_string(),
            schema_version: T::SCHEMA_VERSION,
            orderings: T::secondary_indices().names(),
            default_size: default_size::<T>(),
        }
    }

    /// Compare a stored descriptor (`self`) against the compiled one.
    ///
    /// Returns `StructuralMismatch` naming the first field that differs.
    pub fn check(&self, compiled: &LayoutDescriptor) -> Result<()> {
        let mismatch = |reason: String| Error::StructuralMismatch {
            type_name: compiled.type_name.clone(),
            reason,
        };

        if self.format_version != compiled.format_version {
            return Err(mismatch(format!(
                "region format version {} != {}",
                self.format_version, compiled.format_version
            )));
        }
        if self.type_name != compiled.type_name {
            return Err(mismatch(format!(
                "stored type name `{}`",
                self.type_name
            )));
        }
        if self.type_id != compiled.type_id {
            return Err(mismatch(format!(
                "type id {} != {}",
                self.type_id, compiled.type_id
            )));
        }
        if self.schema_version != compiled.schema_version {
            return Err(mismatch(format!(
                "schema version {} != {}",
                self.schema_version, compiled.schema_version
            )));
        }
        if self.orderings != compiled.orderings {
            return Err(mismatch(format!(
                "orderings {:?} != {:?}",
                self.orderings, compiled.orderings
            )));
        }
        // Catches a field added or removed without a schema version bump
        if self.default_size != compiled.default_size {
            return Err(mismatch(format!(
                "default record size {} != {}",
                self.default_size, compiled.default_size
            )));
        }
        Ok(())
    }
}

fn default_size<T: Object>() -> u64 {
    // Serde-derived types always size; zero only weakens the check
    bincode::serialized_size(&T::default()).unwrap_or(0)
}
