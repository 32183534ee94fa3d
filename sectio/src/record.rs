//! Record (structure) reads.
//!
//! A record variable stores fixed-size heterogeneous records, each holding named fields at fixed byte offsets.
//! The element of the [`StorageDescriptor`] is the whole record, so sections of records read like any other section.
//!
//! [`RecordReader::read_field`] extracts one field across many records.
//! For directly addressable layouts ([`NoData`](crate::StorageLayout::NoData), [`Regular`](crate::StorageLayout::Regular),
//! [`Tiled`](crate::StorageLayout::Tiled))
//! only the bytes of the field are read.
//! Compression defeats sub-record addressing, so other layouts read whole records and extract the field afterwards.

use itertools::Itertools;
use sectio_section::Section;
use sectio_storage::ReadableStorageTraits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::{resolve, TransferSource};
use crate::{fill_runs, read_section, FillValue, ReadError, ReadOptions, StorageDescriptor};

/// A named field of a record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordField {
    name: String,
    offset: usize,
    size: usize,
}

impl RecordField {
    /// Create a new record field `size` bytes wide at byte `offset` within the record.
    #[must_use]
    pub fn new(name: impl Into<String>, offset: usize, size: usize) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
        }
    }

    /// Return the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the byte offset of the field within the record.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Return the size of the field in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    fn byte_range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.size
    }
}

/// A record layout error.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum RecordLayoutError {
    /// A field extends past the end of the record.
    #[error("field {_0} at offset {_1} with size {_2} exceeds the record size {_3}")]
    FieldOutOfBounds(String, usize, usize, usize),
    /// Two fields share a name.
    #[error("duplicate field {_0}")]
    DuplicateField(String),
    /// No field has the requested name.
    #[error("unknown field {_0}")]
    UnknownField(String),
    /// The record size does not match the element size of the storage descriptor.
    #[error("record size {_0} does not match the element size {_1}")]
    RecordSizeMismatch(usize, usize),
}

/// The layout of a fixed-size heterogeneous record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RecordLayoutMetadata")]
pub struct RecordLayout {
    record_size: usize,
    fields: Vec<RecordField>,
}

#[derive(Deserialize)]
struct RecordLayoutMetadata {
    record_size: usize,
    fields: Vec<RecordField>,
}

impl TryFrom<RecordLayoutMetadata> for RecordLayout {
    type Error = RecordLayoutError;

    fn try_from(metadata: RecordLayoutMetadata) -> Result<Self, Self::Error> {
        Self::new(metadata.record_size, metadata.fields)
    }
}

impl RecordLayout {
    /// Create a new record layout.
    ///
    /// Fields may overlap and need not cover the whole record.
    ///
    /// # Errors
    /// Returns [`RecordLayoutError::FieldOutOfBounds`] if a field extends past `record_size`.
    /// Returns [`RecordLayoutError::DuplicateField`] if two fields share a name.
    pub fn new(record_size: usize, fields: Vec<RecordField>) -> Result<Self, RecordLayoutError> {
        for field in &fields {
            if field
                .offset
                .checked_add(field.size)
                .is_none_or(|end| end > record_size)
            {
                return Err(RecordLayoutError::FieldOutOfBounds(
                    field.name.clone(),
                    field.offset,
                    field.size,
                    record_size,
                ));
            }
        }
        if let Some(name) = fields.iter().map(RecordField::name).duplicates().next() {
            return Err(RecordLayoutError::DuplicateField(name.to_string()));
        }
        Ok(Self {
            record_size,
            fields,
        })
    }

    /// Return the size of a record in bytes.
    #[must_use]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Return the fields of the record.
    #[must_use]
    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    /// Return the field named `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Return the byte offset within the record of the field named `name`.
    #[must_use]
    pub fn field_offset(&self, name: &str) -> Option<usize> {
        self.field(name).map(RecordField::offset)
    }
}

/// Reads records and record fields of a record variable.
pub struct RecordReader<'a, TStorage: ?Sized> {
    storage: &'a TStorage,
    descriptor: &'a StorageDescriptor,
    layout: RecordLayout,
}

impl<'a, TStorage: ?Sized + ReadableStorageTraits> RecordReader<'a, TStorage> {
    /// Create a new record reader.
    ///
    /// # Errors
    /// Returns [`ReadError::CorruptStructureLayout`] if the record size of `layout` does not match the element size
    /// of `descriptor`.
    pub fn new(
        storage: &'a TStorage,
        descriptor: &'a StorageDescriptor,
        layout: RecordLayout,
    ) -> Result<Self, ReadError> {
        if layout.record_size() != descriptor.element_size() {
            return Err(RecordLayoutError::RecordSizeMismatch(
                layout.record_size(),
                descriptor.element_size(),
            )
            .into());
        }
        Ok(Self {
            storage,
            descriptor,
            layout,
        })
    }

    /// Return the record layout.
    #[must_use]
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Read the whole records of `section`.
    ///
    /// # Errors
    /// See [`read_section`].
    pub fn read_records(
        &self,
        section: &Section,
        options: &ReadOptions,
    ) -> Result<Vec<u8>, ReadError> {
        read_section(self.storage, self.descriptor, section, options)
    }

    /// Read the field named `name` of the records of `section`.
    ///
    /// Returns the field bytes of each record in C-contiguous order of the section.
    ///
    /// # Errors
    /// Returns [`ReadError::CorruptStructureLayout`] if there is no field named `name`.
    /// Otherwise see [`read_section`].
    pub fn read_field(
        &self,
        section: &Section,
        name: &str,
        options: &ReadOptions,
    ) -> Result<Vec<u8>, ReadError> {
        let field = self
            .layout
            .field(name)
            .ok_or_else(|| RecordLayoutError::UnknownField(name.to_string()))?;

        if field.size() == 0 {
            return Ok(Vec::new());
        }
        if !self.descriptor.layout().is_directly_addressable() {
            let records = self.read_records(section, options)?;
            return Ok(records
                .chunks_exact(self.layout.record_size())
                .flat_map(|record| &record[field.byte_range()])
                .copied()
                .collect());
        }

        let transfers = resolve(self.descriptor, section)?;
        let num_records = usize::try_from(transfers.num_elements()).unwrap();
        log::debug!(
            "Reading field {name} of section {section} of a {} layout ({num_records} records)",
            self.descriptor.layout().name()
        );
        let fill_value = self
            .descriptor
            .fill_value()
            .map(|fill_value| FillValue::from(&fill_value.as_ne_bytes()[field.byte_range()]));
        let mut output = vec![0; num_records * field.size()];
        for transfer in transfers {
            match transfer.source {
                TransferSource::Direct(offset) => {
                    let destination = usize::try_from(transfer.destination).unwrap();
                    let run_length = usize::try_from(transfer.run_length).unwrap();
                    let start = destination * field.size();
                    let end = (destination + run_length) * field.size();
                    let fields = output[start..end].chunks_exact_mut(field.size());
                    for (record, out) in (offset..).step_by(self.layout.record_size()).zip(fields) {
                        self.storage.read_at_into(record + field.offset() as u64, out)?;
                    }
                }
                TransferSource::Fill => fill_runs(
                    &mut output,
                    field.size(),
                    fill_value.as_ref(),
                    [(transfer.destination, transfer.run_length)],
                ),
                TransferSource::Stream(_) | TransferSource::Chunk { .. } => {
                    unreachable!(
                        "a {} layout is not directly addressable",
                        self.descriptor.layout().name()
                    )
                }
            }
        }
        Ok(output)
    }
}
