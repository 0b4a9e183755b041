//! I/O layer: the schema-driven record decoder, format identifiers, product
//! headers, schema and band-descriptor registries, product files and the
//! `writers` for GeoTIFF, world files, text and binary subset exports.
pub mod decoder;
pub use decoder::{ByteSource, DecodeError, Decoder, FileSource, LeafType, Value};

pub mod format;
pub use format::FormatId;

pub mod header;
pub use header::{HeaderError, HeaderPatch, ProductHeader};

pub mod schema;
pub use schema::{BinarySchema, SchemaError, SchemaRegistry};

pub mod descriptors;
pub use descriptors::{BandDescriptor, DescriptorError, DescriptorRegistry, DescriptorTable};

pub mod product;
pub use product::{GridLayout, ProductFile, ProductKind};

pub mod writers;
