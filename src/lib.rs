#![warn(missing_docs)]

//! # pdf_amend
//!
//! PDF object model and incremental-update engine: parse a file's
//! structure, modify the object graph, append revisions.
//!
//! ## Core Features
//!
//! - **Object model**: a tagged union over every PDF value type, with
//!   insertion-order dictionaries and the literal/hexadecimal string
//!   distinction preserved for round-trip stability
//! - **Stream filters**: ASCIIHexDecode, ASCII85Decode, RunLengthDecode,
//!   FlateDecode and LZWDecode, encode and decode, with PNG predictors
//! - **Structure parsing**: header, `startxref`, classic cross-reference
//!   tables and the full `/Prev` revision chain
//! - **Change tracking**: an [`ObjectFactory`] tracks created, modified and
//!   removed objects; attached factories compose independently-numbered
//!   object graphs into one numbering space
//! - **Incremental saves**: only touched objects are appended, with a new
//!   cross-reference section and `/Prev`-linked trailer
//!
//! Out of scope: rendering, encryption, object streams and
//! cross-reference stream consumption (detected and refused as
//! unsupported rather than misparsed).
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_amend::{ObjectFactory, StructureParser, Value};
//!
//! let factory = ObjectFactory::create_factory(1);
//! let doc = StructureParser::from_file("input.pdf", &factory)?;
//!
//! let root = doc.trailer().dict.get("Root").unwrap().as_reference().unwrap();
//! let catalog = factory.fetch(root)?;
//! catalog.modify(|v| {
//!     if let Some(dict) = v.as_dict_mut() {
//!         dict.insert("PageMode".into(), Value::Name("UseOutlines".into()));
//!     }
//! })?;
//!
//! let updated = pdf_amend::writer::write_incremental(
//!     &std::fs::read("input.pdf")?,
//!     &factory,
//!     &doc.trailer().dict,
//!     doc.startxref_offset(),
//! )?;
//! std::fs::write("output.pdf", updated)?;
//! ```

pub mod error;
pub mod factory;
pub mod filters;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod structure;
pub mod writer;
pub mod xref;

pub use error::{Error, Result};
pub use factory::{IndirectObject, ObjectFactory, UpdateRecord};
pub use object::{Dict, ObjectRef, StringFormat, Value};
pub use structure::{StructureParser, TrailerNode};
pub use xref::{Context, ReferenceTable, TableEntry};
