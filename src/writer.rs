//! PDF serialization and file writing.
//!
//! Values serialize to PDF textual/binary syntax with every nested
//! reference renumbered by the owning factory's enumeration shift.
//! [`write_incremental`] appends an update segment (changed bodies, a new
//! cross-reference section and a `/Prev`-linked trailer) after the original
//! bytes; [`write_document`] emits a complete single-revision file.

use crate::error::{Error, Result};
use crate::factory::{ObjectFactory, UpdateRecord};
use crate::lexer::encode_name_bytes;
use crate::object::{Dict, StringFormat, Value};
use crate::xref::FREE_LIST_HEAD;

/// Marker comment advertising binary content, written after the header.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Serialize a value owned by `owner` for a save rooted at `root`.
///
/// # Errors
///
/// `Logic` if `owner` is not in `root`'s attachment subtree — its
/// references have no place in the combined numbering space.
pub fn serialize(value: &Value, owner: &ObjectFactory, root: &ObjectFactory) -> Result<Vec<u8>> {
    let shift = root.get_enumeration_shift(owner)?;
    let mut out = Vec::new();
    serialize_value(&mut out, value, shift);
    Ok(out)
}

/// Serialize a full indirect object (`N G obj ... endobj\n`).
pub fn serialize_indirect(
    num: u32,
    gen: u16,
    value: &Value,
    owner: &ObjectFactory,
    root: &ObjectFactory,
) -> Result<Vec<u8>> {
    let shift = root.get_enumeration_shift(owner)?;
    let mut out = Vec::new();
    out.extend_from_slice(format!("{} {} obj\n", num, gen).as_bytes());
    serialize_value(&mut out, value, shift);
    out.extend_from_slice(b"\nendobj\n");
    Ok(out)
}

/// Serialize a value, adding `shift` to every reference's object number.
pub fn serialize_value(out: &mut Vec<u8>, value: &Value, shift: u64) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Boolean(true) => out.extend_from_slice(b"true"),
        Value::Boolean(false) => out.extend_from_slice(b"false"),
        Value::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Value::Real(r) => out.extend_from_slice(format_real(*r).as_bytes()),

        Value::String(bytes, StringFormat::Literal) => {
            out.push(b'(');
            for &b in bytes {
                match b {
                    b'(' | b')' | b'\\' => {
                        out.push(b'\\');
                        out.push(b);
                    },
                    // A raw CR would be normalized away by readers
                    b'\r' => out.extend_from_slice(b"\\r"),
                    _ => out.push(b),
                }
            }
            out.push(b')');
        },

        Value::String(bytes, StringFormat::Hexadecimal) => {
            out.push(b'<');
            for &b in bytes {
                out.extend_from_slice(format!("{:02X}", b).as_bytes());
            }
            out.push(b'>');
        },

        Value::Name(name) => {
            out.push(b'/');
            out.extend_from_slice(encode_name_bytes(&name_bytes(name)).as_bytes());
        },

        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                serialize_value(out, item, shift);
            }
            out.push(b']');
        },

        Value::Dictionary(dict) => serialize_dict(out, dict, shift),

        Value::Stream { dict, data } => {
            // /Length always reflects the actual payload
            let mut patched = dict.clone();
            patched.insert("Length".to_string(), Value::Integer(data.len() as i64));
            serialize_dict(out, &patched, shift);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\nendstream");
        },

        Value::Reference(r) => {
            out.extend_from_slice(format!("{} {} R", r.num as u64 + shift, r.gen).as_bytes());
        },
    }
}

fn serialize_dict(out: &mut Vec<u8>, dict: &Dict, shift: u64) {
    out.extend_from_slice(b"<< ");
    for (key, value) in dict {
        out.push(b'/');
        out.extend_from_slice(encode_name_bytes(&name_bytes(key)).as_bytes());
        out.push(b' ');
        serialize_value(out, value, shift);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}

/// Name strings hold one byte per char (Latin-1 from the lexer); anything
/// wider comes from API callers and serializes as UTF-8 bytes.
fn name_bytes(name: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(name.len());
    for c in name.chars() {
        let code = c as u32;
        if code <= 0xFF {
            bytes.push(code as u8);
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
    bytes
}

/// Render a real with the minimal decimal precision that round-trips.
/// PDF forbids exponential notation.
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    for precision in 0..=10usize {
        let s = format!("{:.*}", precision, value);
        if let Ok(parsed) = s.parse::<f64>() {
            if (parsed - value).abs() < 1e-10 {
                return s;
            }
        }
    }
    format!("{:.10}", value)
}

/// One cross-reference line to be written: object number, first field
/// (offset or next-free link), generation, and kind (`n`/`f`).
struct XrefLine {
    num: u32,
    field1: u64,
    gen: u16,
    kind: u8,
}

/// Append an incremental-update segment after the original file bytes.
///
/// Modified object bodies land first (their offsets recorded as they go),
/// then a cross-reference section covering only the touched numbers, then a
/// trailer carrying `/Root` (and `/Info`) from the previous trailer, the
/// new `/Size`, and `/Prev` pointing at the previous section.
///
/// Removed objects chain into the free list: the rewritten head entry
/// `0 65535` points at the first tombstone, and the last tombstone links to
/// wherever the previous revision's free list began.
pub fn write_incremental(
    original: &[u8],
    factory: &ObjectFactory,
    prev_trailer: &Dict,
    prev_startxref: u64,
) -> Result<Vec<u8>> {
    let records = factory.list_modified_objects()?;

    let mut out = original.to_vec();
    if !out.ends_with(b"\n") {
        out.push(b'\n');
    }

    let free_tail = match factory.context() {
        Some(ctx) => ctx.table.get_next_free(FREE_LIST_HEAD)?,
        None => 0,
    };
    let mut lines = body_and_xref_lines(&mut out, &records, free_tail);

    if records.iter().any(|r| r.is_free) {
        let first_free = records.iter().find(|r| r.is_free).map(|r| r.num).unwrap_or(0);
        lines.push(XrefLine { num: 0, field1: first_free as u64, gen: 65535, kind: b'f' });
    }
    lines.sort_by_key(|l| l.num);

    let xref_offset = out.len() as u64;
    write_xref_table(&mut out, &lines);

    let prev_size = prev_trailer.get("Size").and_then(|v| v.as_integer()).unwrap_or(0);
    let size = (factory.combined_size() as i64).max(prev_size);

    let mut trailer = Dict::new();
    trailer.insert("Size".to_string(), Value::Integer(size));
    match prev_trailer.get("Root") {
        Some(root) => {
            trailer.insert("Root".to_string(), root.clone());
        },
        None => return Err(Error::Malformed("previous trailer missing /Root".to_string())),
    }
    if let Some(info) = prev_trailer.get("Info") {
        trailer.insert("Info".to_string(), info.clone());
    }
    trailer.insert("Prev".to_string(), Value::Integer(prev_startxref as i64));

    write_trailer(&mut out, &trailer, xref_offset);

    log::debug!(
        "incremental save: {} update records, xref at {}, size {}",
        records.len(),
        xref_offset,
        size
    );

    factory.clean_enumeration_shift_cache();
    Ok(out)
}

/// Write a complete single-revision file from a factory's objects.
///
/// `trailer_extra` supplies the document-level trailer entries (at minimum
/// `/Root`); `/Size` is filled in from the factory.
pub fn write_document(
    factory: &ObjectFactory,
    version: &str,
    trailer_extra: &Dict,
) -> Result<Vec<u8>> {
    if !trailer_extra.contains_key("Root") {
        return Err(Error::Malformed("trailer must carry /Root".to_string()));
    }

    let records = factory.list_modified_objects()?;

    let mut out = Vec::new();
    out.extend_from_slice(format!("%PDF-{}\n", version).as_bytes());
    out.extend_from_slice(BINARY_MARKER);

    let mut lines = body_and_xref_lines(&mut out, &records, 0);

    let first_free = records.iter().find(|r| r.is_free).map(|r| r.num).unwrap_or(0);
    lines.push(XrefLine { num: 0, field1: first_free as u64, gen: 65535, kind: b'f' });
    lines.sort_by_key(|l| l.num);

    let xref_offset = out.len() as u64;
    write_xref_table(&mut out, &lines);

    let mut trailer = trailer_extra.clone();
    trailer.insert("Size".to_string(), Value::Integer(factory.combined_size() as i64));
    write_trailer(&mut out, &trailer, xref_offset);

    factory.clean_enumeration_shift_cache();
    Ok(out)
}

/// Append object bodies to `out`, producing one xref line per record.
/// Free records chain to the next tombstone (ascending), the last one to
/// `free_tail`.
fn body_and_xref_lines(out: &mut Vec<u8>, records: &[UpdateRecord], free_tail: u32) -> Vec<XrefLine> {
    let free_nums: Vec<u32> = records.iter().filter(|r| r.is_free).map(|r| r.num).collect();
    let mut lines = Vec::with_capacity(records.len());
    let mut free_seen = 0;

    for record in records {
        if record.is_free {
            free_seen += 1;
            let next = free_nums.get(free_seen).copied().unwrap_or(free_tail);
            lines.push(XrefLine {
                num: record.num,
                field1: next as u64,
                gen: record.gen,
                kind: b'f',
            });
        } else {
            let offset = out.len() as u64;
            if let Some(body) = &record.body {
                out.extend_from_slice(body);
                if !out.ends_with(b"\n") {
                    out.push(b'\n');
                }
            }
            lines.push(XrefLine { num: record.num, field1: offset, gen: record.gen, kind: b'n' });
        }
    }

    lines
}

/// Write `xref` with contiguous-run subsections of exactly-20-byte entries.
fn write_xref_table(out: &mut Vec<u8>, lines: &[XrefLine]) {
    out.extend_from_slice(b"xref\n");

    let mut i = 0;
    while i < lines.len() {
        let start = i;
        while i + 1 < lines.len() && lines[i + 1].num == lines[i].num + 1 {
            i += 1;
        }
        i += 1;

        let run = &lines[start..i];
        out.extend_from_slice(format!("{} {}\n", run[0].num, run.len()).as_bytes());
        for line in run {
            // Each entry is exactly 20 bytes
            out.extend_from_slice(
                format!("{:010} {:05} {} \n", line.field1, line.gen, line.kind as char).as_bytes(),
            );
        }
    }
}

fn write_trailer(out: &mut Vec<u8>, trailer: &Dict, xref_offset: u64) {
    out.extend_from_slice(b"trailer\n");
    serialize_value(out, &Value::Dictionary(trailer.clone()), 0);
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
}
