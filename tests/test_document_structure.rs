//! Document structure parsing tests.
//!
//! End-to-end loads of small complete files: header version, trailer
//! contents, reference dereferencing through the cross-reference table,
//! and the rejection paths (unsupported versions, encryption, damaged
//! end-of-file markers).

use pdf_amend::{Error, ObjectFactory, ObjectRef, StructureParser, Value};
use std::io::Write;

/// Build a minimal single-revision file: a catalog, an empty page tree,
/// a correct xref table and trailer. Offsets are computed, not hardcoded.
fn build_minimal_pdf(version: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("%PDF-{}\n", version).as_bytes());
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let offset1 = out.len();
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    let offset2 = out.len();
    out.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");

    let xref_offset = out.len();
    out.extend_from_slice(b"xref\n0 3\n");
    out.extend_from_slice(b"0000000000 65535 f \n");
    out.extend_from_slice(format!("{:010} 00000 n \n", offset1).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", offset2).as_bytes());
    out.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

#[test]
fn test_minimal_pdf_end_to_end() {
    let factory = ObjectFactory::create_factory(1);
    let doc = StructureParser::from_bytes(build_minimal_pdf("1.4"), &factory).unwrap();

    assert_eq!(doc.pdf_version(), "1.4");
    assert_eq!(doc.trailer().dict.get("Size").unwrap().as_integer(), Some(3));

    // Root dereferences to the catalog
    let root = doc.trailer().dict.get("Root").unwrap().as_reference().unwrap();
    assert_eq!(root, ObjectRef::new(1, 0));
    let catalog = factory.resolve(root).unwrap();
    assert_eq!(catalog.as_dict().unwrap().get("Type").unwrap().as_name(), Some("Catalog"));

    // Nested reference resolves too
    let pages_ref = catalog.as_dict().unwrap().get("Pages").unwrap().as_reference().unwrap();
    let pages = factory.resolve(pages_ref).unwrap();
    assert_eq!(pages.as_dict().unwrap().get("Count").unwrap().as_integer(), Some(0));
}

#[test]
fn test_factory_counter_follows_trailer_size() {
    let factory = ObjectFactory::create_factory(1);
    StructureParser::from_bytes(build_minimal_pdf("1.4"), &factory).unwrap();

    // The next created object takes the first unused number
    let obj = factory.new_object(Value::Null);
    assert_eq!(obj.num(), 3);
}

#[test]
fn test_from_file_loads_identically() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&build_minimal_pdf("1.6")).unwrap();
    file.flush().unwrap();

    let factory = ObjectFactory::create_factory(1);
    let doc = StructureParser::from_file(file.path(), &factory).unwrap();
    assert_eq!(doc.pdf_version(), "1.6");
}

#[test]
fn test_version_gate_rejects_out_of_range() {
    for version in ["2.0", "0.8", "3.1"] {
        let factory = ObjectFactory::create_factory(1);
        let err = StructureParser::from_bytes(build_minimal_pdf(version), &factory).unwrap_err();
        assert!(
            matches!(err, Error::NotImplemented(_)),
            "version {} should be refused as unsupported",
            version
        );
    }
}

#[test]
fn test_version_gate_accepts_supported_range() {
    for version in ["0.9", "1.0", "1.4", "1.7"] {
        let factory = ObjectFactory::create_factory(1);
        assert!(
            StructureParser::from_bytes(build_minimal_pdf(version), &factory).is_ok(),
            "version {} should load",
            version
        );
    }
}

#[test]
fn test_encrypted_document_refused() {
    let mut pdf = build_minimal_pdf("1.4");
    // Rewrite the trailer to carry an /Encrypt entry
    let trailer = b"trailer\n<< /Size 3 /Root 1 0 R >>";
    let patched = b"trailer\n<< /Size 3 /Root 1 0 R /Encrypt 5 0 R >>";
    let pos = pdf.windows(trailer.len()).position(|w| w == trailer).unwrap();
    pdf.splice(pos..pos + trailer.len(), patched.iter().copied());
    // The xref offset is unchanged: the trailer sits after the table

    let factory = ObjectFactory::create_factory(1);
    let err = StructureParser::from_bytes(pdf, &factory).unwrap_err();
    assert!(matches!(err, Error::NotImplemented(_)));
}

#[test]
fn test_missing_eof_marker_is_corruption() {
    let mut pdf = build_minimal_pdf("1.4");
    pdf.truncate(pdf.len() - 6); // drop "%%EOF\n"

    let factory = ObjectFactory::create_factory(1);
    let err = StructureParser::from_bytes(pdf, &factory).unwrap_err();
    assert!(matches!(err, Error::Corrupted { .. }));
}

#[test]
fn test_trailing_garbage_after_eof_is_corruption() {
    let mut pdf = build_minimal_pdf("1.4");
    pdf.extend_from_slice(b"lots of trailing garbage");

    let factory = ObjectFactory::create_factory(1);
    let err = StructureParser::from_bytes(pdf, &factory).unwrap_err();
    assert!(matches!(err, Error::Corrupted { .. }));
}

#[test]
fn test_bad_xref_offset_is_corruption() {
    let pdf = build_minimal_pdf("1.4");
    let text = String::from_utf8(pdf).unwrap();
    // Point startxref at a bogus offset
    let patched = text.replace(
        &format!("startxref\n{}", text.rfind("xref\n0 3").unwrap()),
        "startxref\n3",
    );

    let factory = ObjectFactory::create_factory(1);
    let err = StructureParser::from_bytes(patched.into_bytes(), &factory).unwrap_err();
    assert!(matches!(err, Error::Corrupted { .. }));
}

#[test]
fn test_written_document_reloads() {
    // write_document output must parse back through the structure parser
    let factory = ObjectFactory::create_factory(1);
    let catalog = factory.new_object(
        pdf_amend::parser::parse_value(b"<< /Type /Catalog /Pages 2 0 R >>").unwrap(),
    );
    let _pages = factory.new_object(
        pdf_amend::parser::parse_value(b"<< /Type /Pages /Kids [] /Count 0 >>").unwrap(),
    );

    let mut trailer = pdf_amend::Dict::new();
    trailer.insert("Root".to_string(), Value::Reference(catalog.reference()));
    let bytes = pdf_amend::writer::write_document(&factory, "1.5", &trailer).unwrap();

    let reload_factory = ObjectFactory::create_factory(1);
    let doc = StructureParser::from_bytes(bytes, &reload_factory).unwrap();
    assert_eq!(doc.pdf_version(), "1.5");

    let root = doc.trailer().dict.get("Root").unwrap().as_reference().unwrap();
    let value = reload_factory.resolve(root).unwrap();
    assert_eq!(value.as_dict().unwrap().get("Type").unwrap().as_name(), Some("Catalog"));
}
