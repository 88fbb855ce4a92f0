//! Object factory integration tests.
//!
//! Cross-factory scenarios through the public API: importing object graphs
//! from a loaded document, composing numbering spaces via attachment, and
//! the identity guarantees of fetched handles.

use pdf_amend::{ObjectFactory, ObjectRef, StructureParser, Value};

fn build_two_object_pdf() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

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
fn test_fetch_returns_shared_handle() {
    let factory = ObjectFactory::create_factory(1);
    StructureParser::from_bytes(build_two_object_pdf(), &factory).unwrap();

    let first = factory.fetch(ObjectRef::new(1, 0)).unwrap();
    let second = factory.fetch(ObjectRef::new(1, 0)).unwrap();
    assert!(first.same_object(&second));

    // Mutation through one handle is visible through the other
    first
        .modify(|v| {
            v.as_dict_mut().unwrap().insert("Lang".to_string(), Value::Name("en".to_string()));
        })
        .unwrap();
    assert_eq!(second.value().as_dict().unwrap().get("Lang").unwrap().as_name(), Some("en"));
}

#[test]
fn test_fetch_is_lazy_and_untouched_objects_stay_clean() {
    let factory = ObjectFactory::create_factory(1);
    StructureParser::from_bytes(build_two_object_pdf(), &factory).unwrap();

    // Reading alone does not dirty the session
    factory.fetch(ObjectRef::new(1, 0)).unwrap();
    factory.fetch(ObjectRef::new(2, 0)).unwrap();
    assert!(!factory.is_modified());
    assert!(factory.list_modified_objects().unwrap().is_empty());
}

#[test]
fn test_clone_from_loaded_document() {
    let source = ObjectFactory::create_factory(1);
    StructureParser::from_bytes(build_two_object_pdf(), &source).unwrap();
    let catalog = source.fetch(ObjectRef::new(1, 0)).unwrap();

    let target = ObjectFactory::create_factory(1);
    let cloned = target.make_clone(&catalog).unwrap();

    // The whole graph came over: catalog plus the page tree it points at
    assert_eq!(cloned.num(), 1);
    let pages_ref =
        cloned.value().as_dict().unwrap().get("Pages").unwrap().as_reference().unwrap();
    let pages = target.resolve(pages_ref).unwrap();
    assert_eq!(pages.as_dict().unwrap().get("Type").unwrap().as_name(), Some("Pages"));

    // The copy is independent of the source
    cloned
        .modify(|v| {
            v.as_dict_mut().unwrap().insert("Marked".to_string(), Value::Boolean(true));
        })
        .unwrap();
    assert!(catalog.value().as_dict().unwrap().get("Marked").is_none());
}

#[test]
fn test_attached_records_renumber_nested_references() {
    // Child graph: object 1 points at object 2 in the child's own numbering
    let child = ObjectFactory::create_factory(1);
    let leaf = child.new_object(Value::Integer(42));
    let holder =
        child.new_object(Value::Array(vec![Value::Reference(leaf.reference())]));

    let root = ObjectFactory::create_factory(4); // 3 slots occupied
    root.attach(&child);

    let records = root.list_modified_objects().unwrap();
    assert_eq!(records.len(), 2);

    // Both objects and the reference between them shifted by 3
    assert_eq!(records[0].num, leaf.num() + 3);
    assert_eq!(records[1].num, holder.num() + 3);
    let body = String::from_utf8(records[1].body.clone().unwrap()).unwrap();
    assert!(body.contains(&format!("{} 0 R", leaf.num() + 3)), "body: {}", body);
}

#[test]
fn test_reference_to_unattached_factory_fails_serialization() {
    let root = ObjectFactory::create_factory(1);
    let stranger = ObjectFactory::create_factory(1);
    let foreign = stranger.new_object(Value::Null);

    // root holds a reference into a numbering space it never attached
    root.new_object(Value::Reference(foreign.reference()));

    // Serializing from root is fine (the reference is just a number pair in
    // root's own space), but serializing the stranger's records through root
    // must fail.
    assert!(root.list_modified_objects().is_ok());
    assert!(root.get_enumeration_shift(&stranger).is_err());
}

#[test]
fn test_combined_size_spans_attachment_tree() {
    let a = ObjectFactory::create_factory(3); // 2 slots
    let b = ObjectFactory::create_factory(4); // 3 slots
    let c = ObjectFactory::create_factory(2); // 1 slot
    a.attach(&b);
    a.attach(&c);

    assert_eq!(a.combined_size(), 2 + 3 + 1 + 1);
}

#[test]
fn test_close_releases_loaded_document() {
    let factory = ObjectFactory::create_factory(1);
    StructureParser::from_bytes(build_two_object_pdf(), &factory).unwrap();
    factory.fetch(ObjectRef::new(1, 0)).unwrap();

    factory.close();
    // No context left to resolve through
    assert!(factory.fetch(ObjectRef::new(1, 0)).is_err());
}
