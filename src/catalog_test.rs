use super::*;

const TWO_TABS: &str = r#"<mxfile host="drawio">
  <diagram id="p1" name="Overview">
    <mxGraphModel dx="800" dy="600" pageScale="1">
      <root><mxCell id="0"/></root>
    </mxGraphModel>
  </diagram>
  <diagram id="p2" name="Detail">
    <mxGraphModel dx="1024" dy="768" pageScale="1.5"><root/></mxGraphModel>
  </diagram>
</mxfile>"#;

fn write(dir: &Path, rel: &str, body: &str) -> PathBuf {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, body).unwrap();
    path
}

// =============================================================================
// parse_pages
// =============================================================================

#[test]
fn parse_pages_reads_every_tab_in_order() {
    let pages = parse_pages(TWO_TABS).unwrap();
    assert_eq!(
        pages,
        vec![
            Page {
                id: "p1".into(),
                name: "Overview".into(),
                width: "800".into(),
                height: "600".into(),
                scale: "1".into(),
            },
            Page {
                id: "p2".into(),
                name: "Detail".into(),
                width: "1024".into(),
                height: "768".into(),
                scale: "1.5".into(),
            },
        ]
    );
}

#[test]
fn parse_pages_keeps_pages_without_graph_model() {
    // Compressed diagrams carry base64 text instead of an mxGraphModel.
    let xml = r#"<mxfile><diagram id="c1" name="">7VhRb5swEP41PCYKGJLmMUnbbdImVeqkbo8OOGDN2My4S7Jfv8MYAoG0qdT</diagram></mxfile>"#;
    let pages = parse_pages(xml).unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].id, "c1");
    assert_eq!(pages[0].name, "");
    assert_eq!(pages[0].width, "");
}

#[test]
fn parse_pages_accepts_self_closing_diagram() {
    let pages = parse_pages(r#"<mxfile><diagram id="only"/></mxfile>"#).unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].id, "only");
}

#[test]
fn parse_pages_ignores_nested_diagram_elements() {
    let xml = r#"<mxfile><other><diagram id="deep"/></other><diagram id="top"/></mxfile>"#;
    let pages = parse_pages(xml).unwrap();
    assert_eq!(pages.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["top"]);
}

#[test]
fn parse_pages_unescapes_attributes() {
    let pages = parse_pages(r#"<mxfile><diagram id="a" name="R&amp;D"/></mxfile>"#).unwrap();
    assert_eq!(pages[0].name, "R&D");
}

#[test]
fn parse_pages_rejects_mismatched_tags() {
    assert!(parse_pages("<mxfile><diagram id=\"a\"></mxfile>").is_err());
}

// =============================================================================
// read_diagram / read_dir
// =============================================================================

#[test]
fn read_diagram_strips_newlines_and_relativizes() {
    let root = tempfile::tempdir().unwrap();
    let path = write(root.path(), "sub/flow.drawio", TWO_TABS);

    let diagram = read_diagram(root.path(), &path).unwrap();
    assert_eq!(diagram.rel_path, PathBuf::from("sub/flow.drawio"));
    assert!(diagram.path.is_absolute());
    assert!(!diagram.body.contains('\n'));
    assert!(diagram.body.starts_with("<mxfile"));
    assert_eq!(diagram.pages.len(), 2);
}

#[test]
fn read_dir_filters_extensions_and_sorts() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "b.drawio", TWO_TABS);
    write(root.path(), "a.dio", TWO_TABS);
    write(root.path(), "nested/c.dio", TWO_TABS);
    write(root.path(), "notes.txt", "not a diagram");
    write(root.path(), "image.xml", TWO_TABS);

    let diagrams = read_dir(root.path(), DIAGRAM_EXTENSIONS).unwrap();
    let rels = diagrams.iter().map(|d| d.rel_path.clone()).collect::<Vec<_>>();
    assert_eq!(rels, vec![PathBuf::from("a.dio"), PathBuf::from("b.drawio"), PathBuf::from("nested/c.dio")]);
}

#[test]
fn read_dir_skips_malformed_files() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "good.drawio", TWO_TABS);
    write(root.path(), "broken.drawio", "<mxfile><diagram></mxfile>");

    let diagrams = read_dir(root.path(), DIAGRAM_EXTENSIONS).unwrap();
    assert_eq!(diagrams.len(), 1);
    assert_eq!(diagrams[0].rel_path, PathBuf::from("good.drawio"));
}

#[test]
fn read_dir_missing_root_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let err = read_dir(&root.path().join("absent"), DIAGRAM_EXTENSIONS).unwrap_err();
    assert!(matches!(err, CatalogError::Walk { .. }));
}

#[cfg(unix)]
#[test]
fn read_dir_does_not_follow_directory_symlinks() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "a.drawio", TWO_TABS);
    std::os::unix::fs::symlink(root.path(), root.path().join("loop")).unwrap();

    let diagrams = read_dir(root.path(), DIAGRAM_EXTENSIONS).unwrap();
    assert_eq!(diagrams.len(), 1);
    assert_eq!(diagrams[0].rel_path, PathBuf::from("a.drawio"));
}
