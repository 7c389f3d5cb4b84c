use std::path::Path;

use kestrel_core::discovery::ApplicationIndex;
use kestrel_core::provider::Provider;

fn write_desktop(dir: &Path, file: &str, body: &str) {
    std::fs::write(dir.join(file), format!("[Desktop Entry]\n{body}")).unwrap();
}

#[test]
fn first_seen_name_wins_and_catalog_is_sorted() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    write_desktop(first.path(), "files.desktop", "Name=Files\nExec=nautilus %U\n");
    write_desktop(first.path(), "zed.desktop", "Name=zed\nExec=zed\n");
    write_desktop(second.path(), "files-alt.desktop", "Name=Files\nExec=thunar\n");
    write_desktop(second.path(), "calc.desktop", "Name=Calculator\nExec=gnome-calculator\n");

    let index = ApplicationIndex::with_dirs(vec![
        first.path().to_path_buf(),
        second.path().to_path_buf(),
    ]);
    let names: Vec<&str> = index.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Calculator", "Files", "zed"]);

    let files = &index.entries()[1];
    assert_eq!(files.exec, "nautilus");
}

#[test]
fn placeholder_tokens_are_stripped_from_exec() {
    let dir = tempfile::tempdir().unwrap();
    write_desktop(dir.path(), "foo.desktop", "Name=Foo\nExec=foo %f --opt %U\n");

    let index = ApplicationIndex::with_dirs(vec![dir.path().to_path_buf()]);
    assert_eq!(index.entries()[0].exec, "foo --opt");
}

#[test]
fn hidden_and_non_application_entries_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_desktop(dir.path(), "a.desktop", "Name=Shown\nExec=shown\n");
    write_desktop(dir.path(), "b.desktop", "Name=Hidden\nExec=hidden\nNoDisplay=true\n");
    write_desktop(dir.path(), "c.desktop", "Type=Link\nName=Link\nExec=link\n");
    write_desktop(dir.path(), "d.desktop", "Name=NoExec\n");
    std::fs::write(dir.path().join("notes.txt"), "[Desktop Entry]\nName=Txt\nExec=txt\n").unwrap();

    let index = ApplicationIndex::with_dirs(vec![dir.path().to_path_buf()]);
    let names: Vec<&str> = index.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Shown"]);
}

#[test]
fn missing_directories_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let index = ApplicationIndex::with_dirs(vec![missing]);
    assert!(index.entries().is_empty());
}

#[test]
fn empty_query_lists_first_eight_alphabetically() {
    let dir = tempfile::tempdir().unwrap();
    for i in (0..12).rev() {
        write_desktop(
            dir.path(),
            &format!("app{i:02}.desktop"),
            &format!("Name=App {i:02}\nExec=app{i}\n"),
        );
    }

    let mut index = ApplicationIndex::with_dirs(vec![dir.path().to_path_buf()]);
    let items = index.search("").unwrap();
    assert_eq!(items.len(), 8);
    assert_eq!(items[0].title, "App 00");
    assert_eq!(items[7].title, "App 07");
    assert!(items.iter().all(|item| item.provider_tag == "app"));
}

#[test]
fn query_ranks_by_score_and_carries_exec_as_payload() {
    let dir = tempfile::tempdir().unwrap();
    write_desktop(
        dir.path(),
        "fx.desktop",
        "Name=Firefox\nExec=firefox %u\nComment=Browse the web\nIcon=firefox\n",
    );
    write_desktop(dir.path(), "ff.desktop", "Name=Font Finder\nExec=fontfinder\n");
    write_desktop(dir.path(), "gimp.desktop", "Name=GIMP\nExec=gimp\n");

    let mut index = ApplicationIndex::with_dirs(vec![dir.path().to_path_buf()]);
    let items = index.search("fire").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Firefox");
    assert_eq!(items[0].subtitle, "Browse the web");
    assert_eq!(items[0].icon, "firefox");
    assert_eq!(items[0].payload, "firefox");
}

#[test]
fn rebuild_replaces_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    write_desktop(dir.path(), "one.desktop", "Name=One\nExec=one\n");
    let mut index = ApplicationIndex::with_dirs(vec![dir.path().to_path_buf()]);
    assert_eq!(index.entries().len(), 1);

    std::fs::remove_file(dir.path().join("one.desktop")).unwrap();
    write_desktop(dir.path(), "two.desktop", "Name=Two\nExec=two\n");
    write_desktop(dir.path(), "three.desktop", "Name=Three\nExec=three\n");

    assert_eq!(index.refresh(), 2);
    let names: Vec<&str> = index.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Three", "Two"]);
}
