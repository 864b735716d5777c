//! Command table persistence: teaching, reopening, import/export, reset.

use hark::voice_command::{ActionDescriptor, ActionKind};
use hark::{CommandResolver, CommandStore, CommandTable, Resolution};

fn open(dir: &tempfile::TempDir) -> CommandStore {
    CommandStore::open(dir.path().join("commands.json")).unwrap()
}

#[test]
fn first_open_writes_the_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);

    assert_eq!(store.snapshot(), CommandTable::defaults());
    let on_disk = CommandTable::load(&dir.path().join("commands.json")).unwrap();
    assert_eq!(on_disk, CommandTable::defaults());
}

#[test]
fn taught_command_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(&dir);
        let replaced = store
            .teach(
                "  Start The Coffee ",
                ActionDescriptor::simple(ActionKind::RunCommand).with_param("cmd", "brew"),
            )
            .unwrap();
        assert!(!replaced);
    }

    let store = open(&dir);
    let table = store.read();
    let entry = table.get("start the coffee").expect("taught trigger persisted");
    assert_eq!(entry.descriptor.action, ActionKind::RunCommand);

    let Resolution::Resolved(cmd) = CommandResolver::default().resolve("start the coffee", &table)
    else {
        panic!("taught trigger should resolve");
    };
    assert_eq!(cmd.params.get("cmd").map(String::as_str), Some("brew"));
}

#[test]
fn json_document_keeps_table_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    store
        .teach("zebra mode", ActionDescriptor::simple(ActionKind::TellJoke))
        .unwrap();

    let json = std::fs::read_to_string(dir.path().join("commands.json")).unwrap();
    let first = json.find("\"what time is it\"").unwrap();
    let second = json.find("\"what's the day today\"").unwrap();
    let last = json.find("\"zebra mode\"").unwrap();
    assert!(first < second && second < last);
}

#[test]
fn export_then_import_into_a_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let source = open(&dir);
    source
        .teach("open the docs", ActionDescriptor::dynamic(ActionKind::OpenWebsite))
        .unwrap();
    let exported = dir.path().join("export.json");
    source.export(&exported).unwrap();

    let other = tempfile::tempdir().unwrap();
    let target = CommandStore::open(other.path().join("commands.json")).unwrap();
    let count = target.import(&exported).unwrap();

    assert_eq!(count, CommandTable::defaults().len() + 1);
    assert_eq!(target.snapshot(), source.snapshot());
}

#[test]
fn malformed_import_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, r#"{"dance": {"action": "moonwalk"}}"#).unwrap();

    assert!(store.import(&bad).is_err());
    assert_eq!(store.snapshot(), CommandTable::defaults());
}

#[test]
fn edit_remove_and_reset() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);

    store
        .edit(
            "play music",
            "play some music",
            ActionDescriptor::simple(ActionKind::OpenApp).with_param("app", "rhythmbox"),
        )
        .unwrap();
    assert!(store.read().get("play music").is_none());
    assert!(store.remove("check battery").unwrap());
    assert!(!store.remove("check battery").unwrap());
    assert!(store.edit("no such trigger", "x", ActionDescriptor::simple(ActionKind::SayTime)).is_err());

    let reopened = open(&dir);
    assert!(reopened.read().get("play some music").is_some());
    assert!(reopened.read().get("check battery").is_none());

    reopened.reset_to_defaults().unwrap();
    assert_eq!(open(&dir).snapshot(), CommandTable::defaults());
}
