//! Export behaviour: paths, ordering, naming options and cancellation

mod common;

use common::{Fixture, containers, data_type, dictionary_item, read_node};
use mirror_core::settings::keys;
use mirror_core::model::NodeAction;
use mirror_core::{ChangeKind, EntityKind, Error, HandlerSettings, ImportOptions, SyncSettings};
use pretty_assertions::assert_eq;
use std::sync::Mutex;

#[test]
fn test_tree_export_nests_files_under_container_names() {
    let fx = Fixture::new();
    let leaf = containers(&fx.host, &["A", "B", "C"]);
    let entity = data_type(&fx.host, "Colours", Some(&leaf));

    let handler = fx.data_types();
    let results = handler
        .export_all(None, handler.folder(), handler.settings(), None)
        .unwrap();

    let expected = fx.mirror_file("DataTypes/A/B/C/Colours.yaml");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].file_path(), Some(expected.clone()));
    assert_eq!(results[0].change, ChangeKind::Export);

    let node = read_node(&expected);
    assert_eq!(node.key, entity.key);
    assert_eq!(node.info.folder.unwrap().path, "A/B/C");
}

#[test]
fn test_level_export_nests_files_under_ancestor_names() {
    let fx = Fixture::new();
    let a = dictionary_item(&fx.host, "A", None, "a");
    let b = dictionary_item(&fx.host, "B", Some(&a), "b");
    let c = dictionary_item(&fx.host, "C", Some(&b), "c");
    dictionary_item(&fx.host, "Leaf", Some(&c), "leaf");

    let handler = fx.dictionary();
    handler
        .export_all(None, handler.folder(), handler.settings(), None)
        .unwrap();

    for path in ["A.yaml", "A/B.yaml", "A/B/C.yaml", "A/B/C/Leaf.yaml"] {
        assert!(fx.mirror_file(&format!("Dictionary/{}", path)).is_file(), "{}", path);
    }
    let leaf = read_node(&fx.mirror_file("Dictionary/A/B/C/Leaf.yaml"));
    assert_eq!(leaf.info.parent.unwrap().key, c.key);
    assert_eq!(leaf.level, 4);
}

#[test]
fn test_export_visits_parents_before_children_and_reports_progress() {
    let fx = Fixture::new();
    let a = dictionary_item(&fx.host, "A", None, "a");
    dictionary_item(&fx.host, "A1", Some(&a), "a1");
    dictionary_item(&fx.host, "B", None, "b");

    let seen = Mutex::new(Vec::new());
    let progress = |name: &str, processed: usize, total: usize| {
        seen.lock().unwrap().push(format!("{} {}/{}", name, processed, total));
    };

    let handler = fx.dictionary();
    let results = handler
        .export_all(None, handler.folder(), handler.settings(), Some(&progress))
        .unwrap();

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "A1", "B"]);
    assert_eq!(*seen.lock().unwrap(), vec!["A 1/2", "A1 1/1", "B 2/2"]);
}

#[test]
fn test_full_export_cleans_the_folder_first() {
    let fx = Fixture::new();
    data_type(&fx.host, "Text", None);
    let leftover = fx.mirror_file("DataTypes/Old/Gone.yaml");
    std::fs::create_dir_all(leftover.parent().unwrap().to_native()).unwrap();
    std::fs::write(leftover.to_native(), "kind: DataType\n").unwrap();

    let handler = fx.data_types();
    handler
        .export_all(None, handler.folder(), handler.settings(), None)
        .unwrap();

    assert!(!leftover.exists());
    assert!(fx.mirror_file("DataTypes/Text.yaml").is_file());
}

#[test]
fn test_guid_names_and_flat_structure() {
    let fx = Fixture::new();
    let leaf = containers(&fx.host, &["Lists"]);
    let entity = data_type(&fx.host, "Colours", Some(&leaf));

    let settings = HandlerSettings::new()
        .with_setting(keys::GUID_NAMES, "true")
        .with_setting(keys::USE_FLAT_STRUCTURE, "True");
    let handler = fx.data_types();
    handler
        .export_all(None, handler.folder(), &settings, None)
        .unwrap();

    let expected = fx.mirror_file(&format!("DataTypes/{}.yaml", entity.key));
    assert!(expected.is_file());
    // The folder reference still records the container
    assert_eq!(read_node(&expected).info.folder.unwrap().path, "Lists");
}

#[test]
fn test_unsafe_names_become_safe_file_names() {
    let fx = Fixture::new();
    let leaf = containers(&fx.host, &["In/Out"]);
    data_type(&fx.host, "Yes: No?", Some(&leaf));

    let handler = fx.data_types();
    handler
        .export_all(None, handler.folder(), handler.settings(), None)
        .unwrap();

    assert!(fx.mirror_file("DataTypes/In_Out/Yes_ No_.yaml").is_file());
}

#[test]
fn test_export_item_writes_only_on_change() {
    let fx = Fixture::new();
    let entity = data_type(&fx.host, "Text", None);
    let handler = fx.data_types();

    let first = handler
        .export_item(&entity, handler.folder(), handler.settings())
        .unwrap();
    let second = handler
        .export_item(&entity, handler.folder(), handler.settings())
        .unwrap();

    assert_eq!(first.change, ChangeKind::Export);
    assert_eq!(second.change, ChangeKind::NoChange);
    assert_eq!(read_node(&first.file_path().unwrap()).action, NodeAction::Update);
}

#[test]
fn test_cancelled_export_stops() {
    let fx = Fixture::new();
    data_type(&fx.host, "Text", None);
    let handler = fx.data_types();

    handler.cancel_token().cancel();
    let result = handler.export_all(None, handler.folder(), handler.settings(), None);
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(!fx.service.guard().is_paused());

    handler.cancel_token().reset();
    assert!(handler
        .export_all(None, handler.folder(), handler.settings(), None)
        .is_ok());
}

#[test]
fn test_export_from_a_sub_container() {
    let fx = Fixture::new();
    let lists = containers(&fx.host, &["Lists"]);
    data_type(&fx.host, "Colours", Some(&lists));
    data_type(&fx.host, "Text", None);

    let handler = fx.data_types();
    let results = handler
        .export_all(Some(lists.key), handler.folder(), handler.settings(), None)
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(fx.mirror_file("DataTypes/Lists/Colours.yaml").is_file());
    assert!(!fx.mirror_file("DataTypes/Text.yaml").exists());
}

#[test]
fn test_same_name_siblings_get_their_own_files() {
    let fx = Fixture::new();
    let first = data_type(&fx.host, "Colours", None);
    let second = data_type(&fx.host, "Colours", None);

    let handler = fx.data_types();
    let results = handler
        .export_all(None, handler.folder(), handler.settings(), None)
        .unwrap();
    assert_eq!(results.len(), 2);

    let plain = fx.mirror_file("DataTypes/Colours.yaml");
    let owner = read_node(&plain).key;
    let other = if owner == first.key { second.key } else { first.key };
    let qualified = fx.mirror_file(&format!("DataTypes/Colours_{}.yaml", other));
    assert_eq!(read_node(&qualified).key, other);

    // Re-exporting keeps both files where they are
    let again = handler
        .export_all(None, handler.folder(), handler.settings(), None)
        .unwrap();
    assert!(again.iter().all(|r| r.success));
    assert_eq!(read_node(&plain).key, owner);
    assert_eq!(read_node(&qualified).key, other);

    let (peer, service) = fx.peer(&SyncSettings::default());
    let imported = service.import_all(ImportOptions::default()).unwrap();
    assert!(imported.iter().all(|r| r.success), "{:#?}", imported);
    let mut keys: Vec<_> = peer
        .entities(EntityKind::DataType)
        .iter()
        .map(|e| e.key)
        .collect();
    keys.sort();
    let mut expected = vec![first.key, second.key];
    expected.sort();
    assert_eq!(keys, expected);
}
