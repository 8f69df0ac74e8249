//! End-to-end collection scenarios through the library controller:
//! linking, folder visibility, disband and removal cascades.

use packstash::config::Paths;
use packstash::domain::{Item, Library, Pack, PackId};
use packstash::library::{Entry, FilterOptions, LibraryController, ViewMode};
use packstash::store::Store;
use tempfile::TempDir;

async fn controller_with(packs: Vec<Pack>) -> (LibraryController, TempDir) {
    let temp = TempDir::new().unwrap();
    let store = Store::new(&Paths::at(temp.path()));
    let mut library = Library::new();
    for p in packs {
        library.insert(p);
    }
    store.save_library(&library).await.unwrap();
    (LibraryController::load(store).await, temp)
}

fn pack(id: &str, items: usize) -> Pack {
    let items = (0..items)
        .map(|i| Item::new(format!("{}_{}", id, i), None))
        .collect();
    Pack::new(PackId::from(id), id.to_uppercase(), items)
}

fn id(s: &str) -> PackId {
    PackId::from(s)
}

async fn library_names(controller: &LibraryController) -> Vec<String> {
    let page = controller
        .view(&ViewMode::Library, &FilterOptions::default())
        .await;
    page.entries.iter().map(|e| e.name().to_string()).collect()
}

#[tokio::test]
async fn test_linked_packs_fold_into_one_folder() {
    let (ctl, _temp) = controller_with(vec![pack("a", 2), pack("b", 3), pack("c", 1)]).await;
    ctl.link_packs(&id("a"), &id("b")).await.unwrap();

    let page = ctl
        .view(&ViewMode::Library, &FilterOptions::default())
        .await;
    assert_eq!(page.entries.len(), 2);

    let folder = page
        .entries
        .iter()
        .find_map(|e| match e {
            Entry::Folder(f) => Some(f),
            _ => None,
        })
        .expect("linked packs should appear as a folder");
    assert_eq!(folder.pack_count, 2);
    assert_eq!(folder.count, 5);
    assert_eq!(folder.name, "A Collection");
}

#[tokio::test]
async fn test_link_is_symmetric_in_the_document() {
    let (ctl, _temp) = controller_with(vec![pack("a", 1), pack("b", 1)]).await;
    ctl.link_packs(&id("a"), &id("b")).await.unwrap();

    let library = ctl.library();
    let library = library.read().await;
    assert!(library.get(&id("a")).unwrap().is_linked_to(&id("b")));
    assert!(library.get(&id("b")).unwrap().is_linked_to(&id("a")));
}

#[tokio::test]
async fn test_transitive_links_form_one_component() {
    let (ctl, _temp) = controller_with(vec![pack("a", 1), pack("b", 1), pack("c", 1)]).await;
    ctl.link_packs(&id("a"), &id("b")).await.unwrap();
    ctl.link_packs(&id("b"), &id("c")).await.unwrap();

    // a and c are not directly linked but share the component
    let page = ctl
        .view(&ViewMode::Collection(id("a")), &FilterOptions::default())
        .await;
    assert_eq!(page.total, 3);

    let page = ctl
        .view(&ViewMode::Collection(id("c")), &FilterOptions::default())
        .await;
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn test_collection_name_propagates_and_survives_new_links() {
    let (ctl, _temp) = controller_with(vec![pack("a", 1), pack("b", 1), pack("c", 1)]).await;
    ctl.link_packs(&id("a"), &id("b")).await.unwrap();
    ctl.rename_collection(&id("a"), "Favorites Bundle").await.unwrap();
    ctl.link_packs(&id("a"), &id("c")).await.unwrap();

    let library = ctl.library();
    let library = library.read().await;
    for key in ["a", "b", "c"] {
        assert_eq!(
            library.get(&id(key)).unwrap().custom_collection_name,
            "Favorites Bundle",
            "member {} should carry the collection name",
            key
        );
    }
}

#[tokio::test]
async fn test_disband_clears_every_member() {
    let (ctl, _temp) = controller_with(vec![pack("a", 1), pack("b", 1), pack("c", 1)]).await;
    ctl.link_packs(&id("a"), &id("b")).await.unwrap();
    ctl.link_packs(&id("b"), &id("c")).await.unwrap();
    ctl.rename_collection(&id("a"), "Bundle").await.unwrap();

    let cleared = ctl.disband_collection(&id("b")).await.unwrap();
    assert_eq!(cleared, 3);

    let library = ctl.library();
    let library = library.read().await;
    for key in ["a", "b", "c"] {
        let p = library.get(&id(key)).unwrap();
        assert!(p.linked_packs.is_empty());
        assert_eq!(p.custom_collection_name, "");
    }
    drop(library);

    // All three show up as standalone packs again
    assert_eq!(library_names(&ctl).await.len(), 3);
}

#[tokio::test]
async fn test_removing_member_preserves_sibling_links() {
    let (ctl, _temp) = controller_with(vec![pack("a", 1), pack("b", 1), pack("c", 1)]).await;
    ctl.link_packs(&id("a"), &id("b")).await.unwrap();
    ctl.link_packs(&id("a"), &id("c")).await.unwrap();
    ctl.link_packs(&id("b"), &id("c")).await.unwrap();

    ctl.remove_pack(&id("a")).await.unwrap();

    let library = ctl.library();
    let library = library.read().await;
    assert!(library.get(&id("a")).is_none());
    // b and c keep their direct edge, no dangling references remain
    assert_eq!(library.get(&id("b")).unwrap().linked_packs, vec![id("c")]);
    assert_eq!(library.get(&id("c")).unwrap().linked_packs, vec![id("b")]);
}

#[tokio::test]
async fn test_folder_disappears_when_last_link_removed() {
    let (ctl, _temp) = controller_with(vec![pack("a", 1), pack("b", 1)]).await;
    ctl.link_packs(&id("a"), &id("b")).await.unwrap();

    let page = ctl
        .view(&ViewMode::Library, &FilterOptions::default())
        .await;
    assert!(matches!(page.entries[0], Entry::Folder(_)));

    ctl.unlink_packs(&id("a"), &id("b")).await.unwrap();
    let page = ctl
        .view(&ViewMode::Library, &FilterOptions::default())
        .await;
    assert_eq!(page.entries.len(), 2);
    assert!(page.entries.iter().all(|e| matches!(e, Entry::Pack(_))));
}

#[tokio::test]
async fn test_collection_state_survives_reload() {
    let temp = TempDir::new().unwrap();
    let store = Store::new(&Paths::at(temp.path()));
    {
        let mut library = Library::new();
        library.insert(pack("a", 1));
        library.insert(pack("b", 1));
        store.save_library(&library).await.unwrap();
        let ctl = LibraryController::load(store.clone()).await;
        ctl.link_packs(&id("a"), &id("b")).await.unwrap();
        ctl.rename_collection(&id("a"), "Kept").await.unwrap();
    }

    let ctl = LibraryController::load(Store::new(&Paths::at(temp.path()))).await;
    let page = ctl
        .view(&ViewMode::Library, &FilterOptions::default())
        .await;
    assert_eq!(page.entries.len(), 1);
    match &page.entries[0] {
        Entry::Folder(f) => assert_eq!(f.name, "Kept"),
        other => panic!("expected folder, got {:?}", other),
    }
}

#[tokio::test]
async fn test_self_link_rejected() {
    let (ctl, _temp) = controller_with(vec![pack("a", 1)]).await;
    assert!(ctl.link_packs(&id("a"), &id("a")).await.is_err());

    let library = ctl.library();
    let library = library.read().await;
    assert!(library.get(&id("a")).unwrap().linked_packs.is_empty());
}
