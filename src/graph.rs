//! Collection graph resolver.
//!
//! Packs form an undirected graph: an edge exists between A and B when A's
//! `linked_packs` contains B's identifier (link mutations keep the reverse
//! edge in sync). Collections are never materialized — components are
//! recomputed on demand by BFS so stored links and derived views cannot
//! diverge. A dangling link identifier is skipped, never an error.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{push_tag, Library, Pack, PackId};

/// Resolve the connected component containing `start`, sorted by added
/// timestamp. The starting pack is always included exactly once, even when
/// the link data contains cycles or duplicate edges. Returns an empty list
/// if `start` is not in the library.
pub fn resolve_component(library: &Library, start: &PackId) -> Vec<Pack> {
    let Some(root) = library.get(start) else {
        return Vec::new();
    };

    let mut seen: HashSet<PackId> = HashSet::new();
    let mut members: Vec<Pack> = Vec::new();
    let mut frontier: VecDeque<PackId> = VecDeque::new();

    seen.insert(root.id.clone());
    members.push(root.clone());
    frontier.extend(root.linked_packs.iter().cloned());

    while let Some(id) = frontier.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        // Dangling reference: tolerated by skipping
        let Some(pack) = library.get(&id) else {
            continue;
        };
        members.push(pack.clone());
        for link in &pack.linked_packs {
            if !seen.contains(link) {
                frontier.push_back(link.clone());
            }
        }
    }

    members.sort_by(|a, b| a.added.cmp(&b.added));
    members
}

/// Idempotently add the symmetric edge pair between `a` and `b`. When either
/// pack already carries a non-empty custom collection name, it is propagated
/// to the other; if both do, `a`'s wins. Returns false when either pack is
/// missing.
pub fn link(library: &mut Library, a: &PackId, b: &PackId) -> bool {
    if a == b || !library.contains(a) || !library.contains(b) {
        return false;
    }

    let name_a = library.get(a).map(|p| p.custom_collection_name.clone()).unwrap_or_default();
    let name_b = library.get(b).map(|p| p.custom_collection_name.clone()).unwrap_or_default();
    let shared_name = if !name_a.is_empty() { name_a } else { name_b };

    if let Some(pa) = library.get_mut(a) {
        if !pa.linked_packs.contains(b) {
            pa.linked_packs.push(b.clone());
        }
        if !shared_name.is_empty() {
            pa.custom_collection_name = shared_name.clone();
        }
        pa.touch();
    }
    if let Some(pb) = library.get_mut(b) {
        if !pb.linked_packs.contains(a) {
            pb.linked_packs.push(a.clone());
        }
        if !shared_name.is_empty() {
            pb.custom_collection_name = shared_name;
        }
        pb.touch();
    }
    true
}

/// Remove only the specific edge pair between `a` and `b`; other members of
/// either component are untouched.
pub fn unlink(library: &mut Library, a: &PackId, b: &PackId) {
    if let Some(pa) = library.get_mut(a) {
        pa.linked_packs.retain(|id| id != b);
        pa.touch();
    }
    if let Some(pb) = library.get_mut(b) {
        pb.linked_packs.retain(|id| id != a);
        pb.touch();
    }
}

/// Detach `id` from whatever component it belongs to: strip it from every
/// other pack's link list and clear its own link and collection fields.
/// Sibling links between the remaining members are preserved.
pub fn remove_member(library: &mut Library, id: &PackId) {
    for pack in library.packs.iter_mut() {
        if &pack.id == id {
            continue;
        }
        if pack.linked_packs.contains(id) {
            pack.linked_packs.retain(|l| l != id);
            pack.touch();
        }
    }
    if let Some(pack) = library.get_mut(id) {
        pack.linked_packs.clear();
        pack.custom_collection_name.clear();
        pack.custom_collection_cover.clear();
        pack.custom_collection_tags.clear();
        pack.touch();
    }
}

/// Full reset of a component: clears the entire link list and the custom
/// collection name/cover/tags on every member simultaneously.
pub fn disband(library: &mut Library, member_ids: &[PackId]) {
    for id in member_ids {
        if let Some(pack) = library.get_mut(id) {
            pack.linked_packs.clear();
            pack.custom_collection_name.clear();
            pack.custom_collection_cover.clear();
            pack.custom_collection_tags.clear();
            pack.touch();
        }
    }
}

/// Read-only aggregate view synthesized from a component of size > 1
#[derive(Debug, Clone, Serialize)]
pub struct VirtualFolder {
    /// First non-empty custom name among members, else "{root} Collection"
    pub name: String,
    /// Sum of member item counts
    pub count: usize,
    pub pack_count: usize,
    /// First non-empty custom cover among members
    pub thumbnail_path: String,
    /// Logical OR across members
    pub is_favorite: bool,
    pub added: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Member identifiers in component (added-date) order
    pub member_ids: Vec<PackId>,
    /// Collection tags from the component root
    pub tags: Vec<String>,
}

impl VirtualFolder {
    /// Synthesize the aggregate from a resolved component. `members` must be
    /// non-empty and in component order (root first).
    pub fn synthesize(members: &[Pack]) -> Self {
        let root = &members[0];

        let custom_name = members
            .iter()
            .map(|p| p.custom_collection_name.as_str())
            .find(|n| !n.is_empty())
            .unwrap_or_default();
        let name = if custom_name.is_empty() {
            format!("{} Collection", root.name)
        } else {
            custom_name.to_string()
        };

        let thumbnail_path = members
            .iter()
            .map(|p| p.custom_collection_cover.as_str())
            .find(|c| !c.is_empty())
            .unwrap_or_default()
            .to_string();

        let mut tags = Vec::new();
        for tag in &root.custom_collection_tags {
            push_tag(&mut tags, tag.clone());
        }

        Self {
            name,
            count: members.iter().map(|p| p.item_count()).sum(),
            pack_count: members.len(),
            thumbnail_path,
            is_favorite: members.iter().any(|p| p.is_favorite),
            added: root.added,
            updated: root.updated,
            member_ids: members.iter().map(|p| p.id.clone()).collect(),
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Item, Pack};
    use chrono::Duration;

    fn pack(id: &str, items: usize) -> Pack {
        let items = (0..items).map(|i| Item::new(format!("f{}", i), None)).collect();
        Pack::new(PackId::from(id), id.to_uppercase(), items)
    }

    fn library(packs: Vec<Pack>) -> Library {
        let mut lib = Library::new();
        // Stagger added timestamps so sort order is deterministic
        for (i, mut p) in packs.into_iter().enumerate() {
            p.added -= Duration::seconds(100 - i as i64);
            lib.insert(p);
        }
        lib
    }

    #[test]
    fn test_link_is_symmetric_and_idempotent() {
        let mut lib = library(vec![pack("a", 3), pack("b", 2)]);
        let (a, b) = (PackId::from("a"), PackId::from("b"));

        assert!(link(&mut lib, &a, &b));
        assert!(link(&mut lib, &a, &b));
        assert!(link(&mut lib, &b, &a));

        assert_eq!(lib.get(&a).unwrap().linked_packs, vec![b.clone()]);
        assert_eq!(lib.get(&b).unwrap().linked_packs, vec![a.clone()]);
    }

    #[test]
    fn test_link_rejects_self_and_missing() {
        let mut lib = library(vec![pack("a", 1)]);
        let a = PackId::from("a");
        assert!(!link(&mut lib, &a, &a));
        assert!(!link(&mut lib, &a, &PackId::from("ghost")));
        assert!(lib.get(&a).unwrap().linked_packs.is_empty());
    }

    #[test]
    fn test_link_propagates_first_custom_name() {
        let mut lib = library(vec![pack("a", 1), pack("b", 1)]);
        lib.get_mut(&PackId::from("a")).unwrap().custom_collection_name = "Faves".to_string();
        lib.get_mut(&PackId::from("b")).unwrap().custom_collection_name = "Other".to_string();

        link(&mut lib, &PackId::from("a"), &PackId::from("b"));

        // First argument's name wins deterministically
        assert_eq!(lib.get(&PackId::from("a")).unwrap().custom_collection_name, "Faves");
        assert_eq!(lib.get(&PackId::from("b")).unwrap().custom_collection_name, "Faves");
    }

    #[test]
    fn test_resolve_component_self_inclusion_with_cycles() {
        let mut lib = library(vec![pack("a", 1), pack("b", 1), pack("c", 1)]);
        let (a, b, c) = (PackId::from("a"), PackId::from("b"), PackId::from("c"));
        link(&mut lib, &a, &b);
        link(&mut lib, &b, &c);
        link(&mut lib, &c, &a);
        // Inject a duplicate edge directly
        lib.get_mut(&a).unwrap().linked_packs.push(b.clone());

        let component = resolve_component(&lib, &a);
        let ids: Vec<_> = component.iter().map(|p| p.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(component.iter().filter(|p| p.id == a).count(), 1);
    }

    #[test]
    fn test_resolve_component_skips_dangling() {
        let mut lib = library(vec![pack("a", 1), pack("b", 1)]);
        let (a, b) = (PackId::from("a"), PackId::from("b"));
        link(&mut lib, &a, &b);
        lib.get_mut(&a).unwrap().linked_packs.push(PackId::from("deleted"));

        let component = resolve_component(&lib, &a);
        assert_eq!(component.len(), 2);
    }

    #[test]
    fn test_resolve_component_sorted_by_added() {
        let mut lib = library(vec![pack("newer", 1), pack("older", 1)]);
        lib.get_mut(&PackId::from("older")).unwrap().added -= Duration::days(10);
        link(&mut lib, &PackId::from("newer"), &PackId::from("older"));

        let component = resolve_component(&lib, &PackId::from("newer"));
        assert_eq!(component[0].id.as_str(), "older");
        assert_eq!(component[1].id.as_str(), "newer");
    }

    #[test]
    fn test_unlink_removes_only_that_edge() {
        let mut lib = library(vec![pack("a", 1), pack("b", 1), pack("c", 1)]);
        let (a, b, c) = (PackId::from("a"), PackId::from("b"), PackId::from("c"));
        link(&mut lib, &a, &b);
        link(&mut lib, &b, &c);

        unlink(&mut lib, &a, &b);

        assert!(lib.get(&a).unwrap().linked_packs.is_empty());
        assert_eq!(lib.get(&b).unwrap().linked_packs, vec![c.clone()]);
        assert_eq!(lib.get(&c).unwrap().linked_packs, vec![b]);
    }

    #[test]
    fn test_remove_member_preserves_sibling_edges() {
        let mut lib = library(vec![pack("a", 1), pack("b", 1), pack("c", 1)]);
        let (a, b, c) = (PackId::from("a"), PackId::from("b"), PackId::from("c"));
        link(&mut lib, &a, &b);
        link(&mut lib, &b, &c);
        link(&mut lib, &a, &c);
        lib.get_mut(&b).unwrap().custom_collection_name = "Trio".to_string();

        remove_member(&mut lib, &b);

        assert!(lib.get(&b).unwrap().linked_packs.is_empty());
        assert_eq!(lib.get(&b).unwrap().custom_collection_name, "");
        // a—c edge survives
        assert_eq!(lib.get(&a).unwrap().linked_packs, vec![c.clone()]);
        assert_eq!(lib.get(&c).unwrap().linked_packs, vec![a]);
    }

    #[test]
    fn test_disband_clears_all_members() {
        let mut lib = library(vec![pack("a", 1), pack("b", 1), pack("c", 1)]);
        let (a, b, c) = (PackId::from("a"), PackId::from("b"), PackId::from("c"));
        link(&mut lib, &a, &b);
        link(&mut lib, &b, &c);
        lib.get_mut(&a).unwrap().custom_collection_name = "Trio".to_string();
        lib.get_mut(&a).unwrap().custom_collection_cover = "/cover.png".to_string();
        lib.get_mut(&a).unwrap().custom_collection_tags.push("fun".to_string());

        let ids: Vec<_> = resolve_component(&lib, &a).iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        disband(&mut lib, &ids);

        for id in [&a, &b, &c] {
            let p = lib.get(id).unwrap();
            assert!(p.linked_packs.is_empty());
            assert_eq!(p.custom_collection_name, "");
            assert_eq!(p.custom_collection_cover, "");
            assert!(p.custom_collection_tags.is_empty());
        }
    }

    #[test]
    fn test_synthesize_virtual_folder() {
        let mut lib = library(vec![pack("a", 3), pack("b", 2)]);
        let (a, b) = (PackId::from("a"), PackId::from("b"));
        link(&mut lib, &a, &b);
        lib.get_mut(&b).unwrap().is_favorite = true;

        let component = resolve_component(&lib, &a);
        let folder = VirtualFolder::synthesize(&component);

        assert_eq!(folder.name, "A Collection");
        assert_eq!(folder.count, 5);
        assert_eq!(folder.pack_count, 2);
        assert!(folder.is_favorite);
        assert_eq!(folder.member_ids, vec![a, b]);
    }

    #[test]
    fn test_synthesize_uses_custom_name_and_cover() {
        let mut lib = library(vec![pack("a", 1), pack("b", 1)]);
        let (a, b) = (PackId::from("a"), PackId::from("b"));
        link(&mut lib, &a, &b);
        lib.get_mut(&b).unwrap().custom_collection_cover = "/covers/b.webp".to_string();
        lib.get_mut(&a).unwrap().custom_collection_name = "My Stuff".to_string();

        let folder = VirtualFolder::synthesize(&resolve_component(&lib, &a));
        assert_eq!(folder.name, "My Stuff");
        assert_eq!(folder.thumbnail_path, "/covers/b.webp");
    }
}
