//! Traversal tests for the resource tree walker.

mod common;

use common::FakeGcp;
use veridian_connector_gcp::error::GcpError;
use veridian_connector_gcp::walker::ResourceWalker;

async fn visited(api: &FakeGcp) -> Vec<String> {
    let walker = ResourceWalker::new(api, "123");
    let mut seen = Vec::new();
    walker
        .walk(|node| {
            seen.push(node.entry_name.clone());
            Ok(())
        })
        .await
        .unwrap();
    seen
}

/// Projects of a parent are visited before any subfolder's contents, and
/// a folder's subtree completes before its sibling starts.
#[tokio::test]
async fn test_depth_first_projects_before_folders() {
    let api = FakeGcp::new();
    api.add_project("organizations/123", "p1");
    api.add_project("organizations/123", "p2");
    api.add_folder("organizations/123", "f1");
    api.add_folder("organizations/123", "f3");
    api.add_project("folders/f1", "p3");
    api.add_folder("folders/f1", "f2");
    api.add_project("folders/f2", "p4");
    api.add_project("folders/f3", "p5");

    let seen = visited(&api).await;

    assert_eq!(
        seen,
        vec![
            "organizations/123",
            "projects/p1",
            "projects/p2",
            "folders/f1",
            "projects/p3",
            "folders/f2",
            "projects/p4",
            "folders/f3",
            "projects/p5",
        ]
    );
}

/// Every node is yielded exactly once.
#[tokio::test]
async fn test_nodes_visited_exactly_once() {
    let api = FakeGcp::new();
    api.add_project("organizations/123", "p1");
    api.add_folder("organizations/123", "f1");
    api.add_project("folders/f1", "p2");

    let seen = visited(&api).await;
    let mut deduped = seen.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(seen.len(), deduped.len());
}

/// Pagination within one enumeration is followed to exhaustion.
#[tokio::test]
async fn test_pagination_is_transparent() {
    let mut api = FakeGcp::new();
    api.page_size = 2;
    for i in 0..5 {
        api.add_project("organizations/123", &format!("p{i}"));
    }

    let seen = visited(&api).await;
    assert_eq!(seen.len(), 6); // org + 5 projects
}

/// A denied child enumeration degrades to zero children of that kind.
#[tokio::test]
async fn test_denied_enumeration_degrades_to_empty() {
    let api = FakeGcp::new();
    api.add_project("organizations/123", "p1");
    api.add_folder("organizations/123", "f1");
    api.denied_project_lists
        .lock()
        .unwrap()
        .insert("folders/f1".to_string());
    api.add_project("folders/f1", "hidden");

    let seen = visited(&api).await;
    assert_eq!(
        seen,
        vec!["organizations/123", "projects/p1", "folders/f1"]
    );
}

/// A visit error aborts the whole walk with no partial continuation.
#[tokio::test]
async fn test_visit_error_aborts_walk() {
    let api = FakeGcp::new();
    api.add_project("organizations/123", "p1");
    api.add_project("organizations/123", "p2");

    let walker = ResourceWalker::new(&api, "123");
    let mut count = 0;
    let result = walker
        .walk(|_| {
            count += 1;
            if count == 2 {
                Err(GcpError::Traversal("stop".into()))
            } else {
                Ok(())
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(count, 2);
}

/// A denied organization lookup degrades to the bare id.
#[tokio::test]
async fn test_denied_org_lookup_uses_bare_id() {
    let mut api = FakeGcp::new();
    api.deny_org_lookup = true;

    let walker = ResourceWalker::new(&api, "123");
    let mut names = Vec::new();
    walker
        .walk(|node| {
            names.push(node.display_name.clone());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(names, vec!["123"]);
}

/// The organization display name is taken from the lookup when allowed.
#[tokio::test]
async fn test_org_display_name_from_lookup() {
    let api = FakeGcp::new();

    let walker = ResourceWalker::new(&api, "123");
    let mut names = Vec::new();
    walker
        .walk(|node| {
            names.push(node.display_name.clone());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(names, vec!["Acme"]);
}
