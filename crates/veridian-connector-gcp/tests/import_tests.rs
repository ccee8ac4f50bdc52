//! Conversion tests for the binding importer.

use std::collections::HashSet;

use veridian_connector_gcp::config::GcpConfig;
use veridian_connector_gcp::iam::Binding;
use veridian_connector_gcp::import::BindingImporter;
use veridian_connector_gcp::permissions::default_catalog;

fn config() -> GcpConfig {
    GcpConfig::builder().organization_id("123").build().unwrap()
}

/// The three-binding scenario groups into three per-resource-role records
/// with deterministic names.
#[test]
fn test_per_resource_role_grouping_scenario() {
    let config = config();
    let catalog = default_catalog();
    let importer = BindingImporter::new(&config, &catalog);

    let bindings = vec![
        Binding::new("user:u1@x.com", "roles/owner", "project1", "project"),
        Binding::new("group:g1@x.com", "roles/viewer", "project1", "project"),
        Binding::new("group:g1@x.com", "roles/viewer", "project2", "project"),
    ];

    let records = importer.convert(&bindings, &HashSet::new());

    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "project_project1_roles_owner",
            "project_project1_roles_viewer",
            "project_project2_roles_viewer",
        ]
    );
    assert!(records.iter().all(|r| !r.not_internalizable));
}

/// Converting the same input twice yields the same output.
#[test]
fn test_conversion_is_idempotent() {
    let config = config();
    let catalog = default_catalog();
    let importer = BindingImporter::new(&config, &catalog);

    let bindings = vec![
        Binding::new("user:u1@x.com", "roles/owner", "project1", "project"),
        Binding::new("group:g1@x.com", "roles/viewer", "project1", "project"),
        Binding::new("user:u2@x.com", "roles/viewer", "123", "organization"),
    ];
    let managed = HashSet::new();

    let first = importer.convert(&bindings, &managed);
    let second = importer.convert(&bindings, &managed);
    assert_eq!(first, second);
}

/// Users and service accounts land in `users`, groups in `groups`.
#[test]
fn test_membership_partition() {
    let config = config();
    let catalog = default_catalog();
    let importer = BindingImporter::new(&config, &catalog);

    let bindings = vec![
        Binding::new("user:a@x.com", "roles/viewer", "p1", "project"),
        Binding::new(
            "serviceAccount:sa@x.iam.gserviceaccount.com",
            "roles/viewer",
            "p1",
            "project",
        ),
        Binding::new("group:g@x.com", "roles/viewer", "p1", "project"),
    ];

    let records = importer.convert(&bindings, &HashSet::new());

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].who.users,
        vec!["a@x.com", "sa@x.iam.gserviceaccount.com"]
    );
    assert_eq!(records[0].who.groups, vec!["g@x.com"]);
}

/// Unmanaged roles are dropped, or kept as informational when configured.
#[test]
fn test_managed_filtering() {
    let catalog = default_catalog();
    let bindings = vec![Binding::new(
        "user:a@x.com",
        "roles/cloudsql.admin",
        "p1",
        "project",
    )];

    let dropping = config();
    let importer = BindingImporter::new(&dropping, &catalog);
    assert!(importer.convert(&bindings, &HashSet::new()).is_empty());

    let keeping = GcpConfig::builder()
        .organization_id("123")
        .include_unknown_roles(true)
        .build()
        .unwrap();
    let importer = BindingImporter::new(&keeping, &catalog);
    let records = importer.convert(&bindings, &HashSet::new());
    assert_eq!(records.len(), 1);
    assert!(records[0].not_internalizable);
}

/// A record name longer than 128 characters keeps its trailing 128.
#[test]
fn test_long_names_keep_trailing_characters() {
    let config = config();
    let catalog = default_catalog();
    let importer = BindingImporter::new(&config, &catalog);

    let resource = "p".repeat(200);
    let bindings = vec![Binding::new(
        "user:a@x.com",
        "roles/viewer",
        resource.as_str(),
        "project",
    )];

    let records = importer.convert(&bindings, &HashSet::new());
    assert_eq!(records[0].name.len(), 128);
    assert!(records[0].name.ends_with("_roles_viewer"));
    assert_eq!(records[0].external_id, records[0].name);
}

/// Roles configured as grouped-by-identity produce one informational
/// record per member.
#[test]
fn test_group_by_identity_roles() {
    let config = GcpConfig::builder()
        .organization_id("123")
        .group_by_identity_roles_csv("roles/bigquery.jobUser")
        .build()
        .unwrap();
    let catalog = default_catalog();
    let importer = BindingImporter::new(&config, &catalog);

    let bindings = vec![
        Binding::new("user:a@x.com", "roles/bigquery.jobUser", "p1", "project"),
        Binding::new("user:a@x.com", "roles/bigquery.jobUser", "p2", "project"),
        Binding::new("user:b@x.com", "roles/bigquery.jobUser", "p1", "project"),
    ];

    let records = importer.convert(&bindings, &HashSet::new());

    assert_eq!(records.len(), 2);
    let first = records
        .iter()
        .find(|r| r.name == "user_a@x.com")
        .expect("per-identity record for a@x.com");
    assert!(first.not_internalizable);
    assert_eq!(first.what.len(), 2);
    assert_eq!(first.who.users, vec!["a@x.com"]);
}

/// Bindings this process wrote are suppressed, case-insensitively.
#[test]
fn test_own_writes_are_suppressed() {
    let config = config();
    let catalog = default_catalog();
    let importer = BindingImporter::new(&config, &catalog);

    let bindings = vec![
        Binding::new("user:a@x.com", "roles/viewer", "p1", "project"),
        Binding::new("user:b@x.com", "roles/viewer", "p1", "project"),
    ];
    let mut managed = HashSet::new();
    managed.insert(Binding::new("User:A@X.COM", "ROLES/VIEWER", "P1", "Project").key());

    let records = importer.convert(&bindings, &managed);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].who.users, vec!["b@x.com"]);
}

/// Organization-level bindings are rewritten onto the synthetic
/// organization data-source name.
#[test]
fn test_organization_resource_rewrite() {
    let config = config();
    let catalog = default_catalog();
    let importer = BindingImporter::new(&config, &catalog);

    let bindings = vec![Binding::new(
        "user:a@x.com",
        "roles/owner",
        "123",
        "organization",
    )];

    let records = importer.convert(&bindings, &HashSet::new());
    assert_eq!(records[0].what[0].resource, "gcp-org-123");
}

/// Special-group bindings fold into one record per membership kind, with
/// membership resolved from the project's own basic-role bindings.
#[test]
fn test_special_group_records() {
    let config = config();
    let catalog = default_catalog();
    let importer = BindingImporter::new(&config, &catalog);

    let bindings = vec![
        Binding::new("user:o@x.com", "roles/owner", "p1", "project"),
        Binding::new("user:v@x.com", "roles/viewer", "p1", "project"),
        Binding::new(
            "special_group:projectOwners",
            "roles/bigquery.dataOwner",
            "p1",
            "project",
        ),
        Binding::new(
            "special_group:projectViewers",
            "roles/bigquery.dataViewer",
            "p1",
            "project",
        ),
        Binding::new(
            "special_group:projectViewers",
            "roles/bigquery.dataViewer",
            "p2",
            "project",
        ),
    ];

    let records = importer.convert(&bindings, &HashSet::new());

    let owner = records
        .iter()
        .find(|r| r.name == "special_group_owner")
        .expect("owner record");
    assert_eq!(owner.who.users, vec!["o@x.com"]);
    assert!(owner.not_internalizable);

    let viewer = records
        .iter()
        .find(|r| r.name == "special_group_viewer")
        .expect("viewer record");
    assert_eq!(viewer.who.users, vec!["v@x.com"]);
    assert_eq!(viewer.what.len(), 2);
}
