use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use recall_merge::ingest::{load_json_array, load_primary, load_secondary, write_json_array};
use recall_merge::safety::validate_output_path;
use recall_merge::{reconcile, MergeConfig, MergeError};

fn write(dir: &Path, name: &str, value: &Value) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn recalls() -> Value {
    json!([
        {
            "recall_number": "F-0001-2024",
            "recalling_firm": "Acme Foods Inc",
            "product_description": "Peanut Butter Cookies",
            "reason_for_recall": "Undeclared peanuts"
        },
        {
            "recall_number": "F-0002-2024",
            "recalling_firm": "Zeta Dairy LLC",
            "product_description": "Whole milk, 1 gallon",
            "reason_for_recall": "Listeria monocytogenes"
        }
    ])
}

fn announcements() -> Value {
    json!([
        {
            "product_details": {
                "Company Name": "Acme Foods",
                "Product Description": "Product Description: Peanut Butter Cookies",
                "Reason for Announcement": "Contains undeclared peanuts"
            },
            "url": "http://x",
            "company_announcement": "Acme apologizes",
            "product_images": ["http://img1"]
        },
        {
            "product_details": {
                "Company Name": "Harbor Seafood Company",
                "Product Description": "Smoked salmon fillets",
                "Reason for Announcement": "Clostridium botulinum"
            },
            "url": "http://y",
            "company_announcement": "Harbor recalls salmon",
            "product_images": []
        }
    ])
}

#[test]
fn test_file_pipeline_merges_and_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    let primary_path = write(dir.path(), "food_recalls.json", &recalls());
    let secondary_path = write(dir.path(), "food_recall_announcement_photo.json", &announcements());
    let output_path = dir.path().join("merged_food_recalls.json");

    validate_output_path(&output_path, "merged", &[&primary_path, &secondary_path]).unwrap();

    let primary = load_primary(&primary_path, None).unwrap();
    let secondary = load_secondary(&secondary_path, None).unwrap();
    assert_eq!(primary.missing_fields, 0);
    assert_eq!(secondary.missing_fields, 0);

    let outcome = reconcile(&primary.records, &secondary.records, &MergeConfig::default()).unwrap();
    write_json_array(&output_path, &outcome.records).unwrap();

    let written = load_json_array(&output_path, "output").unwrap();
    assert_eq!(written.len(), 2);

    let first = written[0].as_object().unwrap();
    assert_eq!(first["recall_number"], json!("F-0001-2024"));
    assert_eq!(first["fda_announcement_url"], json!("http://x"));
    assert_eq!(first["company_announcement"], json!("Acme apologizes"));
    assert_eq!(first["product_images"], json!(["http://img1"]));

    // Unmatched record comes back exactly as it went in
    assert_eq!(written[1], recalls()[1]);

    assert_eq!(outcome.stats.merged, 1);
    assert_eq!(outcome.stats.unmatched, 1);
    assert_eq!(outcome.stats.unused_secondary, 1);
}

#[test]
fn test_output_keeps_primary_field_order() {
    let dir = tempfile::tempdir().unwrap();
    let primary_path = write(dir.path(), "a.json", &recalls());
    let secondary_path = write(dir.path(), "b.json", &announcements());
    let output_path = dir.path().join("merged.json");

    let primary = load_primary(&primary_path, None).unwrap();
    let secondary = load_secondary(&secondary_path, None).unwrap();
    let outcome = reconcile(&primary.records, &secondary.records, &MergeConfig::default()).unwrap();
    write_json_array(&output_path, &outcome.records).unwrap();

    let text = fs::read_to_string(&output_path).unwrap();
    let recall_number = text.find("\"recall_number\"").unwrap();
    let firm = text.find("\"recalling_firm\"").unwrap();
    let announcement = text.find("\"company_announcement\"").unwrap();
    assert!(recall_number < firm);
    assert!(firm < announcement);
    assert!(text.contains("\n    {\n        \"recall_number\""));
}

#[test]
fn test_secondary_not_an_array_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "b.json", &json!({"product_details": {}}));

    match load_secondary(&path, None) {
        Err(MergeError::MalformedInput { source_name, .. }) => assert_eq!(source_name, "secondary"),
        other => panic!("expected MalformedInput, got {:?}", other.map(|i| i.records.len())),
    }
}

#[test]
fn test_missing_details_degrade_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let primary_path = write(dir.path(), "a.json", &recalls());
    let secondary_path = write(
        dir.path(),
        "b.json",
        &json!([{ "url": "http://z" }, { "product_details": "not an object" }]),
    );

    let primary = load_primary(&primary_path, None).unwrap();
    let secondary = load_secondary(&secondary_path, None).unwrap();
    assert_eq!(secondary.records.len(), 2);
    assert!(secondary.missing_fields >= 2);

    let outcome = reconcile(&primary.records, &secondary.records, &MergeConfig::default()).unwrap();
    assert_eq!(outcome.records.len(), primary.records.len());
    for record in &outcome.records {
        assert!(!record.contains_key("fda_announcement_url"));
    }
}

#[test]
fn test_config_file_limit_truncates_both_sources() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("merge.toml");
    fs::write(&config_path, "record_limit = 1\nmatch_threshold = 75.0\n").unwrap();

    let config = MergeConfig::from_toml_file(&config_path).unwrap();
    let primary_path = write(dir.path(), "a.json", &recalls());
    let secondary_path = write(dir.path(), "b.json", &announcements());
    let primary = load_primary(&primary_path, None).unwrap();
    let secondary = load_secondary(&secondary_path, None).unwrap();

    let outcome = reconcile(&primary.records, &secondary.records, &config).unwrap();
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.stats.secondary_records, 1);
    assert_eq!(outcome.stats.merged, 1);
}

#[test]
fn test_output_may_not_replace_a_source() {
    let dir = tempfile::tempdir().unwrap();
    let source = write(dir.path(), "merged_previous.json", &json!([]));
    assert!(validate_output_path(&source, "merged", &[&source]).is_err());
}
