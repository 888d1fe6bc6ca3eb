use tempfile::tempdir;

use crate::models::RegulationRecord;

use super::*;

fn embedded(source: RegulationSource, row: usize, text: &str, vector: Vec<f32>) -> ComplianceRule {
    let record = RegulationRecord::new(text, source, "");
    ComplianceRule::unembedded(source.rule_id(row), &record).with_embedding(vector)
}

#[test]
fn migrate_insert_and_list_in_order() {
    let temp = tempdir().expect("tempdir");
    let store = SqliteRegulationStore::open(temp.path().join("state.db")).expect("open failed");

    let rules = vec![
        embedded(RegulationSource::OfficialGuideline, 0, "Inspect welds", vec![0.5, -0.25]),
        embedded(RegulationSource::Supplementary, 3, "Log torque values", vec![1.0, 0.0]),
    ];
    assert_eq!(store.insert_regulations(&rules).expect("insert"), 2);

    let listed = store.list_regulations().expect("list");
    assert_eq!(listed, rules);
    assert_eq!(listed[0].category, "Nuclear Safety");
    assert_eq!(store.regulation_count().expect("count"), 2);
}

#[test]
fn insert_ignores_existing_ids() {
    let temp = tempdir().expect("tempdir");
    let store = SqliteRegulationStore::open(temp.path().join("state.db")).expect("open failed");

    let first = embedded(RegulationSource::PrimaryReference, 0, "original", vec![1.0]);
    store.insert_regulations(&[first]).expect("first insert");
    let again = embedded(RegulationSource::PrimaryReference, 0, "rewritten", vec![0.0]);
    assert_eq!(store.insert_regulations(&[again]).expect("second insert"), 0);

    let listed = store.list_regulations().expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].text, "original");
}

#[test]
fn insert_rejects_unembedded_rule_without_partial_write() {
    let temp = tempdir().expect("tempdir");
    let store = SqliteRegulationStore::open(temp.path().join("state.db")).expect("open failed");

    let good = embedded(RegulationSource::Supplementary, 0, "ok", vec![1.0]);
    let record = RegulationRecord::new("missing", RegulationSource::Supplementary, "");
    let bad = ComplianceRule::unembedded(RegulationSource::Supplementary.rule_id(1), &record);
    assert!(store.insert_regulations(&[good, bad]).is_err());
    assert_eq!(store.regulation_count().expect("count"), 0);
}

#[test]
fn rules_survive_reopen_and_clear_drops_them() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("state.db");
    {
        let store = SqliteRegulationStore::open(&path).expect("open failed");
        store
            .insert_regulations(&[embedded(RegulationSource::OfficialGuideline, 1, "a", vec![0.1, 0.2])])
            .expect("insert");
    }
    let reopened = SqliteRegulationStore::open(&path).expect("reopen failed");
    assert_eq!(reopened.regulation_count().expect("count"), 1);
    assert_eq!(reopened.clear_regulations().expect("clear"), 1);
    assert!(reopened.list_regulations().expect("list").is_empty());
}

#[test]
fn embedding_profile_round_trips_through_system_kv() {
    let temp = tempdir().expect("tempdir");
    let store = SqliteRegulationStore::open(temp.path().join("state.db")).expect("open failed");
    assert!(store.embedding_profile().expect("empty profile").is_none());

    let profile = EmbeddingProfile {
        provider: "semantic-lite".to_string(),
        vector_version: "semantic-lite-v2".to_string(),
        dim: 64,
    };
    store.set_embedding_profile(&profile).expect("set profile");
    assert_eq!(store.embedding_profile().expect("profile"), Some(profile));

    store.set_system_value("note", "x").expect("set");
    store.set_system_value("note", "y").expect("overwrite");
    assert_eq!(store.get_system_value("note").expect("get").as_deref(), Some("y"));
}

#[test]
fn decode_rejects_truncated_blob() {
    let blob = encode_embedding_blob(&[1.0, 2.0, 3.0]);
    assert!(decode_embedding_blob(&blob[..8], 3).is_err());
    assert_eq!(decode_embedding_blob(&blob, 3).expect("decode"), vec![1.0, 2.0, 3.0]);
}

#[cfg(unix)]
#[test]
fn open_hardens_state_db_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("state.db");
    let store = SqliteRegulationStore::open(&db_path).expect("open failed");
    store
        .insert_regulations(&[embedded(RegulationSource::Supplementary, 0, "x", vec![1.0])])
        .expect("insert");

    let mode = std::fs::metadata(&db_path)
        .expect("metadata")
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600);
}
