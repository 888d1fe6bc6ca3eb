use std::thread;

use tempfile::tempdir;

use crate::corpus::StaticCorpus;
use crate::embedding::{HashEmbedder, SemanticLiteEmbedder};
use crate::testing::{FixtureEmbedder, axis};

use super::*;

struct BrokenCorpus;

impl CorpusLoader for BrokenCorpus {
    fn name(&self) -> &str {
        "broken.csv"
    }

    fn source(&self) -> RegulationSource {
        RegulationSource::PrimaryReference
    }

    fn load(&self) -> Result<Vec<RegulationRecord>> {
        Err(RegcheckError::corpus("broken.csv", "unreadable header"))
    }
}

fn official(text: &str) -> RegulationRecord {
    RegulationRecord::new(text, RegulationSource::OfficialGuideline, "")
}

fn supplementary(text: &str) -> RegulationRecord {
    RegulationRecord::new(text, RegulationSource::Supplementary, "Procedures")
}

#[test]
fn ingest_assigns_source_row_ids() {
    let kb = KnowledgeBase::in_memory(Arc::new(SemanticLiteEmbedder));
    let report = kb.ingest(&[
        official("Inspect reactor coolant pump seals quarterly"),
        supplementary("Record torque values for all flange bolts"),
        official("Qualify welders before pressure boundary repairs"),
    ]);
    assert!(report.is_clean());
    assert_eq!(report.inserted, 3);

    let ids = kb
        .rules(None)
        .expect("rules")
        .into_iter()
        .map(|rule| rule.id)
        .collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec!["official_guideline_0", "official_guideline_1", "supplementary_0"]
    );
}

#[test]
fn ingest_twice_is_idempotent() {
    let kb = KnowledgeBase::in_memory(Arc::new(HashEmbedder));
    let records = vec![
        official("Verify valve stroke times"),
        official("Replace worn gaskets"),
    ];
    let first = kb.ingest(&records);
    let ids_before = kb.rules(None).expect("rules");
    let second = kb.ingest(&records);

    assert_eq!(first.inserted, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped_existing, 2);
    assert_eq!(kb.rules(None).expect("rules"), ids_before);
}

#[test]
fn blank_and_duplicate_rows_are_skipped_without_renumbering() {
    let kb = KnowledgeBase::in_memory(Arc::new(HashEmbedder));
    let report = kb.ingest(&[
        official("Torque bolts to specification"),
        official("   "),
        official("Torque bolts to specification"),
        official("Check lubricant levels"),
    ]);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped_blank, 1);
    assert_eq!(report.skipped_duplicate, 1);

    let ids = kb
        .rules(Some(RegulationSource::OfficialGuideline))
        .expect("rules")
        .into_iter()
        .map(|rule| rule.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["official_guideline_0", "official_guideline_3"]);
}

#[test]
fn failing_source_group_does_not_block_others() {
    let embedder = FixtureEmbedder::new(4)
        .with("Inspect pump", axis(4, 0))
        .failing_on("Bad row")
        .with("Log results", axis(4, 1));
    let kb = KnowledgeBase::in_memory(Arc::new(embedder));

    let report = kb.ingest(&[
        official("Inspect pump"),
        RegulationRecord::new("Bad row", RegulationSource::PrimaryReference, ""),
        supplementary("Log results"),
    ]);

    assert_eq!(report.inserted, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, RegulationSource::PrimaryReference);
    let counts = kb.rule_counts().expect("counts");
    assert_eq!(counts[&RegulationSource::OfficialGuideline], 1);
    assert_eq!(counts[&RegulationSource::PrimaryReference], 0);
    assert_eq!(counts[&RegulationSource::Supplementary], 1);
}

#[test]
fn bootstrap_isolates_failing_corpus() {
    let kb = KnowledgeBase::in_memory(Arc::new(SemanticLiteEmbedder));
    let loaders: Vec<Box<dyn CorpusLoader>> = vec![
        Box::new(BrokenCorpus),
        Box::new(StaticCorpus::new(
            "nrc",
            RegulationSource::OfficialGuideline,
            &[("Perform leak testing after seal replacement", "")],
        )),
    ];

    let report = kb.bootstrap(&loaders);
    assert!(!report.total_failure);
    assert_eq!(report.total_inserted, 1);
    assert_eq!(report.rule_count, 1);
    assert_eq!(report.corpora.len(), 2);
    assert!(report.corpora[0].error.is_some());
    assert_eq!(report.corpora[1].inserted, 1);
}

#[test]
fn bootstrap_with_no_usable_corpus_is_total_failure() {
    let kb = KnowledgeBase::in_memory(Arc::new(SemanticLiteEmbedder));
    let loaders: Vec<Box<dyn CorpusLoader>> = vec![Box::new(BrokenCorpus)];
    let report = kb.bootstrap(&loaders);
    assert!(report.total_failure);
    assert!(kb.is_empty().expect("empty"));
    assert!(kb.fetch_relevant("anything", 5).expect("fetch").is_empty());
}

#[test]
fn empty_knowledge_base_retrieves_nothing_without_embedding() {
    let embedder = Arc::new(FixtureEmbedder::new(3));
    let kb = KnowledgeBase::in_memory(embedder.clone());
    assert!(kb.retrieve("Component: pump", 5).expect("retrieve").is_none());
    assert_eq!(embedder.calls(), 0);
}

#[test]
fn fetch_relevant_returns_rules_with_embeddings_nearest_first() {
    let embedder = FixtureEmbedder::new(3)
        .with("Seal replacement", axis(3, 0))
        .with("Fire watch", axis(3, 1))
        .with("query", vec![0.9, 0.1, 0.0]);
    let kb = KnowledgeBase::in_memory(Arc::new(embedder));
    kb.ingest(&[official("Fire watch"), official("Seal replacement")]);

    let rules = kb.fetch_relevant("query", 1).expect("fetch");
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].text, "Seal replacement");
    assert_eq!(rules[0].embedding.as_vector(), Some(&axis(3, 0)[..]));
}

#[test]
fn persisted_rules_survive_restart_and_stay_idempotent() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("state.db");
    let records = vec![official("Inspect snubbers"), supplementary("Archive work orders")];
    {
        let state = SqliteRegulationStore::open(&path).expect("open");
        let kb = KnowledgeBase::open(state, Arc::new(SemanticLiteEmbedder)).expect("kb");
        assert_eq!(kb.ingest(&records).inserted, 2);
    }

    let state = SqliteRegulationStore::open(&path).expect("reopen");
    let kb = KnowledgeBase::open(state, Arc::new(SemanticLiteEmbedder)).expect("kb");
    assert!(kb.is_persistent());
    assert_eq!(kb.rule_count().expect("count"), 2);
    let again = kb.ingest(&records);
    assert_eq!(again.inserted, 0);
    assert_eq!(again.skipped_existing, 2);
}

#[test]
fn profile_change_discards_persisted_vectors() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("state.db");
    {
        let state = SqliteRegulationStore::open(&path).expect("open");
        let kb = KnowledgeBase::open(state, Arc::new(HashEmbedder)).expect("kb");
        kb.ingest(&[official("Inspect snubbers")]);
    }

    let state = SqliteRegulationStore::open(&path).expect("reopen");
    let kb = KnowledgeBase::open(state.clone(), Arc::new(SemanticLiteEmbedder)).expect("kb");
    assert!(kb.is_empty().expect("empty"));
    assert_eq!(
        state.embedding_profile().expect("profile"),
        Some(SemanticLiteEmbedder.profile())
    );
    assert_eq!(kb.ingest(&[official("Inspect snubbers")]).inserted, 1);
}

#[test]
fn concurrent_readers_see_consistent_results() {
    let kb = Arc::new(KnowledgeBase::in_memory(Arc::new(SemanticLiteEmbedder)));
    kb.ingest(&[
        official("Inspect reactor coolant pump seals"),
        official("Calibrate pressure transmitters"),
        supplementary("Document maintenance in the work order"),
    ]);

    let handles = (0..8)
        .map(|_| {
            let kb = Arc::clone(&kb);
            thread::spawn(move || {
                kb.fetch_relevant("Component: pump\nAction: replace seal", 2)
                    .expect("fetch")
                    .into_iter()
                    .map(|rule| rule.id)
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();
    let results = handles
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .collect::<Vec<_>>();
    assert!(results.iter().all(|ids| ids.len() == 2 && *ids == results[0]));
}

#[test]
fn bootstrap_continues_row_ids_across_corpora_of_one_source() {
    let kb = KnowledgeBase::in_memory(Arc::new(SemanticLiteEmbedder));
    let loaders: Vec<Box<dyn CorpusLoader>> = vec![
        Box::new(StaticCorpus::new(
            "nrc-a",
            RegulationSource::OfficialGuideline,
            &[
                ("Perform leak testing after seal replacement", ""),
                ("Valve stroke testing", ""),
            ],
        )),
        Box::new(StaticCorpus::new(
            "nrc-b",
            RegulationSource::OfficialGuideline,
            &[
                ("Record calibration data", ""),
                ("Use qualified welders for pressure boundary repairs", ""),
                ("Valve stroke testing", ""),
            ],
        )),
    ];

    let report = kb.bootstrap(&loaders);
    assert_eq!(report.total_inserted, 4);
    assert_eq!(report.rule_count, 4);
    assert_eq!(report.corpora[0].inserted, 2);
    assert_eq!(report.corpora[1].loaded, 3);
    assert_eq!(report.corpora[1].inserted, 2);

    let ids = kb
        .rules(Some(RegulationSource::OfficialGuideline))
        .expect("rules")
        .into_iter()
        .map(|rule| (rule.id, rule.text))
        .collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec![
            (
                "official_guideline_0".to_string(),
                "Perform leak testing after seal replacement".to_string()
            ),
            ("official_guideline_1".to_string(), "Valve stroke testing".to_string()),
            ("official_guideline_2".to_string(), "Record calibration data".to_string()),
            (
                "official_guideline_3".to_string(),
                "Use qualified welders for pressure boundary repairs".to_string()
            ),
        ]
    );

    let again = kb.bootstrap(&loaders);
    assert_eq!(again.total_inserted, 0);
    assert_eq!(again.rule_count, 4);
}

#[test]
fn bootstrap_with_poisoned_index_reports_failure() {
    let kb = Arc::new(KnowledgeBase::in_memory(Arc::new(SemanticLiteEmbedder)));
    let poisoner = Arc::clone(&kb);
    let joined = thread::spawn(move || {
        let _guard = poisoner.index.write().expect("write lock");
        panic!("poison the index lock");
    })
    .join();
    assert!(joined.is_err());

    let loaders: Vec<Box<dyn CorpusLoader>> = vec![Box::new(StaticCorpus::new(
        "nrc",
        RegulationSource::OfficialGuideline,
        &[("Perform leak testing after seal replacement", "")],
    ))];
    let report = kb.bootstrap(&loaders);
    assert!(report.total_failure);
    assert_eq!(report.rule_count, 0);
    assert!(
        report.corpora[0]
            .error
            .as_deref()
            .expect("corpus error")
            .contains("lock poisoned")
    );
    assert!(kb.rule_count().is_err());
}
