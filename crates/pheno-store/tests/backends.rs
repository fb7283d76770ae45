//! Both backends must agree on commit, count and query behaviour.

use chrono::NaiveDate;
use pheno_model::{
    CanonicalEvent, ExtractionKey, FieldId, Literal, Operator, Predicate, sentinel_date,
};
use pheno_store::{
    CommitBatch, EventStore, MemoryEventStore, SqliteEventStore, StoreError, install_schema,
};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sample() -> Vec<CanonicalEvent> {
    vec![
        CanonicalEvent::new(1, "asthma", FieldId::new(41202), "J45", ymd(2010, 5, 1)),
        CanonicalEvent::new(2, "asthma", FieldId::new(41202), "J46", sentinel_date()),
        CanonicalEvent::new(1, "asthma", FieldId::new(42040), "H33..", ymd(2001, 2, 3)),
        CanonicalEvent::new(3, "HighLDL_serum", FieldId::new(42040), "44P6.", ymd(2005, 1, 1))
            .with_data_value(Some(3.9)),
    ]
}

fn keys() -> Vec<ExtractionKey> {
    vec![
        ExtractionKey::new("asthma", FieldId::new(41202)),
        ExtractionKey::new("asthma", FieldId::new(42040)),
        ExtractionKey::new("HighLDL_serum", FieldId::new(42040)),
    ]
}

fn sqlite() -> SqliteEventStore {
    let store = SqliteEventStore::open_in_memory().unwrap().with_chunk_size(2);
    store.install_schema().unwrap();
    store
}

fn exercise(store: &mut dyn EventStore) {
    let first = store
        .commit(&CommitBatch {
            keys: keys(),
            events: sample(),
            replace: false,
        })
        .unwrap();
    assert_eq!((first.deleted, first.inserted), (0, 4));

    let asthma_hospital = ExtractionKey::new("asthma", FieldId::new(41202));
    assert_eq!(store.count(&asthma_hospital).unwrap(), 2);
    assert_eq!(
        store
            .extracted_phenotypes(FieldId::new(42040))
            .unwrap()
            .into_iter()
            .collect::<Vec<_>>(),
        vec!["HighLDL_serum".to_string(), "asthma".to_string()]
    );

    let replaced = store
        .commit(&CommitBatch {
            keys: vec![asthma_hospital.clone()],
            events: sample()[..1].to_vec(),
            replace: true,
        })
        .unwrap();
    assert_eq!((replaced.deleted, replaced.inserted), (2, 1));
    assert_eq!(store.count(&asthma_hospital).unwrap(), 1);

    let found = store
        .events(&[
            Predicate::in_list("phenotype", ["asthma", "HighLDL_serum"]),
            Predicate::equals("field_id", FieldId::new(42040)),
        ])
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].field_value, "H33..");
    assert_eq!(found[1].data_value, Some(3.9));

    let by_prefix = store
        .events(&[Predicate::starts_with_any("field_value", ["J4"])])
        .unwrap();
    assert_eq!(by_prefix, sample()[..1].to_vec());

    let blank_prefix = Predicate {
        column: "field_value".to_string(),
        operator: Operator::StartsWithAny,
        values: vec![Literal::Text(String::new())],
    };
    assert!(store.events(&[blank_prefix]).unwrap().is_empty());
    assert!(
        store
            .events(&[Predicate::starts_with_any("field_value", [""])])
            .unwrap()
            .is_empty()
    );

    let measured = store.events(&[Predicate::not_null("data_value")]).unwrap();
    assert_eq!(measured.len(), 1);
    assert_eq!(measured[0].eid, 3);

    assert!(matches!(
        store.events(&[Predicate::equals("nope", 1i64)]),
        Err(StoreError::InvalidColumn(_))
    ));
}

#[test]
fn sqlite_backend() {
    let mut store = sqlite();
    exercise(&mut store);
}

#[test]
fn memory_backend() {
    let mut store = MemoryEventStore::new();
    exercise(&mut store);
    assert_eq!(store.len(), 3);
}

#[test]
fn sqlite_round_trips_sentinel_dates() {
    let mut store = sqlite();
    store
        .commit(&CommitBatch {
            keys: keys(),
            events: sample(),
            replace: false,
        })
        .unwrap();
    let all = store.events(&[]).unwrap();
    assert_eq!(all, sample());
    assert!(all[1].is_undated());
}

#[test]
fn file_database_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.db");
    {
        let mut store = SqliteEventStore::open(&path).unwrap();
        install_schema(store.connection()).unwrap();
        store
            .commit(&CommitBatch {
                keys: keys(),
                events: sample(),
                replace: false,
            })
            .unwrap();
    }
    let store = SqliteEventStore::open(&path).unwrap();
    assert_eq!(store.events(&[]).unwrap().len(), 4);
}

#[test]
fn missing_schema_surfaces_sqlite_error() {
    let store = SqliteEventStore::open_in_memory().unwrap();
    let err = store
        .count(&ExtractionKey::new("asthma", FieldId::new(41202)))
        .unwrap_err();
    assert!(matches!(err, StoreError::Sqlite(_)));
}
