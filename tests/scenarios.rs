use jstmap::{build, search, IndexConfig, Query, SearchConfig};
use test_case::test_case;

/// Haplotype 0 is the reference `ACGTACGT`, haplotype 1 carries `T -> G` at 4.
fn scenario(error_rate: f64, bins: usize) -> Vec<(usize, usize, usize)> {
    let built = build(
        b"ACGTACGT",
        &[b"ACGTACGT", b"ACGTGCGT"],
        &IndexConfig::default()
            .with_window_length(3)
            .with_slots(512)
            .with_context_length(16)
            .with_bin_count(bins),
    )
    .unwrap();
    assert!(built.failures.is_empty());
    let report = search(
        &[Query::new(0, "TACG")],
        &built.store,
        &built.index,
        &SearchConfig::default().with_error_rate(error_rate),
    )
    .unwrap();
    report
        .matches
        .iter()
        .map(|m| (m.haplotype_id, m.position, m.distance))
        .collect()
}

#[test_case(1 ; "single bin")]
#[test_case(2 ; "two bins")]
#[test_case(4 ; "four bins")]
fn exact_search_finds_only_the_reference_copy(bins: usize) {
    assert_eq!(scenario(0.0, bins), vec![(0, 7, 0)]);
}

#[test]
fn exact_position_is_the_match_end() {
    let built = build(
        b"ACGTACGT",
        &[b"ACGTACGT"],
        &IndexConfig::default().with_window_length(3).with_slots(512),
    )
    .unwrap();
    let query = b"TACG";
    let report = search(
        &[Query::new(0, query.to_vec())],
        &built.store,
        &built.index,
        &SearchConfig::default(),
    )
    .unwrap();
    assert_eq!(report.matches.len(), 1);
    let hit = report.matches[0];
    assert_eq!((hit.position, hit.reference_position), (7, 6));

    let haplotype = jstmap::sequence::decode(&built.store.sequence_at(0).unwrap().to_vec());
    assert_eq!(&haplotype[hit.position - query.len()..hit.position], query);
}

#[test_case(1 ; "single bin")]
#[test_case(3 ; "three bins")]
fn one_edit_reaches_the_variant(bins: usize) {
    let hits = scenario(0.25, bins);
    assert!(hits.contains(&(0, 7, 0)));
    assert!(hits.contains(&(1, 8, 1)));
    assert!(hits.iter().filter(|h| h.0 == 1).all(|h| h.2 == 1));
}

#[test_case(0.0, 0 ; "no errors")]
#[test_case(0.24, 0 ; "rounds down")]
#[test_case(0.25, 1 ; "one error")]
#[test_case(0.5, 2 ; "two errors")]
fn error_budget_floors(error_rate: f64, budget: usize) {
    assert_eq!(SearchConfig::default().with_error_rate(error_rate).error_budget(4), budget);
}
