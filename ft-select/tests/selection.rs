use std::fs;

use assertables::*;
use ft_core::testutils::*;
use ft_core::BidirectionalTrace;
use ft_select::io::{
    to_msgpack,
    METADATA_FILE,
    SELECTED_TRACES_FILE,
};
use ft_select::{
    run,
    SelectionConfig,
};
use rstest::*;

fn candidates() -> Vec<BidirectionalTrace> {
    (0..6)
        .flat_map(|i| {
            let flow = tcp_flow("A", 40000 + i, 443);
            [accepted(&flow, &["A", "B"]), denied(&flow, &["A"])]
        })
        .collect()
}

#[rstest]
fn test_run_selects_and_writes() {
    let dir = tempfile::tempdir().unwrap();
    let traces = candidates();
    let json_input = dir.path().join("first.json");
    fs::write(&json_input, serde_json::to_vec(&traces[..8]).unwrap()).unwrap();
    let msgpack_input = dir.path().join("second.msgpack");
    // overlaps the first file by two traces
    fs::write(&msgpack_input, to_msgpack(&traces[6..]).unwrap()).unwrap();

    let config = SelectionConfig {
        inputs: vec![json_input, msgpack_input],
        max_traces: 4,
        output_dir: dir.path().join("runs"),
    };
    let outcome = run(&config).unwrap();

    assert_eq!(outcome.loaded, 14);
    assert_eq!(outcome.distinct_keys, 12);
    assert_eq!(outcome.selected.len(), 4);
    // one trace per forward flow before any flow repeats
    let expected: Vec<_> = traces.iter().step_by(2).take(4).cloned().collect();
    assert_eq!(outcome.selected, expected);

    let written: Vec<BidirectionalTrace> =
        serde_json::from_slice(&fs::read(outcome.output_dir.join(SELECTED_TRACES_FILE)).unwrap()).unwrap();
    assert_eq!(written, outcome.selected);
    assert_ok!(fs::metadata(outcome.output_dir.join(METADATA_FILE)));
}

#[rstest]
fn test_run_keeps_everything_under_bound() {
    let dir = tempfile::tempdir().unwrap();
    let traces = candidates();
    let input = dir.path().join("traces.json");
    fs::write(&input, serde_json::to_vec(&traces).unwrap()).unwrap();

    let config = SelectionConfig { inputs: vec![input], max_traces: 100, output_dir: dir.path().join("runs") };
    assert_eq!(run(&config).unwrap().selected, traces);
}

#[rstest]
fn test_run_fails_on_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = SelectionConfig {
        inputs: vec![dir.path().join("nope.json")],
        max_traces: 10,
        output_dir: dir.path().join("runs"),
    };
    assert_err!(run(&config));
}
