use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use behavior_tree::builder::{action, inverter, random_sequence, selector, sequence, succeeder};
use behavior_tree::{
    BehaviorTree, Blackboard, Blueprint, EventKind, NodeId, NodeState, Task, TreeConfig,
};

type Log = Rc<RefCell<Vec<&'static str>>>;

fn step(log: &Log, name: &'static str, succeed: bool) -> Blueprint {
    let log = Rc::clone(log);
    action(
        name,
        Task::instant(move |_| {
            log.borrow_mut().push(name);
            succeed
        }),
    )
}

/// Collect the results `node` stops with.
fn results(tree: &mut BehaviorTree, node: NodeId) -> Rc<RefCell<Vec<bool>>> {
    let results = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&results);
    tree.subscribe(node, move |event| {
        if let EventKind::Stopped { success, .. } = event.kind {
            sink.borrow_mut().push(success);
        }
    })
    .unwrap();
    results
}

fn run(blueprint: Blueprint, ticks: usize) -> (BehaviorTree, Rc<RefCell<Vec<bool>>>) {
    let mut tree = BehaviorTree::from_blueprint("Root", blueprint, TreeConfig::default()).unwrap();
    let top = tree.children(NodeId::ROOT)[0];
    let results = results(&mut tree, top);
    let mut board = Blackboard::new();
    tree.start(&mut board);
    for _ in 0..ticks {
        tree.tick(0.1, &mut board).unwrap();
    }
    (tree, results)
}

#[test]
fn sequence_runs_children_in_order_and_succeeds() {
    let log = Log::default();
    let (_, results) = run(
        sequence(vec![
            step(&log, "A", true),
            step(&log, "B", true),
            step(&log, "C", true),
        ]),
        2,
    );
    assert_eq!(*log.borrow(), vec!["A", "B", "C"]);
    assert_eq!(*results.borrow(), vec![true]);
}

#[test]
fn sequence_fails_fast() {
    let log = Log::default();
    let (tree, results) = run(
        sequence(vec![
            step(&log, "A", true),
            step(&log, "B", false),
            step(&log, "C", true),
        ]),
        2,
    );
    assert_eq!(*log.borrow(), vec!["A", "B"]);
    assert_eq!(*results.borrow(), vec![false]);
    assert_eq!(tree.state(tree.find("C").unwrap()), NodeState::Inactive);
}

#[test]
fn selector_stops_at_first_success() {
    let log = Log::default();
    let (_, results) = run(
        selector(vec![
            step(&log, "A", false),
            step(&log, "B", false),
            step(&log, "C", true),
        ]),
        2,
    );
    assert_eq!(*log.borrow(), vec!["A", "B", "C"]);
    assert_eq!(*results.borrow(), vec![true]);
}

#[test]
fn selector_fails_when_every_child_fails() {
    let log = Log::default();
    let (_, results) = run(
        selector(vec![step(&log, "A", false), step(&log, "B", false)]),
        2,
    );
    assert_eq!(*log.borrow(), vec!["A", "B"]);
    assert_eq!(*results.borrow(), vec![false]);
}

#[test]
fn empty_composites_stop_with_their_exhausted_result() {
    let (_, results) = run(sequence(vec![]), 2);
    assert_eq!(*results.borrow(), vec![true]);

    let (_, results) = run(selector(vec![]), 2);
    assert_eq!(*results.borrow(), vec![false]);
}

#[test]
fn random_sequence_reaches_every_permutation() {
    let log = Log::default();
    // One full activation every two ticks.
    let (tree, results) = run(
        random_sequence(vec![
            step(&log, "A", true),
            step(&log, "B", true),
            step(&log, "C", true),
        ]),
        240,
    );

    let log = log.borrow();
    assert_eq!(results.borrow().len(), 120);
    let mut seen = BTreeSet::new();
    for activation in log.chunks(3) {
        let mut sorted = activation.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec!["A", "B", "C"]);
        seen.insert(activation.to_vec());
    }
    assert_eq!(seen.len(), 6);

    // The canonical child list is never reordered.
    let top = tree.children(NodeId::ROOT)[0];
    let names: Vec<_> = tree
        .children(top)
        .iter()
        .map(|&id| tree.node(id).unwrap().name())
        .collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}

#[test]
fn random_order_is_reproducible_for_a_seed() {
    let orders = |seed: u64| {
        let log = Log::default();
        let mut tree = BehaviorTree::from_blueprint(
            "Root",
            random_sequence(vec![
                step(&log, "A", true),
                step(&log, "B", true),
                step(&log, "C", true),
                step(&log, "D", true),
            ]),
            TreeConfig::with_seed(seed),
        )
        .unwrap();
        let mut board = Blackboard::new();
        tree.start(&mut board);
        for _ in 0..20 {
            tree.tick(0.1, &mut board).unwrap();
        }
        log.borrow().clone()
    };
    assert_eq!(orders(11), orders(11));
}

#[test]
fn inverter_and_succeeder_rewrite_the_result() {
    let log = Log::default();
    let (_, results) = run(inverter(step(&log, "A", false)), 1);
    assert_eq!(*results.borrow(), vec![true]);

    let (_, results) = run(inverter(step(&log, "B", true)), 1);
    assert_eq!(*results.borrow(), vec![false]);

    let (_, results) = run(succeeder(step(&log, "C", false)), 1);
    assert_eq!(*results.borrow(), vec![true]);
    assert_eq!(*log.borrow(), vec!["A", "B", "C"]);
}
