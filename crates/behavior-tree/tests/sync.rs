use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use behavior_tree::builder::{
    action, inverter, observer, random_selector, selector, sequence, wait_for_condition,
};
use behavior_tree::{
    AbortRule, ActionResult, BehaviorTree, Blackboard, BlackboardCondition, Blueprint, NodeId,
    NodeState, Task, TreeConfig,
};
use proptest::prelude::*;

fn endless(name: &str) -> Blueprint {
    action(
        name,
        Task::cancellable(|_, cancel| {
            if cancel {
                ActionResult::Failed
            } else {
                ActionResult::Progress
            }
        }),
    )
}

/// A tree touching every node kind.
fn camp_tree() -> BehaviorTree {
    BehaviorTree::from_blueprint(
        "Camp",
        selector(vec![
            observer(
                BlackboardCondition::is_set("enemy"),
                AbortRule::LowerPriorityRestart,
                sequence(vec![endless("Aim"), endless("Shoot")]).named("Combat"),
            )
            .named("Alert"),
            observer(
                BlackboardCondition::is_set("noise"),
                AbortRule::Both,
                sequence(vec![
                    endless("Look"),
                    wait_for_condition(
                        |board: &Blackboard| board.is_set("footsteps"),
                        1.0,
                        0.0,
                        endless("Listen"),
                    ),
                ])
                .named("Search"),
            )
            .named("Curious"),
            random_selector(vec![endless("Sit"), inverter(endless("Stand"))]).named("Idle"),
        ])
        .named("Top"),
        TreeConfig::default(),
    )
    .unwrap()
}

fn wanted_set(tree: &BehaviorTree, targets: &[NodeId]) -> BTreeSet<NodeId> {
    let mut wanted = BTreeSet::new();
    for &target in targets {
        wanted.insert(target);
        let mut current = tree.parent(target);
        while let Some(id) = current {
            wanted.insert(id);
            current = tree.parent(id);
        }
    }
    wanted
}

fn under_a_target(tree: &BehaviorTree, id: NodeId, targets: &[NodeId]) -> bool {
    let mut current = tree.parent(id);
    while let Some(ancestor) = current {
        if targets.contains(&ancestor) {
            return true;
        }
        current = tree.parent(ancestor);
    }
    false
}

fn count_events(tree: &mut BehaviorTree) -> Rc<RefCell<usize>> {
    let events = Rc::new(RefCell::new(0));
    for id in tree.descendants(NodeId::ROOT) {
        let counter = Rc::clone(&events);
        tree.subscribe(id, move |_| *counter.borrow_mut() += 1)
            .unwrap();
    }
    events
}

#[test]
fn sync_moves_a_running_tree_to_a_sibling_leaf() {
    let mut tree = BehaviorTree::from_blueprint(
        "Guard",
        sequence(vec![endless("A"), endless("B")]),
        TreeConfig::default(),
    )
    .unwrap();
    let mut board = Blackboard::new();
    let (a, b) = (tree.find("A").unwrap(), tree.find("B").unwrap());
    tree.start(&mut board);
    tree.tick(0.1, &mut board).unwrap();
    tree.tick(0.1, &mut board).unwrap();
    assert_eq!(tree.active_leaves(), vec![a]);

    assert!(tree.sync_active_leaves(&[b], &mut board, true));
    assert_eq!(tree.state(a), NodeState::Inactive);
    assert_eq!(tree.active_leaves(), vec![b]);

    let events = count_events(&mut tree);
    assert!(tree.sync_active_leaves(&[b], &mut board, true));
    assert_eq!(*events.borrow(), 0);
}

#[test]
fn follower_mirrors_leader_through_the_wire_format() {
    let mut leader = camp_tree();
    let mut follower = camp_tree();
    let mut leader_board = Blackboard::new();
    let mut follower_board = Blackboard::new();
    let separator = leader.config().sync_separator;

    leader.start(&mut leader_board);
    for tick in 0..30 {
        match tick {
            5 => leader_board.set("noise", true),
            12 => {
                leader_board.unset("noise");
            }
            20 => leader_board.set("enemy", true),
            _ => {}
        }
        leader.tick(0.25, &mut leader_board).unwrap();
        let changed = leader_board.update();
        leader.notify_changes(&changed, &mut leader_board);

        let wire = leader.active_leaf_set().to_wire(separator);
        assert!(
            follower
                .sync_active_leaves_wire(&wire, separator, &mut follower_board, true)
                .unwrap()
        );
        assert_eq!(follower.active_leaf_set(), leader.active_leaf_set(), "tick {tick}");
    }
    assert!(follower.is_silent());
    assert!(follower.is_active(follower.find("Aim").unwrap()));
}

#[test]
fn failed_path_start_reports_false_and_keeps_partial_state() {
    let mut tree = BehaviorTree::from_blueprint(
        "Guard",
        selector(vec![
            observer(
                BlackboardCondition::is_set("visible"),
                AbortRule::None,
                endless("Hidden"),
            ),
            endless("Other"),
        ]),
        TreeConfig::default(),
    )
    .unwrap();
    let mut board = Blackboard::new();
    let hidden = tree.find("Hidden").unwrap();

    assert!(!tree.sync_active_leaves(&[hidden], &mut board, false));
    assert_eq!(tree.state(hidden), NodeState::Inactive);
    assert_eq!(tree.state(tree.find("Observer").unwrap()), NodeState::Inactive);
    assert!(tree.is_active(NodeId::ROOT));
}

proptest! {
    /// After a sync, a node is active exactly when it is a target or an
    /// ancestor of one, whatever the tree was doing before.
    #[test]
    fn sync_converges_and_is_idempotent(
        before in prop::collection::vec(0usize..14, 0..4),
        after in prop::collection::vec(0usize..14, 0..4),
    ) {
        let mut tree = camp_tree();
        let mut board = Blackboard::new();
        let nodes: Vec<NodeId> = tree.descendants(NodeId::ROOT).into_iter().skip(1).collect();
        prop_assert_eq!(nodes.len(), 14);

        let before: Vec<NodeId> = before.into_iter().map(|index| nodes[index]).collect();
        let after: Vec<NodeId> = after.into_iter().map(|index| nodes[index]).collect();

        prop_assert!(tree.sync_active_leaves(&before, &mut board, true));
        prop_assert!(tree.sync_active_leaves(&after, &mut board, true));

        let wanted = wanted_set(&tree, &after);
        for id in tree.descendants(NodeId::ROOT) {
            prop_assert_eq!(tree.is_active(id), wanted.contains(&id), "node {:?}", tree.uid(id));
            prop_assert_ne!(tree.state(id), NodeState::Stopping);
        }

        let events = count_events(&mut tree);
        prop_assert!(tree.sync_active_leaves(&after, &mut board, true));
        prop_assert_eq!(*events.borrow(), 0);
    }

    /// A live sync reaches the same shape, tells listeners about it, and
    /// leaves a tree that keeps running on the following ticks.
    #[test]
    fn live_sync_converges_and_keeps_running(
        before in prop::collection::vec(0usize..14, 0..4),
        after in prop::collection::vec(0usize..14, 0..4),
    ) {
        let mut tree = camp_tree();
        let mut board = Blackboard::new();
        board.set("enemy", true);
        board.set("noise", true);
        board.set("footsteps", true);
        let nodes: Vec<NodeId> = tree.descendants(NodeId::ROOT).into_iter().skip(1).collect();
        let actions: Vec<NodeId> = ["Aim", "Shoot", "Look", "Listen", "Sit", "Stand"]
            .into_iter()
            .map(|name| tree.find(name).unwrap())
            .collect();

        let before: Vec<NodeId> = before.into_iter().map(|index| nodes[index]).collect();
        let after: Vec<NodeId> = after.into_iter().map(|index| nodes[index]).collect();
        prop_assert!(tree.sync_active_leaves(&before, &mut board, false));

        let events = Rc::new(RefCell::new(Vec::new()));
        for id in tree.descendants(NodeId::ROOT) {
            let log = Rc::clone(&events);
            tree.subscribe(id, move |event| log.borrow_mut().push(*event))
                .unwrap();
        }
        prop_assert!(tree.sync_active_leaves(&after, &mut board, false));

        let wanted = wanted_set(&tree, &after);
        for id in tree.descendants(NodeId::ROOT) {
            prop_assert_ne!(tree.state(id), NodeState::Stopping);
            if wanted.contains(&id) {
                prop_assert!(tree.is_active(id), "node {:?}", tree.uid(id));
            } else if tree.is_active(id) {
                prop_assert!(under_a_target(&tree, id, &after), "node {:?}", tree.uid(id));
            }
        }
        for event in events.borrow().iter() {
            prop_assert!(!event.kind.is_silent(), "{:?}", event);
        }

        for _ in 0..12 {
            tree.tick(0.25, &mut board).unwrap();
        }
        if !after.is_empty() {
            prop_assert!(actions.iter().any(|&id| tree.is_active(id)));
        }
    }
}
