use std::cell::RefCell;
use std::rc::Rc;

use behavior_tree::builder::{action, observer, selector};
use behavior_tree::{
    AbortRule, ActionResult, BehaviorTree, Blackboard, BlackboardCondition, Blueprint, EventKind,
    FnCondition, NodeId, NodeState, Operator, Task, TreeConfig, TreeManager,
};

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

fn guard_tree(rule: AbortRule) -> BehaviorTree {
    BehaviorTree::from_blueprint(
        "Guard",
        selector(vec![
            observer(BlackboardCondition::is_set("enemy"), rule, endless("Attack")),
            endless("Patrol"),
        ]),
        TreeConfig::default(),
    )
    .unwrap()
}

/// Start the tree and run until the low-priority branch is active.
fn patrol(tree: &mut BehaviorTree, board: &mut Blackboard) {
    tree.start(board);
    tree.tick(0.1, board).unwrap();
    tree.tick(0.1, board).unwrap();
    assert!(tree.is_active(tree.find("Patrol").unwrap()));
}

fn flush(tree: &mut BehaviorTree, board: &mut Blackboard) {
    let changed = board.update();
    tree.notify_changes(&changed, board);
}

#[test]
fn lower_priority_rule_preempts_the_running_sibling() {
    let mut tree = guard_tree(AbortRule::LowerPriority);
    let mut board = Blackboard::new();
    let (guard, attack, patrol_leaf) = (
        tree.find("Observer").unwrap(),
        tree.find("Attack").unwrap(),
        tree.find("Patrol").unwrap(),
    );
    let patrol_events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&patrol_events);
    tree.subscribe(patrol_leaf, move |event| sink.borrow_mut().push(event.kind))
        .unwrap();

    patrol(&mut tree, &mut board);
    assert!(tree.is_observing(guard));

    board.set("enemy", true);
    flush(&mut tree, &mut board);
    assert!(patrol_events.borrow().contains(&EventKind::Stopping { silent: false }));
    assert_eq!(tree.state(patrol_leaf), NodeState::Inactive);
    assert_eq!(tree.state(attack), NodeState::Inactive);

    tree.tick(0.1, &mut board).unwrap();
    tree.tick(0.1, &mut board).unwrap();
    assert!(tree.is_active(attack));
    assert_eq!(tree.state(patrol_leaf), NodeState::Inactive);
}

#[test]
fn restart_rule_switches_branches_immediately() {
    let mut tree = guard_tree(AbortRule::LowerPriorityRestart);
    let mut board = Blackboard::new();
    let (guard, attack, patrol_leaf) = (
        tree.find("Observer").unwrap(),
        tree.find("Attack").unwrap(),
        tree.find("Patrol").unwrap(),
    );
    patrol(&mut tree, &mut board);

    board.set("enemy", true);
    flush(&mut tree, &mut board);

    assert!(tree.is_active(attack));
    assert_eq!(tree.state(patrol_leaf), NodeState::Inactive);
    assert!(tree.is_observing(guard));
    assert_eq!(tree.observers_of("enemy"), &[guard]);
}

#[test]
fn restart_rule_preempts_then_aborts_itself() {
    let mut tree = guard_tree(AbortRule::Restart);
    let mut board = Blackboard::new();
    let (guard, attack, patrol_leaf) = (
        tree.find("Observer").unwrap(),
        tree.find("Attack").unwrap(),
        tree.find("Patrol").unwrap(),
    );
    patrol(&mut tree, &mut board);
    assert!(tree.is_observing(guard));

    board.set("enemy", true);
    flush(&mut tree, &mut board);
    assert!(tree.is_active(attack));
    assert_eq!(tree.state(patrol_leaf), NodeState::Inactive);

    board.unset("enemy");
    flush(&mut tree, &mut board);
    assert_eq!(tree.state(attack), NodeState::Inactive);
    assert_eq!(tree.state(guard), NodeState::Inactive);
    assert!(tree.is_active(patrol_leaf));
    assert!(tree.is_observing(guard));

    board.set("enemy", true);
    flush(&mut tree, &mut board);
    assert!(tree.is_active(attack));
    assert_eq!(tree.state(patrol_leaf), NodeState::Inactive);
}

#[test]
fn none_rule_never_interrupts() {
    let mut tree = guard_tree(AbortRule::None);
    let mut board = Blackboard::new();
    patrol(&mut tree, &mut board);
    assert!(!tree.is_observing(tree.find("Observer").unwrap()));

    board.set("enemy", true);
    flush(&mut tree, &mut board);
    tree.tick(0.1, &mut board).unwrap();
    assert!(tree.is_active(tree.find("Patrol").unwrap()));
}

#[test]
fn both_rule_aborts_itself_and_falls_back() {
    let mut tree = guard_tree(AbortRule::Both);
    let mut board = Blackboard::new();
    board.set("enemy", true);
    let (attack, patrol_leaf) = (tree.find("Attack").unwrap(), tree.find("Patrol").unwrap());

    tree.start(&mut board);
    tree.tick(0.1, &mut board).unwrap();
    tree.tick(0.1, &mut board).unwrap();
    assert!(tree.is_active(attack));

    board.unset("enemy");
    flush(&mut tree, &mut board);
    assert_eq!(tree.state(attack), NodeState::Inactive);
    assert!(tree.is_active(patrol_leaf));
}

#[test]
fn changes_to_unobserved_keys_are_ignored() {
    let mut tree = guard_tree(AbortRule::LowerPriority);
    let mut board = Blackboard::new();
    patrol(&mut tree, &mut board);

    board.set("weather", "rain");
    flush(&mut tree, &mut board);
    assert!(tree.is_active(tree.find("Patrol").unwrap()));
}

#[test]
fn preemption_reaches_through_nested_decorators() {
    // The selector prioritises the outer decorator's branch.
    let mut tree = BehaviorTree::from_blueprint(
        "Guard",
        selector(vec![
            observer(
                BlackboardCondition::new("hp", Operator::Greater, 0),
                AbortRule::None,
                observer(
                    BlackboardCondition::new("hp", Operator::Less, 30),
                    AbortRule::LowerPriorityRestart,
                    endless("Flee"),
                )
                .named("Danger"),
            )
            .named("Alive"),
            endless("Patrol"),
        ]),
        TreeConfig::default(),
    )
    .unwrap();
    let mut board = Blackboard::new();
    board.set("hp", 100);
    patrol(&mut tree, &mut board);
    assert!(tree.is_observing(tree.find("Danger").unwrap()));

    board.set("hp", 10);
    flush(&mut tree, &mut board);
    assert!(tree.is_active(tree.find("Flee").unwrap()));
    assert!(tree.is_active(tree.find("Alive").unwrap()));
    assert_eq!(tree.state(tree.find("Patrol").unwrap()), NodeState::Inactive);
}

#[test]
fn manager_update_flushes_blackboard_changes() {
    let mut manager = TreeManager::default();
    let key = manager.insert_tree(guard_tree(AbortRule::LowerPriorityRestart));
    let board = manager.add_blackboard();
    manager.start_tree().unwrap();
    manager.update(0.1).unwrap();
    manager.update(0.1).unwrap();

    manager
        .blackboard_mut(board)
        .unwrap()
        .set("enemy", true);
    manager.update(0.1).unwrap();

    let tree = manager.tree(key).unwrap();
    assert!(tree.is_active(tree.find("Attack").unwrap()));
    assert_eq!(tree.children(NodeId::ROOT).len(), 1);
}

#[test]
fn closure_conditions_observe_their_declared_keys() {
    let mut tree = BehaviorTree::from_blueprint(
        "Guard",
        selector(vec![
            observer(
                FnCondition::new(["noise", "light"], |board: &Blackboard| {
                    board.get_int("noise").unwrap_or(0) + board.get_int("light").unwrap_or(0) > 5
                }),
                AbortRule::LowerPriorityRestart,
                endless("Investigate"),
            ),
            endless("Patrol"),
        ]),
        TreeConfig::default(),
    )
    .unwrap();
    let mut board = Blackboard::new();
    patrol(&mut tree, &mut board);

    board.set("light", 3);
    flush(&mut tree, &mut board);
    assert!(tree.is_active(tree.find("Patrol").unwrap()));

    board.set("noise", 4);
    flush(&mut tree, &mut board);
    assert!(tree.is_active(tree.find("Investigate").unwrap()));
}
