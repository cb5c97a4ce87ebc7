use std::error::Error;
use std::sync::{Arc, Mutex};

use taskgroup::Group;
use taskgroup::group::Completion;

type TestResult = Result<(), Box<dyn Error>>;
type Inbox = Arc<Mutex<Vec<(String, Completion)>>>;
type Log = Arc<Mutex<Vec<&'static str>>>;

fn new_inbox() -> Inbox {
    Arc::new(Mutex::new(Vec::new()))
}

fn add_parked(group: &Group, inbox: &Inbox, deps: &[&str], name: &str) {
    let inbox = inbox.clone();
    let task = name.to_string();
    group.add(
        move |done| inbox.lock().unwrap().push((task, done)),
        deps,
        Some(name),
    );
}

fn started(inbox: &Inbox) -> Vec<String> {
    inbox
        .lock()
        .unwrap()
        .iter()
        .map(|(name, _)| name.clone())
        .collect()
}

fn finish(inbox: &Inbox, name: &str) {
    let done = {
        let mut parked = inbox.lock().unwrap();
        let idx = parked
            .iter()
            .position(|(n, _)| n == name)
            .expect("task not started");
        parked.remove(idx).1
    };
    done.complete();
}

#[test]
fn readding_a_name_discards_the_pending_instance() -> TestResult {
    let group = Group::new();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    {
        let log = log.clone();
        group.add(
            move |_done| log.lock().unwrap().push("old"),
            &[],
            Some("x"),
        );
    }
    {
        let log = log.clone();
        group.add(
            move |done| {
                log.lock().unwrap().push("new");
                done.complete();
            },
            &[],
            Some("x"),
        );
    }

    group.run();

    // Only the later registration runs; the earlier closure is discarded.
    assert_eq!(*log.lock().unwrap(), ["new"]);
    Ok(())
}

#[test]
fn readding_a_name_replaces_its_dependency_edges() -> TestResult {
    let group = Group::new();
    let inbox = new_inbox();

    add_parked(&group, &inbox, &[], "x");
    add_parked(&group, &inbox, &["a"], "x");
    add_parked(&group, &inbox, &[], "a");
    group.run();

    // "x" was re-registered with a dependency, so only "a" may start.
    assert_eq!(started(&inbox), ["a"]);

    finish(&inbox, "a");
    assert_eq!(started(&inbox), ["x"]);
    Ok(())
}

#[test]
fn auto_generated_names_are_usable_as_dependencies() -> TestResult {
    let group = Group::new();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    {
        let log = log.clone();
        group.add(
            move |done| {
                log.lock().unwrap().push("first");
                done.complete();
            },
            &[],
            None,
        );
    }
    {
        let log = log.clone();
        group.add(
            move |done| {
                log.lock().unwrap().push("second");
                done.complete();
            },
            &["(unnamed#1)"],
            None,
        );
    }

    group.run();
    assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    Ok(())
}
