// src/group.rs

//! Dependency-ordered execution of named asynchronous closures.
//!
//! A [`Group`] holds a set of named tasks, each with a list of dependency
//! names. [`Group::run`] starts every task whose dependencies have all
//! finished; as tasks complete, newly-unblocked tasks are started, and once
//! every added task has finished the accumulated completion callbacks fire
//! exactly once, in the order they were supplied.
//!
//! Dependencies are weak references by name: nothing checks at registration
//! time that a name will ever be added. A task depending on a name that is
//! never added stays pending forever and the group never reaches completion.
//! Callers who want that caught up front can run [`Group::check`] before
//! [`Group::run`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::errors::GroupError;

/// Public type alias for task names.
pub type TaskName = String;

type Unit = Box<dyn FnOnce(Completion) + Send + 'static>;
type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// A registered task that has not been started yet.
struct PendingTask {
    name: TaskName,
    dependencies: Vec<TaskName>,
    unit: Unit,
}

/// Bookkeeping shared between the group and outstanding completion handles.
///
/// A task is in exactly one of three states: pending (in `pending`), running
/// (removed from `pending`, not yet in `finished`), or finished.
struct Inner {
    /// Dependency lists of every task ever registered, keyed by name.
    added: HashMap<TaskName, Vec<TaskName>>,
    /// Registered but not yet started, in registration order.
    pending: Vec<PendingTask>,
    /// Names of tasks that have finished.
    finished: HashSet<TaskName>,
    /// Callbacks accumulated across `run` calls, fired at the terminal
    /// condition and then cleared.
    callbacks: Vec<CompletionCallback>,
}

/// Runs named asynchronous closures in dependency order.
///
/// Cloning yields another handle to the same group. Tasks eligible in the
/// same scheduling pass are all started within that pass; the group never
/// serializes unrelated tasks. There is no failure model at this layer: a
/// unit that never invokes its [`Completion`] leaves its dependents pending
/// forever, with no timeout or diagnostic beyond log output.
///
/// ```
/// use taskgroup::Group;
///
/// let group = Group::new();
/// group.add(|done| done.complete(), &[], Some("load"));
/// group.add(|done| done.complete(), &["load"], Some("render"));
/// group.run_then(|| println!("all done"));
/// ```
#[derive(Clone)]
pub struct Group {
    inner: Arc<Mutex<Inner>>,
}

impl Group {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                added: HashMap::new(),
                pending: Vec::new(),
                finished: HashSet::new(),
                callbacks: Vec::new(),
            })),
        }
    }

    /// Register a task. Does not start anything; call [`run`](Self::run) to
    /// begin scheduling.
    ///
    /// With `name = None` a name of the form `(unnamed#N)` is generated,
    /// where N counts tasks registered so far. Registering under a name
    /// already present overwrites the earlier registration: a prior pending
    /// instance under that name is discarded, and its dependency edges are
    /// replaced by the new ones.
    pub fn add<F>(&self, unit: F, dependencies: &[&str], name: Option<&str>)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let mut g = self.lock();

        let name = match name {
            Some(n) => n.to_string(),
            None => format!("(unnamed#{})", g.added.len() + 1),
        };
        let deps: Vec<TaskName> = dependencies.iter().map(|d| d.to_string()).collect();

        debug!(task = %name, deps = ?deps, "task registered");
        g.added.insert(name.clone(), deps.clone());

        let task = PendingTask {
            name: name.clone(),
            dependencies: deps,
            unit: Box::new(unit),
        };
        match g.pending.iter().position(|t| t.name == name) {
            Some(idx) => {
                debug!(task = %name, "overwriting pending task with the same name");
                g.pending[idx] = task;
            }
            None => g.pending.push(task),
        }
    }

    /// Invoke the scheduling step without registering a completion callback.
    pub fn run(&self) {
        self.step();
    }

    /// Append `on_completion` to the callback list, then invoke the
    /// scheduling step.
    ///
    /// Callbacks accumulate across `run_then` calls and all fire together,
    /// once, when every added task has finished. If the group is already at
    /// the terminal condition the callback fires before this call returns.
    pub fn run_then<F>(&self, on_completion: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.lock().callbacks.push(Box::new(on_completion));
        self.step();
    }

    /// Start scheduling and wait for the terminal condition.
    ///
    /// Sugar over [`run_then`](Self::run_then) with a oneshot channel; the
    /// returned future resolves when all added tasks have finished. Like any
    /// completion callback it waits forever if the group stalls.
    pub async fn join(&self) {
        let (tx, rx) = oneshot::channel();
        self.run_then(move || {
            let _ = tx.send(());
        });
        let _ = rx.await;
    }

    /// Opt-in verification of the registered task graph.
    ///
    /// Rejects dependency names that were never added and cycles among added
    /// tasks. [`run`](Self::run) performs no such check: without `check`, a
    /// missing name or a cycle simply leaves the affected tasks pending
    /// forever.
    pub fn check(&self) -> Result<(), GroupError> {
        let g = self.lock();

        for (name, deps) in g.added.iter() {
            for dep in deps {
                if !g.added.contains_key(dep) {
                    return Err(GroupError::MissingDependency {
                        task: name.clone(),
                        dependency: dep.clone(),
                    });
                }
                if dep == name {
                    return Err(GroupError::DependencyCycle { task: name.clone() });
                }
            }
        }

        // Edge direction: dep -> task. A topological sort fails on a cycle.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in g.added.keys() {
            graph.add_node(name.as_str());
        }
        for (name, deps) in g.added.iter() {
            for dep in deps {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(GroupError::DependencyCycle {
                task: cycle.node_id().to_string(),
            }),
        }
    }

    /// The scheduling step, invoked after `run` and after every task finish.
    ///
    /// Either fires the accumulated callbacks (terminal condition) or starts
    /// every pending task whose dependencies have all finished. Units and
    /// callbacks are invoked with the lock released, so a unit completing
    /// synchronously re-enters this step safely.
    fn step(&self) {
        enum Action {
            Finished(Vec<CompletionCallback>),
            Start(Vec<PendingTask>),
        }

        let action = {
            let mut g = self.lock();

            if g.finished.len() == g.added.len() {
                Action::Finished(std::mem::take(&mut g.callbacks))
            } else {
                let mut ready = Vec::new();
                let mut i = 0;
                while i < g.pending.len() {
                    let satisfied = g.pending[i]
                        .dependencies
                        .iter()
                        .all(|dep| g.finished.contains(dep));
                    if satisfied {
                        // Removing before invoking keeps a re-entrant step
                        // from starting the same task twice.
                        ready.push(g.pending.remove(i));
                    } else {
                        for dep in &g.pending[i].dependencies {
                            if !g.added.contains_key(dep) {
                                warn!(
                                    task = %g.pending[i].name,
                                    dep = %dep,
                                    "dependency was never added; task cannot start"
                                );
                            }
                        }
                        i += 1;
                    }
                }
                Action::Start(ready)
            }
        };

        match action {
            Action::Finished(callbacks) => {
                if !callbacks.is_empty() {
                    debug!(
                        callbacks = callbacks.len(),
                        "all tasks finished; invoking completion callbacks"
                    );
                }
                for callback in callbacks {
                    callback();
                }
            }
            Action::Start(tasks) => {
                for task in tasks {
                    debug!(task = %task.name, "dependencies satisfied; starting task");
                    (task.unit)(Completion {
                        group: self.clone(),
                        task: task.name,
                    });
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle passed to each task's unit; consuming it marks the task finished.
///
/// The handle is `Send`, so a unit may move it into a spawned task and
/// complete later. Invoking it synchronously before `add`/`run` returns is
/// valid and drives the scheduling step re-entrantly. Dropping it without
/// calling [`complete`](Self::complete) leaves the task running forever.
pub struct Completion {
    group: Group,
    task: TaskName,
}

impl Completion {
    /// Mark the task finished and re-run the scheduling step.
    pub fn complete(self) {
        {
            let mut g = self.group.lock();
            g.finished.insert(self.task.clone());
        }
        debug!(task = %self.task, "task finished");
        self.group.step();
    }
}
