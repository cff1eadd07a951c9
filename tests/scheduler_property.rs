// tests/scheduler_property.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use proptest::prelude::*;
use rcmd::engine::{CoreCommand, CoreRuntime, RuntimeOptions, Scheduler, TaskEvent, TaskSpec};
use rcmd::types::TaskId;
use serde_json::Value;

#[derive(Debug, Clone)]
enum Op {
    Submit,
    /// Finish the running task at this index (modulo the running count).
    Exit(usize),
    TimeOut(usize),
    FailLaunch(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Submit),
        3 => any::<usize>().prop_map(Op::Exit),
        1 => any::<usize>().prop_map(Op::TimeOut),
        1 => any::<usize>().prop_map(Op::FailLaunch),
    ]
}

fn spec(n: usize) -> TaskSpec {
    TaskSpec {
        token: format!("req-{n}"),
        program: PathBuf::from("/bin/true"),
        args: vec![],
        env: vec![],
    }
}

/// Tracks what the core asked for, the way an IO shell would see it.
#[derive(Default)]
struct Observed {
    running: Vec<TaskId>,
    launch_order: Vec<TaskId>,
    submitted: Vec<String>,
    replied: Vec<String>,
    released: HashSet<TaskId>,
}

impl Observed {
    fn apply(&mut self, commands: Vec<CoreCommand>) {
        for command in commands {
            match command {
                CoreCommand::Launch(req) => {
                    self.running.push(req.id);
                    self.launch_order.push(req.id);
                }
                CoreCommand::Send(frame) => {
                    let v: Value = serde_json::from_str(&frame).unwrap();
                    self.replied.push(v["token"].as_str().unwrap().to_string());
                }
                CoreCommand::Release(id) => {
                    assert!(self.released.insert(id), "{id} released twice");
                    self.running.retain(|r| *r != id);
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn admission_is_bounded_fifo_and_tears_down_once(
        max in 1usize..4,
        ops in proptest::collection::vec(op_strategy(), 1..60),
    ) {
        let mut core = CoreRuntime::new(
            Scheduler::new(max, None),
            RuntimeOptions {
                timeout: Duration::from_secs(1),
                max_reply_bytes: 1 << 20,
                reply_on_timeout: true,
            },
        );
        let mut seen = Observed::default();
        let mut next = 0usize;

        for op in ops {
            match op {
                Op::Submit => {
                    let s = spec(next);
                    next += 1;
                    seen.submitted.push(s.token.clone());
                    let before = core.task_count();
                    let step = core.submit(s);
                    prop_assert_eq!(core.task_count(), before + 1);
                    seen.apply(step.commands);
                }
                Op::Exit(i) | Op::TimeOut(i) | Op::FailLaunch(i) if !seen.running.is_empty() => {
                    let id = seen.running[i % seen.running.len()];
                    let event = match op {
                        Op::Exit(_) => TaskEvent::Exited { task: id, code: 0 },
                        Op::TimeOut(_) => TaskEvent::TimedOut { task: id },
                        _ => TaskEvent::LaunchFailed { task: id, error: rcmd::errors::CmdError::SystemError },
                    };
                    seen.apply(core.step(event).commands);
                }
                _ => {}
            }

            prop_assert!(core.running_count() <= max);
            prop_assert_eq!(core.running_count(), seen.running.len());
            // Capacity is never left idle while work waits.
            if core.backlog_len() > 0 {
                prop_assert_eq!(core.running_count(), max);
            }
        }

        // Launches happen strictly in arrival order.
        let mut sorted = seen.launch_order.clone();
        sorted.sort();
        prop_assert_eq!(&seen.launch_order, &sorted);

        // Drain: finish everything still running.
        while let Some(&id) = seen.running.first() {
            seen.apply(core.step(TaskEvent::Exited { task: id, code: 0 }).commands);
        }
        prop_assert!(core.is_idle());

        // Every request got exactly one reply.
        let mut replied = seen.replied.clone();
        replied.sort();
        let mut submitted = seen.submitted.clone();
        submitted.sort();
        prop_assert_eq!(replied, submitted);
        prop_assert_eq!(seen.released.len(), next);
    }
}
