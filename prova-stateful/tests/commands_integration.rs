//! Model-based testing through the prova runner

use std::collections::HashMap;
use std::mem::discriminant;

use prova::{
    Arbitrary, BoxedArbitrary, Parameters, PropertyError, Random, RunDetails, RunStatus,
    async_property, check_async_with_config, check_with_config, constant, default_report_message,
    nat, property,
};
use prova_stateful::prelude::*;

/// A stack whose storage silently stops growing past three elements
#[derive(Default)]
struct BoundedStack {
    items: Vec<u8>,
    broken: bool,
}

impl BoundedStack {
    fn broken() -> Self {
        Self {
            items: Vec::new(),
            broken: true,
        }
    }

    fn push(&mut self, value: u8) {
        if !self.broken || self.items.len() < 3 {
            self.items.push(value);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum StackOp {
    Push(u8),
    Pop,
    Peek,
}

impl Command for StackOp {
    type Model = Vec<u8>;
    type Real = BoundedStack;

    fn check(&self, model: &Vec<u8>) -> bool {
        match self {
            StackOp::Push(_) => true,
            StackOp::Pop | StackOp::Peek => !model.is_empty(),
        }
    }

    fn run(&self, model: &mut Vec<u8>, real: &mut BoundedStack) -> Result<(), PropertyError> {
        match self {
            StackOp::Push(value) => {
                model.push(*value);
                real.push(*value);
            }
            StackOp::Pop => {
                let expected = model.pop();
                let actual = real.items.pop();
                if expected != actual {
                    return Err(PropertyError::property_failed(format!(
                        "popped {:?}, expected {:?}",
                        actual, expected
                    )));
                }
            }
            StackOp::Peek => {
                if model.last() != real.items.last() {
                    return Err(PropertyError::property_failed("peeked the wrong value"));
                }
            }
        }
        if model.len() != real.items.len() {
            return Err(PropertyError::property_failed(format!(
                "size {} instead of {}",
                real.items.len(),
                model.len()
            )));
        }
        Ok(())
    }
}

fn stack_ops() -> Vec<BoxedArbitrary<StackOp>> {
    vec![
        nat(255).map(|value| StackOp::Push(value as u8)).boxed(),
        constant(StackOp::Pop).boxed(),
        constant(StackOp::Peek).boxed(),
    ]
}

fn check_stack(
    settings: CommandsSettings,
    broken: bool,
    parameters: Parameters,
) -> RunDetails<CommandsIterable<StackOp>> {
    let arbitrary = commands(stack_ops(), settings).unwrap();
    let prop = property(arbitrary, move |cmds: CommandsIterable<StackOp>| {
        let real = if broken {
            BoundedStack::broken()
        } else {
            BoundedStack::default()
        };
        model_run(move || (Vec::new(), real), &cmds)
    });
    check_with_config(&prop, parameters).unwrap()
}

/// Runs commands until the fourth one, which always fails
fn fails_on_fourth(cmds: &CommandsIterable<StackOp>) -> bool {
    for (index, wrapper) in cmds.iter().enumerate() {
        wrapper.mark_ran();
        if index == 3 {
            return true;
        }
    }
    false
}

#[test]
fn test_greedy_shrink_keeps_failing_command() {
    let arbitrary = commands(stack_ops(), CommandsSettings::default()).unwrap();
    let mut current = (0..)
        .map(|seed| arbitrary.generate(&mut Random::new(seed)))
        .find(|generated| generated.value().len() == 7)
        .unwrap();
    let failing = current.value().iter().nth(3).unwrap().command().clone();
    assert!(fails_on_fourth(current.value()));

    while let Some(smaller) = current.shrink().find(|candidate| fails_on_fourth(candidate.value())) {
        current = smaller;
    }

    let minimal = current.value();
    assert!(minimal.len() <= 4);
    assert_eq!(minimal.executed().len(), 4);
    let last = minimal.iter().last().unwrap().command();
    assert_eq!(discriminant(last), discriminant(&failing));
}

#[test]
fn test_correct_system_passes() {
    let details = check_stack(
        CommandsSettings::default(),
        false,
        Parameters::default().with_seed(5),
    );
    assert_eq!(details.status, RunStatus::Success);
    assert_eq!(details.num_runs, 100);
}

#[test]
fn test_failure_shrinks_to_minimal_sequence() {
    let details = check_stack(
        CommandsSettings::default(),
        true,
        Parameters::default().with_seed(42),
    );
    assert!(details.failed);
    let counterexample = details.counterexample.as_ref().unwrap();
    // Pops and peeks never trigger the bug, only the fourth push does
    assert_eq!(counterexample.executed(), vec![&StackOp::Push(0); 4]);
    assert_eq!(
        details.error.as_deref(),
        Some("command #4 Push(0) failed: size 3 instead of 4")
    );

    let rendered = format!("{:?}", counterexample);
    assert!(rendered.starts_with("Push(0),Push(0),Push(0),Push(0) /*replayPath=\""));
    let report = default_report_message(&details).unwrap();
    assert!(report.contains("replayPath="));
}

#[test]
fn test_replay_token_reproduces_counterexample() {
    let details = check_stack(
        CommandsSettings::default(),
        true,
        Parameters::default().with_seed(1234),
    );
    assert!(details.failed);
    let counterexample = details.counterexample.as_ref().unwrap();
    let token = counterexample.replay_token();

    let replayed = check_stack(
        CommandsSettings::default().with_replay_path(token),
        true,
        Parameters::default()
            .with_seed(details.seed)
            .with_path(details.counterexample_path.clone().unwrap()),
    );
    assert!(replayed.failed);
    assert_eq!(
        replayed.counterexample.as_ref().unwrap().executed(),
        counterexample.executed()
    );
    assert_eq!(replayed.error, details.error);
}

#[test]
fn test_shorter_max_commands_cannot_fail() {
    let details = check_stack(
        CommandsSettings::default().with_max_commands(3),
        true,
        Parameters::default().with_seed(9),
    );
    assert_eq!(details.status, RunStatus::Success);
}

#[test]
fn test_disabled_replay_log_keeps_plain_rendering() {
    let details = check_stack(
        CommandsSettings::default().disable_replay_log(),
        true,
        Parameters::default().with_seed(42),
    );
    assert!(details.failed);
    let counterexample = details.counterexample.as_ref().unwrap();
    assert_eq!(counterexample.replay_token(), "");
    assert_eq!(
        format!("{:?}", counterexample),
        "Push(0),Push(0),Push(0),Push(0)"
    );
}

#[test]
fn test_ignore_equal_values_keeps_distinct_sequences() {
    let details = check_stack(
        CommandsSettings::default(),
        false,
        Parameters::default().with_seed(1).ignore_equal_values(),
    );
    assert_eq!(details.status, RunStatus::Success);
    assert_eq!(details.num_runs, 100);
    // Only repeated sequences, such as the empty one, are skipped
    assert!(details.num_skips < 100);
}

#[test]
fn test_ignore_equal_values_still_finds_failures() {
    let details = check_stack(
        CommandsSettings::default(),
        true,
        Parameters::default().with_seed(42).ignore_equal_values(),
    );
    assert!(details.failed);
    assert_eq!(
        details.counterexample.as_ref().unwrap().executed(),
        vec![&StackOp::Push(0); 4]
    );
}

#[test]
fn test_shared_arbitrary_drives_parallel_runs() {
    let arbitrary = commands(stack_ops(), CommandsSettings::default()).unwrap();
    let handles: Vec<_> = (0..4u64)
        .map(|seed| {
            let arbitrary = arbitrary.clone();
            std::thread::spawn(move || {
                let prop = property(arbitrary, |cmds: CommandsIterable<StackOp>| {
                    model_run(|| (Vec::new(), BoundedStack::broken()), &cmds)
                });
                let parameters = Parameters::default()
                    .with_seed(100 + seed)
                    .with_num_runs(300);
                check_with_config(&prop, parameters).unwrap()
            })
        })
        .collect();
    for handle in handles {
        let details = handle.join().unwrap();
        assert!(details.failed);
        assert_eq!(
            details.counterexample.as_ref().unwrap().executed(),
            vec![&StackOp::Push(0); 4]
        );
    }
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put(u8, u8),
    Get(u8),
}

/// A cache forgetting the value of key 7
#[derive(Default)]
struct LeakyCache {
    entries: HashMap<u8, u8>,
}

impl AsyncCommand for CacheOp {
    type Model = HashMap<u8, u8>;
    type Real = LeakyCache;

    async fn run(
        &self,
        model: &mut HashMap<u8, u8>,
        real: &mut LeakyCache,
    ) -> Result<(), PropertyError> {
        tokio::task::yield_now().await;
        match self {
            CacheOp::Put(key, value) => {
                model.insert(*key, *value);
                if *key != 7 {
                    real.entries.insert(*key, *value);
                }
                Ok(())
            }
            CacheOp::Get(key) => {
                if model.get(key) != real.entries.get(key) {
                    return Err(PropertyError::property_failed(format!("lost key {}", key)));
                }
                Ok(())
            }
        }
    }
}

#[tokio::test]
async fn test_async_model_run_finds_lost_key() {
    let ops = vec![
        nat(10)
            .zip(nat(10))
            .map(|(key, value)| CacheOp::Put(key as u8, value as u8))
            .boxed(),
        nat(10).map(|key| CacheOp::Get(key as u8)).boxed(),
    ];
    let arbitrary = commands(ops, CommandsSettings::default()).unwrap();
    let prop = async_property(arbitrary, |cmds: CommandsIterable<CacheOp>| async move {
        async_model_run(|| (HashMap::new(), LeakyCache::default()), &cmds).await
    });
    let details = check_async_with_config(
        prop,
        Parameters::default().with_seed(3).with_num_runs(1000),
    )
    .await
    .unwrap();
    assert!(details.failed);
    let executed: Vec<String> = details
        .counterexample
        .as_ref()
        .unwrap()
        .executed()
        .iter()
        .map(|op| format!("{:?}", op))
        .collect();
    assert_eq!(executed, ["Put(7, 0)", "Get(7)"]);
}
