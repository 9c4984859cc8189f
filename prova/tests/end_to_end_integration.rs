//! End-to-end integration tests for the prova library
//!
//! These tests drive whole runs through the public API: generation, shrinking, replay,
//! skips and the global configuration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use prova::{
    Arbitrary, BoxedArbitrary, Outcome, Parameters, Property, PropertyError, Random, RunStatus,
    Shrinkable, VerbosityLevel, array, boolean, check, check_with_config, configure_global,
    constant, frequency, integer, letrec, nat, one_of, pre, property, reset_global, weighted,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn seeded(seed: u64) -> Parameters {
    Parameters::default().with_seed(seed)
}

#[test]
fn test_zero_weight_alternative_is_never_drawn() {
    init_tracing();
    let arbitrary = frequency(vec![weighted(1, constant(1)), weighted(0, constant(2))]).unwrap();
    let details = check_with_config(
        property(arbitrary, |n: i32| n == 1),
        seeded(7).with_num_runs(1000),
    )
    .unwrap();
    assert_eq!(details.status, RunStatus::Success);
    assert_eq!(details.num_runs, 1000);
}

#[test]
fn test_always_skipping_without_tolerance() {
    init_tracing();
    let attempts = AtomicUsize::new(0);
    let prop = property(integer(0i32, 1000).unwrap(), |_: i32| {
        attempts.fetch_add(1, Ordering::SeqCst);
        Outcome::skip()
    });
    let details = check_with_config(&prop, seeded(3).with_max_skips_per_run(0)).unwrap();
    assert_eq!(details.status, RunStatus::TooManySkips);
    assert!(details.failed);
    assert_eq!(attempts.load(Ordering::SeqCst), 100);
}

#[test]
fn test_same_seed_same_values() {
    let seen = |seed: u64| {
        let values = std::sync::Mutex::new(Vec::new());
        {
            let prop = property(array(integer(-100i64, 100).unwrap(), 8), |v: Vec<i64>| {
                values.lock().unwrap().push(v);
                true
            });
            check_with_config(&prop, seeded(seed).with_num_runs(30)).unwrap();
        }
        values.into_inner().unwrap()
    };
    assert_eq!(seen(99), seen(99));
    assert_ne!(seen(99), seen(100));
}

#[test]
fn test_counterexample_replays_from_path() {
    init_tracing();
    let prop = property(
        nat(1000).zip(nat(1000)),
        |(a, b): (u64, u64)| a + b < 1200,
    );
    let details = check_with_config(&prop, seeded(11)).unwrap();
    assert!(details.failed);
    let (a, b) = details.counterexample.unwrap();
    assert_eq!(a + b, 1200);

    let path = details.counterexample_path.clone().unwrap();
    let replayed = check_with_config(&prop, seeded(11).with_path(path.clone())).unwrap();
    assert_eq!(replayed.counterexample, details.counterexample);
    assert_eq!(replayed.counterexample_path, Some(path));
    assert_eq!(replayed.num_shrinks, 0);
}

#[test]
fn test_replay_of_first_failure_then_shrinks() {
    let prop = property(nat(100_000), |n: u64| n < 500);
    let full = check_with_config(&prop, seeded(5)).unwrap();
    let run = full
        .counterexample_path
        .as_deref()
        .and_then(|path| path.split(':').next())
        .unwrap()
        .to_string();

    // Starting at the failing run shrinks again down to the same counterexample
    let replayed = check_with_config(&prop, seeded(5).with_path(run)).unwrap();
    assert_eq!(replayed.counterexample, Some(500));
    assert_eq!(replayed.counterexample_path, full.counterexample_path);
}

#[test]
fn test_invalid_replay_path() {
    let prop = property(constant(5), |n: i32| n < 5);
    // constant values have no shrink candidates to walk through
    let result = check_with_config(&prop, seeded(1).with_path("0:3:1"));
    assert!(matches!(
        result,
        Err(PropertyError::Config(prova::ConfigError::InvalidPath(_)))
    ));
}

#[test]
fn test_chained_arbitrary_shrinks() {
    let arbitrary = nat(20).chain(|length| {
        array(constant(length), length as usize).boxed()
    });
    let prop = property(arbitrary, |values: Vec<u64>| values.len() < 3);
    let details = check_with_config(prop, seeded(8)).unwrap();
    let counterexample = details.counterexample.unwrap();
    assert_eq!(counterexample.len(), 3);
}

#[test]
fn test_recursive_arbitrary_end_to_end() {
    #[derive(Debug, Clone)]
    enum Expr {
        Num(u64),
        Add(Box<Expr>, Box<Expr>),
    }

    fn eval(expr: &Expr) -> u64 {
        match expr {
            Expr::Num(n) => *n,
            Expr::Add(l, r) => eval(l) + eval(r),
        }
    }

    let definitions: HashMap<String, BoxedArbitrary<Expr>> = letrec(|tie| {
        vec![
            (
                "expr",
                frequency(vec![weighted(3, tie.tie("num")), weighted(1, tie.tie("add"))])
                    .unwrap()
                    .boxed(),
            ),
            (
                "add",
                tie.tie("expr")
                    .zip(tie.tie("expr"))
                    .map(|(l, r)| Expr::Add(Box::new(l), Box::new(r)))
                    .boxed(),
            ),
            ("num", nat(50).map(Expr::Num).boxed()),
        ]
    });
    let prop = property(definitions["expr"].clone(), |expr: Expr| eval(&expr) < 60);
    let details = check_with_config(prop, seeded(21)).unwrap();
    assert!(details.failed);
    assert_eq!(eval(&details.counterexample.unwrap()), 60);
}

#[test]
fn test_preconditions_are_skips() {
    let prop = property(
        one_of(vec![nat(10).boxed(), constant(1000).boxed()]).unwrap(),
        |n: u64| -> Result<bool, PropertyError> {
            pre(n != 1000)?;
            Ok(n <= 10)
        },
    );
    let details = check_with_config(prop, seeded(2)).unwrap();
    assert_eq!(details.status, RunStatus::Success);
    assert!(details.num_skips > 0);
}

#[test]
fn test_custom_property_implementation() {
    struct NotBoth;

    impl Property<(bool, bool)> for NotBoth {
        fn generate(&self, random: &mut Random, _run_id: Option<usize>) -> Shrinkable<(bool, bool)> {
            boolean().zip(boolean()).generate(random)
        }

        fn run(&self, value: &(bool, bool)) -> Outcome {
            if value.0 && value.1 {
                Outcome::Failure("both set".to_string())
            } else {
                Outcome::Success
            }
        }
    }

    let details = check_with_config(NotBoth, seeded(4)).unwrap();
    assert_eq!(details.counterexample, Some((true, true)));
    assert_eq!(details.error.as_deref(), Some("both set"));
}

#[test]
fn test_ignore_equal_values_skips_duplicates() {
    let calls = AtomicUsize::new(0);
    let prop = property(boolean(), |_: bool| {
        calls.fetch_add(1, Ordering::SeqCst);
        true
    });
    let details =
        check_with_config(&prop, seeded(6).with_num_runs(2).ignore_equal_values()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(details.num_runs, 2);
    assert_eq!(details.status, RunStatus::Success);
}

#[test]
fn test_global_configuration_is_used_by_check() {
    reset_global();
    configure_global(seeded(1234).with_num_runs(12)).unwrap();
    let calls = AtomicUsize::new(0);
    let details = check(property(nat(5), |_: u64| {
        calls.fetch_add(1, Ordering::SeqCst);
    }))
    .unwrap();
    reset_global();
    assert_eq!(details.seed, 1234);
    assert_eq!(details.num_runs, 12);
    assert_eq!(calls.load(Ordering::SeqCst), 12);
}

#[test]
fn test_verbose_failures_end_with_counterexample() {
    let prop = property(integer(-1000i32, 1000).unwrap(), |n: i32| n > -300);
    let details =
        check_with_config(prop, seeded(9).with_verbose(VerbosityLevel::Verbose)).unwrap();
    assert_eq!(details.counterexample, Some(-300));
    assert_eq!(details.failures.last(), Some(&-300));
}
