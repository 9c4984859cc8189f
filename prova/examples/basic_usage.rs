//! Basic usage examples demonstrating the core prova API
//!
//! Shows properties over built-in arbitraries, combinators, failure reports and
//! replaying a counterexample from its seed and path.

use prova::{
    Arbitrary, Parameters, PropertyError, VerbosityLevel, array, check_with_config,
    default_report_message, integer, nat, pre, property,
};

// Example 1: a property that holds
fn example_1_passing_property() {
    println!("=== Example 1: Passing Property ===");

    let pairs = integer(-100i32, 100).unwrap().zip(integer(-100i32, 100).unwrap());
    let prop = property(pairs, |(a, b): (i32, i32)| a + b == b + a);

    match check_with_config(&prop, Parameters::default()) {
        Ok(details) if !details.failed => {
            println!("✓ Addition is commutative ({} runs)", details.num_runs)
        }
        Ok(details) => println!("{}", default_report_message(&details).unwrap_or_default()),
        Err(error) => println!("✗ {}", error),
    }
}

// Example 2: a failing property and its shrunk counterexample
fn example_2_shrinking() {
    println!("\n=== Example 2: Shrinking ===");

    let prop = property(array(nat(1000), 20), |values: Vec<u64>| {
        if values.iter().sum::<u64>() > 500 {
            return Err(PropertyError::property_failed("sum above 500"));
        }
        Ok(())
    });

    let details = match check_with_config(&prop, Parameters::default().with_seed(42)) {
        Ok(details) => details,
        Err(error) => {
            println!("✗ {}", error);
            return;
        }
    };
    if let Some(report) = default_report_message(&details) {
        println!("{}", report);
    }

    // Replay the counterexample directly
    if let Some(path) = details.counterexample_path.clone() {
        let replay = Parameters::default().with_seed(details.seed).with_path(path);
        if let Ok(replayed) = check_with_config(&prop, replay) {
            println!("Replayed: {:?}", replayed.counterexample);
        }
    }
}

// Example 3: preconditions and verbose reports
fn example_3_preconditions() {
    println!("\n=== Example 3: Preconditions ===");

    let prop = property(
        integer(-50i64, 50).unwrap().map(|n| n * 2),
        |n: i64| -> Result<bool, PropertyError> {
            pre(n != 0)?;
            Ok(n.abs() >= 2)
        },
    );
    let parameters = Parameters::default()
        .with_num_runs(50)
        .with_verbose(VerbosityLevel::Verbose);
    match check_with_config(&prop, parameters) {
        Ok(details) => println!(
            "✓ {} runs, {} skipped by the precondition",
            details.num_runs, details.num_skips
        ),
        Err(error) => println!("✗ {}", error),
    }
}

fn main() {
    example_1_passing_property();
    example_2_shrinking();
    example_3_preconditions();
}
