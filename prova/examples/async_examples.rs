//! Async property testing examples
//!
//! Async predicates are awaited one at a time by the runner. Timeouts turn slow
//! executions into failures and async stringifiers can enrich failure reports.

use std::time::Duration;

use prova::{
    Parameters, PropertyError, async_default_report_message, async_property,
    check_async_with_config, nat,
};
use tokio::time::sleep;

// Example 1: an async property that holds
async fn example_1_basic_async() {
    println!("=== Example 1: Basic Async Property ===");

    let prop = async_property(nat(20), |millis: u64| async move {
        let started = tokio::time::Instant::now();
        sleep(Duration::from_millis(millis)).await;
        started.elapsed() >= Duration::from_millis(millis)
    });

    match check_async_with_config(prop, Parameters::default().with_num_runs(20)).await {
        Ok(details) => println!("✓ Sleeps last long enough ({} runs)", details.num_runs),
        Err(error) => println!("✗ {}", error),
    }
}

// Example 2: timeouts
async fn example_2_timeout() {
    println!("\n=== Example 2: Timeouts ===");

    let prop = async_property(nat(100), |millis: u64| async move {
        sleep(Duration::from_millis(millis)).await;
        Ok::<(), PropertyError>(())
    });
    let parameters = Parameters::default()
        .with_seed(7)
        .with_num_runs(20)
        .with_timeout(Duration::from_millis(30));

    match check_async_with_config(prop, parameters).await {
        Ok(details) => {
            let report = async_default_report_message(&details, |value| {
                let value = *value;
                async move { format!("{} ms", value) }
            })
            .await;
            println!("{}", report.unwrap_or_else(|| "no failure".to_string()));
        }
        Err(error) => println!("✗ {}", error),
    }
}

#[tokio::main]
async fn main() {
    example_1_basic_async().await;
    example_2_timeout().await;
}
