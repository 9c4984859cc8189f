//! Model-based testing of a stack
//!
//! The real stack drops pushes once it holds three elements. Running random command
//! sequences against a `Vec` model finds the bug and shrinks the failing sequence to
//! four pushes. The printed replay token, together with the seed and the path,
//! replays that sequence directly.

use prova::{
    Arbitrary, BoxedArbitrary, Parameters, PropertyError, check_with_config, constant,
    default_report_message, nat, property,
};
use prova_stateful::prelude::*;

#[derive(Default)]
struct Stack {
    items: Vec<u8>,
}

impl Stack {
    fn push(&mut self, value: u8) {
        if self.items.len() < 3 {
            self.items.push(value);
        }
    }

    fn pop(&mut self) -> Option<u8> {
        self.items.pop()
    }
}

#[derive(Debug, Clone)]
enum StackOp {
    Push(u8),
    Pop,
}

impl Command for StackOp {
    type Model = Vec<u8>;
    type Real = Stack;

    fn check(&self, model: &Vec<u8>) -> bool {
        matches!(self, StackOp::Push(_)) || !model.is_empty()
    }

    fn run(&self, model: &mut Vec<u8>, real: &mut Stack) -> Result<(), PropertyError> {
        match self {
            StackOp::Push(value) => {
                model.push(*value);
                real.push(*value);
            }
            StackOp::Pop => {
                if model.pop() != real.pop() {
                    return Err(PropertyError::property_failed("popped a different value"));
                }
            }
        }
        if model.len() != real.items.len() {
            return Err(PropertyError::property_failed("size mismatch"));
        }
        Ok(())
    }
}

fn ops() -> Vec<BoxedArbitrary<StackOp>> {
    vec![
        nat(255).map(|value| StackOp::Push(value as u8)).boxed(),
        constant(StackOp::Pop).boxed(),
    ]
}

fn run(settings: CommandsSettings, parameters: Parameters) -> Option<String> {
    let arbitrary = match commands(ops(), settings) {
        Ok(arbitrary) => arbitrary,
        Err(error) => return Some(error.to_string()),
    };
    let prop = property(arbitrary, |cmds: CommandsIterable<StackOp>| {
        model_run(|| (Vec::new(), Stack::default()), &cmds)
    });
    match check_with_config(&prop, parameters) {
        Ok(details) => {
            let report = default_report_message(&details);
            if let (Some(counterexample), Some(path)) =
                (&details.counterexample, &details.counterexample_path)
            {
                println!(
                    "Replay with seed {}, path {:?} and {}",
                    details.seed,
                    path,
                    counterexample.replay_token()
                );
            }
            report
        }
        Err(error) => Some(error.to_string()),
    }
}

fn main() {
    println!("=== Stack model ===");
    match run(CommandsSettings::default(), Parameters::default()) {
        Some(report) => println!("{}", report),
        None => println!("✓ No failure found"),
    }
}
