//! Recursive arbitraries through named, late-bound placeholders.
//!
//! [`letrec`] hands a [`Tie`] to a builder. `tie.tie(name)` returns a placeholder usable
//! anywhere an arbitrary is expected, even before the arbitrary named `name` exists.
//! Once the builder returns its definitions, every placeholder is bound to the
//! definition of its name.
//!
//! ```rust
//! use prova::{letrec, nat, frequency, weighted, Arbitrary};
//!
//! #[derive(Debug, Clone)]
//! enum Tree {
//!     Leaf(u64),
//!     Node(Box<Tree>, Box<Tree>),
//! }
//!
//! let definitions = letrec(|tie| {
//!     vec![
//!         (
//!             "tree",
//!             frequency(vec![weighted(2, tie.tie("leaf")), weighted(1, tie.tie("node"))])
//!                 .unwrap()
//!                 .boxed(),
//!         ),
//!         (
//!             "node",
//!             tie.tie("tree")
//!                 .zip(tie.tie("tree"))
//!                 .map(|(l, r)| Tree::Node(Box::new(l), Box::new(r)))
//!                 .boxed(),
//!         ),
//!         ("leaf", nat(10).map(Tree::Leaf).boxed()),
//!     ]
//! });
//! let tree = definitions["tree"].clone();
//! # let _ = tree;
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::arbitrary::{Arbitrary, BoxedArbitrary};
use crate::error::ArbitraryError;
use crate::random::Random;
use crate::shrinkable::Shrinkable;

/// Nested `with_bias` calls a placeholder forwards before returning itself
pub const MAX_BIAS_LEVELS: usize = 5;

struct LazyCell<T> {
    name: String,
    underlying: OnceLock<BoxedArbitrary<T>>,
}

thread_local! {
    /// `with_bias` calls in progress on this thread, per placeholder
    static BIAS_LEVELS: RefCell<HashMap<usize, usize>> = RefCell::new(HashMap::new());
}

/// One level of `with_bias` recursion through a placeholder, released on drop
struct BiasLevel {
    cell: usize,
}

impl BiasLevel {
    /// `None` once the placeholder already recursed `MAX_BIAS_LEVELS` times
    fn enter(cell: usize) -> Option<Self> {
        BIAS_LEVELS.with(|levels| {
            let mut levels = levels.borrow_mut();
            let level = levels.entry(cell).or_insert(0);
            if *level >= MAX_BIAS_LEVELS {
                return None;
            }
            *level += 1;
            Some(Self { cell })
        })
    }
}

impl Drop for BiasLevel {
    fn drop(&mut self) {
        BIAS_LEVELS.with(|levels| {
            let mut levels = levels.borrow_mut();
            if let Some(level) = levels.get_mut(&self.cell) {
                *level -= 1;
                if *level == 0 {
                    levels.remove(&self.cell);
                }
            }
        });
    }
}

/// Placeholder for an arbitrary defined later by [`letrec`]
pub struct LazyArbitrary<T> {
    cell: Arc<LazyCell<T>>,
}

impl<T> Clone for LazyArbitrary<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> LazyArbitrary<T> {
    fn new(name: String) -> Self {
        Self {
            cell: Arc::new(LazyCell {
                name,
                underlying: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.cell.name
    }

    pub fn is_bound(&self) -> bool {
        self.cell.underlying.get().is_some()
    }

    /// Bind the placeholder; later bindings are ignored
    fn bind(&self, arbitrary: BoxedArbitrary<T>) {
        let _ = self.cell.underlying.set(arbitrary);
    }

    fn underlying(&self) -> &BoxedArbitrary<T> {
        match self.cell.underlying.get() {
            Some(underlying) => underlying,
            None => ArbitraryError::UnboundLazy {
                name: self.cell.name.clone(),
            }
            .raise(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Arbitrary for LazyArbitrary<T> {
    type Value = T;

    fn generate(&self, random: &mut Random) -> Shrinkable<T> {
        self.underlying().generate(random)
    }

    fn with_bias(&self, freq: u32) -> BoxedArbitrary<T> {
        let underlying = self.underlying();
        match BiasLevel::enter(Arc::as_ptr(&self.cell) as usize) {
            Some(_level) => underlying.with_bias(freq),
            None => self.clone().boxed(),
        }
    }
}

/// Hands out placeholders during a [`letrec`] definition
pub struct Tie<T> {
    cells: RefCell<HashMap<String, LazyArbitrary<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Tie<T> {
    /// Placeholder for the definition named `name`; the same name always gives the
    /// same placeholder
    pub fn tie(&self, name: impl Into<String>) -> BoxedArbitrary<T> {
        let name = name.into();
        self.cells
            .borrow_mut()
            .entry(name.clone())
            .or_insert_with(|| LazyArbitrary::new(name))
            .clone()
            .boxed()
    }
}

/// Build mutually recursive arbitraries.
///
/// Definitions are returned as written by `builder`. Placeholders whose name has no
/// definition stay unbound and fail on first use.
///
/// Placeholders keep their definition alive, so any definition stays usable after the
/// returned map is dropped. Recursive definitions therefore form reference cycles that
/// are never freed: build them once and reuse them rather than calling `letrec` per run.
pub fn letrec<T, K, D, F>(builder: F) -> HashMap<String, BoxedArbitrary<T>>
where
    T: Clone + Send + Sync + 'static,
    K: Into<String>,
    D: IntoIterator<Item = (K, BoxedArbitrary<T>)>,
    F: FnOnce(&Tie<T>) -> D,
{
    let tie = Tie {
        cells: RefCell::new(HashMap::new()),
    };
    let definitions: HashMap<String, BoxedArbitrary<T>> = builder(&tie)
        .into_iter()
        .map(|(name, arbitrary)| (name.into(), arbitrary))
        .collect();
    for (name, cell) in tie.cells.into_inner() {
        match definitions.get(&name) {
            Some(definition) => cell.bind(definition.clone()),
            None => tracing::debug!(name = %name, "letrec placeholder left unbound"),
        }
    }
    definitions
}
