//! Arbitrary sequences of commands with a shrinker aware of which commands ran.
//!
//! Only the commands that actually ran during a failing execution are kept when
//! shrinking. Which commands ran is recorded as a replay path; the token of that path,
//! passed back through [`CommandsSettings::with_replay_path`] together with the seed and
//! the counterexample path of the run, replays the shrunk sequence without having to
//! execute the intermediate steps.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use prova::{
    Arbitrary, ArbitraryError, BoxedArbitrary, IntegerArbitrary, Random, Shrinkable, Shrinks, nat,
    one_of,
};
use tracing::trace;

use crate::command::CommandWrapper;
use crate::replay_path;

/// Settings of [`commands`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandsSettings {
    /// Longest generated sequence
    pub max_commands: u64,
    /// Compact replay path of a previous failure
    pub replay_path: Option<String>,
    /// Do not attach the replay token to generated sequences
    pub disable_replay_log: bool,
}

impl Default for CommandsSettings {
    fn default() -> Self {
        Self {
            max_commands: 10,
            replay_path: None,
            disable_replay_log: false,
        }
    }
}

impl CommandsSettings {
    pub fn with_max_commands(mut self, max_commands: u64) -> Self {
        self.max_commands = max_commands;
        self
    }

    /// Replay a previous failure; accepts the compact path or the full
    /// `replayPath="..."` token
    pub fn with_replay_path(mut self, replay_path: impl Into<String>) -> Self {
        self.replay_path = Some(replay_path.into());
        self
    }

    pub fn disable_replay_log(mut self) -> Self {
        self.disable_replay_log = true;
        self
    }
}

/// Bits of the replay path gathered during the current shrink descent
#[derive(Debug, Default)]
struct ReplayState {
    path: Vec<bool>,
    position: usize,
}

type SharedReplay = Arc<Mutex<ReplayState>>;

/// The commands of a generated sequence
pub struct CommandsIterable<C> {
    commands: Vec<CommandWrapper<C>>,
    replay: SharedReplay,
    disable_replay_log: bool,
}

impl<C: Clone> Clone for CommandsIterable<C> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            replay: self.replay.clone(),
            disable_replay_log: self.disable_replay_log,
        }
    }
}

impl<C> CommandsIterable<C> {
    pub fn iter(&self) -> std::slice::Iter<'_, CommandWrapper<C>> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands that ran, in order
    pub fn executed(&self) -> Vec<&C> {
        self.commands
            .iter()
            .filter(|wrapper| wrapper.has_ran())
            .map(|wrapper| wrapper.command())
            .collect()
    }

    /// `replayPath="<token>"` for the path recorded so far, empty when replay logs are
    /// disabled
    pub fn replay_token(&self) -> String {
        if self.disable_replay_log {
            return String::new();
        }
        replay_path::to_token(&self.replay.lock().path)
    }
}

impl<'a, C> IntoIterator for &'a CommandsIterable<C> {
    type Item = &'a CommandWrapper<C>;
    type IntoIter = std::slice::Iter<'a, CommandWrapper<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// Lists the commands that ran, followed by the replay token.
///
/// The alternate form (`{:#?}`) lists every generated command, whether it ran or not,
/// and leaves the replay token out. It identifies the sequence itself and is what
/// `ignore_equal_values` compares.
impl<C: fmt::Debug> fmt::Debug for CommandsIterable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f.debug_list().entries(&self.commands).finish();
        }
        let executed: Vec<String> = self
            .commands
            .iter()
            .filter(|wrapper| wrapper.has_ran())
            .map(|wrapper| format!("{:?}", wrapper))
            .collect();
        write!(f, "{}", executed.join(","))?;
        let token = self.replay_token();
        if !token.is_empty() {
            write!(f, " /*{}*/", token)?;
        }
        Ok(())
    }
}

/// Arbitrary sequences of commands, see [`commands`]
pub struct CommandsArbitrary<C> {
    command: BoxedArbitrary<CommandWrapper<C>>,
    length: IntegerArbitrary<u64>,
    source_replay_path: Option<String>,
    disable_replay_log: bool,
    replay: SharedReplay,
}

impl<C> Clone for CommandsArbitrary<C> {
    fn clone(&self) -> Self {
        Self {
            command: self.command.clone(),
            length: self.length,
            source_replay_path: self.source_replay_path.clone(),
            disable_replay_log: self.disable_replay_log,
            replay: self.replay.clone(),
        }
    }
}

/// Build an arbitrary generating sequences of commands drawn from `command_arbitraries`.
///
/// Fails when no command arbitrary is given or when the replay path cannot be decoded.
/// Every generated sequence keeps its own replay state, so a single arbitrary may drive
/// several runs at once.
pub fn commands<C>(
    command_arbitraries: Vec<BoxedArbitrary<C>>,
    settings: CommandsSettings,
) -> Result<CommandsArbitrary<C>, ArbitraryError>
where
    C: Clone + fmt::Debug + Send + Sync + 'static,
{
    let command = one_of(command_arbitraries)?.map(CommandWrapper::new).boxed();
    let source_replay_path = match settings.replay_path {
        Some(token) => {
            let compact = replay_path::from_token(&token)?;
            replay_path::parse(&compact)?;
            Some(compact)
        }
        None => None,
    };
    Ok(CommandsArbitrary {
        command,
        length: nat(settings.max_commands),
        source_replay_path,
        disable_replay_log: settings.disable_replay_log,
        replay: Arc::new(Mutex::new(ReplayState::default())),
    })
}

type Items<C> = Arc<Vec<Shrinkable<CommandWrapper<C>>>>;

impl<C> CommandsArbitrary<C>
where
    C: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn iterable(&self, items: &[Shrinkable<CommandWrapper<C>>]) -> CommandsIterable<C> {
        CommandsIterable {
            commands: items.iter().map(|item| item.value().clone()).collect(),
            replay: self.replay.clone(),
            disable_replay_log: self.disable_replay_log,
        }
    }

    fn wrap(&self, items: Items<C>, shrunk_once: bool) -> Shrinkable<CommandsIterable<C>> {
        let value = self.iterable(&items);
        let arbitrary = self.clone();
        Shrinkable::with_shrink(value, move || {
            let parent = arbitrary.clone();
            Box::new(
                arbitrary
                    .shrink_items(&items, shrunk_once)
                    .map(move |candidate| parent.wrap(Arc::new(candidate), true)),
            )
        })
    }

    /// Keep the commands that ran, reading the replay path while it lasts and recording
    /// the live flags past its end
    fn filter_executed(
        &self,
        items: &[Shrinkable<CommandWrapper<C>>],
    ) -> Vec<Shrinkable<CommandWrapper<C>>> {
        let mut replay = self.replay.lock();
        if replay.position == 0 {
            replay.path = match &self.source_replay_path {
                Some(compact) => replay_path::parse(compact).unwrap_or_else(|error| error.raise()),
                None => Vec::new(),
            };
        }
        let mut executed = Vec::with_capacity(items.len());
        for item in items {
            let has_ran = item.value().has_ran();
            let position = replay.position;
            if let Some(&replayed) = replay.path.get(position) {
                trace!(position, replayed, has_ran, "replaying command slot");
                if replayed {
                    executed.push(item.clone());
                } else if has_ran {
                    drop(replay);
                    ArbitraryError::ReplayMismatch.raise();
                }
            } else {
                replay.path.push(has_ran);
                if has_ran {
                    executed.push(item.clone());
                }
            }
            replay.position += 1;
        }
        executed
    }

    fn shrink_items(
        &self,
        items: &[Shrinkable<CommandWrapper<C>>],
        shrunk_once: bool,
    ) -> Box<dyn Iterator<Item = Vec<Shrinkable<CommandWrapper<C>>>> + Send> {
        let items = Arc::new(self.filter_executed(items));
        if items.is_empty() {
            return Box::new(std::iter::empty());
        }
        let total = items.len();

        let empty = (!shrunk_once).then(Vec::new);

        // The last command is presumably the one triggering the failure: always keep it
        let length = self.length;
        let suffixes = {
            let items = items.clone();
            (0..total).flat_map(move |num_to_keep| {
                let items = items.clone();
                let kept = (total - 1 - num_to_keep) as u64;
                length.shrinkable_for(kept, false).shrink().map(move |suffix| {
                    let suffix = *suffix.value() as usize;
                    let mut candidate = items[..num_to_keep].to_vec();
                    candidate.extend_from_slice(&items[total - (suffix + 1)..]);
                    candidate
                })
            })
        };

        let per_item = {
            let items = items.clone();
            (0..total).flat_map(move |index| {
                let items = items.clone();
                let shrinks: Shrinks<CommandWrapper<C>> = items[index].shrink();
                shrinks.map(move |smaller| {
                    let mut candidate = items.as_ref().clone();
                    candidate[index] = smaller;
                    candidate
                })
            })
        };

        Box::new(
            empty
                .into_iter()
                .chain(suffixes)
                .chain(per_item)
                .map(|candidate| {
                    candidate
                        .into_iter()
                        .map(|item| item.with_value(item.value().fresh()))
                        .collect()
                }),
        )
    }
}

impl<C> Arbitrary for CommandsArbitrary<C>
where
    C: Clone + fmt::Debug + Send + Sync + 'static,
{
    type Value = CommandsIterable<C>;

    fn generate(&self, random: &mut Random) -> Shrinkable<CommandsIterable<C>> {
        let size = self.length.generate(random).into_value();
        let items: Vec<_> = (0..size).map(|_| self.command.generate(random)).collect();
        // Each generated sequence records its own replay path
        let tree = Self {
            replay: SharedReplay::default(),
            ..self.clone()
        };
        tree.wrap(Arc::new(items), false)
    }

    /// Sequences are generated without bias
    fn with_bias(&self, _freq: u32) -> BoxedArbitrary<CommandsIterable<C>> {
        self.clone().boxed()
    }
}
