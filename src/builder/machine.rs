//! Builder for constructing automatons.

use crate::automaton::{AssocSupplier, Automaton, Blueprint, Machine, Resolver, Step};
use crate::builder::error::BuildError;
use crate::builder::settings::AutomatonSettings;
use crate::core::{State, SystemTicker, Ticker};
use crate::random::Randomizer;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Builder for constructing automatons with a fluent API.
///
/// # Example
///
/// ```rust
/// use automatons::automaton::{Machine, Step};
/// use automatons::builder::AutomatonBuilder;
///
/// struct Ping {
///     remaining: u32,
/// }
///
/// impl Machine for Ping {
///     type State = &'static str;
/// }
///
/// let automaton = AutomatonBuilder::new(Ping { remaining: 3 })
///     .name("ping")
///     .initial("ping")
///     .on(
///         "ping",
///         Step::sync(|ping: &mut Ping, cx| {
///             ping.remaining -= 1;
///             Ok(if ping.remaining == 0 { cx.end() } else { cx.stay() })
///         }),
///     )
///     .build()
///     .unwrap();
///
/// assert_eq!(automaton.name(), "ping");
/// assert!(automaton.is_stopped());
/// ```
pub struct AutomatonBuilder<M: Machine> {
    machine: M,
    initial: Option<M::State>,
    name: Option<String>,
    max_age: Option<Duration>,
    ticker: Option<Arc<dyn Ticker>>,
    randomizer: Option<Arc<dyn Randomizer>>,
    assoc: Option<AssocSupplier>,
    manual_stop: bool,
    restartable: bool,
    steps: HashMap<M::State, Step<M>>,
    duplicate: Option<M::State>,
    resolver: Option<Resolver<M>>,
}

impl<M: Machine> AutomatonBuilder<M> {
    /// Create a new builder around the automaton's data.
    pub fn new(machine: M) -> Self {
        Self {
            machine,
            initial: None,
            name: None,
            max_age: None,
            ticker: None,
            randomizer: None,
            assoc: None,
            manual_stop: false,
            restartable: true,
            steps: HashMap::new(),
            duplicate: None,
            resolver: None,
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: M::State) -> Self {
        self.initial = Some(state);
        self
    }

    /// Name used in logs and errors. Defaults to `automaton-` plus a short
    /// random suffix.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Maximum age of a run; unbounded by default.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Clock for age tracking. Defaults to [`SystemTicker`].
    pub fn ticker(mut self, ticker: impl Ticker + 'static) -> Self {
        self.ticker = Some(Arc::new(ticker));
        self
    }

    pub fn randomizer(mut self, randomizer: impl Randomizer + 'static) -> Self {
        self.randomizer = Some(Arc::new(randomizer));
        self
    }

    /// Share one randomizer between several automatons.
    pub fn shared_randomizer(mut self, randomizer: Arc<dyn Randomizer>) -> Self {
        self.randomizer = Some(randomizer);
        self
    }

    /// Allow [`Automaton::stop`]. Disabled by default.
    pub fn manual_stop(mut self, enabled: bool) -> Self {
        self.manual_stop = enabled;
        self
    }

    /// Allow starting again once a run has stopped. Enabled by default.
    pub fn restartable(mut self, enabled: bool) -> Self {
        self.restartable = enabled;
        self
    }

    /// Create a fresh associated value at the start of every run, reachable
    /// through [`Context::assoc`](crate::automaton::Context::assoc).
    pub fn assoc<T, F>(mut self, supplier: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.assoc = Some(Arc::new(move || Box::new(supplier()) as Box<dyn Any + Send>));
        self
    }

    /// Apply loaded settings; fields left unset keep their current values.
    pub fn settings(mut self, settings: &AutomatonSettings) -> Self {
        if let Some(name) = &settings.name {
            self.name = Some(name.clone());
        }
        if let Some(max_age) = settings.max_age() {
            self.max_age = Some(max_age);
        }
        if let Some(manual_stop) = settings.manual_stop {
            self.manual_stop = manual_stop;
        }
        if let Some(restartable) = settings.restartable {
            self.restartable = restartable;
        }
        self
    }

    /// Like [`settings`](Self::settings), reading them from JSON.
    pub fn settings_json(self, json: &str) -> Result<Self, BuildError> {
        let settings = AutomatonSettings::from_json(json)?;
        Ok(self.settings(&settings))
    }

    /// Register the step for `state`.
    pub fn on(mut self, state: M::State, step: Step<M>) -> Self {
        if self.steps.contains_key(&state) {
            self.duplicate.get_or_insert(state);
        } else {
            self.steps.insert(state, step);
        }
        self
    }

    /// Resolve steps with a function instead of a registry.
    pub fn resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&M::State) -> Option<Step<M>> + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Use one step for every state, typically matching on
    /// [`Context::state`](crate::automaton::Context::state).
    pub fn dispatch(self, step: Step<M>) -> Self {
        self.resolver(move |_| Some(step.clone()))
    }

    pub(crate) fn has_randomizer(&self) -> bool {
        self.randomizer.is_some()
    }

    /// Build the automaton.
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<Automaton<M>, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;

        if let Some(state) = &self.duplicate {
            return Err(BuildError::DuplicateStep(state.name().into_owned()));
        }

        let resolver: Resolver<M> = match (self.resolver, self.steps.is_empty()) {
            (Some(_), false) => return Err(BuildError::ConflictingSteps),
            (Some(resolver), true) => resolver,
            (None, false) => {
                let steps = self.steps;
                Arc::new(move |state: &M::State| steps.get(state).cloned())
            }
            (None, true) => return Err(BuildError::NoSteps),
        };

        if !self.machine.check_state(&initial) {
            return Err(BuildError::RejectedInitialState(initial.name().into_owned()));
        }

        let name = self.name.unwrap_or_else(default_name);

        Ok(Automaton::from_blueprint(Blueprint {
            machine: self.machine,
            name,
            initial,
            max_age: self.max_age,
            resolver,
            ticker: self
                .ticker
                .unwrap_or_else(|| Arc::new(SystemTicker::new())),
            randomizer: self.randomizer,
            assoc: self.assoc,
            manual_stop: self.manual_stop,
            restartable: self.restartable,
        }))
    }
}

fn default_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("automaton-{}", &id[..8])
}
