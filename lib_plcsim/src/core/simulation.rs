//! # Simulation
//!
//! The plant: which variables exist, which generator drives each of them, the
//! mirror pair and the GPS variables fed from a track. [`SimulationPlan`]
//! describes it, [`Simulation::build`] creates the variables in a store and
//! [`Simulation::launch`] starts every component in a [`TaskGroup`].
//!
//! Each generator gets its own copy of its parameters and owns its state; no
//! two components write the same variable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::mirror::{MirrorEngine, DEFAULT_MIRROR_INTERVAL};
use crate::core::monitor;
use crate::core::task_group::TaskGroup;
use crate::error::EngineError;
use crate::generators::{drive, RandomWalk, Ramp, Toggle, Triangle};
use crate::ingestors::{Cadence, PlaybackMode, PositionUpdater, PresencePolicy, TrackFeed};
use crate::store::{RetentionPolicy, Variable, VariableStore, VariableType, VariableValue};

/// History kept for the triangular wave.
pub const DEFAULT_HISTORY_COUNT: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorKind {
    Toggle {
        init: bool,
        period: Duration,
    },
    Ramp {
        init: f64,
        increment: f64,
        period: Duration,
    },
    Random {
        init: f64,
        min: f64,
        max: f64,
        period: Duration,
    },
    Triangle {
        init: f64,
        step: f64,
        min: f64,
        max: f64,
        cycle_time: Duration,
    },
}

impl GeneratorKind {
    fn initial(&self) -> (VariableValue, VariableType) {
        match self {
            GeneratorKind::Toggle { init, .. } => (VariableValue::Boolean(*init), VariableType::Boolean),
            GeneratorKind::Ramp { init, .. }
            | GeneratorKind::Random { init, .. }
            | GeneratorKind::Triangle { init, .. } => (VariableValue::Double(*init), VariableType::Double),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSpec {
    pub name: String,
    pub kind: GeneratorKind,
    pub history: Option<RetentionPolicy>,
}

impl GeneratorSpec {
    pub fn new(name: &str, kind: GeneratorKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            history: None,
        }
    }

    pub fn historized(mut self, policy: RetentionPolicy) -> Self {
        self.history = Some(policy);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSpec {
    pub path: PathBuf,
    pub cadence: Cadence,
    pub mode: PlaybackMode,
    pub presence: PresencePolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPlan {
    pub generators: Vec<GeneratorSpec>,
    pub mirror_interval: Duration,
    pub feed: Option<FeedSpec>,
    pub snapshot_interval: Option<Duration>,
    /// Seeds the random generators for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            generators: plant_generators(DEFAULT_HISTORY_COUNT),
            mirror_interval: DEFAULT_MIRROR_INTERVAL,
            feed: None,
            snapshot_interval: None,
            seed: None,
        }
    }
}

/// The six generators of the demo plant.
pub fn plant_generators(history_count: usize) -> Vec<GeneratorSpec> {
    let secs = Duration::from_secs;
    vec![
        GeneratorSpec::new("BooleanData", GeneratorKind::Toggle { init: true, period: secs(10) }),
        GeneratorSpec::new(
            "PositiveTrendData",
            GeneratorKind::Ramp { init: 0.0, increment: 1.0, period: secs(5) },
        ),
        GeneratorSpec::new(
            "NegativeTrendData",
            GeneratorKind::Ramp { init: 0.0, increment: -2.0, period: secs(5) },
        ),
        GeneratorSpec::new(
            "TemperatureData",
            GeneratorKind::Random { init: 18.5, min: 15.0, max: 22.0, period: secs(10) },
        ),
        GeneratorSpec::new(
            "HumidityData",
            GeneratorKind::Random { init: 60.2, min: 0.0, max: 100.0, period: secs(10) },
        ),
        GeneratorSpec::new(
            "CyclicData",
            GeneratorKind::Triangle {
                init: 0.0,
                step: 0.5,
                min: -100.0,
                max: 100.0,
                cycle_time: secs(200),
            },
        )
        .historized(RetentionPolicy::with_count(history_count)),
    ]
}

/// Handles to every variable of the plant.
#[derive(Debug, Clone)]
pub struct SimulationVariables {
    pub generators: Vec<Variable>,
    pub mirror_original: Variable,
    pub mirror_copy: Variable,
    pub latitude: Variable,
    pub longitude: Variable,
    pub lat_long: Variable,
}

impl SimulationVariables {
    pub fn generator(&self, name: &str) -> Option<&Variable> {
        self.generators.iter().find(|v| v.name() == name)
    }
}

pub struct Simulation {
    store: Arc<dyn VariableStore>,
    plan: SimulationPlan,
    variables: SimulationVariables,
}

impl Simulation {
    /// Creates every variable of `plan` in `store` and registers history.
    pub fn build(store: Arc<dyn VariableStore>, plan: SimulationPlan) -> Result<Self, EngineError> {
        let mut generators = Vec::with_capacity(plan.generators.len());
        for spec in &plan.generators {
            let (initial, ty) = spec.kind.initial();
            let variable = Variable::create(&store, &spec.name, initial, ty)?;
            if let Some(policy) = spec.history {
                variable.historize(policy)?;
            }
            generators.push(variable);
        }

        let boolean = |name: &str| Variable::create(&store, name, true, VariableType::Boolean);
        let text = |name: &str| Variable::create(&store, name, "", VariableType::String);
        let variables = SimulationVariables {
            generators,
            mirror_original: boolean("MirrorDataOriginal")?,
            mirror_copy: boolean("MirrorDataCopy")?,
            latitude: text("GPSLatitude")?,
            longitude: text("GPSLongitude")?,
            lat_long: text("GPSLatitudeAndLongitude")?,
        };

        tracing::info!(
            variables = variables.generators.len() + 5,
            track = plan.feed.is_some(),
            "simulation built"
        );
        Ok(Self {
            store,
            plan,
            variables,
        })
    }

    pub fn variables(&self) -> &SimulationVariables {
        &self.variables
    }

    pub fn store(&self) -> &Arc<dyn VariableStore> {
        &self.store
    }

    /// Spawns every generator, the mirror, the track feed and the monitor
    /// into `group`. Generator parameters are validated before anything is
    /// spawned.
    pub fn launch(self, group: &mut TaskGroup) -> Result<(), EngineError> {
        let mut pending = Vec::with_capacity(self.plan.generators.len());
        for (idx, (spec, variable)) in self
            .plan
            .generators
            .iter()
            .zip(&self.variables.generators)
            .enumerate()
        {
            let seed = self.plan.seed.map(|s| s.wrapping_add(idx as u64));
            pending.push((spec.name.clone(), generator_task(variable.clone(), &spec.kind, seed)?));
        }
        for (name, task) in pending {
            group.spawn(name, task);
        }

        let mirror = MirrorEngine::new(
            self.variables.mirror_original.clone(),
            self.variables.mirror_copy.clone(),
            self.plan.mirror_interval,
        );
        group.spawn("mirror", async move { mirror.start()?.run().await });

        if let Some(feed) = &self.plan.feed {
            let updater = PositionUpdater::new(
                self.variables.latitude.clone(),
                self.variables.longitude.clone(),
                self.variables.lat_long.clone(),
                feed.presence,
            );
            let track = TrackFeed::new(feed.path.clone(), feed.cadence, feed.mode);
            group.spawn("track_feed", updater.start(track));
        }

        if let Some(every) = self.plan.snapshot_interval {
            group.spawn("monitor", monitor::run(Arc::clone(&self.store), every));
        }

        tracing::info!(tasks = group.len(), "simulation launched");
        Ok(())
    }
}

type GeneratorTask = std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), EngineError>> + Send>>;

fn generator_task(
    variable: Variable,
    kind: &GeneratorKind,
    seed: Option<u64>,
) -> Result<GeneratorTask, EngineError> {
    Ok(match *kind {
        GeneratorKind::Toggle { init, period } => Box::pin(drive(variable, Toggle::new(init, period))),
        GeneratorKind::Ramp {
            init,
            increment,
            period,
        } => Box::pin(drive(variable, Ramp::new(init, increment, period))),
        GeneratorKind::Random {
            init,
            min,
            max,
            period,
        } => {
            let walk = match seed {
                Some(seed) => RandomWalk::seeded(init, min, max, period, seed)?,
                None => RandomWalk::new(init, min, max, period)?,
            };
            Box::pin(drive(variable, walk))
        }
        GeneratorKind::Triangle {
            init,
            step,
            min,
            max,
            cycle_time,
        } => Box::pin(drive(variable, Triangle::new(init, step, min, max, cycle_time)?)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_build_creates_the_plant() {
        let store: Arc<dyn VariableStore> = Arc::new(MemoryStore::new());
        let sim = Simulation::build(Arc::clone(&store), SimulationPlan::default()).unwrap();

        let names: Vec<_> = store.snapshot().unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(
            names,
            vec![
                "BooleanData",
                "PositiveTrendData",
                "NegativeTrendData",
                "TemperatureData",
                "HumidityData",
                "CyclicData",
                "MirrorDataOriginal",
                "MirrorDataCopy",
                "GPSLatitude",
                "GPSLongitude",
                "GPSLatitudeAndLongitude",
            ]
        );
        assert_eq!(
            sim.variables().generator("TemperatureData").unwrap().read_value().unwrap(),
            VariableValue::Double(18.5)
        );
    }

    #[test]
    fn test_invalid_generator_spawns_nothing() {
        let store: Arc<dyn VariableStore> = Arc::new(MemoryStore::new());
        let plan = SimulationPlan {
            generators: vec![
                GeneratorSpec::new("Ok", GeneratorKind::Toggle { init: false, period: Duration::from_secs(1) }),
                GeneratorSpec::new(
                    "Broken",
                    GeneratorKind::Triangle {
                        init: 0.0,
                        step: 0.0,
                        min: 0.0,
                        max: 1.0,
                        cycle_time: Duration::from_secs(1),
                    },
                ),
            ],
            ..SimulationPlan::default()
        };

        let sim = Simulation::build(store, plan).unwrap();
        let mut group = TaskGroup::new();
        assert!(matches!(sim.launch(&mut group), Err(EngineError::InvalidConfig(_))));
        assert!(group.is_empty());
    }
}
