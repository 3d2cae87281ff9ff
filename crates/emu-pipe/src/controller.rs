//! Iteration controller: drives Init, Dispatch, Await, Evaluate and Decide
//! over the ranks of a [`LocalCluster`].
//!
//! The coordinator owns the sample store and is the only rank that calls the
//! model. Workers hold no state between iterations; everything they need
//! arrives in the broadcast [`IterationContext`] and their [`WorkUnit`].

use std::sync::Mutex;
use std::time::Instant;

use emu_core::rng::{training_stream, POOL_STREAM};
use emu_core::threads::available_cores;
use emu_core::{
    EmuError, ErrorInfo, Observation, ParameterSpace, Rank, RngHandle, Sample, SystemId,
    ThreadBudget,
};
use emu_dist::throughput::predicted_eval_rate_with_costs;
use emu_dist::{Communicator, LocalCluster, Partition, Transport};
use emu_kernel::{
    evaluate_candidates, fit_system, FittedSystem, KernelPool, KernelSettings, PolynomialBasis,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::model::{evaluate_checked, mock_observations, ModelEvaluator};
use crate::policy::{ContinuationCriterion, ImplausibilityCut, IterationLimit, PlausibilityPolicy};
use crate::report::{build_provenance, fraction, IterationStats, PhaseRecord, RunReport};
use crate::sampling::{choose_indices, latin_hypercube};
use crate::store::{IterationRecord, SampleStore};

fn protocol_violation(message: impl Into<String>) -> EmuError {
    EmuError::Comm(ErrorInfo::new("comm_protocol_violation", message.into()))
}

/// Controller state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Draw and evaluate the training samples.
    Init,
    /// Partition the systems and hand out the work.
    Dispatch,
    /// Fit systems and collect the results.
    Await,
    /// Apply the plausibility policy to the candidate pool.
    Evaluate,
    /// Commit the iteration and decide whether to continue.
    Decide,
    /// Construction finished.
    Done,
}

/// Everything a rank needs to work on one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationContext {
    /// One-based iteration index.
    pub iteration: usize,
    /// Model parameter space.
    pub space: ParameterSpace,
    /// Observation per system.
    pub observations: Vec<Observation>,
    /// Evaluated training samples.
    pub training: Vec<Sample>,
    /// Candidates plausible on entry, in pool order.
    pub candidates: Vec<Vec<f64>>,
    /// Kernel settings.
    pub kernel: KernelSettings,
}

/// What the coordinator tells the workers at the top of every loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Directive {
    /// Work on another iteration.
    Iterate(Box<IterationContext>),
    /// Leave the loop.
    Done,
}

/// Systems assigned to one rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Iteration the assignment belongs to.
    pub iteration: usize,
    /// Assigned systems.
    pub systems: Vec<SystemId>,
}

/// A fitted system and its implausibility over the candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemResult {
    /// Fitted emulator system.
    pub fitted: FittedSystem,
    /// Implausibility per candidate, in candidate order.
    pub implausibility: Vec<f64>,
}

/// Results returned by one rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReply {
    /// Replying rank.
    pub rank: Rank,
    /// Iteration the results belong to.
    pub iteration: usize,
    /// One result per assigned system.
    pub results: Vec<SystemResult>,
}

/// Fits every system of `unit` and scores the context's candidates.
pub fn compute_work_unit(
    context: &IterationContext,
    unit: &WorkUnit,
    rank: Rank,
    pool: &KernelPool,
) -> Result<WorkerReply, EmuError> {
    if unit.iteration != context.iteration {
        return Err(protocol_violation("work unit belongs to another iteration")
            .with_context("context", context.iteration)
            .with_context("unit", unit.iteration));
    }
    let mut results = Vec::with_capacity(unit.systems.len());
    for &system in &unit.systems {
        let observation = context.observations.get(system.index()).ok_or_else(|| {
            protocol_violation("work unit names an unknown system")
                .with_context("system", system.as_raw())
        })?;
        let fitted = fit_system(system, &context.training, &context.space, &context.kernel)
            .map_err(|err| err.with_context("rank", rank).with_context("iteration", context.iteration))?;
        let evaluation = evaluate_candidates(&fitted, observation, &context.candidates, pool)?;
        results.push(SystemResult {
            fitted,
            implausibility: evaluation.implausibility,
        });
    }
    debug!(rank, iteration = context.iteration, systems = results.len(), "work unit done");
    Ok(WorkerReply {
        rank,
        iteration: context.iteration,
        results,
    })
}

/// Orders the gathered results by system.
///
/// Every system of the partition must come back exactly once, from its
/// owner, with one implausibility per candidate.
pub fn collect_results(
    partition: &Partition,
    iteration: usize,
    n_candidates: usize,
    replies: Vec<WorkerReply>,
) -> Result<Vec<SystemResult>, EmuError> {
    let mut slots: Vec<Option<SystemResult>> = vec![None; partition.n_systems()];
    for reply in replies {
        if reply.iteration != iteration {
            return Err(protocol_violation("reply belongs to another iteration")
                .with_context("rank", reply.rank)
                .with_context("expected", iteration)
                .with_context("found", reply.iteration));
        }
        for result in reply.results {
            let system = result.fitted.system();
            if partition.owner(system) != Some(reply.rank) {
                return Err(protocol_violation("system returned by a rank that does not own it")
                    .with_context("rank", reply.rank)
                    .with_context("system", system.as_raw()));
            }
            if result.implausibility.len() != n_candidates {
                return Err(protocol_violation("implausibility count does not match the pool")
                    .with_context("system", system.as_raw())
                    .with_context("expected", n_candidates)
                    .with_context("found", result.implausibility.len()));
            }
            let slot = &mut slots[system.index()];
            if slot.is_some() {
                return Err(protocol_violation("system returned twice")
                    .with_context("rank", reply.rank)
                    .with_context("system", system.as_raw()));
            }
            *slot = Some(result);
        }
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.ok_or_else(|| {
                protocol_violation("no result for an assigned system")
                    .with_context("system", idx)
                    .with_context("owner", partition.assignments()[idx])
            })
        })
        .collect()
}

/// Result of a construction run.
#[derive(Debug, Clone)]
pub struct Construction {
    /// Store holding every completed iteration.
    pub store: SampleStore,
    /// Report of the run.
    pub report: RunReport,
}

enum RankOutcome {
    Coordinator(Box<Construction>),
    Worker,
}

/// Builds emulator iterations across the configured number of ranks.
pub struct Controller {
    config: PipelineConfig,
    model: Box<dyn ModelEvaluator>,
    plausibility: Box<dyn PlausibilityPolicy>,
    continuation: Box<dyn ContinuationCriterion>,
    budget: ThreadBudget,
}

impl Controller {
    /// Controller for the model named in `config`.
    pub fn new(config: PipelineConfig) -> Result<Self, EmuError> {
        config.validate()?;
        let model = config.model.build()?;
        Self::with_model(config, model)
    }

    /// Controller for an externally supplied model.
    pub fn with_model(config: PipelineConfig, model: Box<dyn ModelEvaluator>) -> Result<Self, EmuError> {
        config.validate()?;
        let setting = config.runtime.thread_setting()?;
        let budget = ThreadBudget::resolve(setting, available_cores(), config.runtime.processes);
        let plausibility = Box::new(ImplausibilityCut::new(&config.impl_cut)?);
        let continuation = Box::new(IterationLimit {
            max_iterations: config.continuation.max_iterations,
            min_plausible: config.continuation.min_plausible,
        });
        Ok(Self {
            config,
            model,
            plausibility,
            continuation,
            budget,
        })
    }

    /// Replaces the plausibility policy.
    pub fn with_plausibility(mut self, policy: Box<dyn PlausibilityPolicy>) -> Self {
        self.plausibility = policy;
        self
    }

    /// Replaces the continuation criterion.
    pub fn with_continuation(mut self, criterion: Box<dyn ContinuationCriterion>) -> Self {
        self.continuation = criterion;
        self
    }

    /// Configuration of the run.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Kernel thread budget of every rank.
    pub fn budget(&self) -> ThreadBudget {
        self.budget
    }

    /// Empty store holding the observations the emulator is compared against.
    ///
    /// Without explicit observations, mock data is generated from the model.
    /// Explicit observations without a discrepancy variance take the model's
    /// value for their data point, when the model defines one.
    pub fn new_store(&self) -> Result<SampleStore, EmuError> {
        let observations = if self.config.data.observations.is_empty() {
            mock_observations(
                self.model.as_ref(),
                &self.config.data.mock_idx,
                self.config.seed_policy.master_seed,
            )?
            .observations
        } else {
            self.with_model_discrepancy(self.config.data.observations.clone())
        };
        Ok(SampleStore::new(
            self.model.space().clone(),
            observations,
            self.config.impl_cut.clone(),
        ))
    }

    fn with_model_discrepancy(&self, mut observations: Vec<Observation>) -> Vec<Observation> {
        let data_idx: Vec<f64> = observations.iter().map(|obs| obs.data_idx).collect();
        let Some(md_var) = self.model.md_variance(&data_idx) else {
            return observations;
        };
        for (observation, var) in observations.iter_mut().zip(md_var) {
            if observation.md_var.is_none() && var.is_finite() && var >= 0.0 {
                observation.md_var = Some(var);
            }
        }
        observations
    }

    /// Constructs a new emulator from scratch.
    pub fn construct(&self) -> Result<Construction, EmuError> {
        let store = self.new_store()?;
        self.resume(store)
    }

    /// Continues construction from the iterations already held by `store`.
    pub fn resume(&self, store: SampleStore) -> Result<Construction, EmuError> {
        if store.space() != self.model.space() {
            return Err(EmuError::Config(
                ErrorInfo::new("config_invalid", "store was built for a different parameter space")
                    .with_context("model", self.model.name()),
            ));
        }
        if store.n_systems() == 0 {
            return Err(EmuError::Config(ErrorInfo::new(
                "config_invalid",
                "no observations to emulate",
            )));
        }
        let processes = self.config.runtime.processes;
        info!(
            processes,
            threads = self.budget.threads,
            capped = self.budget.capped,
            systems = store.n_systems(),
            resumed = store.n_iterations(),
            "starting emulator construction"
        );
        let slot = Mutex::new(Some(store));
        let outcomes = LocalCluster::launch(processes, self.config.runtime.timeout(), |mut comm| {
            let pool = KernelPool::new(comm.rank(), self.budget)?;
            if comm.is_coordinator() {
                let store = slot
                    .lock()
                    .ok()
                    .and_then(|mut guard| guard.take())
                    .ok_or_else(|| protocol_violation("coordinator started twice"))?;
                self.coordinate(&mut comm, &pool, store)
                    .map(|construction| RankOutcome::Coordinator(Box::new(construction)))
            } else {
                work(&mut comm, &pool).map(|_| RankOutcome::Worker)
            }
        })?;
        outcomes
            .into_iter()
            .find_map(|outcome| match outcome {
                RankOutcome::Coordinator(construction) => Some(*construction),
                RankOutcome::Worker => None,
            })
            .ok_or_else(|| protocol_violation("coordinator produced no result"))
    }

    fn minimum_training(&self, space: &ParameterSpace) -> usize {
        PolynomialBasis::new(self.config.kernel.poly_order, space.dim())
            .map(|basis| basis.terms())
            .unwrap_or(1)
    }

    fn may_continue(&self, store: &SampleStore) -> bool {
        match store.latest() {
            None => true,
            Some(latest) => {
                let plausible = latest.plausible.len();
                if plausible < self.minimum_training(store.space()) {
                    info!(
                        iteration = latest.iteration,
                        plausible, "plausible pool too small to train another iteration"
                    );
                    return false;
                }
                self.continuation.should_continue(latest.iteration, plausible)
            }
        }
    }

    fn training_set(&self, store: &SampleStore, iteration: usize) -> Result<Vec<Sample>, EmuError> {
        let seed = self.config.seed_policy.master_seed;
        let mut rng = RngHandle::substream(seed, training_stream(iteration));
        let mut training = Vec::new();
        let points = if iteration == 1 {
            for sample in &self.config.data.external_samples {
                check_external(sample, store)?;
                training.push(sample.clone());
            }
            let n_new = self.config.n_sam_init.saturating_sub(training.len());
            latin_hypercube(
                n_new,
                store.space(),
                self.config.sampling.method,
                self.config.sampling.iterations,
                &mut rng,
            )
        } else {
            choose_indices(&store.plausible_pool(), self.config.n_sam_iter, &mut rng)
                .into_iter()
                .map(|idx| store.candidates()[idx].clone())
                .collect()
        };
        let data_idx: Vec<f64> = store.observations().iter().map(|obs| obs.data_idx).collect();
        for params in points {
            let outputs = evaluate_checked(self.model.as_ref(), &params, &data_idx)
                .map_err(|err| err.with_context("iteration", iteration))?;
            training.push(Sample::evaluated(params, outputs));
        }
        Ok(training)
    }

    fn coordinate<T: Transport>(
        &self,
        comm: &mut Communicator<T>,
        pool: &KernelPool,
        mut store: SampleStore,
    ) -> Result<Construction, EmuError> {
        let world = comm.world();
        store.set_provenance(build_provenance(&self.config, world.size, self.budget.threads)?);
        let mut phases = Vec::new();

        while self.may_continue(&store) {
            let iteration = store.n_iterations() + 1;
            let started = Instant::now();

            enter(&mut phases, iteration, Phase::Init);
            if store.candidates().is_empty() {
                let mut rng = RngHandle::substream(self.config.seed_policy.master_seed, POOL_STREAM);
                let candidates = latin_hypercube(
                    self.config.n_eval_sam,
                    store.space(),
                    self.config.sampling.method,
                    1,
                    &mut rng,
                );
                store.set_candidates(candidates)?;
            }
            let training = self.training_set(&store, iteration)?;
            let pool_in = store.plausible_pool();
            let candidates = store.plausible_params();

            enter(&mut phases, iteration, Phase::Dispatch);
            let costs: Vec<f64> = (0..store.n_systems())
                .map(|system| {
                    let id = SystemId::from_raw(system as u32);
                    let n = training.iter().filter(|s| s.output(id).is_some()).count();
                    self.config.cost.evaluation_cost(n)
                })
                .collect();
            let partition = self.config.runtime.partition.assign(&costs, world.size)?;
            let context = IterationContext {
                iteration,
                space: store.space().clone(),
                observations: store.observations().to_vec(),
                training,
                candidates,
                kernel: self.config.kernel.clone(),
            };
            let context = match comm.broadcast(Some(Directive::Iterate(Box::new(context))))? {
                Directive::Iterate(context) => context,
                Directive::Done => return Err(protocol_violation("coordinator broadcast changed")),
            };
            comm.barrier()?;
            let units = (0..world.size)
                .map(|rank| WorkUnit {
                    iteration,
                    systems: partition.systems_for(rank),
                })
                .collect();
            let unit: WorkUnit = comm.scatter(Some(units))?;

            enter(&mut phases, iteration, Phase::Await);
            let await_started = Instant::now();
            let reply = compute_work_unit(&context, &unit, world.rank, pool)?;
            let replies = comm
                .gather(reply)?
                .ok_or_else(|| protocol_violation("coordinator gathered nothing"))?;
            let results = collect_results(&partition, iteration, context.candidates.len(), replies)?;
            let await_secs = await_started.elapsed().as_secs_f64();

            enter(&mut phases, iteration, Phase::Evaluate);
            let plausible: Vec<usize> = pool_in
                .iter()
                .enumerate()
                .filter(|&(pos, _)| {
                    let values: Vec<f64> = results.iter().map(|r| r.implausibility[pos]).collect();
                    self.plausibility.is_plausible(&values)
                })
                .map(|(_, &idx)| idx)
                .collect();

            enter(&mut phases, iteration, Phase::Decide);
            let stats = IterationStats {
                iteration,
                n_train: context.training.len(),
                n_systems: results.len(),
                pool_in: pool_in.len(),
                pool_out: plausible.len(),
                remaining_fraction: fraction(plausible.len(), store.candidates().len()),
                construct_secs: started.elapsed().as_secs_f64(),
                eval_rate: if await_secs > 0.0 {
                    pool_in.len() as f64 / await_secs
                } else {
                    0.0
                },
                predicted_eval_rate: predicted_eval_rate_with_costs(&partition, &costs),
                world_size: world.size,
                max_systems_per_process: partition.max_load(),
                thread_budget: self.budget.threads,
            };
            info!(
                iteration,
                n_train = stats.n_train,
                pool_in = stats.pool_in,
                pool_out = stats.pool_out,
                secs = stats.construct_secs,
                policy = self.plausibility.name(),
                "iteration complete"
            );
            store.push(IterationRecord {
                iteration,
                training: context.training,
                systems: results.into_iter().map(|result| result.fitted).collect(),
                pool_in,
                plausible,
                stats,
            })?;
            if let Some(dir) = &self.config.output.run_directory {
                store.save(dir)?;
            }
        }

        comm.broadcast(Some(Directive::Done))?;
        enter(&mut phases, store.n_iterations(), Phase::Done);

        let report = RunReport {
            schema: crate::report::REPORT_SCHEMA,
            provenance: store.provenance().clone(),
            model: self.model.name(),
            partition: self.config.runtime.partition,
            iterations: store.iterations().iter().map(|record| record.stats.clone()).collect(),
            phases,
            candidates: store.candidates().len(),
            plausible: store.plausible_pool().len(),
        };
        Ok(Construction { store, report })
    }
}

fn enter(phases: &mut Vec<PhaseRecord>, iteration: usize, phase: Phase) {
    debug!(iteration, ?phase, "phase transition");
    phases.push(PhaseRecord { iteration, phase });
}

fn check_external(sample: &Sample, store: &SampleStore) -> Result<(), EmuError> {
    let outputs = sample.outputs().map(<[f64]>::len);
    if sample.params().len() != store.space().dim() || outputs != Some(store.n_systems()) {
        return Err(EmuError::Model(
            ErrorInfo::new("model_output_len", "external sample does not match the emulator")
                .with_context("params", sample.params().len())
                .with_context("outputs", outputs.unwrap_or(0))
                .with_context("systems", store.n_systems()),
        ));
    }
    Ok(())
}

fn work<T: Transport>(comm: &mut Communicator<T>, pool: &KernelPool) -> Result<(), EmuError> {
    let rank = comm.rank();
    loop {
        let context = match comm.broadcast::<Directive>(None)? {
            Directive::Done => {
                debug!(rank, "worker leaving");
                return Ok(());
            }
            Directive::Iterate(context) => context,
        };
        comm.barrier()?;
        let unit: WorkUnit = comm.scatter(None)?;
        let reply = compute_work_unit(&context, &unit, rank, pool)?;
        comm.gather(reply)?;
    }
}
