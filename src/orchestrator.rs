//! Drives a full benchmark run.
//!
//! A run moves through [`Phase`]s: instances are connected and datasets
//! built (`Init`), one task per instance is spawned (`Dispatch`), every task
//! is joined (`Await`), and the first recorded instance error either fails
//! the run or the collected observations are reported (`Finalize`).
//!
//! Each task owns the [`CollectorPartition`] for its instance index, so
//! appends never contend. A failing task stops only its own iteration;
//! siblings run to completion before the run as a whole is failed.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::collector::{CollectorPartition, ResultCollector};
use crate::config::Config;
use crate::dataset::{Dataset, DatasetRegistry};
use crate::error::{Error, Result};
use crate::instance::{connect_to_instances, Connector, Instance, InstanceSet, TidbConnector};
use crate::query_type::QueryType;
use crate::report::{generate_report, ReportFiles};
use crate::runner::run_one_case;

/// Progress is logged at least this often within a (dataset, query type) pair.
pub const PROGRESS_EVERY: usize = 1000;

/// Stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Connecting instances and building datasets.
    Init,
    /// Spawning one worker per instance.
    Dispatch,
    /// Waiting for every worker.
    Await,
    /// Checking instance errors and reporting.
    Finalize,
    /// Report written.
    Done,
    /// Run failed.
    Failed,
}

/// Observations and per-instance failures of a run, after every worker joined.
#[derive(Debug)]
pub struct RunOutcome {
    /// Filled grid of observations.
    pub collector: ResultCollector,
    /// First error of each instance's worker, by instance index.
    pub instance_errors: Vec<Option<Error>>,
}

impl RunOutcome {
    /// The error of the lowest-indexed failing instance.
    pub fn first_error(&self) -> Option<&Error> {
        self.instance_errors.iter().flatten().next()
    }

    /// The collector when no instance failed, else the first instance error.
    pub fn into_result(self) -> Result<ResultCollector> {
        match self.instance_errors.into_iter().flatten().next() {
            Some(err) => Err(err),
            None => Ok(self.collector),
        }
    }
}

/// What every worker iterates over, shared read-only.
#[derive(Debug)]
struct WorkerPlan {
    dataset_labels: Vec<String>,
    query_types: Vec<QueryType>,
    n: usize,
}

/// Runs a configuration against its instances.
pub struct Orchestrator<'a> {
    config: &'a Config,
    registry: &'a DatasetRegistry,
    connector: &'a dyn Connector,
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator for `config`, building datasets from `registry` and
    /// opening instances through `connector`.
    pub fn new(
        config: &'a Config,
        registry: &'a DatasetRegistry,
        connector: &'a dyn Connector,
    ) -> Self {
        Self {
            config,
            registry,
            connector,
        }
    }

    /// Runs every worker to completion and returns what they collected.
    ///
    /// Fails only for errors that abort the run before dispatch (connection,
    /// dataset construction). Instances are closed on every path.
    pub async fn execute(&self) -> Result<RunOutcome> {
        debug!(phase = ?Phase::Init, "orchestrator.phase");
        let mut instances = connect_to_instances(self.connector, &self.config.instances).await?;
        let outcome = self.dispatch(&instances).await;
        instances.close_all().await;
        outcome
    }

    /// Executes the run and writes the report when no instance failed.
    pub async fn run(&self) -> Result<ReportFiles> {
        let outcome = match self.execute().await {
            Ok(outcome) => outcome,
            Err(err) => return Err(fail(err)),
        };
        debug!(phase = ?Phase::Finalize, "orchestrator.phase");
        let collector = outcome.into_result().map_err(fail)?;
        let files = generate_report(self.config, &collector).map_err(fail)?;
        info!(
            phase = ?Phase::Done,
            observations = collector.total(),
            report = %files.json.display(),
            "orchestrator.phase"
        );
        Ok(files)
    }

    fn build_datasets(&self, instances: &InstanceSet) -> Result<Vec<Vec<Box<dyn Dataset>>>> {
        instances
            .handles()
            .iter()
            .map(|ins| {
                self.config
                    .datasets
                    .iter()
                    .enumerate()
                    .map(|(ds_idx, spec)| {
                        // Same seed on every instance so each sees the same cases.
                        let seed = self.config.seed.wrapping_add(ds_idx as u64);
                        self.registry.build(spec, ins.clone(), seed)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    async fn dispatch(&self, instances: &InstanceSet) -> Result<RunOutcome> {
        let datasets = self.build_datasets(instances)?;
        let (n_instances, n_datasets, n_query_types) = (
            instances.len(),
            self.config.datasets.len(),
            self.config.query_types.len(),
        );
        let plan = Arc::new(WorkerPlan {
            dataset_labels: self.config.datasets.iter().map(|d| d.label.clone()).collect(),
            query_types: self.config.query_types.clone(),
            n: self.config.n,
        });

        debug!(phase = ?Phase::Dispatch, workers = n_instances, "orchestrator.phase");
        let partitions = ResultCollector::new(n_instances, n_datasets, n_query_types)
            .into_partitions();
        let handles: Vec<_> = instances
            .handles()
            .iter()
            .cloned()
            .zip(datasets)
            .zip(partitions)
            .map(|((ins, datasets), partition)| {
                tokio::spawn(run_worker(ins, datasets, partition, plan.clone()))
            })
            .collect();

        debug!(phase = ?Phase::Await, "orchestrator.phase");
        let mut partitions = Vec::with_capacity(n_instances);
        let mut instance_errors: Vec<Option<Error>> = (0..n_instances).map(|_| None).collect();
        for (idx, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok((partition, err)) => {
                    partitions.push(partition);
                    instance_errors[idx] = err;
                }
                Err(join_err) => {
                    partitions.push(CollectorPartition::new(idx, n_datasets, n_query_types));
                    instance_errors[idx] = Some(Error::WorkerPanicked {
                        label: instances.handles()[idx].label().to_string(),
                        message: join_err.to_string(),
                    });
                }
            }
        }
        Ok(RunOutcome {
            collector: ResultCollector::from_partitions(partitions),
            instance_errors,
        })
    }
}

fn fail(err: Error) -> Error {
    error!(phase = ?Phase::Failed, error = %err, "orchestrator.phase");
    err
}

async fn run_worker(
    ins: Arc<dyn Instance>,
    datasets: Vec<Box<dyn Dataset>>,
    mut partition: CollectorPartition,
    plan: Arc<WorkerPlan>,
) -> (CollectorPartition, Option<Error>) {
    let outcome = drive_worker(ins.as_ref(), &datasets, &mut partition, &plan).await;
    match outcome {
        Ok(()) => {
            info!(
                instance = ins.label(),
                observations = partition.len(),
                "orchestrator.instance.completed"
            );
            (partition, None)
        }
        Err(err) => {
            warn!(
                instance = ins.label(),
                observations = partition.len(),
                error = %err,
                "orchestrator.instance.failed"
            );
            (partition, Some(err))
        }
    }
}

async fn drive_worker(
    ins: &dyn Instance,
    datasets: &[Box<dyn Dataset>],
    partition: &mut CollectorPartition,
    plan: &WorkerPlan,
) -> Result<()> {
    let step = (plan.n / 20).max(1);
    for (ds_idx, ds) in datasets.iter().enumerate() {
        let dataset = &plan.dataset_labels[ds_idx];
        for (qt_idx, &qt) in plan.query_types.iter().enumerate() {
            let cases = ds.gen_cases(plan.n, qt).await?;
            if cases.len() != plan.n {
                return Err(Error::generation(
                    dataset,
                    qt,
                    format!("expected {} cases, got {}", plan.n, cases.len()),
                ));
            }
            for (i, case) in cases.iter().enumerate() {
                if i % PROGRESS_EVERY == 0 || i % step == 0 {
                    info!(
                        dataset = %dataset,
                        instance = ins.label(),
                        query_type = %qt,
                        done = i,
                        total = plan.n,
                        "orchestrator.worker.progress"
                    );
                }
                let result = run_one_case(ins, case).await?;
                partition.add(ds_idx, qt_idx, result);
            }
        }
    }
    Ok(())
}

/// Loads the configuration at `path` and runs it against TiDB instances.
pub async fn run_with_config(path: &Path) -> Result<ReportFiles> {
    let registry = DatasetRegistry::builtin();
    let config = Config::load(path, &registry)?;
    Orchestrator::new(&config, &registry, &TidbConnector)
        .run()
        .await
}
