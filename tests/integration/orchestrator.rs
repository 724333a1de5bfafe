#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cetest::{
    Config, Connector, Dataset, DatasetRegistry, DatasetSpec, Error, Instance, InstanceOption,
    Orchestrator, QueryType, ResultSet,
};
use parking_lot::Mutex;
use tempfile::TempDir;

const V4: &str = "5.7.25-TiDB-v4.0.0";
const PLAN_COLUMNS: &[&str] = &["id", "estRows", "actRows", "task", "access object"];

/// Answers every statement with a single-row v4 plan and counts its calls.
struct FakeInstance {
    label: String,
    est: &'static str,
    act: &'static str,
    fail_on_call: Option<usize>,
    truncated_plan: bool,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Instance for FakeInstance {
    fn label(&self) -> &str {
        &self.label
    }

    fn version(&self) -> &str {
        V4
    }

    async fn query(&self, sql: &str) -> cetest::Result<ResultSet> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().push(sql.to_string());
        if self.fail_on_call == Some(call) {
            return Err(Error::QueryExecution {
                sql: sql.to_string(),
                message: "lost connection".into(),
            });
        }
        tokio::task::yield_now().await;
        if self.truncated_plan {
            return Ok(ResultSet::from_text(
                &["id", "estRows"],
                &[&["Projection_4", self.est]],
            ));
        }
        Ok(ResultSet::from_text(
            PLAN_COLUMNS,
            &[&["Projection_4", self.est, self.act, "root", ""]],
        ))
    }

    async fn close(&self) -> cetest::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FakeConnector {
    refuse: Option<&'static str>,
    fail_on_call: Option<(&'static str, usize)>,
    truncated_plan: Option<&'static str>,
    estimate: Option<(&'static str, &'static str)>,
    closes: Arc<AtomicUsize>,
    connected: Mutex<Vec<Arc<FakeInstance>>>,
}

impl FakeConnector {
    fn instance(&self, label: &str) -> Arc<FakeInstance> {
        self.connected
            .lock()
            .iter()
            .find(|ins| ins.label == label)
            .cloned()
            .expect("instance was connected")
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, opt: &InstanceOption) -> cetest::Result<Arc<dyn Instance>> {
        if self.refuse == Some(opt.label.as_str()) {
            return Err(Error::Connection {
                label: opt.label.clone(),
                message: "connection refused".into(),
            });
        }
        let (est, act) = self.estimate.unwrap_or(("1", "1"));
        let ins = Arc::new(FakeInstance {
            label: opt.label.clone(),
            est,
            act,
            fail_on_call: self
                .fail_on_call
                .filter(|(label, _)| *label == opt.label)
                .map(|(_, call)| call),
            truncated_plan: self.truncated_plan == Some(opt.label.as_str()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            closes: self.closes.clone(),
        });
        self.connected.lock().push(ins.clone());
        Ok(ins)
    }
}

fn instance(label: &str) -> InstanceOption {
    InstanceOption {
        label: label.to_string(),
        addr: "127.0.0.1".into(),
        port: 4000,
        user: "root".into(),
        password: String::new(),
    }
}

fn dataset(name: &str, label: &str) -> DatasetSpec {
    DatasetSpec {
        name: name.to_string(),
        db: label.to_lowercase(),
        label: label.to_string(),
    }
}

fn config(
    report_dir: PathBuf,
    instances: &[&str],
    datasets: Vec<DatasetSpec>,
    query_types: Vec<QueryType>,
    n: usize,
) -> Config {
    Config {
        query_types,
        datasets,
        instances: instances.iter().map(|label| instance(label)).collect(),
        report_dir,
        n,
        seed: 7,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_instance_run_collects_every_case() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        dir.path().join("report"),
        &["v4"],
        vec![dataset("mock", "Mock")],
        vec![QueryType::SingleColPointQuery],
        5,
    );
    let registry = DatasetRegistry::builtin();
    let connector = FakeConnector::default();

    let outcome = Orchestrator::new(&cfg, &registry, &connector)
        .execute()
        .await
        .expect("execute");

    assert!(outcome.first_error().is_none());
    let results = outcome.collector.results(0, 0, 0);
    assert_eq!(results.len(), 5);
    for r in results {
        assert_eq!((r.est_cnt, r.act_cnt), (1.0, 1.0));
        assert_eq!(r.p_error(), 0.0);
        assert_eq!(r.version, V4);
    }
    let seen = connector.instance("v4").seen.lock().clone();
    assert_eq!(seen.len(), 5);
    assert!(seen.iter().all(|sql| sql.starts_with("EXPLAIN ANALYZE SELECT")));
    assert_eq!(connector.closes(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_workers_fill_their_own_cells() {
    let dir = TempDir::new().expect("tempdir");
    let labels = ["a", "b", "c", "d"];
    let cfg = config(
        dir.path().to_path_buf(),
        &labels,
        vec![dataset("mock", "M1"), dataset("MOCK", "M2"), dataset("mock", "M3")],
        vec![QueryType::SingleColRangeQuery, QueryType::JoinEq],
        25,
    );
    let registry = DatasetRegistry::builtin();
    let connector = FakeConnector {
        estimate: Some(("30", "10")),
        ..FakeConnector::default()
    };

    let outcome = Orchestrator::new(&cfg, &registry, &connector)
        .execute()
        .await
        .expect("execute");

    assert!(outcome.instance_errors.iter().all(Option::is_none));
    assert_eq!(outcome.collector.dims(), (4, 3, 2));
    assert_eq!(outcome.collector.total(), 4 * 3 * 2 * 25);
    for ((_, _, _), results) in outcome.collector.cells() {
        assert_eq!(results.len(), 25);
        assert!(results.iter().all(|r| r.q_error() == 3.0 && r.p_error() == 2.0));
    }
    assert_eq!(connector.closes(), labels.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn instances_see_identical_cases() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        dir.path().to_path_buf(),
        &["a", "b"],
        vec![dataset("mock", "Mock")],
        vec![QueryType::MultiColsPointQuery, QueryType::Group],
        10,
    );
    let registry = DatasetRegistry::builtin();
    let connector = FakeConnector::default();

    Orchestrator::new(&cfg, &registry, &connector)
        .execute()
        .await
        .expect("execute");

    let a = connector.instance("a").seen.lock().clone();
    let b = connector.instance("b").seen.lock().clone();
    assert_eq!(a.len(), 20);
    assert_eq!(a, b);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_instance_does_not_stop_siblings() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        dir.path().to_path_buf(),
        &["a", "b", "c"],
        vec![dataset("mock", "Mock")],
        vec![QueryType::SingleColPointQuery, QueryType::LcvPointQuery],
        6,
    );
    let registry = DatasetRegistry::builtin();
    let connector = FakeConnector {
        fail_on_call: Some(("b", 3)),
        ..FakeConnector::default()
    };

    let outcome = Orchestrator::new(&cfg, &registry, &connector)
        .execute()
        .await
        .expect("execute");

    assert!(outcome.instance_errors[0].is_none());
    assert!(matches!(
        outcome.instance_errors[1],
        Some(Error::QueryExecution { .. })
    ));
    assert!(outcome.instance_errors[2].is_none());

    for idx in [0, 2] {
        assert_eq!(outcome.collector.results(idx, 0, 0).len(), 6);
        assert_eq!(outcome.collector.results(idx, 0, 1).len(), 6);
    }
    assert_eq!(outcome.collector.results(1, 0, 0).len(), 2);
    assert!(outcome.collector.results(1, 0, 1).is_empty());
    assert_eq!(connector.instance("b").calls.load(Ordering::SeqCst), 3);
    assert_eq!(connector.closes(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn plan_without_actual_rows_fails_only_its_instance() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        dir.path().to_path_buf(),
        &["a", "b", "c"],
        vec![dataset("mock", "Mock")],
        vec![QueryType::SingleColPointQuery, QueryType::MultiColsRangeQuery],
        5,
    );
    let registry = DatasetRegistry::builtin();
    let connector = FakeConnector {
        truncated_plan: Some("b"),
        ..FakeConnector::default()
    };

    let outcome = Orchestrator::new(&cfg, &registry, &connector)
        .execute()
        .await
        .expect("execute");

    assert!(outcome.instance_errors[0].is_none());
    assert!(matches!(
        outcome.instance_errors[1],
        Some(Error::MalformedPlan { ref version, .. }) if version == V4
    ));
    assert!(outcome.instance_errors[2].is_none());
    for idx in [0, 2] {
        assert_eq!(outcome.collector.results(idx, 0, 0).len(), 5);
        assert_eq!(outcome.collector.results(idx, 0, 1).len(), 5);
    }
    assert!(outcome.collector.results(1, 0, 0).is_empty());
    assert!(outcome.collector.results(1, 0, 1).is_empty());
    assert_eq!(connector.instance("b").calls.load(Ordering::SeqCst), 1);
    assert_eq!(connector.closes(), 3);
}

#[tokio::test]
async fn run_fails_with_first_instance_error_and_writes_no_report() {
    let dir = TempDir::new().expect("tempdir");
    let report_dir = dir.path().join("report");
    let cfg = config(
        report_dir.clone(),
        &["a", "b", "c"],
        vec![dataset("mock", "Mock")],
        vec![QueryType::SingleColPointQuery],
        4,
    );
    let registry = DatasetRegistry::builtin();
    let connector = FakeConnector {
        fail_on_call: Some(("c", 1)),
        ..FakeConnector::default()
    };

    let err = Orchestrator::new(&cfg, &registry, &connector)
        .run()
        .await
        .expect_err("instance c fails");

    assert!(matches!(err, Error::QueryExecution { .. }));
    assert!(!report_dir.exists());
    assert_eq!(connector.closes(), 3);
}

#[tokio::test]
async fn successful_run_writes_report() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        dir.path().join("nested").join("report"),
        &["a"],
        vec![dataset("mock", "Mock")],
        vec![QueryType::JoinNonEq],
        3,
    );
    let registry = DatasetRegistry::builtin();
    let connector = FakeConnector::default();

    let files = Orchestrator::new(&cfg, &registry, &connector)
        .run()
        .await
        .expect("run");

    assert!(files.json.is_file());
    assert!(files.csv.is_file());
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn connection_failure_closes_connected_instances() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        dir.path().to_path_buf(),
        &["a", "b", "c"],
        vec![dataset("mock", "Mock")],
        vec![QueryType::SingleColPointQuery],
        2,
    );
    let registry = DatasetRegistry::builtin();
    let connector = FakeConnector {
        refuse: Some("b"),
        ..FakeConnector::default()
    };

    let err = Orchestrator::new(&cfg, &registry, &connector)
        .execute()
        .await
        .expect_err("b is refused");

    assert!(matches!(err, Error::Connection { ref label, .. } if label == "b"));
    assert_eq!(connector.closes(), 1);
    assert_eq!(connector.instance("a").calls.load(Ordering::SeqCst), 0);
}

fn broken_ctor(
    spec: &DatasetSpec,
    _ins: Arc<dyn Instance>,
    _seed: u64,
) -> cetest::Result<Box<dyn Dataset>> {
    Err(Error::DatasetGeneration {
        dataset: spec.label.clone(),
        query_type: "any".into(),
        message: "missing tables".into(),
    })
}

#[tokio::test]
async fn dataset_construction_failure_closes_instances() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        dir.path().to_path_buf(),
        &["a", "b"],
        vec![dataset("mock", "Mock"), dataset("broken", "Broken")],
        vec![QueryType::SingleColPointQuery],
        2,
    );
    let registry = DatasetRegistry::builtin().with("broken", broken_ctor);
    let connector = FakeConnector::default();

    let err = Orchestrator::new(&cfg, &registry, &connector)
        .execute()
        .await
        .expect_err("construction fails");

    assert!(matches!(err, Error::DatasetGeneration { ref dataset, .. } if dataset == "Broken"));
    assert_eq!(connector.closes(), 2);
    assert_eq!(connector.instance("a").calls.load(Ordering::SeqCst), 0);
}

/// Returns one case too few for the second query type.
struct ShortDataset;

#[async_trait]
impl Dataset for ShortDataset {
    async fn gen_cases(&self, n: usize, qt: QueryType) -> cetest::Result<Vec<String>> {
        let len = if qt == QueryType::Group { n - 1 } else { n };
        Ok((0..len).map(|k| format!("SELECT {k}")).collect())
    }
}

fn short_ctor(
    _spec: &DatasetSpec,
    _ins: Arc<dyn Instance>,
    _seed: u64,
) -> cetest::Result<Box<dyn Dataset>> {
    Ok(Box::new(ShortDataset))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn short_generation_fails_the_instance() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        dir.path().to_path_buf(),
        &["a", "b"],
        vec![dataset("short", "Short")],
        vec![QueryType::SingleColPointQuery, QueryType::Group],
        4,
    );
    let registry = DatasetRegistry::empty().with("short", short_ctor);
    let connector = FakeConnector::default();

    let outcome = Orchestrator::new(&cfg, &registry, &connector)
        .execute()
        .await
        .expect("execute");

    for (idx, err) in outcome.instance_errors.iter().enumerate() {
        assert!(
            matches!(err, Some(Error::DatasetGeneration { query_type, .. }) if query_type == "group"),
            "instance {idx}: {err:?}"
        );
        assert_eq!(outcome.collector.results(idx, 0, 0).len(), 4);
        assert!(outcome.collector.results(idx, 0, 1).is_empty());
    }
    assert_eq!(connector.closes(), 2);
}
