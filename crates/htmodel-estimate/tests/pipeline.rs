//! End-to-end runs of the estimator over synthetic counter traces.

use std::path::Path;

use htmodel_estimate::{Estimate, Estimator, REPORT_FILE_NAME};
use htmodel_schemas::{
    Counter, Dataset, PhysicalCoreKey, RUN_COLUMNS, RunWindow, SutConfig, Table,
    TimeSeries, Topology,
};

const INTERVALS: usize = 20;
const IPC_TD1: f64 = 1.0;
const IPC_TD2: f64 = 1.5;

/// Density-1 and density-2 cycles of core `core` at interval `i`. The two
/// sequences have different periods, so they are never collinear.
fn cycles(core: usize, i: usize) -> (f64, f64) {
    #[expect(clippy::cast_precision_loss, reason = "small test indices")]
    let td1 = 1.0e8 * (1 + (i * 7 + core * 3) % 11) as f64;
    #[expect(clippy::cast_precision_loss, reason = "small test indices")]
    let td2 = 1.0e8 * (1 + (i * 5 + core) % 13) as f64;
    (td1, td2)
}

/// Counters of a machine whose cores retire exactly
/// `IPC_TD1 * td1 + IPC_TD2 * td2` instructions per interval.
///
/// Logical core 0 of each physical core is busy whenever the core is;
/// its sibling only runs during density-2 time. Columns named in `skip`
/// are left out.
fn dataset(topology: &Topology, skip: &[String]) -> Dataset {
    let mut counters = Table::new();
    for (index, (_, logical)) in topology.cores().enumerate() {
        let (first, sibling) = (logical[0], logical[1]);
        let (td1, td2): (Vec<f64>, Vec<f64>) =
            (0..INTERVALS).map(|i| cycles(index, i)).unzip();

        let any: Vec<f64> = td1.iter().zip(&td2).map(|(a, b)| a + b).collect();
        let instructions: Vec<f64> = td1
            .iter()
            .zip(&td2)
            .map(|(a, b)| IPC_TD1 * a + IPC_TD2 * b)
            .collect();

        let scaled = |samples: &[f64], factor: f64| -> Vec<f64> {
            samples.iter().map(|x| x * factor).collect()
        };
        let columns: [(Counter, usize, Vec<f64>); 8] = [
            (Counter::Instructions, first, scaled(&instructions, 0.75)),
            (Counter::Instructions, sibling, scaled(&instructions, 0.25)),
            (Counter::UnhaltedThread, first, any.clone()),
            (Counter::UnhaltedThread, sibling, td2.clone()),
            (Counter::UnhaltedThreadAny, first, any.clone()),
            (Counter::UnhaltedThreadAny, sibling, any.clone()),
            (Counter::UnhaltedRefTsc, first, scaled(&any, 0.8)),
            (Counter::UnhaltedRefTsc, sibling, scaled(&td2, 0.8)),
        ];
        for (counter, cpu, samples) in columns {
            let name = counter.column(cpu);
            if !skip.contains(&name) {
                counters.insert(name, TimeSeries::new(samples));
            }
        }
    }

    let mut dataset = Dataset::default();
    dataset.perf_stats.mean = counters;
    for (n, name) in RUN_COLUMNS.iter().enumerate() {
        #[expect(clippy::cast_precision_loss, reason = "small test indices")]
        let base = n as f64;
        dataset
            .runs
            .insert(*name, TimeSeries::new(vec![base, base + 0.5, base + 1.0]));
    }
    dataset
}

/// Two sockets with two cores each, two threads per core.
fn config(output_dir: &Path, ht_active: bool) -> SutConfig {
    SutConfig {
        output_dir: output_dir.to_path_buf(),
        topology: Topology::uniform(2, 2, 2, ht_active, 2.0e9, 2.4e9).unwrap(),
        run_window: RunWindow::new(1, 3, 2),
    }
}

fn compute(config: &SutConfig) -> Estimate {
    let dataset = dataset(&config.topology, &[]);
    Estimator::new(config).compute(&dataset, "synthetic").unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * b.abs().max(1.0)
}

#[test]
fn densities_conserve_unhalted_cycles() {
    let tmp = tempfile::tempdir().unwrap();
    let estimate = compute(&config(tmp.path(), true));
    assert_eq!(estimate.per_core.len(), 4);
    for core in estimate.per_core.values() {
        let density = &core.density;
        let td2 = density.td2.as_ref().unwrap();
        for i in 0..INTERVALS {
            assert!(close(density.td1[i] + td2[i], density.thread_any[i]));
        }
    }
}

#[test]
fn recovers_generating_coefficients() {
    let tmp = tempfile::tempdir().unwrap();
    let estimate = compute(&config(tmp.path(), true));
    for (key, core) in &estimate.per_core {
        let model = core.fit.model;
        assert!(close(model.ipc_td1(), IPC_TD1), "{key}: {model:?}");
        assert!(close(model.ipc_td2().unwrap(), IPC_TD2), "{key}: {model:?}");
        assert!(!core.fit.rank_deficient);
    }
    assert!(close(estimate.system.estimated_ipc, IPC_TD2));
}

#[test]
fn smt_inactive_fits_one_regime() {
    let tmp = tempfile::tempdir().unwrap();
    let estimate = compute(&config(tmp.path(), false));
    assert_eq!(estimate.max_density(), 1);
    for core in estimate.per_core.values() {
        assert!(core.density.td2.is_none());
        assert_eq!(core.density.td1, core.density.thread_any);
        assert_eq!(core.fit.model.coefficients().len(), 1);
        for &atd in &core.atd {
            assert_eq!(atd, 1.0);
        }
    }

    let dataset = dataset(&config(tmp.path(), false).topology, &[]);
    let report = estimate.report(&dataset.runs).unwrap();
    let names: Vec<&str> = report.column_names().collect();
    assert!(names.contains(&"S1-C1-EST-IPC-TD1"));
    assert!(names.contains(&"S1-C1-REAL-IPC-TD1"));
    assert!(names.contains(&"Sys_mean_estimated_IPC_TD1"));
    assert!(!names.iter().any(|name| name.ends_with("EST-IPC-TD2")));
}

#[test]
fn system_means_average_every_core() {
    let tmp = tempfile::tempdir().unwrap();
    let estimate = compute(&config(tmp.path(), true));
    #[expect(clippy::cast_precision_loss, reason = "four cores")]
    let n = estimate.per_core.len() as f64;
    for i in 0..INTERVALS {
        let cores = estimate.per_core.values();
        let productivity = cores.clone().map(|c| c.productivity[i]).sum::<f64>() / n;
        let atd = cores.clone().map(|c| c.atd[i]).sum::<f64>() / n;
        let frequency = cores.map(|c| c.frequency[i]).sum::<f64>() / n;
        assert!(close(estimate.system.productivity[i], productivity));
        assert!(close(estimate.system.atd[i], atd));
        assert!(close(estimate.system.frequency[i], frequency));
    }
}

#[test]
fn productivity_is_bounded_on_clean_data() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path(), true);
    let peak = (0..4)
        .flat_map(|core| (0..INTERVALS).map(move |i| cycles(core, i)))
        .map(|(td1, td2)| td1 + td2)
        .fold(0.0, f64::max);
    config.topology = Topology::uniform(2, 2, 2, true, 2.0e9, peak).unwrap();

    let estimate = compute(&config);
    for core in estimate.per_core.values() {
        for &p in &core.productivity {
            assert!(p <= 1.0 + 1e-9, "productivity {p} exceeds 1");
            assert!(p > 0.0);
        }
    }
}

#[test]
fn real_ipc_covers_run_window_only() {
    let tmp = tempfile::tempdir().unwrap();
    let estimate = compute(&config(tmp.path(), true));
    let core = &estimate.per_core[&PhysicalCoreKey::new(0, 0)];
    let selected: Vec<usize> = core
        .real_ipc
        .iter()
        .enumerate()
        .filter(|&(_, &ipc)| ipc != 0.0)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(selected, [0, 1, 10, 11]);

    let (td1, td2) = cycles(0, 10);
    let expected = (IPC_TD1 * td1 + IPC_TD2 * td2) / (td1 + td2);
    assert!(close(core.real_ipc[10], expected));
}

#[test]
fn export_is_byte_identical_across_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), true);
    let dataset = dataset(&config.topology, &[]);
    let estimator = Estimator::new(&config);

    estimator.estimate(&dataset, "first").unwrap();
    estimator.estimate(&dataset, "second").unwrap();

    let first =
        std::fs::read(tmp.path().join("first").join(REPORT_FILE_NAME)).unwrap();
    let second =
        std::fs::read(tmp.path().join("second").join(REPORT_FILE_NAME)).unwrap();
    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    let mut lines = text.lines();
    let header: Vec<&str> = lines.next().unwrap().split(';').collect();
    assert_eq!(
        header[..11],
        [
            "",
            "TotClients",
            "XavgTot",
            "UavgTot",
            "RavgTot",
            "Sys_mean_productivity",
            "Sys_mean_atd",
            "Sys_mean_cbt",
            "Sys_mean_FREQ",
            "Sys_mean_IPC",
            "Sys_mean_estimated_IPC_TD2",
        ]
    );
    assert_eq!(
        header[11..14],
        ["S0-C0-EST-IPC-TD1", "S0-C0-EST-IPC-TD2", "S0-C0-REAL-IPC-TD2"]
    );
    assert_eq!(lines.count(), INTERVALS);

    // Run columns end after three rows.
    let row5: Vec<&str> = text.lines().nth(5).unwrap().split(';').collect();
    assert_eq!(row5[0], "4");
    assert_eq!(row5[1], "");
    assert!(!row5[5].is_empty());
}

#[test]
fn missing_counter_column_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), true);
    let missing = Counter::UnhaltedRefTsc.column(5);
    let dataset = dataset(&config.topology, &[missing]);

    let err = Estimator::new(&config)
        .estimate(&dataset, "broken")
        .unwrap_err();
    assert!(err.is_missing_column());
    assert!(err.to_string().contains("CPU5_cpu_clk_unhalted_ref_tsc"));
    assert!(!tmp.path().join("broken").exists());
}

#[test]
fn missing_run_column_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), true);
    let mut dataset = dataset(&config.topology, &[]);
    dataset.runs = Table::new();

    let err = Estimator::new(&config)
        .estimate(&dataset, "no-runs")
        .unwrap_err();
    assert!(err.is_missing_column());
}

#[test]
fn window_past_last_interval_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path(), true);
    config.run_window = RunWindow::new(1, 3, 3);
    let dataset = dataset(&config.topology, &[]);

    let err = Estimator::new(&config)
        .compute(&dataset, "window")
        .unwrap_err();
    assert!(err.is_window_out_of_range());
}

#[test]
fn unwritable_output_dir_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, "").unwrap();
    let config = config(&blocker, true);
    let dataset = dataset(&config.topology, &[]);

    let err = Estimator::new(&config)
        .estimate(&dataset, "t")
        .unwrap_err();
    assert!(err.is_io());
}
