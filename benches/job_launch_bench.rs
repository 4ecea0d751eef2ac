// Job launch benchmark for the tsh binary
// Measures median shell start-to-exit latency for scripted sessions piped to stdin
// Target: one foreground job p50 < 20ms, ten sequential jobs p50 < 100ms

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Benchmark configuration
const ITERATIONS: usize = 100;
const WARMUP_ITERATIONS: usize = 10;

/// Median of one scenario's samples, checked against its budget
struct BenchmarkResult {
    scenario: String,
    median: Duration,
    samples: usize,
    budget: Duration,
}

impl BenchmarkResult {
    fn new(scenario: &str, mut samples: Vec<Duration>, budget: Duration) -> Self {
        samples.sort_unstable();
        Self {
            scenario: scenario.to_string(),
            median: samples[samples.len() / 2],
            samples: samples.len(),
            budget,
        }
    }

    fn passed(&self) -> bool {
        self.median < self.budget
    }

    fn print(&self) {
        println!("\n=== {} ===", self.scenario);
        println!("  p50 of {} runs: {:?}", self.samples, self.median);

        if self.passed() {
            println!("PASS");
        } else {
            println!("FAIL: p50={:?} (target <{:?})", self.median, self.budget);
        }
    }
}

/// Run one `tsh -p` session fed with `script`, returning its wall time
fn run_session(script: &str) -> Duration {
    let start = Instant::now();
    let mut child = Command::new(env!("CARGO_BIN_EXE_tsh"))
        .arg("-p")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start tsh");

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(script.as_bytes());
    }
    let _ = child.wait();
    start.elapsed()
}

fn benchmark_session(scenario: &str, script: &str, budget: Duration) -> BenchmarkResult {
    for _ in 0..WARMUP_ITERATIONS {
        run_session(script);
    }

    let samples = (0..ITERATIONS).map(|_| run_session(script)).collect();
    BenchmarkResult::new(scenario, samples, budget)
}

fn main() {
    println!("=== tsh Job Launch Benchmark ===");
    println!("Iterations: {} (after {} warmup)", ITERATIONS, WARMUP_ITERATIONS);

    let ten_jobs = "/bin/true\n".repeat(10) + "quit\n";
    let results = vec![
        benchmark_session("Empty session", "quit\n", Duration::from_millis(10)),
        benchmark_session(
            "One foreground job",
            "/bin/true\nquit\n",
            Duration::from_millis(20),
        ),
        benchmark_session(
            "Ten sequential foreground jobs",
            &ten_jobs,
            Duration::from_millis(100),
        ),
        benchmark_session(
            "Background job then jobs listing",
            "/bin/true &\njobs\nquit\n",
            Duration::from_millis(20),
        ),
    ];

    for result in &results {
        result.print();
    }

    let passed_count = results.iter().filter(|r| r.passed()).count();
    let total_count = results.len();

    println!("\n=== Summary ===");
    println!("{}/{} scenarios passed", passed_count, total_count);

    if passed_count == total_count {
        println!("All launch budgets met");
        std::process::exit(0);
    } else {
        println!("Some launch budgets exceeded");
        std::process::exit(1);
    }
}
