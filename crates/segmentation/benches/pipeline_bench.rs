//! Benchmarks for the segmentation pipeline.
//! Run with: cargo bench -p campaign-segmentation

use campaign_core::CustomerRecord;
use campaign_segmentation::SegmentationEngine;

/// Deterministic pseudo-random universe; no RNG crate needed for a stable spread.
fn synthetic_universe(size: usize) -> Vec<CustomerRecord> {
    (0..size)
        .map(|i| {
            let h = (i as u64).wrapping_mul(2_654_435_761) % 10_007;
            let frac = h as f64 / 10_007.0;
            CustomerRecord::new(
                format!("user-{:06}", i),
                20.0 + frac * 480.0,
                ((i * 37) % 100) as f64 / 100.0,
                ((i * 53) % 100) as f64 / 100.0,
                (i % 7) as u32,
            )
            .with_sessions((i % 41) as f64)
        })
        .collect()
}

fn main() {
    let universe = synthetic_universe(20_000);
    let engine = SegmentationEngine::builder()
        .min_size(500)
        .max_size(2_000)
        .split_oversize(true)
        .build()
        .expect("valid bench configuration");

    // Warmup
    for _ in 0..3 {
        engine.run(universe.clone()).unwrap();
    }

    let iterations: u32 = 50;
    let start = std::time::Instant::now();
    let mut segments = 0;

    for _ in 0..iterations {
        segments = engine.run(universe.clone()).unwrap().scored.len();
    }

    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations;

    println!("=== Segmentation Benchmark ===");
    println!("Iterations:  {}", iterations);
    println!("Universe:    {}", universe.len());
    println!("Segments:    {}", segments);
    println!("Total time:  {:?}", elapsed);
    println!("Per run:     {:?}", per_iter);
    println!(
        "Throughput:  {:.0} records/sec",
        universe.len() as f64 * iterations as f64 / elapsed.as_secs_f64()
    );
}
