//! Collection pass testing command.

use anyhow::Result;
use std::time::Instant;

use crate::collector::{Collector, CollectorOptions};
use crate::config::Config;
use crate::lookup::{NameLookup, NoopLookup, PsLookup};
use crate::view::to_display_rows;

/// Runs collection passes and prints what a consumer would see.
pub fn command_test(iterations: usize, verbose: bool, config: &Config) -> Result<()> {
    println!("procsnap-agent - test mode");
    println!("==========================");

    let lookup: Box<dyn NameLookup> = if config.enable_name_fallback.unwrap_or(true) {
        Box::new(PsLookup)
    } else {
        Box::new(NoopLookup)
    };
    let collector = Collector::new(
        crate::procfs::ProcReader::new(config.proc_root()),
        lookup,
        CollectorOptions {
            cpu_refresh: std::time::Duration::from_secs(config.cpu_refresh_secs()),
            cpu_cache_max: config.cpu_cache_max(),
            name_cache_max: config.name_cache_max(),
            max_processes: config.max_processes,
        },
    );

    for iteration in 1..=iterations {
        println!("\nPass {}/{}:", iteration, iterations);
        let start = Instant::now();
        let records = collector.collect_pass()?;
        let duration = start.elapsed();

        println!("   processes: {}", records.len());
        println!("   duration:  {:.2}ms", duration.as_secs_f64() * 1000.0);
        println!("   cpu cache: {} entries", collector.cpu_cache_len());
        println!("   name cache: {} entries", collector.name_cache_len());

        if verbose {
            for row in to_display_rows(&records).iter().take(15) {
                println!(
                    "   {:>7}  {:<24} {:<10} {:>7.2}% {:>9.2} MB  {}",
                    row.pid, row.name, row.state, row.cpu_percent, row.memory_mb, row.duration
                );
            }
        }
    }

    println!("\nTest completed.");
    Ok(())
}
