//! System validation command.

use anyhow::Result;

use crate::collector::{Collector, CollectorOptions};
use crate::config::{validate_effective_config, Config};
use crate::lookup::NoopLookup;
use crate::procfs::ProcReader;

/// Validates system requirements and configuration.
pub fn command_check(proc: bool, all: bool, config: &Config) -> Result<()> {
    println!("procsnap-agent - system check");
    println!("=============================");

    let mut all_ok = true;

    if proc || all {
        let root = config.proc_root();
        println!("\nChecking process table at {} ...", root.display());
        let reader = ProcReader::new(&root);
        match reader.list_pids() {
            Ok(pids) if !pids.is_empty() => {
                println!("   ok: {} process entries visible", pids.len());

                let collector = Collector::new(
                    ProcReader::new(&root),
                    Box::new(NoopLookup),
                    CollectorOptions {
                        max_processes: Some(10),
                        ..Default::default()
                    },
                );
                match collector.collect_pass() {
                    Ok(records) => {
                        println!("   ok: sample pass produced {} records", records.len())
                    }
                    Err(e) => {
                        println!("   FAILED: sample pass: {}", e);
                        all_ok = false;
                    }
                }
            }
            Ok(_) => {
                println!("   FAILED: no process entries readable");
                all_ok = false;
            }
            Err(e) => {
                println!("   FAILED: cannot enumerate: {}", e);
                all_ok = false;
            }
        }
    }

    println!("\nChecking configuration ...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ok: configuration is valid"),
        Err(e) => {
            println!("   FAILED: {}", e);
            all_ok = false;
        }
    }

    println!();
    if all_ok {
        println!("All checks passed.");
        Ok(())
    } else {
        println!("Some checks failed.");
        std::process::exit(1);
    }
}
