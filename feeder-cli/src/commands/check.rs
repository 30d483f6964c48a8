//! Validate and summarize a configuration.

use dcs_feeder_sync::Config;

/// Run the check command.
///
/// The configuration has already been loaded and validated by the time this
/// runs, so it only prints what the feeder will do with it.
pub fn run(config: &Config) {
    println!("=== dcs-feeder configuration ===");
    println!();

    println!("Sync:");
    println!("  Max batch:      {}", config.sync.max_batch);
    println!(
        "  Flush interval: {}ms (first after {}ms)",
        config.sync.flush_interval_ms, config.sync.initial_delay_ms
    );
    println!("  Key prefix:     {:?}", config.sync.key_prefix);
    println!("  Context key:    {}", config.sync.context_key);
    println!(
        "  Empty batches:  {}",
        if config.sync.send_empty_batches {
            "sent"
        } else {
            "suppressed"
        }
    );
    println!(
        "  Failed batches: {}",
        if config.sync.requeue_failed_batches {
            "requeued"
        } else {
            "dropped"
        }
    );

    println!();
    println!("Command relay:");
    if config.command.enabled {
        println!("  Key:      {}", config.command.key);
        println!("  Upstream: {}", config.upstream.address);
    } else {
        println!("  DISABLED");
    }

    println!();
    println!("Sink:");
    println!("  App name: {}", config.sink.app_name);

    println!();
    let filter = &config.filter;
    if filter.contexts.is_empty() {
        println!("Contexts: none configured (all keys admitted)");
    } else {
        println!("Contexts: {}", filter.contexts.len());
        let mut names: Vec<&String> = filter.contexts.keys().collect();
        names.sort();
        for name in names {
            println!("  {} ({} keys)", name, filter.contexts[name].len());
        }
    }

    if !filter.aliases.is_empty() {
        println!("Aliases:");
        let mut aliases: Vec<(&String, &String)> = filter.aliases.iter().collect();
        aliases.sort();
        for (alias, target) in aliases {
            println!("  {} -> {}", alias, target);
        }
    }

    let shared = filter.common.len() + filter.metadata_start.len() + filter.metadata_end.len();
    if shared > 0 {
        println!("Shared keys: {} (common + metadata)", shared);
    }

    println!();
    println!("Configuration OK");
}
