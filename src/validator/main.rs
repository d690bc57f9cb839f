//! Standalone validator for broadcast configuration files.
//!
//! Checks the message and every destination entry offline: identifier
//! syntax, positive intervals, and whether the image file exists.

use std::process::ExitCode;

use clap::Parser;

// Import from the main crate
use broadcast_user_bot::config::{BroadcastConfig, Destination, ValidationError};
use broadcast_user_bot::scheduler::format_wait;

/// Broadcast configuration validator.
#[derive(Parser, Debug)]
#[command(name = "validate_broadcast")]
#[command(about = "Validates broadcast configuration files for the Telegram userbot")]
#[command(version)]
struct Args {
    /// Path to the JSON configuration file to validate.
    #[arg(short, long, default_value = "broadcast.json")]
    file: String,

    /// Generate an example configuration file at the specified path.
    #[arg(long)]
    generate_example: Option<String>,

    /// Show detailed information for each destination.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Handle example generation
    if let Some(output_path) = args.generate_example {
        return generate_example(&output_path);
    }

    // Validate the configuration file
    validate_config(&args.file, args.verbose)
}

fn generate_example(output_path: &str) -> ExitCode {
    let example = BroadcastConfig::example();

    match example.save_to_file(output_path) {
        Ok(()) => {
            println!("✓ Example configuration written to: {output_path}");
            println!("\nThe file contains {} example destinations.", example.len());
            println!("Use `chat_id` for a chat and `chat_id/topic_id` for a forum topic.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to write example file: {e}");
            ExitCode::FAILURE
        }
    }
}

fn validate_config(path: &str, verbose: bool) -> ExitCode {
    println!("Validating: {path}\n");

    // Load the configuration
    let config = match BroadcastConfig::load_from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("✗ Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut errors = 0;
    let mut warnings = 0;

    // Message checks
    if config.message.text.trim().is_empty() {
        errors += 1;
        println!("✗ Error: {}", ValidationError::EmptyText);
    } else if verbose {
        println!(
            "Message: \"{}\" ({} chars)",
            truncate(&config.message.text, 40),
            config.message.text.chars().count()
        );
    }

    if let Some(image) = &config.message.image_path {
        if config.image_missing() {
            warnings += 1;
            println!("⚠ Warning: image {} not found, text will be sent alone", image.display());
        } else if verbose {
            println!("Image: {}", image.display());
        }
    }

    if config.is_empty() {
        errors += 1;
        println!("✗ Error: {}", ValidationError::NoDestinations);
    }

    println!();

    // Destination checks
    let results = config.validate_all();
    let mut seen = std::collections::HashSet::new();

    for (entry, result) in config.destinations.iter().zip(&results) {
        if verbose {
            println!(
                "[{}] every {}",
                entry.destination.trim(),
                format_wait(std::time::Duration::from_secs(entry.interval_secs))
            );
        }

        match result {
            Ok(()) => {
                let duplicate = entry
                    .destination
                    .parse::<Destination>()
                    .is_ok_and(|dest| !seen.insert(dest));
                if duplicate {
                    warnings += 1;
                    println!(
                        "  ⚠ Warning: {} is listed more than once, the last interval wins",
                        entry.destination.trim()
                    );
                } else if verbose {
                    println!("  ✓ OK");
                }
            }
            Err(e) => {
                errors += 1;
                println!("  ✗ Error: {e}");
            }
        }
    }

    println!();

    // Summary
    let total = config.len();
    if errors == 0 {
        println!("✓ All {total} destinations are valid!");

        if warnings > 0 {
            println!("  ({warnings} warning(s))");
        }

        ExitCode::SUCCESS
    } else {
        println!("✗ Validation failed: {errors} error(s) in {total} destinations");

        ExitCode::FAILURE
    }
}

/// Truncates a string for display.
fn truncate(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", chars[..max_len].iter().collect::<String>())
    }
}
