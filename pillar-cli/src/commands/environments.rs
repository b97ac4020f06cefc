//! Environment listing

use colored::*;
use pillar_infra::Environment;

pub fn list_environments() {
    println!("{}", "Environments:".bold());
    for env in Environment::ALL {
        println!(
            "  {} {:<10} {}  {}",
            "▸".cyan(),
            env.as_str().bold(),
            env.default_cidr().dimmed(),
            format!("website: {}", env.qualify("website")).dimmed()
        );
    }
}
