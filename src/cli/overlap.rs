use clap::Parser;
use pulldown::error::Result;
use pulldown::overlap::compare_files;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::trace;

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// First list, one protein per line
    first: PathBuf,

    /// Second list, one protein per line
    second: PathBuf,
}

pub(crate) fn run(args: &Args) -> Result<()> {
    trace!("{args:?}");
    let overlap = compare_files(&args.first, &args.second)?;
    print_set(&format!("Only in {}", args.first.display()), &overlap.only_first);
    print_set(&format!("Only in {}", args.second.display()), &overlap.only_second);
    print_set("In both lists", &overlap.both);
    Ok(())
}

fn print_set(title: &str, set: &BTreeSet<String>) {
    println!("{title} ({}):", set.len());
    for entry in set {
        println!("  {entry}");
    }
}
