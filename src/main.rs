use std::process::ExitCode;

use clap::Parser;

use sambamba_pileup::cli::Cli;
use sambamba_pileup::{helpers, pipeline};

const PROGRAM: &str = "sambamba-pileup";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && is_helper_command(&args[1]) {
        return match helpers::dispatch(&args[1..]) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{PROGRAM}: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let (main_args, samtools_args, bcftools_args, has_caller) = split_passthrough_args(&args[1..]);

    let cli = match Cli::try_parse_from(std::iter::once(PROGRAM.to_string()).chain(main_args)) {
        Ok(cli) => cli,
        Err(e) => {
            let no_inputs = !args[1..].iter().any(|a| !a.starts_with('-'));
            e.print().ok();
            return if no_inputs {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    match pipeline::run(cli, samtools_args, bcftools_args, has_caller) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{PROGRAM}: {e}");
            ExitCode::FAILURE
        }
    }
}

fn is_helper_command(arg: &str) -> bool {
    matches!(arg, "strip-bcf-header" | "lz4-compress" | "lz4-decompress")
}

/// Splits `--samtools <rest...>` and `--bcftools <rest...>` off the end of
/// the command line; clap only ever sees the leading segment, since the
/// passthrough args belong to external tools with their own flag syntax.
fn split_passthrough_args(args: &[String]) -> (Vec<String>, Vec<String>, Vec<String>, bool) {
    let samtools_pos = args.iter().position(|a| a == "--samtools");
    let bcftools_pos = args.iter().position(|a| a == "--bcftools");

    let main_end = samtools_pos
        .into_iter()
        .chain(bcftools_pos)
        .min()
        .unwrap_or(args.len());
    let main_args = args[..main_end].to_vec();

    let (samtools_args, bcftools_args) = match (samtools_pos, bcftools_pos) {
        (Some(s), Some(b)) if s < b => (args[s + 1..b].to_vec(), args[b + 1..].to_vec()),
        (Some(s), Some(b)) => (args[s + 1..].to_vec(), args[b + 1..s].to_vec()),
        (Some(s), None) => (args[s + 1..].to_vec(), Vec::new()),
        (None, Some(b)) => (Vec::new(), args[b + 1..].to_vec()),
        (None, None) => (Vec::new(), Vec::new()),
    };

    (main_args, samtools_args, bcftools_args, bcftools_pos.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_both_passthrough_groups() {
        let args = s(&[
            "in.bam",
            "--samtools",
            "-g",
            "-u",
            "--bcftools",
            "-Ov",
            "call",
        ]);
        let (main_args, samtools, bcftools, has_caller) = split_passthrough_args(&args);
        assert_eq!(main_args, s(&["in.bam"]));
        assert_eq!(samtools, s(&["-g", "-u"]));
        assert_eq!(bcftools, s(&["-Ov", "call"]));
        assert!(has_caller);
    }

    #[test]
    fn no_passthrough_groups_leaves_args_untouched() {
        let args = s(&["in.bam", "-t", "4"]);
        let (main_args, samtools, bcftools, has_caller) = split_passthrough_args(&args);
        assert_eq!(main_args, args);
        assert!(samtools.is_empty());
        assert!(bcftools.is_empty());
        assert!(!has_caller);
    }
}
