use crate::error::PileupError;
use crate::format::{OutputFormat, Recipe};

/// Letters that must survive unbundling glued to their value, because the
/// caller reads them as `-O<value>` (`-Ov`, `-Ob`, `-Ou`, `-Oz`).
pub const CALLER_WHITELIST: [char; 1] = ['O'];

pub struct NormalizeOutcome {
    pub pileup_args: Vec<String>,
    pub caller_args: Vec<String>,
    pub format: OutputFormat,
    pub downgrade_note: Option<String>,
}

/// Splits a bundled short-flag token (`-abcFOO`) into single-letter flags
/// plus a trailing value (`[-a, -b, -c, FOO]`). A token whose first flag
/// letter is in `exclude` is left untouched (returns `None`), since some
/// callers attach a value directly to a flag letter (`-Ov`).
fn unbundle_one(tok: &str, exclude: &[char]) -> Option<Vec<String>> {
    let rest = tok.strip_prefix('-')?;
    if rest.len() < 2 {
        return None;
    }
    let mut chars = rest.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if exclude.contains(&first) {
        return None;
    }

    let mut flags = vec![first];
    let mut iter = rest.chars().skip(1).peekable();
    while let Some(&c) = iter.peek() {
        if c.is_ascii_alphabetic() {
            flags.push(c);
            iter.next();
        } else {
            break;
        }
    }
    let remainder: String = iter.collect();

    let mut out: Vec<String> = flags.iter().map(|f| format!("-{f}")).collect();
    if !remainder.is_empty() {
        out.push(remainder);
    }
    Some(out)
}

pub fn unbundle(tokens: &[String], exclude: &[char]) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    for tok in tokens {
        match unbundle_one(tok, exclude) {
            Some(mut expanded) => out.append(&mut expanded),
            None => out.push(tok.clone()),
        }
    }
    out
}

fn forbid_output_flag(tokens: &[String], group: &str) -> Result<(), PileupError> {
    let forbidden = tokens.iter().any(|t| {
        t == "-o" || t == "--output-filename" || t.starts_with("--output-filename=")
    });
    if forbidden {
        return Err(PileupError::ArgRejected(format!(
            "{group}: `-o`/`--output-filename` is forbidden; the driver owns the final output"
        )));
    }
    Ok(())
}

/// Scans caller args for the last `-Ov|-Ob|-Ou|-Oz` flag (last one wins),
/// defaulting to VCF when none is given. `-Oz` (bgzipped VCF) is rejected.
fn detect_caller_format(caller: &[String]) -> Result<OutputFormat, PileupError> {
    let mut found: Option<OutputFormat> = None;
    for tok in caller {
        found = match tok.as_str() {
            "-Ov" => Some(OutputFormat::Vcf),
            "-Ob" => Some(OutputFormat::Bcf),
            "-Ou" => Some(OutputFormat::UncompressedBcf),
            "-Oz" => Some(OutputFormat::GzippedVcf),
            _ => found,
        };
    }
    match found.unwrap_or(OutputFormat::Vcf) {
        OutputFormat::GzippedVcf => Err(PileupError::ArgRejected(
            "--bcftools: `-Oz` (bgzipped VCF output) is not supported".to_string(),
        )),
        other => Ok(other),
    }
}

fn pileup_only_format(pileup: &[String]) -> OutputFormat {
    let has_v = pileup.iter().any(|t| t == "-v");
    let has_g = pileup.iter().any(|t| t == "-g");
    let has_u = pileup.iter().any(|t| t == "-u");
    if has_v {
        OutputFormat::Vcf
    } else if has_g && has_u {
        OutputFormat::UncompressedBcf
    } else if has_g {
        OutputFormat::Bcf
    } else {
        OutputFormat::Pileup
    }
}

/// Unbundles, validates and rewrites the raw `--samtools`/`--bcftools`
/// argument lists. Idempotent: normalizing an already-normalized pair of
/// argument lists is a no-op.
pub fn normalize(
    pileup_args: &[String],
    caller_args: &[String],
    has_caller: bool,
) -> Result<NormalizeOutcome, PileupError> {
    let pileup = unbundle(pileup_args, &[]);
    let caller = unbundle(caller_args, &CALLER_WHITELIST);

    forbid_output_flag(&pileup, "--samtools")?;
    forbid_output_flag(&caller, "--bcftools")?;

    let has_g = pileup.iter().any(|t| t == "-g");
    let has_v = pileup.iter().any(|t| t == "-v");
    let has_u = pileup.iter().any(|t| t == "-u");
    if has_g && has_v {
        return Err(PileupError::ArgRejected(
            "--samtools: `-g` and `-v` are mutually exclusive".to_string(),
        ));
    }

    let mut pileup = pileup;
    let mut downgrade_note = None;
    if has_caller && !(has_g && has_u) {
        pileup.retain(|t| t != "-g" && t != "-v" && t != "-u");
        pileup.push("-g".to_string());
        pileup.push("-u".to_string());
        downgrade_note = Some(
            "downgrading --samtools output to uncompressed BCF (-gu) ahead of the caller stage"
                .to_string(),
        );
    }

    let format = if has_caller {
        detect_caller_format(&caller)?
    } else {
        pileup_only_format(&pileup)
    };

    Ok(NormalizeOutcome {
        pileup_args: pileup,
        caller_args: caller,
        format,
        downgrade_note,
    })
}

fn shell_quote(s: &str) -> String {
    let is_plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,".contains(c));
    if is_plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

/// Assembles the full `sh -c` command line for one chunk: mpileup, an
/// optional caller, an optional header strip, and an optional compression
/// stage, piped together.
pub struct CommandBuilder {
    pub mpileup_exe: String,
    pub caller_exe: Option<String>,
    pub pileup_args: Vec<String>,
    pub caller_args: Vec<String>,
    pub format: OutputFormat,
    pub recipe: Recipe,
    pub self_exe: String,
}

impl CommandBuilder {
    pub fn build(&self, fifo_path: &str, num: u64) -> String {
        let bed_path = format!("{fifo_path}.bed");
        let mut stages = vec![format!(
            "{} mpileup -l {} {} {}",
            shell_quote(&self.mpileup_exe),
            shell_quote(&bed_path),
            self.pileup_args
                .iter()
                .map(|a| shell_quote(a))
                .collect::<Vec<_>>()
                .join(" "),
            shell_quote(fifo_path),
        )];

        if let Some(caller) = &self.caller_exe {
            stages.push(format!(
                "{} {}",
                shell_quote(caller),
                self.caller_args
                    .iter()
                    .map(|a| shell_quote(a))
                    .collect::<Vec<_>>()
                    .join(" "),
            ));
        }

        if let Some(strip) = self.recipe.strip_header_cmd(&self.self_exe, self.format, num) {
            stages.push(strip);
        }
        if let Some(compress) = self.recipe.compression_cmd(&self.self_exe) {
            stages.push(compress);
        }

        stages.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbundle_splits_contiguous_alpha_flags() {
        let out = unbundle(&["-abc.OO".to_string()], &[]);
        assert_eq!(out, vec!["-a", "-b", "-c", ".OO"]);
    }

    #[test]
    fn unbundle_preserves_whitelisted_caller_flags() {
        let out = unbundle(
            &["-gu".to_string(), "-Ob".to_string()],
            &CALLER_WHITELIST,
        );
        assert_eq!(out, vec!["-g", "-u", "-Ob"]);
    }

    #[test]
    fn unbundle_leaves_long_options_alone() {
        let out = unbundle(&["--output-filename=x".to_string()], &[]);
        assert_eq!(out, vec!["--output-filename=x"]);
    }

    #[test]
    fn forbidden_output_flag_is_rejected() {
        let err = normalize(&["-o".to_string(), "out.vcf".to_string()], &[], false).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("-o"));
        assert!(msg.contains("--output-filename"));
    }

    #[test]
    fn caller_presence_downgrades_pileup_to_uncompressed_bcf() {
        let outcome = normalize(&["-v".to_string()], &["-Ov".to_string()], true).unwrap();
        assert!(outcome.pileup_args.contains(&"-g".to_string()));
        assert!(outcome.pileup_args.contains(&"-u".to_string()));
        assert!(!outcome.pileup_args.contains(&"-v".to_string()));
        assert!(outcome.downgrade_note.is_some());
    }

    #[test]
    fn bgzipped_vcf_is_rejected() {
        let err = normalize(&[], &["-Oz".to_string()], true).unwrap_err();
        assert!(err.to_string().contains("-Oz"));
    }

    #[test]
    fn last_format_flag_wins() {
        let outcome = normalize(&[], &["-Ob".to_string(), "-Ov".to_string()], true).unwrap();
        assert_eq!(outcome.format, OutputFormat::Vcf);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize(&["-gu".to_string()], &["-Ob".to_string()], true).unwrap();
        let twice = normalize(&once.pileup_args, &once.caller_args, true).unwrap();
        assert_eq!(once.pileup_args, twice.pileup_args);
        assert_eq!(once.caller_args, twice.caller_args);
        assert_eq!(once.format, twice.format);
    }

    #[test]
    fn command_builder_pipes_caller_and_finishing_stages_in_order() {
        let builder = CommandBuilder {
            mpileup_exe: "samtools".to_string(),
            caller_exe: Some("bcftools".to_string()),
            pileup_args: vec!["-g".to_string(), "-u".to_string()],
            caller_args: vec!["call".to_string(), "-Ov".to_string()],
            format: OutputFormat::Vcf,
            recipe: OutputFormat::Vcf.recipe(),
            self_exe: "sambamba-pileup".to_string(),
        };

        let first = builder.build("/tmp/run/1", 1);
        let later = builder.build("/tmp/run/2", 2);

        assert!(first.contains("samtools mpileup"));
        assert!(first.contains("bcftools call -Ov"));
        assert!(!first.contains("strip-bcf-header"));
        assert!(first.contains("lz4-compress"));

        assert!(later.contains("strip-bcf-header --vcf"));
        assert!(later.contains("lz4-compress"));
    }
}
