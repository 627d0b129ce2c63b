use std::path::PathBuf;

use clap::{
    builder::{
        styling::{AnsiColor, Effects},
        Styles,
    },
    Parser,
};

// Configures Clap v3-style help menu colors
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Default chunk size target, in approximate bytes of read data, before
/// handing a chunk off to a worker.
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(
    name = "sambamba-pileup",
    styles = STYLES,
    version,
    about = "Runs mpileup/bcftools over a BAM file across a worker pool, in chunk order"
)]
pub struct Cli {
    /// Coordinate-sorted input BAM file
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Restrict pileup to regions listed in this BED file
    #[arg(short = 'L', long = "regions")]
    pub regions: Option<PathBuf>,

    /// Write final output here instead of stdout
    #[arg(short = 'o', long = "output-filename")]
    pub output_filename: Option<PathBuf>,

    /// Parent directory for this run's private temp directory
    #[arg(long, default_value = "/tmp")]
    pub tmpdir: PathBuf,

    /// Worker pool size (0 = number of logical CPUs)
    #[arg(short = 't', long = "nthreads", default_value_t = 0)]
    pub nthreads: usize,

    /// Target chunk size, in bytes of read data
    #[arg(short = 'b', long = "buffer-size", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

impl Cli {
    pub fn nthreads(&self) -> usize {
        if self.nthreads == 0 {
            num_cpus::get()
        } else {
            self.nthreads.min(num_cpus::get() * 4)
        }
    }
}
