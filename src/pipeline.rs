use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::bam::BamSource;
use crate::chunk::Chunker;
use crate::cli::Cli;
use crate::dispatcher::Dispatcher;
use crate::error::PileupError;
use crate::regions;
use crate::runtime::RuntimeContext;
use crate::worker;

/// Top-level orchestration: build the runtime context, open the input,
/// chunk it, run the worker pool, and flush the result. The temp run
/// directory is torn down on the way out regardless of the outcome, since
/// it is only ever owned by a local variable here.
pub fn run(
    cli: Cli,
    samtools_args: Vec<String>,
    bcftools_args: Vec<String>,
    has_caller: bool,
) -> Result<(), PileupError> {
    let nthreads = cli.nthreads();
    let run_dir = TempRunDir::create(&cli.tmpdir)?;

    let ctx = RuntimeContext::new(
        &samtools_args,
        &bcftools_args,
        has_caller,
        run_dir.path().to_path_buf(),
        nthreads,
        cli.buffer_size,
    )?;

    if let Some(note) = &ctx.downgrade_note {
        eprintln!("sambamba-pileup: note: {note}");
    }

    let input = cli.inputs.first().ok_or_else(|| {
        PileupError::ArgRejected("at least one input BAM file is required".to_string())
    })?;

    let source = match &cli.regions {
        Some(path) => {
            let regions = regions::parse_regions(path)?;
            BamSource::open_with_regions(input, &regions)?
        }
        None => BamSource::open(input)?,
    };
    let header = source.header().clone();
    let ref_names = source.ref_names();

    let sink: Box<dyn Write + Send> = match &cli.output_filename {
        Some(path) => Box::new(BufWriter::new(File::create(path).map_err(PileupError::from)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let chunker = Chunker::new(source, ctx.buffer_size);
    let dispatcher = Arc::new(Dispatcher::new(
        chunker,
        ref_names,
        run_dir.path().to_path_buf(),
        sink,
    ));

    worker::run_pool(Arc::clone(&ctx), Arc::clone(&dispatcher), header)?;

    dispatcher.flush_sink()
}

/// `<tmpdir>/sambamba-fork-<6 random chars>`, removed on drop.
struct TempRunDir {
    dir: tempfile::TempDir,
}

impl TempRunDir {
    fn create(parent: &Path) -> Result<Self, PileupError> {
        let dir = tempfile::Builder::new()
            .prefix("sambamba-fork-")
            .rand_bytes(6)
            .tempdir_in(parent)
            .map_err(PileupError::from)?;
        Ok(Self { dir })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}
