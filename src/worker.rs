use std::sync::Arc;
use std::thread;

use crate::bam::{BamHeader, BamRead};
use crate::chunk::AlignedRead;
use crate::dispatcher::{ChunkJob, Dispatcher};
use crate::error::PileupError;
use crate::fifo::{create_fifo, FifoWriterHandle};
use crate::process;
use crate::runtime::RuntimeContext;

/// Runs a fixed-size pool of worker threads against `dispatcher`, each
/// pulling chunks until none remain or the pipeline aborts. Returns the
/// first error encountered by any worker, if any.
pub fn run_pool<I, R>(
    ctx: Arc<RuntimeContext>,
    dispatcher: Arc<Dispatcher<I, R>>,
    header: BamHeader,
) -> Result<(), PileupError>
where
    I: Iterator<Item = Result<R, PileupError>> + Send + 'static,
    R: AlignedRead + Into<BamRead> + Send + 'static,
{
    let mut handles = Vec::with_capacity(ctx.nthreads);
    for _ in 0..ctx.nthreads {
        let ctx = Arc::clone(&ctx);
        let dispatcher = Arc::clone(&dispatcher);
        let header = header.clone();
        handles.push(thread::spawn(move || worker_loop(&ctx, &dispatcher, &header)));
    }

    let mut first_err = None;
    for handle in handles {
        let result = handle
            .join()
            .unwrap_or_else(|_| Err(PileupError::IoFailure("worker thread panicked".to_string())));
        if let Err(e) = result {
            if first_err.is_none() {
                first_err = Some(e);
            }
        }
    }

    match first_err {
        Some(e) => {
            dispatcher.abort();
            Err(e)
        }
        None => Ok(()),
    }
}

fn worker_loop<I, R>(
    ctx: &RuntimeContext,
    dispatcher: &Dispatcher<I, R>,
    header: &BamHeader,
) -> Result<(), PileupError>
where
    I: Iterator<Item = Result<R, PileupError>>,
    R: AlignedRead + Into<BamRead>,
{
    while let Some(job) = dispatcher.next_chunk()? {
        match process_chunk(ctx, &job, header) {
            Ok(bytes) => {
                dispatcher.emit_in_order(job.num, &bytes, &ctx.command_builder.recipe)?;
            }
            Err(e) => {
                dispatcher.abort();
                return Err(e);
            }
        }
    }
    Ok(())
}

fn process_chunk<R>(
    ctx: &RuntimeContext,
    job: &ChunkJob<R>,
    header: &BamHeader,
) -> Result<Vec<u8>, PileupError>
where
    R: AlignedRead + Into<BamRead>,
{
    create_fifo(&job.fifo_path)?;

    let command_line = ctx
        .command_builder
        .build(&job.fifo_path.to_string_lossy(), job.num);

    // The external process is spawned before the FIFO-writer thread so its
    // non-blocking open probe sees a reader promptly instead of polling
    // against a reader that hasn't started yet.
    let process = process::spawn(&command_line)?;

    let header = header.clone();
    let reads: Vec<BamRead> = job.chunk.reads.iter().cloned().map(Into::into).collect();
    let fifo_writer = FifoWriterHandle::spawn(job.fifo_path.clone(), move |file| {
        crate::bam::write_chunk_to_fifo(file, &header, &reads)
    });

    // `finish` must run before `join`: it drains the pipeline's stdout
    // concurrently with the writer thread filling the FIFO. Joining the
    // writer first would block this thread while nothing reads the far end
    // of the pipe, and once the pipeline's own stdout buffer backs up the
    // last stage stalls, stops draining the FIFO, and the writer never
    // returns.
    let output = process.finish(&command_line)?;
    fifo_writer.join()?;

    let _ = std::fs::remove_file(&job.fifo_path);
    let _ = std::fs::remove_file(&job.bed_path);

    Ok(output)
}
