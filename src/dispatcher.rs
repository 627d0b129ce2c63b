use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::chunk::{AlignedRead, Chunk, Chunker};
use crate::error::PileupError;
use crate::format::Recipe;

struct SchedulingState<I, R> {
    chunker: Chunker<I, R>,
    next_num: u64,
}

struct OrderState {
    curr_num: u64,
    sink: Box<dyn Write + Send>,
}

/// One chunk's worth of work handed to a worker: where to read input from,
/// where to write caller output to, and the BED side-car restricting the
/// caller to this chunk's own region.
pub struct ChunkJob<R> {
    pub num: u64,
    pub chunk: Chunk<R>,
    pub fifo_path: PathBuf,
    pub bed_path: PathBuf,
}

/// Hands out chunks in ascending order and, independently, enforces that
/// finished chunks are written to the final sink in that same order
/// regardless of which worker finishes first. A sticky abort flag drains
/// the pool as soon as any worker, or the chunker itself, hits an error.
pub struct Dispatcher<I, R> {
    scheduling: Mutex<SchedulingState<I, R>>,
    ref_names: Vec<String>,
    tmp_dir: PathBuf,
    order: Mutex<OrderState>,
    order_cv: Condvar,
    aborted: AtomicBool,
}

impl<I, R> Dispatcher<I, R>
where
    I: Iterator<Item = Result<R, PileupError>>,
    R: AlignedRead,
{
    pub fn new(
        chunker: Chunker<I, R>,
        ref_names: Vec<String>,
        tmp_dir: PathBuf,
        sink: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            scheduling: Mutex::new(SchedulingState {
                chunker,
                next_num: 1,
            }),
            ref_names,
            tmp_dir,
            order: Mutex::new(OrderState { curr_num: 1, sink }),
            order_cv: Condvar::new(),
            aborted: AtomicBool::new(false),
        }
    }

    /// Pulls the next chunk and assigns it the next ascending number.
    /// Returns `Ok(None)` once the chunker is exhausted or the pipeline
    /// has been aborted.
    pub fn next_chunk(&self) -> Result<Option<ChunkJob<R>>, PileupError> {
        if self.is_aborted() {
            return Ok(None);
        }

        let (num, chunk) = {
            let mut state = self.scheduling.lock();
            match state.chunker.next() {
                Some(Ok(chunk)) => {
                    let num = state.next_num;
                    state.next_num += 1;
                    (num, chunk)
                }
                Some(Err(e)) => {
                    drop(state);
                    self.abort();
                    return Err(e);
                }
                None => return Ok(None),
            }
        };

        let fifo_path = self.tmp_dir.join(num.to_string());
        let bed_path = bed_sidecar_path(&fifo_path);
        self.write_bed_sidecar(&bed_path, &chunk)?;

        Ok(Some(ChunkJob {
            num,
            chunk,
            fifo_path,
            bed_path,
        }))
    }

    fn write_bed_sidecar(&self, path: &Path, chunk: &Chunk<R>) -> Result<(), PileupError> {
        let reference = self
            .ref_names
            .get(chunk.ref_id as usize)
            .map(String::as_str)
            .unwrap_or("*");
        let line = format!(
            "{reference}\t{}\t{}\n",
            chunk.start_position, chunk.end_position
        );
        std::fs::write(path, line).map_err(PileupError::from)
    }

    /// Writes `bytes` to the final sink only if `num` is next in line;
    /// otherwise returns `Ok(false)` without touching the sink.
    pub fn try_emit(&self, num: u64, bytes: &[u8], recipe: &Recipe) -> Result<bool, PileupError> {
        let mut state = self.order.lock();
        if state.curr_num != num {
            return Ok(false);
        }
        match recipe.decompress(bytes, &mut state.sink) {
            Ok(()) => {
                state.curr_num += 1;
                self.order_cv.notify_all();
                Ok(true)
            }
            Err(e) => {
                drop(state);
                self.abort();
                Err(e)
            }
        }
    }

    /// Blocks until `num` is next in line, then writes `bytes` to the
    /// final sink. Returns an error immediately if the pipeline is
    /// aborted while waiting for its turn.
    pub fn emit_in_order(
        &self,
        num: u64,
        bytes: &[u8],
        recipe: &Recipe,
    ) -> Result<(), PileupError> {
        let mut state = self.order.lock();
        loop {
            if self.is_aborted() {
                return Err(PileupError::IoFailure(
                    "pipeline aborted before this chunk's turn to emit".to_string(),
                ));
            }
            if state.curr_num == num {
                break;
            }
            self.order_cv.wait(&mut state);
        }

        match recipe.decompress(bytes, &mut state.sink) {
            Ok(()) => {
                state.curr_num += 1;
                self.order_cv.notify_all();
                Ok(())
            }
            Err(e) => {
                drop(state);
                self.abort();
                Err(e)
            }
        }
    }

    pub fn flush_sink(&self) -> Result<(), PileupError> {
        self.order.lock().sink.flush().map_err(PileupError::from)
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.order_cv.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

fn bed_sidecar_path(fifo_path: &Path) -> PathBuf {
    let mut s = fifo_path.as_os_str().to_owned();
    s.push(".bed");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunker;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct FakeRead;
    impl AlignedRead for FakeRead {
        fn ref_id(&self) -> i32 {
            0
        }
        fn start(&self) -> i64 {
            0
        }
        fn end(&self) -> i64 {
            0
        }
        fn approx_size(&self) -> usize {
            0
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<StdMutex<Vec<u8>>>);
    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn empty_chunker() -> Chunker<std::vec::IntoIter<Result<FakeRead, PileupError>>, FakeRead> {
        Chunker::new(Vec::new().into_iter(), 1024)
    }

    #[test]
    fn emits_out_of_order_completions_in_ascending_order() {
        let shared = SharedBuf::default();
        let dispatcher = Arc::new(Dispatcher::new(
            empty_chunker(),
            vec!["chr1".to_string()],
            std::env::temp_dir(),
            Box::new(shared.clone()),
        ));
        let recipe = Recipe {
            strip_header: false,
            compress: false,
        };

        let mut handles = Vec::new();
        for num in 1..=8u64 {
            let dispatcher = Arc::clone(&dispatcher);
            let recipe = recipe;
            handles.push(thread::spawn(move || {
                // chunks that sort later "finish" first; ordering must
                // still hold on the way out.
                thread::sleep(Duration::from_millis((9 - num) * 5));
                let body = format!("body {num}\n");
                dispatcher
                    .emit_in_order(num, body.as_bytes(), &recipe)
                    .unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let expected: String = (1..=8u64).map(|n| format!("body {n}\n")).collect();
        let actual = String::from_utf8(shared.0.lock().unwrap().clone()).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn try_emit_refuses_out_of_turn_chunks() {
        let shared = SharedBuf::default();
        let dispatcher = Dispatcher::new(
            empty_chunker(),
            vec!["chr1".to_string()],
            std::env::temp_dir(),
            Box::new(shared),
        );
        let recipe = Recipe {
            strip_header: false,
            compress: false,
        };
        assert!(!dispatcher.try_emit(2, b"later", &recipe).unwrap());
        assert!(dispatcher.try_emit(1, b"first", &recipe).unwrap());
        assert!(dispatcher.try_emit(2, b"later", &recipe).unwrap());
    }

    #[test]
    fn a_decompress_error_aborts_the_pipeline() {
        let shared = SharedBuf::default();
        let dispatcher = Dispatcher::new(
            empty_chunker(),
            vec!["chr1".to_string()],
            std::env::temp_dir(),
            Box::new(shared),
        );
        let recipe = Recipe {
            strip_header: false,
            compress: true,
        };
        assert!(dispatcher.try_emit(1, b"not a valid lz4 frame", &recipe).is_err());
        assert!(dispatcher.is_aborted());
    }
}
