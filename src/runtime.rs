use std::path::PathBuf;
use std::sync::Arc;

use crate::argnorm::{self, CommandBuilder, NormalizeOutcome};
use crate::error::PileupError;
use crate::probe;

/// The immutable, startup-assembled configuration every worker thread
/// shares: validated and normalized tool arguments, resolved tool paths,
/// and the pool's sizing. Built once before the first chunk is read so no
/// worker ever races another to discover or mutate shared setup.
pub struct RuntimeContext {
    pub mpileup_exe: PathBuf,
    pub caller_exe: Option<PathBuf>,
    pub command_builder: CommandBuilder,
    pub tmp_dir: PathBuf,
    pub nthreads: usize,
    pub buffer_size: usize,
    pub downgrade_note: Option<String>,
}

impl RuntimeContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pileup_args: &[String],
        caller_args: &[String],
        has_caller: bool,
        tmp_dir: PathBuf,
        nthreads: usize,
        buffer_size: usize,
    ) -> Result<Arc<Self>, PileupError> {
        // Argument validation never touches the filesystem or PATH, so it
        // runs before the (slower) tool probes.
        let NormalizeOutcome {
            pileup_args,
            caller_args,
            format,
            downgrade_note,
        } = argnorm::normalize(pileup_args, caller_args, has_caller)?;

        let mpileup_exe = probe::probe_tool("samtools")?;
        let caller_exe = if has_caller {
            Some(probe::probe_tool("bcftools")?)
        } else {
            None
        };

        let self_exe = std::env::current_exe()
            .map_err(PileupError::from)?
            .to_string_lossy()
            .into_owned();

        let command_builder = CommandBuilder {
            mpileup_exe: mpileup_exe.to_string_lossy().into_owned(),
            caller_exe: caller_exe.as_ref().map(|p| p.to_string_lossy().into_owned()),
            pileup_args,
            caller_args,
            format,
            recipe: format.recipe(),
            self_exe,
        };

        Ok(Arc::new(Self {
            mpileup_exe,
            caller_exe,
            command_builder,
            tmp_dir,
            nthreads: nthreads.max(1),
            buffer_size,
            downgrade_note,
        }))
    }
}
