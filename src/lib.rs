// Library interface for sambamba-pileup
// This allows integration tests to access the internal modules

pub mod argnorm;
pub mod bam;
pub mod chunk;
pub mod cli;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod fifo;
pub mod format;
pub mod growbuf;
pub mod helpers;
pub mod pipeline;
pub mod probe;
pub mod process;
pub mod regions;
pub mod runtime;
pub mod worker;
