//! CLI argument definitions

use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::analysis::CallLogFormat;
use crate::pipeline::{Backend, RunConfig};

#[derive(Parser)]
#[command(
    name = "afgprof",
    about = "Symbolize raw caller/callee addresses and report call counts",
    after_help = "\
EXAMPLES:
    afgprof profile/                              Resolve with eu-addr2line, one worker
    afgprof -j 8 --objdir build/ profile/         Eight workers, objects from build/
    afgprof --backend dwarf --demangle profile/   In-process DWARF, demangled names"
)]
pub struct Args {
    /// Directory holding `maps` and the call log
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Directory to find unstripped objects in (matched by basename)
    #[arg(long, value_name = "DIRECTORY", default_value = "objects")]
    pub objdir: PathBuf,

    /// addr2line-compatible command used by the addr2line backend
    #[arg(long, value_name = "COMMAND", default_value = "eu-addr2line")]
    pub addr2line: String,

    /// Number of oracle workers per object (0 = number of CPUs)
    #[arg(short, long, value_name = "N", default_value = "1")]
    pub jobs: usize,

    /// Symbol resolution backend
    #[arg(long, value_enum, default_value = "addr2line")]
    pub backend: Backend,

    /// Call log flavor: `unmapped-calls` records or pre-aggregated `calls`
    #[arg(long, value_enum, default_value = "unmapped")]
    pub format: CallLogFormat,

    /// Demangle Rust symbol names
    #[arg(long)]
    pub demangle: bool,

    /// Write the report to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Indent the JSON report
    #[arg(long)]
    pub pretty: bool,
}

impl Args {
    /// Library-facing run settings; `--jobs 0` becomes the CPU count
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        let concurrency = if self.jobs == 0 {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        } else {
            self.jobs
        };

        RunConfig {
            input_dir: self.directory.clone(),
            object_dir: self.objdir.clone(),
            oracle_command: self.addr2line.clone(),
            concurrency,
            backend: self.backend,
            format: self.format,
            demangle: self.demangle,
        }
    }
}
