//! Command line parsing for the Cadence compiler.
use argh::FromArgs;
use cadence_utils::{CadenceResult, Error, OutputFile};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Output produced once the pass pipeline has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendOpt {
    /// JSON dump of the machine arena, for downstream emitters.
    #[default]
    Machines,
    /// The compiled header of the module.
    Header,
    /// No output besides the compiled header written to the header
    /// directory.
    None,
}

/// Return a vector that maps strings to Backends.
#[inline(always)]
fn backends() -> Vec<(&'static str, BackendOpt)> {
    vec![
        ("machines", BackendOpt::Machines),
        ("header", BackendOpt::Header),
        ("none", BackendOpt::None),
    ]
}

/// Command line parsing for the Backend enum
impl FromStr for BackendOpt {
    type Err = String;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        // allocate a vector for the list of backends
        let backends = backends();
        // see if there is a backend for the string that we receive
        let found_backend = backends
            .iter()
            .find(|(backend_name, _)| &input == backend_name);
        if let Some((_, opt)) = found_backend {
            // return the BackendOpt if we found one
            Ok(*opt)
        } else {
            // build list of backends for error message
            let backend_str = backends
                .iter()
                .map(|(name, _)| (*name).to_string())
                .join(", ");
            Err(format!(
                "`{input}` is not a valid backend.\n\
                 Valid backends: {backend_str}"
            ))
        }
    }
}

/// Convert `BackendOpt` to a string
impl std::fmt::Display for BackendOpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendOpt::Machines => "machines",
            BackendOpt::Header => "header",
            BackendOpt::None => "none",
        };
        write!(f, "{name}")
    }
}

fn read_path(path: &str) -> Result<PathBuf, String> {
    Ok(Path::new(path).into())
}

#[derive(FromArgs)]
/// Options passed to the Cadence compiler.
pub struct Opts {
    /// input file: a program serialized by the front end
    #[argh(positional, from_str_fn(read_path))]
    pub file: Option<PathBuf>,

    /// directories searched for the headers and sources of imported modules
    #[argh(option, short = 'l', long = "lib-path")]
    pub lib_path: Vec<PathBuf>,

    /// output file, default is stdout
    #[argh(option, short = 'o', default = "OutputFile::Stdout")]
    pub output: OutputFile,

    /// select a backend
    #[argh(option, short = 'b', default = "BackendOpt::default()")]
    pub backend: BackendOpt,

    /// run this pass or alias during execution
    #[argh(
        option,
        short = 'p',
        long = "pass",
        default = "vec![\"all\".into()]"
    )]
    pub pass: Vec<String>,

    /// disable pass during execution
    #[argh(option, short = 'd', long = "disable-pass")]
    pub disable_pass: Vec<String>,

    /// extra options passed to the passes, as `pass:opt` or `pass:opt=value`
    #[argh(option, short = 'x', long = "extra-opt")]
    pub extra_opts: Vec<String>,

    /// directory receiving the compiled header of the module, default is the
    /// directory of the input file
    #[argh(option, long = "header-dir")]
    pub header_dir: Option<PathBuf>,

    /// logging level
    #[argh(option, long = "log", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,

    /// list all passes and aliases, then exit
    #[argh(switch, long = "list-passes")]
    pub list_passes: bool,

    /// print the machines after every pass
    #[argh(switch, long = "dump-ir")]
    pub dump_ir: bool,
}

impl Opts {
    /// Parse the command line.
    pub fn get_opts() -> CadenceResult<Opts> {
        let opts: Opts = argh::from_env();
        if opts.file.is_none() && !opts.list_passes {
            return Err(Error::misc("No input file provided."));
        }
        Ok(opts)
    }

    /// Directory receiving the compiled header.
    pub fn header_dir(&self) -> PathBuf {
        self.header_dir.clone().unwrap_or_else(|| {
            self.file
                .as_deref()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}
