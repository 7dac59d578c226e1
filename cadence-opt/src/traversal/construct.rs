use super::Visitor;
use cadence_ir::Context;
use cadence_utils::{CadenceResult, OutputFile};
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;

#[derive(Clone, Debug)]
/// The value returned from parsing an option.
pub enum ParseVal {
    /// A boolean option.
    Bool(bool),
    /// An output stream (stdout, stderr, file name)
    OutStream(OutputFile),
}

impl ParseVal {
    pub fn bool(&self) -> bool {
        let ParseVal::Bool(b) = self else {
            panic!("Expected bool, got {self}");
        };
        *b
    }

    /// Returns an output stream if it is not the null stream
    pub fn not_null_outstream(&self) -> Option<OutputFile> {
        match self {
            ParseVal::OutStream(OutputFile::Null) => None,
            ParseVal::OutStream(o) => Some(o.clone()),
            _ => panic!("Expected output stream, got {self}"),
        }
    }
}

impl std::fmt::Display for ParseVal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseVal::Bool(b) => write!(f, "{b}"),
            ParseVal::OutStream(o) => write!(f, "{o}"),
        }
    }
}

/// Option that can be passed to a pass.
pub struct PassOpt {
    name: &'static str,
    description: &'static str,
    default: ParseVal,
    parse: fn(&str) -> Option<ParseVal>,
}

impl PassOpt {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        default: ParseVal,
        parse: fn(&str) -> Option<ParseVal>,
    ) -> Self {
        Self {
            name,
            description,
            default,
            parse,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn description(&self) -> &'static str {
        self.description
    }

    pub const fn default(&self) -> &ParseVal {
        &self.default
    }

    fn parse(&self, s: &str) -> Option<ParseVal> {
        (self.parse)(s)
    }

    pub fn parse_bool(s: &str) -> Option<ParseVal> {
        match s {
            "true" => Some(ParseVal::Bool(true)),
            "false" => Some(ParseVal::Bool(false)),
            _ => None,
        }
    }

    pub fn parse_outstream(s: &str) -> Option<ParseVal> {
        s.parse::<OutputFile>().ok().map(ParseVal::OutStream)
    }
}

/// Trait that describes named things. Calling [`do_pass`](Visitor::do_pass)
/// and [`do_pass_default`](Visitor::do_pass_default) require this to be
/// implemented.
///
/// This has to be a separate trait from [`Visitor`] because these methods
/// don't recieve `self` which means that it is impossible to create dynamic
/// trait objects.
pub trait Named {
    /// The name of a pass. Is used for identifying passes.
    fn name() -> &'static str;
    /// A short description of the pass.
    fn description() -> &'static str;
    /// Set of options that can be passed to the pass.
    fn opts() -> Vec<PassOpt> {
        vec![]
    }
}

/// Trait defining method that can be used to construct a Visitor from a
/// [Context].
/// This is useful when a pass needs to construct information using the
/// context *before* visiting the machines.
///
/// For passes that don't need to use the context, this trait can be
/// automatically be derived from [Default].
pub trait ConstructVisitor {
    /// Values of the options of this pass given with `-x pass:opt=val`, or
    /// their defaults.
    fn get_opts(ctx: &Context) -> LinkedHashMap<&'static str, ParseVal>
    where
        Self: Named,
    {
        let opts = Self::opts();
        let n = Self::name();
        let mut values: LinkedHashMap<&'static str, ParseVal> = ctx
            .extra_opts
            .iter()
            .filter_map(|opt| {
                // The format is either -x pass:opt or -x pass:opt=val
                let (pass, rest) = opt.split_once(':')?;
                if pass != n {
                    return None;
                }
                let (name, val) = match rest.split_once('=') {
                    Some((name, val)) => (name, Some(val)),
                    None => (rest, None),
                };
                let Some(opt) = opts.iter().find(|o| o.name == name) else {
                    log::warn!(
                        "Ignoring unknown option for pass `{n}`: {name}"
                    );
                    return None;
                };
                let val = match val {
                    Some(v) => {
                        let Some(v) = opt.parse(v) else {
                            log::warn!(
                                "Ignoring invalid value for option \
                                 `{n}:{}`: {v}",
                                opt.name(),
                            );
                            return None;
                        };
                        v
                    }
                    None => ParseVal::Bool(true),
                };
                Some((opt.name(), val))
            })
            .collect();

        // Options not given on the command line take their default.
        for opt in opts {
            if !values.contains_key(opt.name()) {
                values.insert(opt.name(), opt.default.clone());
            }
        }

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Extra options for {}: {}",
                Self::name(),
                values.iter().map(|(o, v)| format!("{o}->{v}")).join(", ")
            );
        }

        values
    }

    /// Construct the visitor using information from the Context
    fn from(_ctx: &Context) -> CadenceResult<Self>
    where
        Self: Sized;

    /// Clear the data stored in the visitor. Called before traversing the
    /// next machine by [Visitor::do_pass].
    fn clear_data(&mut self);
}

/// Derive ConstructVisitor when [Default] is provided for a visitor.
impl<T: Default + Sized + Visitor> ConstructVisitor for T {
    fn from(_ctx: &Context) -> CadenceResult<Self> {
        Ok(T::default())
    }

    fn clear_data(&mut self) {
        *self = T::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::Visitor;

    #[derive(Default)]
    struct Opts;

    impl Named for Opts {
        fn name() -> &'static str {
            "opts"
        }

        fn description() -> &'static str {
            "pass with options"
        }

        fn opts() -> Vec<PassOpt> {
            vec![
                PassOpt::new(
                    "flag",
                    "a flag",
                    ParseVal::Bool(false),
                    PassOpt::parse_bool,
                ),
                PassOpt::new(
                    "strict",
                    "another flag",
                    ParseVal::Bool(true),
                    PassOpt::parse_bool,
                ),
                PassOpt::new(
                    "dump",
                    "a stream",
                    ParseVal::OutStream(OutputFile::Null),
                    PassOpt::parse_outstream,
                ),
            ]
        }
    }

    impl Visitor for Opts {}

    #[test]
    fn options_are_parsed_with_defaults() {
        let mut ctx = Context::new("m".into());
        ctx.extra_opts = vec![
            "opts:flag".to_string(),
            "opts:dump=<err>".to_string(),
            "opts:strict=nope".to_string(),
            "other:strict=false".to_string(),
        ];
        let opts = Opts::get_opts(&ctx);
        assert!(opts["flag"].bool());
        assert!(opts["strict"].bool());
        assert!(matches!(
            opts["dump"].not_null_outstream(),
            Some(OutputFile::Stderr)
        ));
        assert_eq!(
            opts.keys().copied().collect::<Vec<_>>(),
            vec!["flag", "dump", "strict"]
        );
    }
}
