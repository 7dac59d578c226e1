//! Compiled headers: persisted module interfaces used for separate
//! compilation.
//!
//! A compiled header `<module>.cdh` records the signature of every node a
//! module exports, together with a format marker, the compiler revision that
//! produced it and its provenance. Headers derived from a hand-written
//! interface (`<module>.cdi`) are authoritative and never regenerated;
//! headers extracted from source are regenerated when stale.
use crate::{
    ast::{ConstDecl, NodeSignature, Program, TypeDecl},
    compat::check_compatibility,
    workspace::load_program,
};
use cadence_utils::{CadenceResult, Error, Id};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

/// Current header format.
pub const FORMAT_VERSION: u32 = 2;

/// Formats this compiler can read.
pub const SUPPORTED_FORMATS: &[u32] = &[FORMAT_VERSION];

/// Revision of the compiler producing headers.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HEADER_EXT: &str = "cdh";
pub const INTERFACE_EXT: &str = "cdi";
pub const SOURCE_EXT: &str = "json";

/// Where the signatures of a header come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Copied from a hand-written interface.
    FromInterface,
    /// Extracted from the module's source.
    FromSource,
}

/// A hand-written module interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub module: Id,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub consts: Vec<ConstDecl>,
    pub nodes: Vec<NodeSignature>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledHeader {
    pub format: u32,
    pub compiler: String,
    pub provenance: Provenance,
    pub module: Id,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub consts: Vec<ConstDecl>,
    pub nodes: Vec<NodeSignature>,
}

impl CompiledHeader {
    /// Extract the interface of a source module.
    pub fn from_program(program: &Program) -> Self {
        CompiledHeader {
            format: FORMAT_VERSION,
            compiler: COMPILER_VERSION.to_string(),
            provenance: Provenance::FromSource,
            module: program.name,
            types: program.types().cloned().collect(),
            consts: program.consts().cloned().collect(),
            nodes: program.signatures(),
        }
    }

    pub fn from_interface(iface: &Interface) -> Self {
        CompiledHeader {
            format: FORMAT_VERSION,
            compiler: COMPILER_VERSION.to_string(),
            provenance: Provenance::FromInterface,
            module: iface.module,
            types: iface.types.clone(),
            consts: iface.consts.clone(),
            nodes: iface.nodes.clone(),
        }
    }

    pub fn find_node(&self, name: Id) -> Option<&NodeSignature> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

pub fn header_file(dir: &Path, module: Id) -> PathBuf {
    dir.join(format!("{module}.{HEADER_EXT}"))
}

pub fn write_header(path: &Path, header: &CompiledHeader) -> CadenceResult<()> {
    let contents = serde_json::to_string_pretty(header)
        .map_err(|e| Error::misc(format!("cannot serialize header: {e}")))?;
    fs::write(path, contents).map_err(|err| {
        Error::io(format!("cannot write header {}", path.display()), err)
    })?;
    log::info!("Wrote compiled header {}", path.display());
    Ok(())
}

/// Read a compiled header. The format marker is checked before the rest of
/// the contents is interpreted.
pub fn read_header(path: &Path) -> CadenceResult<CompiledHeader> {
    let format_err = |msg: String| Error::HeaderFormat {
        path: path.to_path_buf(),
        msg,
    };
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::io(format!("cannot read header {}", path.display()), err)
    })?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| format_err(format!("corrupt contents: {e}")))?;
    let format = value
        .get("format")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| format_err("missing format marker".to_string()))?;
    if !SUPPORTED_FORMATS.iter().any(|f| u64::from(*f) == format) {
        return Err(format_err(format!("unknown format version {format}")));
    }
    serde_json::from_value(value)
        .map_err(|e| format_err(format!("corrupt contents: {e}")))
}

pub fn read_interface(path: &Path) -> CadenceResult<Interface> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::io(format!("cannot read interface {}", path.display()), err)
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        Error::misc(format!(
            "malformed interface {}: {e}",
            path.display()
        ))
    })
}

/// Check that a header can be trusted as the header of `module`.
pub fn check_dependency(
    header: &CompiledHeader,
    module: Id,
) -> CadenceResult<()> {
    if header.module != module {
        return Err(Error::HeaderDependencyMismatch {
            module,
            msg: format!("header describes module `{}'", header.module),
        });
    }
    if header.compiler != COMPILER_VERSION {
        return Err(Error::HeaderDependencyMismatch {
            module,
            msg: format!(
                "produced by compiler revision {}, current revision is {}",
                header.compiler, COMPILER_VERSION
            ),
        });
    }
    Ok(())
}

fn modified(path: &Path) -> CadenceResult<SystemTime> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|err| {
            Error::io(format!("cannot stat {}", path.display()), err)
        })
}

/// A source-derived header is stale when it was produced by a different
/// compiler revision or format, or when the source changed after it.
fn is_stale(
    header: &CompiledHeader,
    header_path: &Path,
    source: &Path,
) -> CadenceResult<bool> {
    if header.compiler != COMPILER_VERSION || header.format != FORMAT_VERSION
    {
        return Ok(true);
    }
    Ok(modified(source)? > modified(header_path)?)
}

/// Locates and maintains the headers of dependencies.
#[derive(Clone, Debug, Default)]
pub struct HeaderStore {
    /// Directories searched in order.
    pub search: Vec<PathBuf>,
}

impl HeaderStore {
    pub fn new(search: Vec<PathBuf>) -> Self {
        HeaderStore { search }
    }

    /// First file named `<module>.<ext>` in the search path.
    pub fn find(&self, module: Id, ext: &str) -> Option<PathBuf> {
        self.search
            .iter()
            .map(|dir| dir.join(format!("{module}.{ext}")))
            .find(|p| p.exists())
    }

    /// Obtain a trusted header for the dependency `module`.
    ///
    /// An existing header must pass [check_dependency]. When the module's
    /// source is also available, a header derived from an interface is
    /// checked against the source signatures, and a header derived from
    /// source is regenerated if stale or checked otherwise. Without a header,
    /// one is derived from the module's interface or source and written next
    /// to it.
    pub fn load_dependency(&self, module: Id) -> CadenceResult<CompiledHeader> {
        let source = self.find(module, SOURCE_EXT);
        if let Some(path) = self.find(module, HEADER_EXT) {
            let header = read_header(&path)?;
            check_dependency(&header, module)?;
            let Some(source) = source else {
                log::debug!("Using header {} for `{module}'", path.display());
                return Ok(header);
            };
            let program = load_program(&source)?;
            return match header.provenance {
                Provenance::FromInterface => {
                    check_compatibility(&header.nodes, &program.signatures())?;
                    Ok(header)
                }
                Provenance::FromSource => {
                    if is_stale(&header, &path, &source)? {
                        log::info!(
                            "Header {} is stale, regenerating",
                            path.display()
                        );
                        let fresh = CompiledHeader::from_program(&program);
                        write_header(&path, &fresh)?;
                        Ok(fresh)
                    } else {
                        check_compatibility(
                            &header.nodes,
                            &program.signatures(),
                        )?;
                        Ok(header)
                    }
                }
            };
        }

        if let Some(iface_path) = self.find(module, INTERFACE_EXT) {
            let iface = read_interface(&iface_path)?;
            let header = CompiledHeader::from_interface(&iface);
            check_dependency(&header, module)?;
            if let Some(source) = &source {
                let program = load_program(source)?;
                check_compatibility(&header.nodes, &program.signatures())?;
            }
            let dir = iface_path.parent().unwrap_or(Path::new("."));
            write_header(&header_file(dir, module), &header)?;
            return Ok(header);
        }

        if let Some(source) = source {
            let program = load_program(&source)?;
            let header = CompiledHeader::from_program(&program);
            check_dependency(&header, module)?;
            let dir = source.parent().unwrap_or(Path::new("."));
            write_header(&header_file(dir, module), &header)?;
            return Ok(header);
        }

        Err(Error::undefined(module, "module"))
    }

    /// Produce the header of the module just compiled into `out_dir`.
    ///
    /// An existing header derived from an interface is kept as is and only
    /// checked against `computed`. A source-derived header is regenerated
    /// when stale. A missing header is created from `interface` when there is
    /// one and from `computed` otherwise.
    pub fn finalize_module(
        out_dir: &Path,
        computed: &CompiledHeader,
        interface: Option<&Interface>,
        source: Option<&Path>,
    ) -> CadenceResult<CompiledHeader> {
        let path = header_file(out_dir, computed.module);
        let fresh = || match interface {
            Some(iface) => CompiledHeader::from_interface(iface),
            None => computed.clone(),
        };

        if !path.exists() {
            let header = fresh();
            write_header(&path, &header)?;
            return Ok(header);
        }

        let existing = read_header(&path)?;
        match existing.provenance {
            Provenance::FromInterface => {
                check_compatibility(&existing.nodes, &computed.nodes)?;
                log::debug!(
                    "Keeping interface-derived header {}",
                    path.display()
                );
                Ok(existing)
            }
            Provenance::FromSource => {
                let stale = match source {
                    Some(src) => is_stale(&existing, &path, src)?,
                    None => true,
                };
                if stale || existing.nodes != computed.nodes {
                    let header = fresh();
                    write_header(&path, &header)?;
                    Ok(header)
                } else {
                    Ok(existing)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Decl, Equation, Expr, Node, Type, VarDecl};
    use cadence_utils::MismatchField;
    use std::{thread, time::Duration};

    fn sig_n(out: Type) -> NodeSignature {
        NodeSignature {
            name: "N".into(),
            inputs: vec![VarDecl::new("x", Type::Int)],
            outputs: vec![VarDecl::new("y", out)],
        }
    }

    fn header(module: &str, provenance: Provenance) -> CompiledHeader {
        CompiledHeader {
            format: FORMAT_VERSION,
            compiler: COMPILER_VERSION.to_string(),
            provenance,
            module: module.into(),
            types: vec![],
            consts: vec![],
            nodes: vec![sig_n(Type::Int)],
        }
    }

    #[test]
    fn header_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P.cdh");
        let h = header("P", Provenance::FromSource);
        write_header(&path, &h).unwrap();
        assert_eq!(read_header(&path).unwrap(), h);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P.cdh");
        let mut h = header("P", Provenance::FromSource);
        h.format = 99;
        write_header(&path, &h).unwrap();
        assert!(matches!(
            read_header(&path),
            Err(Error::HeaderFormat { .. })
        ));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            read_header(&path),
            Err(Error::HeaderFormat { .. })
        ));
    }

    #[test]
    fn other_compiler_revision_is_fatal() {
        let mut h = header("P", Provenance::FromSource);
        h.compiler = "0.0.0-old".to_string();
        assert!(matches!(
            check_dependency(&h, "P".into()),
            Err(Error::HeaderDependencyMismatch { .. })
        ));
    }

    #[test]
    fn dependency_header_is_derived_from_interface() {
        let dir = tempfile::tempdir().unwrap();
        let iface = Interface {
            module: "P".into(),
            types: vec![],
            consts: vec![],
            nodes: vec![sig_n(Type::Int)],
        };
        fs::write(
            dir.path().join("P.cdi"),
            serde_json::to_string(&iface).unwrap(),
        )
        .unwrap();
        let store = HeaderStore::new(vec![dir.path().to_path_buf()]);
        let h = store.load_dependency("P".into()).unwrap();
        assert_eq!(h.provenance, Provenance::FromInterface);
        assert!(dir.path().join("P.cdh").exists());
    }

    #[test]
    fn missing_dependency_is_undefined() {
        let dir = tempfile::tempdir().unwrap();
        let store = HeaderStore::new(vec![dir.path().to_path_buf()]);
        assert!(matches!(
            store.load_dependency("Q".into()),
            Err(Error::Undefined { .. })
        ));
    }

    #[test]
    fn interface_header_is_never_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let existing = header("M", Provenance::FromInterface);
        write_header(&header_file(dir.path(), "M".into()), &existing)
            .unwrap();

        let mut computed = header("M", Provenance::FromSource);
        let kept =
            HeaderStore::finalize_module(dir.path(), &computed, None, None)
                .unwrap();
        assert_eq!(kept, existing);

        computed.nodes = vec![sig_n(Type::Bool)];
        let err =
            HeaderStore::finalize_module(dir.path(), &computed, None, None)
                .unwrap_err();
        assert!(matches!(
            err,
            Error::InterfaceCompatibility {
                field: MismatchField::Type,
                ..
            }
        ));
        assert_eq!(
            read_header(&header_file(dir.path(), "M".into())).unwrap(),
            existing
        );
    }

    #[test]
    fn source_header_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        write_header(
            &header_file(dir.path(), "M".into()),
            &header("M", Provenance::FromSource),
        )
        .unwrap();
        let mut computed = header("M", Provenance::FromSource);
        computed.nodes = vec![sig_n(Type::Bool)];
        let h =
            HeaderStore::finalize_module(dir.path(), &computed, None, None)
                .unwrap();
        assert_eq!(h, computed);
        assert_eq!(
            read_header(&header_file(dir.path(), "M".into())).unwrap(),
            computed
        );
    }

    fn source_n(out: Type) -> Program {
        let mut n = Node::new("N");
        n.inputs.push(VarDecl::new("x", Type::Int));
        n.outputs.push(VarDecl::new("y", out));
        n.equations.push(Equation::def("y", Expr::var("x")));
        let mut p = Program::new("M");
        p.decls.push(Decl::Node(n));
        p
    }

    fn write_source(dir: &Path, program: &Program) {
        fs::write(
            dir.join(format!("M.{SOURCE_EXT}")),
            serde_json::to_string(program).unwrap(),
        )
        .unwrap();
    }

    // Modification times need to differ on coarse file systems.
    fn tick() {
        thread::sleep(Duration::from_millis(1100));
    }

    #[test]
    fn header_older_than_source_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = header_file(dir.path(), "M".into());
        write_header(&path, &header("M", Provenance::FromSource)).unwrap();
        tick();
        write_source(dir.path(), &source_n(Type::Bool));

        let store = HeaderStore::new(vec![dir.path().to_path_buf()]);
        let h = store.load_dependency("M".into()).unwrap();
        assert_eq!(h.nodes, vec![sig_n(Type::Bool)]);
        assert_eq!(read_header(&path).unwrap(), h);
    }

    #[test]
    fn fresh_header_disagreeing_with_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path(), &source_n(Type::Bool));
        tick();
        let path = header_file(dir.path(), "M".into());
        let existing = header("M", Provenance::FromSource);
        write_header(&path, &existing).unwrap();

        let store = HeaderStore::new(vec![dir.path().to_path_buf()]);
        assert!(matches!(
            store.load_dependency("M".into()),
            Err(Error::InterfaceCompatibility {
                field: MismatchField::Type,
                ..
            })
        ));
        assert_eq!(read_header(&path).unwrap(), existing);
    }
}
