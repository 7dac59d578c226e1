use crate::{
    ast::Program,
    compat::check_compatibility,
    header::{
        read_interface, CompiledHeader, HeaderStore, Interface, INTERFACE_EXT,
    },
};
use cadence_utils::{CadenceResult, Error, Id};
use linked_hash_map::LinkedHashMap;
use std::path::{Path, PathBuf};

/// Load a program serialized by the front end.
pub fn load_program(path: &Path) -> CadenceResult<Program> {
    let contents = std::fs::read_to_string(path).map_err(|err| {
        Error::io(format!("cannot read {}", path.display()), err)
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        Error::malformed(format!("{}: {e}", path.display()))
    })
}

/// A Workspace is a compilation unit together with everything it depends on:
/// the headers of its imports and its own hand-written interface if present.
///
/// # Example
/// When compiling `M.json`, which imports module `P`:
/// * `P.cdh` is searched in the directory of `M.json`, then on the library
///   path. If it is missing it is derived from `P.cdi` or `P.json`.
/// * The header is checked against the current compiler revision and, when
///   `P.json` is also found, against the signatures of its source.
/// * If `M.cdi` exists next to `M.json`, the nodes of `M` are checked against
///   it before anything is compiled.
pub struct Workspace {
    pub program: Program,
    /// Path of the source file, if the program was read from disk.
    pub source: Option<PathBuf>,
    /// Headers of imported modules, keyed by module name.
    pub imports: LinkedHashMap<Id, CompiledHeader>,
    /// Hand-written interface of this module.
    pub interface: Option<Interface>,
}

impl Workspace {
    /// A workspace without imports, for programs constructed in memory.
    pub fn from_program(program: Program) -> Self {
        Self::with_imports(program, vec![])
    }

    pub fn with_imports(
        program: Program,
        imports: impl IntoIterator<Item = CompiledHeader>,
    ) -> Self {
        Workspace {
            program,
            source: None,
            imports: imports.into_iter().map(|h| (h.module, h)).collect(),
            interface: None,
        }
    }

    /// Construct a new workspace from the program serialized in `file`.
    /// Imports are searched relative to the file first and then in each
    /// directory of `lib_path`.
    pub fn construct(file: &Path, lib_path: &[PathBuf]) -> CadenceResult<Self> {
        let program = load_program(file)?;
        let parent = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut search = vec![parent.clone()];
        search.extend(lib_path.iter().cloned());
        let store = HeaderStore::new(search);

        let mut imports = LinkedHashMap::new();
        for module in program.imports() {
            if module == program.name {
                return Err(Error::malformed(format!(
                    "module `{module}' imports itself"
                )));
            }
            if imports.contains_key(&module) {
                continue;
            }
            let header = store.load_dependency(module)?;
            log::debug!(
                "Imported {} node(s) from `{module}'",
                header.nodes.len()
            );
            imports.insert(module, header);
        }

        let iface_path =
            parent.join(format!("{}.{INTERFACE_EXT}", program.name));
        let interface = if iface_path.exists() {
            let iface = read_interface(&iface_path)?;
            if iface.module != program.name {
                return Err(Error::malformed(format!(
                    "interface {} describes module `{}', expected `{}'",
                    iface_path.display(),
                    iface.module,
                    program.name
                )));
            }
            check_compatibility(&iface.nodes, &program.signatures())?;
            Some(iface)
        } else {
            None
        };

        Ok(Workspace {
            program,
            source: Some(file.to_path_buf()),
            imports,
            interface,
        })
    }
}
