//! The compilation context. This is the top-level object for one compilation
//! unit and owns every table the pipeline reads or fills in: nodes, types,
//! constants, imported signatures, schedules and the machine arena.
use crate::{Machine, MachineIdx, Schedule};
use cadence_frontend::{Const, ConstDecl, Node, NodeSignature, Type, TypeDecl};
use cadence_utils::{CadenceResult, Error, Id, Warning};
use linked_hash_map::LinkedHashMap;

/// A node known only through the compiled header of another module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedNode {
    pub module: Id,
    pub signature: NodeSignature,
}

pub struct Context {
    /// Name of the module being compiled.
    pub module: Id,
    /// Nodes of this module, in declaration order.
    pub nodes: LinkedHashMap<Id, Node>,
    /// Enumerated types, including imported ones.
    pub types: LinkedHashMap<Id, TypeDecl>,
    /// Global constants, including imported ones.
    pub consts: LinkedHashMap<Id, ConstDecl>,
    /// Signatures of nodes defined by imported modules.
    pub imports: LinkedHashMap<Id, ImportedNode>,
    /// Schedules computed for the nodes of this module.
    pub schedules: LinkedHashMap<Id, Schedule>,
    /// Compiled machines, callees before callers.
    pub machines: Vec<Machine>,
    /// Index of the machine compiled for each node.
    pub machine_index: LinkedHashMap<Id, MachineIdx>,
    /// Non-fatal diagnostics reported so far.
    pub warnings: Vec<Warning>,
    /// Extra options provided on the command line.
    /// Interpreted by individual passes.
    pub extra_opts: Vec<String>,
}

impl Context {
    /// An empty context for `module`.
    pub fn new(module: Id) -> Self {
        Context {
            module,
            nodes: LinkedHashMap::new(),
            types: LinkedHashMap::new(),
            consts: LinkedHashMap::new(),
            imports: LinkedHashMap::new(),
            schedules: LinkedHashMap::new(),
            machines: vec![],
            machine_index: LinkedHashMap::new(),
            warnings: vec![],
            extra_opts: vec![],
        }
    }

    pub fn node(&self, name: Id) -> CadenceResult<&Node> {
        self.nodes
            .get(&name)
            .ok_or_else(|| Error::undefined(name, "node"))
    }

    pub fn machine(&self, idx: MachineIdx) -> &Machine {
        &self.machines[idx.0]
    }

    pub fn machine_mut(&mut self, idx: MachineIdx) -> &mut Machine {
        &mut self.machines[idx.0]
    }

    /// The machine compiled for `node`, if any.
    pub fn find_machine(&self, node: Id) -> Option<&Machine> {
        self.machine_index.get(&node).map(|idx| self.machine(*idx))
    }

    /// Add a machine to the arena. A machine already compiled for the same
    /// node is replaced in place so that existing indices stay valid.
    pub fn add_machine(&mut self, machine: Machine) -> MachineIdx {
        if let Some(idx) = self.machine_index.get(&machine.name).copied() {
            self.machines[idx.0] = machine;
            return idx;
        }
        let idx = MachineIdx(self.machines.len());
        self.machine_index.insert(machine.name, idx);
        self.machines.push(machine);
        idx
    }

    /// Interface of a local or imported node.
    pub fn signature(&self, node: Id) -> Option<NodeSignature> {
        self.nodes
            .get(&node)
            .map(Node::signature)
            .or_else(|| self.imports.get(&node).map(|i| i.signature.clone()))
    }

    /// Signatures of the nodes of this module, in declaration order.
    pub fn signatures(&self) -> Vec<NodeSignature> {
        self.nodes.values().map(Node::signature).collect()
    }

    pub fn const_value(&self, name: Id) -> Option<&Const> {
        self.consts.get(&name).map(|c| &c.value)
    }

    /// Value of a memory of type `ty` after reset when no initial value is
    /// given. Enumerated types default to their first constructor.
    pub fn type_default(&self, ty: &Type) -> CadenceResult<Const> {
        Ok(match ty {
            Type::Bool => Const::Bool(false),
            Type::Int => Const::Int(0),
            Type::Real => Const::Real(cadence_frontend::Real(0.0)),
            Type::Enum(name) => {
                let decl = self
                    .types
                    .get(name)
                    .ok_or_else(|| Error::undefined(*name, "type"))?;
                let tag = decl.ctors.first().ok_or_else(|| {
                    Error::malformed(format!(
                        "enumerated type `{name}' has no constructor"
                    ))
                })?;
                Const::Enum {
                    ty: *name,
                    tag: *tag,
                }
            }
        })
    }

    /// Record a warning and report it.
    pub fn warn(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }
}
