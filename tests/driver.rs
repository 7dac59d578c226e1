//! End-to-end tests of the compiler driver on programs written to disk.
use cadence::cmdline::{BackendOpt, Opts};
use cadence::driver;
use cadence_frontend::{
    header::read_header, BinOp, Const, Decl, Equation, Expr, Interface, Node,
    NodeSignature, Program, Provenance, Type, VarDecl,
};
use cadence_ir::{eval::Simulator, Callee};
use cadence_opt::pass_manager::PassManager;
use cadence_utils::{Error, Id, MismatchField, OutputFile};
use std::fs;
use std::path::{Path, PathBuf};

fn write_json<T: serde::Serialize>(path: &Path, value: &T) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn opts(file: PathBuf, passes: &[&str]) -> Opts {
    Opts {
        file: Some(file),
        lib_path: vec![],
        output: OutputFile::Null,
        backend: BackendOpt::Machines,
        pass: passes.iter().map(|p| p.to_string()).collect(),
        disable_pass: vec![],
        extra_opts: vec![],
        header_dir: None,
        log_level: log::LevelFilter::Warn,
        list_passes: false,
        dump_ir: false,
    }
}

fn program(name: &str, nodes: Vec<Node>) -> Program {
    let mut p = Program::new(name);
    p.decls.extend(nodes.into_iter().map(Decl::Node));
    p
}

fn counter() -> Node {
    let mut n = Node::new("counter");
    n.outputs.push(VarDecl::new("out", Type::Int));
    n.memories.push(VarDecl::new("c", Type::Int));
    n.equations = vec![
        Equation::fby(
            "c",
            Some(Const::Int(0)),
            Expr::binop(BinOp::Add, Expr::var("c"), Expr::int(1)),
        ),
        Equation::def("out", Expr::var("c")),
    ];
    n
}

/// `N(x: int) -> (y: ty)` with `y = x > 0` for booleans and `y = x + 1`
/// otherwise.
fn node_n(ty: Type) -> Node {
    let mut n = Node::new("N");
    n.inputs.push(VarDecl::new("x", Type::Int));
    let body = match ty {
        Type::Bool => Expr::binop(BinOp::Gt, Expr::var("x"), Expr::int(0)),
        _ => Expr::binop(BinOp::Add, Expr::var("x"), Expr::int(1)),
    };
    n.outputs.push(VarDecl::new("y", ty));
    n.equations.push(Equation::def("y", body));
    n
}

fn module_m() -> Program {
    let mut n = Node::new("main");
    n.inputs.push(VarDecl::new("a", Type::Int));
    n.outputs.push(VarDecl::new("b", Type::Int));
    n.equations.push(Equation::call(
        vec!["b".into()],
        "N",
        vec![Expr::var("a")],
    ));
    let mut m = program("M", vec![n]);
    m.decls.insert(0, Decl::Import { module: "P".into() });
    m
}

#[test]
fn counter_machine_counts_from_zero() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("C.json");
    write_json(&file, &program("C", vec![counter()]));

    let pm = PassManager::default_passes().unwrap();
    let (ctx, header) = driver::compile(&pm, &opts(file, &["all"])).unwrap();

    let mut sim = Simulator::new(&ctx, "counter".into()).unwrap();
    sim.reset().unwrap();
    assert_eq!(sim.memory("c".into()), Some(&Const::Int(0)));
    for expected in 0..3 {
        assert_eq!(sim.step(&[]).unwrap(), vec![Some(Const::Int(expected))]);
        assert_eq!(sim.memory("c".into()), Some(&Const::Int(expected + 1)));
    }

    // The header of the module is written next to its source.
    assert_eq!(header.provenance, Provenance::FromSource);
    let on_disk = read_header(&dir.path().join("C.cdh")).unwrap();
    assert_eq!(on_disk, header);
}

#[test]
fn causality_cycle_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut n = Node::new("loop");
    n.outputs.push(VarDecl::new("o", Type::Int));
    n.locals.push(VarDecl::new("a", Type::Int));
    n.locals.push(VarDecl::new("b", Type::Int));
    n.equations = vec![
        Equation::def(
            "a",
            Expr::binop(BinOp::Add, Expr::var("b"), Expr::int(1)),
        ),
        Equation::def(
            "b",
            Expr::binop(BinOp::Add, Expr::var("a"), Expr::int(1)),
        ),
        Equation::def("o", Expr::var("a")),
    ];
    let file = dir.path().join("L.json");
    write_json(&file, &program("L", vec![n]));

    let pm = PassManager::default_passes().unwrap();
    match driver::compile(&pm, &opts(file, &["all"])) {
        Err(Error::CausalityCycle { node, vars }) => {
            assert_eq!(node, "loop");
            assert_eq!(vars, vec![Id::from("a"), Id::from("b")]);
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("cyclic node compiled"),
    }
    // Nothing is written when compilation fails.
    assert!(!dir.path().join("L.cdh").exists());
}

#[test]
fn imported_nodes_become_imported_instances() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        &dir.path().join("P.json"),
        &program("P", vec![node_n(Type::Int)]),
    );
    let file = dir.path().join("M.json");
    write_json(&file, &module_m());

    let pm = PassManager::default_passes().unwrap();
    let (ctx, _) = driver::compile(&pm, &opts(file, &["all"])).unwrap();
    let main = ctx.find_machine("main".into()).unwrap();
    assert_eq!(main.instances.len(), 1);
    assert_eq!(
        main.instances[0].callee,
        Callee::Imported {
            module: "P".into()
        }
    );
    // The dependency header was derived from the source of `P`.
    assert!(dir.path().join("P.cdh").exists());
}

#[test]
fn interface_disagreeing_with_source_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        &dir.path().join("P.json"),
        &program("P", vec![node_n(Type::Bool)]),
    );
    let declared = Interface {
        module: "P".into(),
        types: vec![],
        consts: vec![],
        nodes: vec![NodeSignature {
            name: "N".into(),
            inputs: vec![VarDecl::new("x", Type::Int)],
            outputs: vec![VarDecl::new("y", Type::Int)],
        }],
    };
    write_json(&dir.path().join("P.cdi"), &declared);
    let file = dir.path().join("M.json");
    write_json(&file, &module_m());

    let pm = PassManager::default_passes().unwrap();
    match driver::compile(&pm, &opts(file, &["all"])) {
        Err(Error::InterfaceCompatibility { node, field, .. }) => {
            assert_eq!(node, "N");
            assert_eq!(field, MismatchField::Type);
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("incompatible interface accepted"),
    }
}

#[test]
fn interface_header_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("P.json");
    write_json(&file, &program("P", vec![node_n(Type::Int)]));
    let iface = Interface {
        module: "P".into(),
        types: vec![],
        consts: vec![],
        nodes: vec![NodeSignature {
            name: "N".into(),
            inputs: vec![VarDecl::new("v", Type::Int)],
            outputs: vec![VarDecl::new("w", Type::Int)],
        }],
    };
    write_json(&dir.path().join("P.cdi"), &iface);

    let pm = PassManager::default_passes().unwrap();
    let (_, header) =
        driver::compile(&pm, &opts(file.clone(), &["all"])).unwrap();
    assert_eq!(header.provenance, Provenance::FromInterface);
    assert_eq!(header.nodes, iface.nodes);

    // A second compilation checks the existing header and leaves it alone.
    let (_, again) = driver::compile(&pm, &opts(file, &["all"])).unwrap();
    assert_eq!(again, header);
}

#[test]
fn machines_backend_writes_json() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("C.json");
    write_json(&file, &program("C", vec![counter()]));
    let out = dir.path().join("out.json");
    let mut o = opts(file, &["compile", "well-formed"]);
    o.output = OutputFile::File(out.clone());
    o.header_dir = Some(dir.path().join("headers"));
    fs::create_dir(dir.path().join("headers")).unwrap();
    driver::run(&o).unwrap();

    let dump: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(dump["module"], "C");
    assert_eq!(dump["machines"][0]["name"], "counter");
    assert!(dir.path().join("headers").join("C.cdh").exists());
}

#[test]
fn unknown_pass_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("C.json");
    write_json(&file, &program("C", vec![counter()]));
    let pm = PassManager::default_passes().unwrap();
    assert!(driver::compile(&pm, &opts(file, &["inline-everything"])).is_err());
}
