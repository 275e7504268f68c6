//! Boundary-behavior tests for the pipeline.

use basc_ast::{
    AstFactory, BinOp, Block, Program, SelectStmt, StmtKind, TypeRef, WhileStmt,
};
use basc_drv::{CompileOptions, Pipeline};
use basc_emit::EmitterConfig;
use basc_util::{Span, Symbol};

fn int_ty() -> TypeRef {
    TypeRef::named(Symbol::intern("Integer"))
}

fn compile(program: &Program) -> String {
    Pipeline::new(CompileOptions::default())
        .compile(program)
        .expect("compilation failed")
        .code
}

/// EDGE CASE: an empty void body emits an empty body with no `return;`.
#[test]
fn test_empty_void_body() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.subroutine("Nothing", vec![], vec![])]);

    let code = compile(&program);
    assert!(!code.contains("return"), "output:\n{}", code);
    assert!(code.contains("public static void Nothing()"), "output:\n{}", code);
}

/// EDGE CASE: a loop with no exits emits an infinite loop with no trailing
/// dead code.
#[test]
fn test_infinite_loop_no_trailing_code() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.subroutine(
        "Forever",
        vec![],
        vec![f.stmt(
            StmtKind::While(WhileStmt {
                cond: f.boolean(true),
                body: Block::default(),
            }),
            Span::DUMMY,
        )],
    )]);

    let code = compile(&program);
    assert!(code.contains("while (true)"), "output:\n{}", code);
    assert!(!code.contains("return"), "output:\n{}", code);
}

/// EDGE CASE: a Select with only a Case Else emits a single default arm.
#[test]
fn test_select_with_only_default() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.subroutine(
        "OnlyDefault",
        vec![f.parameter("x", int_ty())],
        vec![
            f.local("r", Some(int_ty()), Some(f.int(0))),
            f.stmt(
                StmtKind::Select(SelectStmt {
                    scrutinee: f.ident("x"),
                    cases: vec![],
                    default: Some(Block::new(vec![f.assign(f.ident("r"), f.int(1))])),
                }),
                Span::DUMMY,
            ),
        ],
    )]);

    let code = compile(&program);
    assert_eq!(code.matches("default:").count(), 1, "output:\n{}", code);
    assert!(!code.contains("case "), "output:\n{}", code);
}

/// EDGE CASE: a Select with no default gets a synthetic empty one.
#[test]
fn test_select_without_default() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.subroutine(
        "NoDefault",
        vec![f.parameter("x", int_ty())],
        vec![
            f.local("r", Some(int_ty()), Some(f.int(0))),
            f.stmt(
                StmtKind::Select(SelectStmt {
                    scrutinee: f.ident("x"),
                    cases: vec![basc_ast::SelectCase {
                        patterns: vec![f.pattern(
                            basc_ast::CasePatternKind::Constant(f.int(1)),
                            None,
                            Span::DUMMY,
                        )],
                        body: Block::new(vec![f.assign(f.ident("r"), f.int(1))]),
                    }],
                    default: None,
                }),
                Span::DUMMY,
            ),
        ],
    )]);

    let code = compile(&program);
    assert!(code.contains("case 1:"), "output:\n{}", code);
    assert_eq!(code.matches("default:").count(), 1, "output:\n{}", code);
}

/// EDGE CASE: reserved-word identifiers are escaped, digit-leading ones
/// prefixed.
#[test]
fn test_identifier_sanitation() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.function(
        "Echo",
        vec![f.parameter("class", int_ty())],
        int_ty(),
        vec![f.ret(Some(f.ident("class")))],
    )]);

    let code = compile(&program);
    assert!(code.contains("int @class"), "output:\n{}", code);
    assert!(code.contains("return @class;"), "output:\n{}", code);
}

/// EDGE CASE: emitter configuration is honored.
#[test]
fn test_emitter_configuration() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.subroutine("Noop", vec![], vec![])]);

    let options = CompileOptions {
        emitter: EmitterConfig {
            namespace: "MyApp".to_string(),
            class_name: "Generated".to_string(),
            synthesize_main: true,
            ..EmitterConfig::default()
        },
        ..CompileOptions::default()
    };
    let code = Pipeline::new(options).compile(&program).unwrap().code;

    assert!(code.contains("namespace MyApp"), "output:\n{}", code);
    assert!(code.contains("class Generated"), "output:\n{}", code);
    assert!(
        code.contains("public static void Main(string[] args)"),
        "output:\n{}",
        code
    );
}

/// EDGE CASE: a user Main suppresses synthesis.
#[test]
fn test_no_main_synthesis_when_present() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.subroutine(
        "Main",
        vec![],
        vec![f.expr_stmt(f.call("PrintLine", vec![f.string("x")]))],
    )]);

    let options = CompileOptions {
        emitter: EmitterConfig {
            synthesize_main: true,
            ..EmitterConfig::default()
        },
        ..CompileOptions::default()
    };
    let code = Pipeline::new(options).compile(&program).unwrap().code;
    assert_eq!(code.matches("void Main").count(), 1, "output:\n{}", code);
}

/// EDGE CASE: global variables land in the output class as static fields.
#[test]
fn test_globals_as_static_fields() {
    let f = AstFactory::new();
    let program = Program::new(vec![
        f.global_var("counter", Some(int_ty()), Some(f.int(7))),
        f.function(
            "Get",
            vec![],
            int_ty(),
            vec![f.ret(Some(f.ident("counter")))],
        ),
    ]);

    let code = compile(&program);
    assert!(
        code.contains("public static int counter = 7;"),
        "output:\n{}",
        code
    );
    assert!(code.contains("return counter;"), "output:\n{}", code);
}

/// EDGE CASE: string concatenation with a numeric operand still emits `+`.
#[test]
fn test_concat_emission() {
    let f = AstFactory::new();
    let string_ty = TypeRef::named(Symbol::intern("String"));
    let program = Program::new(vec![f.function(
        "Label",
        vec![f.parameter("n", int_ty())],
        string_ty,
        vec![f.ret(Some(f.binary(
            BinOp::Concat,
            f.string("n = "),
            f.ident("n"),
        )))],
    )]);

    let code = compile(&program);
    assert!(code.contains("return \"n = \" + n;"), "output:\n{}", code);
}
