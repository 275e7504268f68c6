//! End-to-end pipeline tests: AST in, structured C# out.

use basc_ast::{
    AstFactory, BinOp, Block, CasePatternKind, DoCondKind, DoLoopStmt, DoTest, ExitKind, ForStmt,
    IfStmt, Program, SelectCase, SelectStmt, StmtKind, TypeRef, WhileStmt,
};
use basc_drv::{CompileOptions, Pipeline};
use basc_util::{Span, Symbol};

fn int_ty() -> TypeRef {
    TypeRef::named(Symbol::intern("Integer"))
}

fn string_ty() -> TypeRef {
    TypeRef::named(Symbol::intern("String"))
}

fn compile(program: &Program) -> String {
    Pipeline::new(CompileOptions::default())
        .compile(program)
        .expect("compilation failed")
        .code
}

fn compile_optimized(program: &Program) -> String {
    Pipeline::with_defaults()
        .compile(program)
        .expect("compilation failed")
        .code
}

/// S1: add two parameters and return, with no temporary binding.
#[test]
fn test_s1_add_two_parameters() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.function(
        "Add",
        vec![f.parameter("a", int_ty()), f.parameter("b", int_ty())],
        int_ty(),
        vec![f.ret(Some(f.binary(BinOp::Add, f.ident("a"), f.ident("b"))))],
    )]);

    let code = compile(&program);
    assert!(code.contains("return a + b;"), "output:\n{}", code);
    assert!(!code.contains("__t"), "temp leaked:\n{}", code);
}

/// S2: recursive Fibonacci reconstructs if/else with no temp locals.
#[test]
fn test_s2_recursive_fibonacci() {
    let f = AstFactory::new();
    let recurse = f.binary(
        BinOp::Add,
        f.call("Fibonacci", vec![f.binary(BinOp::Sub, f.ident("n"), f.int(1))]),
        f.call("Fibonacci", vec![f.binary(BinOp::Sub, f.ident("n"), f.int(2))]),
    );
    let body = vec![f.stmt(
        StmtKind::If(IfStmt {
            cond: f.binary(BinOp::Le, f.ident("n"), f.int(1)),
            then_block: Block::new(vec![f.ret(Some(f.ident("n")))]),
            else_ifs: vec![],
            else_block: Some(Block::new(vec![f.ret(Some(recurse))])),
        }),
        Span::DUMMY,
    )];
    let program = Program::new(vec![f.function(
        "Fibonacci",
        vec![f.parameter("n", int_ty())],
        int_ty(),
        body,
    )]);

    let code = compile(&program);
    assert!(code.contains("if (n <= 1)"), "output:\n{}", code);
    assert!(code.contains("return n;"), "output:\n{}", code);
    assert!(
        code.contains("return Fibonacci(n - 1) + Fibonacci(n - 2);"),
        "output:\n{}",
        code
    );
    assert!(!code.contains("__t"), "temp leaked:\n{}", code);
}

/// S3: counted summation loop becomes a while with the increment folded
/// onto the loop variable.
#[test]
fn test_s3_counted_summation() {
    let f = AstFactory::new();
    let body = vec![f.assign(
        f.ident("sum"),
        f.binary(BinOp::Add, f.ident("sum"), f.ident("i")),
    )];
    let program = Program::new(vec![f.function(
        "Sum",
        vec![f.parameter("n", int_ty())],
        int_ty(),
        vec![
            f.local("sum", Some(int_ty()), Some(f.int(0))),
            f.stmt(
                StmtKind::For(ForStmt {
                    var: Symbol::intern("i"),
                    start: f.int(1),
                    end: f.ident("n"),
                    step: None,
                    body: Block::new(body),
                }),
                Span::DUMMY,
            ),
            f.ret(Some(f.ident("sum"))),
        ],
    )]);

    let code = compile(&program);
    assert!(code.contains("while (i <= n)"), "output:\n{}", code);
    assert!(code.contains("sum = sum + i;"), "output:\n{}", code);
    assert!(code.contains("i = i + 1;"), "output:\n{}", code);
    assert!(code.contains("return sum;"), "output:\n{}", code);
}

/// S4: early exit from a search loop becomes `break;`.
#[test]
fn test_s4_linear_search_break() {
    let f = AstFactory::new();
    let arr_ty = TypeRef::array(Symbol::intern("Integer"), 1);
    let if_found = f.stmt(
        StmtKind::If(IfStmt {
            cond: f.binary(
                BinOp::Eq,
                f.array_access(f.ident("arr"), vec![f.ident("i")]),
                f.ident("target"),
            ),
            then_block: Block::new(vec![
                f.assign(f.ident("result"), f.ident("i")),
                f.stmt(StmtKind::Exit(ExitKind::For), Span::DUMMY),
            ]),
            else_ifs: vec![],
            else_block: None,
        }),
        Span::DUMMY,
    );
    let program = Program::new(vec![f.function(
        "Find",
        vec![f.parameter("arr", arr_ty), f.parameter("target", int_ty())],
        int_ty(),
        vec![
            f.local("result", Some(int_ty()), Some(f.unary(basc_ast::UnOp::Neg, f.int(1)))),
            f.stmt(
                StmtKind::For(ForStmt {
                    var: Symbol::intern("i"),
                    start: f.int(0),
                    end: f.int(9),
                    step: None,
                    body: Block::new(vec![if_found]),
                }),
                Span::DUMMY,
            ),
            f.ret(Some(f.ident("result"))),
        ],
    )]);

    let code = compile(&program);
    assert!(code.contains("if (arr[i] == target)"), "output:\n{}", code);
    assert!(code.contains("break;"), "output:\n{}", code);
    assert!(code.contains("result = i;"), "output:\n{}", code);
}

/// S5: Select Case with shared case targets and an else arm.
#[test]
fn test_s5_select_case() {
    let f = AstFactory::new();
    let case = |values: Vec<i64>, text: &str| SelectCase {
        patterns: values
            .into_iter()
            .map(|v| f.pattern(CasePatternKind::Constant(f.int(v)), None, Span::DUMMY))
            .collect(),
        body: Block::new(vec![f.assign(f.ident("r"), f.string(text))]),
    };
    let program = Program::new(vec![f.function(
        "DayName",
        vec![f.parameter("day", int_ty())],
        string_ty(),
        vec![
            f.local("r", Some(string_ty()), Some(f.string(""))),
            f.stmt(
                StmtKind::Select(SelectStmt {
                    scrutinee: f.ident("day"),
                    cases: vec![case(vec![1], "Mon"), case(vec![2, 3], "Mid")],
                    default: Some(Block::new(vec![
                        f.assign(f.ident("r"), f.string("Other"))
                    ])),
                }),
                Span::DUMMY,
            ),
            f.ret(Some(f.ident("r"))),
        ],
    )]);

    let code = compile(&program);
    assert!(code.contains("switch (day)"), "output:\n{}", code);
    assert!(code.contains("case 1:"), "output:\n{}", code);
    assert!(code.contains("case 2:"), "output:\n{}", code);
    assert!(code.contains("case 3:"), "output:\n{}", code);
    assert!(code.contains("default:"), "output:\n{}", code);
    assert!(code.contains("break;"), "output:\n{}", code);
    assert!(code.contains("r = \"Mid\";"), "output:\n{}", code);
}

/// S6: a Do-Until post-test loop keeps its shape and negates the condition.
#[test]
fn test_s6_do_until() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.subroutine(
        "Count",
        vec![],
        vec![
            f.local("count", Some(int_ty()), Some(f.int(0))),
            f.stmt(
                StmtKind::DoLoop(DoLoopStmt {
                    cond: f.binary(BinOp::Gt, f.ident("count"), f.int(3)),
                    body: Block::new(vec![f.assign(
                        f.ident("count"),
                        f.binary(BinOp::Add, f.ident("count"), f.int(1)),
                    )]),
                    test: DoTest::Post,
                    cond_kind: DoCondKind::Until,
                }),
                Span::DUMMY,
            ),
        ],
    )]);

    let code = compile(&program);
    assert!(code.contains("do"), "output:\n{}", code);
    assert!(
        code.contains("} while (!(count > 3));"),
        "output:\n{}",
        code
    );
    assert!(code.contains("count = count + 1;"), "output:\n{}", code);
}

/// Nested loops: an inner Exit For emits a break that exits only the inner
/// loop; the outer keeps iterating.
#[test]
fn test_nested_loops_inner_break() {
    let f = AstFactory::new();
    let inner = f.stmt(
        StmtKind::For(ForStmt {
            var: Symbol::intern("j"),
            start: f.int(0),
            end: f.int(5),
            step: None,
            body: Block::new(vec![f.stmt(
                StmtKind::If(IfStmt {
                    cond: f.binary(BinOp::Gt, f.ident("j"), f.ident("i")),
                    then_block: Block::new(vec![f.stmt(
                        StmtKind::Exit(ExitKind::For),
                        Span::DUMMY,
                    )]),
                    else_ifs: vec![],
                    else_block: None,
                }),
                Span::DUMMY,
            )]),
        }),
        Span::DUMMY,
    );
    let program = Program::new(vec![f.subroutine(
        "Nested",
        vec![],
        vec![f.stmt(
            StmtKind::For(ForStmt {
                var: Symbol::intern("i"),
                start: f.int(0),
                end: f.int(5),
                step: None,
                body: Block::new(vec![inner]),
            }),
            Span::DUMMY,
        )],
    )]);

    let code = compile(&program);
    // Exactly one break, inside the inner loop body.
    assert_eq!(code.matches("break;").count(), 1, "output:\n{}", code);
    let break_pos = code.find("break;").unwrap();
    let outer_inc = code.find("i = i + 1;").unwrap();
    assert!(break_pos < outer_inc, "break must precede the outer increment:\n{}", code);
}

/// Constant expressions fold before emission when the optimizer runs.
#[test]
fn test_constant_folding_through_pipeline() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.function(
        "Five",
        vec![],
        int_ty(),
        vec![f.ret(Some(f.binary(BinOp::Add, f.int(2), f.int(3))))],
    )]);

    let code = compile_optimized(&program);
    assert!(code.contains("return 5;"), "output:\n{}", code);
}

/// Identical input and configuration produce byte-identical output.
#[test]
fn test_emission_determinism() {
    let f = AstFactory::new();
    let program = Program::new(vec![
        f.global_var("total", Some(int_ty()), Some(f.int(0))),
        f.function(
            "Twice",
            vec![f.parameter("x", int_ty())],
            int_ty(),
            vec![f.ret(Some(f.binary(BinOp::Mul, f.ident("x"), f.int(2))))],
        ),
    ]);

    let first = compile(&program);
    let second = compile(&program);
    assert_eq!(first, second);

    let optimized_once = compile_optimized(&program);
    let optimized_twice = compile_optimized(&program);
    assert_eq!(optimized_once, optimized_twice);
}

/// Errors abort before emission and carry the diagnostics.
#[test]
fn test_errors_abort_compilation() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.function(
        "Bad",
        vec![],
        int_ty(),
        vec![f.ret(Some(f.ident("missing")))],
    )]);

    let err = Pipeline::with_defaults().compile(&program).unwrap_err();
    match err {
        basc_drv::CompileError::Analysis { errors, diagnostics } => {
            assert_eq!(errors, 1);
            assert!(!diagnostics.is_empty());
        }
        other => panic!("expected analysis failure, found {}", other),
    }
}

/// Warnings do not block emission and are surfaced on the output.
#[test]
fn test_warnings_are_surfaced() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.subroutine(
        "W",
        vec![],
        vec![f.stmt(
            StmtKind::While(WhileStmt {
                cond: f.int(1),
                body: Block::default(),
            }),
            Span::DUMMY,
        )],
    )]);

    let output = Pipeline::with_defaults().compile(&program).unwrap();
    assert!(!output.diagnostics.is_empty());
}

/// Standard-library calls map to their target templates with imports.
#[test]
fn test_stdlib_mapping() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.subroutine(
        "Hello",
        vec![],
        vec![
            f.expr_stmt(f.call("Print", vec![f.string("hi ")])),
            f.expr_stmt(f.call("PrintLine", vec![f.call("UCase", vec![f.string("there")])])),
        ],
    )]);

    let code = compile(&program);
    assert!(code.contains("using System;"), "output:\n{}", code);
    assert!(code.contains("Console.Write(\"hi \");"), "output:\n{}", code);
    assert!(
        code.contains("Console.WriteLine((\"there\").ToUpper());"),
        "output:\n{}",
        code
    );
}

/// Emitted output survives a write/read round trip unchanged.
#[test]
fn test_output_file_round_trip() {
    let f = AstFactory::new();
    let program = Program::new(vec![f.function(
        "Id",
        vec![f.parameter("x", int_ty())],
        int_ty(),
        vec![f.ret(Some(f.ident("x")))],
    )]);

    let code = compile(&program);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Program.cs");
    std::fs::write(&path, &code).unwrap();
    let read_back = std::fs::read_to_string(&path).unwrap();
    assert_eq!(code, read_back);
}
