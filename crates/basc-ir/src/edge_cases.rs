//! Edge case tests for basc-ir

#[cfg(test)]
mod tests {
    use crate::ir::*;
    use crate::lower::{lower_program, LowerOptions};
    use basc_ast::{AstFactory, BinOp, Program, StmtKind, TypeRef};
    use basc_sem::{Analysis, Analyzer, ConstValue};
    use basc_util::{Handler, Span, Symbol};

    fn int_ty() -> TypeRef {
        TypeRef::named(Symbol::intern("Integer"))
    }

    fn analyze(program: &Program) -> Analysis {
        let handler = Handler::new();
        match Analyzer::new(&handler).analyze(program) {
            Ok(analysis) => analysis,
            Err(_) => {
                for d in handler.diagnostics() {
                    eprintln!("{}", d);
                }
                panic!("analysis failed");
            }
        }
    }

    fn lower(program: &Program) -> Module {
        let analysis = analyze(program);
        lower_program(program, &analysis, &LowerOptions::default()).unwrap()
    }

    fn block_by_label<'f>(func: &'f Function, label: &str) -> &'f BasicBlock {
        func.blocks
            .iter()
            .find(|b| b.label.eq_str(label))
            .unwrap_or_else(|| panic!("no block labeled {}", label))
    }

    /// Add two parameters and return: one block, one BinaryOp feeding the
    /// return, no assignment in between.
    #[test]
    fn test_add_two_parameters() {
        let f = AstFactory::new();
        let program = Program::new(vec![f.function(
            "Add",
            vec![f.parameter("a", int_ty()), f.parameter("b", int_ty())],
            int_ty(),
            vec![f.ret(Some(f.binary(BinOp::Add, f.ident("a"), f.ident("b"))))],
        )]);

        let module = lower(&program);
        let func = module.get_function(Symbol::intern("Add")).unwrap();

        assert_eq!(func.block_count(), 1);
        let entry = &func.blocks[func.entry];
        assert_eq!(entry.insts.len(), 2);
        assert!(matches!(
            entry.insts[0].kind,
            InstKind::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
        let feeder = entry.insts[0].result.unwrap();
        match &entry.insts[1].kind {
            InstKind::Return { value: Some(Value::Ref(name)) } => assert_eq!(*name, feeder),
            other => panic!("expected return of the sum, found {:?}", other),
        }
    }

    /// Assignments to declared variables rename the producing instruction:
    /// `x = a + b` is a single named BinaryOp, not a temp plus a copy.
    #[test]
    fn test_assignment_folding() {
        let f = AstFactory::new();
        let program = Program::new(vec![f.function(
            "F",
            vec![f.parameter("a", int_ty()), f.parameter("b", int_ty())],
            int_ty(),
            vec![
                f.local("x", Some(int_ty()), None),
                f.assign(f.ident("x"), f.binary(BinOp::Add, f.ident("a"), f.ident("b"))),
                f.ret(Some(f.ident("x"))),
            ],
        )]);

        let module = lower(&program);
        let func = module.get_function(Symbol::intern("F")).unwrap();
        let entry = &func.blocks[func.entry];

        let named_binary = entry.insts.iter().any(|inst| {
            matches!(inst.kind, InstKind::Binary { .. })
                && inst.result.map(|r| r.eq_str("x")).unwrap_or(false)
        });
        assert!(named_binary, "binary op should be renamed to `x`:\n{}", func);
        assert!(
            !entry
                .insts
                .iter()
                .any(|i| matches!(&i.kind, InstKind::Assign { value: Value::Ref(n), .. } if n.starts_with("__t"))),
            "no temp copy should remain"
        );
    }

    /// The fold can be disabled for diagnostics.
    #[test]
    fn test_assignment_folding_disabled() {
        let f = AstFactory::new();
        let program = Program::new(vec![f.function(
            "F",
            vec![f.parameter("a", int_ty())],
            int_ty(),
            vec![
                f.local("x", Some(int_ty()), None),
                f.assign(f.ident("x"), f.binary(BinOp::Add, f.ident("a"), f.int(1))),
                f.ret(Some(f.ident("x"))),
            ],
        )]);

        let analysis = analyze(&program);
        let module = lower_program(
            &program,
            &analysis,
            &LowerOptions {
                fold_assignments: false,
            },
        )
        .unwrap();
        let func = module.get_function(Symbol::intern("F")).unwrap();
        let entry = &func.blocks[func.entry];

        assert!(entry
            .insts
            .iter()
            .any(|i| matches!(&i.kind, InstKind::Assign { value: Value::Ref(_), .. })));
    }

    /// Counted loop: init in the entry block, then cond/body/inc/end with
    /// matching loop tags, the increment renamed onto the variable.
    #[test]
    fn test_for_loop_shape() {
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
                    StmtKind::For(basc_ast::ForStmt {
                        var: Symbol::intern("i"),
                        start: f.int(1),
                        end: f.ident("n"),
                        step: None,
                        body: basc_ast::Block::new(body),
                    }),
                    Span::DUMMY,
                ),
                f.ret(Some(f.ident("sum"))),
            ],
        )]);

        let module = lower(&program);
        let func = module.get_function(Symbol::intern("Sum")).unwrap();

        let cond = block_by_label(func, "for.cond");
        assert!(matches!(cond.kind, BlockKind::LoopHeader { .. }));
        assert!(matches!(
            cond.insts[0].kind,
            InstKind::Compare {
                op: CompareOp::Le,
                ..
            }
        ));
        assert!(matches!(
            cond.terminator().unwrap().kind,
            InstKind::CondBranch { .. }
        ));

        let body = block_by_label(func, "for.body");
        assert!(body.insts.iter().any(|inst| {
            matches!(inst.kind, InstKind::Binary { op: BinaryOp::Add, .. })
                && inst.result.map(|r| r.eq_str("sum")).unwrap_or(false)
        }));

        let inc = block_by_label(func, "for.inc");
        assert!(matches!(inc.kind, BlockKind::LoopInc { .. }));
        assert!(inc.insts.iter().any(|inst| {
            matches!(inst.kind, InstKind::Binary { op: BinaryOp::Add, .. })
                && inst.result.map(|r| r.eq_str("i")).unwrap_or(false)
        }));

        let end = block_by_label(func, "for.end");
        assert!(matches!(end.kind, BlockKind::LoopEnd { .. }));
    }

    /// Exit For branches to the loop's end block.
    #[test]
    fn test_exit_for_branches_to_end() {
        let f = AstFactory::new();
        let body = vec![f.stmt(StmtKind::Exit(basc_ast::ExitKind::For), Span::DUMMY)];
        let program = Program::new(vec![f.subroutine(
            "S",
            vec![],
            vec![f.stmt(
                StmtKind::For(basc_ast::ForStmt {
                    var: Symbol::intern("i"),
                    start: f.int(0),
                    end: f.int(9),
                    step: None,
                    body: basc_ast::Block::new(body),
                }),
                Span::DUMMY,
            )],
        )]);

        let module = lower(&program);
        let func = module.get_function(Symbol::intern("S")).unwrap();

        let body = block_by_label(func, "for.body");
        let end = block_by_label(func, "for.end");
        match &body.terminator().unwrap().kind {
            InstKind::Branch { target } => assert_eq!(*target, end.id),
            other => panic!("expected branch to loop end, found {:?}", other),
        }
    }

    /// Do-Until: the body runs first and the end block sits on the true
    /// edge of the condition.
    #[test]
    fn test_do_until_swapped_branches() {
        let f = AstFactory::new();
        let program = Program::new(vec![f.subroutine(
            "S",
            vec![],
            vec![
                f.local("count", Some(int_ty()), Some(f.int(0))),
                f.stmt(
                    StmtKind::DoLoop(basc_ast::DoLoopStmt {
                        cond: f.binary(BinOp::Gt, f.ident("count"), f.int(3)),
                        body: basc_ast::Block::new(vec![f.assign(
                            f.ident("count"),
                            f.binary(BinOp::Add, f.ident("count"), f.int(1)),
                        )]),
                        test: basc_ast::DoTest::Post,
                        cond_kind: basc_ast::DoCondKind::Until,
                    }),
                    Span::DUMMY,
                ),
            ],
        )]);

        let module = lower(&program);
        let func = module.get_function(Symbol::intern("S")).unwrap();

        // Entry jumps straight into the body.
        let body = block_by_label(func, "do.body");
        match &func.blocks[func.entry].terminator().unwrap().kind {
            InstKind::Branch { target } => assert_eq!(*target, body.id),
            other => panic!("expected branch into body, found {:?}", other),
        }

        let cond = block_by_label(func, "do.cond");
        let end = block_by_label(func, "do.end");
        match &cond.terminator().unwrap().kind {
            InstKind::CondBranch {
                then_block,
                else_block,
                ..
            } => {
                assert_eq!(*then_block, end.id);
                assert_eq!(*else_block, body.id);
            }
            other => panic!("expected cond branch, found {:?}", other),
        }
    }

    /// Select Case with shared-target case values and a default.
    #[test]
    fn test_switch_grouping() {
        let f = AstFactory::new();
        let string_ty = TypeRef::named(Symbol::intern("String"));
        let case = |values: Vec<i64>, text: &str| basc_ast::SelectCase {
            patterns: values
                .into_iter()
                .map(|v| {
                    f.pattern(
                        basc_ast::CasePatternKind::Constant(f.int(v)),
                        None,
                        Span::DUMMY,
                    )
                })
                .collect(),
            body: basc_ast::Block::new(vec![f.assign(f.ident("r"), f.string(text))]),
        };

        let program = Program::new(vec![f.subroutine(
            "S",
            vec![f.parameter("day", int_ty())],
            vec![
                f.local("r", Some(string_ty), None),
                f.stmt(
                    StmtKind::Select(basc_ast::SelectStmt {
                        scrutinee: f.ident("day"),
                        cases: vec![case(vec![1], "Mon"), case(vec![2, 3], "Mid")],
                        default: Some(basc_ast::Block::new(vec![
                            f.assign(f.ident("r"), f.string("Other"))
                        ])),
                    }),
                    Span::DUMMY,
                ),
            ],
        )]);

        let module = lower(&program);
        let func = module.get_function(Symbol::intern("S")).unwrap();

        let switch = func.blocks[func.entry].terminator().unwrap();
        match &switch.kind {
            InstKind::Switch { arms, default, .. } => {
                assert_eq!(arms.len(), 2);
                assert_eq!(arms[0].values, vec![ConstValue::Int(1)]);
                assert_eq!(arms[1].values, vec![ConstValue::Int(2), ConstValue::Int(3)]);
                let default_block = &func.blocks[*default];
                assert_eq!(default_block.kind, BlockKind::SwitchDefault);
            }
            other => panic!("expected switch, found {:?}", other),
        }
    }

    /// Open exits get a synthesized return of the default value.
    #[test]
    fn test_default_return_inserted() {
        let f = AstFactory::new();
        let program = Program::new(vec![f.function(
            "F",
            vec![],
            int_ty(),
            vec![f.expr_stmt(f.call("PrintLine", vec![f.string("hi")]))],
        )]);

        let module = lower(&program);
        let func = module.get_function(Symbol::intern("F")).unwrap();
        let last = func.blocks[func.entry].insts.last().unwrap();
        match &last.kind {
            InstKind::Return { value } => {
                assert_eq!(value, &Some(Value::Constant(ConstValue::Int(0))));
            }
            other => panic!("expected synthesized return, found {:?}", other),
        }
    }

    /// Statements after a terminator are dead and are not lowered.
    #[test]
    fn test_dead_statements_dropped() {
        let f = AstFactory::new();
        let program = Program::new(vec![f.function(
            "F",
            vec![],
            int_ty(),
            vec![
                f.ret(Some(f.int(1))),
                f.expr_stmt(f.call("PrintLine", vec![f.string("never")])),
            ],
        )]);

        let module = lower(&program);
        let func = module.get_function(Symbol::intern("F")).unwrap();
        assert_eq!(func.blocks[func.entry].insts.len(), 1);
    }

    /// Interpolated strings become a left-associative Concat chain with
    /// ToString on non-string holes.
    #[test]
    fn test_interpolation_chain() {
        let f = AstFactory::new();
        let string_ty = TypeRef::named(Symbol::intern("String"));
        let interp = f.expr(
            basc_ast::ExprKind::InterpolatedString(vec![
                basc_ast::InterpPart::Text("value is ".to_string()),
                basc_ast::InterpPart::Expr(f.ident("n")),
            ]),
            Span::DUMMY,
        );
        let program = Program::new(vec![f.function(
            "F",
            vec![f.parameter("n", int_ty())],
            string_ty,
            vec![f.ret(Some(interp))],
        )]);

        let module = lower(&program);
        let func = module.get_function(Symbol::intern("F")).unwrap();
        let entry = &func.blocks[func.entry];

        assert!(entry
            .insts
            .iter()
            .any(|i| matches!(&i.kind, InstKind::MethodCall { method, .. } if method.eq_str("ToString"))));
        assert!(entry.insts.iter().any(|i| matches!(
            i.kind,
            InstKind::Binary {
                op: BinaryOp::Concat,
                ..
            }
        )));
    }

    /// Lambdas are hoisted into `__lambda_<n>` module functions.
    #[test]
    fn test_lambda_hoisting() {
        let f = AstFactory::new();
        let lambda = f.expr(
            basc_ast::ExprKind::Lambda(basc_ast::LambdaExpr {
                params: vec![f.parameter("x", int_ty())],
                body: basc_ast::LambdaBody::Expr(Box::new(f.binary(
                    BinOp::Mul,
                    f.ident("x"),
                    f.int(2),
                ))),
                is_sub: false,
            }),
            Span::DUMMY,
        );
        let program = Program::new(vec![f.subroutine(
            "S",
            vec![],
            vec![f.local("double", None, Some(lambda))],
        )]);

        let module = lower(&program);
        assert!(module
            .get_function(Symbol::intern("__lambda_0"))
            .is_some());
    }

    /// Every lowered function passes CFG verification.
    #[test]
    fn test_lowered_cfg_verifies() {
        use crate::analysis::verify_function;

        let f = AstFactory::new();
        let body = vec![f.stmt(
            StmtKind::If(basc_ast::IfStmt {
                cond: f.binary(BinOp::Le, f.ident("n"), f.int(1)),
                then_block: basc_ast::Block::new(vec![f.ret(Some(f.ident("n")))]),
                else_ifs: vec![],
                else_block: Some(basc_ast::Block::new(vec![f.ret(Some(f.int(0)))])),
            }),
            Span::DUMMY,
        )];
        let program = Program::new(vec![f.function(
            "F",
            vec![f.parameter("n", int_ty())],
            int_ty(),
            body,
        )]);

        let module = lower(&program);
        for func in module.functions.values() {
            assert!(verify_function(func).is_ok(), "bad CFG:\n{}", func);
        }
    }
}
