//! Edge case tests for basc-sem

#[cfg(test)]
mod tests {
    use crate::analysis::Analyzer;
    use crate::types::TypeKind;
    use basc_ast::{AstFactory, BinOp, Program, StmtKind, TypeRef};
    use basc_util::{Handler, Symbol};

    fn int_ty() -> TypeRef {
        TypeRef::named(Symbol::intern("Integer"))
    }

    fn string_ty() -> TypeRef {
        TypeRef::named(Symbol::intern("String"))
    }

    /// EDGE CASE: Empty program analyzes cleanly
    #[test]
    fn test_empty_program() {
        let handler = Handler::new();
        let analyzer = Analyzer::new(&handler);
        let result = analyzer.analyze(&Program::default());
        assert!(result.is_ok());
        assert!(!handler.has_errors());
    }

    /// Add two parameters and return the sum
    #[test]
    fn test_add_function() {
        let f = AstFactory::new();
        let body = vec![f.ret(Some(f.binary(BinOp::Add, f.ident("a"), f.ident("b"))))];
        let program = Program::new(vec![f.function(
            "Add",
            vec![f.parameter("a", int_ty()), f.parameter("b", int_ty())],
            int_ty(),
            body,
        )]);

        let handler = Handler::new();
        let analysis = Analyzer::new(&handler).analyze(&program).unwrap();
        assert!(!handler.has_errors());
        assert!(analysis.symbols.len() > 0);
    }

    /// EDGE CASE: Undefined identifier is an error, analysis continues
    #[test]
    fn test_undefined_symbol() {
        let f = AstFactory::new();
        let body = vec![f.ret(Some(f.ident("missing")))];
        let program = Program::new(vec![f.function("F", vec![], int_ty(), body)]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_err());
        assert_eq!(handler.error_count(), 1);
    }

    /// EDGE CASE: Duplicate definition in the same scope
    #[test]
    fn test_duplicate_definition() {
        let f = AstFactory::new();
        let body = vec![
            f.local("x", Some(int_ty()), Some(f.int(1))),
            f.local("x", Some(int_ty()), Some(f.int(2))),
        ];
        let program = Program::new(vec![f.subroutine("S", vec![], body)]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_err());
        assert_eq!(handler.error_count(), 1);
    }

    /// EDGE CASE: Assigning a String to an Integer is an error
    #[test]
    fn test_assignment_type_mismatch() {
        let f = AstFactory::new();
        let body = vec![
            f.local("x", Some(int_ty()), Some(f.int(1))),
            f.assign(f.ident("x"), f.string("nope")),
        ];
        let program = Program::new(vec![f.subroutine("S", vec![], body)]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_err());
    }

    /// Numeric widening allows Integer into Double
    #[test]
    fn test_widening_assignment_ok() {
        let f = AstFactory::new();
        let double_ty = TypeRef::named(Symbol::intern("Double"));
        let body = vec![
            f.local("d", Some(double_ty), Some(f.int(1))),
            f.assign(f.ident("d"), f.int(42)),
        ];
        let program = Program::new(vec![f.subroutine("S", vec![], body)]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_ok());
    }

    /// EDGE CASE: Wrong arity on a user function
    #[test]
    fn test_wrong_arity() {
        let f = AstFactory::new();
        let add = f.function(
            "Add",
            vec![f.parameter("a", int_ty()), f.parameter("b", int_ty())],
            int_ty(),
            vec![f.ret(Some(f.binary(BinOp::Add, f.ident("a"), f.ident("b"))))],
        );
        let caller = f.subroutine(
            "Main",
            vec![],
            vec![f.expr_stmt(f.call("Add", vec![f.int(1)]))],
        );
        let program = Program::new(vec![add, caller]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_err());
    }

    /// EDGE CASE: Non-boolean condition is only a warning
    #[test]
    fn test_non_boolean_condition_warns() {
        let f = AstFactory::new();
        let body = vec![f.stmt(
            StmtKind::While(basc_ast::WhileStmt {
                cond: f.int(1),
                body: basc_ast::Block::default(),
            }),
            basc_util::Span::DUMMY,
        )];
        let program = Program::new(vec![f.subroutine("S", vec![], body)]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_ok());
        assert_eq!(handler.warning_count(), 1);
    }

    /// Auto-typed locals take the initializer's type
    #[test]
    fn test_auto_local_inference() {
        let f = AstFactory::new();
        let local = f.local("s", None, Some(f.string("hello")));
        let local_id = local.id;
        let program = Program::new(vec![f.subroutine("S", vec![], vec![local])]);

        let handler = Handler::new();
        let analysis = Analyzer::new(&handler).analyze(&program).unwrap();
        let ty = analysis.type_of(local_id).unwrap();
        assert_eq!(ty, analysis.types.string());
    }

    /// EDGE CASE: Index count must match array rank
    #[test]
    fn test_array_rank_mismatch() {
        let f = AstFactory::new();
        let arr2 = TypeRef::array(Symbol::intern("Integer"), 2);
        let body = vec![
            f.local("grid", Some(arr2), None),
            f.ret(Some(f.array_access(f.ident("grid"), vec![f.int(0)]))),
        ];
        let program = Program::new(vec![f.function("F", vec![], int_ty(), body)]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_err());
    }

    /// EDGE CASE: Non-constant Select case labels are rejected
    #[test]
    fn test_non_constant_case_label() {
        let f = AstFactory::new();
        let pattern = f.pattern(
            basc_ast::CasePatternKind::Constant(f.ident("n")),
            None,
            basc_util::Span::DUMMY,
        );
        let select = f.stmt(
            StmtKind::Select(basc_ast::SelectStmt {
                scrutinee: f.ident("n"),
                cases: vec![basc_ast::SelectCase {
                    patterns: vec![pattern],
                    body: basc_ast::Block::default(),
                }],
                default: None,
            }),
            basc_util::Span::DUMMY,
        );
        let program = Program::new(vec![f.subroutine(
            "S",
            vec![f.parameter("n", int_ty())],
            vec![select],
        )]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_err());
    }

    /// EDGE CASE: Exit For outside a For loop
    #[test]
    fn test_exit_outside_loop() {
        let f = AstFactory::new();
        let body = vec![f.stmt(StmtKind::Exit(basc_ast::ExitKind::For), basc_util::Span::DUMMY)];
        let program = Program::new(vec![f.subroutine("S", vec![], body)]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_err());
    }

    /// EDGE CASE: Return at top level
    #[test]
    fn test_return_outside_callable_via_yield() {
        let f = AstFactory::new();
        // Yield outside an iterator is the structural error here.
        let body = vec![f.stmt(StmtKind::Yield(Some(f.int(1))), basc_util::Span::DUMMY)];
        let program = Program::new(vec![f.subroutine("S", vec![], body)]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_err());
    }

    /// Builtins are pre-registered with their declared signatures
    #[test]
    fn test_builtin_len_call() {
        let f = AstFactory::new();
        let call = f.call("Len", vec![f.string("abc")]);
        let call_id = call.id;
        let program = Program::new(vec![f.function(
            "F",
            vec![],
            int_ty(),
            vec![f.ret(Some(call))],
        )]);

        let handler = Handler::new();
        let analysis = Analyzer::new(&handler).analyze(&program).unwrap();
        assert_eq!(analysis.type_of(call_id), Some(analysis.types.integer()));
    }

    /// Class declaration populates the member table
    #[test]
    fn test_class_member_table() {
        let f = AstFactory::new();
        let field = f.decl(
            basc_ast::DeclKind::Variable(basc_ast::VariableDecl {
                name: Symbol::intern("X"),
                ty: Some(int_ty()),
                init: None,
                is_auto: false,
                is_static: false,
                access: basc_ast::AccessLevel::Public,
            }),
            basc_util::Span::DUMMY,
        );
        let class = f.decl(
            basc_ast::DeclKind::Class(basc_ast::ClassDecl {
                name: Symbol::intern("Point"),
                generic_params: vec![],
                base: None,
                interfaces: vec![],
                members: vec![field],
                access: basc_ast::AccessLevel::Public,
            }),
            basc_util::Span::DUMMY,
        );
        let program = Program::new(vec![class]);

        let handler = Handler::new();
        let analysis = Analyzer::new(&handler).analyze(&program).unwrap();
        let class_ty = analysis.types.lookup(Symbol::intern("Point")).unwrap();
        match analysis.types.kind_of(class_ty) {
            TypeKind::Class { members, .. } => {
                assert!(members.contains_key(&Symbol::intern("X")));
            }
            other => panic!("expected class, found {:?}", other),
        }
    }

    /// Concatenation requires a String operand and yields String
    #[test]
    fn test_concat_rules() {
        let f = AstFactory::new();
        let good = f.binary(BinOp::Concat, f.string("a"), f.int(1));
        let good_id = good.id;
        let program = Program::new(vec![f.function(
            "F",
            vec![],
            string_ty(),
            vec![f.ret(Some(good))],
        )]);

        let handler = Handler::new();
        let analysis = Analyzer::new(&handler).analyze(&program).unwrap();
        assert_eq!(analysis.type_of(good_id), Some(analysis.types.string()));

        // Without any String operand it is an error
        let f2 = AstFactory::new();
        let bad = f2.binary(BinOp::Concat, f2.int(1), f2.int(2));
        let program2 = Program::new(vec![f2.function(
            "G",
            vec![],
            string_ty(),
            vec![f2.ret(Some(bad))],
        )]);
        let handler2 = Handler::new();
        assert!(Analyzer::new(&handler2).analyze(&program2).is_err());
    }

    /// Comparing unrelated types warns but does not fail
    #[test]
    fn test_incomparable_warning() {
        let f = AstFactory::new();
        let cmp = f.binary(BinOp::Eq, f.string("a"), f.boolean(true));
        let program = Program::new(vec![f.function(
            "F",
            vec![],
            TypeRef::named(Symbol::intern("Boolean")),
            vec![f.ret(Some(cmp))],
        )]);

        let handler = Handler::new();
        assert!(Analyzer::new(&handler).analyze(&program).is_ok());
        assert!(handler.warning_count() >= 1);
    }

    /// Expression node types are recorded for every visited node
    #[test]
    fn test_node_type_side_table() {
        let f = AstFactory::new();
        let lhs = f.ident("a");
        let lhs_id = lhs.id;
        let sum = f.binary(BinOp::Add, lhs, f.int(2));
        let sum_id = sum.id;
        let program = Program::new(vec![f.function(
            "F",
            vec![f.parameter("a", int_ty())],
            int_ty(),
            vec![f.ret(Some(sum))],
        )]);

        let handler = Handler::new();
        let analysis = Analyzer::new(&handler).analyze(&program).unwrap();
        assert_eq!(analysis.type_of(lhs_id), Some(analysis.types.integer()));
        assert_eq!(analysis.type_of(sum_id), Some(analysis.types.integer()));
        assert!(analysis.symbol_of(lhs_id).is_some());
    }
}
