#[cfg(test)]
mod interpreter_tests {
    use fern::session::{RunStatus, Session};

    /// Run one whole program (file-mode semantics) and capture its output.
    fn run_program(source: &str) -> (RunStatus, String) {
        let mut session = Session::new(Vec::new(), false);
        let status = session.run(source);
        let output = String::from_utf8(session.output().clone()).expect("print output is UTF-8");

        (status, output)
    }

    fn assert_prints(source: &str, expected: &str) {
        let (status, output) = run_program(source);

        assert_eq!(status, RunStatus::Ok, "program failed: {:?}", source);
        assert_eq!(output, expected);
    }

    fn assert_runtime_error(source: &str) -> String {
        let (status, output) = run_program(source);

        assert_eq!(
            status,
            RunStatus::RuntimeError,
            "expected runtime error from: {:?}",
            source
        );
        output
    }

    fn assert_static_error(source: &str) {
        let (status, output) = run_program(source);

        assert_eq!(
            status,
            RunStatus::StaticError,
            "expected static error from: {:?}",
            source
        );
        assert_eq!(output, "", "static errors must gate execution entirely");
    }

    // ───────────────────────── expressions ─────────────────────────

    #[test]
    fn test_arithmetic_precedence() {
        assert_prints("print 1 + 2 * 3;", "7\n");
        assert_prints("print (1 + 2) * 3;", "9\n");
        assert_prints("print 10 - 4 - 3;", "3\n"); // left-associative
        assert_prints("print -2 * 3;", "-6\n");
    }

    #[test]
    fn test_number_formatting() {
        assert_prints("print 4 / 2;", "2\n"); // no trailing .0
        assert_prints("print 10 / 4;", "2.5\n");
        assert_prints("print 0.5 + 0.25;", "0.75\n");
        assert_prints("print 100;", "100\n");
    }

    #[test]
    fn test_division_follows_ieee754() {
        assert_prints("print 1 / 0;", "inf\n");
        assert_prints("print -1 / 0;", "-inf\n");
        assert_prints("print 0 / 0;", "NaN\n");
    }

    #[test]
    fn test_string_concatenation_and_verbatim_print() {
        assert_prints("print \"foo\" + \"bar\";", "foobar\n");
        assert_prints("print \"no quotes\";", "no quotes\n");
    }

    #[test]
    fn test_equality_rules() {
        assert_prints("print nil == nil;", "true\n");
        assert_prints("print 1 == \"1\";", "false\n"); // kinds never mix
        assert_prints("print \"a\" == \"a\";", "true\n");
        assert_prints("print 0 == false;", "false\n");
        assert_prints("print 1 != 2;", "true\n");
    }

    #[test]
    fn test_truthiness() {
        assert_prints("print !nil;", "true\n");
        assert_prints("print !false;", "true\n");
        assert_prints("print !0;", "false\n"); // 0 is truthy
        assert_prints("print !\"\";", "false\n"); // "" is truthy
        assert_prints("if (0) print \"taken\";", "taken\n");
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_prints("print \"a\" or \"b\";", "a\n");
        assert_prints("print nil or \"b\";", "b\n");
        assert_prints("print nil and \"b\";", "nil\n");
        assert_prints("print 1 and 2;", "2\n");
    }

    #[test]
    fn test_logical_short_circuit_skips_side_effects() {
        assert_prints(
            "var n = 0;\n\
             fun bump() { n = n + 1; return true; }\n\
             false and bump();\n\
             true or bump();\n\
             print n;",
            "0\n",
        );
    }

    #[test]
    fn test_ternary_selects_branch() {
        assert_prints("print true ? 1 : 2;", "1\n");
        assert_prints("print false ? 1 : 2;", "2\n");
        // Right-associative: false ? 1 : (false ? 2 : 3)
        assert_prints("print false ? 1 : false ? 2 : 3;", "3\n");
    }

    #[test]
    fn test_ternary_is_lazy() {
        // The unselected branch must not run at all.
        assert_prints(
            "var n = 0;\n\
             fun bump() { n = n + 1; return n; }\n\
             print true ? \"yes\" : bump();\n\
             print n;",
            "yes\n0\n",
        );
    }

    // ─────────────────────── scoping & closures ────────────────────

    #[test]
    fn test_block_shadowing() {
        assert_prints("var a = 1; { var a = 2; print a; } print a;", "2\n1\n");
    }

    #[test]
    fn test_closure_captures_binding_not_name() {
        // The function closes over the outer x; the inner shadow that later
        // goes out of scope must never be visible to it.
        assert_prints(
            "var f;\n\
             {\n\
               var x = 1;\n\
               fun g() { return x; }\n\
               f = g;\n\
               {\n\
                 var x = 2;\n\
                 print x;\n\
               }\n\
             }\n\
             print f();",
            "2\n1\n",
        );
    }

    #[test]
    fn test_resolution_is_fixed_at_resolve_time() {
        // A later declaration in the same block must not re-bind an already
        // resolved reference.
        assert_prints(
            "var a = \"global\";\n\
             {\n\
               fun showA() { print a; }\n\
               showA();\n\
               var a = \"block\";\n\
               showA();\n\
             }",
            "global\nglobal\n",
        );
    }

    #[test]
    fn test_closures_share_mutable_state() {
        assert_prints(
            "fun makeCounter() {\n\
               var i = 0;\n\
               fun count() { i = i + 1; return i; }\n\
               return count;\n\
             }\n\
             var c = makeCounter();\n\
             print c();\n\
             print c();",
            "1\n2\n",
        );
    }

    #[test]
    fn test_recursion() {
        assert_prints(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }\n\
             print fib(10);",
            "55\n",
        );
    }

    #[test]
    fn test_mutual_recursion_through_globals() {
        // Globals permit forward reference: isEven calls isOdd, declared later.
        assert_prints(
            "fun isEven(n) { if (n == 0) return true; return isOdd(n - 1); }\n\
             fun isOdd(n) { if (n == 0) return false; return isEven(n - 1); }\n\
             print isEven(10);\n\
             print isOdd(7);",
            "true\ntrue\n",
        );
    }

    #[test]
    fn test_function_return_value() {
        assert_prints("fun f() { return 1; } print f() + 1;", "2\n");
        assert_prints("fun f() {} print f();", "nil\n"); // falling off yields nil
        assert_prints("fun f() { return; } print f();", "nil\n");
    }

    #[test]
    fn test_function_display() {
        assert_prints("fun f() {} print f;", "<fn f>\n");
    }

    // ─────────────────────── control flow ──────────────────────────

    #[test]
    fn test_while_and_break() {
        assert_prints(
            "var i = 0;\n\
             while (true) {\n\
               i = i + 1;\n\
               if (i == 3) break;\n\
             }\n\
             print i;",
            "3\n",
        );
    }

    #[test]
    fn test_break_exits_only_innermost_loop() {
        assert_prints(
            "var total = 0;\n\
             var i = 0;\n\
             while (i < 3) {\n\
               i = i + 1;\n\
               while (true) {\n\
                 total = total + 1;\n\
                 break;\n\
               }\n\
             }\n\
             print total;",
            "3\n",
        );
    }

    #[test]
    fn test_break_resumes_after_loop() {
        assert_prints(
            "while (true) { break; }\n\
             print \"after\";",
            "after\n",
        );
    }

    #[test]
    fn test_for_loop_desugaring_runs() {
        assert_prints("for (var i = 0; i < 3; i = i + 1) print i;", "0\n1\n2\n");
        assert_prints(
            "var i = 0; for (; i < 2; ) { print i; i = i + 1; }",
            "0\n1\n",
        );
    }

    #[test]
    fn test_break_inside_for() {
        assert_prints(
            "for (var i = 0; i < 10; i = i + 1) { if (i == 2) break; print i; }",
            "0\n1\n",
        );
    }

    // ─────────────────────── classes ───────────────────────────────

    #[test]
    fn test_fields_and_methods() {
        assert_prints(
            "class Counter {\n\
               init(n) { this.n = n; }\n\
               bump() { this.n = this.n + 1; return this.n; }\n\
             }\n\
             var c = Counter(2);\n\
             print c.bump();\n\
             print c.n;",
            "3\n3\n",
        );
    }

    #[test]
    fn test_instance_display_and_class_display() {
        assert_prints("class A {} print A;", "A\n");
        assert_prints("class A {} print A();", "A instance\n");
    }

    #[test]
    fn test_fields_shadow_methods() {
        assert_prints(
            "class A { m() { return \"method\"; } }\n\
             var a = A();\n\
             a.m = \"field\";\n\
             print a.m;",
            "field\n",
        );
    }

    #[test]
    fn test_each_property_access_binds_fresh() {
        // A bound method keeps its receiver even when detached.
        assert_prints(
            "class A {\n\
               init(name) { this.name = name; }\n\
               who() { return this.name; }\n\
             }\n\
             var m = A(\"first\").who;\n\
             print m();",
            "first\n",
        );
    }

    #[test]
    fn test_inheritance_and_super() {
        assert_prints(
            "class A { speak() { print \"A\"; } }\n\
             class B < A { speak() { super.speak(); print \"B\"; } }\n\
             B().speak();",
            "A\nB\n",
        );
    }

    #[test]
    fn test_override_wins() {
        assert_prints(
            "class A { m() { return \"A\"; } }\n\
             class B < A { m() { return \"B\"; } }\n\
             print B().m();",
            "B\n",
        );
    }

    #[test]
    fn test_inherited_method_binds_subclass_instance() {
        assert_prints(
            "class A { who() { return this.name; } }\n\
             class B < A {}\n\
             var b = B();\n\
             b.name = \"b\";\n\
             print b.who();",
            "b\n",
        );
    }

    #[test]
    fn test_super_through_two_levels() {
        assert_prints(
            "class A { m() { print \"A\"; } }\n\
             class B < A { m() { super.m(); print \"B\"; } }\n\
             class C < B { m() { super.m(); print \"C\"; } }\n\
             C().m();",
            "A\nB\nC\n",
        );
    }

    #[test]
    fn test_init_always_returns_instance() {
        assert_prints(
            "class A { init() { this.x = 1; return; } }\n\
             print A();",
            "A instance\n",
        );
    }

    #[test]
    fn test_class_arity_follows_init() {
        assert_prints(
            "class P { init(x, y) { this.x = x; this.y = y; } }\n\
             var p = P(3, 4);\n\
             print p.x + p.y;",
            "7\n",
        );
    }

    // ─────────────────────── runtime errors ────────────────────────

    #[test]
    fn test_arity_mismatch_is_runtime_error() {
        assert_runtime_error("fun f(a) { return a; } f(1, 2);");
        assert_runtime_error("fun f(a, b) { return a; } f(1);");
        assert_runtime_error("class P { init(x) {} } P();");
    }

    #[test]
    fn test_calling_non_callable() {
        assert_runtime_error("\"not a function\"();");
        assert_runtime_error("var x = 1; x();");
    }

    #[test]
    fn test_undefined_variable() {
        assert_runtime_error("print missing;");
        assert_runtime_error("missing = 1;");
    }

    #[test]
    fn test_operand_type_errors() {
        assert_runtime_error("print 1 + \"a\";");
        assert_runtime_error("print -\"a\";");
        assert_runtime_error("print \"a\" < \"b\";");
        assert_runtime_error("print nil * 2;");
    }

    #[test]
    fn test_property_errors() {
        assert_runtime_error("var x = 1; print x.y;");
        assert_runtime_error("var x = 1; x.y = 2;");
        assert_runtime_error("class A {} print A().missing;");
    }

    #[test]
    fn test_non_class_superclass() {
        assert_runtime_error("var NotAClass = 1; class B < NotAClass {}");
    }

    #[test]
    fn test_first_runtime_error_halts_run() {
        let output = assert_runtime_error("print 1; print missing; print 2;");
        assert_eq!(output, "1\n");
    }

    // ─────────────────────── static errors ─────────────────────────

    #[test]
    fn test_break_outside_loop_is_static() {
        assert_static_error("break;");
        assert_static_error("if (true) break;");
        // A function body is a fresh loop context.
        assert_static_error("while (true) { fun f() { break; } }");
    }

    #[test]
    fn test_return_outside_function_is_static() {
        assert_static_error("return 1;");
        assert_static_error("print 1; return;"); // gates the whole run
    }

    #[test]
    fn test_this_and_super_outside_methods() {
        assert_static_error("print this;");
        assert_static_error("fun f() { return this; } f();");
        assert_static_error("print super.m;");
        assert_static_error("class A { m() { super.m(); } }"); // no superclass
    }

    #[test]
    fn test_self_inheritance_is_static() {
        assert_static_error("class A < A {}");
    }

    #[test]
    fn test_local_redeclaration_is_static() {
        assert_static_error("{ var a = 1; var a = 2; }");
        assert_static_error("fun f(a) { var a = 1; } f(1);");
    }

    #[test]
    fn test_global_redeclaration_is_allowed() {
        assert_prints("var a = 1; var a = 2; print a;", "2\n");
    }

    #[test]
    fn test_read_in_own_initializer_is_static() {
        assert_static_error("{ var a = a; }");
    }

    #[test]
    fn test_return_value_from_init_is_static() {
        assert_static_error("class A { init() { return 1; } }");
    }

    #[test]
    fn test_syntax_error_gates_execution() {
        assert_static_error("print 1; print ;");
    }

    // ─────────────────────── interactive sessions ──────────────────

    fn run_lines(lines: &[&str]) -> (Vec<RunStatus>, String) {
        let mut session = Session::new(Vec::new(), true);
        let statuses: Vec<RunStatus> = lines.iter().map(|line| session.run(line)).collect();
        let output = String::from_utf8(session.output().clone()).expect("print output is UTF-8");

        (statuses, output)
    }

    #[test]
    fn test_repl_function_outlives_its_line() {
        let (statuses, output) = run_lines(&[
            "fun add(a, b) { return a + b; }",
            "print add(1, 2);",
        ]);

        assert_eq!(statuses, vec![RunStatus::Ok, RunStatus::Ok]);
        assert_eq!(output, "3\n");
    }

    #[test]
    fn test_repl_class_outlives_its_line() {
        let (statuses, output) = run_lines(&[
            "class Greeter { hello(name) { return \"hi \" + name; } }",
            "var g = Greeter();",
            "print g.hello(\"fern\");",
        ]);

        assert_eq!(
            statuses,
            vec![RunStatus::Ok, RunStatus::Ok, RunStatus::Ok]
        );
        assert_eq!(output, "hi fern\n");
    }

    #[test]
    fn test_repl_closure_over_earlier_global() {
        let (statuses, output) = run_lines(&[
            "var x = 10;",
            "fun getX() { return x; }",
            "x = 11;",
            "print getX();",
        ]);

        assert!(statuses.iter().all(|s| *s == RunStatus::Ok));
        assert_eq!(output, "11\n");
    }

    #[test]
    fn test_repl_recovers_after_static_error() {
        let (statuses, output) = run_lines(&["print ;", "print 1;"]);

        assert_eq!(statuses, vec![RunStatus::StaticError, RunStatus::Ok]);
        assert_eq!(output, "1\n");
    }

    #[test]
    fn test_repl_survives_runtime_error() {
        let (statuses, output) = run_lines(&[
            "var a = 1;",
            "print missing;",
            "print a;",
        ]);

        assert_eq!(
            statuses,
            vec![RunStatus::Ok, RunStatus::RuntimeError, RunStatus::Ok]
        );
        assert_eq!(output, "1\n");
    }
}
