// Scorch - Code generation integration tests

//! Instruction layout, loop guards, handler tables and determinism.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use scorch_core::compiler::{Constant, Handler};

fn count(ops: &[OpCode], op: OpCode) -> usize {
    ops.iter().filter(|o| **o == op).count()
}

#[test]
fn disassembles_branch_and_return() {
    let program = Program::new(vec![
        decl(Type::Int, "x", Some(int(2, 1)), 1),
        if_(
            bin(BinaryOp::Greater, var("x", 2), int(1, 2)),
            vec![ret(Some(var("x", 3)), 3)],
            None,
            2,
        ),
        ret(Some(int(0, 4)), 4),
    ]);
    let script = compile("pick", program, &ScriptContext::new(Type::Int), &unguarded()).unwrap();

    let expected = [
        "int pick() locals=1 statements=4",
        "--- pick ---",
        "26 bytes, 3 constants, 0 handlers",
        "",
        "0000    1 const          2",
        "0003      store          [0]",
        "0006    2 load           [0]",
        "0009      const          1",
        "0012      gt",
        "0013      jz             @21",
        "0016      pop",
        "0017    3 load           [0]",
        "0020      ret",
        "0021    2 pop",
        "0022    4 const          0",
        "0025      ret",
    ]
    .join("\n")
        + "\n";
    assert_eq!(script.disassemble(), expected);
}

#[test]
fn implicit_conversion_emits_cast() {
    let program = Program::new(vec![ret(Some(int(1, 1)), 1)]);
    let script = compile("widen", program, &ScriptContext::new(Type::Double), &unguarded()).unwrap();

    assert_eq!(
        script.chunk().opcodes(),
        vec![OpCode::Constant, OpCode::Cast, OpCode::Return]
    );
    assert!(script.disassemble().contains("cast           int -> double"));
}

#[test]
fn falling_off_the_end_returns_default() {
    let program = Program::new(vec![log(1)]);
    let script = compile("void", program, &context(Type::Void), &unguarded()).unwrap();
    assert_eq!(
        script.chunk().opcodes(),
        vec![OpCode::Constant, OpCode::Call, OpCode::Null, OpCode::Return]
    );

    let program = Program::new(vec![if_(var("flag", 1), vec![ret(Some(int(5, 2)), 2)], None, 1)]);
    let script = compile("int", program, &context(Type::Int), &unguarded()).unwrap();
    let constants = &script.chunk().constants;
    assert_eq!(constants.last(), Some(&Constant::Int(0)));
}

fn counting_loop() -> Program {
    Program::new(vec![
        decl(Type::Int, "i", Some(int(0, 1)), 1),
        while_(
            bin(BinaryOp::Less, var("i", 2), int(10, 2)),
            vec![
                expr_stmt(Expr::assign(
                    "i",
                    bin(BinaryOp::Add, var("i", 3), int(1, 3)),
                    loc(3),
                )),
                log(4),
            ],
            2,
        ),
    ])
}

#[test]
fn loop_guard_charges_body_statements() {
    let script = compile("loop", counting_loop(), &context(Type::Void), &CompilerSettings::new()).unwrap();

    // Three parameters come first, then the counter
    assert_eq!(script.loop_counter(), Some(3));
    assert_eq!(script.chunk().constants[0], Constant::Int(1_000_000));
    assert_eq!(
        script.chunk().opcodes()[..2].to_vec(),
        vec![OpCode::Constant, OpCode::StoreLocal]
    );
    assert!(script.disassemble().contains("loop_guard     [3] cost 2"));
}

#[test]
fn loop_guard_disabled() {
    let script = compile("loop", counting_loop(), &context(Type::Void), &unguarded()).unwrap();

    assert_eq!(script.loop_counter(), None);
    assert_eq!(count(&script.chunk().opcodes(), OpCode::LoopGuard), 0);
    assert_eq!(script.max_locals(), 4);
}

#[test]
fn continue_is_a_back_edge_and_break_a_forward_jump() {
    let with_continue = Program::new(vec![while_(
        var("flag", 1),
        vec![if_(var("flag", 2), vec![cont(2)], None, 2), log(3)],
        1,
    )]);
    let script = compile("cont", with_continue, &context(Type::Void), &unguarded()).unwrap();
    let ops = script.chunk().opcodes();
    assert_eq!(count(&ops, OpCode::Loop), 2);
    assert_eq!(count(&ops, OpCode::Jump), 0);

    let with_break = Program::new(vec![while_(
        var("flag", 1),
        vec![if_(var("flag", 2), vec![brk(2)], None, 2), log(3)],
        1,
    )]);
    let script = compile("brk", with_break, &context(Type::Void), &unguarded()).unwrap();
    let ops = script.chunk().opcodes();
    assert_eq!(count(&ops, OpCode::Loop), 1);
    assert_eq!(count(&ops, OpCode::Jump), 1);
}

#[test]
fn try_registers_a_handler() {
    let program = Program::new(vec![try_(vec![log(2)], vec![catch("e", vec![log(4)], 3)], 1)]);
    let script = compile("guarded", program, &context(Type::Void), &unguarded()).unwrap();

    assert_eq!(
        script.chunk().handlers,
        vec![Handler {
            start: 0,
            end: 8,
            target: 11,
            slot: 3,
            exception: None,
        }]
    );
    let text = script.disassemble();
    assert!(text.contains("jmp            @19"));
    assert!(text.contains("catch [0000, 0008) * -> @11 [3]"));
}

#[test]
fn typed_catch_names_its_exception() {
    let program = Program::new(vec![try_(
        vec![log(2)],
        vec![catch("e", vec![log(4)], 3).with_exception("ArithmeticException")],
        1,
    )]);
    let script = compile("typed", program, &context(Type::Void), &unguarded()).unwrap();

    let handler = script.chunk().handlers[0];
    let name = handler.exception.map(|idx| script.chunk().constants[idx].clone());
    assert_eq!(name, Some(Constant::String("ArithmeticException".to_string())));
}

#[test]
fn dynamic_access_and_host_calls() {
    let price = Expr::new(
        ExprKind::Field {
            object: Box::new(var("doc", 1)),
            name: "price".to_string(),
        },
        loc(1),
    );
    let program = Program::new(vec![ret(Some(call("sqrt", vec![price], 1)), 1)]);
    let script = compile("price", program, &context(Type::Double), &unguarded()).unwrap();

    let text = script.disassemble();
    assert!(text.contains("get_field      \"price\""));
    assert!(text.contains("cast           def -> double"));
    assert!(text.contains("call           \"sqrt\" (1)"));
}

fn mixed_program() -> Program {
    let conditional = Expr::new(
        ExprKind::Conditional {
            condition: Box::new(var("flag", 9)),
            then: Box::new(int(1, 9)),
            otherwise: Box::new(double(2.5, 9)),
        },
        loc(9),
    );

    Program::new(vec![
        for_(
            Some(decl(Type::Int, "i", Some(int(0, 1)), 1)),
            Some(bin(BinaryOp::Less, var("i", 1), int(3, 1))),
            Some(Expr::assign(
                "i",
                bin(BinaryOp::Add, var("i", 1), int(1, 1)),
                loc(1),
            )),
            vec![
                if_(
                    bin(
                        BinaryOp::And,
                        var("flag", 2),
                        bin(BinaryOp::Greater, var("i", 2), int(1, 2)),
                    ),
                    vec![brk(2)],
                    None,
                    2,
                ),
                log(3),
            ],
            1,
        ),
        do_(vec![log(5)], var("flag", 5), 4),
        try_(
            vec![throw(string("boom", 7), 7)],
            vec![catch("e", vec![log(8)], 7)],
            6,
        ),
        ret(Some(conditional), 9),
    ])
}

#[test]
fn generation_is_deterministic() {
    let settings = CompilerSettings::new();
    let analyzed = analyze(mixed_program(), &context(Type::Def), &settings).unwrap();

    let first = generate(&analyzed, &settings).unwrap();
    let second = generate(&analyzed, &settings).unwrap();
    assert_eq!(first, second);

    let again = compile("mixed", mixed_program(), &context(Type::Def), &settings).unwrap();
    assert_eq!(again.chunk(), &first);
}

#[test]
fn constant_pool_overflow_is_reported_at_the_statement() {
    // Literals are not pooled, so every statement adds one constant
    let statements: Vec<Stmt> = (1..=65_537).map(|line| expr_stmt(int(7, line))).collect();
    let err = compile("big", Program::new(statements), &context(Type::Void), &unguarded()).unwrap_err();

    assert_eq!(err.analysis_kind(), Some(AnalysisErrorKind::LimitExceeded));
    assert_eq!(err.location.line, 65_537);
}

#[test]
fn jump_past_operand_range_is_reported_at_the_branch() {
    // Each `flag;` is a load and a pop, four bytes
    let body: Vec<Stmt> = (0..25_000).map(|_| expr_stmt(var("flag", 2))).collect();
    let program = Program::new(vec![log(1), if_(var("flag", 3), body, None, 3)]);
    let err = compile("long", program, &context(Type::Void), &unguarded()).unwrap_err();

    assert_eq!(err.analysis_kind(), Some(AnalysisErrorKind::LimitExceeded));
    assert_eq!(err.location.line, 3);
    assert!(err.help.is_some());
}
