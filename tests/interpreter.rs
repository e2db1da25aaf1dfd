//! End-to-end tests through the public API, with the bundled prelude
//! loaded the way the REPL loads it.

use sprig::error::Error;
use sprig::eval::Machine;

fn machine() -> Machine {
    let mut m = Machine::new();
    m.load_prelude().expect("prelude must load cleanly");
    m
}

fn run(src: &str) -> String {
    let mut m = machine();
    let val = m.eval_str(src).unwrap();
    m.print(&val)
}

fn run_err(src: &str) -> Error {
    let mut m = machine();
    m.eval_str(src).unwrap_err()
}

#[test]
fn prelude_loads_without_errors() {
    machine();
}

#[test]
fn define_and_call() {
    assert_eq!(run("(define (double x) (* x 2)) (double 21)"), "42");
}

#[test]
fn closures_remember_their_environment() {
    let src = "
        (define (make-adder n) (lambda (x) (+ x n)))
        (define add3 (make-adder 3))
        (add3 4)";
    assert_eq!(run(src), "7");
}

#[test]
fn counters_share_their_captured_frame() {
    let src = "
        (define (make-counter)
          (let ((n 0))
            (lambda () (begin (set! n (+ n 1)) n))))
        (define c (make-counter))
        (c) (c)
        (c)";
    assert_eq!(run(src), "3");
}

#[test]
fn list_and_friends() {
    assert_eq!(run("(list 1 2 3)"), "(1 2 3)");
    assert_eq!(run("(length '(a b c))"), "3");
    assert_eq!(run("(append '(1 2) '(3 4))"), "(1 2 3 4)");
    assert_eq!(run("(reverse '(1 2 3))"), "(3 2 1)");
    assert_eq!(run("(map (lambda (x) (* x x)) '(1 2 3))"), "(1 4 9)");
    assert_eq!(run("(last '(1 2 3))"), "3");
}

#[test]
fn assoc_and_member() {
    assert_eq!(run("(assoc 'b '((a 1) (b 2)))"), "(b 2)");
    assert_eq!(run("(assoc 'z '((a 1)))"), "nil");
    assert_eq!(run("(member 2 '(1 2 3))"), "(2 3)");
    assert_eq!(run("(member 9 '(1 2 3))"), "nil");
}

#[test]
fn begin_sequences_and_returns_last() {
    assert_eq!(run("(define x 1) (begin (set! x 2) (+ x 10))"), "12");
}

#[test]
fn let_binds_in_parallel() {
    assert_eq!(run("(let ((a 1) (b 2)) (+ a b))"), "3");
    // The initializers see the outer scope, not each other.
    assert_eq!(run("(define a 10) (let ((a 1) (b a)) b)"), "10");
}

#[test]
fn when_and_unless() {
    assert_eq!(run("(when #t 1 2)"), "2");
    assert_eq!(run("(when nil 1 2)"), "nil");
    assert_eq!(run("(unless nil 'yes)"), "yes");
    assert_eq!(run("(unless 0 'yes)"), "nil");
}

#[test]
fn and_or_short_circuit() {
    assert_eq!(run("(and 1 2 3)"), "3");
    assert_eq!(run("(and 1 nil (car 5))"), "nil");
    assert_eq!(run("(or nil 2 (car 5))"), "2");
    assert_eq!(run("(or nil nil)"), "nil");
    assert_eq!(run("(and)"), "#t");
    assert_eq!(run("(or)"), "nil");
}

#[test]
fn or_evaluates_each_test_once() {
    let src = "
        (define hits 0)
        (define (probe) (set! hits (+ hits 1)) hits)
        (or nil (probe))
        hits";
    assert_eq!(run(src), "1");
}

#[test]
fn derived_comparisons() {
    assert_eq!(run("(> 2 1)"), "#t");
    assert_eq!(run("(<= 1 1)"), "#t");
    assert_eq!(run("(>= 1 2)"), "nil");
}

#[test]
fn nil_is_the_only_false_value() {
    assert_eq!(run("(if nil 1 2)"), "2");
    assert_eq!(run("(if 0 1 2)"), "1");
    assert_eq!(run("(not nil)"), "#t");
    assert_eq!(run("(not 0)"), "nil");
    assert_eq!(run("(null? nil)"), "#t");
    assert_eq!(run("(null? '(1))"), "nil");
}

#[test]
fn macro_arguments_stay_unevaluated() {
    let src = "
        (defmacro m (x) (list 'quote x))
        (define y (m (+ 1 2)))
        y";
    assert_eq!(run(src), "(+ 1 2)");
}

#[test]
fn quasiquote_template_instantiation() {
    assert_eq!(run("`(1 ,(+ 1 1) ,@(list 3 4))"), "(1 2 3 4)");
    assert_eq!(run("(define xs '(b c)) `(a ,@xs d)"), "(a b c d)");
}

#[test]
fn aliased_pairs_observe_mutation() {
    let src = "
        (define p (cons 1 2))
        (define row (list p p))
        (set-car! p 9)
        row";
    assert_eq!(run(src), "((9 . 2) (9 . 2))");
}

#[test]
fn improper_lists_survive_a_round_trip() {
    assert_eq!(run("'(1 2 . 3)"), "(1 2 . 3)");
    assert_eq!(run("(cons 1 (cons 2 3))"), "(1 2 . 3)");
}

#[test]
fn deep_recursion_with_bignums() {
    let src = "
        (define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))
        (fact 25)";
    assert_eq!(run(src), "15511210043330985984000000");
}

#[test]
fn errors_surface_from_inside_library_code() {
    assert!(matches!(run_err("(map (lambda (x) (car x)) '(1))"), Error::NotAPair(_)));
    assert!(matches!(run_err("(length 5)"), Error::NotAPair(_)));
}

#[test]
fn user_macros_compose_with_the_prelude() {
    let src = "
        (defmacro swap! (a b)
          (let ((tmp (gensym)))
            `(let ((,tmp ,a))
               (set! ,a ,b)
               (set! ,b ,tmp))))
        (define x 1)
        (define y 2)
        (swap! x y)
        (list x y)";
    assert_eq!(run(src), "(2 1)");
}

#[test]
fn macroexpand_shows_one_expansion_step() {
    assert_eq!(
        run("(macroexpand '(when #t 1))"),
        "(if #t (begin 1) nil)"
    );
}
