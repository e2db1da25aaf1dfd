use crate::env::Environments;
use crate::error::{Error, Result};
use crate::heap::Heap;
use crate::primitives;
use crate::printer;
use crate::reader;
use crate::symbol::{sym, SymbolTable};
use crate::value::{EnvId, PrimId, ProcId, Procedure, SymbolId, Value};

/// The evaluation machine. All interpreter state lives here: the cons-cell
/// heap, the symbol table, the environment frames, and the closure/macro
/// arena. Tests construct isolated machines; nothing is process-global.
pub struct Machine {
    pub heap: Heap,
    pub symbols: SymbolTable,
    pub envs: Environments,
    procs: Vec<Procedure>,
    /// The root environment, holding the primitive table and #t.
    pub globals: EnvId,
    gensym_counter: u64,
    /// Echo each evaluated form to stderr (SPRIG_TRACE=1).
    pub trace: bool,
}

impl Machine {
    /// Build a machine with the full primitive table bound into a fresh
    /// root environment.
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        let mut envs = Environments::new();
        let globals = envs.push(None);

        for (i, def) in primitives::PRIMITIVES.iter().enumerate() {
            let name = symbols.intern(def.name);
            envs.bind(globals, name, Value::Primitive(PrimId(i as u32)));
        }

        // The truth symbol evaluates to itself.
        envs.bind(globals, sym::T, Value::Symbol(sym::T));

        Machine {
            heap: Heap::new(),
            symbols,
            envs,
            procs: Vec::new(),
            globals,
            gensym_counter: 0,
            trace: false,
        }
    }

    // ------------------------------------------------------------------
    // Environment access
    // ------------------------------------------------------------------

    /// Chain lookup, innermost frame to root.
    pub fn resolve(&self, env: EnvId, name: SymbolId) -> Result<Value> {
        self.envs
            .lookup(env, name)
            .ok_or_else(|| Error::UnboundVariable(self.symbols.name(name).to_string()))
    }

    /// Overwrite the nearest enclosing binding, returning the previous
    /// value. Unlike bind, this never introduces a new binding.
    pub fn set_var(&mut self, env: EnvId, name: SymbolId, val: Value) -> Result<Value> {
        self.envs
            .assign(env, name, val)
            .ok_or_else(|| Error::UnboundVariable(self.symbols.name(name).to_string()))
    }

    // ------------------------------------------------------------------
    // Eval / Apply
    // ------------------------------------------------------------------

    /// Evaluate one form in an environment.
    pub fn eval(&mut self, form: &Value, env: EnvId) -> Result<Value> {
        if self.trace {
            eprintln!("eval: {}", printer::print_val(form, &self.heap, &self.symbols));
        }

        match form {
            Value::Nil
            | Value::Integer(_)
            | Value::Primitive(_)
            | Value::Closure(_)
            | Value::Macro(_) => Ok(form.clone()),
            Value::Symbol(id) => self.resolve(env, *id),
            Value::Pair(id) => {
                let head = self.heap.car(*id);
                let arg_forms = self.heap.cdr(*id);
                let op = self.eval(&head, env)?;
                // The tail is passed unevaluated: the operator decides
                // whether and when its operands are evaluated.
                self.apply(&op, &arg_forms, env)
            }
            Value::CloseParen => Err(Error::Internal(
                "parser delimiter reached eval".into(),
            )),
        }
    }

    /// Apply an operator to an unevaluated argument-form list.
    pub fn apply(&mut self, op: &Value, arg_forms: &Value, env: EnvId) -> Result<Value> {
        match op {
            Value::Primitive(id) => {
                let def = &primitives::PRIMITIVES[id.0 as usize];
                (def.func)(self, arg_forms, env)
            }
            Value::Closure(id) => {
                let args = self.evlis(arg_forms, env)?;
                let call_env = self.bind_parameters(*id, args)?;
                let body = self.procs[id.0 as usize].body.clone();
                self.eval(&body, call_env)
            }
            Value::Macro(id) => {
                // Two stages: evaluate the template on the raw forms, then
                // evaluate the expansion where the call appeared.
                let expansion = self.expand_macro(*id, arg_forms)?;
                self.eval(&expansion, env)
            }
            other => Err(Error::NotCallable(printer::print_val(
                other,
                &self.heap,
                &self.symbols,
            ))),
        }
    }

    /// Evaluate every form of a proper list, left to right.
    pub fn evlis(&mut self, forms: &Value, env: EnvId) -> Result<Vec<Value>> {
        let items = self.heap.list_to_vec(forms)?;
        let mut out = Vec::with_capacity(items.len());
        for form in &items {
            out.push(self.eval(form, env)?);
        }
        Ok(out)
    }

    /// Apply an operator to already-evaluated argument values (the apply
    /// primitive). Closures bind the values directly; for a primitive each
    /// value is re-wrapped as (quote v) so the raw-forms contract holds.
    pub fn apply_values(&mut self, op: &Value, args: Vec<Value>, env: EnvId) -> Result<Value> {
        match op {
            Value::Closure(id) => {
                let call_env = self.bind_parameters(*id, args)?;
                let body = self.procs[id.0 as usize].body.clone();
                self.eval(&body, call_env)
            }
            Value::Primitive(_) => {
                let quoted: Vec<Value> = args
                    .into_iter()
                    .map(|v| {
                        let inner = self.heap.cons(v, Value::Nil);
                        self.heap.cons(Value::Symbol(sym::QUOTE), inner)
                    })
                    .collect();
                let forms = self.heap.list(&quoted);
                self.apply(&op.clone(), &forms, env)
            }
            other => Err(Error::NotCallable(printer::print_val(
                other,
                &self.heap,
                &self.symbols,
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Closures and macros
    // ------------------------------------------------------------------

    /// Build a closure from a parameter-list form and a body, capturing
    /// the defining environment.
    pub fn make_closure(&mut self, params: &Value, body: Value, env: EnvId) -> Result<Value> {
        let id = self.add_procedure(params, body, env)?;
        Ok(Value::Closure(id))
    }

    /// Same shape as a closure; applied to unevaluated forms.
    pub fn make_macro(&mut self, params: &Value, body: Value, env: EnvId) -> Result<Value> {
        let id = self.add_procedure(params, body, env)?;
        Ok(Value::Macro(id))
    }

    pub fn procedure(&self, id: ProcId) -> &Procedure {
        &self.procs[id.0 as usize]
    }

    fn add_procedure(&mut self, params: &Value, body: Value, env: EnvId) -> Result<ProcId> {
        let (params, variadic) = self.parse_parameters(params)?;
        let id = ProcId(self.procs.len() as u32);
        self.procs.push(Procedure {
            params,
            variadic,
            body,
            env,
        });
        Ok(id)
    }

    /// A parameter list is a bare symbol (all arguments as one list), a
    /// proper list of symbols, or a dotted list with a rest symbol.
    fn parse_parameters(&self, form: &Value) -> Result<(Vec<SymbolId>, Option<SymbolId>)> {
        match form {
            Value::Nil => Ok((Vec::new(), None)),
            Value::Symbol(id) => Ok((Vec::new(), Some(*id))),
            Value::Pair(_) => {
                let (items, tail) = self.heap.improper_list_to_vec(form);
                let mut params = Vec::with_capacity(items.len());
                for item in &items {
                    match item {
                        Value::Symbol(id) => params.push(*id),
                        _ => {
                            return Err(Error::MalformedSyntax(
                                "parameter list may contain only symbols".into(),
                            ))
                        }
                    }
                }
                let variadic = match tail {
                    None => None,
                    Some(Value::Symbol(id)) => Some(id),
                    Some(_) => {
                        return Err(Error::MalformedSyntax(
                            "rest parameter must be a symbol".into(),
                        ))
                    }
                };
                Ok((params, variadic))
            }
            _ => Err(Error::MalformedSyntax("malformed parameter list".into())),
        }
    }

    /// Create the call frame: a fresh child of the *captured* environment
    /// (lexical scope), with each formal bound in order and any rest
    /// parameter bound to the leftover arguments as a list.
    fn bind_parameters(&mut self, id: ProcId, args: Vec<Value>) -> Result<EnvId> {
        let proc = &self.procs[id.0 as usize];
        let fixed = proc.params.len();

        if args.len() < fixed {
            return Err(Error::ArityMismatch(format!(
                "expected {}{} argument(s), got {}",
                if proc.variadic.is_some() { "at least " } else { "" },
                fixed,
                args.len()
            )));
        }
        if proc.variadic.is_none() && args.len() > fixed {
            return Err(Error::ArityMismatch(format!(
                "expected {} argument(s), got {}",
                fixed,
                args.len()
            )));
        }

        let params = proc.params.clone();
        let variadic = proc.variadic;
        let parent = proc.env;

        let call_env = self.envs.push(Some(parent));
        for (param, arg) in params.iter().zip(args.iter()) {
            self.envs.bind(call_env, *param, arg.clone());
        }
        if let Some(rest) = variadic {
            let leftover = self.heap.list(&args[fixed..]);
            self.envs.bind(call_env, rest, leftover);
        }
        Ok(call_env)
    }

    /// One macro-expansion step: bind the raw argument forms and evaluate
    /// the macro body, without evaluating the result.
    fn expand_macro(&mut self, id: ProcId, arg_forms: &Value) -> Result<Value> {
        let raw = self.heap.list_to_vec(arg_forms)?;
        let expand_env = self.bind_parameters(id, raw)?;
        let body = self.procs[id.0 as usize].body.clone();
        self.eval(&body, expand_env)
    }

    /// Expand a macro call by exactly one step, for introspection. The
    /// head of the form must evaluate to a macro.
    pub fn macroexpand_one(&mut self, form: &Value, env: EnvId) -> Result<Value> {
        let Some(id) = form.as_pair() else {
            return Err(Error::NotAMacroExpression(printer::print_val(
                form,
                &self.heap,
                &self.symbols,
            )));
        };
        let head = self.heap.car(id);
        let arg_forms = self.heap.cdr(id);
        match self.eval(&head, env)? {
            Value::Macro(mid) => self.expand_macro(mid, &arg_forms),
            _ => Err(Error::NotAMacroExpression(printer::print_val(
                form,
                &self.heap,
                &self.symbols,
            ))),
        }
    }

    /// A fresh symbol for macro hygiene by convention. The monotonic
    /// counter keeps generated names from colliding with each other.
    pub fn gensym(&mut self) -> Value {
        let name = format!("__g{}", self.gensym_counter);
        self.gensym_counter += 1;
        Value::Symbol(self.symbols.intern(&name))
    }

    // ------------------------------------------------------------------
    // Quasiquote
    // ------------------------------------------------------------------

    /// Structural template instantiation. Atoms reproduce themselves;
    /// (unquote x) evaluates x; a list element (unquote-splicing x)
    /// evaluates x and splices its elements in place; everything else
    /// recurses. The only evaluation inside a template happens at unquote
    /// points.
    pub fn quasiquote(&mut self, form: &Value, env: EnvId) -> Result<Value> {
        match form {
            Value::Symbol(id) if *id == sym::UNQUOTE || *id == sym::UNQUOTE_SPLICING => {
                // A stray marker would otherwise be reproduced as an
                // ordinary symbol, silently swallowing a syntax error.
                Err(Error::MalformedUnquote(format!(
                    "bare {} in template",
                    self.symbols.name(*id)
                )))
            }
            Value::Pair(id) => {
                let head = self.heap.car(*id);
                let tail = self.heap.cdr(*id);

                if head == Value::Symbol(sym::UNQUOTE) {
                    let operand = self.unquote_operand(&tail, "unquote")?;
                    return self.eval(&operand, env);
                }
                if head == Value::Symbol(sym::UNQUOTE_SPLICING) {
                    return Err(Error::MalformedUnquote(
                        "unquote-splicing outside a list".into(),
                    ));
                }

                let rest = self.quasiquote(&tail, env)?;
                if let Some(operand) = self.splice_operand(&head)? {
                    let spliced = self.eval(&operand, env)?;
                    return self.splice_append(&spliced, rest);
                }
                let elem = self.quasiquote(&head, env)?;
                Ok(self.heap.cons(elem, rest))
            }
            _ => Ok(form.clone()),
        }
    }

    /// The single operand of a well-formed (unquote x) / splice form.
    fn unquote_operand(&self, tail: &Value, what: &str) -> Result<Value> {
        if let Value::Pair(id) = tail {
            if self.heap.cdr(*id).is_nil() {
                return Ok(self.heap.car(*id));
            }
        }
        Err(Error::MalformedUnquote(format!(
            "{what} takes exactly one form"
        )))
    }

    /// Some(operand) if the element has the exact (unquote-splicing x)
    /// shape.
    fn splice_operand(&self, elem: &Value) -> Result<Option<Value>> {
        let Some(id) = elem.as_pair() else {
            return Ok(None);
        };
        if self.heap.car(id) != Value::Symbol(sym::UNQUOTE_SPLICING) {
            return Ok(None);
        }
        let operand = self.unquote_operand(&self.heap.cdr(id), "unquote-splicing")?;
        Ok(Some(operand))
    }

    /// Prepend the elements of `spliced` (which must be a proper list)
    /// onto `rest`, flattening one level.
    fn splice_append(&mut self, spliced: &Value, rest: Value) -> Result<Value> {
        let items = match self.heap.list_to_vec(spliced) {
            Ok(items) => items,
            Err(_) => {
                return Err(Error::MalformedUnquote(
                    "unquote-splicing of a non-list".into(),
                ))
            }
        };
        let mut out = rest;
        for item in items.into_iter().rev() {
            out = self.heap.cons(item, out);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Source-level entry points
    // ------------------------------------------------------------------

    /// Read and evaluate every form in `src` against the root environment,
    /// interleaved so each form sees the definitions of the previous ones.
    /// Returns the last value (Nil for empty input).
    pub fn eval_str(&mut self, src: &str) -> Result<Value> {
        let mut pos = 0;
        let mut last = Value::Nil;
        while let Some((form, new_pos)) =
            reader::read_one_at(src, pos, &mut self.heap, &mut self.symbols)?
        {
            pos = new_pos;
            last = self.eval(&form, self.globals)?;
        }
        Ok(last)
    }

    /// Evaluate the bundled prelude against the root environment.
    pub fn load_prelude(&mut self) -> Result<()> {
        self.eval_str(crate::PRELUDE)?;
        Ok(())
    }

    /// Render a value for display.
    pub fn print(&self, val: &Value) -> String {
        printer::print_val(val, &self.heap, &self.symbols)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn int(n: i64) -> Value {
        Value::Integer(BigInt::from(n))
    }

    /// Evaluate source on a fresh machine and render the last value.
    fn run(src: &str) -> String {
        let mut m = Machine::new();
        let val = m.eval_str(src).unwrap();
        m.print(&val)
    }

    fn run_err(src: &str) -> Error {
        let mut m = Machine::new();
        m.eval_str(src).unwrap_err()
    }

    #[test]
    fn integers_self_evaluate() {
        assert_eq!(run("42"), "42");
    }

    #[test]
    fn nil_self_evaluates() {
        assert_eq!(run("nil"), "nil");
        assert_eq!(run("()"), "nil");
    }

    #[test]
    fn unbound_symbol_fails() {
        assert_eq!(run_err("no-such"), Error::UnboundVariable("no-such".into()));
    }

    #[test]
    fn quote_returns_the_form_unevaluated() {
        assert_eq!(run("'(+ 1 2)"), "(+ 1 2)");
        assert_eq!(run("(quote a)"), "a");
    }

    #[test]
    fn define_then_resolve() {
        assert_eq!(run("(define x 5) x"), "5");
    }

    #[test]
    fn define_shorthand_builds_a_closure() {
        assert_eq!(run("(define (double x) (* x 2)) (double 21)"), "42");
    }

    #[test]
    fn lambda_application() {
        assert_eq!(run("((lambda (a b) (+ a b)) 1 2)"), "3");
    }

    #[test]
    fn closures_capture_lexically_not_dynamically() {
        // The inner x must come from the defining scope, not the caller's.
        let src = "
            (define x 1)
            (define (get-x) x)
            (define (shadowed x) (get-x))
            (shadowed 99)";
        assert_eq!(run(src), "1");
    }

    #[test]
    fn set_mutates_the_ancestor_binding() {
        let src = "
            (define x 1)
            (define (bump) (set! x 2))
            (bump)
            x";
        assert_eq!(run(src), "2");
    }

    #[test]
    fn set_of_unbound_is_an_error() {
        assert_eq!(
            run_err("(set! ghost 1)"),
            Error::UnboundVariable("ghost".into())
        );
    }

    #[test]
    fn fixed_arity_is_enforced_both_ways() {
        assert!(matches!(
            run_err("((lambda (a b) a) 1)"),
            Error::ArityMismatch(_)
        ));
        assert!(matches!(
            run_err("((lambda (a b) a) 1 2 3)"),
            Error::ArityMismatch(_)
        ));
    }

    #[test]
    fn variadic_needs_its_fixed_arguments() {
        assert!(matches!(
            run_err("((lambda (a . rest) a))"),
            Error::ArityMismatch(_)
        ));
    }

    #[test]
    fn variadic_rest_binds_leftovers() {
        assert_eq!(run("((lambda (a . rest) rest) 1 2 3)"), "(2 3)");
        assert_eq!(run("((lambda (a . rest) rest) 1)"), "nil");
        assert_eq!(run("((lambda args args) 1 2)"), "(1 2)");
    }

    #[test]
    fn arguments_evaluate_left_to_right() {
        let src = "
            (define order nil)
            (define (note n) (set! order (cons n order)) n)
            ((lambda (a b c) order) (note 1) (note 2) (note 3))";
        assert_eq!(run(src), "(3 2 1)");
    }

    #[test]
    fn operator_position_rejects_non_callables() {
        assert!(matches!(run_err("(1 2 3)"), Error::NotCallable(_)));
        assert!(matches!(run_err("('a)"), Error::NotCallable(_)));
    }

    #[test]
    fn if_branches_on_nil_only() {
        assert_eq!(run("(if nil 1 2)"), "2");
        // Integer zero is truthy: only Nil is false.
        assert_eq!(run("(if 0 1 2)"), "1");
        assert_eq!(run("(if '(a) 1 2)"), "1");
        assert_eq!(run("(if nil 1)"), "nil");
    }

    #[test]
    fn cond_picks_the_first_truthy_clause() {
        assert_eq!(run("(cond (nil 1) (#t 2) (#t 3))"), "2");
        assert_eq!(run("(cond (nil 1) (else 9))"), "9");
        assert_eq!(run("(cond (nil 1))"), "nil");
    }

    #[test]
    fn macro_arguments_are_not_evaluated() {
        let src = "
            (define list (lambda args args))
            (defmacro m (x) (list 'quote x))
            (define y (m (+ 1 2)))
            y";
        assert_eq!(run(src), "(+ 1 2)");
    }

    #[test]
    fn macro_expansion_evaluates_in_the_calling_scope() {
        let src = "
            (define list (lambda args args))
            (defmacro swap-args (f a b) (list f b a))
            (swap-args - 10 1)";
        // Expands to (- 1 10).
        assert_eq!(run(src), "-9");
    }

    #[test]
    fn macroexpand_is_a_single_step() {
        let src = "
            (define list (lambda args args))
            (defmacro m (x) (list '+ x 1))
            (macroexpand '(m 5))";
        assert_eq!(run(src), "(+ 5 1)");
    }

    #[test]
    fn macroexpand_of_a_non_macro_fails() {
        assert!(matches!(
            run_err("(macroexpand '(+ 1 2))"),
            Error::NotAMacroExpression(_)
        ));
    }

    #[test]
    fn quasiquote_with_unquote_and_splicing() {
        let src = "
            (define list (lambda args args))
            `(1 ,(+ 1 1) ,@(list 3 4))";
        assert_eq!(run(src), "(1 2 3 4)");
    }

    #[test]
    fn quasiquote_atoms_are_not_evaluated() {
        assert_eq!(run("`a"), "a");
        assert_eq!(run("`(a b)"), "(a b)");
    }

    #[test]
    fn quasiquote_dotted_unquote_in_tail() {
        assert_eq!(run("(define x 9) `(1 . ,x)"), "(1 . 9)");
    }

    #[test]
    fn splicing_nil_vanishes() {
        assert_eq!(run("`(1 ,@nil 2)"), "(1 2)");
    }

    #[test]
    fn bare_unquote_is_malformed() {
        assert!(matches!(run_err("`(a . unquote)"), Error::MalformedUnquote(_)));
        assert!(matches!(run_err("`(unquote)"), Error::MalformedUnquote(_)));
        assert!(matches!(
            run_err("`(unquote 1 2)"),
            Error::MalformedUnquote(_)
        ));
        assert!(matches!(run_err("`,@(list 1)"), Error::MalformedUnquote(_)));
    }

    #[test]
    fn set_car_mutates_through_aliases() {
        let src = "
            (define p (cons 1 2))
            (define q p)
            (set-car! p 9)
            q";
        assert_eq!(run(src), "(9 . 2)");
    }

    #[test]
    fn set_cdr_mutates_in_place() {
        assert_eq!(run("(define p (cons 1 2)) (set-cdr! p 7) p"), "(1 . 7)");
    }

    #[test]
    fn car_of_non_pair_never_coerces() {
        assert!(matches!(run_err("(car 5)"), Error::NotAPair(_)));
        assert!(matches!(run_err("(car nil)"), Error::NotAPair(_)));
    }

    #[test]
    fn eval_primitive_uses_the_calling_environment() {
        assert_eq!(run("(define x 3) (eval '(+ x 1))"), "4");
    }

    #[test]
    fn apply_primitive_spreads_a_list() {
        assert_eq!(run("(apply + '(1 2 3))"), "6");
        assert_eq!(run("(apply (lambda (a b) (cons a b)) '(1 2))"), "(1 . 2)");
    }

    #[test]
    fn gensym_values_are_distinct() {
        assert_eq!(run("(eq? (gensym) (gensym))"), "nil");
    }

    #[test]
    fn bignum_arithmetic_does_not_overflow() {
        // 2^64 = 18446744073709551616, past any machine integer.
        let src = "(define (pow2 n) (if (eq? n 0) 1 (* 2 (pow2 (- n 1))))) (pow2 64)";
        assert_eq!(run(src), "18446744073709551616");
    }

    #[test]
    fn eq_compares_symbols_by_identity_and_integers_by_value() {
        assert_eq!(run("(eq? 'a 'a)"), "#t");
        assert_eq!(run("(eq? 'a 'b)"), "nil");
        assert_eq!(run("(eq? 3 3)"), "#t");
        assert_eq!(run("(eq? nil nil)"), "#t");
        assert_eq!(run("(eq? (cons 1 2) (cons 1 2))"), "nil");
        assert_eq!(run("(define p (cons 1 2)) (eq? p p)"), "#t");
    }

    #[test]
    fn recursive_definitions_work() {
        let src = "
            (define (fact n) (if (eq? n 0) 1 (* n (fact (- n 1)))))
            (fact 10)";
        assert_eq!(run(src), "3628800");
    }

    #[test]
    fn evlis_returns_values_in_order() {
        let mut m = Machine::new();
        let forms = m.eval_str("'((+ 1 2) 4)").unwrap();
        let vals = m.evlis(&forms, m.globals).unwrap();
        assert_eq!(vals, vec![int(3), int(4)]);
    }
}
