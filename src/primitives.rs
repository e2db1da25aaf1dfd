use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::eval::Machine;
use crate::symbol::sym;
use crate::value::{EnvId, Value};

/// The uniform primitive contract: the raw, unevaluated argument-form list
/// and the calling environment. Each primitive decides whether and when to
/// evaluate its operands, which is how special forms like `if` and `quote`
/// share one dispatch mechanism with ordinary procedures like `+`.
pub type PrimFn = fn(&mut Machine, &Value, EnvId) -> Result<Value>;

pub struct PrimDef {
    pub name: &'static str,
    pub func: PrimFn,
}

macro_rules! prim {
    ($name:literal, $func:expr) => {
        PrimDef {
            name: $name,
            func: $func,
        }
    };
}

/// The fixed table bound into the root environment at machine startup.
/// PrimId is an index into this slice.
pub const PRIMITIVES: &[PrimDef] = &[
    prim!("quote", prim_quote),
    prim!("quasiquote", prim_quasiquote),
    prim!("if", prim_if),
    prim!("cond", prim_cond),
    prim!("define", prim_define),
    prim!("lambda", prim_lambda),
    prim!("defmacro", prim_defmacro),
    prim!("macroexpand", prim_macroexpand),
    prim!("gensym", prim_gensym),
    prim!("set!", prim_set),
    prim!("set-car!", prim_set_car),
    prim!("set-cdr!", prim_set_cdr),
    prim!("eval", prim_eval),
    prim!("apply", prim_apply),
    prim!("cons", prim_cons),
    prim!("car", prim_car),
    prim!("cdr", prim_cdr),
    prim!("eq?", prim_eq),
    prim!("=", prim_eq),
    prim!("<", prim_less),
    prim!("symbol?", prim_is_symbol),
    prim!("pair?", prim_is_pair),
    prim!("number?", prim_is_number),
    prim!("procedure?", prim_is_procedure),
    prim!("macro?", prim_is_macro),
    prim!("primitive?", prim_is_primitive),
    prim!("+", prim_add),
    prim!("-", prim_sub),
    prim!("*", prim_mul),
    prim!("/", prim_div),
    prim!("modulo", prim_modulo),
    prim!("print", prim_print),
    prim!("exit", prim_exit),
];

// ----------------------------------------------------------------------
// Argument helpers
// ----------------------------------------------------------------------

/// Collect the raw forms without evaluating, checking the count.
fn raw_args<const N: usize>(m: &Machine, forms: &Value, name: &str) -> Result<[Value; N]> {
    let items = m.heap.list_to_vec(forms)?;
    to_exact(items, N, name)
}

/// Evaluate the forms left to right, checking the count.
fn eval_args<const N: usize>(
    m: &mut Machine,
    forms: &Value,
    env: EnvId,
    name: &str,
) -> Result<[Value; N]> {
    let items = m.evlis(forms, env)?;
    to_exact(items, N, name)
}

fn to_exact<const N: usize>(items: Vec<Value>, n: usize, name: &str) -> Result<[Value; N]> {
    if items.len() != n {
        return Err(Error::ArityMismatch(format!(
            "{name} takes {n} argument(s), got {}",
            items.len()
        )));
    }
    Ok(items.try_into().unwrap_or_else(|_| unreachable!()))
}

fn boolean(truth: bool) -> Value {
    if truth {
        Value::Symbol(sym::T)
    } else {
        Value::Nil
    }
}

fn integer_operand(val: &Value, name: &str) -> Result<BigInt> {
    match val {
        Value::Integer(n) => Ok(n.clone()),
        _ => Err(Error::WrongType(format!("{name} expects integers"))),
    }
}

// ----------------------------------------------------------------------
// Quotation
// ----------------------------------------------------------------------

fn prim_quote(m: &mut Machine, forms: &Value, _env: EnvId) -> Result<Value> {
    let [form] = raw_args(m, forms, "quote")?;
    Ok(form)
}

fn prim_quasiquote(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [template] = raw_args(m, forms, "quasiquote")?;
    m.quasiquote(&template, env)
}

// ----------------------------------------------------------------------
// Control
// ----------------------------------------------------------------------

fn prim_if(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let items = m.heap.list_to_vec(forms)?;
    if items.len() < 2 || items.len() > 3 {
        return Err(Error::ArityMismatch(format!(
            "if takes 2 or 3 argument(s), got {}",
            items.len()
        )));
    }
    if m.eval(&items[0], env)?.is_truthy() {
        m.eval(&items[1], env)
    } else if let Some(alt) = items.get(2) {
        m.eval(alt, env)
    } else {
        Ok(Value::Nil)
    }
}

/// (cond (test body...) ... (else body...)). The first clause whose test
/// is truthy wins; a clause with no body yields its test's value; no
/// matching clause yields nil.
fn prim_cond(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let clauses = m.heap.list_to_vec(forms)?;
    for clause in &clauses {
        let parts = m.heap.list_to_vec(clause).map_err(|_| {
            Error::MalformedSyntax("cond clause must be a list".into())
        })?;
        let Some((test, body)) = parts.split_first() else {
            return Err(Error::MalformedSyntax("empty cond clause".into()));
        };

        let matched = if *test == Value::Symbol(sym::ELSE) {
            Value::Symbol(sym::T)
        } else {
            m.eval(test, env)?
        };
        if !matched.is_truthy() {
            continue;
        }

        let mut result = matched;
        for form in body {
            result = m.eval(form, env)?;
        }
        return Ok(result);
    }
    Ok(Value::Nil)
}

// ----------------------------------------------------------------------
// Definition
// ----------------------------------------------------------------------

/// (define name expr), or the shorthand (define (name . params) body)
/// which builds and binds a closure. Binds in the current frame only.
fn prim_define(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [target, expr] = raw_args(m, forms, "define")?;

    match &target {
        Value::Symbol(name) => {
            let val = m.eval(&expr, env)?;
            m.envs.bind(env, *name, val.clone());
            Ok(val)
        }
        Value::Pair(id) => {
            let head = m.heap.car(*id);
            let params = m.heap.cdr(*id);
            let Some(name) = head.as_symbol() else {
                return Err(Error::MalformedSyntax(
                    "define: procedure name must be a symbol".into(),
                ));
            };
            let closure = m.make_closure(&params, expr, env)?;
            m.envs.bind(env, name, closure.clone());
            Ok(closure)
        }
        _ => Err(Error::MalformedSyntax(
            "define expects a symbol or a (name . params) list".into(),
        )),
    }
}

fn prim_lambda(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [params, body] = raw_args(m, forms, "lambda")?;
    m.make_closure(&params, body, env)
}

fn prim_defmacro(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [name_form, params, body] = raw_args(m, forms, "defmacro")?;
    let Some(name) = name_form.as_symbol() else {
        return Err(Error::MalformedSyntax(
            "defmacro: name must be a symbol".into(),
        ));
    };
    let mac = m.make_macro(&params, body, env)?;
    m.envs.bind(env, name, mac.clone());
    Ok(mac)
}

fn prim_macroexpand(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [form] = eval_args(m, forms, env, "macroexpand")?;
    m.macroexpand_one(&form, env)
}

fn prim_gensym(m: &mut Machine, forms: &Value, _env: EnvId) -> Result<Value> {
    let [] = raw_args(m, forms, "gensym")?;
    Ok(m.gensym())
}

// ----------------------------------------------------------------------
// Mutation
// ----------------------------------------------------------------------

/// (set! name expr): overwrite the nearest enclosing binding, returning
/// the previous value. Never introduces a binding; that is define's job.
fn prim_set(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [target, expr] = raw_args(m, forms, "set!")?;
    let Some(name) = target.as_symbol() else {
        return Err(Error::WrongType("set! expects a symbol".into()));
    };
    let val = m.eval(&expr, env)?;
    m.set_var(env, name, val)
}

fn prim_set_car(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [pair, val] = eval_args(m, forms, env, "set-car!")?;
    match pair.as_pair() {
        Some(id) => {
            m.heap.set_car(id, val.clone());
            Ok(val)
        }
        None => Err(Error::NotAPair("set-car! of a non-pair".into())),
    }
}

fn prim_set_cdr(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [pair, val] = eval_args(m, forms, env, "set-cdr!")?;
    match pair.as_pair() {
        Some(id) => {
            m.heap.set_cdr(id, val.clone());
            Ok(val)
        }
        None => Err(Error::NotAPair("set-cdr! of a non-pair".into())),
    }
}

// ----------------------------------------------------------------------
// Meta
// ----------------------------------------------------------------------

fn prim_eval(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [form] = eval_args(m, forms, env, "eval")?;
    m.eval(&form, env)
}

fn prim_apply(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [op, arg_list] = eval_args(m, forms, env, "apply")?;
    let args = m.heap.list_to_vec(&arg_list)?;
    m.apply_values(&op, args, env)
}

// ----------------------------------------------------------------------
// Pairs
// ----------------------------------------------------------------------

fn prim_cons(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [car, cdr] = eval_args(m, forms, env, "cons")?;
    Ok(m.heap.cons(car, cdr))
}

fn prim_car(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [val] = eval_args(m, forms, env, "car")?;
    m.heap.car_val(&val)
}

fn prim_cdr(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [val] = eval_args(m, forms, env, "cdr")?;
    m.heap.cdr_val(&val)
}

// ----------------------------------------------------------------------
// Comparison and predicates
// ----------------------------------------------------------------------

/// Identity for symbols and pairs (interning makes symbol identity equal
/// name equality), structural for integers and nil.
fn prim_eq(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [a, b] = eval_args(m, forms, env, "eq?")?;
    Ok(boolean(a == b))
}

fn prim_less(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [a, b] = eval_args(m, forms, env, "<")?;
    let a = integer_operand(&a, "<")?;
    let b = integer_operand(&b, "<")?;
    Ok(boolean(a < b))
}

fn prim_is_symbol(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [val] = eval_args(m, forms, env, "symbol?")?;
    Ok(boolean(val.is_symbol()))
}

fn prim_is_pair(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [val] = eval_args(m, forms, env, "pair?")?;
    Ok(boolean(val.is_pair()))
}

fn prim_is_number(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [val] = eval_args(m, forms, env, "number?")?;
    Ok(boolean(matches!(val, Value::Integer(_))))
}

fn prim_is_procedure(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [val] = eval_args(m, forms, env, "procedure?")?;
    Ok(boolean(matches!(val, Value::Closure(_))))
}

fn prim_is_macro(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [val] = eval_args(m, forms, env, "macro?")?;
    Ok(boolean(matches!(val, Value::Macro(_))))
}

fn prim_is_primitive(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [val] = eval_args(m, forms, env, "primitive?")?;
    Ok(boolean(matches!(val, Value::Primitive(_))))
}

// ----------------------------------------------------------------------
// Arithmetic
// ----------------------------------------------------------------------

fn prim_add(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let args = m.evlis(forms, env)?;
    let mut acc = BigInt::from(0);
    for arg in &args {
        acc += integer_operand(arg, "+")?;
    }
    Ok(Value::Integer(acc))
}

fn prim_mul(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let args = m.evlis(forms, env)?;
    let mut acc = BigInt::from(1);
    for arg in &args {
        acc *= integer_operand(arg, "*")?;
    }
    Ok(Value::Integer(acc))
}

/// (- x) negates; (- x y ...) subtracts left to right.
fn prim_sub(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let args = m.evlis(forms, env)?;
    let Some((first, rest)) = args.split_first() else {
        return Err(Error::ArityMismatch("- takes at least 1 argument".into()));
    };
    let mut acc = integer_operand(first, "-")?;
    if rest.is_empty() {
        return Ok(Value::Integer(-acc));
    }
    for arg in rest {
        acc -= integer_operand(arg, "-")?;
    }
    Ok(Value::Integer(acc))
}

/// (/ x y ...) divides left to right, truncating toward zero.
fn prim_div(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let args = m.evlis(forms, env)?;
    let Some((first, rest)) = args.split_first() else {
        return Err(Error::ArityMismatch("/ takes at least 1 argument".into()));
    };
    if rest.is_empty() {
        return Err(Error::ArityMismatch("/ takes at least 2 arguments".into()));
    }
    let mut acc = integer_operand(first, "/")?;
    for arg in rest {
        let divisor = integer_operand(arg, "/")?;
        if divisor == BigInt::from(0) {
            return Err(Error::DivideByZero);
        }
        acc /= divisor;
    }
    Ok(Value::Integer(acc))
}

fn prim_modulo(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let [a, b] = eval_args(m, forms, env, "modulo")?;
    let a = integer_operand(&a, "modulo")?;
    let b = integer_operand(&b, "modulo")?;
    if b == BigInt::from(0) {
        return Err(Error::DivideByZero);
    }
    Ok(Value::Integer(a % b))
}

// ----------------------------------------------------------------------
// Console and process
// ----------------------------------------------------------------------

fn prim_print(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let args = m.evlis(forms, env)?;
    for arg in &args {
        println!("{}", m.print(arg));
    }
    Ok(Value::Nil)
}

/// (exit) or (exit code).
fn prim_exit(m: &mut Machine, forms: &Value, env: EnvId) -> Result<Value> {
    let args = m.evlis(forms, env)?;
    let code = match args.first() {
        None => 0,
        Some(Value::Integer(n)) => i32::try_from(n.clone()).unwrap_or(1),
        Some(_) => return Err(Error::WrongType("exit expects an integer".into())),
    };
    std::process::exit(code)
}
