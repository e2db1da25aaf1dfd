use crate::heap::Heap;
use crate::primitives;
use crate::symbol::{sym, SymbolTable};
use crate::value::Value;

/// Print a value to a string. Integers and lists of literals round-trip
/// through the reader; procedures and macros render opaquely.
pub fn print_val(val: &Value, heap: &Heap, symbols: &SymbolTable) -> String {
    let mut out = String::new();
    print_inner(val, heap, symbols, &mut out, 0);
    out
}

fn print_inner(val: &Value, heap: &Heap, symbols: &SymbolTable, out: &mut String, depth: usize) {
    // Depth cap instead of a cycle detector: set-cdr! can tie knots.
    if depth > 1000 {
        out.push_str("...");
        return;
    }

    match val {
        Value::Nil => out.push_str("nil"),
        Value::Symbol(id) => out.push_str(symbols.name(*id)),
        Value::Integer(n) => out.push_str(&n.to_string()),
        Value::Primitive(id) => {
            out.push_str("#<primitive ");
            out.push_str(primitives::PRIMITIVES[id.0 as usize].name);
            out.push('>');
        }
        Value::Closure(_) => out.push_str("#<procedure>"),
        Value::Macro(_) => out.push_str("#<macro>"),
        Value::CloseParen => out.push_str("#<close-paren>"),
        Value::Pair(id) => {
            let car = heap.car(*id);
            let cdr = heap.cdr(*id);

            // (quote x) and friends print as their reader sugar.
            if let Some(prefix) = quote_sugar(&car) {
                if let Value::Pair(cdr_id) = &cdr {
                    if heap.cdr(*cdr_id).is_nil() {
                        out.push_str(prefix);
                        print_inner(&heap.car(*cdr_id), heap, symbols, out, depth + 1);
                        return;
                    }
                }
            }

            out.push('(');
            print_inner(&car, heap, symbols, out, depth + 1);

            let mut current = cdr;
            let mut siblings = 0;
            loop {
                match current {
                    Value::Nil => break,
                    Value::Pair(pid) => {
                        // The cdr walk needs its own bound: a cycle tied
                        // through set-cdr! never reaches Nil.
                        siblings += 1;
                        if siblings > 1000 {
                            out.push_str(" ...");
                            break;
                        }
                        out.push(' ');
                        print_inner(&heap.car(pid), heap, symbols, out, depth + 1);
                        current = heap.cdr(pid);
                    }
                    tail => {
                        // Improper tail, mirroring the dotted input syntax.
                        out.push_str(" . ");
                        print_inner(&tail, heap, symbols, out, depth + 1);
                        break;
                    }
                }
            }
            out.push(')');
        }
    }
}

fn quote_sugar(head: &Value) -> Option<&'static str> {
    match head.as_symbol()? {
        id if id == sym::QUOTE => Some("'"),
        id if id == sym::QUASIQUOTE => Some("`"),
        id if id == sym::UNQUOTE => Some(","),
        id if id == sym::UNQUOTE_SPLICING => Some(",@"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_str;

    fn round(input: &str) -> String {
        let mut heap = Heap::new();
        let mut symbols = SymbolTable::new();
        let val = read_str(input, &mut heap, &mut symbols).unwrap();
        print_val(&val, &heap, &symbols)
    }

    #[test]
    fn atoms_round_trip() {
        assert_eq!(round("42"), "42");
        assert_eq!(round("-7"), "-7");
        assert_eq!(round("widget"), "widget");
        assert_eq!(round("nil"), "nil");
    }

    #[test]
    fn proper_lists_round_trip() {
        assert_eq!(round("(1 2 3)"), "(1 2 3)");
        assert_eq!(round("(a (b c) d)"), "(a (b c) d)");
        assert_eq!(round("()"), "nil");
    }

    #[test]
    fn improper_tails_print_dotted() {
        assert_eq!(round("(1 . 2)"), "(1 . 2)");
        assert_eq!(round("(1 2 . 3)"), "(1 2 . 3)");
    }

    #[test]
    fn quote_family_prints_as_sugar() {
        assert_eq!(round("'a"), "'a");
        assert_eq!(round("`(a ,b ,@c)"), "`(a ,b ,@c)");
    }

    #[test]
    fn parse_print_parse_is_idempotent() {
        for input in ["42", "(1 2 3)", "(1 . 2)", "'(a b)", "(a (b . 4) ())"] {
            let printed = round(input);
            assert_eq!(round(&printed), printed, "for {input}");
        }
    }

    #[test]
    fn cyclic_structure_does_not_hang() {
        let mut heap = Heap::new();
        let symbols = SymbolTable::new();
        let id = heap.alloc(Value::Nil, Value::Nil);
        heap.set_cdr(id, Value::Pair(id));
        let text = print_val(&Value::Pair(id), &heap, &symbols);
        assert!(text.contains("..."));
    }
}
