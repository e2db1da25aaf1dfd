use thiserror::Error;

/// Everything that can go wrong between reading a form and producing a
/// value. Every error aborts the current top-level evaluation; recovery
/// (report and resume) belongs to the REPL loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The input ended in the middle of a form.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// No grammar production matched (stray ')', bad dotted pair, ...).
    #[error("syntax error: {0}")]
    MalformedSyntax(String),

    /// An unquote or unquote-splicing outside its well-formed shape.
    #[error("malformed unquote: {0}")]
    MalformedUnquote(String),

    /// Symbol lookup failed in every frame of the chain.
    #[error("unbound variable '{0}'")]
    UnboundVariable(String),

    /// A pair operation on something that is not a pair.
    #[error("not a pair: {0}")]
    NotAPair(String),

    /// A non-callable value in operator position.
    #[error("not callable: {0}")]
    NotCallable(String),

    /// Wrong number of arguments to a closure, macro, or primitive.
    #[error("arity mismatch: {0}")]
    ArityMismatch(String),

    /// macroexpand of a form whose head is not a macro.
    #[error("not a macro expression: {0}")]
    NotAMacroExpression(String),

    /// A primitive received an operand of the wrong type.
    #[error("type error: {0}")]
    WrongType(String),

    #[error("division by zero")]
    DivideByZero,

    /// States that should be unreachable (e.g. a parser delimiter escaping
    /// into Eval). A report of one is a bug in the interpreter, not in
    /// user code.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
