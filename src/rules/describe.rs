//! Human-readable rendering of a rule, used as the "expected" text of errors.
use super::TypeRule;

/// Renders `rule` in annotation syntax: `int`, `list[str]`, `int | None`,
/// `tuple[int, ...]`, `Literal['r', 'w']`.
pub fn describe(rule: &TypeRule) -> String {
    let mut out = String::new();
    write_rule(rule, &mut out);
    out
}

fn write_rule(rule: &TypeRule, out: &mut String) {
    match rule {
        TypeRule::Any => out.push_str("Any"),
        TypeRule::InstanceOf(t) | TypeRule::ExactType(t) => out.push_str(t.name()),
        TypeRule::Union(options) => {
            for (i, r) in options.iter().enumerate() {
                if i > 0 {
                    out.push_str(" | ");
                }
                write_rule(r, out);
            }
        }
        TypeRule::ListOf(element) => write_generic("list", &[element.as_deref()], out),
        TypeRule::SetOf(element) => write_generic("set", &[element.as_deref()], out),
        TypeRule::DictOf(k, v) => write_generic("dict", &[k.as_deref(), v.as_deref()], out),
        TypeRule::TupleHomogeneous(element) => {
            out.push_str("tuple[");
            write_rule(element, out);
            out.push_str(", ...]");
        }
        TypeRule::TupleFixed(rules) if rules.is_empty() => out.push_str("tuple[()]"),
        TypeRule::TupleFixed(rules) => {
            out.push_str("tuple[");
            for (i, r) in rules.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_rule(r, out);
            }
            out.push(']');
        }
        TypeRule::LiteralSet(values) => {
            out.push_str("Literal[");
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&v.repr());
            }
            out.push(']');
        }
    }
}

fn write_generic(base: &str, args: &[Option<&TypeRule>], out: &mut String) {
    out.push_str(base);
    if args.iter().all(Option::is_none) {
        return;
    }
    out.push('[');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match arg {
            Some(r) => write_rule(r, out),
            None => out.push_str("Any"),
        }
    }
    out.push(']');
}
