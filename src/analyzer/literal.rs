//! Literal operand recovery for reconstructed WHERE expressions.

use super::opcode::{LiteralKind, OpcodeKind, Trace};

/// `Copy`/`SCopy` chains longer than this are not followed.
const MAX_COPY_DEPTH: usize = 4;

/// Type affinity code for BLOB in `Cast` P2 (ASCII 'A').
const BLOB_AFFINITY: i64 = 65;

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes.
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `"column"<op><literal>`
pub fn comparison(column: &str, op: &str, literal: &str) -> String {
    format!("{}{}{}", quote_identifier(column), op, literal)
}

/// SQL text of the constant held in `register` as seen from trace position
/// `at`. The nearest earlier writer wins; constants hoisted into the
/// program's init block appear after the use, so the first later writer is
/// the fallback. Returns `None` when the register is fed by anything other
/// than a literal.
pub fn recover(trace: &Trace, at: usize, register: i64) -> Option<String> {
    let text = recover_at_depth(trace, at, register, 0)?;
    if blob_cast_applies(trace, at, register) {
        Some(format!("CAST({text} AS BLOB)"))
    } else {
        Some(text)
    }
}

fn recover_at_depth(trace: &Trace, at: usize, register: i64, depth: usize) -> Option<String> {
    if depth > MAX_COPY_DEPTH {
        return None;
    }
    let writer = trace
        .last_writer(at, register)
        .or_else(|| trace.next_writer(at, register))?;
    match trace.kind(writer) {
        OpcodeKind::Literal(kind) => render(trace, writer, kind),
        OpcodeKind::RegisterCopy => {
            let source = trace.row(writer).p1_int()?;
            recover_at_depth(trace, writer, source, depth + 1)
        }
        _ => None,
    }
}

fn render(trace: &Trace, pos: usize, kind: LiteralKind) -> Option<String> {
    let row = trace.row(pos);
    match kind {
        LiteralKind::Integer => row.p1_int().map(|v| v.to_string()),
        LiteralKind::Int64 | LiteralKind::Real => row.p4.clone(),
        LiteralKind::String8 | LiteralKind::String => row.p4.as_deref().map(quote_string),
        LiteralKind::Blob => row.p4.as_deref().map(render_blob),
        LiteralKind::Null => Some("NULL".to_string()),
        LiteralKind::Variable => Some(match row.p4.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => "?".to_string(),
        }),
    }
}

fn render_blob(p4: &str) -> String {
    let is_hex = !p4.is_empty() && p4.len() % 2 == 0 && p4.chars().all(|c| c.is_ascii_hexdigit());
    if is_hex {
        format!("X'{p4}'")
    } else {
        format!("CAST({} AS BLOB)", quote_string(p4))
    }
}

/// True when an `Affinity` covering `register` assigns BLOB affinity ('A')
/// or a `Cast` to BLOB targets it, between the literal load and `at`.
fn blob_cast_applies(trace: &Trace, at: usize, register: i64) -> bool {
    let is_blob_coercion = |pos: usize| {
        let row = trace.row(pos);
        match trace.kind(pos) {
            OpcodeKind::Cast => row.p1_int() == Some(register) && row.p2_int() == Some(BLOB_AFFINITY),
            OpcodeKind::Affinity => {
                let (Some(first), Some(count)) = (row.p1_int(), row.p2_int()) else {
                    return false;
                };
                let offset = register - first;
                if offset < 0 || offset >= count {
                    return false;
                }
                row.p4
                    .as_deref()
                    .and_then(|aff| aff.chars().nth(offset as usize))
                    == Some('A')
            }
            _ => false,
        }
    };
    let stop_at_writer = |pos: usize| trace.written_register(pos) == Some(register);
    trace
        .find_backward_until(at, is_blob_coercion, stop_at_writer)
        .is_some()
}
