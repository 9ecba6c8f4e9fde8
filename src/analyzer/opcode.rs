//! Opcode row model: one typed row per `EXPLAIN` output line, classified
//! once into an [`OpcodeKind`] so the extractors match on variants instead
//! of re-comparing opcode names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One line of an `EXPLAIN` trace. Operands are kept as text; `None` is the
/// engine's NULL and is distinct from `"0"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcodeRow {
    pub address: i64,
    pub opcode: String,
    pub p1: Option<String>,
    pub p2: Option<String>,
    pub p3: Option<String>,
    pub p4: Option<String>,
    pub p5: Option<String>,
    #[serde(default)]
    pub comment: String,
}

impl OpcodeRow {
    pub fn new(address: i64, opcode: &str) -> Self {
        Self {
            address,
            opcode: opcode.to_string(),
            p1: None,
            p2: None,
            p3: None,
            p4: None,
            p5: None,
            comment: String::new(),
        }
    }

    pub fn with_p1(mut self, v: impl ToString) -> Self {
        self.p1 = Some(v.to_string());
        self
    }

    pub fn with_p2(mut self, v: impl ToString) -> Self {
        self.p2 = Some(v.to_string());
        self
    }

    pub fn with_p3(mut self, v: impl ToString) -> Self {
        self.p3 = Some(v.to_string());
        self
    }

    pub fn with_p4(mut self, v: impl ToString) -> Self {
        self.p4 = Some(v.to_string());
        self
    }

    pub fn with_p5(mut self, v: impl ToString) -> Self {
        self.p5 = Some(v.to_string());
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn p1_int(&self) -> Option<i64> {
        parse_int(self.p1.as_deref())
    }

    pub fn p2_int(&self) -> Option<i64> {
        parse_int(self.p2.as_deref())
    }

    pub fn p3_int(&self) -> Option<i64> {
        parse_int(self.p3.as_deref())
    }

    pub fn p4_int(&self) -> Option<i64> {
        parse_int(self.p4.as_deref())
    }
}

fn parse_int(v: Option<&str>) -> Option<i64> {
    v.and_then(|s| s.trim().parse::<i64>().ok())
}

/// Direction of a range seek or index bound (`SeekGE`, `IdxLT`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOp {
    Ge,
    Gt,
    Le,
    Lt,
}

impl SeekOp {
    pub fn as_compare(self) -> CompareOp {
        match self {
            SeekOp::Ge => CompareOp::Ge,
            SeekOp::Gt => CompareOp::Gt,
            SeekOp::Le => CompareOp::Le,
            SeekOp::Lt => CompareOp::Lt,
        }
    }
}

/// Comparison opcodes. The engine evaluates `r[P3] <op> r[P1]` and jumps to
/// P2 when it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Logical complement: the condition under which the jump is not taken.
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
        }
    }

    /// Same relation with the operands swapped.
    pub fn mirror(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            other => other,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Integer,
    Int64,
    Real,
    String8,
    String,
    Blob,
    Null,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullTestOp {
    If,
    IfNot,
    IsNull,
    NotNull,
}

/// Closed classification of the opcodes the analyzer understands. Anything
/// else is [`OpcodeKind::Other`] and is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeKind {
    /// `OpenRead`, `OpenWrite`, `ReopenIdx`: P1 cursor, P2 root page.
    Open,
    OpenEphemeral,
    SorterOpen,
    /// P1 cursor reading the row unpacked into register P2.
    OpenPseudo,
    /// P1 cursor, P2 column index, P3 target register.
    Column,
    /// `Rowid`/`IdxRowid`: P1 cursor, P2 target register.
    Rowid,
    /// `SeekGE`..`SeekLT`: P1 cursor, P3 first key register, P4 key count.
    Seek(SeekOp),
    /// `IdxGE`..`IdxLT`: loop-exit bound, same operand layout as `Seek`.
    IdxBound(SeekOp),
    /// `Eq`..`Ge`: compare P1 and P3, jump to P2.
    Compare(CompareOp),
    /// `SeekRowid`/`NotExists`: P1 cursor, P3 register holding the rowid.
    RowidLookup,
    NullTest(NullTestOp),
    /// Loads a constant into P2.
    Literal(LiteralKind),
    /// `Copy`/`SCopy`/`IntCopy`: P1 source, P2 target.
    RegisterCopy,
    Affinity,
    Cast,
    /// P1 first register, P2 register count, P3 target.
    MakeRecord,
    IdxInsert,
    SorterInsert,
    Sort,
    SorterSort,
    /// P1 sorter cursor, P2 target register, P3 pseudo cursor over it.
    SorterData,
    /// `Compare`: element-wise comparison of two register vectors.
    KeyCompare,
    AggStep,
    Rewind,
    Last,
    SeekEnd,
    Next,
    Prev,
    ResultRow,
    IfPos,
    Other,
}

impl OpcodeKind {
    pub fn classify(opcode: &str) -> Self {
        match opcode {
            "OpenRead" | "OpenWrite" | "ReopenIdx" => OpcodeKind::Open,
            "OpenEphemeral" | "OpenAutoindex" => OpcodeKind::OpenEphemeral,
            "SorterOpen" => OpcodeKind::SorterOpen,
            "OpenPseudo" => OpcodeKind::OpenPseudo,
            "Column" => OpcodeKind::Column,
            "Rowid" | "IdxRowid" => OpcodeKind::Rowid,
            "SeekGE" => OpcodeKind::Seek(SeekOp::Ge),
            "SeekGT" => OpcodeKind::Seek(SeekOp::Gt),
            "SeekLE" => OpcodeKind::Seek(SeekOp::Le),
            "SeekLT" => OpcodeKind::Seek(SeekOp::Lt),
            "IdxGE" => OpcodeKind::IdxBound(SeekOp::Ge),
            "IdxGT" => OpcodeKind::IdxBound(SeekOp::Gt),
            "IdxLE" => OpcodeKind::IdxBound(SeekOp::Le),
            "IdxLT" => OpcodeKind::IdxBound(SeekOp::Lt),
            "Eq" => OpcodeKind::Compare(CompareOp::Eq),
            "Ne" => OpcodeKind::Compare(CompareOp::Ne),
            "Lt" => OpcodeKind::Compare(CompareOp::Lt),
            "Le" => OpcodeKind::Compare(CompareOp::Le),
            "Gt" => OpcodeKind::Compare(CompareOp::Gt),
            "Ge" => OpcodeKind::Compare(CompareOp::Ge),
            "SeekRowid" | "NotExists" => OpcodeKind::RowidLookup,
            "If" => OpcodeKind::NullTest(NullTestOp::If),
            "IfNot" => OpcodeKind::NullTest(NullTestOp::IfNot),
            "IsNull" => OpcodeKind::NullTest(NullTestOp::IsNull),
            "NotNull" => OpcodeKind::NullTest(NullTestOp::NotNull),
            "Integer" => OpcodeKind::Literal(LiteralKind::Integer),
            "Int64" => OpcodeKind::Literal(LiteralKind::Int64),
            "Real" => OpcodeKind::Literal(LiteralKind::Real),
            "String8" => OpcodeKind::Literal(LiteralKind::String8),
            "String" => OpcodeKind::Literal(LiteralKind::String),
            "Blob" => OpcodeKind::Literal(LiteralKind::Blob),
            "Null" => OpcodeKind::Literal(LiteralKind::Null),
            "Variable" => OpcodeKind::Literal(LiteralKind::Variable),
            "Copy" | "SCopy" | "IntCopy" => OpcodeKind::RegisterCopy,
            "Affinity" => OpcodeKind::Affinity,
            "Cast" => OpcodeKind::Cast,
            "MakeRecord" => OpcodeKind::MakeRecord,
            "IdxInsert" => OpcodeKind::IdxInsert,
            "SorterInsert" => OpcodeKind::SorterInsert,
            "Sort" => OpcodeKind::Sort,
            "SorterSort" => OpcodeKind::SorterSort,
            "SorterData" => OpcodeKind::SorterData,
            "Compare" => OpcodeKind::KeyCompare,
            "AggStep" | "AggStep1" => OpcodeKind::AggStep,
            "Rewind" => OpcodeKind::Rewind,
            "Last" => OpcodeKind::Last,
            "SeekEnd" => OpcodeKind::SeekEnd,
            "Next" | "SorterNext" => OpcodeKind::Next,
            "Prev" => OpcodeKind::Prev,
            "ResultRow" => OpcodeKind::ResultRow,
            "IfPos" => OpcodeKind::IfPos,
            _ => OpcodeKind::Other,
        }
    }

    /// Reads a table or index column into a register.
    pub fn is_column_read(self) -> bool {
        matches!(self, OpcodeKind::Column | OpcodeKind::Rowid)
    }
}

/// Immutable, indexable opcode trace with a precomputed classification.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    rows: Vec<OpcodeRow>,
    kinds: Vec<OpcodeKind>,
    by_address: HashMap<i64, usize>,
}

impl Trace {
    pub fn from_rows(rows: Vec<OpcodeRow>) -> Self {
        let kinds = rows.iter().map(|r| OpcodeKind::classify(&r.opcode)).collect();
        let by_address = rows
            .iter()
            .enumerate()
            .map(|(pos, r)| (r.address, pos))
            .collect();
        Self {
            rows,
            kinds,
            by_address,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, pos: usize) -> &OpcodeRow {
        &self.rows[pos]
    }

    pub fn kind(&self, pos: usize) -> OpcodeKind {
        self.kinds[pos]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &OpcodeRow, OpcodeKind)> + '_ {
        self.rows
            .iter()
            .zip(self.kinds.iter())
            .enumerate()
            .map(|(pos, (row, kind))| (pos, row, *kind))
    }

    /// Position of the row whose address is `address` (jump targets).
    pub fn position_of_address(&self, address: i64) -> Option<usize> {
        self.by_address.get(&address).copied()
    }

    /// Kind of the row a jump operand points at.
    pub fn jump_target_kind(&self, pos: usize) -> Option<OpcodeKind> {
        let target = self.row(pos).p2_int()?;
        self.position_of_address(target).map(|p| self.kind(p))
    }

    /// Register the row at `pos` writes, if it writes exactly one we track.
    pub fn written_register(&self, pos: usize) -> Option<i64> {
        let row = self.row(pos);
        match self.kind(pos) {
            OpcodeKind::Column | OpcodeKind::MakeRecord => row.p3_int(),
            OpcodeKind::Rowid | OpcodeKind::Literal(_) | OpcodeKind::RegisterCopy => row.p2_int(),
            _ => None,
        }
    }

    /// Walks from `start - 1` toward the trace start and returns the first row
    /// matching `predicate`. Stops with `None` at a row matching `boundary`.
    pub fn find_backward_until(
        &self,
        start: usize,
        predicate: impl Fn(usize) -> bool,
        boundary: impl Fn(usize) -> bool,
    ) -> Option<usize> {
        for pos in (0..start.min(self.len())).rev() {
            if predicate(pos) {
                return Some(pos);
            }
            if boundary(pos) {
                return None;
            }
        }
        None
    }

    /// Walks from `start + 1` toward the trace end; same contract as
    /// [`Trace::find_backward_until`].
    pub fn find_forward_until(
        &self,
        start: usize,
        predicate: impl Fn(usize) -> bool,
        boundary: impl Fn(usize) -> bool,
    ) -> Option<usize> {
        for pos in start.saturating_add(1)..self.len() {
            if predicate(pos) {
                return Some(pos);
            }
            if boundary(pos) {
                return None;
            }
        }
        None
    }

    /// Most recent row before `pos` that writes `register`.
    pub fn last_writer(&self, pos: usize, register: i64) -> Option<usize> {
        self.find_backward_until(pos, |p| self.written_register(p) == Some(register), |_| false)
    }

    /// First row after `pos` that writes `register`.
    pub fn next_writer(&self, pos: usize, register: i64) -> Option<usize> {
        self.find_forward_until(pos, |p| self.written_register(p) == Some(register), |_| false)
    }
}
