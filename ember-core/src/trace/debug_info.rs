//! Debug information: source spans, sequence points, function and file tables

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::ident::Identifier;
use crate::runtime::value::Value;

/// 1-based line/column position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Inclusive start, exclusive end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    /// No location available
    pub const NONE: SourceSpan = SourceSpan {
        start: SourceLocation::new(0, 0),
        end: SourceLocation::new(0, 0),
    };

    /// Malformed location
    pub const INVALID: SourceSpan = SourceSpan {
        start: SourceLocation::new(u32::MAX, u32::MAX),
        end: SourceLocation::new(0, 0),
    };

    pub const fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    /// Span covering columns `start_col..end_col` of one line
    pub const fn line(line: u32, start_col: u32, end_col: u32) -> Self {
        Self::new(
            SourceLocation::new(line, start_col),
            SourceLocation::new(line, end_col),
        )
    }

    pub fn is_valid(&self) -> bool {
        self.start.line >= 1 && self.start.column >= 1 && self.start <= self.end
    }

    pub fn contains(&self, other: &SourceSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest span covering both
    pub fn union(&self, other: &SourceSpan) -> SourceSpan {
        SourceSpan::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePoint {
    pub span: SourceSpan,
}

/// A local declared in some lexical scope of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableInfo {
    pub name: Identifier,
    pub slot: usize,
    /// `Identifier::EMPTY` for the function's top-level scope
    pub scope: Identifier,
}

/// Per-function debug information
pub struct FunctionInfo {
    name: Identifier,
    file: Arc<str>,
    sequence_points: Vec<SequencePoint>,
    variables: Vec<VariableInfo>,
    all_slots: Arc<[usize]>,
    scopes: HashMap<Identifier, Arc<[usize]>>,
    span: SourceSpan,
    custom_payload: Option<Value>,
}

impl FunctionInfo {
    pub fn new(
        name: Identifier,
        file: Arc<str>,
        sequence_points: Vec<SequencePoint>,
        variables: Vec<VariableInfo>,
        custom_payload: Option<Value>,
    ) -> Self {
        let all_slots: Arc<[usize]> = variables.iter().map(|v| v.slot).collect();

        let mut grouped: HashMap<Identifier, Vec<usize>> = HashMap::new();
        for var in &variables {
            grouped.entry(var.scope).or_default().push(var.slot);
        }
        let scopes = grouped
            .into_iter()
            .map(|(scope, slots)| (scope, Arc::from(slots)))
            .collect();

        let span = sequence_points
            .iter()
            .map(|sp| sp.span)
            .filter(SourceSpan::is_valid)
            .reduce(|acc, span| acc.union(&span))
            .unwrap_or(SourceSpan::NONE);

        Self {
            name,
            file,
            sequence_points,
            variables,
            all_slots,
            scopes,
            span,
            custom_payload,
        }
    }

    pub fn name(&self) -> Identifier {
        self.name
    }

    pub fn file(&self) -> &Arc<str> {
        &self.file
    }

    pub fn sequence_points(&self) -> &[SequencePoint] {
        &self.sequence_points
    }

    pub fn sequence_point(&self, index: usize) -> Option<&SequencePoint> {
        self.sequence_points.get(index)
    }

    /// Index of the first sequence point whose span contains `span`
    pub fn sequence_point_at(&self, span: &SourceSpan) -> Option<usize> {
        self.sequence_points
            .iter()
            .position(|sp| sp.span.is_valid() && sp.span.contains(span))
    }

    /// Variables in lexical declaration order
    pub fn variables(&self) -> &[VariableInfo] {
        &self.variables
    }

    /// Slots of every variable, in declaration order
    pub fn all_slots(&self) -> &Arc<[usize]> {
        &self.all_slots
    }

    /// Slots declared in `scope`, in declaration order
    pub fn scope_slots(&self, scope: Identifier) -> Option<&Arc<[usize]>> {
        self.scopes.get(&scope)
    }

    pub fn variable_for_slot(&self, slot: usize) -> Option<&VariableInfo> {
        self.variables.iter().find(|v| v.slot == slot)
    }

    /// Union of all valid sequence-point spans
    pub fn span(&self) -> SourceSpan {
        self.span
    }

    pub fn custom_payload(&self) -> Option<&Value> {
        self.custom_payload.as_ref()
    }
}

impl fmt::Debug for FunctionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionInfo")
            .field("name", &self.name)
            .field("file", &self.file)
            .field("sequence_points", &self.sequence_points.len())
            .field("variables", &self.variables.len())
            .finish()
    }
}

/// Debug-info entry for one source file
pub struct DebugSourceFile {
    name: Arc<str>,
    functions: RwLock<Vec<Arc<FunctionInfo>>>,
}

impl DebugSourceFile {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: Arc::from(name),
            functions: RwLock::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn add_function(&self, function: Arc<FunctionInfo>) {
        self.functions.write().push(function);
    }

    pub fn remove_function(&self, function: &Arc<FunctionInfo>) {
        self.functions.write().retain(|f| !Arc::ptr_eq(f, function));
    }

    /// Innermost function whose span contains `span`
    pub fn function_at(&self, span: &SourceSpan) -> Option<Arc<FunctionInfo>> {
        if !span.is_valid() {
            return None;
        }
        self.functions
            .read()
            .iter()
            .filter(|f| f.span().is_valid() && f.span().contains(span))
            .min_by_key(|f| {
                let s = f.span();
                (s.end.line - s.start.line, s.end.column.wrapping_sub(s.start.column))
            })
            .cloned()
    }

    /// Enclosing function and matching sequence-point index
    pub fn resolve(&self, span: &SourceSpan) -> Option<(Arc<FunctionInfo>, usize)> {
        let function = self.function_at(span)?;
        let index = function.sequence_point_at(span)?;
        Some((function, index))
    }
}

impl fmt::Debug for DebugSourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugSourceFile")
            .field("name", &self.name)
            .field("functions", &self.functions.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::intern;

    fn function(name: &str, lines: &[u32]) -> Arc<FunctionInfo> {
        let points = lines
            .iter()
            .map(|&line| SequencePoint {
                span: SourceSpan::line(line, 5, 20),
            })
            .collect();
        let vars = vec![
            VariableInfo { name: intern("a"), slot: 0, scope: Identifier::EMPTY },
            VariableInfo { name: intern("b"), slot: 1, scope: intern("inner") },
            VariableInfo { name: intern("c"), slot: 2, scope: Identifier::EMPTY },
        ];
        Arc::new(FunctionInfo::new(intern(name), Arc::from("main.em"), points, vars, None))
    }

    #[test]
    fn test_span_sentinels_are_invalid() {
        assert!(!SourceSpan::NONE.is_valid());
        assert!(!SourceSpan::INVALID.is_valid());
        assert!(SourceSpan::line(3, 1, 4).is_valid());
    }

    #[test]
    fn test_scope_slots_follow_declaration_order() {
        let f = function("f", &[1, 2]);
        assert_eq!(&**f.all_slots(), &[0, 1, 2]);
        assert_eq!(&**f.scope_slots(Identifier::EMPTY).unwrap(), &[0, 2]);
        assert_eq!(&**f.scope_slots(intern("inner")).unwrap(), &[1]);
        assert!(f.scope_slots(intern("nowhere")).is_none());
    }

    #[test]
    fn test_resolve_picks_function_and_point() {
        let file = DebugSourceFile::new("main.em");
        file.add_function(function("first", &[1, 2]));
        file.add_function(function("second", &[10, 11, 12]));

        let (f, idx) = file.resolve(&SourceSpan::line(11, 6, 10)).unwrap();
        assert_eq!(f.name(), intern("second"));
        assert_eq!(idx, 1);

        assert!(file.resolve(&SourceSpan::line(30, 1, 2)).is_none());
        assert!(file.resolve(&SourceSpan::NONE).is_none());
    }

    #[test]
    fn test_innermost_function_wins() {
        let file = DebugSourceFile::new("main.em");
        file.add_function(function("outer", &[1, 9]));
        file.add_function(function("inner", &[4, 5]));
        let f = file.function_at(&SourceSpan::line(4, 5, 20)).unwrap();
        assert_eq!(f.name(), intern("inner"));
    }
}
