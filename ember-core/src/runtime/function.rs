//! Compiled functions and their builder

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ember_config::CacheConfig;

use crate::action::{ActionDescriptor, CallSite};
use crate::flow::Label;
use crate::ident::{self, Identifier};
use crate::runtime::ast::Stmt;
use crate::runtime::error::RuntimeError;
use crate::runtime::value::Value;
use crate::trace::{FunctionInfo, SequencePoint, SourceLocation, SourceSpan, VariableInfo};

pub struct Function {
    info: Arc<FunctionInfo>,
    params: usize,
    slot_count: usize,
    body: Vec<Stmt>,
    labels: HashMap<Label, usize>,
    call_sites: Vec<CallSite>,
    generator: bool,
}

impl Function {
    pub fn name(&self) -> Identifier {
        self.info.name()
    }

    pub fn info(&self) -> &Arc<FunctionInfo> {
        &self.info
    }

    pub fn params(&self) -> usize {
        self.params
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    pub fn label_index(&self, label: Label) -> Option<usize> {
        self.labels.get(&label).copied()
    }

    pub fn call_site(&self, index: usize) -> Option<&CallSite> {
        self.call_sites.get(index)
    }

    pub fn is_generator(&self) -> bool {
        self.generator
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("params", &self.params)
            .field("statements", &self.body.len())
            .field("generator", &self.generator)
            .finish()
    }
}

/// Builds a [`Function`] with one sequence point per statement
///
/// Statements added with [`stmt`](Self::stmt) occupy one source line each,
/// starting at [`starting_line`](Self::starting_line).
pub struct FunctionBuilder {
    name: Identifier,
    file: Arc<str>,
    line: u32,
    params: usize,
    scope: Identifier,
    variables: Vec<VariableInfo>,
    body: Vec<Stmt>,
    points: Vec<SequencePoint>,
    descriptors: Vec<ActionDescriptor>,
    cache: CacheConfig,
    generator: bool,
    payload: Option<Value>,
}

impl FunctionBuilder {
    pub fn new(name: &str, file: &str) -> Self {
        Self {
            name: ident::intern(name),
            file: Arc::from(file),
            line: 1,
            params: 0,
            scope: Identifier::EMPTY,
            variables: Vec::new(),
            body: Vec::new(),
            points: Vec::new(),
            descriptors: Vec::new(),
            cache: CacheConfig::default(),
            generator: false,
            payload: None,
        }
    }

    pub fn starting_line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    pub fn with_cache(&mut self, cache: CacheConfig) -> &mut Self {
        self.cache = cache;
        self
    }

    pub fn generator(&mut self) -> &mut Self {
        self.generator = true;
        self
    }

    /// Host data surfaced with every located trace event
    pub fn payload(&mut self, payload: Value) -> &mut Self {
        self.payload = Some(payload);
        self
    }

    /// Declare a parameter; parameters occupy the first slots
    pub fn param(&mut self, name: &str) -> usize {
        debug_assert_eq!(self.params, self.variables.len(), "parameters must precede locals");
        self.params += 1;
        self.declare(name)
    }

    /// Declare a local in the current scope
    pub fn local(&mut self, name: &str) -> usize {
        self.declare(name)
    }

    fn declare(&mut self, name: &str) -> usize {
        let slot = self.variables.len();
        self.variables.push(VariableInfo {
            name: ident::intern(name),
            slot,
            scope: self.scope,
        });
        slot
    }

    /// Subsequent locals belong to the named scope
    pub fn enter_scope(&mut self, scope: &str) -> &mut Self {
        self.scope = ident::intern(scope);
        self
    }

    pub fn exit_scope(&mut self) -> &mut Self {
        self.scope = Identifier::EMPTY;
        self
    }

    /// Reserve a call site; returns its index for `Expr::Dynamic`
    pub fn call_site(&mut self, descriptor: ActionDescriptor) -> usize {
        self.descriptors.push(descriptor);
        self.descriptors.len() - 1
    }

    pub fn stmt(&mut self, stmt: Stmt) -> &mut Self {
        let span = SourceSpan::new(
            SourceLocation::new(self.line, 1),
            SourceLocation::new(self.line + 1, 1),
        );
        self.line += 1;
        self.stmt_at(span, stmt)
    }

    pub fn stmt_at(&mut self, span: SourceSpan, stmt: Stmt) -> &mut Self {
        self.body.push(stmt);
        self.points.push(SequencePoint { span });
        self
    }

    pub fn label(&mut self, label: Label) -> &mut Self {
        self.stmt(Stmt::Label(label))
    }

    /// Index the next statement will receive
    pub fn next_index(&self) -> usize {
        self.body.len()
    }

    /// Fails with `UnknownLabel` when a jump targets an undeclared label
    pub fn build(self) -> Result<Arc<Function>, RuntimeError> {
        let mut labels = HashMap::new();
        for (index, stmt) in self.body.iter().enumerate() {
            if let Stmt::Label(label) = stmt {
                labels.entry(*label).or_insert(index);
            }
        }
        if let Some(missing) = self
            .body
            .iter()
            .filter_map(Stmt::jump_target)
            .find(|label| !label.is_return() && !labels.contains_key(label))
        {
            return Err(RuntimeError::UnknownLabel(missing));
        }

        let slot_count = self.variables.len();
        let info = Arc::new(FunctionInfo::new(
            self.name,
            self.file,
            self.points,
            self.variables,
            self.payload,
        ));
        let call_sites = self
            .descriptors
            .into_iter()
            .map(|descriptor| CallSite::new(descriptor, &self.cache))
            .collect();

        Ok(Arc::new(Function {
            info,
            params: self.params,
            slot_count,
            body: self.body,
            labels,
            call_sites,
            generator: self.generator,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ast::Expr;

    #[test]
    fn test_builder_assigns_line_spans() {
        let mut b = FunctionBuilder::new("f", "f.em");
        b.starting_line(10);
        let x = b.param("x");
        b.stmt(Stmt::assign(x, Expr::int(1)))
            .stmt(Stmt::Return(Expr::local(x)));
        let f = b.build().unwrap();

        assert_eq!(f.params(), 1);
        assert_eq!(f.slot_count(), 1);
        let points = f.info().sequence_points();
        assert_eq!(points[0].span.start, SourceLocation::new(10, 1));
        assert_eq!(points[1].span.start, SourceLocation::new(11, 1));
        assert_eq!(f.info().sequence_point_at(&SourceSpan::line(11, 3, 8)), Some(1));
    }

    #[test]
    fn test_labels_resolve_to_statement_index() {
        let top = Label::new("top");
        let mut b = FunctionBuilder::new("loop", "f.em");
        b.stmt(Stmt::Expr(Expr::int(0)))
            .label(top)
            .stmt(Stmt::goto(top));
        let f = b.build().unwrap();
        assert_eq!(f.label_index(top), Some(1));
    }

    #[test]
    fn test_unknown_label_rejected() {
        let mut b = FunctionBuilder::new("bad", "f.em");
        b.stmt(Stmt::goto(Label::new("nowhere")));
        assert_eq!(
            b.build().unwrap_err(),
            RuntimeError::UnknownLabel(Label::new("nowhere"))
        );
    }

    #[test]
    fn test_scoped_locals() {
        let mut b = FunctionBuilder::new("scoped", "f.em");
        b.local("a");
        b.enter_scope("inner");
        let t = b.local("t");
        b.exit_scope();
        let f = b.build().unwrap();
        assert_eq!(&**f.info().scope_slots(ident::intern("inner")).unwrap(), &[t]);
    }
}
