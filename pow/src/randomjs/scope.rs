//! Scope Model
//!
//! Scopes live in a per-program arena. Each scope points at its parent by
//! index only; parents never see their children. The arena owns the single
//! ordinal counter from which every variable name is derived, so two
//! variables of one program can never share a name.

use std::collections::BTreeSet;

use crate::randomjs::globals::GlobalHelper;

/// Index of a scope in its [`ScopeTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

/// Index of a variable in its [`ScopeTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

/// What opened a scope; drives the control-flow capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Loop,
    Block,
}

/// A named binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub scope: ScopeId,
    pub ordinal: u32,
}

#[derive(Debug, Clone)]
struct ScopeData {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    declared: Vec<VarId>,
    /// Only populated on the root scope
    required: BTreeSet<GlobalHelper>,
}

/// Arena of all scopes and variables of one program
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<ScopeData>,
    variables: Vec<Variable>,
    counter: u32,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// Create an arena holding only the global scope
    pub fn new() -> Self {
        Self {
            scopes: vec![ScopeData {
                parent: None,
                kind: ScopeKind::Global,
                declared: Vec::new(),
                required: BTreeSet::new(),
            }],
            variables: Vec::new(),
            counter: 0,
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Open a child scope of `parent`
    pub fn open(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeData {
            parent: Some(parent),
            kind,
            declared: Vec::new(),
            required: BTreeSet::new(),
        });
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.scopes[scope.0].kind
    }

    /// Take the next program-unique ordinal
    pub fn next_ordinal(&mut self) -> u32 {
        let ordinal = self.counter;
        self.counter += 1;
        ordinal
    }

    /// Declare a fresh variable in `scope`
    pub fn declare(&mut self, scope: ScopeId) -> VarId {
        let ordinal = self.next_ordinal();
        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            name: format!("v{}", ordinal),
            scope,
            ordinal,
        });
        self.scopes[scope.0].declared.push(id);
        id
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn name(&self, id: VarId) -> &str {
        &self.variables[id.0].name
    }

    /// Variables declared directly in `scope`
    pub fn declared(&self, scope: ScopeId) -> &[VarId] {
        &self.scopes[scope.0].declared
    }

    /// Ancestors of `scope`, starting with `scope` itself
    pub fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), move |s| self.parent(*s))
    }

    /// Variables visible from `scope`, ancestors first
    pub fn visible(&self, scope: ScopeId) -> Vec<VarId> {
        let chain: Vec<ScopeId> = self.ancestors(scope).collect();
        chain
            .iter()
            .rev()
            .flat_map(|s| self.declared(*s).iter().copied())
            .collect()
    }

    /// `return` is legal in `scope`
    pub fn in_function(&self, scope: ScopeId) -> bool {
        self.ancestors(scope)
            .any(|s| self.kind(s) == ScopeKind::Function)
    }

    /// `break` is legal in `scope`; a function boundary hides enclosing loops
    pub fn in_loop(&self, scope: ScopeId) -> bool {
        for s in self.ancestors(scope) {
            match self.kind(s) {
                ScopeKind::Loop => return true,
                ScopeKind::Function | ScopeKind::Global => return false,
                ScopeKind::Block => {}
            }
        }
        false
    }

    /// Record that code in `scope` needs `helper`.
    ///
    /// The requirement travels to the root scope, which deduplicates it.
    pub fn require(&mut self, scope: ScopeId, helper: GlobalHelper) {
        let root = self.ancestors(scope).last().unwrap_or(scope);
        let required = &mut self.scopes[root.0].required;
        if required.insert(helper) {
            for dep in helper.dependencies() {
                required.insert(*dep);
            }
        }
    }

    /// Helpers required anywhere in the program, in emission order
    pub fn required(&self) -> impl Iterator<Item = GlobalHelper> + '_ {
        self.scopes[0].required.iter().copied()
    }

    pub fn scope_ids(&self) -> impl Iterator<Item = ScopeId> {
        (0..self.scopes.len()).map(ScopeId)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}
